/// Frame pacing and frame statistics

use std::fmt;
use std::time::{Duration, Instant};

/// Sleeps away the remainder of each frame period
#[derive(Debug)]
pub struct FramePacer {
    period: Duration,
    frame_start: Instant,
}

impl FramePacer {
    pub fn new(target_fps: u32) -> Self {
        Self {
            period: period_of(target_fps),
            frame_start: Instant::now(),
        }
    }

    pub fn set_target_fps(&mut self, target_fps: u32) {
        self.period = period_of(target_fps);
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Time left in the current period after `elapsed` of work
    pub fn remaining(&self, elapsed: Duration) -> Duration {
        self.period.saturating_sub(elapsed)
    }

    /// Sleep until the current period is over, then start the next one
    pub fn wait(&mut self) {
        let remaining = self.remaining(self.frame_start.elapsed());
        if !remaining.is_zero() {
            std::thread::sleep(remaining);
        }
        self.frame_start = Instant::now();
    }
}

fn period_of(target_fps: u32) -> Duration {
    Duration::from_nanos(1_000_000_000 / u64::from(target_fps.max(1)))
}

/// Frame counter, run time and an FPS estimate refreshed once per second
#[derive(Debug, Clone)]
pub struct FrameStats {
    started: Instant,
    window_start: Instant,
    frames_in_window: u32,
    frame_count: u64,
    fps: f32,
}

impl FrameStats {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(now: Instant) -> Self {
        Self {
            started: now,
            window_start: now,
            frames_in_window: 0,
            frame_count: 0,
            fps: 0.0,
        }
    }

    /// Count a frame finished now
    pub fn record_frame(&mut self) -> bool {
        self.record_frame_at(Instant::now())
    }

    /// Count a frame finished at `now`; true when the FPS estimate was refreshed
    pub fn record_frame_at(&mut self, now: Instant) -> bool {
        self.frame_count += 1;
        self.frames_in_window += 1;

        let window = now.saturating_duration_since(self.window_start);
        if window < Duration::from_secs(1) {
            return false;
        }
        self.fps = self.frames_in_window as f32 / window.as_secs_f32();
        self.frames_in_window = 0;
        self.window_start = now;
        true
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn seconds_running(&self) -> f32 {
        self.started.elapsed().as_secs_f32()
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FrameStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame {} | {:.1}s | {:.1} fps", self.frame_count, self.seconds_running(), self.fps)
    }
}

#[cfg(test)]
#[path = "frame_pacer_tests.rs"]
mod tests;
