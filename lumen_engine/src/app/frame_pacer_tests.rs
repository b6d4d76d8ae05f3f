/// Unit tests for FramePacer / FrameStats

use std::time::{Duration, Instant};

use crate::app::frame_pacer::*;

#[test]
fn test_period_follows_target_fps() {
    let mut pacer = FramePacer::new(50);
    assert_eq!(pacer.period(), Duration::from_millis(20));

    pacer.set_target_fps(100);
    assert_eq!(pacer.period(), Duration::from_millis(10));
}

#[test]
fn test_remaining_never_underflows() {
    let pacer = FramePacer::new(50);
    assert_eq!(pacer.remaining(Duration::from_millis(5)), Duration::from_millis(15));
    assert_eq!(pacer.remaining(Duration::from_millis(40)), Duration::ZERO);
}

#[test]
fn test_zero_fps_is_clamped() {
    let pacer = FramePacer::new(0);
    assert_eq!(pacer.period(), Duration::from_secs(1));
}

#[test]
fn test_wait_sleeps_out_the_period() {
    let mut pacer = FramePacer::new(100);
    let start = Instant::now();
    pacer.wait();
    // the pacer was created just before, so most of the 10ms period remains
    assert!(start.elapsed() >= Duration::from_millis(5));
}

#[test]
fn test_fps_refreshes_once_per_second() {
    let t0 = Instant::now();
    let mut stats = FrameStats::starting_at(t0);

    for i in 1..30u64 {
        assert!(!stats.record_frame_at(t0 + Duration::from_millis(i * 30)));
    }
    assert_eq!(stats.fps(), 0.0);

    assert!(stats.record_frame_at(t0 + Duration::from_secs(1)));
    assert_eq!(stats.frame_count(), 30);
    assert!((stats.fps() - 30.0).abs() < 1e-3);
}

#[test]
fn test_display_shows_counter_and_fps() {
    let mut stats = FrameStats::new();
    stats.record_frame();
    let text = stats.to_string();
    assert!(text.starts_with("frame 1 |"));
    assert!(text.ends_with("fps"));
}
