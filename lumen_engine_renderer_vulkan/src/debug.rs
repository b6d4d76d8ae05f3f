/// Vulkan debug messenger - routes validation layer messages to the engine logger
///
/// Messages are filtered by the configured `DebugSeverity`, counted per
/// severity, and grouped so repeated messages show an occurrence count.
/// With the `vulkan-validation-panic` feature, validation errors panic
/// inside the callback so the backtrace points at the faulting call.

use ash::vk;
use colored::*;
use lumen_engine::lumen::DebugSeverity;
use lumen_engine::{engine_debug, engine_error, engine_info, engine_trace, engine_warn};
use rustc_hash::FxHashMap;
use std::ffi::CStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

const SOURCE: &str = "lumen::vulkan";

/// Severity filter used by the callback (None until a messenger is installed)
static DEBUG_SEVERITY: Mutex<Option<DebugSeverity>> = Mutex::new(None);

static VALIDATION_STATS: ValidationStatsTracker = ValidationStatsTracker::new();

static MESSAGE_TRACKER: Mutex<Option<FxHashMap<String, u32>>> = Mutex::new(None);

/// Validation message counts since the messenger was installed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }
}

struct ValidationStatsTracker {
    errors: AtomicU32,
    warnings: AtomicU32,
    info: AtomicU32,
    verbose: AtomicU32,
}

impl ValidationStatsTracker {
    const fn new() -> Self {
        Self {
            errors: AtomicU32::new(0),
            warnings: AtomicU32::new(0),
            info: AtomicU32::new(0),
            verbose: AtomicU32::new(0),
        }
    }

    fn record(&self, severity: vk::DebugUtilsMessageSeverityFlagsEXT) {
        let counter = if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            &self.errors
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            &self.warnings
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            &self.info
        } else {
            &self.verbose
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn get_stats(&self) -> ValidationStats {
        ValidationStats {
            errors: self.errors.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            info: self.info.load(Ordering::Relaxed),
            verbose: self.verbose.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.errors.store(0, Ordering::Relaxed);
        self.warnings.store(0, Ordering::Relaxed);
        self.info.store(0, Ordering::Relaxed);
        self.verbose.store(0, Ordering::Relaxed);
    }
}

/// Messenger severity mask for a configured filter level
pub fn severity_flags(severity: DebugSeverity) -> vk::DebugUtilsMessageSeverityFlagsEXT {
    match severity {
        DebugSeverity::ErrorsOnly => vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        DebugSeverity::ErrorsAndWarnings => {
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
        }
        DebugSeverity::All => {
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
        }
    }
}

/// Whether a message of `message_severity` passes the configured filter
pub fn passes_filter(severity: DebugSeverity, message_severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> bool {
    severity_flags(severity).intersects(message_severity)
}

/// Install the callback filter and reset statistics
pub fn init_debug_config(severity: DebugSeverity) {
    VALIDATION_STATS.reset();
    if let Ok(mut tracker) = MESSAGE_TRACKER.lock() {
        *tracker = Some(FxHashMap::default());
    }
    if let Ok(mut current) = DEBUG_SEVERITY.lock() {
        *current = Some(severity);
    }
}

/// Stop forwarding messages (called before the messenger is destroyed)
pub fn cleanup_debug_config() {
    if let Ok(mut current) = DEBUG_SEVERITY.lock() {
        *current = None;
    }
}

pub fn get_validation_stats() -> ValidationStats {
    VALIDATION_STATS.get_stats()
}

/// Print a colored summary of the validation messages seen so far
pub fn print_validation_stats_report() {
    let stats = get_validation_stats();

    if stats.total() == 0 {
        println!("\n{}", "No validation messages".green().bold());
        return;
    }

    println!("\n{}", "=== Validation Statistics ===".bright_blue().bold());
    if stats.errors > 0 {
        println!("  {} {}", "Errors:".red().bold(), stats.errors);
    }
    if stats.warnings > 0 {
        println!("  {} {}", "Warnings:".yellow().bold(), stats.warnings);
    }
    if stats.info > 0 {
        println!("  {} {}", "Info:".cyan(), stats.info);
    }
    if stats.verbose > 0 {
        println!("  {} {}", "Verbose:".bright_black(), stats.verbose);
    }
    println!("  {} {}", "Total:".white().bold(), stats.total());

    if let Ok(tracker) = MESSAGE_TRACKER.lock() {
        let repeated = tracker
            .as_ref()
            .map(|messages| messages.values().filter(|&&count| count > 1).count())
            .unwrap_or(0);
        if repeated > 0 {
            println!("  {} message(s) appeared multiple times", repeated);
        }
    }
    println!("{}\n", "=============================".bright_blue().bold());
}

fn track_message(message: &str) -> u32 {
    let Ok(mut guard) = MESSAGE_TRACKER.lock() else {
        return 1;
    };
    let messages = guard.get_or_insert_with(FxHashMap::default);
    let count = messages.entry(message.to_string()).or_insert(0);
    *count += 1;
    *count
}

fn message_type_label(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    }
}

unsafe fn cstr_or<'a>(ptr: *const std::os::raw::c_char, fallback: &'a str) -> std::borrow::Cow<'a, str> {
    if ptr.is_null() {
        std::borrow::Cow::Borrowed(fallback)
    } else {
        CStr::from_ptr(ptr).to_string_lossy()
    }
}

/// Debug messenger callback
pub unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    let severity = match DEBUG_SEVERITY.lock() {
        Ok(guard) => match *guard {
            Some(severity) => severity,
            None => return vk::FALSE,
        },
        Err(_) => return vk::FALSE,
    };
    if !passes_filter(severity, message_severity) || p_callback_data.is_null() {
        return vk::FALSE;
    }

    let callback_data = *p_callback_data;
    let message_id = cstr_or(callback_data.p_message_id_name, "Unknown");
    let message = cstr_or(callback_data.p_message, "No message");
    let kind = message_type_label(message_type);

    VALIDATION_STATS.record(message_severity);
    let occurrences = track_message(&message);
    let repeat = if occurrences > 1 { format!(" [x{}]", occurrences) } else { String::new() };

    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        engine_error!(SOURCE, "[{}] {}{}: {}", kind, message_id, repeat, message);

        #[cfg(feature = "vulkan-validation-panic")]
        panic!("Vulkan validation error [{}] {}: {}", kind, message_id, message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        engine_warn!(SOURCE, "[{}] {}{}: {}", kind, message_id, repeat, message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        engine_info!(SOURCE, "[{}] {}{}: {}", kind, message_id, repeat, message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE) {
        engine_trace!(SOURCE, "[{}] {}{}: {}", kind, message_id, repeat, message);
    } else {
        engine_debug!(SOURCE, "[{}] {}{}: {}", kind, message_id, repeat, message);
    }

    vk::FALSE
}

#[cfg(test)]
#[path = "debug_tests.rs"]
mod tests;
