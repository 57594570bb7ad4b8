/// Vulkan Debug Messenger - Routes validation layer messages to the engine logger
///
/// Messages are logged through `Engine` with a severity matching the layer's
/// and counted per severity. Compiled only with the `vulkan-validation` feature.

use ash::vk;
use colored::*;
use speed_render::{engine_debug, engine_error, engine_info, engine_trace, engine_warn};
use std::ffi::CStr;
use std::sync::atomic::{AtomicU32, Ordering};

/// Message counters indexed by `severity_slot`
static COUNTERS: [AtomicU32; 4] = [
    AtomicU32::new(0),
    AtomicU32::new(0),
    AtomicU32::new(0),
    AtomicU32::new(0),
];

/// Number of validation messages received, per severity
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

fn severity_slot(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> usize {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        0
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        1
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        2
    } else {
        3
    }
}

/// Reset the counters (done when a context installs its messenger)
pub(crate) fn reset_validation_stats() {
    for counter in &COUNTERS {
        counter.store(0, Ordering::Relaxed);
    }
}

/// Get current validation statistics
pub fn get_validation_stats() -> ValidationStats {
    let [errors, warnings, info, verbose] = COUNTERS.each_ref().map(|c| c.load(Ordering::Relaxed));
    ValidationStats { errors, warnings, info, verbose }
}

/// Print validation statistics report
pub fn print_validation_stats_report() {
    let stats = get_validation_stats();

    if stats.total() == 0 {
        println!("\n{}", "No validation messages".green().bold());
        return;
    }

    println!("\n{}", "=== Validation Statistics Report ===".bright_blue().bold());

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
    println!("{}\n", "====================================".bright_blue().bold());
}

fn message_type_name(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    }
}

/// Vulkan debug messenger callback
///
/// # Safety
///
/// Called by the validation layers with a valid callback data pointer.
pub unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }

    let callback_data = *p_callback_data;
    let message_id_name = if callback_data.p_message_id_name.is_null() {
        "Unknown".into()
    } else {
        CStr::from_ptr(callback_data.p_message_id_name).to_string_lossy()
    };
    let message = if callback_data.p_message.is_null() {
        "No message".into()
    } else {
        CStr::from_ptr(callback_data.p_message).to_string_lossy()
    };

    COUNTERS[severity_slot(message_severity)].fetch_add(1, Ordering::Relaxed);

    let source = "speed::vulkan::Validation";
    let type_name = message_type_name(message_type);

    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        engine_error!(source, "[{}] {}: {}", type_name, message_id_name, message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        engine_warn!(source, "[{}] {}: {}", type_name, message_id_name, message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        engine_info!(source, "[{}] {}: {}", type_name, message_id_name, message);
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        engine_debug!(source, "[{}] {}: {}", type_name, message_id_name, message);
    } else {
        engine_trace!(source, "[{}] {}: {}", type_name, message_id_name, message);
    }

    vk::FALSE
}
