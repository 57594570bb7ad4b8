/// Renderer trait and backend configuration

use std::time::Duration;
use crate::backend::command_buffer::CommandBuffer;
use crate::backend::swapchain::Swapchain;
use crate::error::Result;
use crate::log::LogSeverity;

/// Backend configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Enable validation layers (requires the `vulkan-validation` feature to log messages)
    pub enable_validation: bool,
    /// Application name
    pub app_name: String,
    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),
    /// Bound on swapchain image acquisition
    pub acquire_timeout: Duration,
    /// Bound on `Renderer::wait_for_end`
    pub wait_for_end_timeout: Duration,
    /// Log entries below this severity are discarded
    pub min_log_severity: LogSeverity,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_validation: cfg!(debug_assertions),
            app_name: "Speed Application".to_string(),
            app_version: (1, 0, 0),
            acquire_timeout: Duration::from_millis(250),
            wait_for_end_timeout: Duration::from_secs(100),
            min_log_severity: LogSeverity::Trace,
        }
    }
}

/// Queue-level operations of a backend
pub trait Renderer: Send + Sync {
    /// Submit ended command buffers for execution
    ///
    /// Never blocks on GPU completion. Each buffer signals its timeline
    /// semaphore with its next value; framebuffers over swapchain images are
    /// transitioned to Present after the batch.
    ///
    /// # Errors
    ///
    /// * `InvalidOperation` - a buffer is still recording
    /// * `BackendMismatch` - a buffer belongs to another backend
    fn submit(&self, command_buffers: &mut [&mut dyn CommandBuffer]) -> Result<()>;

    /// Present the current image of each swapchain
    fn present(&self, swapchains: &[&dyn Swapchain]) -> Result<()>;

    /// Wait until every buffer's last submission completed
    ///
    /// # Errors
    ///
    /// `Timeout` when the configured bound elapses
    fn wait_for_end(&self, command_buffers: &mut [&mut dyn CommandBuffer]) -> Result<()>;

    /// Wait for the whole device to be idle
    fn wait_idle(&self) -> Result<()>;
}
