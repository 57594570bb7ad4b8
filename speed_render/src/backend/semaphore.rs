/// Semaphore trait - timeline synchronization primitive

use std::any::Any;
use std::time::Duration;
use crate::error::Result;

/// Monotonic 64-bit counter shared between host and device
///
/// Each command buffer signals its own semaphore with an increasing value on
/// every submission; waiting for that value means the submission completed.
pub trait Semaphore: Send + Sync {
    /// Read the counter from the device (and cache it)
    fn value(&self) -> Result<u64>;

    /// Last value observed by `value`, `signal` or `wait`
    fn cached_value(&self) -> u64;

    /// Signal `value` from the host
    ///
    /// # Errors
    ///
    /// `InvalidArgument` unless `value` is greater than the cached value
    fn signal(&self, value: u64) -> Result<()>;

    /// Block until the counter reaches `target` or `timeout` elapses
    ///
    /// # Returns
    ///
    /// * `Ok(Some(observed))` - the counter reached `observed >= target`
    /// * `Ok(None)` - timeout (a warning is logged)
    fn wait(&self, target: u64, timeout: Duration) -> Result<Option<u64>>;

    /// Downcast support for backend checks
    fn as_any(&self) -> &dyn Any;
}
