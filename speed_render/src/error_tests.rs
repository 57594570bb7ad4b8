//! Unit tests for error.rs
//!
//! Tests Error variants, their Display output and the validation/fatal split.

use crate::error::{Error, Result};

// ============================================================================
// ERROR DISPLAY TESTS
// ============================================================================

#[test]
fn test_invalid_operation_display() {
    let err = Error::InvalidOperation("command buffer is not recording".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Invalid operation"));
    assert!(display.contains("command buffer is not recording"));
}

#[test]
fn test_out_of_bounds_display() {
    let err = Error::OutOfBounds("source buffer".to_string());
    assert_eq!(format!("{}", err), "Out of bounds: source buffer");
}

#[test]
fn test_backend_mismatch_display() {
    let err = Error::BackendMismatch("texture belongs to a different backend".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Backend mismatch"));
    assert!(display.contains("different backend"));
}

#[test]
fn test_out_of_memory_display() {
    assert_eq!(format!("{}", Error::OutOfMemory), "Out of GPU memory");
}

#[test]
fn test_timeout_display() {
    let err = Error::Timeout("wait_for_end".to_string());
    assert_eq!(format!("{}", err), "Timeout: wait_for_end");
}

#[test]
fn test_initialization_failed_display() {
    let err = Error::InitializationFailed("no Vulkan-capable GPU".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Initialization failed"));
    assert!(display.contains("no Vulkan-capable GPU"));
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

#[test]
fn test_validation_errors_are_not_fatal() {
    let validation = [
        Error::InvalidOperation(String::new()),
        Error::InvalidArgument(String::new()),
        Error::OutOfBounds(String::new()),
        Error::BackendMismatch(String::new()),
        Error::InvalidResource(String::new()),
    ];

    for err in validation {
        assert!(err.is_validation(), "{:?} should be a validation error", err);
        assert!(!err.is_fatal(), "{:?} should not be fatal", err);
    }
}

#[test]
fn test_native_errors_are_fatal() {
    let fatal = [
        Error::Timeout(String::new()),
        Error::BackendError(String::new()),
        Error::OutOfMemory,
        Error::InitializationFailed(String::new()),
    ];

    for err in fatal {
        assert!(err.is_fatal(), "{:?} should be fatal", err);
        assert!(!err.is_validation());
    }
}

// ============================================================================
// ERROR TRAIT IMPLEMENTATIONS
// ============================================================================

#[test]
fn test_error_is_std_error() {
    let err = Error::OutOfMemory;
    let _: &dyn std::error::Error = &err;
}

#[test]
fn test_error_clone_and_eq() {
    let err1 = Error::BackendError("vkQueueSubmit".to_string());
    let err2 = err1.clone();
    assert_eq!(err1, err2);
    assert_ne!(err1, Error::OutOfMemory);
}

#[test]
fn test_result_question_mark_propagation() {
    fn inner() -> Result<u32> {
        Err(Error::InvalidArgument("slot".to_string()))
    }

    fn outer() -> Result<u32> {
        let value = inner()?;
        Ok(value + 1)
    }

    assert_eq!(outer(), Err(Error::InvalidArgument("slot".to_string())));
}
