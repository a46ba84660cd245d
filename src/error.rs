//! Error types for the ndi-bridge library.

use std::ffi::NulError;
use thiserror::Error;

/// The main error type for NDI operations.
///
/// Only configuration, lifecycle and creation problems are errors. A capture,
/// wait or status query that finds nothing within its timeout is a value
/// (`None`, `false`, an empty list), and so is a native call that reports
/// failure through its boolean return.
#[derive(Debug, Error)]
pub enum Error {
    /// The native library refused to create an instance.
    ///
    /// Raised at construction when the native factory returns null. No handle is
    /// produced.
    #[error("{0}")]
    InitializationFailed(String),

    /// A handle was created from a runtime that is not initialized.
    #[error("NDI runtime is not initialized; call initialize() first")]
    NotInitialized,

    /// The handle was already destroyed. Carries the handle kind.
    #[error("{0} has been destroyed")]
    Destroyed(&'static str),

    /// Configuration parameters are invalid.
    ///
    /// Raised by builders and constructors before any native call.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Failed to create a C string due to null bytes.
    #[error("Invalid CString: {0}")]
    InvalidCString(#[from] NulError),

    /// Frame data does not match the shape the frame describes.
    #[error("Invalid frame data: {0}")]
    InvalidFrame(String),

    /// An async twin was called outside a Tokio runtime.
    #[error("no Tokio runtime is available to offload the blocking call")]
    NoAsyncRuntime,

    /// The offloaded worker did not run to completion.
    #[error("Blocking task failed: {0}")]
    TaskFailed(String),
}
