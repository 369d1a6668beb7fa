//! Error types for the graphics context layer
//!
//! Only recoverable failures travel through `Result`. Contract violations
//! (buffer overflow, drawing without a program, presenting outside a frame)
//! are asserted at the call site instead.

use std::fmt;

/// Result type for graphics context operations
pub type Result<T> = std::result::Result<T, Error>;

/// Graphics context errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (Vulkan, OpenGL, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (buffer, program, render target, etc.)
    InvalidResource(String),

    /// Initialization failed (instance, device, surface, fixed resources)
    InitializationFailed(String),

    /// Operation not allowed in the current frame state
    InvalidState(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
