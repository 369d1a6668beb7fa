//! Context configuration

/// Graphics API version requested by the scene layer at `init`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
}

impl ApiVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl std::fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Debug message severity filter for backend validation layers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    /// Only errors
    ErrorsOnly,
    /// Errors and warnings
    ErrorsAndWarnings,
    /// Everything (verbose, info, warnings, errors)
    All,
}

/// Configuration shared by every backend
#[derive(Debug, Clone)]
pub struct Config {
    /// Application name
    pub app_name: String,

    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),

    /// Enable backend validation layers
    pub enable_validation: bool,

    /// Initial staging buffer size in bytes
    pub staging_buffer_size: u64,

    /// Run an asynchronous object collection every N presented frames
    pub async_collect_period: u64,

    /// Maximum number of objects destroyed by one synchronous collection
    pub sync_collect_budget: usize,

    /// Frame fence wait timeout in nanoseconds
    pub fence_timeout_ns: u64,

    /// Validation message filter
    pub debug_severity: DebugSeverity,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "gfx_context application".to_string(),
            app_version: (1, 0, 0),
            enable_validation: cfg!(debug_assertions),
            staging_buffer_size: 10 * 1024 * 1024,
            async_collect_period: 10,
            sync_collect_budget: 64,
            fence_timeout_ns: u64::MAX,
            debug_severity: DebugSeverity::ErrorsAndWarnings,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
