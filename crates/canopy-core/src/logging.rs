//! Logging facilities for Canopy.
//!
//! Canopy uses the `tracing` crate for instrumentation and never installs a
//! subscriber itself. To see logs, install one in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("canopy=debug,canopy_core=trace")
//!     .init();
//! ```

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core primitives target.
    pub const CORE: &str = "canopy_core";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "canopy_core::signal";
    /// Single-subscriber change notifier target.
    pub const NOTIFIER: &str = "canopy_core::notifier";
    /// Row flattening controller target.
    pub const FLATTEN: &str = "canopy::flatten";
    /// Sortable level target.
    pub const LEVEL: &str = "canopy::level";
}
