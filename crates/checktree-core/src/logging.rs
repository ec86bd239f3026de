//! Logging facilities for Checktree.
//!
//! Checktree uses the `tracing` crate for instrumentation. To see logs,
//! install a subscriber in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("checktree::forest=debug,checktree::tree=debug")
//!     .init();
//! ```

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core crate target.
    pub const CORE: &str = "checktree_core";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "checktree_core::signal";
    /// Item store target.
    pub const STORE: &str = "checktree::store";
    /// Single-root store model target.
    pub const MODEL: &str = "checktree::model";
    /// Forest model (virtual root, requery diffing) target.
    pub const FOREST: &str = "checktree::forest";
    /// Tree controller, router and node index target.
    pub const TREE: &str = "checktree::tree";
}

/// A guard that keeps a tracing span entered until it is dropped.
///
/// Useful for tracking the duration of an operation.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create and enter a new performance span.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: "checktree::perf", "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }
}

/// Macros for common tracing patterns.
///
/// Thin wrappers around the `tracing` macros with the core target.
#[macro_export]
macro_rules! checktree_trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: "checktree_core", $($arg)*)
    };
}

#[macro_export]
macro_rules! checktree_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "checktree_core", $($arg)*)
    };
}

#[macro_export]
macro_rules! checktree_info {
    ($($arg:tt)*) => {
        tracing::info!(target: "checktree_core", $($arg)*)
    };
}

#[macro_export]
macro_rules! checktree_warn {
    ($($arg:tt)*) => {
        tracing::warn!(target: "checktree_core", $($arg)*)
    };
}

#[macro_export]
macro_rules! checktree_error {
    ($($arg:tt)*) => {
        tracing::error!(target: "checktree_core", $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perf_span() {
        let _span = PerfSpan::new("test_operation");
        checktree_debug!(operation = "test_operation", "inside span");
    }

    #[test]
    fn test_targets_are_namespaced() {
        for target in [targets::STORE, targets::MODEL, targets::FOREST, targets::TREE] {
            assert!(target.starts_with("checktree::"));
        }
        assert!(targets::SIGNAL.starts_with(targets::CORE));
    }
}
