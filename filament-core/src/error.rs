//! Error types for the Filament core runtime.
//!
//! The reactive core itself is largely infallible: equality checks never
//! fail and disposal callbacks cannot report errors. Fallibility enters
//! through two doors:
//!
//! - Node operations performed by a rendering backend may fail.
//! - User-supplied effect bodies may fail.
//!
//! Errors propagate synchronously out of the triggering `tick()` call and
//! abort the remainder of that flush pass. There is no per-effect isolation
//! or retry in the core; error boundaries are a higher-layer concern.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the reactive core and its rendering boundary.
#[derive(Debug, Error)]
pub enum Error {
    /// A rendering backend node operation failed.
    #[error("node operation failed: {0}")]
    NodeOp(String),

    /// A user-supplied effect body failed.
    #[error("effect failed: {0}")]
    Effect(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Build a node-operation error from any displayable message.
    pub fn node_op(message: impl Into<String>) -> Self {
        Self::NodeOp(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_op_error_displays_message() {
        let error = Error::node_op("missing parent");
        assert_eq!(error.to_string(), "node operation failed: missing parent");
    }

    #[test]
    fn effect_error_wraps_source() {
        let source: Box<dyn std::error::Error + Send + Sync> = "boom".into();
        let error = Error::from(source);
        assert!(error.to_string().contains("boom"));
    }
}
