//! Asset load error types

/// Failure reasons that only mean the engine has not exposed the state
/// machine yet. Loading continues through input resolution.
const BENIGN_MARKERS: &[&str] = &["State Machine", "no animations", "Animation with name"];

/// Error reported by the runtime's load callback.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Asset load failed: {reason}")]
pub struct LoadError {
    /// Raw reason reported by the engine.
    pub reason: String,
}

impl LoadError {
    /// Creates a new load error from the engine's reason text.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the failure is the engine's startup race for
    /// state machines or animations looked up by name.
    pub fn is_benign(&self) -> bool {
        BENIGN_MARKERS
            .iter()
            .any(|marker| self.reason.contains(marker))
    }
}
