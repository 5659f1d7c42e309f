//! Animation engine error types

/// Errors raised by calls into the external animation engine.
///
/// None of these propagate past the core's public operations; they are
/// logged and swallowed at the call boundary.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// The engine library could not be fetched or did not initialize.
    #[error("Engine library unavailable: {0}")]
    LibraryUnavailable(String),

    /// The runtime rejected an input write.
    #[error("Input '{input}' rejected: {message}")]
    Input { input: String, message: String },

    /// No text run with the given name exists on the artboard.
    #[error("Text run '{0}' not found")]
    TextRunNotFound(String),

    /// The runtime does not know the requested state machine.
    #[error("State machine '{0}' not found")]
    StateMachineNotFound(String),

    /// Any other failure reported by the engine.
    #[error("Engine call failed: {0}")]
    Call(String),
}

impl EngineError {
    /// Creates a new input write error.
    pub fn input(input: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Input {
            input: input.into(),
            message: message.into(),
        }
    }

    /// Creates a generic call error.
    pub fn call(message: impl Into<String>) -> Self {
        Self::Call(message.into())
    }
}
