//! Semantic states and state requests

use std::fmt;

/// States a caller may ask the arbiter to assert or clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKind {
    Message,
    NoPermission,
    Error,
    Listening,
}

impl StateKind {
    /// The mutually exclusive kinds. At most one of them is active.
    pub const EXCLUSIVE: [StateKind; 3] = [StateKind::Message, StateKind::NoPermission, StateKind::Error];

    pub fn is_exclusive(self) -> bool {
        !matches!(self, Self::Listening)
    }

    /// The input signal that carries this state.
    pub fn signal(self) -> super::Signal {
        match self {
            Self::Message => super::Signal::Message,
            Self::NoPermission => super::Signal::NoPermission,
            Self::Error => super::Signal::Error,
            Self::Listening => super::Signal::Listening,
        }
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Message => "message",
            Self::NoPermission => "no-permission",
            Self::Error => "error",
            Self::Listening => "listening",
        };
        f.write_str(name)
    }
}

/// A request to assert or clear one semantic state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRequest {
    pub kind: StateKind,
    pub active: bool,
    pub text: Option<String>,
    /// Bypasses the open-panel suppression rule.
    pub force: bool,
}

impl StateRequest {
    /// Asserts `kind`.
    pub fn activate(kind: StateKind) -> Self {
        Self {
            kind,
            active: true,
            text: None,
            force: false,
        }
    }

    /// Attaches the text to display. Blank text is ignored.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.text = if text.trim().is_empty() { None } else { Some(text) };
        self
    }

    /// Clears `kind`.
    pub fn deactivate(kind: StateKind) -> Self {
        Self {
            kind,
            active: false,
            text: None,
            force: false,
        }
    }

    /// Marks the request as forced.
    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    /// Deduplication key. `force` does not participate.
    pub fn key(&self) -> RequestKey {
        RequestKey {
            kind: self.kind,
            active: self.active,
            text: self.text.clone().unwrap_or_default(),
        }
    }
}

/// Identifies requests that would produce the same write.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub kind: StateKind,
    pub active: bool,
    pub text: String,
}

/// Which exclusive state an avatar currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SemanticState {
    /// Nothing exclusive is asserted; the attention input is on.
    #[default]
    Idle,
    Message,
    NoPermission,
    Error,
}

impl From<StateKind> for SemanticState {
    fn from(kind: StateKind) -> Self {
        match kind {
            StateKind::Message => Self::Message,
            StateKind::NoPermission => Self::NoPermission,
            StateKind::Error => Self::Error,
            StateKind::Listening => Self::Idle,
        }
    }
}

/// Snapshot of an avatar's visible state, read back from its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AvatarState {
    pub exclusive: SemanticState,
    pub listening: bool,
}
