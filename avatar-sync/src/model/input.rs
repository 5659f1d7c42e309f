//! State machine inputs exposed by a loaded asset

/// How an input is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    /// Holds a boolean value.
    Boolean,
    /// Fire-and-forget, has no readable value.
    Trigger,
}

/// A named control exposed by a state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDescriptor {
    pub name: String,
    pub kind: InputKind,
}

impl InputDescriptor {
    pub fn boolean(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: InputKind::Boolean,
        }
    }

    pub fn trigger(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: InputKind::Trigger,
        }
    }
}

/// Semantic signals the core looks up by alias in an [`InputSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Message,
    NoPermission,
    Error,
    Listening,
    Attention,
    Hover,
}

/// The resolved inputs of one state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSet {
    machine: String,
    inputs: Vec<InputDescriptor>,
}

impl InputSet {
    pub fn new(machine: impl Into<String>, inputs: Vec<InputDescriptor>) -> Self {
        Self {
            machine: machine.into(),
            inputs,
        }
    }

    /// Name of the state machine the inputs belong to.
    pub fn machine(&self) -> &str {
        &self.machine
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InputDescriptor> {
        self.inputs.iter()
    }

    /// Finds the input matching the first alias that names one.
    ///
    /// Aliases are tried in declaration order and compared
    /// case-insensitively, so the alias list decides priority rather than
    /// the asset's input order.
    pub fn find<S: AsRef<str>>(&self, aliases: &[S]) -> Option<&InputDescriptor> {
        aliases.iter().find_map(|alias| {
            let alias = alias.as_ref().to_lowercase();
            self.inputs
                .iter()
                .find(|input| input.name.to_lowercase() == alias)
        })
    }
}
