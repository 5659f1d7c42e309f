//! Boundary to the external animation engine
//!
//! The engine is opaque: the core only creates runtimes, reads their
//! state-machine metadata and writes inputs through these traits.

mod library;
pub mod memory;

pub use library::LibraryLoader;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::EngineError;
use crate::error::LoadError;
use crate::model::InputDescriptor;
use crate::model::SurfaceRef;

/// Callback receiving raw events emitted by a runtime.
pub type EventListener = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;

/// Parameters used to construct a runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    /// Asset path.
    pub src: String,
    /// Element the runtime renders into.
    pub surface: SurfaceRef,
    /// Whether the engine should start playback on its own.
    pub autoplay: bool,
    /// State machines to instantiate.
    pub state_machines: Vec<String>,
}

/// The engine library itself: lazily loaded, then used as a runtime
/// factory.
#[async_trait]
pub trait AnimationEngine: Send + Sync {
    /// Fetches and initializes the library.
    async fn load_library(&self) -> Result<(), EngineError>;

    /// Constructs a runtime. Loading continues in the background and is
    /// observed through [`AnimationRuntime::loaded`].
    fn create(&self, request: LoadRequest) -> Result<Arc<dyn AnimationRuntime>, EngineError>;
}

/// A runtime instance bound to one hosting element.
#[async_trait]
pub trait AnimationRuntime: Send + Sync {
    /// Element this runtime renders into.
    fn surface(&self) -> SurfaceRef;

    /// Resolves once the asset finished loading.
    async fn loaded(&self) -> Result<(), LoadError>;

    /// State machines defined by the asset. Empty until the engine exposes
    /// them.
    fn state_machine_names(&self) -> Vec<String>;

    /// Inputs of a state machine, or `None` while not yet exposed.
    fn state_machine_inputs(&self, machine: &str) -> Option<Vec<InputDescriptor>>;

    /// Starts playback of a state machine.
    fn play(&self, machine: &str) -> Result<(), EngineError>;

    /// Current value of a boolean input.
    fn boolean_value(&self, machine: &str, input: &str) -> Option<bool>;

    fn set_boolean(&self, machine: &str, input: &str, value: bool) -> Result<(), EngineError>;

    fn fire_trigger(&self, machine: &str, input: &str) -> Result<(), EngineError>;

    /// Writes a text run on the artboard.
    fn set_text_run_value(&self, name: &str, text: &str) -> Result<(), EngineError>;

    /// Registers a listener for events emitted by the animation.
    fn subscribe(&self, listener: EventListener);

    /// Natural artboard size, when obtainable.
    fn artboard_size(&self) -> Option<(f32, f32)> {
        None
    }

    /// Names of the states currently active in the animator.
    fn active_state_names(&self) -> Option<Vec<String>> {
        None
    }

    /// Whether [`release`](Self::release) does anything.
    fn supports_release(&self) -> bool {
        false
    }

    /// Frees engine resources held by this runtime.
    fn release(&self) -> Result<(), EngineError> {
        Ok(())
    }
}
