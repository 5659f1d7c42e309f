//! In-memory animation engine
//!
//! Simulates the external engine: asynchronous library and asset loads,
//! delayed exposure of state-machine inputs, input writes, text runs and
//! emitted events. Every call is recorded so callers can inspect exactly
//! what the core did. Used by the simulator binary and the test suites.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;

use super::AnimationEngine;
use super::AnimationRuntime;
use super::EventListener;
use super::LoadRequest;
use crate::config::DEFAULT_STATE_MACHINE;
use crate::error::EngineError;
use crate::error::LoadError;
use crate::model::InputDescriptor;
use crate::model::InputKind;
use crate::model::SlotId;
use crate::model::SurfaceRef;

/// Description of a simulated asset file.
#[derive(Debug, Clone)]
pub struct AssetDefinition {
    pub state_machines: Vec<String>,
    pub inputs: Vec<InputDescriptor>,
    pub text_runs: Vec<String>,
    pub artboard: Option<(f32, f32)>,
    /// Time between construction and the load callback.
    pub load_delay: Duration,
    /// Reason reported by the load error callback, if the load fails.
    pub load_failure: Option<String>,
    /// Number of input reads answered with "not exposed yet".
    pub hidden_input_reads: u32,
    pub releasable: bool,
    /// Inputs that must never be true at the same time.
    pub exclusive_inputs: Vec<String>,
}

impl Default for AssetDefinition {
    fn default() -> Self {
        Self::standard()
    }
}

impl AssetDefinition {
    /// The shape of the shipped assets: one state machine with the
    /// message, no-permission, error, listening and attention inputs.
    pub fn standard() -> Self {
        Self {
            state_machines: vec![DEFAULT_STATE_MACHINE.to_string()],
            inputs: vec![
                InputDescriptor::boolean("Mensaje"),
                InputDescriptor::boolean("Sin_Permiso"),
                InputDescriptor::boolean("ERROR"),
                InputDescriptor::boolean("Escuchando"),
                InputDescriptor::boolean("atencion"),
            ],
            text_runs: vec!["Texto_mensaje".to_string(), "Mensaje_error".to_string()],
            artboard: Some((500.0, 500.0)),
            load_delay: Duration::from_millis(100),
            load_failure: None,
            hidden_input_reads: 0,
            releasable: true,
            exclusive_inputs: vec!["Mensaje".to_string(), "Sin_Permiso".to_string(), "ERROR".to_string()],
        }
    }

    pub fn with_inputs(mut self, inputs: Vec<InputDescriptor>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_text_runs(mut self, runs: &[&str]) -> Self {
        self.text_runs = runs.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn with_state_machines(mut self, machines: &[&str]) -> Self {
        self.state_machines = machines.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn with_artboard(mut self, artboard: Option<(f32, f32)>) -> Self {
        self.artboard = artboard;
        self
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    pub fn with_load_failure(mut self, reason: impl Into<String>) -> Self {
        self.load_failure = Some(reason.into());
        self
    }

    pub fn with_hidden_input_reads(mut self, reads: u32) -> Self {
        self.hidden_input_reads = reads;
        self
    }

    pub fn releasable(mut self, releasable: bool) -> Self {
        self.releasable = releasable;
        self
    }
}

/// One recorded input write. `value` is `None` for a fired trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputWrite {
    pub input: String,
    pub value: Option<bool>,
}

/// A cloneable handle to a simulated engine.
#[derive(Clone, Default)]
pub struct InMemoryEngine {
    inner: Arc<EngineInner>,
}

#[derive(Default)]
struct EngineInner {
    assets: Mutex<HashMap<String, AssetDefinition>>,
    library_delay: Mutex<Duration>,
    library_failures: AtomicU32,
    library_loads: AtomicUsize,
    runtimes: Mutex<Vec<Arc<InMemoryRuntime>>>,
    violations: Arc<AtomicUsize>,
}

impl InMemoryEngine {
    /// Creates an engine where every asset uses [`AssetDefinition::standard`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a definition for an asset path.
    pub fn with_asset(self, path: impl Into<String>, definition: AssetDefinition) -> Self {
        lock(&self.inner.assets).insert(path.into(), definition);
        self
    }

    pub fn with_library_delay(self, delay: Duration) -> Self {
        *lock(&self.inner.library_delay) = delay;
        self
    }

    /// Makes the next `count` library loads fail.
    pub fn with_library_failures(self, count: u32) -> Self {
        self.inner.library_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Number of library fetches started.
    pub fn library_loads(&self) -> usize {
        self.inner.library_loads.load(Ordering::SeqCst)
    }

    /// Number of runtimes constructed (asset loads started).
    pub fn created(&self) -> usize {
        lock(&self.inner.runtimes).len()
    }

    /// All runtimes constructed so far, oldest first.
    pub fn runtimes(&self) -> Vec<Arc<InMemoryRuntime>> {
        lock(&self.inner.runtimes).clone()
    }

    /// The most recent runtime created for a slot.
    pub fn latest(&self, slot: SlotId) -> Option<Arc<InMemoryRuntime>> {
        lock(&self.inner.runtimes)
            .iter()
            .rev()
            .find(|r| r.request.surface.slot == slot)
            .cloned()
    }

    /// Number of times two exclusive inputs were observed true together.
    pub fn exclusive_violations(&self) -> usize {
        self.inner.violations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnimationEngine for InMemoryEngine {
    async fn load_library(&self) -> Result<(), EngineError> {
        self.inner.library_loads.fetch_add(1, Ordering::SeqCst);
        let delay = *lock(&self.inner.library_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .inner
            .library_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(EngineError::LibraryUnavailable("network error".to_string()));
        }
        Ok(())
    }

    fn create(&self, request: LoadRequest) -> Result<Arc<dyn AnimationRuntime>, EngineError> {
        let definition = lock(&self.inner.assets)
            .get(&request.src)
            .cloned()
            .unwrap_or_default();
        let mut runtimes = lock(&self.inner.runtimes);
        let runtime = Arc::new(InMemoryRuntime {
            id: runtimes.len(),
            request,
            definition,
            state: Mutex::new(RuntimeState::default()),
            listeners: Mutex::new(Vec::new()),
            violations: self.inner.violations.clone(),
        });
        runtimes.push(runtime.clone());
        Ok(runtime)
    }
}

#[derive(Default)]
struct RuntimeState {
    values: HashMap<String, bool>,
    writes: Vec<InputWrite>,
    texts: HashMap<String, String>,
    played: Vec<String>,
    input_reads: u32,
    releases: u32,
    active_states: Option<Vec<String>>,
}

/// A simulated runtime.
pub struct InMemoryRuntime {
    id: usize,
    request: LoadRequest,
    definition: AssetDefinition,
    state: Mutex<RuntimeState>,
    listeners: Mutex<Vec<EventListener>>,
    violations: Arc<AtomicUsize>,
}

impl InMemoryRuntime {
    /// Construction order within the engine.
    pub fn id(&self) -> usize {
        self.id
    }

    /// The request this runtime was constructed with.
    pub fn request(&self) -> &LoadRequest {
        &self.request
    }

    /// Current value of a boolean input, by exact name.
    pub fn value(&self, input: &str) -> Option<bool> {
        lock(&self.state).values.get(input).copied()
    }

    /// Every input write in order.
    pub fn writes(&self) -> Vec<InputWrite> {
        lock(&self.state).writes.clone()
    }

    /// Number of writes to one input.
    pub fn writes_to(&self, input: &str) -> usize {
        lock(&self.state).writes.iter().filter(|w| w.input == input).count()
    }

    /// Last text written to a text run.
    pub fn text(&self, run: &str) -> Option<String> {
        lock(&self.state).texts.get(run).cloned()
    }

    /// State machines passed to `play`, in order.
    pub fn played(&self) -> Vec<String> {
        lock(&self.state).played.clone()
    }

    pub fn release_count(&self) -> u32 {
        lock(&self.state).releases
    }

    /// Sets an input as the animation itself would (pointer hover etc.).
    pub fn set_external(&self, input: &str, value: bool) {
        lock(&self.state).values.insert(input.to_string(), value);
    }

    pub fn set_active_states(&self, states: Option<Vec<String>>) {
        lock(&self.state).active_states = states;
    }

    /// Delivers an event to every subscribed listener.
    pub fn emit(&self, event: &serde_json::Value) {
        let listeners = lock(&self.listeners).clone();
        for listener in listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    fn input(&self, machine: &str, input: &str) -> Result<&InputDescriptor, EngineError> {
        if !self.definition.state_machines.iter().any(|m| m == machine) {
            return Err(EngineError::StateMachineNotFound(machine.to_string()));
        }
        self.definition
            .inputs
            .iter()
            .find(|i| i.name == input)
            .ok_or_else(|| EngineError::input(input, "no such input"))
    }

    fn check_exclusive(&self, state: &RuntimeState) {
        let active = self
            .definition
            .exclusive_inputs
            .iter()
            .filter(|name| state.values.get(*name).copied().unwrap_or(false))
            .count();
        if active > 1 {
            self.violations.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl AnimationRuntime for InMemoryRuntime {
    fn surface(&self) -> SurfaceRef {
        self.request.surface
    }

    async fn loaded(&self) -> Result<(), LoadError> {
        if !self.definition.load_delay.is_zero() {
            tokio::time::sleep(self.definition.load_delay).await;
        }
        match &self.definition.load_failure {
            Some(reason) => Err(LoadError::new(reason.clone())),
            None => Ok(()),
        }
    }

    fn state_machine_names(&self) -> Vec<String> {
        self.definition.state_machines.clone()
    }

    fn state_machine_inputs(&self, machine: &str) -> Option<Vec<InputDescriptor>> {
        let mut state = lock(&self.state);
        state.input_reads += 1;
        if state.input_reads <= self.definition.hidden_input_reads {
            return None;
        }
        if !self.definition.state_machines.iter().any(|m| m == machine) {
            return None;
        }
        Some(self.definition.inputs.clone())
    }

    fn play(&self, machine: &str) -> Result<(), EngineError> {
        if !self.definition.state_machines.iter().any(|m| m == machine) {
            return Err(EngineError::StateMachineNotFound(machine.to_string()));
        }
        lock(&self.state).played.push(machine.to_string());
        Ok(())
    }

    fn boolean_value(&self, machine: &str, input: &str) -> Option<bool> {
        let descriptor = self.input(machine, input).ok()?;
        if descriptor.kind != InputKind::Boolean {
            return None;
        }
        Some(lock(&self.state).values.get(input).copied().unwrap_or(false))
    }

    fn set_boolean(&self, machine: &str, input: &str, value: bool) -> Result<(), EngineError> {
        let descriptor = self.input(machine, input)?;
        if descriptor.kind != InputKind::Boolean {
            return Err(EngineError::input(input, "not a boolean input"));
        }
        let mut state = lock(&self.state);
        state.values.insert(input.to_string(), value);
        state.writes.push(InputWrite {
            input: input.to_string(),
            value: Some(value),
        });
        self.check_exclusive(&state);
        Ok(())
    }

    fn fire_trigger(&self, machine: &str, input: &str) -> Result<(), EngineError> {
        let descriptor = self.input(machine, input)?;
        if descriptor.kind != InputKind::Trigger {
            return Err(EngineError::input(input, "not a trigger input"));
        }
        lock(&self.state).writes.push(InputWrite {
            input: input.to_string(),
            value: None,
        });
        Ok(())
    }

    fn set_text_run_value(&self, name: &str, text: &str) -> Result<(), EngineError> {
        if !self.definition.text_runs.iter().any(|r| r == name) {
            return Err(EngineError::TextRunNotFound(name.to_string()));
        }
        lock(&self.state).texts.insert(name.to_string(), text.to_string());
        Ok(())
    }

    fn subscribe(&self, listener: EventListener) {
        lock(&self.listeners).push(listener);
    }

    fn artboard_size(&self) -> Option<(f32, f32)> {
        self.definition.artboard
    }

    fn active_state_names(&self) -> Option<Vec<String>> {
        lock(&self.state).active_states.clone()
    }

    fn supports_release(&self) -> bool {
        self.definition.releasable
    }

    fn release(&self) -> Result<(), EngineError> {
        lock(&self.state).releases += 1;
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
