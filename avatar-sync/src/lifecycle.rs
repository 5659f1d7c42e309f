//! Runtime lifecycle
//!
//! One [`Lifecycle`] per logical avatar owns the avatar's runtime handle.
//! It guards initialization so concurrent callers never create two
//! runtimes, classifies load failures, resolves the state-machine inputs
//! and broadcasts its phase on a watch channel that the arbiter uses as a
//! readiness signal.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::binder;
use crate::binder::BindDecision;
use crate::binder::Binding;
use crate::config::AvatarConfig;
use crate::engine::AnimationRuntime;
use crate::engine::LibraryLoader;
use crate::engine::LoadRequest;
use crate::host::SurfaceHost;
use crate::model::Avatar;
use crate::model::InputSet;
use crate::model::SurfaceGeometry;
use crate::model::SurfaceRef;

/// Lifecycle phase of one logical avatar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Uninitialized,
    Initializing,
    Ready,
    /// The hosting element changed; the old runtime is being released.
    Rebinding,
    /// The asset failed to load; the static fallback is shown.
    Failed,
}

impl Phase {
    fn is_busy(self) -> bool {
        matches!(self, Self::Initializing | Self::Rebinding)
    }
}

/// Result of one [`Lifecycle::initialize`] call.
#[derive(Clone)]
pub enum InitOutcome {
    /// A new runtime became ready.
    Started(Arc<RuntimeHandle>),
    /// The existing runtime still matches the hosting element.
    Reused,
    /// Another initialization is running.
    InProgress,
    /// No element currently hosts this avatar.
    NoSurface,
    /// The engine library could not be loaded.
    LibraryUnavailable,
    /// The asset failed to load.
    Failed,
    /// The owning context was disposed while loading.
    Disposed,
}

impl std::fmt::Debug for InitOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started(handle) => f.debug_tuple("Started").field(&handle.id()).finish(),
            Self::Reused => f.write_str("Reused"),
            Self::InProgress => f.write_str("InProgress"),
            Self::NoSurface => f.write_str("NoSurface"),
            Self::LibraryUnavailable => f.write_str("LibraryUnavailable"),
            Self::Failed => f.write_str("Failed"),
            Self::Disposed => f.write_str("Disposed"),
        }
    }
}

/// A live runtime bound to a hosting element.
pub struct RuntimeHandle {
    id: Uuid,
    avatar: Avatar,
    binding: Binding,
    runtime: Arc<dyn AnimationRuntime>,
    machine: String,
    inputs: Mutex<Option<InputSet>>,
}

impl RuntimeHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn avatar(&self) -> Avatar {
        self.avatar
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn surface(&self) -> SurfaceRef {
        self.binding.surface
    }

    pub fn runtime(&self) -> &Arc<dyn AnimationRuntime> {
        &self.runtime
    }

    /// State machine the inputs belong to.
    pub fn machine(&self) -> &str {
        &self.machine
    }

    /// The input set, resolving it on first successful read.
    pub fn input_set(&self) -> Option<InputSet> {
        let mut inputs = self.inputs.lock().unwrap_or_else(|p| p.into_inner());
        if inputs.is_none() {
            *inputs = self
                .runtime
                .state_machine_inputs(&self.machine)
                .filter(|list| !list.is_empty())
                .map(|list| InputSet::new(self.machine.clone(), list));
        }
        inputs.clone()
    }

    /// Reads the first boolean input matching `aliases`.
    pub fn read<S: AsRef<str>>(&self, aliases: &[S]) -> Option<bool> {
        let inputs = self.input_set()?;
        let input = inputs.find(aliases)?;
        self.runtime.boolean_value(&self.machine, &input.name)
    }
}

/// Owns the runtime of one logical avatar.
pub struct Lifecycle {
    avatar: Avatar,
    config: Arc<AvatarConfig>,
    library: Arc<LibraryLoader>,
    host: Arc<dyn SurfaceHost>,
    phase: watch::Sender<Phase>,
    handle: Mutex<Option<Arc<RuntimeHandle>>>,
    loads: AtomicUsize,
    cancel: CancellationToken,
}

impl Lifecycle {
    pub fn new(
        avatar: Avatar,
        config: Arc<AvatarConfig>,
        library: Arc<LibraryLoader>,
        host: Arc<dyn SurfaceHost>,
    ) -> Self {
        let (phase, _) = watch::channel(Phase::Uninitialized);
        Self {
            avatar,
            config,
            library,
            host,
            phase,
            handle: Mutex::new(None),
            loads: AtomicUsize::new(0),
            cancel: CancellationToken::new(),
        }
    }

    pub fn avatar(&self) -> Avatar {
        self.avatar
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Receives every phase change.
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// The current handle when the avatar is ready.
    pub fn ready_handle(&self) -> Option<Arc<RuntimeHandle>> {
        if self.phase() != Phase::Ready {
            return None;
        }
        self.current()
    }

    /// Returns `true` if some element can host this avatar.
    pub fn is_hosted(&self) -> bool {
        self.avatar.slots().iter().any(|slot| self.host.locate(*slot).is_some())
    }

    /// Number of asset loads started.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Binds the avatar to its current hosting element.
    ///
    /// Returns immediately when another initialization is running or the
    /// existing runtime still matches the element.
    pub async fn initialize(&self) -> InitOutcome {
        if self.cancel.is_cancelled() {
            return InitOutcome::Disposed;
        }
        if self.phase().is_busy() {
            log::debug!("Lifecycle({}): initialization already running", self.avatar);
            return InitOutcome::InProgress;
        }

        let Some(binding) =
            binder::resolve_slot(self.host.as_ref(), &self.config.asset, self.avatar, self.config.auth)
        else {
            log::debug!("Lifecycle({}): no hosting surface", self.avatar);
            return InitOutcome::NoSurface;
        };

        let previous = self.current().map(|h| h.surface());
        let decision = binder::decide(previous, &binding);
        if decision == BindDecision::Reuse && self.phase() == Phase::Ready {
            return InitOutcome::Reused;
        }

        let claim = if decision == BindDecision::Rebind {
            Phase::Rebinding
        } else {
            Phase::Initializing
        };
        let claimed = self.phase.send_if_modified(|phase| {
            if phase.is_busy() {
                return false;
            }
            *phase = claim;
            true
        });
        if !claimed {
            return InitOutcome::InProgress;
        }

        if decision == BindDecision::Rebind {
            log::info!(
                "Lifecycle({}): hosting element changed, releasing previous runtime",
                self.avatar
            );
            self.release_current();
            self.set_phase(Phase::Initializing);
        }

        self.load(binding).await
    }

    async fn load(&self, binding: Binding) -> InitOutcome {
        let surface = binding.surface;

        if self.library.ensure().await.is_err() {
            self.host.show_fallback(self.avatar);
            self.set_phase(Phase::Uninitialized);
            return InitOutcome::LibraryUnavailable;
        }

        self.host.set_visible(surface, false);
        let request = LoadRequest {
            src: binding.slot.asset_path.clone(),
            surface,
            autoplay: false,
            state_machines: vec![self.config.asset.state_machine.clone()],
        };
        self.loads.fetch_add(1, Ordering::SeqCst);
        log::info!("Lifecycle({}): loading {}", self.avatar, request.src);

        let runtime = match self.library.engine().create(request) {
            Ok(runtime) => runtime,
            Err(e) => {
                log::error!("Lifecycle({}): runtime creation failed: {}", self.avatar, e);
                return self.fail(surface);
            }
        };

        match runtime.loaded().await {
            Ok(()) => {}
            Err(e) if e.is_benign() => {
                log::warn!("Lifecycle({}): {} (continuing)", self.avatar, e);
                self.host.set_visible(surface, true);
            }
            Err(e) => {
                log::error!("Lifecycle({}): {}", self.avatar, e);
                return self.fail(surface);
            }
        }

        let (machine, inputs) = self.resolve_inputs(runtime.as_ref()).await;
        if self.cancel.is_cancelled() {
            release(runtime.as_ref(), self.avatar);
            return InitOutcome::Disposed;
        }

        if let Err(e) = runtime.play(&machine) {
            log::warn!("Lifecycle({}): play failed: {}", self.avatar, e);
        }

        let max_size = self.config.geometry.max_size(self.avatar, self.config.auth);
        self.host
            .apply_geometry(surface, SurfaceGeometry::fit(runtime.artboard_size(), max_size));
        self.host.set_visible(surface, true);

        let handle = Arc::new(RuntimeHandle {
            id: Uuid::new_v4(),
            avatar: self.avatar,
            binding,
            runtime,
            machine,
            inputs: Mutex::new(inputs),
        });
        *self.lock_handle() = Some(handle.clone());
        self.set_phase(Phase::Ready);
        log::info!("Lifecycle({}): ready ({})", self.avatar, handle.id());
        InitOutcome::Started(handle)
    }

    /// Waits for the state machine's inputs to be exposed.
    ///
    /// Gives up after the configured attempts and returns the best
    /// machine name known so far; the handle resolves inputs lazily later.
    async fn resolve_inputs(&self, runtime: &dyn AnimationRuntime) -> (String, Option<InputSet>) {
        let preferred = &self.config.asset.state_machine;
        let backoff = &self.config.input_resolution;
        let mut attempt = 0;
        loop {
            let names = runtime.state_machine_names();
            let machine = if names.iter().any(|n| n == preferred) {
                preferred.clone()
            } else {
                names.first().cloned().unwrap_or_else(|| preferred.clone())
            };

            if let Some(inputs) = runtime.state_machine_inputs(&machine).filter(|i| !i.is_empty()) {
                log::debug!(
                    "Lifecycle({}): {} inputs resolved on '{}'",
                    self.avatar,
                    inputs.len(),
                    machine
                );
                return (machine.clone(), Some(InputSet::new(machine, inputs)));
            }

            if !backoff.allows(attempt) || self.cancel.is_cancelled() {
                log::warn!("Lifecycle({}): inputs not exposed, resolving later", self.avatar);
                return (machine, None);
            }
            tokio::time::sleep(backoff.delay_for(attempt)).await;
            attempt += 1;
        }
    }

    fn fail(&self, surface: SurfaceRef) -> InitOutcome {
        self.host.set_visible(surface, false);
        self.host.show_fallback(self.avatar);
        *self.lock_handle() = None;
        self.set_phase(Phase::Failed);
        InitOutcome::Failed
    }

    /// Releases the runtime and stops further initialization.
    pub fn dispose(&self) {
        self.cancel.cancel();
        self.release_current();
        self.set_phase(Phase::Uninitialized);
    }

    fn release_current(&self) {
        if let Some(handle) = self.lock_handle().take() {
            release(handle.runtime().as_ref(), self.avatar);
        }
    }

    fn current(&self) -> Option<Arc<RuntimeHandle>> {
        self.lock_handle().clone()
    }

    fn set_phase(&self, phase: Phase) {
        self.phase.send_replace(phase);
    }

    fn lock_handle(&self) -> std::sync::MutexGuard<'_, Option<Arc<RuntimeHandle>>> {
        self.handle.lock().unwrap_or_else(|p| p.into_inner())
    }
}

fn release(runtime: &dyn AnimationRuntime, avatar: Avatar) {
    if !runtime.supports_release() {
        return;
    }
    if let Err(e) = runtime.release() {
        log::warn!("Lifecycle({}): release failed: {}", avatar, e);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::DEFAULT_UNAUTHENTICATED_ASSET;
    use crate::engine::memory::AssetDefinition;
    use crate::engine::memory::InMemoryEngine;
    use crate::host::memory::InMemoryHost;
    use crate::model::AuthContext;
    use crate::model::SlotId;

    fn lifecycle(engine: &InMemoryEngine, host: &InMemoryHost, avatar: Avatar) -> Lifecycle {
        Lifecycle::new(
            avatar,
            Arc::new(AvatarConfig::new(AuthContext::Unauthenticated)),
            Arc::new(LibraryLoader::new(Arc::new(engine.clone()))),
            Arc::new(host.clone()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_initialize_loads_once() {
        let engine = InMemoryEngine::new();
        let host = InMemoryHost::with_all_slots();
        let lc = lifecycle(&engine, &host, Avatar::Button);

        let (a, b) = tokio::join!(lc.initialize(), lc.initialize());
        assert!(matches!(a, InitOutcome::Started(_)));
        assert!(matches!(b, InitOutcome::InProgress));
        assert_eq!(lc.load_count(), 1);
        assert_eq!(lc.phase(), Phase::Ready);
        assert!(matches!(lc.initialize().await, InitOutcome::Reused));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_applies_geometry_and_plays() {
        let engine = InMemoryEngine::new()
            .with_asset(DEFAULT_UNAUTHENTICATED_ASSET, AssetDefinition::standard().with_artboard(Some((400.0, 200.0))));
        let host = InMemoryHost::with_all_slots();
        let lc = lifecycle(&engine, &host, Avatar::Panel);

        lc.initialize().await;
        let handle = lc.ready_handle().unwrap();
        let geometry = host.geometry_of(handle.surface()).unwrap();
        assert_eq!(geometry.width, 270.0);
        assert_eq!(geometry.height, 135.0);
        assert!(host.is_visible(handle.surface()));
        assert_eq!(engine.latest(SlotId::PanelChat).unwrap().played(), vec!["State Machine 1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_benign_failure_continues() {
        let engine = InMemoryEngine::new().with_asset(
            DEFAULT_UNAUTHENTICATED_ASSET,
            AssetDefinition::standard().with_load_failure("State Machine 'x' not found"),
        );
        let host = InMemoryHost::with_all_slots();
        let lc = lifecycle(&engine, &host, Avatar::Button);

        assert!(matches!(lc.initialize().await, InitOutcome::Started(_)));
        assert!(host.fallbacks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_failure_shows_fallback() {
        let engine = InMemoryEngine::new()
            .with_asset(DEFAULT_UNAUTHENTICATED_ASSET, AssetDefinition::standard().with_load_failure("404"));
        let host = InMemoryHost::with_all_slots();
        let lc = lifecycle(&engine, &host, Avatar::Button);

        assert!(matches!(lc.initialize().await, InitOutcome::Failed));
        assert_eq!(lc.phase(), Phase::Failed);
        assert_eq!(host.fallbacks(), vec![Avatar::Button]);
        assert!(!host.is_visible(host.locate(SlotId::Button).unwrap()));
        assert!(lc.ready_handle().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_library_failure_returns_to_uninitialized() {
        let engine = InMemoryEngine::new().with_library_failures(1);
        let host = InMemoryHost::with_all_slots();
        let lc = lifecycle(&engine, &host, Avatar::Button);

        assert!(matches!(lc.initialize().await, InitOutcome::LibraryUnavailable));
        assert_eq!(lc.phase(), Phase::Uninitialized);
        assert_eq!(host.fallbacks(), vec![Avatar::Button]);
        assert!(matches!(lc.initialize().await, InitOutcome::Started(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_inputs_resolve_after_backoff() {
        let engine = InMemoryEngine::new()
            .with_asset(DEFAULT_UNAUTHENTICATED_ASSET, AssetDefinition::standard().with_hidden_input_reads(3));
        let host = InMemoryHost::with_all_slots();
        let lc = lifecycle(&engine, &host, Avatar::Button);

        let start = tokio::time::Instant::now();
        lc.initialize().await;
        let handle = lc.ready_handle().unwrap();
        assert_eq!(handle.input_set().map(|s| s.len()), Some(5));
        // load delay + 100 + 200 + 400 ms
        assert!(start.elapsed() >= Duration::from_millis(800));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rebind_releases_previous_once() {
        let engine = InMemoryEngine::new();
        let host = InMemoryHost::with_all_slots();
        let lc = lifecycle(&engine, &host, Avatar::Button);

        lc.initialize().await;
        let first = engine.latest(SlotId::Button).unwrap();
        host.navigate();
        assert!(matches!(lc.initialize().await, InitOutcome::Started(_)));
        assert_eq!(lc.load_count(), 2);
        assert_eq!(first.release_count(), 1);

        lc.dispose();
        assert_eq!(first.release_count(), 1);
        assert_eq!(engine.latest(SlotId::Button).unwrap().release_count(), 1);
        assert!(matches!(lc.initialize().await, InitOutcome::Disposed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_surface() {
        let engine = InMemoryEngine::new();
        let host = InMemoryHost::new();
        let lc = lifecycle(&engine, &host, Avatar::Panel);
        assert!(matches!(lc.initialize().await, InitOutcome::NoSurface));
        assert!(!lc.is_hosted());
        assert_eq!(engine.created(), 0);
    }
}
