//! Runtime event bridge
//!
//! Forwards the one event the animations may raise, "open panel", to the
//! page. Both the event path and the pointer fallback share a cooldown so a
//! burst of events opens the panel once.

mod event;

pub use event::EventName;
pub use event::normalize_event;

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::Weak;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::AvatarConfig;
use crate::host::PanelOpener;
use crate::lifecycle::RuntimeHandle;
use crate::model::Avatar;
use crate::model::Signal;

struct Sampler {
    handle: Uuid,
    cancel: CancellationToken,
}

/// Turns runtime events and pointer taps into open-panel calls.
pub struct EventBridge {
    config: Arc<AvatarConfig>,
    opener: Arc<dyn PanelOpener>,
    panel_open: AtomicBool,
    last_open: Mutex<Option<Instant>>,
    attention: [AtomicBool; 2],
    samplers: Mutex<[Option<Sampler>; 2]>,
    cancel: CancellationToken,
}

impl EventBridge {
    pub fn new(config: Arc<AvatarConfig>, opener: Arc<dyn PanelOpener>) -> Self {
        Self {
            config,
            opener,
            panel_open: AtomicBool::new(false),
            last_open: Mutex::new(None),
            attention: [AtomicBool::new(false), AtomicBool::new(false)],
            samplers: Mutex::new([None, None]),
            cancel: CancellationToken::new(),
        }
    }

    pub fn set_panel_open(&self, open: bool) {
        self.panel_open.store(open, Ordering::SeqCst);
    }

    /// Subscribes to a ready runtime and starts sampling its attention
    /// flag. Attaching the same handle twice does nothing.
    pub fn attach(self: &Arc<Self>, handle: Arc<RuntimeHandle>) {
        if self.cancel.is_cancelled() {
            return;
        }
        let avatar = handle.avatar();
        let cancel = {
            let mut samplers = self.samplers.lock().unwrap_or_else(|p| p.into_inner());
            let slot = &mut samplers[avatar.index()];
            if slot.as_ref().is_some_and(|s| s.handle == handle.id()) {
                return;
            }
            if let Some(previous) = slot.take() {
                previous.cancel.cancel();
            }
            let cancel = self.cancel.child_token();
            *slot = Some(Sampler {
                handle: handle.id(),
                cancel: cancel.clone(),
            });
            cancel
        };
        self.attention[avatar.index()].store(false, Ordering::SeqCst);

        let weak: Weak<Self> = Arc::downgrade(self);
        handle.runtime().subscribe(Arc::new(move |payload: &serde_json::Value| {
            if let Some(bridge) = weak.upgrade() {
                bridge.on_runtime_event(avatar, payload);
            }
        }));

        let bridge = Arc::clone(self);
        let period = self.config.bridge.attention_sample_interval;
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticks.tick() => {
                        let attentive = bridge.sample(&handle);
                        bridge.attention[avatar.index()].store(attentive, Ordering::SeqCst);
                    }
                    _ = cancel.cancelled() => break,
                }
            }
        });
        log::debug!("EventBridge: attached to {} runtime", avatar);
    }

    /// Handles a raw event emitted by a runtime.
    ///
    /// Ignored on unauthenticated pages.
    pub fn on_runtime_event(&self, avatar: Avatar, payload: &serde_json::Value) {
        if !self.config.auth.is_authenticated() {
            return;
        }
        let name = normalize_event(payload);
        if name.matches(&self.config.bridge.open_panel_event) {
            log::debug!("EventBridge: open-panel event from {}", avatar);
            self.request_open();
        } else {
            log::debug!("EventBridge: ignored event {:?} from {}", name, avatar);
        }
    }

    /// Handles a pointer tap on an avatar. Opens the panel when the
    /// animation currently shows its attention state.
    pub fn pointer_tap(&self, avatar: Avatar) -> bool {
        if !self.attention[avatar.index()].load(Ordering::SeqCst) {
            return false;
        }
        self.request_open()
    }

    /// Last sampled attention flag of an avatar.
    pub fn is_attentive(&self, avatar: Avatar) -> bool {
        self.attention[avatar.index()].load(Ordering::SeqCst)
    }

    /// Opens the panel unless it is open or the cooldown is running.
    fn request_open(&self) -> bool {
        if self.panel_open.load(Ordering::SeqCst) {
            log::debug!("EventBridge: panel already open");
            return false;
        }
        let now = Instant::now();
        {
            let mut last = self.last_open.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(previous) = *last
                && now.duration_since(previous) < self.config.bridge.cooldown
            {
                log::debug!("EventBridge: open-panel ignored during cooldown");
                return false;
            }
            *last = Some(now);
        }
        log::info!("EventBridge: opening panel");
        self.opener.open_panel();
        true
    }

    fn sample(&self, handle: &RuntimeHandle) -> bool {
        if handle.read(self.config.asset.inputs.for_signal(Signal::Hover)) == Some(true) {
            return true;
        }
        let words = &self.config.bridge.attention_states;
        handle.runtime().active_state_names().is_some_and(|states| {
            states.iter().any(|state| {
                let state = state.to_lowercase();
                words.iter().any(|word| state.contains(&word.to_lowercase()))
            })
        })
    }

    /// Stops every sampler.
    pub fn dispose(&self) {
        self.cancel.cancel();
        let mut samplers = self.samplers.lock().unwrap_or_else(|p| p.into_inner());
        for slot in samplers.iter_mut() {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::config::DEFAULT_AUTHENTICATED_ASSET;
    use crate::engine::LibraryLoader;
    use crate::engine::memory::AssetDefinition;
    use crate::engine::memory::InMemoryEngine;
    use crate::host::memory::InMemoryHost;
    use crate::host::memory::RecordingOpener;
    use crate::lifecycle::Lifecycle;
    use crate::model::AuthContext;
    use crate::model::InputDescriptor;
    use crate::model::SlotId;

    fn bridge(auth: AuthContext, opener: &RecordingOpener) -> Arc<EventBridge> {
        Arc::new(EventBridge::new(
            Arc::new(AvatarConfig::new(auth)),
            Arc::new(opener.clone()),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_forwards_once() {
        let opener = RecordingOpener::new();
        let bridge = bridge(AuthContext::Authenticated, &opener);

        bridge.on_runtime_event(Avatar::Button, &json!({"data": {"name": "AbrirPanel"}}));
        tokio::time::sleep(Duration::from_millis(500)).await;
        bridge.on_runtime_event(Avatar::Button, &json!("abrirpanel"));
        assert_eq!(opener.calls(), 1);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        bridge.on_runtime_event(Avatar::Button, &json!({"name": "AbrirPanel"}));
        assert_eq!(opener.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ignored_when_unauthenticated_or_open() {
        let opener = RecordingOpener::new();
        let unauth = bridge(AuthContext::Unauthenticated, &opener);
        unauth.on_runtime_event(Avatar::Button, &json!("AbrirPanel"));
        assert_eq!(opener.calls(), 0);

        let auth = bridge(AuthContext::Authenticated, &opener);
        auth.set_panel_open(true);
        auth.on_runtime_event(Avatar::Button, &json!("AbrirPanel"));
        auth.on_runtime_event(Avatar::Button, &json!("OtroEvento"));
        assert_eq!(opener.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attached_runtime_events_and_pointer_tap() {
        let opener = RecordingOpener::new();
        let bridge = bridge(AuthContext::Authenticated, &opener);
        let mut inputs = AssetDefinition::standard().inputs;
        inputs.push(InputDescriptor::boolean("Hover"));
        let engine = InMemoryEngine::new()
            .with_asset(DEFAULT_AUTHENTICATED_ASSET, AssetDefinition::standard().with_inputs(inputs));
        let host = InMemoryHost::with_all_slots();
        let lifecycle = Lifecycle::new(
            Avatar::Button,
            Arc::new(AvatarConfig::new(AuthContext::Authenticated)),
            Arc::new(LibraryLoader::new(Arc::new(engine.clone()))),
            Arc::new(host),
        );
        lifecycle.initialize().await;
        let handle = lifecycle.ready_handle().unwrap();
        bridge.attach(handle.clone());
        bridge.attach(handle);

        let runtime = engine.latest(SlotId::Button).unwrap();
        assert_eq!(runtime.listener_count(), 1);

        assert!(!bridge.pointer_tap(Avatar::Button));
        runtime.set_external("Hover", true);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(bridge.pointer_tap(Avatar::Button));

        runtime.emit(&json!({"type": "AbrirPanel"}));
        assert_eq!(opener.calls(), 1);

        tokio::time::sleep(Duration::from_millis(1600)).await;
        runtime.emit(&json!({"type": "AbrirPanel"}));
        assert_eq!(opener.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_active_state_name_marks_attention() {
        let opener = RecordingOpener::new();
        let bridge = bridge(AuthContext::Unauthenticated, &opener);
        let engine = InMemoryEngine::new();
        let lifecycle = Lifecycle::new(
            Avatar::Button,
            Arc::new(AvatarConfig::new(AuthContext::Unauthenticated)),
            Arc::new(LibraryLoader::new(Arc::new(engine.clone()))),
            Arc::new(InMemoryHost::with_all_slots()),
        );
        lifecycle.initialize().await;
        bridge.attach(lifecycle.ready_handle().unwrap());

        engine
            .latest(SlotId::Button)
            .unwrap()
            .set_active_states(Some(vec!["Estado_Atención".to_string()]));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(bridge.is_attentive(Avatar::Button));
        assert!(bridge.pointer_tap(Avatar::Button));
        assert_eq!(opener.calls(), 1);

        bridge.dispose();
    }
}
