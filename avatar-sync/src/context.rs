//! Owning context
//!
//! [`AvatarContext`] owns every component for one page session and is the
//! only entry point the surrounding UI talks to. It moves through
//! `Created → Ready → Disposed`; after disposal every operation is a no-op.

use std::sync::Arc;
use std::sync::Mutex;

use crate::arbiter::Arbiter;
use crate::bridge::EventBridge;
use crate::config::AvatarConfig;
use crate::engine::AnimationEngine;
use crate::engine::LibraryLoader;
use crate::host::PanelOpener;
use crate::host::SurfaceHost;
use crate::lifecycle::InitOutcome;
use crate::lifecycle::Lifecycle;
use crate::lifecycle::Phase;
use crate::model::Avatar;
use crate::model::AvatarState;
use crate::model::Notification;
use crate::model::NotificationId;
use crate::model::StateRequest;
use crate::reconciler::Reconciler;

/// Lifecycle of the owning context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextPhase {
    Created,
    Ready,
    Disposed,
}

/// Everything needed to drive both avatars of one page.
pub struct AvatarContext {
    config: Arc<AvatarConfig>,
    lifecycles: [Arc<Lifecycle>; 2],
    arbiter: Arc<Arbiter>,
    bridge: Arc<EventBridge>,
    reconciler: Arc<Reconciler>,
    phase: Mutex<ContextPhase>,
}

impl AvatarContext {
    pub fn new(
        config: AvatarConfig,
        engine: Arc<dyn AnimationEngine>,
        host: Arc<dyn SurfaceHost>,
        opener: Arc<dyn PanelOpener>,
    ) -> Self {
        let config = Arc::new(config);
        let library = Arc::new(LibraryLoader::new(engine));
        let lifecycles = Avatar::ALL.map(|avatar| {
            Arc::new(Lifecycle::new(avatar, config.clone(), library.clone(), host.clone()))
        });
        let arbiter = Arc::new(Arbiter::new(
            config.clone(),
            lifecycles[Avatar::Button.index()].clone(),
            lifecycles[Avatar::Panel.index()].clone(),
        ));
        let bridge = Arc::new(EventBridge::new(config.clone(), opener));
        let reconciler = Arc::new(Reconciler::new(config.clone(), arbiter.clone()));

        log::info!(
            "AvatarContext: created ({})",
            if config.auth.is_authenticated() { "authenticated" } else { "unauthenticated" }
        );
        Self {
            config,
            lifecycles,
            arbiter,
            bridge,
            reconciler,
            phase: Mutex::new(ContextPhase::Created),
        }
    }

    pub fn config(&self) -> &AvatarConfig {
        &self.config
    }

    pub fn phase(&self) -> ContextPhase {
        *self.phase.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn is_disposed(&self) -> bool {
        self.phase() == ContextPhase::Disposed
    }

    /// Initializes both avatars concurrently and marks the context ready.
    pub async fn start(&self) {
        if self.is_disposed() {
            return;
        }
        futures::future::join_all(Avatar::ALL.map(|avatar| self.initialize(avatar))).await;

        let mut phase = self.phase.lock().unwrap_or_else(|p| p.into_inner());
        if *phase == ContextPhase::Created {
            *phase = ContextPhase::Ready;
        }
    }

    /// Binds one avatar to its current hosting element.
    ///
    /// Call again after a navigation; the runtime is reused when the
    /// element did not change.
    pub async fn initialize(&self, avatar: Avatar) -> InitOutcome {
        if self.is_disposed() {
            return InitOutcome::Disposed;
        }
        let outcome = self.lifecycle(avatar).initialize().await;
        if let InitOutcome::Started(handle) = &outcome {
            self.bridge.attach(handle.clone());
            self.arbiter.runtime_ready(avatar);
        }
        outcome
    }

    /// Requests a semantic state on both avatars.
    pub fn request_state(&self, request: StateRequest) {
        if self.is_disposed() {
            return;
        }
        self.arbiter.request(request);
    }

    /// Semantic state shown by an avatar, if it is ready.
    pub fn current_state(&self, avatar: Avatar) -> Option<AvatarState> {
        self.arbiter.current_state(avatar)
    }

    /// Lifecycle phase of an avatar.
    pub fn avatar_phase(&self, avatar: Avatar) -> Phase {
        self.lifecycle(avatar).phase()
    }

    pub fn set_panel_open(&self, open: bool) {
        self.arbiter.set_panel_open(open);
        self.bridge.set_panel_open(open);
    }

    pub fn is_panel_open(&self) -> bool {
        self.arbiter.is_panel_open()
    }

    /// Forwards a raw runtime event.
    pub fn runtime_event(&self, avatar: Avatar, payload: &serde_json::Value) {
        if self.is_disposed() {
            return;
        }
        self.bridge.on_runtime_event(avatar, payload);
    }

    /// Handles a pointer tap on an avatar. Returns `true` if the panel was
    /// opened.
    pub fn pointer_tap(&self, avatar: Avatar) -> bool {
        if self.is_disposed() {
            return false;
        }
        self.bridge.pointer_tap(avatar)
    }

    pub fn reconcile_notifications(&self, notifications: &[Notification]) {
        if self.is_disposed() {
            return;
        }
        self.reconciler.reconcile(notifications);
    }

    pub fn dismiss_notification(&self, id: &NotificationId) {
        self.reconciler.dismiss(id);
    }

    pub fn dismiss_welcome(&self) {
        self.reconciler.dismiss_welcome();
    }

    /// The arbiter, for collaborators that route their own errors.
    pub fn arbiter(&self) -> &Arc<Arbiter> {
        &self.arbiter
    }

    /// Number of asset loads started for an avatar.
    pub fn load_count(&self, avatar: Avatar) -> usize {
        self.lifecycle(avatar).load_count()
    }

    /// Releases both runtimes and stops every timer and sampler.
    pub fn dispose(&self) {
        {
            let mut phase = self.phase.lock().unwrap_or_else(|p| p.into_inner());
            if *phase == ContextPhase::Disposed {
                return;
            }
            *phase = ContextPhase::Disposed;
        }
        self.reconciler.dispose();
        self.bridge.dispose();
        self.arbiter.dispose();
        for lifecycle in &self.lifecycles {
            lifecycle.dispose();
        }
        log::info!("AvatarContext: disposed");
    }

    fn lifecycle(&self, avatar: Avatar) -> &Arc<Lifecycle> {
        &self.lifecycles[avatar.index()]
    }
}

impl Drop for AvatarContext {
    fn drop(&mut self) {
        self.dispose();
    }
}
