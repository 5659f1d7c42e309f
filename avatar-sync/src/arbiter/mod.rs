//! State arbitration
//!
//! The [`Arbiter`] is the only component that writes runtime inputs. Every
//! request is offered to the lane of each logical avatar; a lane writes one
//! request at a time, drops duplicates, keeps only the newest waiting
//! request and waits for its avatar to become ready before writing.

mod lane;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use tokio_util::sync::CancellationToken;

use self::lane::Lane;
use crate::config::AvatarConfig;
use crate::lifecycle::Lifecycle;
use crate::lifecycle::Phase;
use crate::model::Avatar;
use crate::model::AvatarState;
use crate::model::SemanticState;
use crate::model::Signal;
use crate::model::StateKind;
use crate::model::StateRequest;

/// Single writer of semantic state into both avatars.
///
/// Requests are fire-and-forget and must be issued from within a tokio
/// runtime.
pub struct Arbiter {
    config: Arc<AvatarConfig>,
    lanes: [Arc<Lane>; 2],
    panel_open: AtomicBool,
    cancel: CancellationToken,
}

impl Arbiter {
    /// Creates an arbiter writing through the given lifecycles.
    pub fn new(config: Arc<AvatarConfig>, button: Arc<Lifecycle>, panel: Arc<Lifecycle>) -> Self {
        let cancel = CancellationToken::new();
        let lanes = [
            Arc::new(Lane::new(config.clone(), button, cancel.child_token())),
            Arc::new(Lane::new(config.clone(), panel, cancel.child_token())),
        ];
        Self {
            config,
            lanes,
            panel_open: AtomicBool::new(false),
            cancel,
        }
    }

    /// Requests a semantic state on both avatars.
    ///
    /// While the panel is open, a non-forced message activation whose
    /// text is not one of the panel's own messages is dropped.
    pub fn request(&self, request: StateRequest) {
        if self.cancel.is_cancelled() {
            return;
        }
        if self.is_suppressed(&request) {
            log::debug!("Arbiter: message suppressed while the panel is open: {:?}", request.text);
            return;
        }
        for lane in &self.lanes {
            lane.offer(request.clone());
        }
    }

    // Message deactivations are never suppressed: a message shown before
    // the panel opened must still be clearable while it is open.
    fn is_suppressed(&self, request: &StateRequest) -> bool {
        self.is_panel_open()
            && !request.force
            && request.active
            && request.kind == StateKind::Message
            && !request
                .text
                .as_deref()
                .is_some_and(|text| self.config.arbiter.is_panel_message(text))
    }

    pub fn set_panel_open(&self, open: bool) {
        self.panel_open.store(open, Ordering::SeqCst);
    }

    pub fn is_panel_open(&self) -> bool {
        self.panel_open.load(Ordering::SeqCst)
    }

    /// Notifies the arbiter that `avatar` just became ready.
    ///
    /// An idle avatar is put into its resting state for the page, then a
    /// parked message, if any, is replayed.
    pub fn runtime_ready(&self, avatar: Avatar) {
        let lane = self.lane(avatar);
        let resting = if self.config.auth.is_authenticated() {
            StateKind::NoPermission
        } else {
            StateKind::Message
        };
        lane.offer_if_idle(StateRequest::deactivate(resting).forced());
        lane.replay_parked();
    }

    /// Message text waiting for the avatar to become ready.
    pub fn parked_text(&self, avatar: Avatar) -> Option<String> {
        self.lane(avatar).parked_text()
    }

    /// Number of requests written to the avatar's runtime.
    pub fn writes(&self, avatar: Avatar) -> usize {
        self.lane(avatar).writes()
    }

    /// Reads the semantic state currently shown by an avatar.
    pub fn current_state(&self, avatar: Avatar) -> Option<AvatarState> {
        let handle = self.lane(avatar).lifecycle().ready_handle()?;
        let aliases = &self.config.asset.inputs;
        handle.input_set()?;

        let exclusive = StateKind::EXCLUSIVE
            .into_iter()
            .find(|kind| handle.read(aliases.for_signal(kind.signal())) == Some(true))
            .map(SemanticState::from)
            .unwrap_or_default();
        let listening = handle.read(aliases.for_signal(Signal::Listening)).unwrap_or(false);
        Some(AvatarState { exclusive, listening })
    }

    /// Returns `true` if at least one avatar can still display a state.
    pub fn can_display(&self) -> bool {
        self.lanes.iter().any(|lane| {
            let lifecycle = lane.lifecycle();
            lifecycle.phase() != Phase::Failed && lifecycle.is_hosted()
        })
    }

    /// Stops all lanes and pending reverts.
    pub fn dispose(&self) {
        for lane in &self.lanes {
            lane.cancel_revert();
        }
        self.cancel.cancel();
    }

    fn lane(&self, avatar: Avatar) -> &Arc<Lane> {
        &self.lanes[avatar.index()]
    }
}
