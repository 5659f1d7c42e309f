//! Per-avatar serialization of input writes.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::config::AvatarConfig;
use crate::lifecycle::Lifecycle;
use crate::lifecycle::Phase;
use crate::lifecycle::RuntimeHandle;
use crate::model::Avatar;
use crate::model::InputKind;
use crate::model::InputSet;
use crate::model::RequestKey;
use crate::model::Signal;
use crate::model::StateKind;
use crate::model::StateRequest;

/// Listening is orthogonal to the exclusive states, so it keeps its own
/// pending slot and never replaces or supersedes an exclusive request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Exclusive,
    Listening,
}

impl Channel {
    fn of(kind: StateKind) -> Self {
        if kind.is_exclusive() {
            Self::Exclusive
        } else {
            Self::Listening
        }
    }
}

/// Latest-wins mailbox: the request being serviced and at most one
/// waiting request per channel. A newer distinct request replaces the
/// waiting one of its channel.
#[derive(Default)]
struct Mailbox {
    in_flight: Option<RequestKey>,
    pending: VecDeque<StateRequest>,
    running: bool,
}

impl Mailbox {
    fn has_pending(&self, channel: Channel) -> bool {
        self.pending.iter().any(|p| Channel::of(p.kind) == channel)
    }
}

enum Readiness {
    Ready(Arc<RuntimeHandle>),
    Superseded,
    GaveUp,
    Cancelled,
}

/// Writes the requests of one logical avatar, one at a time.
pub(crate) struct Lane {
    avatar: Avatar,
    config: Arc<AvatarConfig>,
    lifecycle: Arc<Lifecycle>,
    mailbox: Mutex<Mailbox>,
    superseded: Notify,
    writes: AtomicUsize,
    revert: Mutex<Option<CancellationToken>>,
    parked: Mutex<Option<String>>,
    cancel: CancellationToken,
}

impl Lane {
    pub(crate) fn new(config: Arc<AvatarConfig>, lifecycle: Arc<Lifecycle>, cancel: CancellationToken) -> Self {
        Self {
            avatar: lifecycle.avatar(),
            config,
            lifecycle,
            mailbox: Mutex::new(Mailbox::default()),
            superseded: Notify::new(),
            writes: AtomicUsize::new(0),
            revert: Mutex::new(None),
            parked: Mutex::new(None),
            cancel,
        }
    }

    pub(crate) fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    pub(crate) fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub(crate) fn parked_text(&self) -> Option<String> {
        lock(&self.parked).clone()
    }

    /// Queues a request. Duplicates of a pending request are dropped; a
    /// duplicate of the in-flight request drops the newer waiting request
    /// of its channel instead, since the in-flight write already yields
    /// the requested state.
    pub(crate) fn offer(self: &Arc<Self>, request: StateRequest) {
        if self.cancel.is_cancelled() {
            return;
        }
        let key = request.key();
        let channel = Channel::of(request.kind);
        let mut mailbox = lock(&self.mailbox);
        if mailbox.pending.iter().any(|p| p.key() == key) {
            log::debug!("Lane({}): duplicate {} request dropped", self.avatar, request.kind);
            return;
        }
        if mailbox.in_flight.as_ref() == Some(&key) {
            let before = mailbox.pending.len();
            mailbox.pending.retain(|p| Channel::of(p.kind) != channel);
            if mailbox.pending.len() != before {
                log::debug!("Lane({}): waiting request dropped, {} already in flight", self.avatar, request.kind);
            } else {
                log::debug!("Lane({}): duplicate {} request dropped", self.avatar, request.kind);
            }
            return;
        }

        // An exclusive activation clears the error on its own write; a
        // pending revert must not take its place in the mailbox.
        if request.active && request.kind.is_exclusive() {
            self.cancel_revert();
        }

        if mailbox.running {
            match mailbox.pending.iter_mut().find(|p| Channel::of(p.kind) == channel) {
                Some(slot) => {
                    log::debug!("Lane({}): pending {} replaced by {}", self.avatar, slot.kind, request.kind);
                    *slot = request;
                }
                None => mailbox.pending.push_back(request),
            }
            drop(mailbox);
            self.superseded.notify_one();
            return;
        }
        mailbox.in_flight = Some(key);
        mailbox.running = true;
        drop(mailbox);

        let lane = Arc::clone(self);
        tokio::spawn(async move { lane.run(request).await });
    }

    /// Queues a request only when nothing is in flight.
    pub(crate) fn offer_if_idle(self: &Arc<Self>, request: StateRequest) {
        if lock(&self.mailbox).running {
            return;
        }
        self.offer(request);
    }

    /// Replays a parked message once the avatar is ready.
    pub(crate) fn replay_parked(self: &Arc<Self>) {
        let Some(text) = lock(&self.parked).take() else {
            return;
        };
        log::info!("Lane({}): replaying parked message", self.avatar);
        self.offer(StateRequest::activate(StateKind::Message).with_text(text).forced());
    }

    pub(crate) fn cancel_revert(&self) {
        if let Some(token) = lock(&self.revert).take() {
            token.cancel();
        }
    }

    async fn run(self: Arc<Self>, mut request: StateRequest) {
        loop {
            self.service(&request).await;

            let next = {
                let mut mailbox = lock(&self.mailbox);
                match mailbox.pending.pop_front() {
                    Some(next) if !self.cancel.is_cancelled() => {
                        mailbox.in_flight = Some(next.key());
                        Some(next)
                    }
                    _ => {
                        *mailbox = Mailbox::default();
                        None
                    }
                }
            };
            match next {
                Some(next) => request = next,
                None => return,
            }
        }
    }

    async fn service(self: &Arc<Self>, request: &StateRequest) {
        let handle = match self.await_ready(Channel::of(request.kind)).await {
            Readiness::Ready(handle) => handle,
            Readiness::Superseded => {
                log::debug!("Lane({}): {} request superseded while waiting", self.avatar, request.kind);
                return;
            }
            Readiness::GaveUp => {
                self.park(request);
                return;
            }
            Readiness::Cancelled => return,
        };

        self.apply(&handle, request);

        tokio::select! {
            _ = tokio::time::sleep(self.config.arbiter.settle_delay) => {}
            _ = self.cancel.cancelled() => {}
        }
    }

    /// Waits for a ready handle with resolved inputs.
    ///
    /// Attempts are only consumed by timeouts; phase changes and newer
    /// requests wake the wait early.
    async fn await_ready(&self, channel: Channel) -> Readiness {
        let backoff = self.config.arbiter.readiness(self.avatar);
        let mut phases = self.lifecycle.subscribe();
        let mut attempt = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Readiness::Cancelled;
            }
            if let Some(handle) = self.lifecycle.ready_handle()
                && handle.input_set().is_some()
            {
                return Readiness::Ready(handle);
            }
            if lock(&self.mailbox).has_pending(channel) {
                return Readiness::Superseded;
            }
            if self.avatar == Avatar::Button
                && (self.lifecycle.phase() == Phase::Failed || !self.lifecycle.is_hosted())
            {
                log::debug!("Lane({}): avatar unavailable, giving up", self.avatar);
                return Readiness::GaveUp;
            }
            if !backoff.allows(attempt) {
                log::warn!("Lane({}): not ready after {} attempts", self.avatar, attempt);
                return Readiness::GaveUp;
            }

            tokio::select! {
                _ = tokio::time::sleep(backoff.delay_for(attempt)) => attempt += 1,
                changed = phases.changed() => {
                    if changed.is_err() {
                        return Readiness::Cancelled;
                    }
                }
                _ = self.superseded.notified() => {}
                _ = self.cancel.cancelled() => {}
            }
        }
    }

    fn park(&self, request: &StateRequest) {
        if self.avatar != Avatar::Panel || request.kind != StateKind::Message || !request.active {
            return;
        }
        if let Some(text) = &request.text {
            log::info!("Lane({}): message parked until the avatar is ready", self.avatar);
            *lock(&self.parked) = Some(text.clone());
        }
    }

    fn apply(self: &Arc<Self>, handle: &RuntimeHandle, request: &StateRequest) {
        let Some(inputs) = handle.input_set() else {
            return;
        };
        self.writes.fetch_add(1, Ordering::SeqCst);
        log::debug!(
            "Lane({}): {} -> {} {:?}",
            self.avatar,
            request.kind,
            request.active,
            request.text
        );

        if request.active && request.kind.is_exclusive() {
            for other in StateKind::EXCLUSIVE {
                if other == request.kind || !self.read(handle, &inputs, other.signal()) {
                    continue;
                }
                self.write(handle, &inputs, other.signal(), false);
                if other == StateKind::Error {
                    self.cancel_revert();
                }
            }
        }

        if request.active {
            if let Some(text) = &request.text {
                self.write_text(handle, request.kind, text);
            }
        }

        self.write(handle, &inputs, request.kind.signal(), request.active);

        if request.kind.is_exclusive() {
            let any_active = StateKind::EXCLUSIVE
                .iter()
                .any(|kind| self.read(handle, &inputs, kind.signal()));
            self.write(handle, &inputs, Signal::Attention, !any_active);
        }

        if request.kind == StateKind::Error {
            self.cancel_revert();
            if request.active && request.text.is_some() {
                self.schedule_revert();
            }
        }
    }

    fn read(&self, handle: &RuntimeHandle, inputs: &InputSet, signal: Signal) -> bool {
        inputs
            .find(self.config.asset.inputs.for_signal(signal))
            .and_then(|input| handle.runtime().boolean_value(handle.machine(), &input.name))
            .unwrap_or(false)
    }

    fn write(&self, handle: &RuntimeHandle, inputs: &InputSet, signal: Signal, value: bool) {
        let Some(input) = inputs.find(self.config.asset.inputs.for_signal(signal)) else {
            log::debug!("Lane({}): no input for {:?}", self.avatar, signal);
            return;
        };
        let result = match input.kind {
            InputKind::Boolean => handle.runtime().set_boolean(handle.machine(), &input.name, value),
            InputKind::Trigger if value => handle.runtime().fire_trigger(handle.machine(), &input.name),
            InputKind::Trigger => Ok(()),
        };
        if let Err(e) = result {
            log::warn!("Lane({}): {}", self.avatar, e);
        }
    }

    fn write_text(&self, handle: &RuntimeHandle, kind: StateKind, text: &str) {
        let candidates = self.config.asset.text_slots.for_kind(kind);
        let written = candidates
            .iter()
            .any(|name| handle.runtime().set_text_run_value(name, text).is_ok());
        if !written && !candidates.is_empty() {
            log::warn!("Lane({}): no text run accepted the {} text", self.avatar, kind);
        }
    }

    fn schedule_revert(self: &Arc<Self>) {
        let token = self.cancel.child_token();
        *lock(&self.revert) = Some(token.clone());
        let lane = Arc::clone(self);
        let delay = self.config.arbiter.error_revert_after;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    log::debug!("Lane({}): reverting error", lane.avatar);
                    lane.offer(StateRequest::deactivate(StateKind::Error).forced());
                }
                _ = token.cancelled() => {}
            }
        });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}
