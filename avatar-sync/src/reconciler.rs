//! Flash-message reconciliation
//!
//! Maps transient page notifications onto avatar states. Each distinct
//! flash text is shown at most once; the state is reverted when the
//! notification is dismissed or after a timeout.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use dashmap::DashSet;
use tokio_util::sync::CancellationToken;

use crate::arbiter::Arbiter;
use crate::config::AvatarConfig;
use crate::model::Notification;
use crate::model::NotificationId;
use crate::model::NotificationKind;
use crate::model::StateKind;
use crate::model::StateRequest;

struct Mapped {
    kind: StateKind,
    revert: CancellationToken,
}

/// Turns observed notifications into arbiter requests.
pub struct Reconciler {
    config: Arc<AvatarConfig>,
    arbiter: Arc<Arbiter>,
    processed: DashSet<String>,
    mapped: DashMap<NotificationId, Mapped>,
    welcome: Mutex<Option<NotificationId>>,
    running: AtomicBool,
    cancel: CancellationToken,
}

impl Reconciler {
    pub fn new(config: Arc<AvatarConfig>, arbiter: Arc<Arbiter>) -> Self {
        Self {
            config,
            arbiter,
            processed: DashSet::new(),
            mapped: DashMap::new(),
            welcome: Mutex::new(None),
            running: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    /// Runs one pass over the notifications currently on the page.
    ///
    /// A pass that starts while another is running does nothing. The whole
    /// pass is skipped while the panel is open.
    pub fn reconcile(self: &Arc<Self>, notifications: &[Notification]) {
        if self.cancel.is_cancelled() || self.arbiter.is_panel_open() {
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            log::debug!("Reconciler: pass already running");
            return;
        }

        self.reconcile_welcome(notifications);
        self.observe_dismissals(notifications);
        for notification in notifications.iter().filter(|n| n.visible) {
            if let NotificationKind::Flash { category } = &notification.kind {
                self.map_flash(notification, category);
            }
        }

        self.running.store(false, Ordering::SeqCst);
    }

    /// Reverts a notification the user closed.
    pub fn dismiss(&self, id: &NotificationId) {
        if self.welcome_id().as_ref() == Some(id) {
            self.dismiss_welcome();
            return;
        }
        self.revert(id);
    }

    /// Reverts the welcome message and allows it to be shown again.
    pub fn dismiss_welcome(&self) {
        let previous = self.welcome.lock().unwrap_or_else(|p| p.into_inner()).take();
        if previous.is_some() {
            log::debug!("Reconciler: welcome dismissed");
            self.arbiter
                .request(StateRequest::deactivate(StateKind::Message).forced());
        }
    }

    /// Returns `true` if this text was already handled.
    pub fn is_processed(&self, text: &str) -> bool {
        self.processed.contains(text.trim())
    }

    /// Cancels every pending revert.
    pub fn dispose(&self) {
        self.cancel.cancel();
        self.mapped.clear();
    }

    fn reconcile_welcome(&self, notifications: &[Notification]) {
        if let Some(id) = self.welcome_id() {
            let still_visible = notifications.iter().any(|n| n.id == id && n.visible);
            if !still_visible {
                self.dismiss_welcome();
            }
            return;
        }

        let Some(welcome) = notifications.iter().find(|n| n.is_welcome() && n.visible) else {
            return;
        };
        let text = if welcome.text.trim().is_empty() {
            self.config.reconciler.welcome_fallback.clone()
        } else {
            welcome.text.trim().to_string()
        };
        log::info!("Reconciler: showing welcome message");
        *self.welcome.lock().unwrap_or_else(|p| p.into_inner()) = Some(welcome.id.clone());
        self.arbiter
            .request(StateRequest::activate(StateKind::Message).with_text(text).forced());
    }

    fn observe_dismissals(&self, notifications: &[Notification]) {
        let dismissed: Vec<NotificationId> = self
            .mapped
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|id| !notifications.iter().any(|n| &n.id == id && n.visible))
            .collect();
        for id in dismissed {
            self.revert(&id);
        }
    }

    fn map_flash(self: &Arc<Self>, notification: &Notification, category: &str) {
        let text = notification.text.trim();
        if text.is_empty() || !self.processed.insert(text.to_string()) {
            return;
        }

        let kind = if self.config.auth.is_authenticated() {
            StateKind::Message
        } else if self.is_login_failure(text) {
            StateKind::NoPermission
        } else {
            log::debug!("Reconciler: '{}' flash not shown on this page", category);
            return;
        };

        log::info!("Reconciler: mapping '{}' flash to {}", category, kind);
        let revert = self.cancel.child_token();
        self.mapped.insert(
            notification.id.clone(),
            Mapped {
                kind,
                revert: revert.clone(),
            },
        );
        self.arbiter.request(StateRequest::activate(kind).with_text(text));

        let reconciler = Arc::clone(self);
        let id = notification.id.clone();
        let delay = self.config.reconciler.revert_after;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => reconciler.revert(&id),
                _ = revert.cancelled() => {}
            }
        });
    }

    fn is_login_failure(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.config
            .reconciler
            .login_failure_keywords
            .iter()
            .any(|keyword| text.contains(&keyword.to_lowercase()))
    }

    fn revert(&self, id: &NotificationId) {
        let Some((_, mapped)) = self.mapped.remove(id) else {
            return;
        };
        mapped.revert.cancel();
        log::debug!("Reconciler: reverting {}", mapped.kind);
        self.arbiter
            .request(StateRequest::deactivate(mapped.kind).forced());
    }

    fn welcome_id(&self) -> Option<NotificationId> {
        self.welcome.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}
