//! Transient page notifications observed by the reconciler

/// Stable identity of a notification element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NotificationId(pub String);

impl NotificationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// What kind of notification was observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    /// The dashboard greeting shown after sign-in.
    Welcome,
    /// A generic flash message with its category (`info`, `danger`, ...).
    Flash { category: String },
}

/// One notification as seen during a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub text: String,
    pub visible: bool,
}

impl Notification {
    pub fn welcome(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: NotificationId::new(id),
            kind: NotificationKind::Welcome,
            text: text.into(),
            visible: true,
        }
    }

    pub fn flash(id: impl Into<String>, category: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: NotificationId::new(id),
            kind: NotificationKind::Flash {
                category: category.into(),
            },
            text: text.into(),
            visible: true,
        }
    }

    /// Returns the same notification marked hidden.
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn is_welcome(&self) -> bool {
        matches!(self.kind, NotificationKind::Welcome)
    }
}
