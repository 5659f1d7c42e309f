//! Logical avatars, visual slots and hosting surfaces

use std::fmt;

/// One of the two independent avatar presentations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Avatar {
    /// The floating button in the page corner.
    Button,
    /// The avatar shown inside the chat panel.
    Panel,
}

impl Avatar {
    /// Both avatars, button first.
    pub const ALL: [Avatar; 2] = [Avatar::Button, Avatar::Panel];

    /// Slots that may host this avatar, in fallback order.
    pub fn slots(self) -> &'static [SlotId] {
        match self {
            Self::Button => &[SlotId::Button],
            Self::Panel => &[SlotId::PanelChat, SlotId::PanelMessages],
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Button => 0,
            Self::Panel => 1,
        }
    }
}

impl fmt::Display for Avatar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Button => f.write_str("button"),
            Self::Panel => f.write_str("panel"),
        }
    }
}

/// Identifies a hosting surface on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotId {
    Button,
    PanelChat,
    PanelMessages,
}

impl SlotId {
    /// The logical avatar this slot belongs to.
    pub fn avatar(self) -> Avatar {
        match self {
            Self::Button => Avatar::Button,
            Self::PanelChat | Self::PanelMessages => Avatar::Panel,
        }
    }
}

/// Tabs of the chat panel. Each tab carries its own avatar surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelTab {
    Chat,
    Messages,
}

impl PanelTab {
    /// The slot rendered inside this tab.
    pub fn slot(self) -> SlotId {
        match self {
            Self::Chat => SlotId::PanelChat,
            Self::Messages => SlotId::PanelMessages,
        }
    }
}

/// Identity of a hosting element. A navigation that replaces the element
/// yields a new id even when the slot stays the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

/// A concrete hosting element for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceRef {
    pub slot: SlotId,
    pub element: ElementId,
}

impl SurfaceRef {
    pub fn new(slot: SlotId, element: ElementId) -> Self {
        Self { slot, element }
    }

    /// Returns `true` if both refs point at the same element.
    pub fn same_element(&self, other: &SurfaceRef) -> bool {
        self.element == other.element
    }
}

/// A slot together with the asset it should display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisualSlot {
    pub slot_id: SlotId,
    pub asset_path: String,
}

/// Whether the page belongs to a signed-in session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthContext {
    #[default]
    Unauthenticated,
    Authenticated,
}

impl AuthContext {
    pub fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated)
    }
}

impl From<bool> for AuthContext {
    fn from(authenticated: bool) -> Self {
        if authenticated {
            Self::Authenticated
        } else {
            Self::Unauthenticated
        }
    }
}

/// Display size applied to a hosting surface once the asset is loaded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceGeometry {
    /// CSS width in pixels.
    pub width: f32,
    /// CSS height in pixels.
    pub height: f32,
    /// Upper bound applied to both dimensions.
    pub max_size: f32,
    /// Backing store size, when the artboard size is known.
    pub backing: Option<(f32, f32)>,
}

impl SurfaceGeometry {
    /// Fits an artboard into a square of `max_size`, preserving its aspect
    /// ratio. Without a usable artboard size the full square is used.
    pub fn fit(artboard: Option<(f32, f32)>, max_size: f32) -> Self {
        match artboard {
            Some((w, h)) if w > 0.0 && h > 0.0 => {
                let aspect = w / h;
                let (width, height) = if aspect > 1.0 {
                    (max_size, max_size / aspect)
                } else {
                    (max_size * aspect, max_size)
                };
                Self {
                    width,
                    height,
                    max_size,
                    backing: Some((w, h)),
                }
            }
            _ => Self::square(max_size),
        }
    }

    /// A fixed square of the given size.
    pub fn square(size: f32) -> Self {
        Self {
            width: size,
            height: size,
            max_size: size,
            backing: None,
        }
    }
}
