//! Hosting surfaces
//!
//! The page that hosts the avatars is an external collaborator. The core
//! only asks it where a slot lives, which panel tab is active, and tells it
//! how to size, show or replace a surface.

pub mod memory;

use crate::model::Avatar;
use crate::model::PanelTab;
use crate::model::SlotId;
use crate::model::SurfaceGeometry;
use crate::model::SurfaceRef;

/// Access to the elements that host animation runtimes.
pub trait SurfaceHost: Send + Sync {
    /// The element currently hosting `slot`, if present.
    fn locate(&self, slot: SlotId) -> Option<SurfaceRef>;

    /// The panel tab currently shown, if the panel is rendered.
    fn active_tab(&self) -> Option<PanelTab>;

    /// Applies display and backing size to a surface.
    fn apply_geometry(&self, surface: SurfaceRef, geometry: SurfaceGeometry);

    /// Shows or hides a surface.
    fn set_visible(&self, surface: SurfaceRef, visible: bool);

    /// Replaces the avatar with its static fallback image.
    fn show_fallback(&self, avatar: Avatar);
}

/// Callback that opens the chat panel.
pub trait PanelOpener: Send + Sync {
    fn open_panel(&self);
}

impl<F> PanelOpener for F
where
    F: Fn() + Send + Sync,
{
    fn open_panel(&self) {
        self()
    }
}
