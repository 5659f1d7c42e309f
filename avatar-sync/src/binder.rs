//! Resource binding
//!
//! Decides which hosting surface and which asset a logical avatar uses, and
//! whether an existing runtime can be reused. Pure: nothing here mutates the
//! host or the engine.

use crate::config::AssetProfile;
use crate::host::SurfaceHost;
use crate::model::AuthContext;
use crate::model::Avatar;
use crate::model::PanelTab;
use crate::model::SlotId;
use crate::model::SurfaceRef;
use crate::model::VisualSlot;

/// A slot resolved to a concrete element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub slot: VisualSlot,
    pub surface: SurfaceRef,
}

/// What to do with a previously bound runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindDecision {
    /// Nothing bound yet.
    Bind,
    /// Same element as before; keep the runtime.
    Reuse,
    /// The element changed; release the old runtime and create a new one.
    Rebind,
}

/// Resolves the slot hosting `avatar` on the current page.
///
/// The panel prefers the slot of the active tab and falls back to any
/// present panel slot, chat first.
pub fn resolve_slot(
    host: &dyn SurfaceHost,
    asset: &AssetProfile,
    avatar: Avatar,
    auth: AuthContext,
) -> Option<Binding> {
    let surface = match avatar {
        Avatar::Button => host.locate(SlotId::Button),
        Avatar::Panel => host
            .active_tab()
            .map(PanelTab::slot)
            .and_then(|slot| host.locate(slot))
            .or_else(|| avatar.slots().iter().find_map(|slot| host.locate(*slot))),
    }?;

    Some(Binding {
        slot: VisualSlot {
            slot_id: surface.slot,
            asset_path: asset.path_for(auth).to_string(),
        },
        surface,
    })
}

/// Compares a previous surface with a new binding.
pub fn decide(previous: Option<SurfaceRef>, binding: &Binding) -> BindDecision {
    match previous {
        None => BindDecision::Bind,
        Some(prev) if prev.same_element(&binding.surface) => BindDecision::Reuse,
        Some(_) => BindDecision::Rebind,
    }
}
