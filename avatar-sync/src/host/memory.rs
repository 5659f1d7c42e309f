//! In-memory surface host

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use super::PanelOpener;
use super::SurfaceHost;
use crate::model::Avatar;
use crate::model::ElementId;
use crate::model::PanelTab;
use crate::model::SlotId;
use crate::model::SurfaceGeometry;
use crate::model::SurfaceRef;

/// A simulated page.
///
/// Slots are mounted with fresh element ids; [`navigate`](Self::navigate)
/// remounts every present slot with new ids as a full page load would.
#[derive(Clone, Default)]
pub struct InMemoryHost {
    inner: Arc<HostInner>,
}

#[derive(Default)]
struct HostInner {
    next_element: AtomicU64,
    state: Mutex<HostState>,
}

#[derive(Default)]
struct HostState {
    mounted: HashMap<SlotId, ElementId>,
    active_tab: Option<PanelTab>,
    geometry: HashMap<ElementId, SurfaceGeometry>,
    visible: HashMap<ElementId, bool>,
    fallbacks: Vec<Avatar>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// A page with the button and both panel slots mounted, chat tab active.
    pub fn with_all_slots() -> Self {
        let host = Self::new();
        host.mount(SlotId::Button);
        host.mount(SlotId::PanelChat);
        host.mount(SlotId::PanelMessages);
        host.set_active_tab(Some(PanelTab::Chat));
        host
    }

    /// Mounts a slot on a new element and returns its reference.
    pub fn mount(&self, slot: SlotId) -> SurfaceRef {
        let element = ElementId(self.inner.next_element.fetch_add(1, Ordering::SeqCst) + 1);
        lock(&self.inner.state).mounted.insert(slot, element);
        SurfaceRef::new(slot, element)
    }

    pub fn unmount(&self, slot: SlotId) {
        lock(&self.inner.state).mounted.remove(&slot);
    }

    /// Replaces every mounted element.
    pub fn navigate(&self) {
        let slots: Vec<SlotId> = lock(&self.inner.state).mounted.keys().copied().collect();
        for slot in slots {
            self.mount(slot);
        }
    }

    pub fn set_active_tab(&self, tab: Option<PanelTab>) {
        lock(&self.inner.state).active_tab = tab;
    }

    pub fn geometry_of(&self, surface: SurfaceRef) -> Option<SurfaceGeometry> {
        lock(&self.inner.state).geometry.get(&surface.element).copied()
    }

    pub fn is_visible(&self, surface: SurfaceRef) -> bool {
        lock(&self.inner.state)
            .visible
            .get(&surface.element)
            .copied()
            .unwrap_or(true)
    }

    /// Avatars that were replaced with their fallback, in order.
    pub fn fallbacks(&self) -> Vec<Avatar> {
        lock(&self.inner.state).fallbacks.clone()
    }
}

impl SurfaceHost for InMemoryHost {
    fn locate(&self, slot: SlotId) -> Option<SurfaceRef> {
        lock(&self.inner.state)
            .mounted
            .get(&slot)
            .map(|element| SurfaceRef::new(slot, *element))
    }

    fn active_tab(&self) -> Option<PanelTab> {
        lock(&self.inner.state).active_tab
    }

    fn apply_geometry(&self, surface: SurfaceRef, geometry: SurfaceGeometry) {
        lock(&self.inner.state).geometry.insert(surface.element, geometry);
    }

    fn set_visible(&self, surface: SurfaceRef, visible: bool) {
        lock(&self.inner.state).visible.insert(surface.element, visible);
    }

    fn show_fallback(&self, avatar: Avatar) {
        lock(&self.inner.state).fallbacks.push(avatar);
    }
}

/// Panel opener that counts invocations.
#[derive(Clone, Default)]
pub struct RecordingOpener {
    calls: Arc<AtomicUsize>,
}

impl RecordingOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PanelOpener for RecordingOpener {
    fn open_panel(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
