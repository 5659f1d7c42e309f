//! End-to-end behaviour of the avatar context against the in-memory engine.

use std::sync::Arc;
use std::time::Duration;

use avatar_sync::AvatarContext;
use avatar_sync::config::AvatarConfig;
use avatar_sync::config::DEFAULT_STATE_MACHINE;
use avatar_sync::engine::AnimationRuntime;
use avatar_sync::engine::memory::InMemoryEngine;
use avatar_sync::engine::memory::InMemoryRuntime;
use avatar_sync::host::memory::InMemoryHost;
use avatar_sync::host::memory::RecordingOpener;
use avatar_sync::lifecycle::InitOutcome;
use avatar_sync::model::AuthContext;
use avatar_sync::model::Avatar;
use avatar_sync::model::SemanticState;
use avatar_sync::model::SlotId;
use avatar_sync::model::StateKind;
use avatar_sync::model::StateRequest;
use serde_json::json;

struct Page {
    context: AvatarContext,
    engine: InMemoryEngine,
    host: InMemoryHost,
    opener: RecordingOpener,
}

impl Page {
    fn new(auth: AuthContext) -> Self {
        let engine = InMemoryEngine::new();
        let host = InMemoryHost::with_all_slots();
        let opener = RecordingOpener::new();
        let context = AvatarContext::new(
            AvatarConfig::new(auth),
            Arc::new(engine.clone()),
            Arc::new(host.clone()),
            Arc::new(opener.clone()),
        );
        Self {
            context,
            engine,
            host,
            opener,
        }
    }

    /// Starts the page and waits until the resting state has settled.
    async fn started(auth: AuthContext) -> Self {
        let page = Self::new(auth);
        page.context.start().await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        page
    }

    fn runtime(&self, slot: SlotId) -> Arc<InMemoryRuntime> {
        self.engine.latest(slot).unwrap()
    }
}

fn input(runtime: &InMemoryRuntime, name: &str) -> Option<bool> {
    runtime.boolean_value(DEFAULT_STATE_MACHINE, name)
}

#[tokio::test(start_paused = true)]
async fn test_exclusive_inputs_never_overlap() {
    let page = Page::started(AuthContext::Authenticated).await;
    let kinds = [
        StateKind::Message,
        StateKind::Error,
        StateKind::NoPermission,
        StateKind::Listening,
    ];

    for step in 0..40u64 {
        let kind = kinds[(step * 7 % 4) as usize];
        let request = if step % 5 == 3 {
            StateRequest::deactivate(kind)
        } else {
            StateRequest::activate(kind).with_text(format!("paso {}", step))
        };
        page.context.request_state(request);
        tokio::time::sleep(Duration::from_millis(step % 3 * 700)).await;
    }
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(page.engine.exclusive_violations(), 0);
    for slot in [SlotId::Button, SlotId::PanelChat] {
        let runtime = page.runtime(slot);
        let active = ["Mensaje", "Sin_Permiso", "ERROR"]
            .iter()
            .filter(|name| input(&runtime, name) == Some(true))
            .count();
        assert!(active <= 1);
        assert_eq!(input(&runtime, "atencion"), Some(active == 0));
    }
}

#[tokio::test(start_paused = true)]
async fn test_immediate_double_initialize_loads_once() {
    let page = Page::new(AuthContext::Authenticated);
    let (first, second) = tokio::join!(
        page.context.initialize(Avatar::Button),
        page.context.initialize(Avatar::Button)
    );
    assert!(matches!(first, InitOutcome::Started(_)));
    assert!(matches!(second, InitOutcome::InProgress));
    assert_eq!(page.context.load_count(Avatar::Button), 1);
    assert_eq!(page.engine.created(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_request_writes_once() {
    let page = Page::started(AuthContext::Authenticated).await;
    let runtime = page.runtime(SlotId::Button);
    let before = page.context.arbiter().writes(Avatar::Button);

    page.context
        .request_state(StateRequest::activate(StateKind::Message).with_text("Hello"));
    page.context
        .request_state(StateRequest::activate(StateKind::Message).with_text("Hello"));
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(page.context.arbiter().writes(Avatar::Button) - before, 1);
    assert_eq!(runtime.writes_to("Mensaje"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_open_panel_cooldown() {
    let page = Page::started(AuthContext::Authenticated).await;

    page.context.runtime_event(Avatar::Button, &json!({"name": "AbrirPanel"}));
    tokio::time::sleep(Duration::from_millis(500)).await;
    page.context.runtime_event(Avatar::Panel, &json!({"name": "AbrirPanel"}));

    assert_eq!(page.opener.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_error_reverts_after_five_seconds() {
    let page = Page::started(AuthContext::Authenticated).await;
    page.context
        .request_state(StateRequest::activate(StateKind::Error).with_text("X"));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        page.context.current_state(Avatar::Button).map(|s| s.exclusive),
        Some(SemanticState::Error)
    );

    tokio::time::sleep(Duration::from_millis(5000)).await;
    assert_eq!(input(&page.runtime(SlotId::Button), "ERROR"), Some(false));
    assert_eq!(input(&page.runtime(SlotId::PanelChat), "ERROR"), Some(false));
}

#[tokio::test(start_paused = true)]
async fn test_open_panel_suppresses_foreign_messages() {
    let page = Page::started(AuthContext::Authenticated).await;
    page.context.set_panel_open(true);
    let button = page.runtime(SlotId::Button);
    let panel = page.runtime(SlotId::PanelChat);
    let (button_before, panel_before) = (button.writes(), panel.writes());

    page.context
        .request_state(StateRequest::activate(StateKind::Message).with_text("Y"));
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(button.writes(), button_before);
    assert_eq!(panel.writes(), panel_before);
    assert_eq!(button.text("Texto_mensaje"), None);
}

#[tokio::test(start_paused = true)]
async fn test_sign_in_failure_shows_no_permission() {
    let page = Page::new(AuthContext::Unauthenticated);
    page.context.start().await;
    page.context.request_state(
        StateRequest::activate(StateKind::NoPermission).with_text("Credenciales incorrectas"),
    );
    tokio::time::sleep(Duration::from_secs(4)).await;

    for slot in [SlotId::Button, SlotId::PanelChat] {
        let runtime = page.runtime(slot);
        assert_eq!(input(&runtime, "Sin_Permiso"), Some(true));
        assert_eq!(input(&runtime, "Mensaje"), Some(false));
        assert_eq!(input(&runtime, "ERROR"), Some(false));
        assert_eq!(runtime.text("Texto_mensaje").as_deref(), Some("Credenciales incorrectas"));
    }

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(input(&page.runtime(SlotId::Button), "Sin_Permiso"), Some(true));
}

#[tokio::test(start_paused = true)]
async fn test_navigation_reuses_or_rebinds() {
    let page = Page::started(AuthContext::Authenticated).await;
    let first = page.runtime(SlotId::Button);

    assert!(matches!(page.context.initialize(Avatar::Button).await, InitOutcome::Reused));
    assert_eq!(page.context.load_count(Avatar::Button), 1);

    page.host.navigate();
    assert!(matches!(page.context.initialize(Avatar::Button).await, InitOutcome::Started(_)));
    assert_eq!(page.context.load_count(Avatar::Button), 2);
    assert_eq!(first.release_count(), 1);
    assert_eq!(page.runtime(SlotId::Button).release_count(), 0);
}
