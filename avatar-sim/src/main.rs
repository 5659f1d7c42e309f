//! Scripted walkthrough of the avatar engine against the in-memory engine
//! and page.

use std::fs::File;
use std::sync::Arc;
use std::time::Duration;

use avatar_sync::AvatarContext;
use avatar_sync::config::AvatarConfig;
use avatar_sync::engine::memory::InMemoryEngine;
use avatar_sync::host::memory::InMemoryHost;
use avatar_sync::host::memory::RecordingOpener;
use avatar_sync::model::AuthContext;
use avatar_sync::model::Avatar;
use avatar_sync::model::Notification;
use avatar_sync::model::SlotId;
use avatar_sync::model::StateKind;
use avatar_sync::model::StateRequest;
use serde_json::json;
use simplelog::ColorChoice;
use simplelog::CombinedLogger;
use simplelog::Config;
use simplelog::LevelFilter;
use simplelog::TermLogger;
use simplelog::TerminalMode;
use simplelog::WriteLogger;

fn print_state(label: &str, context: &AvatarContext) {
    for avatar in Avatar::ALL {
        match context.current_state(avatar) {
            Some(state) => println!(
                "{:<28} {:<6} {:?}{}",
                label,
                avatar.to_string(),
                state.exclusive,
                if state.listening { " (listening)" } else { "" }
            ),
            None => println!("{:<28} {:<6} {:?}", label, avatar.to_string(), context.avatar_phase(avatar)),
        }
    }
}

async fn sign_in_page() {
    println!("== sign-in page ==");
    let engine = InMemoryEngine::new();
    let host = InMemoryHost::with_all_slots();
    let context = AvatarContext::new(
        AvatarConfig::new(AuthContext::Unauthenticated),
        Arc::new(engine.clone()),
        Arc::new(host.clone()),
        Arc::new(RecordingOpener::new()),
    );

    context.start().await;
    tokio::time::sleep(Duration::from_secs(2)).await;
    print_state("ready", &context);

    context.reconcile_notifications(&[Notification::flash("login", "danger", "Credenciales incorrectas")]);
    tokio::time::sleep(Duration::from_millis(100)).await;
    print_state("login failure", &context);

    tokio::time::sleep(Duration::from_secs(5)).await;
    print_state("after revert", &context);

    context.dispose();
}

async fn workspace_page() {
    println!("== workspace page ==");
    let engine = InMemoryEngine::new();
    let host = InMemoryHost::with_all_slots();
    let opener = RecordingOpener::new();
    let context = AvatarContext::new(
        AvatarConfig::new(AuthContext::Authenticated),
        Arc::new(engine.clone()),
        Arc::new(host.clone()),
        Arc::new(opener.clone()),
    );

    context.start().await;
    context.reconcile_notifications(&[Notification::welcome("welcome", "¡Hola de nuevo!")]);
    tokio::time::sleep(Duration::from_secs(2)).await;
    print_state("welcome", &context);

    context.dismiss_welcome();
    tokio::time::sleep(Duration::from_secs(2)).await;
    print_state("welcome dismissed", &context);

    if let Some(runtime) = engine.latest(SlotId::Button) {
        runtime.emit(&json!({"data": {"name": "AbrirPanel"}}));
        runtime.emit(&json!({"data": {"name": "AbrirPanel"}}));
    }
    println!("{:<28} {}", "open-panel calls", opener.calls());
    context.set_panel_open(true);

    context.request_state(StateRequest::activate(StateKind::Message).with_text("Protocolo guardado"));
    context.request_state(StateRequest::activate(StateKind::Error).with_text("No se pudo guardar"));
    tokio::time::sleep(Duration::from_secs(2)).await;
    print_state("error while panel open", &context);

    tokio::time::sleep(Duration::from_secs(5)).await;
    print_state("error reverted", &context);

    host.navigate();
    for avatar in Avatar::ALL {
        let outcome = context.initialize(avatar).await;
        println!("{:<28} {:<6} {:?}", "navigation", avatar.to_string(), outcome);
    }
    println!(
        "{:<28} {} / {}",
        "asset loads (button/panel)",
        context.load_count(Avatar::Button),
        context.load_count(Avatar::Panel)
    );

    context.dispose();
}

#[tokio::main]
async fn main() {
    let log_file = File::create("avatar-sim.log").expect("Failed to create log file");
    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Debug, Config::default(), log_file),
    ])
    .expect("Failed to initialize logger");

    log::info!("Simulator: running scripted pages");
    sign_in_page().await;
    workspace_page().await;
}
