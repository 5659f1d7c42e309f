//! Chat send flow with avatar feedback.

use std::sync::Arc;
use std::sync::Mutex;

use super::client::AssistantClient;
use super::models::ChatRequest;
use super::models::HistoryEntry;
use super::models::ImageAttachment;
use crate::arbiter::Arbiter;
use crate::model::StateKind;
use crate::model::StateRequest;

const MIN_MESSAGE_CHARS: usize = 2;
const VALIDATION_MESSAGE: &str = "El mensaje debe tener al menos 2 caracteres o incluir al menos una imagen";
const DEFAULT_FAILURE: &str = "No se pudo procesar el mensaje";
const UNAVAILABLE_SUFFIX: &str = "El asistente inteligente no está disponible en este momento.";

/// Result of sending one chat message.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatOutcome {
    /// The assistant answered.
    Replied {
        reply: String,
        actions: Vec<serde_json::Value>,
        intent: Option<String>,
        assistant_available: Option<bool>,
    },
    /// The call failed; `transcript` is the line to append to the chat.
    Failed {
        transcript: String,
        assistant_available: Option<bool>,
    },
    /// The message was not sent. `alert` is set when no avatar can show
    /// the reason and the page should fall back to a plain alert.
    Rejected { reason: String, alert: bool },
}

/// Sends chat messages and reflects their progress on the avatars.
pub struct ChatController {
    client: AssistantClient,
    arbiter: Arc<Arbiter>,
    protocol_id: Option<i64>,
    study_type: String,
    history_ids: Mutex<Vec<i64>>,
}

impl ChatController {
    pub fn new(client: AssistantClient, arbiter: Arc<Arbiter>) -> Self {
        Self {
            client,
            arbiter,
            protocol_id: None,
            study_type: String::new(),
            history_ids: Mutex::new(Vec::new()),
        }
    }

    /// Scopes the conversation to a protocol.
    pub fn with_protocol(mut self, protocol_id: i64) -> Self {
        self.protocol_id = Some(protocol_id);
        self
    }

    pub fn with_study_type(mut self, study_type: impl Into<String>) -> Self {
        self.study_type = study_type.into();
        self
    }

    /// Loads the stored conversation and remembers its ids for later
    /// requests. Failures are logged and yield an empty history.
    pub async fn load_history(&self, limit: u32) -> Vec<HistoryEntry> {
        match self.client.history(limit, self.protocol_id).await {
            Ok(entries) => {
                let mut ids = self.history_ids.lock().unwrap_or_else(|p| p.into_inner());
                ids.extend(entries.iter().filter_map(|e| e.history_id));
                entries
            }
            Err(e) => {
                log::warn!("ChatController: history unavailable: {}", e);
                Vec::new()
            }
        }
    }

    /// Forgets the loaded conversation ids.
    pub fn clear_history(&self) {
        self.history_ids.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }

    /// Validates and sends a message.
    ///
    /// The avatars listen while the request runs; any failure is shown as
    /// an error that reverts on its own.
    pub async fn send(&self, message: &str, images: Vec<ImageAttachment>) -> ChatOutcome {
        let message = message.trim();
        if message.chars().count() < MIN_MESSAGE_CHARS && images.is_empty() {
            return self.reject(VALIDATION_MESSAGE);
        }

        let request = ChatRequest {
            message: message.to_string(),
            protocol_id: self.protocol_id,
            history_ids: self.history_ids.lock().unwrap_or_else(|p| p.into_inner()).clone(),
            study_type: self.study_type.clone(),
            images,
        };

        self.arbiter.request(StateRequest::activate(StateKind::Listening));
        let result = self.client.chat(&request).await;
        self.arbiter.request(StateRequest::deactivate(StateKind::Listening));

        match result {
            Ok(response) if response.success => {
                self.arbiter.request(StateRequest::deactivate(StateKind::Error));
                ChatOutcome::Replied {
                    reply: response.reply.unwrap_or_default(),
                    actions: response.actions,
                    intent: response.intent,
                    assistant_available: response.assistant_available,
                }
            }
            Ok(response) => {
                let error = response.error.unwrap_or_else(|| DEFAULT_FAILURE.to_string());
                let unavailable = response.assistant_available == Some(false);
                let (text, transcript) = if unavailable {
                    (
                        format!("{}. {}", error, UNAVAILABLE_SUFFIX),
                        format!(
                            "⚠️ {}\n\n{} Puedes usar las otras pestañas del asistente (Buscar, Plantillas, Frecuentes).",
                            error, UNAVAILABLE_SUFFIX
                        ),
                    )
                } else {
                    (format!("Error: {}", error), format!("❌ Error: {}", error))
                };
                log::warn!("ChatController: assistant failure: {}", error);
                self.show_error(text);
                ChatOutcome::Failed {
                    transcript,
                    assistant_available: response.assistant_available,
                }
            }
            Err(e) => {
                log::error!("ChatController: request failed: {}", e);
                let text = format!(
                    "Error de conexión: {}. Por favor verifica tu conexión e intenta nuevamente.",
                    e
                );
                let transcript = format!("❌ {}", text);
                self.show_error(text);
                ChatOutcome::Failed {
                    transcript,
                    assistant_available: None,
                }
            }
        }
    }

    fn reject(&self, reason: &str) -> ChatOutcome {
        let alert = !self.arbiter.can_display();
        if !alert {
            self.show_error(reason.to_string());
        }
        ChatOutcome::Rejected {
            reason: reason.to_string(),
            alert,
        }
    }

    fn show_error(&self, text: String) {
        self.arbiter
            .request(StateRequest::activate(StateKind::Error).with_text(text));
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::Mock;
    use wiremock::MockServer;
    use wiremock::ResponseTemplate;
    use wiremock::matchers::method;
    use wiremock::matchers::path;

    use super::*;
    use crate::AvatarContext;
    use crate::config::AvatarConfig;
    use crate::engine::memory::InMemoryEngine;
    use crate::engine::memory::InMemoryRuntime;
    use crate::host::memory::InMemoryHost;
    use crate::host::memory::RecordingOpener;
    use crate::model::AuthContext;
    use crate::model::SlotId;

    struct Fixture {
        context: AvatarContext,
        engine: InMemoryEngine,
    }

    impl Fixture {
        async fn new(host: InMemoryHost) -> Self {
            let engine = InMemoryEngine::new();
            let config = AvatarConfig::new(AuthContext::Authenticated).with_settle_delay(Duration::from_millis(20));
            let context = AvatarContext::new(
                config,
                Arc::new(engine.clone()),
                Arc::new(host),
                Arc::new(RecordingOpener::new()),
            );
            context.start().await;
            Self { context, engine }
        }

        fn controller(&self, url: &str) -> ChatController {
            let client = AssistantClient::builder().url(url).build().unwrap();
            ChatController::new(client, self.context.arbiter().clone())
        }

        fn button(&self) -> Arc<InMemoryRuntime> {
            self.engine.latest(SlotId::Button).unwrap()
        }
    }

    async fn drain() {
        tokio::time::sleep(Duration::from_millis(150)).await;
    }

    async fn chat_server(status: u16, body: serde_json::Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/asistente/chat"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_short_message_is_rejected() {
        let f = Fixture::new(InMemoryHost::with_all_slots()).await;
        let outcome = f.controller("http://127.0.0.1:9").send(" a ", Vec::new()).await;
        assert_eq!(
            outcome,
            ChatOutcome::Rejected {
                reason: VALIDATION_MESSAGE.to_string(),
                alert: false
            }
        );
        drain().await;
        assert_eq!(f.button().value("ERROR"), Some(true));
        assert_eq!(f.button().text("Mensaje_error").as_deref(), Some(VALIDATION_MESSAGE));
    }

    #[tokio::test]
    async fn test_rejection_falls_back_to_alert_without_avatars() {
        let f = Fixture::new(InMemoryHost::new()).await;
        let outcome = f.controller("http://127.0.0.1:9").send("", Vec::new()).await;
        assert!(matches!(outcome, ChatOutcome::Rejected { alert: true, .. }));
    }

    #[tokio::test]
    async fn test_image_only_message_is_sent() {
        let f = Fixture::new(InMemoryHost::with_all_slots()).await;
        let server = chat_server(200, json!({"success": true, "respuesta": "Veo la imagen"})).await;
        let image = ImageAttachment {
            name: "corte.png".to_string(),
            data: "data:image/png;base64,AAAA".to_string(),
        };
        let outcome = f.controller(&server.uri()).send("", vec![image]).await;
        assert!(matches!(outcome, ChatOutcome::Replied { ref reply, .. } if reply == "Veo la imagen"));
    }

    #[tokio::test]
    async fn test_reply_leaves_listening_off() {
        let f = Fixture::new(InMemoryHost::with_all_slots()).await;
        let server = chat_server(
            200,
            json!({"success": true, "respuesta": "Hola", "acciones": [{"tipo": "buscar"}], "claude_disponible": true}),
        )
        .await;

        let outcome = f.controller(&server.uri()).send("Hola", Vec::new()).await;
        drain().await;
        match outcome {
            ChatOutcome::Replied { reply, actions, .. } => {
                assert_eq!(reply, "Hola");
                assert_eq!(actions.len(), 1);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(f.button().value("Escuchando"), Some(false));
        assert_eq!(f.button().value("ERROR"), Some(false));
    }

    #[tokio::test]
    async fn test_unavailable_assistant_failure() {
        let f = Fixture::new(InMemoryHost::with_all_slots()).await;
        let server = chat_server(200, json!({"success": false, "error": "Sin cuota", "claude_disponible": false})).await;

        let outcome = f.controller(&server.uri()).send("Hola", Vec::new()).await;
        drain().await;
        let ChatOutcome::Failed { transcript, .. } = outcome else {
            panic!("expected a failure");
        };
        assert!(transcript.starts_with("⚠️ Sin cuota"));
        assert_eq!(
            f.button().text("Mensaje_error").as_deref(),
            Some("Sin cuota. El asistente inteligente no está disponible en este momento.")
        );
        assert_eq!(f.button().value("ERROR"), Some(true));
        assert_eq!(f.button().value("Escuchando"), Some(false));
    }

    #[tokio::test]
    async fn test_connection_failure() {
        let f = Fixture::new(InMemoryHost::with_all_slots()).await;
        let outcome = f.controller("http://127.0.0.1:9").send("Hola", Vec::new()).await;
        drain().await;
        let ChatOutcome::Failed { transcript, .. } = outcome else {
            panic!("expected a failure");
        };
        assert!(transcript.starts_with("❌ Error de conexión:"));
        assert!(f.button().text("Mensaje_error").unwrap().ends_with("intenta nuevamente."));
    }
}
