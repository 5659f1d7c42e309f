//! Assistant backend wire types
//!
//! Field names are English; the backend's names are kept through serde
//! renames.

use serde::Deserialize;
use serde::Serialize;

/// An image attached to a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAttachment {
    #[serde(rename = "nombre")]
    pub name: String,
    /// Data URL of the image.
    pub data: String,
}

/// Body of `POST /asistente/chat`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    #[serde(rename = "mensaje")]
    pub message: String,
    #[serde(rename = "protocolo_id")]
    pub protocol_id: Option<i64>,
    #[serde(rename = "historial_ids")]
    pub history_ids: Vec<i64>,
    #[serde(rename = "tipo_estudio")]
    pub study_type: String,
    #[serde(rename = "imagenes", skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageAttachment>,
}

/// Response of `POST /asistente/chat`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatResponse {
    pub success: bool,
    #[serde(rename = "respuesta", default)]
    pub reply: Option<String>,
    /// Suggested actions, rendered by the page.
    #[serde(rename = "acciones", default)]
    pub actions: Vec<serde_json::Value>,
    #[serde(rename = "intencion", default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(rename = "claude_disponible", default)]
    pub assistant_available: Option<bool>,
}

/// One exchange of the stored conversation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "mensaje")]
    pub message: String,
    #[serde(rename = "respuesta")]
    pub reply: String,
    #[serde(rename = "historial_id", default)]
    pub history_id: Option<i64>,
}

/// Response of `GET /asistente/chat/historial`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HistoryResponse {
    pub success: bool,
    #[serde(rename = "historial", default)]
    pub entries: Vec<HistoryEntry>,
}

/// Response of `GET /asistente/claude/estado`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct StatusResponse {
    #[serde(rename = "claude_disponible", default)]
    pub assistant_available: bool,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_chat_request_wire_names() {
        let request = ChatRequest {
            message: "Hola".to_string(),
            protocol_id: Some(7),
            history_ids: vec![1, 2],
            study_type: "biopsia".to_string(),
            images: Vec::new(),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "mensaje": "Hola",
                "protocolo_id": 7,
                "historial_ids": [1, 2],
                "tipo_estudio": "biopsia"
            })
        );
    }

    #[test]
    fn test_failure_response() {
        let response: ChatResponse =
            serde_json::from_value(json!({"success": false, "error": "Sin cuota", "claude_disponible": false})).unwrap();
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("Sin cuota"));
        assert_eq!(response.assistant_available, Some(false));
        assert!(response.actions.is_empty());
    }

    #[test]
    fn test_history_response() {
        let response: HistoryResponse = serde_json::from_value(json!({
            "success": true,
            "historial": [{"mensaje": "a", "respuesta": "b", "historial_id": 3}]
        }))
        .unwrap();
        assert_eq!(response.entries[0].history_id, Some(3));
    }
}
