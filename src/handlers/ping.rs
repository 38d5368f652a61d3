//! Ping handler for health checks

use anyhow::Result;
use async_nats::{Client, Subscriber};
use serde::{Deserialize, Serialize};

use crate::handlers::{serve, HandlerError, SUBJECT_PING};
use crate::types::Request;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PingPayload {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PongResponse {
    pub message: String,
    pub service: String,
    pub version: String,
    pub timestamp: String,
}

pub fn process_ping(request: Request<PingPayload>) -> PongResponse {
    PongResponse {
        message: request
            .payload
            .message
            .map(|m| format!("Pong: {}", m))
            .unwrap_or_else(|| "Pong".to_string()),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    }
}

/// Handle ping messages
pub async fn handle_ping(client: Client, subscriber: Subscriber) -> Result<()> {
    serve(client, subscriber, SUBJECT_PING, |request: Request<PingPayload>| async move {
        Ok::<_, HandlerError>(process_ping(request))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn ping(message: Option<&str>) -> Request<PingPayload> {
        Request {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            token: None,
            payload: PingPayload { message: message.map(str::to_string) },
        }
    }

    #[test]
    fn pong_echoes_message() {
        assert_eq!(process_ping(ping(Some("hello"))).message, "Pong: hello");
        assert_eq!(process_ping(ping(None)).message, "Pong");
    }

    #[test]
    fn pong_names_the_service() {
        let pong = process_ping(ping(None));
        assert_eq!(pong.service, "autotrack-worker");
        assert!(!pong.version.is_empty());
    }
}
