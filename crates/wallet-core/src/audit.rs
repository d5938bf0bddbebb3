use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::WalletError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Success,
    Failed,
}

/// One activity record: who did what to which entity, and how it ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub details: Value,
    pub status: AuditStatus,
    pub at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn success(action: &str, entity_type: &str, entity_id: impl ToString) -> Self {
        Self::new(action, entity_type, entity_id.to_string(), AuditStatus::Success)
    }

    pub fn failed(action: &str, entity_type: &str, entity_id: impl ToString) -> Self {
        Self::new(action, entity_type, entity_id.to_string(), AuditStatus::Failed)
    }

    fn new(action: &str, entity_type: &str, entity_id: String, status: AuditStatus) -> Self {
        Self {
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            details: Value::Object(Default::default()),
            status,
            at: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Adds `error` and `error_code` to the details.
    pub fn with_error(mut self, err: &WalletError) -> Self {
        if !self.details.is_object() {
            self.details = json!({ "context": self.details });
        }
        if let Value::Object(map) = &mut self.details {
            map.insert("error".into(), Value::String(err.to_string()));
            map.insert("error_code".into(), Value::String(err.code().into()));
        }
        self
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent);
}

/// Forwards events to `tracing` under the `wallet_audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) {
        match event.status {
            AuditStatus::Success => info!(
                target: "wallet_audit",
                action = %event.action,
                entity_type = %event.entity_type,
                entity_id = %event.entity_id,
                details = %event.details,
                "audit"
            ),
            AuditStatus::Failed => warn!(
                target: "wallet_audit",
                action = %event.action,
                entity_type = %event.entity_type,
                entity_id = %event.entity_id,
                details = %event.details,
                "audit"
            ),
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().await.clone()
    }

    pub async fn actions(&self) -> Vec<(String, AuditStatus)> {
        self.events
            .lock()
            .await
            .iter()
            .map(|e| (e.action.clone(), e.status))
            .collect()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, event: AuditEvent) {
        self.events.lock().await.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_sink_keeps_order() {
        let sink = MemoryAuditSink::new();
        sink.record(AuditEvent::success("wallet.create", "wallet", "w1")).await;
        sink.record(AuditEvent::failed("transaction.send", "wallet", "w1")).await;

        let actions = sink.actions().await;
        assert_eq!(
            actions,
            vec![
                ("wallet.create".to_string(), AuditStatus::Success),
                ("transaction.send".to_string(), AuditStatus::Failed),
            ]
        );
    }

    #[test]
    fn with_error_adds_code_and_message() {
        let event = AuditEvent::failed("transaction.send", "wallet", "w1")
            .with_details(json!({ "chain": "ethereum" }))
            .with_error(&WalletError::InvalidPassphrase);
        assert_eq!(event.details["chain"], "ethereum");
        assert_eq!(event.details["error"], "invalid passphrase");
        assert_eq!(event.details["error_code"], "invalid_passphrase");
    }

    #[test]
    fn status_serializes_lowercase() {
        let event = AuditEvent::failed("message.sign", "wallet", "w1");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"], "failed");
    }

    #[tokio::test]
    async fn tracing_sink_accepts_events() {
        TracingAuditSink
            .record(AuditEvent::success("wallet.import", "wallet", "w2"))
            .await;
    }
}
