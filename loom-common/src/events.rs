//! Dream status events pushed to WebSocket clients
//!
//! Clients open a per-dream channel and receive a fixed sequence of status
//! updates while the processing pipeline runs: `analyzing`, optionally
//! `generating_image`, then `done`. After `done` the client re-fetches the
//! dream over plain HTTP; a client that connects late simply sees nothing
//! and falls back to the fetch.

use serde::{Deserialize, Serialize};

/// Processing phase reported to watching clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DreamStatus {
    /// Text interpretation in progress
    Analyzing,
    /// Image generation in progress (only when requested)
    GeneratingImage,
    /// Terminal: interpretation persisted (success or failure)
    Done,
}

/// Push message sent on the per-dream status channel
///
/// Wire shape: `{"status": "...", "message": "...", "dreamId": 42}` with
/// absent optional fields omitted entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: DreamStatus,
    /// Human-readable progress text for display while waiting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Set on the terminal `done` message so clients know what to re-fetch
    #[serde(rename = "dreamId", skip_serializing_if = "Option::is_none")]
    pub dream_id: Option<i64>,
}

impl StatusUpdate {
    /// Progress update with display text
    pub fn progress(status: DreamStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: Some(message.into()),
            dream_id: None,
        }
    }

    /// Terminal notification for a dream
    pub fn done(dream_id: i64) -> Self {
        Self {
            status: DreamStatus::Done,
            message: None,
            dream_id: Some(dream_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&DreamStatus::GeneratingImage).unwrap();
        assert_eq!(json, "\"generating_image\"");
    }

    #[test]
    fn test_progress_update_omits_dream_id() {
        let update = StatusUpdate::progress(DreamStatus::Analyzing, "Analyzing your dream...");
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["status"], "analyzing");
        assert_eq!(json["message"], "Analyzing your dream...");
        assert!(json.get("dreamId").is_none());
    }

    #[test]
    fn test_done_update_carries_dream_id() {
        let update = StatusUpdate::done(42);
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["status"], "done");
        assert_eq!(json["dreamId"], 42);
        assert!(json.get("message").is_none());
    }
}
