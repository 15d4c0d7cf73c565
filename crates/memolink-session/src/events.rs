use memolink_roll::Roll;
use serde::Serialize;

use crate::error::{ErrorKind, SessionError};
use crate::ring::RingGeometry;
use crate::session::CurrentRoll;

/// Successful outcome of a worker request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Response {
    PortOpened,
    PortClosed,
    Model(String),
    TotalShots(u16),
    MemoryInfo(RingGeometry),
    CurrentRoll(CurrentRoll),
    RollData(Vec<Roll>),
}

/// Notification broadcast by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// Percent complete of the running request.
    Progress { percent: u8 },
    Error { kind: ErrorKind, message: String },
    Response { response: Response },
}

impl Event {
    pub(crate) fn progress(percent: u8) -> Self {
        Self::Progress { percent }
    }

    pub(crate) fn error(err: &SessionError) -> Self {
        Self::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub(crate) fn response(response: Response) -> Self {
        Self::Response { response }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_tags() {
        let json = serde_json::to_value(Event::progress(37)).unwrap();
        assert_eq!(json, serde_json::json!({"event": "progress", "percent": 37}));

        let json = serde_json::to_value(Event::response(Response::TotalShots(512))).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "event": "response",
                "response": {"type": "total_shots", "data": 512}
            })
        );
    }

    #[test]
    fn error_event_carries_kind_and_message() {
        let event = Event::error(&SessionError::UnsupportedStorageMode(0x01));
        assert_eq!(
            event,
            Event::Error {
                kind: ErrorKind::InvalidData,
                message: "unsupported storage mode 0x01".to_string(),
            }
        );
    }
}
