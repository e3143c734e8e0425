//! Outbound frames pushed to observers

use std::sync::Arc;

use serde::Serialize;

use crate::error::HubError;
use crate::registry::Machine;

/// A frame pushed to one or all observers
///
/// Frames are serialized once per broadcast and shared across connections as
/// `Arc<String>`; cloning the frame itself is cheap enough for replies.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum OutboundEvent {
    /// The flattened machine list, pushed on slave churn or on pull
    UpdateSlavesList {
        /// Current machines, one entry per attached worker
        machines: Vec<Machine>,
    },
    /// One coordinator firehose payload, passed through verbatim
    DataStream {
        /// Arbitrary payload as the coordinator emitted it
        payload: serde_json::Value,
    },
    /// A cloud-browser stream chunk, annotated with the resolved machine
    BrowserstackDataStream {
        /// Machine id the sending connection resolved to
        #[serde(rename = "machineId")]
        machine_id: String,
        /// The chunk as received
        data: String,
    },
    /// A local-scope failure reported to the triggering observer
    Error {
        /// Stable error code (see [`HubError::code`])
        code: &'static str,
        /// Human-readable description
        message: String,
    },
}

impl OutboundEvent {
    /// Build an error frame from a hub error
    pub fn from_error(err: &HubError) -> Self {
        OutboundEvent::Error {
            code: err.code(),
            message: err.to_string(),
        }
    }

    /// Serialize to one shared wire frame (without trailing newline)
    pub fn to_frame(&self) -> Arc<String> {
        // All variants are plain data; serialization cannot fail on them.
        let json = serde_json::to_string(self).unwrap_or_else(|_| FALLBACK_FRAME.to_string());
        Arc::new(json)
    }
}

/// Emitted in place of a frame that failed to serialize; fixed text so the
/// fallback itself is always valid JSON.
const FALLBACK_FRAME: &str =
    r#"{"event":"error","code":"io","message":"frame serialization failed"}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_slaves_list_frame() {
        let frame = OutboundEvent::UpdateSlavesList {
            machines: vec![Machine::new("1", "mac")],
        }
        .to_frame();

        assert_eq!(
            frame.as_str(),
            r#"{"event":"update-slaves-list","machines":[{"id":"1","platform":"mac"}]}"#
        );
    }

    #[test]
    fn test_data_stream_passes_payload_verbatim() {
        let payload = serde_json::json!({"suite": "login", "passed": 3});
        let frame = OutboundEvent::DataStream {
            payload: payload.clone(),
        }
        .to_frame();

        let decoded: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(decoded["event"], "data-stream");
        assert_eq!(decoded["payload"], payload);
    }

    #[test]
    fn test_browserstack_data_stream_uses_machine_id_key() {
        let frame = OutboundEvent::BrowserstackDataStream {
            machine_id: "5".into(),
            data: "hello".into(),
        }
        .to_frame();

        assert_eq!(
            frame.as_str(),
            r#"{"event":"browserstack-data-stream","machineId":"5","data":"hello"}"#
        );
    }

    #[test]
    fn test_fallback_frame_is_valid_json() {
        let decoded: serde_json::Value = serde_json::from_str(FALLBACK_FRAME).unwrap();
        assert_eq!(decoded["event"], "error");
        assert_eq!(decoded["code"], "io");
    }

    #[test]
    fn test_error_frame_carries_code() {
        let frame = OutboundEvent::from_error(&HubError::NoMatchingCapability).to_frame();
        let decoded: serde_json::Value = serde_json::from_str(&frame).unwrap();

        assert_eq!(decoded["event"], "error");
        assert_eq!(decoded["code"], "no-matching-capability");
    }
}
