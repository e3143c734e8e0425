//! Inbound observer commands

use serde::Deserialize;

use crate::capability::CapabilityDescriptor;
use crate::error::{HubError, Result};

/// A command received from an observer connection
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ObserverCommand {
    /// Pull the current flattened machine list
    UpdateSlavesList,
    /// Bind this connection to a cloud-browser session
    RegisterBrowserstack {
        /// JSON string decoding to a [`BrowserstackPayload`]
        browserstack: String,
        /// Session identifier naming this test run's log
        session: String,
    },
    /// A chunk of cloud-browser session output (first element is used)
    BrowserstackStream {
        /// Chunks; the contract uses the first element only
        data: Vec<String>,
    },
}

impl ObserverCommand {
    /// Decode one wire line into a command
    pub fn parse(line: &str) -> Result<Self> {
        serde_json::from_str(line).map_err(|e| HubError::InvalidCommand(e.to_string()))
    }
}

/// The decoded `browserstack` registration payload
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserstackPayload {
    /// The session descriptor reported by the cloud provider
    pub automation_session: CapabilityDescriptor,
}

impl BrowserstackPayload {
    /// Decode the double-encoded `browserstack` JSON string
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| HubError::InvalidCommand(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_update_slaves_list() {
        let cmd = ObserverCommand::parse(r#"{"event":"update-slaves-list"}"#).unwrap();
        assert_eq!(cmd, ObserverCommand::UpdateSlavesList);
    }

    #[test]
    fn test_parse_register() {
        let line = r#"{"event":"register-browserstack","browserstack":"{}","session":"run-42"}"#;
        let cmd = ObserverCommand::parse(line).unwrap();

        match cmd {
            ObserverCommand::RegisterBrowserstack { session, .. } => {
                assert_eq!(session, "run-42");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_stream_chunks() {
        let line = r#"{"event":"browserstack-stream","data":["hello","ignored"]}"#;
        let cmd = ObserverCommand::parse(line).unwrap();

        assert_eq!(
            cmd,
            ObserverCommand::BrowserstackStream {
                data: vec!["hello".into(), "ignored".into()]
            }
        );
    }

    #[test]
    fn test_parse_unknown_event_is_invalid() {
        let result = ObserverCommand::parse(r#"{"event":"self-destruct"}"#);
        assert!(matches!(result, Err(HubError::InvalidCommand(_))));
    }

    #[test]
    fn test_parse_garbage_is_invalid() {
        assert!(ObserverCommand::parse("not json").is_err());
    }

    #[test]
    fn test_browserstack_payload_decodes_descriptor() {
        let raw =
            r#"{"automation_session":{"browser":"chrome","os":"OS X","os_version":"10.12"}}"#;
        let payload = BrowserstackPayload::parse(raw).unwrap();

        assert_eq!(payload.automation_session.browser, "chrome");
        assert_eq!(payload.automation_session.os, "OS X");
        assert_eq!(payload.automation_session.os_version, "10.12");
    }
}
