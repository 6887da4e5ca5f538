//! Messages exchanged between the worker and its foreground clients.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Closed set of protocol messages, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Broadcast after a new version activates.
    SwUpdated { version: String },
    /// Reply to [`Message::CheckForUpdates`].
    VersionInfo { version: String },
    CheckForUpdates,
    SkipWaiting,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_format() {
        let updated = Message::SwUpdated { version: "1.2.0".into() };
        assert_eq!(serde_json::to_value(&updated).unwrap(), json!({"type": "SW_UPDATED", "version": "1.2.0"}));

        let check: Message = serde_json::from_value(json!({"type": "CHECK_FOR_UPDATES"})).unwrap();
        assert_eq!(check, Message::CheckForUpdates);

        let skip: Message = serde_json::from_str(r#"{"type":"SKIP_WAITING"}"#).unwrap();
        assert_eq!(skip, Message::SkipWaiting);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let result = serde_json::from_value::<Message>(json!({"type": "RELOAD"}));
        assert!(result.is_err());
    }
}
