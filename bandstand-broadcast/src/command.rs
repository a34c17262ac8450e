//! The operator-published command document.

use serde::{Deserialize, Deserializer};

/// What the operator asked every listening page to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastAction {
    Play,
    Pause,
}

/// A single remotely published instruction, consumed at most once per
/// distinct timestamp token.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BroadcastCommand {
    pub action: BroadcastAction,
    /// Direct URL of the track to play; bypasses the catalog.
    #[serde(default, rename = "trackUrl")]
    pub track_url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Opaque token compared against the last-applied one for
    /// deduplication. Operators publish it as either a number or a string.
    #[serde(deserialize_with = "token_from_any")]
    pub timestamp: String,
}

fn token_from_any<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Token {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Token::deserialize(deserializer)? {
        Token::Text(text) => text,
        Token::Int(number) => number.to_string(),
        Token::Float(number) => number.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_command_with_numeric_timestamp() {
        let body = r#"{
            "action": "play",
            "trackUrl": "/music/announcement.mp3",
            "title": "Tournament finals",
            "timestamp": 1723456789000
        }"#;
        let parsed: Result<BroadcastCommand, _> = serde_json::from_str(body);
        assert!(parsed.is_ok());
        let Ok(command) = parsed else {
            return;
        };
        assert_eq!(command.action, BroadcastAction::Play);
        assert_eq!(command.track_url.as_deref(), Some("/music/announcement.mp3"));
        assert_eq!(command.timestamp, "1723456789000");
    }

    #[test]
    fn test_pause_command_without_track() {
        let body = r#"{ "action": "pause", "timestamp": "tok-7" }"#;
        let parsed: Result<BroadcastCommand, _> = serde_json::from_str(body);
        assert!(parsed.is_ok());
        let Ok(command) = parsed else {
            return;
        };
        assert_eq!(command.action, BroadcastAction::Pause);
        assert_eq!(command.track_url, None);
        assert_eq!(command.title, None);
        assert_eq!(command.timestamp, "tok-7");
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let body = r#"{ "action": "shout", "timestamp": 1 }"#;
        let parsed: Result<BroadcastCommand, _> = serde_json::from_str(body);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_missing_timestamp_is_rejected() {
        let body = r#"{ "action": "play", "trackUrl": "/music/a.mp3" }"#;
        let parsed: Result<BroadcastCommand, _> = serde_json::from_str(body);
        assert!(parsed.is_err());
    }
}
