//! Client error types and flood-control classification.

use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors surfaced by a connected client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// Provider-imposed throttling with an optional required wait.
    #[error("flood control: wait of {seconds:?} seconds required")]
    FloodWait {
        /// Required wait in seconds, when the provider reported one
        seconds: Option<u64>,
    },

    /// Raw provider error that has not been classified yet.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// Provider error code
        code: i32,
        /// Provider error message, e.g. `FLOOD_WAIT_17`
        message: String,
    },

    /// The client has no live connection.
    #[error("client is not connected")]
    NotConnected,

    /// A handle or id did not resolve to an entity.
    #[error("entity not found: {0}")]
    EntityNotFound(String),

    /// The platform refused to disclose the requested profile.
    #[error("profile restricted: {0}")]
    PrivacyRestricted(String),

    /// Connection-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Fixture file could not be loaded.
    #[error("fixture error: {0}")]
    Fixture(String),
}

/// Wait demanded by a flood-control signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloodWait {
    /// The provider reported how long to wait.
    Seconds(u64),
    /// A flood signal without a usable duration.
    Unspecified,
}

impl FloodWait {
    /// Duration to honour, substituting `default` when none was reported.
    #[must_use]
    pub fn duration_or(self, default: Duration) -> Duration {
        match self {
            Self::Seconds(secs) => Duration::from_secs(secs),
            Self::Unspecified => default,
        }
    }
}

impl ClientError {
    /// Classify this error as a flood-control signal.
    ///
    /// Returns `None` for every other kind of error.
    #[must_use]
    pub fn flood_wait(&self) -> Option<FloodWait> {
        match self {
            Self::FloodWait { seconds: Some(secs) } => Some(FloodWait::Seconds(*secs)),
            Self::FloodWait { seconds: None } => Some(FloodWait::Unspecified),
            // Only code 420 or a parseable wait counts. `PEER_FLOOD` and
            // similar 400 restrictions carry no wait and never lift by retrying.
            Self::Rpc { code, message } => match parse_wait_seconds(message) {
                Some(secs) => Some(FloodWait::Seconds(secs)),
                None if *code == 420 => Some(FloodWait::Unspecified),
                None => None,
            },
            _ => None,
        }
    }

    /// True when this error is a flood-control signal.
    #[must_use]
    pub fn is_flood(&self) -> bool {
        self.flood_wait().is_some()
    }
}

/// Extract the wait in seconds from a provider message.
///
/// Understands `FLOOD_WAIT_17`, `FLOOD_PREMIUM_WAIT_5` and
/// "A wait of 17 seconds is required".
#[must_use]
pub fn parse_wait_seconds(message: &str) -> Option<u64> {
    static WAIT_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = WAIT_REGEX.get_or_init(|| {
        Regex::new(r"(?i)FLOOD(?:_PREMIUM)?_WAIT_(\d+)|wait of (\d+) seconds").expect("valid regex")
    });

    let caps = regex.captures(message)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rpc(code: i32, message: &str) -> ClientError {
        ClientError::Rpc {
            code,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_error_display() {
        let err = ClientError::EntityNotFound("@nobody".to_string());
        assert_eq!(err.to_string(), "entity not found: @nobody");
    }

    #[test]
    fn test_flood_wait_variant() {
        let err = ClientError::FloodWait { seconds: Some(5) };
        assert_eq!(err.flood_wait(), Some(FloodWait::Seconds(5)));

        let err = ClientError::FloodWait { seconds: None };
        assert_eq!(err.flood_wait(), Some(FloodWait::Unspecified));
    }

    #[test]
    fn test_rpc_flood_messages() {
        assert_eq!(rpc(420, "FLOOD_WAIT_17").flood_wait(), Some(FloodWait::Seconds(17)));
        assert_eq!(
            rpc(420, "FLOOD_PREMIUM_WAIT_3").flood_wait(),
            Some(FloodWait::Seconds(3))
        );
        assert_eq!(
            rpc(0, "A wait of 42 seconds is required (caused by channels.GetParticipants)")
                .flood_wait(),
            Some(FloodWait::Seconds(42))
        );
    }

    #[test]
    fn test_unparseable_flood_is_unspecified() {
        assert_eq!(rpc(420, "FLOOD_WAIT_X").flood_wait(), Some(FloodWait::Unspecified));
        assert_eq!(rpc(420, "").flood_wait(), Some(FloodWait::Unspecified));
    }

    #[test]
    fn test_flood_without_wait_is_not_retryable() {
        assert!(rpc(400, "PEER_FLOOD").flood_wait().is_none());
        assert!(rpc(400, "flood").flood_wait().is_none());
        assert!(!rpc(403, "CHAT_SEND_FLOOD_RESTRICTED").is_flood());
    }

    #[test]
    fn test_non_flood_errors() {
        assert!(rpc(400, "USER_ID_INVALID").flood_wait().is_none());
        assert!(!ClientError::NotConnected.is_flood());
        assert!(!ClientError::PrivacyRestricted("hidden".to_string()).is_flood());
    }

    #[test]
    fn test_duration_or_default() {
        let default = Duration::from_secs(30);
        assert_eq!(FloodWait::Seconds(5).duration_or(default), Duration::from_secs(5));
        assert_eq!(FloodWait::Unspecified.duration_or(default), default);
    }
}
