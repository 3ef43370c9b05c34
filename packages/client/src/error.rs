//! Error types for the session command multiplexer.

use std::time::Duration;

use thiserror::Error;

/// Client-side errors
///
/// None of these are fatal to the process. Transport faults are recovered by
/// reconnecting; the rest are surfaced to the operator.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection dropped or could not be opened
    #[error("Transport error: {0}")]
    Transport(String),

    /// Inbound frame could not be decoded
    #[error("Failed to parse server message - {0}")]
    Decode(String),

    /// Error reported by the remote backend
    #[error("Remote error: {0}")]
    Remote(String),

    /// Operator-supplied input rejected before anything was sent
    #[error("Invalid JSON: {0}")]
    Validation(String),

    /// The focus change was not acknowledged in time
    #[error("World {world_index} was not focused within {waited:?}")]
    FocusTimeout { world_index: usize, waited: Duration },

    /// An action was requested while the channel is not open
    #[error("Channel is not connected")]
    ChannelClosed,

    /// HTTP collaborator answered with a non-success status
    #[error("HTTP error! status: {status} ({detail})")]
    Http { status: u16, detail: String },

    /// HTTP request could not be performed
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Preference storage failure
    #[error("Preference store error: {0}")]
    Store(String),
}

impl ClientError {
    /// Whether the error is recovered by the transport without operator involvement
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_is_transient() {
        // テスト項目: Transport エラーは再接続で回復されるものと判定される
        // given (前提条件):
        let error = ClientError::Transport("connection reset".to_string());

        // when (操作):
        let result = error.is_transient();

        // then (期待する結果):
        assert!(result);
    }

    #[test]
    fn test_focus_timeout_is_not_transient() {
        // テスト項目: FocusTimeout は自動回復されず、オペレーターに通知される
        // given (前提条件):
        let error = ClientError::FocusTimeout {
            world_index: 2,
            waited: Duration::from_millis(2000),
        };

        // when (操作):
        let transient = error.is_transient();
        let message = error.to_string();

        // then (期待する結果):
        assert!(!transient);
        assert_eq!(message, "World 2 was not focused within 2s");
    }

    #[test]
    fn test_validation_error_message_carries_parser_message() {
        // テスト項目: Validation エラーはパーサーのメッセージを含む
        // given (前提条件):
        let error = ClientError::Validation("expected value at line 1 column 1".to_string());

        // when (操作):
        let message = error.to_string();

        // then (期待する結果):
        assert_eq!(message, "Invalid JSON: expected value at line 1 column 1");
    }
}
