//! Error taxonomy for probe strategies
//!
//! Every variant renders to the detail string shown in the report, so the
//! display strings here are part of the output contract. The executor
//! converts these into Failed outcomes; nothing propagates past it.

use thiserror::Error;

/// Errors a probe strategy can produce
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Connection refused, DNS failure, or no route to host
    #[error("connection refused or host unreachable")]
    Unreachable,

    /// A bounded wait was exceeded
    #[error("timed out")]
    Timeout,

    /// The endpoint answered with an unexpected status code
    #[error("HTTP {got} (expected {expected})")]
    UnexpectedStatus { got: u16, expected: u16 },

    /// Status matched but the expected body text was missing
    #[error("HTTP {status} but expected text not found")]
    BodyMismatch { status: u16 },

    /// The endpoint explicitly rejected the credentials
    #[error("bad credentials")]
    AuthRejected,

    /// An API token was rejected
    #[error("HTTP {0} — check token ID/secret")]
    TokenRejected(u16),

    /// Login flow completed without yielding a session cookie
    #[error("no session cookie — check credentials")]
    NoSessionCookie,

    /// None of the candidate paths produced a recognizable response
    #[error("no candidate path responded")]
    NoCandidate,

    /// The external query tool is not installed
    #[error("{0}")]
    ToolUnavailable(String),

    /// The external query tool ran and reported failure
    #[error("{0}")]
    Tool(String),

    /// Raw socket level failure (bind, resolve, send, receive)
    #[error("{0}")]
    Socket(String),

    /// A response did not have the JSON shape the flow requires
    #[error("unexpected response shape: {0}")]
    Payload(String),

    /// Any other HTTP transport failure
    #[error("{0}")]
    Transport(String),
}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProbeError::Timeout
        } else if err.is_connect() {
            ProbeError::Unreachable
        } else {
            ProbeError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_strings() {
        assert_eq!(
            ProbeError::Unreachable.to_string(),
            "connection refused or host unreachable"
        );
        assert_eq!(ProbeError::Timeout.to_string(), "timed out");
        assert_eq!(
            ProbeError::UnexpectedStatus {
                got: 500,
                expected: 200
            }
            .to_string(),
            "HTTP 500 (expected 200)"
        );
        assert_eq!(
            ProbeError::BodyMismatch { status: 200 }.to_string(),
            "HTTP 200 but expected text not found"
        );
        assert_eq!(
            ProbeError::NoSessionCookie.to_string(),
            "no session cookie — check credentials"
        );
        assert_eq!(ProbeError::AuthRejected.to_string(), "bad credentials");
        assert_eq!(
            ProbeError::TokenRejected(401).to_string(),
            "HTTP 401 — check token ID/secret"
        );
    }
}
