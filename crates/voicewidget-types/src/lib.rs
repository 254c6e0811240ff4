//! Wire types shared by the voice widget session client and the token broker.
//!
//! Both sides of `POST /api/retell/start` speak the shapes defined here: the
//! client sends a [`StartSessionRequest`] and the broker answers with a
//! [`StartSessionReply`]. The reply is deliberately loose on the wire (every
//! field optional) because the client accepts whatever JSON the broker sends
//! and only checks for the presence of the fields it needs. Use
//! [`StartSessionReply::outcome`] to classify a reply.

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

/// Route on the broker that exchanges credentials for a call token.
pub const START_SESSION_PATH: &str = "/api/retell/start";

/// User identifier sent when the caller has no identity of its own.
pub const ANONYMOUS_USER_ID: &str = "anonymous";

/// Access token returned by the broker in mock mode.
pub const MOCK_ACCESS_TOKEN: &str = "mock-access-token";

/// Call identifier returned by the broker in mock mode.
pub const MOCK_CALL_ID: &str = "mock-call-id";

/// Request body for `POST /api/retell/start`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartSessionRequest {
    /// Opaque identifier of the user placing the call.
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl StartSessionRequest {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    /// Returns the user id, or [`ANONYMOUS_USER_ID`] when none was supplied.
    pub fn user_id_or_anonymous(&self) -> &str {
        self.user_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(ANONYMOUS_USER_ID)
    }
}

/// Response body for `POST /api/retell/start`.
///
/// A successful reply carries `access_token` and `call_id` (plus `mock` in
/// mock mode). A failed reply carries `error` and optionally the upstream
/// `status` and a `detail` string for diagnostics.
///
/// Decoding never fails on a field of the wrong type. Each field is read by
/// truthiness: `mock` is set by any truthy value, text fields accept numbers
/// and booleans rendered as text, and a `status` that is not a valid HTTP
/// status code reads as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartSessionReply {
    #[serde(
        default,
        deserialize_with = "loose_flag",
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub mock: bool,
    #[serde(
        default,
        deserialize_with = "loose_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub access_token: Option<String>,
    #[serde(
        default,
        deserialize_with = "loose_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub call_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "loose_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<String>,
    #[serde(
        default,
        deserialize_with = "loose_status",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<u16>,
    #[serde(
        default,
        deserialize_with = "loose_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub detail: Option<String>,
}

impl StartSessionReply {
    /// A normalized token reply. Upstream fields beyond these two are never
    /// forwarded.
    pub fn token(access_token: Option<String>, call_id: Option<String>) -> Self {
        Self {
            access_token,
            call_id,
            ..Self::default()
        }
    }

    /// The fixed reply served in mock mode.
    pub fn mock() -> Self {
        Self {
            mock: true,
            access_token: Some(MOCK_ACCESS_TOKEN.to_string()),
            call_id: Some(MOCK_CALL_ID.to_string()),
            ..Self::default()
        }
    }

    /// An error reply with an optional upstream status and detail.
    pub fn failure(error: impl Into<String>, status: Option<u16>, detail: Option<String>) -> Self {
        Self {
            error: Some(error.into()),
            status,
            detail,
            ..Self::default()
        }
    }

    /// Classifies the reply the way the session client acts on it.
    ///
    /// Empty strings count as absent. An `error` wins over everything else;
    /// `mock` is only honoured when a token is present.
    pub fn outcome(&self) -> ReplyOutcome<'_> {
        if let Some(error) = non_empty(&self.error) {
            return ReplyOutcome::Rejected {
                error,
                detail: non_empty(&self.detail),
            };
        }

        match non_empty(&self.access_token) {
            Some(access_token) if self.mock => ReplyOutcome::Mock { access_token },
            Some(access_token) => ReplyOutcome::Token {
                access_token,
                call_id: non_empty(&self.call_id),
            },
            None => ReplyOutcome::Unconfigured,
        }
    }
}

/// What a [`StartSessionReply`] means to the session client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome<'a> {
    /// The broker reported an error.
    Rejected {
        error: &'a str,
        detail: Option<&'a str>,
    },
    /// Mock mode: a token without a real call behind it.
    Mock { access_token: &'a str },
    /// A real call token.
    Token {
        access_token: &'a str,
        call_id: Option<&'a str>,
    },
    /// Neither an error nor a token; the broker is not set up.
    Unconfigured,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Any JSON value, kept only as far as the reply fields need it.
#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Null,
    Flag(bool),
    Number(f64),
    Text(String),
    Nested(#[allow(dead_code)] IgnoredAny),
}

impl Loose {
    fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Flag(flag) => *flag,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Text(text) => !text.is_empty(),
            Self::Nested(_) => true,
        }
    }
}

fn loose_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Loose::deserialize(deserializer)?.is_truthy())
}

fn loose_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Loose::deserialize(deserializer)? {
        Loose::Text(text) => Some(text),
        Loose::Flag(true) => Some("true".to_string()),
        Loose::Number(n) if n != 0.0 && !n.is_nan() => Some(n.to_string()),
        Loose::Nested(_) => Some("[object]".to_string()),
        Loose::Null | Loose::Flag(false) | Loose::Number(_) => None,
    })
}

fn loose_status<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u16>, D::Error> {
    Ok(match Loose::deserialize(deserializer)? {
        Loose::Number(n) if n.fract() == 0.0 && (100.0..=999.0).contains(&n) => Some(n as u16),
        _ => None,
    })
}
