//! Classified result of one data call.
//!
//! Connectors map a raw response (or transport failure) into exactly one [`RequestOutcome`].
//! The body shape is decoded once, through [`ResponseBody`] or [`PageEnvelope`], instead of
//! being probed field by field inside the harvest loop.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::http_client::{HttpError, HttpResponse};

/// Rows of a successful response plus the cursor reference it carried, if any.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    pub rows: Vec<Value>,
    pub next: Option<String>,
}

impl Payload {
    pub fn rows(rows: Vec<Value>) -> Self {
        Self { rows, next: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    Success(Payload),
    /// The server answered, but nothing matched the request.
    EmptyResult,
    AuthExpired,
    TransientServerError {
        /// `None` when the transport failed without a response.
        status: Option<u16>,
        url: String,
        body: String,
    },
    Timeout {
        url: String,
        message: String,
    },
    /// A 2xx body that matches no known shape.
    Fatal(String),
}

/// Tag of a [`RequestOutcome`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Success,
    EmptyResult,
    AuthExpired,
    TransientServerError,
    Timeout,
    Fatal,
}

impl RequestOutcome {
    pub const fn kind(&self) -> OutcomeKind {
        match self {
            Self::Success(_) => OutcomeKind::Success,
            Self::EmptyResult => OutcomeKind::EmptyResult,
            Self::AuthExpired => OutcomeKind::AuthExpired,
            Self::TransientServerError { .. } => OutcomeKind::TransientServerError,
            Self::Timeout { .. } => OutcomeKind::Timeout,
            Self::Fatal(_) => OutcomeKind::Fatal,
        }
    }

    /// Outcome of a call that produced no response.
    pub fn from_transport_error(error: &HttpError, url: &str) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                url: url.to_owned(),
                message: error.message().to_owned(),
            }
        } else {
            Self::TransientServerError {
                status: None,
                url: url.to_owned(),
                body: error.message().to_owned(),
            }
        }
    }

    pub fn transient(response: &HttpResponse, url: &str) -> Self {
        Self::TransientServerError {
            status: Some(response.status),
            url: if response.url.is_empty() {
                url.to_owned()
            } else {
                response.url.clone()
            },
            body: response.body.clone(),
        }
    }
}

/// Top-level JSON shape of a chunked data response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Rows(Vec<Value>),
    Object(Map<String, Value>),
}

impl ResponseBody {
    /// `None` when the body is not JSON or is a bare scalar.
    pub fn parse(body: &str) -> Option<Self> {
        serde_json::from_str(body).ok()
    }
}

/// Envelope of a cursor-paginated response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PageEnvelope {
    #[serde(default)]
    pub data: Option<Vec<Value>>,
    #[serde(default)]
    pub links: Option<PageLinks>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PageLinks {
    #[serde(default)]
    pub next: Option<String>,
}

impl PageEnvelope {
    /// Decode an envelope; `Err` carries the reason the body was rejected.
    pub fn parse(body: &str) -> Result<Self, String> {
        match serde_json::from_str::<Value>(body) {
            Ok(value @ Value::Object(_)) => {
                serde_json::from_value(value).map_err(|error| format!("bad page envelope: {error}"))
            }
            Ok(other) => Err(format!("expected a page envelope object, got {}", json_type(&other))),
            Err(error) => Err(format!("body is not JSON: {error}")),
        }
    }

    pub fn into_payload(self) -> Payload {
        Payload {
            rows: self.data.unwrap_or_default(),
            next: self
                .links
                .and_then(|links| links.next)
                .filter(|next| !next.trim().is_empty()),
        }
    }
}

pub(crate) const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_timeout_is_a_timeout_outcome() {
        let outcome = RequestOutcome::from_transport_error(
            &HttpError::timeout("deadline elapsed"),
            "https://api.test/pricing",
        );
        assert_eq!(outcome.kind(), OutcomeKind::Timeout);

        let outcome = RequestOutcome::from_transport_error(
            &HttpError::connect("connection refused"),
            "https://api.test/pricing",
        );
        assert_eq!(
            outcome,
            RequestOutcome::TransientServerError {
                status: None,
                url: String::from("https://api.test/pricing"),
                body: String::from("connection refused"),
            }
        );
    }

    #[test]
    fn response_body_discriminates_lists_and_objects() {
        assert!(matches!(
            ResponseBody::parse(r#"[{"itemNumber":"A1"}]"#),
            Some(ResponseBody::Rows(rows)) if rows.len() == 1
        ));
        assert!(matches!(
            ResponseBody::parse(r#"{"statusCode":500}"#),
            Some(ResponseBody::Object(_))
        ));
        assert_eq!(ResponseBody::parse("42"), None);
        assert_eq!(ResponseBody::parse("<html>"), None);
    }

    #[test]
    fn envelope_without_next_link_ends_the_cursor() {
        let payload = PageEnvelope::parse(r#"{"data":[{"id":"1"}],"links":{"self":"/v1/items?page=9"}}"#)
            .expect("envelope")
            .into_payload();
        assert_eq!(payload.rows.len(), 1);
        assert_eq!(payload.next, None);

        let payload = PageEnvelope::parse(r#"{"data":[],"links":{"next":null}}"#)
            .expect("envelope")
            .into_payload();
        assert_eq!(payload.next, None);
    }

    #[test]
    fn envelope_rejects_non_objects() {
        let error = PageEnvelope::parse("[]").expect_err("array is not an envelope");
        assert!(error.contains("array"));
    }
}
