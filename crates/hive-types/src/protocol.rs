//! Line-delimited JSON protocol spoken with the parent process.
//!
//! Each request and each response is one JSON object on one line. Requests
//! carry a `type` tag and an opaque `request_id` that is echoed back verbatim.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current protocol version, reported in health responses.
pub const PROTOCOL_VERSION: u32 = 1;

/// Opaque correlation token echoed on every response.
///
/// Callers may send any JSON scalar; the worker never interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Value);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(Value::String(id.into()))
    }

    /// Id of the unsolicited readiness message.
    pub fn startup() -> Self {
        Self::new("startup")
    }

    /// Sentinel for lines whose id could not be recovered.
    pub fn unknown() -> Self {
        Self::new("unknown")
    }

    /// Server-generated id for requests that did not supply one.
    pub fn generate() -> Self {
        Self::new(ulid::Ulid::new().to_string())
    }

    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

/// The request kinds the worker understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Health,
    Embed,
    Generate,
    Analyze,
    RouteDecision,
}

impl RequestKind {
    /// Look up a kind by its wire name.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "health" => Some(Self::Health),
            "embed" => Some(Self::Embed),
            "generate" => Some(Self::Generate),
            "analyze" => Some(Self::Analyze),
            "route_decision" => Some(Self::RouteDecision),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::Embed => "embed",
            Self::Generate => "generate",
            Self::Analyze => "analyze",
            Self::RouteDecision => "route_decision",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmbedPayload {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub texts: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzePayload {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub task: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneratePayload {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteDecisionPayload {
    pub query: String,
}

/// A decoded request body.
#[derive(Debug, Clone)]
pub enum Request {
    Health,
    Embed(EmbedPayload),
    Generate(GeneratePayload),
    Analyze(AnalyzePayload),
    RouteDecision(RouteDecisionPayload),
}

impl Request {
    pub fn kind(&self) -> RequestKind {
        match self {
            Request::Health => RequestKind::Health,
            Request::Embed(_) => RequestKind::Embed,
            Request::Generate(_) => RequestKind::Generate,
            Request::Analyze(_) => RequestKind::Analyze,
            Request::RouteDecision(_) => RequestKind::RouteDecision,
        }
    }
}

/// Outcome of a route decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryRoute {
    Simple,
    Complex,
}

/// A response line. Exactly one is written per request line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    HealthResult {
        request_id: RequestId,
        status: String,
        mode: String,
        models_loaded: Vec<String>,
        protocol_version: u32,
    },
    EmbedResult {
        request_id: RequestId,
        model: String,
        dimension: usize,
        embeddings: Vec<Vec<f32>>,
    },
    GenerateResult {
        request_id: RequestId,
        text: String,
    },
    AnalyzeResult {
        request_id: RequestId,
        model: String,
        task: String,
        result: Value,
    },
    RouteDecision {
        request_id: RequestId,
        mode: QueryRoute,
        confidence: f64,
        matched_keywords: Vec<String>,
        reason: String,
    },
    Error {
        request_id: RequestId,
        error: String,
        code: String,
    },
}

impl Response {
    /// Build a ready health response.
    pub fn health(request_id: RequestId, mode: &str, models_loaded: Vec<String>) -> Self {
        Response::HealthResult {
            request_id,
            status: "ready".to_string(),
            mode: mode.to_string(),
            models_loaded,
            protocol_version: PROTOCOL_VERSION,
        }
    }

    pub fn error(request_id: RequestId, code: &str, error: impl Into<String>) -> Self {
        Response::Error {
            request_id,
            error: error.into(),
            code: code.to_string(),
        }
    }

    pub fn request_id(&self) -> &RequestId {
        match self {
            Response::HealthResult { request_id, .. }
            | Response::EmbedResult { request_id, .. }
            | Response::GenerateResult { request_id, .. }
            | Response::AnalyzeResult { request_id, .. }
            | Response::RouteDecision { request_id, .. }
            | Response::Error { request_id, .. } => request_id,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_health_response_wire_shape() {
        let response = Response::health(RequestId::new("1"), "minimal", vec![]);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["type"], "health_result");
        assert_eq!(value["request_id"], "1");
        assert_eq!(value["status"], "ready");
        assert_eq!(value["models_loaded"], json!([]));
        assert_eq!(value["protocol_version"], 1);
    }

    #[test]
    fn test_route_decision_wire_shape() {
        let response = Response::RouteDecision {
            request_id: RequestId::new("2"),
            mode: QueryRoute::Simple,
            confidence: 0.8,
            matched_keywords: vec![],
            reason: "short query".to_string(),
        };
        let line = serde_json::to_string(&response).unwrap();
        assert!(line.contains(r#""type":"route_decision""#));
        assert!(line.contains(r#""mode":"simple""#));
        assert!(line.contains(r#""confidence":0.8"#));
    }

    #[test]
    fn test_numeric_request_id_is_echoed_verbatim() {
        let id = RequestId::from_value(json!(42));
        let response = Response::error(id.clone(), "unknown_kind", "nope");
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["request_id"], json!(42));
        assert_eq!(response.request_id(), &id);
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        assert_ne!(RequestId::generate(), RequestId::generate());
    }

    #[test]
    fn test_request_kind_wire_names() {
        for kind in [
            RequestKind::Health,
            RequestKind::Embed,
            RequestKind::Generate,
            RequestKind::Analyze,
            RequestKind::RouteDecision,
        ] {
            assert_eq!(RequestKind::from_wire(kind.as_str()), Some(kind));
        }
        assert_eq!(RequestKind::from_wire("translate"), None);
    }
}
