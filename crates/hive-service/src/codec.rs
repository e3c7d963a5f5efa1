//! Request line decoding.
//!
//! Turns one raw input line into a typed [`Request`] plus the id to echo.
//! Failures carry whatever id could be recovered so the error response can
//! still be correlated.

use hive_types::{
    AnalyzePayload, EmbedPayload, GeneratePayload, Request, RequestId, RequestKind,
    RouteDecisionPayload, PROTOCOL_VERSION,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::ServiceError;

/// A decoded request and its correlation id.
#[derive(Debug, Clone)]
pub struct Incoming {
    pub request_id: RequestId,
    pub request: Request,
}

/// A line that could not be turned into a request.
#[derive(Debug)]
pub struct DecodeFailure {
    pub request_id: RequestId,
    pub error: ServiceError,
}

impl DecodeFailure {
    fn new(request_id: RequestId, error: ServiceError) -> Self {
        Self { request_id, error }
    }

    fn unknown(error: ServiceError) -> Self {
        Self::new(RequestId::unknown(), error)
    }
}

/// Decode one request line (without its trailing newline).
pub fn decode_line(line: &[u8]) -> Result<Incoming, DecodeFailure> {
    let text = std::str::from_utf8(line).map_err(|e| {
        DecodeFailure::unknown(ServiceError::Decode(format!("invalid UTF-8: {e}")))
    })?;

    let value: Value = serde_json::from_str(text)
        .map_err(|e| DecodeFailure::unknown(ServiceError::Decode(e.to_string())))?;

    let Value::Object(object) = value else {
        return Err(DecodeFailure::unknown(ServiceError::Decode(
            "expected a JSON object".to_string(),
        )));
    };

    let request_id = match object.get("request_id") {
        Some(Value::Null) | None => RequestId::generate(),
        Some(id) => RequestId::from_value(id.clone()),
    };

    check_version(&object).map_err(|e| DecodeFailure::new(request_id.clone(), e))?;

    let kind = match object.get("type") {
        Some(Value::String(name)) => RequestKind::from_wire(name).ok_or_else(|| {
            DecodeFailure::new(request_id.clone(), ServiceError::UnknownKind(name.clone()))
        })?,
        Some(other) => {
            return Err(DecodeFailure::new(
                request_id,
                ServiceError::UnknownKind(other.to_string()),
            ))
        }
        None => {
            return Err(DecodeFailure::new(
                request_id,
                ServiceError::InvalidRequest("missing field `type`".to_string()),
            ))
        }
    };

    let request = build_request(kind, object)
        .map_err(|e| DecodeFailure::new(request_id.clone(), e))?;

    Ok(Incoming {
        request_id,
        request,
    })
}

fn check_version(object: &Map<String, Value>) -> Result<(), ServiceError> {
    let Some(version) = object.get("protocol_version") else {
        return Ok(());
    };
    let requested = version.as_u64().ok_or_else(|| {
        ServiceError::InvalidRequest(format!(
            "protocol_version must be a non-negative integer, got {version}"
        ))
    })?;
    if requested > u64::from(PROTOCOL_VERSION) {
        return Err(ServiceError::UnsupportedVersion {
            requested,
            supported: PROTOCOL_VERSION,
        });
    }
    Ok(())
}

fn build_request(kind: RequestKind, object: Map<String, Value>) -> Result<Request, ServiceError> {
    let body = Value::Object(object);
    Ok(match kind {
        RequestKind::Health => Request::Health,
        RequestKind::Embed => Request::Embed(payload::<EmbedPayload>(kind, body)?),
        RequestKind::Generate => Request::Generate(payload::<GeneratePayload>(kind, body)?),
        RequestKind::Analyze => Request::Analyze(payload::<AnalyzePayload>(kind, body)?),
        RequestKind::RouteDecision => {
            Request::RouteDecision(payload::<RouteDecisionPayload>(kind, body)?)
        }
    })
}

fn payload<T: DeserializeOwned>(kind: RequestKind, body: Value) -> Result<T, ServiceError> {
    serde_json::from_value(body)
        .map_err(|e| ServiceError::InvalidRequest(format!("{kind} request: {e}")))
}
