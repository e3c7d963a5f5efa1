//! # hive-types
//!
//! Shared types for the Hive model worker:
//! - Settings: layered configuration
//! - Protocol: request and response envelopes for the stdio channel
//! - Errors: configuration and serialization failures

pub mod config;
pub mod error;
pub mod protocol;

pub use config::{
    AnalysisSettings, FailurePolicy, LimitSettings, Mode, RoutingSettings, ServiceMode, Settings,
};
pub use error::HiveError;
pub use protocol::{
    AnalyzePayload, EmbedPayload, GeneratePayload, QueryRoute, Request, RequestId, RequestKind,
    Response, RouteDecisionPayload, PROTOCOL_VERSION,
};
