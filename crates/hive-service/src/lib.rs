//! # hive-service
//!
//! The model service: decodes line-delimited JSON requests, dispatches them
//! to the provider registry, analyzer and route classifier, and writes one
//! response line per request.
//!
//! ## Components
//! - [`ModeController`]: resolves full or minimal mode once at startup
//! - [`RequestHandler`]: per-request dispatch, errors become responses
//! - [`run_service`]: the sequential read, answer, flush loop

pub mod codec;
pub mod error;
pub mod handler;
pub mod mode;
pub mod server;

pub use codec::{decode_line, DecodeFailure, Incoming};
pub use error::ServiceError;
pub use handler::{RequestHandler, DEFAULT_GENERATE_MODEL};
pub use mode::{Capabilities, ModeController};
pub use server::{run_service, ServiceState, ServiceSummary};
