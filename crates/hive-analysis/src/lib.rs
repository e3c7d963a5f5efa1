//! # hive-analysis
//!
//! Embedding-derived code metrics and query routing.
//!
//! Both halves are pure functions of their input and the configured
//! constants, so they can run on any thread without shared state.

pub mod analyzer;
pub mod router;
pub mod stats;

pub use analyzer::{
    AnalysisResult, AnalysisTask, Analyzer, ComplexityReport, GenericReport, PatternReport,
    QualityReport,
};
pub use router::{RouteClassifier, RouteDecision};
pub use stats::VectorStats;
