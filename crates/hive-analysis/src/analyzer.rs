//! Heuristic metrics derived from an embedding.
//!
//! Every function here is a pure function of the vector and the configured
//! constants. Degenerate vectors (empty, all zeros, non-finite) never error:
//! they produce the floor values.

use std::fmt;

use hive_types::AnalysisSettings;
use serde::Serialize;

use crate::stats::VectorStats;

/// Analysis task requested by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AnalysisTask {
    #[default]
    Quality,
    Patterns,
    Complexity,
    /// Any other well-formed task name; answered with a generic envelope
    Other(String),
}

impl AnalysisTask {
    pub fn parse(name: &str) -> Self {
        match name {
            "quality" => Self::Quality,
            "patterns" => Self::Patterns,
            "complexity" => Self::Complexity,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Quality => "quality",
            Self::Patterns => "patterns",
            Self::Complexity => "complexity",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for AnalysisTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub quality_score: f64,
    pub consistency: f64,
    pub completeness: f64,
    pub confidence: f64,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternReport {
    pub patterns: Vec<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ComplexityReport {
    pub cyclomatic_complexity: u32,
    pub cognitive_complexity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenericReport {
    pub task: String,
    pub result: String,
    pub embedding_dim: usize,
    pub confidence: f64,
}

/// Task-specific analysis output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnalysisResult {
    Quality(QualityReport),
    Patterns(PatternReport),
    Complexity(ComplexityReport),
    Generic(GenericReport),
}

/// Embedding analyzer.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: AnalysisSettings,
}

impl Analyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: AnalysisSettings) -> Self {
        Self { config }
    }

    /// Run `task` over one embedding.
    pub fn analyze(&self, vector: &[f32], task: &AnalysisTask) -> AnalysisResult {
        match task {
            AnalysisTask::Quality => AnalysisResult::Quality(self.quality(vector)),
            AnalysisTask::Patterns => AnalysisResult::Patterns(self.patterns(vector)),
            AnalysisTask::Complexity => AnalysisResult::Complexity(self.complexity(vector)),
            AnalysisTask::Other(name) => AnalysisResult::Generic(GenericReport {
                task: name.clone(),
                result: "Analysis completed".to_string(),
                embedding_dim: vector.len(),
                confidence: self.config.generic_confidence,
            }),
        }
    }

    /// `clamp(variance * K, floor, ceiling)`, or the default score without signal.
    pub fn quality_score(&self, vector: &[f32]) -> f64 {
        let c = &self.config;
        match VectorStats::compute(vector) {
            Some(stats) => (stats.variance * c.quality_scale)
                .max(c.quality_floor)
                .min(c.quality_ceiling),
            None => c.quality_default,
        }
    }

    pub fn quality(&self, vector: &[f32]) -> QualityReport {
        QualityReport {
            quality_score: self.quality_score(vector),
            consistency: self.config.consistency,
            completeness: self.config.completeness,
            confidence: self.config.quality_confidence,
            issues: Vec::new(),
        }
    }

    /// Independent tags: `functional` (high mean), `complex` (high spread),
    /// `detailed` (high dimension).
    pub fn patterns(&self, vector: &[f32]) -> PatternReport {
        let c = &self.config;
        let Some(stats) = VectorStats::compute(vector) else {
            return PatternReport {
                patterns: Vec::new(),
                confidence: 0.0,
            };
        };

        let mut patterns = Vec::new();
        if stats.mean > c.functional_mean_threshold {
            patterns.push("functional".to_string());
        }
        if stats.std_dev > c.complex_std_threshold {
            patterns.push("complex".to_string());
        }
        if stats.len > c.detailed_dimension_threshold {
            patterns.push("detailed".to_string());
        }

        PatternReport {
            patterns,
            confidence: c.pattern_confidence,
        }
    }

    pub fn complexity(&self, vector: &[f32]) -> ComplexityReport {
        let c = &self.config;
        let std_dev = VectorStats::compute(vector).map_or(0.0, |s| s.std_dev);
        ComplexityReport {
            cyclomatic_complexity: scaled(std_dev, c.cyclomatic_scale, c.cyclomatic_max),
            cognitive_complexity: scaled(std_dev, c.cognitive_scale, c.cognitive_max),
        }
    }
}

/// `floor(value * scale)` clamped to `[1, max]`.
fn scaled(value: f64, scale: f64, max: u32) -> u32 {
    // float-to-int casts saturate, so huge products land on u32::MAX before clamping
    ((value * scale).floor() as u32).max(1).min(max.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spread(amplitude: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| if i % 2 == 0 { amplitude } else { -amplitude })
            .collect()
    }

    #[test]
    fn test_quality_follows_variance() {
        let analyzer = Analyzer::new();
        // variance 0.0025 * 100 = 0.25
        let score = analyzer.quality_score(&spread(0.05, 64));
        assert!((score - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_quality_is_clamped() {
        let analyzer = Analyzer::new();
        assert!((analyzer.quality_score(&spread(10.0, 8)) - 0.9).abs() < 1e-12);
        assert!((analyzer.quality_score(&[0.5; 8]) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_quality_without_signal_is_default() {
        let analyzer = Analyzer::new();
        let report = analyzer.quality(&[]);
        assert!((report.quality_score - 0.5).abs() < 1e-12);
        assert!((report.consistency - 0.85).abs() < 1e-12);
        assert!((report.completeness - 0.90).abs() < 1e-12);
        assert!((report.confidence - 0.88).abs() < 1e-12);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_quality_range_over_many_vectors() {
        let analyzer = Analyzer::new();
        for amplitude in [0.0, 1e-4, 0.01, 0.03, 0.08, 0.5, 3.0, 1e6] {
            for len in [1, 7, 384, 768] {
                let score = analyzer.quality_score(&spread(amplitude, len));
                assert!((0.1..=0.9).contains(&score), "{amplitude}/{len} -> {score}");
            }
        }
    }

    #[test]
    fn test_patterns_tags_are_independent() {
        let analyzer = Analyzer::new();

        let shifted: Vec<f32> = spread(0.05, 16).iter().map(|v| v + 0.2).collect();
        assert_eq!(analyzer.patterns(&shifted).patterns, vec!["functional"]);

        assert_eq!(analyzer.patterns(&spread(0.5, 16)).patterns, vec!["complex"]);

        let wide: Vec<f32> = spread(0.01, 768);
        assert_eq!(analyzer.patterns(&wide).patterns, vec!["detailed"]);

        let everything: Vec<f32> = spread(0.5, 768).iter().map(|v| v + 0.3).collect();
        assert_eq!(
            analyzer.patterns(&everything).patterns,
            vec!["functional", "complex", "detailed"]
        );

        let report = analyzer.patterns(&spread(0.01, 16));
        assert!(report.patterns.is_empty());
        assert!((report.confidence - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_patterns_empty_vector() {
        let report = Analyzer::new().patterns(&[]);
        assert!(report.patterns.is_empty());
        assert_eq!(report.confidence, 0.0);
    }

    #[test]
    fn test_complexity_scales_and_clamps() {
        let analyzer = Analyzer::new();
        // std 0.1 -> 5 and 7
        let report = analyzer.complexity(&spread(0.1, 32));
        assert_eq!(report.cyclomatic_complexity, 5);
        assert_eq!(report.cognitive_complexity, 7);

        let report = analyzer.complexity(&spread(100.0, 32));
        assert_eq!(report.cyclomatic_complexity, 20);
        assert_eq!(report.cognitive_complexity, 30);

        let report = analyzer.complexity(&spread(1e-6, 32));
        assert_eq!(report.cyclomatic_complexity, 1);
        assert_eq!(report.cognitive_complexity, 1);
    }

    #[test]
    fn test_complexity_of_degenerate_vectors_is_one() {
        let analyzer = Analyzer::new();
        for vector in [vec![], vec![0.0; 384]] {
            let report = analyzer.complexity(&vector);
            assert_eq!(report.cyclomatic_complexity, 1);
            assert_eq!(report.cognitive_complexity, 1);
        }
    }

    #[test]
    fn test_unknown_task_is_generic_envelope() {
        let analyzer = Analyzer::new();
        let task = AnalysisTask::parse("security");
        assert_eq!(task, AnalysisTask::Other("security".to_string()));

        match analyzer.analyze(&[0.1; 12], &task) {
            AnalysisResult::Generic(report) => {
                assert_eq!(report.task, "security");
                assert_eq!(report.result, "Analysis completed");
                assert_eq!(report.embedding_dim, 12);
                assert!((report.confidence - 0.75).abs() < 1e-12);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_serialized_shapes() {
        let analyzer = Analyzer::new();
        let complexity =
            serde_json::to_value(analyzer.analyze(&[], &AnalysisTask::Complexity)).unwrap();
        assert_eq!(complexity["cyclomatic_complexity"], 1);
        assert_eq!(complexity["cognitive_complexity"], 1);

        let quality = serde_json::to_value(analyzer.analyze(&[], &AnalysisTask::Quality)).unwrap();
        assert_eq!(quality["quality_score"], 0.5);
        assert!(quality["issues"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_custom_constants() {
        let analyzer = Analyzer::with_config(AnalysisSettings {
            quality_scale: 10.0,
            ..AnalysisSettings::default()
        });
        // variance 0.0025 * 10 = 0.025 -> floor
        assert!((analyzer.quality_score(&spread(0.05, 64)) - 0.1).abs() < 1e-12);
    }
}
