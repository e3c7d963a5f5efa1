//! Query routing.
//!
//! Decides whether a user query can be answered by the fast single-model
//! path (`simple`) or needs the multi-stage path (`complex`). The decision is
//! a keyword and length heuristic; it never touches a model.

use hive_types::{QueryRoute, RoutingSettings};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Result of routing one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub route: QueryRoute,

    /// Confidence score (0.0-1.0)
    pub confidence: f64,

    /// Complexity keywords found in the query, in configured order
    pub matched_keywords: Vec<String>,

    /// Explanation of why this route was chosen
    pub reason: String,
}

/// Keyword and length based query router.
pub struct RouteClassifier {
    config: RoutingSettings,
    keywords: Vec<String>,
}

impl RouteClassifier {
    pub fn new() -> Self {
        Self::with_config(RoutingSettings::default())
    }

    pub fn with_config(config: RoutingSettings) -> Self {
        let mut keywords: Vec<String> = Vec::with_capacity(config.complexity_keywords.len());
        for keyword in &config.complexity_keywords {
            let keyword = keyword.trim().to_lowercase();
            if !keyword.is_empty() && !keywords.contains(&keyword) {
                keywords.push(keyword);
            }
        }

        Self { config, keywords }
    }

    /// Classify a query. Simple iff it is short and contains no complexity keyword.
    pub fn classify(&self, query: &str) -> RouteDecision {
        let trimmed = query.trim();
        let query_lower = trimmed.to_lowercase();
        let length = trimmed.chars().count();

        let matched_keywords: Vec<String> = self
            .keywords
            .iter()
            .filter(|k| query_lower.contains(k.as_str()))
            .cloned()
            .collect();

        let too_long = length > self.config.simple_max_chars;

        let (route, reason) = if !matched_keywords.is_empty() {
            (
                QueryRoute::Complex,
                format!("Matched complexity keywords: {}", matched_keywords.join(", ")),
            )
        } else if too_long {
            (
                QueryRoute::Complex,
                format!(
                    "Query length {length} exceeds {} characters",
                    self.config.simple_max_chars
                ),
            )
        } else {
            (
                QueryRoute::Simple,
                "Short query without complexity keywords".to_string(),
            )
        };

        debug!(
            route = ?route,
            length,
            keywords = ?matched_keywords,
            "Routed query"
        );

        RouteDecision {
            route,
            confidence: self.config.confidence,
            matched_keywords,
            reason,
        }
    }
}

impl Default for RouteClassifier {
    fn default() -> Self {
        Self::new()
    }
}
