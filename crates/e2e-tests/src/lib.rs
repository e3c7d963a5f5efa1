//! End-to-end test infrastructure for the model worker.
//!
//! Provides a shared TestHarness that drives the real service loop over
//! in-memory channels, with provider construction counted and optionally
//! failed so full-mode behaviour can be exercised without model files.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hive_embeddings::{
    EmbeddingError, EmbeddingModel, MinimalEmbedder, ProviderKind, ProviderLoader,
};
use hive_service::{run_service, RequestHandler, ServiceSummary};
use hive_types::{Mode, Settings};
use serde_json::{json, Value};
use tokio::io::BufReader;

/// Loader that stands in for real providers.
///
/// Every kind is served by a heuristic embedder; repos listed in `failing`
/// fail to construct.
pub struct CountingLoader {
    calls: Arc<AtomicUsize>,
    failing: HashSet<String>,
}

impl CountingLoader {
    pub fn new(calls: Arc<AtomicUsize>, failing: &[&str]) -> Self {
        Self {
            calls,
            failing: failing.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ProviderLoader for CountingLoader {
    fn load(&self, kind: &ProviderKind) -> Result<Arc<dyn EmbeddingModel>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let ProviderKind::Bert(spec) = kind {
            if self.failing.contains(spec.repo_id) {
                return Err(EmbeddingError::ModelNotFound(format!(
                    "{} weights missing",
                    spec.repo_id
                )));
            }
        }
        Ok(Arc::new(MinimalEmbedder::new(4096)))
    }
}

/// Shared test harness for E2E tests.
///
/// One harness is one service instance: its registry persists across
/// [`TestHarness::exchange`] calls.
pub struct TestHarness {
    /// Keeps the model cache dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    pub settings: Settings,
    pub handler: Arc<RequestHandler>,
    constructions: Arc<AtomicUsize>,
}

impl TestHarness {
    /// Minimal-mode service.
    pub fn new() -> Self {
        Self::with_mode(Mode::Minimal, &[])
    }

    /// Service in `mode` whose listed repos fail to construct.
    pub fn with_mode(mode: Mode, failing: &[&str]) -> Self {
        Self::with_settings(Settings::default(), mode, failing)
    }

    pub fn with_settings(mut settings: Settings, mode: Mode, failing: &[&str]) -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        settings.model_cache_dir = temp_dir.path().to_string_lossy().to_string();
        settings.allow_download = false;

        let constructions = Arc::new(AtomicUsize::new(0));
        let loader = CountingLoader::new(constructions.clone(), failing);
        let handler = Arc::new(RequestHandler::new(&settings, mode, Box::new(loader)));

        Self {
            _temp_dir: temp_dir,
            settings,
            handler,
            constructions,
        }
    }

    /// Total provider constructions attempted so far.
    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }

    /// Run the service loop over raw input text.
    ///
    /// Returns every response line, the startup health response first.
    pub async fn exchange_raw(&self, input: &str) -> (Vec<Value>, ServiceSummary) {
        let mut output = Vec::new();
        let summary = run_service(
            self.handler.clone(),
            BufReader::new(input.as_bytes()),
            &mut output,
        )
        .await
        .expect("Service loop failed");

        let text = String::from_utf8(output).expect("Output is not UTF-8");
        let responses = text
            .lines()
            .map(|line| serde_json::from_str(line).expect("Output line is not JSON"))
            .collect();
        (responses, summary)
    }

    /// Send requests and return their responses, without the startup health.
    pub async fn exchange(&self, requests: &[Value]) -> Vec<Value> {
        let input: String = requests.iter().map(|r| format!("{r}\n")).collect();
        let (mut responses, _) = self.exchange_raw(&input).await;
        responses.remove(0);
        responses
    }

    /// Send one request and return its response.
    pub async fn send(&self, request: Value) -> Value {
        self.exchange(&[request])
            .await
            .pop()
            .expect("No response written")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a request object from its type, id and extra fields.
pub fn request(kind: &str, request_id: &str, fields: Value) -> Value {
    let mut body = json!({"type": kind, "request_id": request_id});
    if let (Some(object), Value::Object(extra)) = (body.as_object_mut(), fields) {
        object.extend(extra);
    }
    body
}

/// Code snippets of varied size and shape.
pub fn sample_inputs() -> Vec<String> {
    vec![
        String::new(),
        " ".to_string(),
        "x".to_string(),
        "fn main() { println!(\"hello\"); }".to_string(),
        "def f(x):\n    if x > 0:\n        return x\n    return -x\n".to_string(),
        "SELECT id, name FROM users WHERE id IN (1, 2, 3) ORDER BY name;".to_string(),
        "for (int i = 0; i < n; i++) { while (j < i) { if (a[j] > a[i]) { swap(a, i, j); } j++; } }"
            .repeat(20),
        "ñandú 漢字 🚀 émoji".to_string(),
        "a".repeat(50_000),
    ]
}

/// Code of increasing vocabulary, from one identifier to roughly a thousand.
pub fn size_ladder() -> Vec<String> {
    let module: String = (0..40)
        .map(|i| format!("fn clamp_{i}(v: u32) -> u32 {{ if v > {i} {{ v - {i} }} else {{ v }} }}\n"))
        .collect();
    let crate_sized: String = (0..300)
        .map(|i| format!("pub fn handler_{i}(value_{i}: u32) -> u32 {{ value_{i} + {i} }}\n"))
        .collect();
    vec![
        "x".to_string(),
        "fn main() { println!(\"hello\"); }".to_string(),
        "def f(x):\n    if x > 0:\n        return x\n    return -x\n".to_string(),
        "fn parse(input: &str) -> Result<Vec<Token>, Error> {\n    \
         let mut tokens = Vec::new();\n    for c in input.chars() {\n        \
         if c.is_whitespace() { continue; }\n        tokens.push(Token::from(c)?);\n    }\n    \
         Ok(tokens)\n}"
            .to_string(),
        module,
        crate_sized,
    ]
}
