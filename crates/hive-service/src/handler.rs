//! Request dispatch.
//!
//! [`RequestHandler`] owns everything one service instance needs to answer
//! requests: the provider registry, the analyzer and the route classifier.
//! Handling is synchronous; the service loop runs it on a blocking task.

use hive_analysis::{AnalysisTask, Analyzer, RouteClassifier};
use hive_embeddings::{
    default_analyze_provider, default_embed_provider, CatalogLoader, LoadedProvider,
    ProviderLoader, ProviderRegistry,
};
use hive_types::{
    AnalyzePayload, EmbedPayload, GeneratePayload, LimitSettings, Mode, Request, RequestId,
    Response, RouteDecisionPayload, Settings,
};
use tracing::{debug, warn};

use crate::codec::Incoming;
use crate::error::ServiceError;

/// Model named in placeholder generations when the request names none.
pub const DEFAULT_GENERATE_MODEL: &str = "mistral-7b";

const PROMPT_PREVIEW_CHARS: usize = 50;

/// Answers decoded requests for one service instance.
pub struct RequestHandler {
    registry: ProviderRegistry,
    analyzer: Analyzer,
    router: RouteClassifier,
    limits: LimitSettings,
    embed_model: String,
    analyze_model: String,
}

impl RequestHandler {
    /// Build a handler whose providers come from `loader`.
    pub fn new(settings: &Settings, mode: Mode, loader: Box<dyn ProviderLoader>) -> Self {
        let embed_model = settings
            .default_embed_model
            .clone()
            .unwrap_or_else(|| default_embed_provider(mode).to_string());
        let analyze_model = settings
            .default_analyze_model
            .clone()
            .unwrap_or_else(|| default_analyze_provider(mode).to_string());

        Self {
            registry: ProviderRegistry::new(mode, settings.failure_policy, loader),
            analyzer: Analyzer::with_config(settings.analysis.clone()),
            router: RouteClassifier::with_config(settings.routing.clone()),
            limits: settings.limits.clone(),
            embed_model,
            analyze_model,
        }
    }

    /// Build a handler backed by the on-disk model cache.
    pub fn from_settings(settings: &Settings, mode: Mode) -> Self {
        Self::new(settings, mode, Box::new(CatalogLoader::from_settings(settings)))
    }

    pub fn mode(&self) -> Mode {
        self.registry.mode()
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn limits(&self) -> &LimitSettings {
        &self.limits
    }

    pub fn health(&self, request_id: RequestId) -> Response {
        Response::health(request_id, self.mode().as_str(), self.registry.list_loaded())
    }

    /// Answer one request. Never fails: errors become `error` responses.
    pub fn handle(&self, incoming: Incoming) -> Response {
        let Incoming {
            request_id,
            request,
        } = incoming;
        let kind = request.kind();

        match self.dispatch(request_id.clone(), request) {
            Ok(response) => response,
            Err(err) => {
                warn!(kind = %kind, request_id = %request_id, error = %err, "Request failed");
                Response::error(request_id, err.code(), err.to_string())
            }
        }
    }

    fn dispatch(&self, request_id: RequestId, request: Request) -> Result<Response, ServiceError> {
        match request {
            Request::Health => Ok(self.health(request_id)),
            Request::Embed(payload) => self.embed(request_id, payload),
            Request::Analyze(payload) => self.analyze(request_id, payload),
            Request::Generate(payload) => Ok(self.generate(request_id, payload)),
            Request::RouteDecision(payload) => Ok(self.route(request_id, payload)),
        }
    }

    fn provider(&self, name: &str) -> Result<LoadedProvider, ServiceError> {
        self.registry
            .ensure_loaded(name)
            .map_err(|e| ServiceError::ProviderLoad(e.to_string()))
    }

    fn embed(
        &self,
        request_id: RequestId,
        payload: EmbedPayload,
    ) -> Result<Response, ServiceError> {
        if payload.texts.len() > self.limits.max_texts_per_request {
            return Err(ServiceError::InvalidRequest(format!(
                "{} texts exceeds the limit of {}",
                payload.texts.len(),
                self.limits.max_texts_per_request
            )));
        }

        let name = payload.model.as_deref().unwrap_or(&self.embed_model);
        let provider = self.provider(name)?;
        let dimension = provider.handle.info().dimension;

        let embeddings = if payload.texts.is_empty() {
            Vec::new()
        } else {
            provider
                .handle
                .embed_texts(&payload.texts)
                .map_err(|e| ServiceError::InternalAnalysis(e.to_string()))?
                .into_iter()
                .map(|embedding| embedding.into_values())
                .collect()
        };

        debug!(
            request_id = %request_id,
            model = name,
            served_by = %provider.served_by,
            count = embeddings.len(),
            "Embedded batch"
        );

        Ok(Response::EmbedResult {
            request_id,
            model: provider.served_by,
            dimension,
            embeddings,
        })
    }

    fn analyze(
        &self,
        request_id: RequestId,
        payload: AnalyzePayload,
    ) -> Result<Response, ServiceError> {
        let task = payload
            .task
            .as_deref()
            .map(AnalysisTask::parse)
            .unwrap_or_default();
        let name = payload.model.as_deref().unwrap_or(&self.analyze_model);
        let provider = self.provider(name)?;

        let embedding = provider
            .handle
            .embed(&payload.code)
            .map_err(|e| ServiceError::InternalAnalysis(e.to_string()))?;
        let result = self.analyzer.analyze(&embedding.values, &task);
        let result = serde_json::to_value(result)
            .map_err(|e| ServiceError::InternalAnalysis(e.to_string()))?;

        debug!(
            request_id = %request_id,
            task = %task,
            served_by = %provider.served_by,
            "Analyzed code"
        );

        Ok(Response::AnalyzeResult {
            request_id,
            model: provider.served_by,
            task: task.to_string(),
            result,
        })
    }

    /// Deterministic placeholder; there is no generation capability.
    fn generate(&self, request_id: RequestId, payload: GeneratePayload) -> Response {
        let model = payload.model.as_deref().unwrap_or(DEFAULT_GENERATE_MODEL);
        let preview: String = payload.prompt.chars().take(PROMPT_PREVIEW_CHARS).collect();
        Response::GenerateResult {
            request_id,
            text: format!("Generated response for: {preview}... (using {model})"),
        }
    }

    fn route(&self, request_id: RequestId, payload: RouteDecisionPayload) -> Response {
        let decision = self.router.classify(&payload.query);
        Response::RouteDecision {
            request_id,
            mode: decision.route,
            confidence: decision.confidence,
            matched_keywords: decision.matched_keywords,
            reason: decision.reason,
        }
    }
}
