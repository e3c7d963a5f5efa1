//! Provider catalog.
//!
//! Maps provider names to a tagged [`ProviderKind`]. Each kind has exactly
//! one construction path in [`crate::loader`].

use hive_types::Mode;

use crate::minimal::MINIMAL_PROVIDER;

/// General-purpose sentence embedding model.
pub const GENERAL_PROVIDER: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Code-understanding model used by default for analysis in full mode.
pub const CODE_PROVIDER: &str = "microsoft/codebert-base";

/// How a BERT-family provider turns token states into one vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pooling {
    /// `tanh(dense(h[CLS]))` when pooler weights exist, else mean
    Pooler,
    /// Attention-masked mean of the last hidden state
    Mean,
}

/// A BERT-family model on the Hugging Face Hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BertSpec {
    pub repo_id: &'static str,
    pub pooling: Pooling,
    pub max_seq_length: usize,
}

/// The kinds of provider the worker can construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderKind {
    /// Heuristic provider, always available
    Minimal,
    /// Candle BERT-family provider
    Bert(BertSpec),
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSpec {
    pub name: &'static str,
    pub kind: ProviderKind,
    /// Provider to serve this name when its own construction fails
    pub fallback: Option<&'static str>,
}

const fn bert(
    name: &'static str,
    pooling: Pooling,
    max_seq_length: usize,
    fallback: Option<&'static str>,
) -> ProviderSpec {
    ProviderSpec {
        name,
        kind: ProviderKind::Bert(BertSpec {
            repo_id: name,
            pooling,
            max_seq_length,
        }),
        fallback,
    }
}

static CATALOG: &[ProviderSpec] = &[
    ProviderSpec {
        name: MINIMAL_PROVIDER,
        kind: ProviderKind::Minimal,
        fallback: None,
    },
    bert(GENERAL_PROVIDER, Pooling::Mean, 256, None),
    bert(CODE_PROVIDER, Pooling::Pooler, 512, Some(GENERAL_PROVIDER)),
    bert("microsoft/graphcodebert-base", Pooling::Pooler, 512, None),
    bert("microsoft/unixcoder-base", Pooling::Pooler, 512, None),
];

/// All known providers.
pub fn catalog() -> &'static [ProviderSpec] {
    CATALOG
}

/// Look up a provider by name.
pub fn lookup(name: &str) -> Option<&'static ProviderSpec> {
    CATALOG.iter().find(|spec| spec.name == name)
}

/// Provider used for embed requests that do not name one.
pub fn default_embed_provider(mode: Mode) -> &'static str {
    match mode {
        Mode::Full => GENERAL_PROVIDER,
        Mode::Minimal => MINIMAL_PROVIDER,
    }
}

/// Provider used for analyze requests that do not name one.
pub fn default_analyze_provider(mode: Mode) -> &'static str {
    match mode {
        Mode::Full => CODE_PROVIDER,
        Mode::Minimal => MINIMAL_PROVIDER,
    }
}
