//! Question intent classification and answer routing.
//!
//! The router is the central state machine of the query path. A question is
//! classified into one of three intents by a pure function, then dispatched:
//!
//! - **Refinement** ("in N words") rewrites the tenant's previous answer,
//!   or returns it untouched when it is already short enough.
//! - **Summary** condenses up to a handful of retrieved (or stored) chunks.
//! - **Grounded QA** (the default) embeds the question, retrieves the
//!   nearest chunks, and prompts the model to answer only from them.
//!
//! Grounded QA carries a recall safety net: when vector retrieval comes
//! back empty or degenerate, a deterministic case-insensitive substring
//! scan over all stored records can answer exact-mention questions without
//! touching the model at all. Semantic retrieval misses exact-mention and
//! yes/no queries often enough that the scan earns its keep.

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::{tenant_key, AnswerCache};
use crate::config::Config;
use crate::embedding::Embedder;
use crate::llm::CompletionModel;
use crate::models::ScoredRecord;
use crate::store::VectorStore;

/// Context placeholder when retrieval produces no documents.
pub const NO_CONTEXT_SENTINEL: &str = "No relevant context found in the uploaded documents.";

/// The exact not-found sentence the grounded prompt instructs the model to use.
pub const NOT_FOUND_ANSWER: &str = "The answer is not found in the provided document.";

/// Fixed answer for a summary request with nothing to summarize.
pub const SUMMARY_NOT_FOUND: &str =
    "The answer to your question is not found in the provided document. No document text available to summarize.";

// ============ Intent classification ============

/// Question intent, in evaluation precedence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Refinement { word_target: usize },
    Summary,
    GroundedQa,
}

fn summary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bsummary\b|\bsummarize\b|\bsummarise\b|tl;dr").unwrap())
}

fn refine_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)in\s+(\d+)\s+words?").unwrap())
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^Chunk\s*\d+").unwrap())
}

fn quoted_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"['"“”](.+?)['"“”]"#).unwrap())
}

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\w+").unwrap())
}

/// Classifies a question. Summary keywords are checked first so that
/// "summarise in 100 words" stays a summary rather than a refinement.
pub fn classify_intent(question: &str) -> Intent {
    if summary_re().is_match(question) {
        return Intent::Summary;
    }
    if let Some(caps) = refine_re().captures(question.trim()) {
        if let Ok(word_target) = caps[1].parse::<usize>() {
            return Intent::Refinement { word_target };
        }
    }
    Intent::GroundedQa
}

/// Candidate search terms for the fallback substring scan: the first quoted
/// span if the question has one, otherwise every word longer than 3 chars.
fn extract_search_terms(question: &str) -> Vec<String> {
    if let Some(caps) = quoted_re().captures(question) {
        let term = caps[1].trim().to_string();
        if !term.is_empty() {
            return vec![term];
        }
    }
    word_re()
        .find_iter(question)
        .map(|m| m.as_str().to_string())
        .filter(|w| w.len() > 3)
        .collect()
}

/// True when the first few retrieved docs look like placeholder entries
/// ("Chunk 0", "Chunk 1", ...) left behind by earlier ingests.
fn docs_look_like_placeholders(docs: &[String]) -> bool {
    docs.iter()
        .take(5)
        .any(|d| placeholder_re().is_match(d.trim()))
}

fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

// ============ Request / response ============

#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub prev_answer: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<i64>>,
    pub question: String,
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewritten_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl AskResponse {
    fn base(answer: String, question: &str, tenant_id: Option<String>) -> Self {
        Self {
            answer,
            chunks: None,
            citations: None,
            question: question.to_string(),
            tenant_id,
            rewritten_from: None,
            word_limit: None,
            note: None,
        }
    }
}

// ============ Errors ============

/// Router-level error taxonomy. The HTTP layer maps variants to status
/// codes; the CLI prints them.
#[derive(Debug)]
pub enum AskError {
    /// The request needs input the caller did not provide.
    PreconditionMissing(String),
    /// The embedding or generative model is unreachable or misconfigured.
    Dependency(String),
    /// The vector store rejected the operation.
    Store(String),
    Other(anyhow::Error),
}

impl std::fmt::Display for AskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AskError::PreconditionMissing(msg) => write!(f, "{}", msg),
            AskError::Dependency(msg) => write!(f, "dependency unavailable: {}", msg),
            AskError::Store(msg) => write!(f, "store error: {}", msg),
            AskError::Other(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for AskError {}

impl From<anyhow::Error> for AskError {
    fn from(e: anyhow::Error) -> Self {
        AskError::Other(e)
    }
}

// ============ Router ============

struct FallbackHit {
    term: String,
    chunk_index: i64,
    snippet: String,
}

/// The retrieval router. All collaborators are injected so tests can swap
/// in in-memory stores and recording model stubs.
pub struct Router {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn CompletionModel>,
    cache: Arc<AnswerCache>,
    config: Arc<Config>,
}

impl Router {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn CompletionModel>,
        cache: Arc<AnswerCache>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store,
            embedder,
            llm,
            cache,
            config,
        }
    }

    pub async fn ask(&self, req: AskRequest) -> Result<AskResponse, AskError> {
        let intent = classify_intent(&req.question);
        debug!(?intent, question = %req.question, "question classified");

        match intent {
            Intent::Refinement { word_target } => self.refine(req, word_target).await,
            Intent::Summary => self.summarize(req).await,
            Intent::GroundedQa => self.grounded(req).await,
        }
    }

    // ---- Refinement ----

    async fn refine(
        &self,
        req: AskRequest,
        word_target: usize,
    ) -> Result<AskResponse, AskError> {
        let tenant = tenant_key(req.tenant_id.as_deref());

        let source_answer = req
            .prev_answer
            .clone()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.cache.get(&tenant));

        let source_answer = source_answer.ok_or_else(|| {
            AskError::PreconditionMissing(
                "Refinement requested (e.g. 'in 100 words') but no previous answer supplied. \
                 Resend the original answer in 'prev_answer' or ask the original question first."
                    .to_string(),
            )
        })?;

        let word_count = count_words(&source_answer);
        if word_count <= word_target {
            // Already short enough; idempotent no-op, no model call.
            let mut resp =
                AskResponse::base(source_answer.clone(), &req.question, req.tenant_id.clone());
            resp.rewritten_from = Some(source_answer);
            resp.word_limit = Some(word_target);
            resp.note = Some(format!(
                "Original answer already {} words; no shortening performed.",
                word_count
            ));
            return Ok(resp);
        }

        let prompt = format!(
            "Rewrite the following answer to be at most {} words. \
             Do not add new information; only rephrase and shorten while preserving facts.\n\n\
             Original answer:\n{}\n\nRewritten answer:\n",
            word_target, source_answer
        );

        let rewritten = self
            .llm
            .complete(&prompt)
            .await
            .map_err(|e| AskError::Dependency(e.to_string()))?;

        self.cache.set(&tenant, &rewritten);

        let mut resp = AskResponse::base(rewritten, &req.question, req.tenant_id.clone());
        resp.rewritten_from = Some(source_answer);
        resp.word_limit = Some(word_target);
        Ok(resp)
    }

    // ---- Summary ----

    async fn summarize(&self, req: AskRequest) -> Result<AskResponse, AskError> {
        let retrieval = &self.config.retrieval;

        // Fresh retrieval is preferred but best-effort on this path; a
        // summary can still be produced from a plain scan of the store.
        let retrieved = match self.retrieve(&req.question).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "summary retrieval failed; falling back to stored records");
                Vec::new()
            }
        };

        let docs: Vec<String> = retrieved.iter().map(|r| r.record.text.clone()).collect();
        let citations: Vec<i64> = retrieved
            .iter()
            .map(|r| r.record.metadata.chunk_index)
            .collect();

        let mut selected: Vec<String> = docs.iter().take(retrieval.summary_chunks).cloned().collect();

        if selected.is_empty() {
            match self
                .store
                .full_scan(&retrieval.collection, retrieval.scan_limit)
                .await
            {
                Ok(records) => {
                    selected = records
                        .iter()
                        .take(retrieval.summary_chunks)
                        .map(|r| r.text.clone())
                        .collect();
                }
                Err(e) => warn!(error = %e, "failed to pull stored records for summary"),
            }
        }

        if selected.is_empty() {
            let mut resp =
                AskResponse::base(SUMMARY_NOT_FOUND.to_string(), &req.question, req.tenant_id);
            resp.chunks = Some(docs);
            resp.citations = Some(citations);
            return Ok(resp);
        }

        let mut summary_text = selected.join("\n");
        if summary_text.chars().count() > retrieval.summary_max_chars {
            summary_text = summary_text
                .chars()
                .take(retrieval.summary_max_chars)
                .collect();
            debug!(
                max_chars = retrieval.summary_max_chars,
                "summary content truncated"
            );
        }

        let prompt = format!(
            "You are an assistant. Summarize the following document content concisely. \
             Use ONLY the content provided. Do not add new facts or outside knowledge.\n\n\
             Content:\n{}\n\nSummary:\n",
            summary_text
        );

        let answer = self
            .llm
            .complete(&prompt)
            .await
            .map_err(|e| AskError::Dependency(e.to_string()))?;

        let tenant = tenant_key(req.tenant_id.as_deref());
        self.cache.set(&tenant, &answer);

        let mut resp = AskResponse::base(answer, &req.question, req.tenant_id);
        resp.chunks = Some(docs);
        resp.citations = Some(citations);
        Ok(resp)
    }

    // ---- Grounded QA ----

    async fn grounded(&self, req: AskRequest) -> Result<AskResponse, AskError> {
        let retrieval = &self.config.retrieval;

        let query_vec = self
            .embedder
            .embed_query(&req.question)
            .await
            .map_err(|e| AskError::Dependency(e.to_string()))?;

        let retrieved = self
            .store
            .query_by_vector(&retrieval.collection, &query_vec, retrieval.top_k)
            .await
            .map_err(|e| AskError::Store(e.to_string()))?;

        let docs: Vec<String> = retrieved.iter().map(|r| r.record.text.clone()).collect();
        let citations: Vec<i64> = retrieved
            .iter()
            .map(|r| r.record.metadata.chunk_index)
            .collect();

        let context = if docs.is_empty() {
            NO_CONTEXT_SENTINEL.to_string()
        } else {
            docs.join("\n")
        };

        for (i, doc) in docs.iter().take(2).enumerate() {
            debug!(doc = i, preview = %preview(doc, 200), "retrieved doc");
        }
        debug!(
            total = docs.len(),
            context_preview = %preview(&context, 500),
            "retrieval complete"
        );

        let trigger_fallback = docs.is_empty()
            || context.starts_with("No relevant context")
            || docs_look_like_placeholders(&docs);

        if trigger_fallback {
            match self.fallback_search(&req.question).await {
                Ok(Some(hit)) => {
                    let answer = format!(
                        "Yes — found '{}' in the uploaded documents (chunk {}). Snippet: {}",
                        hit.term, hit.chunk_index, hit.snippet
                    );
                    let mut resp = AskResponse::base(answer, &req.question, req.tenant_id);
                    resp.chunks = Some(docs);
                    resp.citations = Some(citations);
                    return Ok(resp);
                }
                Ok(None) => {}
                // A broken fallback never escalates; the request proceeds
                // as if it found nothing.
                Err(e) => warn!(error = %e, "fallback search error"),
            }
        }

        let source_names: Vec<String> = retrieved
            .iter()
            .map(|r| r.record.metadata.source.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let context_block = if source_names.is_empty() {
            context
        } else {
            format!("Sources: {}\n\n{}", source_names.join(", "), context)
        };

        let prompt = format!(
            "You are an enterprise assistant. Use ONLY the following context to answer the \
             user's question. If the answer is not in the context, say '{}' Do NOT use any \
             outside knowledge.\n\nContext:\n{}\n\nQuestion: {}\n\n\
             Answer as concisely as possible. Do not invent question numbers or sections. \
             If not found, reply exactly: {}",
            NOT_FOUND_ANSWER, context_block, req.question, NOT_FOUND_ANSWER
        );

        let answer = self
            .llm
            .complete(&prompt)
            .await
            .map_err(|e| AskError::Dependency(e.to_string()))?;

        let tenant = tenant_key(req.tenant_id.as_deref());
        self.cache.set(&tenant, &answer);

        let mut resp = AskResponse::base(answer, &req.question, req.tenant_id);
        resp.chunks = Some(docs);
        resp.citations = Some(citations);
        Ok(resp)
    }

    async fn retrieve(&self, question: &str) -> Result<Vec<ScoredRecord>> {
        let retrieval = &self.config.retrieval;
        let vector = self.embedder.embed_query(question).await?;
        let results = self
            .store
            .query_by_vector(&retrieval.collection, &vector, retrieval.top_k)
            .await?;
        Ok(results)
    }

    /// Deterministic case-insensitive substring scan across stored records.
    async fn fallback_search(&self, question: &str) -> Result<Option<FallbackHit>> {
        let retrieval = &self.config.retrieval;
        let records = self
            .store
            .full_scan(&retrieval.collection, retrieval.scan_limit)
            .await?;

        let terms = extract_search_terms(question);
        debug!(?terms, records = records.len(), "fallback substring search");

        for record in &records {
            let text_lower = record.text.to_ascii_lowercase();
            for term in &terms {
                let term_lower = term.to_ascii_lowercase();
                if let Some(pos) = text_lower.find(&term_lower) {
                    return Ok(Some(FallbackHit {
                        term: term.clone(),
                        chunk_index: record.metadata.chunk_index,
                        snippet: snippet_around(&record.text, pos, 60),
                    }));
                }
            }
        }

        Ok(None)
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Takes up to `radius` characters either side of the match position,
/// snapping to char boundaries.
pub fn snippet_around(text: &str, byte_pos: usize, radius: usize) -> String {
    let char_starts: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let char_idx = char_starts.partition_point(|&i| i < byte_pos);
    let start = char_idx.saturating_sub(radius);
    let end = (char_idx + radius).min(char_starts.len());
    text.chars().skip(start).take(end - start).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refinement_detected() {
        assert_eq!(
            classify_intent("rewrite that in 20 words"),
            Intent::Refinement { word_target: 20 }
        );
        assert_eq!(
            classify_intent("In 100 Words please"),
            Intent::Refinement { word_target: 100 }
        );
    }

    #[test]
    fn summary_keywords_suppress_refinement() {
        assert_eq!(classify_intent("summarise this in 100 words"), Intent::Summary);
        assert_eq!(classify_intent("give me a summary"), Intent::Summary);
        assert_eq!(classify_intent("tl;dr of the report"), Intent::Summary);
        assert_eq!(classify_intent("Summarize the document"), Intent::Summary);
    }

    #[test]
    fn default_is_grounded_qa() {
        assert_eq!(
            classify_intent("What is the refund policy?"),
            Intent::GroundedQa
        );
        // "words" without a number is not a refinement.
        assert_eq!(classify_intent("explain in other words"), Intent::GroundedQa);
    }

    #[test]
    fn quoted_term_preferred() {
        let terms = extract_search_terms("What is mentioned about 'acme corp'?");
        assert_eq!(terms, vec!["acme corp".to_string()]);

        let terms = extract_search_terms("Is there any mention of “tridion”?");
        assert_eq!(terms, vec!["tridion".to_string()]);
    }

    #[test]
    fn unquoted_question_uses_long_words() {
        let terms = extract_search_terms("Is the SLA for eu region met?");
        assert_eq!(terms, vec!["region".to_string()]);
    }

    #[test]
    fn placeholder_docs_detected() {
        let docs = vec!["Chunk 0".to_string(), "real text".to_string()];
        assert!(docs_look_like_placeholders(&docs));
        let docs = vec!["  chunk 12 ".to_string()];
        assert!(docs_look_like_placeholders(&docs));
        let docs = vec!["The chunk of budget".to_string()];
        assert!(!docs_look_like_placeholders(&docs));
        assert!(!docs_look_like_placeholders(&[]));
    }

    #[test]
    fn word_counting_ignores_extra_whitespace() {
        assert_eq!(count_words("one  two\n three "), 3);
        assert_eq!(count_words(""), 0);
    }

    #[test]
    fn snippet_respects_char_boundaries() {
        let text = "ééé acme ééé";
        let pos = text.to_ascii_lowercase().find("acme").unwrap();
        let snippet = snippet_around(text, pos, 60);
        assert!(snippet.contains("acme"));
    }

    #[test]
    fn snippet_windows_long_text() {
        let text = format!("{}needle{}", "a".repeat(200), "b".repeat(200));
        let pos = text.find("needle").unwrap();
        let snippet = snippet_around(&text, pos, 60);
        assert!(snippet.contains("needle"));
        assert!(snippet.chars().count() <= 120 + "needle".len());
        assert!(snippet.starts_with('a'));
    }
}
