//! Integration tests for the retrieval router, run over the in-memory
//! store with recording model stubs so that no-external-call paths can be
//! asserted exactly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;

use docqa::ask::{AskError, AskRequest, Router, SUMMARY_NOT_FOUND};
use docqa::cache::AnswerCache;
use docqa::config::Config;
use docqa::embedding::Embedder;
use docqa::llm::CompletionModel;
use docqa::models::RecordMetadata;
use docqa::store::memory::InMemoryStore;
use docqa::store::VectorStore;

// ============ Stubs ============

/// Embedder that returns the same unit vector for every text, so retrieval
/// scores tie and records come back in insertion order.
struct FlatEmbedder;

#[async_trait]
impl Embedder for FlatEmbedder {
    fn model_name(&self) -> &str {
        "flat"
    }
    fn dims(&self) -> usize {
        2
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

/// Embedder that always fails, for degraded-retrieval paths.
struct BrokenEmbedder;

#[async_trait]
impl Embedder for BrokenEmbedder {
    fn model_name(&self) -> &str {
        "broken"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("embedding model unreachable")
    }
}

/// Completion stub that records every prompt and returns a fixed answer.
struct RecordingLlm {
    response: String,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl RecordingLlm {
    fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CompletionModel for RecordingLlm {
    fn model_name(&self) -> &str {
        "recording"
    }
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.response.clone())
    }
}

// ============ Harness ============

fn test_config() -> Arc<Config> {
    let toml = r#"[db]
path = "/tmp/dqa-router-test.sqlite"

[server]
bind = "127.0.0.1:0"
"#;
    Arc::new(toml::from_str(toml).unwrap())
}

fn meta(source: &str, index: i64, text: &str) -> RecordMetadata {
    RecordMetadata {
        source: source.to_string(),
        chunk_index: index,
        text: text.to_string(),
        timestamp: "2025-01-01T00:00:00Z".to_string(),
    }
}

struct Harness {
    store: Arc<InMemoryStore>,
    llm: Arc<RecordingLlm>,
    cache: Arc<AnswerCache>,
    router: Router,
}

fn harness(llm_response: &str) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let llm = Arc::new(RecordingLlm::new(llm_response));
    let cache = Arc::new(AnswerCache::new());
    let router = Router::new(
        store.clone(),
        Arc::new(FlatEmbedder),
        llm.clone(),
        cache.clone(),
        test_config(),
    );
    Harness {
        store,
        llm,
        cache,
        router,
    }
}

/// Same harness with an embedder that always fails.
fn harness_broken_embedder(llm_response: &str) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let llm = Arc::new(RecordingLlm::new(llm_response));
    let cache = Arc::new(AnswerCache::new());
    let router = Router::new(
        store.clone(),
        Arc::new(BrokenEmbedder),
        llm.clone(),
        cache.clone(),
        test_config(),
    );
    Harness {
        store,
        llm,
        cache,
        router,
    }
}

async fn seed(store: &InMemoryStore, records: &[(&str, i64, &str)]) {
    let embeddings: Vec<Vec<f32>> = records.iter().map(|_| vec![1.0, 0.0]).collect();
    let metadatas: Vec<RecordMetadata> = records
        .iter()
        .map(|(source, index, text)| meta(source, *index, text))
        .collect();
    store
        .add("documents", &embeddings, &metadatas)
        .await
        .unwrap();
}

fn ask(question: &str) -> AskRequest {
    AskRequest {
        question: question.to_string(),
        tenant_id: None,
        prev_answer: None,
    }
}

// ============ Refinement ============

#[tokio::test]
async fn refinement_without_prior_answer_is_a_client_error() {
    let h = harness("unused");

    let err = h.router.ask(ask("in 20 words")).await.unwrap_err();
    match err {
        AskError::PreconditionMissing(msg) => {
            assert!(msg.contains("prev_answer"));
            assert!(msg.contains("original question"));
        }
        other => panic!("expected PreconditionMissing, got: {}", other),
    }
    assert_eq!(h.llm.call_count(), 0);
}

#[tokio::test]
async fn refinement_of_short_answer_is_a_no_op() {
    let h = harness("unused");
    let short = "Only ten words are in this perfectly compact little answer.";
    assert_eq!(short.split_whitespace().count(), 10);

    let response = h
        .router
        .ask(AskRequest {
            question: "rewrite that in 20 words".to_string(),
            tenant_id: None,
            prev_answer: Some(short.to_string()),
        })
        .await
        .unwrap();

    assert_eq!(response.answer, short);
    assert_eq!(response.word_limit, Some(20));
    let note = response.note.unwrap();
    assert!(note.contains("already 10 words"));
    assert_eq!(h.llm.call_count(), 0);
    // The no-op path does not write the cache.
    assert!(h.cache.get("default").is_none());
}

#[tokio::test]
async fn refinement_rewrites_and_replaces_cached_answer() {
    let h = harness("A much shorter answer.");
    let long_answer = "word ".repeat(200);
    h.cache.set("default", &long_answer);

    let response = h
        .router
        .ask(ask("rewrite that in 20 words"))
        .await
        .unwrap();

    assert_eq!(response.answer, "A much shorter answer.");
    assert_eq!(response.word_limit, Some(20));
    assert_eq!(response.rewritten_from.as_deref(), Some(long_answer.as_str()));
    assert_eq!(h.llm.call_count(), 1);

    let prompt = h.llm.last_prompt().unwrap();
    assert!(prompt.contains("at most 20 words"));
    assert!(prompt.contains("Do not add new information"));

    assert_eq!(
        h.cache.get("default").as_deref(),
        Some("A much shorter answer.")
    );
}

#[tokio::test]
async fn explicit_prev_answer_takes_precedence_over_cache() {
    let h = harness("Rewritten.");
    h.cache.set("default", "cached answer that is quite long indeed");
    let supplied = "supplied ".repeat(50);

    let response = h
        .router
        .ask(AskRequest {
            question: "in 5 words".to_string(),
            tenant_id: None,
            prev_answer: Some(supplied.clone()),
        })
        .await
        .unwrap();

    assert_eq!(response.rewritten_from.as_deref(), Some(supplied.as_str()));
}

// ============ Summary ============

#[tokio::test]
async fn summary_with_nothing_stored_returns_fixed_message() {
    let h = harness_broken_embedder("unused");

    let response = h.router.ask(ask("summarize the document")).await.unwrap();

    assert_eq!(response.answer, SUMMARY_NOT_FOUND);
    assert_eq!(h.llm.call_count(), 0);
}

#[tokio::test]
async fn summary_selects_first_five_of_eight_chunks() {
    let h = harness("A tidy summary.");
    let texts: Vec<String> = (1..=8).map(|i| format!("chunk number {} body", i)).collect();
    let records: Vec<(&str, i64, &str)> = texts
        .iter()
        .enumerate()
        .map(|(i, t)| ("doc.txt", i as i64, t.as_str()))
        .collect();
    seed(&h.store, &records).await;

    let response = h.router.ask(ask("summarize the document")).await.unwrap();

    assert_eq!(response.answer, "A tidy summary.");
    assert_eq!(h.llm.call_count(), 1);

    let prompt = h.llm.last_prompt().unwrap();
    assert!(prompt.contains("chunk number 1 body"));
    assert!(prompt.contains("chunk number 5 body"));
    assert!(!prompt.contains("chunk number 6 body"));
    assert!(prompt.contains("Use ONLY the content provided"));

    // All retrieved chunks are echoed back, not just the summarized five.
    assert_eq!(response.chunks.unwrap().len(), 8);
    assert_eq!(h.cache.get("default").as_deref(), Some("A tidy summary."));
}

#[tokio::test]
async fn summary_content_hard_truncates_at_limit() {
    let h = harness("A tidy summary.");
    let mut records: Vec<(String, i64)> = Vec::new();
    for i in 0..5i64 {
        let marker = if i == 0 { "ALPHA" } else if i == 4 { "OMEGA" } else { "mid" };
        let mut text = format!("{} ", marker);
        text.push_str(&"x".repeat(1000 - text.len()));
        records.push((text, i));
    }
    let seedable: Vec<(&str, i64, &str)> = records
        .iter()
        .map(|(t, i)| ("doc.txt", *i, t.as_str()))
        .collect();
    seed(&h.store, &seedable).await;

    let response = h.router.ask(ask("give me a summary")).await.unwrap();
    assert_eq!(response.answer, "A tidy summary.");

    // 5 x 1000 chars joined exceeds the 4000-char cap; the tail chunk is
    // silently cut.
    let prompt = h.llm.last_prompt().unwrap();
    assert!(prompt.contains("ALPHA"));
    assert!(!prompt.contains("OMEGA"));
}

#[tokio::test]
async fn summary_falls_back_to_stored_records_when_retrieval_fails() {
    let h = harness_broken_embedder("Summary from scan.");
    seed(&h.store, &[("doc.txt", 0, "stored body text")]).await;

    let response = h.router.ask(ask("summarize the document")).await.unwrap();

    assert_eq!(response.answer, "Summary from scan.");
    assert_eq!(h.llm.call_count(), 1);
    let prompt = h.llm.last_prompt().unwrap();
    assert!(prompt.contains("stored body text"));
}

// ============ Grounded QA + fallback ============

#[tokio::test]
async fn quoted_term_in_stored_text_bypasses_the_model() {
    let h = harness("unused");
    seed(
        &h.store,
        &[
            ("old.txt", 0, "Chunk 0"),
            ("report.txt", 1, "The contract with acme corp was renewed in March."),
        ],
    )
    .await;

    let response = h
        .router
        .ask(ask("What is mentioned about 'acme corp'?"))
        .await
        .unwrap();

    assert!(response.answer.starts_with("Yes — found 'acme corp'"));
    assert!(response.answer.contains("(chunk 1)"));
    assert!(response.answer.contains("renewed in March"));
    assert_eq!(h.llm.call_count(), 0);
}

#[tokio::test]
async fn empty_store_prompts_with_no_context_sentinel() {
    let h = harness("The answer is not found in the provided document.");

    let response = h.router.ask(ask("What is the refund policy?")).await.unwrap();

    assert_eq!(h.llm.call_count(), 1);
    let prompt = h.llm.last_prompt().unwrap();
    assert!(prompt.contains("No relevant context found in the uploaded documents."));
    assert_eq!(response.chunks.unwrap().len(), 0);
}

#[tokio::test]
async fn grounded_answer_cites_every_returned_chunk() {
    let h = harness("The refund window is 30 days.");
    seed(
        &h.store,
        &[
            ("policy.pdf", 0, "Refunds are accepted within 30 days."),
            ("policy.pdf", 1, "Store credit is issued after 30 days."),
            ("faq.md", 2, "Contact support for refund status."),
        ],
    )
    .await;

    let response = h.router.ask(ask("What is the refund policy?")).await.unwrap();

    assert_eq!(response.answer, "The refund window is 30 days.");
    let chunks = response.chunks.unwrap();
    let citations = response.citations.unwrap();
    assert_eq!(chunks.len(), 3);
    assert_eq!(citations.len(), chunks.len());
    assert_eq!(citations, vec![0, 1, 2]);

    let prompt = h.llm.last_prompt().unwrap();
    assert!(prompt.contains("Sources: faq.md, policy.pdf"));
    assert!(prompt.contains("Use ONLY the following context"));
    assert!(prompt.contains("What is the refund policy?"));

    assert_eq!(
        h.cache.get("default").as_deref(),
        Some("The refund window is 30 days.")
    );
}

#[tokio::test]
async fn grounded_failure_of_embedder_is_a_dependency_error() {
    let h = harness_broken_embedder("unused");
    seed(&h.store, &[("doc.txt", 0, "body")]).await;

    let err = h.router.ask(ask("What changed?")).await.unwrap_err();
    match err {
        AskError::Dependency(msg) => assert!(msg.contains("unreachable")),
        other => panic!("expected Dependency, got: {}", other),
    }
}

// ============ Tenant isolation ============

#[tokio::test]
async fn tenants_cache_answers_independently() {
    let h = harness("Answer for the asking tenant.");
    seed(&h.store, &[("doc.txt", 0, "shared body")]).await;

    h.router
        .ask(AskRequest {
            question: "What does the document say?".to_string(),
            tenant_id: Some("tenant-a".to_string()),
            prev_answer: None,
        })
        .await
        .unwrap();

    assert_eq!(
        h.cache.get("tenant-a").as_deref(),
        Some("Answer for the asking tenant.")
    );
    assert!(h.cache.get("tenant-b").is_none());
    assert!(h.cache.get("default").is_none());

    // Tenant B cannot refine an answer it never received.
    let err = h
        .router
        .ask(AskRequest {
            question: "in 10 words".to_string(),
            tenant_id: Some("tenant-b".to_string()),
            prev_answer: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AskError::PreconditionMissing(_)));

    // Tenant A can; its cached answer is already under the target.
    let response = h
        .router
        .ask(AskRequest {
            question: "in 10 words".to_string(),
            tenant_id: Some("tenant-a".to_string()),
            prev_answer: None,
        })
        .await
        .unwrap();
    assert_eq!(response.answer, "Answer for the asking tenant.");
    assert!(response.note.is_some());
}
