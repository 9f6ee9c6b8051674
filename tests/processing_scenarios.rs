//! End-to-end processing runs against scripted generators.

use scriptsmith::llm::{GenerationError, MockGenerator, TokenUsage};
use scriptsmith::processing::{
    Chunker, ConcurrencyController, DispatchSettings, Orchestrator, RetryPolicy, StrategySelector,
};
use scriptsmith::{Config, Document, ProcessingStrategy, ScriptsmithError};
use std::sync::Arc;
use std::time::Duration;

const PROMPT: &str = "Restructure this raw transcript into clean markdown with headings and paragraphs.";

fn fast_settings(max_attempts: u32) -> DispatchSettings {
    DispatchSettings::new("gpt-4o-mini", PROMPT).with_retry(
        RetryPolicy::new(max_attempts, Duration::from_millis(2), Duration::from_millis(10))
            .unwrap(),
    )
}

/// Five paragraphs of 2,000 chars, each tagged with a marker the mock can key on.
fn five_part_document() -> Document {
    let text: String = (0..5)
        .map(|i| {
            let body = format!("PART-{i} ");
            let filler = "lorem ipsum dolor sit amet ".repeat(80);
            let mut paragraph = format!("{body}{filler}");
            paragraph.truncate(1_998);
            paragraph.push_str("\n\n");
            paragraph
        })
        .collect();
    Document::new(text)
}

fn five_part_orchestrator(mock: Arc<MockGenerator>, max_attempts: u32) -> Orchestrator {
    Orchestrator::new(
        mock,
        StrategySelector::new(5_000, 2_000, 0),
        Chunker::new(2_000, 0).unwrap(),
        ConcurrencyController::new(3).unwrap(),
        fast_settings(max_attempts),
    )
}

#[tokio::test]
async fn five_segments_run_bounded_and_merge_in_order() {
    let mock = Arc::new(
        MockGenerator::new("mock")
            .with_echo("## Section\n")
            .with_delay(Duration::from_millis(25)),
    );
    let result = five_part_orchestrator(mock.clone(), 3)
        .process(&five_part_document())
        .await
        .unwrap();

    let segments = result.segment_results.as_ref().unwrap();
    assert_eq!(segments.len(), 5);
    assert_eq!(mock.calls(), 5);
    assert!(mock.max_in_flight() <= 3);

    let positions: Vec<usize> = (0..5)
        .map(|i| result.merged_text.find(&format!("PART-{i} ")).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{positions:?}");

    // Only the first segment keeps its heading.
    assert_eq!(result.merged_text.matches("## Section").count(), 1);
    assert_eq!(result.total_usage, TokenUsage::new(500, 250, 750));
}

#[tokio::test]
async fn transient_failures_within_limit_succeed() {
    let mock = Arc::new(
        MockGenerator::new("mock")
            .with_echo("")
            .with_failures_for("PART-2", 2, GenerationError::RateLimited("429".to_string())),
    );
    let result = five_part_orchestrator(mock.clone(), 3)
        .process(&five_part_document())
        .await
        .unwrap();

    assert_eq!(mock.attempts_for("PART-2"), 3);
    assert_eq!(result.api_calls, 7);
    let segments = result.segment_results.unwrap();
    assert_eq!(segments[2].attempts(), 3);
}

#[tokio::test]
async fn failures_beyond_limit_produce_no_output() {
    let mock = Arc::new(
        MockGenerator::new("mock")
            .with_echo("")
            .with_failures_for("PART-4", 3, GenerationError::Timeout(Duration::from_secs(1))),
    );
    let error = five_part_orchestrator(mock.clone(), 3)
        .process(&five_part_document())
        .await
        .unwrap_err();

    match error {
        ScriptsmithError::Dispatch {
            index,
            attempts,
            source,
        } => {
            assert_eq!(index, 4);
            assert_eq!(attempts, 3);
            assert!(source.is_retryable());
        }
        other => panic!("Expected Dispatch error, got {other:?}"),
    }
}

#[tokio::test]
async fn silent_empty_output_is_a_failure() {
    let mock = Arc::new(MockGenerator::new("mock").with_response("   \n  "));
    let error = five_part_orchestrator(mock.clone(), 3)
        .process(&five_part_document())
        .await
        .unwrap_err();

    assert!(matches!(error, ScriptsmithError::Validation { .. }));
    assert!(error.segment_index().is_some());
}

#[tokio::test]
async fn default_config_reference_document() {
    let sentence = "And that is how the quarterly numbers came together for the team. ";
    let mut text = sentence.repeat(50_000 / sentence.len() + 1);
    text.truncate(50_000);
    let document = Document::new(text);

    let mock = Arc::new(MockGenerator::new("mock").with_echo("# Transcript\n"));
    let orchestrator = Orchestrator::from_config(&Config::default(), mock.clone(), PROMPT).unwrap();
    let result = orchestrator.process(&document).await.unwrap();

    assert_eq!(
        result.strategy,
        ProcessingStrategy::ChunkedConcurrent {
            estimated_segments: 2
        }
    );
    let segments = result.segment_results.as_ref().unwrap();
    assert_eq!(segments.len(), 2);
    assert!(segments[0].segment().char_count().abs_diff(35_000) <= 502);
    assert_eq!(segments[0].segment().overlap_with_next(), 500);
    assert_eq!(result.source_chars, 50_000);
    assert_eq!(
        result.size_ratio,
        result.merged_chars() as f64 / 50_000.0
    );
}

#[tokio::test]
async fn invalid_config_is_rejected_at_construction() {
    let mut config = Config::default();
    config.processing.chunk_overlap = 2_500;
    let mock = Arc::new(MockGenerator::new("mock"));

    let result = Orchestrator::from_config(&config, mock, PROMPT);
    assert!(matches!(
        result,
        Err(ScriptsmithError::ConfigInvalidValue { .. })
    ));
}
