use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use extract::{
    ChatModel, ExtractionError, ExtractionOutcome, Extractor, OntologyTriplet, PromptTemplate,
    RawResponse, SimpleTriplet, TwoStageTemplates,
};
use ingest::TextChunk;

/// One extraction attempt for one chunk. The driver owns the outer retry
/// loop, so implementations must not retry internally.
#[async_trait]
pub trait ChunkExtractor: Send + Sync {
    type Triplet: Serialize + DeserializeOwned + Clone + Send + Sync;

    async fn extract(&self, chunk: &TextChunk) -> ExtractionOutcome<Self::Triplet>;
}

pub struct SimpleChunkExtractor<M> {
    extractor: Extractor<M>,
    template: PromptTemplate,
}

impl<M: ChatModel> SimpleChunkExtractor<M> {
    pub fn new(model: M, template: PromptTemplate) -> Self {
        Self {
            extractor: Extractor::new(model, 1),
            template,
        }
    }
}

#[async_trait]
impl<M: ChatModel> ChunkExtractor for SimpleChunkExtractor<M> {
    type Triplet = SimpleTriplet;

    async fn extract(&self, chunk: &TextChunk) -> ExtractionOutcome<SimpleTriplet> {
        self.extractor
            .extract_once(&self.template, &chunk.content)
            .await
    }
}

pub struct OntologyChunkExtractor<M> {
    extractor: Extractor<M>,
    template: PromptTemplate,
}

impl<M: ChatModel> OntologyChunkExtractor<M> {
    pub fn new(model: M, template: PromptTemplate) -> Self {
        Self {
            extractor: Extractor::new(model, 1),
            template,
        }
    }
}

#[async_trait]
impl<M: ChatModel> ChunkExtractor for OntologyChunkExtractor<M> {
    type Triplet = OntologyTriplet;

    async fn extract(&self, chunk: &TextChunk) -> ExtractionOutcome<OntologyTriplet> {
        self.extractor
            .extract_once(&self.template, &chunk.content)
            .await
    }
}

/// One driver attempt runs both stages once.
pub struct TwoStageChunkExtractor<M> {
    extractor: Extractor<M>,
    stages: TwoStageTemplates,
}

impl<M: ChatModel> TwoStageChunkExtractor<M> {
    pub fn new(model: M, stages: TwoStageTemplates) -> Self {
        Self {
            extractor: Extractor::new(model, 1),
            stages,
        }
    }
}

#[async_trait]
impl<M: ChatModel> ChunkExtractor for TwoStageChunkExtractor<M> {
    type Triplet = OntologyTriplet;

    async fn extract(&self, chunk: &TextChunk) -> ExtractionOutcome<OntologyTriplet> {
        self.extractor
            .extract_two_stage(&self.stages, &chunk.content)
            .await
    }
}

/// One attempt's outcome, kept for audit. Successful attempts keep the raw
/// response only; the winning triplets live on the record itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AttemptRecord {
    #[serde(rename_all = "camelCase")]
    Success { raw_response: RawResponse },
    Failure { error: ExtractionError },
}

/// One line of the results log; `triplets` is `null` iff every attempt
/// failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRecord<T> {
    pub chunk_id: String,
    pub triplets: Option<Vec<T>>,
    pub attempts: Vec<AttemptRecord>,
}

pub struct BatchDriver {
    max_concurrency: usize,
    max_attempts: usize,
}

impl BatchDriver {
    pub fn new(max_concurrency: usize, max_attempts: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Fan the extractor out over all chunks under the concurrency cap,
    /// appending one self-delimiting JSON line per completed chunk to
    /// `lines_path`. Completion order is unconstrained; a chunk exhausting
    /// its attempts is recorded, not fatal.
    pub async fn run<E>(
        &self,
        chunks: Vec<TextChunk>,
        extractor: Arc<E>,
        lines_path: &Path,
    ) -> Result<Vec<BatchRecord<E::Triplet>>>
    where
        E: ChunkExtractor + Send + Sync + 'static,
        E::Triplet: 'static,
    {
        let total = chunks.len();
        info!(total, "processing chunks");

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(lines_path)
            .await
            .context(format!("Failed to open results log: {:?}", lines_path))?;
        let log = Arc::new(Mutex::new(file));
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let finished = Arc::new(AtomicUsize::new(0));

        let mut tasks: JoinSet<Result<BatchRecord<E::Triplet>>> = JoinSet::new();
        for chunk in chunks {
            let extractor = Arc::clone(&extractor);
            let log = Arc::clone(&log);
            let semaphore = Arc::clone(&semaphore);
            let finished = Arc::clone(&finished);
            let max_attempts = self.max_attempts;

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .context("concurrency semaphore closed")?;

                let record = process_chunk(extractor.as_ref(), &chunk, max_attempts).await;

                // One complete newline-terminated line per record, written
                // under the lock so concurrent appends never interleave.
                let mut line =
                    serde_json::to_string(&record).context("Failed to serialize batch record")?;
                line.push('\n');
                {
                    let mut file = log.lock().await;
                    file.write_all(line.as_bytes())
                        .await
                        .context("Failed to append batch record")?;
                    file.flush().await.context("Failed to flush batch record")?;
                }

                let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
                if record.triplets.is_some() {
                    info!(chunk = %record.chunk_id, done, total, "chunk processed");
                } else {
                    error!(chunk = %record.chunk_id, done, total, "chunk failed all attempts");
                }

                Ok(record)
            });
        }

        let mut records = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            records.push(joined.context("batch task panicked")??);
        }

        let failed = records.iter().filter(|r| r.triplets.is_none()).count();
        info!(
            total,
            succeeded = total - failed,
            failed,
            "batch complete"
        );

        Ok(records)
    }
}

async fn process_chunk<E: ChunkExtractor>(
    extractor: &E,
    chunk: &TextChunk,
    max_attempts: usize,
) -> BatchRecord<E::Triplet> {
    let mut attempts = Vec::new();
    let mut triplets = None;

    for attempt in 1..=max_attempts {
        match extractor.extract(chunk).await {
            Ok(success) => {
                attempts.push(AttemptRecord::Success {
                    raw_response: success.raw_response,
                });
                triplets = Some(success.triplets);
                break;
            }
            Err(err) => {
                warn!(
                    chunk = %chunk.id,
                    attempt,
                    max_attempts,
                    error = %err,
                    "extraction attempt failed"
                );
                attempts.push(AttemptRecord::Failure { error: err });
            }
        }
    }

    BatchRecord {
        chunk_id: chunk.id.clone(),
        triplets,
        attempts,
    }
}

/// Re-read the append-only log and write the merged JSON array document.
/// An unreadable or corrupt log is a batch-level error.
pub async fn merge_json_lines<T>(lines_path: &Path, merged_path: &Path) -> Result<Vec<BatchRecord<T>>>
where
    T: Serialize + DeserializeOwned,
{
    let content = tokio::fs::read_to_string(lines_path)
        .await
        .context(format!("Failed to read results log: {:?}", lines_path))?;

    let mut records = Vec::new();
    for line in content.lines().filter(|line| !line.is_empty()) {
        let record: BatchRecord<T> =
            serde_json::from_str(line).context("Results log line is not a valid batch record")?;
        records.push(record);
    }

    let merged =
        serde_json::to_string_pretty(&records).context("Failed to serialize merged records")?;
    tokio::fs::write(merged_path, merged)
        .await
        .context(format!("Failed to write merged document: {:?}", merged_path))?;

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest::{Chunker, ChunkingOptions};
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex as StdMutex;

    /// Scripted per-chunk outcomes, popped one per attempt. Chunks with an
    /// exhausted (or missing) script keep failing.
    struct ScriptedExtractor {
        scripts: StdMutex<HashMap<String, Vec<ExtractionOutcome<SimpleTriplet>>>>,
        calls: AtomicUsize,
    }

    impl ScriptedExtractor {
        fn new(scripts: HashMap<String, Vec<ExtractionOutcome<SimpleTriplet>>>) -> Self {
            let scripts = scripts
                .into_iter()
                .map(|(id, mut outcomes)| {
                    outcomes.reverse();
                    (id, outcomes)
                })
                .collect();
            Self {
                scripts: StdMutex::new(scripts),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChunkExtractor for ScriptedExtractor {
        type Triplet = SimpleTriplet;

        async fn extract(&self, chunk: &TextChunk) -> ExtractionOutcome<SimpleTriplet> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.scripts
                .lock()
                .unwrap()
                .get_mut(&chunk.id)
                .and_then(|outcomes| outcomes.pop())
                .unwrap_or_else(|| {
                    Err(ExtractionError::Inference {
                        message: "no scripted outcome".to_string(),
                    })
                })
        }
    }

    fn raw(content: &str) -> RawResponse {
        RawResponse {
            content: content.to_string(),
            reasoning: None,
        }
    }

    fn ok_outcome(triplets: Vec<SimpleTriplet>) -> ExtractionOutcome<SimpleTriplet> {
        Ok(extract::ExtractionSuccess {
            triplets,
            raw_response: raw("[]"),
        })
    }

    fn parse_failure(content: &str) -> ExtractionOutcome<SimpleTriplet> {
        Err(ExtractionError::Parse {
            message: "expected value".to_string(),
            raw_response: raw(content),
        })
    }

    fn triplet(subject: &str, predicate: &str, object: &str) -> SimpleTriplet {
        SimpleTriplet {
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object: object.to_string(),
        }
    }

    #[tokio::test]
    async fn test_merged_batch_has_one_record_per_chunk() {
        let chunks: Vec<TextChunk> = (0..12)
            .map(|i| TextChunk::new(format!("chunk number {i}"), i))
            .collect();
        let scripts = chunks
            .iter()
            .map(|c| (c.id.clone(), vec![ok_outcome(vec![])]))
            .collect();
        let extractor = Arc::new(ScriptedExtractor::new(scripts));

        let dir = tempfile::tempdir().unwrap();
        let lines_path = dir.path().join("results.jsonl");
        let merged_path = dir.path().join("results.json");

        let driver = BatchDriver::new(4, 1);
        driver
            .run(chunks.clone(), extractor, &lines_path)
            .await
            .unwrap();
        let merged: Vec<BatchRecord<SimpleTriplet>> =
            merge_json_lines(&lines_path, &merged_path).await.unwrap();

        assert_eq!(merged.len(), chunks.len());
        let expected: HashSet<String> = chunks.iter().map(|c| c.id.clone()).collect();
        let actual: HashSet<String> = merged.iter().map(|r| r.chunk_id.clone()).collect();
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn test_chunked_text_scenario_with_one_failing_chunk() {
        // "Fact A. Fact B. Fact C." chunks into two overlapping windows;
        // the first extracts one triplet, the second never parses.
        let chunker = Chunker::new(ChunkingOptions {
            max_char_length: 100,
            min_sentences: 1,
            max_sentences: 2,
            sentence_overlap: 1,
        });
        let chunks = chunker.chunk_text("Fact A. Fact B. Fact C.");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "Fact A. Fact B");
        assert_eq!(chunks[1].content, "Fact B. Fact C");

        let mut scripts = HashMap::new();
        scripts.insert(
            chunks[0].id.clone(),
            vec![ok_outcome(vec![triplet("A", "relatesTo", "B")])],
        );
        scripts.insert(
            chunks[1].id.clone(),
            vec![parse_failure("garbage"), parse_failure("garbage")],
        );
        let extractor = Arc::new(ScriptedExtractor::new(scripts));

        let dir = tempfile::tempdir().unwrap();
        let lines_path = dir.path().join("results.jsonl");
        let merged_path = dir.path().join("results.json");

        let driver = BatchDriver::new(2, 2);
        driver
            .run(chunks.clone(), extractor, &lines_path)
            .await
            .unwrap();
        let merged: Vec<BatchRecord<SimpleTriplet>> =
            merge_json_lines(&lines_path, &merged_path).await.unwrap();

        assert_eq!(merged.len(), 2);
        let first = merged.iter().find(|r| r.chunk_id == chunks[0].id).unwrap();
        let second = merged.iter().find(|r| r.chunk_id == chunks[1].id).unwrap();
        assert_eq!(first.triplets.as_ref().unwrap().len(), 1);
        assert!(second.triplets.is_none());
        assert_eq!(second.attempts.len(), 2);
    }

    #[tokio::test]
    async fn test_attempt_history_keeps_failures_before_the_win() {
        let chunk = TextChunk::new("some content".to_string(), 0);
        let mut scripts = HashMap::new();
        scripts.insert(
            chunk.id.clone(),
            vec![
                parse_failure("bad one"),
                parse_failure("bad two"),
                ok_outcome(vec![triplet("A", "p", "B")]),
            ],
        );
        let extractor = Arc::new(ScriptedExtractor::new(scripts));

        let dir = tempfile::tempdir().unwrap();
        let lines_path = dir.path().join("results.jsonl");

        let driver = BatchDriver::new(1, 3);
        let records = driver
            .run(vec![chunk], extractor.clone(), &lines_path)
            .await
            .unwrap();

        let record = &records[0];
        assert!(record.triplets.is_some());
        assert_eq!(record.attempts.len(), 3);
        assert!(matches!(record.attempts[0], AttemptRecord::Failure { .. }));
        assert!(matches!(record.attempts[1], AttemptRecord::Failure { .. }));
        assert!(matches!(record.attempts[2], AttemptRecord::Success { .. }));
        // First success stopped the loop: exactly three calls.
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_chunk_records_null_and_full_history() {
        let chunk = TextChunk::new("stubborn content".to_string(), 0);
        let extractor = Arc::new(ScriptedExtractor::new(HashMap::new()));

        let dir = tempfile::tempdir().unwrap();
        let lines_path = dir.path().join("results.jsonl");

        let driver = BatchDriver::new(1, 3);
        let records = driver
            .run(vec![chunk], extractor.clone(), &lines_path)
            .await
            .unwrap();

        assert!(records[0].triplets.is_none());
        assert_eq!(records[0].attempts.len(), 3);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 3);

        // The appended line serializes the exhaustion as an explicit null.
        let content = std::fs::read_to_string(&lines_path).unwrap();
        let line: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert!(line["triplets"].is_null());
    }

    #[tokio::test]
    async fn test_every_log_line_parses_independently() {
        let chunks: Vec<TextChunk> = (0..8)
            .map(|i| TextChunk::new(format!("content {i}"), i))
            .collect();
        let scripts = chunks
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let outcome = if i % 2 == 0 {
                    ok_outcome(vec![triplet("S", "p", "O")])
                } else {
                    parse_failure("nope")
                };
                (c.id.clone(), vec![outcome])
            })
            .collect();
        let extractor = Arc::new(ScriptedExtractor::new(scripts));

        let dir = tempfile::tempdir().unwrap();
        let lines_path = dir.path().join("results.jsonl");

        let driver = BatchDriver::new(4, 1);
        driver.run(chunks, extractor, &lines_path).await.unwrap();

        let content = std::fs::read_to_string(&lines_path).unwrap();
        let lines: Vec<&str> = content.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 8);
        for line in lines {
            serde_json::from_str::<BatchRecord<SimpleTriplet>>(line).unwrap();
        }
    }
}
