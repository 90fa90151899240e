//! Integration tests for the movies indexer orchestrator.
//!
//! These tests use the real Orchestrator, extractor, transformer and loader
//! but mock the external systems (MovieSource, SearchIndexConnector and
//! CheckpointStore) to ensure reliable testing.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use movies_indexer::extractor::ChangeExtractor;
use movies_indexer::loader::IndexLoader;
use movies_indexer::orchestrator::{
    Orchestrator, OrchestratorConfig, PassState, ShutdownHandle,
};
use movies_indexer::transformer::RecordTransformer;
use movies_indexer::SyncError;
use movies_indexer_repository::index_config::{GENRES_INDEX, MOVIES_INDEX, PERSONS_INDEX};
use movies_indexer_repository::{
    BatchOperationResult, BatchOperationSummary, BulkDocument, CheckpointError, CheckpointStore,
    ExtractOptions, IndexDefinition, JsonFileCheckpointStore, MovieSource, SearchIndexConnector,
    SearchIndexError, SearchIndexProvider, SourceError,
};
use movies_indexer_shared::{ChangeSet, Lookup, RawGenreRow, RawMovieRow, RawPersonRow, Watermark};

const STAR_WARS: &str = "3d825f60-9fff-4dfe-b294-1a45fa1e115d";
const EMPIRE: &str = "0312ed51-8833-413f-bff5-0e139c11264a";
const LUCAS: &str = "a5a8f573-3cee-4ccc-8a2b-91cb9f55250a";
const HAMILL: &str = "26e83050-29ef-4163-a99d-b546cac208f8";
const SCI_FI: &str = "6c162475-c7ed-4461-9184-001ef3d9f26e";

// ============================================================================
// Mock source
// ============================================================================

/// Source that replays scripted responses, then reports no changes.
#[derive(Default)]
struct MockSource {
    responses: Mutex<VecDeque<Result<ChangeSet, SourceError>>>,
    repeat_error: Option<fn() -> SourceError>,
    seen: Mutex<Vec<ExtractOptions>>,
    calls: AtomicUsize,
    shutdown_after: Mutex<Option<(usize, ShutdownHandle)>>,
}

impl MockSource {
    fn scripted(responses: Vec<Result<ChangeSet, SourceError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    fn failing(error: fn() -> SourceError) -> Self {
        Self {
            repeat_error: Some(error),
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn seen(&self) -> Vec<ExtractOptions> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl MovieSource for MockSource {
    async fn fetch_changes(&self, options: &ExtractOptions) -> Result<ChangeSet, SourceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.seen.lock().unwrap().push(*options);

        if let Some((after, handle)) = self.shutdown_after.lock().unwrap().as_ref() {
            if call >= *after {
                handle.shutdown();
            }
        }

        if let Some(error) = self.repeat_error {
            return Err(error());
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ChangeSet::default()))
    }
}

// ============================================================================
// Mock search index
// ============================================================================

/// In-memory search index shared by every provider the connector hands out.
#[derive(Default)]
struct IndexState {
    indices: BTreeMap<String, BTreeMap<String, Value>>,
    created: usize,
    bulk_calls: usize,
    reject_ids: Vec<String>,
    unavailable: bool,
}

#[derive(Clone, Default)]
struct MockIndex {
    state: Arc<Mutex<IndexState>>,
    connects: Arc<AtomicUsize>,
}

impl MockIndex {
    fn documents(&self, index: &str) -> BTreeMap<String, Value> {
        self.state
            .lock()
            .unwrap()
            .indices
            .get(index)
            .cloned()
            .unwrap_or_default()
    }

    fn count(&self, index: &str) -> usize {
        self.documents(index).len()
    }

    fn bulk_calls(&self) -> usize {
        self.state.lock().unwrap().bulk_calls
    }
}

#[async_trait]
impl SearchIndexProvider for MockIndex {
    async fn index_exists(&self, index: &str) -> Result<bool, SearchIndexError> {
        Ok(self.state.lock().unwrap().indices.contains_key(index))
    }

    async fn create_index(&self, definition: &IndexDefinition) -> Result<(), SearchIndexError> {
        let mut state = self.state.lock().unwrap();
        state.created += 1;
        state
            .indices
            .insert(definition.name.clone(), BTreeMap::new());
        Ok(())
    }

    async fn bulk_upsert(
        &self,
        index: &str,
        documents: &[BulkDocument],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        let mut state = self.state.lock().unwrap();
        state.bulk_calls += 1;
        if state.unavailable {
            return Err(SearchIndexError::unavailable("503 Service Unavailable"));
        }

        let mut results = Vec::with_capacity(documents.len());
        for doc in documents {
            if state.reject_ids.contains(&doc.id) {
                results.push(BatchOperationResult {
                    document_id: doc.id.clone(),
                    success: false,
                    error: Some(SearchIndexError::bulk_index("mapper_parsing_exception")),
                });
                continue;
            }
            state
                .indices
                .entry(index.to_string())
                .or_default()
                .insert(doc.id.clone(), doc.source.clone());
            results.push(BatchOperationResult {
                document_id: doc.id.clone(),
                success: true,
                error: None,
            });
        }
        Ok(BatchOperationSummary::from_results(results))
    }

    async fn fetch_document(&self, index: &str, id: &str) -> Lookup<Value> {
        match self
            .state
            .lock()
            .unwrap()
            .indices
            .get(index)
            .and_then(|docs| docs.get(id))
        {
            Some(doc) => Lookup::Found(doc.clone()),
            None => Lookup::NotFound,
        }
    }
}

#[async_trait]
impl SearchIndexConnector for MockIndex {
    async fn connect(&self) -> Result<Box<dyn SearchIndexProvider>, SearchIndexError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.clone()))
    }
}

// ============================================================================
// In-memory checkpoint
// ============================================================================

#[derive(Default)]
struct MemoryCheckpoint {
    value: Mutex<Option<Watermark>>,
    saves: AtomicUsize,
}

impl MemoryCheckpoint {
    fn starting_at(watermark: Watermark) -> Self {
        Self {
            value: Mutex::new(Some(watermark)),
            saves: AtomicUsize::new(0),
        }
    }

    fn get(&self) -> Option<Watermark> {
        *self.value.lock().unwrap()
    }

    fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpoint {
    async fn load(&self) -> Option<Watermark> {
        self.get()
    }

    async fn save(&self, watermark: Watermark) -> Result<(), CheckpointError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.value.lock().unwrap() = Some(watermark);
        Ok(())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn movie(id: &str, title: &str, persons: Value) -> RawMovieRow {
    RawMovieRow {
        id: id.to_string(),
        title: Some(title.to_string()),
        description: None,
        rating: Some(8.6),
        kind: Some("movie".to_string()),
        persons,
        genres: json!(["Sci-Fi"]),
    }
}

fn full_change_set() -> ChangeSet {
    ChangeSet {
        movies: vec![
            movie(
                STAR_WARS,
                "Star Wars",
                json!([
                    {"person_id": LUCAS, "person_name": "George Lucas", "person_role": "director"},
                    {"person_id": HAMILL, "person_name": "Mark Hamill", "person_role": "actor"},
                ]),
            ),
            movie(
                EMPIRE,
                "The Empire Strikes Back",
                json!([
                    {"person_id": HAMILL, "person_name": "Mark Hamill", "person_role": "actor"},
                ]),
            ),
        ],
        genres: vec![RawGenreRow {
            id: SCI_FI.to_string(),
            name: Some("Sci-Fi".to_string()),
            description: None,
        }],
        persons: vec![RawPersonRow {
            id: HAMILL.to_string(),
            full_name: Some("Mark Hamill".to_string()),
            films: json!([
                {"film_id": STAR_WARS, "title": "Star Wars", "rating": 8.6, "role": "actor"},
                {"film_id": EMPIRE, "title": "The Empire Strikes Back", "rating": 8.7, "role": "actor"},
            ]),
        }],
        observed_at: None,
    }
}

fn watermark(year: i32) -> Watermark {
    Watermark::new(Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap())
}

fn refused() -> SourceError {
    SourceError::Connection("connection refused".to_string())
}

fn orchestrator(
    source: Arc<MockSource>,
    index: &MockIndex,
    checkpoint: Arc<dyn CheckpointStore>,
) -> Orchestrator {
    Orchestrator::with_config(
        ChangeExtractor::new(source),
        RecordTransformer::new(),
        IndexLoader::new(Arc::new(index.clone())),
        checkpoint,
        OrchestratorConfig {
            handle_signals: false,
            ..OrchestratorConfig::default()
        },
    )
}

// ============================================================================
// Pass behavior
// ============================================================================

#[tokio::test]
async fn test_full_sync_then_no_change_pass() {
    let source = Arc::new(MockSource::scripted(vec![Ok(full_change_set())]));
    let index = MockIndex::default();
    let checkpoint = Arc::new(MemoryCheckpoint::default());
    let mut orchestrator = orchestrator(source.clone(), &index, checkpoint.clone());

    let before = Watermark::now();
    let first = orchestrator.run_pass().await.unwrap();

    assert_eq!(first.extracted, 4);
    assert_eq!(first.indexed, 4);
    assert_eq!(index.count(MOVIES_INDEX), 2);
    assert_eq!(index.count(GENRES_INDEX), 1);
    assert_eq!(index.count(PERSONS_INDEX), 1);

    let saved = checkpoint.get().expect("watermark saved after first pass");
    assert!(saved >= before);
    assert_eq!(first.watermark, Some(saved));

    // Nothing changed since: the watermark stays where it was.
    let second = orchestrator.run_pass().await.unwrap();
    assert_eq!(second.extracted, 0);
    assert_eq!(checkpoint.get(), Some(saved));
    assert_eq!(checkpoint.saves(), 1);

    let seen = source.seen();
    assert_eq!(seen[0].since, None);
    assert_eq!(seen[1].since, Some(saved));

    let stats = orchestrator.stats();
    assert_eq!(stats.passes, 2);
    assert_eq!(stats.failed_passes, 0);
    assert_eq!(stats.documents_indexed, 4);
    assert_eq!(orchestrator.state(), PassState::Idle);
}

#[tokio::test]
async fn test_loaded_documents_have_expected_shape() {
    let source = Arc::new(MockSource::scripted(vec![Ok(full_change_set())]));
    let index = MockIndex::default();
    let mut orchestrator =
        orchestrator(source, &index, Arc::new(MemoryCheckpoint::default()));

    orchestrator.run_pass().await.unwrap();

    let star_wars = orchestrator
        .loader()
        .fetch_document(MOVIES_INDEX, STAR_WARS)
        .await
        .found()
        .expect("movie indexed");
    assert_eq!(star_wars["title"], "Star Wars");
    assert_eq!(star_wars["imdb_rating"], 8.6);
    assert_eq!(star_wars["genres"], json!(["Sci-Fi"]));
    assert_eq!(star_wars["directors_names"], json!(["George Lucas"]));
    assert_eq!(star_wars["actors"][0]["id"], HAMILL);

    let hamill = index.documents(PERSONS_INDEX)[HAMILL].clone();
    assert_eq!(hamill["films"].as_array().unwrap().len(), 2);

    let missing = orchestrator
        .loader()
        .fetch_document(MOVIES_INDEX, "00000000-0000-0000-0000-000000000000")
        .await;
    assert_eq!(missing, Lookup::NotFound);
}

#[tokio::test]
async fn test_reloading_same_changes_is_idempotent() {
    let source = Arc::new(MockSource::scripted(vec![
        Ok(full_change_set()),
        Ok(full_change_set()),
    ]));
    let index = MockIndex::default();
    let mut orchestrator =
        orchestrator(source, &index, Arc::new(MemoryCheckpoint::default()));

    orchestrator.run_pass().await.unwrap();
    let after_first = index.documents(MOVIES_INDEX);

    orchestrator.run_pass().await.unwrap();
    let after_second = index.documents(MOVIES_INDEX);

    assert_eq!(after_first, after_second);
    assert_eq!(index.count(PERSONS_INDEX), 1);
    // Indices are created once and then only checked.
    assert_eq!(index.state.lock().unwrap().created, 3);
}

#[tokio::test]
async fn test_duplicate_join_rows_index_each_person_once() {
    let duplicated = movie(
        STAR_WARS,
        "Star Wars",
        json!([
            {"person_id": HAMILL, "person_name": "Mark Hamill", "person_role": "actor"},
            {"person_id": HAMILL, "person_name": "Mark Hamill", "person_role": "actor"},
            {"person_id": HAMILL, "person_name": "Mark Hamill", "person_role": "Actor"},
        ]),
    );
    let source = Arc::new(MockSource::scripted(vec![Ok(ChangeSet {
        movies: vec![duplicated],
        ..ChangeSet::default()
    })]));
    let index = MockIndex::default();
    let mut orchestrator =
        orchestrator(source, &index, Arc::new(MemoryCheckpoint::default()));

    orchestrator.run_pass().await.unwrap();

    let doc = index.documents(MOVIES_INDEX)[STAR_WARS].clone();
    assert_eq!(doc["actors"].as_array().unwrap().len(), 1);
    assert_eq!(doc["actors_names"], json!(["Mark Hamill"]));
}

#[tokio::test]
async fn test_bad_row_is_skipped_and_rest_indexed() {
    let mut changes = full_change_set();
    let mut broken = movie("not-a-uuid", "Broken", json!([]));
    broken.rating = Some(42.0);
    changes.movies.insert(1, broken);

    let source = Arc::new(MockSource::scripted(vec![Ok(changes)]));
    let index = MockIndex::default();
    let checkpoint = Arc::new(MemoryCheckpoint::default());
    let mut orchestrator = orchestrator(source, &index, checkpoint.clone());

    let outcome = orchestrator.run_pass().await.unwrap();

    assert_eq!(outcome.extracted, 5);
    assert_eq!(outcome.rejected, 1);
    assert_eq!(index.count(MOVIES_INDEX), 2);
    assert_eq!(orchestrator.stats().rows_rejected, 1);
    // A bad row does not hold the watermark back.
    assert!(checkpoint.get().is_some());
}

// ============================================================================
// Watermark safety
// ============================================================================

#[tokio::test]
async fn test_partial_load_keeps_watermark() {
    let source = Arc::new(MockSource::scripted(vec![Ok(full_change_set())]));
    let index = MockIndex::default();
    index.state.lock().unwrap().reject_ids = vec![EMPIRE.to_string()];
    let checkpoint = Arc::new(MemoryCheckpoint::starting_at(watermark(2020)));
    let mut orchestrator = orchestrator(source.clone(), &index, checkpoint.clone());

    let err = orchestrator.run_pass().await.unwrap_err();

    match err {
        SyncError::PartialLoad { index, failed_ids } => {
            assert_eq!(index, MOVIES_INDEX);
            assert_eq!(failed_ids, vec![EMPIRE.to_string()]);
        }
        other => panic!("expected partial load, got {:?}", other),
    }
    assert_eq!(checkpoint.get(), Some(watermark(2020)));
    assert_eq!(checkpoint.saves(), 0);
    assert_eq!(orchestrator.stats().failed_passes, 1);
    assert_eq!(orchestrator.state(), PassState::Idle);

    // The next pass starts again from the old watermark.
    orchestrator.run_pass().await.unwrap();
    assert_eq!(source.seen()[1].since, Some(watermark(2020)));
}

#[tokio::test(start_paused = true)]
async fn test_source_retry_exhaustion_keeps_watermark() {
    let source = Arc::new(MockSource::failing(refused));
    let index = MockIndex::default();
    let checkpoint = Arc::new(MemoryCheckpoint::starting_at(watermark(2020)));
    let mut orchestrator = orchestrator(source.clone(), &index, checkpoint.clone());

    let err = orchestrator.run_pass().await.unwrap_err();

    assert!(matches!(err, SyncError::Connection { .. }));
    assert_eq!(source.calls(), 5);
    assert_eq!(checkpoint.get(), Some(watermark(2020)));
    assert_eq!(index.bulk_calls(), 0);
}

#[tokio::test]
async fn test_permanent_source_error_is_not_retried() {
    let source = Arc::new(MockSource::failing(|| {
        SourceError::Query("relation \"content.film_work\" does not exist".to_string())
    }));
    let index = MockIndex::default();
    let mut orchestrator =
        orchestrator(source.clone(), &index, Arc::new(MemoryCheckpoint::default()));

    let err = orchestrator.run_pass().await.unwrap_err();

    assert!(matches!(err, SyncError::Source(SourceError::Query(_))));
    assert_eq!(source.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_index_exhausts_retries() {
    let source = Arc::new(MockSource::scripted(vec![Ok(full_change_set())]));
    let index = MockIndex::default();
    index.state.lock().unwrap().unavailable = true;
    let checkpoint = Arc::new(MemoryCheckpoint::default());
    let mut orchestrator = orchestrator(source, &index, checkpoint.clone());

    let err = orchestrator.run_pass().await.unwrap_err();

    match err {
        SyncError::Connection { operation, .. } => {
            assert!(operation.starts_with("bulk upsert"));
        }
        other => panic!("expected connection error, got {:?}", other),
    }
    // Three non-empty indices, five attempts each.
    assert_eq!(index.bulk_calls(), 15);
    assert_eq!(checkpoint.get(), None);
}

#[tokio::test]
async fn test_watermark_never_moves_backwards() {
    let source = Arc::new(MockSource::scripted(vec![Ok(full_change_set())]));
    let index = MockIndex::default();
    let checkpoint = Arc::new(MemoryCheckpoint::starting_at(watermark(3000)));
    let mut orchestrator = orchestrator(source, &index, checkpoint.clone());

    orchestrator.run_pass().await.unwrap();

    assert_eq!(checkpoint.get(), Some(watermark(3000)));
}

#[tokio::test]
async fn test_watermark_comes_from_source_clock() {
    // The source's clock lags the indexer's by years.
    let changes = ChangeSet {
        observed_at: Some(watermark(2001)),
        ..full_change_set()
    };
    let source = Arc::new(MockSource::scripted(vec![Ok(changes)]));
    let index = MockIndex::default();
    let checkpoint = Arc::new(MemoryCheckpoint::starting_at(watermark(2000)));
    let mut orchestrator = orchestrator(source.clone(), &index, checkpoint.clone());

    let outcome = orchestrator.run_pass().await.unwrap();
    orchestrator.run_pass().await.unwrap();

    assert_eq!(outcome.watermark, Some(watermark(2001)));
    assert_eq!(checkpoint.get(), Some(watermark(2001)));
    assert_eq!(source.seen()[1].since, Some(watermark(2001)));
}

#[tokio::test]
async fn test_watermark_survives_restart_with_file_store() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    let index = MockIndex::default();

    let source = Arc::new(MockSource::scripted(vec![Ok(full_change_set())]));
    let mut first = orchestrator(
        source,
        &index,
        Arc::new(JsonFileCheckpointStore::new(&path)),
    );
    let saved = first.run_pass().await.unwrap().watermark;
    assert!(saved.is_some());

    let source = Arc::new(MockSource::scripted(vec![]));
    let mut restarted = orchestrator(
        source.clone(),
        &index,
        Arc::new(JsonFileCheckpointStore::new(&path)),
    );
    restarted.run_pass().await.unwrap();

    assert_eq!(source.seen()[0].since, saved);
}

// ============================================================================
// Loop
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_run_loops_until_shutdown() {
    let source = Arc::new(MockSource::scripted(vec![
        Ok(full_change_set()),
        Err(refused()),
        Err(refused()),
        Err(refused()),
        Err(refused()),
        Err(refused()),
    ]));
    let index = MockIndex::default();
    let checkpoint = Arc::new(MemoryCheckpoint::default());
    let mut orchestrator = orchestrator(source.clone(), &index, checkpoint.clone());
    // Pass 1 succeeds, pass 2 fails after five attempts, pass 3 finds nothing.
    *source.shutdown_after.lock().unwrap() = Some((7, orchestrator.shutdown_handle()));

    let handle = tokio::spawn(async move {
        orchestrator.run().await.unwrap();
        orchestrator
    });
    let orchestrator = handle.await.unwrap();

    let stats = orchestrator.stats();
    assert_eq!(stats.passes, 3);
    assert_eq!(stats.failed_passes, 1);
    assert_eq!(stats.documents_indexed, 4);
    assert_eq!(source.calls(), 7);
    assert_eq!(checkpoint.saves(), 1);
    // A fresh search index client per pass that reached loading.
    assert_eq!(index.connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_shutdown_before_run_stops_immediately() {
    let source = Arc::new(MockSource::scripted(vec![]));
    let index = MockIndex::default();
    let mut orchestrator =
        orchestrator(source.clone(), &index, Arc::new(MemoryCheckpoint::default()));

    orchestrator.shutdown();
    orchestrator.run().await.unwrap();

    assert_eq!(source.calls(), 0);
    assert_eq!(orchestrator.stats().passes, 0);
}
