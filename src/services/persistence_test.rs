use super::*;
use crate::services::hub::HubSettings;
use protocol::{Command, FontSetting, Half, Position, Team};
use serde_json::json;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use time::macros::datetime;
use tokio::time::timeout;
use uuid::Uuid;

/// In-memory store that can be told to fail the next N writes, or to take
/// a while over each one.
#[derive(Default)]
struct MemoryStore {
    document: Mutex<Option<Vec<u8>>>,
    writes: AtomicUsize,
    fail_next: AtomicUsize,
    delay: Duration,
}

impl MemoryStore {
    fn failing(count: usize) -> Self {
        Self { fail_next: AtomicUsize::new(count), ..Default::default() }
    }

    fn slow(delay: Duration) -> Self {
        Self { delay, ..Default::default() }
    }

    fn saved(&self) -> Option<MatchState> {
        let document = self.document.lock().expect("store mutex should lock");
        document.as_deref().and_then(decode_snapshot)
    }
}

#[async_trait::async_trait]
impl SnapshotStore for MemoryStore {
    async fn write(&self, document: &[u8]) -> Result<(), PersistenceError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let failing = self.fail_next.load(Ordering::SeqCst);
        if failing > 0 {
            self.fail_next.store(failing - 1, Ordering::SeqCst);
            return Err(std::io::Error::other("disk full").into());
        }
        tokio::time::sleep(self.delay).await;
        *self.document.lock().expect("store mutex should lock") = Some(document.to_vec());
        Ok(())
    }

    async fn read(&self) -> Result<Option<Vec<u8>>, PersistenceError> {
        Ok(self.document.lock().expect("store mutex should lock").clone())
    }
}

fn temp_path(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!("scoreboard-{label}-{}.json", Uuid::new_v4()))
}

/// Temp files left next to `path` by interrupted or unrenamed writes.
fn leftover_temps(path: &Path) -> Vec<PathBuf> {
    let prefix = path.file_name().expect("file name").to_string_lossy().into_owned();
    std::fs::read_dir(path.parent().expect("parent dir"))
        .expect("read temp dir")
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|candidate| {
            let name = candidate.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            name.starts_with(&prefix) && name.ends_with(".tmp")
        })
        .collect()
}

fn busy_state() -> MatchState {
    let mut state = MatchState {
        team1_score: 2,
        team2_score: 1,
        time: 3123,
        timer_running: true,
        current_half: Half::Second,
        auto_stop: false,
        is_muted: true,
        ..Default::default()
    };
    state.positions.insert("logo".into(), Position::new(-5, 700));
    state.font_settings.insert("timer".into(), FontSetting { font_size: 7.5, font_family: "Digital7".into() });
    state.background.image = Some("/uploads/field.png".into());
    state.background.scale = 2.5;
    state
}

// =============================================================================
// DOCUMENT
// =============================================================================

#[test]
fn encoded_document_carries_version_and_timestamp() {
    let bytes = encode_snapshot(&MatchState::default(), datetime!(2024-05-01 18:30:00 UTC)).expect("encode");
    let value: serde_json::Value = serde_json::from_slice(&bytes).expect("json");

    assert_eq!(value["version"], SCHEMA_VERSION);
    assert_eq!(value["timestamp"], "2024-05-01T18:30:00Z");
    assert_eq!(value["team1Score"], 0);
    assert_eq!(value["currentHalf"], 1);
}

#[test]
fn round_trip_preserves_every_field() {
    let state = busy_state();
    let bytes = encode_snapshot(&state, OffsetDateTime::now_utc()).expect("encode");
    assert_eq!(decode_snapshot(&bytes), Some(state));
}

#[test]
fn partial_document_merges_over_defaults() {
    let doc = json!({ "version": "1", "team1Score": 4, "team2Score": 2, "isMuted": true });
    let state = decode_snapshot(doc.to_string().as_bytes()).expect("recognized document");

    assert_eq!(state.team1_score, 4);
    assert!(state.is_muted);
    assert!(state.auto_stop);
    assert_eq!(state.positions, MatchState::default().positions);
}

#[test]
fn unrecognized_documents_are_rejected() {
    let cases = [
        json!({ "team1Score": 1, "team2Score": 1 }),
        json!({ "version": "2", "team1Score": 1, "team2Score": 1 }),
        json!({ "version": 1, "team1Score": 1, "team2Score": 1 }),
        json!({ "version": "1", "team1Score": 1 }),
        json!({ "version": "1", "team1Score": "one", "team2Score": 0 }),
        json!([1, 2, 3]),
    ];
    for doc in cases {
        assert!(decode_snapshot(doc.to_string().as_bytes()).is_none(), "should reject {doc}");
    }
    assert!(decode_snapshot(b"{not json").is_none());
}

#[test]
fn loaded_values_are_clamped() {
    let doc = json!({
        "version": "1",
        "team1Score": 0,
        "team2Score": 0,
        "background": { "image": null, "position": { "x": 0, "y": 0 }, "scale": 99.0, "fixed": false },
        "fontSettings": { "timer": { "fontSize": 80.0, "fontFamily": "Arial" } }
    });
    let state = decode_snapshot(doc.to_string().as_bytes()).expect("recognized document");

    assert!((state.background.scale - protocol::MAX_BACKGROUND_SCALE).abs() < f64::EPSILON);
    assert!((state.font_settings["timer"].font_size - protocol::MAX_FONT_SIZE).abs() < f64::EPSILON);
}

// =============================================================================
// LOAD / SAVE
// =============================================================================

#[tokio::test]
async fn load_without_document_returns_defaults() {
    let store = FileStore::new(temp_path("absent"));
    assert_eq!(load(&store).await, MatchState::default());
}

#[tokio::test]
async fn load_malformed_file_returns_defaults() {
    let path = temp_path("malformed");
    tokio::fs::write(&path, b"{\"version\": \"1\", \"team1Score\":").await.expect("write");

    assert_eq!(load(&FileStore::new(&path)).await, MatchState::default());
    tokio::fs::remove_file(&path).await.expect("cleanup");
}

#[tokio::test]
async fn file_store_round_trip() {
    let path = temp_path("roundtrip");
    let store = FileStore::new(&path);
    let state = busy_state();

    save(&store, &state).await.expect("save");
    assert!(leftover_temps(&path).is_empty(), "temp file should be renamed away");
    assert_eq!(load(&store).await, state);

    tokio::fs::remove_file(&path).await.expect("cleanup");
}

#[test]
fn each_write_gets_its_own_temp_file() {
    let store = FileStore::new(temp_path("unique"));
    assert_ne!(store.temp_path(), store.temp_path());
}

#[tokio::test]
async fn overlapping_saves_leave_one_whole_document() {
    let path = temp_path("overlap");
    let store = FileStore::new(&path);
    let small = MatchState::default();
    let large = busy_state();

    for _ in 0..20 {
        let (a, b) = tokio::join!(save(&store, &large), save(&store, &small));
        a.expect("large save");
        b.expect("small save");

        let bytes = tokio::fs::read(&path).await.expect("read back");
        let loaded = decode_snapshot(&bytes).expect("document should never be interleaved");
        assert!(loaded == small || loaded == large);
    }

    assert!(leftover_temps(&path).is_empty());
    tokio::fs::remove_file(&path).await.expect("cleanup");
}

#[tokio::test]
async fn failed_rename_removes_its_temp_file() {
    let path = temp_path("blocked");
    tokio::fs::create_dir(&path).await.expect("create blocking dir");

    assert!(save(&FileStore::new(&path), &MatchState::default()).await.is_err());
    assert!(leftover_temps(&path).is_empty());

    tokio::fs::remove_dir(&path).await.expect("cleanup");
}

#[tokio::test]
async fn failed_save_reports_error() {
    let store = MemoryStore::failing(1);
    let err = save(&store, &MatchState::default()).await.expect_err("write should fail");
    assert!(matches!(err, PersistenceError::Io(_)));
    assert!(store.saved().is_none());
}

// =============================================================================
// THROTTLED TASK
// =============================================================================

fn stop_flag() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

fn spawn_hub() -> Hub {
    let settings = HubSettings { tick_interval: Duration::from_secs(3600), fonts_dir: PathBuf::from("./no-fonts") };
    let (hub, _task) = Hub::spawn(MatchState::default(), Vec::new(), settings);
    hub
}

async fn wait_for_writes(store: &MemoryStore, count: usize) {
    timeout(Duration::from_secs(2), async {
        while store.writes.load(Ordering::SeqCst) < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("expected save did not happen");
}

#[tokio::test]
async fn idle_hub_is_never_saved() {
    let store = Arc::new(MemoryStore::default());
    let (_stop_tx, stop_rx) = stop_flag();
    let task = spawn_persistence_task(spawn_hub(), store.clone(), Duration::from_millis(10), stop_rx);

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    task.abort();
}

#[tokio::test]
async fn burst_of_mutations_collapses_into_one_save() {
    let hub = spawn_hub();
    let store = Arc::new(MemoryStore::default());
    let (_stop_tx, stop_rx) = stop_flag();
    let task = spawn_persistence_task(hub.clone(), store.clone(), Duration::from_millis(300), stop_rx);
    let client = Uuid::new_v4();

    hub.submit(client, Command::AddGoal { team: Team::One }).await;
    wait_for_writes(&store, 1).await;
    for _ in 0..5 {
        hub.submit(client, Command::AddGoal { team: Team::One }).await;
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(store.writes.load(Ordering::SeqCst), 1, "second save must wait for the window");

    wait_for_writes(&store, 2).await;
    assert_eq!(store.saved().expect("saved state").team1_score, 6);
    task.abort();
}

#[tokio::test]
async fn failed_save_is_retried_without_new_mutation() {
    let hub = spawn_hub();
    let store = Arc::new(MemoryStore::failing(1));
    let (_stop_tx, stop_rx) = stop_flag();
    let task = spawn_persistence_task(hub.clone(), store.clone(), Duration::from_millis(20), stop_rx);

    hub.submit(Uuid::new_v4(), Command::AddGoal { team: Team::Two }).await;

    wait_for_writes(&store, 2).await;
    assert_eq!(store.saved().expect("retry should persist").team2_score, 1);
    task.abort();
}

#[tokio::test]
async fn shutdown_flag_stops_idle_task() {
    let store = Arc::new(MemoryStore::default());
    let (stop_tx, stop_rx) = stop_flag();
    let task = spawn_persistence_task(spawn_hub(), store.clone(), Duration::from_secs(3600), stop_rx);

    stop_tx.send_replace(true);
    timeout(Duration::from_secs(1), task).await.expect("task should stop").expect("task should not panic");
    assert_eq!(store.writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn shutdown_flag_lets_write_in_progress_finish() {
    let hub = spawn_hub();
    let store = Arc::new(MemoryStore::slow(Duration::from_millis(150)));
    let (stop_tx, stop_rx) = stop_flag();
    let task = spawn_persistence_task(hub.clone(), store.clone(), Duration::from_secs(3600), stop_rx);

    hub.submit(Uuid::new_v4(), Command::AddGoal { team: Team::One }).await;
    wait_for_writes(&store, 1).await;
    stop_tx.send_replace(true);

    timeout(Duration::from_secs(1), task).await.expect("task should stop").expect("task should not panic");
    assert_eq!(store.saved().expect("in-flight write should complete").team1_score, 1);
    assert_eq!(store.writes.load(Ordering::SeqCst), 1);
}
