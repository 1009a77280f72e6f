//! Tests for the file output

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::json;
use tempfile::TempDir;

use super::*;
use lumber_pipeline::{EventKind, OutputController, PluginDefaultParams, Settings};

#[derive(Default)]
struct NullController {
    committed: AtomicU64,
}

impl OutputController for NullController {
    fn commit(&self, _event: Box<Event>) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    fn error(&self, _message: &str) {}
}

fn params(controller: Arc<NullController>) -> OutputPluginParams {
    OutputPluginParams {
        defaults: PluginDefaultParams {
            pipeline_name: "test".to_string(),
            settings: Arc::new(Settings::default()),
        },
        controller,
    }
}

fn event(message: &str) -> Box<Event> {
    let mut event = Event::synthetic(EventKind::Normal);
    event.root = json!({ "message": message });
    event
}

fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) {
    let start = Instant::now();
    while !check() {
        assert!(start.elapsed() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(10));
    }
}

fn config(dir: &Path) -> FileOutputConfig {
    FileOutputConfig {
        target_file: dir.join("app.log"),
        retention_interval: Duration::from_secs(3600),
        workers_count: 1,
        batch_size: 2,
        batch_flush_timeout: Duration::from_millis(30),
        seal_poll_interval: Duration::from_millis(20),
        ..Default::default()
    }
}

fn live_file(dir: &Path) -> Option<std::path::PathBuf> {
    find_live_file(dir, "app", ".log").map(|(path, _)| path)
}

#[test]
fn test_writes_newline_delimited_documents() {
    let dir = TempDir::new().unwrap();
    let controller = Arc::new(NullController::default());
    let output = FileOutput::new(config(dir.path()));
    output.start(params(controller.clone()));

    output.out(event("a"));
    output.out(event("b"));
    output.out(event("c"));

    wait_until(Duration::from_secs(3), || {
        controller.committed.load(Ordering::Relaxed) == 3
    });
    output.stop();

    let contents = fs::read_to_string(live_file(dir.path()).unwrap()).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 3);
    for (line, message) in lines.iter().zip(["a", "b", "c"]) {
        let doc: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(doc["message"], message);
    }
}

#[test]
fn test_seal_up_rotates_live_file() {
    let dir = TempDir::new().unwrap();
    let controller = Arc::new(NullController::default());
    let mut cfg = config(dir.path());
    cfg.retention_interval = Duration::from_millis(100);
    let output = FileOutput::new(cfg);
    output.start(params(controller.clone()));

    output.out(event("sealed"));
    wait_until(Duration::from_secs(3), || {
        controller.committed.load(Ordering::Relaxed) == 1
    });

    // the sealer renames the live file to <name>_<idx>_<time><ext>
    wait_until(Duration::from_secs(3), || {
        fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .any(|e| e.file_name().to_string_lossy().starts_with("app_0_"))
    });

    // and keeps accepting events into a fresh live file
    output.out(event("after"));
    wait_until(Duration::from_secs(3), || {
        controller.committed.load(Ordering::Relaxed) == 2
    });
    output.stop();
}

#[test]
fn test_empty_live_file_is_not_sealed() {
    let dir = TempDir::new().unwrap();
    let controller = Arc::new(NullController::default());
    let mut cfg = config(dir.path());
    cfg.retention_interval = Duration::from_millis(50);
    let output = FileOutput::new(cfg);
    output.start(params(controller));

    thread::sleep(Duration::from_millis(300));
    output.stop();

    let sealed = fs::read_dir(dir.path())
        .unwrap()
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().starts_with("app_"))
        .count();
    assert_eq!(sealed, 0);
}

#[test]
fn test_scan_start_idx_continues_sequence() {
    let dir = TempDir::new().unwrap();
    assert_eq!(scan_start_idx(dir.path(), "app", ".log"), 0);

    fs::write(dir.path().join("app_3_01-01-2024.log"), b"x").unwrap();
    fs::write(dir.path().join("app_11_01-02-2024.log"), b"x").unwrap();
    fs::write(dir.path().join("other_99_01-02-2024.log"), b"x").unwrap();

    assert_eq!(scan_start_idx(dir.path(), "app", ".log"), 12);
}

#[test]
fn test_find_live_file_adopts_existing() {
    let dir = TempDir::new().unwrap();
    assert!(find_live_file(dir.path(), "app", ".log").is_none());

    fs::write(dir.path().join("1700000000_app.log"), b"").unwrap();
    let (path, ts) = find_live_file(dir.path(), "app", ".log").unwrap();
    assert_eq!(ts, 1700000000);
    assert!(path.ends_with("1700000000_app.log"));
}

#[test]
fn test_split_target() {
    let (dir, name, ext) = FileOutput::split_target(Path::new("/var/log/app.log"));
    assert_eq!(dir, Path::new("/var/log"));
    assert_eq!(name, "app");
    assert_eq!(ext, ".log");

    let (_, name, ext) = FileOutput::split_target(Path::new("plain"));
    assert_eq!(name, "plain");
    assert_eq!(ext, "");
}
