//! File output - batched newline-delimited writer with seal-up rotation
//!
//! Events are encoded one JSON document per line into a timestamped live
//! file (`<unix>_<name><ext>`). A ticker seals the live file on a
//! retention interval: it is renamed to `<name>_<idx>_<time><ext>` and a
//! fresh live file takes its place. On start the plugin adopts an
//! existing live file and continues the sealed-index sequence it finds
//! on disk, so restarts neither clobber nor renumber anything.

use std::fs::{self, File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context as _;
use parking_lot::{Mutex, RwLock};

use lumber_pipeline::{
    Batch, BatchFlusher, Batcher, BatcherOptions, Event, OutputPlugin, OutputPluginParams,
};

const FILE_NAME_SEPARATOR: &str = "_";

#[derive(Debug, Clone)]
pub struct FileOutputConfig {
    /// Logical target; the live file carries a timestamp prefix and
    /// sealed files derive their names from this path
    pub target_file: PathBuf,

    /// How often the live file is sealed and replaced
    pub retention_interval: Duration,

    /// chrono format stamped into sealed file names
    pub time_layout: String,

    /// Batcher worker threads
    pub workers_count: usize,

    /// Events per batch
    pub batch_size: usize,

    /// Seal a non-empty batch this long after its first event
    pub batch_flush_timeout: Duration,

    /// How often the sealer checks whether the retention interval passed
    pub seal_poll_interval: Duration,
}

impl Default for FileOutputConfig {
    fn default() -> Self {
        Self {
            target_file: PathBuf::from("/var/log/lumber.log"),
            retention_interval: Duration::from_secs(60 * 60),
            time_layout: "%m-%d-%Y_%H:%M:%S".to_string(),
            workers_count: thread::available_parallelism().map(|n| n.get()).unwrap_or(1) * 4,
            batch_size: 256,
            batch_flush_timeout: Duration::from_secs(1),
            seal_poll_interval: Duration::from_secs(1),
        }
    }
}

pub struct FileOutput {
    config: FileOutputConfig,
    state: OnceLock<FileState>,
}

struct FileState {
    batcher: Arc<Batcher<FileFlusher>>,
    seal_stop: Arc<AtomicBool>,
}

struct FileFlusher {
    shared: Arc<FileShared>,
    batch_size: usize,
    avg_log_size: usize,
}

/// Per-worker encode buffer, reused across batches.
#[derive(Default)]
struct OutBuffer {
    buf: Vec<u8>,
}

impl BatchFlusher for FileFlusher {
    type Data = OutBuffer;

    fn flush(&self, data: &mut OutBuffer, batch: &Batch) -> anyhow::Result<()> {
        // shrink buffers that ballooned on an oversized record
        let cap = self.batch_size * self.avg_log_size;
        if data.buf.capacity() > cap {
            data.buf = Vec::with_capacity(cap);
        }

        data.buf.clear();
        for event in batch.iter() {
            event.encode(&mut data.buf);
            data.buf.push(b'\n');
        }

        self.shared.write(&data.buf)
    }
}

struct FileShared {
    target_dir: PathBuf,
    file_name: String,
    file_extension: String,
    time_layout: String,
    retention_interval: Duration,

    /// Live file handle; sealed under the write lock, written under read
    file: RwLock<File>,
    current_path: Mutex<PathBuf>,
    next_seal_at: Mutex<SystemTime>,
    idx: Mutex<u64>,
}

impl FileShared {
    fn write(&self, data: &[u8]) -> anyhow::Result<()> {
        let file = self.file.read();
        (&*file)
            .write_all(data)
            .with_context(|| format!("writing {} bytes to the live log file", data.len()))
    }

    fn live_file_name(&self, unix_secs: u64) -> String {
        format!(
            "{unix_secs}{FILE_NAME_SEPARATOR}{}{}",
            self.file_name, self.file_extension
        )
    }

    fn sealed_file_name(&self, idx: u64) -> String {
        let stamp = chrono::Local::now().format(&self.time_layout);
        format!(
            "{name}{sep}{idx}{sep}{stamp}{ext}",
            name = self.file_name,
            sep = FILE_NAME_SEPARATOR,
            ext = self.file_extension,
        )
    }

    /// Rename the live file into its sealed name and start a fresh one.
    /// Empty live files are left alone until they carry data.
    fn seal_up(&self) -> anyhow::Result<()> {
        let size = self.file.read().metadata().context("stat live log file")?.len();
        if size == 0 {
            *self.next_seal_at.lock() = SystemTime::now() + self.retention_interval;
            return Ok(());
        }

        let mut file = self.file.write();

        let sealed_path = {
            let mut idx = self.idx.lock();
            let path = self.target_dir.join(self.sealed_file_name(*idx));
            *idx += 1;
            path
        };

        let mut current = self.current_path.lock();
        fs::rename(&*current, &sealed_path)
            .with_context(|| format!("sealing live log file into {sealed_path:?}"))?;

        let now = unix_now();
        let fresh_path = self.target_dir.join(self.live_file_name(now));
        *file = open_append(&fresh_path)?;
        *current = fresh_path;
        *self.next_seal_at.lock() = SystemTime::now() + self.retention_interval;

        tracing::info!(sealed = %sealed_path.display(), "log file sealed up");
        Ok(())
    }
}

impl FileOutput {
    pub fn new(config: FileOutputConfig) -> Self {
        Self {
            config,
            state: OnceLock::new(),
        }
    }

    fn split_target(target: &Path) -> (PathBuf, String, String) {
        let dir = target.parent().unwrap_or(Path::new(".")).to_path_buf();
        let full = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "lumber.log".to_string());
        match full.rsplit_once('.') {
            Some((stem, ext)) => (dir, stem.to_string(), format!(".{ext}")),
            None => (dir, full, String::new()),
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn open_append(path: &Path) -> anyhow::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening live log file {path:?}"))
}

/// Continue the sealed-index sequence found on disk.
fn scan_start_idx(dir: &Path, file_name: &str, file_extension: &str) -> u64 {
    let prefix = format!("{file_name}{FILE_NAME_SEPARATOR}");
    let mut next = 0;
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(rest) = name.strip_prefix(&prefix) else {
            continue;
        };
        if !rest.ends_with(file_extension) {
            continue;
        }
        if let Some((idx, _)) = rest.split_once(FILE_NAME_SEPARATOR) {
            if let Ok(idx) = idx.parse::<u64>() {
                next = next.max(idx + 1);
            }
        }
    }
    next
}

/// Adopt an existing live file (`<unix>_<name><ext>`), if one is there.
fn find_live_file(dir: &Path, file_name: &str, file_extension: &str) -> Option<(PathBuf, u64)> {
    let suffix = format!("{FILE_NAME_SEPARATOR}{file_name}{file_extension}");
    for entry in fs::read_dir(dir).ok()?.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(ts) = name.strip_suffix(&suffix) else {
            continue;
        };
        if let Ok(ts) = ts.parse::<u64>() {
            return Some((entry.path(), ts));
        }
    }
    None
}

impl OutputPlugin for FileOutput {
    fn start(&self, params: OutputPluginParams) {
        let (target_dir, file_name, file_extension) = Self::split_target(&self.config.target_file);

        fs::create_dir_all(&target_dir)
            .unwrap_or_else(|e| panic!("could not create target dir {target_dir:?}: {e}"));

        let idx = scan_start_idx(&target_dir, &file_name, &file_extension);

        let (current_path, created_at) =
            match find_live_file(&target_dir, &file_name, &file_extension) {
                Some(found) => found,
                None => {
                    let now = unix_now();
                    let path = target_dir.join(format!(
                        "{now}{FILE_NAME_SEPARATOR}{file_name}{file_extension}"
                    ));
                    (path, now)
                }
            };

        let file = open_append(&current_path)
            .unwrap_or_else(|e| panic!("could not open live log file: {e}"));
        let next_seal_at =
            UNIX_EPOCH + Duration::from_secs(created_at) + self.config.retention_interval;

        let shared = Arc::new(FileShared {
            target_dir,
            file_name,
            file_extension,
            time_layout: self.config.time_layout.clone(),
            retention_interval: self.config.retention_interval,
            file: RwLock::new(file),
            current_path: Mutex::new(current_path),
            next_seal_at: Mutex::new(next_seal_at),
            idx: Mutex::new(idx),
        });

        let batcher = Batcher::new(
            BatcherOptions {
                pipeline_name: params.defaults.pipeline_name.clone(),
                output_type: "file".to_string(),
                worker_count: self.config.workers_count,
                batch_size: self.config.batch_size,
                flush_timeout: self.config.batch_flush_timeout,
                maintenance_interval: None,
            },
            FileFlusher {
                shared: Arc::clone(&shared),
                batch_size: self.config.batch_size,
                avg_log_size: params.defaults.settings.avg_log_size,
            },
            params.controller,
        );
        batcher.start();

        let seal_stop = Arc::new(AtomicBool::new(false));
        {
            let shared = Arc::clone(&shared);
            let stop = Arc::clone(&seal_stop);
            let poll = self.config.seal_poll_interval;
            thread::spawn(move || loop {
                thread::sleep(poll);
                if stop.load(Ordering::Relaxed) {
                    return;
                }
                if SystemTime::now() >= *shared.next_seal_at.lock() {
                    if let Err(error) = shared.seal_up() {
                        tracing::error!(%error, "log file seal-up failed");
                    }
                }
            });
        }

        let _ = self.state.set(FileState { batcher, seal_stop });
    }

    fn stop(&self) {
        if let Some(state) = self.state.get() {
            state.seal_stop.store(true, Ordering::Relaxed);
            state.batcher.stop();
        }
    }

    fn out(&self, event: Box<Event>) {
        self.state
            .get()
            .expect("file output is not started")
            .batcher
            .add(event);
    }
}

#[cfg(test)]
#[path = "file_test.rs"]
mod tests;
