use crate::errors::StorageError;
use crate::models::{ActionKind, ActivityRecord, SubjectId};
use chrono::{DateTime, NaiveDate, Utc};
use std::{
    collections::BTreeMap,
    future::Future,
    io::{ErrorKind, SeekFrom},
    path::{Path, PathBuf},
};
use tokio::{
    fs,
    io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader},
    sync::{Mutex, RwLock},
};
use tracing::{debug, warn};

/// Filter for the sparse side of the daily merge.
#[derive(Debug, Clone)]
pub struct CountQuery {
    pub subject: SubjectId,
    pub action: ActionKind,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl CountQuery {
    pub fn matches(&self, record: &ActivityRecord) -> bool {
        record.subject == self.subject
            && record.action == self.action
            && record.occurred_at >= self.from
            && record.occurred_at <= self.to
    }
}

/// Durable, append-only home of [ActivityRecord]s.
pub trait JournalStore: Send + Sync + 'static {
    fn append(
        &self,
        record: &ActivityRecord,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Number of matching records per calendar date. Dates without records are absent.
    fn daily_counts(
        &self,
        query: &CountQuery,
    ) -> impl Future<Output = Result<BTreeMap<NaiveDate, u64>, StorageError>> + Send;
}

fn tally(counts: &mut BTreeMap<NaiveDate, u64>, query: &CountQuery, record: &ActivityRecord) {
    if query.matches(record) {
        let entry = counts.entry(record.occurred_at.date_naive()).or_insert(0);
        *entry = entry.saturating_add(1);
    }
}

pub fn resolve_data_path() -> PathBuf {
    std::env::var("APP_DATA_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data/journal.jsonl"))
}

/// JSON lines journal file. One record per line, appended under a lock so
/// lines never interleave.
pub struct FileJournal {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileJournal {
    pub async fn open(path: PathBuf) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn count_matching(
        &self,
        query: &CountQuery,
    ) -> Result<BTreeMap<NaiveDate, u64>, StorageError> {
        let file = match fs::File::open(&self.path).await {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(err.into()),
        };

        let mut counts = BTreeMap::new();
        let mut skipped = 0usize;
        let mut lines = BufReader::new(file).split(b'\n');
        while let Some(line) = lines.next_segment().await? {
            if line.is_empty() {
                continue;
            }
            match serde_json::from_slice::<ActivityRecord>(&line) {
                Ok(record) => tally(&mut counts, query, &record),
                // torn tail from an interrupted append, or a hand-edited line
                Err(_) => skipped += 1,
            }
        }

        if skipped > 0 {
            warn!(path = ?self.path, skipped, "skipped unreadable journal lines");
        }
        Ok(counts)
    }
}

/// True when the file has content whose last byte is not a line break, i.e. a
/// previous append was cut short.
async fn ends_mid_line(file: &mut fs::File) -> std::io::Result<bool> {
    if file.metadata().await?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1)).await?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).await?;
    Ok(last[0] != b'\n')
}

impl JournalStore for FileJournal {
    async fn append(&self, record: &ActivityRecord) -> Result<(), StorageError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .await?;
        if ends_mid_line(&mut file).await? {
            warn!(path = ?self.path, "journal ends mid-line, starting a fresh line");
            line.insert(0, b'\n');
        }
        file.write_all(&line).await?;
        file.sync_data().await?;
        debug!(path = ?self.path, subject = %record.subject, action = %record.action, "appended record");
        Ok(())
    }

    async fn daily_counts(
        &self,
        query: &CountQuery,
    ) -> Result<BTreeMap<NaiveDate, u64>, StorageError> {
        self.count_matching(query).await
    }
}

/// Journal kept entirely in memory, for embedding and tests.
#[derive(Default)]
pub struct MemoryJournal {
    records: RwLock<Vec<ActivityRecord>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<ActivityRecord> {
        self.records.read().await.clone()
    }
}

impl JournalStore for MemoryJournal {
    async fn append(&self, record: &ActivityRecord) -> Result<(), StorageError> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn daily_counts(
        &self,
        query: &CountQuery,
    ) -> Result<BTreeMap<NaiveDate, u64>, StorageError> {
        let mut counts = BTreeMap::new();
        for record in self.records.read().await.iter() {
            tally(&mut counts, query, record);
        }
        Ok(counts)
    }
}
