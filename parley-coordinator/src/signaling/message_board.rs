use crate::error::TransportError;
use async_trait::async_trait;
use parley_core::{Envelope, RoomId};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

/// Store-and-list endpoint behind a poll-based relay.
#[async_trait]
pub trait MessageBoard: Send + Sync {
    async fn post(&self, envelope: &Envelope) -> Result<(), TransportError>;

    /// Envelopes of `room_id` with `timestamp >= since`, oldest first.
    async fn list_since(&self, room_id: &RoomId, since: u64) -> Result<Vec<Envelope>, TransportError>;
}

/// Board kept in memory. Rows are stored serialized, as a remote endpoint would.
#[derive(Default)]
pub struct MemoryBoard {
    rows: Mutex<Vec<(u64, RoomId, String)>>,
}

impl MemoryBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }
}

#[async_trait]
impl MessageBoard for MemoryBoard {
    async fn post(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let json = serde_json::to_string(envelope).map_err(|e| TransportError::Encode(e.to_string()))?;
        self.rows
            .lock()
            .await
            .push((envelope.timestamp, envelope.room_id.clone(), json));
        Ok(())
    }

    async fn list_since(&self, room_id: &RoomId, since: u64) -> Result<Vec<Envelope>, TransportError> {
        let rows = self.rows.lock().await;
        let mut out = rows
            .iter()
            .filter(|(ts, room, _)| *ts >= since && room == room_id)
            .map(|(_, _, json)| serde_json::from_str::<Envelope>(json).map_err(TransportError::from))
            .collect::<Result<Vec<_>, _>>()?;
        out.sort_by_key(|e| e.timestamp);
        Ok(out)
    }
}

/// Board backed by a JSON-lines file, shared by every process that opens the
/// same path.
pub struct FileBoard {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileBoard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MessageBoard for FileBoard {
    async fn post(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let mut line = serde_json::to_string(envelope).map_err(|e| TransportError::Encode(e.to_string()))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn list_since(&self, room_id: &RoomId, since: u64) -> Result<Vec<Envelope>, TransportError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut out = Vec::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            // A concurrent writer may leave a torn last line; it will be whole on the next poll.
            match serde_json::from_str::<Envelope>(line) {
                Ok(env) if env.timestamp >= since && &env.room_id == room_id => out.push(env),
                Ok(_) => {}
                Err(e) => warn!(path = %self.path.display(), "skipping unreadable board line: {e}"),
            }
        }
        out.sort_by_key(|e| e.timestamp);
        Ok(out)
    }
}
