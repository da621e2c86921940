//! Durable directory-backed transport.
//!
//! Layout under the root: `pending/` holds published messages, `inflight/`
//! holds claimed but unacked ones and `dead/` holds messages that could not be
//! decoded. File names start with the zero-padded enqueue time so a sorted
//! directory listing is FIFO order. Every state change is a single rename.
//!
//! A claim renames the message to `<claimed millis>-<token>--<name>` in
//! `inflight/`. That name is the receipt: ack removes exactly that file, and
//! `recover` only returns claims older than the lease.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::utils::{ensure_dir, tmp_path};
use crate::domain::ReportJob;
use crate::errors::{ExpenseError, Result};

use super::{Delivery, Envelope, ReportPublisher, ReportSubscriber};

const PENDING_DIR: &str = "pending";
const INFLIGHT_DIR: &str = "inflight";
const DEAD_DIR: &str = "dead";
const CLAIM_SEPARATOR: &str = "--";

/// How long a claim may stay unacked before another consumer may recover it.
pub const DEFAULT_CLAIM_LEASE: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct FileQueue {
    root: PathBuf,
    pending: PathBuf,
    inflight: PathBuf,
    dead: PathBuf,
    lease: Duration,
}

impl FileQueue {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let queue = Self {
            pending: root.join(PENDING_DIR),
            inflight: root.join(INFLIGHT_DIR),
            dead: root.join(DEAD_DIR),
            root,
            lease: DEFAULT_CLAIM_LEASE,
        };
        for dir in [&queue.pending, &queue.inflight, &queue.dead] {
            ensure_dir(dir).await.map_err(unavailable)?;
        }
        Ok(queue)
    }

    /// Sets the age after which [`ReportSubscriber::recover`] treats a claim
    /// as abandoned.
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    pub async fn pending_len(&self) -> Result<usize> {
        Ok(list_messages(&self.pending).await?.len())
    }

    pub async fn inflight_len(&self) -> Result<usize> {
        Ok(list_messages(&self.inflight).await?.len())
    }

    fn file_name(envelope: &Envelope) -> String {
        let nanos = envelope.enqueued_at.timestamp_nanos_opt().unwrap_or_default();
        format!("{nanos:020}-{}.json", envelope.id)
    }

    fn is_abandoned(&self, claimed_millis: i64, now_millis: i64) -> bool {
        let age = u128::try_from(now_millis.saturating_sub(claimed_millis)).unwrap_or(0);
        age >= self.lease.as_millis()
    }

    async fn bury(&self, claimed: &str, name: &str, reason: &str) {
        warn!(message = name, reason, "moving undecodable report message aside");
        if let Err(err) = fs::rename(self.inflight.join(claimed), self.dead.join(name)).await {
            warn!(message = name, error = %err, "could not move message to dead letters");
        }
    }
}

fn claim_name(name: &str) -> String {
    let millis = Utc::now().timestamp_millis().max(0);
    format!("{millis:020}-{}{CLAIM_SEPARATOR}{name}", Uuid::new_v4().simple())
}

/// Splits an in-flight name into its claim time and the published name.
fn parse_claim(claimed: &str) -> Option<(i64, &str)> {
    let (claim, name) = claimed.split_once(CLAIM_SEPARATOR)?;
    let (millis, _token) = claim.split_once('-')?;
    Some((millis.parse().ok()?, name))
}

fn unavailable(err: ExpenseError) -> ExpenseError {
    match err {
        ExpenseError::Storage(message) => ExpenseError::QueueUnavailable(message),
        other => other,
    }
}

fn io_unavailable(err: std::io::Error) -> ExpenseError {
    ExpenseError::QueueUnavailable(err.to_string())
}

async fn list_messages(dir: &Path) -> Result<Vec<String>> {
    let mut entries = fs::read_dir(dir).await.map_err(io_unavailable)?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_unavailable)? {
        if let Some(name) = entry.file_name().to_str() {
            if name.ends_with(".json") {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

#[async_trait]
impl ReportPublisher for FileQueue {
    async fn publish(&self, job: &ReportJob) -> Result<()> {
        let envelope = Envelope::wrap(job.clone());
        let name = Self::file_name(&envelope);
        let data = serde_json::to_vec_pretty(&envelope)?;
        // Stage in the root so the rename into pending/ stays on one filesystem
        // and consumers never see a partial file.
        let staged = tmp_path(&self.root.join(&name));
        fs::write(&staged, data).await.map_err(io_unavailable)?;
        if let Err(err) = fs::rename(&staged, self.pending.join(&name)).await {
            let _ = fs::remove_file(&staged).await;
            return Err(io_unavailable(err));
        }
        debug!(message = %name, owner_id = %job.owner_id, "report message published");
        Ok(())
    }
}

#[async_trait]
impl ReportSubscriber for FileQueue {
    async fn recover(&self) -> Result<usize> {
        let now = Utc::now().timestamp_millis();
        let mut moved = 0;
        for claimed in list_messages(&self.inflight).await? {
            let name = match parse_claim(&claimed) {
                Some((millis, _)) if !self.is_abandoned(millis, now) => continue,
                Some((_, name)) => name,
                None => claimed.as_str(),
            };
            match fs::rename(self.inflight.join(&claimed), self.pending.join(name)).await {
                Ok(()) => moved += 1,
                // Acked, or recovered by another consumer, in the meantime.
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(io_unavailable(err)),
            }
        }
        Ok(moved)
    }

    async fn claim(&self) -> Result<Option<Delivery>> {
        for name in list_messages(&self.pending).await? {
            let claimed = claim_name(&name);
            match fs::rename(self.pending.join(&name), self.inflight.join(&claimed)).await {
                Ok(()) => {}
                // Another consumer claimed it first.
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(io_unavailable(err)),
            }
            let raw = fs::read(self.inflight.join(&claimed))
                .await
                .map_err(io_unavailable)?;
            match serde_json::from_slice::<Envelope>(&raw) {
                Ok(envelope) => {
                    return Ok(Some(Delivery {
                        receipt: claimed,
                        envelope,
                    }))
                }
                Err(err) => self.bury(&claimed, &name, &err.to_string()).await,
            }
        }
        Ok(None)
    }

    async fn ack(&self, delivery: &Delivery) -> Result<()> {
        match fs::remove_file(self.inflight.join(&delivery.receipt)).await {
            Ok(()) => Ok(()),
            // Recovered after the lease ran out; the newer claim owns it now.
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_unavailable(err)),
        }
    }
}
