use std::{
    collections::VecDeque,
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use tokio::{fs::read_dir, time::sleep};

use tracing::{debug, error, info, warn};

use crate::{
    entry::{RequestEntry, Schedule, RESCHEDULE_MINUTES},
    error::Error,
    request::{build_request, UploadPayload},
    upload::{ServerReply, Uploader},
};

/// Walks `work_dir` for every directory named `target` and turns each of their
/// immediate subdirectories into a pending upload, artists sorted by name.
pub async fn scan(
    work_dir: &Path,
    target: &str,
    skip: &[String],
    schedule: &Schedule,
) -> Result<Vec<RequestEntry>, Error> {
    let roots = find_targets(work_dir, target).await?;
    if roots.is_empty() {
        return Err(Error::TargetNotFound(target.to_owned(), work_dir.to_owned()));
    }

    let mut entries = Vec::new();
    for root in roots {
        info!("Found target directory {}", root.display());
        let mut artists = Vec::new();
        let mut dir = read_dir(&root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            match path.file_name().and_then(|s| s.to_str()) {
                Some(folder_name) if skip.iter().any(|s| s == folder_name) => {
                    debug!("Skipping artist {folder_name}");
                }
                Some(folder_name) => artists.push(folder_name.to_owned()),
                None => warn!("Skipping {}: folder name isn't valid UTF-8", path.display()),
            }
        }
        artists.sort();
        entries.extend(
            artists
                .into_iter()
                .map(|artist| RequestEntry::new(artist, &root, schedule)),
        );
    }
    Ok(entries)
}

async fn find_targets(work_dir: &Path, target: &str) -> Result<Vec<PathBuf>, Error> {
    let mut found = Vec::new();
    if work_dir.file_name().map_or(false, |name| name == target) {
        found.push(work_dir.to_owned());
    }

    // the working directory itself must be readable, anything below is best effort
    let mut pending = vec![work_dir.to_owned()];
    let mut first = true;
    while let Some(folder) = pending.pop() {
        let mut dir = match read_dir(&folder).await {
            Ok(dir) => dir,
            Err(e) if first => return Err(e.into()),
            Err(e) => {
                warn!("Can't read {}: {e}", folder.display());
                continue;
            }
        };
        first = false;
        loop {
            let entry = match dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("Can't list {}: {e}", folder.display());
                    break;
                }
            };
            // file_type doesn't follow symlinks, so link cycles can't trap the walk
            match entry.file_type().await {
                Ok(file_type) if file_type.is_dir() => {}
                Ok(_) => continue,
                Err(e) => {
                    warn!("Can't stat {}: {e}", entry.path().display());
                    continue;
                }
            }
            let path = entry.path();
            if entry.file_name() == target {
                found.push(path.clone());
            }
            pending.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// How rate-limited shows are retried.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Added to a rescheduled show's publish time.
    pub reschedule_offset: chrono::Duration,
    /// Extra wait on top of the server's `retry_after`.
    pub padding: Duration,
    /// Submissions per show before giving up, `None` for no limit.
    pub max_attempts: Option<u32>,
    /// Longest single wait, whatever the server asks for.
    pub max_pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            reschedule_offset: chrono::Duration::minutes(RESCHEDULE_MINUTES),
            padding: Duration::ZERO,
            max_attempts: Some(20),
            max_pause: Duration::from_secs(60 * 60),
        }
    }
}

#[derive(Debug)]
pub enum UploadOutcome {
    Success(String),
    RateLimited {
        retry_after: Duration,
        rescheduled: RequestEntry,
    },
    Fatal(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Uploaded {
    pub artist: String,
    pub key: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropReason {
    MissingFiles,
    Rejected(String),
    GaveUp(u32),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::MissingFiles => write!(f, "expected exactly one .mp3 and one .jpg"),
            DropReason::Rejected(body) => write!(f, "rejected: {body}"),
            DropReason::GaveUp(attempts) => write!(f, "still rate limited after {attempts} attempts"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dropped {
    pub artist: String,
    pub reason: DropReason,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub uploaded: Vec<Uploaded>,
    pub dropped: Vec<Dropped>,
}

/// Drains the upload queue one show at a time.
///
/// A rate-limited show goes back to the tail of the queue with a later publish
/// time, and the whole processor waits out the server's delay before moving on.
pub struct QueueProcessor<U> {
    uploader: U,
    policy: RetryPolicy,
    queue: VecDeque<RequestEntry>,
    report: RunReport,
}

impl<U: Uploader> QueueProcessor<U> {
    pub fn new(
        uploader: U,
        policy: RetryPolicy,
        entries: impl IntoIterator<Item = RequestEntry>,
    ) -> Self {
        QueueProcessor {
            uploader,
            policy,
            queue: entries.into_iter().collect(),
            report: RunReport::default(),
        }
    }

    pub async fn run(mut self) -> RunReport {
        info!("{} shows queued", self.queue.len());
        while let Some(entry) = self.queue.pop_front() {
            self.step(entry).await;
        }
        self.report
    }

    async fn step(&mut self, entry: RequestEntry) {
        let Some(payload) = build_request(&entry).await else {
            warn!("Skipping {}: show files missing or ambiguous", entry.artist);
            self.drop_entry(entry, DropReason::MissingFiles);
            return;
        };

        info!(
            attempt = entry.attempt,
            publish_date = %payload.publish_date,
            "Uploading {}",
            entry.artist
        );
        match self.attempt(&entry, payload).await {
            UploadOutcome::Success(key) => {
                info!("Uploaded {} as {key}", entry.artist);
                self.report.uploaded.push(Uploaded {
                    artist: entry.artist,
                    key,
                });
            }
            UploadOutcome::RateLimited {
                retry_after,
                rescheduled,
            } => {
                if self
                    .policy
                    .max_attempts
                    .map_or(false, |max| rescheduled.attempt > max)
                {
                    error!("Giving up on {} after {} attempts", entry.artist, entry.attempt);
                    let attempts = entry.attempt;
                    self.drop_entry(entry, DropReason::GaveUp(attempts));
                } else {
                    info!(
                        "{} rate limited, rescheduled to {}",
                        entry.artist,
                        rescheduled.publish_timestamp()
                    );
                    self.queue.push_back(rescheduled);
                }
                let mut pause = retry_after.saturating_add(self.policy.padding);
                if pause > self.policy.max_pause {
                    warn!(
                        "Server asked to wait {} seconds, capping at {}",
                        pause.as_secs(),
                        self.policy.max_pause.as_secs()
                    );
                    pause = self.policy.max_pause;
                }
                info!("Sleeping for {} seconds", pause.as_secs());
                sleep(pause).await;
            }
            UploadOutcome::Fatal(reason) => {
                error!("Upload of {} failed: {reason}", entry.artist);
                self.drop_entry(entry, DropReason::Rejected(reason));
            }
        }
    }

    async fn attempt(&self, entry: &RequestEntry, payload: UploadPayload) -> UploadOutcome {
        match self.uploader.submit(payload).await {
            Ok(ServerReply::Accepted(key)) => UploadOutcome::Success(key),
            Ok(ServerReply::RateLimited(retry_after)) => UploadOutcome::RateLimited {
                retry_after,
                rescheduled: entry.rescheduled(self.policy.reschedule_offset),
            },
            Ok(ServerReply::Rejected(body)) => UploadOutcome::Fatal(body),
            Err(e) => UploadOutcome::Fatal(e.to_string()),
        }
    }

    fn drop_entry(&mut self, entry: RequestEntry, reason: DropReason) {
        self.report.dropped.push(Dropped {
            artist: entry.artist,
            reason,
        });
    }
}
