//! Background persistence with debounce and retry.
//!
//! The interaction thread hands every edit to [`PersistenceWriter::enqueue`].
//! Only the newest state of each annotation is kept; once the debounce window
//! closes the batch goes to a worker thread that writes it to a
//! [`SequenceStore`], retrying failed writes with exponential backoff. Results
//! come back as [`WriterNotice`]s. A write that keeps failing is requeued, so
//! the in-memory model is never the loser.

use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use web_time::Instant;

use super::auto_save::AutoSaveManager;
use super::record::SequenceRecord;
use super::store::SequenceStore;
use crate::error::PersistError;
use crate::model::{AnnotationId, BoundingBoxSequence};

/// Retry schedule for a single write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: crate::constants::DEFAULT_SAVE_RETRIES,
            initial_backoff: Duration::from_millis(crate::constants::DEFAULT_SAVE_BACKOFF_MS),
            max_backoff: Duration::from_millis(crate::constants::MAX_SAVE_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): doubles each time, capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .map_or(self.max_backoff, |d| d.min(self.max_backoff))
    }

    /// Run `op` until it succeeds or attempts run out.
    ///
    /// On failure returns the last error and the number of attempts made.
    pub fn run<T>(
        &self,
        mut op: impl FnMut() -> Result<T, PersistError>,
    ) -> Result<T, (PersistError, u32)> {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= attempts => return Err((e, attempt)),
                Err(e) => {
                    let delay = self.backoff(attempt);
                    log::debug!(
                        "Write attempt {}/{} failed ({}), retrying in {:?}",
                        attempt,
                        attempts,
                        e,
                        delay
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

/// One write for the store.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Save(AnnotationId, SequenceRecord),
    Delete(AnnotationId),
}

impl WriteOp {
    pub fn id(&self) -> AnnotationId {
        match self {
            WriteOp::Save(id, _) | WriteOp::Delete(id) => *id,
        }
    }

    fn into_state(self) -> Option<SequenceRecord> {
        match self {
            WriteOp::Save(_, record) => Some(record),
            WriteOp::Delete(_) => None,
        }
    }
}

/// Outcome of a write, reported back to the interaction thread.
#[derive(Debug, Clone, PartialEq)]
pub enum WriterNotice {
    Saved(AnnotationId),
    Deleted(AnnotationId),
    /// Every attempt failed; the write has been requeued
    Failed {
        id: AnnotationId,
        attempts: u32,
        error: String,
    },
}

/// Message sent to the writer thread.
enum ThreadMessage {
    Batch(Vec<WriteOp>),
    Shutdown,
}

/// Reply from the writer thread: the notice plus the op to requeue on failure.
struct Reply {
    notice: WriterNotice,
    retry: Option<WriteOp>,
}

/// Handle to the persistence worker thread.
pub struct PersistenceWriter {
    request_tx: Sender<ThreadMessage>,
    reply_rx: Receiver<Reply>,
    thread_handle: Option<JoinHandle<()>>,
    auto_save: AutoSaveManager,
    /// Newest unsaved state per annotation (`None` = deleted)
    latest: BTreeMap<AnnotationId, Option<SequenceRecord>>,
    /// Writes sent to the thread and not yet reported
    outstanding: usize,
}

impl PersistenceWriter {
    /// Spawn the writer thread over `store`.
    pub fn spawn(
        store: Box<dyn SequenceStore>,
        auto_save: AutoSaveManager,
        retry: RetryPolicy,
    ) -> Result<Self, PersistError> {
        let (request_tx, request_rx) = mpsc::channel::<ThreadMessage>();
        let (reply_tx, reply_rx) = mpsc::channel::<Reply>();

        let thread_handle = thread::Builder::new()
            .name("persistence-writer".to_string())
            .spawn(move || {
                log::info!("Persistence writer thread started");
                Self::thread_loop(store, retry, request_rx, reply_tx);
                log::info!("Persistence writer thread exiting");
            })?;

        Ok(Self {
            request_tx,
            reply_rx,
            thread_handle: Some(thread_handle),
            auto_save,
            latest: BTreeMap::new(),
            outstanding: 0,
        })
    }

    fn thread_loop(
        mut store: Box<dyn SequenceStore>,
        retry: RetryPolicy,
        request_rx: Receiver<ThreadMessage>,
        reply_tx: Sender<Reply>,
    ) {
        while let Ok(message) = request_rx.recv() {
            let batch = match message {
                ThreadMessage::Batch(batch) => batch,
                ThreadMessage::Shutdown => {
                    log::debug!("Received shutdown signal");
                    break;
                }
            };
            log::debug!("Writing batch of {} annotations", batch.len());
            for op in batch {
                let id = op.id();
                let result = retry.run(|| match &op {
                    WriteOp::Save(id, record) => store.save(*id, record),
                    WriteOp::Delete(id) => store.delete(*id),
                });
                let reply = match result {
                    Ok(()) => Reply {
                        notice: match op {
                            WriteOp::Save(..) => WriterNotice::Saved(id),
                            WriteOp::Delete(_) => WriterNotice::Deleted(id),
                        },
                        retry: None,
                    },
                    Err((error, attempts)) => {
                        log::warn!(
                            "Failed to persist annotation {} after {} attempts: {}",
                            id,
                            attempts,
                            error
                        );
                        Reply {
                            notice: WriterNotice::Failed {
                                id,
                                attempts,
                                error: error.to_string(),
                            },
                            retry: Some(op),
                        }
                    }
                };
                if reply_tx.send(reply).is_err() {
                    log::warn!("Notice channel closed, writer thread exiting");
                    return;
                }
            }
        }
    }

    /// Record the new state of an annotation (`None` when it was deleted).
    pub fn enqueue(&mut self, id: AnnotationId, sequence: Option<&BoundingBoxSequence>) {
        self.latest
            .insert(id, sequence.map(|s| SequenceRecord::from_sequence(s, false)));
        self.auto_save.mark_dirty(id);
    }

    /// Annotations with changes not yet handed to the thread.
    pub fn pending_count(&self) -> usize {
        self.latest.len()
    }

    /// Send the pending batch if it is due, and collect finished notices.
    pub fn tick(&mut self) -> Vec<WriterNotice> {
        if let Some(ids) = self.auto_save.take_due() {
            self.send(ids);
        }
        self.drain_replies()
    }

    /// Send everything pending now, ignoring the debounce.
    pub fn flush(&mut self) {
        let ids = self.auto_save.take_pending();
        self.send(ids);
    }

    /// Flush and block until the thread has reported every write, or `max_wait` passes.
    pub fn wait_idle(&mut self, max_wait: Duration) -> Vec<WriterNotice> {
        self.flush();
        let deadline = Instant::now() + max_wait;
        let mut notices = Vec::new();
        while self.outstanding > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.reply_rx.recv_timeout(remaining) {
                Ok(reply) => notices.push(self.handle_reply(reply)),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    log::warn!("Persistence writer thread disconnected");
                    break;
                }
            }
        }
        notices
    }

    pub fn is_idle(&self) -> bool {
        self.outstanding == 0 && self.latest.is_empty()
    }

    fn send(&mut self, ids: Vec<AnnotationId>) {
        let batch: Vec<WriteOp> = ids
            .into_iter()
            .filter_map(|id| {
                let state = self.latest.remove(&id)?;
                Some(match state {
                    Some(record) => WriteOp::Save(id, record),
                    None => WriteOp::Delete(id),
                })
            })
            .collect();
        if batch.is_empty() {
            return;
        }
        let count = batch.len();
        match self.request_tx.send(ThreadMessage::Batch(batch)) {
            Ok(()) => self.outstanding += count,
            Err(mpsc::SendError(ThreadMessage::Batch(batch))) => {
                log::warn!("Persistence writer thread is gone, keeping {} writes", count);
                self.requeue(batch);
            }
            Err(_) => {}
        }
    }

    fn drain_replies(&mut self) -> Vec<WriterNotice> {
        let mut notices = Vec::new();
        loop {
            match self.reply_rx.try_recv() {
                Ok(reply) => notices.push(self.handle_reply(reply)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.outstanding > 0 {
                        log::warn!("Persistence writer thread disconnected");
                        self.outstanding = 0;
                    }
                    break;
                }
            }
        }
        notices
    }

    fn handle_reply(&mut self, reply: Reply) -> WriterNotice {
        self.outstanding = self.outstanding.saturating_sub(1);
        if let Some(op) = reply.retry {
            self.requeue(vec![op]);
        }
        reply.notice
    }

    /// Put failed writes back unless a newer state was enqueued meanwhile.
    fn requeue(&mut self, ops: Vec<WriteOp>) {
        let ids: Vec<AnnotationId> = ops.iter().map(WriteOp::id).collect();
        for op in ops {
            let id = op.id();
            self.latest.entry(id).or_insert_with(|| op.into_state());
        }
        self.auto_save.mark_save_failed(ids);
    }
}

impl Drop for PersistenceWriter {
    fn drop(&mut self) {
        log::debug!("Shutting down persistence writer");
        self.flush();
        let _ = self.request_tx.send(ThreadMessage::Shutdown);

        if let Some(handle) = self.thread_handle.take() {
            if let Err(e) = handle.join() {
                log::warn!("Persistence writer thread panicked: {:?}", e);
            }
        }
    }
}
