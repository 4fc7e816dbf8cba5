//! Chunk transfer coordinator.
//!
//! The owner task reads chunks sequentially and queues them; a fixed pool of
//! workers uploads them out of order. The first failure wins a single-assignment
//! slot and cancels the pool: workers that have not started a chunk stop, chunks
//! already in flight finish and their outcome is dropped.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::io::AsyncRead;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::client::{AppCenterClient, TransferBody};
use crate::error::{ApiError, Error, Result, Stage};
use crate::types::{Chunk, Event, TransferOutcome, UploadResource};

use super::chunks::{ChunkPlan, ChunkReader};

/// Uploads one chunk to its transfer endpoint.
#[async_trait::async_trait]
pub(crate) trait ChunkUploader: Send + Sync {
    async fn upload_chunk(&self, chunk: Chunk) -> std::result::Result<(), ApiError>;
}

#[async_trait::async_trait]
impl ChunkUploader for AppCenterClient {
    async fn upload_chunk(&self, chunk: Chunk) -> std::result::Result<(), ApiError> {
        let response = self
            .post_transfer(chunk.url, TransferBody::Bytes(chunk.data))
            .await?;
        tracing::debug!(
            block_number = chunk.block_number,
            chunk_num = ?response.chunk_num,
            "Chunk acknowledged"
        );
        Ok(())
    }
}

/// Single-assignment storage for the first transfer failure
#[derive(Default)]
struct FirstFailure(OnceLock<Error>);

impl FirstFailure {
    /// Store `error` if no failure was recorded yet and cancel the pool.
    /// Later errors are logged and dropped.
    fn record(&self, error: Error, token: &CancellationToken) {
        match self.0.set(error) {
            Ok(()) => token.cancel(),
            Err(discarded) => {
                tracing::warn!(error = %discarded, "Discarding chunk error after first failure");
            }
        }
    }

    fn is_set(&self) -> bool {
        self.0.get().is_some()
    }

    fn into_inner(self) -> Option<Error> {
        self.0.into_inner()
    }
}

/// State shared by the owner task and the workers of one transfer
struct TransferShared {
    token: CancellationToken,
    failure: FirstFailure,
    acknowledged: AtomicUsize,
    total: usize,
    event_tx: broadcast::Sender<Event>,
}

/// Where the chunks come from and where they go
pub(crate) struct TransferJob<'a, R> {
    pub(crate) plan: &'a ChunkPlan,
    pub(crate) reader: ChunkReader<R>,
    pub(crate) resource: &'a UploadResource,
}

/// Upload every chunk of the plan with `workers` concurrent uploads.
///
/// Returns only after all workers were joined. Success means every planned
/// chunk was read, queued and acknowledged.
pub(crate) async fn transfer_chunks<R, U>(
    job: TransferJob<'_, R>,
    uploader: Arc<U>,
    workers: usize,
    event_tx: broadcast::Sender<Event>,
    cancel: &CancellationToken,
) -> Result<TransferOutcome>
where
    R: AsyncRead + Unpin,
    U: ChunkUploader + 'static,
{
    let TransferJob {
        plan,
        mut reader,
        resource,
    } = job;
    let total = plan.len();
    let shared = Arc::new(TransferShared {
        token: cancel.child_token(),
        failure: FirstFailure::default(),
        acknowledged: AtomicUsize::new(0),
        total,
        event_tx,
    });

    // Capacity equals the chunk count so queuing never waits on the workers
    let (tx, rx) = mpsc::channel::<Chunk>(total.max(1));
    let queue = Arc::new(Mutex::new(rx));

    let pool_size = workers.max(1).min(total.max(1));
    tracing::info!(
        chunks = total,
        chunk_size = plan.chunk_size(),
        workers = pool_size,
        "Starting chunk transfer"
    );

    let mut pool = JoinSet::new();
    for worker_id in 0..pool_size {
        pool.spawn(chunk_worker(
            worker_id,
            Arc::clone(&uploader),
            Arc::clone(&queue),
            Arc::clone(&shared),
        ));
    }

    for range in plan.ranges() {
        if shared.token.is_cancelled() {
            break;
        }
        let data = match reader.read_chunk(range).await {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(block_number = range.block_number, error = %e, "Failed to read chunk");
                shared.failure.record(e, &shared.token);
                break;
            }
        };
        let block = range.block_number.to_string();
        let url = match resource.transfer_url("upload_chunk", &[("block_number", block.as_str())]) {
            Ok(url) => url,
            Err(source) => {
                shared.failure.record(
                    Error::ChunkUpload {
                        block_number: range.block_number,
                        source,
                    },
                    &shared.token,
                );
                break;
            }
        };
        let chunk = Chunk {
            block_number: range.block_number,
            url,
            data,
        };
        if tx.send(chunk).await.is_err() {
            break;
        }
    }
    drop(tx);

    while let Some(joined) = pool.join_next().await {
        if let Err(e) = joined {
            shared
                .failure
                .record(Error::Other(format!("chunk worker failed: {}", e)), &shared.token);
        }
    }
    drop(queue);

    let acknowledged = shared.acknowledged.load(Ordering::SeqCst);
    let failure = Arc::into_inner(shared).and_then(|s| s.failure.into_inner());
    if let Some(error) = failure {
        return Err(error);
    }
    if cancel.is_cancelled() {
        return Err(Error::Cancelled {
            stage: Stage::Transfer,
        });
    }
    if acknowledged != total {
        return Err(Error::chunking(format!(
            "only {} of {} chunks were acknowledged",
            acknowledged, total
        )));
    }

    Ok(TransferOutcome {
        chunks: total,
        bytes: plan.file_size(),
    })
}

async fn chunk_worker<U: ChunkUploader>(
    worker_id: usize,
    uploader: Arc<U>,
    queue: Arc<Mutex<mpsc::Receiver<Chunk>>>,
    shared: Arc<TransferShared>,
) {
    loop {
        let next = {
            let mut rx = queue.lock().await;
            tokio::select! {
                biased;
                _ = shared.token.cancelled() => None,
                chunk = rx.recv() => chunk,
            }
        };
        let Some(chunk) = next else {
            break;
        };
        if shared.token.is_cancelled() {
            break;
        }

        let block_number = chunk.block_number;
        match uploader.upload_chunk(chunk).await {
            Ok(()) => {
                let uploaded = shared.acknowledged.fetch_add(1, Ordering::SeqCst) + 1;
                shared
                    .event_tx
                    .send(Event::ChunkUploaded {
                        block_number,
                        uploaded,
                        total: shared.total,
                    })
                    .ok();
            }
            Err(source) => {
                if !shared.failure.is_set() {
                    tracing::error!(worker_id, block_number, error = %source, "Chunk upload failed");
                }
                shared
                    .failure
                    .record(Error::ChunkUpload { block_number, source }, &shared.token);
            }
        }
    }
    tracing::trace!(worker_id, "Chunk worker stopped");
}
