//! Publication orchestration: the top-level lifecycle of a single upload.

use std::sync::Arc;

use crate::error::{Error, Result, Stage};
use crate::types::{Event, PublishedRelease, TransferOutcome, UploadMetadata, UploadResource, UploadTask};

use super::chunks::{ChunkPlan, ChunkReader};
use super::completion::{commit_release, finish_upload};
use super::context::PublishContext;
use super::distribute::distribute_release;
use super::metadata::{FileDescriptor, apply_metadata};
use super::poll::ReleasePoller;
use super::resource::request_upload;
use super::transfer::{TransferJob, transfer_chunks};
use super::validation::{ValidatedFile, validate_task};

/// Core publication task, stages run strictly in order.
///
/// Phases:
/// 1. Validate the task locally
/// 2. Allocate an upload slot
/// 3. Apply metadata (negotiates the chunk plan)
/// 4. Transfer chunks in parallel
/// 5. Signal completion and commit the release
/// 6. Poll until the release is ready
/// 7. Distribute to the task's group, if any
pub(crate) async fn run_publication(
    ctx: &PublishContext,
    task: &UploadTask,
) -> Result<PublishedRelease> {
    // Phase 1: local validation
    let file = ctx.run_stage(Stage::Validation, validate_task(task)).await?;

    // Phase 2: upload slot
    let resource = ctx
        .run_stage(Stage::UploadRequest, request_upload(&ctx.app, &task.options))
        .await?;
    tracing::info!(upload_id = %resource.id, file = %file.file_name, size = file.size, "Upload slot allocated");
    ctx.emit(Event::UploadRequested {
        upload_id: resource.id.clone(),
    });

    // Phase 3: metadata
    let descriptor = FileDescriptor {
        file_name: &file.file_name,
        file_size: file.size,
        content_type: Some(file.content_type),
    };
    let metadata = ctx
        .run_stage(
            Stage::Metadata,
            apply_metadata(ctx.app.client(), &resource, &descriptor, &task.options),
        )
        .await?;
    ctx.emit(Event::MetadataApplied {
        chunk_size: metadata.chunk_size,
        chunk_count: metadata.chunk_count(),
    });

    // Phase 4: chunk transfer (handles cancellation itself so in-flight chunks can finish)
    let outcome = transfer_file(ctx, task, &file, &resource, &metadata).await;
    let outcome = ctx.observe(Stage::Transfer, outcome)?;
    tracing::info!(upload_id = %resource.id, chunks = outcome.chunks, bytes = outcome.bytes, "Chunk transfer complete");
    ctx.emit(Event::TransferComplete {
        chunks: outcome.chunks,
        bytes: outcome.bytes,
    });

    // Phase 5: completion and commit
    ctx.run_stage(Stage::Finish, finish_upload(ctx.app.client(), &resource))
        .await?;
    ctx.emit(Event::UploadFinished {
        upload_id: resource.id.clone(),
    });

    let committed_id = ctx
        .run_stage(Stage::Commit, commit_release(&ctx.app, &resource.id))
        .await?;
    tracing::info!(upload_id = %resource.id, id = %committed_id, "Release committed, waiting for processing");
    ctx.emit(Event::ReleaseCommitted {
        id: committed_id.clone(),
    });

    // Phase 6: wait for processing
    let poller = ReleasePoller::from_config(&ctx.config.polling);
    let polled = poller
        .run(&ctx.app, &committed_id, &ctx.event_tx, &ctx.cancel)
        .await;
    let release_distinct_id = ctx.observe(Stage::Polling, polled)?;
    tracing::info!(release_distinct_id, "Release ready");
    ctx.emit(Event::ReleaseReady {
        release_distinct_id,
    });

    // Phase 7: distribution (a failure here leaves the committed release in place)
    let distributed_to = match task.distribution_group() {
        Some(group) => {
            ctx.run_stage(
                Stage::Distribution,
                distribute_release(&ctx.app, release_distinct_id, group),
            )
            .await?;
            tracing::info!(release_distinct_id, group = %group, "Release distributed");
            ctx.emit(Event::Distributed {
                group: group.to_string(),
                release_distinct_id,
            });
            Some(group.to_string())
        }
        None => None,
    };

    Ok(PublishedRelease {
        release_distinct_id,
        upload_id: resource.id,
        distributed_to,
    })
}

async fn transfer_file(
    ctx: &PublishContext,
    task: &UploadTask,
    file: &ValidatedFile,
    resource: &UploadResource,
    metadata: &UploadMetadata,
) -> Result<TransferOutcome> {
    let plan = ChunkPlan::new(file.size, metadata.chunk_size, metadata.chunk_count())?;
    let source = tokio::fs::File::open(task.path())
        .await
        .map_err(|e| Error::Chunking {
            reason: format!("failed to open {}", task.path().display()),
            source: Some(e),
        })?;
    let job = TransferJob {
        plan: &plan,
        reader: ChunkReader::new(source),
        resource,
    };

    transfer_chunks(
        job,
        Arc::new(ctx.app.client().clone()),
        ctx.config.transfer.worker_count(),
        ctx.event_tx.clone(),
        &ctx.cancel,
    )
    .await
}
