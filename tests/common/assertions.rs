//! Event helpers

use appcenter_publish::{Event, Stage};
use tokio::sync::broadcast;

/// Drain every event already sent to `rx`
pub fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Stage of the `Failed` event, if one was emitted
pub fn failed_stage(events: &[Event]) -> Option<Stage> {
    events.iter().find_map(|e| match e {
        Event::Failed { stage, .. } => Some(*stage),
        _ => None,
    })
}

/// Short names of the stage events, in emission order (chunk and poll events skipped)
pub fn stage_trail(events: &[Event]) -> Vec<&'static str> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::UploadRequested { .. } => Some("upload_requested"),
            Event::MetadataApplied { .. } => Some("metadata_applied"),
            Event::TransferComplete { .. } => Some("transfer_complete"),
            Event::UploadFinished { .. } => Some("upload_finished"),
            Event::ReleaseCommitted { .. } => Some("release_committed"),
            Event::ReleaseReady { .. } => Some("release_ready"),
            Event::Distributed { .. } => Some("distributed"),
            Event::Failed { .. } => Some("failed"),
            Event::ChunkUploaded { .. } | Event::PollAttempt { .. } => None,
        })
        .collect()
}
