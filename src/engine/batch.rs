//! Per-entry worker flow for one top-level URL

use super::accounting::ProgressAccounting;
use super::album::process_album;
use super::pool::{DownloadPool, Downloader};
use crate::resolver::{MetadataResolver, Resolution};
use crate::selection::SelectionGate;
use crate::types::{DownloadStatus, ItemId};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a batch's workers share
pub(crate) struct BatchContext {
    pub accounting: Arc<ProgressAccounting>,
    pub resolver: Arc<MetadataResolver>,
    pub gate: SelectionGate,
    pub downloader: Arc<Downloader>,
    /// Pool for single-track top-level items
    pub top_level_pool: DownloadPool,
    /// Ceiling for the pool each album gets
    pub album_track_concurrency: usize,
    /// Stops the completion monitor when the outcome is claimed elsewhere
    pub monitor_stop: CancellationToken,
}

/// Resolve one top-level URL and download what it points at.
///
/// Every failure ends up in the item's status; nothing propagates out.
pub(crate) async fn process_entry(ctx: Arc<BatchContext>, placeholder: ItemId, url: String) {
    ctx.accounting
        .set_status(placeholder, DownloadStatus::Resolving)
        .await;

    match ctx.resolver.resolve(&url).await {
        Ok(Resolution::Track(info)) => {
            let item = ctx.accounting.describe_track(placeholder, &info).await;
            ctx.top_level_pool.submit(item).await;
        }
        Ok(Resolution::Album(listing)) => {
            process_album(&ctx, placeholder, listing).await;
        }
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "metadata resolution failed");
            ctx.accounting
                .set_status(
                    placeholder,
                    DownloadStatus::Failed {
                        reason: e.to_string(),
                    },
                )
                .await;
        }
    }
}
