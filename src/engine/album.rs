//! Album flow: expand, filter, ask for a selection, download the selection

use super::batch::BatchContext;
use super::pool::{DownloadOutcome, DownloadPool};
use crate::error::Error;
use crate::resolver::AlbumListing;
use crate::selection::SelectionOutcome;
use crate::types::{AlbumId, ItemId};

pub(crate) async fn process_album(ctx: &BatchContext, placeholder: ItemId, listing: AlbumListing) {
    let album_id = ctx
        .accounting
        .open_album(placeholder, &listing.title, listing.entries.len())
        .await;

    let expansion = match ctx.resolver.expand(&listing).await {
        Ok(expansion) => expansion,
        Err(e) => {
            settle_dropped_album(ctx, album_id, e).await;
            return;
        }
    };

    let skipped = expansion.skipped();
    if skipped > 0 {
        ctx.accounting.report_skipped(album_id, skipped).await;
    }

    let selected = match ctx
        .gate
        .select(album_id, &expansion.title, &expansion.available)
        .await
    {
        SelectionOutcome::Selected(entries) => entries,
        SelectionOutcome::Canceled => {
            let canceled = Error::SelectionCanceled {
                album: expansion.title.clone(),
            };
            settle_dropped_album(ctx, album_id, canceled).await;
            return;
        }
    };

    let Some(items) = ctx.accounting.confirm_album(album_id, &selected).await else {
        return;
    };

    let pool = DownloadPool::new(ctx.downloader.clone(), Some(ctx.album_track_concurrency));
    let outcomes = pool.run_all(items).await;

    let failed = outcomes
        .iter()
        .filter(|o| matches!(o, DownloadOutcome::Failed(_)))
        .count();
    tracing::info!(
        album = %expansion.title,
        downloaded = outcomes.len() - failed,
        failed,
        "album downloads finished"
    );
}

/// Close an album that will download nothing
///
/// Failures count against the batch; a user cancellation only shrinks the total.
async fn settle_dropped_album(ctx: &BatchContext, album_id: AlbumId, error: Error) {
    if error.counts_as_failure() {
        ctx.accounting.fail_album(album_id, error.to_string()).await;
        return;
    }

    tracing::info!(reason = %error, "album dropped");
    if ctx.accounting.cancel_album(album_id).await.is_some() {
        // Nothing else is left; the report is already out
        ctx.monitor_stop.cancel();
    }
}
