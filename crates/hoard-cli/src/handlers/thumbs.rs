//! `hoard thumbs` handlers.

use std::time::Duration;

use anyhow::Result;

use crate::bootstrap::CliContext;
use crate::commands::ThumbsCommand;
use crate::presentation::format_bytes;

/// How long `warm` waits for scheduled fetches before cancelling them.
const WARM_GRACE: Duration = Duration::from_secs(60);

/// Execute a thumbs subcommand.
pub async fn execute(ctx: &CliContext, command: &ThumbsCommand) -> Result<()> {
    match command {
        ThumbsCommand::Fetch { urls } => {
            let mut failed = 0;
            for url in urls {
                match ctx.thumbnails.get_or_add(url).await {
                    Ok(path) => println!("{url} -> {}", path.display()),
                    Err(e) => {
                        failed += 1;
                        eprintln!("{url}: {e}");
                    }
                }
            }
            if failed > 0 {
                tracing::warn!(failed, "Some thumbnails could not be fetched");
            }
        }
        ThumbsCommand::Warm { urls } => {
            let scheduled = ctx
                .thumbnails
                .warm(urls.iter().cloned(), &ctx.work_queue);
            println!(
                "Warming {scheduled} thumbnail(s), {} already cached",
                urls.len() - scheduled
            );
            ctx.work_queue.shutdown(WARM_GRACE).await;
            println!(
                "Cache now holds {} files ({})",
                ctx.thumbnails.len(),
                format_bytes(ctx.thumbnails.get_used_bytes())
            );
        }
    }
    Ok(())
}
