//! `hoard cache` handlers.

use anyhow::Result;

use crate::bootstrap::CliContext;
use crate::commands::CacheCommand;
use crate::error::CliError;
use crate::presentation::format_bytes;

/// Execute a cache subcommand.
pub async fn execute(ctx: &CliContext, command: &CacheCommand) -> Result<()> {
    match command {
        CacheCommand::Stats => stats(ctx).await,
        CacheCommand::Clear {
            namespace,
            thumbnails,
            posts,
        } => clear(ctx, namespace.as_deref(), *thumbnails, *posts).await,
    }
}

async fn stats(ctx: &CliContext) -> Result<()> {
    let settings = ctx.settings.settings();
    println!("TTL caches ({}):", ctx.ttl_cache.root().display());
    let namespaces = ctx.ttl_cache.namespaces().await.map_err(CliError::from)?;
    if namespaces.is_empty() {
        println!("  (none)");
    }
    for name in namespaces {
        let live = ctx.ttl_cache.count(&name).await.map_err(CliError::from)?;
        println!("  {name:<24} {live} live entries");
    }

    let (pools, posts, members) = ctx.post_cache.counts().await.map_err(CliError::from)?;
    println!("Post cache: {pools} pools, {posts} posts, {members} pool memberships");

    let stale = ctx
        .post_cache
        .pools_stale(settings.effective_pools_refresh_hours())
        .await
        .map_err(CliError::from)?;
    if stale {
        println!("  pool list is stale");
    }

    println!(
        "Thumbnails ({}): {} files, {} of {}",
        ctx.thumbnails.cache_path().display(),
        ctx.thumbnails.len(),
        format_bytes(ctx.thumbnails.get_used_bytes()),
        format_bytes(settings.effective_thumbnail_budget()),
    );
    Ok(())
}

async fn clear(
    ctx: &CliContext,
    namespace: Option<&str>,
    thumbnails: bool,
    posts: bool,
) -> Result<()> {
    let everything = namespace.is_none() && !thumbnails && !posts;

    if let Some(name) = namespace {
        let removed = ctx.ttl_cache.clear(name).await.map_err(CliError::from)?;
        println!("Cleared {removed} entries from '{name}'");
    } else if everything {
        let removed = ctx.ttl_cache.clear_all().await.map_err(CliError::from)?;
        println!("Cleared {removed} TTL cache entries");
    }

    if posts || everything {
        ctx.post_cache.clear().await.map_err(CliError::from)?;
        println!("Cleared post cache");
    }

    if thumbnails || everything {
        let removed = ctx.thumbnails.clear().await;
        println!("Removed {removed} thumbnails");
    }
    Ok(())
}
