//! # fangst
//!
//! Operator tool for the Fångst sync engine's on-device cache.
//!
//! - inspect and prune catches and comments stored by the local fallback
//! - render the feed exactly as a client sees it while offline
//! - check promo codes without touching any profile
//! - run a scripted save against a slow in-memory remote store

mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fangst_shared::entitlement::{normalize_code, redeem_code};
use fangst_shared::{CatchId, CatchRecord, NewCatch};
use fangst_sync::catches::CatchService;
use fangst_sync::feed::CommunityFeed;
use fangst_sync::remote::MemoryRemoteStore;
use fangst_sync::session::ProfileSession;
use fangst_sync::{degraded_view, LocalCache, RemoteStore, SyncConfig, SyncContext};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,fangst_sync=debug,fangst_store=info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = SyncConfig::from_env();
    if let Some(path) = cli.db.clone() {
        config.db_path = Some(path);
    }
    info!(?config, "Loaded configuration");

    let cache = LocalCache::open(&config).context("opening local cache")?;

    match cli.command {
        Command::Catches => {
            let catches = cache.catches()?;
            if catches.is_empty() {
                println!("No locally saved catches.");
            }
            for catch in &catches {
                print_catch(catch);
            }
        }
        Command::Comments { catch_id } => {
            let comments = cache.comments(&CatchId(catch_id))?;
            if comments.is_empty() {
                println!("No comments.");
            }
            for comment in comments {
                println!("{}  {}: {}", comment.id, comment.display_name, comment.text);
            }
        }
        Command::Remove { catch_id } => {
            let id = CatchId(catch_id);
            if !id.is_local() {
                anyhow::bail!("{id} is not a locally saved catch");
            }
            if cache.remove_catch(&id)? {
                println!("Removed {id} and its comments.");
            } else {
                println!("{id} was not in the cache.");
            }
        }
        Command::Namespaces => {
            for ns in cache.namespaces()? {
                println!("{:<48} {:<9} {:>5}", ns.name, ns.kind, ns.entries);
            }
        }
        Command::Feed { json } => {
            let local = cache.catches()?.into_iter().filter(|c| c.is_public).collect();
            let view = degraded_view(local);
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                for catch in &view {
                    print_catch(catch);
                }
            }
        }
        Command::Promo { code } => match redeem_code(&code, chrono::Utc::now()) {
            Some(grant) => println!(
                "{} grants {:?} with {} AI uses{}",
                normalize_code(&code),
                grant.premium_type,
                grant.ai_quota_total,
                grant
                    .expires_at
                    .map(|at| format!(", expires {}", at.format("%Y-%m-%d %H:%M UTC")))
                    .unwrap_or_default()
            ),
            None => println!("{} is not a valid code", normalize_code(&code)),
        },
        Command::Demo { delay_ms, owner } => {
            run_demo(cache, config, Duration::from_millis(delay_ms), owner).await?;
        }
    }

    Ok(())
}

/// Save one catch against a remote store that answers after `delay`, then
/// show the feed a client would render.
async fn run_demo(
    cache: LocalCache,
    config: SyncConfig,
    delay: Duration,
    owner: String,
) -> anyhow::Result<()> {
    let store = MemoryRemoteStore::new();
    let remote: Arc<dyn RemoteStore> = Arc::new(store.clone());
    let session = Arc::new(
        ProfileSession::start(remote.clone(), &config, owner.as_str().into(), None, None).await,
    );
    store.set_write_delay(Some(delay));

    let ctx = SyncContext::new(remote, cache, config);
    let catches = CatchService::new(ctx.clone(), session);
    let outcome = catches
        .save_catch(NewCatch {
            owner_id: owner.as_str().into(),
            image_ref: "demo://pike.jpg".into(),
            location_text: "Demo lake".into(),
            water_type: fangst_shared::WaterType::Lake,
            comment: "Saved by fangst demo".into(),
            is_public: true,
            ai_result: None,
        })
        .await?;
    println!("save outcome: {outcome:?}");

    store.set_write_delay(None);
    let view = CommunityFeed::new(ctx).load().await;
    println!("feed ({} catches, degraded: {}):", view.catches.len(), view.degraded);
    for catch in &view.catches {
        print_catch(catch);
    }
    Ok(())
}

fn print_catch(catch: &CatchRecord) {
    let species = catch
        .ai_result
        .as_ref()
        .map(|ai| ai.species_name.as_str())
        .unwrap_or("unknown species");
    let when = catch
        .created_at
        .as_ref()
        .and_then(|ts| ts.to_datetime())
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{:<48} {:<16} {:<10} {:>3} likes {:>3} comments  {}",
        catch.id,
        when,
        species,
        catch.likes_count,
        catch.comments_count,
        catch.location_text
    );
}
