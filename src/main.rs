//! CLI driver for the leadsync engine.
//!
//! Thin wrapper: argument parsing and progress printing live here, all
//! behavior lives in the library. Credentials come from the environment
//! (LEMLIST_API_KEY, HUBSPOT_API_TOKEN; LEADSYNC_DB overrides the cache
//! path).

use std::process::ExitCode;

use leadsync::api::hubspot::HubSpotClient;
use leadsync::api::lemlist::{LemlistApi as _, LemlistClient};
use leadsync::config::{self, HubSpotConfig, LemlistConfig, SyncTuning};
use leadsync::db::Store;
use leadsync::derive::{DerivationEngine, DeriveOptions};
use leadsync::reconcile::{KeepPolicy, Reconciler};
use leadsync::sync::SyncEngine;

const USAGE: &str = "\
leadsync — Lemlist → SQLite sync with HubSpot scoring write-back

Usage:
  leadsync campaigns [--status <status>]
  leadsync sync <campaign-id> [--full]
  leadsync enrich <campaign-id>
  leadsync refresh-lead <campaign-id> <email>
  leadsync stats <campaign-id>
  leadsync push-engagement <campaign-id>
  leadsync push-fit
  leadsync reconcile-notes <campaign-id> [--delete-duplicates] [--keep-oldest]
  leadsync drift <campaign-id>
  leadsync purge <campaign-id>

Environment:
  LEMLIST_API_KEY      Lemlist API key (required for sync/enrich)
  HUBSPOT_API_TOKEN    HubSpot private app token (required for push/reconcile)
  LEADSYNC_DB          Cache path (default ~/.leadsync/leadsync.db)
";

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn open_store() -> Result<Store, Box<dyn std::error::Error>> {
    Ok(match config::db_path_from_env() {
        Some(path) => Store::open_at(path)?,
        None => Store::open()?,
    })
}

fn lemlist() -> Result<LemlistClient, Box<dyn std::error::Error>> {
    Ok(LemlistClient::new(LemlistConfig::from_env()?)?)
}

fn hubspot() -> Result<HubSpotClient, Box<dyn std::error::Error>> {
    Ok(HubSpotClient::new(HubSpotConfig::from_env()?)?)
}

fn progress_to_stderr(current: usize, total: usize) {
    eprint!("\r  {}/{}", current, total);
    if current == total {
        eprintln!();
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut words = args.iter().map(String::as_str);

    match words.next() {
        Some("campaigns") => {
            let status = match (words.next(), words.next()) {
                (Some("--status"), Some(status)) => Some(status.to_string()),
                _ => None,
            };
            let client = lemlist()?;
            let campaigns = client.fetch_campaigns(status.as_deref()).await?;
            for campaign in &campaigns {
                println!(
                    "{}  {}  [{}]",
                    campaign.id,
                    campaign.name,
                    campaign.status.as_deref().unwrap_or("unknown")
                );
            }
            eprintln!("{} campaigns", campaigns.len());
        }

        Some("sync") => {
            let campaign_id = words.next().ok_or(USAGE)?;
            let force_full = args.iter().any(|a| a == "--full");
            let store = open_store()?;
            let client = lemlist()?;
            let engine = SyncEngine::new(&store, &client, SyncTuning::default());

            let outcome = engine.sync_campaign(campaign_id, None, None, force_full).await?;
            println!(
                "{:?}: fetched {}, persisted {} activities / {} leads, enriched {}",
                outcome.mode,
                outcome.activities_fetched,
                outcome.activities_persisted,
                outcome.leads_persisted,
                outcome.enriched
            );
        }

        Some("enrich") => {
            let campaign_id = words.next().ok_or(USAGE)?;
            let store = open_store()?;
            let client = lemlist()?;
            let engine = SyncEngine::new(&store, &client, SyncTuning::default());

            let report = engine
                .enrich_pending(campaign_id, Some(&progress_to_stderr))
                .await?;
            println!(
                "processed {}, found data for {}, failed {}",
                report.processed, report.success, report.failed
            );
        }

        Some("refresh-lead") => {
            let campaign_id = words.next().ok_or(USAGE)?;
            let email = words.next().ok_or(USAGE)?;
            let store = open_store()?;
            let client = lemlist()?;
            let engine = SyncEngine::new(&store, &client, SyncTuning::default());

            if engine.refresh_lead(campaign_id, email).await? {
                println!("refreshed {}", email);
            } else {
                println!("{} is not cached for campaign {}", email, campaign_id);
            }
        }

        Some("stats") => {
            let campaign_id = words.next().ok_or(USAGE)?;
            let store = open_store()?;
            let stats = store.campaign_stats(campaign_id)?;
            println!(
                "{} leads ({} with HubSpot IDs), {} activities, last synced {}",
                stats.leads,
                stats.leads_with_hubspot,
                stats.activities,
                stats.last_synced_at.as_deref().unwrap_or("never")
            );
        }

        Some("push-engagement") => {
            let campaign_id = words.next().ok_or(USAGE)?;
            let store = open_store()?;
            let client = hubspot()?;
            if !client.verify_token().await? {
                return Err("invalid HubSpot API token".into());
            }
            let options = DeriveOptions::from(&HubSpotConfig::from_env()?);
            let engine = DerivationEngine::new(&store, &client, options);

            let report = engine
                .push_engagement(campaign_id, Some(&progress_to_stderr))
                .await?;
            println!(
                "processed {}, success {}, failed {}, skipped {}",
                report.processed, report.success, report.failed, report.skipped
            );
        }

        Some("push-fit") => {
            let store = open_store()?;
            let client = hubspot()?;
            if !client.verify_token().await? {
                return Err("invalid HubSpot API token".into());
            }
            let options = DeriveOptions::from(&HubSpotConfig::from_env()?);
            let engine = DerivationEngine::new(&store, &client, options);

            let report = engine.push_fit(Some(&progress_to_stderr)).await?;
            println!(
                "processed {}, success {}, failed {} (no company {}, unmapped industry {}, unset seniority {})",
                report.push.processed,
                report.push.success,
                report.push.failed,
                report.misses.missing_company,
                report.misses.unmapped_industry,
                report.misses.unset_seniority
            );
        }

        Some("reconcile-notes") => {
            let campaign_id = words.next().ok_or(USAGE)?;
            let delete = args.iter().any(|a| a == "--delete-duplicates");
            let keep = if args.iter().any(|a| a == "--keep-oldest") {
                KeepPolicy::Oldest
            } else {
                KeepPolicy::Newest
            };

            let store = open_store()?;
            let client = hubspot()?;
            let reconciler = Reconciler::new(&store, &client);

            let notes = reconciler
                .fetch_notes(campaign_id, Some(&progress_to_stderr))
                .await?;
            let recognized = notes.iter().filter(|n| n.parsed.is_some()).count();
            println!("{} notes fetched, {} recognized", notes.len(), recognized);

            let duplicates = reconciler.find_duplicates(&notes);
            let extra: usize = duplicates.iter().map(|g| g.len() - 1).sum();
            println!("{} duplicate groups ({} deletable notes)", duplicates.len(), extra);

            if delete && !duplicates.is_empty() {
                let report = reconciler
                    .delete_duplicates(&duplicates, keep, Some(&progress_to_stderr))
                    .await?;
                println!(
                    "deleted {}, failed {}",
                    report.deleted, report.failed
                );
                if !report.failed_ids.is_empty() {
                    eprintln!("failed note ids: {}", report.failed_ids.join(", "));
                }
            }
        }

        Some("drift") => {
            let campaign_id = words.next().ok_or(USAGE)?;
            let store = open_store()?;
            let client = hubspot()?;
            let reconciler = Reconciler::new(&store, &client);

            let notes = reconciler
                .fetch_notes(campaign_id, Some(&progress_to_stderr))
                .await?;
            let report = reconciler.drift_report(&notes, campaign_id)?;
            println!(
                "matched {}, notes-only {}, store-only {}",
                report.matched,
                report.notes_only.len(),
                report.store_only.len()
            );
            for (email, activity_type, campaign) in &report.notes_only {
                println!("  notes-only: {} {} ({})", email, activity_type, campaign);
            }
            for (email, activity_type, campaign) in &report.store_only {
                println!("  store-only: {} {} ({})", email, activity_type, campaign);
            }
        }

        Some("purge") => {
            let campaign_id = words.next().ok_or(USAGE)?;
            let store = open_store()?;
            store.clear_campaign(campaign_id)?;
            println!("purged campaign {}", campaign_id);
        }

        _ => {
            eprint!("{}", USAGE);
            return Err("unknown or missing command".into());
        }
    }

    Ok(())
}
