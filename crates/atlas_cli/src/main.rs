//! `atlas` command-line entry point.
//!
//! # Responsibility
//! - Wire configuration, logging and the SQLite repository into the service.
//! - Print command results to stdout (JSON for documents, key=value otherwise).

mod cli;

use anyhow::{Context, Result};
use atlas_core::db::open_db;
use atlas_core::insight::{
    graduation_candidates, order_by_similarity, rank_constellations, ScoresHistory,
};
use atlas_core::logging::resolve_log_level;
use atlas_core::{
    init_logging, AtlasConfig, AtlasService, DayEntry, MoodScores, OfflineNamer, RecentWindow,
    SqliteAtlasRepository, StarFilter,
};
use clap::Parser;
use cli::{Cli, Commands, WindowArgs};
use log::info;
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();
    start_logging(&cli)?;

    let config = match &cli.config {
        Some(path) => AtlasConfig::load(path)
            .with_context(|| format!("failed to load config `{}`", path.display()))?,
        None => AtlasConfig::default(),
    };
    let conn = open_db(&cli.db)
        .with_context(|| format!("failed to open database `{}`", cli.db.display()))?;
    let service = AtlasService::new(SqliteAtlasRepository::try_new(&conn)?, config);

    match cli.command {
        Commands::Record {
            date,
            scores,
            keywords,
            links,
            content_length,
        } => {
            let scores = scores
                .map(|raw| serde_json::from_str::<MoodScores>(&raw))
                .transpose()
                .context("--scores must be a JSON object of score values")?;
            let outcome = service.record_day(&DayEntry {
                date,
                scores,
                keywords,
                linked_dates: links,
                content_length,
            })?;
            println!(
                "star={} created={} connections_added={} connections_skipped={}",
                outcome.star_id,
                outcome.created,
                outcome.connections_added,
                outcome.connections_skipped
            );
        }
        Commands::Remove { date } => {
            let outcome = service.remove_day(&date)?;
            println!(
                "removed={} connections_removed={} clusters_dissolved={}",
                outcome.removed,
                outcome.connections_removed,
                outcome.clusters_dissolved.len()
            );
        }
        Commands::Recluster { window, if_dirty } => {
            let window = build_window(&window)?;
            let filter = window.as_ref().map(|w| w as &dyn StarFilter);
            let report = if if_dirty {
                service.recluster_if_dirty(&OfflineNamer, filter)?
            } else {
                Some(service.recluster(&OfflineNamer, filter)?)
            };
            match report {
                Some(report) => println!(
                    "clusters={} floating={} derived_edges={} cache_hits={} identities_kept={} naming_failures={}",
                    report.clusters,
                    report.floating,
                    report.derived_edges,
                    report.cache_hits,
                    report.identities_kept,
                    report.naming_failures
                ),
                None => println!("skipped=clean"),
            }
        }
        Commands::Render { window } => {
            let window = build_window(&window)?;
            let view = service.render(window.as_ref().map(|w| w as &dyn StarFilter))?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        Commands::Export { out } => {
            let json = service.export_json()?;
            match out {
                Some(path) => std::fs::write(&path, json)
                    .with_context(|| format!("failed to write `{}`", path.display()))?,
                None => println!("{json}"),
            }
        }
        Commands::Import { path } => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read `{}`", path.display()))?;
            let status = service.import_json(&json)?;
            println!("{}", serde_json::to_string(&status)?);
        }
        Commands::Insights { scores_file, limit } => {
            let history = read_history(&scores_file)?;
            let clusters = service.render(None)?.clusters;
            let cutoff = recent_window(service.config().visibility.recent_window_days)?;
            let ranked = rank_constellations(&clusters, &history, limit)
                .into_iter()
                .map(|entry| {
                    let members = clusters
                        .iter()
                        .find(|cluster| cluster.id == entry.cluster_id)
                        .map(|cluster| order_by_similarity(cluster, &history))
                        .unwrap_or_default();
                    serde_json::json!({
                        "clusterId": entry.cluster_id,
                        "category": entry.category.as_str(),
                        "totalScore": entry.total_score,
                        "members": members,
                    })
                })
                .collect::<Vec<_>>();
            let graduating = graduation_candidates(
                &clusters,
                cutoff.cutoff(),
                service.config().visibility.graduation_min_stars,
            )
            .into_iter()
            .map(|cluster| cluster.id.clone())
            .collect::<Vec<_>>();
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "ranked": ranked,
                    "graduationCandidates": graduating,
                }))?
            );
        }
        Commands::Status => {
            println!("{}", serde_json::to_string_pretty(&service.status()?)?);
        }
    }

    info!("event=cli_exit module=cli status=ok");
    Ok(())
}

fn start_logging(cli: &Cli) -> Result<()> {
    let Some(dir) = &cli.log_dir else {
        return Ok(());
    };
    let dir = if dir.is_absolute() {
        dir.clone()
    } else {
        std::env::current_dir()?.join(dir)
    };
    let level = resolve_log_level(cli.log_level.as_deref());
    init_logging(&level, &dir.to_string_lossy())
        .map_err(|err| anyhow::anyhow!("failed to initialize logging: {err}"))?;
    Ok(())
}

fn build_window(args: &WindowArgs) -> Result<Option<RecentWindow>> {
    if let Some(since) = &args.since {
        return Ok(Some(RecentWindow::since(since)?));
    }
    match args.recent_days {
        Some(days) => recent_window(days).map(Some),
        None => Ok(None),
    }
}

fn read_history(path: &Path) -> Result<ScoresHistory> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read `{}`", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("`{}` is not a score history", path.display()))
}

/// Window of `days` days ending on the local calendar day.
fn recent_window(days: u32) -> Result<RecentWindow> {
    RecentWindow::ending_today(days)
        .with_context(|| format!("a {days}-day window reaches before the supported calendar"))
}
