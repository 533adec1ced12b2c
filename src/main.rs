use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing::info;

use matchday_ledger::config::{self, Config};
use matchday_ledger::logging;
use matchday_ledger::poll::{self, MatchPollResult, PollOutcome};
use matchday_ledger::store;

fn main() -> Result<()> {
    let cfg = Config::from_env();
    logging::init_logging();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let match_ids = config::arg_value(&args, "match-ids")
        .or_else(|| std::env::var("MATCH_IDS").ok())
        .map(|raw| config::parse_ids(&raw))
        .unwrap_or_default();
    if match_ids.is_empty() {
        return Err(anyhow!("no match ids given (use --match-ids=1,2 or MATCH_IDS)"));
    }

    let db_path = cfg.resolve_db_path(config::parse_db_path_arg(&args))?;
    let catalog = cfg.load_catalog()?;
    info!(db = %db_path.display(), matches = match_ids.len(), "poll run starting");

    // A single payload file replays one poll without touching the network.
    let results = if let Some(snapshot) = config::arg_value(&args, "snapshot") {
        let [match_id] = match_ids.as_slice() else {
            return Err(anyhow!("--snapshot takes exactly one match id"));
        };
        let path = PathBuf::from(snapshot);
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("read snapshot {}", path.display()))?;
        let result = store::open_db(&db_path, cfg.store_timeout).and_then(|mut conn| {
            poll::process_snapshot(&mut conn, &catalog, *match_id, &raw)
        });
        vec![MatchPollResult {
            match_id: *match_id,
            result,
        }]
    } else {
        let source = cfg.snapshot_source()?;
        poll::run_batch(
            &db_path,
            cfg.store_timeout,
            &catalog,
            source.as_ref(),
            &match_ids,
            cfg.poll_parallelism,
        )
    };

    println!("Poll run complete");
    println!("DB: {}", db_path.display());
    let mut failed = 0usize;
    for item in &results {
        match &item.result {
            Ok(PollOutcome::NotStarted { .. }) => {
                println!("match {}: not started", item.match_id);
            }
            Ok(outcome @ PollOutcome::Reconciled(report)) => {
                println!(
                    "match {}: {}' (half {}) rows={} events+={} live={} over={}",
                    item.match_id,
                    report.minute,
                    report.half,
                    report.outcome.rows_written(),
                    report.outcome.occurrences_inserted,
                    report.flags.half_live,
                    report.flags.game_over,
                );
                if !report.warnings.is_empty() {
                    println!("  warnings: {}", report.warnings.len());
                }
                if let Some(batch) = outcome.notification() {
                    println!(
                        "  notify: {}",
                        serde_json::to_string(&batch).context("serialize notification")?
                    );
                }
            }
            Err(err) => {
                failed += 1;
                let retry = if err.is_retryable() { " (retryable)" } else { "" };
                println!("match {}: failed{retry}: {err}", item.match_id);
            }
        }
    }

    if failed > 0 {
        return Err(anyhow!("{failed}/{} polls failed", results.len()));
    }
    Ok(())
}
