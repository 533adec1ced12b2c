use anyhow::{Context, Result, anyhow};
use serde::Serialize;

use matchday_ledger::config::{self, Config};
use matchday_ledger::momentum::{self, MomentumSample};
use matchday_ledger::timeline::{self, DerivedTimelineRow};
use matchday_ledger::{logging, store};

#[derive(Serialize)]
struct TimelineView {
    match_id: u64,
    home_team_id: u64,
    away_team_id: u64,
    requested_minute: Option<u16>,
    clamped_minute: Option<u16>,
    rows: Vec<DerivedTimelineRow>,
    momentum: Vec<MomentumSample>,
}

fn main() -> Result<()> {
    let cfg = Config::from_env();
    logging::init_logging();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let match_id = config::arg_value(&args, "match-id")
        .and_then(|raw| raw.parse::<u64>().ok())
        .ok_or_else(|| anyhow!("missing or invalid --match-id"))?;
    let requested_minute = config::arg_value(&args, "minute")
        .map(|raw| raw.parse::<u16>().context("--minute must be a number"))
        .transpose()?;

    let db_path = cfg.resolve_db_path(config::parse_db_path_arg(&args))?;
    let conn = store::open_db(&db_path, cfg.store_timeout)?;
    let built = timeline::build_timeline(&conn, match_id)?;

    let all_rows: Vec<DerivedTimelineRow> = built.rows().collect();
    let samples = momentum::estimate(&all_rows, &cfg.momentum());

    // With --minute, only the state as of that (clamped) minute is printed.
    let clamped_minute = requested_minute.and_then(|m| built.clamp_minute(m));
    let (rows, momentum) = match requested_minute {
        Some(minute) => {
            let row = built.row_at(minute);
            let sample = row.as_ref().and_then(|row| {
                samples
                    .iter()
                    .find(|s| s.minute == row.minute && s.half == row.half)
                    .copied()
            });
            (row.into_iter().collect(), sample.into_iter().collect())
        }
        None => (all_rows, samples),
    };

    let record = built.match_record();
    let view = TimelineView {
        match_id,
        home_team_id: record.home_team_id,
        away_team_id: record.away_team_id,
        requested_minute,
        clamped_minute,
        rows,
        momentum,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&view).context("serialize timeline")?
    );
    Ok(())
}
