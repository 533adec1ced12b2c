use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use matchday_ledger::config::{self, Config};
use matchday_ledger::{logging, seed, store};

fn main() -> Result<()> {
    let cfg = Config::from_env();
    logging::init_logging();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let file = config::arg_value(&args, "file")
        .map(PathBuf::from)
        .context("missing --file=PATH pointing at a match seed json")?;
    let raw = fs::read_to_string(&file).with_context(|| format!("read {}", file.display()))?;
    let match_seed = seed::parse_seed(&raw).context("invalid match seed")?;

    let db_path = cfg.resolve_db_path(config::parse_db_path_arg(&args))?;
    let mut conn = store::open_db(&db_path, cfg.store_timeout)?;
    let inserted = store::seed_match(&mut conn, &match_seed)?;

    println!("Match seed complete");
    println!("DB: {}", db_path.display());
    println!(
        "match {}: {} vs {} kickoff={} {}",
        match_seed.match_id,
        match_seed.home.name,
        match_seed.away.name,
        match_seed.kickoff.to_rfc3339(),
        if inserted { "inserted" } else { "already present" }
    );
    Ok(())
}
