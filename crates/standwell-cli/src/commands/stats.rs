use chrono::Utc;
use clap::Subcommand;
use serde::Serialize;
use standwell_core::storage::Database;
use standwell_core::StatsSummary;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's stats (UTC day)
    Today,
    /// All-time stats
    All,
}

#[derive(Serialize)]
struct StatsReport {
    #[serde(flatten)]
    summary: StatsSummary,
    standing_ratio: f64,
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    let summary = match action {
        StatsAction::Today => db.stats_today(Utc::now())?,
        StatsAction::All => db.stats_all()?,
    };
    let report = StatsReport {
        standing_ratio: summary.standing_ratio(),
        summary,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
