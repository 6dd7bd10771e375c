use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use tracing_subscriber::EnvFilter;

use slam_pipeline::http_cache::app_cache_dir;
use slam_pipeline::http_client::http_client;
use slam_pipeline::rank_reference::Tour;
use slam_pipeline::store::TableStore;
use slam_pipeline::tour_dataset::{self, MIN_ARCHIVE_YEAR};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let tour = arg_value("--tour")
        .or_else(|| std::env::var("TOUR_KEY").ok())
        .unwrap_or_else(|| "atp".to_string())
        .parse::<Tour>()?;
    let start_year = parse_year_arg("--start").unwrap_or(MIN_ARCHIVE_YEAR);
    let end_year = parse_year_arg("--end").unwrap_or_else(|| Utc::now().year());
    let events_csv = arg_value("--events-csv")
        .map(|path| std::fs::read_to_string(&path).with_context(|| format!("read {path}")))
        .transpose()?;

    let db_path = arg_value("--db")
        .map(PathBuf::from)
        .or_else(|| app_cache_dir().map(|dir| dir.join("slam_features.sqlite")))
        .context("unable to resolve sqlite path")?;

    let client = http_client()?;
    let summary = tour_dataset::build_tour_dataset(
        client,
        tour,
        start_year,
        end_year,
        events_csv.as_deref(),
    )?;

    let table_name = format!("{}_MATCHES", tour.code().to_uppercase());
    let mut store = TableStore::open(&db_path)?;
    store.replace_tour_table(&table_name, &summary.rows)?;

    println!("Tour ingest complete");
    println!("DB: {} ({table_name})", db_path.display());
    println!("Years: {}/{}", summary.years_fetched, summary.years_total);
    println!("Matches: {}", summary.rows.len());
    if !summary.skipped_years.is_empty() {
        println!("Missing years: {:?}", summary.skipped_years);
    }
    Ok(())
}

fn args() -> Vec<String> {
    std::env::args().skip(1).collect()
}

fn arg_value(name: &str) -> Option<String> {
    let args = args();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&format!("{name}=")) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

fn parse_year_arg(name: &str) -> Option<i32> {
    arg_value(name).and_then(|raw| raw.parse::<i32>().ok())
}
