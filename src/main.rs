use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::EnvFilter;

use slam_pipeline::http_cache::app_cache_dir;
use slam_pipeline::pipeline::{self, PipelineConfig};
use slam_pipeline::slam_fetch::SlamEvent;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let db_path = parse_db_path_arg()
        .or_else(db_path_from_env)
        .or_else(default_db_path)
        .context("unable to resolve sqlite path")?;

    let mut config = PipelineConfig::new(db_path);
    let years = match parse_years_arg("--years")? {
        Some(years) => Some(years),
        None => years_from_env("SLAM_YEARS")?,
    };
    if let Some(years) = years {
        config.years = years;
    }
    if let Some(events) = parse_events_arg()? {
        config.events = events;
    }
    if has_flag("--skip-raw") {
        config.save_raw = false;
    }
    if has_flag("--skip-baseline") {
        config.save_baseline = false;
    }
    if let Some(par) = parse_usize_arg("--parallelism") {
        config.fetch_parallelism = par.clamp(1, 16);
    }

    let summary = pipeline::run(&config)?;

    println!("Slam pipeline complete");
    println!("DB: {}", summary.db_path.display());
    println!("Units: {}/{}", summary.units_built, summary.units_total);
    println!("Rank rows: {}", summary.rank_rows);
    println!("Feature rows: {}", summary.feature_rows);
    if !summary.skipped.is_empty() {
        println!("Skipped units: {}", summary.skipped.len());
        for skip in &summary.skipped {
            println!("  - {}-{}: {}", skip.year, skip.event, skip.reason);
        }
    }
    Ok(())
}

fn args() -> Vec<String> {
    std::env::args().skip(1).collect()
}

fn has_flag(flag: &str) -> bool {
    args().iter().any(|arg| arg == flag)
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

fn parse_db_path_arg() -> Option<PathBuf> {
    arg_value("--db").map(PathBuf::from)
}

fn db_path_from_env() -> Option<PathBuf> {
    let raw = std::env::var("SLAM_DB_PATH").ok()?;
    if raw.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(raw.trim()))
}

fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join("slam_features.sqlite"))
}

fn parse_years_arg(name: &str) -> Result<Option<Vec<i32>>> {
    match arg_value(name) {
        Some(raw) => parse_years(&raw).map(Some),
        None => Ok(None),
    }
}

fn years_from_env(key: &str) -> Result<Option<Vec<i32>>> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => parse_years(&raw).map(Some),
        _ => Ok(None),
    }
}

/// "2015-2019" or "2015,2017,2019".
fn parse_years(raw: &str) -> Result<Vec<i32>> {
    let trimmed = raw.trim();
    if let Some((start, end)) = trimmed.split_once('-') {
        let start = start.trim().parse::<i32>().context("bad start year")?;
        let end = end.trim().parse::<i32>().context("bad end year")?;
        if end < start {
            return Err(anyhow!("year range {start}-{end} is reversed"));
        }
        return Ok((start..=end).collect());
    }
    let years = trimmed
        .split([',', ';', ' '])
        .filter(|part| !part.trim().is_empty())
        .map(|part| part.trim().parse::<i32>().context("bad year"))
        .collect::<Result<Vec<_>>>()?;
    if years.is_empty() {
        return Err(anyhow!("no years in '{raw}'"));
    }
    Ok(years)
}

fn parse_events_arg() -> Result<Option<Vec<SlamEvent>>> {
    let raw = match arg_value("--events").or_else(|| {
        std::env::var("SLAM_EVENTS")
            .ok()
            .filter(|v| !v.trim().is_empty())
    }) {
        Some(raw) => raw,
        None => return Ok(None),
    };
    let events = raw
        .split([',', ';'])
        .filter(|part| !part.trim().is_empty())
        .map(|part| part.parse::<SlamEvent>())
        .collect::<Result<Vec<_>>>()?;
    if events.is_empty() {
        return Err(anyhow!("no events in '{raw}'"));
    }
    Ok(Some(events))
}

fn parse_usize_arg(name: &str) -> Option<usize> {
    arg_value(name).and_then(|raw| raw.parse::<usize>().ok())
}
