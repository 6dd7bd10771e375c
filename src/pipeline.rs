use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::{Datelike, Utc};
use rayon::prelude::*;
use reqwest::blocking::Client;

use crate::features::{self, FeatureRow};
use crate::http_client::http_client;
use crate::match_agg::{DrawFormat, MatchRecord, aggregate_event};
use crate::names::canonical_name;
use crate::point_stream::{group_points_by_match, reconstruct_all};
use crate::rank_reference::{self, RankRow, Tour, build_reference, join_reference};
use crate::slam_fetch::{self, SlamEvent};
use crate::store::{TableStore, unit_table_name};

/// Point-by-point coverage starts in 2011.
pub const MIN_POINT_YEAR: i32 = 2011;

pub const RANK_TABLE_NAME: &str = "BASE_RANK_TABLE";
pub const ALL_EVENTS_TABLE_NAME: &str = "FEATURES_ALL_EVENTS";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub db_path: PathBuf,
    pub years: Vec<i32>,
    pub events: Vec<SlamEvent>,
    pub save_raw: bool,
    pub save_baseline: bool,
    pub fetch_parallelism: usize,
    pub draw_format: DrawFormat,
}

impl PipelineConfig {
    pub fn new(db_path: PathBuf) -> Self {
        let current_year = Utc::now().year();
        Self {
            db_path,
            years: (MIN_POINT_YEAR..current_year).collect(),
            events: SlamEvent::ALL.to_vec(),
            save_raw: true,
            save_baseline: true,
            fetch_parallelism: fetch_parallelism_from_env(),
            draw_format: DrawFormat::default(),
        }
    }

    /// Caller mistakes are hard errors up front; data gaps are handled per
    /// unit later.
    pub fn validate(&self) -> Result<()> {
        if self.years.is_empty() {
            return Err(anyhow!("no years configured"));
        }
        if self.events.is_empty() {
            return Err(anyhow!("no events configured"));
        }
        let current_year = Utc::now().year();
        for year in &self.years {
            if *year < MIN_POINT_YEAR || *year > current_year {
                return Err(anyhow!(
                    "year {year} out of range: point coverage runs {MIN_POINT_YEAR}..{current_year}"
                ));
            }
        }
        if self.fetch_parallelism == 0 {
            return Err(anyhow!("fetch parallelism must be at least 1"));
        }
        Ok(())
    }
}

pub fn fetch_parallelism_from_env() -> usize {
    env::var("FETCH_PARALLELISM")
        .ok()
        .and_then(|val| val.parse::<usize>().ok())
        .unwrap_or(4)
        .clamp(1, 16)
}

#[derive(Debug, Clone)]
pub struct SkippedUnit {
    pub year: i32,
    pub event: SlamEvent,
    pub reason: String,
}

#[derive(Debug)]
pub struct PipelineSummary {
    pub db_path: PathBuf,
    pub units_total: usize,
    pub units_built: usize,
    pub rank_rows: usize,
    pub feature_rows: usize,
    pub skipped: Vec<SkippedUnit>,
}

struct UnitOutput {
    year: i32,
    event: SlamEvent,
    raw: Vec<MatchRecord>,
    base: Vec<MatchRecord>,
    features: Vec<FeatureRow>,
}

/// Run extraction, reconstruction, aggregation, joining and feature
/// derivation over every (year, event) unit, then persist. Units are
/// independent: one unit's missing or broken data is recorded and skipped
/// while its siblings proceed. Persistence is ordered, so identical inputs
/// produce identical tables.
pub fn run(config: &PipelineConfig) -> Result<PipelineSummary> {
    config.validate()?;
    let client = http_client()?;

    let mut years = config.years.clone();
    years.sort_unstable();
    years.dedup();
    let mut events = Vec::new();
    for event in &config.events {
        if !events.contains(event) {
            events.push(*event);
        }
    }

    let pool = build_fetch_pool(config.fetch_parallelism);

    // Rank files are per (tour, year); fetch each once and share across that
    // year's events.
    let rank_by_year: Vec<(i32, Vec<RankRow>)> = with_fetch_pool(&pool, || {
        years
            .par_iter()
            .map(|year| (*year, fetch_year_rank_rows(client, *year)))
            .collect()
    });
    let all_rank_rows: Vec<RankRow> = rank_by_year
        .iter()
        .flat_map(|(_, rows)| rows.iter().cloned())
        .collect();
    let rank_map: HashMap<i32, &Vec<RankRow>> =
        rank_by_year.iter().map(|(year, rows)| (*year, rows)).collect();

    let units: Vec<(i32, SlamEvent)> = years
        .iter()
        .flat_map(|year| events.iter().map(move |event| (*year, *event)))
        .collect();

    let results: Vec<Result<UnitOutput, SkippedUnit>> = with_fetch_pool(&pool, || {
        units
            .par_iter()
            .map(|(year, event)| {
                let rank_rows = rank_map.get(year).map_or(&[][..], |rows| rows.as_slice());
                build_unit(client, *year, *event, rank_rows, config)
            })
            .collect()
    });

    let mut store = TableStore::open(&config.db_path)?;
    store
        .replace_rank_table(RANK_TABLE_NAME, &all_rank_rows)
        .context("persist rank table")?;

    let mut all_features: Vec<FeatureRow> = Vec::new();
    let mut skipped = Vec::new();
    let mut units_built = 0usize;
    for result in results {
        match result {
            Ok(unit) => {
                units_built += 1;
                if config.save_raw {
                    let name = unit_table_name("RAW", unit.year, unit.event);
                    store.replace_match_table(&name, &unit.raw)?;
                }
                if config.save_baseline {
                    let name = unit_table_name("BASE", unit.year, unit.event);
                    store.replace_match_table(&name, &unit.base)?;
                }
                let name = unit_table_name("FEATURES", unit.year, unit.event);
                store.replace_feature_table(&name, &unit.features)?;
                tracing::info!(
                    year = unit.year,
                    event = %unit.event,
                    matches = unit.base.len(),
                    features = unit.features.len(),
                    "unit built"
                );
                all_features.extend(unit.features);
            }
            Err(skip) => {
                tracing::warn!(year = skip.year, event = %skip.event, reason = %skip.reason, "unit skipped");
                skipped.push(skip);
            }
        }
    }

    store
        .replace_feature_table(ALL_EVENTS_TABLE_NAME, &all_features)
        .context("persist consolidated feature table")?;

    Ok(PipelineSummary {
        db_path: config.db_path.clone(),
        units_total: units.len(),
        units_built,
        rank_rows: all_rank_rows.len(),
        feature_rows: all_features.len(),
        skipped,
    })
}

fn fetch_year_rank_rows(client: &Client, year: i32) -> Vec<RankRow> {
    let mut rows = Vec::new();
    for tour in Tour::ALL {
        match rank_reference::fetch_rank_year(client, tour, year) {
            Ok(Some(mut tour_rows)) => rows.append(&mut tour_rows),
            Ok(None) => {
                tracing::warn!(tour = %tour, year, "rank file missing");
            }
            Err(err) => {
                tracing::warn!(tour = %tour, year, error = %format!("{err:#}"), "rank fetch failed");
            }
        }
    }
    rows
}

fn build_unit(
    client: &Client,
    year: i32,
    event: SlamEvent,
    rank_rows: &[RankRow],
    config: &PipelineConfig,
) -> Result<UnitOutput, SkippedUnit> {
    let skip = |reason: String| SkippedUnit { year, event, reason };

    let mut matches = match slam_fetch::fetch_event_matches(client, year, event) {
        Ok(Some(rows)) if !rows.is_empty() => rows,
        Ok(_) => return Err(skip("matches file missing or empty".to_string())),
        Err(err) => return Err(skip(format!("matches fetch failed: {err:#}"))),
    };
    let points = match slam_fetch::fetch_event_points(client, year, event) {
        Ok(Some(rows)) if !rows.is_empty() => rows,
        Ok(_) => return Err(skip("points file missing or empty".to_string())),
        Err(err) => return Err(skip(format!("points fetch failed: {err:#}"))),
    };

    for m in matches.iter_mut() {
        m.player1 = m.player1.as_deref().map(canonical_name);
        m.player2 = m.player2.as_deref().map(canonical_name);
    }

    let mut groups = group_points_by_match(points);
    reconstruct_all(&mut groups);
    let raw = aggregate_event(&matches, &groups, year, event, &config.draw_format);

    let reference = build_reference(rank_rows, event, year);
    if reference.is_empty() {
        return Err(skip("no rank reference entries for this event and year".to_string()));
    }
    let mut base = raw.clone();
    join_reference(&mut base, &reference);

    let features = features::derive_event_features(&base, event);
    Ok(UnitOutput {
        year,
        event,
        raw,
        base,
        features,
    })
}

fn build_fetch_pool(threads: usize) -> Option<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .ok()
}

fn with_fetch_pool<T>(pool: &Option<rayon::ThreadPool>, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    if let Some(pool) = pool.as_ref() {
        pool.install(action)
    } else {
        action()
    }
}
