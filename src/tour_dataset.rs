use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use csv::StringRecord;
use reqwest::blocking::Client;

use crate::http_cache::fetch_text_cached;
use crate::point_stream::{parse_opt_f64, parse_opt_u32};
use crate::rank_reference::{Tour, rank_url};

/// Tour archives go back to the open era.
pub const MIN_ARCHIVE_YEAR: i32 = 1968;

/// Tournament -> points-tier table shipped with the crate; callers can layer
/// extra rows from their own file on top.
const DEFAULT_EVENTS_CSV: &str = include_str!("../data/events.csv");

/// Events the points table cannot cover by name: Olympic tournaments and the
/// Next Gen Finals award no ranking points, and one season of the rank files
/// spells the US Open as "Us Open".
const OVERRIDE_POINTS: &[(&str, u32)] = &[
    ("London Olympics", 0),
    ("Rio Olympics", 0),
    ("Tokyo Olympics", 0),
    ("ATP Next Gen Finals", 0),
    ("Us Open", 2000),
    ("Cagliari", 250),
    ("Marbella", 250),
];

#[derive(Debug, Clone)]
pub struct TourMatch {
    pub tour: Tour,
    pub tourney_name: String,
    pub tourney_date: Option<String>,
    pub tourney_year: Option<i32>,
    pub surface: Option<String>,
    pub tourney_level: Option<u8>,
    pub round_label: Option<String>,
    pub round_no: Option<u8>,
    pub tour_points: u32,
    pub points_winner: u32,
    pub points_loser: u32,
    pub winner_name: Option<String>,
    pub winner_age: Option<f64>,
    pub winner_rank: Option<u32>,
    pub winner_rank_points: Option<f64>,
    pub loser_name: Option<String>,
    pub loser_age: Option<f64>,
    pub loser_rank: Option<u32>,
    pub loser_rank_points: Option<f64>,
    pub score: Option<String>,
    pub sets_played: u32,
}

#[derive(Debug, Clone)]
pub struct TourDatasetSummary {
    pub rows: Vec<TourMatch>,
    pub years_total: usize,
    pub years_fetched: usize,
    pub skipped_years: Vec<i32>,
}

/// Tournament level codes: ATP 1, Masters 2, Finals 3, Grand Slam 4, Davis 0.
pub fn tourney_level_code(raw: &str) -> Option<u8> {
    match raw.trim() {
        "A" => Some(1),
        "M" => Some(2),
        "F" => Some(3),
        "G" => Some(4),
        "D" => Some(0),
        _ => None,
    }
}

/// Round labels to draw depth. Round robin counts as the quarter-final tier.
pub fn round_label_no(raw: &str) -> Option<u8> {
    match raw.trim() {
        "R128" => Some(1),
        "R64" => Some(2),
        "R32" => Some(3),
        "R16" => Some(4),
        "QF" | "RR" => Some(5),
        "SF" => Some(6),
        "F" => Some(7),
        "BR" => Some(0),
        _ => None,
    }
}

/// Ranking points the match winner earns, keyed by (points tier, round).
pub fn round_points_winner(tier: u32, round_no: u8) -> u32 {
    match tier {
        2000 => match round_no {
            7 => 800,
            6 => 480,
            5 => 360,
            4 => 180,
            3 => 90,
            2 | 1 => 45,
            _ => 0,
        },
        1500 => match round_no {
            7 => 500,
            6 => 400,
            5 => 200,
            _ => 0,
        },
        1000 => match round_no {
            7 => 400,
            6 => 240,
            5 => 180,
            4 => 90,
            3 | 2 => 45,
            _ => 0,
        },
        500 => match round_no {
            7 => 200,
            6 => 120,
            5 => 90,
            4 => 45,
            3 => 25,
            2 => 20,
            _ => 0,
        },
        250 => match round_no {
            7 => 100,
            6 => 60,
            5 => 45,
            4 => 25,
            3 => 15,
            2 => 5,
            _ => 0,
        },
        _ => 0,
    }
}

pub fn round_points_loser(tier: u32, round_no: u8) -> u32 {
    match tier {
        2000 => match round_no {
            7 => 480,
            6 => 360,
            5 => 180,
            4 => 90,
            3 => 45,
            2 => 35,
            1 => 10,
            _ => 0,
        },
        1500 => match round_no {
            7 => 400,
            _ => 0,
        },
        1000 => match round_no {
            7 => 240,
            6 => 180,
            5 => 90,
            4 => 45,
            3 => 35,
            2 => 10,
            _ => 0,
        },
        500 => match round_no {
            7 => 120,
            6 => 90,
            5 => 45,
            4 => 25,
            3 => 20,
            _ => 0,
        },
        250 => match round_no {
            7 => 60,
            6 => 45,
            5 => 25,
            4 => 15,
            3 => 5,
            _ => 0,
        },
        _ => 0,
    }
}

/// Sets actually contested, from the score string. A terminal retirement or
/// walkover marker means the last token is not a set.
pub fn sets_played(score: Option<&str>) -> u32 {
    let Some(score) = score else {
        return 0;
    };
    let tokens: Vec<&str> = score.split_whitespace().collect();
    if tokens.is_empty() {
        return 0;
    }
    let last = tokens[tokens.len() - 1].to_ascii_uppercase();
    if matches!(last.as_str(), "RET" | "W/O" | "DEF") {
        (tokens.len() - 1) as u32
    } else {
        tokens.len() as u32
    }
}

/// The shipped points table, optionally extended with caller-supplied rows
/// (same two-column layout). Overrides are applied last so they always win.
pub fn events_points_map(extra_csv: Option<&str>) -> Result<HashMap<String, u32>> {
    let mut out = HashMap::new();
    load_points_csv(&mut out, DEFAULT_EVENTS_CSV).context("bundled events table")?;
    if let Some(extra) = extra_csv {
        load_points_csv(&mut out, extra).context("extra events table")?;
    }
    for (name, points) in OVERRIDE_POINTS {
        out.insert((*name).to_string(), *points);
    }
    Ok(out)
}

fn load_points_csv(out: &mut HashMap<String, u32>, text: &str) -> Result<()> {
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let headers = reader.headers().context("read events header")?.clone();
    let name_idx = headers
        .iter()
        .position(|h| h.trim() == "tourney_name")
        .ok_or_else(|| anyhow!("events table missing column 'tourney_name'"))?;
    let points_idx = headers
        .iter()
        .position(|h| h.trim() == "tour_points")
        .ok_or_else(|| anyhow!("events table missing column 'tour_points'"))?;
    for record in reader.records() {
        let record = record.context("read events row")?;
        let name = record.get(name_idx).unwrap_or("").trim();
        if name.is_empty() {
            continue;
        }
        let points = record
            .get(points_idx)
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(0);
        out.insert(name.to_string(), points);
    }
    Ok(())
}

fn header_index(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim() == name)
}

fn cell<'a>(record: &'a StringRecord, idx: Option<usize>) -> &'a str {
    idx.and_then(|i| record.get(i)).unwrap_or("")
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn parse_tour_csv(
    text: &str,
    tour: Tour,
    points_map: &HashMap<String, u32>,
) -> Result<Vec<TourMatch>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader.headers().context("read tour header")?.clone();
    let tourney_name = header_index(&headers, "tourney_name")
        .ok_or_else(|| anyhow!("tour file missing column 'tourney_name'"))?;
    let tourney_date = header_index(&headers, "tourney_date");
    let surface = header_index(&headers, "surface");
    let tourney_level = header_index(&headers, "tourney_level");
    let round = header_index(&headers, "round");
    let score = header_index(&headers, "score");
    let winner_name = header_index(&headers, "winner_name");
    let winner_age = header_index(&headers, "winner_age");
    let winner_rank = header_index(&headers, "winner_rank");
    let winner_rank_points = header_index(&headers, "winner_rank_points");
    let loser_name = header_index(&headers, "loser_name");
    let loser_age = header_index(&headers, "loser_age");
    let loser_rank = header_index(&headers, "loser_rank");
    let loser_rank_points = header_index(&headers, "loser_rank_points");

    let mut out = Vec::new();
    for record in reader.records() {
        let record = record.context("read tour row")?;
        let Some(name) = non_empty(cell(&record, Some(tourney_name))) else {
            continue;
        };
        let date = non_empty(cell(&record, tourney_date));
        let tour_points = *points_map.get(name.as_str()).unwrap_or(&0);
        let round_label = non_empty(cell(&record, round));
        let round_no = round_label.as_deref().and_then(round_label_no);
        let score_str = non_empty(cell(&record, score));
        let (points_winner, points_loser) = match round_no {
            Some(r) if r > 0 && tour_points > 0 => (
                round_points_winner(tour_points, r),
                round_points_loser(tour_points, r),
            ),
            _ => (0, 0),
        };
        out.push(TourMatch {
            tour,
            tourney_year: date.as_deref().and_then(|d| d.get(..4)?.parse::<i32>().ok()),
            tourney_date: date,
            surface: non_empty(cell(&record, surface)),
            tourney_level: tourney_level_code(cell(&record, tourney_level)),
            round_no,
            round_label,
            tour_points,
            points_winner,
            points_loser,
            winner_name: non_empty(cell(&record, winner_name)),
            winner_age: parse_opt_f64(cell(&record, winner_age)),
            winner_rank: parse_opt_u32(cell(&record, winner_rank)),
            winner_rank_points: parse_opt_f64(cell(&record, winner_rank_points)),
            loser_name: non_empty(cell(&record, loser_name)),
            loser_age: parse_opt_f64(cell(&record, loser_age)),
            loser_rank: parse_opt_u32(cell(&record, loser_rank)),
            loser_rank_points: parse_opt_f64(cell(&record, loser_rank_points)),
            sets_played: sets_played(score_str.as_deref()),
            score: score_str,
            tourney_name: name,
        });
    }
    Ok(out)
}

pub fn fetch_tour_year(
    client: &Client,
    tour: Tour,
    year: i32,
    points_map: &HashMap<String, u32>,
) -> Result<Option<Vec<TourMatch>>> {
    let url = rank_url(tour, year);
    let Some(body) = fetch_text_cached(client, &url)? else {
        return Ok(None);
    };
    let rows = parse_tour_csv(&body, tour, points_map).with_context(|| format!("decode {url}"))?;
    Ok(Some(rows))
}

/// Fetch and derive every year in `[start_year, end_year]`, skipping years
/// whose file is absent. Coverage is patchy in the early archive; a missing
/// year is recorded, not fatal.
pub fn build_tour_dataset(
    client: &Client,
    tour: Tour,
    start_year: i32,
    end_year: i32,
    extra_events_csv: Option<&str>,
) -> Result<TourDatasetSummary> {
    if start_year < MIN_ARCHIVE_YEAR {
        return Err(anyhow!(
            "start year {start_year} predates the archive ({MIN_ARCHIVE_YEAR})"
        ));
    }
    if end_year < start_year {
        return Err(anyhow!("year range {start_year}..{end_year} is reversed"));
    }
    let points_map = events_points_map(extra_events_csv)?;

    let mut rows = Vec::new();
    let mut skipped_years = Vec::new();
    let mut years_fetched = 0usize;
    for year in start_year..=end_year {
        match fetch_tour_year(client, tour, year, &points_map)? {
            Some(mut year_rows) => {
                years_fetched += 1;
                rows.append(&mut year_rows);
            }
            None => {
                tracing::warn!(tour = %tour, year, "tour file missing, skipping year");
                skipped_years.push(year);
            }
        }
    }
    Ok(TourDatasetSummary {
        rows,
        years_total: (end_year - start_year + 1) as usize,
        years_fetched,
        skipped_years,
    })
}
