use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use csv::StringRecord;
use reqwest::blocking::Client;

use crate::http_cache::fetch_text_cached;
use crate::match_agg::MatchRecord;
use crate::names::canonical_name;
use crate::point_stream::{parse_opt_f64, parse_opt_u32};
use crate::slam_fetch::SlamEvent;

pub const ATP_MATCHES_BASE: &str =
    "https://raw.githubusercontent.com/JeffSackmann/tennis_atp/master/atp_matches_";
pub const WTA_MATCHES_BASE: &str =
    "https://raw.githubusercontent.com/JeffSackmann/tennis_wta/master/wta_matches_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tour {
    Atp,
    Wta,
}

impl Tour {
    pub const ALL: [Tour; 2] = [Tour::Atp, Tour::Wta];

    pub fn code(&self) -> &'static str {
        match self {
            Tour::Atp => "atp",
            Tour::Wta => "wta",
        }
    }

    fn matches_base(&self) -> &'static str {
        match self {
            Tour::Atp => ATP_MATCHES_BASE,
            Tour::Wta => WTA_MATCHES_BASE,
        }
    }
}

impl fmt::Display for Tour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Tour {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "atp" => Ok(Tour::Atp),
            "wta" => Ok(Tour::Wta),
            other => Err(anyhow!("unknown tour '{other}': expected atp or wta")),
        }
    }
}

/// One row of a tour's annual matches file, reduced to the rank/age columns
/// both pipelines join against.
#[derive(Debug, Clone)]
pub struct RankRow {
    pub tour: Tour,
    pub tourney_name: String,
    pub tourney_date: Option<String>,
    pub tourney_year: Option<i32>,
    pub surface: Option<String>,
    pub winner_name: Option<String>,
    pub winner_age: Option<f64>,
    pub winner_rank: Option<u32>,
    pub winner_rank_points: Option<f64>,
    pub loser_name: Option<String>,
    pub loser_age: Option<f64>,
    pub loser_rank: Option<u32>,
    pub loser_rank_points: Option<f64>,
}

/// Canonical rank/points/age for one player within a (tournament, year).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceEntry {
    pub rank: Option<u32>,
    pub rank_points: Option<f64>,
    pub age: Option<f64>,
}

pub fn rank_url(tour: Tour, year: i32) -> String {
    format!("{}{year}.csv", tour.matches_base())
}

/// `Ok(None)` when the year's file does not exist for this tour.
pub fn fetch_rank_year(client: &Client, tour: Tour, year: i32) -> Result<Option<Vec<RankRow>>> {
    let url = rank_url(tour, year);
    let Some(body) = fetch_text_cached(client, &url)? else {
        return Ok(None);
    };
    let rows = parse_rank_csv(&body, tour).with_context(|| format!("decode {url}"))?;
    Ok(Some(rows))
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

pub fn parse_rank_csv(text: &str, tour: Tour) -> Result<Vec<RankRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader.headers().context("read rank header")?.clone();
    let tourney_name = header_index(&headers, "tourney_name")
        .ok_or_else(|| anyhow!("rank file missing column 'tourney_name'"))?;
    let tourney_date = header_index(&headers, "tourney_date");
    let surface = header_index(&headers, "surface");
    let winner_name = header_index(&headers, "winner_name")
        .ok_or_else(|| anyhow!("rank file missing column 'winner_name'"))?;
    let loser_name = header_index(&headers, "loser_name")
        .ok_or_else(|| anyhow!("rank file missing column 'loser_name'"))?;
    let winner_age = header_index(&headers, "winner_age");
    let winner_rank = header_index(&headers, "winner_rank");
    let winner_rank_points = header_index(&headers, "winner_rank_points");
    let loser_age = header_index(&headers, "loser_age");
    let loser_rank = header_index(&headers, "loser_rank");
    let loser_rank_points = header_index(&headers, "loser_rank_points");

    let mut out = Vec::new();
    for record in reader.records() {
        let record = record.context("read rank row")?;
        let Some(name) = non_empty(cell(&record, Some(tourney_name))) else {
            continue;
        };
        let date = non_empty(cell(&record, tourney_date));
        out.push(RankRow {
            tour,
            tourney_name: name,
            tourney_year: date.as_deref().and_then(year_of_tourney_date),
            tourney_date: date,
            surface: non_empty(cell(&record, surface)),
            winner_name: non_empty(cell(&record, Some(winner_name))),
            winner_age: parse_opt_f64(cell(&record, winner_age)),
            winner_rank: parse_opt_u32(cell(&record, winner_rank)),
            winner_rank_points: parse_opt_f64(cell(&record, winner_rank_points)),
            loser_name: non_empty(cell(&record, Some(loser_name))),
            loser_age: parse_opt_f64(cell(&record, loser_age)),
            loser_rank: parse_opt_u32(cell(&record, loser_rank)),
            loser_rank_points: parse_opt_f64(cell(&record, loser_rank_points)),
        });
    }
    Ok(out)
}

/// Dates arrive as YYYYMMDD integers.
fn year_of_tourney_date(raw: &str) -> Option<i32> {
    let digits = raw.trim();
    if digits.len() < 4 {
        return None;
    }
    digits[..4].parse::<i32>().ok()
}

/// Tournament display names differ between the rank tables and the
/// point-by-point repo for the same event; everything funnels through one
/// mapping before filtering ("Roland Garros" is the rank tables' name for
/// the French Open, and one season ships a "Us Open" misspelling).
pub fn event_code_for_tourney(name: &str) -> Option<&'static str> {
    match name.trim().to_ascii_lowercase().as_str() {
        "australian open" => Some("ausopen"),
        "roland garros" | "french open" => Some("frenchopen"),
        "wimbledon" => Some("wimbledon"),
        "us open" => Some("usopen"),
        _ => None,
    }
}

/// Union the winner- and loser-perspective rows into one per-player lookup
/// for the (event, year) scope. The first entry seen for a name wins; later
/// rows for the same player (their rank can move between rounds) are
/// discarded, winner rows before loser rows.
pub fn build_reference(
    rows: &[RankRow],
    event: SlamEvent,
    year: i32,
) -> HashMap<String, ReferenceEntry> {
    let in_scope: Vec<&RankRow> = rows
        .iter()
        .filter(|r| {
            r.tourney_year == Some(year)
                && event_code_for_tourney(&r.tourney_name) == Some(event.code())
        })
        .collect();

    let mut out = HashMap::new();
    for row in &in_scope {
        if let Some(name) = row.winner_name.as_deref() {
            out.entry(canonical_name(name)).or_insert(ReferenceEntry {
                rank: row.winner_rank,
                rank_points: row.winner_rank_points,
                age: row.winner_age,
            });
        }
    }
    for row in &in_scope {
        if let Some(name) = row.loser_name.as_deref() {
            out.entry(canonical_name(name)).or_insert(ReferenceEntry {
                rank: row.loser_rank,
                rank_points: row.loser_rank_points,
                age: row.loser_age,
            });
        }
    }
    out
}

/// Attach rank/points/age to both players of every record. A name with no
/// reference entry leaves its fields unset; the row itself survives.
pub fn join_reference(records: &mut [MatchRecord], reference: &HashMap<String, ReferenceEntry>) {
    for record in records.iter_mut() {
        for slot in [1u8, 2u8] {
            let name = if slot == 1 {
                record.player1.clone()
            } else {
                record.player2.clone()
            };
            let Some(name) = name else {
                continue;
            };
            let Some(entry) = reference.get(name.as_str()) else {
                continue;
            };
            let agg = record.player_mut(slot);
            agg.rank = entry.rank;
            agg.rank_points = entry.rank_points;
            agg.age = entry.age;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tourney_names_map_to_event_codes() {
        assert_eq!(event_code_for_tourney("Roland Garros"), Some("frenchopen"));
        assert_eq!(event_code_for_tourney("French Open"), Some("frenchopen"));
        assert_eq!(event_code_for_tourney("Us Open"), Some("usopen"));
        assert_eq!(event_code_for_tourney("US Open"), Some("usopen"));
        assert_eq!(event_code_for_tourney("Cincinnati"), None);
    }

    #[test]
    fn tourney_date_year_extracts() {
        assert_eq!(year_of_tourney_date("20190701"), Some(2019));
        assert_eq!(year_of_tourney_date("x"), None);
    }

    #[test]
    fn tour_codes_parse() {
        assert_eq!("ATP".parse::<Tour>().unwrap(), Tour::Atp);
        assert!("itf".parse::<Tour>().is_err());
    }
}
