use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use csv::StringRecord;
use reqwest::blocking::Client;

use crate::http_cache::fetch_text_cached;
use crate::point_stream::{
    PlayerPoint, RawPoint, parse_opt_f64, parse_opt_u8, parse_opt_u16, parse_opt_u32,
    parse_point_number, parse_score_token, parse_slot, parse_tri_bool,
};

pub const SLAM_PBP_BASE: &str =
    "https://raw.githubusercontent.com/JeffSackmann/tennis_slam_pointbypoint/master/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SlamEvent {
    AusOpen,
    FrenchOpen,
    Wimbledon,
    UsOpen,
}

impl SlamEvent {
    pub const ALL: [SlamEvent; 4] = [
        SlamEvent::AusOpen,
        SlamEvent::FrenchOpen,
        SlamEvent::Wimbledon,
        SlamEvent::UsOpen,
    ];

    /// Code used in the point-by-point file names and in table names.
    pub fn code(&self) -> &'static str {
        match self {
            SlamEvent::AusOpen => "ausopen",
            SlamEvent::FrenchOpen => "frenchopen",
            SlamEvent::Wimbledon => "wimbledon",
            SlamEvent::UsOpen => "usopen",
        }
    }

    /// Surface encoding carried onto feature rows: hard 0, clay -1, grass 1.
    pub fn surface_code(&self) -> i8 {
        match self {
            SlamEvent::FrenchOpen => -1,
            SlamEvent::Wimbledon => 1,
            SlamEvent::AusOpen | SlamEvent::UsOpen => 0,
        }
    }
}

impl fmt::Display for SlamEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for SlamEvent {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ausopen" | "australian open" => Ok(SlamEvent::AusOpen),
            "frenchopen" | "french open" | "roland garros" => Ok(SlamEvent::FrenchOpen),
            "wimbledon" => Ok(SlamEvent::Wimbledon),
            "usopen" | "us open" => Ok(SlamEvent::UsOpen),
            other => Err(anyhow!(
                "unknown event '{other}': expected ausopen, frenchopen, wimbledon or usopen"
            )),
        }
    }
}

/// One row of an event's matches file. Only the identity fields survive
/// ingestion; presentation columns (courts, nations, ids) are dropped here.
#[derive(Debug, Clone)]
pub struct RawMatch {
    pub match_id: String,
    pub match_num: String,
    pub player1: Option<String>,
    pub player2: Option<String>,
}

pub fn points_url(year: i32, event: SlamEvent) -> String {
    format!("{SLAM_PBP_BASE}{year}-{}-points.csv", event.code())
}

pub fn matches_url(year: i32, event: SlamEvent) -> String {
    format!("{SLAM_PBP_BASE}{year}-{}-matches.csv", event.code())
}

/// `Ok(None)` when the file does not exist for this (year, event).
pub fn fetch_event_points(
    client: &Client,
    year: i32,
    event: SlamEvent,
) -> Result<Option<Vec<RawPoint>>> {
    let url = points_url(year, event);
    let Some(body) = fetch_text_cached(client, &url)? else {
        return Ok(None);
    };
    let rows = parse_points_csv(&body).with_context(|| format!("decode {url}"))?;
    Ok(Some(rows))
}

pub fn fetch_event_matches(
    client: &Client,
    year: i32,
    event: SlamEvent,
) -> Result<Option<Vec<RawMatch>>> {
    let url = matches_url(year, event);
    let Some(body) = fetch_text_cached(client, &url)? else {
        return Ok(None);
    };
    let rows = parse_matches_csv(&body).with_context(|| format!("decode {url}"))?;
    Ok(Some(rows))
}

// Column orders shift between seasons, so positions are resolved from the
// header row by name into one canonical layout before any row decodes.
struct PointColumns {
    match_id: usize,
    elapsed_time: Option<usize>,
    set_no: usize,
    game_no: usize,
    point_number: Option<usize>,
    set_winner: Option<usize>,
    game_winner: Option<usize>,
    point_winner: usize,
    point_server: usize,
    serve_indicator: Option<usize>,
    serve_number: Option<usize>,
    speed_kmh: Option<usize>,
    rally: Option<usize>,
    p1: PlayerColumns,
    p2: PlayerColumns,
}

struct PlayerColumns {
    score: Option<usize>,
    points_won: Option<usize>,
    ace: Option<usize>,
    winner: Option<usize>,
    unf_err: Option<usize>,
    double_fault: Option<usize>,
    first_srv_in: Option<usize>,
    first_srv_won: Option<usize>,
    second_srv_in: Option<usize>,
    second_srv_won: Option<usize>,
}

fn header_index(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim() == name)
}

fn required_index(headers: &StringRecord, name: &str) -> Result<usize> {
    header_index(headers, name).ok_or_else(|| anyhow!("points file missing column '{name}'"))
}

fn player_columns(headers: &StringRecord, slot: u8) -> PlayerColumns {
    let col = |suffix: &str| header_index(headers, &format!("P{slot}{suffix}"));
    PlayerColumns {
        score: col("Score"),
        points_won: col("PointsWon"),
        ace: col("Ace"),
        winner: col("Winner"),
        unf_err: col("UnfErr"),
        double_fault: col("DoubleFault"),
        first_srv_in: col("FirstSrvIn"),
        first_srv_won: col("FirstSrvWon"),
        second_srv_in: col("SecondSrvIn"),
        second_srv_won: col("SecondSrvWon"),
    }
}

fn resolve_point_columns(headers: &StringRecord) -> Result<PointColumns> {
    Ok(PointColumns {
        match_id: required_index(headers, "match_id")?,
        elapsed_time: header_index(headers, "ElapsedTime"),
        set_no: required_index(headers, "SetNo")?,
        game_no: required_index(headers, "GameNo")?,
        point_number: header_index(headers, "PointNumber"),
        set_winner: header_index(headers, "SetWinner"),
        game_winner: header_index(headers, "GameWinner"),
        point_winner: required_index(headers, "PointWinner")?,
        point_server: required_index(headers, "PointServer")?,
        serve_indicator: header_index(headers, "ServeIndicator"),
        serve_number: header_index(headers, "ServeNumber"),
        speed_kmh: header_index(headers, "Speed_KMH"),
        rally: header_index(headers, "RallyCount").or_else(|| header_index(headers, "Rally")),
        p1: player_columns(headers, 1),
        p2: player_columns(headers, 2),
    })
}

fn cell<'a>(record: &'a StringRecord, idx: Option<usize>) -> &'a str {
    idx.and_then(|i| record.get(i)).unwrap_or("")
}

fn decode_player(record: &StringRecord, cols: &PlayerColumns) -> PlayerPoint {
    PlayerPoint {
        score: parse_score_token(cell(record, cols.score)),
        points_won: parse_opt_u32(cell(record, cols.points_won)),
        ace: parse_tri_bool(cell(record, cols.ace)),
        winner: parse_tri_bool(cell(record, cols.winner)),
        unf_err: parse_tri_bool(cell(record, cols.unf_err)),
        double_fault: parse_tri_bool(cell(record, cols.double_fault)),
        first_srv_in: parse_tri_bool(cell(record, cols.first_srv_in)),
        first_srv_won: parse_tri_bool(cell(record, cols.first_srv_won)),
        second_srv_in: parse_tri_bool(cell(record, cols.second_srv_in)),
        second_srv_won: parse_tri_bool(cell(record, cols.second_srv_won)),
    }
}

pub fn parse_points_csv(text: &str) -> Result<Vec<RawPoint>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader.headers().context("read points header")?.clone();
    let cols = resolve_point_columns(&headers)?;

    let mut out = Vec::new();
    for record in reader.records() {
        let record = record.context("read points row")?;
        let match_id = cell(&record, Some(cols.match_id)).trim();
        if match_id.is_empty() {
            continue;
        }
        out.push(RawPoint {
            match_id: match_id.to_string(),
            elapsed_time: non_empty(cell(&record, cols.elapsed_time)),
            set_no: parse_opt_u8(cell(&record, Some(cols.set_no))),
            game_no: parse_opt_u16(cell(&record, Some(cols.game_no))),
            point_number: parse_point_number(cell(&record, cols.point_number)),
            set_winner: parse_slot(cell(&record, cols.set_winner)),
            game_winner: parse_slot(cell(&record, cols.game_winner)),
            point_winner: parse_slot(cell(&record, Some(cols.point_winner))),
            point_server: parse_slot(cell(&record, Some(cols.point_server))),
            serve_indicator: parse_opt_u8(cell(&record, cols.serve_indicator)),
            serve_number: parse_opt_u8(cell(&record, cols.serve_number)),
            speed_kmh: parse_opt_f64(cell(&record, cols.speed_kmh)),
            rally_count: parse_opt_u32(cell(&record, cols.rally)),
            p1: decode_player(&record, &cols.p1),
            p2: decode_player(&record, &cols.p2),
        });
    }
    Ok(out)
}

pub fn parse_matches_csv(text: &str) -> Result<Vec<RawMatch>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader.headers().context("read matches header")?.clone();
    let match_id = required_index(&headers, "match_id").context("matches file")?;
    let player1 = required_index(&headers, "player1").context("matches file")?;
    let player2 = required_index(&headers, "player2").context("matches file")?;
    let match_num = header_index(&headers, "match_num");

    let mut out = Vec::new();
    for record in reader.records() {
        let record = record.context("read matches row")?;
        let id = cell(&record, Some(match_id)).trim();
        if id.is_empty() {
            continue;
        }
        let num = match non_empty(cell(&record, match_num)) {
            Some(num) => num,
            // Older files omit match_num; it is the tail of the match id.
            None => match id.rsplit('-').next() {
                Some(tail) if !tail.is_empty() => tail.to_string(),
                _ => continue,
            },
        };
        out.push(RawMatch {
            match_id: id.to_string(),
            match_num: num,
            player1: non_empty(cell(&record, Some(player1))),
            player2: non_empty(cell(&record, Some(player2))),
        });
    }
    Ok(out)
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_codes_round_trip() {
        for event in SlamEvent::ALL {
            assert_eq!(event.code().parse::<SlamEvent>().unwrap(), event);
        }
        assert_eq!("Roland Garros".parse::<SlamEvent>().unwrap(), SlamEvent::FrenchOpen);
        assert!("exhibition".parse::<SlamEvent>().is_err());
    }

    #[test]
    fn urls_follow_file_naming() {
        assert_eq!(
            points_url(2019, SlamEvent::Wimbledon),
            format!("{SLAM_PBP_BASE}2019-wimbledon-points.csv")
        );
        assert_eq!(
            matches_url(2012, SlamEvent::AusOpen),
            format!("{SLAM_PBP_BASE}2012-ausopen-matches.csv")
        );
    }

    #[test]
    fn points_schema_requires_core_columns() {
        let err = parse_points_csv("match_id,SetNo\n2019-x-1101,1\n").unwrap_err();
        assert!(format!("{err:#}").contains("GameNo"));
    }

    #[test]
    fn match_num_falls_back_to_match_id_tail() {
        let rows = parse_matches_csv(
            "match_id,player1,player2\n2013-wimbledon-1101,Roger Federer,Andy Murray\n",
        )
        .unwrap();
        assert_eq!(rows[0].match_num, "1101");
        assert_eq!(rows[0].player1.as_deref(), Some("Roger Federer"));
    }
}
