use std::collections::HashMap;

use crate::point_stream::RawPoint;
use crate::slam_fetch::{RawMatch, SlamEvent};

/// Draw numbering rules. Men's and women's singles reuse match numbers, so a
/// fixed offset per draw keeps ids unique and sortable; the round lives at a
/// fixed digit position counted from the end of the normalized number.
#[derive(Debug, Clone)]
pub struct DrawFormat {
    pub mens_offset: i64,
    pub womens_offset: i64,
    pub round_digit_from_end: usize,
}

impl Default for DrawFormat {
    fn default() -> Self {
        Self {
            mens_offset: 1000,
            womens_offset: 2000,
            round_digit_from_end: 3,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlayerAggregate {
    pub sets: u32,
    pub games: u32,
    pub points: u32,
    pub service_points: u32,
    pub first_serves: u32,
    pub first_serves_won: u32,
    pub second_serves: u32,
    pub second_serves_won: u32,
    pub winners: u32,
    pub unf_err: u32,
    pub max_serve_kmh: Option<f64>,
    pub mean_serve_kmh: Option<f64>,
    pub speed_sum: f64,
    pub speed_obs: u32,
    pub rank: Option<u32>,
    pub rank_points: Option<f64>,
    pub age: Option<f64>,
}

/// One row per match: identity plus both players' aggregates. Rank fields
/// stay empty until the reference join runs.
#[derive(Debug, Clone, Default)]
pub struct MatchRecord {
    pub match_id: String,
    pub year: i32,
    pub slam: String,
    pub match_num: i64,
    pub round: Option<u8>,
    pub player1: Option<String>,
    pub player2: Option<String>,
    pub winner: Option<u8>,
    pub total_sets: u32,
    pub total_games: u32,
    pub total_points: u32,
    pub total_service_points: u32,
    pub p1: PlayerAggregate,
    pub p2: PlayerAggregate,
}

impl MatchRecord {
    pub fn player(&self, slot: u8) -> &PlayerAggregate {
        if slot == 1 { &self.p1 } else { &self.p2 }
    }

    pub fn player_mut(&mut self, slot: u8) -> &mut PlayerAggregate {
        if slot == 1 { &mut self.p1 } else { &mut self.p2 }
    }
}

/// Fold letter-coded draw numbers into numeric space: "MS2" -> 1002,
/// "WS101" -> 2101. Already-numeric values pass through (some seasons ship
/// them as floats).
pub fn normalize_match_num(raw: &str, format: &DrawFormat) -> Option<i64> {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed.strip_prefix("MS") {
        return rest.trim().parse::<i64>().ok().map(|n| n + format.mens_offset);
    }
    if let Some(rest) = trimmed.strip_prefix("WS") {
        return rest.trim().parse::<i64>().ok().map(|n| n + format.womens_offset);
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return Some(n);
    }
    trimmed.parse::<f64>().ok().map(|n| n as i64)
}

/// Digit at `round_digit_from_end` of the normalized number. Real draws use
/// three-digit numbering (round digit first), so offset numbers like 1101
/// read round 1; a single-digit draw number such as 1002 lands on 0 here,
/// which callers must treat as "round unknown" territory rather than a real
/// round. Numbers shorter than the rule yield None.
pub fn round_from_match_num(match_num: i64, format: &DrawFormat) -> Option<u8> {
    let digits = match_num.abs().to_string();
    let idx = digits.len().checked_sub(format.round_digit_from_end)?;
    digits
        .as_bytes()
        .get(idx)
        .and_then(|b| (*b as char).to_digit(10))
        .map(|d| d as u8)
}

fn count_slots(points: &[RawPoint], get: impl Fn(&RawPoint) -> Option<u8>) -> (u32, u32, u32) {
    let (mut total, mut p1, mut p2) = (0u32, 0u32, 0u32);
    for p in points {
        match get(p) {
            Some(1) => {
                total += 1;
                p1 += 1;
            }
            Some(2) => {
                total += 1;
                p2 += 1;
            }
            _ => {}
        }
    }
    (total, p1, p2)
}

fn fill_serve_stats(agg: &mut PlayerAggregate, points: &[RawPoint], slot: u8) {
    for p in points {
        if p.point_server != Some(slot) {
            continue;
        }
        let won = p.point_winner == Some(slot);
        match p.serve_indicator {
            Some(1) => {
                agg.first_serves += 1;
                if won {
                    agg.first_serves_won += 1;
                }
            }
            Some(2) => {
                agg.second_serves += 1;
                if won {
                    agg.second_serves_won += 1;
                }
            }
            _ => {}
        }
        if let Some(speed) = p.speed_kmh {
            agg.speed_sum += speed;
            agg.speed_obs += 1;
            agg.max_serve_kmh = Some(agg.max_serve_kmh.map_or(speed, |m| m.max(speed)));
        }
    }
    if agg.speed_obs > 0 {
        agg.mean_serve_kmh = Some(agg.speed_sum / f64::from(agg.speed_obs));
    }
    for p in points {
        let view = p.player(slot);
        if view.winner == Some(true) {
            agg.winners += 1;
        }
        if view.unf_err == Some(true) {
            agg.unf_err += 1;
        }
    }
}

fn decide_winner(record: &MatchRecord) -> Option<u8> {
    if record.p1.sets > record.p2.sets {
        return Some(1);
    }
    if record.p2.sets > record.p1.sets {
        return Some(2);
    }
    if record.p1.games > record.p2.games {
        return Some(1);
    }
    if record.p2.games > record.p1.games {
        return Some(2);
    }
    None
}

/// Reduce an event's reconstructed point groups into one record per match.
/// Matches with no surviving point data keep their identity row with zeroed
/// counts; matches whose number cannot be normalized are dropped.
pub fn aggregate_event(
    raw_matches: &[RawMatch],
    point_groups: &[(String, Vec<RawPoint>)],
    year: i32,
    event: SlamEvent,
    format: &DrawFormat,
) -> Vec<MatchRecord> {
    let by_match: HashMap<&str, &[RawPoint]> = point_groups
        .iter()
        .map(|(id, pts)| (id.as_str(), pts.as_slice()))
        .collect();
    static EMPTY: [RawPoint; 0] = [];

    let mut out = Vec::with_capacity(raw_matches.len());
    for raw in raw_matches {
        let Some(match_num) = normalize_match_num(&raw.match_num, format) else {
            tracing::debug!(match_id = %raw.match_id, num = %raw.match_num, "unparseable match number, dropping row");
            continue;
        };
        let points = by_match
            .get(raw.match_id.as_str())
            .copied()
            .unwrap_or(&EMPTY);

        let mut record = MatchRecord {
            match_id: format!("{year}-{}-{match_num}", event.code()),
            year,
            slam: event.code().to_string(),
            match_num,
            round: round_from_match_num(match_num, format),
            player1: raw.player1.clone(),
            player2: raw.player2.clone(),
            ..MatchRecord::default()
        };

        let (total, p1, p2) = count_slots(points, |p| p.set_winner);
        (record.total_sets, record.p1.sets, record.p2.sets) = (total, p1, p2);
        let (total, p1, p2) = count_slots(points, |p| p.game_winner);
        (record.total_games, record.p1.games, record.p2.games) = (total, p1, p2);
        let (total, p1, p2) = count_slots(points, |p| p.point_winner);
        (record.total_points, record.p1.points, record.p2.points) = (total, p1, p2);
        let (total, p1, p2) = count_slots(points, |p| p.point_server);
        (record.total_service_points, record.p1.service_points, record.p2.service_points) =
            (total, p1, p2);

        fill_serve_stats(&mut record.p1, points, 1);
        fill_serve_stats(&mut record.p2, points, 2);
        record.winner = decide_winner(&record);
        out.push(record);
    }

    out.sort_by(|a, b| a.match_num.cmp(&b.match_num));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_coded_numbers_fold_into_offsets() {
        let format = DrawFormat::default();
        assert_eq!(normalize_match_num("MS2", &format), Some(1002));
        assert_eq!(normalize_match_num("WS101", &format), Some(2101));
        assert_eq!(normalize_match_num("1101", &format), Some(1101));
        assert_eq!(normalize_match_num("1101.0", &format), Some(1101));
        assert_eq!(normalize_match_num("final", &format), None);
    }

    #[test]
    fn round_digit_respects_number_width() {
        let format = DrawFormat::default();
        // Three-digit draw numbering: the leading digit is the round.
        assert_eq!(round_from_match_num(101, &format), Some(1));
        assert_eq!(round_from_match_num(701, &format), Some(7));
        // Offset four-digit numbers read the same digit position.
        assert_eq!(round_from_match_num(1101, &format), Some(1));
        assert_eq!(round_from_match_num(2504, &format), Some(5));
        // Single-digit draw numbers land on the offset's zero.
        assert_eq!(round_from_match_num(1002, &format), Some(0));
        // Too short for the rule.
        assert_eq!(round_from_match_num(42, &format), None);
    }

    #[test]
    fn wider_formats_can_override_the_rule() {
        let format = DrawFormat {
            round_digit_from_end: 4,
            ..DrawFormat::default()
        };
        assert_eq!(round_from_match_num(1101, &format), Some(1));
        assert_eq!(round_from_match_num(101, &format), None);
    }

    #[test]
    fn winner_requires_strict_lead() {
        let mut record = MatchRecord::default();
        record.p1.sets = 2;
        record.p2.sets = 1;
        assert_eq!(decide_winner(&record), Some(1));

        record.p1.sets = 1;
        record.p2.games = 12;
        record.p1.games = 9;
        assert_eq!(decide_winner(&record), Some(2));

        record.p2.games = 9;
        assert_eq!(decide_winner(&record), None);
    }
}
