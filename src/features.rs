use std::collections::HashMap;

use crate::match_agg::MatchRecord;
use crate::slam_fetch::SlamEvent;

/// Fixed scaling constants. These are configuration, not fitted to the data,
/// so feature scale holds steady as new seasons arrive. The rank ceiling
/// sits above the highest points total ever recorded (16,950).
pub const RANK_POINTS_CEILING: f64 = 21_500.0;
pub const AGE_SCALE_MIN: f64 = 15.0;
pub const AGE_SCALE_MAX: f64 = 45.0;

/// A zero denominator yields no value rather than an infinity for the
/// consumer to trip over; imputation is the caller's decision.
pub fn ratio(value: f64, total: f64) -> Option<f64> {
    if total == 0.0 {
        None
    } else {
        Some(value / total)
    }
}

pub fn min_max(value: f64, min_val: f64, max_val: f64) -> f64 {
    (value - min_val) / (max_val - min_val)
}

// Everything a player did across their matches in one (year, event) bucket,
// summed from both orientations of every match row.
#[derive(Debug, Clone, Default)]
struct PlayerTotals {
    sets_won: u32,
    sets_total: u32,
    games_won: u32,
    games_total: u32,
    points_won: u32,
    points_total: u32,
    service_points: u32,
    first_serves: u32,
    first_serves_won: u32,
    second_serves: u32,
    second_serves_won: u32,
    winners: u32,
    unf_err: u32,
    opp_service_points: u32,
    opp_first_won: u32,
    opp_second_won: u32,
    speed_sum: f64,
    speed_obs: u32,
}

/// Tournament-form ratios for one player in one (year, event) bucket. Every
/// field is optional: a missing denominator leaves the cell unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerYearFeatureSet {
    pub sets_share: Option<f64>,
    pub games_share: Option<f64>,
    pub points_share: Option<f64>,
    pub service_points_won: Option<f64>,
    pub return_points_won: Option<f64>,
    pub first_serve_win: Option<f64>,
    pub second_serve_win: Option<f64>,
    pub winner_error_ratio: Option<f64>,
    pub mean_serve_kmh: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerFeatures {
    pub age: Option<f64>,
    pub rank_points: Option<f64>,
    pub form: PlayerYearFeatureSet,
}

/// One model-input row. Every match emits two: this one and its mirror with
/// the player roles swapped, so orderings are represented symmetrically.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub match_id: String,
    pub year: i32,
    pub slam: String,
    pub match_num: i64,
    pub player1: String,
    pub player2: String,
    pub winner: Option<u8>,
    pub surface: i8,
    pub round: Option<u8>,
    pub p1: PlayerFeatures,
    pub p2: PlayerFeatures,
}

pub fn mirror_row(row: &FeatureRow) -> FeatureRow {
    FeatureRow {
        match_id: row.match_id.clone(),
        year: row.year,
        slam: row.slam.clone(),
        match_num: row.match_num,
        player1: row.player2.clone(),
        player2: row.player1.clone(),
        winner: row.winner.map(|w| if w == 1 { 2 } else { 1 }),
        surface: row.surface,
        round: row.round,
        p1: row.p2.clone(),
        p2: row.p1.clone(),
    }
}

fn accumulate(totals: &mut HashMap<String, PlayerTotals>, record: &MatchRecord) {
    for (slot, opp) in [(1u8, 2u8), (2u8, 1u8)] {
        let name = if slot == 1 {
            record.player1.as_deref()
        } else {
            record.player2.as_deref()
        };
        let Some(name) = name else {
            continue;
        };
        let own = record.player(slot);
        let other = record.player(opp);
        let t = totals.entry(name.to_string()).or_default();
        t.sets_won += own.sets;
        t.sets_total += record.total_sets;
        t.games_won += own.games;
        t.games_total += record.total_games;
        t.points_won += own.points;
        t.points_total += record.total_points;
        t.service_points += own.service_points;
        t.first_serves += own.first_serves;
        t.first_serves_won += own.first_serves_won;
        t.second_serves += own.second_serves;
        t.second_serves_won += own.second_serves_won;
        t.winners += own.winners;
        t.unf_err += own.unf_err;
        t.opp_service_points += other.service_points;
        t.opp_first_won += other.first_serves_won;
        t.opp_second_won += other.second_serves_won;
        t.speed_sum += own.speed_sum;
        t.speed_obs += own.speed_obs;
    }
}

fn feature_set(t: &PlayerTotals) -> PlayerYearFeatureSet {
    let serve_won = f64::from(t.first_serves_won + t.second_serves_won);
    let opp_serve_lost =
        f64::from(t.opp_service_points) - f64::from(t.opp_first_won + t.opp_second_won);
    PlayerYearFeatureSet {
        sets_share: ratio(f64::from(t.sets_won), f64::from(t.sets_total)),
        games_share: ratio(f64::from(t.games_won), f64::from(t.games_total)),
        points_share: ratio(f64::from(t.points_won), f64::from(t.points_total)),
        service_points_won: ratio(serve_won, f64::from(t.service_points)),
        return_points_won: ratio(opp_serve_lost, f64::from(t.opp_service_points)),
        first_serve_win: ratio(f64::from(t.first_serves_won), f64::from(t.first_serves)),
        second_serve_win: ratio(f64::from(t.second_serves_won), f64::from(t.second_serves)),
        winner_error_ratio: ratio(f64::from(t.winners), f64::from(t.unf_err)),
        mean_serve_kmh: if t.speed_obs > 0 {
            Some(t.speed_sum / f64::from(t.speed_obs))
        } else {
            None
        },
    }
}

fn player_features(
    record: &MatchRecord,
    slot: u8,
    totals: &HashMap<String, PlayerTotals>,
) -> PlayerFeatures {
    let name = if slot == 1 {
        record.player1.as_deref()
    } else {
        record.player2.as_deref()
    };
    let agg = record.player(slot);
    PlayerFeatures {
        age: agg
            .age
            .map(|a| min_max(a, AGE_SCALE_MIN, AGE_SCALE_MAX)),
        rank_points: agg.rank_points.map(|p| p / RANK_POINTS_CEILING),
        form: name
            .and_then(|n| totals.get(n))
            .map(feature_set)
            .unwrap_or_default(),
    }
}

/// Project tournament-form features onto every match of one (year, event)
/// unit. Rows missing either player name are excluded (they cannot join);
/// every surviving match contributes a mirrored pair, in match order.
pub fn derive_event_features(records: &[MatchRecord], event: SlamEvent) -> Vec<FeatureRow> {
    let usable: Vec<&MatchRecord> = records
        .iter()
        .filter(|r| r.player1.is_some() && r.player2.is_some())
        .collect();

    let mut totals: HashMap<String, PlayerTotals> = HashMap::new();
    for record in &usable {
        accumulate(&mut totals, record);
    }

    let mut out = Vec::with_capacity(usable.len() * 2);
    for record in &usable {
        let row = FeatureRow {
            match_id: record.match_id.clone(),
            year: record.year,
            slam: record.slam.clone(),
            match_num: record.match_num,
            player1: record.player1.clone().unwrap_or_default(),
            player2: record.player2.clone().unwrap_or_default(),
            winner: record.winner,
            surface: event.surface_code(),
            round: record.round,
            p1: player_features(record, 1, &totals),
            p2: player_features(record, 2, &totals),
        };
        let mirrored = mirror_row(&row);
        out.push(row);
        out.push(mirrored);
    }
    out
}
