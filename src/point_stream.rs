use std::collections::HashMap;

/// Non-numeric score tokens ("AD" at deuce) land on a fixed numeric sentinel
/// so score columns stay integral.
pub const SCORE_SENTINEL: i32 = 45;

/// Per-player view of a single point. Flags are tri-state: `None` means the
/// source did not record the fact, which is not the same as it not happening.
#[derive(Debug, Clone, Default)]
pub struct PlayerPoint {
    pub score: Option<i32>,
    pub points_won: Option<u32>,
    pub ace: Option<bool>,
    pub winner: Option<bool>,
    pub unf_err: Option<bool>,
    pub double_fault: Option<bool>,
    pub first_srv_in: Option<bool>,
    pub first_srv_won: Option<bool>,
    pub second_srv_in: Option<bool>,
    pub second_srv_won: Option<bool>,
}

/// One record per point played, ordered by play order within a match.
#[derive(Debug, Clone, Default)]
pub struct RawPoint {
    pub match_id: String,
    pub elapsed_time: Option<String>,
    pub set_no: Option<u8>,
    pub game_no: Option<u16>,
    pub point_number: u32,
    pub set_winner: Option<u8>,
    pub game_winner: Option<u8>,
    pub point_winner: Option<u8>,
    pub point_server: Option<u8>,
    pub serve_indicator: Option<u8>,
    pub serve_number: Option<u8>,
    pub speed_kmh: Option<f64>,
    pub rally_count: Option<u32>,
    pub p1: PlayerPoint,
    pub p2: PlayerPoint,
}

impl RawPoint {
    pub fn player(&self, slot: u8) -> &PlayerPoint {
        if slot == 1 { &self.p1 } else { &self.p2 }
    }

    pub fn player_mut(&mut self, slot: u8) -> &mut PlayerPoint {
        if slot == 1 { &mut self.p1 } else { &mut self.p2 }
    }
}

/// Repair missing game/set winner markers and serve-outcome flags for one
/// match's ordered point sequence.
///
/// Winners: a change of game (or set) number between a point and the next one
/// means the point closed that game (set), so its point winner is the game
/// (set) winner. The final point always closes both its game and its set.
/// A simultaneous game+set transition assigns both from the same point.
pub fn reconstruct_match(points: &mut [RawPoint]) {
    let n = points.len();
    if n == 0 {
        return;
    }
    for i in 0..n - 1 {
        let next_game = points[i + 1].game_no;
        let next_set = points[i + 1].set_no;
        let p = &mut points[i];
        if p.game_no.is_some() && next_game.is_some() && p.game_no != next_game {
            p.game_winner = p.point_winner;
        }
        if p.set_no.is_some() && next_set.is_some() && p.set_no != next_set {
            p.set_winner = p.point_winner;
        }
    }
    let last = &mut points[n - 1];
    last.game_winner = last.point_winner;
    last.set_winner = last.point_winner;

    // Files from around 2015 onwards carry ServeNumber instead of a usable
    // ServeIndicator; fall back to it when the indicator is absent or junk.
    for p in points.iter_mut() {
        if !matches!(p.serve_indicator, Some(1) | Some(2))
            && let Some(sn) = p.serve_number
            && (sn == 1 || sn == 2)
        {
            p.serve_indicator = Some(sn);
        }
    }

    // Serve outcomes: only ever fill unknown cells, and only ever with true.
    // Authoritative 0/1 source values are never rewritten, and a double fault
    // can never count as a second serve landed or won.
    for slot in [1u8, 2u8] {
        for p in points.iter_mut() {
            let served_first = p.point_server == Some(slot) && p.serve_indicator == Some(1);
            let served_second = p.point_server == Some(slot) && p.serve_indicator == Some(2);
            let won_point = p.point_winner == Some(slot);
            let double_fault = p.player(slot).double_fault == Some(true);

            let view = p.player_mut(slot);
            if view.first_srv_won.is_none() && served_first && won_point {
                view.first_srv_won = Some(true);
                if view.first_srv_in.is_none() {
                    view.first_srv_in = Some(true);
                }
            } else if view.first_srv_in.is_none() && served_first {
                view.first_srv_in = Some(true);
            }
            if view.second_srv_won.is_none() && served_second && !double_fault && won_point {
                view.second_srv_won = Some(true);
                if view.second_srv_in.is_none() {
                    view.second_srv_in = Some(true);
                }
            } else if view.second_srv_in.is_none() && served_second && !double_fault {
                view.second_srv_in = Some(true);
            }
        }
    }
}

/// Split a whole event's point rows into per-match sequences, preserving both
/// first-seen match order and play order within each match.
pub fn group_points_by_match(points: Vec<RawPoint>) -> Vec<(String, Vec<RawPoint>)> {
    let mut order: Vec<String> = Vec::new();
    let mut buckets: HashMap<String, Vec<RawPoint>> = HashMap::new();
    for p in points {
        if !buckets.contains_key(&p.match_id) {
            order.push(p.match_id.clone());
        }
        buckets.entry(p.match_id.clone()).or_default().push(p);
    }
    order
        .into_iter()
        .filter_map(|id| buckets.remove(&id).map(|pts| (id, pts)))
        .collect()
}

pub fn reconstruct_all(groups: &mut [(String, Vec<RawPoint>)]) {
    for (_, pts) in groups.iter_mut() {
        reconstruct_match(pts);
    }
}

pub fn parse_score_token(raw: &str) -> Option<i32> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<i32>() {
        Ok(v) => Some(v),
        Err(_) => Some(SCORE_SENTINEL),
    }
}

/// Point numbers occasionally arrive as "0X"-style markers; anything that
/// does not parse cleanly counts as point 0.
pub fn parse_point_number(raw: &str) -> u32 {
    raw.trim().parse::<u32>().unwrap_or(0)
}

/// Player-slot columns (winner, server, game/set winner). Zero means "no
/// player", which we model as unknown rather than a third slot.
pub fn parse_slot(raw: &str) -> Option<u8> {
    match raw.trim().parse::<f64>() {
        Ok(v) if v == 1.0 => Some(1),
        Ok(v) if v == 2.0 => Some(2),
        _ => None,
    }
}

pub fn parse_tri_bool(raw: &str) -> Option<bool> {
    match raw.trim().parse::<f64>() {
        Ok(v) if v == 1.0 => Some(true),
        Ok(v) if v == 0.0 => Some(false),
        _ => None,
    }
}

pub fn parse_opt_f64(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok()
}

pub fn parse_opt_u32(raw: &str) -> Option<u32> {
    let trimmed = raw.trim();
    if let Ok(v) = trimmed.parse::<u32>() {
        return Some(v);
    }
    trimmed.parse::<f64>().ok().map(|v| v as u32)
}

pub fn parse_opt_u8(raw: &str) -> Option<u8> {
    parse_opt_u32(raw).and_then(|v| u8::try_from(v).ok())
}

pub fn parse_opt_u16(raw: &str) -> Option<u16> {
    parse_opt_u32(raw).and_then(|v| u16::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(set_no: u8, game_no: u16, winner: u8) -> RawPoint {
        RawPoint {
            match_id: "2019-wimbledon-1101".to_string(),
            set_no: Some(set_no),
            game_no: Some(game_no),
            point_winner: Some(winner),
            ..RawPoint::default()
        }
    }

    #[test]
    fn game_and_set_winners_fill_from_transitions() {
        // Point 2 closes game 1; point 3 is last and closes game 2 + set 1.
        let mut pts = vec![point(1, 1, 1), point(1, 1, 2), point(1, 2, 1)];
        reconstruct_match(&mut pts);
        assert_eq!(pts[0].game_winner, None);
        assert_eq!(pts[1].game_winner, Some(2));
        assert_eq!(pts[2].game_winner, Some(1));
        assert_eq!(pts[0].set_winner, None);
        assert_eq!(pts[1].set_winner, None);
        assert_eq!(pts[2].set_winner, Some(1));
    }

    #[test]
    fn simultaneous_game_and_set_transition_assigns_both() {
        let mut pts = vec![point(1, 12, 2), point(2, 1, 1)];
        reconstruct_match(&mut pts);
        assert_eq!(pts[0].game_winner, Some(2));
        assert_eq!(pts[0].set_winner, Some(2));
    }

    #[test]
    fn serve_flags_fill_but_never_overwrite() {
        let mut p = point(1, 1, 1);
        p.point_server = Some(1);
        p.serve_indicator = Some(1);
        p.p1.first_srv_won = Some(false); // authoritative source value
        let mut pts = vec![p];
        reconstruct_match(&mut pts);
        assert_eq!(pts[0].p1.first_srv_won, Some(false));
        // The in-flag was unknown and the serve was observed, so it fills.
        assert_eq!(pts[0].p1.first_srv_in, Some(true));
    }

    #[test]
    fn double_fault_never_counts_as_second_serve() {
        let mut p = point(1, 1, 1);
        p.point_server = Some(1);
        p.serve_indicator = Some(2);
        p.p1.double_fault = Some(true);
        let mut pts = vec![p];
        reconstruct_match(&mut pts);
        assert_eq!(pts[0].p1.second_srv_in, None);
        assert_eq!(pts[0].p1.second_srv_won, None);
    }

    #[test]
    fn serve_number_substitutes_for_missing_indicator() {
        let mut p = point(1, 1, 2);
        p.point_server = Some(2);
        p.serve_number = Some(2);
        let mut pts = vec![p];
        reconstruct_match(&mut pts);
        assert_eq!(pts[0].serve_indicator, Some(2));
        assert_eq!(pts[0].p2.second_srv_won, Some(true));
    }

    #[test]
    fn score_tokens_parse_with_sentinel() {
        assert_eq!(parse_score_token("40"), Some(40));
        assert_eq!(parse_score_token("AD"), Some(SCORE_SENTINEL));
        assert_eq!(parse_score_token(""), None);
    }

    #[test]
    fn point_numbers_with_markers_collapse_to_zero() {
        assert_eq!(parse_point_number("12"), 12);
        assert_eq!(parse_point_number("0X"), 0);
    }
}
