use std::fs;
use std::path::PathBuf;

use slam_pipeline::rank_reference::Tour;
use slam_pipeline::tour_dataset::{TourMatch, events_points_map, parse_tour_csv, sets_played};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn fixture_rows() -> Vec<TourMatch> {
    let points_map = events_points_map(None).expect("points map");
    parse_tour_csv(&read_fixture("atp_2012.csv"), Tour::Atp, &points_map)
        .expect("tour fixture should parse")
}

#[test]
fn tour_rows_map_levels_rounds_and_points() {
    let rows = fixture_rows();
    assert_eq!(rows.len(), 7);

    let slam_sf = &rows[0];
    assert_eq!(slam_sf.tourney_name, "Australian Open");
    assert_eq!(slam_sf.tourney_level, Some(4));
    assert_eq!(slam_sf.tourney_year, Some(2012));
    assert_eq!(slam_sf.round_no, Some(6));
    assert_eq!(slam_sf.tour_points, 2000);
    assert_eq!(slam_sf.points_winner, 480);
    assert_eq!(slam_sf.points_loser, 360);

    let doha_final = rows
        .iter()
        .find(|r| r.tourney_name == "Doha")
        .expect("doha row");
    assert_eq!(doha_final.tourney_level, Some(1));
    assert_eq!(doha_final.tour_points, 250);
    assert_eq!(doha_final.points_winner, 100);
    assert_eq!(doha_final.points_loser, 60);
}

#[test]
fn unmapped_events_earn_no_points() {
    let rows = fixture_rows();
    let davis = rows
        .iter()
        .find(|r| r.tourney_name.starts_with("Davis Cup"))
        .expect("davis cup row");
    assert_eq!(davis.tourney_level, Some(0));
    assert_eq!(davis.round_no, Some(5)); // round robin plays as the QF tier
    assert_eq!(davis.tour_points, 0);
    assert_eq!(davis.points_winner, 0);
    assert_eq!(davis.points_loser, 0);
}

#[test]
fn sets_played_counts_tokens_and_discounts_retirements() {
    let rows = fixture_rows();
    let full = &rows[0];
    assert_eq!(full.score.as_deref(), Some("6-7(5) 6-2 7-6(5) 6-4"));
    assert_eq!(full.sets_played, 4);

    let retired = rows
        .iter()
        .find(|r| r.score.as_deref().is_some_and(|s| s.ends_with("RET")))
        .expect("retirement row");
    assert_eq!(retired.sets_played, 4);
    assert_eq!(sets_played(retired.score.as_deref()), 4);

    assert_eq!(sets_played(Some("6-3 6-4")), 2);
    assert_eq!(sets_played(Some("2-0 W/O")), 1);
    assert_eq!(sets_played(None), 0);
}

#[test]
fn rank_columns_carry_through() {
    let rows = fixture_rows();
    let slam_sf = &rows[0];
    assert_eq!(slam_sf.winner_name.as_deref(), Some("Rafael Nadal"));
    assert_eq!(slam_sf.winner_rank, Some(2));
    assert_eq!(slam_sf.winner_rank_points, Some(9595.0));
    assert_eq!(slam_sf.loser_age, Some(30.4));
    assert_eq!(slam_sf.surface.as_deref(), Some("Hard"));
}
