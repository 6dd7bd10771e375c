use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use slam_pipeline::match_agg::{DrawFormat, aggregate_event};
use slam_pipeline::point_stream::{RawPoint, group_points_by_match, reconstruct_all};
use slam_pipeline::slam_fetch::{RawMatch, SlamEvent};

// A synthetic best-of-five-ish stream: 64 matches, 48 points each, with the
// winner columns left unknown so reconstruction has work to do.
fn synthetic_points() -> Vec<RawPoint> {
    let mut out = Vec::new();
    for match_no in 0..64u16 {
        let match_id = format!("2019-wimbledon-{}", 1101 + i64::from(match_no));
        for i in 0..48u32 {
            let set_no = (i / 16) as u8 + 1;
            let game_no = (i / 4) as u16 + 1;
            let winner = if (i + u32::from(match_no)) % 3 == 0 { 2 } else { 1 };
            let server = if game_no % 2 == 0 { 2 } else { 1 };
            out.push(RawPoint {
                match_id: match_id.clone(),
                set_no: Some(set_no),
                game_no: Some(game_no),
                point_number: i + 1,
                point_winner: Some(winner),
                point_server: Some(server),
                serve_indicator: Some(if i % 4 == 0 { 2 } else { 1 }),
                speed_kmh: if i % 5 == 0 { None } else { Some(165.0 + f64::from(i % 40)) },
                ..RawPoint::default()
            });
        }
    }
    out
}

fn synthetic_matches() -> Vec<RawMatch> {
    (0..64)
        .map(|match_no| RawMatch {
            match_id: format!("2019-wimbledon-{}", 1101 + match_no),
            match_num: format!("{}", 1101 + match_no),
            player1: Some(format!("P. Server{match_no}")),
            player2: Some(format!("R. Returner{match_no}")),
        })
        .collect()
}

fn bench_reconstruct(c: &mut Criterion) {
    let points = synthetic_points();
    c.bench_function("reconstruct_event_points", |b| {
        b.iter(|| {
            let mut groups = group_points_by_match(black_box(points.clone()));
            reconstruct_all(&mut groups);
            black_box(groups.len());
        });
    });
}

fn bench_aggregate(c: &mut Criterion) {
    let matches = synthetic_matches();
    let mut groups = group_points_by_match(synthetic_points());
    reconstruct_all(&mut groups);
    let format = DrawFormat::default();
    c.bench_function("aggregate_event_matches", |b| {
        b.iter(|| {
            let records = aggregate_event(
                black_box(&matches),
                black_box(&groups),
                2019,
                SlamEvent::Wimbledon,
                &format,
            );
            black_box(records.len());
        });
    });
}

criterion_group!(benches, bench_reconstruct, bench_aggregate);
criterion_main!(benches);
