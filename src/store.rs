use std::path::Path;

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, params, params_from_iter};

use crate::features::{FeatureRow, PlayerFeatures, PlayerYearFeatureSet};
use crate::match_agg::MatchRecord;
use crate::rank_reference::RankRow;
use crate::slam_fetch::SlamEvent;
use crate::tour_dataset::TourMatch;

/// Named-table SQLite store. Every writer drops and recreates its table
/// inside one transaction, so re-running a pipeline replaces output instead
/// of appending duplicates.
pub struct TableStore {
    conn: Connection,
}

pub fn unit_table_name(prefix: &str, year: i32, event: SlamEvent) -> String {
    format!("{prefix}_{year}_{}", event.code())
}

fn check_table_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.chars().next().is_some_and(|c| c.is_ascii_digit());
    if ok {
        Ok(())
    } else {
        Err(anyhow!("invalid table name '{name}'"))
    }
}

fn placeholders(n: usize) -> String {
    (1..=n)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

const MATCH_COLUMNS: &[(&str, &str)] = &[
    ("match_id", "TEXT NOT NULL"),
    ("year", "INTEGER NOT NULL"),
    ("slam", "TEXT NOT NULL"),
    ("match_num", "INTEGER NOT NULL"),
    ("round", "INTEGER NULL"),
    ("player1", "TEXT NULL"),
    ("player2", "TEXT NULL"),
    ("winner", "INTEGER NULL"),
    ("total_sets", "INTEGER NOT NULL"),
    ("total_games", "INTEGER NOT NULL"),
    ("total_points", "INTEGER NOT NULL"),
    ("total_service_points", "INTEGER NOT NULL"),
    ("p1_sets", "INTEGER NOT NULL"),
    ("p1_games", "INTEGER NOT NULL"),
    ("p1_points", "INTEGER NOT NULL"),
    ("p1_service_points", "INTEGER NOT NULL"),
    ("p1_first_serves", "INTEGER NOT NULL"),
    ("p1_first_serves_won", "INTEGER NOT NULL"),
    ("p1_second_serves", "INTEGER NOT NULL"),
    ("p1_second_serves_won", "INTEGER NOT NULL"),
    ("p1_winners", "INTEGER NOT NULL"),
    ("p1_unf_err", "INTEGER NOT NULL"),
    ("p1_max_serve_kmh", "REAL NULL"),
    ("p1_mean_serve_kmh", "REAL NULL"),
    ("p1_rank", "INTEGER NULL"),
    ("p1_rank_points", "REAL NULL"),
    ("p1_age", "REAL NULL"),
    ("p2_sets", "INTEGER NOT NULL"),
    ("p2_games", "INTEGER NOT NULL"),
    ("p2_points", "INTEGER NOT NULL"),
    ("p2_service_points", "INTEGER NOT NULL"),
    ("p2_first_serves", "INTEGER NOT NULL"),
    ("p2_first_serves_won", "INTEGER NOT NULL"),
    ("p2_second_serves", "INTEGER NOT NULL"),
    ("p2_second_serves_won", "INTEGER NOT NULL"),
    ("p2_winners", "INTEGER NOT NULL"),
    ("p2_unf_err", "INTEGER NOT NULL"),
    ("p2_max_serve_kmh", "REAL NULL"),
    ("p2_mean_serve_kmh", "REAL NULL"),
    ("p2_rank", "INTEGER NULL"),
    ("p2_rank_points", "REAL NULL"),
    ("p2_age", "REAL NULL"),
];

const FEATURE_COLUMNS: &[(&str, &str)] = &[
    ("match_id", "TEXT NOT NULL"),
    ("year", "INTEGER NOT NULL"),
    ("slam", "TEXT NOT NULL"),
    ("match_num", "INTEGER NOT NULL"),
    ("player1", "TEXT NOT NULL"),
    ("player2", "TEXT NOT NULL"),
    ("winner", "INTEGER NULL"),
    ("surface", "INTEGER NOT NULL"),
    ("round", "INTEGER NULL"),
    ("p1_age", "REAL NULL"),
    ("p1_rank_points", "REAL NULL"),
    ("p1_sets_share", "REAL NULL"),
    ("p1_games_share", "REAL NULL"),
    ("p1_points_share", "REAL NULL"),
    ("p1_service_points_won", "REAL NULL"),
    ("p1_return_points_won", "REAL NULL"),
    ("p1_first_serve_win", "REAL NULL"),
    ("p1_second_serve_win", "REAL NULL"),
    ("p1_winner_error_ratio", "REAL NULL"),
    ("p1_mean_serve_kmh", "REAL NULL"),
    ("p2_age", "REAL NULL"),
    ("p2_rank_points", "REAL NULL"),
    ("p2_sets_share", "REAL NULL"),
    ("p2_games_share", "REAL NULL"),
    ("p2_points_share", "REAL NULL"),
    ("p2_service_points_won", "REAL NULL"),
    ("p2_return_points_won", "REAL NULL"),
    ("p2_first_serve_win", "REAL NULL"),
    ("p2_second_serve_win", "REAL NULL"),
    ("p2_winner_error_ratio", "REAL NULL"),
    ("p2_mean_serve_kmh", "REAL NULL"),
];

const RANK_COLUMNS: &[(&str, &str)] = &[
    ("tour", "TEXT NOT NULL"),
    ("tourney_name", "TEXT NOT NULL"),
    ("tourney_date", "TEXT NULL"),
    ("tourney_year", "INTEGER NULL"),
    ("surface", "TEXT NULL"),
    ("winner_name", "TEXT NULL"),
    ("winner_age", "REAL NULL"),
    ("winner_rank", "INTEGER NULL"),
    ("winner_rank_points", "REAL NULL"),
    ("loser_name", "TEXT NULL"),
    ("loser_age", "REAL NULL"),
    ("loser_rank", "INTEGER NULL"),
    ("loser_rank_points", "REAL NULL"),
];

const TOUR_COLUMNS: &[(&str, &str)] = &[
    ("tour", "TEXT NOT NULL"),
    ("tourney_name", "TEXT NOT NULL"),
    ("tourney_date", "TEXT NULL"),
    ("tourney_year", "INTEGER NULL"),
    ("surface", "TEXT NULL"),
    ("tourney_level", "INTEGER NULL"),
    ("round_label", "TEXT NULL"),
    ("round_no", "INTEGER NULL"),
    ("tour_points", "INTEGER NOT NULL"),
    ("points_winner", "INTEGER NOT NULL"),
    ("points_loser", "INTEGER NOT NULL"),
    ("winner_name", "TEXT NULL"),
    ("winner_age", "REAL NULL"),
    ("winner_rank", "INTEGER NULL"),
    ("winner_rank_points", "REAL NULL"),
    ("loser_name", "TEXT NULL"),
    ("loser_age", "REAL NULL"),
    ("loser_rank", "INTEGER NULL"),
    ("loser_rank_points", "REAL NULL"),
    ("score", "TEXT NULL"),
    ("sets_played", "INTEGER NOT NULL"),
];

impl TableStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)
            .with_context(|| format!("open sqlite db {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .context("set journal mode")?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory db")?;
        Ok(Self { conn })
    }

    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .context("prepare table listing")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .context("query table listing")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode table name")?);
        }
        Ok(out)
    }

    fn recreate(tx: &rusqlite::Transaction<'_>, name: &str, columns: &[(&str, &str)]) -> Result<()> {
        let schema = columns
            .iter()
            .map(|(col, ty)| format!("{col} {ty}"))
            .collect::<Vec<_>>()
            .join(", ");
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {name}; CREATE TABLE {name} ({schema});"
        ))
        .with_context(|| format!("recreate table {name}"))?;
        Ok(())
    }

    fn insert_sql(name: &str, columns: &[(&str, &str)]) -> String {
        let cols = columns
            .iter()
            .map(|(col, _)| *col)
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {name} ({cols}) VALUES ({})",
            placeholders(columns.len())
        )
    }

    pub fn replace_match_table(&mut self, name: &str, rows: &[MatchRecord]) -> Result<()> {
        check_table_name(name)?;
        let tx = self.conn.transaction().context("begin match table txn")?;
        Self::recreate(&tx, name, MATCH_COLUMNS)?;
        {
            let mut stmt = tx
                .prepare(&Self::insert_sql(name, MATCH_COLUMNS))
                .context("prepare match insert")?;
            for m in rows {
                stmt.execute(params![
                    m.match_id,
                    m.year,
                    m.slam,
                    m.match_num,
                    m.round,
                    m.player1,
                    m.player2,
                    m.winner,
                    m.total_sets,
                    m.total_games,
                    m.total_points,
                    m.total_service_points,
                    m.p1.sets,
                    m.p1.games,
                    m.p1.points,
                    m.p1.service_points,
                    m.p1.first_serves,
                    m.p1.first_serves_won,
                    m.p1.second_serves,
                    m.p1.second_serves_won,
                    m.p1.winners,
                    m.p1.unf_err,
                    m.p1.max_serve_kmh,
                    m.p1.mean_serve_kmh,
                    m.p1.rank,
                    m.p1.rank_points,
                    m.p1.age,
                    m.p2.sets,
                    m.p2.games,
                    m.p2.points,
                    m.p2.service_points,
                    m.p2.first_serves,
                    m.p2.first_serves_won,
                    m.p2.second_serves,
                    m.p2.second_serves_won,
                    m.p2.winners,
                    m.p2.unf_err,
                    m.p2.max_serve_kmh,
                    m.p2.mean_serve_kmh,
                    m.p2.rank,
                    m.p2.rank_points,
                    m.p2.age,
                ])
                .context("insert match row")?;
            }
        }
        tx.commit().context("commit match table txn")
    }

    pub fn replace_feature_table(&mut self, name: &str, rows: &[FeatureRow]) -> Result<()> {
        check_table_name(name)?;
        let tx = self.conn.transaction().context("begin feature table txn")?;
        Self::recreate(&tx, name, FEATURE_COLUMNS)?;
        {
            let mut stmt = tx
                .prepare(&Self::insert_sql(name, FEATURE_COLUMNS))
                .context("prepare feature insert")?;
            for r in rows {
                stmt.execute(params![
                    r.match_id,
                    r.year,
                    r.slam,
                    r.match_num,
                    r.player1,
                    r.player2,
                    r.winner,
                    r.surface,
                    r.round,
                    r.p1.age,
                    r.p1.rank_points,
                    r.p1.form.sets_share,
                    r.p1.form.games_share,
                    r.p1.form.points_share,
                    r.p1.form.service_points_won,
                    r.p1.form.return_points_won,
                    r.p1.form.first_serve_win,
                    r.p1.form.second_serve_win,
                    r.p1.form.winner_error_ratio,
                    r.p1.form.mean_serve_kmh,
                    r.p2.age,
                    r.p2.rank_points,
                    r.p2.form.sets_share,
                    r.p2.form.games_share,
                    r.p2.form.points_share,
                    r.p2.form.service_points_won,
                    r.p2.form.return_points_won,
                    r.p2.form.first_serve_win,
                    r.p2.form.second_serve_win,
                    r.p2.form.winner_error_ratio,
                    r.p2.form.mean_serve_kmh,
                ])
                .context("insert feature row")?;
            }
        }
        tx.commit().context("commit feature table txn")
    }

    pub fn replace_rank_table(&mut self, name: &str, rows: &[RankRow]) -> Result<()> {
        check_table_name(name)?;
        let tx = self.conn.transaction().context("begin rank table txn")?;
        Self::recreate(&tx, name, RANK_COLUMNS)?;
        {
            let mut stmt = tx
                .prepare(&Self::insert_sql(name, RANK_COLUMNS))
                .context("prepare rank insert")?;
            for r in rows {
                stmt.execute(params![
                    r.tour.code(),
                    r.tourney_name,
                    r.tourney_date,
                    r.tourney_year,
                    r.surface,
                    r.winner_name,
                    r.winner_age,
                    r.winner_rank,
                    r.winner_rank_points,
                    r.loser_name,
                    r.loser_age,
                    r.loser_rank,
                    r.loser_rank_points,
                ])
                .context("insert rank row")?;
            }
        }
        tx.commit().context("commit rank table txn")
    }

    pub fn replace_tour_table(&mut self, name: &str, rows: &[TourMatch]) -> Result<()> {
        check_table_name(name)?;
        let tx = self.conn.transaction().context("begin tour table txn")?;
        Self::recreate(&tx, name, TOUR_COLUMNS)?;
        {
            let mut stmt = tx
                .prepare(&Self::insert_sql(name, TOUR_COLUMNS))
                .context("prepare tour insert")?;
            for r in rows {
                stmt.execute(params![
                    r.tour.code(),
                    r.tourney_name,
                    r.tourney_date,
                    r.tourney_year,
                    r.surface,
                    r.tourney_level,
                    r.round_label,
                    r.round_no,
                    r.tour_points,
                    r.points_winner,
                    r.points_loser,
                    r.winner_name,
                    r.winner_age,
                    r.winner_rank,
                    r.winner_rank_points,
                    r.loser_name,
                    r.loser_age,
                    r.loser_rank,
                    r.loser_rank_points,
                    r.score,
                    r.sets_played,
                ])
                .context("insert tour row")?;
            }
        }
        tx.commit().context("commit tour table txn")
    }

    /// Feature rows for downstream consumers, optionally narrowed by year
    /// and/or round. Ordering is stable across runs.
    pub fn load_feature_rows(
        &self,
        name: &str,
        year: Option<i32>,
        round: Option<u8>,
    ) -> Result<Vec<FeatureRow>> {
        check_table_name(name)?;
        let cols = FEATURE_COLUMNS
            .iter()
            .map(|(col, _)| *col)
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("SELECT {cols} FROM {name}");
        let mut filters: Vec<String> = Vec::new();
        let mut args: Vec<i64> = Vec::new();
        if let Some(y) = year {
            args.push(i64::from(y));
            filters.push(format!("year = ?{}", args.len()));
        }
        if let Some(r) = round {
            args.push(i64::from(r));
            filters.push(format!("round = ?{}", args.len()));
        }
        if !filters.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&filters.join(" AND "));
        }
        sql.push_str(" ORDER BY year ASC, slam ASC, match_num ASC, player1 ASC");

        let mut stmt = self.conn.prepare(&sql).context("prepare feature query")?;
        let rows = stmt
            .query_map(params_from_iter(args), |row| {
                Ok(FeatureRow {
                    match_id: row.get(0)?,
                    year: row.get(1)?,
                    slam: row.get(2)?,
                    match_num: row.get(3)?,
                    player1: row.get(4)?,
                    player2: row.get(5)?,
                    winner: row.get(6)?,
                    surface: row.get(7)?,
                    round: row.get(8)?,
                    p1: PlayerFeatures {
                        age: row.get(9)?,
                        rank_points: row.get(10)?,
                        form: PlayerYearFeatureSet {
                            sets_share: row.get(11)?,
                            games_share: row.get(12)?,
                            points_share: row.get(13)?,
                            service_points_won: row.get(14)?,
                            return_points_won: row.get(15)?,
                            first_serve_win: row.get(16)?,
                            second_serve_win: row.get(17)?,
                            winner_error_ratio: row.get(18)?,
                            mean_serve_kmh: row.get(19)?,
                        },
                    },
                    p2: PlayerFeatures {
                        age: row.get(20)?,
                        rank_points: row.get(21)?,
                        form: PlayerYearFeatureSet {
                            sets_share: row.get(22)?,
                            games_share: row.get(23)?,
                            points_share: row.get(24)?,
                            service_points_won: row.get(25)?,
                            return_points_won: row.get(26)?,
                            first_serve_win: row.get(27)?,
                            second_serve_win: row.get(28)?,
                            winner_error_ratio: row.get(29)?,
                            mean_serve_kmh: row.get(30)?,
                        },
                    },
                })
            })
            .context("query feature rows")?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode feature row")?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_are_validated() {
        assert!(check_table_name("BASE_2019_wimbledon").is_ok());
        assert!(check_table_name("FEATURES_ALL_EVENTS").is_ok());
        assert!(check_table_name("bad-name").is_err());
        assert!(check_table_name("2019_table").is_err());
        assert!(check_table_name("drop table; --").is_err());
    }

    #[test]
    fn unit_table_names_follow_the_convention() {
        assert_eq!(
            unit_table_name("BASE", 2019, SlamEvent::Wimbledon),
            "BASE_2019_wimbledon"
        );
        assert_eq!(
            unit_table_name("RAW", 2012, SlamEvent::UsOpen),
            "RAW_2012_usopen"
        );
    }
}
