use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::Connection;

use crate::models::{canonical_key, parse_canonical_key, Draw, IssuedCombination};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS draws (
    draw_id       TEXT PRIMARY KEY,
    day           TEXT NOT NULL,
    date          TEXT NOT NULL UNIQUE,
    ball_1        INTEGER NOT NULL,
    ball_2        INTEGER NOT NULL,
    ball_3        INTEGER NOT NULL,
    ball_4        INTEGER NOT NULL,
    ball_5        INTEGER NOT NULL,
    star_1        INTEGER NOT NULL,
    star_2        INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS issued_combinations (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    target_date    TEXT NOT NULL,
    canonical_key  TEXT NOT NULL,
    created_at     TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE (target_date, canonical_key)
);
";

const DRAW_COLUMNS: &str =
    "draw_id, day, date, ball_1, ball_2, ball_3, ball_4, ball_5, star_1, star_2";

pub fn db_path() -> std::path::PathBuf {
    let mut path = std::env::current_dir().unwrap_or_default();
    path.push("data");
    path.push("lemillion.db");
    path
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Impossible de créer le répertoire {:?}", parent))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Impossible d'ouvrir la base {:?}", path))?;
    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA).context("Échec de la migration")?;
    Ok(())
}

/// Insère un tirage. Retourne `false` si l'identifiant ou la date existe déjà.
pub fn insert_draw(conn: &Connection, draw: &Draw) -> Result<bool> {
    let changed = conn
        .execute(
            &format!("INSERT OR IGNORE INTO draws ({DRAW_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
            rusqlite::params![
                draw.draw_id,
                draw.day,
                draw.date,
                draw.balls[0],
                draw.balls[1],
                draw.balls[2],
                draw.balls[3],
                draw.balls[4],
                draw.stars[0],
                draw.stars[1],
            ],
        )
        .context("Échec de l'insertion")?;
    Ok(changed > 0)
}

fn row_to_draw(row: &rusqlite::Row<'_>) -> rusqlite::Result<Draw> {
    Ok(Draw {
        draw_id: row.get(0)?,
        day: row.get(1)?,
        date: row.get(2)?,
        balls: [
            row.get::<_, u8>(3)?,
            row.get::<_, u8>(4)?,
            row.get::<_, u8>(5)?,
            row.get::<_, u8>(6)?,
            row.get::<_, u8>(7)?,
        ],
        stars: [row.get::<_, u8>(8)?, row.get::<_, u8>(9)?],
    })
}

/// Les `limit` derniers tirages, du plus récent au plus ancien.
pub fn fetch_last_draws(conn: &Connection, limit: u32) -> Result<Vec<Draw>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DRAW_COLUMNS} FROM draws ORDER BY date DESC, draw_id DESC LIMIT ?1"
    ))?;
    let draws = stmt
        .query_map([limit], row_to_draw)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(draws)
}

/// Historique complet, index 0 = tirage le plus récent.
pub fn fetch_history(conn: &Connection) -> Result<Vec<Draw>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DRAW_COLUMNS} FROM draws ORDER BY date DESC, draw_id DESC"
    ))?;
    let draws = stmt
        .query_map([], row_to_draw)?
        .collect::<Result<Vec<_>, _>>()
        .context("Lecture de l'historique impossible")?;
    Ok(draws)
}

pub fn count_draws(conn: &Connection) -> Result<u32> {
    let count: u32 = conn.query_row("SELECT COUNT(*) FROM draws", [], |row| row.get(0))?;
    Ok(count)
}

/// Enregistre une combinaison émise. Retourne `false` si elle l'était déjà pour cette date.
pub fn insert_issued(
    conn: &Connection,
    target_date: NaiveDate,
    balls: &[u8],
    stars: &[u8],
) -> Result<bool> {
    let key = canonical_key(balls, stars);
    let changed = conn
        .execute(
            "INSERT OR IGNORE INTO issued_combinations (target_date, canonical_key) VALUES (?1, ?2)",
            rusqlite::params![target_date, key],
        )
        .with_context(|| format!("Échec de l'enregistrement de la combinaison {key}"))?;
    Ok(changed > 0)
}

pub fn fetch_issued_keys(conn: &Connection, target_date: NaiveDate) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare(
        "SELECT canonical_key FROM issued_combinations WHERE target_date = ?1",
    )?;
    let keys = stmt
        .query_map([target_date], |row| row.get::<_, String>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(keys)
}

pub fn fetch_issued(conn: &Connection, target_date: NaiveDate) -> Result<Vec<IssuedCombination>> {
    let mut stmt = conn.prepare(
        "SELECT canonical_key FROM issued_combinations WHERE target_date = ?1 ORDER BY id",
    )?;
    let keys = stmt
        .query_map([target_date], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    keys.into_iter()
        .map(|key| {
            let (balls, stars) = parse_canonical_key(&key)?;
            Ok(IssuedCombination { target_date, balls, stars, key })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn test_draw(id: &str, d: &str) -> Draw {
        Draw {
            draw_id: id.to_string(),
            day: "MARDI".to_string(),
            date: date(d),
            balls: [1, 2, 3, 4, 5],
            stars: [1, 2],
        }
    }

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn
    }

    #[test]
    fn test_insert_and_count() {
        let conn = memory_db();
        assert_eq!(count_draws(&conn).unwrap(), 0);
        insert_draw(&conn, &test_draw("001", "2024-01-01")).unwrap();
        assert_eq!(count_draws(&conn).unwrap(), 1);
    }

    #[test]
    fn test_duplicate_ignored() {
        let conn = memory_db();
        assert!(insert_draw(&conn, &test_draw("001", "2024-01-01")).unwrap());
        assert!(!insert_draw(&conn, &test_draw("001", "2024-01-01")).unwrap());
        // Même date sous un autre identifiant : ignoré aussi
        assert!(!insert_draw(&conn, &test_draw("002", "2024-01-01")).unwrap());
        assert_eq!(count_draws(&conn).unwrap(), 1);
    }

    #[test]
    fn test_history_order() {
        let conn = memory_db();
        insert_draw(&conn, &test_draw("001", "2024-01-01")).unwrap();
        insert_draw(&conn, &test_draw("002", "2024-01-05")).unwrap();
        insert_draw(&conn, &test_draw("003", "2024-01-03")).unwrap();

        let draws = fetch_history(&conn).unwrap();
        assert_eq!(draws.len(), 3);
        assert_eq!(draws[0].date, date("2024-01-05"));
        assert_eq!(draws[1].date, date("2024-01-03"));
        assert_eq!(draws[2].date, date("2024-01-01"));

        let last = fetch_last_draws(&conn, 2).unwrap();
        assert_eq!(last.len(), 2);
        assert_eq!(last[0].draw_id, "002");
    }

    #[test]
    fn test_issued_roundtrip_per_date() {
        let conn = memory_db();
        let target = date("2024-02-02");
        assert!(insert_issued(&conn, target, &[5, 1, 3, 2, 4], &[2, 1]).unwrap());
        // Même combinaison dans un autre ordre : doublon
        assert!(!insert_issued(&conn, target, &[1, 2, 3, 4, 5], &[1, 2]).unwrap());
        assert!(insert_issued(&conn, target, &[1, 2, 3, 4, 6], &[1, 2]).unwrap());
        assert!(insert_issued(&conn, date("2024-02-06"), &[1, 2, 3, 4, 5], &[1, 2]).unwrap());

        let keys = fetch_issued_keys(&conn, target).unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains("1-2-3-4-5|1-2"));

        let issued = fetch_issued(&conn, target).unwrap();
        assert_eq!(issued[1].balls, vec![1, 2, 3, 4, 6]);
        assert_eq!(issued[1].stars, vec![1, 2]);
    }
}
