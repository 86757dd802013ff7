//! Fournisseurs du moteur adossés à la base SQLite.

use std::collections::HashSet;

use chrono::NaiveDate;
use lemillion_db::db::{fetch_history, fetch_issued_keys};
use lemillion_db::models::Draw;
use lemillion_db::rusqlite::Connection;
use lemillion_vivier::providers::{HistoryProvider, IssuedCombinationsProvider};
use lemillion_vivier::{Result, VivierError};

pub struct SqliteStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl HistoryProvider for SqliteStore<'_> {
    fn history(&self) -> Result<Vec<Draw>> {
        fetch_history(self.conn).map_err(|e| VivierError::Source(format!("{e:#}")))
    }
}

impl IssuedCombinationsProvider for SqliteStore<'_> {
    fn issued_keys(&self, target_date: NaiveDate) -> Result<HashSet<String>> {
        fetch_issued_keys(self.conn, target_date).map_err(|e| VivierError::Source(format!("{e:#}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lemillion_db::db::{insert_draw, insert_issued, migrate};
    use lemillion_vivier::providers::checked_history;
    use lemillion_vivier::testing::make_history;

    #[test]
    fn test_store_round_trip() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        let history = make_history(25, 3);
        for draw in history.iter().rev() {
            insert_draw(&conn, draw).unwrap();
        }
        let date = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();
        insert_issued(&conn, date, &[5, 4, 3, 2, 1], &[2, 1]).unwrap();

        let store = SqliteStore::new(&conn);
        assert_eq!(checked_history(&store).unwrap(), history);
        assert!(store.issued_keys(date).unwrap().contains("1-2-3-4-5|1-2"));
    }

    #[test]
    fn test_missing_table_is_source_error() {
        let conn = Connection::open_in_memory().unwrap();
        let store = SqliteStore::new(&conn);
        assert!(matches!(store.history(), Err(VivierError::Source(_))));
    }
}
