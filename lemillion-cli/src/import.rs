use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use lemillion_db::rusqlite::Connection;
use std::path::Path;

use lemillion_db::db::insert_draw;
use lemillion_db::models::{validate_draw, Draw};

fn parse_record(record: &csv::StringRecord) -> Result<Draw> {
    let get = |idx: usize| -> Result<String> {
        record
            .get(idx)
            .map(|s| s.trim().to_string())
            .with_context(|| format!("Champ manquant à l'index {}", idx))
    };

    let get_u8 = |idx: usize| -> Result<u8> {
        let s = get(idx)?;
        s.parse::<u8>()
            .with_context(|| format!("Impossible de parser '{}' (index {})", s, idx))
    };

    let draw_id = get(0)?;
    let day = get(1)?;
    let date = parse_date(&get(2)?)?;

    let balls: [u8; 5] = [get_u8(5)?, get_u8(6)?, get_u8(7)?, get_u8(8)?, get_u8(9)?];
    let stars: [u8; 2] = [get_u8(10)?, get_u8(11)?];
    validate_draw(&balls, &stars).with_context(|| format!("Tirage {} invalide", draw_id))?;

    Ok(Draw { draw_id, day, date, balls, stars })
}

/// Date FDJ `JJ/MM/AAAA`.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    if raw.split('/').count() != 3 {
        bail!("Format de date invalide: '{}'", raw);
    }
    NaiveDate::parse_from_str(raw.trim(), "%d/%m/%Y")
        .with_context(|| format!("Date inexistante: '{}'", raw))
}

pub struct ImportResult {
    pub total_records: u32,
    pub inserted: u32,
    pub skipped: u32,
    pub errors: u32,
}

pub fn import_csv(conn: &Connection, path: &Path) -> Result<ImportResult> {
    let reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Impossible d'ouvrir {:?}", path))?;
    import_reader(conn, reader)
}

fn import_reader<R: std::io::Read>(conn: &Connection, mut reader: csv::Reader<R>) -> Result<ImportResult> {
    let tx = conn.unchecked_transaction()
        .context("Impossible de démarrer la transaction")?;

    let mut result = ImportResult {
        total_records: 0,
        inserted: 0,
        skipped: 0,
        errors: 0,
    };

    for record_result in reader.records() {
        result.total_records += 1;
        let draw = match record_result.map_err(anyhow::Error::from).and_then(|r| parse_record(&r)) {
            Ok(draw) => draw,
            Err(e) => {
                log::warn!("Ligne {} ignorée : {:#}", result.total_records, e);
                result.errors += 1;
                continue;
            }
        };
        match insert_draw(&tx, &draw) {
            Ok(true) => result.inserted += 1,
            Ok(false) => result.skipped += 1,
            Err(e) => {
                log::warn!("Erreur insertion tirage {}: {:#}", draw.draw_id, e);
                result.errors += 1;
            }
        }
    }

    tx.commit().context("Échec du commit")?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lemillion_db::db::{count_draws, fetch_history, migrate};

    const SAMPLE: &str = "\
annee_numero_de_tirage;jour_de_tirage;date_de_tirage;date_de_forclusion;numero_de_tirage_dans_le_cycle;boule_1;boule_2;boule_3;boule_4;boule_5;etoile_1;etoile_2
26083;VENDREDI;16/10/2026;15/12/2026;1;12;3;47;33;18;9;2
26082;MARDI;13/10/2026;12/12/2026;1;1;2;3;4;5;1;12
26082;MARDI;13/10/2026;12/12/2026;1;1;2;3;4;5;1;12
26081;VENDREDI;09/10/2026;08/12/2026;1;1;2;3;4;51;1;12
26080;MARDI;32/10/2026;08/12/2026;1;1;2;3;4;6;1;12
";

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("17/02/2026").unwrap(), NaiveDate::from_ymd_opt(2026, 2, 17).unwrap());
        assert_eq!(parse_date("01/01/2020").unwrap(), NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert!(parse_date("2020-01-01").is_err());
        assert!(parse_date("31/02/2020").is_err());
    }

    #[test]
    fn test_import_counts() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        let reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .flexible(true)
            .from_reader(SAMPLE.as_bytes());

        let result = import_reader(&conn, reader).unwrap();
        assert_eq!(result.total_records, 5);
        assert_eq!(result.inserted, 2);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.errors, 2);
        assert_eq!(count_draws(&conn).unwrap(), 2);

        let history = fetch_history(&conn).unwrap();
        assert_eq!(history[0].balls, [12, 3, 47, 33, 18]);
        assert_eq!(history[0].date, NaiveDate::from_ymd_opt(2026, 10, 16).unwrap());
    }
}
