use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::calendar::SchoolCalendar;
use crate::facade::PersistenceFacade;
use crate::models::{Record, RecordSet};
use crate::store::RecordStore;

#[derive(Debug, Serialize)]
pub struct Backup<'a> {
    pub backup_timestamp: DateTime<Utc>,
    pub school_year: String,
    pub app_version: &'static str,
    pub data: &'a RecordSet,
}

pub fn backup_json(calendar: &SchoolCalendar, data: &RecordSet) -> anyhow::Result<String> {
    let backup = Backup {
        backup_timestamp: Utc::now(),
        school_year: format!("{} to {}", calendar.start(), calendar.end()),
        app_version: env!("CARGO_PKG_VERSION"),
        data,
    };
    serde_json::to_string_pretty(&backup).context("failed to serialize backup")
}

/// Imports `date,student,present` rows through the facade, so every row is
/// validated and routed like an interactive entry.
pub async fn import_attendance_csv<R, L>(
    facade: &mut PersistenceFacade<R, L>,
    csv_path: &Path,
) -> anyhow::Result<usize>
where
    R: RecordStore,
    L: RecordStore,
{
    #[derive(serde::Deserialize)]
    struct CsvRow {
        date: NaiveDate,
        student: String,
        present: bool,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut imported = 0usize;

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = index + 2;
        let row = result.with_context(|| format!("invalid row on line {line}"))?;
        facade
            .upsert(Record::attendance(row.date, row.student.trim(), row.present))
            .await
            .with_context(|| format!("could not import line {line}"))?;
        imported += 1;
    }

    Ok(imported)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::config::AppConfig;
    use crate::models::{ListFilter, RecordKind};
    use crate::store::{LocalStore, PgStore};

    async fn offline_facade(dir: &TempDir) -> PersistenceFacade<PgStore, LocalStore> {
        let config = AppConfig::default();
        PersistenceFacade::connect(
            None,
            LocalStore::new(dir.path().join("records.json")),
            config.catalog(),
            config.calendar().unwrap(),
        )
        .await
    }

    #[tokio::test]
    async fn imports_attendance_rows() {
        let dir = TempDir::new().unwrap();
        let csv_path = dir.path().join("attendance.csv");
        std::fs::write(
            &csv_path,
            "date,student,present\n2025-09-01,Lucy,true\n2025-09-01,Vann,false\n2025-09-01,Lucy,false\n",
        )
        .unwrap();

        let mut facade = offline_facade(&dir).await;
        let imported = import_attendance_csv(&mut facade, &csv_path).await.unwrap();
        assert_eq!(imported, 3);

        let listed = facade
            .list(RecordKind::Attendance, &ListFilter::default())
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn import_stops_at_unknown_student() {
        let dir = TempDir::new().unwrap();
        let csv_path = dir.path().join("attendance.csv");
        std::fs::write(
            &csv_path,
            "date,student,present\n2025-09-01,Lucy,true\n2025-09-02,Max,true\n",
        )
        .unwrap();

        let mut facade = offline_facade(&dir).await;
        let err = import_attendance_csv(&mut facade, &csv_path).await.unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn backup_wraps_record_set() {
        let config = AppConfig::default();
        let calendar = config.calendar().unwrap();
        let mut data = RecordSet::default();
        data.upsert(Record::attendance(
            NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            "Lucy",
            true,
        ));

        let json: serde_json::Value =
            serde_json::from_str(&backup_json(&calendar, &data).unwrap()).unwrap();
        assert_eq!(json["school_year"], "2025-07-21 to 2026-05-31");
        assert_eq!(json["data"]["attendance"][0]["student"], "Lucy");
        assert!(json["backup_timestamp"].is_string());
    }
}
