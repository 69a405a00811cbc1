use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, Row, Transaction};

use crate::db::{
    connection::Database,
    helpers::{optional_text, to_u16, to_u32},
    repositories::courses::insert_course,
};
use crate::models::{default_periods, validation, Course, PeriodDefinition};

fn row_to_period(row: &Row) -> Result<PeriodDefinition> {
    Ok(PeriodDefinition {
        id: row.get("id")?,
        sequence: to_u32(row.get("sequence")?, "sequence")?,
        start_minutes: to_u16(row.get("start_minutes")?, "start_minutes")?,
        end_minutes: to_u16(row.get("end_minutes")?, "end_minutes")?,
        label: row.get("label")?,
    })
}

pub(crate) fn query_periods(conn: &Connection) -> Result<Vec<PeriodDefinition>> {
    let mut stmt = conn.prepare(
        "SELECT id, sequence, start_minutes, end_minutes, label
         FROM periods
         ORDER BY sequence ASC",
    )?;
    let mut rows = stmt.query([])?;
    let mut periods = Vec::new();
    while let Some(row) = rows.next()? {
        periods.push(row_to_period(row)?);
    }
    Ok(periods)
}

fn write_periods(tx: &Transaction<'_>, periods: &[PeriodDefinition]) -> Result<()> {
    tx.execute("DELETE FROM periods", [])?;
    let mut stmt = tx.prepare(
        "INSERT INTO periods (sequence, start_minutes, end_minutes, label)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for period in periods {
        stmt.execute(params![
            period.sequence,
            period.start_minutes,
            period.end_minutes,
            optional_text(&period.label),
        ])?;
    }
    Ok(())
}

impl Database {
    /// The period table ordered by sequence.
    pub async fn get_periods(&self) -> Result<Vec<PeriodDefinition>> {
        self.execute(|conn| query_periods(conn)).await
    }

    /// Swaps the whole period table in one transaction.
    pub async fn replace_periods(
        &self,
        periods: Vec<PeriodDefinition>,
    ) -> Result<Vec<PeriodDefinition>> {
        validation::validate_period_table(&periods)?;

        self.execute(move |conn| {
            let tx = conn.transaction()?;
            write_periods(&tx, &periods)?;
            tx.commit().context("failed to commit period table")?;
            query_periods(conn)
        })
        .await
    }

    /// Inserts or replaces the period with `period.sequence`.
    pub async fn upsert_period(&self, period: PeriodDefinition) -> Result<PeriodDefinition> {
        validation::validate_period(&period)?;

        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO periods (sequence, start_minutes, end_minutes, label)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(sequence) DO UPDATE SET
                     start_minutes = excluded.start_minutes,
                     end_minutes = excluded.end_minutes,
                     label = excluded.label",
                params![
                    period.sequence,
                    period.start_minutes,
                    period.end_minutes,
                    optional_text(&period.label),
                ],
            )
            .context("failed to save period")?;

            let mut stmt = conn.prepare(
                "SELECT id, sequence, start_minutes, end_minutes, label
                 FROM periods
                 WHERE sequence = ?1",
            )?;
            let mut rows = stmt.query(params![period.sequence])?;
            match rows.next()? {
                Some(row) => row_to_period(row),
                None => Err(anyhow!("period {} not found after save", period.sequence)),
            }
        })
        .await
    }

    /// Returns whether a period with `sequence` existed. Course times that
    /// point at it stay in place and are skipped when expanding.
    pub async fn delete_period(&self, sequence: u32) -> Result<bool> {
        self.execute(move |conn| {
            let rows_affected =
                conn.execute("DELETE FROM periods WHERE sequence = ?1", params![sequence])?;
            Ok(rows_affected > 0)
        })
        .await
    }

    /// Seeds the default period table when none is stored yet.
    pub async fn ensure_default_periods(&self) -> Result<Vec<PeriodDefinition>> {
        self.execute(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM periods", [], |row| row.get(0))?;
            if count == 0 {
                let tx = conn.transaction()?;
                write_periods(&tx, &default_periods())?;
                tx.commit().context("failed to seed default periods")?;
                log::info!("Seeded default period table");
            }
            query_periods(conn)
        })
        .await
    }

    /// Replaces every period and course in one transaction. Ids are reassigned.
    pub async fn replace_schedule(
        &self,
        periods: Vec<PeriodDefinition>,
        courses: Vec<Course>,
    ) -> Result<()> {
        validation::validate_period_table(&periods)?;
        let courses: Vec<Course> = courses.into_iter().map(Course::normalized).collect();
        for course in &courses {
            validation::validate_course(course)?;
            validation::validate_course_against_periods(course, &periods)?;
        }

        self.execute(move |conn| {
            let tx = conn.transaction()?;
            write_periods(&tx, &periods)?;
            tx.execute("DELETE FROM courses", [])?;
            for course in &courses {
                insert_course(&tx, course)?;
            }
            tx.commit().context("failed to commit schedule import")?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CourseTime;

    #[tokio::test]
    async fn test_seed_defaults_once() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_periods().await.unwrap().is_empty());

        let seeded = db.ensure_default_periods().await.unwrap();
        assert_eq!(seeded.len(), default_periods().len());
        assert_eq!(seeded[0].start_minutes, 8 * 60);

        db.delete_period(8).await.unwrap();
        let again = db.ensure_default_periods().await.unwrap();
        assert_eq!(again.len(), default_periods().len() - 1);
    }

    #[tokio::test]
    async fn test_replace_periods_orders_by_sequence() {
        let db = Database::open_in_memory().unwrap();
        let stored = db
            .replace_periods(vec![
                PeriodDefinition::new(2, 600, 645),
                PeriodDefinition::new(1, 540, 585).with_label("Morning"),
            ])
            .await
            .unwrap();

        let sequences: Vec<u32> = stored.iter().map(|p| p.sequence).collect();
        assert_eq!(sequences, vec![1, 2]);
        assert_eq!(stored[0].label.as_deref(), Some("Morning"));
    }

    #[tokio::test]
    async fn test_invalid_period_table_keeps_old_rows() {
        let db = Database::open_in_memory().unwrap();
        db.ensure_default_periods().await.unwrap();

        let duplicate = vec![
            PeriodDefinition::new(1, 480, 525),
            PeriodDefinition::new(1, 530, 575),
        ];
        assert!(db.replace_periods(duplicate).await.is_err());
        assert!(db
            .replace_periods(vec![PeriodDefinition::new(1, 600, 600)])
            .await
            .is_err());
        assert_eq!(db.get_periods().await.unwrap().len(), default_periods().len());
    }

    #[tokio::test]
    async fn test_upsert_period_replaces_by_sequence() {
        let db = Database::open_in_memory().unwrap();
        let first = db.upsert_period(PeriodDefinition::new(3, 600, 645)).await.unwrap();
        let second = db
            .upsert_period(PeriodDefinition::new(3, 610, 655).with_label("Third"))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.start_minutes, 610);
        assert_eq!(db.get_periods().await.unwrap().len(), 1);
        assert!(db.delete_period(3).await.unwrap());
        assert!(!db.delete_period(3).await.unwrap());
    }

    #[tokio::test]
    async fn test_replace_schedule_reassigns_ids() {
        let db = Database::open_in_memory().unwrap();
        let old = db
            .upsert_course(Course::new("Old").with_time(CourseTime::new(1, 1, 1)))
            .await
            .unwrap();

        let mut imported = Course::new("History").with_time(CourseTime::new(2, 1, 2));
        imported.id = old.id;
        imported.times[0].id = 77;

        db.replace_schedule(vec![PeriodDefinition::new(1, 480, 525)], vec![imported])
            .await
            .unwrap();

        let courses = db.get_courses().await.unwrap();
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].name, "History");
        assert_ne!(courses[0].times[0].id, 77);
        assert_eq!(db.get_periods().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_replace_schedule_rejects_inverted_slots() {
        let db = Database::open_in_memory().unwrap();
        let periods = vec![PeriodDefinition::new(1, 600, 645), PeriodDefinition::new(2, 480, 525)];
        let backwards = Course::new("Backwards").with_time(CourseTime::new(1, 1, 2));

        assert!(db.replace_schedule(periods, vec![backwards]).await.is_err());
        assert!(db.get_periods().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_schedule_validates_before_writing() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_course(Course::new("Keep").with_time(CourseTime::new(1, 1, 1)))
            .await
            .unwrap();

        let result = db
            .replace_schedule(default_periods(), vec![Course::new("No slots")])
            .await;
        assert!(result.is_err());
        assert_eq!(db.get_courses().await.unwrap()[0].name, "Keep");
    }
}
