use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

use crate::db::{
    connection::Database,
    helpers::{optional_text, parse_weeks, to_u32, to_u8},
    repositories::periods::query_periods,
};
use crate::models::{validation, Course, CourseTime};

const COURSE_COLUMNS: &str = "id, name, teacher, location, notes, color_hex";

fn row_to_course(row: &Row) -> Result<Course, rusqlite::Error> {
    Ok(Course {
        id: row.get("id")?,
        name: row.get("name")?,
        teacher: row.get("teacher")?,
        location: row.get("location")?,
        notes: row.get("notes")?,
        color_hex: row.get("color_hex")?,
        times: Vec::new(),
    })
}

fn row_to_course_time(row: &Row) -> Result<(i64, CourseTime)> {
    let course_id: i64 = row.get("course_id")?;
    let time = CourseTime {
        id: row.get("id")?,
        day_of_week: to_u8(row.get("day_of_week")?, "day_of_week")?,
        start_period: to_u32(row.get("start_period")?, "start_period")?,
        end_period: to_u32(row.get("end_period")?, "end_period")?,
        weeks: parse_weeks(row.get("weeks")?),
    };
    Ok((course_id, time))
}

/// Attaches every stored time to its course. Courses are expected sorted by id.
fn load_times(conn: &Connection, courses: &mut [Course]) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT id, course_id, day_of_week, start_period, end_period, weeks
         FROM course_times
         ORDER BY course_id ASC, day_of_week ASC, start_period ASC, id ASC",
    )?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let (course_id, time) = row_to_course_time(row)?;
        if let Ok(index) = courses.binary_search_by_key(&course_id, |c| c.id) {
            courses[index].times.push(time);
        }
    }
    Ok(())
}

fn query_courses(conn: &Connection) -> Result<Vec<Course>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COURSE_COLUMNS} FROM courses ORDER BY id ASC"
    ))?;
    let mut courses = stmt
        .query_map([], row_to_course)?
        .collect::<Result<Vec<_>, _>>()?;
    load_times(conn, &mut courses)?;
    Ok(courses)
}

fn query_course(conn: &Connection, course_id: i64) -> Result<Option<Course>> {
    let course = conn
        .query_row(
            &format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = ?1"),
            params![course_id],
            row_to_course,
        )
        .optional()?;

    let Some(mut course) = course else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT id, course_id, day_of_week, start_period, end_period, weeks
         FROM course_times
         WHERE course_id = ?1
         ORDER BY day_of_week ASC, start_period ASC, id ASC",
    )?;
    let mut rows = stmt.query(params![course_id])?;
    while let Some(row) = rows.next()? {
        course.times.push(row_to_course_time(row)?.1);
    }

    Ok(Some(course))
}

fn insert_times(tx: &Transaction<'_>, course_id: i64, times: &[CourseTime]) -> Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO course_times (course_id, day_of_week, start_period, end_period, weeks)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for time in times {
        stmt.execute(params![
            course_id,
            time.day_of_week,
            time.start_period,
            time.end_period,
            time.weeks.to_storage(),
        ])?;
    }
    Ok(())
}

/// Inserts `course` as a new row, ignoring its id and the ids of its times.
pub(crate) fn insert_course(tx: &Transaction<'_>, course: &Course) -> Result<i64> {
    let now = Utc::now().to_rfc3339();
    tx.execute(
        "INSERT INTO courses (name, teacher, location, notes, color_hex, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            course.name.trim(),
            optional_text(&course.teacher),
            optional_text(&course.location),
            optional_text(&course.notes),
            optional_text(&course.color_hex),
            now,
        ],
    )
    .context("failed to insert course")?;

    let course_id = tx.last_insert_rowid();
    insert_times(tx, course_id, &course.times)?;
    Ok(course_id)
}

impl Database {
    /// All courses with their times, ordered by id.
    pub async fn get_courses(&self) -> Result<Vec<Course>> {
        self.execute(|conn| query_courses(conn)).await
    }

    pub async fn get_course(&self, course_id: i64) -> Result<Option<Course>> {
        self.execute(move |conn| query_course(conn, course_id)).await
    }

    /// Courses meeting on `day_of_week` (1 = Monday), carrying only that day's times.
    pub async fn get_courses_for_day(&self, day_of_week: u8) -> Result<Vec<Course>> {
        let courses = self.get_courses().await?;
        Ok(courses
            .into_iter()
            .filter_map(|mut course| {
                course.times.retain(|t| t.day_of_week == day_of_week);
                (!course.times.is_empty()).then_some(course)
            })
            .collect())
    }

    /// Inserts when `course.id == 0`, otherwise updates the row and replaces
    /// all of its times. Returns the stored course. Slots must end after
    /// they start under the stored period table.
    pub async fn upsert_course(&self, course: Course) -> Result<Course> {
        let course = course.normalized();
        validation::validate_course(&course)?;

        self.execute(move |conn| {
            let periods = query_periods(conn)?;
            validation::validate_course_against_periods(&course, &periods)?;

            let tx = conn.transaction()?;

            let course_id = if course.id == 0 {
                insert_course(&tx, &course)?
            } else {
                let rows_affected = tx
                    .execute(
                        "UPDATE courses
                         SET name = ?1, teacher = ?2, location = ?3, notes = ?4,
                             color_hex = ?5, updated_at = ?6
                         WHERE id = ?7",
                        params![
                            course.name,
                            optional_text(&course.teacher),
                            optional_text(&course.location),
                            optional_text(&course.notes),
                            optional_text(&course.color_hex),
                            Utc::now().to_rfc3339(),
                            course.id,
                        ],
                    )
                    .context("failed to update course")?;
                if rows_affected == 0 {
                    return Err(anyhow!("course {} not found", course.id));
                }

                tx.execute(
                    "DELETE FROM course_times WHERE course_id = ?1",
                    params![course.id],
                )?;
                insert_times(&tx, course.id, &course.times)?;
                course.id
            };

            tx.commit().context("failed to commit course")?;

            query_course(conn, course_id)?
                .ok_or_else(|| anyhow!("course {course_id} not found after save"))
        })
        .await
    }

    /// Returns whether a course was removed. Its times go with it.
    pub async fn delete_course(&self, course_id: i64) -> Result<bool> {
        self.execute(move |conn| {
            let rows_affected =
                conn.execute("DELETE FROM courses WHERE id = ?1", params![course_id])?;
            Ok(rows_affected > 0)
        })
        .await
    }

    pub async fn clear_courses(&self) -> Result<()> {
        self.execute(|conn| {
            conn.execute("DELETE FROM courses", [])?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn math() -> Course {
        let mut course = Course::new("Linear Algebra")
            .with_time(CourseTime::new(1, 1, 2))
            .with_time(CourseTime::new(3, 5, 6).in_weeks(vec![1, 2, 3]));
        course.teacher = Some("Dr. Chen".into());
        course.location = Some("  ".into());
        course
    }

    #[tokio::test]
    async fn test_insert_and_fetch() {
        let db = Database::open_in_memory().unwrap();
        let saved = db.upsert_course(math()).await.unwrap();

        assert!(saved.id > 0);
        assert_eq!(saved.times.len(), 2);
        assert!(saved.times.iter().all(|t| t.id > 0));
        assert_eq!(saved.location, None);
        assert_eq!(saved.times[1].weeks.weeks(), vec![1, 2, 3]);
        assert!(saved.times[0].weeks.is_every_week());

        let all = db.get_courses().await.unwrap();
        assert_eq!(all, vec![saved.clone()]);
        assert_eq!(db.get_course(saved.id).await.unwrap(), Some(saved));
        assert_eq!(db.get_course(999).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_replaces_times() {
        let db = Database::open_in_memory().unwrap();
        let mut saved = db.upsert_course(math()).await.unwrap();

        saved.name = "Calculus".into();
        saved.times = vec![CourseTime::new(5, 3, 4)];
        let updated = db.upsert_course(saved.clone()).await.unwrap();

        assert_eq!(updated.id, saved.id);
        assert_eq!(updated.name, "Calculus");
        assert_eq!(updated.times.len(), 1);
        assert_eq!(updated.times[0].day_of_week, 5);

        let count: i64 = db
            .execute(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM course_times", [], |r| r.get(0))?))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_update_missing_course_fails() {
        let db = Database::open_in_memory().unwrap();
        let mut course = math();
        course.id = 42;
        assert!(db.upsert_course(course).await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_course_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let no_times = Course::new("Empty");
        assert!(db.upsert_course(no_times).await.is_err());

        let bad_day = Course::new("Bad").with_time(CourseTime::new(8, 1, 1));
        assert!(db.upsert_course(bad_day).await.is_err());
        assert!(db.get_courses().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_slot_ending_before_it_starts_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.replace_periods(vec![
            crate::models::PeriodDefinition::new(1, 600, 645),
            crate::models::PeriodDefinition::new(2, 480, 525),
        ])
        .await
        .unwrap();

        let backwards = Course::new("Backwards").with_time(CourseTime::new(1, 1, 2));
        assert!(db.upsert_course(backwards).await.is_err());
        assert!(db.get_courses().await.unwrap().is_empty());

        let forwards = Course::new("Forwards").with_time(CourseTime::new(1, 2, 2));
        assert!(db.upsert_course(forwards).await.is_ok());
    }

    #[tokio::test]
    async fn test_courses_for_day() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_course(math()).await.unwrap();
        db.upsert_course(Course::new("Art").with_time(CourseTime::new(2, 1, 1)))
            .await
            .unwrap();

        let wednesday = db.get_courses_for_day(3).await.unwrap();
        assert_eq!(wednesday.len(), 1);
        assert_eq!(wednesday[0].name, "Linear Algebra");
        assert_eq!(wednesday[0].times.len(), 1);
        assert!(db.get_courses_for_day(7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_cascades_to_times() {
        let db = Database::open_in_memory().unwrap();
        let saved = db.upsert_course(math()).await.unwrap();

        assert!(db.delete_course(saved.id).await.unwrap());
        assert!(!db.delete_course(saved.id).await.unwrap());

        let count: i64 = db
            .execute(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM course_times", [], |r| r.get(0))?))
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_clear_courses() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_course(math()).await.unwrap();
        db.upsert_course(math()).await.unwrap();
        db.clear_courses().await.unwrap();
        assert!(db.get_courses().await.unwrap().is_empty());
    }
}
