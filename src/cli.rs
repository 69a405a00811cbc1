//! Kirara CLI: manage the timetable and run the reminder daemon.
//!
//! Usage:
//!   kirara courses add --name Math --slot mon:1-2 --slot wed:3-4@1-8,10
//!   kirara periods set 1 08:00 08:45
//!   kirara week
//!   kirara run                Keep reminders and DND scheduled until Ctrl-C

use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Local, TimeZone, Utc};
use clap::{Parser, Subcommand};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::agenda::{current_week, local_today, upcoming_today, week_grid};
use crate::backup;
use crate::models::{
    default_periods, minutes_to_time_text, Course, CourseTime, PeriodDefinition, MAX_WEEK_NUMBER,
    MINUTES_PER_DAY,
};
use crate::planner::{expand_schedule, ScheduledOccurrence};
use crate::scheduler::{plan_for_preferences, replan_loop, replan_once, DEFAULT_CHANGE_POLL_SECS};
use crate::settings::UserPreferences;
use crate::AppState;

#[derive(Parser)]
#[command(
    name = "kirara",
    about = "Class timetable with reminders and Do Not Disturb planning",
    version
)]
pub struct Cli {
    /// Data directory (default: $KIRARA_DATA_DIR or the platform data dir)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage courses
    #[command(subcommand)]
    Courses(CoursesCommand),
    /// Manage the period table
    #[command(subcommand)]
    Periods(PeriodsCommand),
    /// Show or change preferences
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Print the weekly grid
    Week,
    /// List classes that have not started yet
    Upcoming {
        /// Days to look ahead, today included
        #[arg(long, default_value_t = 1)]
        days: u32,
        /// Only today's next classes, at most this many
        #[arg(long)]
        today: Option<usize>,
    },
    /// Print the reminders and DND toggles that would be scheduled now
    Plan,
    /// Write courses, periods and preferences to a JSON file
    Export { path: PathBuf },
    /// Replace everything with the contents of a JSON backup
    Import { path: PathBuf },
    /// Keep reminders and DND scheduled until Ctrl-C
    Run,
    /// Send a test notification
    TestNotify {
        #[arg(long, default_value = "Kirara")]
        title: String,
        #[arg(long, default_value = "Test notification")]
        subtitle: String,
        /// Seconds to wait before sending
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        delay: i64,
    },
    /// Turn DND on for a few minutes
    TestDnd {
        #[arg(long, default_value_t = 1)]
        minutes: i64,
    },
}

#[derive(Subcommand)]
pub enum CoursesCommand {
    /// List every course with its slots
    List,
    /// Show one course
    Show { id: i64 },
    /// Add a course, or replace one with --id
    Add {
        /// Existing course to replace
        #[arg(long)]
        id: Option<i64>,
        #[arg(long)]
        name: String,
        #[arg(long)]
        teacher: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Hex colour (#RRGGBB)
        #[arg(long)]
        color: Option<String>,
        /// DAY:START-END[@WEEKS], e.g. mon:1-2 or 3:5-6@1-8,10
        #[arg(long = "slot", required = true, value_parser = parse_slot)]
        slots: Vec<CourseTime>,
    },
    /// Remove a course
    Remove { id: i64 },
}

#[derive(Subcommand)]
pub enum PeriodsCommand {
    /// List the period table
    List,
    /// Add or replace a period
    Set {
        sequence: u32,
        /// Start time (HH:MM)
        #[arg(value_parser = parse_time)]
        start: u16,
        /// End time (HH:MM, 24:00 allowed)
        #[arg(value_parser = parse_time)]
        end: u16,
        #[arg(long)]
        label: Option<String>,
    },
    /// Remove a period
    Remove { sequence: u32 },
    /// Restore the default eight periods
    Reset,
}

#[derive(Subcommand)]
pub enum SettingsCommand {
    /// Print preferences as JSON
    Show,
    /// Set one preference by its JSON name, e.g. `reminderLeadMinutes 15`
    Set { key: String, value: String },
}

pub(crate) async fn execute(command: Commands, state: &AppState) -> Result<()> {
    match command {
        Commands::Courses(command) => courses(command, state).await,
        Commands::Periods(command) => periods(command, state).await,
        Commands::Settings(command) => settings(command, state),
        Commands::Week => week(state).await,
        Commands::Upcoming { days, today } => upcoming(state, days, today).await,
        Commands::Plan => {
            let courses = state.db.get_courses().await?;
            let periods = state.db.get_periods().await?;
            let plan = plan_for_preferences(&courses, &periods, &state.settings.preferences(), Utc::now());
            println!("{}", serde_json::to_string_pretty(&plan)?);
            Ok(())
        }
        Commands::Export { path } => {
            let saved = backup::export_to(&state.db, &state.settings, &path).await?;
            println!(
                "Exported {} courses and {} periods to {}",
                saved.courses.len(),
                saved.periods.len(),
                path.display()
            );
            Ok(())
        }
        Commands::Import { path } => {
            let loaded = backup::import_from(&state.db, &state.settings, &path).await?;
            println!(
                "Imported {} courses and {} periods",
                loaded.courses.len(),
                loaded.periods.len()
            );
            Ok(())
        }
        Commands::Run => run_daemon(state).await,
        Commands::TestNotify {
            title,
            subtitle,
            delay,
        } => {
            state
                .scheduler
                .trigger_test_notification(&title, &subtitle, delay)
                .await;
            println!("Notification scheduled in {}s", delay.max(0));
            wait_for_jobs(state).await
        }
        Commands::TestDnd { minutes } => {
            let (enable_at, disable_at) = state.scheduler.trigger_test_dnd(minutes).await;
            println!(
                "DND on at {} and off at {}",
                enable_at.with_timezone(&Local).format("%H:%M:%S"),
                disable_at.with_timezone(&Local).format("%H:%M:%S")
            );
            wait_for_jobs(state).await
        }
    }
}

async fn courses(command: CoursesCommand, state: &AppState) -> Result<()> {
    match command {
        CoursesCommand::List => {
            let courses = state.db.get_courses().await?;
            if courses.is_empty() {
                println!("No courses yet. Add one with `kirara courses add`.");
            }
            for course in &courses {
                println!("{}", course_line(course));
            }
        }
        CoursesCommand::Show { id } => {
            let course = state
                .db
                .get_course(id)
                .await?
                .ok_or_else(|| anyhow!("course {id} not found"))?;
            println!("{}", serde_json::to_string_pretty(&course)?);
        }
        CoursesCommand::Add {
            id,
            name,
            teacher,
            location,
            notes,
            color,
            slots,
        } => {
            let course = Course {
                id: id.unwrap_or(0),
                name,
                teacher,
                location,
                notes,
                color_hex: color,
                times: slots,
            };
            let saved = state.db.upsert_course(course).await?;
            println!("Saved {}", course_line(&saved));
        }
        CoursesCommand::Remove { id } => {
            if !state.db.delete_course(id).await? {
                bail!("course {id} not found");
            }
            println!("Removed course {id}");
        }
    }
    Ok(())
}

async fn periods(command: PeriodsCommand, state: &AppState) -> Result<()> {
    match command {
        PeriodsCommand::List => {
            for period in state.db.get_periods().await? {
                println!("{:>3}  {}  {}", period.sequence, period.time_range_text(), period.display_label());
            }
        }
        PeriodsCommand::Set {
            sequence,
            start,
            end,
            label,
        } => {
            let mut period = PeriodDefinition::new(sequence, start, end);
            period.label = label;
            let saved = state.db.upsert_period(period).await?;
            println!("Saved period {} ({})", saved.sequence, saved.time_range_text());
        }
        PeriodsCommand::Remove { sequence } => {
            if !state.db.delete_period(sequence).await? {
                bail!("period {sequence} not found");
            }
            println!("Removed period {sequence}");
        }
        PeriodsCommand::Reset => {
            let stored = state.db.replace_periods(default_periods()).await?;
            println!("Restored {} default periods", stored.len());
        }
    }
    Ok(())
}

fn settings(command: SettingsCommand, state: &AppState) -> Result<()> {
    match command {
        SettingsCommand::Show => {
            println!("{}", serde_json::to_string_pretty(&state.settings.preferences())?);
        }
        SettingsCommand::Set { key, value } => {
            let updated = apply_setting(&state.settings.preferences(), &key, &value)?;
            state.settings.replace_all(updated)?;
            println!("{key} updated");
        }
    }
    Ok(())
}

async fn week(state: &AppState) -> Result<()> {
    let courses = state.db.get_courses().await?;
    let periods = state.db.get_periods().await?;
    let prefs = state.settings.preferences();
    let today = local_today(&prefs, Utc::now());

    match current_week(&prefs, today) {
        Some(week) => println!("{} (week {week})", prefs.timetable_name),
        None => println!("{}", prefs.timetable_name),
    }

    for day in week_grid(&courses, &periods, &prefs, today) {
        println!("{}", day_name(day.day_of_week));
        if day.items.is_empty() {
            println!("    -");
        }
        for item in day.items {
            let location = item
                .location
                .map(|l| format!(" @ {l}"))
                .unwrap_or_default();
            println!(
                "    {}-{}  {}{}{}",
                minutes_to_time_text(item.start_minutes),
                minutes_to_time_text(item.end_minutes),
                item.course_name,
                location,
                weeks_suffix(&item.slot),
            );
        }
    }
    Ok(())
}

async fn upcoming(state: &AppState, days: u32, today_limit: Option<usize>) -> Result<()> {
    let courses = state.db.get_courses().await?;
    let periods = state.db.get_periods().await?;
    let prefs = state.settings.preferences();

    let lines = match prefs.zone() {
        Some(zone) => upcoming_lines(&courses, &periods, &prefs, &zone, days, today_limit),
        None => upcoming_lines(&courses, &periods, &prefs, &Local, days, today_limit),
    };

    if lines.is_empty() {
        println!("Nothing coming up.");
    }
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

fn upcoming_lines<Tz: TimeZone>(
    courses: &[Course],
    periods: &[PeriodDefinition],
    prefs: &UserPreferences,
    zone: &Tz,
    days: u32,
    today_limit: Option<usize>,
) -> Vec<String>
where
    Tz::Offset: std::fmt::Display,
{
    let now = Utc::now();
    let today = now.with_timezone(zone).date_naive();
    let occurrences = expand_schedule(
        courses,
        periods,
        prefs.term_start_date(),
        prefs.total_weeks(),
        zone,
        today,
        days.saturating_sub(1),
    );

    let selected: Vec<&ScheduledOccurrence<'_, Tz>> = match today_limit {
        Some(limit) => upcoming_today(&occurrences, &now, limit),
        None => occurrences
            .iter()
            .filter(|o| o.start.with_timezone(&Utc) > now)
            .collect(),
    };

    selected
        .into_iter()
        .map(|o| {
            let subtitle = o.course.reminder_subtitle();
            let subtitle = if subtitle.is_empty() {
                String::new()
            } else {
                format!("  ({subtitle})")
            };
            format!(
                "{}-{}  {}{}",
                o.start.format("%a %m-%d %H:%M"),
                o.end.format("%H:%M"),
                o.course.name,
                subtitle
            )
        })
        .collect()
}

async fn run_daemon(state: &AppState) -> Result<()> {
    state.db.ensure_default_periods().await?;
    let first = replan_once(&state.db, &state.settings, &state.scheduler).await?;
    println!(
        "Scheduled {} reminders and {} DND toggles; replanning on edits and every {}s. Press Ctrl-C to stop.",
        first.reminders.len(),
        first.dnd_toggles.len(),
        state.replan_interval.as_secs()
    );

    let cancel_token = CancellationToken::new();
    let handle = tokio::spawn(replan_loop(
        state.db.clone(),
        Arc::clone(&state.settings),
        state.scheduler.clone(),
        state.replan_interval,
        Duration::from_secs(DEFAULT_CHANGE_POLL_SECS),
        cancel_token.clone(),
    ));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    cancel_token.cancel();
    handle.await.context("replan loop task failed to join")?;
    state.scheduler.cancel_all().await;
    println!("Stopped.");
    Ok(())
}

/// Blocks until every pending job has fired, or Ctrl-C.
async fn wait_for_jobs(state: &AppState) -> Result<()> {
    loop {
        if state.scheduler.pending_count().await == 0 {
            return Ok(());
        }
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(250)) => {}
            _ = tokio::signal::ctrl_c() => {
                state.scheduler.cancel_all().await;
                return Ok(());
            }
        }
    }
}

fn course_line(course: &Course) -> String {
    let slots = course
        .times
        .iter()
        .map(slot_text)
        .collect::<Vec<_>>()
        .join(", ");
    let subtitle = course.reminder_subtitle();
    if subtitle.is_empty() {
        format!("#{} {}  [{}]", course.id, course.name, slots)
    } else {
        format!("#{} {} ({})  [{}]", course.id, course.name, subtitle, slots)
    }
}

fn slot_text(slot: &CourseTime) -> String {
    let periods = if slot.start_period == slot.end_period {
        slot.start_period.to_string()
    } else {
        format!("{}-{}", slot.start_period, slot.end_period)
    };
    format!("{} {}{}", day_name(slot.day_of_week), periods, weeks_suffix(slot))
}

fn weeks_suffix(slot: &CourseTime) -> String {
    if slot.weeks.is_every_week() {
        return String::new();
    }
    let weeks = slot
        .weeks
        .weeks()
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!(" (weeks {weeks})")
}

fn day_name(day_of_week: u8) -> &'static str {
    match day_of_week {
        1 => "Mon",
        2 => "Tue",
        3 => "Wed",
        4 => "Thu",
        5 => "Fri",
        6 => "Sat",
        7 => "Sun",
        _ => "?",
    }
}

/// Sets `key` (camelCase, as in `settings.json`) to `raw`. Values are read as
/// JSON first so numbers, booleans and `null` work; anything else is a string.
fn apply_setting(prefs: &UserPreferences, key: &str, raw: &str) -> Result<UserPreferences> {
    let mut value = serde_json::to_value(prefs)?;
    let fields = value
        .as_object_mut()
        .ok_or_else(|| anyhow!("preferences did not serialize to an object"))?;

    if !fields.contains_key(key) {
        let mut known: Vec<&str> = fields.keys().map(String::as_str).collect();
        known.sort_unstable();
        bail!("unknown setting '{key}'. Known settings: {}", known.join(", "));
    }

    let parsed = serde_json::from_str::<serde_json::Value>(raw)
        .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
    fields.insert(key.to_string(), parsed);

    match serde_json::from_value::<UserPreferences>(value.clone()) {
        Ok(updated) => Ok(updated),
        Err(first_err) => {
            // `123` for a text field: retry as a plain string
            fields_as_string(value, key, raw)
                .with_context(|| format!("invalid value '{raw}' for {key}: {first_err}"))
        }
    }
}

fn fields_as_string(mut value: serde_json::Value, key: &str, raw: &str) -> Result<UserPreferences> {
    if let Some(fields) = value.as_object_mut() {
        fields.insert(key.to_string(), serde_json::Value::String(raw.to_string()));
    }
    Ok(serde_json::from_value(value)?)
}

/// Parses `DAY:START-END[@WEEKS]`. DAY is 1-7 or a weekday name; a single
/// period (`mon:3`) is shorthand for `mon:3-3`.
pub fn parse_slot(raw: &str) -> Result<CourseTime, String> {
    let (slot, weeks) = match raw.split_once('@') {
        Some((slot, weeks)) => (slot, Some(weeks)),
        None => (raw, None),
    };

    let (day, periods) = slot
        .split_once(':')
        .ok_or_else(|| format!("slot '{raw}' must look like DAY:START-END"))?;
    let day = parse_day(day)?;

    let (start, end) = match periods.split_once('-') {
        Some((start, end)) => (start, end),
        None => (periods, periods),
    };
    let start_period = parse_period(start)?;
    let end_period = parse_period(end)?;
    if start_period > end_period {
        return Err(format!("slot '{raw}': start period is after end period"));
    }

    let mut time = CourseTime::new(day, start_period, end_period);
    if let Some(weeks) = weeks {
        time = time.in_weeks(parse_weeks(weeks)?);
    }
    Ok(time)
}

fn parse_period(raw: &str) -> Result<u32, String> {
    match raw.trim().parse::<u32>() {
        Ok(0) | Err(_) => Err(format!("'{raw}' is not a period number")),
        Ok(period) => Ok(period),
    }
}

fn parse_day(raw: &str) -> Result<u8, String> {
    let lowered = raw.trim().to_ascii_lowercase();
    let day = match lowered.as_str() {
        "1" | "mon" | "monday" => 1,
        "2" | "tue" | "tuesday" => 2,
        "3" | "wed" | "wednesday" => 3,
        "4" | "thu" | "thursday" => 4,
        "5" | "fri" | "friday" => 5,
        "6" | "sat" | "saturday" => 6,
        "7" | "sun" | "sunday" => 7,
        _ => return Err(format!("'{raw}' is not a day (1-7 or mon..sun)")),
    };
    Ok(day)
}

/// Parses week lists like `1-8,10`. Weeks run from 1 to `MAX_WEEK_NUMBER`.
pub fn parse_weeks(raw: &str) -> Result<Vec<u32>, String> {
    let mut weeks = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (first, last) = match part.split_once('-') {
            Some((first, last)) => (first, last),
            None => (part, part),
        };
        let parse = |text: &str| match text.trim().parse::<u32>() {
            Ok(0) | Err(_) => Err(format!("'{part}' is not a week number or range")),
            Ok(week) => Ok(week),
        };
        let (first, last) = (parse(first)?, parse(last)?);
        if first > last {
            return Err(format!("week range '{part}' is reversed"));
        }
        if last > MAX_WEEK_NUMBER {
            return Err(format!("week range '{part}' goes past week {MAX_WEEK_NUMBER}"));
        }
        weeks.extend(first..=last);
    }
    if weeks.is_empty() {
        return Err("week list is empty".into());
    }
    Ok(weeks)
}

/// Parses `HH:MM` into minutes after midnight. `24:00` is accepted.
pub fn parse_time(raw: &str) -> Result<u16, String> {
    let (hours, minutes) = raw
        .trim()
        .split_once(':')
        .ok_or_else(|| format!("'{raw}' is not a time (HH:MM)"))?;
    let hours: u16 = hours
        .parse()
        .map_err(|_| format!("'{raw}' is not a time (HH:MM)"))?;
    let minutes: u16 = minutes
        .parse()
        .map_err(|_| format!("'{raw}' is not a time (HH:MM)"))?;
    if minutes >= 60 {
        return Err(format!("'{raw}': minutes must be below 60"));
    }
    if hours > 24 || hours * 60 + minutes > MINUTES_PER_DAY {
        return Err(format!("'{raw}' is past 24:00"));
    }
    Ok(hours * 60 + minutes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WeekRestriction;

    #[test]
    fn test_parse_slot() {
        let slot = parse_slot("mon:1-2").unwrap();
        assert_eq!((slot.day_of_week, slot.start_period, slot.end_period), (1, 1, 2));
        assert_eq!(slot.weeks, WeekRestriction::Every);

        let slot = parse_slot("3:5-6@1-3,10").unwrap();
        assert_eq!(slot.day_of_week, 3);
        assert_eq!(slot.weeks.weeks(), vec![1, 2, 3, 10]);

        let single = parse_slot("Sunday:4").unwrap();
        assert_eq!((single.day_of_week, single.start_period, single.end_period), (7, 4, 4));
    }

    #[test]
    fn test_parse_slot_rejects_bad_input() {
        assert!(parse_slot("mon").is_err());
        assert!(parse_slot("8:1-2").is_err());
        assert!(parse_slot("mon:3-1").is_err());
        assert!(parse_slot("mon:0-1").is_err());
        assert!(parse_slot("mon:1-2@").is_err());
        assert!(parse_slot("mon:1-2@5-2").is_err());
    }

    #[test]
    fn test_parse_weeks_merges_duplicates() {
        let weeks = parse_weeks("3, 1-4").unwrap();
        let restriction = WeekRestriction::from_weeks(weeks);
        assert_eq!(restriction.weeks(), vec![1, 2, 3, 4]);
        assert!(parse_weeks("0").is_err());
        assert!(parse_weeks("x").is_err());
    }

    #[test]
    fn test_parse_weeks_rejects_huge_ranges() {
        assert_eq!(parse_weeks("1-60").unwrap().len(), 60);
        assert!(parse_weeks("1-61").is_err());
        assert!(parse_weeks("1-20000000").is_err());
        assert!(parse_weeks("4000000000").is_err());
        assert!(parse_slot("mon:1@1-4000000000").is_err());
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("08:00").unwrap(), 480);
        assert_eq!(parse_time("9:05").unwrap(), 545);
        assert_eq!(parse_time("24:00").unwrap(), 1440);
        assert!(parse_time("24:01").is_err());
        assert!(parse_time("12:60").is_err());
        assert!(parse_time("noon").is_err());
    }

    #[test]
    fn test_apply_setting() {
        let prefs = UserPreferences::default();

        let updated = apply_setting(&prefs, "reminderLeadMinutes", "15").unwrap();
        assert_eq!(updated.reminder_lead_minutes, 15);

        let updated = apply_setting(&prefs, "dndEnabled", "true").unwrap();
        assert!(updated.dnd_enabled);

        let updated = apply_setting(&prefs, "termStartDateIso", "2024-09-02").unwrap();
        assert_eq!(updated.term_start_date_iso.as_deref(), Some("2024-09-02"));

        let updated = apply_setting(&updated, "termStartDateIso", "null").unwrap();
        assert_eq!(updated.term_start_date_iso, None);

        let updated = apply_setting(&prefs, "timetableName", "2024").unwrap();
        assert_eq!(updated.timetable_name, "2024");

        assert!(apply_setting(&prefs, "volume", "3").is_err());
        assert!(apply_setting(&prefs, "totalWeeks", "many").is_err());
    }

    #[test]
    fn test_course_line() {
        let mut course = Course::new("Math")
            .with_time(CourseTime::new(1, 1, 2))
            .with_time(CourseTime::new(3, 4, 4).in_weeks(vec![1, 2]));
        course.id = 3;
        course.location = Some("B201".into());
        assert_eq!(course_line(&course), "#3 Math (B201)  [Mon 1-2, Wed 4 (weeks 1,2)]");
    }

    #[test]
    fn test_cli_parses_nested_commands() {
        let cli = Cli::try_parse_from([
            "kirara", "courses", "add", "--name", "Math", "--slot", "mon:1-2", "--slot", "fri:3",
        ])
        .unwrap();
        match cli.command {
            Commands::Courses(CoursesCommand::Add { name, slots, .. }) => {
                assert_eq!(name, "Math");
                assert_eq!(slots.len(), 2);
            }
            _ => panic!("expected courses add"),
        }

        let cli = Cli::try_parse_from(["kirara", "periods", "set", "1", "08:00", "08:45"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Periods(PeriodsCommand::Set { start: 480, end: 525, .. })
        ));

        assert!(Cli::try_parse_from(["kirara", "courses", "add", "--name", "NoSlot"]).is_err());
    }
}
