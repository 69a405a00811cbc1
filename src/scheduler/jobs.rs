use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use tokio::{sync::Mutex, task::JoinHandle, time::Duration};

use crate::planner::{dnd::DND_TAG, reminders::REMINDER_TAG, SchedulePlan};

use super::sinks::{DndController, NotificationSink};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

pub const TEST_TAG: &str = "test";

/// What a job does when its instant arrives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum JobAction {
    Notify {
        title: String,
        subtitle: String,
        notification_id: i32,
    },
    SetDnd {
        enable: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingJob {
    pub key: String,
    pub fire_at: DateTime<Utc>,
    pub action: JobAction,
}

struct Job {
    id: u64,
    pending: PendingJob,
    handle: JoinHandle<()>,
}

/// Keyed one-shot timer jobs. Enqueueing a key that is already pending
/// replaces the earlier job.
#[derive(Clone)]
pub struct ReminderScheduler {
    jobs: Arc<Mutex<HashMap<String, Job>>>,
    next_id: Arc<AtomicU64>,
    notifier: Arc<dyn NotificationSink>,
    dnd: Arc<dyn DndController>,
}

impl ReminderScheduler {
    pub fn new(notifier: Arc<dyn NotificationSink>, dnd: Arc<dyn DndController>) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            notifier,
            dnd,
        }
    }

    /// Schedules `action` at `fire_at`, replacing any pending job with the
    /// same key. Instants in the past fire immediately.
    pub async fn enqueue_unique(&self, key: impl Into<String>, fire_at: DateTime<Utc>, action: JobAction) {
        let key = key.into();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let delay = match (fire_at - Utc::now()).to_std() {
            Ok(delay) => delay,
            Err(_) => {
                log_warn!("Job {key} was due at {fire_at}; firing now");
                Duration::ZERO
            }
        };

        let pending = PendingJob {
            key: key.clone(),
            fire_at,
            action,
        };

        let mut jobs = self.jobs.lock().await;

        let handle = {
            let jobs = Arc::clone(&self.jobs);
            let notifier = Arc::clone(&self.notifier);
            let dnd = Arc::clone(&self.dnd);
            let key = key.clone();
            let action = pending.action.clone();

            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                run_action(&key, &action, notifier.as_ref(), dnd.as_ref());

                let mut jobs = jobs.lock().await;
                if jobs.get(&key).is_some_and(|job| job.id == id) {
                    jobs.remove(&key);
                }
            })
        };

        if let Some(previous) = jobs.insert(key.clone(), Job { id, pending, handle }) {
            previous.handle.abort();
            log_debug!("Replaced pending job {key}");
        }
    }

    /// Aborts every pending job whose key starts with `{tag}_`. Returns how
    /// many were cancelled.
    pub async fn cancel_by_tag(&self, tag: &str) -> usize {
        let prefix = format!("{tag}_");
        let mut jobs = self.jobs.lock().await;
        let keys: Vec<String> = jobs
            .keys()
            .filter(|key| key.starts_with(&prefix))
            .cloned()
            .collect();

        for key in &keys {
            if let Some(job) = jobs.remove(key) {
                job.handle.abort();
            }
        }
        keys.len()
    }

    pub async fn cancel_all(&self) {
        let mut jobs = self.jobs.lock().await;
        for (_, job) in jobs.drain() {
            job.handle.abort();
        }
    }

    /// Drops every reminder and DND job, then enqueues everything in `plan`.
    pub async fn reschedule_all(&self, plan: &SchedulePlan) -> usize {
        let cancelled =
            self.cancel_by_tag(REMINDER_TAG).await + self.cancel_by_tag(DND_TAG).await;

        for reminder in &plan.reminders {
            self.enqueue_unique(
                reminder.dedup_key.clone(),
                reminder.fire_at,
                JobAction::Notify {
                    title: reminder.course_name.clone(),
                    subtitle: reminder.subtitle.clone(),
                    notification_id: reminder.notification_id,
                },
            )
            .await;
        }

        for toggle in &plan.dnd_toggles {
            self.enqueue_unique(
                toggle.dedup_key.clone(),
                toggle.at,
                JobAction::SetDnd {
                    enable: toggle.enable,
                },
            )
            .await;
        }

        let scheduled = plan.reminders.len() + plan.dnd_toggles.len();
        log_info!(
            "Rescheduled {} reminders and {} DND toggles (cancelled {cancelled})",
            plan.reminders.len(),
            plan.dnd_toggles.len()
        );
        scheduled
    }

    /// Pending jobs, earliest first.
    pub async fn pending(&self) -> Vec<PendingJob> {
        let jobs = self.jobs.lock().await;
        let mut pending: Vec<PendingJob> = jobs.values().map(|job| job.pending.clone()).collect();
        pending.sort_by(|a, b| a.fire_at.cmp(&b.fire_at).then_with(|| a.key.cmp(&b.key)));
        pending
    }

    pub async fn pending_count(&self) -> usize {
        self.jobs.lock().await.len()
    }

    /// Fires a notification after `delay_secs` (negative means now).
    pub async fn trigger_test_notification(&self, title: &str, subtitle: &str, delay_secs: i64) -> String {
        let fire_at = Utc::now() + ChronoDuration::seconds(delay_secs.max(0));
        let key = format!("{TEST_TAG}_notification");
        self.enqueue_unique(
            key.clone(),
            fire_at,
            JobAction::Notify {
                title: title.to_string(),
                subtitle: subtitle.to_string(),
                notification_id: 1,
            },
        )
        .await;
        key
    }

    /// Turns DND on in one second and off again `duration_minutes` later
    /// (at least one minute).
    pub async fn trigger_test_dnd(&self, duration_minutes: i64) -> (DateTime<Utc>, DateTime<Utc>) {
        let enable_at = Utc::now() + ChronoDuration::seconds(1);
        let disable_at = enable_at + ChronoDuration::minutes(duration_minutes.max(1));

        self.enqueue_unique(
            format!("{TEST_TAG}_dnd_on"),
            enable_at,
            JobAction::SetDnd { enable: true },
        )
        .await;
        self.enqueue_unique(
            format!("{TEST_TAG}_dnd_off"),
            disable_at,
            JobAction::SetDnd { enable: false },
        )
        .await;

        (enable_at, disable_at)
    }
}

fn run_action(key: &str, action: &JobAction, notifier: &dyn NotificationSink, dnd: &dyn DndController) {
    let result = match action {
        JobAction::Notify {
            title,
            subtitle,
            notification_id,
        } => notifier.notify(title, subtitle, *notification_id),
        JobAction::SetDnd { enable } => dnd.set_dnd(*enable),
    };

    match result {
        Ok(()) => log_debug!("Job {key} fired"),
        Err(err) => log_error!("Job {key} failed: {err:#}"),
    }
}
