use std::sync::Mutex;

use anyhow::Result;
use log::{debug, info};
use serde::Serialize;

/// Delivers a user-visible notification.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, title: &str, subtitle: &str, notification_id: i32) -> Result<()>;
}

/// Switches the system Do Not Disturb mode.
pub trait DndController: Send + Sync {
    fn set_dnd(&self, enable: bool) -> Result<()>;
    fn state(&self) -> DndState;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DndState {
    #[default]
    Off,
    On,
}

impl DndState {
    pub fn from_enabled(enable: bool) -> Self {
        if enable {
            DndState::On
        } else {
            DndState::Off
        }
    }
}

/// Writes notifications to the log.
#[derive(Debug, Default)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn notify(&self, title: &str, subtitle: &str, notification_id: i32) -> Result<()> {
        if subtitle.is_empty() {
            info!("[notification #{notification_id}] {title}");
        } else {
            info!("[notification #{notification_id}] {title} ({subtitle})");
        }
        Ok(())
    }
}

/// Tracks the ON/OFF state machine and logs transitions. Repeated requests
/// for the current state are no-ops.
#[derive(Debug, Default)]
pub struct LoggingDndController {
    state: Mutex<DndState>,
}

impl DndController for LoggingDndController {
    fn set_dnd(&self, enable: bool) -> Result<()> {
        let target = DndState::from_enabled(enable);
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *guard == target {
            debug!("Do Not Disturb already {target:?}");
            return Ok(());
        }
        info!("Do Not Disturb {:?} -> {target:?}", *guard);
        *guard = target;
        Ok(())
    }

    fn state(&self) -> DndState {
        match self.state.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
