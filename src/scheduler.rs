//! Reminder scheduler
//!
//! A single background task wakes up at most every poll interval (sooner when
//! a reminder is due earlier), fires due reminders through the notifier and
//! drops them from the store.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::notify::Notifier;
use crate::reminder::ReminderStore;

/// Default scan cadence
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Shortest sleep between scans
const MIN_WAKE: Duration = Duration::from_millis(250);

/// Drives reminders from the store to the notifier
#[derive(Clone)]
pub struct ReminderScheduler {
    store: Arc<Mutex<ReminderStore>>,
    notifier: Arc<dyn Notifier>,
    poll_interval: Duration,
}

impl ReminderScheduler {
    pub fn new(
        store: Arc<Mutex<ReminderStore>>,
        notifier: Arc<dyn Notifier>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            poll_interval: poll_interval.max(MIN_WAKE),
        }
    }

    /// One pass: fire every reminder due at `now`. Returns how many fired.
    ///
    /// Fired reminders are removed and persisted before any notification is
    /// shown, so a later pass (in this or another process) cannot fire them
    /// again. The notifier re-reads its settings first, so a permission
    /// granted from another command applies without a restart.
    pub fn scan(&self, now: DateTime<Utc>) -> usize {
        self.notifier.refresh();
        let fired = {
            let mut store = self
                .store
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            store.reload();
            store.take_due(now)
        };

        for reminder in &fired {
            info!(id = %reminder.id, reservation = %reminder.reservation_id, "reminder due");
            self.notifier.notify(&reminder.message());
        }

        fired.len()
    }

    /// Time to sleep after a pass at `now`.
    pub fn next_wake(&self, now: DateTime<Utc>) -> Duration {
        let next = self
            .store
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .next_trigger();

        match next {
            Some(trigger_at) => (trigger_at - now)
                .to_std()
                .unwrap_or(Duration::ZERO)
                .clamp(MIN_WAKE, self.poll_interval),
            None => self.poll_interval,
        }
    }

    /// Spawn the polling task on the current runtime.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown, mut stopped) = watch::channel(false);

        let task = tokio::spawn(async move {
            debug!(interval = ?self.poll_interval, "reminder scheduler started");
            loop {
                self.scan(Utc::now());
                let wait = self.next_wake(Utc::now());

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = stopped.changed() => break,
                }
            }
            debug!("reminder scheduler stopped");
        });

        SchedulerHandle { shutdown, task }
    }
}

/// Running scheduler; dropping it without [`stop`](Self::stop) detaches the task.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop polling and wait for the task to release its timer.
    ///
    /// Pending reminders stay in the store; nothing is fired on the way out.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminder::{LeadTime, ReminderMeta};
    use crate::notify::{NativeChannel, NotificationChannel, NotificationPermission};
    use crate::storage::{MemoryStorage, Storage};
    use crate::tests::mocks::{FakeNative, RecordingNotifier, SharedPermission};
    use chrono::Duration as ChronoDuration;

    fn meta() -> ReminderMeta {
        ReminderMeta {
            room_label: "Laboratorio".to_string(),
            date: "2026-03-02".to_string(),
            start_time: Some("10:00".to_string()),
        }
    }

    fn scheduler() -> (ReminderScheduler, Arc<Mutex<ReminderStore>>, Arc<RecordingNotifier>) {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let store = Arc::new(Mutex::new(ReminderStore::new(storage)));
        let notifier = Arc::new(RecordingNotifier::default());
        let scheduler = ReminderScheduler::new(store.clone(), notifier.clone(), DEFAULT_POLL_INTERVAL);
        (scheduler, store, notifier)
    }

    #[test]
    fn test_scan_fires_due_reminders_exactly_once() {
        let (scheduler, store, notifier) = scheduler();
        let now = Utc::now();
        {
            let mut store = store.lock().unwrap();
            store.schedule("42", LeadTime::FifteenMinutes, now + ChronoDuration::minutes(1), meta());
            store.schedule("43", LeadTime::FiveMinutes, now + ChronoDuration::hours(1), meta());
        }

        assert_eq!(scheduler.scan(now), 0);
        assert!(notifier.messages().is_empty());

        let later = now + ChronoDuration::minutes(1);
        assert_eq!(scheduler.scan(later), 1);
        assert_eq!(
            notifier.messages(),
            vec!["Reservation in Laboratorio at 10:00 (2026-03-02)".to_string()]
        );

        assert_eq!(scheduler.scan(later + ChronoDuration::seconds(15)), 0);
        let remaining: Vec<String> = store.lock().unwrap().list().iter().map(|r| r.id.clone()).collect();
        assert_eq!(remaining, vec!["43-5".to_string()]);
        assert_eq!(notifier.messages().len(), 1);
    }

    #[test]
    fn test_scan_uses_permission_granted_after_start() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let store = Arc::new(Mutex::new(ReminderStore::new(storage)));
        let native = FakeNative::default();
        let fallback = Arc::new(RecordingNotifier::default());
        let stored = SharedPermission::new(NotificationPermission::Default);
        let channel = NotificationChannel::new(
            Some(Box::new(native.clone()) as Box<dyn NativeChannel>),
            NotificationPermission::Default,
            Box::new(fallback.clone()),
        )
        .with_permission_source(Box::new(stored.clone()));
        let scheduler = ReminderScheduler::new(store.clone(), Arc::new(channel), DEFAULT_POLL_INTERVAL);

        let now = Utc::now();
        store
            .lock()
            .unwrap()
            .schedule("42", LeadTime::FifteenMinutes, now, meta());
        // granted by a `remind add` running elsewhere
        stored.set(NotificationPermission::Granted);

        assert_eq!(scheduler.scan(now), 1);
        assert_eq!(native.delivered().len(), 1);
        assert!(fallback.messages().is_empty());
    }

    #[test]
    fn test_next_wake_is_bounded_by_interval() {
        let (scheduler, store, _) = scheduler();
        let now = Utc::now();
        assert_eq!(scheduler.next_wake(now), DEFAULT_POLL_INTERVAL);

        store
            .lock()
            .unwrap()
            .schedule("1", LeadTime::FiveMinutes, now + ChronoDuration::seconds(3), meta());
        let wake = scheduler.next_wake(now);
        assert!(wake <= Duration::from_secs(3));
        assert!(wake >= MIN_WAKE);

        store
            .lock()
            .unwrap()
            .schedule("1", LeadTime::FiveMinutes, now - ChronoDuration::seconds(3), meta());
        assert_eq!(scheduler.next_wake(now), MIN_WAKE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_task_fires_and_stops() {
        let (scheduler, store, notifier) = scheduler();
        let past = Utc::now() - ChronoDuration::seconds(1);
        store
            .lock()
            .unwrap()
            .schedule("42", LeadTime::FifteenMinutes, past, meta());

        let handle = scheduler.start();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(notifier.messages().len(), 1);

        handle.stop().await;

        // nothing fires once stopped, even when due
        store
            .lock()
            .unwrap()
            .schedule("43", LeadTime::FiveMinutes, past, meta());
        tokio::time::sleep(DEFAULT_POLL_INTERVAL * 2).await;
        assert_eq!(notifier.messages().len(), 1);
        assert_eq!(store.lock().unwrap().list().len(), 1);
    }
}
