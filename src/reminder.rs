//! Local reminders for upcoming reservations
//!
//! Reminders live only on this machine, under [`REMINDERS_KEY`]. The server
//! knows nothing about them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use roombook_protocol::Reservation;

use crate::error::{Result, RoombookError};
use crate::storage::{Storage, REMINDERS_KEY};
use crate::utils::{format_hour, local_instant};

/// How long before a reservation starts a reminder fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum LeadTime {
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
}

impl LeadTime {
    pub const ALL: [LeadTime; 4] = [
        LeadTime::FiveMinutes,
        LeadTime::FifteenMinutes,
        LeadTime::ThirtyMinutes,
        LeadTime::OneHour,
    ];

    pub fn minutes(self) -> u32 {
        match self {
            LeadTime::FiveMinutes => 5,
            LeadTime::FifteenMinutes => 15,
            LeadTime::ThirtyMinutes => 30,
            LeadTime::OneHour => 60,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::minutes(i64::from(self.minutes()))
    }
}

impl TryFrom<u32> for LeadTime {
    type Error = String;

    fn try_from(minutes: u32) -> std::result::Result<Self, Self::Error> {
        LeadTime::ALL
            .into_iter()
            .find(|lead| lead.minutes() == minutes)
            .ok_or_else(|| {
                format!(
                    "unsupported lead time {} (choose 5, 15, 30 or 60 minutes)",
                    minutes
                )
            })
    }
}

impl From<LeadTime> for u32 {
    fn from(lead: LeadTime) -> Self {
        lead.minutes()
    }
}

impl fmt::Display for LeadTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} min", self.minutes())
    }
}

/// What a reminder says about its reservation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderMeta {
    pub room_label: String,
    pub date: String,
    pub start_time: Option<String>,
}

impl ReminderMeta {
    pub fn from_reservation(reservation: &Reservation) -> Self {
        let room_label = if reservation.room.name.trim().is_empty() {
            format!("room {}", reservation.room.id)
        } else {
            reservation.room.name.clone()
        };
        Self {
            room_label,
            date: reservation.date.clone(),
            start_time: reservation.start_time.clone(),
        }
    }
}

/// A scheduled local reminder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalReminder {
    pub id: String,
    pub reservation_id: String,
    /// Epoch milliseconds on disk
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub trigger_at: DateTime<Utc>,
    pub minutes_before: LeadTime,
    pub room_label: String,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default)]
    pub fired: bool,
}

impl LocalReminder {
    /// Id shared by every reminder for the same reservation and lead time.
    pub fn make_id(reservation_id: &str, lead: LeadTime) -> String {
        format!("{}-{}", reservation_id, lead.minutes())
    }

    pub fn message(&self) -> String {
        format!(
            "Reservation in {} at {} ({})",
            self.room_label,
            format_hour(self.start_time.as_deref()),
            self.date
        )
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.fired && self.trigger_at <= now
    }
}

/// Compute when a reminder for `reservation` should fire.
///
/// Rejects reservations without a date or start time and trigger times that
/// are not in the future.
pub fn trigger_time(
    reservation: &Reservation,
    lead: LeadTime,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    let start_time = reservation
        .start_time
        .as_deref()
        .map(str::trim)
        .filter(|time| !time.is_empty());
    let (date, start_time) = match (reservation.date.trim(), start_time) {
        (date, Some(time)) if !date.is_empty() => (date, time),
        _ => {
            return Err(RoombookError::reminder(
                "the reservation has no date or start time",
            ))
        }
    };

    let start = local_instant(date, start_time).ok_or_else(|| {
        RoombookError::reminder(format!("invalid date or time: {} {}", date, start_time))
    })?;

    let trigger_at = start - lead.duration();
    if trigger_at <= now {
        return Err(RoombookError::reminder(
            "the reminder time has already passed",
        ));
    }

    Ok(trigger_at)
}

/// Owner of the reminder collection and its durable record
pub struct ReminderStore {
    storage: Arc<dyn Storage>,
    reminders: Vec<LocalReminder>,
    saved: bool,
}

impl ReminderStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        let mut store = Self {
            storage,
            reminders: Vec::new(),
            saved: true,
        };
        store.reload();
        store
    }

    /// Replace the in-memory collection with the persisted one.
    ///
    /// Other processes sharing the storage may have changed it. Corrupt
    /// records are cleared and read as empty; unreadable storage keeps the
    /// current collection.
    pub fn reload(&mut self) {
        self.reminders = match self.storage.get(REMINDERS_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<LocalReminder>>(&raw) {
                Ok(reminders) => reminders,
                Err(e) => {
                    warn!("Discarding unreadable reminder list: {}", e);
                    if let Err(e) = self.storage.remove(REMINDERS_KEY) {
                        warn!("Could not clear reminder list: {}", e);
                    }
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Could not read reminder list: {}", e);
                return;
            }
        };
    }

    /// Whether the last change reached storage.
    pub fn is_saved(&self) -> bool {
        self.saved
    }

    pub fn list(&self) -> &[LocalReminder] {
        &self.reminders
    }

    /// Add a reminder, replacing any previous one with the same reservation
    /// and lead time.
    pub fn schedule(
        &mut self,
        reservation_id: &str,
        lead: LeadTime,
        trigger_at: DateTime<Utc>,
        meta: ReminderMeta,
    ) -> LocalReminder {
        let reminder = LocalReminder {
            id: LocalReminder::make_id(reservation_id, lead),
            reservation_id: reservation_id.to_string(),
            trigger_at,
            minutes_before: lead,
            room_label: meta.room_label,
            date: meta.date,
            start_time: meta.start_time,
            fired: false,
        };

        self.reminders.retain(|existing| existing.id != reminder.id);
        self.reminders.push(reminder.clone());
        self.persist();

        debug!(id = %reminder.id, trigger_at = %reminder.trigger_at, "scheduled reminder");
        reminder
    }

    /// Validate and schedule a reminder `lead` before `reservation` starts.
    ///
    /// On rejection the store is left untouched.
    pub fn schedule_for_reservation(
        &mut self,
        reservation: &Reservation,
        lead: LeadTime,
        now: DateTime<Utc>,
    ) -> Result<LocalReminder> {
        let trigger_at = trigger_time(reservation, lead, now)?;
        Ok(self.schedule(
            &reservation.id,
            lead,
            trigger_at,
            ReminderMeta::from_reservation(reservation),
        ))
    }

    /// Remove a reminder by id. Returns whether one was removed.
    pub fn cancel(&mut self, reminder_id: &str) -> bool {
        let before = self.reminders.len();
        self.reminders.retain(|reminder| reminder.id != reminder_id);
        let removed = self.reminders.len() != before;
        if removed {
            self.persist();
        }
        removed
    }

    /// First unfired reminder for a reservation, whatever its lead time.
    pub fn find_active(&self, reservation_id: &str) -> Option<&LocalReminder> {
        self.reminders
            .iter()
            .find(|reminder| reminder.reservation_id == reservation_id && !reminder.fired)
    }

    /// Earliest pending trigger time.
    pub fn next_trigger(&self) -> Option<DateTime<Utc>> {
        self.reminders
            .iter()
            .filter(|reminder| !reminder.fired)
            .map(|reminder| reminder.trigger_at)
            .min()
    }

    /// Mark every due reminder fired, purge fired entries and persist.
    ///
    /// Returns the reminders fired by this call. Once this returns, no later
    /// call can see them again.
    pub(crate) fn take_due(&mut self, now: DateTime<Utc>) -> Vec<LocalReminder> {
        let mut fired = Vec::new();
        for reminder in self.reminders.iter_mut().filter(|r| r.is_due(now)) {
            reminder.fired = true;
            fired.push(reminder.clone());
        }

        let before = self.reminders.len();
        self.reminders.retain(|reminder| !reminder.fired);
        if self.reminders.len() != before {
            self.persist();
        }

        fired
    }

    /// Write the collection. Failures are logged, never raised; the result
    /// is kept for [`is_saved`](Self::is_saved).
    fn persist(&mut self) -> bool {
        let written = match serde_json::to_string(&self.reminders) {
            Ok(content) => self.storage.set(REMINDERS_KEY, &content),
            Err(e) => Err(e.into()),
        };

        self.saved = match written {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not persist reminders: {}", e);
                false
            }
        };
        self.saved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::tests::test_helpers::{reservation_at, FailingStorage};

    fn store() -> (Arc<dyn Storage>, ReminderStore) {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let store = ReminderStore::new(storage.clone());
        (storage, store)
    }

    #[test]
    fn test_schedule_fifteen_minutes_before() {
        let (_, mut store) = store();
        let now = Utc::now();
        let reservation = reservation_at("42", now + Duration::hours(1));
        let start = crate::utils::reservation_start(&reservation).unwrap();

        let reminder = store
            .schedule_for_reservation(&reservation, LeadTime::FifteenMinutes, now)
            .unwrap();

        assert_eq!(reminder.id, "42-15");
        assert_eq!(reminder.trigger_at, start - Duration::minutes(15));
        assert_eq!(store.list().len(), 1);
        assert_eq!(store.find_active("42"), Some(&reminder));
    }

    #[test]
    fn test_same_pair_replaces_previous_entry() {
        let (_, mut store) = store();
        let now = Utc::now();
        let reservation = reservation_at("42", now + Duration::hours(2));

        store
            .schedule_for_reservation(&reservation, LeadTime::FifteenMinutes, now)
            .unwrap();
        let moved = reservation_at("42", now + Duration::hours(3));
        let second = store
            .schedule_for_reservation(&moved, LeadTime::FifteenMinutes, now)
            .unwrap();

        assert_eq!(store.list(), &[second]);
    }

    #[test]
    fn test_distinct_lead_times_coexist() {
        let (_, mut store) = store();
        let now = Utc::now();
        let reservation = reservation_at("42", now + Duration::hours(2));

        for lead in LeadTime::ALL {
            store.schedule_for_reservation(&reservation, lead, now).unwrap();
        }

        assert_eq!(store.list().len(), 4);
        assert!(store.cancel("42-30"));
        assert!(!store.cancel("42-30"));
        assert_eq!(store.list().len(), 3);
    }

    #[test]
    fn test_past_trigger_is_rejected_without_changes() {
        let (storage, mut store) = store();
        let now = Utc::now();
        let existing = reservation_at("7", now + Duration::hours(4));
        store
            .schedule_for_reservation(&existing, LeadTime::OneHour, now)
            .unwrap();
        let snapshot = storage.get(REMINDERS_KEY).unwrap();

        // starts in ten minutes: a 15 minute reminder would already be late
        let soon = reservation_at("8", now + Duration::minutes(10));
        let err = store
            .schedule_for_reservation(&soon, LeadTime::FifteenMinutes, now)
            .unwrap_err();

        assert!(err.user_message().contains("already passed"));
        assert_eq!(store.list().len(), 1);
        assert_eq!(storage.get(REMINDERS_KEY).unwrap(), snapshot);
    }

    #[test]
    fn test_missing_or_invalid_times_are_rejected() {
        let (_, mut store) = store();
        let now = Utc::now();

        let mut no_start = reservation_at("1", now + Duration::hours(3));
        no_start.start_time = None;
        let err = store
            .schedule_for_reservation(&no_start, LeadTime::FiveMinutes, now)
            .unwrap_err();
        assert!(err.user_message().contains("no date or start time"));

        let mut bad_date = reservation_at("2", now + Duration::hours(3));
        bad_date.date = "mañana".to_string();
        let err = store
            .schedule_for_reservation(&bad_date, LeadTime::FiveMinutes, now)
            .unwrap_err();
        assert!(err.user_message().contains("invalid date or time"));

        assert!(store.list().is_empty());
    }

    #[test]
    fn test_take_due_fires_once_and_purges() {
        let (storage, mut store) = store();
        let now = Utc::now();
        let reservation = reservation_at("42", now + Duration::hours(1));
        let due = store
            .schedule_for_reservation(&reservation, LeadTime::OneHour, now - Duration::minutes(1))
            .unwrap();
        store
            .schedule_for_reservation(&reservation, LeadTime::FiveMinutes, now)
            .unwrap();

        let fired = store.take_due(now + Duration::seconds(1));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].id, due.id);
        assert!(fired[0].fired);

        assert!(store.take_due(now + Duration::seconds(2)).is_empty());
        assert_eq!(store.list().len(), 1);
        assert!(store.list().iter().all(|r| !r.fired));

        let reopened = ReminderStore::new(storage);
        assert_eq!(reopened.list(), store.list());
    }

    #[test]
    fn test_find_active_ignores_fired_entries() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        storage
            .set(
                REMINDERS_KEY,
                r#"[{"id":"9-5","reservationId":"9","triggerAt":1000,"minutesBefore":5,"roomLabel":"Lab","date":"2026-01-01","fired":true}]"#,
            )
            .unwrap();
        let store = ReminderStore::new(storage);
        assert_eq!(store.list().len(), 1);
        assert!(store.find_active("9").is_none());
        assert!(store.next_trigger().is_none());
    }

    #[test]
    fn test_corrupt_collection_is_cleared() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        storage.set(REMINDERS_KEY, "[{\"id\":").unwrap();
        let store = ReminderStore::new(storage.clone());
        assert!(store.list().is_empty());
        assert!(storage.get(REMINDERS_KEY).unwrap().is_none());

        // lead times outside the closed set make the record corrupt too
        storage
            .set(
                REMINDERS_KEY,
                r#"[{"id":"9-7","reservationId":"9","triggerAt":1000,"minutesBefore":7,"roomLabel":"Lab","date":"2026-01-01"}]"#,
            )
            .unwrap();
        assert!(ReminderStore::new(storage).list().is_empty());
    }

    #[test]
    fn test_well_formed_collection_round_trips() {
        let record = r#"[{"id":"9-15","reservationId":"9","triggerAt":1767261600000,"minutesBefore":15,"roomLabel":"Lab","date":"2026-01-01","startTime":"10:15","fired":false}]"#;
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        storage.set(REMINDERS_KEY, record).unwrap();
        let store = ReminderStore::new(storage);
        assert_eq!(serde_json::to_string(store.list()).unwrap(), record);
    }

    #[test]
    fn test_storage_failures_are_silent() {
        let mut store = ReminderStore::new(Arc::new(FailingStorage));
        let now = Utc::now();
        let reservation = reservation_at("5", now + Duration::hours(1));

        let reminder = store
            .schedule_for_reservation(&reservation, LeadTime::ThirtyMinutes, now)
            .unwrap();
        assert_eq!(store.find_active("5"), Some(&reminder));
        assert!(!store.is_saved());
    }

    #[test]
    fn test_successful_write_is_reported_saved() {
        let (storage, mut store) = store();
        let now = Utc::now();
        let reservation = reservation_at("6", now + Duration::hours(1));

        store
            .schedule_for_reservation(&reservation, LeadTime::FiveMinutes, now)
            .unwrap();
        assert!(store.is_saved());
        assert!(storage.get(REMINDERS_KEY).unwrap().is_some());
    }

    #[test]
    fn test_message_format() {
        let reminder = LocalReminder {
            id: "1-5".to_string(),
            reservation_id: "1".to_string(),
            trigger_at: Utc::now(),
            minutes_before: LeadTime::FiveMinutes,
            room_label: "Laboratorio".to_string(),
            date: "2026-03-02".to_string(),
            start_time: Some("10:00:00".to_string()),
            fired: false,
        };
        assert_eq!(
            reminder.message(),
            "Reservation in Laboratorio at 10:00 (2026-03-02)"
        );
    }

    #[test]
    fn test_lead_time_closed_set() {
        assert_eq!(LeadTime::try_from(60), Ok(LeadTime::OneHour));
        assert!(LeadTime::try_from(10).is_err());
        assert_eq!(LeadTime::FifteenMinutes.to_string(), "15 min");
    }
}
