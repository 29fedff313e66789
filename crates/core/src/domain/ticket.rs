// Ticket Domain Model - the canonical status state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{DomainError, Result};
use super::service_type::ServiceTypeId;
use super::station::StationId;

/// Ticket ID (UUID v4, injected via IdProvider)
pub type TicketId = String;

/// Ticket status. Terminal states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketStatus {
    Waiting,
    Called,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl TicketStatus {
    /// Live tickets occupy a queue slot; terminal tickets are history.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            TicketStatus::Waiting | TicketStatus::Called | TicketStatus::InProgress
        )
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_live()
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TicketStatus::Waiting => write!(f, "Waiting"),
            TicketStatus::Called => write!(f, "Called"),
            TicketStatus::InProgress => write!(f, "InProgress"),
            TicketStatus::Completed => write!(f, "Completed"),
            TicketStatus::Cancelled => write!(f, "Cancelled"),
            TicketStatus::NoShow => write!(f, "NoShow"),
        }
    }
}

/// Ticket entity
///
/// `position` is the creation-order sequence within the service/day and is
/// the base of the ordering rank. Timestamps are monotone once set and never
/// precede `created_at`. Wait and service durations are derived functions of
/// the timestamps, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    /// Human-readable number, scoped per service per day (e.g. "L003")
    pub number: String,
    pub service_type_id: ServiceTypeId,
    pub patient_id: super::patient::PatientId,
    /// Snapshot of the patient's priority flag at creation time, so ordering
    /// never needs an external lookup while a queue lock is held.
    pub requires_priority: bool,
    pub station_id: Option<StationId>,
    pub status: TicketStatus,
    /// Queue position at creation time; always > 0
    pub position: i32,
    pub estimated_wait_minutes: u32,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub called_at: Option<DateTime<Utc>>,
    pub attended_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Ticket {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        number: impl Into<String>,
        service_type_id: ServiceTypeId,
        patient_id: impl Into<String>,
        requires_priority: bool,
        position: i32,
        estimated_wait_minutes: u32,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        if position <= 0 {
            return Err(DomainError::InvalidPosition(position));
        }
        Ok(Self {
            id: id.into(),
            number: number.into(),
            service_type_id,
            patient_id: patient_id.into(),
            requires_priority,
            station_id: None,
            status: TicketStatus::Waiting,
            position,
            estimated_wait_minutes,
            notes: None,
            created_at,
            called_at: None,
            attended_at: None,
            completed_at: None,
        })
    }

    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }

    /// Waiting -> Called, bound to the calling station
    pub fn call(&mut self, station_id: StationId, now: DateTime<Utc>) -> Result<()> {
        if self.status != TicketStatus::Waiting {
            return Err(self.bad_transition(TicketStatus::Called));
        }
        self.status = TicketStatus::Called;
        self.called_at = Some(now);
        self.station_id = Some(station_id);
        Ok(())
    }

    /// Called -> InProgress
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status != TicketStatus::Called {
            return Err(self.bad_transition(TicketStatus::InProgress));
        }
        self.status = TicketStatus::InProgress;
        self.attended_at = Some(now);
        Ok(())
    }

    /// InProgress -> Completed
    pub fn complete(&mut self, notes: Option<&str>, now: DateTime<Utc>) -> Result<()> {
        if self.status != TicketStatus::InProgress {
            return Err(self.bad_transition(TicketStatus::Completed));
        }
        self.status = TicketStatus::Completed;
        self.completed_at = Some(now);
        if let Some(n) = notes {
            self.append_note(n);
        }
        Ok(())
    }

    /// Any live state -> Cancelled | NoShow
    ///
    /// A reason of "NoShow" (case-insensitive, also "no-show"/"no show")
    /// records the terminal state as NoShow, anything else as Cancelled.
    pub fn cancel(&mut self, reason: &str, now: DateTime<Utc>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(self.bad_transition(TicketStatus::Cancelled));
        }
        self.status = if is_no_show_reason(reason) {
            TicketStatus::NoShow
        } else {
            TicketStatus::Cancelled
        };
        self.completed_at = Some(now);
        self.append_note(reason);
        Ok(())
    }

    /// Called | InProgress -> Called at a new station
    ///
    /// An InProgress ticket reverts to Called and loses `attended_at`;
    /// attention must restart at the new station.
    pub fn transfer(&mut self, new_station_id: StationId) -> Result<()> {
        match self.status {
            TicketStatus::Called => {}
            TicketStatus::InProgress => {
                self.status = TicketStatus::Called;
                self.attended_at = None;
            }
            _ => return Err(self.bad_transition(TicketStatus::Called)),
        }
        self.station_id = Some(new_station_id);
        Ok(())
    }

    pub fn append_note(&mut self, note: &str) {
        if note.is_empty() {
            return;
        }
        self.notes = Some(match self.notes.take() {
            Some(existing) => format!("{} | {}", existing, note),
            None => note.to_string(),
        });
    }

    /// Minutes waited from creation until attention started (or until `now`
    /// while still waiting). Derived, never stored.
    pub fn actual_wait_minutes(&self, now: DateTime<Utc>) -> i64 {
        let end = self.attended_at.unwrap_or(now);
        (end - self.created_at).num_minutes().max(0)
    }

    /// Minutes in attention, available once completed. Derived, never stored.
    pub fn service_minutes(&self) -> Option<i64> {
        match (self.attended_at, self.completed_at) {
            (Some(attended), Some(completed)) => Some((completed - attended).num_minutes().max(0)),
            _ => None,
        }
    }

    fn bad_transition(&self, to: TicketStatus) -> DomainError {
        DomainError::InvalidStateTransition {
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }
}

fn is_no_show_reason(reason: &str) -> bool {
    let r = reason.trim();
    r.eq_ignore_ascii_case("noshow")
        || r.eq_ignore_ascii_case("no-show")
        || r.eq_ignore_ascii_case("no show")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 8, 0, 0).unwrap()
    }

    fn ticket() -> Ticket {
        Ticket::new("t-1", "L001", 1, "p-1", false, 1, 5, t0()).unwrap()
    }

    #[test]
    fn full_happy_path() {
        let mut t = ticket();
        let now = t0() + chrono::Duration::minutes(10);
        t.call(7, now).unwrap();
        assert_eq!(t.status, TicketStatus::Called);
        assert_eq!(t.station_id, Some(7));

        let attended = now + chrono::Duration::minutes(2);
        t.start(attended).unwrap();
        assert_eq!(t.status, TicketStatus::InProgress);

        let done = attended + chrono::Duration::minutes(15);
        t.complete(Some("blood drawn"), done).unwrap();
        assert_eq!(t.status, TicketStatus::Completed);
        assert_eq!(t.actual_wait_minutes(done), 12);
        assert_eq!(t.service_minutes(), Some(15));
        assert_eq!(t.notes.as_deref(), Some("blood drawn"));
    }

    #[test]
    fn cannot_skip_states() {
        let mut t = ticket();
        // Waiting -> Completed directly is rejected
        assert!(t.complete(None, t0()).is_err());
        // Waiting -> InProgress directly is rejected
        assert!(t.start(t0()).is_err());
        assert_eq!(t.status, TicketStatus::Waiting);
    }

    #[test]
    fn terminal_states_are_absorbing() {
        let mut t = ticket();
        t.cancel("patient left", t0()).unwrap();
        assert_eq!(t.status, TicketStatus::Cancelled);
        assert!(t.call(1, t0()).is_err());
        assert!(t.cancel("again", t0()).is_err());
    }

    #[test]
    fn no_show_reason_maps_to_no_show() {
        let mut t = ticket();
        t.cancel("NoShow", t0()).unwrap();
        assert_eq!(t.status, TicketStatus::NoShow);

        let mut t = ticket();
        t.cancel("no show", t0()).unwrap();
        assert_eq!(t.status, TicketStatus::NoShow);
    }

    #[test]
    fn transfer_in_progress_reverts_to_called() {
        let mut t = ticket();
        t.call(1, t0()).unwrap();
        t.start(t0()).unwrap();

        t.transfer(2).unwrap();
        assert_eq!(t.status, TicketStatus::Called);
        assert_eq!(t.station_id, Some(2));
        assert!(t.attended_at.is_none());
    }

    #[test]
    fn transfer_from_waiting_is_rejected() {
        let mut t = ticket();
        assert!(t.transfer(2).is_err());
    }

    #[test]
    fn position_must_be_positive() {
        assert!(Ticket::new("t", "L001", 1, "p", false, 0, 1, t0()).is_err());
    }
}
