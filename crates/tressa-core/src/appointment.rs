//! Appointments and the derivation of a client's summary dates from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, client::AppointmentSummary};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
  pub id:           Uuid,
  pub client_id:    Uuid,
  pub scheduled_at: DateTime<Utc>,
  /// Free-text type, e.g. "diagnosis" or "treatment".
  pub kind:         String,
  pub completed:    bool,
  pub notes:        Option<String>,
}

/// Input to [`crate::store::PortalStore::create_appointment`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewAppointment {
  pub scheduled_at: DateTime<Utc>,
  pub kind:         String,
  #[serde(default)]
  pub notes:        Option<String>,
}

impl NewAppointment {
  pub fn validated(self) -> Result<Self> {
    if self.kind.trim().is_empty() {
      return Err(Error::Invalid {
        field:  "kind",
        reason: "must not be blank".into(),
      });
    }
    Ok(self)
  }
}

/// Recompute a client's summary dates from its full appointment list.
///
/// Completed appointments feed `first_visit_date` / `last_appointment_date`;
/// the earliest pending appointment at or after `now` becomes
/// `next_appointment_date`.
pub fn summarize(appointments: &[Appointment], now: DateTime<Utc>) -> AppointmentSummary {
  let completed = appointments.iter().filter(|a| a.completed).map(|a| a.scheduled_at);
  let first_visit_date = completed.clone().min();
  let last_appointment_date = completed.max();
  let next_appointment_date = appointments
    .iter()
    .filter(|a| !a.completed && a.scheduled_at >= now)
    .map(|a| a.scheduled_at)
    .min();

  AppointmentSummary {
    first_visit_date,
    last_appointment_date,
    next_appointment_date,
  }
}
