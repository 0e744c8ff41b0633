//! Client profiles and their derived appointment status.
//!
//! A client's status is never stored. It is computed from the three summary
//! timestamps every time it is displayed, so the list view, the detail view,
//! and the dashboard counters always agree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Appointment summary ─────────────────────────────────────────────────────

/// The three nullable appointment timestamps carried on every client.
///
/// These are a denormalised summary of the client's appointments; the store
/// recomputes them whenever an appointment is written (see
/// [`crate::appointment::summarize`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentSummary {
  pub first_visit_date:      Option<DateTime<Utc>>,
  pub last_appointment_date: Option<DateTime<Utc>>,
  pub next_appointment_date: Option<DateTime<Utc>>,
}

/// Display status of a client.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ClientStatus {
  HasUpcomingAppointment,
  NoUpcomingAppointment,
}

impl ClientStatus {
  pub fn is_upcoming(self) -> bool { matches!(self, Self::HasUpcomingAppointment) }
}

impl AppointmentSummary {
  /// Status as of `now`. An appointment scheduled exactly at `now` still
  /// counts as upcoming.
  pub fn status_at(&self, now: DateTime<Utc>) -> ClientStatus {
    match self.next_appointment_date {
      Some(next) if next >= now => ClientStatus::HasUpcomingAppointment,
      _ => ClientStatus::NoUpcomingAppointment,
    }
  }

  pub fn status(&self) -> ClientStatus { self.status_at(Utc::now()) }
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// A client profile as stored. The login credential lives beside it in the
/// store and is never part of this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
  pub id:         Uuid,
  pub name:       String,
  pub email:      String,
  pub phone:      Option<String>,
  pub avatar_url: Option<String>,
  pub notes:      Option<String>,
  pub created_at: DateTime<Utc>,
  #[serde(flatten)]
  pub summary:    AppointmentSummary,
}

impl Client {
  pub fn status_at(&self, now: DateTime<Utc>) -> ClientStatus {
    self.summary.status_at(now)
  }
}

/// A client together with its status, as returned by the admin client list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientWithStatus {
  #[serde(flatten)]
  pub client: Client,
  pub status: ClientStatus,
}

impl ClientWithStatus {
  pub fn at(client: Client, now: DateTime<Utc>) -> Self {
    let status = client.status_at(now);
    Self { client, status }
  }
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Input to [`crate::store::PortalStore::create_client`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewClient {
  pub name:  String,
  pub email: String,
  #[serde(default)]
  pub phone: Option<String>,
}

impl NewClient {
  /// Trim fields, lower-case the email, and reject obviously bad input.
  pub fn normalized(self) -> Result<Self> {
    let name = self.name.trim().to_owned();
    if name.is_empty() {
      return Err(Error::Invalid {
        field:  "name",
        reason: "must not be blank".into(),
      });
    }
    let email = self.email.trim().to_lowercase();
    match email.split_once('@') {
      Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
      _ => {
        return Err(Error::Invalid {
          field:  "email",
          reason: format!("{email:?} is not an email address"),
        });
      }
    }
    let phone = self
      .phone
      .map(|p| p.trim().to_owned())
      .filter(|p| !p.is_empty());
    Ok(Self { name, email, phone })
  }
}

/// Partial edit of a client profile. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientPatch {
  pub name:       Option<String>,
  pub phone:      Option<String>,
  pub avatar_url: Option<String>,
  pub notes:      Option<String>,
}

/// Login credentials handed back once, at provisioning time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
  pub email:    String,
  pub password: String,
}
