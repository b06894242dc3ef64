//! Actions and complaints: the per-case event streams.
//!
//! Both are append-only. An action carries a `time` that is distinct from its
//! creation timestamp, because staff often log visits after the fact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::id::{ActionId, CaseId, ComplaintId, UserId};

// ─── Visibility ──────────────────────────────────────────────────────────────

/// Who may see an action.
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
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Visibility {
  /// Shown to reporters as well as staff.
  Public,
  /// Shown to any staff member.
  Staff,
  /// Shown only on the full staff view; never leaves the case team.
  Internal,
}

impl Visibility {
  pub fn is_public(self) -> bool { matches!(self, Self::Public) }
}

/// A category of logged action, e.g. "Visit" or "Noise abatement notice".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionType {
  pub name:       String,
  pub visibility: Visibility,
}

impl ActionType {
  pub fn new(name: impl Into<String>, visibility: Visibility) -> Self {
    Self { name: name.into(), visibility }
  }

  pub fn public(name: impl Into<String>) -> Self {
    Self::new(name, Visibility::Public)
  }

  pub fn staff(name: impl Into<String>) -> Self {
    Self::new(name, Visibility::Staff)
  }

  pub fn internal(name: impl Into<String>) -> Self {
    Self::new(name, Visibility::Internal)
  }
}

// ─── Action ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
  pub action_id:   ActionId,
  pub case_id:     CaseId,
  pub action_type: ActionType,
  pub notes:       String,
  /// Stored file names of any attachments.
  pub files:       Vec<String>,
  /// When the action happened; may predate `created`.
  pub time:        DateTime<Utc>,
  /// Set when this action marks `case_old` being merged into `case_id`.
  pub case_old:    Option<CaseId>,
  pub created:     DateTime<Utc>,
  pub created_by:  UserId,
}

/// Input to [`crate::store::CaseStore::add_action`].
#[derive(Debug, Clone)]
pub struct NewAction {
  pub case_id:     CaseId,
  pub action_type: ActionType,
  pub notes:       String,
  pub files:       Vec<String>,
  /// Defaults to the time of recording.
  pub time:        Option<DateTime<Utc>>,
  pub case_old:    Option<CaseId>,
  pub actor:       UserId,
}

impl NewAction {
  pub fn new(case_id: CaseId, action_type: ActionType, actor: UserId) -> Self {
    Self {
      case_id,
      action_type,
      notes: String::new(),
      files: Vec::new(),
      time: None,
      case_old: None,
      actor,
    }
  }

  pub fn notes(mut self, notes: impl Into<String>) -> Self {
    self.notes = notes.into();
    self
  }

  pub fn at(mut self, time: DateTime<Utc>) -> Self {
    self.time = Some(time);
    self
  }

  /// Mark this action as recording `case_old` being merged into this case.
  pub fn merged_from(mut self, case_old: CaseId) -> Self {
    self.case_old = Some(case_old);
    self
  }
}

// ─── Complaint ───────────────────────────────────────────────────────────────

/// One occurrence of the noise, as reported by a resident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Complaint {
  pub complaint_id:  ComplaintId,
  pub case_id:       CaseId,
  pub reporter:      UserId,
  pub start:         DateTime<Utc>,
  pub end:           DateTime<Utc>,
  pub happening_now: bool,
  pub description:   String,
  /// How the noise is affecting the reporter.
  pub effect:        Option<String>,
  pub created:       DateTime<Utc>,
}

/// Input to [`crate::store::CaseStore::add_complaint`].
#[derive(Debug, Clone)]
pub struct NewComplaint {
  pub reporter:      UserId,
  pub start:         DateTime<Utc>,
  pub end:           DateTime<Utc>,
  pub happening_now: bool,
  pub description:   String,
  pub effect:        Option<String>,
}
