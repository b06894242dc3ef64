//! Encoding and decoding helpers between domain types and the plain values
//! stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`
//! suffix), so string order is chronological order. Closed enums use their
//! snake_case names; `Location` and file lists are compact JSON.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use noisecase_core::{
  ActionId, CaseId, ComplaintId, HistoryId, MergeRecordId, UserId,
  case::{Case, Location},
  event::{Action, ActionType, Complaint},
  history::{CaseSnapshot, HistoricalCase},
  merge::MergeRecord,
  notify::Notification,
  user::User,
};

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

/// Decode a strum-backed enum column.
pub fn decode_enum<T: FromStr>(column: &'static str, s: &str) -> Result<T> {
  s.parse().map_err(|_| Error::Decode { column, value: s.to_owned() })
}

pub fn encode_location(location: &Location) -> Result<String> {
  Ok(serde_json::to_string(location)?)
}

pub fn decode_location(s: &str) -> Result<Location> { Ok(serde_json::from_str(s)?) }

pub fn encode_files(files: &[String]) -> Result<String> {
  Ok(serde_json::to_string(files)?)
}

/// `?, ?, ?` with `n` placeholders, for `IN (...)` clauses.
pub fn placeholders(n: usize) -> String { vec!["?"; n].join(", ") }

// ─── Column lists ────────────────────────────────────────────────────────────

pub const USER_COLUMNS: &str = "user_id, name, email, is_staff, notify";

pub const CASE_COLUMNS: &str = "case_id, kind, kind_other, location, ward, \
  estate, closed, assigned, merged_into, last_update_type, created, \
  created_by, modified, modified_by";

pub const MERGE_COLUMNS: &str =
  "merge_id, mergee, merged_into, unmerge, time, created, created_by";

pub const ACTION_COLUMNS: &str = "action_id, case_id, type_name, visibility, \
  notes, files, time, case_old, created, created_by";

pub const COMPLAINT_COLUMNS: &str = "complaint_id, case_id, reporter, \
  period_start, period_end, happening_now, description, effect, created";

pub const HISTORY_COLUMNS: &str = "history_id, case_id, history_date, \
  history_user, kind, kind_other, location, ward, estate, assigned, closed, \
  merged_into";

pub const NOTIFICATION_COLUMNS: &str = "recipient, case_id, channel, message";

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read from a `users` row.
pub struct RawUser {
  pub user_id:  i64,
  pub name:     String,
  pub email:    Option<String>,
  pub is_staff: bool,
  pub notify:   bool,
}

impl RawUser {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:  row.get(0)?,
      name:     row.get(1)?,
      email:    row.get(2)?,
      is_staff: row.get(3)?,
      notify:   row.get(4)?,
    })
  }

  pub fn into_user(self) -> User {
    User {
      user_id:  UserId(self.user_id),
      name:     self.name,
      email:    self.email,
      is_staff: self.is_staff,
      notify:   self.notify,
    }
  }
}

/// Raw values read from a `cases` row.
pub struct RawCase {
  pub case_id:          i64,
  pub kind:             String,
  pub kind_other:       Option<String>,
  pub location:         String,
  pub ward:             Option<String>,
  pub estate:           String,
  pub closed:           bool,
  pub assigned:         Option<i64>,
  pub merged_into:      Option<i64>,
  pub last_update_type: Option<String>,
  pub created:          String,
  pub created_by:       Option<i64>,
  pub modified:         String,
  pub modified_by:      Option<i64>,
}

impl RawCase {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      case_id:          row.get(0)?,
      kind:             row.get(1)?,
      kind_other:       row.get(2)?,
      location:         row.get(3)?,
      ward:             row.get(4)?,
      estate:           row.get(5)?,
      closed:           row.get(6)?,
      assigned:         row.get(7)?,
      merged_into:      row.get(8)?,
      last_update_type: row.get(9)?,
      created:          row.get(10)?,
      created_by:       row.get(11)?,
      modified:         row.get(12)?,
      modified_by:      row.get(13)?,
    })
  }

  pub fn into_case(self) -> Result<Case> {
    Ok(Case {
      case_id:          CaseId(self.case_id),
      kind:             decode_enum("cases.kind", &self.kind)?,
      kind_other:       self.kind_other,
      location:         decode_location(&self.location)?,
      ward:             self.ward,
      estate:           decode_enum("cases.estate", &self.estate)?,
      closed:           self.closed,
      assigned:         self.assigned.map(UserId),
      merged_into:      self.merged_into.map(CaseId),
      last_update_type: self
        .last_update_type
        .as_deref()
        .map(|s| decode_enum("cases.last_update_type", s))
        .transpose()?,
      created:          decode_dt(&self.created)?,
      created_by:       self.created_by.map(UserId),
      modified:         decode_dt(&self.modified)?,
      modified_by:      self.modified_by.map(UserId),
    })
  }
}

/// Raw values read from a `merge_records` row.
pub struct RawMergeRecord {
  pub merge_id:    i64,
  pub mergee:      i64,
  pub merged_into: i64,
  pub unmerge:     bool,
  pub time:        String,
  pub created:     String,
  pub created_by:  i64,
}

impl RawMergeRecord {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      merge_id:    row.get(0)?,
      mergee:      row.get(1)?,
      merged_into: row.get(2)?,
      unmerge:     row.get(3)?,
      time:        row.get(4)?,
      created:     row.get(5)?,
      created_by:  row.get(6)?,
    })
  }

  pub fn into_record(self) -> Result<MergeRecord> {
    Ok(MergeRecord {
      merge_id:    MergeRecordId(self.merge_id),
      mergee:      CaseId(self.mergee),
      merged_into: CaseId(self.merged_into),
      unmerge:     self.unmerge,
      time:        decode_dt(&self.time)?,
      created:     decode_dt(&self.created)?,
      created_by:  UserId(self.created_by),
    })
  }
}

/// Raw values read from an `actions` row.
pub struct RawAction {
  pub action_id:  i64,
  pub case_id:    i64,
  pub type_name:  String,
  pub visibility: String,
  pub notes:      String,
  pub files:      String,
  pub time:       String,
  pub case_old:   Option<i64>,
  pub created:    String,
  pub created_by: i64,
}

impl RawAction {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      action_id:  row.get(0)?,
      case_id:    row.get(1)?,
      type_name:  row.get(2)?,
      visibility: row.get(3)?,
      notes:      row.get(4)?,
      files:      row.get(5)?,
      time:       row.get(6)?,
      case_old:   row.get(7)?,
      created:    row.get(8)?,
      created_by: row.get(9)?,
    })
  }

  pub fn into_action(self) -> Result<Action> {
    Ok(Action {
      action_id:   ActionId(self.action_id),
      case_id:     CaseId(self.case_id),
      action_type: ActionType {
        name:       self.type_name,
        visibility: decode_enum("actions.visibility", &self.visibility)?,
      },
      notes:       self.notes,
      files:       serde_json::from_str(&self.files)?,
      time:        decode_dt(&self.time)?,
      case_old:    self.case_old.map(CaseId),
      created:     decode_dt(&self.created)?,
      created_by:  UserId(self.created_by),
    })
  }
}

/// Raw values read from a `complaints` row.
pub struct RawComplaint {
  pub complaint_id:  i64,
  pub case_id:       i64,
  pub reporter:      i64,
  pub start:         String,
  pub end:           String,
  pub happening_now: bool,
  pub description:   String,
  pub effect:        Option<String>,
  pub created:       String,
}

impl RawComplaint {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      complaint_id:  row.get(0)?,
      case_id:       row.get(1)?,
      reporter:      row.get(2)?,
      start:         row.get(3)?,
      end:           row.get(4)?,
      happening_now: row.get(5)?,
      description:   row.get(6)?,
      effect:        row.get(7)?,
      created:       row.get(8)?,
    })
  }

  pub fn into_complaint(self) -> Result<Complaint> {
    Ok(Complaint {
      complaint_id:  ComplaintId(self.complaint_id),
      case_id:       CaseId(self.case_id),
      reporter:      UserId(self.reporter),
      start:         decode_dt(&self.start)?,
      end:           decode_dt(&self.end)?,
      happening_now: self.happening_now,
      description:   self.description,
      effect:        self.effect,
      created:       decode_dt(&self.created)?,
    })
  }
}

/// Raw values read from a `case_history` row.
pub struct RawHistory {
  pub history_id:   i64,
  pub case_id:      i64,
  pub history_date: String,
  pub history_user: Option<i64>,
  pub kind:         String,
  pub kind_other:   Option<String>,
  pub location:     String,
  pub ward:         Option<String>,
  pub estate:       String,
  pub assigned:     Option<i64>,
  pub closed:       bool,
  pub merged_into:  Option<i64>,
}

impl RawHistory {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      history_id:   row.get(0)?,
      case_id:      row.get(1)?,
      history_date: row.get(2)?,
      history_user: row.get(3)?,
      kind:         row.get(4)?,
      kind_other:   row.get(5)?,
      location:     row.get(6)?,
      ward:         row.get(7)?,
      estate:       row.get(8)?,
      assigned:     row.get(9)?,
      closed:       row.get(10)?,
      merged_into:  row.get(11)?,
    })
  }

  pub fn into_history(self) -> Result<HistoricalCase> {
    Ok(HistoricalCase {
      history_id:   HistoryId(self.history_id),
      case_id:      CaseId(self.case_id),
      history_date: decode_dt(&self.history_date)?,
      history_user: self.history_user.map(UserId),
      snapshot:     CaseSnapshot {
        kind:        decode_enum("case_history.kind", &self.kind)?,
        kind_other:  self.kind_other,
        location:    decode_location(&self.location)?,
        ward:        self.ward,
        estate:      decode_enum("case_history.estate", &self.estate)?,
        assigned:    self.assigned.map(UserId),
        closed:      self.closed,
        merged_into: self.merged_into.map(CaseId),
      },
    })
  }
}

/// Raw values read from a `notifications` row.
pub struct RawNotification {
  pub recipient: i64,
  pub case_id:   i64,
  pub channel:   String,
  pub message:   String,
}

impl RawNotification {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      recipient: row.get(0)?,
      case_id:   row.get(1)?,
      channel:   row.get(2)?,
      message:   row.get(3)?,
    })
  }

  pub fn into_notification(self) -> Result<Notification> {
    Ok(Notification {
      recipient: UserId(self.recipient),
      case_id:   CaseId(self.case_id),
      message:   self.message,
      channel:   decode_enum("notifications.channel", &self.channel)?,
    })
  }
}
