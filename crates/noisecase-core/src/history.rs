//! Case history: one snapshot per case save.
//!
//! Snapshots are never updated. Edits are reconstructed on read by comparing
//! each snapshot with the previous one for the same case.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::{
  case::{Estate, Location, NoiseKind},
  id::{CaseId, HistoryId, UserId},
};

/// The audited fields of a case at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSnapshot {
  pub kind:        NoiseKind,
  pub kind_other:  Option<String>,
  pub location:    Location,
  pub ward:        Option<String>,
  pub estate:      Estate,
  pub assigned:    Option<UserId>,
  pub closed:      bool,
  pub merged_into: Option<CaseId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalCase {
  pub history_id:   HistoryId,
  pub case_id:      CaseId,
  pub history_date: DateTime<Utc>,
  /// `None` for system changes such as auto-assignment.
  pub history_user: Option<UserId>,
  pub snapshot:     CaseSnapshot,
}

/// An audited case field.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CaseField {
  Kind,
  KindOther,
  Location,
  Ward,
  Estate,
  Assigned,
  Closed,
  MergedInto,
}

impl CaseField {
  pub const ALL: [CaseField; 8] = [
    Self::Kind,
    Self::KindOther,
    Self::Location,
    Self::Ward,
    Self::Estate,
    Self::Assigned,
    Self::Closed,
    Self::MergedInto,
  ];

  /// Fields shown as plain "edited" entries. The rest have dedicated
  /// timeline events (or, for `merged_into`, come from the merge ledger).
  pub fn is_generic(self) -> bool {
    !matches!(self, Self::Assigned | Self::Closed | Self::MergedInto)
  }
}

impl CaseSnapshot {
  /// Display form of one field; `None` for an empty value.
  pub fn display(&self, field: CaseField) -> Option<String> {
    match field {
      CaseField::Kind => Some(self.kind.label().to_owned()),
      CaseField::KindOther => self.kind_other.clone(),
      CaseField::Location => Some(self.location.to_string()),
      CaseField::Ward => self.ward.clone(),
      CaseField::Estate => Some(self.estate.to_string()),
      CaseField::Assigned => self.assigned.map(|u| u.to_string()),
      CaseField::Closed => Some(if self.closed { "closed" } else { "open" }.into()),
      CaseField::MergedInto => self.merged_into.map(|c| c.to_string()),
    }
  }

  /// Fields whose values differ between `self` and `newer`.
  pub fn changed_fields(&self, newer: &CaseSnapshot) -> Vec<CaseField> {
    CaseField::ALL
      .into_iter()
      .filter(|&f| match f {
        CaseField::Kind => self.kind != newer.kind,
        CaseField::KindOther => self.kind_other != newer.kind_other,
        CaseField::Location => self.location != newer.location,
        CaseField::Ward => self.ward != newer.ward,
        CaseField::Estate => self.estate != newer.estate,
        CaseField::Assigned => self.assigned != newer.assigned,
        CaseField::Closed => self.closed != newer.closed,
        CaseField::MergedInto => self.merged_into != newer.merged_into,
      })
      .collect()
  }
}

/// A single field change, with display values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
  pub field: CaseField,
  pub old:   Option<String>,
  pub new:   Option<String>,
}

/// The difference between one snapshot and the one before it.
#[derive(Debug, Clone)]
pub struct SnapshotDiff<'a> {
  pub previous: &'a HistoricalCase,
  pub current:  &'a HistoricalCase,
  pub fields:   Vec<CaseField>,
}

impl SnapshotDiff<'_> {
  pub fn change(&self, field: CaseField) -> FieldChange {
    FieldChange {
      field,
      old: self.previous.snapshot.display(field),
      new: self.current.snapshot.display(field),
    }
  }
}

/// Pair every snapshot with its predecessor for the same case and report the
/// changed fields. The first snapshot of each case (creation) has no
/// predecessor and yields nothing; saves that changed no audited field are
/// skipped.
pub fn consecutive_diffs(history: &[HistoricalCase]) -> Vec<SnapshotDiff<'_>> {
  let mut by_case: BTreeMap<CaseId, Vec<&HistoricalCase>> = BTreeMap::new();
  for h in history {
    by_case.entry(h.case_id).or_default().push(h);
  }

  let mut diffs = Vec::new();
  for rows in by_case.values_mut() {
    rows.sort_by_key(|h| h.history_id);
    for pair in rows.windows(2) {
      let fields = pair[0].snapshot.changed_fields(&pair[1].snapshot);
      if fields.is_empty() {
        continue;
      }
      diffs.push(SnapshotDiff { previous: pair[0], current: pair[1], fields });
    }
  }
  diffs
}
