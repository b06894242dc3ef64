//! The case aggregate: one noise complaint investigation.
//!
//! A case is the only mutable record in the store. Its `merged_into` field is
//! a cached snapshot of the most recent active merge in the ledger (see
//! [`crate::merge`]); transitive merge targets are always computed, never
//! stored.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{
  history::CaseSnapshot,
  id::{CaseId, UserId},
};

// ─── Classification ──────────────────────────────────────────────────────────

/// The kind of noise being reported.
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
pub enum NoiseKind {
  Music,
  Diy,
  Dog,
  Alarm,
  Shouting,
  Tv,
  Road,
  CarAlarm,
  Construction,
  /// Free-text description lives in [`Case::kind_other`].
  Other,
}

impl NoiseKind {
  pub fn label(self) -> &'static str {
    match self {
      Self::Music => "Music",
      Self::Diy => "DIY",
      Self::Dog => "Dog barking",
      Self::Alarm => "Alarm",
      Self::Shouting => "Shouting",
      Self::Tv => "TV",
      Self::Road => "Road works",
      Self::CarAlarm => "Car alarm",
      Self::Construction => "Construction site",
      Self::Other => "Other",
    }
  }
}

/// Whether the source of the noise is on a housing estate. Estate cases are
/// routed by the estates team and never auto-assigned.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Estate {
  Yes,
  No,
  #[default]
  Unknown,
}

/// The kind of the most recent event recorded against a case.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LastUpdateType {
  Action,
  Complaint,
  Merge,
}

// ─── Location ────────────────────────────────────────────────────────────────

/// Where the noise is coming from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Location {
  /// A map point with a search radius in metres.
  Point { lat: f64, lon: f64, radius: u32 },
  /// A property from the address gazetteer.
  Address { uprn: String, address: String },
}

impl fmt::Display for Location {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Point { lat, lon, radius } => {
        write!(f, "{radius}m around {lat:.5}, {lon:.5}")
      }
      Self::Address { address, .. } => f.write_str(address),
    }
  }
}

// ─── Case ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
  pub case_id:          CaseId,
  pub kind:             NoiseKind,
  pub kind_other:       Option<String>,
  pub location:         Location,
  /// Administrative ward code, if the location could be resolved to one.
  pub ward:             Option<String>,
  pub estate:           Estate,
  pub closed:           bool,
  pub assigned:         Option<UserId>,
  /// Direct pointer to the case this one is currently merged into.
  pub merged_into:      Option<CaseId>,
  pub last_update_type: Option<LastUpdateType>,
  pub created:          DateTime<Utc>,
  pub created_by:       Option<UserId>,
  pub modified:         DateTime<Utc>,
  pub modified_by:      Option<UserId>,
}

impl Case {
  /// Human-readable kind, substituting the free-text value for `Other`.
  pub fn kind_display(&self) -> String {
    match (self.kind, self.kind_other.as_deref()) {
      (NoiseKind::Other, Some(other)) if !other.is_empty() => {
        format!("Other ({other})")
      }
      (kind, _) => kind.label().to_owned(),
    }
  }

  pub fn is_merged(&self) -> bool { self.merged_into.is_some() }

  /// The audited subset of fields, as recorded in case history.
  pub fn snapshot(&self) -> CaseSnapshot {
    CaseSnapshot {
      kind:        self.kind,
      kind_other:  self.kind_other.clone(),
      location:    self.location.clone(),
      ward:        self.ward.clone(),
      estate:      self.estate,
      assigned:    self.assigned,
      closed:      self.closed,
      merged_into: self.merged_into,
    }
  }
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Input to [`crate::store::CaseStore::create_case`].
#[derive(Debug, Clone)]
pub struct NewCase {
  pub kind:       NoiseKind,
  pub kind_other: Option<String>,
  pub location:   Location,
  pub ward:       Option<String>,
  pub estate:     Estate,
  pub assigned:   Option<UserId>,
  /// The submitting user; added as the first follower.
  pub created_by: Option<UserId>,
}

impl NewCase {
  pub fn new(kind: NoiseKind, location: Location) -> Self {
    Self {
      kind,
      kind_other: None,
      location,
      ward: None,
      estate: Estate::default(),
      assigned: None,
      created_by: None,
    }
  }
}

/// A partial update of the editable case fields. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct CaseEdit {
  pub kind:       Option<NoiseKind>,
  pub kind_other: Option<Option<String>>,
  pub location:   Option<Location>,
  pub ward:       Option<Option<String>>,
  pub estate:     Option<Estate>,
}

impl CaseEdit {
  pub fn is_empty(&self) -> bool {
    self.kind.is_none()
      && self.kind_other.is_none()
      && self.location.is_none()
      && self.ward.is_none()
      && self.estate.is_none()
  }

  /// Apply the edit in place. Returns `true` if any field changed.
  pub fn apply(&self, case: &mut Case) -> bool {
    let before = case.snapshot();
    if let Some(kind) = self.kind {
      case.kind = kind;
    }
    if let Some(other) = &self.kind_other {
      case.kind_other = other.clone();
    }
    if let Some(location) = &self.location {
      case.location = location.clone();
    }
    if let Some(ward) = &self.ward {
      case.ward = ward.clone();
    }
    if let Some(estate) = self.estate {
      case.estate = estate;
    }
    before != case.snapshot()
  }
}
