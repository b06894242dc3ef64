//! Integer identifiers for persisted records.
//!
//! Every identifier is assigned by the store from an auto-incrementing
//! sequence, so numeric order is insertion order.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(
      Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
      Deserialize,
    )]
    #[serde(transparent)]
    pub struct $name(pub i64);

    impl $name {
      pub fn get(self) -> i64 { self.0 }
    }

    impl From<i64> for $name {
      fn from(v: i64) -> Self { Self(v) }
    }

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
      }
    }
  };
}

id_type!(
  /// Identifies a case.
  CaseId
);
id_type!(
  /// Identifies a staff member or reporter.
  UserId
);
id_type!(
  /// Identifies a merge ledger entry. Higher ids were inserted later.
  MergeRecordId
);
id_type!(ActionId);
id_type!(ComplaintId);
id_type!(
  /// Identifies a case history snapshot.
  HistoryId
);
