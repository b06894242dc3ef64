//! The merge ledger: append-only merge and unmerge events between cases.
//!
//! Records are never updated or deleted. Whether a pair is currently merged
//! is decided by the latest record for that (mergee, merged_into) pair, where
//! "latest" means highest record id. The `time` field is user-supplied and may
//! be backdated, so it never decides which record is in effect.
//!
//! [`MergeLedger`] is built from the whole ledger in one read and answers
//! pair queries and the backward closure ("which cases has this case moved
//! into over time") in process.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{CaseId, MergeRecordId, UserId};

// ─── Records ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRecord {
  pub merge_id:    MergeRecordId,
  /// The case being merged away.
  pub mergee:      CaseId,
  /// The destination.
  pub merged_into: CaseId,
  /// `true` if this record reverses an earlier merge of the same pair.
  pub unmerge:     bool,
  /// When the merge took effect.
  pub time:        DateTime<Utc>,
  pub created:     DateTime<Utc>,
  pub created_by:  UserId,
}

impl MergeRecord {
  pub fn involves(&self, case_id: CaseId) -> bool {
    self.mergee == case_id || self.merged_into == case_id
  }
}

/// Input to [`crate::store::CaseStore::record_merge`] and
/// [`crate::store::CaseStore::record_unmerge`].
#[derive(Debug, Clone)]
pub struct NewMergeRecord {
  pub mergee:      CaseId,
  pub merged_into: CaseId,
  pub actor:       UserId,
  pub time:        DateTime<Utc>,
}

/// One step of a backward closure: the case moved into `case_id` at `at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeHop {
  pub case_id: CaseId,
  pub at:      DateTime<Utc>,
}

/// The ordered destinations a case has moved into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopChain {
  pub hops:      Vec<MergeHop>,
  /// Set when the walk stopped because it would have revisited a case.
  pub truncated: bool,
}

impl HopChain {
  pub fn is_empty(&self) -> bool { self.hops.is_empty() }

  /// The case this chain currently ends at, if it moved at all.
  pub fn last(&self) -> Option<CaseId> { self.hops.last().map(|h| h.case_id) }
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

/// An in-memory view over the full merge ledger.
#[derive(Debug, Clone, Default)]
pub struct MergeLedger {
  /// Sorted by `merge_id`.
  records:        Vec<MergeRecord>,
  /// Index of the latest record for each (mergee, merged_into) pair.
  latest_by_pair: HashMap<(CaseId, CaseId), usize>,
  /// Index of the highest-id active merge for each mergee.
  current:        HashMap<CaseId, usize>,
}

impl MergeLedger {
  pub fn new(mut records: Vec<MergeRecord>) -> Self {
    records.sort_by_key(|r| r.merge_id);

    let mut latest_by_pair = HashMap::new();
    for (idx, r) in records.iter().enumerate() {
      latest_by_pair.insert((r.mergee, r.merged_into), idx);
    }

    let mut current: HashMap<CaseId, usize> = HashMap::new();
    for &idx in latest_by_pair.values() {
      let r = &records[idx];
      if r.unmerge {
        continue;
      }
      current
        .entry(r.mergee)
        .and_modify(|best| {
          if records[*best].merge_id < r.merge_id {
            *best = idx;
          }
        })
        .or_insert(idx);
    }

    Self { records, latest_by_pair, current }
  }

  pub fn records(&self) -> &[MergeRecord] { &self.records }

  pub fn len(&self) -> usize { self.records.len() }

  pub fn is_empty(&self) -> bool { self.records.is_empty() }

  /// `true` iff the latest record for the pair is a merge.
  pub fn is_pair_active(&self, mergee: CaseId, merged_into: CaseId) -> bool {
    self
      .latest_by_pair
      .get(&(mergee, merged_into))
      .is_some_and(|&idx| !self.records[idx].unmerge)
  }

  /// Like [`Self::is_pair_active`], but considering only records whose
  /// `time` is at or before `at`.
  pub fn is_pair_active_at(
    &self,
    mergee: CaseId,
    merged_into: CaseId,
    at: DateTime<Utc>,
  ) -> bool {
    self
      .records
      .iter()
      .rev()
      .find(|r| r.mergee == mergee && r.merged_into == merged_into && r.time <= at)
      .is_some_and(|r| !r.unmerge)
  }

  /// Merge records that have not since been unmerged, in id order.
  pub fn active_records(&self) -> impl Iterator<Item = &MergeRecord> {
    self.records.iter().enumerate().filter_map(|(idx, r)| {
      let latest = self.latest_by_pair.get(&(r.mergee, r.merged_into));
      (!r.unmerge && latest == Some(&idx)).then_some(r)
    })
  }

  /// The merge currently in effect for `mergee`: its highest-id active
  /// record.
  pub fn current_merge(&self, mergee: CaseId) -> Option<&MergeRecord> {
    self.current.get(&mergee).map(|&idx| &self.records[idx])
  }

  /// Records (merges and unmerges) where either side is in `case_ids`.
  pub fn involving<'a>(
    &'a self,
    case_ids: &'a HashSet<CaseId>,
  ) -> impl Iterator<Item = &'a MergeRecord> + 'a {
    self
      .records
      .iter()
      .filter(|r| case_ids.contains(&r.mergee) || case_ids.contains(&r.merged_into))
  }

  /// Backward closure for one case: starting from `case_id`, repeatedly
  /// follow the merge currently in effect, recording each destination with
  /// the time the hop took effect.
  ///
  /// A case is never revisited; if the ledger contains a cycle the walk stops
  /// at the repeated case and the chain is marked truncated.
  pub fn hops(&self, case_id: CaseId) -> HopChain {
    let mut chain = HopChain::default();
    let mut seen = HashSet::from([case_id]);
    let mut cursor = case_id;

    while let Some(record) = self.current_merge(cursor) {
      let next = record.merged_into;
      if !seen.insert(next) {
        tracing::warn!(
          case_id = %case_id,
          revisited = %next,
          "merge ledger contains a cycle; truncating backward closure"
        );
        chain.truncated = true;
        break;
      }
      chain.hops.push(MergeHop { case_id: next, at: record.time });
      cursor = next;
    }

    chain
  }

  /// Backward closure for a batch of cases.
  pub fn merged_into_cases(
    &self,
    case_ids: &[CaseId],
  ) -> BTreeMap<CaseId, HopChain> {
    case_ids.iter().map(|&id| (id, self.hops(id))).collect()
  }
}
