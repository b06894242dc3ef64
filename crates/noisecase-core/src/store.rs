//! The `CaseStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `noisecase-store-sqlite`). The resolver, timeline and lifecycle layers
//! depend on this abstraction, not on any concrete backend.

use std::future::Future;

use crate::{
  case::{Case, CaseEdit, NewCase},
  event::{Action, Complaint, NewAction, NewComplaint},
  history::HistoricalCase,
  id::{CaseId, UserId},
  merge::{MergeRecord, NewMergeRecord},
  user::{NewUser, User},
};

/// Abstraction over a case store backend.
///
/// Merge records, actions, complaints and history snapshots are append-only.
/// Every write that touches more than one row (a merge record plus the case
/// pointer, an action plus the case's `last_update_type`) must commit
/// atomically.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait CaseStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Users ─────────────────────────────────────────────────────────────

  fn add_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: UserId,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Fetch several users at once. Unknown ids are skipped.
  fn get_users<'a>(
    &'a self,
    ids: &'a [UserId],
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + 'a;

  // ── Cases ─────────────────────────────────────────────────────────────

  /// Create a case, record its first history snapshot and add the creator
  /// as a follower.
  fn create_case(
    &self,
    input: NewCase,
  ) -> impl Future<Output = Result<Case, Self::Error>> + Send + '_;

  fn get_case(
    &self,
    id: CaseId,
  ) -> impl Future<Output = Result<Option<Case>, Self::Error>> + Send + '_;

  fn get_cases<'a>(
    &'a self,
    ids: &'a [CaseId],
  ) -> impl Future<Output = Result<Vec<Case>, Self::Error>> + Send + 'a;

  /// Apply an edit to the editable fields and record a history snapshot.
  fn edit_case(
    &self,
    id: CaseId,
    edit: CaseEdit,
    actor: Option<UserId>,
  ) -> impl Future<Output = Result<Case, Self::Error>> + Send + '_;

  /// Set (or clear) the assignee. A new assignee becomes a follower.
  fn set_assignee(
    &self,
    id: CaseId,
    assignee: Option<UserId>,
    actor: Option<UserId>,
  ) -> impl Future<Output = Result<Case, Self::Error>> + Send + '_;

  fn set_closed(
    &self,
    id: CaseId,
    closed: bool,
    actor: Option<UserId>,
  ) -> impl Future<Output = Result<Case, Self::Error>> + Send + '_;

  fn followers(
    &self,
    id: CaseId,
  ) -> impl Future<Output = Result<Vec<UserId>, Self::Error>> + Send + '_;

  fn add_follower(
    &self,
    id: CaseId,
    user: UserId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Merge ledger ──────────────────────────────────────────────────────

  /// Append a merge record, point the mergee at the target, snapshot the
  /// mergee and mark the target's last update as a merge, atomically.
  ///
  /// Returns an error if `mergee == merged_into`.
  fn record_merge(
    &self,
    input: NewMergeRecord,
  ) -> impl Future<Output = Result<MergeRecord, Self::Error>> + Send + '_;

  /// Append an unmerge record for the pair. The mergee's pointer is cleared
  /// only if it currently points at `merged_into`; the pair need not be
  /// merged for the record to be written.
  fn record_unmerge(
    &self,
    input: NewMergeRecord,
  ) -> impl Future<Output = Result<MergeRecord, Self::Error>> + Send + '_;

  /// `true` iff the most recently inserted record for the pair is a merge.
  fn is_pair_active(
    &self,
    mergee: CaseId,
    merged_into: CaseId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Every current `(mergee, merged_into)` pointer.
  fn merge_pointers(
    &self,
  ) -> impl Future<Output = Result<Vec<(CaseId, CaseId)>, Self::Error>> + Send + '_;

  /// The whole ledger in insertion order.
  fn merge_ledger(
    &self,
  ) -> impl Future<Output = Result<Vec<MergeRecord>, Self::Error>> + Send + '_;

  // ── Events ────────────────────────────────────────────────────────────

  /// Record an action. Unless the action is backdated before the case's
  /// `modified` time, the case's last update becomes an action.
  fn add_action(
    &self,
    input: NewAction,
  ) -> impl Future<Output = Result<Action, Self::Error>> + Send + '_;

  /// Record a complaint and mark the case's last update as a complaint.
  fn add_complaint(
    &self,
    case_id: CaseId,
    input: NewComplaint,
  ) -> impl Future<Output = Result<Complaint, Self::Error>> + Send + '_;

  fn actions_for<'a>(
    &'a self,
    case_ids: &'a [CaseId],
  ) -> impl Future<Output = Result<Vec<Action>, Self::Error>> + Send + 'a;

  fn complaints_for<'a>(
    &'a self,
    case_ids: &'a [CaseId],
  ) -> impl Future<Output = Result<Vec<Complaint>, Self::Error>> + Send + 'a;

  fn history_for<'a>(
    &'a self,
    case_ids: &'a [CaseId],
  ) -> impl Future<Output = Result<Vec<HistoricalCase>, Self::Error>> + Send + 'a;
}
