//! The case lifecycle controller.
//!
//! [`CaseLifecycle`] is the entry point for state-changing operations:
//! submission (with auto-assignment), merge, unmerge, assignment, edits and
//! closure. Every call takes the acting user explicitly. Store writes are
//! atomic per operation; notifications go out afterwards and are
//! best-effort.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{
  Error, Result,
  case::{Case, CaseEdit, Estate, NewCase},
  event::{Action, Complaint, NewAction, NewComplaint},
  id::{CaseId, UserId},
  merge::{MergeRecord, NewMergeRecord},
  notify::{Channel, Notification, Notifier},
  store::CaseStore,
  view::CaseView,
};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Routing settings for new cases.
#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleConfig {
  /// Ward code → the staff member who takes new cases in that ward.
  #[serde(default)]
  pub ward_principals: HashMap<String, UserId>,
  #[serde(default = "default_auto_assign")]
  pub auto_assign:     bool,
}

fn default_auto_assign() -> bool { true }

impl Default for LifecycleConfig {
  fn default() -> Self {
    Self { ward_principals: HashMap::new(), auto_assign: true }
  }
}

// ─── Controller ──────────────────────────────────────────────────────────────

pub struct CaseLifecycle<S, N> {
  store:    Arc<S>,
  notifier: Arc<N>,
  config:   Arc<LifecycleConfig>,
}

impl<S, N> Clone for CaseLifecycle<S, N> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      notifier: Arc::clone(&self.notifier),
      config:   Arc::clone(&self.config),
    }
  }
}

impl<S, N> CaseLifecycle<S, N>
where
  S: CaseStore,
  N: Notifier,
  Error: From<S::Error>,
{
  pub fn new(store: Arc<S>, notifier: Arc<N>, config: LifecycleConfig) -> Self {
    Self { store, notifier, config: Arc::new(config) }
  }

  pub fn store(&self) -> &S { &self.store }

  async fn require_case(&self, id: CaseId) -> Result<Case> {
    self
      .store
      .get_case(id)
      .await?
      .ok_or(Error::CaseNotFound(id))
  }

  // ── Submission ────────────────────────────────────────────────────────

  /// Create a case from a report together with its first complaint, then
  /// auto-assign it if its ward has a principal.
  pub async fn submit(
    &self,
    case: NewCase,
    complaint: NewComplaint,
  ) -> Result<(Case, Complaint)> {
    let created = self.store.create_case(case).await?;
    let complaint = self
      .store
      .add_complaint(created.case_id, complaint)
      .await?;

    let case = match self.auto_assign(&created).await? {
      Some(assigned) => assigned,
      None => created,
    };
    tracing::info!(case_id = %case.case_id, "case submitted");
    Ok((case, complaint))
  }

  /// Assign `case` to its ward principal and email them.
  ///
  /// No-op (returns `None`) if auto-assignment is disabled, the case is
  /// already assigned, is on an estate, has no ward, or the ward has no
  /// principal configured.
  pub async fn auto_assign(&self, case: &Case) -> Result<Option<Case>> {
    if !self.config.auto_assign
      || case.assigned.is_some()
      || case.estate == Estate::Yes
    {
      return Ok(None);
    }
    let Some(ward) = case.ward.as_deref() else {
      return Ok(None);
    };
    let Some(&principal) = self.config.ward_principals.get(ward) else {
      tracing::debug!(case_id = %case.case_id, ward, "no principal for ward");
      return Ok(None);
    };
    let Some(user) = self.store.get_user(principal).await? else {
      tracing::warn!(
        ward,
        principal = %principal,
        "configured ward principal does not exist"
      );
      return Ok(None);
    };

    let updated = self
      .store
      .set_assignee(case.case_id, Some(principal), None)
      .await?;
    tracing::info!(case_id = %case.case_id, ward, assignee = %principal, "auto-assigned case");

    self
      .deliver(Notification {
        recipient: user.user_id,
        case_id:   case.case_id,
        message:   format!(
          "Case #{} ({}) has been assigned to you.",
          case.case_id,
          case.kind_display()
        ),
        channel:   Channel::Email,
      })
      .await;

    Ok(Some(updated))
  }

  // ── Merging ───────────────────────────────────────────────────────────

  /// Merge `mergee` into `target`, effective now.
  pub async fn merge(
    &self,
    mergee: CaseId,
    target: CaseId,
    actor: UserId,
  ) -> Result<MergeRecord> {
    self.merge_at(mergee, target, actor, Utc::now()).await
  }

  /// Merge `mergee` into `target` with an explicit effective time.
  ///
  /// Re-merging an already merged pair is allowed and appends another
  /// record. Merging a case that is merged elsewhere retires the old merge.
  /// Merging into a case whose current pointer chain leads back to `mergee`
  /// is rejected with [`Error::MergeCycle`]; the store checks this in the
  /// same transaction as the write.
  pub async fn merge_at(
    &self,
    mergee: CaseId,
    target: CaseId,
    actor: UserId,
    time: DateTime<Utc>,
  ) -> Result<MergeRecord> {
    if mergee == target {
      return Err(Error::SelfMerge(mergee));
    }

    let record = self
      .store
      .record_merge(NewMergeRecord { mergee, merged_into: target, actor, time })
      .await?;
    tracing::info!(
      mergee = %mergee,
      target = %target,
      actor = %actor,
      merge_id = %record.merge_id,
      "merged case"
    );
    Ok(record)
  }

  /// Undo the current merge of `mergee`.
  ///
  /// Returns [`Error::NotCurrentlyMerged`] if the case has no merge pointer.
  pub async fn unmerge(&self, mergee: CaseId, actor: UserId) -> Result<MergeRecord> {
    let case = self.require_case(mergee).await?;
    let Some(target) = case.merged_into else {
      return Err(Error::NotCurrentlyMerged(mergee));
    };

    let record = self
      .store
      .record_unmerge(NewMergeRecord {
        mergee,
        merged_into: target,
        actor,
        time: Utc::now(),
      })
      .await?;
    tracing::info!(
      mergee = %mergee,
      target = %target,
      actor = %actor,
      merge_id = %record.merge_id,
      "unmerged case"
    );
    Ok(record)
  }

  // ── Assignment ────────────────────────────────────────────────────────

  /// Assign the case and tell its other followers.
  ///
  /// The assignee becomes a follower. Followers other than the actor and the
  /// assignee are notified unless they have notifications turned off.
  pub async fn assign(
    &self,
    case_id: CaseId,
    assignee: UserId,
    actor: UserId,
  ) -> Result<Case> {
    self.require_case(case_id).await?;
    let assignee_user = self
      .store
      .get_user(assignee)
      .await?
      .ok_or(Error::UserNotFound(assignee))?;

    let case = self
      .store
      .set_assignee(case_id, Some(assignee), Some(actor))
      .await?;
    tracing::info!(case_id = %case_id, assignee = %assignee, actor = %actor, "assigned case");

    let followers = self.store.followers(case_id).await?;
    let others: Vec<UserId> = followers
      .into_iter()
      .filter(|&u| u != actor && u != assignee)
      .collect();
    let recipients = self.store.get_users(&others).await?;

    for user in recipients.into_iter().filter(|u| u.notify) {
      self
        .deliver(Notification {
          recipient: user.user_id,
          case_id,
          message: format!(
            "Case #{case_id} has been assigned to {}.",
            assignee_user.name
          ),
          channel: Channel::Notice,
        })
        .await;
    }

    Ok(case)
  }

  // ── Other mutations ───────────────────────────────────────────────────

  pub async fn edit(
    &self,
    case_id: CaseId,
    edit: CaseEdit,
    actor: UserId,
  ) -> Result<Case> {
    self
      .store
      .edit_case(case_id, edit, Some(actor))
      .await
      .map_err(Error::from)
  }

  pub async fn close(&self, case_id: CaseId, actor: UserId) -> Result<Case> {
    self.set_closed(case_id, true, actor).await
  }

  pub async fn reopen(&self, case_id: CaseId, actor: UserId) -> Result<Case> {
    self.set_closed(case_id, false, actor).await
  }

  async fn set_closed(
    &self,
    case_id: CaseId,
    closed: bool,
    actor: UserId,
  ) -> Result<Case> {
    let case = self.require_case(case_id).await?;
    if case.closed == closed {
      return Ok(case);
    }
    let case = self
      .store
      .set_closed(case_id, closed, Some(actor))
      .await?;
    tracing::info!(case_id = %case_id, closed, actor = %actor, "changed case status");
    Ok(case)
  }

  pub async fn log_action(&self, action: NewAction) -> Result<Action> {
    self.store.add_action(action).await.map_err(Error::from)
  }

  pub async fn add_complaint(
    &self,
    case_id: CaseId,
    complaint: NewComplaint,
  ) -> Result<Complaint> {
    self
      .store
      .add_complaint(case_id, complaint)
      .await
      .map_err(Error::from)
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  pub async fn view(&self, case_id: CaseId) -> Result<Option<CaseView>> {
    CaseView::load(self.store.as_ref(), case_id)
      .await
      .map_err(Error::from)
  }

  // ── Helpers ───────────────────────────────────────────────────────────

  async fn deliver(&self, notification: Notification) {
    let recipient = notification.recipient;
    let case_id = notification.case_id;
    if let Err(e) = self.notifier.notify(notification).await {
      tracing::warn!(
        recipient = %recipient,
        case_id = %case_id,
        error = %e,
        "failed to deliver notification"
      );
    }
  }
}
