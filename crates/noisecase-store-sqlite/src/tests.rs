//! Integration tests for `SqliteStore` against an in-memory database, both
//! directly and driven through `CaseLifecycle`.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use noisecase_core::{
  CaseId, UserId,
  case::{Case, CaseEdit, Estate, LastUpdateType, Location, NewCase, NoiseKind},
  closure::{resolve_merged_cases, resolve_merged_into_cases},
  event::{ActionType, NewAction, NewComplaint},
  history::CaseField,
  lifecycle::{CaseLifecycle, LifecycleConfig},
  merge::{MergeLedger, NewMergeRecord},
  notify::{Channel, Notification, Notifier},
  store::CaseStore,
  timeline::{Audience, HistoryToShow, TimelineEvent},
  user::{NewUser, User},
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn point() -> Location {
  Location::Point { lat: 51.5416, lon: -0.0542, radius: 150 }
}

fn complaint(reporter: UserId) -> NewComplaint {
  let end = Utc::now();
  NewComplaint {
    reporter,
    start: end - Duration::hours(2),
    end,
    happening_now: false,
    description: "Bass through the wall until 3am".into(),
    effect: Some("Could not sleep".into()),
  }
}

fn merge_input(mergee: CaseId, into: CaseId, actor: UserId) -> NewMergeRecord {
  NewMergeRecord { mergee, merged_into: into, actor, time: Utc::now() }
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_user() {
  let s = store().await;
  let user = s
    .add_user(NewUser::staff("Olu Adeyemi", "olu@example.org"))
    .await
    .unwrap();
  assert!(user.is_staff);
  assert!(user.notify);

  let fetched = s.get_user(user.user_id).await.unwrap().unwrap();
  assert_eq!(fetched, user);
  assert!(s.get_user(UserId(999)).await.unwrap().is_none());
}

#[tokio::test]
async fn get_users_skips_unknown_ids() {
  let s = store().await;
  let a = s.add_user(NewUser::reporter("A")).await.unwrap();
  let b = s.add_user(NewUser::reporter("B")).await.unwrap();

  let users = s
    .get_users(&[b.user_id, UserId(404), a.user_id])
    .await
    .unwrap();
  let ids: Vec<UserId> = users.iter().map(|u| u.user_id).collect();
  assert_eq!(ids, vec![a.user_id, b.user_id]);
  assert!(s.get_users(&[]).await.unwrap().is_empty());
}

// ─── Cases ───────────────────────────────────────────────────────────────────

async fn new_case(s: &SqliteStore, creator: &User) -> Case {
  let mut input = NewCase::new(NoiseKind::Music, point());
  input.ward = Some("E05009367".into());
  input.created_by = Some(creator.user_id);
  s.create_case(input).await.unwrap()
}

#[tokio::test]
async fn create_case_round_trips_and_records_creation() {
  let s = store().await;
  let reporter = s.add_user(NewUser::reporter("R")).await.unwrap();
  let case = new_case(&s, &reporter).await;

  assert_eq!(case.kind, NoiseKind::Music);
  assert_eq!(case.location, point());
  assert_eq!(case.estate, Estate::Unknown);
  assert!(case.last_update_type.is_none());
  assert!(!case.closed);

  let fetched = s.get_case(case.case_id).await.unwrap().unwrap();
  assert_eq!(fetched.case_id, case.case_id);
  assert_eq!(fetched.created, case.created);

  assert_eq!(s.followers(case.case_id).await.unwrap(), vec![reporter.user_id]);
  let history = s.history_for(&[case.case_id]).await.unwrap();
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].history_user, Some(reporter.user_id));
}

#[tokio::test]
async fn get_case_missing_returns_none() {
  let s = store().await;
  assert!(s.get_case(CaseId(12)).await.unwrap().is_none());
  assert!(s.get_cases(&[CaseId(12)]).await.unwrap().is_empty());
}

#[tokio::test]
async fn edit_snapshots_only_real_changes() {
  let s = store().await;
  let staff = s.add_user(NewUser::staff("S", "s@example.org")).await.unwrap();
  let case = new_case(&s, &staff).await;

  let noop = CaseEdit { kind: Some(NoiseKind::Music), ..Default::default() };
  s.edit_case(case.case_id, noop, Some(staff.user_id)).await.unwrap();
  assert_eq!(s.history_for(&[case.case_id]).await.unwrap().len(), 1);

  let edit = CaseEdit { estate: Some(Estate::Yes), ..Default::default() };
  let edited = s
    .edit_case(case.case_id, edit, Some(staff.user_id))
    .await
    .unwrap();
  assert_eq!(edited.estate, Estate::Yes);
  assert_eq!(edited.modified_by, Some(staff.user_id));

  let history = s.history_for(&[case.case_id]).await.unwrap();
  assert_eq!(history.len(), 2);
  assert_eq!(history[1].snapshot.estate, Estate::Yes);
}

#[tokio::test]
async fn edit_missing_case_is_not_found() {
  let s = store().await;
  let err = s
    .edit_case(CaseId(3), CaseEdit::default(), None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::CaseNotFound(CaseId(3))));
}

#[tokio::test]
async fn set_assignee_adds_follower() {
  let s = store().await;
  let reporter = s.add_user(NewUser::reporter("R")).await.unwrap();
  let officer = s.add_user(NewUser::staff("O", "o@example.org")).await.unwrap();
  let case = new_case(&s, &reporter).await;

  let case = s
    .set_assignee(case.case_id, Some(officer.user_id), None)
    .await
    .unwrap();
  assert_eq!(case.assigned, Some(officer.user_id));
  assert_eq!(
    s.followers(case.case_id).await.unwrap(),
    vec![reporter.user_id, officer.user_id]
  );
}

// ─── Merge ledger ────────────────────────────────────────────────────────────

#[tokio::test]
async fn record_merge_moves_pointer_and_tags_target() {
  let s = store().await;
  let staff = s.add_user(NewUser::staff("S", "s@example.org")).await.unwrap();
  let a = new_case(&s, &staff).await;
  let b = new_case(&s, &staff).await;

  let record = s
    .record_merge(merge_input(a.case_id, b.case_id, staff.user_id))
    .await
    .unwrap();
  assert!(!record.unmerge);

  let a = s.get_case(a.case_id).await.unwrap().unwrap();
  let b = s.get_case(b.case_id).await.unwrap().unwrap();
  assert_eq!(a.merged_into, Some(b.case_id));
  assert_eq!(b.last_update_type, Some(LastUpdateType::Merge));
  assert!(s.is_pair_active(a.case_id, b.case_id).await.unwrap());
  assert_eq!(s.merge_pointers().await.unwrap(), vec![(a.case_id, b.case_id)]);

  // The mergee's pointer change is in its history.
  let history = s.history_for(&[a.case_id]).await.unwrap();
  assert_eq!(history.last().unwrap().snapshot.merged_into, Some(b.case_id));
}

#[tokio::test]
async fn self_merge_is_rejected_and_ledger_unchanged() {
  let s = store().await;
  let staff = s.add_user(NewUser::staff("S", "s@example.org")).await.unwrap();
  let a = new_case(&s, &staff).await;

  let err = s
    .record_merge(merge_input(a.case_id, a.case_id, staff.user_id))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::SelfMerge(id) if id == a.case_id));
  assert!(s.merge_ledger().await.unwrap().is_empty());
}

#[tokio::test]
async fn merge_with_unknown_case_is_not_found() {
  let s = store().await;
  let staff = s.add_user(NewUser::staff("S", "s@example.org")).await.unwrap();
  let a = new_case(&s, &staff).await;

  let err = s
    .record_merge(merge_input(a.case_id, CaseId(77), staff.user_id))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::CaseNotFound(CaseId(77))));
  assert!(s.merge_ledger().await.unwrap().is_empty());
  assert!(s.get_case(a.case_id).await.unwrap().unwrap().merged_into.is_none());
}

#[tokio::test]
async fn unmerge_only_clears_matching_pointer() {
  let s = store().await;
  let staff = s.add_user(NewUser::staff("S", "s@example.org")).await.unwrap();
  let a = new_case(&s, &staff).await;
  let b = new_case(&s, &staff).await;
  let c = new_case(&s, &staff).await;

  s.record_merge(merge_input(a.case_id, b.case_id, staff.user_id))
    .await
    .unwrap();
  // An unmerge against a pair that is not current leaves the pointer alone.
  s.record_unmerge(merge_input(a.case_id, c.case_id, staff.user_id))
    .await
    .unwrap();
  let a_now = s.get_case(a.case_id).await.unwrap().unwrap();
  assert_eq!(a_now.merged_into, Some(b.case_id));

  s.record_unmerge(merge_input(a.case_id, b.case_id, staff.user_id))
    .await
    .unwrap();
  let a_now = s.get_case(a.case_id).await.unwrap().unwrap();
  assert!(a_now.merged_into.is_none());
  assert!(!s.is_pair_active(a.case_id, b.case_id).await.unwrap());
  assert_eq!(s.merge_ledger().await.unwrap().len(), 3);
}

#[tokio::test]
async fn pair_activity_follows_latest_record() {
  let s = store().await;
  let staff = s.add_user(NewUser::staff("S", "s@example.org")).await.unwrap();
  let a = new_case(&s, &staff).await;
  let b = new_case(&s, &staff).await;
  let (ai, bi) = (a.case_id, b.case_id);

  assert!(!s.is_pair_active(ai, bi).await.unwrap());
  s.record_merge(merge_input(ai, bi, staff.user_id)).await.unwrap();
  s.record_unmerge(merge_input(ai, bi, staff.user_id)).await.unwrap();
  s.record_merge(merge_input(ai, bi, staff.user_id)).await.unwrap();
  assert!(s.is_pair_active(ai, bi).await.unwrap());

  let ledger = MergeLedger::new(s.merge_ledger().await.unwrap());
  assert!(ledger.is_pair_active(ai, bi));
  assert_eq!(ledger.active_records().count(), 1);
}

// ─── Events ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn backdated_action_leaves_last_update_alone() {
  let s = store().await;
  let staff = s.add_user(NewUser::staff("S", "s@example.org")).await.unwrap();
  let case = new_case(&s, &staff).await;

  let visit = ActionType::public("Visit");
  let before = case.modified - Duration::days(3);
  let action = s
    .add_action(
      NewAction::new(case.case_id, visit.clone(), staff.user_id)
        .notes("Heard nothing")
        .at(before),
    )
    .await
    .unwrap();
  assert_eq!(action.time, before);
  let unchanged = s.get_case(case.case_id).await.unwrap().unwrap();
  assert!(unchanged.last_update_type.is_none());
  assert_eq!(unchanged.modified, case.modified);

  s.add_action(NewAction::new(case.case_id, visit, staff.user_id).at(case.modified))
    .await
    .unwrap();
  let updated = s.get_case(case.case_id).await.unwrap().unwrap();
  assert_eq!(updated.last_update_type, Some(LastUpdateType::Action));
}

#[tokio::test]
async fn action_on_missing_case_is_not_found() {
  let s = store().await;
  let staff = s.add_user(NewUser::staff("S", "s@example.org")).await.unwrap();
  let err = s
    .add_action(NewAction::new(CaseId(5), ActionType::staff("Letter"), staff.user_id))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::CaseNotFound(CaseId(5))));
}

#[tokio::test]
async fn complaint_marks_case_and_round_trips() {
  let s = store().await;
  let reporter = s.add_user(NewUser::reporter("R")).await.unwrap();
  let case = new_case(&s, &reporter).await;

  let stored = s
    .add_complaint(case.case_id, complaint(reporter.user_id))
    .await
    .unwrap();
  assert_eq!(stored.reporter, reporter.user_id);
  assert_eq!(stored.effect.as_deref(), Some("Could not sleep"));

  let case = s.get_case(case.case_id).await.unwrap().unwrap();
  assert_eq!(case.last_update_type, Some(LastUpdateType::Complaint));
  assert_eq!(s.complaints_for(&[case.case_id]).await.unwrap().len(), 1);
}

#[tokio::test]
async fn notifications_are_persisted() {
  let s = store().await;
  let user = s.add_user(NewUser::staff("S", "s@example.org")).await.unwrap();
  let case = new_case(&s, &user).await;

  s.notify(Notification {
    recipient: user.user_id,
    case_id:   case.case_id,
    message:   "hello".into(),
    channel:   Channel::Email,
  })
  .await
  .unwrap();

  let inbox = s.notifications_for(user.user_id).await.unwrap();
  assert_eq!(inbox.len(), 1);
  assert_eq!(inbox[0].channel, Channel::Email);
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

struct Fixture {
  store:     Arc<SqliteStore>,
  lifecycle: CaseLifecycle<SqliteStore, SqliteStore>,
  officer:   User,
  reporter:  User,
}

const WARD: &str = "E05009367";

async fn fixture() -> Fixture { fixture_with(|_| LifecycleConfig::default()).await }

async fn fixture_with(config: impl FnOnce(&User) -> LifecycleConfig) -> Fixture {
  let store = Arc::new(store().await);
  let officer = store
    .add_user(NewUser::staff("Officer", "officer@example.org"))
    .await
    .unwrap();
  let reporter = store.add_user(NewUser::reporter("Resident")).await.unwrap();
  let lifecycle =
    CaseLifecycle::new(Arc::clone(&store), Arc::clone(&store), config(&officer));
  Fixture { store, lifecycle, officer, reporter }
}

impl Fixture {
  async fn submit(&self) -> Case { self.submit_with(|_| {}).await }

  async fn submit_with(&self, tweak: impl FnOnce(&mut NewCase)) -> Case {
    let mut input = NewCase::new(NoiseKind::Music, point());
    input.ward = Some(WARD.into());
    input.created_by = Some(self.reporter.user_id);
    tweak(&mut input);
    let (case, _) = self
      .lifecycle
      .submit(input, complaint(self.reporter.user_id))
      .await
      .unwrap();
    case
  }

  async fn merge_at(&self, mergee: CaseId, into: CaseId, at: DateTime<Utc>) {
    self
      .lifecycle
      .merge_at(mergee, into, self.officer.user_id, at)
      .await
      .unwrap();
  }
}

#[tokio::test]
async fn forward_closure_spans_merge_chains() {
  let fx = fixture().await;
  let (a, b, c) = (fx.submit().await, fx.submit().await, fx.submit().await);
  let (a, b, c) = (a.case_id, b.case_id, c.case_id);
  let now = Utc::now();

  fx.merge_at(c, b, now).await;
  fx.merge_at(b, a, now).await;

  let closure = resolve_merged_cases(fx.store.as_ref(), &[a]).await.unwrap();
  let members: Vec<CaseId> = closure.members_of(a).collect();
  assert_eq!(members, vec![a, b, c]);
  assert_eq!(closure.root_of(c), Some(a));
  assert!(closure.truncated().is_empty());
}

#[tokio::test]
async fn backward_closure_follows_current_merges() {
  let fx = fixture().await;
  let (a, b, c) = (fx.submit().await, fx.submit().await, fx.submit().await);
  let (a, b, c) = (a.case_id, b.case_id, c.case_id);
  let t1 = Utc::now() - Duration::hours(2);
  let t2 = Utc::now() - Duration::hours(1);

  fx.merge_at(a, b, t1).await;
  fx.merge_at(b, c, t2).await;

  let chains = resolve_merged_into_cases(fx.store.as_ref(), &[a, c])
    .await
    .unwrap();
  let hops: Vec<CaseId> = chains[&a].hops.iter().map(|h| h.case_id).collect();
  assert_eq!(hops, vec![b, c]);
  assert!(chains[&c].is_empty());
  assert_eq!(merged_into(&fx, c).await, vec![a, b, c]);
  assert_eq!(merged_into(&fx, b).await, vec![a, b]);

  fx.lifecycle.unmerge(a, fx.officer.user_id).await.unwrap();
  let chains = resolve_merged_into_cases(fx.store.as_ref(), &[a])
    .await
    .unwrap();
  assert!(chains[&a].is_empty());
  assert!(!fx.store.is_pair_active(a, b).await.unwrap());
  assert_eq!(merged_into(&fx, b).await, vec![b]);
  assert_eq!(merged_into(&fx, c).await, vec![b, c]);
}

/// Members of the forward closure rooted at `root`.
async fn merged_into(fx: &Fixture, root: CaseId) -> Vec<CaseId> {
  resolve_merged_cases(fx.store.as_ref(), &[root])
    .await
    .unwrap()
    .members_of(root)
    .collect()
}

#[tokio::test]
async fn retarget_retires_previous_merge() {
  let fx = fixture().await;
  let (a, b, c) = (fx.submit().await, fx.submit().await, fx.submit().await);
  let (a, b, c) = (a.case_id, b.case_id, c.case_id);
  let actor = fx.officer.user_id;

  fx.lifecycle.merge(a, b, actor).await.unwrap();
  fx.lifecycle.merge(a, c, actor).await.unwrap();

  assert!(!fx.store.is_pair_active(a, b).await.unwrap());
  assert!(fx.store.is_pair_active(a, c).await.unwrap());
  let ledger = MergeLedger::new(fx.store.merge_ledger().await.unwrap());
  assert_eq!(ledger.len(), 3);
  assert_eq!(ledger.active_records().count(), 1);
  let hops: Vec<CaseId> = ledger.hops(a).hops.iter().map(|h| h.case_id).collect();
  assert_eq!(hops, vec![c]);
  assert_eq!(merged_into(&fx, b).await, vec![b]);
  assert_eq!(merged_into(&fx, c).await, vec![a, c]);

  fx.lifecycle.unmerge(a, actor).await.unwrap();

  let a_case = fx.store.get_case(a).await.unwrap().unwrap();
  assert_eq!(a_case.merged_into, None);
  assert!(!fx.store.is_pair_active(a, b).await.unwrap());
  assert!(!fx.store.is_pair_active(a, c).await.unwrap());
  let chains = resolve_merged_into_cases(fx.store.as_ref(), &[a])
    .await
    .unwrap();
  assert!(chains[&a].is_empty());
  assert_eq!(merged_into(&fx, b).await, vec![b]);
  assert_eq!(merged_into(&fx, c).await, vec![c]);
}

#[tokio::test]
async fn re_merge_after_unmerge_is_active() {
  let fx = fixture().await;
  let (a, b) = (fx.submit().await.case_id, fx.submit().await.case_id);
  let actor = fx.officer.user_id;

  fx.lifecycle.merge(a, b, actor).await.unwrap();
  assert_eq!(merged_into(&fx, b).await, vec![a, b]);
  fx.lifecycle.unmerge(a, actor).await.unwrap();
  assert_eq!(merged_into(&fx, b).await, vec![b]);
  fx.lifecycle.merge(a, b, actor).await.unwrap();
  assert_eq!(merged_into(&fx, b).await, vec![a, b]);

  assert!(fx.store.is_pair_active(a, b).await.unwrap());
  let a_case = fx.store.get_case(a).await.unwrap().unwrap();
  assert_eq!(a_case.merged_into, Some(b));
}

#[tokio::test]
async fn unmerge_of_unmerged_case_is_rejected() {
  let fx = fixture().await;
  let a = fx.submit().await.case_id;

  let err = fx.lifecycle.unmerge(a, fx.officer.user_id).await.unwrap_err();
  assert!(matches!(err, noisecase_core::Error::NotCurrentlyMerged(id) if id == a));
  assert!(fx.store.merge_ledger().await.unwrap().is_empty());
}

#[tokio::test]
async fn merge_rejects_self_and_cycles() {
  let fx = fixture().await;
  let (a, b) = (fx.submit().await.case_id, fx.submit().await.case_id);
  let actor = fx.officer.user_id;

  let err = fx.lifecycle.merge(a, a, actor).await.unwrap_err();
  assert!(matches!(err, noisecase_core::Error::SelfMerge(_)));

  fx.lifecycle.merge(a, b, actor).await.unwrap();
  let err = fx.lifecycle.merge(b, a, actor).await.unwrap_err();
  assert!(matches!(
    err,
    noisecase_core::Error::MergeCycle { mergee, target } if mergee == b && target == a
  ));
  assert_eq!(fx.store.merge_ledger().await.unwrap().len(), 1);
}

#[tokio::test]
async fn store_rejects_merge_that_closes_a_loop() {
  let s = store().await;
  let user = s.add_user(NewUser::staff("S", "s@example.org")).await.unwrap();
  let a = new_case(&s, &user).await.case_id;
  let b = new_case(&s, &user).await.case_id;
  let c = new_case(&s, &user).await.case_id;

  s.record_merge(merge_input(a, b, user.user_id)).await.unwrap();
  s.record_merge(merge_input(b, c, user.user_id)).await.unwrap();

  let err = s
    .record_merge(merge_input(c, a, user.user_id))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::MergeCycle { mergee, target } if mergee == c && target == a));
  assert!(matches!(
    noisecase_core::Error::from(err),
    noisecase_core::Error::MergeCycle { .. }
  ));
  assert_eq!(s.merge_ledger().await.unwrap().len(), 2);
  assert_eq!(s.get_case(c).await.unwrap().unwrap().merged_into, None);
}

#[tokio::test]
async fn assignment_notifies_other_followers() {
  let fx = fixture().await;
  let case = fx.submit().await;
  let store = fx.store.as_ref();

  let quiet = store
    .add_user(NewUser { notify: false, ..NewUser::staff("Quiet", "q@example.org") })
    .await
    .unwrap();
  let watcher = store
    .add_user(NewUser::staff("Watcher", "w@example.org"))
    .await
    .unwrap();
  let assignee = store
    .add_user(NewUser::staff("Assignee", "a@example.org"))
    .await
    .unwrap();
  store.add_follower(case.case_id, quiet.user_id).await.unwrap();
  store.add_follower(case.case_id, watcher.user_id).await.unwrap();
  store.add_follower(case.case_id, fx.officer.user_id).await.unwrap();

  let updated = fx
    .lifecycle
    .assign(case.case_id, assignee.user_id, fx.officer.user_id)
    .await
    .unwrap();
  assert_eq!(updated.assigned, Some(assignee.user_id));
  assert!(
    store
      .followers(case.case_id)
      .await
      .unwrap()
      .contains(&assignee.user_id)
  );

  let inbox = |u: &User| store.notifications_for(u.user_id);
  assert_eq!(inbox(&watcher).await.unwrap().len(), 1);
  assert_eq!(inbox(&fx.reporter).await.unwrap().len(), 1);
  assert!(inbox(&quiet).await.unwrap().is_empty());
  assert!(inbox(&fx.officer).await.unwrap().is_empty());
  assert!(inbox(&assignee).await.unwrap().is_empty());

  let notice = &inbox(&watcher).await.unwrap()[0];
  assert_eq!(notice.channel, Channel::Notice);
  assert!(notice.message.contains("Assignee"));
}

#[tokio::test]
async fn assign_unknown_user_fails() {
  let fx = fixture().await;
  let case = fx.submit().await;
  let err = fx
    .lifecycle
    .assign(case.case_id, UserId(999), fx.officer.user_id)
    .await
    .unwrap_err();
  assert!(matches!(err, noisecase_core::Error::UserNotFound(UserId(999))));
}

fn principal_config(officer: &User) -> LifecycleConfig {
  LifecycleConfig {
    ward_principals: HashMap::from([(WARD.to_owned(), officer.user_id)]),
    auto_assign:     true,
  }
}

#[tokio::test]
async fn submission_auto_assigns_ward_principal() {
  let fx = fixture_with(principal_config).await;
  let case = fx.submit().await;

  assert_eq!(case.assigned, Some(fx.officer.user_id));
  assert_eq!(case.last_update_type, Some(LastUpdateType::Complaint));

  let inbox = fx.store.notifications_for(fx.officer.user_id).await.unwrap();
  assert_eq!(inbox.len(), 1);
  assert_eq!(inbox[0].channel, Channel::Email);
  assert_eq!(inbox[0].case_id, case.case_id);
}

#[tokio::test]
async fn auto_assign_skips_estates_and_unknown_wards() {
  let fx = fixture_with(principal_config).await;

  let estate = fx.submit_with(|c| c.estate = Estate::Yes).await;
  assert!(estate.assigned.is_none());

  let elsewhere = fx.submit_with(|c| c.ward = Some("E05000000".into())).await;
  assert!(elsewhere.assigned.is_none());

  let unknown_estate = fx.submit_with(|c| c.estate = Estate::Unknown).await;
  assert_eq!(unknown_estate.assigned, Some(fx.officer.user_id));
}

#[tokio::test]
async fn close_and_reopen_appear_on_timeline() {
  let fx = fixture().await;
  let case = fx.submit().await;
  let actor = fx.officer.user_id;

  assert!(fx.lifecycle.close(case.case_id, actor).await.unwrap().closed);
  // Closing twice is a no-op.
  fx.lifecycle.close(case.case_id, actor).await.unwrap();
  assert!(!fx.lifecycle.reopen(case.case_id, actor).await.unwrap().closed);

  let view = fx.lifecycle.view(case.case_id).await.unwrap().unwrap();
  let statuses: Vec<bool> = view
    .timeline(Audience::Public)
    .into_iter()
    .filter_map(|e| match e.event {
      TimelineEvent::Status { closed, actor } => {
        assert!(actor.is_none());
        Some(closed)
      }
      _ => None,
    })
    .collect();
  assert_eq!(statuses.len(), 2);
  assert!(statuses.contains(&true) && statuses.contains(&false));
}

// ─── Timeline ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn timeline_after_merge_only_shows_later_target_events() {
  let fx = fixture().await;
  let (a, b) = (fx.submit().await.case_id, fx.submit().await.case_id);
  let actor = fx.officer.user_id;
  let merged_at = Utc::now() - Duration::hours(1);

  fx.merge_at(a, b, merged_at).await;

  let visit = ActionType::public("Visit");
  let early = fx
    .lifecycle
    .log_action(
      NewAction::new(b, visit.clone(), actor).at(merged_at - Duration::days(1)),
    )
    .await
    .unwrap();
  let late = fx
    .lifecycle
    .log_action(NewAction::new(b, visit, actor).at(merged_at + Duration::minutes(5)))
    .await
    .unwrap();

  let view = fx.lifecycle.view(a).await.unwrap().unwrap();
  assert_eq!(view.merged_into.last(), Some(b));
  let action_ids: Vec<_> = view
    .timeline(Audience::Staff)
    .into_iter()
    .filter_map(|e| match e.event {
      TimelineEvent::Action(action) => Some(action.action_id),
      _ => None,
    })
    .collect();
  assert!(action_ids.contains(&late.action_id));
  assert!(!action_ids.contains(&early.action_id));

  // The target sees everything from the merged case, plus its own history.
  let target = fx.lifecycle.view(b).await.unwrap().unwrap();
  let complaint_cases: Vec<CaseId> = target
    .timeline(Audience::Staff)
    .into_iter()
    .filter(|e| matches!(e.event, TimelineEvent::Complaint(_)))
    .map(|e| e.case_id)
    .collect();
  assert!(complaint_cases.contains(&a));
  assert!(complaint_cases.contains(&b));
  assert_eq!(target.reoccurrences(), 2);
  assert_eq!(target.complainants().len(), 1);
  assert_eq!(target.merged_case_ids().count(), 2);
}

#[tokio::test]
async fn timeline_is_newest_first_and_includes_merge_records() {
  let fx = fixture().await;
  let (a, b) = (fx.submit().await.case_id, fx.submit().await.case_id);
  fx.lifecycle.merge(a, b, fx.officer.user_id).await.unwrap();

  let view = fx.lifecycle.view(b).await.unwrap().unwrap();
  let entries = view.timeline(Audience::Staff);
  assert!(entries.windows(2).all(|w| w[0].at >= w[1].at));
  assert!(
    entries
      .iter()
      .any(|e| matches!(&e.event, TimelineEvent::Merge(r) if r.mergee == a))
  );
}

#[tokio::test]
async fn merge_marker_action_names_the_merged_case() {
  let fx = fixture().await;
  let (a, b) = (fx.submit().await.case_id, fx.submit().await.case_id);
  let actor = fx.officer.user_id;

  fx.lifecycle.merge(a, b, actor).await.unwrap();
  let marker = fx
    .lifecycle
    .log_action(
      NewAction::new(b, ActionType::public("Cases merged"), actor).merged_from(a),
    )
    .await
    .unwrap();
  assert_eq!(marker.case_old, Some(a));

  let view = fx.lifecycle.view(b).await.unwrap().unwrap();
  let shown = view
    .timeline(Audience::Public)
    .into_iter()
    .find_map(|e| match e.event {
      TimelineEvent::Action(action) => Some(action.merged_from),
      _ => None,
    });
  assert_eq!(shown, Some(Some(a)));
}

#[tokio::test]
async fn public_timeline_hides_staff_detail() {
  let fx = fixture_with(principal_config).await;
  let case = fx.submit().await;
  let actor = fx.officer.user_id;

  fx.lifecycle
    .log_action(NewAction::new(case.case_id, ActionType::public("Letter sent"), actor))
    .await
    .unwrap();
  fx.lifecycle
    .log_action(NewAction::new(
      case.case_id,
      ActionType::internal("Case conference"),
      actor,
    ))
    .await
    .unwrap();
  let edit = CaseEdit { ward: Some(Some("E05000001".into())), ..Default::default() };
  fx.lifecycle.edit(case.case_id, edit, actor).await.unwrap();
  let duplicate = fx.submit().await.case_id;
  fx.lifecycle.merge(duplicate, case.case_id, actor).await.unwrap();

  let view = fx.lifecycle.view(case.case_id).await.unwrap().unwrap();

  let public = view.timeline(Audience::Public);
  for entry in &public {
    match &entry.event {
      TimelineEvent::Action(a) => {
        assert!(a.action_type.visibility.is_public());
        assert!(a.created_by.is_none());
      }
      TimelineEvent::Merge(m) => assert!(m.created_by.is_none()),
      TimelineEvent::Complaint(c) => assert!(c.reporter.is_none()),
      TimelineEvent::Assignment(detail) => assert!(detail.is_none()),
      TimelineEvent::Edit { .. } => panic!("public default hides field edits"),
      _ => {}
    }
  }
  let public_actions = public
    .iter()
    .filter(|e| matches!(e.event, TimelineEvent::Action(_)))
    .count();
  assert_eq!(public_actions, 1);
  assert!(
    public
      .iter()
      .any(|e| matches!(e.event, TimelineEvent::Assignment(None)))
  );

  assert!(
    public
      .iter()
      .any(|e| matches!(e.event, TimelineEvent::Merge(_)))
  );
  let public_json = serde_json::to_string(&public).unwrap();
  assert!(!public_json.contains(&format!("\"created_by\":{}", actor.get())));

  let staff = view.timeline(Audience::Staff);
  for entry in &staff {
    match &entry.event {
      TimelineEvent::Action(a) => assert_eq!(a.created_by, Some(actor)),
      TimelineEvent::Merge(m) => assert_eq!(m.created_by, Some(actor)),
      _ => {}
    }
  }
  let assignment = staff.iter().find_map(|e| match &e.event {
    TimelineEvent::Assignment(Some(detail)) => Some(detail.clone()),
    _ => None,
  });
  let assignment = assignment.unwrap();
  assert_eq!(assignment.to, Some(fx.officer.user_id));
  assert!(assignment.actor.is_none());

  let edits: Vec<_> = staff
    .iter()
    .filter_map(|e| match &e.event {
      TimelineEvent::Edit { actor, changes } => Some((*actor, changes.clone())),
      _ => None,
    })
    .collect();
  assert_eq!(edits.len(), 1);
  assert_eq!(edits[0].0, Some(actor));
  assert_eq!(edits[0].1[0].field, CaseField::Ward);

  let assigned_only = view.timeline_with(Audience::Staff, HistoryToShow::Assigned);
  assert!(
    !assigned_only
      .iter()
      .any(|e| matches!(e.event, TimelineEvent::Edit { .. }))
  );
}
