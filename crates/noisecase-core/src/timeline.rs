//! Timeline aggregation: one reverse-chronological feed per case.
//!
//! A case's timeline gathers actions, complaints, merge records and history
//! edits from:
//!
//! - every case in its forward closure (cases merged into it), for all time;
//! - every case it has itself moved into, but only from the moment the move
//!   took effect. A case never shows activity its later host had before the
//!   merge.
//!
//! Entries are sorted by their timestamp, newest first. Ties keep source
//! order (actions, complaints, merges, edits), which is stable but carries no
//! meaning.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{
  closure::ForwardClosure,
  event::{Action, ActionType, Complaint},
  history::{CaseField, FieldChange, HistoricalCase, consecutive_diffs},
  id::{ActionId, CaseId, ComplaintId, MergeRecordId, UserId},
  merge::{MergeHop, MergeRecord},
};

// ─── Options ─────────────────────────────────────────────────────────────────

/// Who the timeline is being built for.
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
pub enum Audience {
  /// Full detail.
  Staff,
  /// Reporters and the public: public actions only, no staff names.
  Public,
}

impl Audience {
  pub fn default_history(self) -> HistoryToShow {
    match self {
      Self::Staff => HistoryToShow::All,
      Self::Public => HistoryToShow::Assigned,
    }
  }
}

/// Which history-derived entries to include. Status changes are always
/// included.
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
pub enum HistoryToShow {
  /// Assignment changes only.
  Assigned,
  /// Assignment changes and generic field edits.
  All,
}

// ─── Entries ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentDetail {
  pub from:  Option<UserId>,
  pub to:    Option<UserId>,
  pub actor: Option<UserId>,
}

/// An action as shown on a timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionEntry {
  pub action_id:   ActionId,
  pub action_type: ActionType,
  pub notes:       String,
  pub files:       Vec<String>,
  pub time:        DateTime<Utc>,
  /// The case whose merge into this one the action records.
  pub merged_from: Option<CaseId>,
  /// Hidden from the public audience.
  pub created_by:  Option<UserId>,
}

impl ActionEntry {
  fn project(action: &Action, staff: bool) -> Self {
    Self {
      action_id:   action.action_id,
      action_type: action.action_type.clone(),
      notes:       action.notes.clone(),
      files:       action.files.clone(),
      time:        action.time,
      merged_from: action.case_old,
      created_by:  staff.then_some(action.created_by),
    }
  }
}

/// A merge or unmerge record as shown on a timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeEntry {
  pub merge_id:    MergeRecordId,
  pub mergee:      CaseId,
  pub merged_into: CaseId,
  pub unmerge:     bool,
  pub time:        DateTime<Utc>,
  /// Hidden from the public audience.
  pub created_by:  Option<UserId>,
}

impl MergeEntry {
  fn project(record: &MergeRecord, staff: bool) -> Self {
    Self {
      merge_id:    record.merge_id,
      mergee:      record.mergee,
      merged_into: record.merged_into,
      unmerge:     record.unmerge,
      time:        record.time,
      created_by:  staff.then_some(record.created_by),
    }
  }
}

/// A complaint as shown on a timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplaintEntry {
  pub complaint_id:  ComplaintId,
  /// Hidden from the public audience.
  pub reporter:      Option<UserId>,
  pub start:         DateTime<Utc>,
  pub end:           DateTime<Utc>,
  pub happening_now: bool,
  pub description:   String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum TimelineEvent {
  Action(ActionEntry),
  Complaint(ComplaintEntry),
  Merge(MergeEntry),
  /// Generic field edits from one history snapshot.
  Edit {
    actor:   Option<UserId>,
    changes: Vec<FieldChange>,
  },
  /// `None` for the public audience: a bare "case reassigned".
  Assignment(Option<AssignmentDetail>),
  /// The case was closed (`true`) or reopened (`false`).
  Status {
    closed: bool,
    actor:  Option<UserId>,
  },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
  /// The timestamp the entry is sorted by.
  pub at:      DateTime<Utc>,
  /// The case the underlying record belongs to.
  pub case_id: CaseId,
  pub event:   TimelineEvent,
}

// ─── Scope ───────────────────────────────────────────────────────────────────

/// Which (case, time) pairs belong on a case's timeline.
#[derive(Debug, Clone)]
pub struct TimelineScope {
  members: HashSet<CaseId>,
  /// Destinations the case moved into, with the earliest time they count.
  carried: BTreeMap<CaseId, DateTime<Utc>>,
}

impl TimelineScope {
  pub fn new(case_id: CaseId, merged: &ForwardClosure, hops: &[MergeHop]) -> Self {
    let mut members: HashSet<CaseId> = merged.members_of(case_id).collect();
    members.insert(case_id);

    let mut carried = BTreeMap::new();
    for hop in hops {
      if members.contains(&hop.case_id) {
        continue;
      }
      carried
        .entry(hop.case_id)
        .and_modify(|at: &mut DateTime<Utc>| *at = (*at).min(hop.at))
        .or_insert(hop.at);
    }

    Self { members, carried }
  }

  pub fn contains(&self, case_id: CaseId, at: DateTime<Utc>) -> bool {
    self.members.contains(&case_id)
      || self.carried.get(&case_id).is_some_and(|&from| at >= from)
  }

  /// Every case whose records may appear, for loading.
  pub fn case_ids(&self) -> Vec<CaseId> {
    let mut ids: Vec<CaseId> =
      self.members.iter().chain(self.carried.keys()).copied().collect();
    ids.sort();
    ids.dedup();
    ids
  }

  pub fn members(&self) -> &HashSet<CaseId> { &self.members }
}

// ─── Assembly ────────────────────────────────────────────────────────────────

/// Raw records for a timeline. Records outside the scope are ignored, so
/// callers may pass supersets.
#[derive(Debug, Clone, Copy)]
pub struct TimelineSources<'a> {
  pub actions:    &'a [Action],
  pub complaints: &'a [Complaint],
  pub merges:     &'a [MergeRecord],
  pub history:    &'a [HistoricalCase],
}

/// Build the timeline for the case whose scope is `scope`.
pub fn build(
  scope: &TimelineScope,
  sources: TimelineSources<'_>,
  audience: Audience,
  history_to_show: HistoryToShow,
) -> Vec<TimelineEntry> {
  let staff = audience == Audience::Staff;
  let mut entries = Vec::new();

  for action in sources.actions {
    if !scope.contains(action.case_id, action.time) {
      continue;
    }
    if !staff && !action.action_type.visibility.is_public() {
      continue;
    }
    entries.push(TimelineEntry {
      at:      action.time,
      case_id: action.case_id,
      event:   TimelineEvent::Action(ActionEntry::project(action, staff)),
    });
  }

  for complaint in sources.complaints {
    if !scope.contains(complaint.case_id, complaint.created) {
      continue;
    }
    entries.push(TimelineEntry {
      at:      complaint.created,
      case_id: complaint.case_id,
      event:   TimelineEvent::Complaint(ComplaintEntry {
        complaint_id:  complaint.complaint_id,
        reporter:      staff.then_some(complaint.reporter),
        start:         complaint.start,
        end:           complaint.end,
        happening_now: complaint.happening_now,
        description:   complaint.description.clone(),
      }),
    });
  }

  for record in sources.merges {
    let relevant = scope.contains(record.mergee, record.time)
      || scope.contains(record.merged_into, record.time);
    if !relevant {
      continue;
    }
    entries.push(TimelineEntry {
      at:      record.time,
      case_id: record.merged_into,
      event:   TimelineEvent::Merge(MergeEntry::project(record, staff)),
    });
  }

  for diff in consecutive_diffs(sources.history) {
    let current = diff.current;
    if !scope.contains(current.case_id, current.history_date) {
      continue;
    }
    let actor = if staff { current.history_user } else { None };
    let push = |entries: &mut Vec<TimelineEntry>, event| {
      entries.push(TimelineEntry {
        at: current.history_date,
        case_id: current.case_id,
        event,
      });
    };

    if history_to_show == HistoryToShow::All {
      let changes: Vec<FieldChange> = diff
        .fields
        .iter()
        .filter(|f| f.is_generic())
        .map(|&f| diff.change(f))
        .collect();
      if !changes.is_empty() {
        push(&mut entries, TimelineEvent::Edit { actor, changes });
      }
    }

    if diff.fields.contains(&CaseField::Assigned) {
      let detail = staff.then(|| AssignmentDetail {
        from: diff.previous.snapshot.assigned,
        to: current.snapshot.assigned,
        actor,
      });
      push(&mut entries, TimelineEvent::Assignment(detail));
    }

    if diff.fields.contains(&CaseField::Closed) {
      push(&mut entries, TimelineEvent::Status {
        closed: current.snapshot.closed,
        actor,
      });
    }
  }

  entries.sort_by(|a, b| b.at.cmp(&a.at));
  tracing::debug!(entries = entries.len(), %audience, "built timeline");
  entries
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;
  use crate::{
    case::{Estate, Location, NoiseKind},
    closure::MergePointers,
    history::CaseSnapshot,
    id::HistoryId,
  };

  fn t(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
  }

  fn action(id: i64, case: i64, time: i64, ty: ActionType) -> Action {
    Action {
      action_id: ActionId(id),
      case_id: CaseId(case),
      action_type: ty,
      notes: String::new(),
      files: Vec::new(),
      time: t(time),
      case_old: None,
      created: t(time),
      created_by: UserId(1),
    }
  }

  fn snapshot() -> CaseSnapshot {
    CaseSnapshot {
      kind:        NoiseKind::Music,
      kind_other:  None,
      location:    Location::Point { lat: 51.54, lon: -0.06, radius: 30 },
      ward:        None,
      estate:      Estate::Unknown,
      assigned:    None,
      closed:      false,
      merged_into: None,
    }
  }

  fn history(id: i64, case: i64, time: i64, snapshot: CaseSnapshot) -> HistoricalCase {
    HistoricalCase {
      history_id: HistoryId(id),
      case_id: CaseId(case),
      history_date: t(time),
      history_user: Some(UserId(7)),
      snapshot,
    }
  }

  fn scope_of(case: i64, edges: &[(i64, i64)], hops: &[MergeHop]) -> TimelineScope {
    let pointers =
      MergePointers::new(edges.iter().map(|&(a, b)| (CaseId(a), CaseId(b))));
    TimelineScope::new(CaseId(case), &pointers.closure(&[CaseId(case)]), hops)
  }

  fn sources<'a>(
    actions: &'a [Action],
    merges: &'a [MergeRecord],
    history: &'a [HistoricalCase],
  ) -> TimelineSources<'a> {
    TimelineSources { actions, complaints: &[], merges, history }
  }

  #[test]
  fn carried_destination_is_time_bounded() {
    // Case 1 moved into case 2 at t=100.
    let scope = scope_of(1, &[(1, 2)], &[MergeHop { case_id: CaseId(2), at: t(100) }]);
    let actions = vec![
      action(1, 2, 99, ActionType::public("Visit")),
      action(2, 2, 101, ActionType::public("Letter sent")),
      action(3, 1, 50, ActionType::public("Visit")),
    ];

    let entries =
      build(&scope, sources(&actions, &[], &[]), Audience::Staff, HistoryToShow::All);
    let times: Vec<_> = entries.iter().map(|e| e.at).collect();
    assert_eq!(times, vec![t(101), t(50)]);
  }

  #[test]
  fn merged_in_cases_contribute_all_history() {
    let scope = scope_of(2, &[(1, 2)], &[]);
    let actions = vec![
      action(1, 1, 5, ActionType::staff("Visit")),
      action(2, 3, 6, ActionType::staff("Visit")),
    ];
    let entries =
      build(&scope, sources(&actions, &[], &[]), Audience::Staff, HistoryToShow::All);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].case_id, CaseId(1));
  }

  #[test]
  fn public_audience_sees_only_public_actions() {
    let scope = scope_of(1, &[], &[]);
    let actions = vec![
      action(1, 1, 1, ActionType::public("Visit")),
      action(2, 1, 2, ActionType::staff("Phone call")),
      action(3, 1, 3, ActionType::internal("Case review")),
    ];

    let public =
      build(&scope, sources(&actions, &[], &[]), Audience::Public, HistoryToShow::Assigned);
    assert_eq!(public.len(), 1);
    assert!(matches!(&public[0].event, TimelineEvent::Action(a) if a.action_id == ActionId(1)));

    let staff =
      build(&scope, sources(&actions, &[], &[]), Audience::Staff, HistoryToShow::All);
    assert_eq!(staff.len(), 3);
  }

  #[test]
  fn public_audience_sees_no_staff_ids() {
    let scope = scope_of(1, &[], &[]);
    let actions = vec![action(1, 1, 1, ActionType::public("Visit"))];
    let merges = vec![MergeRecord {
      merge_id:    MergeRecordId(1),
      mergee:      CaseId(2),
      merged_into: CaseId(1),
      unmerge:     false,
      time:        t(2),
      created:     t(2),
      created_by:  UserId(1),
    }];

    let public = build(
      &scope,
      sources(&actions, &merges, &[]),
      Audience::Public,
      HistoryToShow::Assigned,
    );
    assert_eq!(public.len(), 2);
    for entry in &public {
      match &entry.event {
        TimelineEvent::Action(a) => assert_eq!(a.created_by, None),
        TimelineEvent::Merge(m) => assert_eq!(m.created_by, None),
        other => panic!("unexpected event {other:?}"),
      }
    }
    let json = serde_json::to_string(&public).unwrap();
    assert!(!json.contains("\"created_by\":1"));

    let staff =
      build(&scope, sources(&actions, &merges, &[]), Audience::Staff, HistoryToShow::All);
    for entry in &staff {
      match &entry.event {
        TimelineEvent::Action(a) => assert_eq!(a.created_by, Some(UserId(1))),
        TimelineEvent::Merge(m) => assert_eq!(m.created_by, Some(UserId(1))),
        other => panic!("unexpected event {other:?}"),
      }
    }
  }

  #[test]
  fn merge_marker_action_names_merged_case() {
    let scope = scope_of(1, &[(2, 1)], &[]);
    let mut marker = action(1, 1, 5, ActionType::public("Merged"));
    marker.case_old = Some(CaseId(2));
    let entries = build(
      &scope,
      sources(&[marker], &[], &[]),
      Audience::Public,
      HistoryToShow::Assigned,
    );
    assert!(matches!(
      &entries[0].event,
      TimelineEvent::Action(a) if a.merged_from == Some(CaseId(2))
    ));
  }

  #[test]
  fn assignment_is_anonymous_for_public() {
    let scope = scope_of(1, &[], &[]);
    let mut assigned = snapshot();
    assigned.assigned = Some(UserId(3));
    let rows = vec![history(1, 1, 0, snapshot()), history(2, 1, 10, assigned)];

    let public =
      build(&scope, sources(&[], &[], &rows), Audience::Public, HistoryToShow::Assigned);
    assert_eq!(public.len(), 1);
    assert!(matches!(public[0].event, TimelineEvent::Assignment(None)));

    let staff = build(&scope, sources(&[], &[], &rows), Audience::Staff, HistoryToShow::All);
    assert_eq!(staff.len(), 1);
    assert!(matches!(
      &staff[0].event,
      TimelineEvent::Assignment(Some(AssignmentDetail { from: None, to: Some(UserId(3)), actor: Some(UserId(7)) }))
    ));
  }

  #[test]
  fn generic_edits_only_with_all_history() {
    let scope = scope_of(1, &[], &[]);
    let mut edited = snapshot();
    edited.kind = NoiseKind::Diy;
    edited.merged_into = Some(CaseId(4));
    let rows = vec![history(1, 1, 0, snapshot()), history(2, 1, 10, edited)];

    let entries = build(&scope, sources(&[], &[], &rows), Audience::Staff, HistoryToShow::All);
    assert_eq!(entries.len(), 1);
    match &entries[0].event {
      TimelineEvent::Edit { changes, .. } => {
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, CaseField::Kind);
      }
      other => panic!("unexpected event {other:?}"),
    }

    let assigned_only =
      build(&scope, sources(&[], &[], &rows), Audience::Staff, HistoryToShow::Assigned);
    assert!(assigned_only.is_empty());
  }

  #[test]
  fn closing_is_a_status_event() {
    let scope = scope_of(1, &[], &[]);
    let mut closed = snapshot();
    closed.closed = true;
    let rows = vec![history(1, 1, 0, snapshot()), history(2, 1, 10, closed)];

    let entries =
      build(&scope, sources(&[], &[], &rows), Audience::Public, HistoryToShow::Assigned);
    assert!(matches!(entries[0].event, TimelineEvent::Status { closed: true, actor: None }));
  }

  #[test]
  fn merge_records_follow_scope() {
    let scope = scope_of(1, &[(1, 2)], &[MergeHop { case_id: CaseId(2), at: t(100) }]);
    let record = |id, mergee, into, time| MergeRecord {
      merge_id: MergeRecordId(id),
      mergee: CaseId(mergee),
      merged_into: CaseId(into),
      unmerge: false,
      time: t(time),
      created: t(time),
      created_by: UserId(1),
    };
    let merges = vec![record(1, 5, 2, 10), record(2, 1, 2, 100), record(3, 2, 6, 200)];

    let entries =
      build(&scope, sources(&[], &merges, &[]), Audience::Staff, HistoryToShow::All);
    let ids: Vec<_> = entries
      .iter()
      .map(|e| match &e.event {
        TimelineEvent::Merge(r) => r.merge_id,
        other => panic!("unexpected event {other:?}"),
      })
      .collect();
    assert_eq!(ids, vec![MergeRecordId(3), MergeRecordId(2)]);
  }

  #[test]
  fn ties_keep_source_order() {
    let scope = scope_of(1, &[], &[]);
    let actions = vec![
      action(1, 1, 10, ActionType::public("First")),
      action(2, 1, 10, ActionType::public("Second")),
    ];
    let entries =
      build(&scope, sources(&actions, &[], &[]), Audience::Staff, HistoryToShow::All);
    let ids: Vec<_> = entries
      .iter()
      .map(|e| match &e.event {
        TimelineEvent::Action(a) => a.action_id,
        other => panic!("unexpected event {other:?}"),
      })
      .collect();
    assert_eq!(ids, vec![ActionId(1), ActionId(2)]);
  }
}
