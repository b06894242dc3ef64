//! [`CaseView`]: everything a case detail page needs, loaded once.
//!
//! The view is request-scoped: it is built from the store, used to answer
//! timeline and count queries, and dropped. Nothing here is cached beyond
//! the lifetime of the value.

use std::collections::{BTreeSet, HashSet};

use crate::{
  case::Case,
  closure::{ForwardClosure, MergePointers},
  event::{Action, Complaint},
  history::HistoricalCase,
  id::{CaseId, UserId},
  merge::{HopChain, MergeLedger, MergeRecord},
  store::CaseStore,
  timeline::{self, Audience, HistoryToShow, TimelineEntry, TimelineScope, TimelineSources},
};

#[derive(Debug, Clone)]
pub struct CaseView {
  pub case:        Case,
  /// Cases merged (transitively) into this one.
  pub merged:      ForwardClosure,
  /// Cases this one has moved into, in order.
  pub merged_into: HopChain,
  scope:           TimelineScope,
  actions:         Vec<Action>,
  complaints:      Vec<Complaint>,
  merges:          Vec<MergeRecord>,
  history:         Vec<HistoricalCase>,
}

impl CaseView {
  /// Load the view for `case_id`. Returns `None` if the case does not exist.
  pub async fn load<S: CaseStore>(
    store: &S,
    case_id: CaseId,
  ) -> Result<Option<Self>, S::Error> {
    let Some(case) = store.get_case(case_id).await? else {
      return Ok(None);
    };

    let pointers = MergePointers::new(store.merge_pointers().await?);
    let merged = pointers.closure(&[case_id]);
    let ledger = MergeLedger::new(store.merge_ledger().await?);
    let merged_into = ledger.hops(case_id);

    let scope = TimelineScope::new(case_id, &merged, &merged_into.hops);
    let ids = scope.case_ids();
    let id_set: HashSet<CaseId> = ids.iter().copied().collect();

    let actions = store.actions_for(&ids).await?;
    let complaints = store.complaints_for(&ids).await?;
    let history = store.history_for(&ids).await?;
    let merges = ledger.involving(&id_set).cloned().collect();

    tracing::debug!(
      case_id = %case_id,
      related = ids.len(),
      hops = merged_into.hops.len(),
      "loaded case view"
    );

    Ok(Some(Self {
      case,
      merged,
      merged_into,
      scope,
      actions,
      complaints,
      merges,
      history,
    }))
  }

  /// The timeline with the audience's default history setting.
  pub fn timeline(&self, audience: Audience) -> Vec<TimelineEntry> {
    self.timeline_with(audience, audience.default_history())
  }

  pub fn timeline_with(
    &self,
    audience: Audience,
    history: HistoryToShow,
  ) -> Vec<TimelineEntry> {
    timeline::build(
      &self.scope,
      TimelineSources {
        actions:    &self.actions,
        complaints: &self.complaints,
        merges:     &self.merges,
        history:    &self.history,
      },
      audience,
      history,
    )
  }

  /// This case and every case merged into it.
  pub fn merged_case_ids(&self) -> impl Iterator<Item = CaseId> + '_ {
    self.merged.members_of(self.case.case_id)
  }

  fn own_complaints(&self) -> impl Iterator<Item = &Complaint> {
    self
      .complaints
      .iter()
      .filter(|c| self.scope.members().contains(&c.case_id))
  }

  /// Number of complaints across this case and those merged into it.
  pub fn reoccurrences(&self) -> usize { self.own_complaints().count() }

  /// Distinct reporters across this case and those merged into it.
  pub fn complainants(&self) -> BTreeSet<UserId> {
    self.own_complaints().map(|c| c.reporter).collect()
  }
}
