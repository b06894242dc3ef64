//! Forward merge closure: which cases ultimately resolve into which.
//!
//! The forward closure follows the `Case::merged_into` pointers, not the
//! ledger: a case belongs to a root if its pointer chain reaches that root.
//! All pointers are loaded in one query into a graph and walked
//! breadth-first in process, so a batch of roots costs one round trip
//! regardless of chain length.

use std::collections::{BTreeMap, HashSet};

use petgraph::{
  algo::tarjan_scc,
  graphmap::DiGraphMap,
  visit::{Bfs, Reversed, VisitMap},
};
use serde::Serialize;

use crate::{
  id::CaseId,
  merge::{HopChain, MergeLedger},
  store::CaseStore,
};

/// Current `merged_into` pointers as a graph with one edge
/// mergee → target per merged case.
#[derive(Debug, Clone, Default)]
pub struct MergePointers {
  graph: DiGraphMap<CaseId, ()>,
}

impl MergePointers {
  /// Build from `(mergee, merged_into)` pairs.
  pub fn new(edges: impl IntoIterator<Item = (CaseId, CaseId)>) -> Self {
    let mut edges: Vec<_> = edges.into_iter().collect();
    edges.sort();
    Self { graph: DiGraphMap::from_edges(edges) }
  }

  /// Cases that sit on a pointer cycle.
  fn cyclic_cases(&self) -> HashSet<CaseId> {
    tarjan_scc(&self.graph)
      .into_iter()
      .filter(|scc| {
        scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0])
      })
      .flatten()
      .collect()
  }

  /// Forward closure for a batch of roots.
  ///
  /// Every root maps to itself. A case reachable from more than one root
  /// stays with the root that claimed it first (roots are processed in the
  /// order given, and a root always keeps itself).
  pub fn closure(&self, roots: &[CaseId]) -> ForwardClosure {
    let mut closure = ForwardClosure::default();
    for &root in roots {
      closure.roots.insert(root, root);
    }

    let cyclic = self.cyclic_cases();
    let reversed = Reversed(&self.graph);

    for &root in roots {
      if !self.graph.contains_node(root) {
        continue;
      }
      if cyclic.contains(&root) {
        tracing::warn!(
          root = %root,
          "merge pointers contain a cycle; truncating forward closure"
        );
        closure.truncated.push(root);
      }

      let mut bfs = Bfs::new(reversed, root);
      for &claimed in closure.roots.keys() {
        bfs.discovered.visit(claimed);
      }
      while let Some(mergee) = bfs.next(reversed) {
        if mergee != root {
          closure.roots.insert(mergee, root);
        }
      }
    }

    tracing::debug!(
      roots = roots.len(),
      cases = closure.roots.len(),
      "computed forward merge closure"
    );
    closure
  }
}

/// Mapping from every case in a merge chain to its ultimate root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ForwardClosure {
  roots:     BTreeMap<CaseId, CaseId>,
  truncated: Vec<CaseId>,
}

impl ForwardClosure {
  pub fn root_of(&self, case_id: CaseId) -> Option<CaseId> {
    self.roots.get(&case_id).copied()
  }

  /// All cases resolving to `root`, including `root` itself.
  pub fn members_of(&self, root: CaseId) -> impl Iterator<Item = CaseId> + '_ {
    self
      .roots
      .iter()
      .filter(move |(_, r)| **r == root)
      .map(|(c, _)| *c)
  }

  pub fn as_map(&self) -> &BTreeMap<CaseId, CaseId> { &self.roots }

  pub fn len(&self) -> usize { self.roots.len() }

  pub fn is_empty(&self) -> bool { self.roots.is_empty() }

  /// Cases at which a cycle cut the traversal short.
  pub fn truncated(&self) -> &[CaseId] { &self.truncated }
}

// ─── Store-backed resolution ─────────────────────────────────────────────────

/// Forward closure ("get merged cases") over the store's current pointers.
pub async fn resolve_merged_cases<S: CaseStore>(
  store: &S,
  roots: &[CaseId],
) -> Result<ForwardClosure, S::Error> {
  let pointers = MergePointers::new(store.merge_pointers().await?);
  Ok(pointers.closure(roots))
}

/// Backward closure ("get merged-into cases") over the store's ledger.
pub async fn resolve_merged_into_cases<S: CaseStore>(
  store: &S,
  case_ids: &[CaseId],
) -> Result<BTreeMap<CaseId, HopChain>, S::Error> {
  let ledger = MergeLedger::new(store.merge_ledger().await?);
  Ok(ledger.merged_into_cases(case_ids))
}
