//! Error types for `noisecase-core`.

use thiserror::Error;

use crate::id::{CaseId, UserId};

#[derive(Debug, Error)]
pub enum Error {
  #[error("case not found: {0}")]
  CaseNotFound(CaseId),

  #[error("user not found: {0}")]
  UserNotFound(UserId),

  #[error("cannot merge case {0} into itself")]
  SelfMerge(CaseId),

  #[error("case {0} is not currently merged into another case")]
  NotCurrentlyMerged(CaseId),

  /// The target's current merge chain already leads back to the mergee.
  #[error("merging case {mergee} into {target} would create a merge cycle")]
  MergeCycle { mergee: CaseId, target: CaseId },

  #[error("unknown {kind} variant: {value:?}")]
  UnknownVariant { kind: &'static str, value: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error.
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
