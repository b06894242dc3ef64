//! Error type for `noisecase-store-sqlite`.

use noisecase_core::CaseId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] noisecase_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A column held a value that does not decode to the expected type.
  #[error("cannot decode {column}: {value:?}")]
  Decode { column: &'static str, value: String },

  #[error("case not found: {0}")]
  CaseNotFound(CaseId),

  #[error("cannot merge case {0} into itself")]
  SelfMerge(CaseId),

  #[error("merging case {mergee} into {target} would create a merge cycle")]
  MergeCycle { mergee: CaseId, target: CaseId },
}

/// Domain rejections surface as their core counterparts; everything else is
/// wrapped as a backend failure.
impl From<Error> for noisecase_core::Error {
  fn from(err: Error) -> Self {
    match err {
      Error::Core(inner) => inner,
      Error::CaseNotFound(id) => Self::CaseNotFound(id),
      Error::SelfMerge(id) => Self::SelfMerge(id),
      Error::MergeCycle { mergee, target } => Self::MergeCycle { mergee, target },
      other => Self::store(other),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
