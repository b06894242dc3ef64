//! The notification seam.
//!
//! The lifecycle controller hands notifications to a [`Notifier`] after the
//! underlying change has been committed. Delivery is best-effort: a failure
//! is logged and never undoes the change.

use std::{convert::Infallible, future::Future};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::id::{CaseId, UserId};

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
pub enum Channel {
  /// An in-app notice.
  Notice,
  Email,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
  pub recipient: UserId,
  pub case_id:   CaseId,
  pub message:   String,
  pub channel:   Channel,
}

pub trait Notifier: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn notify(
    &self,
    notification: Notification,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

/// A notifier that only writes a log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
  type Error = Infallible;

  async fn notify(&self, notification: Notification) -> Result<(), Infallible> {
    tracing::info!(
      recipient = %notification.recipient,
      case_id = %notification.case_id,
      channel = %notification.channel,
      "{}",
      notification.message
    );
    Ok(())
  }
}
