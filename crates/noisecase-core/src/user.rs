//! Users: staff members and reporters.
//!
//! Authentication lives elsewhere; the case store only keeps what it needs
//! to attribute changes and route notifications.

use serde::{Deserialize, Serialize};

use crate::id::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub user_id:  UserId,
  pub name:     String,
  pub email:    Option<String>,
  pub is_staff: bool,
  /// `false` if the user has turned off case notifications.
  pub notify:   bool,
}

/// Input to [`crate::store::CaseStore::add_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
  pub name:     String,
  pub email:    Option<String>,
  pub is_staff: bool,
  pub notify:   bool,
}

impl NewUser {
  pub fn staff(name: impl Into<String>, email: impl Into<String>) -> Self {
    Self {
      name:     name.into(),
      email:    Some(email.into()),
      is_staff: true,
      notify:   true,
    }
  }

  pub fn reporter(name: impl Into<String>) -> Self {
    Self { name: name.into(), email: None, is_staff: false, notify: true }
  }
}
