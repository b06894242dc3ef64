//! [`SqliteStore`]: the SQLite implementation of [`CaseStore`].

use std::path::Path;

use chrono::Utc;
use noisecase_core::{
  CaseId, UserId,
  case::{Case, CaseEdit, LastUpdateType, NewCase},
  event::{Action, Complaint, NewAction, NewComplaint},
  history::HistoricalCase,
  merge::{MergeRecord, NewMergeRecord},
  notify::{Notification, Notifier},
  store::CaseStore,
  user::{NewUser, User},
};
use rusqlite::{OptionalExtension as _, params, params_from_iter};

use crate::{
  Error, Result,
  encode::{
    ACTION_COLUMNS, CASE_COLUMNS, COMPLAINT_COLUMNS, HISTORY_COLUMNS,
    MERGE_COLUMNS, NOTIFICATION_COLUMNS, RawAction, RawCase, RawComplaint,
    RawHistory, RawMergeRecord, RawNotification, RawUser, USER_COLUMNS,
    encode_dt, encode_files, encode_location, placeholders,
  },
  schema::SCHEMA,
};

// ─── Row helpers ─────────────────────────────────────────────────────────────

fn select_case(
  conn: &rusqlite::Connection,
  case_id: i64,
) -> rusqlite::Result<Option<RawCase>> {
  conn
    .query_row(
      &format!("SELECT {CASE_COLUMNS} FROM cases WHERE case_id = ?1"),
      params![case_id],
      RawCase::from_row,
    )
    .optional()
}

/// Copy the audited columns of a case into `case_history`.
fn snapshot_case(
  conn: &rusqlite::Connection,
  case_id: i64,
  at: &str,
  user: Option<i64>,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO case_history (
       case_id, history_date, history_user, kind, kind_other, location,
       ward, estate, assigned, closed, merged_into
     )
     SELECT case_id, ?2, ?3, kind, kind_other, location,
            ward, estate, assigned, closed, merged_into
     FROM cases WHERE case_id = ?1",
    params![case_id, at, user],
  )?;
  Ok(())
}

/// Run `SELECT {columns} FROM {table} WHERE {key} IN (ids) {order}`.
fn select_in<T>(
  conn: &rusqlite::Connection,
  columns: &str,
  table: &str,
  key: &str,
  ids: &[i64],
  order: &str,
  map: fn(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
) -> rusqlite::Result<Vec<T>> {
  let sql = format!(
    "SELECT {columns} FROM {table} WHERE {key} IN ({}) {order}",
    placeholders(ids.len())
  );
  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt
    .query_map(params_from_iter(ids.iter()), map)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

fn case_ids(ids: &[CaseId]) -> Vec<i64> { ids.iter().map(|id| id.get()).collect() }

// ─── Store ───────────────────────────────────────────────────────────────────

/// A case store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Notifications recorded for `user`, oldest first.
  pub async fn notifications_for(&self, user: UserId) -> Result<Vec<Notification>> {
    let user_id = user.get();
    let raws: Vec<RawNotification> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {NOTIFICATION_COLUMNS} FROM notifications
           WHERE recipient = ?1 ORDER BY notification_id"
        ))?;
        let rows = stmt
          .query_map(params![user_id], RawNotification::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawNotification::into_notification).collect()
  }

  /// Apply a single-case UPDATE, snapshot the result and return the case.
  ///
  /// `apply` receives the open transaction and the case id, and returns the
  /// number of rows it changed; zero means the case does not exist.
  async fn update_case<F>(
    &self,
    id: CaseId,
    actor: Option<UserId>,
    apply: F,
  ) -> Result<Case>
  where
    F: FnOnce(&rusqlite::Connection, i64) -> rusqlite::Result<usize>
      + Send
      + 'static,
  {
    let case_id = id.get();
    let actor = actor.map(UserId::get);
    let now = encode_dt(Utc::now());

    let raw: Option<RawCase> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if apply(&*tx, case_id)? == 0 {
          return Ok(None);
        }
        tx.execute(
          "UPDATE cases SET modified = ?2, modified_by = ?3 WHERE case_id = ?1",
          params![case_id, now, actor],
        )?;
        snapshot_case(&tx, case_id, &now, actor)?;
        let raw = select_case(&tx, case_id)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.ok_or(Error::CaseNotFound(id))?.into_case()
  }

  /// Append a merge or unmerge record together with its side effects on the
  /// two cases, in one transaction.
  ///
  /// A merge of a case that currently points elsewhere first appends an
  /// unmerge for the old pair, so the ledger never holds two active merges
  /// for one mergee. A merge whose target's pointer chain already reaches
  /// the mergee is rejected.
  async fn append_merge(
    &self,
    input: NewMergeRecord,
    unmerge: bool,
  ) -> Result<MergeRecord> {
    if input.mergee == input.merged_into {
      return Err(Error::SelfMerge(input.mergee));
    }

    let mergee = input.mergee.get();
    let target = input.merged_into.get();
    let actor = input.actor.get();
    let time = encode_dt(input.time);
    let now = encode_dt(Utc::now());

    let outcome: std::result::Result<RawMergeRecord, Rejected> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut pointer = None;
        for id in [mergee, target] {
          let row: Option<Option<i64>> = tx
            .query_row(
              "SELECT merged_into FROM cases WHERE case_id = ?1",
              params![id],
              |row| row.get(0),
            )
            .optional()?;
          let Some(merged_into) = row else {
            return Ok(Err(Rejected::Missing(id)));
          };
          if id == mergee {
            pointer = merged_into;
          }
        }

        if !unmerge {
          let closes_loop: bool = tx.query_row(
            "WITH RECURSIVE chain(case_id) AS (
               SELECT ?1
               UNION
               SELECT cases.merged_into FROM cases
               JOIN chain ON cases.case_id = chain.case_id
               WHERE cases.merged_into IS NOT NULL
             )
             SELECT EXISTS (SELECT 1 FROM chain WHERE case_id = ?2)",
            params![target, mergee],
            |row| row.get(0),
          )?;
          if closes_loop {
            return Ok(Err(Rejected::Cycle));
          }

          if let Some(previous) = pointer.filter(|&p| p != target) {
            tx.execute(
              "INSERT INTO merge_records
                 (mergee, merged_into, unmerge, time, created, created_by)
               VALUES (?1, ?2, 1, ?3, ?4, ?5)",
              params![mergee, previous, time, now, actor],
            )?;
          }
        }

        tx.execute(
          "INSERT INTO merge_records
             (mergee, merged_into, unmerge, time, created, created_by)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          params![mergee, target, unmerge, time, now, actor],
        )?;
        let merge_id = tx.last_insert_rowid();

        // The pointer is a cache of the ledger: an unmerge only clears it
        // when it still points at this target.
        let repointed = if unmerge {
          tx.execute(
            "UPDATE cases SET merged_into = NULL, modified = ?3, modified_by = ?4
             WHERE case_id = ?1 AND merged_into = ?2",
            params![mergee, target, now, actor],
          )?
        } else {
          tx.execute(
            "UPDATE cases SET merged_into = ?2, modified = ?3, modified_by = ?4
             WHERE case_id = ?1",
            params![mergee, target, now, actor],
          )?
        };
        if repointed > 0 {
          snapshot_case(&tx, mergee, &now, Some(actor))?;
        }

        tx.execute(
          "UPDATE cases SET last_update_type = ?2, modified = ?3, modified_by = ?4
           WHERE case_id = ?1",
          params![target, LastUpdateType::Merge.as_ref(), now, actor],
        )?;

        let raw = tx.query_row(
          &format!("SELECT {MERGE_COLUMNS} FROM merge_records WHERE merge_id = ?1"),
          params![merge_id],
          RawMergeRecord::from_row,
        )?;
        tx.commit()?;
        Ok(Ok(raw))
      })
      .await?;

    match outcome {
      Ok(raw) => raw.into_record(),
      Err(Rejected::Missing(id)) => Err(Error::CaseNotFound(CaseId(id))),
      Err(Rejected::Cycle) => Err(Error::MergeCycle {
        mergee: input.mergee,
        target: input.merged_into,
      }),
    }
  }
}

/// Why a merge transaction rolled back without writing.
enum Rejected {
  Missing(i64),
  Cycle,
}

// ─── CaseStore impl ──────────────────────────────────────────────────────────

impl CaseStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn add_user(&self, input: NewUser) -> Result<User> {
    let raw: RawUser = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (name, email, is_staff, notify) VALUES (?1, ?2, ?3, ?4)",
          params![input.name, input.email, input.is_staff, input.notify],
        )?;
        let id = conn.last_insert_rowid();
        Ok(conn.query_row(
          &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
          params![id],
          RawUser::from_row,
        )?)
      })
      .await?;

    Ok(raw.into_user())
  }

  async fn get_user(&self, id: UserId) -> Result<Option<User>> {
    let user_id = id.get();
    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
              params![user_id],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    Ok(raw.map(RawUser::into_user))
  }

  async fn get_users(&self, ids: &[UserId]) -> Result<Vec<User>> {
    if ids.is_empty() {
      return Ok(Vec::new());
    }
    let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
    let raws: Vec<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(select_in(
          conn,
          USER_COLUMNS,
          "users",
          "user_id",
          &ids,
          "ORDER BY user_id",
          RawUser::from_row,
        )?)
      })
      .await?;

    Ok(raws.into_iter().map(RawUser::into_user).collect())
  }

  // ── Cases ─────────────────────────────────────────────────────────────────

  async fn create_case(&self, input: NewCase) -> Result<Case> {
    let kind = input.kind.as_ref().to_owned();
    let location = encode_location(&input.location)?;
    let estate = input.estate.as_ref().to_owned();
    let assigned = input.assigned.map(UserId::get);
    let created_by = input.created_by.map(UserId::get);
    let kind_other = input.kind_other;
    let ward = input.ward;
    let now = encode_dt(Utc::now());

    let raw: RawCase = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO cases (
             kind, kind_other, location, ward, estate, closed, assigned,
             created, created_by, modified, modified_by
           ) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7, ?8, ?7, ?8)",
          params![kind, kind_other, location, ward, estate, assigned, now, created_by],
        )?;
        let case_id = tx.last_insert_rowid();

        for follower in created_by.into_iter().chain(assigned) {
          tx.execute(
            "INSERT OR IGNORE INTO case_followers (case_id, user_id) VALUES (?1, ?2)",
            params![case_id, follower],
          )?;
        }
        snapshot_case(&tx, case_id, &now, created_by)?;

        let raw = tx.query_row(
          &format!("SELECT {CASE_COLUMNS} FROM cases WHERE case_id = ?1"),
          params![case_id],
          RawCase::from_row,
        )?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    let case = raw.into_case()?;
    tracing::debug!(case_id = %case.case_id, "created case");
    Ok(case)
  }

  async fn get_case(&self, id: CaseId) -> Result<Option<Case>> {
    let case_id = id.get();
    let raw: Option<RawCase> = self
      .conn
      .call(move |conn| Ok(select_case(conn, case_id)?))
      .await?;

    raw.map(RawCase::into_case).transpose()
  }

  async fn get_cases(&self, ids: &[CaseId]) -> Result<Vec<Case>> {
    if ids.is_empty() {
      return Ok(Vec::new());
    }
    let ids = case_ids(ids);
    let raws: Vec<RawCase> = self
      .conn
      .call(move |conn| {
        Ok(select_in(
          conn,
          CASE_COLUMNS,
          "cases",
          "case_id",
          &ids,
          "ORDER BY case_id",
          RawCase::from_row,
        )?)
      })
      .await?;

    raws.into_iter().map(RawCase::into_case).collect()
  }

  async fn edit_case(
    &self,
    id: CaseId,
    edit: CaseEdit,
    actor: Option<UserId>,
  ) -> Result<Case> {
    let mut case = self.get_case(id).await?.ok_or(Error::CaseNotFound(id))?;
    if !edit.apply(&mut case) {
      return Ok(case);
    }

    let kind = case.kind.as_ref().to_owned();
    let kind_other = case.kind_other;
    let location = encode_location(&case.location)?;
    let ward = case.ward;
    let estate = case.estate.as_ref().to_owned();

    self
      .update_case(id, actor, move |conn, case_id| {
        conn.execute(
          "UPDATE cases
           SET kind = ?2, kind_other = ?3, location = ?4, ward = ?5, estate = ?6
           WHERE case_id = ?1",
          params![case_id, kind, kind_other, location, ward, estate],
        )
      })
      .await
  }

  async fn set_assignee(
    &self,
    id: CaseId,
    assignee: Option<UserId>,
    actor: Option<UserId>,
  ) -> Result<Case> {
    let assignee = assignee.map(UserId::get);
    self
      .update_case(id, actor, move |conn, case_id| {
        let changed = conn.execute(
          "UPDATE cases SET assigned = ?2 WHERE case_id = ?1",
          params![case_id, assignee],
        )?;
        if let (true, Some(user)) = (changed > 0, assignee) {
          conn.execute(
            "INSERT OR IGNORE INTO case_followers (case_id, user_id) VALUES (?1, ?2)",
            params![case_id, user],
          )?;
        }
        Ok(changed)
      })
      .await
  }

  async fn set_closed(
    &self,
    id: CaseId,
    closed: bool,
    actor: Option<UserId>,
  ) -> Result<Case> {
    self
      .update_case(id, actor, move |conn, case_id| {
        conn.execute(
          "UPDATE cases SET closed = ?2 WHERE case_id = ?1",
          params![case_id, closed],
        )
      })
      .await
  }

  async fn followers(&self, id: CaseId) -> Result<Vec<UserId>> {
    let case_id = id.get();
    let ids: Vec<i64> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT user_id FROM case_followers WHERE case_id = ?1 ORDER BY user_id",
        )?;
        let rows = stmt
          .query_map(params![case_id], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(ids.into_iter().map(UserId).collect())
  }

  async fn add_follower(&self, id: CaseId, user: UserId) -> Result<()> {
    let (case_id, user_id) = (id.get(), user.get());
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO case_followers (case_id, user_id) VALUES (?1, ?2)",
          params![case_id, user_id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Merge ledger ──────────────────────────────────────────────────────────

  async fn record_merge(&self, input: NewMergeRecord) -> Result<MergeRecord> {
    self.append_merge(input, false).await
  }

  async fn record_unmerge(&self, input: NewMergeRecord) -> Result<MergeRecord> {
    self.append_merge(input, true).await
  }

  async fn is_pair_active(&self, mergee: CaseId, merged_into: CaseId) -> Result<bool> {
    let (mergee, target) = (mergee.get(), merged_into.get());
    let latest_is_unmerge: Option<bool> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT unmerge FROM merge_records
               WHERE mergee = ?1 AND merged_into = ?2
               ORDER BY merge_id DESC LIMIT 1",
              params![mergee, target],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    Ok(latest_is_unmerge == Some(false))
  }

  async fn merge_pointers(&self) -> Result<Vec<(CaseId, CaseId)>> {
    let rows: Vec<(i64, i64)> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT case_id, merged_into FROM cases WHERE merged_into IS NOT NULL",
        )?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(rows.into_iter().map(|(a, b)| (CaseId(a), CaseId(b))).collect())
  }

  async fn merge_ledger(&self) -> Result<Vec<MergeRecord>> {
    let raws: Vec<RawMergeRecord> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {MERGE_COLUMNS} FROM merge_records ORDER BY merge_id"
        ))?;
        let rows = stmt
          .query_map([], RawMergeRecord::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMergeRecord::into_record).collect()
  }

  // ── Events ────────────────────────────────────────────────────────────────

  async fn add_action(&self, input: NewAction) -> Result<Action> {
    let case_id = input.case_id.get();
    let type_name = input.action_type.name;
    let visibility = input.action_type.visibility.as_ref().to_owned();
    let notes = input.notes;
    let files = encode_files(&input.files)?;
    let case_old = input.case_old.map(CaseId::get);
    let actor = input.actor.get();
    let now_dt = Utc::now();
    let now = encode_dt(now_dt);
    let time = encode_dt(input.time.unwrap_or(now_dt));

    let raw: Option<RawAction> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let modified: Option<String> = tx
          .query_row(
            "SELECT modified FROM cases WHERE case_id = ?1",
            params![case_id],
            |row| row.get(0),
          )
          .optional()?;
        let Some(modified) = modified else {
          return Ok(None);
        };

        tx.execute(
          "INSERT INTO actions (
             case_id, type_name, visibility, notes, files, time, case_old,
             created, created_by
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          params![case_id, type_name, visibility, notes, files, time, case_old, now, actor],
        )?;
        let action_id = tx.last_insert_rowid();

        // A backdated action is a historical entry and leaves the case's
        // last update alone. Fixed-width timestamps compare as strings.
        if time >= modified {
          tx.execute(
            "UPDATE cases SET last_update_type = ?2, modified = ?3, modified_by = ?4
             WHERE case_id = ?1",
            params![case_id, LastUpdateType::Action.as_ref(), now, actor],
          )?;
        }

        let raw = tx.query_row(
          &format!("SELECT {ACTION_COLUMNS} FROM actions WHERE action_id = ?1"),
          params![action_id],
          RawAction::from_row,
        )?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await?;

    raw.ok_or(Error::CaseNotFound(input.case_id))?.into_action()
  }

  async fn add_complaint(
    &self,
    case_id: CaseId,
    input: NewComplaint,
  ) -> Result<Complaint> {
    let id = case_id.get();
    let reporter = input.reporter.get();
    let start = encode_dt(input.start);
    let end = encode_dt(input.end);
    let now = encode_dt(Utc::now());

    let raw: Option<RawComplaint> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let touched = tx.execute(
          "UPDATE cases SET last_update_type = ?2, modified = ?3, modified_by = ?4
           WHERE case_id = ?1",
          params![id, LastUpdateType::Complaint.as_ref(), now, reporter],
        )?;
        if touched == 0 {
          return Ok(None);
        }

        tx.execute(
          "INSERT INTO complaints (
             case_id, reporter, period_start, period_end, happening_now,
             description, effect, created
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          params![
            id,
            reporter,
            start,
            end,
            input.happening_now,
            input.description,
            input.effect,
            now,
          ],
        )?;
        let complaint_id = tx.last_insert_rowid();

        let raw = tx.query_row(
          &format!("SELECT {COMPLAINT_COLUMNS} FROM complaints WHERE complaint_id = ?1"),
          params![complaint_id],
          RawComplaint::from_row,
        )?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await?;

    raw.ok_or(Error::CaseNotFound(case_id))?.into_complaint()
  }

  async fn actions_for(&self, ids: &[CaseId]) -> Result<Vec<Action>> {
    if ids.is_empty() {
      return Ok(Vec::new());
    }
    let ids = case_ids(ids);
    let raws: Vec<RawAction> = self
      .conn
      .call(move |conn| {
        Ok(select_in(
          conn,
          ACTION_COLUMNS,
          "actions",
          "case_id",
          &ids,
          "ORDER BY action_id",
          RawAction::from_row,
        )?)
      })
      .await?;

    raws.into_iter().map(RawAction::into_action).collect()
  }

  async fn complaints_for(&self, ids: &[CaseId]) -> Result<Vec<Complaint>> {
    if ids.is_empty() {
      return Ok(Vec::new());
    }
    let ids = case_ids(ids);
    let raws: Vec<RawComplaint> = self
      .conn
      .call(move |conn| {
        Ok(select_in(
          conn,
          COMPLAINT_COLUMNS,
          "complaints",
          "case_id",
          &ids,
          "ORDER BY complaint_id",
          RawComplaint::from_row,
        )?)
      })
      .await?;

    raws.into_iter().map(RawComplaint::into_complaint).collect()
  }

  async fn history_for(&self, ids: &[CaseId]) -> Result<Vec<HistoricalCase>> {
    if ids.is_empty() {
      return Ok(Vec::new());
    }
    let ids = case_ids(ids);
    let raws: Vec<RawHistory> = self
      .conn
      .call(move |conn| {
        Ok(select_in(
          conn,
          HISTORY_COLUMNS,
          "case_history",
          "case_id",
          &ids,
          "ORDER BY history_id",
          RawHistory::from_row,
        )?)
      })
      .await?;

    raws.into_iter().map(RawHistory::into_history).collect()
  }
}

// ─── Notifier impl ───────────────────────────────────────────────────────────

/// Persists notifications for the in-app inbox and the outbound mailer.
impl Notifier for SqliteStore {
  type Error = Error;

  async fn notify(&self, notification: Notification) -> Result<()> {
    let recipient = notification.recipient.get();
    let case_id = notification.case_id.get();
    let channel = notification.channel.as_ref().to_owned();
    let message = notification.message;
    let now = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO notifications (recipient, case_id, channel, message, created)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          params![recipient, case_id, channel, message, now],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
