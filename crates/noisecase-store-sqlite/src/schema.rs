//! SQL schema for the SQLite case store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name      TEXT    NOT NULL,
    email     TEXT,
    is_staff  INTEGER NOT NULL DEFAULT 0,
    notify    INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS cases (
    case_id          INTEGER PRIMARY KEY AUTOINCREMENT,
    kind             TEXT    NOT NULL,          -- NoiseKind, snake_case
    kind_other       TEXT,
    location         TEXT    NOT NULL,          -- JSON-encoded Location
    ward             TEXT,
    estate           TEXT    NOT NULL DEFAULT 'unknown',
    closed           INTEGER NOT NULL DEFAULT 0,
    assigned         INTEGER REFERENCES users(user_id),
    merged_into      INTEGER REFERENCES cases(case_id),
    last_update_type TEXT,                      -- 'action' | 'complaint' | 'merge'
    created          TEXT    NOT NULL,          -- fixed-width RFC 3339 UTC
    created_by       INTEGER REFERENCES users(user_id),
    modified         TEXT    NOT NULL,
    modified_by      INTEGER REFERENCES users(user_id),
    CHECK (merged_into IS NULL OR merged_into != case_id)
);

CREATE TABLE IF NOT EXISTS case_followers (
    case_id  INTEGER NOT NULL REFERENCES cases(case_id),
    user_id  INTEGER NOT NULL REFERENCES users(user_id),
    PRIMARY KEY (case_id, user_id)
);

-- The merge ledger is strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS merge_records (
    merge_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    mergee       INTEGER NOT NULL REFERENCES cases(case_id),
    merged_into  INTEGER NOT NULL REFERENCES cases(case_id),
    unmerge      INTEGER NOT NULL DEFAULT 0,
    time         TEXT    NOT NULL,              -- user-supplied effective time
    created      TEXT    NOT NULL,
    created_by   INTEGER NOT NULL REFERENCES users(user_id),
    CHECK (mergee != merged_into)
);

CREATE TABLE IF NOT EXISTS actions (
    action_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    case_id     INTEGER NOT NULL REFERENCES cases(case_id),
    type_name   TEXT    NOT NULL,
    visibility  TEXT    NOT NULL,               -- 'public' | 'staff' | 'internal'
    notes       TEXT    NOT NULL DEFAULT '',
    files       TEXT    NOT NULL DEFAULT '[]',  -- JSON array of file names
    time        TEXT    NOT NULL,
    case_old    INTEGER REFERENCES cases(case_id),
    created     TEXT    NOT NULL,
    created_by  INTEGER NOT NULL REFERENCES users(user_id)
);

CREATE TABLE IF NOT EXISTS complaints (
    complaint_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    case_id        INTEGER NOT NULL REFERENCES cases(case_id),
    reporter       INTEGER NOT NULL REFERENCES users(user_id),
    period_start   TEXT    NOT NULL,
    period_end     TEXT    NOT NULL,
    happening_now  INTEGER NOT NULL DEFAULT 0,
    description    TEXT    NOT NULL DEFAULT '',
    effect         TEXT,
    created        TEXT    NOT NULL
);

-- One row per case save; a copy of the audited columns.
CREATE TABLE IF NOT EXISTS case_history (
    history_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    case_id       INTEGER NOT NULL REFERENCES cases(case_id),
    history_date  TEXT    NOT NULL,
    history_user  INTEGER REFERENCES users(user_id),
    kind          TEXT    NOT NULL,
    kind_other    TEXT,
    location      TEXT    NOT NULL,
    ward          TEXT,
    estate        TEXT    NOT NULL,
    assigned      INTEGER,
    closed        INTEGER NOT NULL,
    merged_into   INTEGER
);

CREATE TABLE IF NOT EXISTS notifications (
    notification_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    recipient        INTEGER NOT NULL REFERENCES users(user_id),
    case_id          INTEGER NOT NULL REFERENCES cases(case_id),
    channel          TEXT    NOT NULL,          -- 'notice' | 'email'
    message          TEXT    NOT NULL,
    created          TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS cases_merged_into_idx   ON cases(merged_into);
CREATE INDEX IF NOT EXISTS merge_records_pair_idx  ON merge_records(mergee, merged_into);
CREATE INDEX IF NOT EXISTS actions_case_idx        ON actions(case_id);
CREATE INDEX IF NOT EXISTS complaints_case_idx     ON complaints(case_id);
CREATE INDEX IF NOT EXISTS case_history_case_idx   ON case_history(case_id);
CREATE INDEX IF NOT EXISTS notifications_recipient ON notifications(recipient);

PRAGMA user_version = 1;
";
