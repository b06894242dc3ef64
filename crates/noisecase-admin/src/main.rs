//! noisecase operator binary.
//!
//! Reads `noisecase.toml` (or the path given with `--config`), opens the
//! SQLite store, runs one case operation and prints the result as JSON.
//!
//! ```text
//! noisecase --actor 1 merge 14 9
//! noisecase timeline 9 --audience public
//! ```

mod settings;

use std::{collections::HashSet, path::PathBuf, sync::Arc};

use anyhow::{Context as _, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use noisecase_core::{
  CaseId, UserId,
  case::{Estate, Location, NewCase, NoiseKind},
  closure::{resolve_merged_cases, resolve_merged_into_cases},
  event::{ActionType, NewAction, NewComplaint, Visibility},
  lifecycle::CaseLifecycle,
  merge::MergeLedger,
  store::CaseStore,
  timeline::{Audience, HistoryToShow},
  user::NewUser,
};
use noisecase_store_sqlite::SqliteStore;
use serde::Serialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::Settings;

#[derive(Parser)]
#[command(author, version, about = "Noise complaint case administration")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "noisecase.toml")]
  config: PathBuf,

  /// The staff member performing the operation.
  #[arg(long, env = "NOISECASE_ACTOR")]
  actor: Option<i64>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Register a staff member or reporter.
  AddUser {
    name:      String,
    #[arg(long)]
    email:     Option<String>,
    #[arg(long)]
    staff:     bool,
    /// Opt the user out of follower notifications.
    #[arg(long)]
    no_notify: bool,
  },
  /// Open a case from a report, with its first complaint.
  Submit {
    kind:        NoiseKind,
    /// Free text for `other` kinds.
    #[arg(long)]
    kind_other:  Option<String>,
    #[arg(long, requires = "lon")]
    lat:         Option<f64>,
    #[arg(long, requires = "lat")]
    lon:         Option<f64>,
    #[arg(long, default_value_t = 100)]
    radius:      u32,
    #[arg(long, conflicts_with = "lat", requires = "uprn")]
    address:     Option<String>,
    /// Gazetteer reference for `--address`.
    #[arg(long, requires = "address")]
    uprn:        Option<String>,
    #[arg(long)]
    ward:        Option<String>,
    #[arg(long, default_value = "unknown")]
    estate:      Estate,
    /// The reporting user.
    #[arg(long)]
    reporter:    i64,
    #[arg(long, default_value = "")]
    description: String,
  },
  /// Merge one case into another.
  Merge {
    mergee: i64,
    target: i64,
    /// Effective time (RFC 3339); defaults to now.
    #[arg(long)]
    at:     Option<DateTime<Utc>>,
  },
  /// Undo the current merge of a case.
  Unmerge { mergee: i64 },
  /// Report whether a merge of one case into another is in effect.
  Pair {
    mergee: i64,
    target: i64,
    /// Only consider records effective at or before this time (RFC 3339).
    #[arg(long)]
    at:     Option<DateTime<Utc>>,
  },
  Assign { case: i64, assignee: i64 },
  Close { case: i64 },
  Reopen { case: i64 },
  /// Log an action against a case.
  Action {
    case:        i64,
    name:        String,
    #[arg(long, default_value = "staff")]
    visibility:  Visibility,
    #[arg(long, default_value = "")]
    notes:       String,
    /// When the action happened (RFC 3339); defaults to now.
    #[arg(long)]
    at:          Option<DateTime<Utc>>,
    /// Mark the action as recording this case's merge into `case`.
    #[arg(long)]
    merged_from: Option<i64>,
  },
  /// Show both merge closures for the given cases.
  Closure {
    #[arg(required = true)]
    cases: Vec<i64>,
  },
  /// Show a case's timeline.
  Timeline {
    case:     i64,
    #[arg(long, default_value = "staff")]
    audience: Audience,
    /// Defaults to `all` for staff and `assigned` for the public.
    #[arg(long)]
    history:  Option<HistoryToShow>,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(&cli.config)?;

  let store = SqliteStore::open(&settings.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", settings.store_path))?;
  let store = Arc::new(store);
  let lifecycle =
    CaseLifecycle::new(Arc::clone(&store), Arc::clone(&store), settings.lifecycle);

  let actor = || -> anyhow::Result<UserId> {
    cli
      .actor
      .map(UserId)
      .context("this command needs --actor (or NOISECASE_ACTOR)")
  };

  match cli.command {
    Command::AddUser { name, email, staff, no_notify } => {
      let user = store
        .add_user(NewUser { name, email, is_staff: staff, notify: !no_notify })
        .await
        .context("failed to add user")?;
      print_json(&user)
    }

    Command::Submit {
      kind,
      kind_other,
      lat,
      lon,
      radius,
      address,
      uprn,
      ward,
      estate,
      reporter,
      description,
    } => {
      let location = match (lat, lon, address, uprn) {
        (Some(lat), Some(lon), ..) => Location::Point { lat, lon, radius },
        (.., Some(address), Some(uprn)) => Location::Address { uprn, address },
        _ => bail!("give either --lat/--lon or --address"),
      };
      let reporter = UserId(reporter);
      let now = Utc::now();
      let case = NewCase {
        kind_other,
        ward,
        estate,
        created_by: Some(reporter),
        ..NewCase::new(kind, location)
      };
      let complaint = NewComplaint {
        reporter,
        start: now,
        end: now,
        happening_now: true,
        description,
        effect: None,
      };
      let (case, _) = lifecycle
        .submit(case, complaint)
        .await
        .context("failed to submit case")?;
      print_json(&case)
    }

    Command::Merge { mergee, target, at } => {
      let record = lifecycle
        .merge_at(
          CaseId(mergee),
          CaseId(target),
          actor()?,
          at.unwrap_or_else(Utc::now),
        )
        .await
        .context("merge failed")?;
      print_json(&record)
    }

    Command::Unmerge { mergee } => {
      let record = lifecycle
        .unmerge(CaseId(mergee), actor()?)
        .await
        .context("unmerge failed")?;
      print_json(&record)
    }

    Command::Pair { mergee, target, at } => {
      let ledger = MergeLedger::new(
        store.merge_ledger().await.context("failed to load merge ledger")?,
      );
      let (mergee, merged_into) = (CaseId(mergee), CaseId(target));
      let active = match at {
        Some(at) => ledger.is_pair_active_at(mergee, merged_into, at),
        None => ledger.is_pair_active(mergee, merged_into),
      };

      #[derive(Serialize)]
      struct PairStatus {
        mergee:      CaseId,
        merged_into: CaseId,
        at:          Option<DateTime<Utc>>,
        active:      bool,
      }
      print_json(&PairStatus { mergee, merged_into, at, active })
    }

    Command::Assign { case, assignee } => {
      let case = lifecycle
        .assign(CaseId(case), UserId(assignee), actor()?)
        .await
        .context("assignment failed")?;
      print_json(&case)
    }

    Command::Close { case } => {
      let case = lifecycle
        .close(CaseId(case), actor()?)
        .await
        .context("failed to close case")?;
      print_json(&case)
    }

    Command::Reopen { case } => {
      let case = lifecycle
        .reopen(CaseId(case), actor()?)
        .await
        .context("failed to reopen case")?;
      print_json(&case)
    }

    Command::Action { case, name, visibility, notes, at, merged_from } => {
      let mut action =
        NewAction::new(CaseId(case), ActionType::new(name, visibility), actor()?)
          .notes(notes);
      action.time = at;
      if let Some(case_old) = merged_from {
        action = action.merged_from(CaseId(case_old));
      }
      let action = lifecycle
        .log_action(action)
        .await
        .context("failed to log action")?;
      print_json(&action)
    }

    Command::Closure { cases } => {
      let ids: Vec<CaseId> = cases.into_iter().map(CaseId).collect();
      let merged = resolve_merged_cases(store.as_ref(), &ids)
        .await
        .context("failed to resolve merged cases")?;
      let merged_into = resolve_merged_into_cases(store.as_ref(), &ids)
        .await
        .context("failed to resolve merged-into cases")?;
      let ledger = MergeLedger::new(
        store.merge_ledger().await.context("failed to load merge ledger")?,
      );
      let involved: HashSet<CaseId> = merged.as_map().keys().copied().collect();
      let active_merges: Vec<_> = ledger
        .active_records()
        .filter(|r| involved.contains(&r.mergee) || involved.contains(&r.merged_into))
        .collect();

      #[derive(Serialize)]
      struct Closures<T, U, V> {
        merged:        T,
        merged_into:   U,
        active_merges: V,
      }
      print_json(&Closures { merged, merged_into, active_merges })
    }

    Command::Timeline { case, audience, history } => {
      let view = lifecycle
        .view(CaseId(case))
        .await
        .context("failed to load case")?
        .with_context(|| format!("case {case} not found"))?;
      let history = history.unwrap_or(audience.default_history());
      print_json(&view.timeline_with(audience, history))
    }
  }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
  let out = serde_json::to_string_pretty(value).context("failed to encode output")?;
  println!("{out}");
  Ok(())
}
