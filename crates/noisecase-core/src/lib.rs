//! Core types and trait definitions for the noise-complaint case store.
//!
//! This crate holds the merge ledger, the merge-closure resolver, the
//! timeline aggregator and the lifecycle controller. It is free of database
//! dependencies; storage backends implement [`store::CaseStore`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod case;
pub mod closure;
pub mod error;
pub mod event;
pub mod history;
pub mod id;
pub mod lifecycle;
pub mod merge;
pub mod notify;
pub mod store;
pub mod timeline;
pub mod user;
pub mod view;

pub use error::{Error, Result};
pub use id::{ActionId, CaseId, ComplaintId, HistoryId, MergeRecordId, UserId};
