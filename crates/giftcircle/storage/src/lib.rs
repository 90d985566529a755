//! Gift Circle storage contract.
//!
//! Every atomicity guarantee the gift ledgers rely on is a property of a
//! single call on these traits:
//! - claim creation is compare-and-insert on "one active claim per item"
//! - a pledge validates against the frozen split target and flips the funded
//!   flag in the same write
//! - the leader pointer update is one write; the history append is a separate
//!   call the caller may treat as best-effort
//!
//! Backends:
//! - [`memory::InMemoryGiftStorage`] performs each conditional write under a
//!   single write lock (tests, local runs)
//! - `postgres::PostgresGiftStorage` (feature `postgres`) relies on primary
//!   keys and row locks inside transactions

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
mod model;
#[cfg(feature = "postgres")]
pub mod postgres;
mod traits;

pub use error::{StorageError, StorageResult};
pub use model::{
    compute_leadership_hash, settle_pledge, PledgeOutcome, PledgeReceipt, PledgeRejection,
    PledgeRequest, PledgeSettlement, ReleaseOutcome,
};
pub use traits::{
    CelebrationStore, ClaimStore, ContributionStore, GiftStorage, LeadershipHistoryStore,
    PledgeStore, QueryWindow,
};
