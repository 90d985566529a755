//! Gift Circle core.
//!
//! Four services share one [`GiftContext`]:
//! - [`LeadershipAssignment`] opens celebrations, picks and reassigns the gift leader
//! - [`ClaimLedger`] handles full claims and viewer projections
//! - [`SplitFundingEngine`] handles shared funding of one item
//! - [`ContributionLedger`] tracks free-form money toward a celebration target
//!
//! All atomicity comes from single calls on [`giftcircle_storage::GiftStorage`].
//! The services keep no state of their own between calls.

#![deny(unsafe_code)]

mod claims;
mod contributions;
mod directory;
mod error;
mod events;
mod leadership;
mod ports;
mod split;

pub use claims::{ClaimLedger, ItemView};
pub use contributions::ContributionLedger;
pub use directory::{InMemoryCatalog, InMemoryDirectory};
pub use error::{ErrorKind, GiftError, GiftResult};
pub use events::{BroadcastEventSink, NoopEventSink};
pub use leadership::LeadershipAssignment;
pub use ports::{EventSink, ItemCatalog, MembershipDirectory};
pub use split::SplitFundingEngine;

use giftcircle_storage::GiftStorage;
use std::sync::Arc;

/// Collaborators shared by every gift service.
#[derive(Clone)]
pub struct GiftContext {
    pub storage: Arc<dyn GiftStorage>,
    pub directory: Arc<dyn MembershipDirectory>,
    pub catalog: Arc<dyn ItemCatalog>,
    pub events: Arc<dyn EventSink>,
}

impl GiftContext {
    pub fn new(
        storage: Arc<dyn GiftStorage>,
        directory: Arc<dyn MembershipDirectory>,
        catalog: Arc<dyn ItemCatalog>,
    ) -> Self {
        Self {
            storage,
            directory,
            catalog,
            events: Arc::new(NoopEventSink),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }
}

/// Facade bundling the four gift services over one context.
#[derive(Clone)]
pub struct GiftCircle {
    context: GiftContext,
    leadership: LeadershipAssignment,
    claims: ClaimLedger,
    splits: SplitFundingEngine,
    contributions: ContributionLedger,
}

impl GiftCircle {
    pub fn new(context: GiftContext) -> Self {
        Self {
            leadership: LeadershipAssignment::new(context.clone()),
            claims: ClaimLedger::new(context.clone()),
            splits: SplitFundingEngine::new(context.clone()),
            contributions: ContributionLedger::new(context.clone()),
            context,
        }
    }

    pub fn context(&self) -> &GiftContext {
        &self.context
    }

    pub fn leadership(&self) -> &LeadershipAssignment {
        &self.leadership
    }

    pub fn claims(&self) -> &ClaimLedger {
        &self.claims
    }

    pub fn splits(&self) -> &SplitFundingEngine {
        &self.splits
    }

    pub fn contributions(&self) -> &ContributionLedger {
        &self.contributions
    }

    pub fn storage_backend(&self) -> &'static str {
        self.context.storage.backend_label()
    }
}
