#![allow(dead_code)]

use giftcircle_core::{
    BroadcastEventSink, GiftCircle, GiftContext, InMemoryCatalog, InMemoryDirectory,
};
use giftcircle_storage::memory::InMemoryGiftStorage;
use giftcircle_storage::GiftStorage;
use giftcircle_types::{GroupId, GroupMember, ItemId, ItemListing, MemberId, NewCelebration};
use std::sync::Arc;

pub const GIFT: &str = "item-gift";
pub const BOOK: &str = "item-book";
pub const UNPRICED: &str = "item-unpriced";

pub struct Fixture {
    pub circle: GiftCircle,
    pub directory: Arc<InMemoryDirectory>,
    pub catalog: Arc<InMemoryCatalog>,
    pub events: BroadcastEventSink,
    pub group: GroupId,
}

impl Fixture {
    pub fn celebration_for(&self, celebrant: &str) -> NewCelebration {
        NewCelebration {
            group_id: self.group.clone(),
            celebrant_id: MemberId::new(celebrant),
            title: format!("{celebrant}'s birthday"),
            event_date: None,
            target_minor: Some(20_000),
        }
    }
}

pub fn member(id: &str) -> MemberId {
    MemberId::new(id)
}

pub fn item(id: &str) -> ItemId {
    ItemId::new(id)
}

/// Roster a(Jan 5), b(Mar 20), c(Mar 20), d(no birthday, admin).
/// Items are all owned by `a`.
pub fn fixture() -> Fixture {
    fixture_with_storage(Arc::new(InMemoryGiftStorage::new()))
}

pub fn fixture_with_storage(storage: Arc<dyn GiftStorage>) -> Fixture {
    let group = GroupId::new("g-friends");
    let directory = Arc::new(InMemoryDirectory::new());
    for entry in [
        GroupMember::new("a").with_birthday(1, 5),
        GroupMember::new("b").with_birthday(3, 20),
        GroupMember::new("c").with_birthday(3, 20),
        GroupMember::new("d"),
    ] {
        directory.upsert_member(&group, entry).unwrap();
    }
    directory.grant_admin(&group, &member("d")).unwrap();

    let catalog = Arc::new(InMemoryCatalog::new());
    for (id, price) in [(GIFT, Some(10_000)), (BOOK, Some(2_500)), (UNPRICED, None)] {
        catalog
            .upsert(ItemListing {
                item_id: item(id),
                owner_id: member("a"),
                price_minor: price,
            })
            .unwrap();
    }

    let events = BroadcastEventSink::new(64);
    let context = GiftContext::new(storage, directory.clone(), catalog.clone())
        .with_events(Arc::new(events.clone()));

    Fixture {
        circle: GiftCircle::new(context),
        directory,
        catalog,
        events,
        group,
    }
}
