//! Property tests: leader rotation never picks the celebrant, always picks a
//! roster member, and is deterministic regardless of input order.

use giftcircle_rotation::{plan_next_leader, rotation_order};
use giftcircle_types::{GroupMember, MemberId};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_birthday() -> impl Strategy<Value = (Option<u32>, Option<u32>)> {
    prop_oneof![
        Just((None, None)),
        (1u32..=12, 1u32..=31).prop_map(|(m, d)| (Some(m), Some(d))),
        (0u32..=14).prop_map(|m| (Some(m), None)),
        (0u32..=14, 0u32..=40).prop_map(|(m, d)| (Some(m), Some(d))),
    ]
}

/// Rosters with unique ids, 2..12 members.
fn arb_roster() -> impl Strategy<Value = Vec<GroupMember>> {
    prop::collection::btree_set("[a-z]{1,6}", 2..12).prop_flat_map(|ids| {
        let ids: Vec<String> = ids.into_iter().collect();
        let len = ids.len();
        prop::collection::vec(arb_birthday(), len).prop_map(move |birthdays| {
            ids.iter()
                .zip(birthdays)
                .map(|(id, (month, day))| GroupMember {
                    id: MemberId::new(id.clone()),
                    birthday_month: month,
                    birthday_day: day,
                })
                .collect::<Vec<_>>()
        })
    })
}

/// A roster plus the index of the celebrant within it.
fn arb_roster_with_celebrant() -> impl Strategy<Value = (Vec<GroupMember>, usize)> {
    arb_roster().prop_flat_map(|roster| {
        let len = roster.len();
        (Just(roster), 0..len)
    })
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn leader_is_a_member_and_never_the_celebrant((roster, idx) in arb_roster_with_celebrant()) {
        let celebrant = roster[idx].id.clone();
        let leader = plan_next_leader(&roster, &celebrant).unwrap();

        prop_assert_ne!(&leader, &celebrant);
        prop_assert!(roster.iter().any(|member| member.id == leader));
    }

    #[test]
    fn planning_is_deterministic((roster, idx) in arb_roster_with_celebrant()) {
        let celebrant = roster[idx].id.clone();
        let first = plan_next_leader(&roster, &celebrant).unwrap();
        let second = plan_next_leader(&roster, &celebrant).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn input_order_does_not_matter((roster, idx) in arb_roster_with_celebrant()) {
        let celebrant = roster[idx].id.clone();
        let mut reversed = roster.clone();
        reversed.reverse();

        prop_assert_eq!(
            plan_next_leader(&roster, &celebrant).unwrap(),
            plan_next_leader(&reversed, &celebrant).unwrap()
        );
        prop_assert_eq!(rotation_order(&roster), rotation_order(&reversed));
    }

    #[test]
    fn two_member_groups_pick_the_other_member(
        a in arb_birthday(),
        b in arb_birthday(),
        celebrant_first in any::<bool>(),
    ) {
        let roster = vec![
            GroupMember { id: MemberId::new("first"), birthday_month: a.0, birthday_day: a.1 },
            GroupMember { id: MemberId::new("second"), birthday_month: b.0, birthday_day: b.1 },
        ];
        let (celebrant, other) = if celebrant_first {
            (MemberId::new("first"), MemberId::new("second"))
        } else {
            (MemberId::new("second"), MemberId::new("first"))
        };

        prop_assert_eq!(plan_next_leader(&roster, &celebrant).unwrap(), other);
    }

    #[test]
    fn every_member_leads_exactly_once_per_cycle(roster in arb_roster()) {
        let mut leaders: Vec<MemberId> = roster
            .iter()
            .map(|member| plan_next_leader(&roster, &member.id).unwrap())
            .collect();
        leaders.sort();
        let mut ids: Vec<MemberId> = roster.iter().map(|member| member.id.clone()).collect();
        ids.sort();
        prop_assert_eq!(leaders, ids);
    }
}
