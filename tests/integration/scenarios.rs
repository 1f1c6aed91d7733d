//! Betting and settlement scenarios over the public ledger API.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use betbook::access::AccessControl;
use betbook::ledger::{Ledger, NewOption};
use betbook::types::{ErrorKind, LedgerError, OddsMode};
use betbook::views;

use crate::mock_store::MockStore;

const CODE: &str = "sesame";

fn two_way(ledger: &mut Ledger, title: &str) -> u64 {
    ledger
        .create_event(title, &[NewOption::new("A"), NewOption::new("B")], None)
        .unwrap()
}

fn signup(access: &AccessControl, ledger: &mut Ledger, names: &[&str]) {
    for name in names {
        access.signup(ledger, name, "pw", None).unwrap();
    }
}

#[test]
fn lone_winner_collects_full_payout() {
    let store = MockStore::new();
    let mut ledger = store.ledger();
    let access = AccessControl::new(Some(CODE.into()));
    access.signup(&mut ledger, "root", "pw", Some(CODE)).unwrap();
    signup(&access, &mut ledger, &["alice"]);
    let id = two_way(&mut ledger, "A vs B");

    assert_eq!(ledger.place_bet("alice", id, 0, dec!(200)).unwrap(), dec!(800));

    let report = ledger.close_event(id, 0).unwrap();
    assert_eq!(report.payout_rate, dec!(1.05));
    assert_eq!(report.total_paid_out, dec!(210));
    assert_eq!(ledger.find_user("alice").unwrap().balance, dec!(1010));
    assert!(ledger.find_user("alice").unwrap().active_bets.is_empty());

    let saved = store.last_snapshot().unwrap();
    assert_eq!(saved.user("alice").unwrap().balance, dec!(1010));
}

#[test]
fn split_pool_settles_at_frozen_dynamic_odds() {
    let mut ledger = MockStore::new().ledger();
    let access = AccessControl::new(None);
    signup(&access, &mut ledger, &["alice", "bob"]);
    let id = two_way(&mut ledger, "A vs B");

    ledger.place_bet("alice", id, 0, dec!(80)).unwrap();
    ledger.place_bet("bob", id, 1, dec!(20)).unwrap();

    let live: Vec<Decimal> = views::open_events(&ledger)[0]
        .options
        .iter()
        .map(|o| o.cote)
        .collect();
    assert_eq!(live, vec![dec!(1.18), dec!(4.75)]);

    let report = ledger.close_event(id, 1).unwrap();
    assert_eq!(report.winners(), 1);
    assert_eq!(report.losers(), 1);
    // 20 * 4.75 = 95
    assert_eq!(ledger.find_user("bob").unwrap().balance, dec!(1075));
    assert_eq!(ledger.find_user("alice").unwrap().balance, dec!(920));

    let event = ledger.find_event(id).unwrap();
    assert_eq!(event.options[0].cote, dec!(1.18));
    assert_eq!(event.options[1].cote, dec!(4.75));
}

#[test]
fn fixed_odds_ignore_the_pool() {
    let mut ledger = MockStore::new().ledger();
    let access = AccessControl::new(None);
    signup(&access, &mut ledger, &["alice", "bob"]);
    let id = ledger
        .create_event(
            "Derby",
            &[NewOption::with_cote("Home", dec!(2.1)), NewOption::with_cote("Away", dec!(2.5))],
            Some(OddsMode::Fixed),
        )
        .unwrap();

    ledger.place_bet("alice", id, 0, dec!(100)).unwrap();
    ledger.place_bet("bob", id, 0, dec!(300)).unwrap();
    ledger.close_event(id, 0).unwrap();

    assert_eq!(ledger.find_user("alice").unwrap().balance, dec!(1110));
    assert_eq!(ledger.find_user("bob").unwrap().balance, dec!(1330));
}

#[test]
fn blocked_user_is_rejected_without_mutation() {
    let store = MockStore::new();
    let mut ledger = store.ledger();
    let access = AccessControl::new(None);
    signup(&access, &mut ledger, &["bob"]);
    let id = two_way(&mut ledger, "A vs B");

    assert!(ledger.toggle_block("bob").unwrap());
    let saves = store.saves();

    let err = ledger.place_bet("bob", id, 0, dec!(10)).unwrap_err();
    assert!(matches!(err, LedgerError::UserBlocked(_)));
    assert_eq!(ledger.find_user("bob").unwrap().balance, dec!(1000));
    assert_eq!(ledger.find_event(id).unwrap().total_staked(), Decimal::ZERO);
    assert_eq!(store.saves(), saves);

    assert!(!ledger.toggle_block("bob").unwrap());
    assert!(ledger.place_bet("bob", id, 0, dec!(10)).is_ok());
}

#[test]
fn second_bet_on_same_event_conflicts() {
    let mut ledger = MockStore::new().ledger();
    let access = AccessControl::new(None);
    signup(&access, &mut ledger, &["alice"]);
    let id = two_way(&mut ledger, "A vs B");

    ledger.place_bet("alice", id, 0, dec!(10)).unwrap();
    for (option, amount) in [(0, dec!(10)), (1, dec!(5)), (1, dec!(5000))] {
        let err = ledger.place_bet("alice", id, option, amount).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);
    }
    assert_eq!(ledger.find_user("alice").unwrap().balance, dec!(990));
}

#[test]
fn second_close_changes_nothing() {
    let mut ledger = MockStore::new().ledger();
    let access = AccessControl::new(None);
    signup(&access, &mut ledger, &["alice", "bob"]);
    let id = two_way(&mut ledger, "A vs B");
    ledger.place_bet("alice", id, 0, dec!(100)).unwrap();
    ledger.place_bet("bob", id, 1, dec!(100)).unwrap();

    ledger.close_event(id, 0).unwrap();
    let balances: Vec<Decimal> = ledger.users().iter().map(|u| u.balance).collect();

    assert!(matches!(ledger.close_event(id, 1), Err(LedgerError::AlreadyClosed(_))));
    let after: Vec<Decimal> = ledger.users().iter().map(|u| u.balance).collect();
    assert_eq!(balances, after);
    assert_eq!(ledger.find_event(id).unwrap().winning_option, Some(0));
}

#[test]
fn betting_on_closed_event_is_rejected() {
    let mut ledger = MockStore::new().ledger();
    let access = AccessControl::new(None);
    signup(&access, &mut ledger, &["alice"]);
    let id = two_way(&mut ledger, "A vs B");
    ledger.close_event(id, 0).unwrap();

    assert!(matches!(
        ledger.place_bet("alice", id, 0, dec!(10)),
        Err(LedgerError::EventClosed(_))
    ));
}

#[test]
fn settlement_does_not_depend_on_user_order() {
    let names = ["u1", "u2", "u3", "u4", "u5"];
    let bets = [(0, dec!(120)), (1, dec!(45)), (2, dec!(300)), (1, dec!(75)), (0, dec!(10))];

    let settle = |order: &[usize]| {
        let mut ledger = MockStore::new().ledger();
        let access = AccessControl::new(None);
        for &i in order {
            access.signup(&mut ledger, names[i], "pw", None).unwrap();
        }
        let id = ledger
            .create_event(
                "Three way",
                &[NewOption::new("A"), NewOption::new("B"), NewOption::new("C")],
                None,
            )
            .unwrap();
        for &i in order {
            ledger.place_bet(names[i], id, bets[i].0, bets[i].1).unwrap();
        }
        let report = ledger.close_event(id, 1).unwrap();
        let mut balances: Vec<(String, Decimal)> = ledger
            .users()
            .iter()
            .map(|u| (u.username.clone(), u.balance))
            .collect();
        balances.sort();
        (balances, report.total_paid_out, report.total_lost)
    };

    assert_eq!(settle(&[0, 1, 2, 3, 4]), settle(&[4, 3, 2, 1, 0]));
    assert_eq!(settle(&[0, 1, 2, 3, 4]), settle(&[2, 0, 4, 1, 3]));
}

#[test]
fn leaderboard_shows_top_three_players() {
    let mut ledger = MockStore::new().ledger();
    let access = AccessControl::new(Some(CODE.into()));
    access.signup(&mut ledger, "root", "pw", Some(CODE)).unwrap();
    signup(&access, &mut ledger, &["alice", "bob", "carol", "dave"]);
    let id = two_way(&mut ledger, "A vs B");

    ledger.place_bet("alice", id, 0, dec!(500)).unwrap();
    ledger.place_bet("bob", id, 1, dec!(100)).unwrap();
    ledger.place_bet("carol", id, 1, dec!(50)).unwrap();
    ledger.close_event(id, 1).unwrap();

    let board = views::leaderboard(&ledger, 3);
    let names: Vec<&str> = board.iter().map(|e| e.username.as_str()).collect();
    assert_eq!(names, vec!["bob", "carol", "dave"]);
    assert!(board.windows(2).all(|w| w[0].balance >= w[1].balance));
}

#[test]
fn storage_failure_keeps_mutation_in_memory() {
    let store = MockStore::new();
    let mut ledger = store.ledger();
    let access = AccessControl::new(None);
    signup(&access, &mut ledger, &["alice"]);
    let id = two_way(&mut ledger, "A vs B");

    store.set_error("disk full");
    let err = ledger.place_bet("alice", id, 0, dec!(100)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert_eq!(err.to_string(), "Storage failure");
    assert_eq!(ledger.find_user("alice").unwrap().balance, dec!(900));
    assert_eq!(
        store.last_snapshot().unwrap().user("alice").unwrap().balance,
        dec!(1000)
    );

    store.clear_error();
    ledger.persist().unwrap();
    assert_eq!(
        store.last_snapshot().unwrap().user("alice").unwrap().balance,
        dec!(900)
    );
}
