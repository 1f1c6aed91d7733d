//! Restart scenarios: state written by one ledger is picked up by the next.

use rust_decimal_macros::dec;
use std::path::PathBuf;

use betbook::access::AccessControl;
use betbook::config::{LedgerConfig, OddsConfig};
use betbook::ledger::{Ledger, NewOption};
use betbook::storage::{delete_state, JsonFileStore};

fn temp_path() -> PathBuf {
    std::env::temp_dir().join(format!("betbook_it_{}.json", uuid::Uuid::new_v4()))
}

fn open(path: &PathBuf) -> Ledger {
    Ledger::open(
        Box::new(JsonFileStore::new(path)),
        LedgerConfig::default(),
        OddsConfig::default(),
    )
    .unwrap()
}

#[test]
fn open_bets_survive_restart_and_settle_later() {
    let path = temp_path();
    {
        let mut ledger = open(&path);
        let access = AccessControl::new(None);
        access.signup(&mut ledger, "alice", "pw", None).unwrap();
        let id = ledger
            .create_event("A vs B", &[NewOption::new("A"), NewOption::new("B")], None)
            .unwrap();
        ledger.place_bet("alice", id, 0, dec!(200)).unwrap();
    }

    let mut ledger = open(&path);
    let alice = ledger.find_user("alice").unwrap();
    assert_eq!(alice.balance, dec!(800));
    assert_eq!(alice.active_bets.len(), 1);
    assert_eq!(ledger.state().next_event_id, 2);

    ledger.close_event(1, 0).unwrap();
    drop(ledger);

    let ledger = open(&path);
    assert_eq!(ledger.find_user("alice").unwrap().balance, dec!(1010));
    assert!(!ledger.find_event(1).unwrap().is_open());

    delete_state(&path).unwrap();
}

#[test]
fn credentials_survive_restart_but_sessions_do_not() {
    let path = temp_path();
    let token = {
        let mut ledger = open(&path);
        let mut access = AccessControl::new(None);
        access.signup(&mut ledger, "alice", "hunter2", None).unwrap();
        access.login(&ledger, "alice", "hunter2").unwrap()
    };

    let ledger = open(&path);
    let mut access = AccessControl::new(None);
    assert!(access.resolve(&ledger, &token).is_err());
    assert!(access.login(&ledger, "alice", "hunter2").is_ok());

    delete_state(&path).unwrap();
}

#[test]
fn event_ids_keep_counting_after_restart() {
    let path = temp_path();
    {
        let mut ledger = open(&path);
        for title in ["one", "two"] {
            ledger
                .create_event(title, &[NewOption::new("x"), NewOption::new("y")], None)
                .unwrap();
        }
    }

    let mut ledger = open(&path);
    let id = ledger
        .create_event("three", &[NewOption::new("x"), NewOption::new("y")], None)
        .unwrap();
    assert_eq!(id, 3);

    delete_state(&path).unwrap();
}
