mod common;

use std::fs;

use battleship_ledger::{FileStore, LedgerChanged, LedgerStore, LedgerWatcher, WatchHandle};
use tokio::time::{timeout, Duration};

const POLL: Duration = Duration::from_millis(10);
const DEBOUNCE: Duration = Duration::from_millis(30);

#[test]
fn test_quiet_writes_become_known() {
    let path = common::scratch_file("quiet.game");
    fs::write(&path, "VERSION:1,0\n").unwrap();
    let handle = WatchHandle::new(&path);
    assert!(!handle.changed());

    let mut store = FileStore::new(&path);
    store.attach_watch(handle.clone());
    {
        let _quiet = handle.quiet();
        assert!(handle.is_suppressed());
        store.store("VERSION:1,0\nMESSAGE:1,mine\n").unwrap();
    }
    assert!(!handle.is_suppressed());
    assert!(!handle.changed());

    fs::write(&path, "VERSION:1,0\nMESSAGE:1,mine\nMESSAGE:2,theirs\n").unwrap();
    assert!(handle.changed());
}

#[test]
fn test_write_by_the_other_side_while_quiet_is_not_swallowed() {
    let path = common::scratch_file("overlap.game");
    fs::write(&path, "VERSION:1,0\n").unwrap();
    let handle = WatchHandle::new(&path);
    let mut store = FileStore::new(&path);
    store.attach_watch(handle.clone());
    {
        let _quiet = handle.quiet();
        store.store("VERSION:1,0\nMESSAGE:1,mine\n").unwrap();
        // lands after our lock was released but before the guard is gone
        fs::write(&path, "VERSION:1,0\nMESSAGE:1,mine\nMESSAGE:2,theirs\n").unwrap();
    }
    assert!(handle.changed());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_watcher_reports_external_change() {
    let path = common::scratch_file("external.game");
    fs::write(&path, "VERSION:1,0\n").unwrap();
    let handle = WatchHandle::new(&path);
    let (mut watcher, mut changes) = LedgerWatcher::spawn(handle.clone(), POLL, DEBOUNCE);

    // a burst of writes is reported once
    fs::write(&path, "VERSION:1,0\nMESSAGE:2,a\n").unwrap();
    fs::write(&path, "VERSION:1,0\nMESSAGE:2,a\nMESSAGE:2,b\n").unwrap();
    let event = timeout(Duration::from_secs(5), changes.recv())
        .await
        .expect("no change reported")
        .unwrap();
    assert_eq!(event, LedgerChanged(path.clone()));
    assert!(!handle.changed());
    assert!(timeout(Duration::from_millis(200), changes.recv())
        .await
        .is_err());

    watcher.close();
    assert!(watcher.is_closed());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_watcher_ignores_own_writes() {
    let path = common::scratch_file("own.game");
    fs::write(&path, "VERSION:1,0\n").unwrap();
    let handle = WatchHandle::new(&path);
    let (_watcher, mut changes) = LedgerWatcher::spawn(handle.clone(), POLL, DEBOUNCE);

    let mut store = FileStore::new(&path);
    store.attach_watch(handle.clone());
    {
        let _quiet = handle.quiet();
        store.store("VERSION:1,0\nMESSAGE:1,mine\n").unwrap();
    }
    assert!(timeout(Duration::from_millis(200), changes.recv())
        .await
        .is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_closed_watcher_goes_silent() {
    let path = common::scratch_file("closed.game");
    fs::write(&path, "VERSION:1,0\n").unwrap();
    let (mut watcher, mut changes) =
        LedgerWatcher::spawn(WatchHandle::new(&path), POLL, DEBOUNCE);
    watcher.close();
    fs::write(&path, "VERSION:1,0\nMESSAGE:2,late\n").unwrap();
    let next = timeout(Duration::from_secs(5), changes.recv())
        .await
        .expect("channel stayed open");
    assert_eq!(next, None);
}
