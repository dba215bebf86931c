use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use chrome_debug::AsyncDebugger;
use chrome_debug::ClientConfig;
use chrome_debug::ClientError;
use chrome_debug::Command;
use chrome_debug::MockTransport;
use serde_json::json;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

#[test]
fn test_send_returns_identifier_without_blocking() {
    let (reader, writer, remote) = MockTransport::pair();
    let debugger = AsyncDebugger::over(reader, writer, ClientConfig::default()).unwrap();

    let id = debugger.send(Command::new("Page.enable")).unwrap();
    assert_eq!(id, 1);
    assert_eq!(debugger.send(Command::new("DOM.enable")).unwrap(), 2);

    remote.push_json(json!({"id": 1, "result": {"ok": true}}));
    let result = debugger.results().recv_timeout(RECV_TIMEOUT).unwrap();
    assert_eq!(result.id, 1);
    assert_eq!(result.request.unwrap().method, "Page.enable");
}

#[test]
fn test_replies_split_across_result_and_error_channels() {
    let (reader, writer, remote) = MockTransport::pair();
    let debugger = AsyncDebugger::over(reader, writer, ClientConfig::default()).unwrap();

    debugger.send(Command::new("Page.enable")).unwrap();
    debugger.send(Command::new("Page.bogus")).unwrap();

    remote.push_json(json!({"id": 1, "result": {}}));
    remote.push_json(json!({
        "id": 2,
        "error": {"code": -32601, "message": "Method not found"}
    }));

    let result = debugger.results().recv_timeout(RECV_TIMEOUT).unwrap();
    assert_eq!(result.id, 1);

    let error = debugger.errors().recv_timeout(RECV_TIMEOUT).unwrap();
    assert_eq!(error.id, 2);
    assert_eq!(error.request.unwrap().method, "Page.bogus");

    // each reply is delivered exactly once
    assert!(debugger.results().try_recv().is_err());
    assert!(debugger.errors().try_recv().is_err());
}

#[test]
fn test_notification_only_on_the_command_channel() {
    let (reader, writer, remote) = MockTransport::pair();
    let debugger = AsyncDebugger::over(reader, writer, ClientConfig::default()).unwrap();

    remote.push_json(json!({"method": "Network.requestWillBeSent", "params": {}}));

    let notification = debugger.commands().recv_timeout(RECV_TIMEOUT).unwrap();
    assert_eq!(notification.method, "Network.requestWillBeSent");
    assert!(debugger.results().try_recv().is_err());
    assert!(debugger.errors().try_recv().is_err());
}

#[test]
fn test_unknown_identifier_omits_back_reference() {
    let (reader, writer, remote) = MockTransport::pair();
    let debugger = AsyncDebugger::over(reader, writer, ClientConfig::default()).unwrap();

    // an identifier this client never issued must still decode
    remote.push_json(json!({"id": 999, "result": {}}));

    let result = debugger.results().recv_timeout(RECV_TIMEOUT).unwrap();
    assert_eq!(result.id, 999);
    assert!(result.request.is_none());
}

#[test]
fn test_malformed_frame_is_skipped() {
    let (reader, writer, remote) = MockTransport::pair();
    let debugger = AsyncDebugger::over(reader, writer, ClientConfig::default()).unwrap();

    remote.push("this is not json");
    remote.push_json(json!({"neither": "error, id nor method"}));
    remote.push_json(json!({"method": "Page.loadEventFired", "params": {}}));

    // the loop dropped the malformed frames and kept going
    let notification = debugger.commands().recv_timeout(RECV_TIMEOUT).unwrap();
    assert_eq!(notification.method, "Page.loadEventFired");
}

#[test]
fn test_write_failure_surfaces_send_failed() {
    let (reader, writer, remote) = MockTransport::pair();
    let debugger = AsyncDebugger::over(reader, writer, ClientConfig::default()).unwrap();

    remote.fail_writes(true);
    let err = debugger.send(Command::new("Page.enable")).unwrap_err();
    assert!(matches!(err, ClientError::SendFailed(_)));

    // the identifier was consumed by the failed send
    remote.fail_writes(false);
    assert_eq!(debugger.send(Command::new("Page.enable")).unwrap(), 2);
}

#[test]
fn test_concurrent_senders_never_share_an_identifier() {
    const SENDS_PER_THREAD: usize = 50;

    let (reader, writer, remote) = MockTransport::pair();
    let debugger = AsyncDebugger::over(reader, writer, ClientConfig::default()).unwrap();

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let sender = debugger.sender();
            thread::spawn(move || {
                (0..SENDS_PER_THREAD)
                    .map(|_| sender.send(Command::new("Runtime.evaluate")).unwrap())
                    .collect::<Vec<u64>>()
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(ids.insert(id), "identifier {} assigned twice", id);
        }
    }
    assert_eq!(ids.len(), 2 * SENDS_PER_THREAD);
    assert_eq!(*ids.iter().min().unwrap(), 1);
    assert_eq!(*ids.iter().max().unwrap(), (2 * SENDS_PER_THREAD) as u64);

    // every reply lands exactly once on the right channel
    remote.push_json(json!({"id": 1, "result": {}}));
    remote.push_json(json!({
        "id": 2,
        "error": {"code": -1, "message": "boom"}
    }));

    assert_eq!(debugger.results().recv_timeout(RECV_TIMEOUT).unwrap().id, 1);
    assert_eq!(debugger.errors().recv_timeout(RECV_TIMEOUT).unwrap().id, 2);
    assert!(debugger.results().try_recv().is_err());
    assert!(debugger.errors().try_recv().is_err());
}
