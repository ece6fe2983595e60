// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Session state machine tests: handle table, id assignment, ack
// discipline, teardown ordering, and cross-session concurrency.

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use resmgr::providers::{GpTimerDesc, GpTimerDriver};
use resmgr::{wire, Acquisition, Channel, DriverHandle, Error, Manager, ManagerRegistry, ResourceDriver, Session};

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

/// Channel that records every message the server sends.
#[derive(Default)]
struct MockChannel {
    sent: Mutex<Vec<Vec<u8>>>,
    fail: bool,
}

impl MockChannel {
    fn failing() -> Self {
        Self { sent: Mutex::new(Vec::new()), fail: true }
    }

    fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    fn last_ack(&self) -> wire::RequestAck<'_> {
        // Leak the clone so the ack view can borrow; test-only.
        let buf: &'static [u8] =
            Box::leak(self.sent.lock().unwrap().last().expect("no message sent").clone().into_boxed_slice());
        wire::decode_request_ack(buf).expect("not a request ack")
    }
}

impl Channel for MockChannel {
    fn send(&self, data: &[u8]) -> io::Result<()> {
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "down"));
        }
        self.sent.lock().unwrap().push(data.to_vec());
        Ok(())
    }
}

/// Driver that hands out numbered tokens and records every release.
struct TokenDriver {
    fail_request: bool,
    fail_release: bool,
    next_token: AtomicU32,
    released: Mutex<Vec<u32>>,
}

impl TokenDriver {
    fn new() -> Self {
        Self {
            fail_request: false,
            fail_release: false,
            next_token: AtomicU32::new(1),
            released: Mutex::new(Vec::new()),
        }
    }

    fn failing_request() -> Self {
        Self { fail_request: true, ..Self::new() }
    }

    fn failing_release() -> Self {
        Self { fail_release: true, ..Self::new() }
    }

    fn released(&self) -> Vec<u32> {
        self.released.lock().unwrap().clone()
    }
}

impl ResourceDriver for TokenDriver {
    fn name(&self) -> &str {
        "token"
    }

    fn request(&self, args: &[u8]) -> resmgr::Result<Acquisition> {
        if self.fail_request {
            return Err(Error::Driver(-99));
        }
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        Ok(Acquisition {
            handle: Box::new(token),
            base_address: 0x1000 + token,
            echo: args.to_vec(),
        })
    }

    fn release(&self, handle: DriverHandle) -> resmgr::Result<()> {
        let token = *handle.downcast::<u32>().expect("foreign handle");
        self.released.lock().unwrap().push(token);
        if self.fail_release {
            return Err(Error::Driver(-98));
        }
        Ok(())
    }

    fn describe(&self, handle: &DriverHandle) -> Option<String> {
        handle.downcast_ref::<u32>().map(|t| format!("Token:{t}\n"))
    }
}

fn one_driver_setup(driver: Arc<TokenDriver>) -> (ManagerRegistry, Arc<MockChannel>, Arc<Session>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let managers = ManagerRegistry::new();
    managers
        .register(Manager::new("mgr", vec![driver as _]))
        .expect("register");
    let channel = Arc::new(MockChannel::default());
    let session = Session::connect(&managers, "mgr", Arc::clone(&channel)).expect("connect");
    (managers, channel, session)
}

// ---------------------------------------------------------------------------
// Connect
// ---------------------------------------------------------------------------

#[test]
fn connect_sends_positive_ack() {
    let (_managers, channel, _session) = one_driver_setup(Arc::new(TokenDriver::new()));
    let sent = channel.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(wire::decode_connect_ack(&sent[0]).unwrap(), 0);
}

#[test]
fn connect_unknown_manager_sends_negative_ack() {
    let managers = ManagerRegistry::new();
    let channel = Arc::new(MockChannel::default());
    let err = Session::connect(&managers, "nobody", Arc::clone(&channel)).unwrap_err();
    assert!(matches!(err, Error::NotFound));

    let sent = channel.sent();
    assert_eq!(sent.len(), 1);
    assert!(wire::decode_connect_ack(&sent[0]).unwrap() < 0);
}

#[test]
fn connect_ack_send_failure_detaches_from_manager() {
    let managers = ManagerRegistry::new();
    let manager = Manager::new("mgr", vec![Arc::new(TokenDriver::new()) as _]);
    managers.register(Arc::clone(&manager)).unwrap();

    let err = Session::connect(&managers, "mgr", MockChannel::failing()).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert_eq!(manager.session_count(), 0);
    managers.unregister("mgr").expect("not busy");
}

// ---------------------------------------------------------------------------
// Request / release
// ---------------------------------------------------------------------------

#[test]
fn request_then_release_empties_table() {
    let (_m, channel, session) = one_driver_setup(Arc::new(TokenDriver::new()));

    session.handle_message(&wire::encode_request(0, b"args")).unwrap();
    let ack = channel.last_ack();
    assert_eq!(ack.status, 0);
    assert_eq!(ack.data, b"args");
    assert_eq!(session.resource_count(), 1);

    session.handle_message(&wire::encode_release(ack.resource_id)).unwrap();
    assert_eq!(session.resource_count(), 0);
}

#[test]
fn sequential_requests_yield_distinct_ids() {
    let (_m, channel, session) = one_driver_setup(Arc::new(TokenDriver::new()));

    let mut ids = Vec::new();
    for _ in 0..5 {
        session.handle_message(&wire::encode_request(0, &[])).unwrap();
        ids.push(channel.last_ack().resource_id);
    }
    let mut unique = ids.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), 5, "ids must be distinct: {ids:?}");
    assert_eq!(session.resource_ids(), ids);
}

#[test]
fn release_unknown_id_leaves_table_alone_and_sends_nothing() {
    let (_m, channel, session) = one_driver_setup(Arc::new(TokenDriver::new()));
    session.handle_message(&wire::encode_request(0, &[])).unwrap();
    let before = channel.sent().len();

    let err = session.handle_message(&wire::encode_release(777)).unwrap_err();
    assert!(matches!(err, Error::NotFound));
    assert_eq!(session.resource_count(), 1);
    assert_eq!(channel.sent().len(), before, "release must never be acked");
}

#[test]
fn request_out_of_range_index_rejected() {
    let (_m, channel, session) = one_driver_setup(Arc::new(TokenDriver::new()));

    let err = session.handle_message(&wire::encode_request(3, &[1, 2])).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument));
    assert_eq!(session.resource_count(), 0);

    let ack = channel.last_ack();
    assert!(ack.status < 0);
    assert!(ack.data.is_empty());
}

#[test]
fn driver_request_failure_mutates_nothing() {
    let (_m, channel, session) = one_driver_setup(Arc::new(TokenDriver::failing_request()));

    let err = session.handle_message(&wire::encode_request(0, b"xyz")).unwrap_err();
    assert!(matches!(err, Error::Driver(-99)));
    assert_eq!(session.resource_count(), 0);

    let ack = channel.last_ack();
    assert_eq!(ack.status, -99, "driver status passes through verbatim");
    assert!(ack.data.is_empty(), "no payload leakage on failure");
}

#[test]
fn release_failure_entry_stays_removed() {
    let driver = Arc::new(TokenDriver::failing_release());
    let (_m, channel, session) = one_driver_setup(Arc::clone(&driver));

    session.handle_message(&wire::encode_request(0, &[])).unwrap();
    let id = channel.last_ack().resource_id;

    let err = session.handle_message(&wire::encode_release(id)).unwrap_err();
    assert!(matches!(err, Error::Driver(-98)));
    // Entry removed before the driver ran, and not re-inserted.
    assert_eq!(session.resource_count(), 0);
    assert_eq!(driver.released().len(), 1);
}

#[test]
fn malformed_request_gets_negative_ack_and_no_entry() {
    let (_m, channel, session) = one_driver_setup(Arc::new(TokenDriver::new()));

    // Action header says request, body cut short of the index field.
    let mut msg = wire::encode_request(0, &[]);
    msg.truncate(6);
    let err = session.handle_message(&msg).unwrap_err();
    assert!(matches!(err, Error::Malformed));
    assert_eq!(session.resource_count(), 0);

    let ack = channel.last_ack();
    assert!(ack.status < 0);
    assert!(ack.data.is_empty());
}

#[test]
fn malformed_release_gets_no_reply() {
    let (_m, channel, session) = one_driver_setup(Arc::new(TokenDriver::new()));
    let before = channel.sent().len();

    let mut msg = wire::encode_release(1);
    msg.truncate(6);
    let err = session.handle_message(&msg).unwrap_err();
    assert!(matches!(err, Error::Malformed));
    assert_eq!(channel.sent().len(), before);
}

#[test]
fn unknown_action_gets_negative_ack() {
    let (_m, channel, session) = one_driver_setup(Arc::new(TokenDriver::new()));

    let msg = 9u32.to_le_bytes().to_vec();
    let err = session.handle_message(&msg).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument));
    let ack = channel.last_ack();
    assert!(ack.status < 0);
}

// ---------------------------------------------------------------------------
// Teardown
// ---------------------------------------------------------------------------

#[test]
fn teardown_releases_in_acquisition_order_exactly_once() {
    let driver = Arc::new(TokenDriver::new());
    let (_m, _channel, session) = one_driver_setup(Arc::clone(&driver));

    for _ in 0..4 {
        session.handle_message(&wire::encode_request(0, &[])).unwrap();
    }
    assert_eq!(session.resource_count(), 4);

    session.close();
    assert_eq!(session.resource_count(), 0);
    // Tokens were issued 1..=4 in acquisition order.
    assert_eq!(driver.released(), vec![1, 2, 3, 4]);

    // close is idempotent.
    session.close();
    assert_eq!(driver.released(), vec![1, 2, 3, 4]);
}

#[test]
fn messages_after_close_are_dropped() {
    let (_m, channel, session) = one_driver_setup(Arc::new(TokenDriver::new()));
    session.close();
    let before = channel.sent().len();

    let err = session.handle_message(&wire::encode_request(0, &[])).unwrap_err();
    assert!(matches!(err, Error::Closed));
    let err = session.handle_message(&wire::encode_release(1)).unwrap_err();
    assert!(matches!(err, Error::Closed));
    assert_eq!(session.resource_count(), 0);
    assert_eq!(channel.sent().len(), before, "no acks once teardown began");
}

#[test]
fn drop_tears_down_outstanding_resources() {
    let driver = Arc::new(TokenDriver::new());
    let (managers, _channel, session) = one_driver_setup(Arc::clone(&driver));

    session.handle_message(&wire::encode_request(0, &[])).unwrap();
    drop(session);
    assert_eq!(driver.released(), vec![1]);
    managers.unregister("mgr").expect("manager free after drop");
}

#[test]
fn manager_unregister_busy_while_session_bound() {
    let (managers, _channel, session) = one_driver_setup(Arc::new(TokenDriver::new()));
    assert_eq!(session.manager().name(), "mgr");
    assert_eq!(session.manager().session_count(), 1);

    let err = managers.unregister("mgr").unwrap_err();
    assert!(matches!(err, Error::Busy));

    session.close();
    managers.unregister("mgr").expect("free after close");
}

// ---------------------------------------------------------------------------
// Introspection
// ---------------------------------------------------------------------------

#[test]
fn describe_lists_live_instances() {
    let (_m, channel, session) = one_driver_setup(Arc::new(TokenDriver::new()));
    session.handle_message(&wire::encode_request(0, &[])).unwrap();
    let id = channel.last_ack().resource_id;

    let text = session.describe();
    assert!(text.contains("manager mgr"), "{text}");
    assert!(text.contains("Resource Name:token"), "{text}");
    assert!(text.contains(&format!("Id:{id}")), "{text}");
    assert!(text.contains("Token:1"), "{text}");
}

// ---------------------------------------------------------------------------
// Worked protocol example (gptimer on boardA)
// ---------------------------------------------------------------------------

#[test]
fn board_a_gptimer_request_release_cycle() {
    let managers = ManagerRegistry::new();
    let gpt = GpTimerDriver::new(vec![GpTimerDesc {
        id: 3,
        base_address: 0x4803_5000,
        sources: vec![1],
    }]);
    managers
        .register(Manager::new("boardA", vec![Arc::new(gpt) as _]))
        .unwrap();

    let channel = Arc::new(MockChannel::default());
    let session = Session::connect(&managers, "boardA", Arc::clone(&channel)).unwrap();

    // Request(index=0, args={id:3, src_clk:1})
    let mut args = Vec::new();
    args.extend_from_slice(&3u32.to_le_bytes());
    args.extend_from_slice(&1u32.to_le_bytes());
    session.handle_message(&wire::encode_request(0, &args)).unwrap();

    let ack = channel.last_ack();
    assert_eq!(ack.status, 0);
    assert_eq!(ack.resource_id, 1);
    assert_eq!(ack.data, &args[..], "ack echoes the request args");

    // Release(resource_id=1): no message, timer freed.
    let sent_before = channel.sent().len();
    session.handle_message(&wire::encode_release(1)).unwrap();
    assert_eq!(channel.sent().len(), sent_before);
    assert_eq!(session.resource_count(), 0);

    // Second release of the same id: NotFound, observable locally only.
    let err = session.handle_message(&wire::encode_release(1)).unwrap_err();
    assert!(matches!(err, Error::NotFound));
    assert_eq!(channel.sent().len(), sent_before);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn parallel_sessions_do_not_interfere() {
    let driver = Arc::new(TokenDriver::new());
    let managers = Arc::new(ManagerRegistry::new());
    managers
        .register(Manager::new("mgr", vec![driver.clone() as _]))
        .unwrap();

    let per_session = 20;
    let mut handles = Vec::new();
    for _ in 0..4 {
        let managers = Arc::clone(&managers);
        handles.push(thread::spawn(move || {
            let channel = Arc::new(MockChannel::default());
            let session = Session::connect(&managers, "mgr", Arc::clone(&channel)).unwrap();
            let mut ids = Vec::new();
            for _ in 0..per_session {
                session.handle_message(&wire::encode_request(0, &[])).unwrap();
                ids.push(channel.last_ack().resource_id);
            }
            // Ids are session-local and sequential regardless of the
            // other sessions running.
            assert_eq!(ids, (1..=per_session as u32).collect::<Vec<_>>());
            session.close();
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(driver.released().len(), 4 * per_session);
    managers.unregister("mgr").expect("all sessions closed");
}

#[test]
fn requests_on_one_session_from_many_threads_stay_consistent() {
    let (_m, _channel, session) = one_driver_setup(Arc::new(TokenDriver::new()));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let session = Arc::clone(&session);
        handles.push(thread::spawn(move || {
            for _ in 0..25 {
                session.handle_message(&wire::encode_request(0, &[])).unwrap();
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let ids = session.resource_ids();
    assert_eq!(ids.len(), 100);
    assert_eq!(session.resource_count(), 100);
    let mut unique = ids;
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), 100, "every id unique while live");
}
