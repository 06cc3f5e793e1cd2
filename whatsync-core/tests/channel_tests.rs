//! Adapter-level behavior: poll cadence, send deferral, push normalization

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{inbound, summary, MockTransport};
use tokio::sync::mpsc;
use whatsync_core::{PollChannel, PollScope, PushChannel, SyncEvent};

fn scope(conversation: Option<&str>) -> PollScope {
    PollScope {
        account_id: "a1".to_string(),
        conversation_id: conversation.map(str::to_string),
    }
}

#[tokio::test]
async fn test_poll_emits_both_snapshots() {
    let transport = MockTransport::new();
    {
        let mut state = transport.state.lock().unwrap();
        state.conversations.push(summary("c1", "a1", 100, 0));
        state
            .messages
            .insert("c1".to_string(), vec![inbound("m1", "c1", 100)]);
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let poll = PollChannel::start(
        transport.clone(),
        scope(Some("c1")),
        Duration::from_millis(20),
        tx,
        Arc::new(AtomicUsize::new(0)),
    );

    let first = rx.recv().await.unwrap();
    assert!(matches!(first, SyncEvent::ConversationsSnapshot { .. }));
    let second = rx.recv().await.unwrap();
    match second {
        SyncEvent::MessagesSnapshot {
            conversation_id,
            messages,
            ..
        } => {
            assert_eq!(conversation_id, "c1");
            assert_eq!(messages.len(), 1);
        }
        other => panic!("unexpected event: {:?}", other),
    }

    poll.stop();
}

#[tokio::test]
async fn test_poll_without_open_conversation_skips_messages() {
    let transport = MockTransport::new();
    transport
        .state
        .lock()
        .unwrap()
        .conversations
        .push(summary("c1", "a1", 100, 0));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let poll = PollChannel::start(
        transport.clone(),
        scope(None),
        Duration::from_millis(20),
        tx,
        Arc::new(AtomicUsize::new(0)),
    );

    // Two full cycles, only conversation snapshots
    for _ in 0..2 {
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, SyncEvent::ConversationsSnapshot { .. }));
    }
    assert_eq!(transport.state.lock().unwrap().fetch_message_calls, 0);

    poll.stop();
}

#[tokio::test]
async fn test_poll_deferred_while_send_in_flight() {
    let transport = MockTransport::new();
    transport
        .state
        .lock()
        .unwrap()
        .conversations
        .push(summary("c1", "a1", 100, 0));

    let sends_in_flight = Arc::new(AtomicUsize::new(1));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let poll = PollChannel::start(
        transport.clone(),
        scope(Some("c1")),
        Duration::from_millis(20),
        tx,
        Arc::clone(&sends_in_flight),
    );

    // Several intervals pass; every cycle is skipped, none queued
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(transport.state.lock().unwrap().fetch_message_calls, 0);

    // Send settles; the next tick polls again
    sends_in_flight.store(0, Ordering::SeqCst);
    let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("poll should resume")
        .unwrap();
    assert!(matches!(event, SyncEvent::ConversationsSnapshot { .. }));

    poll.stop();
}

#[tokio::test]
async fn test_poll_stop_halts_fetching() {
    let transport = MockTransport::new();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let poll = PollChannel::start(
        transport.clone(),
        scope(Some("c1")),
        Duration::from_millis(10),
        tx,
        Arc::new(AtomicUsize::new(0)),
    );

    // Let it run, then stop
    tokio::time::sleep(Duration::from_millis(50)).await;
    poll.stop();
    tokio::time::sleep(Duration::from_millis(20)).await;

    while rx.try_recv().is_ok() {}
    let calls_after_stop = transport.state.lock().unwrap().fetch_message_calls;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        transport.state.lock().unwrap().fetch_message_calls,
        calls_after_stop
    );
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_poll_failure_surfaces_channel_error() {
    let transport = MockTransport::new();
    transport.state.lock().unwrap().fail_fetches = true;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let poll = PollChannel::start(
        transport.clone(),
        scope(None),
        Duration::from_millis(20),
        tx,
        Arc::new(AtomicUsize::new(0)),
    );

    match rx.recv().await.unwrap() {
        SyncEvent::ChannelError { message } => {
            assert!(!message.is_empty());
        }
        other => panic!("unexpected event: {:?}", other),
    }

    poll.stop();
}

#[tokio::test]
async fn test_push_channel_one_event_per_payload() {
    let transport = MockTransport::new();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let push = PushChannel::start(transport.as_ref(), "a1", tx).await.unwrap();
    assert_eq!(push.account_id(), "a1");

    transport.push_new_message("a1", "c1", &inbound("m1", "c1", 100));
    transport.push_status("m1", "read");
    // Malformed payloads yield nothing
    transport.push_raw(serde_json::json!({"type": "presence"}));
    transport.push_new_message("a1", "c1", &inbound("m2", "c1", 200));

    let mut received = Vec::new();
    for _ in 0..3 {
        received.push(
            tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .expect("event expected")
                .unwrap(),
        );
    }
    assert!(matches!(received[0], SyncEvent::Message { .. }));
    assert!(matches!(received[1], SyncEvent::Status { .. }));
    assert!(matches!(received[2], SyncEvent::Message { .. }));

    // Exactly one event per accepted payload, nothing buffered
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(rx.try_recv().is_err());

    push.stop();
}

#[tokio::test]
async fn test_push_channel_stop_cancels_subscription() {
    let transport = MockTransport::new();

    let (tx, _rx) = mpsc::unbounded_channel();
    let push = PushChannel::start(transport.as_ref(), "a1", tx).await.unwrap();

    push.stop();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(transport.was_push_canceled());
}
