//! End-to-end relocation runs against the in-memory broker.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::broker::{Broker, MemoryBroker};
use crate::config::{
    DESTINATION_TYPE_PUBSUB_TOPIC, RelocationConfig, SOURCE_TYPE_PUBSUB_SUBSCRIPTION,
};
use crate::relocate::console::Capture;
use crate::relocate::{
    Console, Handler, MAX_CONSECUTIVE_PULL_ERRORS, OperatorInput, Relocator,
};
use crate::utils::error::RelocationError;

const SOURCE: &str = "dlq-sub";
const DESTINATION: &str = "orders-sub";

fn seeded(payloads: &[&str]) -> MemoryBroker {
    let broker = MemoryBroker::new(SOURCE, "orders");
    broker.create_subscription(SOURCE, "dlq");
    broker.create_subscription(DESTINATION, "orders");
    for p in payloads {
        broker.publish_to("dlq", *p, HashMap::new()).unwrap();
    }
    broker
}

fn config(max_messages: u64) -> RelocationConfig {
    RelocationConfig::new(
        SOURCE_TYPE_PUBSUB_SUBSCRIPTION,
        "projects/test/subscriptions/dlq-sub",
        DESTINATION_TYPE_PUBSUB_TOPIC,
        "projects/test/topics/orders",
        max_messages,
        Duration::from_millis(50),
        false,
    )
    .unwrap()
}

fn typed(lines: &'static str) -> OperatorInput {
    OperatorInput::from_reader(lines.as_bytes())
}

fn payload_set(payloads: Vec<Vec<u8>>) -> HashSet<String> {
    payloads
        .into_iter()
        .map(|p| String::from_utf8(p).unwrap())
        .collect()
}

#[tokio::test]
async fn unbounded_move_drains_source() {
    let broker = seeded(&["A", "B", "C"]);
    let capture = Capture::default();
    let console = Console::new(capture.clone());
    let cfg = config(0);

    let outcome = Relocator::new(&broker, &console, &cfg)
        .run(&mut Handler::unattended())
        .await
        .unwrap();

    assert_eq!(outcome.processed, 3);
    assert!(broker.outstanding(SOURCE).is_empty());
    assert_eq!(
        payload_set(broker.outstanding(DESTINATION)),
        HashSet::from(["A".to_string(), "B".to_string(), "C".to_string()])
    );
    assert!(capture.contents().ends_with("3 message(s) relocated\n"));
    assert!(broker.is_closed());
}

#[tokio::test]
async fn bounded_move_stops_at_ceiling() {
    let broker = seeded(&["1", "2", "3", "4", "5"]);
    let console = Console::new(Capture::default());
    let cfg = config(2);

    let outcome = Relocator::new(&broker, &console, &cfg)
        .run(&mut Handler::unattended())
        .await
        .unwrap();

    assert_eq!(outcome.processed, 2);
    assert_eq!(broker.outstanding(SOURCE).len(), 3);
    assert_eq!(broker.outstanding(DESTINATION).len(), 2);
}

#[tokio::test]
async fn bounded_move_with_short_source_drains() {
    let broker = seeded(&["1", "2"]);
    let capture = Capture::default();
    let console = Console::new(capture.clone());
    let cfg = config(10);

    let outcome = Relocator::new(&broker, &console, &cfg)
        .run(&mut Handler::unattended())
        .await
        .unwrap();

    assert_eq!(outcome.processed, 2);
    assert_eq!(capture.lines_starting_with("No more messages available"), 1);
    assert_eq!(capture.lines_starting_with("Error"), 0);
}

#[tokio::test]
async fn five_pull_failures_abort_the_run() {
    let broker = seeded(&["A"]);
    broker.fail_next_pulls(100);
    let capture = Capture::default();
    let console = Console::new(capture.clone());
    let cfg = config(0);

    let result = Relocator::new(&broker, &console, &cfg)
        .run(&mut Handler::unattended())
        .await;

    assert!(matches!(
        result,
        Err(RelocationError::TooManyPullErrors { count: MAX_CONSECUTIVE_PULL_ERRORS })
    ));
    assert_eq!(capture.lines_starting_with("Error pulling message"), 5);
    assert_eq!(capture.lines_starting_with("Processed"), 0);
    assert_eq!(broker.outstanding(SOURCE).len(), 1);
    assert!(broker.is_closed());
}

#[tokio::test]
async fn successful_pull_resets_error_count() {
    let broker = seeded(&["A", "B"]);
    let capture = Capture::default();
    let console = Console::new(capture.clone());
    let cfg = config(0);

    broker.fail_next_pulls(4);
    let outcome = Relocator::new(&broker, &console, &cfg)
        .run(&mut Handler::unattended())
        .await
        .unwrap();

    assert_eq!(outcome.processed, 2);
    assert_eq!(capture.lines_starting_with("Error pulling message"), 4);
}

#[tokio::test]
async fn publish_failure_leaves_message_on_source() {
    let broker = seeded(&["A", "B"]);
    broker.fail_publishes(true);
    let capture = Capture::default();
    let console = Console::new(capture.clone());
    let cfg = config(0);

    let outcome = Relocator::new(&broker, &console, &cfg)
        .run(&mut Handler::unattended())
        .await
        .unwrap();

    assert_eq!(outcome.processed, 0);
    assert_eq!(capture.lines_starting_with("Error publishing message"), 2);
    assert_eq!(broker.outstanding(SOURCE).len(), 2);
    assert!(broker.outstanding(DESTINATION).is_empty());
}

#[tokio::test]
async fn acknowledge_failure_still_counts_as_processed() {
    let broker = seeded(&["A"]);
    broker.fail_acknowledges(true);
    let capture = Capture::default();
    let console = Console::new(capture.clone());
    let cfg = config(0);

    let outcome = Relocator::new(&broker, &console, &cfg)
        .run(&mut Handler::unattended())
        .await
        .unwrap();

    assert_eq!(outcome.processed, 1);
    assert_eq!(
        capture.lines_starting_with("Warning: failed to acknowledge message 1"),
        1
    );
    assert_eq!(broker.outstanding(DESTINATION).len(), 1);
}

#[tokio::test]
async fn review_move_move_discard_quit() {
    let broker = seeded(&["A", "B", "C", "D"]);
    let capture = Capture::default();
    let console = Console::new(capture.clone());
    let cfg = config(0);
    let mut handler = Handler::review(typed("m\nm\nd\nq\n"), false);

    let outcome = Relocator::new(&broker, &console, &cfg)
        .run(&mut handler)
        .await
        .unwrap();

    assert_eq!(outcome.processed, 3);
    assert_eq!(
        payload_set(broker.outstanding(DESTINATION)),
        HashSet::from(["A".to_string(), "B".to_string()])
    );
    // The quit message was pulled but never acknowledged.
    assert_eq!(broker.outstanding(SOURCE), vec![b"D".to_vec()]);
    assert!(capture.contents().ends_with("3 message(s) processed\n"));
}

#[tokio::test]
async fn invalid_review_input_keeps_numbering() {
    let broker = seeded(&["A", "B"]);
    let capture = Capture::default();
    let console = Console::new(capture.clone());
    let cfg = config(0);
    let mut handler = Handler::review(typed("x\ny\nz\nd\n?\nd\n"), false);

    let outcome = Relocator::new(&broker, &console, &cfg)
        .run(&mut handler)
        .await
        .unwrap();

    assert_eq!(outcome.processed, 2);
    let out = capture.contents();
    assert!(out.contains("Message 1:\n"));
    assert!(out.contains("Message 2:\n"));
    assert!(!out.contains("Message 3:"));
    assert_eq!(out.matches("Invalid input").count(), 4);
    assert!(broker.outstanding(SOURCE).is_empty());
}

#[tokio::test]
async fn shutdown_cancels_and_closes() {
    let broker = seeded(&[]);
    let console = Console::new(Capture::default());
    let mut cfg = config(0);
    cfg.poll_timeout = Duration::from_secs(30);

    let result = Relocator::new(&broker, &console, &cfg)
        .run_until(
            &mut Handler::unattended(),
            tokio::time::sleep(Duration::from_millis(20)),
        )
        .await;

    assert!(matches!(result, Err(RelocationError::Cancelled)));
    assert!(broker.is_closed());
    assert!(broker.pull(Duration::from_millis(1)).await.is_err());
}
