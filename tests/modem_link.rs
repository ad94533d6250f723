//! Protocol tests for the modem link state machine over the mock transport.

use motion_node::link::mock::MockTransport;
use motion_node::link::modem::{LinkConfig, ModemLink};
use motion_node::status::{LinkState, LinkStatus, SendOutcome};
use motion_node::storage::nv::MemNv;
use motion_node::storage::queue::{Event, EventQueue, IMAGE_LEN};
use std::time::Duration;

const PAYLOAD: &str = "GET /update?api_key=KEY&field1=750 HTTP/1.1\r\nHost: api.thingspeak.com\r\nConnection: close\r\n\r\n";

fn config() -> LinkConfig {
    LinkConfig {
        ssid: "lab".to_string(),
        password: "hunter2".to_string(),
        host: "api.thingspeak.com".to_string(),
        port: 80,
        api_key: "KEY".to_string(),
        probe_interval_ms: 2000,
        send_timeout_ms: 10_000,
        settle: Duration::ZERO,
    }
}

struct Harness {
    link: ModemLink<MockTransport>,
    modem: MockTransport,
    queue: EventQueue<MemNv>,
    status: LinkStatus,
}

fn booted_harness() -> Harness {
    let modem = MockTransport::new();
    let mut link = ModemLink::new(modem.clone(), config());
    let mut status = LinkStatus::default();
    link.power_on(0, &mut status).expect("power on");
    modem.take_written();
    Harness {
        link,
        modem,
        queue: EventQueue::open(MemNv::new(IMAGE_LEN)),
        status,
    }
}

fn ready_harness() -> Harness {
    let mut h = booted_harness();
    h.modem.push_line("WIFI CONNECTED");
    h.modem.push_line("WIFI GOT IP");
    h.link.tick(1, &mut h.queue, &mut h.status);
    assert_eq!(h.link.state(), LinkState::Ready);
    h.modem.take_written();
    h
}

/// Ready harness with one 750 ms event queued and the send already
/// requested.
fn sending_harness() -> Harness {
    let mut h = ready_harness();
    h.queue.enqueue(Event {
        duration_ms: 750,
        timestamp: 4321,
    });
    let oldest = h.queue.peek_oldest().expect("queued event");
    let accepted = h
        .link
        .request_send(&oldest, 100, &mut h.status)
        .expect("request send");
    assert!(accepted);
    assert_eq!(h.link.state(), LinkState::Sending);
    assert_eq!(
        h.modem.written(),
        "AT+CIPSTART=\"TCP\",\"api.thingspeak.com\",80\r\n"
    );
    h.modem.take_written();
    h
}

#[test]
fn joined_only_line_does_not_make_the_link_ready() {
    let mut h = booted_harness();
    h.modem.push_line("WIFI CONNECTED");
    h.link.tick(1, &mut h.queue, &mut h.status);
    assert_eq!(h.link.state(), LinkState::Booting);

    h.modem.push_line("WIFI GOT IP");
    h.link.tick(2, &mut h.queue, &mut h.status);
    assert_eq!(h.link.state(), LinkState::Ready);
    assert_eq!(h.status.state, LinkState::Ready);
}

#[test]
fn successful_send_cycle_dequeues_exactly_once() {
    let mut h = sending_harness();

    h.modem.push_line("CONNECT");
    h.link.tick(200, &mut h.queue, &mut h.status);
    assert_eq!(h.modem.written(), format!("AT+CIPSEND={}\r\n", PAYLOAD.len()));
    h.modem.take_written();

    h.modem.push_bytes(b"> ");
    h.link.tick(300, &mut h.queue, &mut h.status);
    assert_eq!(h.modem.written(), PAYLOAD);
    h.modem.take_written();

    h.modem.push_line("SEND OK");
    h.link.tick(400, &mut h.queue, &mut h.status);
    assert!(h.queue.is_empty());
    assert_eq!(h.link.state(), LinkState::Ready);
    assert_eq!(h.status.last_outcome, Some(SendOutcome::Delivered));
    assert_eq!(h.status.last_success_ms, Some(400));

    // A stray duplicate result line must not dequeue anything else.
    h.queue.enqueue(Event {
        duration_ms: 1,
        timestamp: 2,
    });
    h.modem.push_line("SEND OK");
    h.link.tick(500, &mut h.queue, &mut h.status);
    assert_eq!(h.queue.len(), 1);
}

#[test]
fn failed_send_keeps_the_event_queued() {
    let mut h = sending_harness();

    h.modem.push_line("CONNECT");
    h.link.tick(200, &mut h.queue, &mut h.status);
    h.modem.push_bytes(b"> ");
    h.link.tick(300, &mut h.queue, &mut h.status);
    h.modem.take_written();

    h.modem.push_line("SEND FAIL");
    h.link.tick(400, &mut h.queue, &mut h.status);

    assert_eq!(h.link.state(), LinkState::Ready);
    assert_eq!(h.status.last_outcome, Some(SendOutcome::Rejected));
    assert_eq!(h.status.last_success_ms, None);
    assert_eq!(
        h.queue.peek_oldest(),
        Some(Event {
            duration_ms: 750,
            timestamp: 4321
        })
    );
}

#[test]
fn already_connected_counts_as_connect_confirmation() {
    let mut h = sending_harness();

    h.modem.push_line("ALREADY CONNECTED");
    h.link.tick(200, &mut h.queue, &mut h.status);
    assert_eq!(h.modem.written(), format!("AT+CIPSEND={}\r\n", PAYLOAD.len()));
}

#[test]
fn payload_goes_out_exactly_once_despite_duplicate_prompts() {
    let mut h = sending_harness();

    h.modem.push_line("CONNECT");
    h.link.tick(200, &mut h.queue, &mut h.status);
    h.modem.take_written();

    h.modem.push_bytes(b"> ");
    h.link.tick(300, &mut h.queue, &mut h.status);
    h.modem.push_bytes(b"> ");
    h.link.tick(310, &mut h.queue, &mut h.status);
    assert_eq!(h.modem.written(), PAYLOAD);
}

#[test]
fn remote_close_mid_send_completes_without_dequeue() {
    let mut h = sending_harness();

    h.modem.push_line("CONNECT");
    h.link.tick(200, &mut h.queue, &mut h.status);

    h.modem.push_line("CLOSED");
    h.link.tick(300, &mut h.queue, &mut h.status);

    assert_eq!(h.link.state(), LinkState::Ready);
    assert!(!h.link.send_pending());
    assert_eq!(h.queue.len(), 1);
}

#[test]
fn remote_close_when_idle_is_ignored() {
    let mut h = ready_harness();
    h.modem.push_line("CLOSED");
    h.link.tick(50, &mut h.queue, &mut h.status);
    assert_eq!(h.link.state(), LinkState::Ready);
}

#[test]
fn pending_send_times_out_back_to_ready() {
    let mut h = sending_harness();

    // Silence from the modem until past the deadline.
    h.link.tick(5_000, &mut h.queue, &mut h.status);
    assert_eq!(h.link.state(), LinkState::Sending);

    h.link.tick(10_200, &mut h.queue, &mut h.status);
    assert_eq!(h.link.state(), LinkState::Ready);
    assert!(!h.link.send_pending());
    assert_eq!(h.status.last_outcome, Some(SendOutcome::TimedOut));
    // The event is untouched and can be retried.
    assert_eq!(h.queue.len(), 1);
}

#[test]
fn error_during_send_aborts_and_enters_error_state() {
    let mut h = sending_harness();

    h.modem.push_line("ERROR");
    h.link.tick(200, &mut h.queue, &mut h.status);

    assert_eq!(h.link.state(), LinkState::Error);
    assert!(!h.link.send_pending());
    assert_eq!(h.status.last_outcome, Some(SendOutcome::Aborted));
    assert_eq!(h.queue.len(), 1);
}

#[test]
fn dns_failure_during_boot_enters_error_and_power_on_recovers() {
    let mut h = booted_harness();

    h.modem.push_line("DNS Fail");
    h.link.tick(10, &mut h.queue, &mut h.status);
    assert_eq!(h.link.state(), LinkState::Error);

    // The boot sequence may be re-issued from any state.
    h.link.power_on(1000, &mut h.status).expect("power on");
    assert_eq!(h.link.state(), LinkState::Booting);
    h.modem.take_written();

    h.modem.push_line("WIFI GOT IP");
    h.link.tick(1100, &mut h.queue, &mut h.status);
    assert_eq!(h.link.state(), LinkState::Ready);
}

#[test]
fn send_request_refused_while_another_is_pending() {
    let mut h = sending_harness();
    let extra = Event {
        duration_ms: 9,
        timestamp: 9,
    };
    let accepted = h
        .link
        .request_send(&extra, 150, &mut h.status)
        .expect("request send");
    assert!(!accepted);
}

#[test]
fn power_off_discards_pending_send() {
    let mut h = sending_harness();
    h.link.power_off(&mut h.status);
    assert_eq!(h.link.state(), LinkState::Off);
    assert!(!h.link.send_pending());

    // Stray replies while off change nothing.
    h.modem.push_line("SEND OK");
    h.link.tick(600, &mut h.queue, &mut h.status);
    assert_eq!(h.link.state(), LinkState::Off);
    assert_eq!(h.queue.len(), 1);
}
