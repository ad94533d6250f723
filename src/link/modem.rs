//! AT-command modem driver.
//!
//! Drives a half-duplex serial radio modem (ESP-01 class) through its ASCII
//! AT protocol and reconciles confirmed deliveries back into the event
//! queue.
//!
//! Protocol Overview:
//! - Format: ASCII command/response, commands `\r\n`-terminated, replies
//!   `\n`-terminated (the `>` send prompt may arrive unterminated)
//! - Commands: `AT`, `AT+CWMODE=1`, `AT+CWJAP="ssid","pass"`,
//!   `AT+CIPSTART="TCP","host",port`, `AT+CIPSEND=<len>`, raw payload
//! - Replies: `OK`, `WIFI CONNECTED`, `WIFI GOT IP`, `ERROR`, `DNS Fail`,
//!   `CONNECT`, `ALREADY CONNECTED`, `>`, `SEND OK`, `SEND FAIL`, `CLOSED`
//!
//! The driver is a poll-driven state machine: `Off → Booting → Ready ⇄
//! Sending`, with an absorbing `Error` state that a fresh
//! [`ModemLink::power_on`] recovers from. All replies are consumed
//! asynchronously by [`ModemLink::tick`]; nothing ever waits on the wire.
//! Exactly one transmission is in flight at a time, tracked as a tagged
//! `InFlight` value so "no send pending" can never be confused with an
//! empty payload.

use crate::config::NodeConfig;
use crate::error::NodeResult;
use crate::link::response::{classify, LineSplitter, ModemReply};
use crate::link::transport::Transport;
use crate::status::{LinkState, LinkStatus, SendOutcome};
use crate::storage::{Event, EventQueue, NvStore};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Everything the link needs to know about its network and endpoint.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Network SSID
    pub ssid: String,
    /// Network password
    pub password: String,
    /// Cloud endpoint host
    pub host: String,
    /// Cloud endpoint TCP port
    pub port: u16,
    /// Write API key embedded in each upload
    pub api_key: String,
    /// Interval between boot-phase liveness probes, ms
    pub probe_interval_ms: u32,
    /// Deadline for a pending send, ms
    pub send_timeout_ms: u32,
    /// Settling delay between boot commands (zero in tests)
    pub settle: Duration,
}

impl From<&NodeConfig> for LinkConfig {
    fn from(cfg: &NodeConfig) -> Self {
        Self {
            ssid: cfg.wifi.ssid.clone(),
            password: cfg.wifi.password.clone(),
            host: cfg.cloud.host.clone(),
            port: cfg.cloud.port,
            api_key: cfg.cloud.api_key.clone(),
            probe_interval_ms: cfg.modem.probe_interval_ms,
            send_timeout_ms: cfg.modem.send_timeout_ms,
            settle: Duration::from_millis(cfg.modem.settle_ms),
        }
    }
}

/// Sub-state of an in-flight transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SendStage {
    /// `AT+CIPSTART` issued, waiting for the channel to come up
    AwaitConnect,
    /// `AT+CIPSEND` issued, waiting for the `>` prompt
    AwaitPrompt,
    /// Payload written, waiting for the transmit result
    AwaitResult,
}

/// One outstanding transmission: the exact bytes to put on the wire plus
/// where the handshake currently stands.
#[derive(Debug)]
struct InFlight {
    payload: Vec<u8>,
    stage: SendStage,
    started_ms: u32,
}

/// Poll-driven AT-command state machine over a [`Transport`].
pub struct ModemLink<T: Transport> {
    transport: T,
    cfg: LinkConfig,
    rx: LineSplitter,
    state: LinkState,
    in_flight: Option<InFlight>,
    last_probe_ms: u32,
}

impl<T: Transport> ModemLink<T> {
    /// Create a link in the `Off` state.
    pub fn new(transport: T, cfg: LinkConfig) -> Self {
        Self {
            transport,
            cfg,
            rx: LineSplitter::new(),
            state: LinkState::Off,
            in_flight: None,
            last_probe_ms: 0,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Whether the link can accept a send request right now.
    pub fn is_ready(&self) -> bool {
        self.state == LinkState::Ready && self.in_flight.is_none()
    }

    /// Whether a transmission is outstanding.
    pub fn send_pending(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Issue the boot sequence: wake probe, station mode, network join.
    ///
    /// Fire-and-forget; the replies are consumed by later ticks. May be
    /// called in any state (including `Error`) and always forces a fresh
    /// boot. Stale input from before the power cycle is discarded.
    pub fn power_on(&mut self, now_ms: u32, status: &mut LinkStatus) -> NodeResult<()> {
        self.drain_stale_input();
        self.rx.clear();
        self.in_flight = None;

        self.send_cmd("AT\r\n")?;
        self.settle();
        self.send_cmd("AT+CWMODE=1\r\n")?;
        self.settle();
        let join = format!(
            "AT+CWJAP=\"{}\",\"{}\"\r\n",
            self.cfg.ssid, self.cfg.password
        );
        self.send_cmd(&join)?;

        self.last_probe_ms = now_ms;
        self.set_state(LinkState::Booting, status);
        info!("modem boot sequence issued");
        Ok(())
    }

    /// Drop power: back to `Off`, discarding any pending send.
    pub fn power_off(&mut self, status: &mut LinkStatus) {
        self.in_flight = None;
        self.rx.clear();
        self.set_state(LinkState::Off, status);
        info!("modem powered off");
    }

    /// Start uploading one event.
    ///
    /// Permitted only in `Ready` with no send outstanding; returns
    /// `Ok(false)` otherwise. On success the connection command goes out
    /// immediately and the handshake continues in `tick`.
    pub fn request_send(
        &mut self,
        event: &Event,
        now_ms: u32,
        status: &mut LinkStatus,
    ) -> NodeResult<bool> {
        if !self.is_ready() {
            return Ok(false);
        }

        let payload = self.format_payload(event);
        let start = format!(
            "AT+CIPSTART=\"TCP\",\"{}\",{}\r\n",
            self.cfg.host, self.cfg.port
        );
        self.send_cmd(&start)?;

        debug!(
            duration_ms = event.duration_ms,
            bytes = payload.len(),
            "upload started"
        );
        self.in_flight = Some(InFlight {
            payload,
            stage: SendStage::AwaitConnect,
            started_ms: now_ms,
        });
        status.last_attempt_ms = Some(now_ms);
        self.set_state(LinkState::Sending, status);
        Ok(true)
    }

    /// Poll entry point; call frequently.
    ///
    /// Consumes whatever the modem sent since the last tick, re-issues the
    /// boot-phase liveness probe when the wake reply went missing, and
    /// enforces the pending-send deadline. Transport hiccups are logged and
    /// absorbed; the loop must keep running.
    pub fn tick<S: NvStore>(
        &mut self,
        now_ms: u32,
        queue: &mut EventQueue<S>,
        status: &mut LinkStatus,
    ) {
        self.pump_receive();

        while let Some(line) = self.rx.next_line() {
            trace!(line = %line, "modem reply");
            self.handle_reply(classify(&line), now_ms, queue, status);
        }
        // The CIPSEND prompt arrives with no line terminator.
        if self.rx.take_prompt() {
            self.handle_reply(ModemReply::Prompt, now_ms, queue, status);
        }

        if self.state == LinkState::Booting
            && now_ms.wrapping_sub(self.last_probe_ms) > self.cfg.probe_interval_ms
        {
            if let Err(e) = self.send_cmd("AT\r\n") {
                warn!("liveness probe write failed: {e}");
            }
            self.last_probe_ms = now_ms;
        }

        let timed_out = self
            .in_flight
            .as_ref()
            .is_some_and(|flight| now_ms.wrapping_sub(flight.started_ms) >= self.cfg.send_timeout_ms);
        if timed_out {
            if let Some(flight) = self.in_flight.take() {
                warn!(
                    stage = ?flight.stage,
                    "send deadline expired, abandoning attempt"
                );
            }
            status.last_outcome = Some(SendOutcome::TimedOut);
            self.set_state(LinkState::Ready, status);
        }
    }

    fn handle_reply<S: NvStore>(
        &mut self,
        reply: ModemReply,
        now_ms: u32,
        queue: &mut EventQueue<S>,
        status: &mut LinkStatus,
    ) {
        match reply {
            // Boot-phase acknowledgments carry no transition of their own.
            ModemReply::Ack | ModemReply::Busy => {}

            ModemReply::GotIp => {
                if self.state == LinkState::Booting {
                    info!("network joined with address, link ready");
                    self.set_state(LinkState::Ready, status);
                }
            }

            // Associated but no address yet; not ready.
            ModemReply::Joined => {
                debug!("network associated, waiting for address");
            }

            ModemReply::ProtocolError | ModemReply::DnsFail => {
                if self.in_flight.take().is_some() {
                    status.last_outcome = Some(SendOutcome::Aborted);
                    warn!("modem aborted the pending send");
                }
                if self.state != LinkState::Off {
                    self.set_state(LinkState::Error, status);
                    warn!("modem reported a protocol failure");
                }
            }

            ModemReply::Connected | ModemReply::AlreadyConnected => {
                if self.stage() == Some(SendStage::AwaitConnect) {
                    let len = self
                        .in_flight
                        .as_ref()
                        .map(|flight| flight.payload.len())
                        .unwrap_or_default();
                    let cmd = format!("AT+CIPSEND={len}\r\n");
                    if self.send_cmd(&cmd).is_ok() {
                        self.set_stage(SendStage::AwaitPrompt);
                    }
                }
            }

            ModemReply::Prompt => {
                if self.stage() == Some(SendStage::AwaitPrompt) {
                    let payload = self
                        .in_flight
                        .as_ref()
                        .map(|flight| flight.payload.clone())
                        .unwrap_or_default();
                    match self.transport.write_all(&payload) {
                        Ok(()) => {
                            debug!(bytes = payload.len(), "payload written");
                            self.set_stage(SendStage::AwaitResult);
                        }
                        Err(e) => warn!("payload write failed: {e}"),
                    }
                }
            }

            ModemReply::SendOk => {
                if self.in_flight.take().is_some() {
                    if !queue.is_empty() {
                        queue.dequeue();
                    }
                    status.last_success_ms = Some(now_ms);
                    status.last_outcome = Some(SendOutcome::Delivered);
                    self.set_state(LinkState::Ready, status);
                    info!("upload confirmed, entry dequeued");
                }
            }

            ModemReply::SendFail => {
                if self.in_flight.take().is_some() {
                    status.last_outcome = Some(SendOutcome::Rejected);
                    self.set_state(LinkState::Ready, status);
                    warn!("transmit failed, entry retained for retry");
                }
            }

            // Remote close while pending doubles as a completion signal in
            // case the result line itself was missed.
            ModemReply::Closed => {
                if self.in_flight.take().is_some() {
                    debug!("remote closed mid-send, treating as completion");
                    self.set_state(LinkState::Ready, status);
                }
            }

            ModemReply::Unrecognized => {}
        }
    }

    /// The HTTP-style GET carrying one reading. The timestamp stays local.
    fn format_payload(&self, event: &Event) -> Vec<u8> {
        format!(
            "GET /update?api_key={}&field1={} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            self.cfg.api_key, event.duration_ms, self.cfg.host
        )
        .into_bytes()
    }

    fn pump_receive(&mut self) {
        let mut scratch = [0u8; 256];
        loop {
            match self.transport.read_available(&mut scratch) {
                Ok(0) => break,
                Ok(n) => self.rx.feed(&scratch[..n]),
                Err(e) => {
                    warn!("modem read failed: {e}");
                    break;
                }
            }
        }
    }

    fn drain_stale_input(&mut self) {
        let mut scratch = [0u8; 256];
        while matches!(self.transport.read_available(&mut scratch), Ok(n) if n > 0) {}
    }

    fn send_cmd(&mut self, cmd: &str) -> NodeResult<()> {
        trace!(cmd = %cmd.trim_end(), "modem command");
        self.transport.write_all(cmd.as_bytes())
    }

    fn settle(&self) {
        if !self.cfg.settle.is_zero() {
            std::thread::sleep(self.cfg.settle);
        }
    }

    fn stage(&self) -> Option<SendStage> {
        self.in_flight.as_ref().map(|flight| flight.stage)
    }

    fn set_stage(&mut self, stage: SendStage) {
        if let Some(flight) = self.in_flight.as_mut() {
            flight.stage = stage;
        }
    }

    fn set_state(&mut self, state: LinkState, status: &mut LinkStatus) {
        self.state = state;
        status.state = state;
    }
}
