use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use progwire_frame::{decode_packet, EventType, ProgressEvent, ReassemblyTable, MAX_PACKET_LEN};
use progwire_report::RemoteErrorReport;
use tracing::{debug, info, warn};

use crate::cancel::CANCEL_TOKEN;
use crate::error::{PeerError, Result};
use crate::sink::ProgressSink;

/// Tunables for a [`ProgressReceiver`].
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Maximum in-flight incomplete messages before the oldest is dropped.
    pub table_capacity: usize,
    /// Socket read timeout; bounds how long `close` can take when the wake
    /// datagram is lost.
    pub poll_timeout: Duration,
    /// How many best-effort cancel datagrams to push back to the sender.
    pub cancel_repeats: u32,
    /// Delay between repeated cancel datagrams.
    pub cancel_repeat_delay: Duration,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            table_capacity: progwire_frame::DEFAULT_TABLE_CAPACITY,
            poll_timeout: Duration::from_millis(250),
            cancel_repeats: 3,
            cancel_repeat_delay: Duration::from_millis(10),
        }
    }
}

/// Receives remote progress events and forwards them to a local delegate
/// sink.
///
/// Binds an ephemeral UDP port (see [`port`](Self::port)) and runs one
/// background thread for the lifetime of the receiver. A received
/// `Exception` body is latched rather than forwarded; the next call on the
/// sink-facing API re-raises it as a [`RemoteErrorReport`].
pub struct ProgressReceiver {
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    socket: UdpSocket,
    port: u16,
    delegate: Arc<dyn ProgressSink>,
    config: ReceiverConfig,
    closed: AtomicBool,
    canceled: AtomicBool,
    cancel_notified: AtomicBool,
    /// Encoded exception body from the remote side, raised on the next
    /// sink-facing call.
    thrown: Mutex<Option<String>>,
}

impl ProgressReceiver {
    /// Bind an ephemeral port and start the receive loop.
    pub fn new(delegate: Arc<dyn ProgressSink>) -> Result<Self> {
        Self::with_config(delegate, ReceiverConfig::default())
    }

    /// Bind with explicit tunables.
    pub fn with_config(delegate: Arc<dyn ProgressSink>, config: ReceiverConfig) -> Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).map_err(PeerError::Bind)?;
        socket
            .set_read_timeout(Some(config.poll_timeout))
            .map_err(PeerError::Bind)?;
        let port = socket.local_addr().map_err(PeerError::Bind)?.port();
        info!(port, "listening for remote progress");

        let shared = Arc::new(Shared {
            socket,
            port,
            delegate,
            config,
            closed: AtomicBool::new(false),
            canceled: AtomicBool::new(false),
            cancel_notified: AtomicBool::new(false),
            thrown: Mutex::new(None),
        });

        let loop_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("progwire-receiver".to_string())
            .spawn(move || receive_loop(loop_shared))
            .map_err(PeerError::Io)?;

        Ok(Self {
            shared,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// The bound UDP port, for handing to a
    /// [`ProgressSender`](crate::ProgressSender).
    pub fn port(&self) -> u16 {
        self.shared.port
    }

    fn maybe_throw(&self) -> Result<()> {
        if let Ok(slot) = self.shared.thrown.lock() {
            if let Some(encoded) = slot.as_deref() {
                return Err(PeerError::Remote(RemoteErrorReport::decode(encoded)?));
            }
        }
        Ok(())
    }

    /// Stop the receive loop and join the background thread. Idempotent.
    fn shutdown(&self) {
        if !self.shared.closed.swap(true, Ordering::Relaxed) {
            // Nudge the blocked read; the poll timeout covers a lost nudge.
            let _ = self
                .shared
                .socket
                .send_to(&[], (Ipv4Addr::LOCALHOST, self.shared.port));
        }
        if let Ok(mut handle) = self.handle.lock() {
            if let Some(handle) = handle.take() {
                let _ = handle.join();
            }
        }
    }
}

impl ProgressSink for ProgressReceiver {
    fn intermediate_result(&self, message: Option<&str>) -> Result<()> {
        self.maybe_throw()?;
        self.shared.delegate.intermediate_result(message)
    }

    fn finish(&self, message: &str) -> Result<()> {
        self.maybe_throw()?;
        self.shared.delegate.finish(message)
    }

    fn step(&self) -> Result<()> {
        self.maybe_throw()?;
        self.shared.delegate.step()
    }

    fn set_extra_message(&self, message: &str) -> Result<()> {
        self.maybe_throw()?;
        self.shared.delegate.set_extra_message(message)
    }

    fn set_max(&self, max: u64) -> Result<()> {
        self.maybe_throw()?;
        self.shared.delegate.set_max(max)
    }

    fn close(&self) -> Result<()> {
        self.shutdown();
        self.maybe_throw()
    }

    fn set_canceled(&self, canceled: bool) {
        // One-way latch: un-cancellation requests are ignored.
        if canceled {
            self.shared.canceled.store(true, Ordering::Relaxed);
        }
    }

    fn is_canceled(&self) -> bool {
        self.shared.canceled.load(Ordering::Relaxed) || self.shared.delegate.is_canceled()
    }
}

impl Drop for ProgressReceiver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn receive_loop(shared: Arc<Shared>) {
    let mut table = ReassemblyTable::with_capacity(shared.config.table_capacity);
    let mut last_sender: Option<SocketAddr> = None;
    let mut buf = [0u8; MAX_PACKET_LEN];

    while !shared.closed.load(Ordering::Relaxed) {
        match shared.socket.recv_from(&mut buf) {
            Ok((len, src)) => {
                if shared.closed.load(Ordering::Relaxed) {
                    break;
                }
                last_sender = Some(src);
                if let Some(event) = decode_packet(&buf[..len], &mut table) {
                    shared.dispatch(event);
                }
            }
            Err(error)
                if matches!(
                    error.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) => {}
            Err(error) => {
                if !shared.closed.load(Ordering::Relaxed) {
                    warn!(%error, "progress socket read failed, stopping receive loop");
                }
                break;
            }
        }
        shared.notify_cancel_if_needed(last_sender);
    }
}

impl Shared {
    fn dispatch(&self, event: ProgressEvent) {
        let result = match event.event_type {
            EventType::Exception => {
                if let Some(body) = event.body {
                    if let Ok(mut slot) = self.thrown.lock() {
                        *slot = Some(body);
                    }
                }
                Ok(())
            }
            EventType::IntermediateResult => {
                self.delegate.intermediate_result(event.body.as_deref())
            }
            EventType::Step => self.delegate.step(),
            EventType::SetExtraMessage => self
                .delegate
                .set_extra_message(event.body.as_deref().unwrap_or("")),
            EventType::SetMax => match event.body.as_deref().map(|body| body.parse::<u64>()) {
                Some(Ok(max)) => self.delegate.set_max(max),
                _ => {
                    debug!(body = ?event.body, "ignoring SetMax with unparseable count");
                    Ok(())
                }
            },
        };
        if let Err(error) = result {
            warn!(%error, "delegate rejected progress event");
        }
    }

    /// Push best-effort cancel datagrams back to the last known sender,
    /// once per receiver lifetime.
    fn notify_cancel_if_needed(&self, last_sender: Option<SocketAddr>) {
        if !self.canceled.load(Ordering::Relaxed) {
            if !self.delegate.is_canceled() {
                return;
            }
            // Latch what we observed so a later delegate un-cancel cannot
            // roll cancellation back.
            self.canceled.store(true, Ordering::Relaxed);
        }
        let Some(addr) = last_sender else {
            return;
        };
        if self.cancel_notified.swap(true, Ordering::Relaxed) {
            return;
        }
        debug!(%addr, "notifying sender of cancellation");
        for repeat in 0..self.config.cancel_repeats {
            if repeat > 0 {
                thread::sleep(self.config.cancel_repeat_delay);
            }
            if let Err(error) = self.socket.send_to(CANCEL_TOKEN, addr) {
                debug!(%error, "cancel notification send failed");
                break;
            }
        }
    }
}
