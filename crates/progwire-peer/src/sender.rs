use std::borrow::Cow;
use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use progwire_frame::{encode_packets, EventType, MAX_PACKET_LEN};
use progwire_report::RemoteErrorReport;
use tracing::{debug, trace};

use crate::cancel::is_cancel_datagram;
use crate::error::{PeerError, Result};
use crate::sink::ProgressSink;

/// Default maximum characters per transmitted message body.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 255;

/// Tunables for a [`ProgressSender`].
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Messages longer than this are truncated to their trailing suffix.
    pub max_message_len: usize,
    /// Receive timeout for the opportunistic cancel drain. Near-zero so a
    /// drain never stalls the caller's progress reporting.
    pub drain_timeout: Duration,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            drain_timeout: Duration::from_millis(1),
        }
    }
}

/// Reports progress to a remote [`ProgressReceiver`](crate::ProgressReceiver)
/// over UDP.
///
/// Every outbound send first drains the inbound socket buffer for cancel
/// notifications pushed back by the receiver; once one is seen the sender's
/// cancel latch is set for good.
pub struct ProgressSender {
    socket: UdpSocket,
    dest: SocketAddr,
    canceled: AtomicBool,
    config: SenderConfig,
}

impl ProgressSender {
    /// Connect to a receiver on the local host.
    ///
    /// Inside a container (detected via `/.dockerenv`) the coordinator
    /// usually lives on the host, so `host.docker.internal` is preferred;
    /// otherwise `localhost`. If the preferred host does not resolve, the
    /// loopback address is used instead.
    pub fn new(port: u16) -> Result<Self> {
        Self::with_config(None, port, SenderConfig::default())
    }

    /// Connect to a receiver at an explicit address.
    pub fn with_address(address: IpAddr, port: u16) -> Result<Self> {
        Self::with_config(Some(address), port, SenderConfig::default())
    }

    /// Connect with explicit tunables.
    pub fn with_config(address: Option<IpAddr>, port: u16, config: SenderConfig) -> Result<Self> {
        let dest = match address {
            Some(ip) => SocketAddr::new(ip, port),
            None => {
                let preferred = if Path::new("/.dockerenv").exists() {
                    "host.docker.internal"
                } else {
                    "localhost"
                };
                match resolve(preferred, port) {
                    Ok(addr) => addr,
                    Err(error) => {
                        debug!(host = preferred, %error, "preferred host did not resolve, using loopback");
                        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
                    }
                }
            }
        };

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).map_err(PeerError::Bind)?;
        socket
            .set_read_timeout(Some(config.drain_timeout))
            .map_err(PeerError::Bind)?;

        debug!(%dest, "progress sender ready");
        Ok(Self {
            socket,
            dest,
            canceled: AtomicBool::new(false),
            config,
        })
    }

    /// Transmit a failure report as an `Exception` event.
    ///
    /// The receiving side re-raises the decoded report on its next sink
    /// call rather than the instant the datagram arrives.
    pub fn throw_remote(&self, report: &RemoteErrorReport) -> Result<()> {
        self.send(EventType::Exception, Some(&report.encode()))
    }

    fn send(&self, event_type: EventType, body: Option<&str>) -> Result<()> {
        self.drain_cancellations();
        for packet in encode_packets(event_type, body)? {
            match self.socket.send_to(&packet, self.dest) {
                Ok(_) => {}
                Err(error) if error.kind() == ErrorKind::ConnectionRefused => {
                    // Nobody listening any longer; a progress report with no
                    // audience is not an application error.
                    trace!("receiver gone, dropping progress packets");
                    return Ok(());
                }
                Err(error) => return Err(PeerError::Send(error)),
            }
        }
        Ok(())
    }

    /// Pull any queued cancel notifications off the socket without blocking
    /// beyond the configured drain timeout.
    fn drain_cancellations(&self) {
        let mut buf = [0u8; MAX_PACKET_LEN];
        loop {
            match self.socket.recv_from(&mut buf) {
                Ok((len, _)) => {
                    if is_cancel_datagram(&buf[..len]) {
                        debug!("received remote cancel notification");
                        self.canceled.store(true, Ordering::Relaxed);
                    }
                }
                Err(error)
                    if matches!(error.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    break;
                }
                Err(_) => break,
            }
        }
    }
}

impl ProgressSink for ProgressSender {
    fn intermediate_result(&self, message: Option<&str>) -> Result<()> {
        let message = message.map(|m| truncate_message(m, self.config.max_message_len));
        self.send(EventType::IntermediateResult, message.as_deref())
    }

    fn finish(&self, _message: &str) -> Result<()> {
        Err(PeerError::FinishUnsupported)
    }

    fn step(&self) -> Result<()> {
        self.send(EventType::Step, None)
    }

    fn set_extra_message(&self, message: &str) -> Result<()> {
        let message = truncate_message(message, self.config.max_message_len);
        self.send(EventType::SetExtraMessage, Some(&message))
    }

    fn set_max(&self, max: u64) -> Result<()> {
        self.send(EventType::SetMax, Some(&max.to_string()))
    }

    fn close(&self) -> Result<()> {
        // The socket closes when the sender is dropped.
        Ok(())
    }

    fn set_canceled(&self, canceled: bool) {
        // One-way latch: un-cancellation requests are ignored.
        if canceled {
            self.canceled.store(true, Ordering::Relaxed);
        }
    }

    fn is_canceled(&self) -> bool {
        // Drain first so polling-only callers still observe remote cancels.
        self.drain_cancellations();
        self.canceled.load(Ordering::Relaxed)
    }
}

fn resolve(host: &str, port: u16) -> std::io::Result<SocketAddr> {
    let mut addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
    // The sender socket is IPv4; prefer an IPv4 address when the host
    // resolves to both families.
    if let Some(position) = addrs.iter().position(SocketAddr::is_ipv4) {
        return Ok(addrs.swap_remove(position));
    }
    addrs.into_iter().next().ok_or_else(|| {
        std::io::Error::new(ErrorKind::NotFound, "host resolved to no addresses")
    })
}

/// Truncate to at most `max_len` characters, keeping the trailing suffix
/// behind a `...` marker: the most recent context beats the earliest.
fn truncate_message(message: &str, max_len: usize) -> Cow<'_, str> {
    let count = message.chars().count();
    if count <= max_len {
        return Cow::Borrowed(message);
    }
    let keep = max_len.saturating_sub(3);
    let start = message
        .char_indices()
        .nth(count - keep)
        .map(|(offset, _)| offset)
        .unwrap_or(0);
    Cow::Owned(format!("...{}", &message[start..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_messages_pass_through() {
        let message = "a".repeat(DEFAULT_MAX_MESSAGE_LEN);
        assert_eq!(
            truncate_message(&message, DEFAULT_MAX_MESSAGE_LEN),
            message
        );
        assert_eq!(truncate_message("", DEFAULT_MAX_MESSAGE_LEN), "");
    }

    #[test]
    fn long_messages_keep_the_trailing_suffix() {
        let message = format!("{}{}", "x".repeat(300), "the interesting part");
        let truncated = truncate_message(&message, DEFAULT_MAX_MESSAGE_LEN);

        assert_eq!(truncated.chars().count(), DEFAULT_MAX_MESSAGE_LEN);
        assert!(truncated.starts_with("..."));
        assert!(truncated.ends_with("the interesting part"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let message = "é".repeat(300);
        let truncated = truncate_message(&message, DEFAULT_MAX_MESSAGE_LEN);
        assert_eq!(truncated.chars().count(), DEFAULT_MAX_MESSAGE_LEN);
    }

    #[test]
    fn finish_is_unsupported() {
        let sender = ProgressSender::with_address(IpAddr::V4(Ipv4Addr::LOCALHOST), 40000)
            .expect("sender should construct");
        assert!(matches!(
            sender.finish("done"),
            Err(PeerError::FinishUnsupported)
        ));
    }

    #[test]
    fn cancel_latch_is_monotonic() {
        let sender = ProgressSender::with_address(IpAddr::V4(Ipv4Addr::LOCALHOST), 40001)
            .expect("sender should construct");
        sender.set_canceled(true);
        sender.set_canceled(false);
        assert!(sender.is_canceled());
    }
}
