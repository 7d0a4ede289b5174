//! UDP sender/receiver pair for remote progress reporting.
//!
//! A worker process drives a [`ProgressSender`]; a coordinating process
//! wraps a local [`ProgressSink`] in a [`ProgressReceiver`]. Both ends
//! implement the same [`ProgressSink`] contract as a purely local
//! implementation, so they are interchangeable with one.
//!
//! Delivery is best-effort: datagrams may be lost, duplicated, or
//! reordered. Remote failures travel as encoded
//! [`RemoteErrorReport`](progwire_report::RemoteErrorReport) bodies and
//! are re-raised on the receiving side's next sink call. Cancellation is a
//! cooperative one-way latch pushed back from receiver to sender.

pub mod cancel;
pub mod error;
pub mod receiver;
pub mod sender;
pub mod sink;

pub use cancel::{is_cancel_datagram, CANCEL_TOKEN};
pub use error::{PeerError, Result};
pub use receiver::{ProgressReceiver, ReceiverConfig};
pub use sender::{ProgressSender, SenderConfig};
pub use sink::{NoopProgressSink, ProgressSink};
