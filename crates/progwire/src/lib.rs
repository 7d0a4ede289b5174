//! Remote progress reporting over unreliable datagrams.
//!
//! A worker process reports progress, status messages, and terminal
//! failures to a coordinating process over UDP; the coordinator can push a
//! best-effort cancellation signal back. The layers:
//!
//! - [`frame`] — fragmentation of one progress event into bounded-size
//!   datagrams, and order/duplicate-tolerant reassembly
//! - [`report`] — error reports serialized as message bodies
//! - [`peer`] — the [`ProgressSender`]/[`ProgressReceiver`] pair sharing
//!   the [`ProgressSink`] contract with purely local sinks
//!
//! ```no_run
//! use std::sync::Arc;
//! use progwire::{NoopProgressSink, ProgressReceiver, ProgressSender, ProgressSink};
//!
//! # fn main() -> progwire::peer::Result<()> {
//! let receiver = ProgressReceiver::new(Arc::new(NoopProgressSink))?;
//! let sender = ProgressSender::new(receiver.port())?;
//! sender.set_max(100)?;
//! sender.step()?;
//! # Ok(())
//! # }
//! ```

pub use progwire_frame as frame;
pub use progwire_peer as peer;
pub use progwire_report as report;

pub use progwire_peer::{
    NoopProgressSink, ProgressReceiver, ProgressSender, ProgressSink, ReceiverConfig, SenderConfig,
};
pub use progwire_report::RemoteErrorReport;
