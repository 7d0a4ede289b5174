//! Loopback demo: a receiver rendering progress events sent from the same
//! process.
//!
//! Run with `cargo run --example loopback`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use progwire::peer::Result;
use progwire::{ProgressReceiver, ProgressSender, ProgressSink};

/// Renders progress to stderr.
#[derive(Default)]
struct ConsoleSink {
    steps: AtomicU64,
    max: AtomicU64,
}

impl ProgressSink for ConsoleSink {
    fn intermediate_result(&self, message: Option<&str>) -> Result<()> {
        eprintln!("intermediate result: {}", message.unwrap_or("<none>"));
        Ok(())
    }

    fn finish(&self, message: &str) -> Result<()> {
        eprintln!("finished: {message}");
        Ok(())
    }

    fn step(&self) -> Result<()> {
        let done = self.steps.fetch_add(1, Ordering::Relaxed) + 1;
        eprintln!("step {done}/{}", self.max.load(Ordering::Relaxed));
        Ok(())
    }

    fn set_extra_message(&self, message: &str) -> Result<()> {
        eprintln!("working on: {message}");
        Ok(())
    }

    fn set_max(&self, max: u64) -> Result<()> {
        self.max.store(max, Ordering::Relaxed);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let receiver = ProgressReceiver::new(Arc::new(ConsoleSink::default()))?;
    let sender = ProgressSender::new(receiver.port())?;

    sender.set_max(5)?;
    for file in ["a.rs", "b.rs", "c.rs", "d.rs", "e.rs"] {
        sender.set_extra_message(file)?;
        sender.step()?;
        thread::sleep(Duration::from_millis(100));
    }
    sender.intermediate_result(Some("5 files processed"))?;

    // Give the last datagrams time to arrive before tearing down.
    thread::sleep(Duration::from_millis(200));
    receiver.finish("all done")?;
    receiver.close()?;
    Ok(())
}
