use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use progwire::peer::Result;
use progwire::{ProgressReceiver, ProgressSender, ProgressSink, ReceiverConfig};

/// Minimal delegate with toggleable cancellation state.
#[derive(Default)]
struct CancelableSink {
    steps: AtomicU64,
    canceled: AtomicBool,
}

impl ProgressSink for CancelableSink {
    fn intermediate_result(&self, _message: Option<&str>) -> Result<()> {
        Ok(())
    }

    fn finish(&self, _message: &str) -> Result<()> {
        Ok(())
    }

    fn step(&self) -> Result<()> {
        self.steps.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn set_extra_message(&self, _message: &str) -> Result<()> {
        Ok(())
    }

    fn set_max(&self, _max: u64) -> Result<()> {
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }

    fn set_canceled(&self, canceled: bool) {
        self.canceled.store(canceled, Ordering::Relaxed);
    }

    fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Relaxed)
    }
}

fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

fn fast_config() -> ReceiverConfig {
    ReceiverConfig {
        poll_timeout: Duration::from_millis(20),
        ..ReceiverConfig::default()
    }
}

fn pair() -> (Arc<CancelableSink>, ProgressReceiver, ProgressSender) {
    let delegate = Arc::new(CancelableSink::default());
    let receiver = ProgressReceiver::with_config(delegate.clone(), fast_config())
        .expect("receiver should bind");
    let sender = ProgressSender::new(receiver.port()).expect("sender should construct");
    (delegate, receiver, sender)
}

#[test]
fn delegate_cancellation_reaches_the_sender() {
    let (delegate, receiver, sender) = pair();

    assert!(!sender.is_canceled());
    assert!(!receiver.is_canceled());

    // Establish communication so the receiver learns the sender's address.
    sender.step().expect("step should send");
    assert!(wait_until(Duration::from_secs(5), || {
        delegate.steps.load(Ordering::Relaxed) == 1
    }));

    delegate.set_canceled(true);
    assert!(receiver.is_canceled(), "receiver reflects delegate state");

    // The sender observes the pushed-back notification on its next drain.
    assert!(wait_until(Duration::from_secs(5), || sender.is_canceled()));

    receiver.close().expect("close should succeed");
}

#[test]
fn receiver_cancellation_reaches_the_sender() {
    let (delegate, receiver, sender) = pair();

    sender.step().expect("step should send");
    assert!(wait_until(Duration::from_secs(5), || {
        delegate.steps.load(Ordering::Relaxed) == 1
    }));

    receiver.set_canceled(true);
    assert!(receiver.is_canceled());

    sender.set_max(100).expect("set_max should send");
    assert!(wait_until(Duration::from_secs(5), || sender.is_canceled()));

    receiver.close().expect("close should succeed");
}

#[test]
fn cancellation_is_a_one_way_latch() {
    let (delegate, receiver, sender) = pair();

    sender.step().expect("step should send");
    assert!(wait_until(Duration::from_secs(5), || {
        delegate.steps.load(Ordering::Relaxed) == 1
    }));

    delegate.set_canceled(true);
    assert!(wait_until(Duration::from_secs(5), || sender.is_canceled()));

    // Attempts to un-cancel change nothing.
    delegate.set_canceled(false);
    receiver.set_canceled(false);
    sender.set_canceled(false);

    sender.step().expect("step should send");
    assert!(sender.is_canceled(), "sender latch never reverts");
    assert!(receiver.is_canceled(), "receiver latch never reverts");

    receiver.close().expect("close should succeed");
}

#[test]
fn polling_alone_observes_cancellation() {
    let (delegate, receiver, sender) = pair();

    sender.step().expect("step should send");
    assert!(wait_until(Duration::from_secs(5), || {
        delegate.steps.load(Ordering::Relaxed) == 1
    }));

    receiver.set_canceled(true);

    // No further progress calls: is_canceled alone must drain and latch.
    assert!(wait_until(Duration::from_secs(5), || sender.is_canceled()));

    receiver.close().expect("close should succeed");
}
