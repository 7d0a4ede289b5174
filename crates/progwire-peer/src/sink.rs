use crate::error::Result;

/// The progress-reporting contract shared by local, sending, and receiving
/// implementations.
///
/// Methods take `&self` so a sink can be shared across threads; concrete
/// implementations use interior mutability where they keep state. The
/// cancellation methods default to a no-op/`false` so sinks that predate
/// cancellation keep compiling.
pub trait ProgressSink: Send + Sync {
    /// Report an intermediate result of the underlying operation.
    fn intermediate_result(&self, message: Option<&str>) -> Result<()>;

    /// Mark the operation finished with a final message.
    fn finish(&self, message: &str) -> Result<()>;

    /// Advance progress by one step.
    fn step(&self) -> Result<()>;

    /// Replace the short context message shown alongside progress.
    fn set_extra_message(&self, message: &str) -> Result<()>;

    /// Set the total number of steps.
    fn set_max(&self, max: u64) -> Result<()>;

    /// Release any resources held by the sink.
    fn close(&self) -> Result<()>;

    /// Request (or, for implementations that latch, observe a request for)
    /// cancellation of the underlying operation.
    fn set_canceled(&self, canceled: bool) {
        let _ = canceled;
    }

    /// Whether cancellation has been requested.
    fn is_canceled(&self) -> bool {
        false
    }
}

/// A sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {
    fn intermediate_result(&self, _message: Option<&str>) -> Result<()> {
        Ok(())
    }

    fn finish(&self, _message: &str) -> Result<()> {
        Ok(())
    }

    fn step(&self) -> Result<()> {
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
}
