/// Errors that can occur while encoding progress events into packets.
///
/// Decoding never errors: malformed or foreign datagrams are silently
/// ignored so that receivers stay forward-compatible with senders speaking
/// unknown protocol versions.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The body needs more fragments than the 3-digit index can address.
    #[error("message body requires {fragments} fragments, max {max} (3-digit fragment index)")]
    TooManyFragments { fragments: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
