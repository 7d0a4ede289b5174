use progwire_report::RemoteErrorReport;

/// Errors that can occur in sender/receiver operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Failed to bind the local progress socket.
    #[error("failed to bind progress socket: {0}")]
    Bind(#[source] std::io::Error),

    /// Failed to resolve the receiver's address.
    #[error("failed to resolve {host}: {source}")]
    Resolve {
        host: String,
        source: std::io::Error,
    },

    /// Sending a progress datagram failed for a reason other than the
    /// receiver being gone.
    #[error("progress send failed: {0}")]
    Send(#[source] std::io::Error),

    /// Wire-level encoding error.
    #[error("frame error: {0}")]
    Frame(#[from] progwire_frame::FrameError),

    /// A received error report could not be decoded.
    #[error("report error: {0}")]
    Report(#[from] progwire_report::ReportError),

    /// A failure reported by the remote worker, re-raised locally.
    #[error(transparent)]
    Remote(#[from] RemoteErrorReport),

    /// `finish` is not transmitted: completion wording is decided by the
    /// receiving side.
    #[error("finish is determined by the receiver")]
    FinishUnsupported,

    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PeerError>;
