/// Errors that can occur while decoding an encoded error report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// The encoded report has fewer lines than the mandatory three fields.
    #[error("encoded report has {0} lines, expected at least 3")]
    MissingFields(usize),

    /// A field is not valid base64.
    #[error("invalid base64 in encoded report: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A decoded field is not valid UTF-8.
    #[error("encoded report field is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;
