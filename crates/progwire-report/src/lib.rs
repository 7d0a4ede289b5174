//! Serialized error reports carried as remote progress message bodies.
//!
//! A failing worker builds a [`RemoteErrorReport`] — message, sanitized
//! stack trace, fix suggestions, partial-success flag — encodes it to a
//! line-oriented base64 blob, and ships it as the body of an `Exception`
//! progress event. The coordinating side decodes it and re-raises it as a
//! first-class error.

pub mod error;
pub mod report;
pub mod sanitize;

pub use error::{ReportError, Result};
pub use report::{RemoteErrorReport, RemoteErrorReportBuilder};
pub use sanitize::sanitize_cause_chain;
