use std::error::Error;
use std::fmt;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;

use crate::error::{ReportError, Result};
use crate::sanitize::{capture_call_site, sanitize_cause_chain};

/// Literal standing in for an absent field in the encoded form.
const NULL_TOKEN: &str = "null";

/// An error report describing a failure in a remote worker.
///
/// Carries enough to render a meaningful message, fix suggestions, and
/// optionally a sanitized stack trace on the coordinating side. Implements
/// [`std::error::Error`] so the receiver can propagate it directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteErrorReport {
    message: String,
    sanitized_stack_trace: Option<String>,
    fix_suggestions: Vec<String>,
    partial_success: bool,
}

impl RemoteErrorReport {
    /// Start building a report. The builder captures a sanitized backtrace
    /// of the construction site; [`RemoteErrorReportBuilder::cause`]
    /// replaces it with an error's cause chain.
    pub fn builder(message: impl Into<String>) -> RemoteErrorReportBuilder {
        RemoteErrorReportBuilder {
            message: message.into(),
            sanitized_stack_trace: Some(capture_call_site(&[])),
            fix_suggestions: Vec::new(),
            partial_success: false,
        }
    }

    /// The failure message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Sanitized stack-trace text, if any.
    pub fn sanitized_stack_trace(&self) -> Option<&str> {
        self.sanitized_stack_trace.as_deref()
    }

    /// Human-readable fix suggestions, in presentation order.
    pub fn fix_suggestions(&self) -> &[String] {
        &self.fix_suggestions
    }

    /// Whether the failing operation produced partial results worth keeping.
    pub fn partial_success(&self) -> bool {
        self.partial_success
    }

    /// Encode as a line-oriented base64 blob suitable as a message body.
    ///
    /// One line per field, fixed order: message, stack trace, suggestions,
    /// partial-success. Absent fields are the literal `null`; suggestions
    /// are comma-joined base64 tokens.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        out.push_str(&URL_SAFE.encode(self.message.as_bytes()));
        out.push('\n');
        match &self.sanitized_stack_trace {
            Some(trace) => out.push_str(&URL_SAFE.encode(trace.as_bytes())),
            None => out.push_str(NULL_TOKEN),
        }
        out.push('\n');
        if self.fix_suggestions.is_empty() {
            out.push_str(NULL_TOKEN);
        } else {
            let joined: Vec<String> = self
                .fix_suggestions
                .iter()
                .map(|s| URL_SAFE.encode(s.as_bytes()))
                .collect();
            out.push_str(&joined.join(","));
        }
        out.push('\n');
        out.push_str(if self.partial_success { "true" } else { "false" });
        out
    }

    /// Decode an encoded report.
    ///
    /// A three-line input (produced by an older protocol revision without
    /// the partial-success field) decodes with `partial_success = false`.
    pub fn decode(encoded: &str) -> Result<Self> {
        let lines: Vec<&str> = encoded.lines().collect();
        if lines.len() < 3 {
            return Err(ReportError::MissingFields(lines.len()));
        }

        let message = decode_field(lines[0])?;
        let sanitized_stack_trace = if lines[1] == NULL_TOKEN {
            None
        } else {
            Some(decode_field(lines[1])?)
        };
        let fix_suggestions = if lines[2] == NULL_TOKEN {
            Vec::new()
        } else {
            lines[2]
                .split(',')
                .map(decode_field)
                .collect::<Result<Vec<String>>>()?
        };
        let partial_success = lines.get(3).is_some_and(|line| line.trim() == "true");

        Ok(Self {
            message,
            sanitized_stack_trace,
            fix_suggestions,
            partial_success,
        })
    }
}

fn decode_field(token: &str) -> Result<String> {
    Ok(String::from_utf8(URL_SAFE.decode(token)?)?)
}

impl fmt::Display for RemoteErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for RemoteErrorReport {}

/// Builder for [`RemoteErrorReport`].
#[derive(Debug)]
pub struct RemoteErrorReportBuilder {
    message: String,
    sanitized_stack_trace: Option<String>,
    fix_suggestions: Vec<String>,
    partial_success: bool,
}

impl RemoteErrorReportBuilder {
    /// Replace the stack trace with `err`'s sanitized cause chain.
    ///
    /// Frames matching `prefix_filters` (or known noisy runtime prefixes)
    /// cut emission short; see [`sanitize_cause_chain`].
    pub fn cause(mut self, err: &(dyn Error + 'static), prefix_filters: &[&str]) -> Self {
        self.sanitized_stack_trace = Some(sanitize_cause_chain(err, prefix_filters));
        self
    }

    /// Drop the stack trace entirely.
    pub fn without_stack_trace(mut self) -> Self {
        self.sanitized_stack_trace = None;
        self
    }

    /// Append fix suggestions.
    pub fn fix_suggestions<I, S>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fix_suggestions
            .extend(suggestions.into_iter().map(Into::into));
        self
    }

    /// Mark that the operation produced partial results before failing.
    pub fn partial_success(mut self, partial_success: bool) -> Self {
        self.partial_success = partial_success;
        self
    }

    /// Finish the report.
    pub fn build(self) -> RemoteErrorReport {
        RemoteErrorReport {
            message: self.message,
            sanitized_stack_trace: self.sanitized_stack_trace,
            fix_suggestions: self.fix_suggestions,
            partial_success: self.partial_success,
        }
    }
}
