use std::backtrace::Backtrace;
use std::error::Error;

/// Frame lines emitted per capture before the `...` marker.
pub const MAX_FRAMES: usize = 8;

/// Symbol prefixes that end frame emission: past these lie runtime and
/// socket internals that carry no signal for the reader.
const NOISY_PREFIXES: &[&str] = &["std::sys", "std::net", "std::rt", "core::ops::function"];

/// Capture-machinery prefixes skipped at the top of every backtrace.
const CAPTURE_PREFIXES: &[&str] = &["std::backtrace", "backtrace", "progwire_report"];

/// Render an error's cause chain as sanitized stack-trace text.
///
/// The root error's display forms the first line; each `source()` link adds
/// a `Caused by:` line. Frame lines come from a backtrace captured at the
/// call site, truncated to [`MAX_FRAMES`] and cut short at the first frame
/// matching a noisy-runtime prefix or any of `prefix_filters`.
pub fn sanitize_cause_chain(err: &(dyn Error + 'static), prefix_filters: &[&str]) -> String {
    let mut lines = Vec::new();
    let mut depth = 0;
    let mut next = Some(err);
    while let Some(cause) = next {
        if depth == 0 {
            lines.push(cause.to_string());
        } else {
            lines.push(format!("Caused by: {cause}"));
        }
        next = cause.source();
        depth += 1;
    }
    push_frames(&mut lines, &Backtrace::force_capture().to_string(), prefix_filters);
    lines.join("\n")
}

/// Sanitized frames for the current call site, no cause chain.
pub(crate) fn capture_call_site(prefix_filters: &[&str]) -> String {
    let mut lines = Vec::new();
    push_frames(&mut lines, &Backtrace::force_capture().to_string(), prefix_filters);
    lines.join("\n")
}

fn push_frames(out: &mut Vec<String>, rendered: &str, prefix_filters: &[&str]) {
    let mut emitted = 0;
    let mut past_capture = false;
    for line in rendered.lines() {
        let Some(symbol) = frame_symbol(line) else {
            continue;
        };
        if !past_capture {
            if CAPTURE_PREFIXES.iter().any(|p| symbol.starts_with(p)) {
                continue;
            }
            past_capture = true;
        }
        if NOISY_PREFIXES
            .iter()
            .chain(prefix_filters.iter())
            .any(|p| symbol.starts_with(p))
        {
            break;
        }
        if emitted >= MAX_FRAMES {
            out.push("  ...".to_string());
            break;
        }
        out.push(format!("  {symbol}"));
        emitted += 1;
    }
}

/// Extract the symbol from a `   N: symbol::path` backtrace line; `at`
/// location lines yield `None`.
fn frame_symbol(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let (index, symbol) = trimmed.split_once(": ")?;
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(symbol.trim_end())
}
