//! Turns raw transport chunks into logical protocol lines
//!
//! The server writes plain text with no framing. A line may arrive split across
//! several reads, long lines are wrapped into backslash-prefixed continuation
//! lines, and the idle prompt is glued to the front of whatever the server
//! prints next. The demultiplexer undoes all three so that listeners only ever
//! see complete, trimmed lines.

use crate::CONTINUATION_MARKER;
use log::debug;

/// Suffix of an interactive input request (`login: `, `password: `).
const INPUT_REQUEST_SUFFIX: &str = ": ";

/// One complete protocol line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    text: String,
    prompted: bool,
}

impl LogicalLine {
    /// Builds a line from raw text, trimming it and stripping a leading prompt
    pub fn new(raw: &str, prompt: &str) -> Self {
        let trimmed = raw.trim();

        if !prompt.is_empty() {
            if let Some(rest) = trimmed.strip_prefix(prompt) {
                if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                    return Self {
                        text: rest.trim_start().to_string(),
                        prompted: true,
                    };
                }
            }
        }

        Self {
            text: trimmed.to_string(),
            prompted: false,
        }
    }

    /// Line content with the prompt removed
    pub fn text(&self) -> &str {
        &self.text
    }

    /// True when the server's idle prompt preceded this line
    pub fn is_prompted(&self) -> bool {
        self.prompted
    }

    /// True for a line that is nothing but the idle prompt
    pub fn is_idle_prompt(&self) -> bool {
        self.prompted && self.text.is_empty()
    }
}

/// Reassembles logical lines from arbitrary chunks of server output
///
/// Holds at most one incomplete fragment between calls. A parent line is held
/// back together with an unfinished continuation.
///
/// # Limitations
///
/// A complete line is released as soon as its terminator arrives, because
/// nothing in the stream says whether a continuation will follow. When the
/// server wraps a line exactly at a read boundary, the continuation starts the
/// next chunk after its parent has already been delivered. That continuation
/// has nothing to attach to and is dropped (logged at debug level), so the
/// wrapped tail of the line is lost.
#[derive(Debug)]
pub struct LineDemultiplexer {
    prompt: String,
    pending: String,
    undecoded: Vec<u8>,
}

impl LineDemultiplexer {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            pending: String::new(),
            undecoded: Vec::new(),
        }
    }

    /// The fragment currently withheld waiting for its terminator
    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Consumes one chunk of transport data and returns the completed lines
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<LogicalLine> {
        let chunk = self.decode(bytes);
        self.feed_str(&chunk)
    }

    /// Same as [`feed`](Self::feed) for already decoded text
    pub fn feed_str(&mut self, chunk: &str) -> Vec<LogicalLine> {
        let mut data = std::mem::take(&mut self.pending);
        data.push_str(chunk);

        let mut segments: Vec<&str> = data.split('\n').collect();

        // The last segment is empty when the data ended on a terminator
        let tail = segments.pop().unwrap_or_default();
        if !tail.is_empty() {
            if self.releases_fragment(tail) {
                segments.push(tail);
            } else {
                // An unfinished continuation keeps its parent line company
                let held_from = if is_continuation(tail.trim_start()) {
                    segments
                        .iter()
                        .rposition(|s| !is_continuation(s.trim()))
                        .unwrap_or(segments.len())
                } else {
                    segments.len()
                };

                let mut held = segments.split_off(held_from);
                held.push(tail);
                self.pending = held.join("\n");
            }
        }

        join_continuations(&segments)
            .into_iter()
            .map(|raw| LogicalLine::new(&raw, &self.prompt))
            .collect()
    }

    /// An unterminated fragment is still a whole line when the server is
    /// waiting for input after it.
    fn releases_fragment(&self, fragment: &str) -> bool {
        fragment.ends_with(INPUT_REQUEST_SUFFIX)
            || (!self.prompt.is_empty() && fragment.trim() == self.prompt)
    }

    fn decode(&mut self, bytes: &[u8]) -> String {
        self.undecoded.extend_from_slice(bytes);

        match std::str::from_utf8(&self.undecoded) {
            Ok(text) => {
                let text = text.to_string();
                self.undecoded.clear();
                text
            }
            // Incomplete sequence at the end: keep it for the next chunk
            Err(e) if e.error_len().is_none() => {
                let valid = e.valid_up_to();
                let rest = self.undecoded.split_off(valid);
                let text = String::from_utf8_lossy(&self.undecoded).into_owned();
                self.undecoded = rest;
                text
            }
            Err(_) => {
                let text = String::from_utf8_lossy(&self.undecoded).into_owned();
                self.undecoded.clear();
                text
            }
        }
    }
}

fn is_continuation(line: &str) -> bool {
    line.starts_with(CONTINUATION_MARKER)
}

/// Folds each run of continuation segments onto the line before it
fn join_continuations(segments: &[&str]) -> Vec<String> {
    let mut lines: Vec<String> = Vec::with_capacity(segments.len());

    for segment in segments {
        let trimmed = segment.trim();

        if !is_continuation(trimmed) {
            lines.push(trimmed.to_string());
            continue;
        }

        match lines.last_mut() {
            Some(previous) => {
                let continued = trimmed[CONTINUATION_MARKER.len_utf8()..].trim();
                if !continued.is_empty() {
                    previous.push(' ');
                    previous.push_str(continued);
                }
            }
            None => debug!("Dropping continuation line without a parent: {:?}", trimmed),
        }
    }

    lines
}
