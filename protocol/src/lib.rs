//! Protocol knowledge shared by the session client: how raw server output is
//! cut into logical lines, how those lines are classified, and the records the
//! classifiers produce. Nothing in this crate performs IO.

pub mod board;
pub mod catalog;
pub mod lines;
pub mod records;

pub use board::{expand_fen, ranks_to_fen, Occupancy};
pub use catalog::{Anchoring, Catalog, GameLine, SessionLine};
pub use lines::{LineDemultiplexer, LogicalLine};
pub use records::*;

pub const DEFAULT_HOST: &str = "freechess.org";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_PROMPT: &str = "fics%";
pub const LINE_TERMINATOR: &str = "\r\n";
pub const CONTINUATION_MARKER: char = '\\';

/// Formats a command for the wire.
pub fn encode_command(command: &str) -> String {
    let mut wire = String::with_capacity(command.len() + LINE_TERMINATOR.len());
    wire.push_str(command);
    wire.push_str(LINE_TERMINATOR);
    wire
}
