//! Line grammars of the server
//!
//! Every grammar is a classifier returning a typed `Option`: `None` means the
//! line is not of that kind. Grammars that depend on a runtime value (a game
//! number, a channel, a tell recipient) are factories returning the classifier
//! for that value. Lines that match nothing are simply not interesting; the
//! server prints far more than is modelled here.

use crate::board::ranks_to_fen;
use crate::lines::LogicalLine;
use crate::records::*;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

fn pattern(source: &str) -> Regex {
    Regex::new(source).expect("protocol grammar must compile")
}

static INVALID_PASSWORD: Lazy<Regex> = Lazy::new(|| pattern(r"^\*{4} Invalid password! \*{4}$"));
static SESSION_STARTING: Lazy<Regex> =
    Lazy::new(|| pattern(r"^\*{4} Starting FICS session as (?P<user>.+) \*{4}$"));

static IT: Lazy<Regex> = Lazy::new(|| pattern(r"^--> (?P<user>\S+) (?P<message>.*)$"));
static SHOUT: Lazy<Regex> = Lazy::new(|| pattern(r"^(?P<user>\S+) shouts: (?P<message>.*)$"));
static USER_TELL: Lazy<Regex> =
    Lazy::new(|| pattern(r"^(?P<user>\S+) tells you: (?P<message>.*)$"));
static CHANNEL_TELL: Lazy<Regex> =
    Lazy::new(|| pattern(r"^(?P<user>\S+)\((?P<channel>\d+)\): (?P<message>.*)$"));

static SHOUT_ACK: Lazy<Regex> = Lazy::new(|| pattern(r"^\((?:it-)?shouted to \d+ players?\)$"));
static KIBITZ_ACK: Lazy<Regex> = Lazy::new(|| pattern(r"^\(kibitzed to \d+ players?\)$"));
static WHISPER_ACK: Lazy<Regex> = Lazy::new(|| pattern(r"^\(whispered to \d+ players?\)$"));

static CHANNEL_LIST: Lazy<Regex> = Lazy::new(|| pattern(r"^\d+(?:\s+\d+)*$"));
static CHANNEL_LIST_HEADER: Lazy<Regex> =
    Lazy::new(|| pattern(r"^-- channel list: (?P<count>\d+) channels? --$"));

static WIDE_GAP: Lazy<Regex> = Lazy::new(|| pattern(r"\s{2,}"));
static HANDLE: Lazy<Regex> = Lazy::new(|| {
    pattern(r"^(?P<rating>\d+|[+-]{4})(?P<status>[\^~:#'&. ])(?P<name>\w+)(?P<codes>(?:\([*A-Z]+\))*)$")
});
static WHO_COMPLETE: Lazy<Regex> = Lazy::new(|| {
    pattern(r"^\d+ players? displayed \(of \d+\)\. \(\*\) indicates system administrator\.$")
});

static GAME_ROW: Lazy<Regex> = Lazy::new(|| {
    pattern(concat!(
        r"^(?P<number>\d+)\s+(?P<wr>\d+|[+-]{4})\s+(?P<white>\w+)\s+(?P<br>\d+|[+-]{4})\s+(?P<black>\w+)\s+",
        r"\[.*\]\s+(?P<wt>-?(?:\d+:)?\d+:\d+)\s+(?P<bsign>-?)\s*(?P<bt>(?:\d+:)?\d+:\d+)\s+",
        r"\(.*\)\s+(?P<color>[WB]):\s+(?P<move>\d+)$"
    ))
});
static GAMES_COMPLETE: Lazy<Regex> =
    Lazy::new(|| pattern(r"^\d+ games? displayed(?: \(of \d+\))?\.$"));

static MOVE_PAIR: Lazy<Regex> = Lazy::new(|| {
    pattern(concat!(
        r"^\d+\.\s+(?P<white>[RNBQKPa-h1-8Ox=+#-]+)\s+\(\d+:\d+(?:\.\d+)?\)",
        r"(?:\s+(?P<black>[RNBQKPa-h1-8Ox=+#-]+)\s+\(\d+:\d+(?:\.\d+)?\))?$"
    ))
});
static MOVES_COMPLETE: Lazy<Regex> = Lazy::new(|| pattern(r"^\{.*\} (?:\*|1-0|0-1|1/2-1/2)$"));

static SOUGHT_AD: Lazy<Regex> = Lazy::new(|| {
    pattern(concat!(
        r"^(?P<number>\d*)\s+(?P<rating>\d*|[+-]{4})\s+(?P<name>\w+(?:\(C\))?)\s+",
        r"(?P<initial>\d+)\s+(?P<inc>\d+) (?P<rated>(?:un)?rated)\s+(?P<variant>[\w/]+)\s+",
        r"(?P<range>\d+-\d+)\s?\w*$"
    ))
});
static SOUGHT_COMPLETE: Lazy<Regex> = Lazy::new(|| pattern(r"^\d+ ads? displayed\.$"));

static ECO_LABEL: Lazy<Regex> = Lazy::new(|| pattern(r"(?P<kind>ECO|NIC|LONG)\[\s*(?P<half>\d+)\]:"));

static OBSERVERS: Lazy<Regex> = Lazy::new(|| {
    pattern(r"^Observing (?P<game>\d+) \[.*?\]:\s*(?P<names>.*?)\s*\(\d+ users?\)$")
});

static GAME_START: Lazy<Regex> = Lazy::new(|| {
    pattern(concat!(
        r"^Game (?P<game>\d+): (?P<white>\w+) \((?P<wr>\d+|[+-]{4})\) (?P<black>\w+) \((?P<br>\d+|[+-]{4})\) ",
        r"(?P<rated>(?:un)?rated) (?P<variant>\w+) (?P<initial>\d+) (?P<inc>\d+)$"
    ))
});
static STYLE12: Lazy<Regex> = Lazy::new(|| {
    pattern(concat!(
        r"^<\d+> (?P<board>(?:[-pPrRnNbBqQkK]{8}\s?){8}) (?P<color>[WB]) (?:-?\d+ ){6}",
        r"(?P<game>\d+) \w+ \w+ (?:-?\d+ ){5}(?P<wt>-?\d+) (?P<bt>-?\d+) (?P<move>\d+) ",
        r"(?P<verbose>\S+) \(\d+:\d+(?:\.\d+)?\) (?P<san>\S+)(?:\s+-?\d+){3}$"
    ))
});
static GAME_CHAT: Lazy<Regex> = Lazy::new(|| {
    pattern(r"^(?P<user>.*)\[(?P<game>\d+)\] (?P<kind>kibitzes|whispers): (?P<message>.*)$")
});
static GAME_RESULT: Lazy<Regex> =
    Lazy::new(|| pattern(r"^\{Game (?P<game>\d+) \(\w+ vs\. \w+\) [^}]*\} (?P<result>.*)$"));
static GAME_REMOVED: Lazy<Regex> =
    Lazy::new(|| pattern(r"^Removing game (?P<game>\d+) from observation list\.$"));

fn text<'t>(caps: &Captures<'t>, name: &str) -> String {
    caps.name(name).map(|m| m.as_str().to_string()).unwrap_or_default()
}

fn number<T: std::str::FromStr>(caps: &Captures<'_>, name: &str) -> Option<T> {
    caps.name(name)?.as_str().parse().ok()
}

// ---------------------------------------------------------------------------
// Session

/// Where interactive prompts (`login:`, `password:`, `Press return`) may
/// appear in a line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Anchoring {
    /// The prompt must start the line
    #[default]
    LineStart,
    /// The prompt may appear anywhere in the line
    Anywhere,
}

/// Lines that drive the login exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionLine {
    LoginPrompt,
    PasswordPrompt,
    ReturnPrompt,
    InvalidPassword,
    SessionStarting { username: String },
    IdlePrompt,
}

/// Session grammar with its prompt anchoring policy
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    anchoring: Anchoring,
}

impl Catalog {
    pub fn new(anchoring: Anchoring) -> Self {
        Self { anchoring }
    }

    pub fn anchoring(&self) -> Anchoring {
        self.anchoring
    }

    fn has_prompt(&self, text: &str, prompt: &str) -> bool {
        match self.anchoring {
            Anchoring::LineStart => text.starts_with(prompt),
            Anchoring::Anywhere => text.contains(prompt),
        }
    }

    pub fn classify_session(&self, line: &LogicalLine) -> Option<SessionLine> {
        if line.is_idle_prompt() {
            return Some(SessionLine::IdlePrompt);
        }

        let text = line.text();

        if INVALID_PASSWORD.is_match(text) {
            return Some(SessionLine::InvalidPassword);
        }
        if let Some(caps) = SESSION_STARTING.captures(text) {
            return Some(SessionLine::SessionStarting {
                username: self::text(&caps, "user"),
            });
        }
        if self.has_prompt(text, "login:") {
            return Some(SessionLine::LoginPrompt);
        }
        if self.has_prompt(text, "password:") {
            return Some(SessionLine::PasswordPrompt);
        }
        if self.has_prompt(text, "Press return") {
            return Some(SessionLine::ReturnPrompt);
        }

        None
    }
}

// ---------------------------------------------------------------------------
// Chat

pub fn chat_message(line: &str) -> Option<ChatMessage> {
    let plain = |kind, caps: Captures<'_>| ChatMessage {
        kind,
        user: text(&caps, "user"),
        message: text(&caps, "message"),
        channel: None,
    };

    if let Some(caps) = IT.captures(line) {
        return Some(plain(ChatKind::It, caps));
    }
    if let Some(caps) = SHOUT.captures(line) {
        return Some(plain(ChatKind::Shout, caps));
    }
    if let Some(caps) = USER_TELL.captures(line) {
        return Some(plain(ChatKind::Tell, caps));
    }
    if let Some(caps) = CHANNEL_TELL.captures(line) {
        return Some(ChatMessage {
            kind: ChatKind::Tell,
            user: text(&caps, "user"),
            message: text(&caps, "message"),
            channel: number(&caps, "channel"),
        });
    }

    None
}

/// Acknowledgement of `shout`/`it`: `Some(false)` for unregistered users
pub fn shout_ack(line: &str) -> Option<bool> {
    if line == "Only registered players can use the shout command." {
        return Some(false);
    }
    SHOUT_ACK.is_match(line).then_some(true)
}

pub fn kibitz_ack(line: &str) -> Option<bool> {
    KIBITZ_ACK.is_match(line).then_some(true)
}

pub fn whisper_ack(line: &str) -> Option<bool> {
    WHISPER_ACK.is_match(line).then_some(true)
}

/// Acknowledgement of a tell to a user handle or a channel number
pub fn tell_ack(recipient: &str) -> impl Fn(&str) -> Option<bool> + Send + 'static {
    let recipient = recipient.to_string();

    move |line| {
        let refused = line == "The range of channels is 0 to 255."
            || line == "Only registered users may send tells to channels other than 4, 7 and 53."
            || (line.starts_with("Only ")
                && line.ends_with(&format!(" may send tells to channel {recipient}.")))
            || line == format!("'{recipient}' is not a valid handle.");
        if refused {
            return Some(false);
        }

        let told_user = line
            .strip_prefix(&format!("(told {recipient}"))
            .map_or(false, |rest| rest.starts_with(')') || rest.starts_with(", "));
        if told_user || told_channel(line, &recipient) {
            return Some(true);
        }

        None
    }
}

/// `(told 12 players in channel 50)` or `(told 12 players in channel 50 "Topic")`
fn told_channel(line: &str, channel: &str) -> bool {
    let Some(rest) = line.strip_prefix("(told ") else {
        return false;
    };
    let Some((count, rest)) = rest.split_once(' ') else {
        return false;
    };
    if count.is_empty() || !count.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }

    let Some(rest) = rest.strip_prefix(&format!("players in channel {channel}")) else {
        return false;
    };
    rest.starts_with(')') || rest.starts_with(" \"")
}

// ---------------------------------------------------------------------------
// Channels

/// A line of channel numbers from `=channel`
pub fn channel_list(line: &str) -> Option<Vec<ChannelEntry>> {
    if !CHANNEL_LIST.is_match(line) {
        return None;
    }

    line.split_whitespace()
        .map(|n| n.parse().ok().map(|number| ChannelEntry { number }))
        .collect()
}

/// Number of channels announced by the `=channel` header
pub fn channel_list_header(line: &str) -> Option<usize> {
    let caps = CHANNEL_LIST_HEADER.captures(line)?;
    number(&caps, "count")
}

/// `Some(true)` when the channel was added, `Some(false)` when it was already listed
pub fn channel_joined(channel: u32) -> impl Fn(&str) -> Option<bool> + Send + 'static {
    let added = format!("[{channel}] added to your channel list.");
    let present = format!("[{channel}] is already on your channel list.");

    move |line| {
        if line == added {
            Some(true)
        } else if line == present {
            Some(false)
        } else {
            None
        }
    }
}

/// `Some(true)` when the channel was removed, `Some(false)` when it was not listed
pub fn channel_left(channel: u32) -> impl Fn(&str) -> Option<bool> + Send + 'static {
    let removed = format!("[{channel}] removed from your channel list.");
    let absent = format!("[{channel}] is not in your channel list.");

    move |line| {
        if line == removed {
            Some(true)
        } else if line == absent {
            Some(false)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Listings

/// All user entries printed on one `who` line
pub fn user_entries(line: &str) -> Vec<UserEntry> {
    WIDE_GAP
        .split(line)
        .filter_map(|datum| {
            let caps = HANDLE.captures(datum)?;
            let codes = caps
                .name("codes")
                .map(|m| m.as_str())
                .filter(|codes| !codes.is_empty())
                .map(|codes| {
                    codes[1..codes.len() - 1]
                        .split(")(")
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            Some(UserEntry {
                name: text(&caps, "name"),
                rating: text(&caps, "rating"),
                status: text(&caps, "status").chars().next().unwrap_or(' '),
                codes,
            })
        })
        .collect()
}

pub fn who_complete(line: &str) -> bool {
    WHO_COMPLETE.is_match(line)
}

pub fn game_summary(line: &str) -> Option<GameSummary> {
    let caps = GAME_ROW.captures(line)?;

    Some(GameSummary {
        number: number(&caps, "number")?,
        white: PlayerClock {
            name: text(&caps, "white"),
            rating: text(&caps, "wr"),
            time: text(&caps, "wt"),
        },
        black: PlayerClock {
            name: text(&caps, "black"),
            rating: text(&caps, "br"),
            time: format!("{}{}", text(&caps, "bsign"), text(&caps, "bt")),
        },
        to_move: Color::from_code(caps.name("color")?.as_str())?,
        move_number: number(&caps, "move")?,
    })
}

pub fn games_complete(line: &str) -> bool {
    GAMES_COMPLETE.is_match(line)
}

pub fn move_pair(line: &str) -> Option<MovePair> {
    let caps = MOVE_PAIR.captures(line)?;

    Some(MovePair {
        white: text(&caps, "white"),
        black: caps.name("black").map(|m| m.as_str().to_string()),
    })
}

/// Closing line of a move listing
///
/// Result lines of observed games share the shape, but always name the game.
pub fn moves_complete(line: &str) -> bool {
    !line.starts_with("{Game ") && MOVES_COMPLETE.is_match(line)
}

pub fn sought_ad(line: &str) -> Option<SoughtAd> {
    let caps = SOUGHT_AD.captures(line)?;

    Some(SoughtAd {
        number: number(&caps, "number"),
        user: PlayerRating {
            name: text(&caps, "name"),
            rating: text(&caps, "rating"),
        },
        clock: ClockSetting {
            initial: number(&caps, "initial")?,
            increment: number(&caps, "inc")?,
        },
        rated: &caps["rated"] == "rated",
        variant: text(&caps, "variant"),
        range: text(&caps, "range"),
    })
}

pub fn sought_complete(line: &str) -> bool {
    SOUGHT_COMPLETE.is_match(line)
}

/// Opening classification entries on one line of `eco` output
pub fn eco_entries(line: &str) -> Vec<(EcoKind, EcoEntry)> {
    let labels: Vec<Captures<'_>> = ECO_LABEL.captures_iter(line).collect();

    labels
        .iter()
        .enumerate()
        .filter_map(|(i, caps)| {
            let label = caps.get(0)?;
            let value_end = labels
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map(|m| m.start())
                .unwrap_or(line.len());

            Some((
                EcoKind::from_label(&caps["kind"])?,
                EcoEntry {
                    half_moves: number(caps, "half")?,
                    value: line[label.end()..value_end].trim().to_string(),
                },
            ))
        })
        .collect()
}

/// Observer handles of `allobservers` output for one game
pub fn observers(game: u32) -> impl Fn(&str) -> Option<Vec<String>> + Send + 'static {
    let nobody = format!("No one is observing game {game}.");

    move |line| {
        if line == nobody {
            return Some(Vec::new());
        }

        let caps = OBSERVERS.captures(line)?;
        if number::<u32>(&caps, "game")? != game {
            return None;
        }

        Some(caps["names"].split_whitespace().map(str::to_string).collect())
    }
}

/// Reply to `unobserve`: `Some(true)` once removed, `Some(false)` if the game
/// was not being observed
pub fn unobserve_ack(game: u32) -> impl Fn(&str) -> Option<bool> + Send + 'static {
    let not_this_game = format!("You are not observing game {game}.");

    move |line| {
        if let Some(GameLine::Removed { game: removed }) = classify_game_line(line) {
            return (removed == game).then_some(true);
        }
        if line == "You are not observing any games." || line.starts_with(&not_this_game) {
            return Some(false);
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Observation

/// Everything the server says about an observed game
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameLine {
    Start(GameStart),
    Ply(PlyUpdate),
    Chat(GameChat),
    Result { game: u32, result: String },
    Removed { game: u32 },
}

impl GameLine {
    pub fn game(&self) -> u32 {
        match self {
            GameLine::Start(start) => start.game,
            GameLine::Ply(ply) => ply.game,
            GameLine::Chat(chat) => chat.game,
            GameLine::Result { game, .. } | GameLine::Removed { game } => *game,
        }
    }
}

/// Classifier for the lines of one game; lines about other games yield `None`
pub fn game_classifier(game: u32) -> impl Fn(&str) -> Option<GameLine> + Send + 'static {
    move |line| classify_game_line(line).filter(|parsed| parsed.game() == game)
}

pub fn classify_game_line(line: &str) -> Option<GameLine> {
    if let Some(caps) = STYLE12.captures(line) {
        return ply_update(&caps).map(GameLine::Ply);
    }
    if let Some(caps) = GAME_START.captures(line) {
        return game_start(&caps).map(GameLine::Start);
    }
    if let Some(caps) = GAME_CHAT.captures(line) {
        return Some(GameLine::Chat(GameChat {
            game: number(&caps, "game")?,
            user: text(&caps, "user"),
            message: text(&caps, "message"),
            kind: if &caps["kind"] == "kibitzes" {
                GameChatKind::Kibitz
            } else {
                GameChatKind::Whisper
            },
        }));
    }
    if let Some(caps) = GAME_RESULT.captures(line) {
        return Some(GameLine::Result {
            game: number(&caps, "game")?,
            result: text(&caps, "result"),
        });
    }
    if let Some(caps) = GAME_REMOVED.captures(line) {
        return Some(GameLine::Removed {
            game: number(&caps, "game")?,
        });
    }

    None
}

fn game_start(caps: &Captures<'_>) -> Option<GameStart> {
    Some(GameStart {
        game: number(caps, "game")?,
        white: PlayerRating {
            name: text(caps, "white"),
            rating: text(caps, "wr"),
        },
        black: PlayerRating {
            name: text(caps, "black"),
            rating: text(caps, "br"),
        },
        rated: &caps["rated"] == "rated",
        variant: text(caps, "variant"),
        clock: ClockSetting {
            initial: number(caps, "initial")?,
            increment: number(caps, "inc")?,
        },
    })
}

fn ply_update(caps: &Captures<'_>) -> Option<PlyUpdate> {
    Some(PlyUpdate {
        game: number(caps, "game")?,
        position: ranks_to_fen(caps["board"].trim())?,
        to_move: Color::from_code(&caps["color"])?,
        move_number: number(caps, "move")?,
        white_time: number(caps, "wt")?,
        black_time: number(caps, "bt")?,
        verbose_move: text(caps, "verbose"),
        algebraic_move: text(caps, "san"),
    })
}
