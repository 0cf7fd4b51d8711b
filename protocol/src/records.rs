use serde::{Deserialize, Serialize};

/// Side to move
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    White,
    Black,
}

impl Color {
    /// Parses the single-letter form the server uses (`W`/`B`)
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "W" => Some(Color::White),
            "B" => Some(Color::Black),
            _ => None,
        }
    }
}

/// A player name with the rating shown next to it. Unrated players show
/// `++++` or `----`, so the rating stays textual.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlayerRating {
    pub name: String,
    pub rating: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlayerClock {
    pub name: String,
    pub rating: String,
    /// Remaining time as printed, e.g. `1:52:33`
    pub time: String,
}

/// Initial time in minutes and increment in seconds
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ClockSetting {
    pub initial: u32,
    pub increment: u32,
}

/// A channel on the user's channel list
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ChannelEntry {
    pub number: u32,
}

/// One row of the `games` listing
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GameSummary {
    pub number: u32,
    pub white: PlayerClock,
    pub black: PlayerClock,
    pub to_move: Color,
    pub move_number: u32,
}

/// One entry of the `who` listing
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UserEntry {
    pub name: String,
    pub rating: String,
    /// Status symbol printed between rating and name
    pub status: char,
    /// Handle codes such as `C` (computer) or `TM` (titled master)
    pub codes: Vec<String>,
}

/// One row of the `sought` listing
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SoughtAd {
    pub number: Option<u32>,
    pub user: PlayerRating,
    pub clock: ClockSetting,
    pub rated: bool,
    pub variant: String,
    /// Accepted opponent rating range, e.g. `0-9999`
    pub range: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    It,
    Shout,
    Tell,
}

/// A shout, `it` message, or tell addressed to the user or one of their channels
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub kind: ChatKind,
    pub user: String,
    pub message: String,
    /// Set for tells sent to a channel
    pub channel: Option<u32>,
}

/// A full move from the `moves` listing; black's half is absent when white
/// moved last.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct MovePair {
    pub white: String,
    pub black: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum EcoKind {
    Eco,
    Nic,
    Long,
}

impl EcoKind {
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "ECO" => Some(EcoKind::Eco),
            "NIC" => Some(EcoKind::Nic),
            "LONG" => Some(EcoKind::Long),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct EcoEntry {
    pub half_moves: u32,
    pub value: String,
}

/// Opening classification of a game
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct EcoReport {
    pub eco: Option<EcoEntry>,
    pub nic: Option<EcoEntry>,
    pub long: Option<EcoEntry>,
}

impl EcoReport {
    pub fn set(&mut self, kind: EcoKind, entry: EcoEntry) {
        match kind {
            EcoKind::Eco => self.eco = Some(entry),
            EcoKind::Nic => self.nic = Some(entry),
            EcoKind::Long => self.long = Some(entry),
        }
    }
}

/// Match metadata announced when observation starts
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GameStart {
    pub game: u32,
    pub white: PlayerRating,
    pub black: PlayerRating,
    pub rated: bool,
    pub variant: String,
    pub clock: ClockSetting,
}

/// Position and clocks after one half-move
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlyUpdate {
    pub game: u32,
    /// Compact rank notation of the position
    pub position: String,
    pub to_move: Color,
    pub move_number: u32,
    /// Remaining seconds; negative once a flag has fallen
    pub white_time: i64,
    pub black_time: i64,
    pub verbose_move: String,
    pub algebraic_move: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum GameChatKind {
    /// Visible to players and observers
    Kibitz,
    /// Visible to observers only
    Whisper,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GameChat {
    pub game: u32,
    pub user: String,
    pub message: String,
    pub kind: GameChatKind,
}
