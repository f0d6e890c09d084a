//! Ledger records and their one-line text encoding.

use core::fmt;
use core::str::FromStr;

use crate::common::LedgerError;

/// What a ledger line describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RecordKind {
    Version,
    Config,
    Player,
    Board,
    Attack,
    Result,
    Message,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Version => "VERSION",
            RecordKind::Config => "CONFIG",
            RecordKind::Player => "PLAYER",
            RecordKind::Board => "BOARD",
            RecordKind::Attack => "ATTACK",
            RecordKind::Result => "RESULT",
            RecordKind::Message => "MESSAGE",
        }
    }

    /// ATTACK or RESULT, the records that drive turns.
    pub fn is_action(self) -> bool {
        matches!(self, RecordKind::Attack | RecordKind::Result)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "VERSION" => RecordKind::Version,
            "CONFIG" => RecordKind::Config,
            "PLAYER" => RecordKind::Player,
            "BOARD" => RecordKind::Board,
            "ATTACK" => RecordKind::Attack,
            "RESULT" => RecordKind::Result,
            "MESSAGE" => RecordKind::Message,
            other => {
                return Err(LedgerError::InvalidFormat(format!(
                    "unknown record kind {}",
                    other
                )))
            }
        })
    }
}

/// Seat in the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PlayerId {
    One,
    Two,
}

impl PlayerId {
    pub fn number(self) -> u32 {
        match self {
            PlayerId::One => 1,
            PlayerId::Two => 2,
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            PlayerId::One => PlayerId::Two,
            PlayerId::Two => PlayerId::One,
        }
    }
}

impl TryFrom<u32> for PlayerId {
    type Error = LedgerError;

    fn try_from(n: u32) -> Result<Self, Self::Error> {
        match n {
            1 => Ok(PlayerId::One),
            2 => Ok(PlayerId::Two),
            other => Err(LedgerError::InvalidPlayer(other)),
        }
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// One immutable ledger line: `KIND:player,payload`.
///
/// `player` is the addressee, the only party able to open a sealed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    kind: RecordKind,
    player: PlayerId,
    payload: String,
}

impl Record {
    /// Build a record; line breaks and backslashes in `payload` are escaped
    /// so the record stays on one line and [`Record::text`] gives `payload`
    /// back.
    pub fn new(kind: RecordKind, player: PlayerId, payload: &str) -> Self {
        Self {
            kind,
            player,
            payload: escape(payload),
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }

    /// Payload exactly as stored in the ledger.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Payload with escapes undone.
    pub fn text(&self) -> String {
        unescape(&self.payload)
    }

    pub fn is(&self, kind: RecordKind, player: PlayerId) -> bool {
        self.kind == kind && self.player == player
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{},{}", self.kind, self.player, self.payload)
    }
}

impl FromStr for Record {
    type Err = LedgerError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let malformed = || LedgerError::InvalidFormat(line.to_string());
        let (kind, rest) = line.split_once(':').ok_or_else(malformed)?;
        if kind.is_empty() || !kind.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(malformed());
        }
        let mut chars = rest.chars();
        let player = chars
            .next()
            .and_then(|c| c.to_digit(10))
            .ok_or_else(malformed)?;
        if chars.next() != Some(',') {
            return Err(malformed());
        }
        let payload = chars.as_str();
        if payload.contains(['\n', '\r']) {
            return Err(malformed());
        }
        Ok(Self {
            kind: kind.parse()?,
            player: PlayerId::try_from(player)?,
            payload: payload.to_string(),
        })
    }
}

/// `\\`, `\n` and `\r` stand for a backslash and the two line breaks.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            // written by hand; keep it as it stands
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Target cell of an ATTACK, encoded `x,y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coordinate {
    pub x: usize,
    pub y: usize,
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

impl FromStr for Coordinate {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || LedgerError::InvalidFormat(format!("coordinate {:?}", s));
        let (x, y) = s.split_once(',').ok_or_else(malformed)?;
        Ok(Coordinate {
            x: x.trim().parse().map_err(|_| malformed())?,
            y: y.trim().parse().map_err(|_| malformed())?,
        })
    }
}

/// Outcome attested by the defender, encoded `x,y,hit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttackOutcome {
    pub x: usize,
    pub y: usize,
    pub hit: bool,
}

impl AttackOutcome {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            x: self.x,
            y: self.y,
        }
    }
}

impl fmt::Display for AttackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.hit)
    }
}

impl FromStr for AttackOutcome {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || LedgerError::InvalidFormat(format!("attack outcome {:?}", s));
        let (coord, hit) = s.rsplit_once(',').ok_or_else(malformed)?;
        let Coordinate { x, y } = coord.parse().map_err(|_| malformed())?;
        let hit = match hit.trim() {
            "true" => true,
            "false" => false,
            _ => return Err(malformed()),
        };
        Ok(AttackOutcome { x, y, hit })
    }
}
