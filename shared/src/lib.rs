use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const HAND_SIZE: usize = 6;
pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 6;
pub const DECK_SIZE: usize = 36;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Suit {
    Spades,
    Clubs,
    Hearts,
    Diamonds,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Spades, Suit::Clubs, Suit::Hearts, Suit::Diamonds];

    pub fn letter(self) -> char {
        match self {
            Suit::Spades => 'S',
            Suit::Clubs => 'C',
            Suit::Hearts => 'H',
            Suit::Diamonds => 'D',
        }
    }

    pub fn from_letter(letter: &str) -> Option<Self> {
        match letter {
            "S" => Some(Suit::Spades),
            "C" => Some(Suit::Clubs),
            "H" => Some(Suit::Hearts),
            "D" => Some(Suit::Diamonds),
            _ => None,
        }
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Card rank; the discriminant is the comparison value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Rank {
    Six = 6,
    Seven = 7,
    Eight = 8,
    Nine = 9,
    Ten = 10,
    Jack = 11,
    Queen = 12,
    King = 13,
    Ace = 14,
}

impl Rank {
    pub const ALL: [Rank; 9] = [
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
        Rank::Ace,
    ];

    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn token(self) -> &'static str {
        match self {
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
            Rank::Ace => "A",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Rank::ALL.into_iter().find(|rank| rank.token() == token)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Error returned when card text is not a suit letter followed by a rank token
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid card text {text:?}")]
pub struct CardParseError {
    pub text: String,
}

/// A playing card from the 36-card Durak deck
///
/// On the wire a card is its canonical text: suit letter then rank token,
/// e.g. `"S7"`, `"H10"`, `"DQ"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Card {
    pub suit: Suit,
    pub rank: Rank,
}

impl Card {
    pub const fn new(suit: Suit, rank: Rank) -> Self {
        Self { suit, rank }
    }

    /// All 36 cards, suit by suit in ascending rank
    pub fn full_deck() -> Vec<Card> {
        Suit::ALL
            .into_iter()
            .flat_map(|suit| Rank::ALL.into_iter().map(move |rank| Card::new(suit, rank)))
            .collect()
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.suit, self.rank)
    }
}

impl FromStr for Card {
    type Err = CardParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || CardParseError {
            text: s.to_string(),
        };
        // `get` refuses to split inside a multi-byte character
        let suit = s.get(..1).and_then(Suit::from_letter).ok_or_else(err)?;
        let rank = s.get(1..).and_then(Rank::from_token).ok_or_else(err)?;
        Ok(Card::new(suit, rank))
    }
}

impl From<Card> for String {
    fn from(card: Card) -> Self {
        card.to_string()
    }
}

impl TryFrom<String> for Card {
    type Error = CardParseError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        text.parse()
    }
}

/// Compares `c0` against `c1` under the given trump suit
///
/// Returns `1` if `c0` wins, `-1` if `c1` wins and `0` for equal cards of one
/// suit. Two cards of different non-trump suits cannot be compared and yield
/// `-2`. Only `1` lets a defender beat an attack card.
pub fn higher(c0: Card, c1: Card, trump: Suit) -> i8 {
    if c0.suit == c1.suit {
        return match c0.rank.cmp(&c1.rank) {
            std::cmp::Ordering::Greater => 1,
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
        };
    }
    if c0.suit == trump {
        return 1;
    }
    if c1.suit == trump {
        return -1;
    }
    -2
}

/// True iff `text` is exactly a suit letter (S, C, H, D) followed by a rank
/// token (6-10, J, Q, K, A)
pub fn is_valid(text: &str) -> bool {
    text.parse::<Card>().is_ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start = 0,
    Move = 1,
}

impl TryFrom<i64> for Command {
    type Error = i64;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Command::Start),
            1 => Ok(Command::Move),
            other => Err(other),
        }
    }
}

/// Inbound message from a player: `{"command": 0|1, "card": "S7"}`
///
/// An empty `card` on a move means "pass" for the attacker and "take" for the
/// defender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerMsg {
    /// Any JSON integer decodes; codes other than 0 and 1 are rejected later
    pub command: i64,
    #[serde(default)]
    pub card: String,
}

impl PlayerMsg {
    pub fn start() -> Self {
        Self {
            command: Command::Start as i64,
            card: String::new(),
        }
    }

    pub fn play(card: Card) -> Self {
        Self {
            command: Command::Move as i64,
            card: card.to_string(),
        }
    }

    pub fn pass() -> Self {
        Self {
            command: Command::Move as i64,
            card: String::new(),
        }
    }

    pub fn kind(&self) -> Result<Command, i64> {
        Command::try_from(self.command)
    }

    /// Parses the card field, `None` when it is empty
    pub fn card(&self) -> Result<Option<Card>, CardParseError> {
        if self.card.is_empty() {
            return Ok(None);
        }
        self.card.parse().map(Some)
    }
}

/// Outbound broadcast: the cards on the table in play order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeskMsg {
    pub desk: Vec<Card>,
}
