//! Durak rules state machine
//!
//! The engine is plain synchronous code. It never touches the network and
//! never locks anything: the coordinator loop in `network` is its only
//! caller, so every event runs to completion before the next one starts.
//!
//! Turn order comes from the hub's [`TurnRing`], passed in on every call.
//! The engine keeps one [`Player`] entry per ring member.
//!
//! Every transition validates first and mutates second. A rejected event
//! returns a [`Rejection`] and leaves the game exactly as it was.

use crate::deck::Deck;
use crate::ring::TurnRing;
use crate::PlayerId;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{higher, Card, CardParseError, DeskMsg, Suit, HAND_SIZE, MAX_PLAYERS, MIN_PLAYERS};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Waiting for players and a start command
    Collection,
    /// The attacker may play a card or pass
    Attack,
    /// The defender must beat the pending card or take the desk
    Defense,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Collection => "COLLECTION",
            State::Attack => "ATTACK",
            State::Defense => "DEFENSE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Start,
    /// `card: None` is a pass from the attacker or a take from the defender
    Move {
        player: PlayerId,
        card: Option<Card>,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Start => "START",
            Event::Move { .. } => "MOVE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundResult {
    Initial,
    /// Defender answered every attack card
    Beat,
    /// Defender took the desk
    NotBeat,
}

/// Why an event was refused; the game is unchanged whenever one is returned
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("wrong number of players: {0}")]
    WrongPlayerCount(usize),
    #[error("{event} is not allowed in {state}")]
    NotAllowed { state: State, event: &'static str },
    #[error("out of turn: {0}")]
    OutOfTurn(PlayerId),
    #[error("{player} doesn't own {card}")]
    NotOwned { player: PlayerId, card: Card },
    #[error("{card} won't beat {to_beat}, trump is {trump}")]
    WontBeat {
        card: Card,
        to_beat: Card,
        trump: Suit,
    },
    #[error("unknown player: {0}")]
    UnknownPlayer(PlayerId),
    #[error("unknown command: {0}")]
    UnknownCommand(i64),
    #[error(transparent)]
    MalformedCard(#[from] CardParseError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub hand: BTreeSet<Card>,
    /// False once the player has run out of cards with the deck empty
    pub active: bool,
}

impl Player {
    fn new(active: bool) -> Self {
        Self {
            hand: BTreeSet::new(),
            active,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Round {
    pub attacker: PlayerId,
    pub defender: PlayerId,
    /// Attacker who opened the round; passing back to them ends it
    pub start_attacker: PlayerId,
    pub card_to_beat: Option<Card>,
}

pub struct Game {
    state: State,
    trump: Option<Suit>,
    deck: Deck,
    desk: Vec<Card>,
    players: HashMap<PlayerId, Player>,
    round: Option<Round>,
    rng: StdRng,
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

impl Game {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Game whose shuffles and starting attackers are reproducible
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            state: State::Collection,
            trump: None,
            deck: Deck::default(),
            desk: Vec::with_capacity(2 * HAND_SIZE),
            players: HashMap::new(),
            round: None,
            rng,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn trump(&self) -> Option<Suit> {
        self.trump
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    pub fn desk(&self) -> &[Card] {
        &self.desk
    }

    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn hand(&self, id: PlayerId) -> Option<&BTreeSet<Card>> {
        self.players.get(&id).map(|p| &p.hand)
    }

    pub fn desk_msg(&self) -> DeskMsg {
        DeskMsg {
            desk: self.desk.clone(),
        }
    }

    pub fn active_count(&self) -> usize {
        self.players.values().filter(|p| p.active).count()
    }

    /// Registers a player; joining mid-game means sitting out until the next game
    pub fn add_player(&mut self, id: PlayerId) {
        let active = self.state == State::Collection;
        self.players.entry(id).or_insert_with(|| Player::new(active));
    }

    /// Drops a player who has already been unlinked from `ring`
    ///
    /// `successor` is the player that followed them in the ring before removal.
    /// The leaver's cards go with them. Returns true when the table changed
    /// and should be broadcast again.
    pub fn remove_player(
        &mut self,
        ring: &TurnRing<PlayerId>,
        id: PlayerId,
        successor: Option<PlayerId>,
    ) -> bool {
        if self.players.remove(&id).is_none() {
            return false;
        }
        let Some(mut round) = self.round else {
            return false;
        };

        if self.active_count() < MIN_PLAYERS {
            info!("{} left, not enough players to continue", id);
            self.finish_game();
            return true;
        }

        if id == round.attacker || id == round.defender {
            info!("{} left during their turn, restarting the round", id);
            self.desk.clear();
            let nominal = successor.filter(|&s| ring.contains(s)).or_else(|| ring.front());
            if let Some(nominal) = nominal {
                self.set_roles(ring, nominal);
            }
            return true;
        }

        if id == round.start_attacker {
            round.start_attacker = round.attacker;
            self.round = Some(round);
        }
        false
    }

    /// Runs one event through the state machine
    pub fn apply(&mut self, ring: &TurnRing<PlayerId>, event: Event) -> Result<State, Rejection> {
        match (self.state, event) {
            (State::Collection, Event::Start) => {
                self.check_player_count(ring)?;
                let deck = Deck::shuffled(&mut self.rng);
                let n = self.rng.gen_range(0..ring.len());
                let first = ring.nth(n).ok_or(Rejection::WrongPlayerCount(0))?;
                self.begin(ring, deck, first)
            }
            (State::Attack, Event::Move { player, card }) => self.attack(ring, player, card),
            (State::Defense, Event::Move { player, card }) => self.defend(ring, player, card),
            (state, event) => Err(Rejection::NotAllowed {
                state,
                event: event.name(),
            }),
        }
    }

    /// Starts a game from a fixed deck order and first attacker
    ///
    /// Same checks as a `Start` event. Cards are dealt from the front of `deck`.
    pub fn begin(
        &mut self,
        ring: &TurnRing<PlayerId>,
        deck: Deck,
        first_attacker: PlayerId,
    ) -> Result<State, Rejection> {
        if self.state != State::Collection {
            return Err(Rejection::NotAllowed {
                state: self.state,
                event: Event::Start.name(),
            });
        }
        self.check_player_count(ring)?;
        if !ring.contains(first_attacker) {
            return Err(Rejection::UnknownPlayer(first_attacker));
        }

        self.deck = deck;
        self.desk.clear();
        for id in ring.enumerate() {
            *self.players.entry(id).or_insert_with(|| Player::new(true)) = Player::new(true);
        }

        let mut last_dealt = None;
        for _ in 0..HAND_SIZE {
            for id in ring.enumerate() {
                if let Some(card) = self.deck.draw() {
                    self.take_card(id, card);
                    last_dealt = Some(card);
                }
            }
        }

        // With six players the deck is dealt out and the last card dealt shows the trump
        let reveal = match self.deck.draw() {
            Some(card) => {
                self.deck.put_bottom(card);
                Some(card)
            }
            None => last_dealt,
        };
        self.trump = reveal.map(|card| card.suit);

        self.set_roles(ring, first_attacker);
        info!(
            "game started with {} players, trump {}, {} cards in deck",
            ring.len(),
            reveal.map(|c| c.to_string()).unwrap_or_default(),
            self.deck.len()
        );
        self.log_round(RoundResult::Initial);
        Ok(self.state)
    }

    fn check_player_count(&self, ring: &TurnRing<PlayerId>) -> Result<(), Rejection> {
        let n = ring.len();
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&n) {
            return Err(Rejection::WrongPlayerCount(n));
        }
        Ok(())
    }

    fn current_round(&self) -> Result<Round, Rejection> {
        self.round.ok_or(Rejection::NotAllowed {
            state: self.state,
            event: "MOVE",
        })
    }

    fn owns(&self, player: PlayerId, card: Card) -> bool {
        self.players
            .get(&player)
            .is_some_and(|p| p.hand.contains(&card))
    }

    fn attack(
        &mut self,
        ring: &TurnRing<PlayerId>,
        player: PlayerId,
        card: Option<Card>,
    ) -> Result<State, Rejection> {
        let mut round = self.current_round()?;
        if player != round.attacker {
            return Err(Rejection::OutOfTurn(player));
        }

        if let Some(card) = card {
            if !self.owns(player, card) {
                return Err(Rejection::NotOwned { player, card });
            }
            self.to_desk(player, card);
            round.card_to_beat = Some(card);
            self.round = Some(round);
            self.state = State::Defense;
            return Ok(self.state);
        }

        // Pass: poll the next attacker, skipping the defender and anyone out
        let next = ring
            .next(round.attacker)
            .ok()
            .and_then(|from| ring.enumerate_from(from).ok())
            .and_then(|mut members| {
                members.find(|&p| p != round.defender && self.is_active(p))
            });

        match next {
            Some(next) if next != round.start_attacker => {
                round.attacker = next;
                self.round = Some(round);
            }
            _ => self.new_round(ring, RoundResult::Beat),
        }
        Ok(self.state)
    }

    fn defend(
        &mut self,
        ring: &TurnRing<PlayerId>,
        player: PlayerId,
        card: Option<Card>,
    ) -> Result<State, Rejection> {
        let mut round = self.current_round()?;
        if player != round.defender {
            return Err(Rejection::OutOfTurn(player));
        }

        let Some(card) = card else {
            self.new_round(ring, RoundResult::NotBeat);
            return Ok(self.state);
        };

        if !self.owns(player, card) {
            return Err(Rejection::NotOwned { player, card });
        }
        if let (Some(to_beat), Some(trump)) = (round.card_to_beat, self.trump) {
            if higher(card, to_beat, trump) != 1 {
                return Err(Rejection::WontBeat {
                    card,
                    to_beat,
                    trump,
                });
            }
        }

        self.to_desk(player, card);
        round.card_to_beat = None;
        self.round = Some(round);
        self.state = State::Attack;
        Ok(self.state)
    }

    fn new_round(&mut self, ring: &TurnRing<PlayerId>, result: RoundResult) {
        let Some(round) = self.round else {
            return;
        };

        match result {
            RoundResult::Initial => {}
            RoundResult::Beat => self.desk.clear(),
            RoundResult::NotBeat => {
                let taken: Vec<Card> = self.desk.drain(..).collect();
                if let Some(defender) = self.players.get_mut(&round.defender) {
                    defender.hand.extend(taken);
                }
            }
        }

        self.replenish(ring, round);
        self.mark_inactive();
        self.log_round(result);

        if self.active_count() < MIN_PLAYERS {
            self.finish_game();
            return;
        }

        let nominal = match result {
            RoundResult::NotBeat => ring.next(round.defender).unwrap_or(round.defender),
            _ => round.defender,
        };
        self.set_roles(ring, nominal);
    }

    /// Tops hands up to six from the deck, the round's defender drawing last
    fn replenish(&mut self, ring: &TurnRing<PlayerId>, round: Round) {
        let order: Vec<PlayerId> = match ring.enumerate_from(round.start_attacker) {
            Ok(members) => members.collect(),
            Err(_) => ring.enumerate().collect(),
        };

        for id in order.into_iter().filter(|&id| id != round.defender) {
            self.top_up(id);
        }
        self.top_up(round.defender);
    }

    fn top_up(&mut self, id: PlayerId) {
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        if !player.active {
            return;
        }
        while player.hand.len() < HAND_SIZE {
            match self.deck.draw() {
                Some(card) => {
                    player.hand.insert(card);
                }
                None => break,
            }
        }
    }

    fn mark_inactive(&mut self) {
        if !self.deck.is_empty() {
            return;
        }
        for (id, player) in self.players.iter_mut() {
            if player.active && player.hand.is_empty() {
                info!("{} is out of cards", id);
                player.active = false;
            }
        }
    }

    /// Attacker is the first active player from `nominal`, defender the next one after
    fn set_roles(&mut self, ring: &TurnRing<PlayerId>, nominal: PlayerId) {
        let Some(attacker) = self.first_active_from(ring, nominal) else {
            return;
        };
        let defender = ring
            .next(attacker)
            .ok()
            .and_then(|after| self.first_active_from(ring, after))
            .unwrap_or(attacker);

        self.round = Some(Round {
            attacker,
            defender,
            start_attacker: attacker,
            card_to_beat: None,
        });
        self.state = State::Attack;
    }

    fn first_active_from(&self, ring: &TurnRing<PlayerId>, from: PlayerId) -> Option<PlayerId> {
        ring.enumerate_from(from)
            .ok()?
            .find(|&id| self.is_active(id))
    }

    fn is_active(&self, id: PlayerId) -> bool {
        self.players.get(&id).is_some_and(|p| p.active)
    }

    /// Ends the game and returns to collection with everyone back in
    fn finish_game(&mut self) {
        match self
            .players
            .iter()
            .find(|(_, p)| p.active && !p.hand.is_empty())
        {
            Some((durak, _)) => info!("game over, {} is the durak", durak),
            None => info!("game over, draw"),
        }

        self.state = State::Collection;
        self.round = None;
        self.trump = None;
        self.deck = Deck::default();
        self.desk.clear();
        for player in self.players.values_mut() {
            *player = Player::new(true);
        }
    }

    fn take_card(&mut self, id: PlayerId, card: Card) {
        if let Some(player) = self.players.get_mut(&id) {
            player.hand.insert(card);
        }
    }

    fn to_desk(&mut self, id: PlayerId, card: Card) {
        if let Some(player) = self.players.get_mut(&id) {
            player.hand.remove(&card);
        }
        self.desk.push(card);
    }

    fn log_round(&self, result: RoundResult) {
        match self.round {
            Some(round) if self.state != State::Collection => info!(
                "round {:?}: attacker {}, defender {}, {} cards in deck",
                result,
                round.attacker,
                round.defender,
                self.deck.len()
            ),
            _ => debug!("round {:?} resolved", result),
        }
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "state={} trump=", self.state)?;
        match self.trump {
            Some(trump) => write!(f, "{}", trump)?,
            None => write!(f, "-")?,
        }
        write!(f, " deck={} desk=[", self.deck.len())?;
        for (i, card) in self.desk.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", card)?;
        }
        write!(f, "]")?;
        if let Some(round) = self.round {
            write!(
                f,
                " attacker={} defender={} start={}",
                round.attacker, round.defender, round.start_attacker
            )?;
            if let Some(card) = round.card_to_beat {
                write!(f, " to_beat={}", card)?;
            }
        }
        Ok(())
    }
}
