use rand::seq::SliceRandom;
use rand::Rng;
use shared::Card;
use std::collections::VecDeque;

/// Draw pile; cards come off the front, the trump reveal goes under the back
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deck {
    cards: VecDeque<Card>,
}

impl Deck {
    /// All 36 cards in uniformly random order
    pub fn shuffled<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut cards = Card::full_deck();
        cards.shuffle(rng);
        Self::from_cards(cards)
    }

    /// Deck in exactly the given order, first card drawn first
    pub fn from_cards(cards: Vec<Card>) -> Self {
        Self {
            cards: cards.into(),
        }
    }

    pub fn draw(&mut self) -> Option<Card> {
        self.cards.pop_front()
    }

    pub fn put_bottom(&mut self, card: Card) {
        self.cards.push_back(card);
    }

    pub fn bottom(&self) -> Option<Card> {
        self.cards.back().copied()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter()
    }
}
