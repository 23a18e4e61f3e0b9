//! Turn-order ring of registered players
//!
//! The ring keeps members in registration order and answers "who comes after
//! this player" in constant time, no matter how many players have left in
//! between. Each member stores links to its neighbours in a hash map, which
//! gives a circular doubly-linked list without any unsafe pointer handling.
//!
//! `last` marks the most recently added member. New members are linked in
//! right after it, so walking `next` from `front()` (the member after `last`)
//! visits everyone in FIFO order.

use std::collections::HashMap;
use std::hash::Hash;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingError {
    #[error("handle is not a member of the ring")]
    NotFound,
}

#[derive(Debug, Clone, Copy)]
struct Links<H> {
    prev: H,
    next: H,
}

/// Circular, insertion-ordered membership over copyable handles
#[derive(Debug, Clone)]
pub struct TurnRing<H> {
    links: HashMap<H, Links<H>>,
    last: Option<H>,
}

impl<H> Default for TurnRing<H>
where
    H: Copy + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<H> TurnRing<H>
where
    H: Copy + Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            links: HashMap::new(),
            last: None,
        }
    }

    /// Links `handle` in after the most recently added member
    ///
    /// Adding a handle that is already a member leaves the ring unchanged.
    pub fn add(&mut self, handle: H) {
        if self.links.contains_key(&handle) {
            return;
        }

        match self.last {
            None => {
                self.links.insert(
                    handle,
                    Links {
                        prev: handle,
                        next: handle,
                    },
                );
            }
            Some(last) => {
                let front = self.links[&last].next;
                self.links.insert(
                    handle,
                    Links {
                        prev: last,
                        next: front,
                    },
                );
                if let Some(l) = self.links.get_mut(&last) {
                    l.next = handle;
                }
                if let Some(f) = self.links.get_mut(&front) {
                    f.prev = handle;
                }
            }
        }
        self.last = Some(handle);
    }

    /// Unlinks `handle`, returning whether it was a member
    pub fn remove(&mut self, handle: H) -> bool {
        let Some(Links { prev, next }) = self.links.remove(&handle) else {
            return false;
        };

        if self.links.is_empty() {
            self.last = None;
            return true;
        }

        if let Some(p) = self.links.get_mut(&prev) {
            p.next = next;
        }
        if let Some(n) = self.links.get_mut(&next) {
            n.prev = prev;
        }
        if self.last == Some(handle) {
            self.last = Some(prev);
        }
        true
    }

    pub fn next(&self, handle: H) -> Result<H, RingError> {
        self.links
            .get(&handle)
            .map(|l| l.next)
            .ok_or(RingError::NotFound)
    }

    /// Oldest member still registered
    pub fn front(&self) -> Option<H> {
        self.last.map(|last| self.links[&last].next)
    }

    /// Member `n` steps after `front()`, wrapping around
    pub fn nth(&self, n: usize) -> Option<H> {
        self.enumerate().cycle().nth(n)
    }

    /// One pass over every member, oldest first
    pub fn enumerate(&self) -> Iter<'_, H> {
        Iter {
            ring: self,
            current: self.front(),
            remaining: self.len(),
        }
    }

    /// One pass over every member, starting at `handle`
    pub fn enumerate_from(&self, handle: H) -> Result<Iter<'_, H>, RingError> {
        if !self.contains(handle) {
            return Err(RingError::NotFound);
        }
        Ok(Iter {
            ring: self,
            current: Some(handle),
            remaining: self.len(),
        })
    }

    pub fn contains(&self, handle: H) -> bool {
        self.links.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// Iterator over ring members; borrows the ring so its shape cannot change
#[derive(Debug, Clone)]
pub struct Iter<'a, H> {
    ring: &'a TurnRing<H>,
    current: Option<H>,
    remaining: usize,
}

impl<'a, H> Iterator for Iter<'a, H>
where
    H: Copy + Eq + Hash,
{
    type Item = H;

    fn next(&mut self) -> Option<H> {
        if self.remaining == 0 {
            return None;
        }
        let handle = self.current?;
        self.remaining -= 1;
        self.current = self.ring.next(handle).ok();
        Some(handle)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, H> ExactSizeIterator for Iter<'a, H> where H: Copy + Eq + Hash {}
