//! Tile and coordinate types.
//!
//! A tile's `address` is an ordered path of up to four components:
//!
//! ```text
//! [world, sector, arena, game_object]
//! ```
//!
//! Shorter paths denote coarser locations.  A tile with a full depth-4
//! address hosts a game object and seeds itself with that object's idle
//! identity event at load time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use ga_core::Event;

// ── Coord ─────────────────────────────────────────────────────────────────────

/// Grid coordinate `(x, y)`.  Serialized as a two-element array to match the
/// maze and checkpoint files.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(from = "(u32, u32)", into = "(u32, u32)")]
pub struct Coord {
    pub x: u32,
    pub y: u32,
}

impl Coord {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance, used to order percepted events by closeness.
    pub fn dist(self, other: Coord) -> f64 {
        let dx = self.x as f64 - other.x as f64;
        let dy = self.y as f64 - other.y as f64;
        (dx * dx + dy * dy).sqrt()
    }

    /// Chebyshev distance: the box-vision radius metric.
    pub fn chebyshev(self, other: Coord) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }
}

impl From<(u32, u32)> for Coord {
    fn from((x, y): (u32, u32)) -> Self {
        Self { x, y }
    }
}

impl From<Coord> for (u32, u32) {
    fn from(c: Coord) -> Self {
        (c.x, c.y)
    }
}

impl std::fmt::Display for Coord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

// ── AddressLevel ──────────────────────────────────────────────────────────────

/// The four nesting levels of a tile address.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum AddressLevel {
    World,
    Sector,
    Arena,
    GameObject,
}

impl AddressLevel {
    /// Number of address components up to and including this level.
    #[inline]
    pub fn depth(self) -> usize {
        match self {
            AddressLevel::World => 1,
            AddressLevel::Sector => 2,
            AddressLevel::Arena => 3,
            AddressLevel::GameObject => 4,
        }
    }
}

// ── Tile ──────────────────────────────────────────────────────────────────────

/// One cell of the maze: an address path, a collision flag, and the set of
/// events currently active on it.
///
/// Events are keyed by a per-tile monotonically increasing id so iteration
/// is insertion-ordered.  At most one event per subject lives on a tile;
/// `update_events` enforces the replacement.
#[derive(Clone, Debug)]
pub struct Tile {
    coord: Coord,
    address: Vec<String>,
    collision: bool,
    event_seq: u32,
    events: BTreeMap<u32, Event>,
}

impl Tile {
    /// Build a tile.  `address` holds the components below `world`
    /// (sector/arena/game_object); a bare tile passes an empty list.
    pub fn new(coord: Coord, world: &str, address: Vec<String>, collision: bool) -> Self {
        let mut full = Vec::with_capacity(1 + address.len());
        full.push(world.to_string());
        full.extend(address);

        let mut tile = Self {
            coord,
            address: full,
            collision,
            event_seq: 0,
            events: BTreeMap::new(),
        };
        // A game-object tile carries its object's identity event from birth.
        if tile.address.len() == AddressLevel::GameObject.depth() {
            let object = tile.address.last().cloned().unwrap_or_default();
            let identity = Event::idle(object, tile.address.clone());
            tile.add_event(identity);
        }
        tile
    }

    #[inline]
    pub fn coord(&self) -> Coord {
        self.coord
    }

    #[inline]
    pub fn collision(&self) -> bool {
        self.collision
    }

    pub fn set_collision(&mut self, collision: bool) {
        self.collision = collision;
    }

    // ── Address ───────────────────────────────────────────────────────────

    /// `true` if the address reaches down to `level`.
    #[inline]
    pub fn has_address(&self, level: AddressLevel) -> bool {
        self.address.len() >= level.depth()
    }

    /// Address components up to `level`, truncated to what exists.
    pub fn get_address(&self, level: AddressLevel) -> &[String] {
        let depth = level.depth().min(self.address.len());
        &self.address[..depth]
    }

    /// The full address path.
    pub fn address(&self) -> &[String] {
        &self.address
    }

    /// Joined `:`-form of the address up to `level`.
    pub fn address_key(&self, level: AddressLevel) -> String {
        self.get_address(level).join(":")
    }

    /// Every registrable prefix of the address (depth 2 and deeper), in
    /// `:`-joined form.  These become the keys of the maze address index.
    pub fn registrable_addresses(&self) -> Vec<String> {
        (2..=self.address.len())
            .map(|depth| self.address[..depth].join(":"))
            .collect()
    }

    // ── Events ────────────────────────────────────────────────────────────

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.events.values()
    }

    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Add `event` unless an equal one is already present.
    pub fn add_event(&mut self, event: Event) {
        if self.events.values().any(|e| *e == event) {
            return;
        }
        self.events.insert(self.event_seq, event);
        self.event_seq += 1;
    }

    /// Remove events matching the given subject and/or exact event.
    /// Returns the number removed.
    pub fn remove_events(&mut self, subject: Option<&str>, event: Option<&Event>) -> usize {
        let doomed: Vec<u32> = self
            .events
            .iter()
            .filter(|(_, e)| {
                subject.is_some_and(|s| e.subject == s) || event.is_some_and(|ev| *e == ev)
            })
            .map(|(k, _)| *k)
            .collect();
        for key in &doomed {
            self.events.remove(key);
        }
        doomed.len()
    }

    /// Replace every event whose subject matches `event.subject`.
    /// Returns the number replaced.
    pub fn update_events(&mut self, event: &Event) -> usize {
        let mut updated = 0;
        for slot in self.events.values_mut() {
            if slot.subject == event.subject {
                *slot = event.clone();
                updated += 1;
            }
        }
        updated
    }

    /// A bare tile: only the world component and no events.
    pub fn is_blank(&self) -> bool {
        self.address.len() == 1 && self.events.is_empty()
    }
}
