//! The maze grid, its loader DTO, and the address→coord index.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;
use serde::Deserialize;
use tracing::warn;

use ga_core::{AgentRng, Event};

use crate::error::{MazeError, MazeResult};
use crate::tile::{AddressLevel, Coord, Tile};

// ── Loader DTO ────────────────────────────────────────────────────────────────

/// Deserialization shape of the maze file.  This is a load-time DTO only —
/// the live model is [`Maze`].  Unknown fields (tileset groups, layers,
/// camera) belong to the map-conversion tooling and are ignored here.
#[derive(Debug, Deserialize)]
pub struct MazeDoc {
    pub world: String,
    pub tile_size: u32,
    /// `[height, width]`.
    pub size: (u32, u32),
    #[serde(default = "default_address_keys")]
    pub tile_address_keys: Vec<String>,
    #[serde(default)]
    pub tiles: Vec<TileSeed>,
}

fn default_address_keys() -> Vec<String> {
    ["world", "sector", "arena", "game_object"]
        .map(str::to_string)
        .to_vec()
}

/// One addressed tile in the maze file.
#[derive(Debug, Deserialize)]
pub struct TileSeed {
    pub coord: Coord,
    #[serde(default)]
    pub address: Vec<String>,
    #[serde(default)]
    pub collision: bool,
}

// ── Scope config ──────────────────────────────────────────────────────────────

/// How an agent's vision scope is computed.
#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScopeMode {
    /// All tiles within Chebyshev distance `vision_r`, clamped to the grid.
    Box,
}

/// Vision settings shared by `get_scope` and the percept phase.
#[derive(Copy, Clone, Debug, Deserialize)]
pub struct ScopeConfig {
    pub mode: ScopeMode,
    pub vision_r: u32,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self { mode: ScopeMode::Box, vision_r: 3 }
    }
}

// ── Maze ──────────────────────────────────────────────────────────────────────

/// The shared tile world.
///
/// Tiles are stored row-major and never added or removed after load; agent
/// movement only mutates per-tile event sets.  `address_tiles` maps every
/// `:`-joined address prefix of depth ≥ 2 to the coords carrying it.
pub struct Maze {
    world: String,
    width: u32,
    height: u32,
    tile_size: u32,
    tiles: Vec<Tile>,
    address_tiles: FxHashMap<String, BTreeSet<Coord>>,
    strict_addresses: bool,
}

impl Maze {
    /// Build the live maze from its loader DTO.
    ///
    /// `strict_addresses` selects the deterministic failure mode for
    /// [`get_address_tiles`](Self::get_address_tiles) on unknown addresses.
    pub fn from_doc(doc: MazeDoc, strict_addresses: bool) -> MazeResult<Self> {
        let (height, width) = doc.size;
        if width == 0 || height == 0 {
            return Err(MazeError::Config(format!(
                "degenerate maze size {width}x{height}"
            )));
        }
        if doc.tile_address_keys != default_address_keys() {
            return Err(MazeError::Config(format!(
                "unsupported tile_address_keys {:?}",
                doc.tile_address_keys
            )));
        }

        // Bare grid first, then overlay the addressed tiles from the file.
        let mut tiles: Vec<Tile> = (0..height)
            .flat_map(|y| {
                let world = doc.world.clone();
                (0..width).map(move |x| Tile::new(Coord::new(x, y), &world, vec![], false))
            })
            .collect();

        for seed in doc.tiles {
            let c = seed.coord;
            if c.x >= width || c.y >= height {
                return Err(MazeError::OutOfBounds(c, width, height));
            }
            tiles[(c.y * width + c.x) as usize] =
                Tile::new(c, &doc.world, seed.address, seed.collision);
        }

        let mut address_tiles: FxHashMap<String, BTreeSet<Coord>> = FxHashMap::default();
        for tile in &tiles {
            for key in tile.registrable_addresses() {
                address_tiles.entry(key).or_default().insert(tile.coord());
            }
        }

        Ok(Self {
            world: doc.world,
            width,
            height,
            tile_size: doc.tile_size,
            tiles,
            address_tiles,
            strict_addresses,
        })
    }

    #[inline]
    pub fn world(&self) -> &str {
        &self.world
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    // ── Tile access ───────────────────────────────────────────────────────

    /// The tile at `coord`.
    ///
    /// # Panics
    /// Panics if `coord` is outside the grid.
    #[inline]
    pub fn tile_at(&self, coord: Coord) -> &Tile {
        assert!(
            coord.x < self.width && coord.y < self.height,
            "coordinate {coord} outside the {}x{} grid",
            self.width,
            self.height
        );
        &self.tiles[(coord.y * self.width + coord.x) as usize]
    }

    /// Mutable access to the tile at `coord`.
    ///
    /// # Panics
    /// Panics if `coord` is outside the grid.
    #[inline]
    pub fn tile_at_mut(&mut self, coord: Coord) -> &mut Tile {
        assert!(
            coord.x < self.width && coord.y < self.height,
            "coordinate {coord} outside the {}x{} grid",
            self.width,
            self.height
        );
        &mut self.tiles[(coord.y * self.width + coord.x) as usize]
    }

    // ── Neighborhood queries ──────────────────────────────────────────────

    /// The 4-neighborhood of `coord` in left/right/up/down order, clamped to
    /// the grid.  With `no_collision`, obstacle tiles are filtered out.
    pub fn get_around(&self, coord: Coord, no_collision: bool) -> Vec<Coord> {
        let mut coords = Vec::with_capacity(4);
        if coord.x > 0 {
            coords.push(Coord::new(coord.x - 1, coord.y));
        }
        if coord.x + 1 < self.width {
            coords.push(Coord::new(coord.x + 1, coord.y));
        }
        if coord.y > 0 {
            coords.push(Coord::new(coord.x, coord.y - 1));
        }
        if coord.y + 1 < self.height {
            coords.push(Coord::new(coord.x, coord.y + 1));
        }
        if no_collision {
            coords.retain(|c| !self.tile_at(*c).collision());
        }
        coords
    }

    /// All tiles within the configured vision scope of `coord`.
    pub fn get_scope(&self, coord: Coord, config: ScopeConfig) -> Vec<&Tile> {
        let ScopeMode::Box = config.mode;
        let r = config.vision_r;
        let x_lo = coord.x.saturating_sub(r);
        let x_hi = (coord.x + r + 1).min(self.width);
        let y_lo = coord.y.saturating_sub(r);
        let y_hi = (coord.y + r + 1).min(self.height);
        let mut tiles = Vec::new();
        for x in x_lo..x_hi {
            for y in y_lo..y_hi {
                tiles.push(self.tile_at(Coord::new(x, y)));
            }
        }
        tiles
    }

    // ── Address index ─────────────────────────────────────────────────────

    /// Coords registered under `address`.
    ///
    /// When the address has no entry, the default behavior falls back to a
    /// random registered coord set drawn from the caller's RNG.  With
    /// `strict_addresses`, the miss is surfaced as `None` instead.
    pub fn get_address_tiles(
        &self,
        address: &[String],
        rng: &mut AgentRng,
    ) -> Option<&BTreeSet<Coord>> {
        let key = address.join(":");
        if let Some(coords) = self.address_tiles.get(&key) {
            return Some(coords);
        }
        if self.strict_addresses {
            warn!(address = %key, "unknown address, strict mode returns no tiles");
            return None;
        }
        warn!(address = %key, "unknown address, falling back to a random registered one");
        let keys: Vec<&String> = self.address_tiles.keys().collect();
        rng.choose(&keys).map(|k| &self.address_tiles[*k])
    }

    /// `true` if `address` is registered in the index.
    pub fn knows_address(&self, address: &[String]) -> bool {
        self.address_tiles.contains_key(&address.join(":"))
    }

    // ── Object events ─────────────────────────────────────────────────────

    /// Propagate a game-object event to every tile carrying that object.
    ///
    /// Only fires when the tile at `coord` actually hosts the object the
    /// event is addressed to; otherwise it is a no-op.
    pub fn update_obj(&mut self, coord: Coord, event: &Event) {
        let tile = self.tile_at(coord);
        if !tile.has_address(AddressLevel::GameObject) {
            return;
        }
        if event.address != tile.get_address(AddressLevel::GameObject) {
            return;
        }
        let key = event.address_key();
        let Some(coords) = self.address_tiles.get(&key) else {
            return;
        };
        for c in coords.clone() {
            self.tile_at_mut(c).update_events(event);
        }
    }
}
