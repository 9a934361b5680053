use glam::Vec2;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::types::{EntityKey, Rect};

/// 3x3 neighbourhood: same tile first, then vertical, horizontal, diagonal.
pub const NEIGHBOUR_OFFSETS: [(i32, i32); 9] = [
    (0, 0),
    (0, -1),
    (0, 1),
    (-1, 0),
    (1, 0),
    (-1, -1),
    (1, -1),
    (-1, 1),
    (1, 1),
];

/// One grid cell and the entities currently registered in it.
#[derive(Clone, Debug)]
pub struct Tile {
    x: u32,
    y: u32,
    entities: SmallVec<[EntityKey; 8]>,
}

impl Tile {
    pub fn new(x: u32, y: u32) -> Self {
        Self {
            x,
            y,
            entities: SmallVec::new(),
        }
    }

    pub fn x(&self) -> u32 {
        self.x
    }

    pub fn y(&self) -> u32 {
        self.y
    }

    pub fn entities(&self) -> &[EntityKey] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, key: EntityKey) -> bool {
        self.entities.contains(&key)
    }

    fn insert(&mut self, key: EntityKey) {
        self.entities.push(key);
    }

    /// Swap-remove; order inside a tile carries no meaning.
    fn remove(&mut self, key: EntityKey) -> bool {
        match self.entities.iter().position(|k| *k == key) {
            Some(i) => {
                self.entities.swap_remove(i);
                true
            }
            None => false,
        }
    }
}

/// Uniform grid of tiles covering the layer bounds.
#[derive(Clone, Debug)]
pub struct TileGrid {
    bounds: Rect,
    tile_size: f32,
    inv_tile_size: f32,
    tiles_x: u32,
    tiles_y: u32,
    tiles: Vec<Tile>,
}

/// Largest grid [`TileGrid::new`] is allowed to build.
pub const MAX_TILES: u64 = 1 << 24;

impl TileGrid {
    /// Number of tiles a grid over `bounds` would hold, without building it.
    pub fn tile_count(bounds: Rect, tile_size: f32) -> u64 {
        if tile_size <= 0.0 {
            return 1;
        }
        let tx = (f64::from(bounds.width()) / f64::from(tile_size)).ceil().max(1.0);
        let ty = (f64::from(bounds.height()) / f64::from(tile_size)).ceil().max(1.0);
        // Saturates on overflow.
        (tx * ty) as u64
    }

    /// A zero `tile_size` yields a single tile holding everything.
    pub fn new(bounds: Rect, tile_size: f32) -> Self {
        let (tiles_x, tiles_y, inv_tile_size) = if tile_size > 0.0 {
            (
                ((bounds.width() / tile_size).ceil() as u32).max(1),
                ((bounds.height() / tile_size).ceil() as u32).max(1),
                1.0 / tile_size,
            )
        } else {
            (1, 1, 0.0)
        };
        let tiles = (0..tiles_y)
            .flat_map(|y| (0..tiles_x).map(move |x| Tile::new(x, y)))
            .collect();
        debug!(tiles_x, tiles_y, tile_size, "built tile grid");
        Self {
            bounds,
            tile_size,
            inv_tile_size,
            tiles_x,
            tiles_y,
            tiles,
        }
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn tile_size(&self) -> f32 {
        self.tile_size
    }

    pub fn tiles_x(&self) -> u32 {
        self.tiles_x
    }

    pub fn tiles_y(&self) -> u32 {
        self.tiles_y
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub(crate) fn tiles_mut(&mut self) -> &mut [Tile] {
        &mut self.tiles
    }

    pub fn tile(&self, index: usize) -> &Tile {
        &self.tiles[index]
    }

    /// Grid coordinates of the tile owning `position`, clamped into the grid.
    pub fn tile_coords(&self, position: Vec2) -> (u32, u32) {
        if position.is_nan() {
            warn!(?position, "NaN position mapped to tile (0, 0)");
            return (0, 0);
        }
        let local = (position - self.bounds.top_left) * self.inv_tile_size;
        let x = (local.x.floor() as i64).clamp(0, self.tiles_x as i64 - 1);
        let y = (local.y.floor() as i64).clamp(0, self.tiles_y as i64 - 1);
        (x as u32, y as u32)
    }

    pub fn index_of(&self, x: u32, y: u32) -> usize {
        y as usize * self.tiles_x as usize + x as usize
    }

    pub fn tile_index(&self, position: Vec2) -> usize {
        let (x, y) = self.tile_coords(position);
        self.index_of(x, y)
    }

    /// Indices of the tiles around `(x, y)` in [`NEIGHBOUR_OFFSETS`] order,
    /// skipping offsets that fall outside the grid.
    pub fn neighbourhood(&self, x: u32, y: u32) -> SmallVec<[usize; 9]> {
        NEIGHBOUR_OFFSETS
            .iter()
            .filter_map(|&(dx, dy)| {
                let nx = x as i64 + dx as i64;
                let ny = y as i64 + dy as i64;
                let inside =
                    nx >= 0 && ny >= 0 && nx < self.tiles_x as i64 && ny < self.tiles_y as i64;
                inside.then(|| self.index_of(nx as u32, ny as u32))
            })
            .collect()
    }

    /// Tile indices covering a rectangle, widened by `margin` tiles on each side.
    pub fn covering(&self, top_left: Vec2, bottom_right: Vec2, margin: u32) -> Vec<usize> {
        let (x0, y0) = self.tile_coords(top_left.min(bottom_right));
        let (x1, y1) = self.tile_coords(top_left.max(bottom_right));
        let x0 = x0.saturating_sub(margin);
        let y0 = y0.saturating_sub(margin);
        let x1 = (x1 + margin).min(self.tiles_x - 1);
        let y1 = (y1 + margin).min(self.tiles_y - 1);
        let mut out = Vec::with_capacity(((x1 - x0 + 1) * (y1 - y0 + 1)) as usize);
        for y in y0..=y1 {
            for x in x0..=x1 {
                out.push(self.index_of(x, y));
            }
        }
        out
    }

    pub fn occupied(&self) -> usize {
        self.tiles.iter().filter(|t| !t.is_empty()).count()
    }

    /// Total registrations across all tiles.
    pub fn total_entries(&self) -> usize {
        self.tiles.iter().map(Tile::len).sum()
    }
}

/// Which tile currently holds an entity.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TilePosition {
    tile: Option<usize>,
}

impl TilePosition {
    pub fn tile(&self) -> Option<usize> {
        self.tile
    }

    /// Move `key` into `new_tile`. Returns false, touching nothing, if it is already there.
    pub fn set_tile(&mut self, tiles: &mut [Tile], key: EntityKey, new_tile: Option<usize>) -> bool {
        if self.tile == new_tile {
            return false;
        }
        if let Some(old) = self.tile {
            let removed = tiles.get_mut(old).is_some_and(|t| t.remove(key));
            if !removed {
                trace!(?key, old, "entity missing from its recorded tile");
            }
        }
        if let Some(new) = new_tile {
            tiles[new].insert(key);
        }
        self.tile = new_tile;
        true
    }

    /// Forget the current tile without touching any tile (the grid was rebuilt).
    pub(crate) fn reset(&mut self) {
        self.tile = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn keys(n: usize) -> Vec<EntityKey> {
        let mut sm: SlotMap<EntityKey, ()> = SlotMap::with_key();
        (0..n).map(|_| sm.insert(())).collect()
    }

    #[test]
    fn test_tile_count_without_allocating() {
        let bounds = Rect::from_size(1000.0, 1000.0);
        assert_eq!(TileGrid::tile_count(bounds, 10.0), 10_000);
        assert_eq!(TileGrid::tile_count(bounds, 0.0), 1);
        assert!(TileGrid::tile_count(bounds, 1e-6) > MAX_TILES);
        assert_eq!(
            TileGrid::tile_count(bounds, 30.0) as usize,
            TileGrid::new(bounds, 30.0).len()
        );
    }

    #[test]
    fn test_grid_dimensions_round_up() {
        let g = TileGrid::new(Rect::from_size(25.0, 10.0), 10.0);
        assert_eq!((g.tiles_x(), g.tiles_y()), (3, 1));
        assert_eq!(g.len(), 3);
        assert_eq!(g.tile(2).x(), 2);
        let g = TileGrid::new(Rect::from_size(20.0, 20.0), 10.0);
        assert_eq!(g.len(), 4);
        assert_eq!(g.tile(3).y(), 1);
    }

    #[test]
    fn test_tile_coords_clamp_and_nan() {
        let g = TileGrid::new(Rect::from_size(30.0, 30.0), 10.0);
        assert_eq!(g.tile_coords(Vec2::new(15.0, 25.0)), (1, 2));
        assert_eq!(g.tile_coords(Vec2::new(-5.0, 100.0)), (0, 2));
        assert_eq!(g.tile_coords(Vec2::new(30.0, 30.0)), (2, 2));
        assert_eq!(g.tile_coords(Vec2::new(f32::NAN, 25.0)), (0, 0));
        assert_eq!(g.tile_index(Vec2::new(15.0, 25.0)), 7);
    }

    #[test]
    fn test_offset_origin() {
        let g = TileGrid::new(Rect::new(Vec2::splat(-10.0), Vec2::splat(10.0)), 10.0);
        assert_eq!(g.tile_coords(Vec2::new(-9.0, 9.0)), (0, 1));
    }

    #[test]
    fn test_zero_tile_size_collapses_to_one_tile() {
        let g = TileGrid::new(Rect::from_size(100.0, 100.0), 0.0);
        assert_eq!(g.len(), 1);
        assert_eq!(g.tile_coords(Vec2::new(99.0, 42.0)), (0, 0));
        assert_eq!(g.tile_coords(Vec2::INFINITY), (0, 0));
        assert_eq!(g.neighbourhood(0, 0).as_slice(), &[0]);
    }

    #[test]
    fn test_neighbourhood_order_and_edges() {
        let g = TileGrid::new(Rect::from_size(30.0, 30.0), 10.0);
        let centre = g.neighbourhood(1, 1);
        assert_eq!(centre.as_slice(), &[4, 1, 7, 3, 5, 0, 2, 6, 8]);
        let corner = g.neighbourhood(0, 0);
        assert_eq!(corner.as_slice(), &[0, 3, 1, 4]);
    }

    #[test]
    fn test_covering_widens_and_clamps() {
        let g = TileGrid::new(Rect::from_size(50.0, 50.0), 10.0);
        let tiles = g.covering(Vec2::new(22.0, 22.0), Vec2::new(27.0, 27.0), 1);
        assert_eq!(tiles.len(), 9);
        let tiles = g.covering(Vec2::new(1.0, 1.0), Vec2::new(2.0, 2.0), 1);
        assert_eq!(tiles.len(), 4);
    }

    #[test]
    fn test_set_tile_moves_and_is_idempotent() {
        let mut g = TileGrid::new(Rect::from_size(20.0, 20.0), 10.0);
        let k = keys(3);
        let mut positions = [TilePosition::default(); 3];
        for (p, key) in positions.iter_mut().zip(&k) {
            assert!(p.set_tile(g.tiles_mut(), *key, Some(0)));
        }
        assert_eq!(g.tile(0).entities(), &[k[0], k[1], k[2]]);

        // Same tile: nothing moves.
        assert!(!positions[1].set_tile(g.tiles_mut(), k[1], Some(0)));
        assert_eq!(g.tile(0).entities(), &[k[0], k[1], k[2]]);

        // Swap-remove pulls the last entry into the hole.
        assert!(positions[0].set_tile(g.tiles_mut(), k[0], Some(3)));
        assert_eq!(g.tile(0).entities(), &[k[2], k[1]]);
        assert_eq!(g.tile(3).entities(), &[k[0]]);
        assert_eq!(positions[0].tile(), Some(3));
        assert_eq!(g.total_entries(), 3);
        assert_eq!(g.occupied(), 2);

        assert!(positions[2].set_tile(g.tiles_mut(), k[2], None));
        assert!(!g.tile(0).contains(k[2]));
    }

    #[test]
    fn test_missing_entry_is_silent() {
        let mut g = TileGrid::new(Rect::from_size(20.0, 20.0), 10.0);
        let k = keys(1);
        let mut p = TilePosition::default();
        p.set_tile(g.tiles_mut(), k[0], Some(1));
        // Grid rebuilt behind the record's back.
        let mut fresh = TileGrid::new(Rect::from_size(20.0, 20.0), 10.0);
        assert!(p.set_tile(fresh.tiles_mut(), k[0], Some(2)));
        assert_eq!(fresh.tile(2).entities(), &[k[0]]);
        p.reset();
        assert_eq!(p.tile(), None);
    }
}
