use glam::Vec2;
use slotmap::{SecondaryMap, SlotMap};
use tracing::{debug, trace};

use crate::api::{Entity, Integrator};
use crate::context::SimContext;
use crate::error::Result;
use crate::integrator::{
    apply_removals, contains_point, in_rect, integrate_pass, validate_attach, within,
};
use crate::response::check_collision_between;
use crate::tile::{TileGrid, TilePosition};
use crate::types::*;

/// Integrator with a uniform tile grid as broad phase.
///
/// Each entity is registered in the tile holding its position; an initiating entity
/// is only tested against entities in the 3x3 block of tiles around its own. Entities
/// much larger than `tile_size` can therefore miss contacts with entities two tiles away.
#[derive(Clone, Debug)]
pub struct TiledIntegrator {
    config: IntegratorConfig,
    grid: TileGrid,
    positions: SecondaryMap<EntityKey, TilePosition>,
    keys: Vec<EntityKey>,
    visible: Option<Rect>,
    stats: IntegratorStats,
    scratch: Vec<EntityKey>,
}

impl Default for TiledIntegrator {
    fn default() -> Self {
        Self::new(IntegratorConfig::default())
    }
}

impl TiledIntegrator {
    /// The grid is built once the integrator is attached to a layer.
    pub fn new(config: IntegratorConfig) -> Self {
        Self {
            config,
            grid: TileGrid::new(Rect::from_size(1.0, 1.0), 0.0),
            positions: SecondaryMap::new(),
            keys: Vec::new(),
            visible: None,
            stats: IntegratorStats::default(),
            scratch: Vec::new(),
        }
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    /// Tile index `key` is registered in.
    pub fn tile_of(&self, key: EntityKey) -> Option<usize> {
        self.positions.get(key).and_then(TilePosition::tile)
    }

    pub fn visible_region(&self) -> Option<Rect> {
        self.visible
    }

    /// Region gating [`UpdateBehaviour::UpdateWhenVisible`] entities. `None` updates them always.
    pub fn set_visible_region(&mut self, region: Option<Rect>) {
        self.visible = region;
    }

    fn place(&mut self, key: EntityKey, position: Vec2) {
        let tile = self.grid.tile_index(position);
        let Some(record) = self.positions.get_mut(key) else {
            return;
        };
        if record.set_tile(self.grid.tiles_mut(), key, Some(tile)) {
            self.stats.tile_moves += 1;
            trace!(?key, tile, "tile move");
        }
    }

    /// Re-register every listed entity from its current position.
    fn retile<E: Entity>(&mut self, entities: &SlotMap<EntityKey, E>) {
        for record in self.positions.values_mut() {
            record.reset();
        }
        for i in 0..self.keys.len() {
            let key = self.keys[i];
            if let Some(e) = entities.get(key) {
                self.place(key, e.position());
            }
        }
    }

    fn neighbours(&self, point: Vec2) -> impl Iterator<Item = EntityKey> + '_ {
        let (x, y) = self.grid.tile_coords(point);
        self.grid
            .neighbourhood(x, y)
            .into_iter()
            .flat_map(move |idx| self.grid.tile(idx).entities().iter().copied())
    }

    fn collision_pass<E: Entity>(&mut self, entities: &mut SlotMap<EntityKey, E>, ctx: &mut SimContext) {
        let mut i = 0;
        while i < self.keys.len() {
            let key = self.keys[i];
            let mut next = i + 1;
            let Some(e) = entities.get(key) else {
                i = next;
                continue;
            };
            if !(e.initiates() && e.shape().is_some()) {
                i = next;
                continue;
            }

            let (tx, ty) = self.grid.tile_coords(e.position());
            let mut candidates = std::mem::take(&mut self.scratch);
            candidates.clear();
            for idx in self.grid.neighbourhood(tx, ty) {
                candidates.extend_from_slice(self.grid.tile(idx).entities());
            }

            for &other in &candidates {
                if other == key {
                    continue;
                }
                let (Some(e), Some(o)) = (entities.get(key), entities.get(other)) else {
                    continue;
                };
                if !o.is_candidate() {
                    continue;
                }
                // The higher id tests pairs where both sides initiate.
                if o.initiates() && e.id() <= o.id() {
                    continue;
                }
                check_collision_between(key, other, entities, &self.config, ctx, &mut self.stats);
                if ctx.has_removals() {
                    apply_removals(self, entities, ctx, &mut next);
                    if !entities.contains_key(key) {
                        break;
                    }
                }
            }
            self.scratch = candidates;
            i = next;
        }
    }
}

impl<E: Entity> Integrator<E> for TiledIntegrator {
    fn config(&self) -> &IntegratorConfig {
        &self.config
    }

    fn attach(&mut self, bounds: Rect, entities: &SlotMap<EntityKey, E>) -> Result<()> {
        validate_attach(&self.config, bounds)?;
        self.grid = TileGrid::new(bounds, self.config.tile_size);
        self.retile(entities);
        debug!(
            ?bounds,
            tiles = self.grid.len(),
            entities = self.keys.len(),
            "tiled integrator attached"
        );
        Ok(())
    }

    fn on_added(&mut self, key: EntityKey, entities: &SlotMap<EntityKey, E>) {
        self.keys.push(key);
        self.positions.insert(key, TilePosition::default());
        if let Some(e) = entities.get(key) {
            self.place(key, e.position());
        }
    }

    fn on_removed(&mut self, key: EntityKey) {
        if let Some(mut record) = self.positions.remove(key) {
            record.set_tile(self.grid.tiles_mut(), key, None);
        }
        if let Some(i) = self.keys.iter().position(|k| *k == key) {
            self.keys.remove(i);
        }
    }

    fn change_size(
        &mut self,
        bounds: Rect,
        destroy_out_of_bounds: bool,
        entities: &SlotMap<EntityKey, E>,
    ) -> Vec<EntityKey> {
        self.grid = TileGrid::new(bounds, self.config.tile_size);
        let outside: Vec<EntityKey> = if destroy_out_of_bounds {
            self.keys
                .iter()
                .copied()
                .filter(|k| entities.get(*k).is_some_and(|e| !bounds.contains(e.position())))
                .collect()
        } else {
            Vec::new()
        };
        self.retile(entities);
        debug!(
            ?bounds,
            tiles = self.grid.len(),
            outside = outside.len(),
            "tiled integrator resized"
        );
        outside
    }

    fn update(&mut self, elapsed: f32, entities: &mut SlotMap<EntityKey, E>, ctx: &mut SimContext) {
        self.stats = IntegratorStats::default();
        let steps = self.config.physics_execution_count;
        let dt = elapsed / steps as f32;
        for _ in 0..steps {
            let visible = self.visible;
            integrate_pass(self, dt, visible, entities, ctx, |this, key, position| {
                this.place(key, position)
            });
            self.collision_pass(entities, ctx);
            self.stats.steps += 1;
        }
        trace!(
            steps = self.stats.steps,
            pair_tests = self.stats.pair_tests,
            collisions = self.stats.collisions,
            tile_moves = self.stats.tile_moves,
            "tiled update"
        );
    }

    fn entity_keys(&self) -> &[EntityKey] {
        &self.keys
    }

    fn entity_at(&self, point: Vec2, entities: &SlotMap<EntityKey, E>) -> Option<EntityKey> {
        self.neighbours(point)
            .find(|k| entities.get(*k).is_some_and(|e| contains_point(e, point)))
    }

    fn entities_at(&self, point: Vec2, entities: &SlotMap<EntityKey, E>) -> Vec<EntityKey> {
        self.neighbours(point)
            .filter(|k| entities.get(*k).is_some_and(|e| contains_point(e, point)))
            .collect()
    }

    fn entities_in_rect(
        &self,
        top_left: Vec2,
        bottom_right: Vec2,
        partial: bool,
        entities: &SlotMap<EntityKey, E>,
    ) -> Vec<EntityKey> {
        let mut out = Vec::new();
        for idx in self.grid.covering(top_left, bottom_right, 1) {
            for &key in self.grid.tile(idx).entities() {
                if entities
                    .get(key)
                    .is_some_and(|e| in_rect(e, top_left, bottom_right, partial))
                {
                    out.push(key);
                }
            }
        }
        out
    }

    /// First match in the 3x3 tiles around `point`. Closer entities further out are not seen.
    fn entity_close_to(
        &self,
        point: Vec2,
        max_distance: f32,
        entities: &SlotMap<EntityKey, E>,
    ) -> Option<EntityKey> {
        self.neighbours(point)
            .find(|k| entities.get(*k).is_some_and(|e| within(e, point, max_distance)))
    }

    fn stats(&self) -> IntegratorStats {
        IntegratorStats {
            entities: self.keys.len(),
            tiles: self.grid.len(),
            occupied_tiles: self.grid.occupied(),
            ..self.stats
        }
    }
}
