//! Brute-force integrator and the sub-step driver shared with [`crate::tiled`].

use glam::Vec2;
use slotmap::SlotMap;
use tracing::{debug, trace};

use crate::api::{Entity, Integrator};
use crate::context::SimContext;
use crate::error::{Error, Result};
use crate::response::check_collision_between;
use crate::tile::{MAX_TILES, TileGrid};
use crate::types::*;

/// Whether `e` is advanced during this sub-step.
pub(crate) fn should_integrate<E: Entity>(e: &E, visible: Option<Rect>) -> bool {
    let flags = e.flags();
    if flags.destroyed || flags.ghost {
        return false;
    }
    match e.update_behaviour() {
        UpdateBehaviour::AlwaysUpdate => true,
        UpdateBehaviour::UpdateWhenVisible => visible.is_none_or(|r| r.contains(e.position())),
        UpdateBehaviour::NeverUpdate => false,
    }
}

/// `e` searches for contacts with `o` this sub-step.
pub(crate) fn leads<E: Entity>(e: &E, o: &E) -> bool {
    e.initiates() && e.shape().is_some() && o.is_candidate()
}

pub(crate) fn validate_attach(config: &IntegratorConfig, bounds: Rect) -> Result<()> {
    config.validate()?;
    if !bounds.is_valid() {
        return Err(Error::InvalidBounds {
            width: bounds.width(),
            height: bounds.height(),
        });
    }
    let tiles = TileGrid::tile_count(bounds, config.tile_size);
    if tiles > MAX_TILES {
        return Err(Error::InvalidConfig(format!(
            "tile_size {} over {}x{} needs {} tiles, limit is {}",
            config.tile_size,
            bounds.width(),
            bounds.height(),
            tiles,
            MAX_TILES
        )));
    }
    Ok(())
}

/// Apply removals queued on `ctx` by a callback.
///
/// `next` is the list index the caller will visit next; it is shifted down for every
/// removed entry before it, so the loop neither skips nor repeats an entity.
pub(crate) fn apply_removals<E, I>(
    integrator: &mut I,
    entities: &mut SlotMap<EntityKey, E>,
    ctx: &mut SimContext,
    next: &mut usize,
) where
    E: Entity,
    I: Integrator<E>,
{
    for key in ctx.take_removals() {
        if let Some(idx) = integrator.entity_keys().iter().position(|k| *k == key) {
            if idx < *next {
                *next -= 1;
            }
        }
        integrator.on_removed(key);
        if entities.remove(key).is_some() {
            trace!(?key, "entity removed by callback");
        }
    }
}

/// Step 1 of a sub-step: advance every eligible entity in list order, then let the
/// integrator re-register it through `placed`.
pub(crate) fn integrate_pass<E, I>(
    integrator: &mut I,
    dt: f32,
    visible: Option<Rect>,
    entities: &mut SlotMap<EntityKey, E>,
    ctx: &mut SimContext,
    mut placed: impl FnMut(&mut I, EntityKey, Vec2),
) where
    E: Entity,
    I: Integrator<E>,
{
    let mut i = 0;
    while i < integrator.entity_keys().len() {
        let key = integrator.entity_keys()[i];
        let mut next = i + 1;
        if let Some(e) = entities.get_mut(key) {
            if should_integrate(e, visible) {
                e.integrate(dt, ctx);
                let orientation = e.orientation();
                if let Some(shape) = e.shape_mut() {
                    shape.orient(orientation);
                }
            }
            placed(integrator, key, e.position());
        }
        if ctx.has_removals() {
            apply_removals(integrator, entities, ctx, &mut next);
        }
        i = next;
    }
}

pub(crate) fn contains_point<E: Entity>(e: &E, point: Vec2) -> bool {
    !e.flags().destroyed && e.shape().is_some_and(|s| s.in_shape(e.pose(), point))
}

pub(crate) fn in_rect<E: Entity>(e: &E, top_left: Vec2, bottom_right: Vec2, partial: bool) -> bool {
    !e.flags().destroyed
        && e.shape()
            .is_some_and(|s| s.in_rect(e.pose(), top_left, bottom_right, partial))
}

pub(crate) fn within<E: Entity>(e: &E, point: Vec2, max_distance: f32) -> bool {
    !e.flags().destroyed
        && e.shape()
            .is_some_and(|s| s.distance_to(e.pose(), point) <= max_distance)
}

/// O(n²) integrator without spatial partitioning.
///
/// Tests every pair once by list position. Fine for a few dozen entities and the
/// reference the tiled integrator is checked against.
#[derive(Clone, Debug, Default)]
pub struct BruteForceIntegrator {
    config: IntegratorConfig,
    bounds: Option<Rect>,
    visible: Option<Rect>,
    keys: Vec<EntityKey>,
    stats: IntegratorStats,
    scratch: Vec<EntityKey>,
}

impl BruteForceIntegrator {
    pub fn new(config: IntegratorConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn bounds(&self) -> Option<Rect> {
        self.bounds
    }

    pub fn visible_region(&self) -> Option<Rect> {
        self.visible
    }

    /// Region gating [`UpdateBehaviour::UpdateWhenVisible`] entities. `None` updates them always.
    pub fn set_visible_region(&mut self, region: Option<Rect>) {
        self.visible = region;
    }

    fn collision_pass<E: Entity>(&mut self, entities: &mut SlotMap<EntityKey, E>, ctx: &mut SimContext) {
        let mut i = 0;
        while i < self.keys.len() {
            let key = self.keys[i];
            let mut next = i + 1;
            let mut earlier = std::mem::take(&mut self.scratch);
            earlier.clear();
            earlier.extend_from_slice(&self.keys[..i]);
            for &other in &earlier {
                let (Some(a), Some(b)) = (entities.get(key), entities.get(other)) else {
                    continue;
                };
                let (ka, kb) = if leads(a, b) {
                    (key, other)
                } else if leads(b, a) {
                    (other, key)
                } else {
                    continue;
                };
                check_collision_between(ka, kb, entities, &self.config, ctx, &mut self.stats);
                if ctx.has_removals() {
                    apply_removals(self, entities, ctx, &mut next);
                    if !entities.contains_key(key) {
                        break;
                    }
                }
            }
            self.scratch = earlier;
            i = next;
        }
    }
}

impl<E: Entity> Integrator<E> for BruteForceIntegrator {
    fn config(&self) -> &IntegratorConfig {
        &self.config
    }

    fn attach(&mut self, bounds: Rect, _entities: &SlotMap<EntityKey, E>) -> Result<()> {
        validate_attach(&self.config, bounds)?;
        self.bounds = Some(bounds);
        debug!(?bounds, "brute-force integrator attached");
        Ok(())
    }

    fn on_added(&mut self, key: EntityKey, _entities: &SlotMap<EntityKey, E>) {
        self.keys.push(key);
    }

    fn on_removed(&mut self, key: EntityKey) {
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
        self.bounds = Some(bounds);
        if !destroy_out_of_bounds {
            return Vec::new();
        }
        self.keys
            .iter()
            .copied()
            .filter(|k| entities.get(*k).is_some_and(|e| !bounds.contains(e.position())))
            .collect()
    }

    fn update(&mut self, elapsed: f32, entities: &mut SlotMap<EntityKey, E>, ctx: &mut SimContext) {
        self.stats = IntegratorStats::default();
        let steps = self.config.physics_execution_count;
        let dt = elapsed / steps as f32;
        for _ in 0..steps {
            let visible = self.visible;
            integrate_pass(self, dt, visible, entities, ctx, |_, _, _| {});
            self.collision_pass(entities, ctx);
            self.stats.steps += 1;
        }
        trace!(
            steps = self.stats.steps,
            pair_tests = self.stats.pair_tests,
            collisions = self.stats.collisions,
            "brute-force update"
        );
    }

    fn entity_keys(&self) -> &[EntityKey] {
        &self.keys
    }

    fn entity_at(&self, point: Vec2, entities: &SlotMap<EntityKey, E>) -> Option<EntityKey> {
        self.keys
            .iter()
            .copied()
            .find(|k| entities.get(*k).is_some_and(|e| contains_point(e, point)))
    }

    fn entities_at(&self, point: Vec2, entities: &SlotMap<EntityKey, E>) -> Vec<EntityKey> {
        self.keys
            .iter()
            .copied()
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
        self.keys
            .iter()
            .copied()
            .filter(|k| {
                entities
                    .get(*k)
                    .is_some_and(|e| in_rect(e, top_left, bottom_right, partial))
            })
            .collect()
    }

    fn entity_close_to(
        &self,
        point: Vec2,
        max_distance: f32,
        entities: &SlotMap<EntityKey, E>,
    ) -> Option<EntityKey> {
        self.keys
            .iter()
            .copied()
            .find(|k| entities.get(*k).is_some_and(|e| within(e, point, max_distance)))
    }

    fn stats(&self) -> IntegratorStats {
        IntegratorStats {
            entities: self.keys.len(),
            ..self.stats
        }
    }
}
