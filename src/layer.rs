use glam::Vec2;
use slotmap::SlotMap;
use tracing::{debug, warn};

use crate::api::{Entity, Integrator};
use crate::context::SimContext;
use crate::error::Result;
use crate::integrator::validate_attach;
use crate::tiled::TiledIntegrator;
use crate::types::*;

/// Host container: owns the entities of one world layer and the integrator driving them.
///
/// Keys handed out by [`Layer::add`] stay valid until the entity is removed, whether
/// by the host, by a collision callback through [`SimContext::remove_entity`], by the
/// destroyed-sweep after [`Layer::update`] or by a shrinking [`Layer::change_size`].
pub struct Layer<E, I = TiledIntegrator> {
    bounds: Rect,
    entities: SlotMap<EntityKey, E>,
    integrator: I,
    ctx: SimContext,
}

impl<E, I> Layer<E, I>
where
    E: Entity,
    I: Integrator<E>,
{
    /// Attach `integrator` to a new, empty layer.
    pub fn new(bounds: Rect, mut integrator: I, ctx: SimContext) -> Result<Self> {
        validate_attach(integrator.config(), bounds)?;
        let entities = SlotMap::with_key();
        integrator.attach(bounds, &entities)?;
        debug!(?bounds, "layer created");
        Ok(Self {
            bounds,
            entities,
            integrator,
            ctx,
        })
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn add(&mut self, entity: E) -> EntityKey {
        let key = self.entities.insert(entity);
        self.integrator.on_added(key, &self.entities);
        key
    }

    pub fn remove(&mut self, key: EntityKey) -> Option<E> {
        let entity = self.entities.remove(key)?;
        self.integrator.on_removed(key);
        Some(entity)
    }

    pub fn get(&self, key: EntityKey) -> Option<&E> {
        self.entities.get(key)
    }

    /// Position changes made here are picked up at the next sub-step.
    pub fn get_mut(&mut self, key: EntityKey) -> Option<&mut E> {
        self.entities.get_mut(key)
    }

    pub fn contains(&self, key: EntityKey) -> bool {
        self.entities.contains_key(key)
    }

    /// Entities in integration order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityKey, &E)> + '_ {
        self.integrator
            .entity_keys()
            .iter()
            .filter_map(move |k| self.entities.get(*k).map(|e| (*k, e)))
    }

    pub fn keys(&self) -> &[EntityKey] {
        self.integrator.entity_keys()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn integrator(&self) -> &I {
        &self.integrator
    }

    pub fn integrator_mut(&mut self) -> &mut I {
        &mut self.integrator
    }

    pub fn ctx(&self) -> &SimContext {
        &self.ctx
    }

    pub fn ctx_mut(&mut self) -> &mut SimContext {
        &mut self.ctx
    }

    /// Advance one frame, then drop queued and destroyed entities.
    pub fn update(&mut self, elapsed: f32) {
        self.integrator
            .update(elapsed, &mut self.entities, &mut self.ctx);
        for key in self.ctx.take_removals() {
            self.remove(key);
        }
        let destroyed: Vec<EntityKey> = self
            .entities
            .iter()
            .filter(|(_, e)| e.flags().destroyed)
            .map(|(k, _)| k)
            .collect();
        for key in destroyed {
            self.remove(key);
        }
        self.ctx.advance(elapsed);
    }

    /// Resize the world. With `destroy_out_of_bounds`, entities outside the new bounds
    /// are removed and returned; otherwise they stay, clamped into the edge tiles.
    pub fn change_size(&mut self, bounds: Rect, destroy_out_of_bounds: bool) -> Result<Vec<E>> {
        validate_attach(self.integrator.config(), bounds)?;
        self.bounds = bounds;
        let outside = self
            .integrator
            .change_size(bounds, destroy_out_of_bounds, &self.entities);
        if !outside.is_empty() {
            warn!(count = outside.len(), ?bounds, "removing entities outside new bounds");
        }
        Ok(outside.into_iter().filter_map(|k| self.remove(k)).collect())
    }

    pub fn entity_at(&self, point: Vec2) -> Option<EntityKey> {
        self.integrator.entity_at(point, &self.entities)
    }

    pub fn entities_at(&self, point: Vec2) -> Vec<EntityKey> {
        self.integrator.entities_at(point, &self.entities)
    }

    pub fn entities_in_rect(&self, top_left: Vec2, bottom_right: Vec2, partial: bool) -> Vec<EntityKey> {
        self.integrator
            .entities_in_rect(top_left, bottom_right, partial, &self.entities)
    }

    pub fn entity_close_to(&self, point: Vec2, max_distance: f32) -> Option<EntityKey> {
        self.integrator
            .entity_close_to(point, max_distance, &self.entities)
    }

    pub fn stats(&self) -> IntegratorStats {
        self.integrator.stats()
    }
}

impl<E, I> std::ops::Index<EntityKey> for Layer<E, I> {
    type Output = E;

    fn index(&self, key: EntityKey) -> &E {
        &self.entities[key]
    }
}

impl<E, I> std::ops::IndexMut<EntityKey> for Layer<E, I> {
    fn index_mut(&mut self, key: EntityKey) -> &mut E {
        &mut self.entities[key]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Body;
    use crate::error::Error;
    use crate::integrator::BruteForceIntegrator;
    use crate::shape::Shape;

    fn layer() -> Layer<Body> {
        let integrator = TiledIntegrator::new(IntegratorConfig::new(1, 10.0));
        Layer::new(Rect::from_size(100.0, 100.0), integrator, SimContext::new(1)).unwrap()
    }

    fn ball(layer: &mut Layer<Body>, x: f32, y: f32) -> EntityKey {
        let body = Body::new(layer.ctx_mut(), Vec2::new(x, y), Shape::circle(2.0), 1.0);
        layer.add(body)
    }

    #[test]
    fn test_new_validates() {
        let bad = TiledIntegrator::new(IntegratorConfig::new(0, 10.0));
        assert!(matches!(
            Layer::<Body, _>::new(Rect::from_size(10.0, 10.0), bad, SimContext::default()),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            Layer::<Body, _>::new(
                Rect::from_size(-1.0, 10.0),
                BruteForceIntegrator::default(),
                SimContext::default()
            ),
            Err(Error::InvalidBounds { .. })
        ));
    }

    #[test]
    fn test_add_remove() {
        let mut layer = layer();
        let a = ball(&mut layer, 10.0, 10.0);
        let b = ball(&mut layer, 50.0, 50.0);
        assert_eq!(layer.len(), 2);
        assert_eq!(layer.keys(), &[a, b]);
        let removed = layer.remove(a).unwrap();
        assert_eq!(removed.position, Vec2::new(10.0, 10.0));
        assert!(layer.remove(a).is_none());
        assert_eq!(layer.keys(), &[b]);
        assert_eq!(layer.iter().count(), 1);
        assert_eq!(layer.integrator().tile_of(a), None);
    }

    #[test]
    fn test_update_sweeps_destroyed_and_ticks_clock() {
        let mut layer = layer();
        let a = ball(&mut layer, 10.0, 10.0);
        let b = ball(&mut layer, 50.0, 50.0);
        layer[a].destroy();
        layer.update(0.5);
        assert!(!layer.contains(a));
        assert!(layer.contains(b));
        assert_eq!(layer.ctx().frame(), 1);
        assert!((layer.ctx().clock() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_host_queued_removal_applies_on_update() {
        let mut layer = layer();
        let a = ball(&mut layer, 10.0, 10.0);
        layer.ctx_mut().remove_entity(a);
        layer.update(0.1);
        assert!(layer.is_empty());
    }

    #[test]
    fn test_change_size_returns_dropped_entities() {
        let mut layer = layer();
        let a = ball(&mut layer, 10.0, 10.0);
        let b = ball(&mut layer, 80.0, 80.0);
        let dropped = layer.change_size(Rect::from_size(50.0, 50.0), true).unwrap();
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].position, Vec2::new(80.0, 80.0));
        assert!(layer.contains(a));
        assert!(!layer.contains(b));
        assert_eq!(layer.bounds(), Rect::from_size(50.0, 50.0));
        assert!(layer.change_size(Rect::from_size(0.0, 0.0), true).is_err());
    }

    #[test]
    fn test_oversized_grid_is_rejected() {
        let tiny = TiledIntegrator::new(IntegratorConfig::new(1, 1e-6));
        assert!(matches!(
            Layer::<Body, _>::new(Rect::from_size(1000.0, 1000.0), tiny, SimContext::default()),
            Err(Error::InvalidConfig(_))
        ));
        // Growing past the limit leaves the current grid in place.
        let mut layer = layer();
        let a = ball(&mut layer, 10.0, 10.0);
        assert!(matches!(
            layer.change_size(Rect::from_size(1e9, 1e9), true),
            Err(Error::InvalidConfig(_))
        ));
        assert_eq!(layer.bounds(), Rect::from_size(100.0, 100.0));
        assert_eq!(layer.integrator().grid().len(), 100);
        assert!(layer.contains(a));
    }

    #[test]
    fn test_nan_entity_does_not_poison_neighbours() {
        let mut layer = layer();
        let lost = ball(&mut layer, f32::NAN, 5.0);
        let good = ball(&mut layer, 5.0, 5.0);
        layer[good].mover.as_mut().unwrap().velocity = Vec2::new(1.0, 0.0);
        layer.update(0.01);
        assert_eq!(layer.stats().collisions, 0);
        assert!(layer[good].position.is_finite());
        assert!(layer[good].contacts.is_empty());
        assert!(layer.contains(lost));
    }

    #[test]
    fn test_query_forwarders() {
        let mut layer = layer();
        let a = ball(&mut layer, 10.0, 10.0);
        assert_eq!(layer.entity_at(Vec2::new(11.0, 10.0)), Some(a));
        assert_eq!(layer.entities_at(Vec2::new(11.0, 10.0)), vec![a]);
        assert_eq!(
            layer.entities_in_rect(Vec2::ZERO, Vec2::splat(20.0), false),
            vec![a]
        );
        assert_eq!(layer.entity_close_to(Vec2::new(14.0, 10.0), 2.5), Some(a));
        assert_eq!(layer.stats().entities, 1);
    }
}
