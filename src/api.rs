use glam::Vec2;
use slotmap::SlotMap;

use crate::context::SimContext;
use crate::error::Result;
use crate::mover::Mover;
use crate::shape::{Pose, Shape};
use crate::types::*;

/// Collaborator contract between the integrator and the host's entities.
///
/// Everything the integrator reads or mutates on an entity goes through this trait.
/// The hooks (`can_collide_with`, `after_collision_with`, `absorb_energy`) have
/// neutral defaults; `integrate` defaults to advancing the mover, if any.
pub trait Entity {
    /// Monotonic id used to order pair tests. Take it from [`SimContext::next_entity_id`].
    fn id(&self) -> u64;

    fn position(&self) -> Vec2;

    fn set_position(&mut self, position: Vec2);

    fn orientation(&self) -> f32;

    fn set_orientation(&mut self, orientation: f32);

    fn shape(&self) -> Option<&Shape>;

    fn shape_mut(&mut self) -> Option<&mut Shape>;

    fn flags(&self) -> EntityFlags;

    fn mass(&self) -> f32;

    /// Velocity carrier. Entities without one are immovable for collision response.
    fn mover(&self) -> Option<&Mover>;

    fn mover_mut(&mut self) -> Option<&mut Mover>;

    fn update_behaviour(&self) -> UpdateBehaviour {
        UpdateBehaviour::AlwaysUpdate
    }

    /// Category filtering. Both sides must agree for a collision to count.
    fn can_collide_with(&self, _other: &Self) -> bool {
        true
    }

    /// Passive reaction to a resolved contact (damage, sound, scripting).
    /// `data.normal` points from `other` toward `self`.
    fn after_collision_with(
        &mut self,
        _other: EntityKey,
        _data: &CollisionData,
        _ctx: &mut SimContext,
    ) {
    }

    /// Kinetic energy dissipated by a collision response involving this entity.
    fn absorb_energy(&mut self, _energy: f32) {}

    /// Advance motion by `dt` seconds.
    fn integrate(&mut self, dt: f32, _ctx: &mut SimContext) {
        let mass = self.mass();
        let mut position = self.position();
        let mut orientation = self.orientation();
        let Some(mover) = self.mover_mut() else {
            return;
        };
        mover.integrate(&mut position, &mut orientation, mass, dt);
        self.set_position(position);
        self.set_orientation(orientation);
    }

    fn pose(&self) -> Pose {
        Pose::new(self.position(), self.orientation())
    }

    /// Takes part in pair searches as the active side.
    fn initiates(&self) -> bool {
        let flags = self.flags();
        flags.initiate_collision
            && !flags.destroyed
            && !flags.ghost
            && self.update_behaviour() != UpdateBehaviour::NeverUpdate
    }

    /// Can be tested against at all.
    fn is_candidate(&self) -> bool {
        let flags = self.flags();
        !flags.destroyed && !flags.ghost && flags.collidable && self.shape().is_some()
    }
}

/// Seam between the brute-force and the tiled integrator.
///
/// The integrator owns the ordered entity list; the [`crate::layer::Layer`] owns the
/// entities themselves and calls the `on_*` notifications.
pub trait Integrator<E: Entity> {
    fn config(&self) -> &IntegratorConfig;

    /// Bind to a layer of the given bounds. Called once by the layer.
    fn attach(&mut self, bounds: Rect, entities: &SlotMap<EntityKey, E>) -> Result<()>;

    fn on_added(&mut self, key: EntityKey, entities: &SlotMap<EntityKey, E>);

    fn on_removed(&mut self, key: EntityKey);

    /// Rebuild spatial state for new bounds. Returns the keys of entities that
    /// fell outside and must be dropped by the caller (only if requested).
    fn change_size(
        &mut self,
        bounds: Rect,
        destroy_out_of_bounds: bool,
        entities: &SlotMap<EntityKey, E>,
    ) -> Vec<EntityKey>;

    /// Advance one frame of `elapsed` seconds split into sub-steps.
    fn update(&mut self, elapsed: f32, entities: &mut SlotMap<EntityKey, E>, ctx: &mut SimContext);

    /// Entities in integration order.
    fn entity_keys(&self) -> &[EntityKey];

    // --- Queries -----------------------------------------------------------

    /// First entity whose shape contains `point`.
    fn entity_at(&self, point: Vec2, entities: &SlotMap<EntityKey, E>) -> Option<EntityKey>;

    fn entities_at(&self, point: Vec2, entities: &SlotMap<EntityKey, E>) -> Vec<EntityKey>;

    fn entities_in_rect(
        &self,
        top_left: Vec2,
        bottom_right: Vec2,
        partial: bool,
        entities: &SlotMap<EntityKey, E>,
    ) -> Vec<EntityKey>;

    /// First entity within `max_distance` of `point` (not necessarily the nearest).
    fn entity_close_to(
        &self,
        point: Vec2,
        max_distance: f32,
        entities: &SlotMap<EntityKey, E>,
    ) -> Option<EntityKey>;

    fn stats(&self) -> IntegratorStats;
}

/// Narrowphase and primitive intersection kernels on world-space geometry.
///
/// Polygon arguments are convex vertex lists with matching outward face normals
/// (`normals[i]` belongs to the edge `vertices[i] -> vertices[i + 1]`).
pub trait NarrowphaseApi {
    // Overlaps --------------------------------------------------------------

    fn circle_circle(c0: Vec2, r0: f32, c1: Vec2, r1: f32) -> CollisionData;

    fn circle_polygon(c: Vec2, r: f32, vertices: &[Vec2], normals: &[Vec2]) -> CollisionData;

    fn polygon_circle(vertices: &[Vec2], normals: &[Vec2], c: Vec2, r: f32) -> CollisionData;

    fn polygon_polygon(
        va: &[Vec2],
        na: &[Vec2],
        vb: &[Vec2],
        nb: &[Vec2],
    ) -> CollisionData;

    // Predicates ------------------------------------------------------------

    fn point_circle(p: Vec2, c: Vec2, r: f32) -> bool;

    fn point_polygon(p: Vec2, vertices: &[Vec2], normals: &[Vec2]) -> bool;

    fn circle_rect(c: Vec2, r: f32, top_left: Vec2, bottom_right: Vec2) -> bool;

    fn rect_polygon(top_left: Vec2, bottom_right: Vec2, vertices: &[Vec2], normals: &[Vec2])
    -> bool;

    // Distances -------------------------------------------------------------

    fn point_segment_distance(p: Vec2, a: Vec2, b: Vec2) -> f32;

    fn point_polygon_distance(p: Vec2, vertices: &[Vec2], normals: &[Vec2]) -> f32;
}
