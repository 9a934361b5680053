use glam::Vec2;

use crate::api::Entity;
use crate::context::SimContext;
use crate::mover::Mover;
use crate::shape::Shape;
use crate::types::*;

/// General-purpose entity for hosts that do not need their own type.
///
/// Collision filtering uses a [`LayerMask`] with mutual consent; contacts and
/// absorbed energy are tallied for the host to inspect.
#[derive(Clone, Debug)]
pub struct Body {
    pub id: u64,
    pub position: Vec2,
    pub orientation: f32,
    pub shape: Option<Shape>,
    pub mass: f32,
    pub mover: Option<Mover>,
    pub flags: EntityFlags,
    pub mask: LayerMask,
    pub update_behaviour: UpdateBehaviour,
    /// Contacts reported since the counter was last cleared.
    pub contacts: Vec<(EntityKey, CollisionData)>,
    pub absorbed_energy: f32,
}

impl Body {
    /// Dynamic body with a zero-velocity mover.
    pub fn new(ctx: &mut SimContext, position: Vec2, shape: Shape, mass: f32) -> Self {
        Self {
            id: ctx.next_entity_id(),
            position,
            orientation: 0.0,
            shape: Some(shape),
            mass,
            mover: Some(Mover::default()),
            flags: EntityFlags::default(),
            mask: LayerMask::ALL,
            update_behaviour: UpdateBehaviour::AlwaysUpdate,
            contacts: Vec::new(),
            absorbed_energy: 0.0,
        }
    }

    /// Immovable scenery: no mover, never integrated, never initiates.
    pub fn fixed(ctx: &mut SimContext, position: Vec2, shape: Shape) -> Self {
        Self {
            mover: None,
            flags: EntityFlags::passive(),
            update_behaviour: UpdateBehaviour::NeverUpdate,
            ..Self::new(ctx, position, shape, f32::INFINITY)
        }
    }

    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.mover.get_or_insert_with(Mover::default).velocity = velocity;
        self
    }

    pub fn with_flags(mut self, flags: EntityFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_mask(mut self, mask: LayerMask) -> Self {
        self.mask = mask;
        self
    }

    pub fn with_update_behaviour(mut self, behaviour: UpdateBehaviour) -> Self {
        self.update_behaviour = behaviour;
        self
    }

    pub fn velocity(&self) -> Vec2 {
        self.mover.map(|m| m.velocity).unwrap_or(Vec2::ZERO)
    }

    /// Drop the recorded contacts, returning how many there were.
    pub fn clear_contacts(&mut self) -> usize {
        let n = self.contacts.len();
        self.contacts.clear();
        n
    }

    pub fn destroy(&mut self) {
        self.flags.destroyed = true;
    }
}

impl Entity for Body {
    fn id(&self) -> u64 {
        self.id
    }

    fn position(&self) -> Vec2 {
        self.position
    }

    fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    fn orientation(&self) -> f32 {
        self.orientation
    }

    fn set_orientation(&mut self, orientation: f32) {
        self.orientation = orientation;
    }

    fn shape(&self) -> Option<&Shape> {
        self.shape.as_ref()
    }

    fn shape_mut(&mut self) -> Option<&mut Shape> {
        self.shape.as_mut()
    }

    fn flags(&self) -> EntityFlags {
        self.flags
    }

    fn mass(&self) -> f32 {
        self.mass
    }

    fn mover(&self) -> Option<&Mover> {
        self.mover.as_ref()
    }

    fn mover_mut(&mut self) -> Option<&mut Mover> {
        self.mover.as_mut()
    }

    fn update_behaviour(&self) -> UpdateBehaviour {
        self.update_behaviour
    }

    fn can_collide_with(&self, other: &Self) -> bool {
        self.mask.allows(other.mask)
    }

    fn after_collision_with(&mut self, other: EntityKey, data: &CollisionData, _ctx: &mut SimContext) {
        self.contacts.push((other, *data));
    }

    fn absorb_energy(&mut self, energy: f32) {
        self.absorbed_energy += energy;
    }
}
