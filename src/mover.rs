use glam::Vec2;

use crate::types::CollisionData;

pub const DEFAULT_RESTITUTION: f32 = 0.8;

/// Velocity-carrying aspect of an entity.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Mover {
    pub velocity: Vec2,
    /// Radians per second.
    pub angular_velocity: f32,
    /// External force accumulated since the last integration.
    pub force: Vec2,
    /// Fraction of the approaching normal speed kept after an impact.
    pub restitution: f32,
}

impl Default for Mover {
    fn default() -> Self {
        Self {
            velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            force: Vec2::ZERO,
            restitution: DEFAULT_RESTITUTION,
        }
    }
}

fn kinetic_energy(mass: f32, velocity: Vec2) -> f32 {
    0.5 * mass * velocity.length_squared()
}

impl Mover {
    pub fn with_velocity(velocity: Vec2) -> Self {
        Self {
            velocity,
            ..Self::default()
        }
    }

    pub fn apply_force(&mut self, force: Vec2) {
        self.force += force;
    }

    /// Semi-implicit Euler step. Consumes the accumulated force.
    pub fn integrate(&mut self, position: &mut Vec2, orientation: &mut f32, mass: f32, dt: f32) {
        if mass > 0.0 {
            self.velocity += self.force / mass * dt;
        }
        *position += self.velocity * dt;
        *orientation += self.angular_velocity * dt;
        self.force = Vec2::ZERO;
    }

    /// Push `position` out of the contact by `factor` of the interpenetration
    /// along the normal. The sign of `factor` selects the side.
    pub fn respond_to_collision(&self, position: &mut Vec2, data: &CollisionData, factor: f32) {
        *position += data.normal * data.interpenetration * factor;
    }

    /// Reflect the approaching normal component against an immovable body.
    /// `normal` points from the obstacle toward this mover. Returns the kinetic energy lost.
    pub fn bounce(&mut self, mass: f32, normal: Vec2) -> f32 {
        let vn = self.velocity.dot(normal);
        if vn >= 0.0 {
            return 0.0;
        }
        let before = kinetic_energy(mass, self.velocity);
        self.velocity -= (1.0 + self.restitution) * vn * normal;
        (before - kinetic_energy(mass, self.velocity)).max(0.0)
    }

    /// Exchange momentum along `normal` (pointing from `other` toward `self`).
    /// Returns the kinetic energy dissipated.
    pub fn transfer_energy(
        &mut self,
        mass: f32,
        other: &mut Mover,
        other_mass: f32,
        normal: Vec2,
    ) -> f32 {
        if mass <= 0.0 || other_mass <= 0.0 {
            return 0.0;
        }
        let vn = (self.velocity - other.velocity).dot(normal);
        if vn >= 0.0 {
            return 0.0;
        }
        let before = kinetic_energy(mass, self.velocity) + kinetic_energy(other_mass, other.velocity);
        let e = 0.5 * (self.restitution + other.restitution);
        let j = -(1.0 + e) * vn / (1.0 / mass + 1.0 / other_mass);
        self.velocity += normal * (j / mass);
        other.velocity -= normal * (j / other_mass);
        let after = kinetic_energy(mass, self.velocity) + kinetic_energy(other_mass, other.velocity);
        (before - after).max(0.0)
    }
}
