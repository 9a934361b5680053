use glam::Vec2;
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use crate::error::{Error, Result};

new_key_type! {
    /// Stable handle of an entity inside its layer.
    pub struct EntityKey;
}

/// Axis-aligned world rectangle. `top_left` holds the minimum coordinates.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Rect {
    pub top_left: Vec2,
    pub bottom_right: Vec2,
}

impl Rect {
    pub fn new(top_left: Vec2, bottom_right: Vec2) -> Self {
        Self {
            top_left,
            bottom_right,
        }
    }

    /// Rectangle anchored at the origin.
    pub fn from_size(width: f32, height: f32) -> Self {
        Self::new(Vec2::ZERO, Vec2::new(width, height))
    }

    pub fn width(&self) -> f32 {
        self.bottom_right.x - self.top_left.x
    }

    pub fn height(&self) -> f32 {
        self.bottom_right.y - self.top_left.y
    }

    /// Inclusive containment test.
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.top_left.x
            && p.x <= self.bottom_right.x
            && p.y >= self.top_left.y
            && p.y <= self.bottom_right.y
    }

    /// Finite corners and a strictly positive area.
    pub fn is_valid(&self) -> bool {
        self.top_left.is_finite()
            && self.bottom_right.is_finite()
            && self.width() > 0.0
            && self.height() > 0.0
    }
}

/// Bitmask-based filtering.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LayerMask {
    /// Layer(s) this entity belongs to.
    pub layer: u32,
    /// Layers this entity wants to collide with.
    pub collides_with: u32,
    /// Extra mask to exclude (applied after `collides_with`).
    pub exclude: u32,
}

impl Default for LayerMask {
    fn default() -> Self {
        Self::ALL
    }
}

impl LayerMask {
    /// Member of every layer, collides with everything.
    pub const ALL: LayerMask = LayerMask {
        layer: u32::MAX,
        collides_with: u32::MAX,
        exclude: 0,
    };

    /// Convenience constructor.
    pub fn simple(layer: u32, collides_with: u32) -> Self {
        Self {
            layer,
            collides_with,
            exclude: 0,
        }
    }

    /// A may hit B iff `(A.collides_with & B.layer) != 0` AND `(A.exclude & B.layer) == 0`.
    /// The response stage checks both directions, so consent is mutual.
    pub fn allows(self, other: LayerMask) -> bool {
        let hit = (self.collides_with & other.layer) != 0;
        let blocked = (self.exclude & other.layer) != 0;
        hit && !blocked
    }
}

/// How often an entity is advanced by the integrator.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateBehaviour {
    #[default]
    AlwaysUpdate,
    /// Integrated only while inside the integrator's visible region (always, if none is set).
    UpdateWhenVisible,
    /// Permanently static: never integrated, never initiates a pair test.
    NeverUpdate,
}

/// Lifecycle and collision participation flags of an entity.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EntityFlags {
    pub destroyed: bool,
    /// Present in the world but excluded from collision interaction.
    pub ghost: bool,
    /// Actively searches for collisions with its neighbours.
    pub initiate_collision: bool,
    /// Can be hit by initiating entities.
    pub collidable: bool,
}

impl Default for EntityFlags {
    fn default() -> Self {
        Self {
            destroyed: false,
            ghost: false,
            initiate_collision: true,
            collidable: true,
        }
    }
}

impl EntityFlags {
    /// Static scenery: collidable, never initiates.
    pub fn passive() -> Self {
        Self {
            initiate_collision: false,
            ..Self::default()
        }
    }
}

/// Result of a pairwise narrow-phase test.
///
/// `interpenetration` is NaN when the shapes do not touch, see [`CollisionData::EMPTY`].
/// Valid data carries a unit `normal` pointing from `b` toward `a`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CollisionData {
    /// Representative contact point on the surface of `a`.
    pub position: Vec2,
    pub normal: Vec2,
    pub interpenetration: f32,
    pub a: Option<EntityKey>,
    pub b: Option<EntityKey>,
}

impl CollisionData {
    pub const EMPTY: CollisionData = CollisionData {
        position: Vec2::ZERO,
        normal: Vec2::ZERO,
        interpenetration: f32::NAN,
        a: None,
        b: None,
    };

    /// A NaN depth yields [`CollisionData::EMPTY`]; negative depths clamp to zero.
    pub fn new(position: Vec2, normal: Vec2, interpenetration: f32) -> Self {
        if interpenetration.is_nan() {
            return Self::EMPTY;
        }
        Self {
            position,
            normal,
            interpenetration: interpenetration.max(0.0),
            a: None,
            b: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.interpenetration.is_nan()
    }

    /// Same contact seen from the other side.
    pub fn flipped(&self) -> Self {
        Self {
            position: self.position,
            normal: -self.normal,
            interpenetration: self.interpenetration,
            a: self.b,
            b: self.a,
        }
    }

    pub fn with_entities(mut self, a: EntityKey, b: EntityKey) -> Self {
        self.a = Some(a);
        self.b = Some(b);
        self
    }
}

fn default_execution_count() -> u32 {
    1
}

fn default_tile_size() -> f32 {
    64.0
}

fn default_mass_ratio_limit() -> f32 {
    100.0
}

/// Constructor-time integrator parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntegratorConfig {
    /// Sub-steps per frame. Higher is more stable at proportional cost.
    #[serde(default = "default_execution_count")]
    pub physics_execution_count: u32,
    /// Grid cell edge length; should approximate the extent of the larger entities
    /// (within 2x). Zero collapses the grid into a single tile.
    #[serde(default = "default_tile_size")]
    pub tile_size: f32,
    /// Mass ratio above which the heavier body is treated as immovable.
    #[serde(default = "default_mass_ratio_limit")]
    pub mass_ratio_limit: f32,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            physics_execution_count: default_execution_count(),
            tile_size: default_tile_size(),
            mass_ratio_limit: default_mass_ratio_limit(),
        }
    }
}

impl IntegratorConfig {
    pub fn new(physics_execution_count: u32, tile_size: f32) -> Self {
        Self {
            physics_execution_count,
            tile_size,
            ..Self::default()
        }
    }

    /// Parse a RON document, e.g. `(physics_execution_count: 4, tile_size: 32.0)`.
    pub fn from_ron(text: &str) -> Result<Self> {
        let cfg: IntegratorConfig = ron::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.physics_execution_count == 0 {
            return Err(Error::InvalidConfig(
                "physics_execution_count must be at least 1".into(),
            ));
        }
        if !self.tile_size.is_finite() || self.tile_size < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "tile_size must be finite and non-negative, got {}",
                self.tile_size
            )));
        }
        if self.mass_ratio_limit.is_nan() || self.mass_ratio_limit < 1.0 {
            return Err(Error::InvalidConfig(format!(
                "mass_ratio_limit must be >= 1, got {}",
                self.mass_ratio_limit
            )));
        }
        Ok(())
    }
}

/// Counters for the last `update` call.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct IntegratorStats {
    pub entities: usize,
    pub tiles: usize,
    pub occupied_tiles: usize,
    /// Sub-steps executed.
    pub steps: usize,
    /// Candidate pairs handed to the narrow phase.
    pub pair_tests: usize,
    /// Pairs that passed filtering and received a response.
    pub collisions: usize,
    /// Tile membership changes.
    pub tile_moves: usize,
}
