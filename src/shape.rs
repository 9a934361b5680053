use glam::Vec2;
use smallvec::SmallVec;

use crate::api::NarrowphaseApi;
use crate::error::{Error, Result};
use crate::narrowphase::{Narrowphase, centroid};
use crate::types::{CollisionData, Rect};

type Vertices = SmallVec<[Vec2; 8]>;

/// World placement of a shape: the owning entity's position and orientation.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Pose {
    pub position: Vec2,
    /// Radians.
    pub orientation: f32,
}

impl Pose {
    pub fn new(position: Vec2, orientation: f32) -> Self {
        Self {
            position,
            orientation,
        }
    }

    pub fn at(position: Vec2) -> Self {
        Self::new(position, 0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.orientation.is_finite()
    }

    /// Pose of a sub-shape mounted at `offset` / `rotation` relative to this one.
    pub fn compose(&self, offset: Vec2, rotation: f32) -> Pose {
        Pose {
            position: self.position + Vec2::from_angle(self.orientation).rotate(offset),
            orientation: self.orientation + rotation,
        }
    }
}

#[derive(Clone, Debug)]
struct RotationCache {
    angle: f32,
    vertices: Vertices,
    normals: Vertices,
}

/// Convex polygon in local space with outward face normals.
#[derive(Clone, Debug)]
pub struct Polygon {
    vertices: Vertices,
    normals: Vertices,
    radius: f32,
    cache: Option<RotationCache>,
}

impl Polygon {
    /// Build from convex vertices in either winding order.
    pub fn new(vertices: impl IntoIterator<Item = Vec2>) -> Result<Self> {
        let vertices: Vertices = vertices.into_iter().collect();
        if vertices.len() < 3 {
            return Err(Error::DegenerateShape("polygon needs at least 3 vertices"));
        }
        if vertices.iter().any(|v| !v.is_finite()) {
            return Err(Error::DegenerateShape("polygon vertex is not finite"));
        }
        let center = centroid(&vertices);
        let n = vertices.len();
        let mut normals = Vertices::with_capacity(n);
        for i in 0..n {
            let a = vertices[i];
            let edge = vertices[(i + 1) % n] - a;
            let Some(mut normal) = Vec2::new(edge.y, -edge.x).try_normalize() else {
                return Err(Error::DegenerateShape("polygon has a zero-length edge"));
            };
            if (a - center).dot(normal) < 0.0 {
                normal = -normal;
            }
            normals.push(normal);
        }
        let radius = vertices.iter().map(|v| v.length()).fold(0.0, f32::max);
        Ok(Self {
            vertices,
            normals,
            radius,
            cache: None,
        })
    }

    /// Oriented box centred on the origin.
    pub fn oabb(half_extents: Vec2) -> Result<Self> {
        let h = half_extents;
        Self::new([
            Vec2::new(-h.x, -h.y),
            Vec2::new(h.x, -h.y),
            Vec2::new(h.x, h.y),
            Vec2::new(-h.x, h.y),
        ])
    }

    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    pub fn normals(&self) -> &[Vec2] {
        &self.normals
    }

    fn orient(&mut self, angle: f32) {
        if self.cache.as_ref().is_some_and(|c| c.angle == angle) {
            return;
        }
        let rot = Vec2::from_angle(angle);
        self.cache = Some(RotationCache {
            angle,
            vertices: self.vertices.iter().map(|v| rot.rotate(*v)).collect(),
            normals: self.normals.iter().map(|n| rot.rotate(*n)).collect(),
        });
    }

    fn scale(&mut self, factor: f32) {
        for v in &mut self.vertices {
            *v *= factor;
        }
        self.radius *= factor;
        self.cache = None;
    }

    /// World-space vertices and normals, from the cache when the angle matches.
    fn world(&self, pose: Pose) -> (Vertices, Vertices) {
        if let Some(cache) = self.cache.as_ref().filter(|c| c.angle == pose.orientation) {
            let verts = cache.vertices.iter().map(|v| *v + pose.position).collect();
            return (verts, cache.normals.clone());
        }
        let rot = Vec2::from_angle(pose.orientation);
        let verts = self
            .vertices
            .iter()
            .map(|v| rot.rotate(*v) + pose.position)
            .collect();
        let normals = self.normals.iter().map(|n| rot.rotate(*n)).collect();
        (verts, normals)
    }
}

/// A shape mounted inside a compound at a fixed offset and rotation.
#[derive(Clone, Debug)]
pub struct SubShape {
    pub offset: Vec2,
    pub rotation: f32,
    pub shape: Shape,
}

impl SubShape {
    pub fn new(offset: Vec2, rotation: f32, shape: Shape) -> Self {
        Self {
            offset,
            rotation,
            shape,
        }
    }
}

/// Geometric primitive attached to an entity.
#[derive(Clone, Debug)]
pub enum Shape {
    Circle { radius: f32 },
    Polygon(Polygon),
    Compound(Vec<SubShape>),
}

impl Shape {
    pub fn circle(radius: f32) -> Self {
        debug_assert!(radius >= 0.0, "negative circle radius");
        Shape::Circle { radius }
    }

    pub fn polygon(vertices: impl IntoIterator<Item = Vec2>) -> Result<Self> {
        Polygon::new(vertices).map(Shape::Polygon)
    }

    pub fn oabb(half_extents: Vec2) -> Result<Self> {
        Polygon::oabb(half_extents).map(Shape::Polygon)
    }

    pub fn compound(parts: Vec<SubShape>) -> Result<Self> {
        if parts.is_empty() {
            return Err(Error::DegenerateShape("compound shape without parts"));
        }
        Ok(Shape::Compound(parts))
    }

    /// Upper bound of the enclosing circle around the shape origin.
    pub fn rough_radius(&self) -> f32 {
        match self {
            Shape::Circle { radius } => *radius,
            Shape::Polygon(p) => p.radius,
            Shape::Compound(parts) => parts
                .iter()
                .map(|p| p.offset.length() + p.shape.rough_radius())
                .fold(0.0, f32::max),
        }
    }

    /// Refresh rotation caches for the given orientation.
    pub fn orient(&mut self, orientation: f32) {
        match self {
            Shape::Circle { .. } => {}
            Shape::Polygon(p) => p.orient(orientation),
            Shape::Compound(parts) => {
                for part in parts {
                    part.shape.orient(orientation + part.rotation);
                }
            }
        }
    }

    /// Uniform in-place scale; invalidates rotation caches.
    pub fn scale(&mut self, factor: f32) {
        match self {
            Shape::Circle { radius } => *radius *= factor,
            Shape::Polygon(p) => p.scale(factor),
            Shape::Compound(parts) => {
                for part in parts {
                    part.offset *= factor;
                    part.shape.scale(factor);
                }
            }
        }
    }

    pub fn in_shape(&self, pose: Pose, point: Vec2) -> bool {
        match self {
            Shape::Circle { radius } => Narrowphase::point_circle(point, pose.position, *radius),
            Shape::Polygon(p) => {
                let (v, n) = p.world(pose);
                Narrowphase::point_polygon(point, &v, &n)
            }
            Shape::Compound(parts) => parts
                .iter()
                .any(|part| part.shape.in_shape(pose.compose(part.offset, part.rotation), point)),
        }
    }

    /// `partial == false` requires full containment, `true` any overlap.
    pub fn in_rect(&self, pose: Pose, top_left: Vec2, bottom_right: Vec2, partial: bool) -> bool {
        match self {
            Shape::Circle { radius } => {
                let c = pose.position;
                if partial {
                    Narrowphase::circle_rect(c, *radius, top_left, bottom_right)
                } else {
                    let r = Vec2::splat(*radius);
                    (c - r).cmpge(top_left).all() && (c + r).cmple(bottom_right).all()
                }
            }
            Shape::Polygon(p) => {
                let (v, n) = p.world(pose);
                if partial {
                    Narrowphase::rect_polygon(top_left, bottom_right, &v, &n)
                } else {
                    let rect = Rect::new(top_left, bottom_right);
                    v.iter().all(|p| rect.contains(*p))
                }
            }
            Shape::Compound(parts) => {
                let mut sub = parts.iter().map(|part| {
                    part.shape.in_rect(
                        pose.compose(part.offset, part.rotation),
                        top_left,
                        bottom_right,
                        partial,
                    )
                });
                if partial {
                    sub.any(|hit| hit)
                } else {
                    sub.all(|hit| hit)
                }
            }
        }
    }

    /// Distance from `point` to the outline, 0 when inside.
    pub fn distance_to(&self, pose: Pose, point: Vec2) -> f32 {
        match self {
            Shape::Circle { radius } => (point.distance(pose.position) - radius).max(0.0),
            Shape::Polygon(p) => {
                let (v, n) = p.world(pose);
                Narrowphase::point_polygon_distance(point, &v, &n)
            }
            Shape::Compound(parts) => parts
                .iter()
                .map(|part| {
                    part.shape
                        .distance_to(pose.compose(part.offset, part.rotation), point)
                })
                .fold(f32::INFINITY, f32::min),
        }
    }

    pub fn bounding_rect(&self, pose: Pose) -> Rect {
        match self {
            Shape::Circle { radius } => {
                let r = Vec2::splat(*radius);
                Rect::new(pose.position - r, pose.position + r)
            }
            Shape::Polygon(p) => {
                let (v, _) = p.world(pose);
                let min = v.iter().copied().fold(Vec2::INFINITY, Vec2::min);
                let max = v.iter().copied().fold(Vec2::NEG_INFINITY, Vec2::max);
                Rect::new(min, max)
            }
            Shape::Compound(parts) => parts
                .iter()
                .map(|part| {
                    part.shape
                        .bounding_rect(pose.compose(part.offset, part.rotation))
                })
                .reduce(|a, b| {
                    Rect::new(a.top_left.min(b.top_left), a.bottom_right.max(b.bottom_right))
                })
                .unwrap_or(Rect::new(pose.position, pose.position)),
        }
    }

    /// Pairwise narrow-phase test. The normal of valid data points from `other` toward `self`.
    /// Non-finite poses never collide.
    pub fn collide(&self, pose: Pose, other: &Shape, other_pose: Pose) -> CollisionData {
        if !pose.is_finite() || !other_pose.is_finite() {
            return CollisionData::EMPTY;
        }
        let reach = self.rough_radius() + other.rough_radius();
        if pose.position.distance_squared(other_pose.position) > reach * reach {
            return CollisionData::EMPTY;
        }
        match (self, other) {
            (Shape::Circle { radius: r0 }, Shape::Circle { radius: r1 }) => {
                Narrowphase::circle_circle(pose.position, *r0, other_pose.position, *r1)
            }
            (Shape::Circle { radius }, Shape::Polygon(p)) => {
                let (v, n) = p.world(other_pose);
                Narrowphase::circle_polygon(pose.position, *radius, &v, &n)
            }
            (Shape::Polygon(p), Shape::Circle { radius }) => {
                let (v, n) = p.world(pose);
                Narrowphase::polygon_circle(&v, &n, other_pose.position, *radius)
            }
            (Shape::Polygon(pa), Shape::Polygon(pb)) => {
                let (va, na) = pa.world(pose);
                let (vb, nb) = pb.world(other_pose);
                Narrowphase::polygon_polygon(&va, &na, &vb, &nb)
            }
            (Shape::Compound(parts), _) => parts
                .iter()
                .map(|part| {
                    part.shape
                        .collide(pose.compose(part.offset, part.rotation), other, other_pose)
                })
                .fold(CollisionData::EMPTY, deepest),
            (_, Shape::Compound(parts)) => parts
                .iter()
                .map(|part| {
                    self.collide(pose, &part.shape, other_pose.compose(part.offset, part.rotation))
                })
                .fold(CollisionData::EMPTY, deepest),
        }
    }
}

fn deepest(best: CollisionData, candidate: CollisionData) -> CollisionData {
    if !candidate.is_valid() {
        return best;
    }
    if !best.is_valid() || candidate.interpenetration > best.interpenetration {
        candidate
    } else {
        best
    }
}
