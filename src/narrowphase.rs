use glam::Vec2;

use crate::api::NarrowphaseApi;
use crate::types::*;

/// Normal reported when the geometry defines none (coincident centres, zero-length axes).
///
/// It does not depend on operand order, so for coincident shapes `collide(b, a)` reports
/// the same normal as `collide(a, b)` rather than its negation.
pub const DEFAULT_NORMAL: Vec2 = Vec2::NEG_Y;

/// Overlaps closer than this are treated as ties when picking the separating axis.
const AXIS_TIE_EPS: f32 = 1e-6;

/// Narrowphase primitive tests.
pub struct Narrowphase;

fn project(vertices: &[Vec2], axis: Vec2) -> (f32, f32) {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for v in vertices {
        let d = v.dot(axis);
        min = min.min(d);
        max = max.max(d);
    }
    (min, max)
}

pub(crate) fn centroid(vertices: &[Vec2]) -> Vec2 {
    if vertices.is_empty() {
        return Vec2::ZERO;
    }
    vertices.iter().copied().sum::<Vec2>() / vertices.len() as f32
}

/// Vertex furthest along `dir`.
fn support(vertices: &[Vec2], dir: Vec2) -> Vec2 {
    let mut best = vertices[0];
    let mut best_d = best.dot(dir);
    for &v in &vertices[1..] {
        let d = v.dot(dir);
        if d > best_d {
            best = v;
            best_d = d;
        }
    }
    best
}

/// Order-independent preference between two axes with equal overlap, so that
/// swapping the operands picks the same axis.
fn prefer_axis(candidate: Vec2, current: Vec2) -> bool {
    let c = (candidate.x.abs(), candidate.y.abs());
    let k = (current.x.abs(), current.y.abs());
    c > k
}

/// Tracks the axis of minimum separation depth across a SAT pass.
struct MinAxis {
    depth: f32,
    axis: Vec2,
    /// Set when pushing A either way along `axis` costs the same; the sign is then
    /// taken from the centre offset.
    undirected: bool,
}

impl MinAxis {
    fn new() -> Self {
        Self {
            depth: f32::INFINITY,
            axis: DEFAULT_NORMAL,
            undirected: true,
        }
    }

    /// Offer the projections of A and B on `axis`. Returns false if they are disjoint.
    fn offer(&mut self, axis: Vec2, (amin, amax): (f32, f32), (bmin, bmax): (f32, f32)) -> bool {
        // Distance A must travel along +axis, respectively -axis, to clear B.
        let forward = bmax - amin;
        let backward = amax - bmin;
        if forward < 0.0 || backward < 0.0 {
            return false;
        }
        let (depth, axis, undirected) = if (forward - backward).abs() <= AXIS_TIE_EPS {
            (forward.min(backward), axis, true)
        } else if forward < backward {
            (forward, axis, false)
        } else {
            (backward, -axis, false)
        };
        if depth < self.depth - AXIS_TIE_EPS
            || ((depth - self.depth).abs() <= AXIS_TIE_EPS && prefer_axis(axis, self.axis))
        {
            self.depth = depth;
            self.axis = axis;
            self.undirected = undirected;
        }
        true
    }

    /// Normal pointing from B into A. An undirected axis is signed along `from_b_to_a`,
    /// or by a stable fallback if that is degenerate.
    fn normal(&self, from_b_to_a: Vec2) -> Vec2 {
        if !self.undirected {
            return self.axis;
        }
        let d = from_b_to_a.dot(self.axis);
        if d < 0.0 {
            -self.axis
        } else if d > 0.0 {
            self.axis
        } else if self.axis.dot(DEFAULT_NORMAL) < 0.0 {
            -self.axis
        } else {
            self.axis
        }
    }
}

impl NarrowphaseApi for Narrowphase {
    fn circle_circle(c0: Vec2, r0: f32, c1: Vec2, r1: f32) -> CollisionData {
        let delta = c0 - c1;
        let dist2 = delta.length_squared();
        let rsum = r0 + r1;
        if dist2 > rsum * rsum {
            return CollisionData::EMPTY;
        }
        if dist2 == 0.0 {
            // Coincident centres: any direction separates them equally well.
            return CollisionData::new(c0 - DEFAULT_NORMAL * r0, DEFAULT_NORMAL, rsum);
        }
        let dist = dist2.sqrt();
        let normal = delta / dist; // from B into A
        CollisionData::new(c0 - normal * r0, normal, rsum - dist)
    }

    fn circle_polygon(c: Vec2, r: f32, vertices: &[Vec2], normals: &[Vec2]) -> CollisionData {
        let mut min = MinAxis::new();

        for &n in normals {
            let cd = c.dot(n);
            if !min.offer(n, (cd - r, cd + r), project(vertices, n)) {
                return CollisionData::EMPTY;
            }
        }

        // Axis towards the closest vertex covers the rounded corner regions.
        let closest = vertices
            .iter()
            .copied()
            .min_by(|a, b| a.distance_squared(c).total_cmp(&b.distance_squared(c)));
        if let Some(v) = closest {
            let axis = c - v;
            let len = axis.length();
            if len > f32::EPSILON {
                let n = axis / len;
                let cd = c.dot(n);
                if !min.offer(n, (cd - r, cd + r), project(vertices, n)) {
                    return CollisionData::EMPTY;
                }
            }
        }

        let normal = min.normal(c - centroid(vertices));
        CollisionData::new(c - normal * r, normal, min.depth)
    }

    fn polygon_circle(vertices: &[Vec2], normals: &[Vec2], c: Vec2, r: f32) -> CollisionData {
        let hit = Self::circle_polygon(c, r, vertices, normals);
        if !hit.is_valid() {
            return hit;
        }
        // Contact on the polygon side: the circle's deepest point.
        CollisionData::new(hit.position, -hit.normal, hit.interpenetration)
    }

    fn polygon_polygon(va: &[Vec2], na: &[Vec2], vb: &[Vec2], nb: &[Vec2]) -> CollisionData {
        let mut min = MinAxis::new();
        for &n in na.iter().chain(nb) {
            if !min.offer(n, project(va, n), project(vb, n)) {
                return CollisionData::EMPTY;
            }
        }
        let normal = min.normal(centroid(va) - centroid(vb));
        // Deepest vertex of B inside A.
        let contact = support(vb, normal);
        CollisionData::new(contact, normal, min.depth)
    }

    fn point_circle(p: Vec2, c: Vec2, r: f32) -> bool {
        (p - c).length_squared() <= r * r
    }

    fn point_polygon(p: Vec2, vertices: &[Vec2], normals: &[Vec2]) -> bool {
        vertices
            .iter()
            .zip(normals)
            .all(|(&v, &n)| (p - v).dot(n) <= 0.0)
    }

    fn circle_rect(c: Vec2, r: f32, top_left: Vec2, bottom_right: Vec2) -> bool {
        // Bounding boxes must overlap first.
        if c.x + r < top_left.x
            || c.x - r > bottom_right.x
            || c.y + r < top_left.y
            || c.y - r > bottom_right.y
        {
            return false;
        }
        let in_x = c.x >= top_left.x && c.x <= bottom_right.x;
        let in_y = c.y >= top_left.y && c.y <= bottom_right.y;
        if in_x || in_y {
            return true;
        }
        // Centre sits in a corner region: the circle must reach that corner.
        let corner = Vec2::new(
            if c.x < top_left.x { top_left.x } else { bottom_right.x },
            if c.y < top_left.y { top_left.y } else { bottom_right.y },
        );
        Self::point_circle(corner, c, r)
    }

    fn rect_polygon(
        top_left: Vec2,
        bottom_right: Vec2,
        vertices: &[Vec2],
        normals: &[Vec2],
    ) -> bool {
        let rect = [
            top_left,
            Vec2::new(bottom_right.x, top_left.y),
            bottom_right,
            Vec2::new(top_left.x, bottom_right.y),
        ];
        for n in [Vec2::X, Vec2::Y].iter().chain(normals) {
            let (amin, amax) = project(&rect, *n);
            let (bmin, bmax) = project(vertices, *n);
            if amax < bmin || bmax < amin {
                return false;
            }
        }
        true
    }

    fn point_segment_distance(p: Vec2, a: Vec2, b: Vec2) -> f32 {
        let ab = b - a;
        let len2 = ab.length_squared();
        if len2 == 0.0 {
            return p.distance(a);
        }
        let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
        p.distance(a + ab * t)
    }

    fn point_polygon_distance(p: Vec2, vertices: &[Vec2], normals: &[Vec2]) -> f32 {
        if Self::point_polygon(p, vertices, normals) {
            return 0.0;
        }
        let n = vertices.len();
        (0..n)
            .map(|i| Self::point_segment_distance(p, vertices[i], vertices[(i + 1) % n]))
            .fold(f32::INFINITY, f32::min)
    }
}
