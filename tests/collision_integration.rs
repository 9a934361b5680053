/// Collision response through a full layer.
///
/// Test scenarios:
/// 1. Two overlapping circles in a 2x2 grid bounce apart
/// 2. Disjoint circles return the empty sentinel
/// 3. Mirrored narrow-phase calls agree on depth and flip the normal
/// 4. Every touching pair is resolved exactly once per sub-step
/// 5. Callbacks removing entities mid-iteration
/// 6. Tiled and brute-force integrators agree on isolated pairs

use glam::Vec2;
use tiledphys::{
    Body, BruteForceIntegrator, CollisionData, Entity, EntityFlags, EntityKey, Integrator,
    IntegratorConfig, Layer, Mover, Pose, Rect, Shape, SimContext, TiledIntegrator,
};

fn tiled_layer<E: Entity>(size: f32, tile: f32, steps: u32) -> Layer<E> {
    let integrator = TiledIntegrator::new(IntegratorConfig::new(steps, tile));
    Layer::new(Rect::from_size(size, size), integrator, SimContext::new(42)).unwrap()
}

fn spawn(layer: &mut Layer<Body>, pos: Vec2, radius: f32, velocity: Vec2) -> EntityKey {
    let body = Body::new(layer.ctx_mut(), pos, Shape::circle(radius), 1.0).with_velocity(velocity);
    layer.add(body)
}

#[test]
fn test_two_circles_bounce_apart() {
    let mut layer = tiled_layer::<Body>(20.0, 10.0, 1);
    assert_eq!(layer.integrator().grid().len(), 4);

    let a = spawn(&mut layer, Vec2::new(6.0, 10.0), 5.0, Vec2::new(1.0, 0.0));
    let b = spawn(&mut layer, Vec2::new(14.0, 10.0), 5.0, Vec2::new(-1.0, 0.0));

    let data = tiledphys::response::collide(&layer[a], &layer[b]);
    assert!(data.is_valid());
    assert!((data.interpenetration - 2.0).abs() < 1e-5);
    // From b's centre toward a's.
    assert!((data.normal - Vec2::new(-1.0, 0.0)).length() < 1e-6);

    layer.update(0.1);

    let (ea, eb) = (&layer[a], &layer[b]);
    assert_eq!(ea.contacts.len(), 1);
    assert_eq!(eb.contacts.len(), 1);
    assert!(ea.velocity().x < 0.0, "a should bounce back, got {:?}", ea.velocity());
    assert!(eb.velocity().x > 0.0, "b should bounce back, got {:?}", eb.velocity());
    let gap = eb.position.x - ea.position.x;
    assert!(gap >= 10.0 - 1e-4, "circles still overlap: gap {gap}");

    layer.update(0.1);
    assert!(layer[b].position.x - layer[a].position.x > 10.0);
}

#[test]
fn test_disjoint_circles_are_empty() {
    let c = Shape::circle(2.0);
    let data = c.collide(Pose::at(Vec2::ZERO), &c, Pose::at(Vec2::new(4.5, 0.0)));
    assert!(!data.is_valid());
    assert!(data.interpenetration.is_nan());
    assert_eq!(data.a, None);
    assert_eq!(data.normal, CollisionData::EMPTY.normal);

    // Exactly touching still counts, with zero depth.
    let touching = c.collide(Pose::at(Vec2::ZERO), &c, Pose::at(Vec2::new(4.0, 0.0)));
    assert!(touching.is_valid());
    assert!(touching.interpenetration.abs() < 1e-6);
}

#[test]
fn test_mirrored_collide_flips_normal() {
    let mut rng = fastrand::Rng::with_seed(7);
    let shapes = [
        Shape::circle(3.0),
        Shape::oabb(Vec2::new(4.0, 2.0)).unwrap(),
        Shape::polygon([Vec2::new(0.0, -3.0), Vec2::new(3.0, 2.0), Vec2::new(-3.0, 2.0)]).unwrap(),
    ];
    let mut checked = 0;
    for _ in 0..200 {
        let sa = &shapes[rng.usize(..shapes.len())];
        let sb = &shapes[rng.usize(..shapes.len())];
        let pa = Pose::new(Vec2::new(rng.f32() * 8.0, rng.f32() * 8.0), rng.f32() * 6.0);
        let pb = Pose::new(Vec2::new(rng.f32() * 8.0, rng.f32() * 8.0), rng.f32() * 6.0);
        let ab = sa.collide(pa, sb, pb);
        let ba = sb.collide(pb, sa, pa);
        assert_eq!(ab.is_valid(), ba.is_valid());
        if !ab.is_valid() {
            continue;
        }
        checked += 1;
        assert!((ab.interpenetration - ba.interpenetration).abs() < 1e-3);
        assert!((ab.normal + ba.normal).length() < 1e-3, "{ab:?} vs {ba:?}");
        assert!((ab.normal.length() - 1.0).abs() < 1e-4);
    }
    assert!(checked > 20, "too few overlapping samples: {checked}");
}

#[test]
fn test_each_pair_resolved_once_per_substep() {
    // One big tile: every pair is a neighbour pair.
    let mut layer = tiled_layer::<Body>(100.0, 100.0, 1);
    let mut rng = fastrand::Rng::with_seed(3);
    let keys: Vec<EntityKey> = (0..12)
        .map(|_| {
            let pos = Vec2::new(40.0 + rng.f32() * 20.0, 40.0 + rng.f32() * 20.0);
            spawn(&mut layer, pos, 6.0, Vec2::ZERO)
        })
        .collect();

    layer.update(0.01);

    let stats = layer.stats();
    assert_eq!(stats.pair_tests, keys.len() * (keys.len() - 1) / 2);
    assert!(stats.collisions > 0);
    for &k in &keys {
        let mut others: Vec<EntityKey> = layer[k].contacts.iter().map(|(o, _)| *o).collect();
        let before = others.len();
        others.sort();
        others.dedup();
        assert_eq!(before, others.len(), "a pair was resolved twice");
        for o in others {
            assert!(
                layer[o].contacts.iter().any(|(back, _)| *back == k),
                "contact reported on one side only"
            );
        }
    }
    let reported: usize = keys.iter().map(|k| layer[*k].contacts.len()).sum();
    assert_eq!(reported, stats.collisions * 2);
}

/// Wraps a body; hungry ones remove whatever they touch.
struct Eater {
    body: Body,
    hungry: bool,
    eaten: u32,
}

impl Entity for Eater {
    fn id(&self) -> u64 {
        self.body.id
    }
    fn position(&self) -> Vec2 {
        self.body.position
    }
    fn set_position(&mut self, position: Vec2) {
        self.body.position = position;
    }
    fn orientation(&self) -> f32 {
        self.body.orientation
    }
    fn set_orientation(&mut self, orientation: f32) {
        self.body.orientation = orientation;
    }
    fn shape(&self) -> Option<&Shape> {
        self.body.shape.as_ref()
    }
    fn shape_mut(&mut self) -> Option<&mut Shape> {
        self.body.shape.as_mut()
    }
    fn flags(&self) -> EntityFlags {
        self.body.flags
    }
    fn mass(&self) -> f32 {
        self.body.mass
    }
    fn mover(&self) -> Option<&Mover> {
        self.body.mover.as_ref()
    }
    fn mover_mut(&mut self) -> Option<&mut Mover> {
        self.body.mover.as_mut()
    }
    fn after_collision_with(&mut self, other: EntityKey, _data: &CollisionData, ctx: &mut SimContext) {
        if self.hungry {
            self.eaten += 1;
            ctx.remove_entity(other);
        }
    }
}

fn eater_layer<I: Integrator<Eater>>(integrator: I) -> (Layer<Eater, I>, Vec<EntityKey>) {
    let mut layer = Layer::new(Rect::from_size(100.0, 100.0), integrator, SimContext::new(1)).unwrap();
    // A row of touching circles, every other one hungry.
    let keys = (0..8)
        .map(|i| {
            let body = Body::new(
                layer.ctx_mut(),
                Vec2::new(10.0 + 3.0 * i as f32, 50.0),
                Shape::circle(2.0),
                1.0,
            );
            layer.add(Eater {
                body,
                hungry: i % 2 == 0,
                eaten: 0,
            })
        })
        .collect();
    (layer, keys)
}

fn check_eaters<I: Integrator<Eater>>(layer: &mut Layer<Eater, I>) {
    let before = layer.len();
    layer.update(0.01);
    let survivors = layer.len();
    assert_eq!(survivors, before / 2, "only the hungry should survive");
    assert!(layer.iter().all(|(_, e)| e.hungry));
    // Removed entities are gone from storage, list and tiles alike.
    assert_eq!(layer.keys().len(), survivors);
    for &k in layer.keys() {
        assert!(layer.contains(k));
    }
    let eaten: u32 = layer.iter().map(|(_, e)| e.eaten).sum();
    assert!(eaten as usize >= before - survivors);
}

#[test]
fn test_callback_removal_tiled() {
    let (mut layer, _) = eater_layer(TiledIntegrator::new(IntegratorConfig::new(2, 8.0)));
    check_eaters(&mut layer);
    let grid = layer.integrator().grid();
    assert_eq!(grid.total_entries(), layer.len());
}

#[test]
fn test_callback_removal_brute_force() {
    let (mut layer, _) = eater_layer(BruteForceIntegrator::new(IntegratorConfig::new(2, 8.0)));
    check_eaters(&mut layer);
}

fn scatter_pairs<I: Integrator<Body>>(integrator: I) -> (Layer<Body, I>, Vec<EntityKey>) {
    let mut layer = Layer::new(Rect::from_size(400.0, 400.0), integrator, SimContext::new(9)).unwrap();
    let mut rng = fastrand::Rng::with_seed(11);
    let mut keys = Vec::new();
    for row in 0..8 {
        for col in 0..8 {
            let centre = Vec2::new(25.0 + 50.0 * col as f32, 25.0 + 50.0 * row as f32);
            let jitter = Vec2::new(rng.f32() - 0.5, rng.f32() - 0.5);
            let speed = 2.0 + rng.f32() * 4.0;
            let mass = 1.0 + rng.f32() * 3.0;
            let a = Body::new(layer.ctx_mut(), centre - Vec2::new(3.5, 0.0) + jitter, Shape::circle(2.0), mass)
                .with_velocity(Vec2::new(speed, 0.0));
            let b = Body::new(layer.ctx_mut(), centre + Vec2::new(3.5, 0.0), Shape::circle(2.0), 1.0)
                .with_velocity(Vec2::new(-speed, 0.0));
            keys.push(layer.add(a));
            keys.push(layer.add(b));
        }
    }
    (layer, keys)
}

#[test]
fn test_tiled_agrees_with_brute_force() {
    let (mut tiled, tk) = scatter_pairs(TiledIntegrator::new(IntegratorConfig::new(2, 16.0)));
    let (mut brute, bk) = scatter_pairs(BruteForceIntegrator::new(IntegratorConfig::new(2, 16.0)));

    let mut tiled_hits = 0;
    let mut brute_hits = 0;
    for _ in 0..20 {
        tiled.update(0.05);
        brute.update(0.05);
        tiled_hits += tiled.stats().collisions;
        brute_hits += brute.stats().collisions;
    }
    assert!(tiled_hits > 0);
    assert_eq!(tiled_hits, brute_hits);
    assert!(tiled.stats().pair_tests < brute.stats().pair_tests);

    for (t, b) in tk.iter().zip(&bk) {
        let (t, b) = (&tiled[*t], &brute[*b]);
        assert!(
            (t.position - b.position).length() < 1e-3,
            "tiled {:?} vs brute {:?}",
            t.position,
            b.position
        );
        assert!((t.velocity() - b.velocity()).length() < 1e-3);
        assert_eq!(t.contacts.len(), b.contacts.len());
    }
}
