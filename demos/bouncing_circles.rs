use glam::Vec2;
use rand::Rng;
use tiledphys::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

const GRAVITY: f32 = 60.0;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tiledphys=debug,bouncing_circles=info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let config = IntegratorConfig::from_ron("(physics_execution_count: 4, tile_size: 16.0)").expect("valid config");
    let bounds = Rect::from_size(320.0, 240.0);
    let mut layer = Layer::new(bounds, TiledIntegrator::new(config), SimContext::new(2024)).expect("layer");

    // Floor and walls: fixed boxes hugging the bounds.
    let walls = [
        (Vec2::new(160.0, 236.0), Vec2::new(160.0, 4.0)),
        (Vec2::new(4.0, 120.0), Vec2::new(4.0, 120.0)),
        (Vec2::new(316.0, 120.0), Vec2::new(4.0, 120.0)),
    ];
    for (centre, half) in walls {
        let shape = Shape::oabb(half).expect("box");
        let wall = Body::fixed(layer.ctx_mut(), centre, shape);
        layer.add(wall);
    }
    // A tilted ramp made of two boxes.
    let ramp = Shape::compound(vec![
        SubShape::new(Vec2::new(-20.0, 0.0), 0.0, Shape::oabb(Vec2::new(20.0, 3.0)).expect("box")),
        SubShape::new(Vec2::new(20.0, 0.0), 0.0, Shape::oabb(Vec2::new(20.0, 3.0)).expect("box")),
    ])
    .expect("compound");
    let mut ramp = Body::fixed(layer.ctx_mut(), Vec2::new(120.0, 160.0), ramp);
    ramp.orientation = 0.3;
    layer.add(ramp);

    let n = 400;
    for _ in 0..n {
        let rng = layer.ctx_mut().rng();
        let pos = Vec2::new(rng.random_range(20.0..300.0), rng.random_range(10.0..120.0));
        let vel = Vec2::new(rng.random_range(-40.0..40.0), rng.random_range(-20.0..20.0));
        let radius = rng.random_range(2.0..5.0);
        let body = Body::new(layer.ctx_mut(), pos, Shape::circle(radius), radius * radius).with_velocity(vel);
        layer.add(body);
    }

    let keys: Vec<EntityKey> = layer.keys().to_vec();
    for frame in 0..600 {
        let mut contacts = 0;
        for key in &keys {
            if let Some(body) = layer.get_mut(*key) {
                contacts += body.clear_contacts();
                let mass = body.mass;
                if let Some(mover) = body.mover.as_mut() {
                    mover.apply_force(Vec2::new(0.0, GRAVITY * mass));
                }
            }
        }
        layer.update(1.0 / 60.0);
        if frame % 60 == 0 {
            let s = layer.stats();
            let energy: f32 = layer.iter().map(|(_, b)| b.absorbed_energy).sum();
            info!(
                frame,
                pair_tests = s.pair_tests,
                collisions = s.collisions,
                contacts,
                tile_moves = s.tile_moves,
                occupied = s.occupied_tiles,
                absorbed = energy,
                "frame"
            );
        }
    }

    let resting = layer
        .iter()
        .filter(|(_, b)| b.mover.is_some() && b.velocity().length() < 5.0)
        .count();
    println!("entities={} resting={} clock={:.2}s", layer.len(), resting, layer.ctx().clock());
    if let Some(hit) = layer.entity_at(Vec2::new(160.0, 230.0)) {
        println!("entity under (160, 230): id={}", layer[hit].id);
    }
}
