use glam::Vec2;
use rand::Rng;
use tiledphys::*;
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tiledphys=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = IntegratorConfig::from_ron("(tile_size: 25.0, mass_ratio_limit: 50.0)").expect("valid config");
    let mut layer = Layer::new(Rect::from_size(500.0, 500.0), TiledIntegrator::new(config), SimContext::new(9)).expect("layer");

    for _ in 0..1_000 {
        let rng = layer.ctx_mut().rng();
        let pos = Vec2::new(rng.random_range(0.0..500.0), rng.random_range(0.0..500.0));
        let vel = Vec2::new(rng.random_range(-10.0..10.0), rng.random_range(-10.0..10.0));
        let body = Body::new(layer.ctx_mut(), pos, Shape::circle(3.0), 1.0).with_velocity(vel);
        layer.add(body);
    }
    for _ in 0..30 {
        layer.update(1.0 / 30.0);
    }
    let s = layer.stats();
    println!("before: entities={} tiles={} occupied={}", s.entities, s.tiles, s.occupied_tiles);

    let dropped = layer.change_size(Rect::from_size(250.0, 300.0), true).expect("bounds");
    let s = layer.stats();
    println!(
        "shrunk: dropped={} entities={} tiles={} occupied={}",
        dropped.len(),
        s.entities,
        s.tiles,
        s.occupied_tiles
    );

    let kept = layer.change_size(Rect::new(Vec2::new(-100.0, -100.0), Vec2::new(400.0, 400.0)), false).expect("bounds");
    let s = layer.stats();
    println!("grown: dropped={} entities={} tiles={}", kept.len(), s.entities, s.tiles);

    let in_view = layer.entities_in_rect(Vec2::new(0.0, 0.0), Vec2::new(100.0, 100.0), true);
    println!("entities touching the top-left 100x100: {}", in_view.len());
    if let Some(key) = layer.entity_close_to(Vec2::new(50.0, 50.0), 20.0) {
        println!("near (50, 50): {:?}", layer[key].position);
    }
}
