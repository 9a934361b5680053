use glam::Vec2;
use rand::Rng;
use std::time::Instant;
use tiledphys::*;
use tracing_subscriber::EnvFilter;

fn populate<I: Integrator<Body>>(layer: &mut Layer<Body, I>, n: usize, size: f32) {
    for _ in 0..n {
        let rng = layer.ctx_mut().rng();
        let pos = Vec2::new(rng.random_range(0.0..size), rng.random_range(0.0..size));
        let vel = Vec2::new(rng.random_range(-20.0..20.0), rng.random_range(-20.0..20.0));
        let body = Body::new(layer.ctx_mut(), pos, Shape::circle(1.5), 1.0).with_velocity(vel);
        layer.add(body);
    }
}

fn run<I: Integrator<Body>>(label: &str, integrator: I, n: usize, size: f32, frames: usize) {
    let bounds = Rect::from_size(size, size);
    let mut layer = Layer::new(bounds, integrator, SimContext::new(1)).expect("layer");
    populate(&mut layer, n, size);
    let t0 = Instant::now();
    let mut pairs = 0usize;
    let mut hits = 0usize;
    for _ in 0..frames {
        layer.update(1.0 / 60.0);
        let s = layer.stats();
        pairs += s.pair_tests;
        hits += s.collisions;
    }
    let secs = t0.elapsed().as_secs_f64();
    println!(
        "{:<14} N={} frames={} secs={:.3} ms/frame={:.3} pair_tests/frame={} collisions/frame={}",
        label,
        n,
        frames,
        secs,
        secs * 1000.0 / frames as f64,
        pairs / frames,
        hits / frames
    );
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tiledphys=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let size = 1000.0;
    let frames = 120;
    for n in [1_000usize, 5_000, 20_000] {
        for tile in [4.0f32, 8.0, 16.0, 32.0] {
            let cfg = IntegratorConfig::new(1, tile);
            run(&format!("tiled/{tile}"), TiledIntegrator::new(cfg), n, size, frames);
        }
        if n <= 5_000 {
            let cfg = IntegratorConfig::new(1, 0.0);
            run("brute", BruteForceIntegrator::new(cfg), n, size, frames / 10);
        }
    }
}
