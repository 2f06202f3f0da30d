use clonk::{PhysicsWorldApi, World};
use glam::Vec2;
use std::time::Instant;

fn lcg(seed: &mut u32) -> u32 {
    *seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
    *seed
}

fn main() {
    let n = 20_000usize;
    let mut world = World::new(0.5);
    world.enable_timing = true;

    let mut seed = 1u32;
    let mut keys = Vec::with_capacity(n);
    let t_build = Instant::now();
    for _ in 0..n {
        let rx = (lcg(&mut seed) as f32 / u32::MAX as f32) * 200.0 - 100.0;
        let ry = (lcg(&mut seed) as f32 / u32::MAX as f32) * 200.0 - 100.0;
        let key = world.create(Vec2::new(rx, ry), Vec2::splat(0.5), 1.0, 1.0, 0.0, 0.0);
        let vx = (lcg(&mut seed) as f32 / u32::MAX as f32) * 4.0 - 2.0;
        let vy = (lcg(&mut seed) as f32 / u32::MAX as f32) * 4.0 - 2.0;
        world.get_mut(key).unwrap().vel = Vec2::new(vx, vy);
        keys.push(key);
    }
    let build_ms = t_build.elapsed().as_secs_f64() * 1000.0;

    // first update pays for nothing (fresh fat AABBs); the second pays for a
    // full refit after every body moved
    world.update(1.0 / 60.0);
    for key in &keys {
        let entry = world.get_mut(*key).unwrap();
        entry.coll.center += entry.vel * (1.0 / 60.0);
    }
    world.update(1.0 / 60.0);

    let stats = world.stats();
    let timing = world.timing().unwrap_or_default();
    println!(
        "N={} build={:.3}ms update={:.3}ms (refit={:.3}ms pairs={:.3}ms) pairs={} nodes={}",
        n, build_ms, timing.update_ms, timing.refit_ms, timing.pairs_ms, stats.cached_pairs, stats.tree_nodes
    );
}
