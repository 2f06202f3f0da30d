//! Headless bouncing-boxes demo: a few thousand boxes in a closed arena,
//! stepped with broad phase + per-pair impulse resolution.

use clonk::{PhysicsWorldApi, World};
use glam::Vec2;

const ARENA_W: f32 = 1280.0;
const ARENA_H: f32 = 720.0;
const BOX_COUNT: usize = 3600;
const STEPS: usize = 600;
const DT: f32 = 1.0 / 60.0;

fn lcg(seed: &mut u32) -> u32 {
    *seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
    *seed
}

fn rand_f32(seed: &mut u32, min: f32, max: f32) -> f32 {
    min + (lcg(seed) as f32 / u32::MAX as f32) * (max - min)
}

fn main() {
    let mut world = World::new(1.0);
    world.enable_timing = true;

    let mut seed = 0x5eed_u32;
    let mut keys = Vec::with_capacity(BOX_COUNT);
    for _ in 0..BOX_COUNT {
        let half = rand_f32(&mut seed, 1.0, 2.5);
        let center = Vec2::new(
            rand_f32(&mut seed, half, ARENA_W - half),
            rand_f32(&mut seed, half, ARENA_H - half),
        );
        let invmass = 1.0 / (half * half * 4.0);
        let key = world.create(center, Vec2::splat(half), invmass, 1.0, 0.0, 0.0);
        world.get_mut(key).unwrap().vel = Vec2::new(
            rand_f32(&mut seed, -60.0, 60.0),
            rand_f32(&mut seed, -60.0, 60.0),
        );
        keys.push(key);
    }

    for step in 0..STEPS {
        for key in &keys {
            let entry = world.get_mut(*key).unwrap();
            entry.coll.center += entry.vel * DT;

            // keep everything inside the arena
            let half = entry.coll.halfexts;
            if entry.coll.center.x - half.x < 0.0 {
                entry.coll.center.x = half.x;
                entry.vel.x = -entry.vel.x;
            }
            if entry.coll.center.x + half.x > ARENA_W {
                entry.coll.center.x = ARENA_W - half.x;
                entry.vel.x = -entry.vel.x;
            }
            if entry.coll.center.y - half.y < 0.0 {
                entry.coll.center.y = half.y;
                entry.vel.y = -entry.vel.y;
            }
            if entry.coll.center.y + half.y > ARENA_H {
                entry.coll.center.y = ARENA_H - half.y;
                entry.vel.y = -entry.vel.y;
            }
        }

        world.update(DT);
        let pairs = world.collided_pairs().to_vec();
        for (k0, k1) in &pairs {
            if world.is_collided(*k0, *k1) {
                world.resolve_collider(*k0, *k1);
            }
        }

        if step % 60 == 0 {
            let stats = world.stats();
            let timing = world.timing().unwrap_or_default();
            println!(
                "step={} pairs={} nodes={} update={:.3}ms (refit={:.3}ms pairs={:.3}ms)",
                step,
                stats.cached_pairs,
                stats.tree_nodes,
                timing.update_ms,
                timing.refit_ms,
                timing.pairs_ms
            );
        }
    }
}
