use glam::Vec2;

use std::time::Instant;

use crate::aabb::{Aabb, Collider};
use crate::api::PhysicsWorldApi;
use crate::slotmap::{Key, SlotMap};
use crate::solver;
use crate::tree::AabbTree;

/// A physical body: centered box, velocity, mass/material parameters, and the
/// arena index of its broad-phase leaf.
#[derive(Copy, Clone, Debug)]
pub struct Entry {
    pub coll: Collider,
    pub vel: Vec2,

    /// Inverse mass; 0 means infinite mass (immovable).
    pub invmass: f32,
    pub restitution: f32,
    pub sfriction: f32,
    pub dfriction: f32,

    /// Back-reference to this entry's tree leaf; set on insert, cleared on
    /// remove. Owned by the tree, not the entry.
    pub node: Option<u32>,
}

impl Entry {
    /// Unit-mass, fully elastic, frictionless body.
    pub fn new(center: Vec2, halfexts: Vec2) -> Self {
        Self {
            coll: Collider::new(center, halfexts),
            vel: Vec2::ZERO,
            invmass: 1.0,
            restitution: 1.0,
            sfriction: 0.0,
            dfriction: 0.0,
            node: None,
        }
    }
}

/// Stable-handle storage for entries.
pub type EntrySet = SlotMap<Entry>;

/// Snapshot counters for the current world state.
#[derive(Copy, Clone, Debug, Default)]
pub struct WorldStats {
    pub entries: usize,
    /// Live tree nodes, internal nodes included.
    pub tree_nodes: usize,
    pub cached_pairs: usize,
}

/// Timing breakdown for the last `update`, present when `enable_timing` is
/// set.
#[derive(Copy, Clone, Debug, Default)]
pub struct WorldTiming {
    pub update_ms: f64,
    pub refit_ms: f64,
    pub pairs_ms: f64,
}

/// Persistent physics world: an entry set bound to a dynamic AABB tree, plus
/// the cached broad-phase pair list for the current step.
pub struct World {
    /// Leaf fattening margin; raising it trades broad-phase false positives
    /// for fewer refit reinsertions.
    pub margin: f32,
    pub enable_timing: bool,

    entries: EntrySet,
    tree: AabbTree,
    /// Sorted `(min, max)` key pairs from the last `update`.
    collided: Vec<(Key, Key)>,
    last_timing: Option<WorldTiming>,
}

impl PhysicsWorldApi for World {
    fn new(margin: f32) -> Self {
        Self {
            margin,
            enable_timing: false,
            entries: EntrySet::new(),
            tree: AabbTree::new(),
            collided: Vec::new(),
            last_timing: None,
        }
    }

    fn create(
        &mut self,
        center: Vec2,
        halfexts: Vec2,
        invmass: f32,
        restitution: f32,
        sfriction: f32,
        dfriction: f32,
    ) -> Key {
        self.create_in_group(center, halfexts, invmass, restitution, sfriction, dfriction, 0)
    }

    fn create_in_group(
        &mut self,
        center: Vec2,
        halfexts: Vec2,
        invmass: f32,
        restitution: f32,
        sfriction: f32,
        dfriction: f32,
        group: u8,
    ) -> Key {
        debug_assert!(halfexts.cmpgt(Vec2::ZERO).all(), "halfexts must be positive");
        debug_assert!(invmass >= 0.0);
        let key = self.entries.insert(Entry {
            coll: Collider::new(center, halfexts),
            vel: Vec2::ZERO,
            invmass,
            restitution,
            sfriction,
            dfriction,
            node: None,
        });
        self.tree.insert(&mut self.entries, key, group, self.margin);
        key
    }

    fn destroy(&mut self, key: Key) -> bool {
        self.tree.remove(&mut self.entries, key);
        self.entries.erase(key)
    }

    fn get(&self, key: Key) -> Option<&Entry> {
        self.entries.at(key)
    }

    fn get_mut(&mut self, key: Key) -> Option<&mut Entry> {
        self.entries.at_mut(key)
    }

    fn update(&mut self, _dt: f32) {
        let t_all = self.enable_timing.then(Instant::now);

        let t0 = self.enable_timing.then(Instant::now);
        self.tree.refit(&self.entries, self.margin);
        let refit_ms = t0.map(|t| t.elapsed().as_secs_f64() * 1000.0).unwrap_or(0.0);

        let t1 = self.enable_timing.then(Instant::now);
        self.collided = self.tree.overlapping_pairs();
        let pairs_ms = t1.map(|t| t.elapsed().as_secs_f64() * 1000.0).unwrap_or(0.0);

        log::trace!(
            "update: {} entries, {} cached pairs",
            self.entries.len(),
            self.collided.len()
        );
        self.last_timing = t_all.map(|t| WorldTiming {
            update_ms: t.elapsed().as_secs_f64() * 1000.0,
            refit_ms,
            pairs_ms,
        });
    }

    fn is_collided(&self, k0: Key, k1: Key) -> bool {
        let pair = if k0 <= k1 { (k0, k1) } else { (k1, k0) };
        if self.collided.binary_search(&pair).is_err() {
            return false;
        }
        match (self.entries.at(pair.0), self.entries.at(pair.1)) {
            (Some(a), Some(b)) => a.coll.aabb().intersects(&b.coll.aabb()),
            _ => false,
        }
    }

    fn resolve_collider(&mut self, k0: Key, k1: Key) {
        if let Some((a, b)) = self.entries.at_pair_mut(k0, k1) {
            solver::resolve(a, b);
        }
    }

    fn entry_swept_aabb(&self, key: Key, dt: f32) -> Option<Aabb> {
        let entry = self.entries.at(key)?;
        let tight = entry.coll.aabb();
        Some(tight.merge(&tight.translate(entry.vel * dt)))
    }
}

impl World {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The sorted pair cache from the last `update`.
    pub fn collided_pairs(&self) -> &[(Key, Key)] {
        &self.collided
    }

    pub fn stats(&self) -> WorldStats {
        WorldStats {
            entries: self.entries.len(),
            tree_nodes: self.tree.node_count(),
            cached_pairs: self.collided.len(),
        }
    }

    /// Timing for the last `update`, if `enable_timing` was set.
    pub fn timing(&self) -> Option<WorldTiming> {
        self.last_timing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_world(margin: f32) -> World {
        let mut w = World::new(margin);
        w.enable_timing = false;
        w
    }

    fn create_square(w: &mut World, x: f32, y: f32) -> Key {
        w.create(Vec2::new(x, y), Vec2::ONE, 1.0, 1.0, 0.0, 0.0)
    }

    #[test]
    fn test_create_get_destroy() {
        let mut w = square_world(0.0);
        let k = create_square(&mut w, 1.0, 2.0);
        assert_eq!(w.len(), 1);
        let e = w.get(k).unwrap();
        assert_eq!(e.coll.center, Vec2::new(1.0, 2.0));
        assert!(e.node.is_some());

        assert!(w.destroy(k));
        assert_eq!(w.len(), 0);
        assert!(w.get(k).is_none());
        assert!(!w.destroy(k));
        assert_eq!(w.stats().tree_nodes, 0);
    }

    #[test]
    fn test_pair_cache_and_is_collided() {
        // only the two near squares collide.
        let mut w = square_world(0.0);
        let k0 = create_square(&mut w, 0.0, 0.0);
        let k1 = create_square(&mut w, 0.5, 0.0);
        let k2 = create_square(&mut w, 10.0, 10.0);
        w.update(1.0 / 60.0);

        assert_eq!(w.collided_pairs().len(), 1);
        assert!(w.is_collided(k0, k1));
        assert!(w.is_collided(k1, k0));
        assert!(!w.is_collided(k0, k2));
        assert!(!w.is_collided(k1, k2));
    }

    #[test]
    fn test_is_collided_rechecks_tight_aabbs() {
        let mut w = square_world(2.0);
        let k0 = create_square(&mut w, 0.0, 0.0);
        let k1 = create_square(&mut w, 2.5, 0.0);
        w.update(1.0 / 60.0);
        // fat AABBs overlap, tight ones do not
        assert_eq!(w.collided_pairs().len(), 1);
        assert!(!w.is_collided(k0, k1));

        // once the entries actually touch, the same cache answers true
        w.get_mut(k1).unwrap().coll.center = Vec2::new(1.5, 0.0);
        assert!(w.is_collided(k0, k1));
    }

    #[test]
    fn test_is_collided_survives_destroy_without_update() {
        let mut w = square_world(0.0);
        let k0 = create_square(&mut w, 0.0, 0.0);
        let k1 = create_square(&mut w, 0.5, 0.0);
        w.update(1.0 / 60.0);
        assert!(w.is_collided(k0, k1));
        w.destroy(k1);
        // stale cache entry resolves to a dead handle, not a hit
        assert!(!w.is_collided(k0, k1));
    }

    #[test]
    fn test_update_refits_moved_entries() {
        let mut w = square_world(1.0);
        let k = create_square(&mut w, 0.0, 0.0);
        let probe = create_square(&mut w, 30.0, 30.0);
        w.update(1.0 / 60.0);

        // move far away from the original leaf bounds, next to the probe
        w.get_mut(k).unwrap().coll.center = Vec2::new(29.0, 30.0);
        w.update(1.0 / 60.0);
        assert!(w.is_collided(k, probe));

        // every leaf fat AABB contains its entry's tight AABB after update
        for (key, entry) in w.entries.iter() {
            let leaf = entry.node.unwrap();
            assert!(
                w.tree.leaf_aabb(leaf).contains(&entry.coll.aabb()),
                "leaf for {key:#x} lost containment"
            );
        }
    }

    #[test]
    fn test_resolve_collider_swaps_velocities() {
        // update then resolve one cached pair
        let mut w = square_world(0.5);
        let k0 = create_square(&mut w, 0.0, 0.0);
        let k1 = create_square(&mut w, 1.9, 0.0);
        w.get_mut(k0).unwrap().vel = Vec2::new(1.0, 0.0);
        w.get_mut(k1).unwrap().vel = Vec2::new(-1.0, 0.0);
        w.update(1.0 / 60.0);
        assert!(w.is_collided(k0, k1));

        w.resolve_collider(k0, k1);
        assert!((w.get(k0).unwrap().vel.x + 1.0).abs() < 1e-5);
        assert!((w.get(k1).unwrap().vel.x - 1.0).abs() < 1e-5);
        assert!(w.get(k0).unwrap().coll.center.x < 0.0);
        assert!(w.get(k1).unwrap().coll.center.x > 1.9);
    }

    #[test]
    fn test_resolve_collider_dead_or_aliased_keys() {
        let mut w = square_world(0.0);
        let k0 = create_square(&mut w, 0.0, 0.0);
        let k1 = create_square(&mut w, 0.5, 0.0);
        w.destroy(k1);
        // neither call may touch k0
        w.resolve_collider(k0, k1);
        w.resolve_collider(k0, k0);
        assert_eq!(w.get(k0).unwrap().vel, Vec2::ZERO);
        assert_eq!(w.get(k0).unwrap().coll.center, Vec2::ZERO);
    }

    #[test]
    fn test_groups_suppress_world_pairs() {
        let mut w = square_world(0.0);
        let a = w.create_in_group(Vec2::ZERO, Vec2::ONE, 1.0, 1.0, 0.0, 0.0, 0b100);
        let b = w.create_in_group(Vec2::new(0.5, 0.0), Vec2::ONE, 1.0, 1.0, 0.0, 0.0, 0b100);
        w.update(1.0 / 60.0);
        assert!(!w.is_collided(a, b));
    }

    #[test]
    fn test_entry_swept_aabb_covers_travel() {
        let mut w = square_world(0.0);
        let k = create_square(&mut w, 0.0, 0.0);
        w.get_mut(k).unwrap().vel = Vec2::new(10.0, 0.0);
        let swept = w.entry_swept_aabb(k, 0.5).unwrap();
        assert_eq!(swept.lo, Vec2::new(-1.0, -1.0));
        assert_eq!(swept.hi, Vec2::new(6.0, 1.0));
        assert!(w.entry_swept_aabb(Key::MAX, 0.5).is_none());
    }

    #[test]
    fn test_many_bodies_settle_with_resolution_loop() {
        // drive the documented step: update, then resolve each cached pair
        let mut w = square_world(1.0);
        let mut keys = Vec::new();
        for i in 0..10 {
            let k = create_square(&mut w, i as f32 * 1.5, 0.0);
            w.get_mut(k).unwrap().vel = Vec2::new(if i % 2 == 0 { 1.0 } else { -1.0 }, 0.0);
            keys.push(k);
        }
        for _ in 0..30 {
            for key in &keys {
                let vel = w.get(*key).unwrap().vel;
                w.get_mut(*key).unwrap().coll.center += vel * (1.0 / 60.0);
            }
            w.update(1.0 / 60.0);
            let pairs: Vec<(Key, Key)> = w.collided_pairs().to_vec();
            for (k0, k1) in pairs {
                if w.is_collided(k0, k1) {
                    w.resolve_collider(k0, k1);
                }
            }
        }
        // nothing exploded: all bodies still live and finite
        for key in &keys {
            let e = w.get(*key).unwrap();
            assert!(e.coll.center.is_finite());
            assert!(e.vel.is_finite());
        }
    }

    #[test]
    fn test_timing_snapshot_present_when_enabled() {
        let mut w = square_world(0.0);
        create_square(&mut w, 0.0, 0.0);
        w.update(1.0 / 60.0);
        assert!(w.timing().is_none());
        w.enable_timing = true;
        w.update(1.0 / 60.0);
        let t = w.timing().unwrap();
        assert!(t.update_ms >= 0.0);
    }
}
