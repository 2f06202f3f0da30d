use glam::Vec2;

use crate::aabb::Aabb;
use crate::slotmap::Key;
use crate::world::Entry;

/// Public API contract for the persistent physics world.
pub trait PhysicsWorldApi {
    /// Construct a world whose tree leaves are fattened by `margin`.
    fn new(margin: f32) -> Self
    where
        Self: Sized;

    // --- Entry lifecycle ---------------------------------------------------

    /// Insert a body and its tree leaf (collision group 0). Returns a stable
    /// generational handle.
    fn create(
        &mut self,
        center: Vec2,
        halfexts: Vec2,
        invmass: f32,
        restitution: f32,
        sfriction: f32,
        dfriction: f32,
    ) -> Key;

    /// `create` with an explicit 7-bit collision group; pairs whose groups
    /// share a bit are never reported by the broad phase.
    #[allow(clippy::too_many_arguments)]
    fn create_in_group(
        &mut self,
        center: Vec2,
        halfexts: Vec2,
        invmass: f32,
        restitution: f32,
        sfriction: f32,
        dfriction: f32,
        group: u8,
    ) -> Key;

    /// Remove the body and free its tree leaf. False for a dead handle.
    fn destroy(&mut self, key: Key) -> bool;

    fn get(&self, key: Key) -> Option<&Entry>;

    /// Mutable access; hosts drive positions/velocities between steps.
    fn get_mut(&mut self, key: Key) -> Option<&mut Entry>;

    // --- Stepping ----------------------------------------------------------

    /// One broad-phase pass: reconcile leaf fat AABBs against current tight
    /// AABBs, then recompute and cache the sorted overlapping-pair list.
    /// Narrow-phase resolution is NOT invoked; callers drive it per pair.
    fn update(&mut self, dt: f32);

    /// True iff the pair is in the cached broad-phase list AND the two tight
    /// AABBs currently intersect.
    fn is_collided(&self, k0: Key, k1: Key) -> bool;

    /// Run impulse resolution on one pair. A no-op when either handle is
    /// dead, the handles alias, or both bodies have infinite mass.
    fn resolve_collider(&mut self, k0: Key, k1: Key);

    // --- Queries -----------------------------------------------------------

    /// The entry's tight AABB merged with its `dt`-advanced translate; what a
    /// host fattening by velocity would feed the broad phase.
    fn entry_swept_aabb(&self, key: Key, dt: f32) -> Option<Aabb>;
}
