//! Impulse resolution for axis-aligned box contacts.

use glam::Vec2;

use crate::world::Entry;

const CORRECTION_PERCENT: f32 = 0.8;
const CORRECTION_SLOP: f32 = 0.01;
const TANGENT_EPSILON: f32 = 1e-4;

/// Resolve one overlapping contact between `a` and `b`: apply a restitution
/// impulse along the minimum-overlap axis, bias the centers apart, then apply
/// friction along the tangent.
///
/// A no-op when the tight boxes do not actually overlap, when the bodies are
/// separating, or when both have infinite mass (no division happens).
pub fn resolve(a: &mut Entry, b: &mut Entry) {
    let inv_mass_sum = a.invmass + b.invmass;
    if inv_mass_sum == 0.0 {
        return;
    }

    let delta = b.coll.center - a.coll.center;
    let overlap = (a.coll.halfexts + b.coll.halfexts) - delta.abs();
    if overlap.x <= 0.0 || overlap.y <= 0.0 {
        return;
    }

    // Contact normal: signed unit axis of least penetration, pointing a -> b.
    let (penetration, normal) = if overlap.x < overlap.y {
        let nx = if delta.x > 0.0 { 1.0 } else { -1.0 };
        (overlap.x, Vec2::new(nx, 0.0))
    } else {
        let ny = if delta.y > 0.0 { 1.0 } else { -1.0 };
        (overlap.y, Vec2::new(0.0, ny))
    };

    let rel_vel = b.vel - a.vel;
    let vel_along_normal = rel_vel.dot(normal);
    if vel_along_normal > 0.0 {
        return;
    }

    let restitution = a.restitution.min(b.restitution);
    let j = -(1.0 + restitution) * vel_along_normal / inv_mass_sum;
    let impulse = j * normal;
    a.vel -= a.invmass * impulse;
    b.vel += b.invmass * impulse;

    // Positional bias: bleed off most of the penetration beyond the slop.
    let correction =
        normal * ((penetration - CORRECTION_SLOP).max(0.0) / inv_mass_sum) * CORRECTION_PERCENT;
    a.coll.center -= a.invmass * correction;
    b.coll.center += b.invmass * correction;

    let rel_vel = b.vel - a.vel;
    let tangent = rel_vel - rel_vel.dot(normal) * normal;
    let tangent_len = tangent.length();
    if tangent_len > TANGENT_EPSILON {
        let tangent = tangent / tangent_len;
        let jt = -rel_vel.dot(tangent) / inv_mass_sum;

        let static_mu = Vec2::new(a.sfriction, b.sfriction).length();
        let friction_impulse = if jt.abs() < j * static_mu {
            jt * tangent
        } else {
            let dynamic_mu = Vec2::new(a.dfriction, b.dfriction).length();
            -j * dynamic_mu * tangent
        };

        a.vel -= a.invmass * friction_impulse;
        b.vel += b.invmass * friction_impulse;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(center: Vec2, halfexts: Vec2, vel: Vec2, invmass: f32) -> Entry {
        let mut e = Entry::new(center, halfexts);
        e.vel = vel;
        e.invmass = invmass;
        e
    }

    fn close(a: Vec2, b: Vec2) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn test_equal_mass_elastic_swap() {
        // head-on elastic collision swaps the velocities.
        let mut a = entry(Vec2::ZERO, Vec2::ONE, Vec2::new(1.0, 0.0), 1.0);
        let mut b = entry(Vec2::new(1.9, 0.0), Vec2::ONE, Vec2::new(-1.0, 0.0), 1.0);
        resolve(&mut a, &mut b);
        assert!(close(a.vel, Vec2::new(-1.0, 0.0)));
        assert!(close(b.vel, Vec2::new(1.0, 0.0)));
        // centers pushed apart along x
        assert!(a.coll.center.x < 0.0);
        assert!(b.coll.center.x > 1.9);
        assert!((a.coll.center.x + 0.036).abs() < 1e-5);
        assert!((b.coll.center.x - 1.936).abs() < 1e-5);
    }

    #[test]
    fn test_swapped_argument_order_is_symmetric() {
        let make = || {
            (
                entry(Vec2::new(0.1, 0.0), Vec2::ONE, Vec2::new(0.7, 0.2), 1.0),
                entry(Vec2::new(1.6, 0.3), Vec2::ONE, Vec2::new(-0.9, 0.1), 0.5),
            )
        };
        let (mut a0, mut b0) = make();
        resolve(&mut a0, &mut b0);
        let (mut a1, mut b1) = make();
        resolve(&mut b1, &mut a1);
        assert!(close(a0.vel, a1.vel));
        assert!(close(b0.vel, b1.vel));
        assert!(close(a0.coll.center, a1.coll.center));
        assert!(close(b0.coll.center, b1.coll.center));
    }

    #[test]
    fn test_separating_bodies_untouched() {
        let mut a = entry(Vec2::ZERO, Vec2::ONE, Vec2::new(-1.0, 0.0), 1.0);
        let mut b = entry(Vec2::new(1.9, 0.0), Vec2::ONE, Vec2::new(1.0, 0.0), 1.0);
        resolve(&mut a, &mut b);
        assert_eq!(a.vel, Vec2::new(-1.0, 0.0));
        assert_eq!(b.vel, Vec2::new(1.0, 0.0));
        assert_eq!(a.coll.center, Vec2::ZERO);
        assert_eq!(b.coll.center, Vec2::new(1.9, 0.0));
    }

    #[test]
    fn test_both_infinite_mass_skipped() {
        let mut a = entry(Vec2::ZERO, Vec2::ONE, Vec2::new(1.0, 0.0), 0.0);
        let mut b = entry(Vec2::new(1.0, 0.0), Vec2::ONE, Vec2::new(-1.0, 0.0), 0.0);
        resolve(&mut a, &mut b);
        assert_eq!(a.vel, Vec2::new(1.0, 0.0));
        assert_eq!(b.vel, Vec2::new(-1.0, 0.0));
    }

    #[test]
    fn test_non_overlapping_input_is_noop() {
        let mut a = entry(Vec2::ZERO, Vec2::ONE, Vec2::new(1.0, 0.0), 1.0);
        let mut b = entry(Vec2::new(5.0, 0.0), Vec2::ONE, Vec2::new(-1.0, 0.0), 1.0);
        resolve(&mut a, &mut b);
        assert_eq!(a.vel, Vec2::new(1.0, 0.0));
        assert_eq!(b.vel, Vec2::new(-1.0, 0.0));
    }

    #[test]
    fn test_infinite_mass_body_stays_put() {
        let mut floor = entry(Vec2::new(0.0, -2.0), Vec2::new(10.0, 1.0), Vec2::ZERO, 0.0);
        floor.restitution = 0.0;
        let mut boxy = entry(Vec2::new(0.0, -0.95), Vec2::ONE, Vec2::new(0.0, -1.0), 1.0);
        boxy.restitution = 0.0;
        resolve(&mut floor, &mut boxy);
        assert_eq!(floor.vel, Vec2::ZERO);
        assert_eq!(floor.coll.center, Vec2::new(0.0, -2.0));
        // box stops along the normal and gets pushed up past the slop
        assert!(boxy.vel.y.abs() < 1e-5);
        assert!(boxy.coll.center.y > -0.95);
    }

    #[test]
    fn test_static_friction_stops_slide() {
        let mut floor = entry(Vec2::new(0.0, -2.0), Vec2::new(10.0, 1.0), Vec2::ZERO, 0.0);
        floor.restitution = 0.0;
        floor.sfriction = 3.0;
        floor.dfriction = 3.0;
        let mut boxy = entry(Vec2::new(0.0, -0.95), Vec2::ONE, Vec2::new(2.0, -1.0), 1.0);
        boxy.restitution = 0.0;
        boxy.sfriction = 3.0;
        boxy.dfriction = 3.0;
        resolve(&mut floor, &mut boxy);
        // |jt| = 2 < j * sqrt(18): static friction cancels the slide
        assert!(boxy.vel.x.abs() < 1e-5);
        assert!(boxy.vel.y.abs() < 1e-5);
    }

    #[test]
    fn test_dynamic_friction_slows_slide() {
        let mut floor = entry(Vec2::new(0.0, -2.0), Vec2::new(10.0, 1.0), Vec2::ZERO, 0.0);
        floor.restitution = 0.0;
        floor.sfriction = 1.0;
        floor.dfriction = 0.5;
        let mut boxy = entry(Vec2::new(0.0, -0.95), Vec2::ONE, Vec2::new(2.0, -1.0), 1.0);
        boxy.restitution = 0.0;
        boxy.sfriction = 1.0;
        boxy.dfriction = 0.5;
        resolve(&mut floor, &mut boxy);
        // |jt| = 2 >= j * sqrt(2): dynamic friction, j * sqrt(0.5) off the slide
        let expected = 2.0 - (0.5f32 * 0.5 + 0.5 * 0.5).sqrt();
        assert!((boxy.vel.x - expected).abs() < 1e-5);
        assert!(boxy.vel.y.abs() < 1e-5);
    }
}
