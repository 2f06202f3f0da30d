use glam::Vec2;

/// Centered box: a position plus positive half extents along X/Y.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Collider {
    pub center: Vec2,
    pub halfexts: Vec2,
}

impl Collider {
    pub fn new(center: Vec2, halfexts: Vec2) -> Self {
        Self { center, halfexts }
    }

    /// Tight bounds of this collider.
    pub fn aabb(&self) -> Aabb {
        Aabb {
            lo: self.center - self.halfexts,
            hi: self.center + self.halfexts,
        }
    }
}

/// Axis-aligned bounding box. Invariant: `lo <= hi` componentwise.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb {
    pub lo: Vec2,
    pub hi: Vec2,
}

impl Aabb {
    pub fn new(lo: Vec2, hi: Vec2) -> Self {
        debug_assert!(lo.cmple(hi).all(), "Aabb requires lo <= hi");
        Self { lo, hi }
    }

    /// Smallest box enclosing both `self` and `other`.
    pub fn merge(&self, other: &Aabb) -> Aabb {
        Aabb {
            lo: self.lo.min(other.lo),
            hi: self.hi.max(other.hi),
        }
    }

    /// True when the boxes share any point (touching edges count).
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.lo.cmple(other.hi).all() && other.lo.cmple(self.hi).all()
    }

    /// True when `other` lies entirely inside `self`.
    pub fn contains(&self, other: &Aabb) -> bool {
        self.lo.cmple(other.lo).all() && other.hi.cmple(self.hi).all()
    }

    pub fn area(&self) -> f32 {
        let size = self.hi - self.lo;
        size.x * size.y
    }

    /// Box grown by `margin` in every direction.
    pub fn expand(&self, margin: f32) -> Aabb {
        Aabb {
            lo: self.lo - Vec2::splat(margin),
            hi: self.hi + Vec2::splat(margin),
        }
    }

    pub fn translate(&self, d: Vec2) -> Aabb {
        Aabb {
            lo: self.lo + d,
            hi: self.hi + d,
        }
    }
}
