//! clonk: 2D AABB physics (persistent world, impulse resolution) and
//! generational entity storage.

pub mod aabb;
pub mod api;
pub mod ecs;
pub mod freelist;
pub mod pool;
pub mod slotmap;
pub mod solver;
pub mod tree;
pub mod world;

pub use crate::aabb::{Aabb, Collider};
pub use crate::api::PhysicsWorldApi;
pub use crate::ecs::{Component, ComponentList, Entity, Signature, SmallWorld};
pub use crate::freelist::FreelistVector;
pub use crate::pool::Pool;
pub use crate::slotmap::{key_generation, key_index, Key, SlotMap};
pub use crate::tree::AabbTree;
pub use crate::world::{Entry, EntrySet, World, WorldStats, WorldTiming};
