//! Archetype-based entity-component store.
//!
//! Entities sharing a component signature live together in one row-packed
//! byte table, so iteration over an archetype is a linear walk. Handles are
//! generational; adding or removing a component migrates the entity's row to
//! the destination archetype (append there first, then swap-and-pop the
//! source, so a failed append leaves the source intact).

// Row tables are raw byte buffers; the unsafe blocks below are each bounded
// by the layout math computed from the component list.
#![allow(unsafe_code)]

use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::ptr::{self, NonNull};

use crate::slotmap::{Key, SlotMap};

/// 64-bit generational entity handle.
pub type Entity = Key;

/// Bitmask over component IDs; bit `i` set means component `i` is present.
/// At most 64 component types per world.
pub type Signature = u64;

/// Types storable as components: trivially relocatable, no drop obligations
/// (rows move by raw byte copy).
pub trait Component: Copy + 'static {}

impl<T: Copy + 'static> Component for T {}

/// A fixed, ordered list of component types, written as a tuple. Component
/// IDs are tuple positions; the impls below cover arities 1 through 16.
pub trait ComponentList: 'static {
    const LEN: usize;
    const SIZES: &'static [usize];
    const ALIGNS: &'static [usize];
}

/// Type-level index marker for the first position of a component list.
pub struct Here;

/// Type-level index marker for the position after `I`.
pub struct There<I>(PhantomData<I>);

/// Locates component `T` inside the list. `I` is the position marker and is
/// inferred at each call site: exactly one impl exists per declared
/// component, so a type outside the list leaves the bound unsatisfied and a
/// type declared twice makes `I` ambiguous, both at compile time.
pub trait ComponentIndex<T: Component, I>: ComponentList {
    /// The component's ID: its position in the declared list.
    const INDEX: usize;
}

macro_rules! impl_component_index {
    (($($all:ident),+); $marker:ty; $idx:expr; $head:ident) => {
        impl<$($all: Component),+> ComponentIndex<$head, $marker> for ($($all,)+) {
            const INDEX: usize = $idx;
        }
    };
    (($($all:ident),+); $marker:ty; $idx:expr; $head:ident, $($tail:ident),+) => {
        impl<$($all: Component),+> ComponentIndex<$head, $marker> for ($($all,)+) {
            const INDEX: usize = $idx;
        }
        impl_component_index!(($($all),+); There<$marker>; $idx + 1; $($tail),+);
    };
}

macro_rules! impl_component_list {
    ($($name:ident),+) => {
        impl<$($name: Component),+> ComponentList for ($($name,)+) {
            const SIZES: &'static [usize] = &[$(std::mem::size_of::<$name>()),+];
            const ALIGNS: &'static [usize] = &[$(std::mem::align_of::<$name>()),+];
            const LEN: usize = Self::SIZES.len();
        }

        impl_component_index!(($($name),+); Here; 0; $($name),+);
    };
}

impl_component_list!(A);
impl_component_list!(A, B);
impl_component_list!(A, B, C);
impl_component_list!(A, B, C, D);
impl_component_list!(A, B, C, D, E);
impl_component_list!(A, B, C, D, E, F);
impl_component_list!(A, B, C, D, E, F, G);
impl_component_list!(A, B, C, D, E, F, G, H);
impl_component_list!(A, B, C, D, E, F, G, H, I);
impl_component_list!(A, B, C, D, E, F, G, H, I, J);
impl_component_list!(A, B, C, D, E, F, G, H, I, J, K);
impl_component_list!(A, B, C, D, E, F, G, H, I, J, K, L);
impl_component_list!(A, B, C, D, E, F, G, H, I, J, K, L, M);
impl_component_list!(A, B, C, D, E, F, G, H, I, J, K, L, M, N);
impl_component_list!(A, B, C, D, E, F, G, H, I, J, K, L, M, N, O);
impl_component_list!(A, B, C, D, E, F, G, H, I, J, K, L, M, N, O, P);

const fn align_up(offset: usize, align: usize) -> usize {
    (offset + align - 1) & !(align - 1)
}

/// Byte offset of component `id` within a row of signature `signature`:
/// the running sum of lower-ID present component sizes, aligned up at each
/// component's boundary.
fn row_offset<L: ComponentList>(signature: Signature, id: usize) -> usize {
    let mut offset = 0;
    for i in 0..id {
        if signature >> i & 1 == 1 {
            offset = align_up(offset, L::ALIGNS[i]) + L::SIZES[i];
        }
    }
    align_up(offset, L::ALIGNS[id])
}

/// Bytes per row for `signature`, padded out to the row's max alignment so
/// consecutive rows stay aligned.
fn row_size<L: ComponentList>(signature: Signature) -> usize {
    let mut offset = 0;
    let mut max_align = 1;
    for i in 0..L::LEN {
        if signature >> i & 1 == 1 {
            offset = align_up(offset, L::ALIGNS[i]) + L::SIZES[i];
            if L::ALIGNS[i] > max_align {
                max_align = L::ALIGNS[i];
            }
        }
    }
    align_up(offset, max_align)
}

fn row_align<L: ComponentList>(signature: Signature) -> usize {
    let mut max_align = 1;
    for i in 0..L::LEN {
        if signature >> i & 1 == 1 && L::ALIGNS[i] > max_align {
            max_align = L::ALIGNS[i];
        }
    }
    max_align
}

/// Per-entity record: current signature and row within that archetype.
#[derive(Copy, Clone, Debug)]
struct EntitySpec {
    signature: Signature,
    row: usize,
}

/// One signature's row table: a raw byte buffer of packed rows plus the
/// parallel entity array needed to fix up displaced rows on swap-and-pop.
struct ArchetypeTable {
    ptr: NonNull<u8>,
    prefab_size: usize,
    align: usize,
    /// Live rows.
    size: usize,
    /// Allocated rows.
    capacity: usize,
    /// Reverse map: `entities[row]` owns row `row`.
    entities: Vec<Entity>,
}

impl ArchetypeTable {
    fn new(prefab_size: usize, align: usize) -> Self {
        Self {
            ptr: NonNull::dangling(),
            prefab_size,
            align,
            size: 0,
            capacity: 0,
            entities: Vec::new(),
        }
    }

    fn alloc_layout(&self, capacity: usize) -> Layout {
        // max(1) keeps the allocator away from zero-size requests
        let bytes = (self.prefab_size * capacity).max(1);
        Layout::from_size_align(bytes, self.align).expect("archetype row layout overflow")
    }

    /// 1.5x geometric growth, minimum capacity 2.
    fn grow(&mut self) {
        let new_capacity = (self.capacity + self.capacity / 2).max(2);
        let new_layout = self.alloc_layout(new_capacity);

        // SAFETY: new_layout has non-zero size; the old buffer (if any) holds
        // `size` rows of `prefab_size` bytes and is freed with the layout it
        // was allocated with.
        unsafe {
            let new_ptr = alloc(new_layout);
            if new_ptr.is_null() {
                handle_alloc_error(new_layout);
            }
            if self.capacity > 0 {
                ptr::copy_nonoverlapping(self.ptr.as_ptr(), new_ptr, self.size * self.prefab_size);
                dealloc(self.ptr.as_ptr(), self.alloc_layout(self.capacity));
            }
            self.ptr = NonNull::new_unchecked(new_ptr);
        }
        self.capacity = new_capacity;
    }

    /// Append an uninitialized row owned by `entity`; returns its index.
    fn alloc_row(&mut self, entity: Entity) -> usize {
        if self.size == self.capacity {
            self.grow();
        }
        self.entities.push(entity);
        self.size += 1;
        self.size - 1
    }

    fn row_ptr(&self, row: usize) -> *mut u8 {
        debug_assert!(row < self.size);
        // SAFETY: row < size <= capacity, so the offset stays in bounds.
        unsafe { self.ptr.as_ptr().add(row * self.prefab_size) }
    }

    /// Remove `row` by moving the last row into it. Returns the entity that
    /// moved (now owning `row`), or `None` when `row` was the last.
    fn swap_remove_row(&mut self, row: usize) -> Option<Entity> {
        debug_assert!(row < self.size);
        let last = self.size - 1;
        let displaced = if row != last {
            // SAFETY: row and last are distinct in-bounds rows.
            unsafe {
                ptr::copy_nonoverlapping(self.row_ptr(last), self.row_ptr(row), self.prefab_size);
            }
            self.entities.swap_remove(row);
            Some(self.entities[row])
        } else {
            self.entities.pop();
            None
        };
        self.size -= 1;
        displaced
    }
}

impl Drop for ArchetypeTable {
    fn drop(&mut self) {
        if self.capacity > 0 {
            // SAFETY: the buffer was allocated with this exact layout.
            unsafe {
                dealloc(self.ptr.as_ptr(), self.alloc_layout(self.capacity));
            }
        }
    }
}

/// Entity-component store parametric over a fixed component list, e.g.
/// `SmallWorld::<(Position, Velocity, Health)>::new()`.
///
/// Component operations only accept types from the declared list; anything
/// else is rejected when the call is compiled:
///
/// ```compile_fail
/// use clonk::SmallWorld;
///
/// #[derive(Copy, Clone)]
/// struct Position { x: f32 }
/// #[derive(Copy, Clone)]
/// struct Velocity { x: f32 }
///
/// let mut w = SmallWorld::<(Position,)>::new();
/// let e = w.create_entity();
/// w.emplace(e, Velocity { x: 1.0 }); // Velocity is not declared
/// ```
///
/// Declaring the same component twice makes its position ambiguous, so every
/// use of it is rejected the same way:
///
/// ```compile_fail
/// use clonk::SmallWorld;
///
/// #[derive(Copy, Clone)]
/// struct Health { hp: i32 }
///
/// let mut w = SmallWorld::<(Health, Health)>::new();
/// let e = w.create_entity();
/// w.emplace(e, Health { hp: 1 }); // which Health slot?
/// ```
pub struct SmallWorld<L: ComponentList> {
    specs: SlotMap<EntitySpec>,
    archetypes: BTreeMap<Signature, ArchetypeTable>,
    _components: PhantomData<L>,
}

impl<L: ComponentList> SmallWorld<L> {
    pub fn new() -> Self {
        Self {
            specs: SlotMap::new(),
            archetypes: BTreeMap::new(),
            _components: PhantomData,
        }
    }

    /// Component ID of `T`: its position in the declared list. The position
    /// marker `I` is inferred; call as `component_id::<T, _>()`.
    pub fn component_id<T: Component, I>() -> usize
    where
        L: ComponentIndex<T, I>,
    {
        <L as ComponentIndex<T, I>>::INDEX
    }

    /// Allocate an entity with an empty signature.
    pub fn create_entity(&mut self) -> Entity {
        self.specs.insert(EntitySpec {
            signature: 0,
            row: 0,
        })
    }

    /// Free the entity and its row. False for a dead handle.
    pub fn destroy_entity(&mut self, entity: Entity) -> bool {
        let Some(spec) = self.specs.at(entity).copied() else {
            return false;
        };
        if spec.signature != 0 {
            self.remove_row(spec.signature, spec.row);
        }
        self.specs.erase(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.specs.len()
    }

    /// Current signature of a live entity.
    pub fn signature(&self, entity: Entity) -> Option<Signature> {
        self.specs.at(entity).map(|spec| spec.signature)
    }

    /// Set component `T` on `entity`: overwrite in place when already
    /// present, otherwise migrate the entity to the widened archetype.
    pub fn emplace<T: Component, I>(&mut self, entity: Entity, value: T)
    where
        L: ComponentIndex<T, I>,
    {
        let id = <L as ComponentIndex<T, I>>::INDEX;
        let bit = 1u64 << id;
        let spec = *self.specs.at(entity).expect("emplace on a dead entity");

        if spec.signature & bit != 0 {
            let table = &self.archetypes[&spec.signature];
            let offset = row_offset::<L>(spec.signature, id);
            // SAFETY: the bit is set, so the row holds a T at this offset.
            unsafe {
                ptr::write(table.row_ptr(spec.row).add(offset).cast::<T>(), value);
            }
            return;
        }

        let new_signature = spec.signature | bit;
        let new_row = self.migrate(entity, spec, new_signature);
        let table = &self.archetypes[&new_signature];
        let offset = row_offset::<L>(new_signature, id);
        // SAFETY: migrate left the T slot of the fresh row uninitialized;
        // offset and alignment come from the destination signature's layout.
        unsafe {
            ptr::write(table.row_ptr(new_row).add(offset).cast::<T>(), value);
        }
    }

    /// Clear component `T` from `entity`, migrating it to the narrowed
    /// archetype. A no-op when the component is absent.
    pub fn erase<T: Component, I>(&mut self, entity: Entity)
    where
        L: ComponentIndex<T, I>,
    {
        let id = <L as ComponentIndex<T, I>>::INDEX;
        let bit = 1u64 << id;
        let spec = *self.specs.at(entity).expect("erase on a dead entity");
        if spec.signature & bit == 0 {
            return;
        }
        self.migrate(entity, spec, spec.signature & !bit);
    }

    pub fn get<T: Component, I>(&self, entity: Entity) -> Option<&T>
    where
        L: ComponentIndex<T, I>,
    {
        let id = <L as ComponentIndex<T, I>>::INDEX;
        let spec = self.specs.at(entity)?;
        if spec.signature >> id & 1 == 0 {
            return None;
        }
        let table = &self.archetypes[&spec.signature];
        let offset = row_offset::<L>(spec.signature, id);
        // SAFETY: the bit is set, so the row holds an initialized T at this
        // offset; the reference lives no longer than &self.
        unsafe { Some(&*table.row_ptr(spec.row).add(offset).cast::<T>()) }
    }

    /// Mutable access; valid until the next structural mutation of this
    /// entity's archetype.
    pub fn get_mut<T: Component, I>(&mut self, entity: Entity) -> Option<&mut T>
    where
        L: ComponentIndex<T, I>,
    {
        let id = <L as ComponentIndex<T, I>>::INDEX;
        let spec = *self.specs.at(entity)?;
        if spec.signature >> id & 1 == 0 {
            return None;
        }
        let table = &self.archetypes[&spec.signature];
        let offset = row_offset::<L>(spec.signature, id);
        // SAFETY: as in `get`, and &mut self guarantees exclusivity.
        unsafe { Some(&mut *table.row_ptr(spec.row).add(offset).cast::<T>()) }
    }

    /// Move `entity` from its current archetype to `new_signature`, copying
    /// the components present in both. Returns the new row (0 when the new
    /// signature is empty). Destination components outside the old signature
    /// are left uninitialized for the caller to fill.
    fn migrate(&mut self, entity: Entity, spec: EntitySpec, new_signature: Signature) -> usize {
        log::trace!(
            "migrate entity {entity:#x}: {:#b} -> {:#b}",
            spec.signature,
            new_signature
        );

        // Stage the old row so the source and destination tables never need
        // to be borrowed at once.
        let old_size = row_size::<L>(spec.signature);
        let mut scratch = vec![0u8; old_size];
        if spec.signature != 0 {
            let table = &self.archetypes[&spec.signature];
            // SAFETY: scratch is exactly one source row long.
            unsafe {
                ptr::copy_nonoverlapping(table.row_ptr(spec.row), scratch.as_mut_ptr(), old_size);
            }
        }

        // Append to the destination before touching the source, so a failed
        // append leaves the source row intact.
        let mut new_row = 0;
        if new_signature != 0 {
            let table = self.archetypes.entry(new_signature).or_insert_with(|| {
                ArchetypeTable::new(row_size::<L>(new_signature), row_align::<L>(new_signature))
            });
            new_row = table.alloc_row(entity);
            let dst = table.row_ptr(new_row);
            let common = spec.signature & new_signature;
            for i in 0..L::LEN {
                if common >> i & 1 == 1 {
                    let src_offset = row_offset::<L>(spec.signature, i);
                    let dst_offset = row_offset::<L>(new_signature, i);
                    // SAFETY: both offsets are in bounds of their rows and
                    // refer to the same component type i.
                    unsafe {
                        ptr::copy_nonoverlapping(
                            scratch.as_ptr().add(src_offset),
                            dst.add(dst_offset),
                            L::SIZES[i],
                        );
                    }
                }
            }
        }

        if spec.signature != 0 {
            self.remove_row(spec.signature, spec.row);
        }

        let spec = self.specs.at_mut(entity).expect("migrating a dead entity");
        spec.signature = new_signature;
        spec.row = new_row;
        new_row
    }

    /// Swap-and-pop a row out of its table and re-point the displaced
    /// entity's spec at the vacated slot.
    fn remove_row(&mut self, signature: Signature, row: usize) {
        let table = self
            .archetypes
            .get_mut(&signature)
            .expect("entity spec names a missing archetype");
        if let Some(displaced) = table.swap_remove_row(row) {
            self.specs
                .at_mut(displaced)
                .expect("displaced entity must be live")
                .row = row;
        }
    }
}

impl<L: ComponentList> Default for SmallWorld<L> {
    fn default() -> Self {
        Self::new()
    }
}
