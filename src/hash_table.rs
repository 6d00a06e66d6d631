use alloc::alloc::handle_alloc_error;
use core::alloc::Layout;
use core::fmt::Debug;
use core::iter::FusedIterator;
use core::marker::PhantomData;
use core::mem::MaybeUninit;
use core::ops::Range;
use core::ptr::NonNull;

use crate::allocator::Allocator;
use crate::allocator::Global;
use crate::error::TryReserveError;

/// Smallest number of slots a table ever has.
pub const MIN_CAPACITY: usize = 16;

/// Load factor used until [`HashTable::set_max_load_factor`] is called.
pub const DEFAULT_MAX_LOAD_FACTOR: f32 = 0.5;

const FREE: u8 = 0;
const OCCUPIED: u8 = 1;

/// Largest population a table of `capacity` slots may hold.
///
/// Always leaves at least one free slot, which bounds every probe and
/// backward-shift loop.
#[inline]
fn growth_limit(capacity: usize, max_load_factor: f32) -> usize {
    let limit = (capacity as f64 * max_load_factor as f64) as usize;
    limit.min(capacity - 1)
}

/// Smallest power-of-two capacity whose growth limit admits `len` entries.
fn capacity_for(len: usize, max_load_factor: f32) -> Result<usize, TryReserveError> {
    let mut capacity = MIN_CAPACITY;
    while growth_limit(capacity, max_load_factor) < len {
        capacity = capacity
            .checked_mul(2)
            .ok_or(TryReserveError::CapacityOverflow)?;
    }
    Ok(capacity)
}

#[inline]
fn slot_count(requested: usize) -> Result<usize, TryReserveError> {
    requested
        .max(MIN_CAPACITY)
        .checked_next_power_of_two()
        .ok_or(TryReserveError::CapacityOverflow)
}

#[inline]
fn infallible<T>(result: Result<T, TryReserveError>) -> T {
    match result {
        Ok(value) => value,
        Err(TryReserveError::CapacityOverflow) => panic!("hash table capacity overflow"),
        Err(TryReserveError::AllocError { layout }) => handle_alloc_error(layout),
    }
}

#[cold]
#[inline(never)]
fn capacity_exhausted() -> ! {
    panic!("robin hood insert wrapped the whole table without finding a free slot")
}

#[derive(Clone, Copy, Debug)]
struct DataLayout {
    layout: Layout,
    hashes_offset: usize,
    buckets_offset: usize,
}

impl DataLayout {
    fn new<V>(capacity: usize) -> Result<Self, TryReserveError> {
        let overflow = |_| TryReserveError::CapacityOverflow;
        let tags_layout = Layout::array::<u8>(capacity).map_err(overflow)?;
        let hashes_layout = Layout::array::<MaybeUninit<u64>>(capacity).map_err(overflow)?;
        let buckets_layout = Layout::array::<MaybeUninit<V>>(capacity).map_err(overflow)?;

        let (layout, hashes_offset) = tags_layout.extend(hashes_layout).map_err(overflow)?;
        let (layout, buckets_offset) = layout.extend(buckets_layout).map_err(overflow)?;

        Ok(DataLayout {
            layout: layout.pad_to_align(),
            hashes_offset,
            buckets_offset,
        })
    }
}

/// The slot store: a tag per slot plus the stored hash and value of every
/// occupied slot, all in one allocation.
///
/// `Slots` does not own its allocator and has no `Drop`; the owning table
/// drops values and releases the block.
struct Slots<V> {
    alloc: NonNull<u8>,
    layout: DataLayout,
    capacity: usize,
    _phantom: PhantomData<V>,
}

impl<V> Slots<V> {
    fn allocate<A: Allocator>(capacity: usize, alloc: &A) -> Result<Self, TryReserveError> {
        debug_assert!(capacity.is_power_of_two() && capacity >= MIN_CAPACITY);
        let layout = DataLayout::new::<V>(capacity)?;
        let ptr = alloc
            .allocate(layout.layout)
            .map_err(|_| TryReserveError::AllocError {
                layout: layout.layout,
            })?;

        // SAFETY: The tag array is the first `capacity` bytes of the block.
        unsafe { core::ptr::write_bytes(ptr.as_ptr(), FREE, capacity) };

        Ok(Slots {
            alloc: ptr,
            layout,
            capacity,
            _phantom: PhantomData,
        })
    }

    /// Returns the block to `alloc` without touching any values.
    ///
    /// # Safety
    ///
    /// `alloc` must compare equal to the allocator that produced the block,
    /// every value must already be dropped or moved out, and `self` must not
    /// be used afterwards.
    unsafe fn release<A: Allocator>(&self, alloc: &A) {
        // SAFETY: Caller upholds the contract above.
        unsafe { alloc.deallocate(self.alloc, self.layout.layout) }
    }

    #[inline(always)]
    fn mask(&self) -> usize {
        self.capacity - 1
    }

    #[inline(always)]
    fn tags(&self) -> &[u8] {
        // SAFETY: The tag array is initialized for its full length on
        // allocation and only ever written with FREE or OCCUPIED.
        unsafe { core::slice::from_raw_parts(self.alloc.as_ptr(), self.capacity) }
    }

    #[inline(always)]
    fn tags_ptr(&self) -> *mut u8 {
        self.alloc.as_ptr()
    }

    #[inline(always)]
    fn hashes_ptr(&self) -> *mut MaybeUninit<u64> {
        // SAFETY: The offset lies within the allocation.
        unsafe { self.alloc.as_ptr().add(self.layout.hashes_offset).cast() }
    }

    #[inline(always)]
    fn buckets_ptr(&self) -> *mut MaybeUninit<V> {
        // SAFETY: The offset lies within the allocation.
        unsafe { self.alloc.as_ptr().add(self.layout.buckets_offset).cast() }
    }

    /// # Safety
    ///
    /// `index` must be less than `capacity`.
    #[inline(always)]
    unsafe fn is_occupied(&self, index: usize) -> bool {
        debug_assert!(index < self.capacity);
        // SAFETY: Caller ensures `index` is within the tag array.
        unsafe { *self.tags_ptr().add(index) == OCCUPIED }
    }

    /// # Safety
    ///
    /// `index` must be an occupied slot.
    #[inline(always)]
    unsafe fn hash_at(&self, index: usize) -> u64 {
        debug_assert!(unsafe { self.is_occupied(index) });
        // SAFETY: Occupied slots always carry an initialized hash.
        unsafe { (*self.hashes_ptr().add(index)).assume_init() }
    }

    /// Distance of the entry at `index` from its home slot.
    ///
    /// # Safety
    ///
    /// `index` must be an occupied slot.
    #[inline(always)]
    unsafe fn distance(&self, index: usize) -> usize {
        // SAFETY: Forwarded from the caller.
        let hash = unsafe { self.hash_at(index) };
        index.wrapping_sub(hash as usize) & self.mask()
    }

    /// # Safety
    ///
    /// `index` must be an occupied slot, and the returned reference must not
    /// outlive the value's residence in that slot.
    #[inline(always)]
    unsafe fn value<'a>(&self, index: usize) -> &'a V {
        debug_assert!(unsafe { self.is_occupied(index) });
        // SAFETY: Occupied slots hold an initialized value.
        unsafe { (*self.buckets_ptr().add(index)).assume_init_ref() }
    }

    /// # Safety
    ///
    /// Same as [`Slots::value`], and no other reference to the value may be
    /// live.
    #[inline(always)]
    unsafe fn value_mut<'a>(&mut self, index: usize) -> &'a mut V {
        debug_assert!(unsafe { self.is_occupied(index) });
        // SAFETY: Occupied slots hold an initialized value; the caller
        // guarantees exclusivity.
        unsafe { (*self.buckets_ptr().add(index)).assume_init_mut() }
    }

    /// Constructs an entry in a free slot.
    ///
    /// # Safety
    ///
    /// `index` must be a free slot.
    #[inline(always)]
    unsafe fn write(&mut self, index: usize, hash: u64, value: V) {
        debug_assert!(unsafe { !self.is_occupied(index) });
        // SAFETY: `index` is in bounds and free, so nothing is overwritten.
        unsafe {
            (*self.hashes_ptr().add(index)).write(hash);
            (*self.buckets_ptr().add(index)).write(value);
            *self.tags_ptr().add(index) = OCCUPIED;
        }
    }

    /// Moves an entry out of its slot and marks the slot free.
    ///
    /// # Safety
    ///
    /// `index` must be an occupied slot.
    #[inline(always)]
    unsafe fn take(&mut self, index: usize) -> (u64, V) {
        // SAFETY: The slot is occupied, so hash and value are initialized;
        // the tag is cleared so the value is never read again.
        unsafe {
            let hash = self.hash_at(index);
            let value = (*self.buckets_ptr().add(index)).assume_init_read();
            *self.tags_ptr().add(index) = FREE;
            (hash, value)
        }
    }

    /// Swaps an incoming entry with the resident of an occupied slot.
    ///
    /// # Safety
    ///
    /// `index` must be an occupied slot.
    #[inline(always)]
    unsafe fn replace(&mut self, index: usize, hash: u64, value: V) -> (u64, V) {
        // SAFETY: Forwarded from the caller; the slot is refilled at once.
        unsafe {
            let evicted = self.take(index);
            self.write(index, hash, value);
            evicted
        }
    }

    /// Moves the entry at `from` into the free slot `to`.
    ///
    /// # Safety
    ///
    /// `from` must be occupied and `to` must be free.
    #[inline(always)]
    unsafe fn relocate(&mut self, from: usize, to: usize) {
        debug_assert!(unsafe { self.is_occupied(from) && !self.is_occupied(to) });
        // SAFETY: Distinct in-bounds slots; the source is marked free so the
        // bitwise copy transfers ownership.
        unsafe {
            core::ptr::copy_nonoverlapping(self.hashes_ptr().add(from), self.hashes_ptr().add(to), 1);
            core::ptr::copy_nonoverlapping(
                self.buckets_ptr().add(from),
                self.buckets_ptr().add(to),
                1,
            );
            *self.tags_ptr().add(to) = OCCUPIED;
            *self.tags_ptr().add(from) = FREE;
        }
    }

    /// Walks the probe sequence of `hash` looking for a value accepted by
    /// `eq`.
    ///
    /// Stops at the first free slot, or as soon as it meets a resident that
    /// sits closer to its home than the number of steps taken: the invariant
    /// guarantees the key cannot lie beyond such a resident.
    #[inline]
    fn probe(&self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<usize> {
        let mask = self.mask();
        let mut index = hash as usize & mask;

        for step in 0..self.capacity {
            // SAFETY: `index` is masked into the table, and every access to
            // hash or value is guarded by the occupied check.
            unsafe {
                if !self.is_occupied(index) {
                    return None;
                }

                let resident = self.hash_at(index);
                if resident == hash && eq(self.value(index)) {
                    return Some(index);
                }

                if index.wrapping_sub(resident as usize) & mask < step {
                    return None;
                }
            }
            index = (index + 1) & mask;
        }

        None
    }

    /// Places a value known to be absent, displacing residents that are
    /// closer to home than the carried entry.
    ///
    /// Returns the slot where `value` itself came to rest. Later swaps only
    /// move other entries, so that slot stays valid.
    fn insert_new(&mut self, hash: u64, value: V) -> usize {
        let mask = self.mask();
        let mut index = hash as usize & mask;
        let mut carried_hash = hash;
        let mut carried = value;
        let mut carried_distance = 0usize;
        let mut landed = None;

        for _ in 0..self.capacity {
            // SAFETY: `index` is masked into the table; the occupied check
            // selects between constructing and swapping.
            unsafe {
                if !self.is_occupied(index) {
                    self.write(index, carried_hash, carried);
                    return landed.unwrap_or(index);
                }

                let resident_distance = self.distance(index);
                if resident_distance < carried_distance {
                    let (evicted_hash, evicted) = self.replace(index, carried_hash, carried);
                    carried_hash = evicted_hash;
                    carried = evicted;
                    carried_distance = resident_distance;
                    landed.get_or_insert(index);
                }
            }

            index = (index + 1) & mask;
            carried_distance += 1;
        }

        capacity_exhausted()
    }

    /// Removes the entry at `index` and closes the gap by shifting the
    /// following run of displaced entries one slot back.
    ///
    /// # Safety
    ///
    /// `index` must be an occupied slot, and at least one other slot must be
    /// free.
    unsafe fn remove_index(&mut self, index: usize) -> V {
        let mask = self.mask();
        // SAFETY: Caller guarantees the slot is occupied.
        let (_, value) = unsafe { self.take(index) };

        let mut hole = index;
        loop {
            let next = (hole + 1) & mask;
            // SAFETY: `next` is masked into the table. The run ends at a free
            // slot before wrapping back onto `hole`, since another slot is
            // free.
            unsafe {
                if !self.is_occupied(next) || self.distance(next) == 0 {
                    break;
                }
                self.relocate(next, hole);
            }
            hole = next;
        }

        value
    }

    /// Drops every value in place and frees every slot.
    fn drop_values(&mut self) {
        for index in 0..self.capacity {
            // SAFETY: `index` is in bounds; occupied slots hold values.
            unsafe {
                if self.is_occupied(index) {
                    *self.tags_ptr().add(index) = FREE;
                    if core::mem::needs_drop::<V>() {
                        (*self.buckets_ptr().add(index)).assume_init_drop();
                    }
                }
            }
        }
    }

    #[inline]
    fn next_occupied(&self, from: usize) -> Option<usize> {
        next_occupied(self.tags(), from)
    }
}

#[inline]
fn next_occupied(tags: &[u8], from: usize) -> Option<usize> {
    tags.get(from..)?
        .iter()
        .position(|&tag| tag == OCCUPIED)
        .map(|offset| from + offset)
}

#[inline]
fn prev_occupied(tags: &[u8], before: usize) -> Option<usize> {
    tags[..before.min(tags.len())]
        .iter()
        .rposition(|&tag| tag == OCCUPIED)
}

/// A Robin Hood hash table over values of type `V`.
///
/// Like the map and set built on it, the table does not hash anything
/// itself: every operation takes the `u64` hash of the key and an equality
/// predicate. The hash is stored next to each value, so growth, displacement
/// and deletion never need to hash again.
///
/// ## Layout and probing
///
/// The table is a power-of-two array of slots, each either free or occupied.
/// A value's home slot is `hash & (capacity - 1)`. Collisions probe linearly,
/// and an insert that has probed farther than a resident is from its own home
/// takes that resident's slot and carries the resident onward. Lookups stop
/// at the first free slot, or at the first resident closer to home than the
/// lookup has probed. Removal shifts the following displaced entries back one
/// slot instead of leaving a tombstone.
///
/// ## Slot indices
///
/// Several methods hand out or accept slot indices. An index names a slot,
/// not a value: **any** insert, removal or rehash may move unrelated entries,
/// so an index obtained before a mutation must be looked up again afterwards.
///
/// ## Example
///
/// ```rust
/// # use core::hash::Hash;
/// # use core::hash::Hasher;
/// #
/// # use robin_hash::hash_table::HashTable;
/// # use siphasher::sip::SipHasher;
/// #
/// # #[derive(Debug, PartialEq)]
/// # struct Person {
/// #     id: u64,
/// #     name: String,
/// # }
/// #
/// # fn hash_id(id: u64) -> u64 {
/// #     let mut hasher = SipHasher::new();
/// #     id.hash(&mut hasher);
/// #     hasher.finish()
/// # }
///
/// let mut table = HashTable::new();
/// let hash = hash_id(123);
///
/// match table.entry(hash, |p: &Person| p.id == 123) {
///     robin_hash::hash_table::Entry::Vacant(entry) => {
///         entry.insert(Person {
///             id: 123,
///             name: "Alice".to_string(),
///         });
///     }
///     robin_hash::hash_table::Entry::Occupied(_) => {
///         println!("Person already exists");
///     }
/// }
/// assert_eq!(table.len(), 1);
/// ```
pub struct HashTable<V, A: Allocator = Global> {
    slots: Slots<V>,
    len: usize,
    max_load_factor: f32,
    growth_limit: usize,
    alloc: A,
}

// SAFETY: The table owns its values outright; sending it sends them.
unsafe impl<V: Send, A: Allocator + Send> Send for HashTable<V, A> {}
// SAFETY: Shared access only hands out shared references to values.
unsafe impl<V: Sync, A: Allocator + Sync> Sync for HashTable<V, A> {}

impl<V, A: Allocator> Debug for HashTable<V, A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        use alloc::format;
        use alloc::string::String;
        use alloc::string::ToString;
        use alloc::vec::Vec;

        let slots = self
            .slots
            .tags()
            .chunks(16)
            .enumerate()
            .map(|(row, tags)| {
                tags.iter()
                    .enumerate()
                    .map(|(col, &tag)| {
                        if tag == OCCUPIED {
                            // SAFETY: The tag says the slot is occupied.
                            format!("{:02}", unsafe { self.slots.distance(row * 16 + col) })
                        } else {
                            "..".to_string()
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<String>>();

        f.debug_struct("HashTable")
            .field("distances", &slots)
            .field("len", &self.len)
            .field("capacity", &self.slots.capacity)
            .field("max_load_factor", &self.max_load_factor)
            .finish()
    }
}

impl<V, A> Clone for HashTable<V, A>
where
    V: Clone,
    A: Allocator + Clone,
{
    fn clone(&self) -> Self {
        self.clone_in(self.alloc.clone())
    }
}

impl<V, A: Allocator> Drop for HashTable<V, A> {
    fn drop(&mut self) {
        if self.len > 0 {
            self.slots.drop_values();
        }
        // SAFETY: All values are dropped and the block came from `self.alloc`.
        unsafe { self.slots.release(&self.alloc) };
    }
}

impl<V> Default for HashTable<V, Global> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> HashTable<V, Global> {
    /// Creates an empty table with [`MIN_CAPACITY`] slots.
    pub fn new() -> Self {
        Self::new_in(Global)
    }

    /// Creates an empty table with at least `capacity` slots.
    ///
    /// The slot count is rounded up to a power of two and never drops below
    /// [`MIN_CAPACITY`]. With the default load factor of `0.5`, a table of
    /// `n` slots holds `n / 2` values before it grows.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use robin_hash::hash_table::HashTable;
    /// #
    /// let table: HashTable<String> = HashTable::with_capacity(100);
    /// assert_eq!(table.capacity(), 128);
    ///
    /// let tiny: HashTable<String> = HashTable::with_capacity(1);
    /// assert_eq!(tiny.capacity(), 16);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_in(capacity, Global)
    }
}

impl<V, A: Allocator> HashTable<V, A> {
    /// Creates an empty table with [`MIN_CAPACITY`] slots from `alloc`.
    pub fn new_in(alloc: A) -> Self {
        Self::with_capacity_in(0, alloc)
    }

    /// Creates an empty table with at least `capacity` slots from `alloc`.
    ///
    /// Aborts through `handle_alloc_error` if the allocator fails.
    pub fn with_capacity_in(capacity: usize, alloc: A) -> Self {
        infallible(Self::try_with_capacity_in(capacity, alloc))
    }

    /// Fallible version of [`HashTable::with_capacity_in`].
    pub fn try_with_capacity_in(capacity: usize, alloc: A) -> Result<Self, TryReserveError> {
        let capacity = slot_count(capacity)?;
        let slots = Slots::allocate(capacity, &alloc)?;
        Ok(Self {
            slots,
            len: 0,
            max_load_factor: DEFAULT_MAX_LOAD_FACTOR,
            growth_limit: growth_limit(capacity, DEFAULT_MAX_LOAD_FACTOR),
            alloc,
        })
    }

    /// Returns the allocator backing this table.
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Returns the number of values in the table.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the table holds no values.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of slots, always a power of two.
    ///
    /// This is not the number of values the table can hold before growing;
    /// that is bounded by [`HashTable::max_load_factor`].
    pub fn capacity(&self) -> usize {
        self.slots.capacity
    }

    /// Returns `len / capacity`.
    pub fn load_factor(&self) -> f32 {
        self.len as f32 / self.slots.capacity as f32
    }

    /// Returns the load factor above which an insert grows the table.
    pub fn max_load_factor(&self) -> f32 {
        self.max_load_factor
    }

    /// Sets the maximum load factor.
    ///
    /// If the table is already fuller than `max_load_factor` allows, it is
    /// rehashed at once into the smallest power-of-two capacity that fits.
    ///
    /// # Panics
    ///
    /// Panics unless `0.0 < max_load_factor <= 1.0`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use robin_hash::hash_table::HashTable;
    /// #
    /// let mut table = HashTable::with_capacity(16);
    /// for i in 0..8u64 {
    ///     table.insert_unique(i, i);
    /// }
    /// assert_eq!(table.capacity(), 16);
    ///
    /// table.set_max_load_factor(0.25);
    /// assert_eq!(table.capacity(), 32);
    /// assert!(table.load_factor() <= 0.25);
    /// ```
    pub fn set_max_load_factor(&mut self, max_load_factor: f32) {
        assert!(
            max_load_factor > 0.0 && max_load_factor <= 1.0,
            "max_load_factor must be in (0, 1], got {max_load_factor}"
        );

        self.max_load_factor = max_load_factor;
        self.growth_limit = growth_limit(self.slots.capacity, max_load_factor);
        if self.len > self.growth_limit {
            let capacity = infallible(capacity_for(self.len, max_load_factor));
            infallible(self.resize(capacity));
        }
    }

    /// Returns an iterator over all values in slot order.
    ///
    /// Slot order depends on the hashes and on the capacity, and changes
    /// whenever the table is rehashed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use robin_hash::hash_table::HashTable;
    /// #
    /// let mut table = HashTable::new();
    /// table.insert_unique(3, "three");
    /// table.insert_unique(1, "one");
    ///
    /// // Hash 1 lands in slot 1, hash 3 in slot 3.
    /// let values: Vec<_> = table.iter().copied().collect();
    /// assert_eq!(values, ["one", "three"]);
    /// ```
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            tags: self.slots.tags(),
            buckets: self.slots.buckets_ptr(),
            front: 0,
            back: self.slots.capacity,
            remaining: self.len,
            _marker: PhantomData,
        }
    }

    /// Returns an iterator yielding mutable references in slot order.
    pub fn iter_mut(&mut self) -> IterMut<'_, V> {
        IterMut {
            tags: self.slots.tags(),
            buckets: self.slots.buckets_ptr(),
            front: 0,
            back: self.slots.capacity,
            remaining: self.len,
            _marker: PhantomData,
        }
    }

    /// Removes and yields every value, leaving the table empty with its
    /// capacity intact.
    pub fn drain(&mut self) -> Drain<'_, V, A> {
        Drain {
            table: self,
            index: 0,
        }
    }

    /// Returns a cursor on the first occupied slot, or on the end position if
    /// the table is empty.
    pub fn cursor_front(&self) -> Cursor<'_, V> {
        let tags = self.slots.tags();
        Cursor {
            index: next_occupied(tags, 0).unwrap_or(tags.len()),
            tags,
            buckets: self.slots.buckets_ptr(),
            _marker: PhantomData,
        }
    }

    /// Returns a cursor on the last occupied slot, or on the end position if
    /// the table is empty.
    pub fn cursor_back(&self) -> Cursor<'_, V> {
        let tags = self.slots.tags();
        Cursor {
            index: prev_occupied(tags, tags.len()).unwrap_or(tags.len()),
            tags,
            buckets: self.slots.buckets_ptr(),
            _marker: PhantomData,
        }
    }

    /// Returns a cursor on slot `index`.
    ///
    /// `index == capacity()` gives the end position. Any other index must
    /// name an occupied slot, otherwise `None` is returned.
    pub fn cursor_at(&self, index: usize) -> Option<Cursor<'_, V>> {
        let tags = self.slots.tags();
        if index != tags.len() && tags.get(index) != Some(&OCCUPIED) {
            return None;
        }
        Some(Cursor {
            tags,
            buckets: self.slots.buckets_ptr(),
            index,
            _marker: PhantomData,
        })
    }

    /// Removes all values, keeping the current capacity.
    pub fn clear(&mut self) {
        if self.len > 0 {
            self.slots.drop_values();
        }
        self.len = 0;
    }

    /// Rehashes the table into at least `capacity` slots.
    ///
    /// The result is the larger of `capacity` rounded up to a power of two
    /// and the smallest capacity that holds the current values under the
    /// maximum load factor, so this can shrink as well as grow. Every value
    /// is re-inserted with full Robin Hood placement.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use robin_hash::hash_table::HashTable;
    /// #
    /// let mut table = HashTable::new();
    /// for i in 0..6u64 {
    ///     table.insert_unique(i * 64, i);
    /// }
    ///
    /// table.rehash(1024);
    /// assert_eq!(table.capacity(), 1024);
    ///
    /// table.rehash(0);
    /// assert_eq!(table.capacity(), 16);
    /// for i in 0..6u64 {
    ///     assert_eq!(table.find(i * 64, |&v| v == i), Some(&i));
    /// }
    /// ```
    pub fn rehash(&mut self, capacity: usize) {
        infallible(self.try_rehash(capacity));
    }

    fn try_rehash(&mut self, capacity: usize) -> Result<(), TryReserveError> {
        let capacity = slot_count(capacity)?.max(capacity_for(self.len, self.max_load_factor)?);
        if capacity != self.slots.capacity {
            self.resize(capacity)?;
        }
        Ok(())
    }

    /// Reserves room for at least `additional` more values without growing.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use robin_hash::hash_table::HashTable;
    /// #
    /// let mut table: HashTable<u64> = HashTable::new();
    /// table.reserve(100);
    /// assert!(table.capacity() as f32 * table.max_load_factor() >= 100.0);
    /// ```
    pub fn reserve(&mut self, additional: usize) {
        infallible(self.try_reserve(additional));
    }

    /// Fallible version of [`HashTable::reserve`].
    ///
    /// On error the table is left unchanged.
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        let required = self
            .len
            .checked_add(additional)
            .ok_or(TryReserveError::CapacityOverflow)?;
        if required > self.growth_limit {
            let capacity = capacity_for(required, self.max_load_factor)?;
            self.resize(capacity)?;
        }
        Ok(())
    }

    /// Shrinks the table to the smallest capacity that holds its values.
    pub fn shrink_to_fit(&mut self) {
        self.rehash(0);
    }

    /// Moves every value into a fresh array of `capacity` slots.
    ///
    /// Each value goes through the full Robin Hood insert against the new
    /// array. Two values can share a home in the new array even when their
    /// old homes differ, so placing them directly at their homes would lose
    /// entries.
    #[cold]
    fn resize(&mut self, capacity: usize) -> Result<(), TryReserveError> {
        debug_assert!(growth_limit(capacity, self.max_load_factor) >= self.len);

        let new_slots = Slots::allocate(capacity, &self.alloc)?;
        let mut old_slots = core::mem::replace(&mut self.slots, new_slots);

        for index in 0..old_slots.capacity {
            // SAFETY: `index` is in bounds; occupied slots hold values, which
            // are marked free in the old array as they move.
            unsafe {
                if old_slots.is_occupied(index) {
                    let (hash, value) = old_slots.take(index);
                    self.slots.insert_new(hash, value);
                }
            }
        }

        // SAFETY: Every value has moved out; the block came from `self.alloc`.
        unsafe { old_slots.release(&self.alloc) };
        self.growth_limit = growth_limit(capacity, self.max_load_factor);
        Ok(())
    }

    /// Grows ahead of an insert so the new value stays within the growth
    /// limit. Capacity doubles until it fits.
    #[inline]
    fn reserve_one(&mut self) {
        if self.len >= self.growth_limit {
            self.grow();
        }
    }

    #[cold]
    #[inline(never)]
    fn grow(&mut self) {
        let required = self.len + 1;
        let mut capacity = self.slots.capacity;
        while growth_limit(capacity, self.max_load_factor) < required {
            capacity = infallible(
                capacity
                    .checked_mul(2)
                    .ok_or(TryReserveError::CapacityOverflow),
            );
        }
        infallible(self.resize(capacity));
    }

    /// Gets an entry for the given hash and equality predicate.
    ///
    /// Inserting through a [`VacantEntry`] may grow the table; the lookup
    /// itself never does.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::Hash;
    /// # use core::hash::Hasher;
    /// #
    /// # use robin_hash::hash_table::HashTable;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # fn hash_str(s: &str) -> u64 {
    /// #     let mut hasher = SipHasher::new();
    /// #     s.hash(&mut hasher);
    /// #     hasher.finish()
    /// # }
    /// #
    /// let mut table = HashTable::new();
    /// let hash = hash_str("hello");
    ///
    /// match table.entry(hash, |s: &String| s == "hello") {
    ///     robin_hash::hash_table::Entry::Vacant(entry) => {
    ///         entry.insert("hello".to_string());
    ///     }
    ///     robin_hash::hash_table::Entry::Occupied(mut entry) => {
    ///         entry.get_mut().push('!');
    ///     }
    /// }
    ///
    /// table
    ///     .entry(hash, |s: &String| s == "hello")
    ///     .or_insert("unused".to_string());
    /// assert_eq!(table.len(), 1);
    /// ```
    pub fn entry(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Entry<'_, V, A> {
        match self.slots.probe(hash, eq) {
            Some(index) => Entry::Occupied(OccupiedEntry { table: self, index }),
            None => Entry::Vacant(VacantEntry { table: self, hash }),
        }
    }

    /// Inserts a value the caller knows is absent and returns its slot.
    ///
    /// Inserting a value that compares equal to one already present leaves
    /// two copies in the table; only the first will be found.
    pub fn insert_unique(&mut self, hash: u64, value: V) -> usize {
        self.reserve_one();
        let index = self.slots.insert_new(hash, value);
        self.len += 1;
        index
    }

    /// Inserts `value` unless `eq` accepts a value already stored under
    /// `hash`.
    ///
    /// Returns the slot holding the matching value and whether `value` was
    /// inserted. An existing value is left untouched and `value` is dropped.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use robin_hash::hash_table::HashTable;
    /// #
    /// let mut table = HashTable::new();
    /// let (index, inserted) = table.find_or_insert(7, |&v| v == 70, 70);
    /// assert!(inserted);
    /// assert_eq!(table.get_at(index), Some(&70));
    ///
    /// let (again, inserted) = table.find_or_insert(7, |&v| v == 70, 70);
    /// assert!(!inserted);
    /// assert_eq!(again, index);
    /// ```
    pub fn find_or_insert(&mut self, hash: u64, eq: impl Fn(&V) -> bool, value: V) -> (usize, bool) {
        match self.slots.probe(hash, eq) {
            Some(index) => (index, false),
            None => (self.insert_unique(hash, value), true),
        }
    }

    /// Finds a value by hash and equality predicate.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::Hash;
    /// # use core::hash::Hasher;
    /// #
    /// # use robin_hash::hash_table::HashTable;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # fn hash_u64(n: u64) -> u64 {
    /// #     let mut hasher = SipHasher::new();
    /// #     n.hash(&mut hasher);
    /// #     hasher.finish()
    /// # }
    /// #
    /// let mut table = HashTable::new();
    /// table.entry(hash_u64(42), |&n: &u64| n == 42).or_insert(42);
    ///
    /// assert_eq!(table.find(hash_u64(42), |&n| n == 42), Some(&42));
    /// assert_eq!(table.find(hash_u64(99), |&n| n == 99), None);
    /// ```
    #[inline]
    pub fn find(&self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<&V> {
        let index = self.slots.probe(hash, eq)?;
        // SAFETY: `probe` only returns occupied slots.
        Some(unsafe { self.slots.value(index) })
    }

    /// Finds a value by hash and equality predicate, returning a mutable
    /// reference.
    ///
    /// The value may be changed in place, but not in any way that changes
    /// its hash or its equality with other values.
    #[inline]
    pub fn find_mut(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<&mut V> {
        let index = self.slots.probe(hash, eq)?;
        // SAFETY: `probe` only returns occupied slots; `&mut self` makes the
        // reference exclusive.
        Some(unsafe { self.slots.value_mut(index) })
    }

    /// Returns the slot index of a value, if present.
    #[inline]
    pub fn find_index(&self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<usize> {
        self.slots.probe(hash, eq)
    }

    /// Returns the value in slot `index`, or `None` if the slot is free or
    /// out of range.
    pub fn get_at(&self, index: usize) -> Option<&V> {
        if self.slots.tags().get(index) != Some(&OCCUPIED) {
            return None;
        }
        // SAFETY: Checked above.
        Some(unsafe { self.slots.value(index) })
    }

    /// Mutable version of [`HashTable::get_at`].
    pub fn get_at_mut(&mut self, index: usize) -> Option<&mut V> {
        if self.slots.tags().get(index) != Some(&OCCUPIED) {
            return None;
        }
        // SAFETY: Checked above; `&mut self` makes the reference exclusive.
        Some(unsafe { self.slots.value_mut(index) })
    }

    /// Removes and returns a value identified by hash and equality
    /// predicate.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use robin_hash::hash_table::HashTable;
    /// #
    /// let mut table = HashTable::new();
    /// table.insert_unique(42, 42u64);
    ///
    /// assert_eq!(table.remove(42, |&n| n == 42), Some(42));
    /// assert_eq!(table.remove(42, |&n| n == 42), None);
    /// assert!(table.is_empty());
    /// ```
    pub fn remove(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<V> {
        let index = self.slots.probe(hash, eq)?;
        // SAFETY: `probe` only returns occupied slots, and the growth limit
        // keeps at least one other slot free.
        let value = unsafe { self.slots.remove_index(index) };
        self.len -= 1;
        Some(value)
    }

    /// Removes the value in slot `index`.
    ///
    /// Returns the value together with the next position in slot order: the
    /// first occupied slot at or after `index` once the gap has been closed,
    /// or `None` for the end. Returns `None` if the slot is free or out of
    /// range.
    ///
    /// The entry that followed the removed one may shift back into `index`
    /// itself, which is why the next position starts at `index`. A run that
    /// wraps past the last slot can shift an entry from slot 0 into the last
    /// slot, so erasing while walking forward may revisit that entry.
    pub fn remove_at(&mut self, index: usize) -> Option<(V, Option<usize>)> {
        if self.slots.tags().get(index) != Some(&OCCUPIED) {
            return None;
        }
        // SAFETY: Checked above, and the growth limit keeps at least one
        // other slot free.
        let value = unsafe { self.slots.remove_index(index) };
        self.len -= 1;
        Some((value, self.slots.next_occupied(index)))
    }

    /// Removes every value whose slot lies in `range` and returns the next
    /// position in slot order, starting from `range.start`.
    ///
    /// Entries after the range whose probe sequence crossed it are placed
    /// again, so some of them may move into the cleared slots.
    ///
    /// # Panics
    ///
    /// Panics if `range.start > range.end` or `range.end > capacity()`.
    pub fn remove_range(&mut self, range: Range<usize>) -> Option<usize> {
        let capacity = self.slots.capacity;
        assert!(
            range.start <= range.end && range.end <= capacity,
            "slot range {range:?} out of bounds for capacity {capacity}"
        );
        if range.is_empty() {
            return self.slots.next_occupied(range.start);
        }

        for index in range.clone() {
            // SAFETY: `index` is in bounds; occupied values are dropped in
            // place and their slots freed.
            unsafe {
                if self.slots.is_occupied(index) {
                    drop(self.slots.take(index));
                    self.len -= 1;
                }
            }
        }

        // Entries after the range may have probed through the slots just
        // freed. Re-place each of them until the first free slot, which no
        // later probe sequence crosses.
        let mask = self.slots.mask();
        let mut index = range.end & mask;
        for _ in 0..capacity {
            // SAFETY: `index` is masked into the table; the value taken out
            // is placed again at once.
            unsafe {
                if !self.slots.is_occupied(index) {
                    break;
                }
                if self.slots.distance(index) > 0 {
                    let (hash, value) = self.slots.take(index);
                    self.slots.insert_new(hash, value);
                }
            }
            index = (index + 1) & mask;
        }

        self.slots.next_occupied(range.start)
    }

    /// Keeps only the values for which `f` returns `true`.
    ///
    /// Each value is visited exactly once, removals use the backward shift,
    /// and the visit order is slot order rotated to start after a free slot.
    pub fn retain(&mut self, mut f: impl FnMut(&mut V) -> bool) {
        if self.len == 0 {
            return;
        }

        let mask = self.slots.mask();
        // The growth limit guarantees a free slot. Backward shifts stop at
        // it, so nothing moves from the unvisited part into the visited part.
        let start = self
            .slots
            .tags()
            .iter()
            .position(|&tag| tag == FREE)
            .unwrap_or(0);

        let mut offset = 1;
        while offset <= self.slots.capacity {
            let index = (start + offset) & mask;
            // SAFETY: `index` is masked into the table; only occupied slots
            // are read or removed.
            unsafe {
                if self.slots.is_occupied(index) && !f(self.slots.value_mut(index)) {
                    drop(self.slots.remove_index(index));
                    self.len -= 1;
                    // A successor may have shifted into `index`.
                    continue;
                }
            }
            offset += 1;
        }
    }

    /// Clones the table into a new one backed by `alloc`.
    ///
    /// The copy has the same capacity and load factor, and every value
    /// sits in the same slot as in `self`.
    pub fn clone_in<B: Allocator>(&self, alloc: B) -> HashTable<V, B>
    where
        V: Clone,
    {
        let mut table = infallible(HashTable::try_with_capacity_in(self.slots.capacity, alloc));
        table.max_load_factor = self.max_load_factor;
        table.growth_limit = self.growth_limit;

        for index in 0..self.slots.capacity {
            // SAFETY: Same capacity, so `index` is valid in both tables and
            // free in the new one. `len` is bumped per value so a panicking
            // `clone` leaves a consistent table to drop.
            unsafe {
                if self.slots.is_occupied(index) {
                    let value = self.slots.value(index).clone();
                    table.slots.write(index, self.slots.hash_at(index), value);
                    table.len += 1;
                }
            }
        }

        table
    }

    /// Moves the table onto `alloc`.
    ///
    /// If `alloc` compares equal to the current allocator, the buffer is
    /// kept as is. Otherwise a buffer of the same capacity is allocated from
    /// `alloc` and every value is moved into it, keeping its slot.
    pub fn move_in(mut self, alloc: A) -> Self {
        if self.alloc == alloc {
            self.alloc = alloc;
            return self;
        }

        let mut moved = infallible(Self::try_with_capacity_in(self.slots.capacity, alloc));
        moved.max_load_factor = self.max_load_factor;
        moved.growth_limit = self.growth_limit;

        for index in 0..self.slots.capacity {
            // SAFETY: Same capacity; each value is taken out of `self`
            // before being written into the free slot of `moved`.
            unsafe {
                if self.slots.is_occupied(index) {
                    let (hash, value) = self.slots.take(index);
                    self.len -= 1;
                    moved.slots.write(index, hash, value);
                    moved.len += 1;
                }
            }
        }

        moved
    }

    /// Move-assigns `source` into `self`.
    ///
    /// The values of `self` are dropped. When both allocators compare equal
    /// `self` takes over `source`'s buffer; otherwise the values are moved
    /// into a buffer from `self`'s allocator. Either way `source` is left
    /// empty with [`MIN_CAPACITY`] slots and keeps its allocator.
    pub fn assign_from(&mut self, source: &mut Self)
    where
        A: Clone,
    {
        let empty = Self::new_in(source.alloc.clone());
        let taken = core::mem::replace(source, empty);
        *self = taken.move_in(self.alloc.clone());
    }
}

#[cfg(any(test, feature = "stats"))]
mod stats {
    use alloc::vec::Vec;

    use super::*;

    /// Count of entries per distance from home.
    ///
    /// Index `d` of [`ProbeHistogram::bins`] holds the number of entries that
    /// sit `d` slots past their home slot.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct ProbeHistogram {
        /// Entries per distance from home.
        pub bins: Vec<usize>,
    }

    impl ProbeHistogram {
        /// Number of entries counted.
        pub fn total(&self) -> usize {
            self.bins.iter().sum()
        }

        /// Largest distance with at least one entry.
        pub fn max_distance(&self) -> usize {
            self.bins.iter().rposition(|&count| count != 0).unwrap_or(0)
        }

        /// Pretty-prints the histogram as a horizontal bar chart.
        #[cfg(feature = "std")]
        pub fn print(&self) {
            let max = *self.bins.iter().max().unwrap_or(&0);
            if max == 0 {
                println!("probe histogram: empty");
                return;
            }

            let max_bar = 60usize;
            let total_units = max_bar * 8;
            println!("probe histogram ({} entries):", self.total());

            let make_bar = |count: usize| -> alloc::string::String {
                if count == 0 {
                    return alloc::string::String::new();
                }
                let units = ((count as u128 * total_units as u128).div_ceil(max as u128)) as usize;
                let mut bar = "█".repeat(units / 8);
                let partial = ['▏', '▎', '▍', '▌', '▋', '▊', '▉'];
                if units % 8 > 0 {
                    bar.push(partial[units % 8 - 1]);
                }
                bar
            };

            for (distance, &count) in self.bins.iter().enumerate() {
                println!("{distance:>3} | {} ({count})", make_bar(count));
            }
        }
    }

    /// Occupancy and memory statistics for a table.
    #[derive(Debug, Clone)]
    pub struct DebugStats {
        /// Number of values in the table.
        pub populated: usize,
        /// Number of slots.
        pub capacity: usize,
        /// Population at which the next insert grows the table.
        pub growth_limit: usize,
        /// Number of slots tagged occupied.
        pub occupied_slots: usize,
        /// `populated / capacity`.
        pub load_factor: f64,
        /// Largest distance of any entry from its home.
        pub max_probe_distance: usize,
        /// Mean distance of entries from their homes.
        pub mean_probe_distance: f64,
        /// Bytes in the slot allocation.
        pub total_bytes: usize,
        /// Bytes held by free slots.
        pub wasted_bytes: usize,
    }

    impl DebugStats {
        /// Pretty-prints the statistics.
        #[cfg(feature = "std")]
        pub fn print(&self) {
            println!("=== Hash Table Debug Statistics ===");
            println!(
                "Population: {}/{} slots ({:.2}% load factor, grows past {})",
                self.populated,
                self.capacity,
                self.load_factor * 100.0,
                self.growth_limit
            );
            println!(
                "Probe distance: max {}, mean {:.3}",
                self.max_probe_distance, self.mean_probe_distance
            );
            println!("Total Allocated: {} bytes", self.total_bytes);
            println!(
                "Memory: {} bytes wasted ({:.02}%)",
                self.wasted_bytes,
                if self.total_bytes == 0 {
                    0.0
                } else {
                    (self.wasted_bytes as f64 / self.total_bytes as f64) * 100.0
                }
            );
        }
    }

    impl<V, A: Allocator> HashTable<V, A> {
        /// Computes a histogram of entry distances from their home slots.
        pub fn probe_histogram(&self) -> ProbeHistogram {
            let mut bins = Vec::new();
            for index in 0..self.slots.capacity {
                // SAFETY: `index` is in bounds; distance is only read for
                // occupied slots.
                unsafe {
                    if self.slots.is_occupied(index) {
                        let distance = self.slots.distance(index);
                        if bins.len() <= distance {
                            bins.resize(distance + 1, 0);
                        }
                        bins[distance] += 1;
                    }
                }
            }
            ProbeHistogram { bins }
        }

        /// Returns occupancy and memory statistics.
        pub fn debug_stats(&self) -> DebugStats {
            let histogram = self.probe_histogram();
            let occupied_slots = histogram.total();
            let distance_sum: usize = histogram
                .bins
                .iter()
                .enumerate()
                .map(|(distance, count)| distance * count)
                .sum();

            DebugStats {
                populated: self.len,
                capacity: self.slots.capacity,
                growth_limit: self.growth_limit,
                occupied_slots,
                load_factor: self.len as f64 / self.slots.capacity as f64,
                max_probe_distance: histogram.max_distance(),
                mean_probe_distance: if occupied_slots == 0 {
                    0.0
                } else {
                    distance_sum as f64 / occupied_slots as f64
                },
                total_bytes: self.slots.layout.layout.size(),
                wasted_bytes: (self.slots.capacity - occupied_slots)
                    * (core::mem::size_of::<V>() + core::mem::size_of::<u64>()),
            }
        }

        /// Panics with a description of the first broken table invariant.
        ///
        /// Checks that the occupied-slot count equals `len`, that `len` is
        /// within the growth limit, and that every entry is reachable from
        /// its home: each slot between an entry's home and its position is
        /// occupied by an entry at least as far from its own home as that
        /// slot is from the entry's home.
        pub fn assert_invariants(&self) {
            let mask = self.slots.mask();
            let occupied = self.slots.tags().iter().filter(|&&tag| tag == OCCUPIED).count();
            assert_eq!(occupied, self.len, "occupied slot count differs from len");
            assert!(
                self.len <= self.growth_limit,
                "len {} exceeds growth limit {}",
                self.len,
                self.growth_limit
            );

            for index in 0..self.slots.capacity {
                // SAFETY: `index` and every probed slot are masked into the
                // table; distances are only read for occupied slots.
                unsafe {
                    if !self.slots.is_occupied(index) {
                        continue;
                    }
                    let home = self.slots.hash_at(index) as usize & mask;
                    let distance = self.slots.distance(index);
                    for step in 0..distance {
                        let probed = (home + step) & mask;
                        assert!(
                            self.slots.is_occupied(probed),
                            "free slot {probed} between home {home} and entry at {index}"
                        );
                        assert!(
                            self.slots.distance(probed) >= step,
                            "slot {probed} is closer to home than step {step} of entry at {index}"
                        );
                    }
                }
            }
        }
    }
}

#[cfg(any(test, feature = "stats"))]
pub use stats::DebugStats;
#[cfg(any(test, feature = "stats"))]
pub use stats::ProbeHistogram;

/// A view into a single entry in the table, which may be vacant or occupied.
///
/// This enum is constructed from the [`entry`] method on [`HashTable`].
///
/// [`entry`]: HashTable::entry
pub enum Entry<'a, V, A: Allocator = Global> {
    /// No value matched.
    Vacant(VacantEntry<'a, V, A>),
    /// A matching value is present.
    Occupied(OccupiedEntry<'a, V, A>),
}

impl<'a, V, A: Allocator> Entry<'a, V, A> {
    /// Inserts `default` if the entry is vacant and returns a mutable
    /// reference to the stored value.
    pub fn or_insert(self, default: V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Like [`Entry::or_insert`], computing the value only when vacant.
    pub fn or_insert_with(self, default: impl FnOnce() -> V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }

    /// Applies `f` to an occupied entry's value. Returns `None` for a vacant
    /// entry without inserting anything.
    pub fn and_modify(self, f: impl FnOnce(&mut V)) -> Option<&'a mut V> {
        match self {
            Entry::Occupied(entry) => {
                let value = entry.into_mut();
                f(value);
                Some(value)
            }
            Entry::Vacant(_) => None,
        }
    }

    /// Inserts `V::default()` if the entry is vacant.
    pub fn or_default(self) -> &'a mut V
    where
        V: Default,
    {
        self.or_insert_with(Default::default)
    }
}

/// A view into a vacant entry in a [`HashTable`].
pub struct VacantEntry<'a, V, A: Allocator = Global> {
    table: &'a mut HashTable<V, A>,
    hash: u64,
}

impl<'a, V, A: Allocator> VacantEntry<'a, V, A> {
    /// Inserts `value`, growing the table first if needed, and returns a
    /// mutable reference to it.
    pub fn insert(self, value: V) -> &'a mut V {
        self.insert_full(value).1
    }

    /// Like [`VacantEntry::insert`], also returning the slot index.
    pub fn insert_full(self, value: V) -> (usize, &'a mut V) {
        let index = self.table.insert_unique(self.hash, value);
        // SAFETY: `insert_unique` returns the slot now holding `value`; the
        // entry's exclusive borrow of the table carries over to the result.
        (index, unsafe { self.table.slots.value_mut(index) })
    }

    /// The hash this entry was looked up with.
    pub fn hash(&self) -> u64 {
        self.hash
    }
}

/// A view into an occupied entry in a [`HashTable`].
pub struct OccupiedEntry<'a, V, A: Allocator = Global> {
    table: &'a mut HashTable<V, A>,
    index: usize,
}

impl<'a, V, A: Allocator> OccupiedEntry<'a, V, A> {
    /// The slot holding the value.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Gets a reference to the value.
    pub fn get(&self) -> &V {
        // SAFETY: The entry was created for an occupied slot and holds the
        // table exclusively, so the slot cannot have changed.
        unsafe { self.table.slots.value(self.index) }
    }

    /// Gets a mutable reference to the value.
    pub fn get_mut(&mut self) -> &mut V {
        // SAFETY: As in `get`; `&mut self` makes the reference exclusive.
        unsafe { self.table.slots.value_mut(self.index) }
    }

    /// Converts the entry into a mutable reference with the entry's lifetime.
    pub fn into_mut(self) -> &'a mut V {
        // SAFETY: As in `get`; the table borrow moves into the result.
        unsafe { self.table.slots.value_mut(self.index) }
    }

    /// Removes the value, closing the gap with a backward shift.
    pub fn remove(self) -> V {
        // SAFETY: The slot is occupied and the growth limit keeps another
        // slot free.
        let value = unsafe { self.table.slots.remove_index(self.index) };
        self.table.len -= 1;
        value
    }
}

/// An iterator over the values of a [`HashTable`] in slot order.
///
/// This struct is created by [`HashTable::iter`].
pub struct Iter<'a, V> {
    tags: &'a [u8],
    buckets: *const MaybeUninit<V>,
    front: usize,
    back: usize,
    remaining: usize,
    _marker: PhantomData<&'a V>,
}

// SAFETY: `Iter` behaves like `&'a [V]`.
unsafe impl<V: Sync> Send for Iter<'_, V> {}
// SAFETY: As above.
unsafe impl<V: Sync> Sync for Iter<'_, V> {}

impl<V> Clone for Iter<'_, V> {
    fn clone(&self) -> Self {
        Self { ..*self }
    }
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        let index = next_occupied(&self.tags[..self.back], self.front)?;
        self.front = index + 1;
        self.remaining -= 1;
        // SAFETY: The tag says the slot is occupied, and the shared borrow of
        // the table keeps it that way for `'a`.
        Some(unsafe { (*self.buckets.add(index)).assume_init_ref() })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> DoubleEndedIterator for Iter<'_, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let index = prev_occupied(self.tags, self.back).filter(|&index| index >= self.front)?;
        self.back = index;
        self.remaining -= 1;
        // SAFETY: As in `next`.
        Some(unsafe { (*self.buckets.add(index)).assume_init_ref() })
    }
}

impl<V> ExactSizeIterator for Iter<'_, V> {}
impl<V> FusedIterator for Iter<'_, V> {}

/// A mutable iterator over the values of a [`HashTable`] in slot order.
///
/// This struct is created by [`HashTable::iter_mut`].
pub struct IterMut<'a, V> {
    tags: &'a [u8],
    buckets: *mut MaybeUninit<V>,
    front: usize,
    back: usize,
    remaining: usize,
    _marker: PhantomData<&'a mut V>,
}

// SAFETY: `IterMut` behaves like `&'a mut [V]`.
unsafe impl<V: Send> Send for IterMut<'_, V> {}
// SAFETY: As above.
unsafe impl<V: Sync> Sync for IterMut<'_, V> {}

impl<'a, V> Iterator for IterMut<'a, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        let index = next_occupied(&self.tags[..self.back], self.front)?;
        self.front = index + 1;
        self.remaining -= 1;
        // SAFETY: Occupied slot, and each index is yielded at most once, so
        // the mutable references are disjoint.
        Some(unsafe { (*self.buckets.add(index)).assume_init_mut() })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> DoubleEndedIterator for IterMut<'_, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let index = prev_occupied(self.tags, self.back).filter(|&index| index >= self.front)?;
        self.back = index;
        self.remaining -= 1;
        // SAFETY: As in `next`.
        Some(unsafe { (*self.buckets.add(index)).assume_init_mut() })
    }
}

impl<V> ExactSizeIterator for IterMut<'_, V> {}
impl<V> FusedIterator for IterMut<'_, V> {}

/// A draining iterator over the values of a [`HashTable`].
///
/// This struct is created by [`HashTable::drain`]. Values not yet yielded
/// are dropped when the iterator is dropped.
pub struct Drain<'a, V, A: Allocator = Global> {
    table: &'a mut HashTable<V, A>,
    index: usize,
}

impl<V, A: Allocator> Iterator for Drain<'_, V, A> {
    type Item = V;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.table.slots.next_occupied(self.index)?;
        self.index = index + 1;
        self.table.len -= 1;
        // SAFETY: Occupied slot. Leaving holes is fine: the table ends up
        // empty once the drain finishes, which is also what `Drop` ensures.
        Some(unsafe { self.table.slots.take(index).1 })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.table.len, Some(self.table.len))
    }
}

impl<V, A: Allocator> Drop for Drain<'_, V, A> {
    fn drop(&mut self) {
        for _ in &mut *self {}
    }
}

impl<V, A: Allocator> ExactSizeIterator for Drain<'_, V, A> {}
impl<V, A: Allocator> FusedIterator for Drain<'_, V, A> {}

/// An owning iterator over the values of a [`HashTable`] in slot order.
pub struct IntoIter<V, A: Allocator = Global> {
    table: HashTable<V, A>,
    front: usize,
    back: usize,
}

impl<V, A: Allocator> Iterator for IntoIter<V, A> {
    type Item = V;

    fn next(&mut self) -> Option<Self::Item> {
        let index = next_occupied(&self.table.slots.tags()[..self.back], self.front)?;
        self.front = index + 1;
        self.table.len -= 1;
        // SAFETY: Occupied slot; the table is never probed again, so holes
        // are harmless and the table's `Drop` handles the rest.
        Some(unsafe { self.table.slots.take(index).1 })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.table.len, Some(self.table.len))
    }
}

impl<V, A: Allocator> DoubleEndedIterator for IntoIter<V, A> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let index = prev_occupied(self.table.slots.tags(), self.back)
            .filter(|&index| index >= self.front)?;
        self.back = index;
        self.table.len -= 1;
        // SAFETY: As in `next`.
        Some(unsafe { self.table.slots.take(index).1 })
    }
}

impl<V, A: Allocator> ExactSizeIterator for IntoIter<V, A> {}
impl<V, A: Allocator> FusedIterator for IntoIter<V, A> {}

impl<V, A: Allocator> IntoIterator for HashTable<V, A> {
    type IntoIter = IntoIter<V, A>;
    type Item = V;

    fn into_iter(self) -> Self::IntoIter {
        let back = self.slots.capacity;
        IntoIter {
            table: self,
            front: 0,
            back,
        }
    }
}

impl<'a, V, A: Allocator> IntoIterator for &'a HashTable<V, A> {
    type IntoIter = Iter<'a, V>;
    type Item = &'a V;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, V, A: Allocator> IntoIterator for &'a mut HashTable<V, A> {
    type IntoIter = IterMut<'a, V>;
    type Item = &'a mut V;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

/// A position in a [`HashTable`]'s slot order.
///
/// A cursor is a non-owning `(table, slot)` pair. Moving it walks to the
/// next or previous occupied slot. The position past the last occupied slot
/// is the end position, with index `capacity()`; stepping forward from the
/// end wraps to the first occupied slot and stepping backward from the first
/// occupied slot lands on the end.
pub struct Cursor<'a, V> {
    tags: &'a [u8],
    buckets: *const MaybeUninit<V>,
    index: usize,
    _marker: PhantomData<&'a V>,
}

impl<V> Clone for Cursor<'_, V> {
    fn clone(&self) -> Self {
        Self { ..*self }
    }
}

impl<'a, V> Cursor<'a, V> {
    /// The slot the cursor is on; `capacity()` at the end position.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns `true` at the end position.
    pub fn is_end(&self) -> bool {
        self.index == self.tags.len()
    }

    /// The value under the cursor, or `None` at the end position.
    pub fn get(&self) -> Option<&'a V> {
        if self.is_end() {
            return None;
        }
        // SAFETY: Cursors only rest on occupied slots or the end, and the
        // shared borrow of the table keeps the slot occupied.
        Some(unsafe { (*self.buckets.add(self.index)).assume_init_ref() })
    }

    /// Moves to the next occupied slot, or to the end.
    pub fn move_next(&mut self) {
        let from = if self.is_end() { 0 } else { self.index + 1 };
        self.index = next_occupied(self.tags, from).unwrap_or(self.tags.len());
    }

    /// Moves to the previous occupied slot, or to the end.
    pub fn move_prev(&mut self) {
        self.index = prev_occupied(self.tags, self.index).unwrap_or(self.tags.len());
    }
}
