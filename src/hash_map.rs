use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;
use core::iter::FusedIterator;
use core::ops::Index;
use core::ops::Range;

use crate::allocator::Allocator;
use crate::allocator::Global;
use crate::error::LookupError;
use crate::error::TryReserveError;
use crate::hash_table;
use crate::hash_table::Entry as TableEntry;
use crate::hash_table::HashTable;

/// A hash map backed by a Robin Hood [`HashTable`].
///
/// `HashMap<K, V, S, A>` stores key-value pairs where keys implement
/// `Hash + Eq`, hashes keys with the builder `S`, and draws memory from the
/// allocator `A`.
///
/// Unlike `std::collections::HashMap`, [`HashMap::insert`] never replaces an
/// existing value: it reports whether the key was new. Use
/// [`HashMap::insert_or_replace`] or the entry API to overwrite.
///
/// Iteration follows slot order, which depends on the hashes and the
/// capacity, not on insertion order.
///
/// # Performance Characteristics
///
/// - **Memory**: 1 tag byte and a `u64` hash per slot, plus the size of
///   `(K, V)`. At the default load factor of `0.5` at most half the slots are
///   occupied.
/// - **Lookups**: stop early once the probe passes the point where the key
///   would have displaced a resident.
pub struct HashMap<K, V, S, A: Allocator = Global> {
    table: HashTable<(K, V), A>,
    hash_builder: S,
}

impl<K, V, S, A> Clone for HashMap<K, V, S, A>
where
    K: Clone,
    V: Clone,
    S: Clone,
    A: Allocator + Clone,
{
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            hash_builder: self.hash_builder.clone(),
        }
    }
}

impl<K, V, S, A> Debug for HashMap<K, V, S, A>
where
    K: Debug,
    V: Debug,
    A: Allocator,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> HashMap<K, V, S, Global> {
    /// Creates a new hash map with the given hasher builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use robin_hash::HashMap;
    /// #
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let map: HashMap<i32, String, _> = HashMap::with_hasher(SimpleHasher);
    /// assert!(map.is_empty());
    /// ```
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_capacity_and_hasher(0, hash_builder)
    }

    /// Creates a new hash map with at least `capacity` slots and the given
    /// hasher builder.
    ///
    /// `capacity` counts slots, not entries: it is rounded up to a power of
    /// two, and the map grows once its entries exceed
    /// `capacity * max_load_factor()`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use robin_hash::HashMap;
    /// #
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let map: HashMap<i32, String, _> = HashMap::with_capacity_and_hasher(100, SimpleHasher);
    /// assert_eq!(map.capacity(), 128);
    /// ```
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self::with_capacity_and_hasher_in(capacity, hash_builder, Global)
    }
}

impl<K, V, S> HashMap<K, V, S, Global>
where
    S: Default,
{
    /// Creates a new hash map using the default hasher builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// # use robin_hash::DefaultHashBuilder;
    /// # use robin_hash::HashMap;
    /// #
    /// let mut map: HashMap<&str, i32, DefaultHashBuilder> = HashMap::new();
    /// map.insert("a", 1);
    /// assert_eq!(map["a"], 1);
    /// # }
    /// ```
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }

    /// Creates a new hash map with at least `capacity` slots using the
    /// default hasher builder.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, S::default())
    }
}

impl<K, V, S> Default for HashMap<K, V, S, Global>
where
    S: Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S, A: Allocator> HashMap<K, V, S, A> {
    /// Creates a new hash map with the given hasher builder, backed by
    /// `alloc`.
    pub fn with_hasher_in(hash_builder: S, alloc: A) -> Self {
        Self::with_capacity_and_hasher_in(0, hash_builder, alloc)
    }

    /// Creates a new hash map with at least `capacity` slots, the given
    /// hasher builder and allocator.
    pub fn with_capacity_and_hasher_in(capacity: usize, hash_builder: S, alloc: A) -> Self {
        Self {
            table: HashTable::with_capacity_in(capacity, alloc),
            hash_builder,
        }
    }

    /// Fallible version of [`HashMap::with_capacity_and_hasher_in`].
    pub fn try_with_capacity_and_hasher_in(
        capacity: usize,
        hash_builder: S,
        alloc: A,
    ) -> Result<Self, TryReserveError> {
        Ok(Self {
            table: HashTable::try_with_capacity_in(capacity, alloc)?,
            hash_builder,
        })
    }

    /// Returns the hasher builder.
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// Returns the allocator.
    pub fn allocator(&self) -> &A {
        self.table.allocator()
    }

    /// Returns the number of elements in the map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use robin_hash::HashMap;
    /// #
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let mut map = HashMap::with_hasher(SimpleHasher);
    /// assert_eq!(map.len(), 0);
    /// map.insert(1, "a");
    /// assert_eq!(map.len(), 1);
    /// ```
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map contains no elements.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of slots.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Returns `len / capacity`.
    pub fn load_factor(&self) -> f32 {
        self.table.load_factor()
    }

    /// Returns the load factor above which an insert grows the map.
    pub fn max_load_factor(&self) -> f32 {
        self.table.max_load_factor()
    }

    /// Sets the maximum load factor, rehashing at once if the map is already
    /// fuller than `max_load_factor` allows.
    ///
    /// # Panics
    ///
    /// Panics unless `0.0 < max_load_factor <= 1.0`.
    pub fn set_max_load_factor(&mut self, max_load_factor: f32) {
        self.table.set_max_load_factor(max_load_factor);
    }

    /// Rehashes into at least `capacity` slots, never fewer than the current
    /// entries need. Keys are not hashed again.
    pub fn rehash(&mut self, capacity: usize) {
        self.table.rehash(capacity);
    }

    /// Reserves room for at least `additional` more entries.
    pub fn reserve(&mut self, additional: usize) {
        self.table.reserve(additional);
    }

    /// Fallible version of [`HashMap::reserve`].
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        self.table.try_reserve(additional)
    }

    /// Shrinks the map to the smallest capacity that holds its entries.
    pub fn shrink_to_fit(&mut self) {
        self.table.shrink_to_fit();
    }

    /// Clears the map, removing all key-value pairs and keeping the
    /// capacity.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Returns an iterator over the key-value pairs in slot order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Returns an iterator over the key-value pairs with mutable values.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            inner: self.table.iter_mut(),
        }
    }

    /// Returns an iterator over the keys.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Returns an iterator over the values.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Returns an iterator over mutable references to the values.
    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    /// Removes and yields every key-value pair, keeping the capacity.
    pub fn drain(&mut self) -> Drain<'_, K, V, A> {
        Drain {
            inner: self.table.drain(),
        }
    }

    /// Keeps only the pairs for which `f` returns `true`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// # use robin_hash::DefaultHashBuilder;
    /// # use robin_hash::HashMap;
    /// #
    /// let mut map: HashMap<i32, i32, DefaultHashBuilder> = (0..8).map(|i| (i, i * 10)).collect();
    /// map.retain(|&k, _| k % 2 == 0);
    /// assert_eq!(map.len(), 4);
    /// # }
    /// ```
    pub fn retain(&mut self, mut f: impl FnMut(&K, &mut V) -> bool) {
        self.table.retain(|(k, v)| f(k, v));
    }

    /// Returns a cursor on the first occupied slot.
    pub fn cursor_front(&self) -> hash_table::Cursor<'_, (K, V)> {
        self.table.cursor_front()
    }

    /// Returns the pair stored in slot `index`, if any.
    pub fn get_at(&self, index: usize) -> Option<(&K, &V)> {
        self.table.get_at(index).map(|(k, v)| (k, v))
    }

    /// Removes the pair stored in slot `index`.
    ///
    /// Returns the pair and the next position in slot order, which starts at
    /// `index` itself because the following entry may shift back into it.
    /// See [`HashTable::remove_at`].
    pub fn remove_at(&mut self, index: usize) -> Option<((K, V), Option<usize>)> {
        self.table.remove_at(index)
    }

    /// Removes every pair stored in the slot range. See
    /// [`HashTable::remove_range`].
    pub fn remove_range(&mut self, range: Range<usize>) -> Option<usize> {
        self.table.remove_range(range)
    }

    /// Returns `true` when both maps hold equal pairs in the same slot order.
    ///
    /// Two maps built with the same hasher, capacity and sequence of
    /// operations compare equal here; content-equal maps that grew
    /// differently may not. `==` compares contents only.
    pub fn slot_order_eq(&self, other: &Self) -> bool
    where
        K: PartialEq,
        V: PartialEq,
    {
        self.len() == other.len() && self.iter().eq(other.iter())
    }

    /// Clones the map into one backed by `alloc`, keeping every pair in its
    /// slot.
    pub fn clone_in<B: Allocator>(&self, alloc: B) -> HashMap<K, V, S, B>
    where
        K: Clone,
        V: Clone,
        S: Clone,
    {
        HashMap {
            table: self.table.clone_in(alloc),
            hash_builder: self.hash_builder.clone(),
        }
    }

    /// Moves the map onto `alloc`. See [`HashTable::move_in`].
    pub fn move_in(self, alloc: A) -> Self {
        Self {
            table: self.table.move_in(alloc),
            hash_builder: self.hash_builder,
        }
    }

    /// Move-assigns `source` into `self`, leaving `source` empty.
    ///
    /// `self` takes `source`'s hasher builder along with its pairs, and
    /// `source` gets a clone of it so it stays usable.
    pub fn assign_from(&mut self, source: &mut Self)
    where
        S: Clone,
        A: Clone,
    {
        self.table.assign_from(&mut source.table);
        self.hash_builder = source.hash_builder.clone();
    }
}

impl<K, V, S, A> HashMap<K, V, S, A>
where
    K: Hash + Eq,
    S: BuildHasher,
    A: Allocator,
{
    #[inline]
    fn hash<Q: Hash + ?Sized>(&self, key: &Q) -> u64 {
        self.hash_builder.hash_one(key)
    }

    /// Inserts a key-value pair if the key is absent.
    ///
    /// Returns `true` if the pair was inserted. An existing value is left
    /// untouched and the new key and value are dropped.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use robin_hash::HashMap;
    /// #
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let mut map = HashMap::with_hasher(SimpleHasher);
    /// assert!(map.insert(37, "a"));
    /// assert!(!map.insert(37, "b"));
    /// assert_eq!(map.get(&37), Some(&"a"));
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> bool {
        self.insert_full(key, value).1
    }

    /// Like [`HashMap::insert`], also returning the slot of the key's pair.
    ///
    /// The slot is only valid until the next insertion or removal.
    pub fn insert_full(&mut self, key: K, value: V) -> (usize, bool) {
        let hash = self.hash(&key);
        match self.table.entry(hash, |(k, _)| *k == key) {
            TableEntry::Occupied(entry) => (entry.index(), false),
            TableEntry::Vacant(entry) => (entry.insert_full((key, value)).0, true),
        }
    }

    /// Inserts a key-value pair, replacing and returning any previous value.
    ///
    /// The stored key is kept when the value is replaced.
    pub fn insert_or_replace(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.hash(&key);
        match self.table.entry(hash, |(k, _)| *k == key) {
            TableEntry::Occupied(mut entry) => Some(core::mem::replace(&mut entry.get_mut().1, value)),
            TableEntry::Vacant(entry) => {
                entry.insert((key, value));
                None
            }
        }
    }

    /// Returns the value for `key`, inserting `V::default()` first if the
    /// key is absent.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// # use robin_hash::DefaultHashBuilder;
    /// # use robin_hash::HashMap;
    /// #
    /// let mut counts: HashMap<char, usize, DefaultHashBuilder> = HashMap::new();
    /// for c in "hello".chars() {
    ///     *counts.get_or_insert_default(c) += 1;
    /// }
    /// assert_eq!(counts[&'l'], 2);
    /// # }
    /// ```
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        self.entry(key).or_default()
    }

    /// Gets the entry for `key` for in-place manipulation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use robin_hash::HashMap;
    /// #
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let mut map = HashMap::with_hasher(SimpleHasher);
    /// map.entry("poneyland").or_insert(3);
    /// *map.entry("poneyland").or_insert(10) *= 2;
    /// assert_eq!(map.get(&"poneyland"), Some(&6));
    /// ```
    pub fn entry(&mut self, key: K) -> Entry<'_, K, V, A> {
        let hash = self.hash(&key);
        match self.table.entry(hash, |(k, _)| *k == key) {
            TableEntry::Occupied(entry) => Entry::Occupied(OccupiedEntry { entry }),
            TableEntry::Vacant(entry) => Entry::Vacant(VacantEntry { entry, key }),
        }
    }

    /// Returns a reference to the value for `key`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use robin_hash::HashMap;
    /// #
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let mut map = HashMap::with_hasher(SimpleHasher);
    /// map.insert(String::from("a"), 1);
    /// assert_eq!(map.get("a"), Some(&1));
    /// assert_eq!(map.get("b"), None);
    /// ```
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_key_value(key).map(|(_, v)| v)
    }

    /// Returns the stored key and value for `key`.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash(key);
        self.table
            .find(hash, |(k, _)| k.borrow() == key)
            .map(|(k, v)| (k, v))
    }

    /// Returns a mutable reference to the value for `key`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash(key);
        self.table
            .find_mut(hash, |(k, _)| k.borrow() == key)
            .map(|(_, v)| v)
    }

    /// Returns the value for `key`, or [`LookupError`] if it is absent.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// # use robin_hash::DefaultHashBuilder;
    /// # use robin_hash::HashMap;
    /// # use robin_hash::LookupError;
    /// #
    /// let mut map: HashMap<u32, &str, DefaultHashBuilder> = HashMap::new();
    /// map.insert(1, "one");
    /// assert_eq!(map.at(&1), Ok(&"one"));
    /// assert_eq!(map.at(&2), Err(LookupError));
    /// # }
    /// ```
    pub fn at<Q>(&self, key: &Q) -> Result<&V, LookupError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).ok_or(LookupError)
    }

    /// Mutable version of [`HashMap::at`].
    pub fn at_mut<Q>(&mut self, key: &Q) -> Result<&mut V, LookupError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_mut(key).ok_or(LookupError)
    }

    /// Returns `true` if the map contains `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find_index(key).is_some()
    }

    /// Returns the slot holding `key`'s pair.
    ///
    /// The slot is only valid until the next insertion or removal.
    pub fn find_index<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash(key);
        self.table.find_index(hash, |(k, _)| k.borrow() == key)
    }

    /// Removes `key` from the map, returning its value.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use robin_hash::HashMap;
    /// #
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let mut map = HashMap::with_hasher(SimpleHasher);
    /// map.insert(1, "a");
    /// assert_eq!(map.remove(&1), Some("a"));
    /// assert_eq!(map.remove(&1), None);
    /// ```
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_entry(key).map(|(_, v)| v)
    }

    /// Removes `key` from the map, returning the stored key and value.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash(key);
        self.table.remove(hash, |(k, _)| k.borrow() == key)
    }
}

impl<K, V, S, A> PartialEq for HashMap<K, V, S, A>
where
    K: Hash + Eq,
    V: PartialEq,
    S: BuildHasher,
    A: Allocator,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|other_v| v == other_v))
    }
}

impl<K, V, S, A> Eq for HashMap<K, V, S, A>
where
    K: Hash + Eq,
    V: Eq,
    S: BuildHasher,
    A: Allocator,
{
}

impl<K, Q, V, S, A> Index<&Q> for HashMap<K, V, S, A>
where
    K: Hash + Eq + Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    S: BuildHasher,
    A: Allocator,
{
    type Output = V;

    /// # Panics
    ///
    /// Panics if `key` is not present; use [`HashMap::at`] to get an error
    /// instead.
    fn index(&self, key: &Q) -> &V {
        match self.get(key) {
            Some(value) => value,
            None => panic!("{}", LookupError),
        }
    }
}

/// Pairs whose key is already present are dropped, as with
/// [`HashMap::insert`].
impl<K, V, S, A> Extend<(K, V)> for HashMap<K, V, S, A>
where
    K: Hash + Eq,
    S: BuildHasher,
    A: Allocator,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        let iter = iter.into_iter();
        let additional = if self.is_empty() {
            iter.size_hint().0
        } else {
            iter.size_hint().0.div_ceil(2)
        };
        self.reserve(additional);
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for HashMap<K, V, S, Global>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K, V, S, A: Allocator> IntoIterator for HashMap<K, V, S, A> {
    type IntoIter = IntoIter<K, V, A>;
    type Item = (K, V);

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            inner: self.table.into_iter(),
        }
    }
}

impl<'a, K, V, S, A: Allocator> IntoIterator for &'a HashMap<K, V, S, A> {
    type IntoIter = Iter<'a, K, V>;
    type Item = (&'a K, &'a V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, S, A: Allocator> IntoIterator for &'a mut HashMap<K, V, S, A> {
    type IntoIter = IterMut<'a, K, V>;
    type Item = (&'a K, &'a mut V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

/// A view into a single entry in the map, which may either be vacant or
/// occupied.
///
/// This enum is constructed from the [`entry`] method on [`HashMap`].
///
/// [`entry`]: HashMap::entry
pub enum Entry<'a, K, V, A: Allocator = Global> {
    /// A vacant entry.
    Vacant(VacantEntry<'a, K, V, A>),
    /// An occupied entry.
    Occupied(OccupiedEntry<'a, K, V, A>),
}

impl<'a, K, V, A: Allocator> Entry<'a, K, V, A> {
    /// Inserts `default` if the entry is vacant and returns a mutable
    /// reference to the value.
    pub fn or_insert(self, default: V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Inserts a value computed from a closure if the entry is vacant.
    pub fn or_insert_with<F>(self, default: F) -> &'a mut V
    where
        F: FnOnce() -> V,
    {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }

    /// Provides in-place mutable access to an occupied entry before any
    /// potential inserts.
    pub fn and_modify<F>(self, f: F) -> Self
    where
        F: FnOnce(&mut V),
    {
        match self {
            Entry::Occupied(mut entry) => {
                f(entry.get_mut());
                Entry::Occupied(entry)
            }
            Entry::Vacant(entry) => Entry::Vacant(entry),
        }
    }

    /// Returns a reference to this entry's key.
    pub fn key(&self) -> &K {
        match self {
            Entry::Occupied(entry) => entry.key(),
            Entry::Vacant(entry) => entry.key(),
        }
    }
}

impl<'a, K, V, A> Entry<'a, K, V, A>
where
    V: Default,
    A: Allocator,
{
    /// Inserts `V::default()` if the entry is vacant.
    pub fn or_default(self) -> &'a mut V {
        self.or_insert_with(Default::default)
    }
}

/// A view into a vacant entry in the map.
pub struct VacantEntry<'a, K, V, A: Allocator = Global> {
    entry: hash_table::VacantEntry<'a, (K, V), A>,
    key: K,
}

impl<'a, K, V, A: Allocator> VacantEntry<'a, K, V, A> {
    /// Gets a reference to the key that would be used when inserting.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Takes ownership of the key.
    pub fn into_key(self) -> K {
        self.key
    }

    /// Inserts the value and returns a mutable reference to it.
    pub fn insert(self, value: V) -> &'a mut V {
        &mut self.entry.insert((self.key, value)).1
    }
}

/// A view into an occupied entry in the map.
pub struct OccupiedEntry<'a, K, V, A: Allocator = Global> {
    entry: hash_table::OccupiedEntry<'a, (K, V), A>,
}

impl<'a, K, V, A: Allocator> OccupiedEntry<'a, K, V, A> {
    /// Gets a reference to the key in the entry.
    pub fn key(&self) -> &K {
        &self.entry.get().0
    }

    /// Gets a reference to the value in the entry.
    pub fn get(&self) -> &V {
        &self.entry.get().1
    }

    /// Gets a mutable reference to the value in the entry.
    pub fn get_mut(&mut self) -> &mut V {
        &mut self.entry.get_mut().1
    }

    /// Converts the entry into a mutable reference to the value.
    pub fn into_mut(self) -> &'a mut V {
        &mut self.entry.into_mut().1
    }

    /// Replaces the value and returns the old one.
    pub fn insert(&mut self, value: V) -> V {
        core::mem::replace(&mut self.entry.get_mut().1, value)
    }

    /// Removes the entry and returns the value.
    pub fn remove(self) -> V {
        self.entry.remove().1
    }

    /// Removes the entry and returns the key and value.
    pub fn remove_entry(self) -> (K, V) {
        self.entry.remove()
    }
}

/// An iterator over the key-value pairs of a `HashMap`.
pub struct Iter<'a, K, V> {
    inner: hash_table::Iter<'a, (K, V)>,
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

/// A mutable iterator over the key-value pairs of a `HashMap`.
pub struct IterMut<'a, K, V> {
    inner: hash_table::IterMut<'a, (K, V)>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (&*k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}
impl<K, V> FusedIterator for IterMut<'_, K, V> {}

/// An iterator over the keys of a `HashMap`.
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}

/// An iterator over the values of a `HashMap`.
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}

/// A mutable iterator over the values of a `HashMap`.
pub struct ValuesMut<'a, K, V> {
    inner: IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for ValuesMut<'_, K, V> {}

/// A draining iterator over the key-value pairs of a `HashMap`.
pub struct Drain<'a, K, V, A: Allocator = Global> {
    inner: hash_table::Drain<'a, (K, V), A>,
}

impl<K, V, A: Allocator> Iterator for Drain<'_, K, V, A> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V, A: Allocator> ExactSizeIterator for Drain<'_, K, V, A> {}

/// An owning iterator over the key-value pairs of a `HashMap`.
pub struct IntoIter<K, V, A: Allocator = Global> {
    inner: hash_table::IntoIter<(K, V), A>,
}

impl<K, V, A: Allocator> Iterator for IntoIter<K, V, A> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V, A: Allocator> ExactSizeIterator for IntoIter<K, V, A> {}

#[cfg(test)]
mod tests {
    use alloc::format;
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec::Vec;
    use core::hash::BuildHasher;
    use core::hash::Hasher;

    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use siphasher::sip::SipHasher;

    use super::*;
    use crate::allocator::testing::TrackingAllocator;

    #[derive(Clone)]
    struct SipHashBuilder {
        k1: u64,
        k2: u64,
    }

    impl BuildHasher for SipHashBuilder {
        type Hasher = SipHasher;

        fn build_hasher(&self) -> Self::Hasher {
            SipHasher::new_with_keys(self.k1, self.k2)
        }
    }

    impl Default for SipHashBuilder {
        fn default() -> Self {
            let mut rng = OsRng;
            Self {
                k1: rng.try_next_u64().unwrap_or(0),
                k2: rng.try_next_u64().unwrap_or(0),
            }
        }
    }

    /// Hashes a `u64` key to itself, so tests control home slots.
    #[derive(Clone, Default)]
    struct IdentityBuilder;

    #[derive(Default)]
    struct IdentityHasher(u64);

    impl Hasher for IdentityHasher {
        fn finish(&self) -> u64 {
            self.0
        }

        fn write(&mut self, bytes: &[u8]) {
            for &b in bytes {
                self.0 = (self.0 << 8) | b as u64;
            }
        }

        fn write_u64(&mut self, n: u64) {
            self.0 = n;
        }
    }

    impl BuildHasher for IdentityBuilder {
        type Hasher = IdentityHasher;

        fn build_hasher(&self) -> Self::Hasher {
            IdentityHasher::default()
        }
    }

    #[test]
    fn test_new_and_with_hasher() {
        let map: HashMap<i32, String, SipHashBuilder> = HashMap::new();
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);

        let map2 = HashMap::<i32, String, _>::with_hasher(SipHashBuilder::default());
        assert!(map2.is_empty());
        assert_eq!(map2.max_load_factor(), 0.5);
    }

    #[test]
    fn test_with_capacity() {
        let map: HashMap<i32, String, SipHashBuilder> = HashMap::with_capacity(100);
        assert_eq!(map.capacity(), 128);
        assert!(map.is_empty());

        let map2: HashMap<i32, String, SipHashBuilder> = HashMap::with_capacity(1);
        assert_eq!(map2.capacity(), 16);
    }

    #[test]
    fn test_insert_does_not_overwrite() {
        let mut map = HashMap::with_hasher(SipHashBuilder::default());

        assert!(map.insert(1, "hello".to_string()));
        assert_eq!(map.len(), 1);
        assert!(!map.insert(1, "world".to_string()));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&1), Some(&"hello".to_string()));

        assert_eq!(
            map.insert_or_replace(1, "world".to_string()),
            Some("hello".to_string())
        );
        assert_eq!(map.get(&1), Some(&"world".to_string()));
        assert_eq!(map.insert_or_replace(2, "two".to_string()), None);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_insert_full_reports_slot() {
        let mut map = HashMap::with_hasher(IdentityBuilder);
        let (slot, inserted) = map.insert_full(5u64, 'a');
        assert!(inserted);
        assert_eq!(slot, 5);
        assert_eq!(map.get_at(slot), Some((&5, &'a')));
        assert_eq!(map.insert_full(5u64, 'b'), (5, false));
        assert_eq!(map.find_index(&5), Some(5));
    }

    #[test]
    fn test_get_mut() {
        let mut map = HashMap::with_hasher(SipHashBuilder::default());
        map.insert(1, "hello".to_string());

        if let Some(value) = map.get_mut(&1) {
            value.push_str(" world");
        }

        assert_eq!(map.get(&1), Some(&"hello world".to_string()));
        assert_eq!(map.get_mut(&2), None);
    }

    #[test]
    fn test_borrowed_lookup() {
        let mut map = HashMap::with_hasher(SipHashBuilder::default());
        map.insert("alpha".to_string(), 1);
        map.insert("beta".to_string(), 2);

        assert_eq!(map.get("alpha"), Some(&1));
        assert_eq!(map.get_key_value("beta"), Some((&"beta".to_string(), &2)));
        assert!(map.contains_key("beta"));
        assert_eq!(map.remove("alpha"), Some(1));
        assert!(!map.contains_key("alpha"));
    }

    #[test]
    fn test_at_and_index() {
        let mut map = HashMap::with_hasher(SipHashBuilder::default());
        map.insert(3, 30);

        assert_eq!(map.at(&3), Ok(&30));
        assert_eq!(map.at(&4), Err(LookupError));
        *map.at_mut(&3).unwrap() += 1;
        assert_eq!(map[&3], 31);
        assert_eq!(map.at_mut(&4), Err(LookupError));
    }

    #[test]
    #[should_panic(expected = "key not present in map")]
    fn test_index_missing_panics() {
        let map: HashMap<i32, i32, SipHashBuilder> = HashMap::new();
        let _ = map[&1];
    }

    #[test]
    fn test_get_or_insert_default() {
        let mut map: HashMap<&str, Vec<i32>, SipHashBuilder> = HashMap::new();
        map.get_or_insert_default("a").push(1);
        map.get_or_insert_default("a").push(2);
        map.get_or_insert_default("b");
        assert_eq!(map.len(), 2);
        assert_eq!(map[&"a"], [1, 2]);
        assert!(map[&"b"].is_empty());
    }

    #[test]
    fn test_remove() {
        let mut map = HashMap::with_hasher(SipHashBuilder::default());
        map.insert(1, "hello".to_string());
        map.insert(2, "world".to_string());

        assert_eq!(map.remove(&1), Some("hello".to_string()));
        assert_eq!(map.len(), 1);
        assert!(!map.contains_key(&1));
        assert!(map.contains_key(&2));
        assert_eq!(map.remove(&1), None);

        assert_eq!(map.remove_entry(&2), Some((2, "world".to_string())));
        assert!(map.is_empty());
    }

    #[test]
    fn test_entry_api() {
        let mut map = HashMap::with_hasher(SipHashBuilder::default());

        match map.entry("key") {
            Entry::Vacant(entry) => {
                assert_eq!(entry.key(), &"key");
                entry.insert(1);
            }
            Entry::Occupied(_) => panic!("should be vacant"),
        }

        let value = map.entry("key").and_modify(|v| *v += 10).or_insert(0);
        assert_eq!(*value, 11);

        match map.entry("key") {
            Entry::Occupied(mut entry) => {
                assert_eq!(entry.key(), &"key");
                assert_eq!(entry.insert(5), 11);
                assert_eq!(entry.remove_entry(), ("key", 5));
            }
            Entry::Vacant(_) => panic!("should be occupied"),
        }
        assert!(map.is_empty());

        *map.entry("other").or_insert_with(|| 7) += 1;
        assert_eq!(map.get(&"other"), Some(&8));
    }

    #[test]
    fn test_scenario_capacity_sixteen() {
        let mut map = HashMap::with_capacity_and_hasher(16, IdentityBuilder);
        for k in [50u64, 150, 250, 350, 450] {
            assert!(map.insert(k, k * 2));
        }
        assert_eq!(map.capacity(), 16);
        assert_eq!(map.get(&250), Some(&500));

        assert_eq!(map.remove(&250), Some(500));
        assert_eq!(map.get(&250), None);
        assert_eq!(map.get(&350), Some(&700));
        assert_eq!(map.len(), 4);
        map.table.assert_invariants();
    }

    #[test]
    fn test_grow_from_capacity_one() {
        let mut map = HashMap::with_capacity_and_hasher(1, SipHashBuilder::default());
        for k in 1..=17 {
            map.insert(k, k);
        }
        assert!(map.capacity() >= 32);
        for k in 1..=17 {
            assert_eq!(map.get(&k), Some(&k));
        }
    }

    #[test]
    fn test_many_rehashes_with_colliding_low_bits() {
        let mut map = HashMap::with_hasher(IdentityBuilder);
        // Keys agree in their low 8 bits, so they share a home until the
        // capacity passes 256 and then split into a few groups.
        for i in 0..300u64 {
            map.insert(i << 8, i);
            assert!(map.load_factor() <= map.max_load_factor());
        }
        assert!(map.capacity() >= 1024);
        for i in 0..300u64 {
            assert_eq!(map.get(&(i << 8)), Some(&i));
        }
        map.table.assert_invariants();
    }

    #[test]
    fn test_iteration() {
        let mut map = HashMap::with_hasher(SipHashBuilder::default());
        for i in 0..50 {
            map.insert(i, i * 2);
        }

        let mut pairs: Vec<_> = map.iter().map(|(&k, &v)| (k, v)).collect();
        pairs.sort_unstable();
        assert_eq!(pairs, (0..50).map(|i| (i, i * 2)).collect::<Vec<_>>());
        assert_eq!(map.iter().len(), 50);

        let mut keys: Vec<_> = map.keys().copied().collect();
        keys.sort_unstable();
        assert_eq!(keys, (0..50).collect::<Vec<_>>());

        for v in map.values_mut() {
            *v += 1;
        }
        for (k, v) in map.iter_mut() {
            assert_eq!(*v, k * 2 + 1);
        }
        assert_eq!(map.values().sum::<i32>(), (0..50).map(|i| i * 2 + 1).sum());

        let mut owned: Vec<_> = map.into_iter().collect();
        owned.sort_unstable();
        assert_eq!(owned.len(), 50);
    }

    #[test]
    fn test_drain_and_clear() {
        let mut map = HashMap::with_hasher(SipHashBuilder::default());
        for i in 0..10 {
            map.insert(i, format!("v{i}"));
        }
        let capacity = map.capacity();

        let mut drained: Vec<_> = map.drain().collect();
        drained.sort_unstable();
        assert_eq!(drained.len(), 10);
        assert_eq!(drained[3], (3, "v3".to_string()));
        assert!(map.is_empty());
        assert_eq!(map.capacity(), capacity);

        map.insert(1, "again".to_string());
        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.get(&1), None);
    }

    #[test]
    fn test_retain() {
        let mut map = HashMap::with_hasher(SipHashBuilder::default());
        for i in 0..200 {
            map.insert(i, i);
        }
        map.retain(|k, v| {
            *v += 1;
            k % 4 == 0
        });
        assert_eq!(map.len(), 50);
        for i in 0..200 {
            assert_eq!(map.get(&i).copied(), (i % 4 == 0).then_some(i + 1));
        }
        map.table.assert_invariants();
    }

    #[test]
    fn test_remove_at_walk_erases_everything() {
        let mut map = HashMap::with_hasher(SipHashBuilder::default());
        for i in 0..100 {
            map.insert(i, i);
        }

        let mut removed = 0;
        let mut next = Some(map.cursor_front().index());
        while let Some(index) = next {
            let ((k, v), after) = map.remove_at(index).unwrap();
            assert_eq!(k, v);
            removed += 1;
            next = after;
        }
        assert_eq!(removed, 100);
        assert!(map.is_empty());
    }

    #[test]
    fn test_remove_range() {
        let mut map = HashMap::with_capacity_and_hasher(64, IdentityBuilder);
        for k in 0..20u64 {
            map.insert(k, k);
        }
        map.remove_range(5..10);
        assert_eq!(map.len(), 15);
        for k in 0..20u64 {
            assert_eq!(map.contains_key(&k), !(5..10).contains(&k));
        }
    }

    #[test]
    fn test_slot_indices_invalidated_by_removal() {
        let mut map = HashMap::with_capacity_and_hasher(16, IdentityBuilder);
        map.insert(16u64, 'a');
        map.insert(32u64, 'b');
        let slot_of_b = map.find_index(&32).unwrap();
        assert_eq!(slot_of_b, 1);

        map.remove(&16);
        assert_eq!(map.get_at(slot_of_b), None);
        assert_eq!(map.find_index(&32), Some(0));
    }

    #[test]
    fn test_load_factor_controls() {
        let mut map = HashMap::with_hasher(SipHashBuilder::default());
        for i in 0..12 {
            map.insert(i, ());
        }
        assert_eq!(map.capacity(), 32);
        map.set_max_load_factor(0.25);
        assert_eq!(map.capacity(), 64);
        assert!(map.load_factor() <= 0.25);

        map.rehash(512);
        assert_eq!(map.capacity(), 512);
        map.shrink_to_fit();
        assert_eq!(map.capacity(), 64);

        map.reserve(100);
        assert!(map.capacity() as f32 * 0.25 >= 112.0);
        assert!(map.try_reserve(usize::MAX).is_err());
    }

    #[test]
    fn test_equality() {
        let builder = SipHashBuilder::default();
        let mut a = HashMap::with_hasher(builder.clone());
        let mut b = HashMap::with_capacity_and_hasher(256, builder.clone());
        for i in 0..20 {
            a.insert(i, i);
        }
        for i in (0..20).rev() {
            b.insert(i, i);
        }
        assert_eq!(a, b);
        assert!(!a.slot_order_eq(&b));

        let c = a.clone();
        assert!(a.slot_order_eq(&c));

        b.insert_or_replace(3, 300);
        assert_ne!(a, b);
        b.insert_or_replace(3, 3);
        b.remove(&4);
        assert_ne!(a, b);
    }

    #[test]
    fn test_extend_and_from_iter() {
        let mut map: HashMap<i32, &str, SipHashBuilder> =
            [(1, "one"), (2, "two")].into_iter().collect();
        map.extend([(2, "deux"), (3, "three")]);
        assert_eq!(map.len(), 3);
        assert_eq!(map[&2], "two");
        assert_eq!(map[&3], "three");
    }

    #[test]
    fn test_debug_format() {
        let mut map = HashMap::with_hasher(SipHashBuilder::default());
        map.insert(1, "a");
        assert_eq!(format!("{map:?}"), r#"{1: "a"}"#);
    }

    #[test]
    fn test_allocator_transfers() {
        let a = TrackingAllocator::new(1);
        let b = TrackingAllocator::new(2);
        let builder = SipHashBuilder::default();

        let mut map = HashMap::with_hasher_in(builder.clone(), a.clone());
        for i in 0..40 {
            map.insert(i, i.to_string());
        }

        let copy = map.clone_in(b.clone());
        assert_eq!(copy, map);
        assert!(copy.slot_order_eq(&map));
        drop(copy);
        assert_eq!(b.live_blocks(), 0);

        let moved = map.move_in(b.clone());
        assert_eq!(a.live_blocks(), 0);
        assert_eq!(b.live_blocks(), 1);
        assert_eq!(moved.len(), 40);
        assert_eq!(moved.get(&7), Some(&"7".to_string()));

        let mut target = HashMap::with_hasher_in(builder, a.clone());
        target.insert(-1, "gone".to_string());
        let mut source = moved;
        target.assign_from(&mut source);
        assert!(source.is_empty());
        assert_eq!(target.len(), 40);
        assert_eq!(target.get(&-1), None);
        assert_eq!(target.allocator(), &a);
        assert_eq!(target.get(&39), Some(&"39".to_string()));
    }
}
