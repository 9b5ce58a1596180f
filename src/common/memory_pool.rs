//! Fixed-size slot allocator addressed by compact 32-bit keys.
//!
//! Slots live in a growable list of blocks. The first block holds [`INITIAL_BLOCK_CAPACITY`]
//! entries and every following block doubles, up to [`MAX_BLOCK_CAPACITY`] entries, with at most
//! [`MAX_BLOCKS`] blocks. Blocks never shrink and never reallocate, so a value keeps its address
//! for as long as it lives in the pool. Freed slots are recycled through a free list.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::foundation::error::{TableauError, TableauResult};

const INDEX_BITS: u32 = 20;
const INDEX_MASK: u32 = (1 << INDEX_BITS) - 1;

/// Entries in the first block.
pub const INITIAL_BLOCK_CAPACITY: u32 = 32;
/// Largest block size; also the number of distinct entry indices a key can address.
pub const MAX_BLOCK_CAPACITY: u32 = 1 << INDEX_BITS;
/// Upper bound on the number of blocks.
pub const MAX_BLOCKS: usize = 27;

/// Opaque 32-bit handle to a pool slot: block index in the high bits, entry index in the low 20.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct PoolKey(u32);

impl PoolKey {
    fn new(block: usize, entry: usize) -> Self {
        Self(((block as u32) << INDEX_BITS) | (entry as u32 & INDEX_MASK))
    }

    /// Block holding the slot.
    pub fn block(self) -> usize {
        (self.0 >> INDEX_BITS) as usize
    }

    /// Entry within the block.
    pub fn entry(self) -> usize {
        (self.0 & INDEX_MASK) as usize
    }

    /// Raw 32-bit value, suitable for messages and logs.
    pub fn to_raw(self) -> u32 {
        self.0
    }

    /// Rebuild a key from [`PoolKey::to_raw`].
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PoolKey({}:{})", self.block(), self.entry())
    }
}

/// Allocation counters shared by every pool constructed with the same instance.
///
/// Cloning shares the underlying counts, so a test can hand one instance to several pools and
/// observe their combined traffic.
#[derive(Clone, Debug, Default)]
pub struct PoolCounters {
    inner: Arc<CounterCells>,
}

#[derive(Debug, Default)]
struct CounterCells {
    allocations: AtomicU64,
    releases: AtomicU64,
}

impl PoolCounters {
    /// Fresh, zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Slots handed out since construction.
    pub fn allocations(&self) -> u64 {
        self.inner.allocations.load(Ordering::Relaxed)
    }

    /// Slots returned since construction (free, destroy and reset).
    pub fn releases(&self) -> u64 {
        self.inner.releases.load(Ordering::Relaxed)
    }

    /// Slots currently in use.
    pub fn live(&self) -> u64 {
        self.allocations().saturating_sub(self.releases())
    }

    fn record_allocation(&self) {
        self.inner.allocations.fetch_add(1, Ordering::Relaxed);
    }

    fn record_releases(&self, n: u64) {
        self.inner.releases.fetch_add(n, Ordering::Relaxed);
    }
}

#[derive(Debug)]
enum Slot<T> {
    Vacant,
    Reserved,
    Occupied(T),
}

#[derive(Debug)]
struct Block<T> {
    slots: Vec<Slot<T>>,
    capacity: usize,
}

impl<T> Block<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
        }
    }

    fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }
}

/// Single-owner memory pool. All mutation requires `&mut self`.
///
/// Use [`SharedMemoryPool`] where more than one thread needs to allocate or release slots.
#[derive(Debug)]
pub struct FixedSizeMemoryPool<T> {
    blocks: Vec<Block<T>>,
    free_list: Vec<PoolKey>,
    in_use: usize,
    counters: PoolCounters,
}

impl<T> Default for FixedSizeMemoryPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FixedSizeMemoryPool<T> {
    /// Empty pool with private counters.
    pub fn new() -> Self {
        Self::with_counters(PoolCounters::new())
    }

    /// Empty pool reporting into `counters`.
    pub fn with_counters(counters: PoolCounters) -> Self {
        Self {
            blocks: Vec::new(),
            free_list: Vec::new(),
            in_use: 0,
            counters,
        }
    }

    /// Counters this pool reports into.
    pub fn counters(&self) -> &PoolCounters {
        &self.counters
    }

    /// Allocate a slot holding `T::default()`.
    pub fn allocate(&mut self) -> TableauResult<PoolKey>
    where
        T: Default,
    {
        self.allocate_with(T::default())
    }

    /// Allocate a slot holding `value`.
    pub fn allocate_with(&mut self, value: T) -> TableauResult<PoolKey> {
        let key = self.claim_slot()?;
        *self.slot_mut(key)? = Slot::Occupied(value);
        Ok(key)
    }

    /// Reserve an empty slot to be filled later with [`FixedSizeMemoryPool::emplace`].
    ///
    /// The key is stable immediately, so it can be handed to other parties before the value
    /// exists.
    pub fn allocate_raw(&mut self) -> TableauResult<PoolKey> {
        let key = self.claim_slot()?;
        *self.slot_mut(key)? = Slot::Reserved;
        Ok(key)
    }

    /// Construct `value` into a slot reserved by [`FixedSizeMemoryPool::allocate_raw`].
    pub fn emplace(&mut self, key: PoolKey, value: T) -> TableauResult<()> {
        let slot = self.slot_mut(key)?;
        if !matches!(slot, Slot::Reserved) {
            return Err(TableauError::contract(format!(
                "{key:?} is not a reserved slot"
            )));
        }
        *slot = Slot::Occupied(value);
        Ok(())
    }

    /// Release the slot without dropping its value; the value is handed back to the caller.
    ///
    /// Returns `None` for reserved slots (nothing was constructed) and for keys that are not
    /// live, in which case the pool is left untouched.
    pub fn free(&mut self, key: PoolKey) -> Option<T> {
        let slot = self.slot_mut(key).ok()?;
        match std::mem::replace(slot, Slot::Vacant) {
            Slot::Vacant => None,
            Slot::Reserved => {
                self.release_slot(key);
                None
            }
            Slot::Occupied(value) => {
                self.release_slot(key);
                Some(value)
            }
        }
    }

    /// Drop the value in place and release the slot. Returns whether a live slot was released.
    pub fn destroy(&mut self, key: PoolKey) -> bool {
        let live = matches!(
            self.slot(key),
            Some(Slot::Occupied(_)) | Some(Slot::Reserved)
        );
        drop(self.free(key));
        live
    }

    /// Shared access to the value behind `key`.
    pub fn get(&self, key: PoolKey) -> Option<&T> {
        match self.slot(key)? {
            Slot::Occupied(v) => Some(v),
            _ => None,
        }
    }

    /// Exclusive access to the value behind `key`.
    pub fn get_mut(&mut self, key: PoolKey) -> Option<&mut T> {
        match self.slot_mut(key).ok()? {
            Slot::Occupied(v) => Some(v),
            _ => None,
        }
    }

    /// Whether `key` currently addresses a constructed value.
    pub fn contains(&self, key: PoolKey) -> bool {
        self.get(key).is_some()
    }

    /// Recover the key of a value that lives in this pool.
    ///
    /// Address arithmetic against each block's slot range; at most [`MAX_BLOCKS`] comparisons.
    pub fn key_of(&self, value: &T) -> Option<PoolKey> {
        let slot_size = std::mem::size_of::<Slot<T>>();
        if std::mem::size_of::<T>() == 0 || slot_size == 0 {
            return None;
        }
        let addr = value as *const T as usize;
        for (block_index, block) in self.blocks.iter().enumerate() {
            let range = block.slots.as_ptr_range();
            let (start, end) = (range.start as usize, range.end as usize);
            if addr < start || addr >= end {
                continue;
            }
            let entry = (addr - start) / slot_size;
            return match block.slots.get(entry) {
                Some(Slot::Occupied(v)) if std::ptr::eq(v, value) => {
                    Some(PoolKey::new(block_index, entry))
                }
                _ => None,
            };
        }
        None
    }

    /// Number of constructed or reserved slots.
    pub fn len(&self) -> usize {
        self.in_use
    }

    /// `true` when no slot is in use.
    pub fn is_empty(&self) -> bool {
        self.in_use == 0
    }

    /// Total slots across all allocated blocks.
    pub fn capacity(&self) -> usize {
        self.blocks.iter().map(|b| b.capacity).sum()
    }

    /// Number of allocated blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Drop every value and discard all blocks. Outstanding keys become meaningless.
    pub fn reset(&mut self) {
        self.counters.record_releases(self.in_use as u64);
        self.blocks.clear();
        self.free_list.clear();
        self.in_use = 0;
    }

    /// Iterate over live values in key order.
    pub fn iter(&self) -> impl Iterator<Item = (PoolKey, &T)> + '_ {
        self.blocks.iter().enumerate().flat_map(|(b, block)| {
            block.slots.iter().enumerate().filter_map(move |(e, slot)| match slot {
                Slot::Occupied(v) => Some((PoolKey::new(b, e), v)),
                _ => None,
            })
        })
    }

    /// Iterate mutably over live values in key order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (PoolKey, &mut T)> + '_ {
        self.blocks.iter_mut().enumerate().flat_map(|(b, block)| {
            block
                .slots
                .iter_mut()
                .enumerate()
                .filter_map(move |(e, slot)| match slot {
                    Slot::Occupied(v) => Some((PoolKey::new(b, e), v)),
                    _ => None,
                })
        })
    }

    /// Keys of all live values in key order.
    pub fn keys(&self) -> Vec<PoolKey> {
        self.iter().map(|(k, _)| k).collect()
    }

    fn claim_slot(&mut self) -> TableauResult<PoolKey> {
        if let Some(key) = self.free_list.pop() {
            self.in_use += 1;
            self.counters.record_allocation();
            return Ok(key);
        }

        if self.blocks.last().is_none_or(Block::is_full) {
            if self.blocks.len() == MAX_BLOCKS {
                return Err(TableauError::contract("memory pool exhausted"));
            }
            let capacity = next_block_capacity(self.blocks.len());
            self.blocks.push(Block::with_capacity(capacity));
        }

        let block_index = self.blocks.len() - 1;
        let block = &mut self.blocks[block_index];
        let entry = block.slots.len();
        block.slots.push(Slot::Vacant);
        self.in_use += 1;
        self.counters.record_allocation();
        Ok(PoolKey::new(block_index, entry))
    }

    fn release_slot(&mut self, key: PoolKey) {
        self.free_list.push(key);
        self.in_use = self.in_use.saturating_sub(1);
        self.counters.record_releases(1);
    }

    fn slot(&self, key: PoolKey) -> Option<&Slot<T>> {
        self.blocks.get(key.block())?.slots.get(key.entry())
    }

    fn slot_mut(&mut self, key: PoolKey) -> TableauResult<&mut Slot<T>> {
        self.blocks
            .get_mut(key.block())
            .and_then(|b| b.slots.get_mut(key.entry()))
            .ok_or_else(|| TableauError::invalid_handle(format!("{key:?} is outside the pool")))
    }
}

fn next_block_capacity(existing_blocks: usize) -> usize {
    let shift = existing_blocks.min(INDEX_BITS as usize);
    ((INITIAL_BLOCK_CAPACITY as usize) << shift).min(MAX_BLOCK_CAPACITY as usize)
}

/// Memory pool whose allocation and release entry points may be called from any thread.
///
/// Every `*_thread_safe` call takes the internal lock for the duration of that call only.
/// Code that needs several reads or writes in a row takes the lock once through
/// [`SharedMemoryPool::lock`].
#[derive(Debug)]
pub struct SharedMemoryPool<T> {
    inner: Mutex<FixedSizeMemoryPool<T>>,
}

impl<T> Default for SharedMemoryPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SharedMemoryPool<T> {
    /// Empty pool with private counters.
    pub fn new() -> Self {
        Self::with_counters(PoolCounters::new())
    }

    /// Empty pool reporting into `counters`.
    pub fn with_counters(counters: PoolCounters) -> Self {
        Self {
            inner: Mutex::new(FixedSizeMemoryPool::with_counters(counters)),
        }
    }

    /// Lock the pool for a batch of plain operations.
    pub fn lock(&self) -> MutexGuard<'_, FixedSizeMemoryPool<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Unlocked access when the caller already holds the only reference.
    pub fn get_mut(&mut self) -> &mut FixedSizeMemoryPool<T> {
        self.inner.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    /// Thread-safe [`FixedSizeMemoryPool::allocate`].
    pub fn allocate_thread_safe(&self) -> TableauResult<PoolKey>
    where
        T: Default,
    {
        self.lock().allocate()
    }

    /// Thread-safe [`FixedSizeMemoryPool::allocate_with`].
    pub fn allocate_with_thread_safe(&self, value: T) -> TableauResult<PoolKey> {
        self.lock().allocate_with(value)
    }

    /// Thread-safe [`FixedSizeMemoryPool::allocate_raw`].
    pub fn allocate_raw_thread_safe(&self) -> TableauResult<PoolKey> {
        self.lock().allocate_raw()
    }

    /// Thread-safe [`FixedSizeMemoryPool::emplace`].
    pub fn emplace_thread_safe(&self, key: PoolKey, value: T) -> TableauResult<()> {
        self.lock().emplace(key, value)
    }

    /// Thread-safe [`FixedSizeMemoryPool::free`].
    pub fn free_thread_safe(&self, key: PoolKey) -> Option<T> {
        self.lock().free(key)
    }

    /// Thread-safe [`FixedSizeMemoryPool::destroy`].
    ///
    /// The value is dropped after the lock is released.
    pub fn destroy_thread_safe(&self, key: PoolKey) -> bool {
        let mut pool = self.lock();
        let live = pool.contains(key) || pool.is_reserved(key);
        let value = pool.free(key);
        drop(pool);
        drop(value);
        live
    }

    /// Thread-safe [`FixedSizeMemoryPool::capacity`].
    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }
}

impl<T> FixedSizeMemoryPool<T> {
    fn is_reserved(&self, key: PoolKey) -> bool {
        matches!(self.slot(key), Some(Slot::Reserved))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/common/memory_pool.rs"]
mod tests;
