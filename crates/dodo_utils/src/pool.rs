use std::num::NonZeroU32;

/// Untyped handle for a [`Pool`] slot.
///
/// A handle is a plain index + generation pair, so it can be freely copied and sent between
/// threads. It doesn't keep the pointed-to value alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolHandle {
    pub index: u32,
    pub generation: NonZeroU32,
}

struct Slot<T> {
    generation: Option<NonZeroU32>,
    value: Option<T>,
}

/// Arena of `T` values addressed with generation-checked [`PoolHandle`]s.
///
/// Every allocation receives a new, pool-wide unique generation, so a stale handle pointing to a
/// reused slot is detected and resolves to nothing.
///
/// Panics only on 32-bit index or generation exhaustion.
///
/// ## Example
/// ```
/// # use dodo_utils::Pool;
/// let mut pool: Pool<u32> = Pool::new();
///
/// let handle = pool.insert(10);
/// assert_eq!(pool.get(handle), Some(&10));
///
/// assert_eq!(pool.remove(handle), Some(10));
/// assert!(pool.get(handle).is_none());
/// ```
pub struct Pool<T> {
    top_generation: NonZeroU32,
    free_indices: Vec<u32>,
    slots: Vec<Slot<T>>,
    len: usize,
}

impl<T> Pool<T> {
    pub fn new() -> Self {
        Self {
            top_generation: NonZeroU32::MIN,
            free_indices: vec![],
            slots: vec![],
            len: 0,
        }
    }

    /// Stores `value` in a free slot (reusing released slots first) and returns its handle.
    pub fn insert(&mut self, value: T) -> PoolHandle {
        let index = match self.free_indices.pop() {
            Some(index) => index,
            None => {
                let index = u32::try_from(self.slots.len()).expect("pool index overflow");
                self.slots.push(Slot {
                    generation: None,
                    value: None,
                });
                index
            }
        };

        let generation = self.top_generation;
        self.top_generation = generation.checked_add(1).expect("pool generation overflow");

        let slot = &mut self.slots[index as usize];
        slot.generation = Some(generation);
        slot.value = Some(value);
        self.len += 1;

        PoolHandle { index, generation }
    }

    /// Releases the slot, returning the stored value. Stale handles return [`None`].
    pub fn remove(&mut self, handle: PoolHandle) -> Option<T> {
        if !self.contains(handle) {
            return None;
        }

        let slot = &mut self.slots[handle.index as usize];
        slot.generation = None;
        self.free_indices.push(handle.index);
        self.len -= 1;
        slot.value.take()
    }

    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == Some(handle.generation))
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == Some(handle.generation))
            .and_then(|slot| slot.value.as_mut())
    }

    #[inline]
    pub fn contains(&self, handle: PoolHandle) -> bool {
        self.slots
            .get(handle.index as usize)
            .map(|slot| slot.generation == Some(handle.generation))
            .unwrap_or(false)
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}
