//! Typed slot storage with lightweight handles
//!
//! Every graph object lives in an [`Arena`] and is named by a [`Handle`], a
//! copyable slot index. Freed slots are recycled through a free list. Handles
//! are not generation-checked: the graph layer guarantees that a handle is
//! never used after its slot is released. Releasing a slot requires an
//! [`Unlinked`] token, which only the code that removes an object from all of
//! its containers hands out.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// A typed index into an [`Arena`].
pub struct Handle<T> {
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// The distinguished handle that never names a live slot.
    pub const NULL: Self = Handle {
        index: u32::MAX,
        _marker: PhantomData,
    };

    fn new(index: usize) -> Self {
        assert!(index < u32::MAX as usize, "Arena capacity exceeded");
        Handle {
            index: index as u32,
            _marker: PhantomData,
        }
    }

    /// Returns the slot index.
    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }

    /// Returns `true` for [`Handle::NULL`].
    #[inline]
    pub fn is_null(self) -> bool {
        self.index == u32::MAX
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.index.cmp(&other.index)
    }
}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "#null")
        } else {
            write!(f, "#{}", self.index)
        }
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::NULL
    }
}

/// Proof that an object has been removed from every container that refers
/// to it. [`Arena::free`] only accepts this token.
#[derive(Debug)]
#[must_use = "an unlinked object must be freed"]
pub struct Unlinked<T> {
    handle: Handle<T>,
}

impl<T> Unlinked<T> {
    /// Issued by the unlinking code of the owning entity.
    pub(crate) fn new(handle: Handle<T>) -> Self {
        Unlinked { handle }
    }

    /// The handle that is about to be released.
    pub fn handle(&self) -> Handle<T> {
        self.handle
    }
}

#[derive(Debug, Clone)]
enum Slot<T> {
    Occupied(T),
    Free(Option<u32>),
}

/// Slot storage for values of type `T`.
#[derive(Debug, Clone)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Arena {
            slots: Vec::new(),
            free_head: None,
            len: 0,
        }
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if there are no live values.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores a value and returns its handle. Freed slots are reused first.
    pub fn allocate(&mut self, value: T) -> Handle<T> {
        self.len += 1;
        match self.free_head {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                self.free_head = match slot {
                    Slot::Free(next) => *next,
                    Slot::Occupied(_) => panic!("Arena free list points at a live slot"),
                };
                *slot = Slot::Occupied(value);
                Handle::new(index as usize)
            }
            None => {
                self.slots.push(Slot::Occupied(value));
                Handle::new(self.slots.len() - 1)
            }
        }
    }

    /// Releases the slot of an unlinked object and returns the value.
    pub fn free(&mut self, token: Unlinked<T>) -> T {
        let index = token.handle.index();
        assert!(index < self.slots.len(), "Freeing out-of-range handle {:?}", token.handle);
        let slot = std::mem::replace(&mut self.slots[index], Slot::Free(self.free_head));
        match slot {
            Slot::Occupied(value) => {
                self.free_head = Some(index as u32);
                self.len -= 1;
                value
            }
            Slot::Free(_) => panic!("Double free of handle {:?}", token.handle),
        }
    }

    /// Returns `true` if the handle names a live value.
    pub fn contains(&self, handle: Handle<T>) -> bool {
        matches!(self.slots.get(handle.index()), Some(Slot::Occupied(_)))
    }

    /// Returns the value, or `None` for a free or out-of-range handle.
    pub fn try_get(&self, handle: Handle<T>) -> Option<&T> {
        match self.slots.get(handle.index()) {
            Some(Slot::Occupied(value)) => Some(value),
            _ => None,
        }
    }

    /// Returns the value.
    ///
    /// # Panics
    ///
    /// Panics if the handle does not name a live value.
    pub fn get(&self, handle: Handle<T>) -> &T {
        match self.slots.get(handle.index()) {
            Some(Slot::Occupied(value)) => value,
            _ => panic!("Dangling handle {:?}", handle),
        }
    }

    /// Returns the value mutably.
    ///
    /// # Panics
    ///
    /// Panics if the handle does not name a live value.
    pub fn get_mut(&mut self, handle: Handle<T>) -> &mut T {
        match self.slots.get_mut(handle.index()) {
            Some(Slot::Occupied(value)) => value,
            _ => panic!("Dangling handle {:?}", handle),
        }
    }

    /// Iterates over live values in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| match slot {
            Slot::Occupied(value) => Some((Handle::new(i), value)),
            Slot::Free(_) => None,
        })
    }

    /// Handles of all live values in slot order.
    pub fn handles(&self) -> Vec<Handle<T>> {
        self.iter().map(|(handle, _)| handle).collect()
    }
}

impl<T> Index<Handle<T>> for Arena<T> {
    type Output = T;

    fn index(&self, handle: Handle<T>) -> &T {
        self.get(handle)
    }
}

impl<T> IndexMut<Handle<T>> for Arena<T> {
    fn index_mut(&mut self, handle: Handle<T>) -> &mut T {
        self.get_mut(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_get() {
        let mut arena = Arena::new();
        let a = arena.allocate("a");
        let b = arena.allocate("b");
        assert_ne!(a, b);
        assert_eq!(arena[a], "a");
        assert_eq!(*arena.get(b), "b");
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_free_list_reuse() {
        let mut arena = Arena::new();
        let a = arena.allocate(1);
        let _b = arena.allocate(2);
        assert_eq!(arena.free(Unlinked::new(a)), 1);
        assert!(!arena.contains(a));
        assert_eq!(arena.len(), 1);

        let c = arena.allocate(3);
        assert_eq!(c.index(), a.index());
        assert_eq!(arena[c], 3);
        assert_eq!(arena.handles().len(), 2);
    }

    #[test]
    fn test_null_handle() {
        let null: Handle<u8> = Handle::NULL;
        assert!(null.is_null());
        assert_eq!(Handle::<u8>::default(), null);
        let arena: Arena<u8> = Arena::new();
        assert!(arena.try_get(null).is_none());
    }

    #[test]
    #[should_panic(expected = "Dangling handle")]
    fn test_freed_handle_is_fatal() {
        let mut arena = Arena::new();
        let a = arena.allocate(7);
        let _ = arena.free(Unlinked::new(a));
        let _ = arena[a];
    }

    #[test]
    #[should_panic(expected = "Double free")]
    fn test_double_free_is_fatal() {
        let mut arena = Arena::new();
        let a = arena.allocate(7);
        let _ = arena.free(Unlinked::new(a));
        let _ = arena.free(Unlinked::new(a));
    }
}
