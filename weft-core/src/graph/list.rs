//! Slab List
//!
//! An ordered, doubly linked list whose links live in a slab (`Vec`) rather
//! than in the elements. Both the per-node use-lists and the per-function
//! ownership lists are built on it.
//!
//! Every inserted element gets a [`Handle`]: a slab index plus a generation
//! counter. Handles stay valid while the element is in the list no matter
//! what else is inserted or removed, and a stale handle (one whose element
//! was removed, possibly with the slot reused since) resolves to nothing
//! instead of to the wrong element.
//!
//! All positional operations are O(1). Removing the element at a handle
//! does not disturb the `next`/`prev` links of any other element, so a
//! caller that reads `next(h)` before removing `h` can keep walking.

/// Stable position token for an element of a [`SlabList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone)]
struct Slot<T> {
    value: Option<T>,
    generation: u32,
    prev: Option<u32>,
    next: Option<u32>,
}

/// Ordered list with O(1) insert, remove and positional lookup.
#[derive(Debug, Clone)]
pub struct SlabList<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    head: Option<u32>,
    tail: Option<u32>,
    len: usize,
}

impl<T> SlabList<T> {
    /// Create a new empty list.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if the handle refers to a live element.
    pub fn contains(&self, handle: Handle) -> bool {
        self.live_index(handle).is_some()
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        let index = self.live_index(handle)?;
        self.slots[index].value.as_ref()
    }

    /// Handle of the first element.
    pub fn first(&self) -> Option<Handle> {
        self.head.map(|index| self.handle_at(index))
    }

    /// Handle of the last element.
    pub fn last(&self) -> Option<Handle> {
        self.tail.map(|index| self.handle_at(index))
    }

    /// Handle of the element following `handle`.
    pub fn next(&self, handle: Handle) -> Option<Handle> {
        let index = self.live_index(handle)?;
        self.slots[index].next.map(|next| self.handle_at(next))
    }

    /// Handle of the element preceding `handle`.
    pub fn prev(&self, handle: Handle) -> Option<Handle> {
        let index = self.live_index(handle)?;
        self.slots[index].prev.map(|prev| self.handle_at(prev))
    }

    /// Append an element at the end.
    pub fn push_back(&mut self, value: T) -> Handle {
        let index = self.allocate(value);
        self.link_before(index, None);
        self.handle_at(index)
    }

    /// Insert an element before `at`, or at the end when `at` is `None`.
    ///
    /// # Panics
    ///
    /// Panics if `at` is a stale handle.
    pub fn insert_before(&mut self, at: Option<Handle>, value: T) -> Handle {
        let at_index = at.map(|handle| {
            self.live_index(handle)
                .expect("insertion point must be a live handle") as u32
        });
        let index = self.allocate(value);
        self.link_before(index, at_index);
        self.handle_at(index)
    }

    /// Remove the element at `handle`, returning it.
    ///
    /// Returns `None` for a stale handle.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let index = self.live_index(handle)?;
        let (prev, next) = (self.slots[index].prev, self.slots[index].next);
        match prev {
            Some(prev) => self.slots[prev as usize].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.slots[next as usize].prev = prev,
            None => self.tail = prev,
        }

        let slot = &mut self.slots[index];
        slot.prev = None;
        slot.next = None;
        slot.generation = slot.generation.wrapping_add(1);
        let value = slot.value.take();
        self.free.push(index as u32);
        self.len -= 1;
        value
    }

    /// Iterate elements front to back.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    /// Iterate `(handle, element)` pairs front to back.
    pub fn entries(&self) -> Entries<'_, T> {
        Entries {
            list: self,
            cursor: self.head,
        }
    }

    fn live_index(&self, handle: Handle) -> Option<usize> {
        let index = handle.index as usize;
        let slot = self.slots.get(index)?;
        (slot.generation == handle.generation && slot.value.is_some()).then_some(index)
    }

    fn handle_at(&self, index: u32) -> Handle {
        Handle {
            index,
            generation: self.slots[index as usize].generation,
        }
    }

    fn allocate(&mut self, value: T) -> u32 {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            self.slots[index as usize].value = Some(value);
            return index;
        }
        self.slots.push(Slot {
            value: Some(value),
            generation: 0,
            prev: None,
            next: None,
        });
        (self.slots.len() - 1) as u32
    }

    fn link_before(&mut self, index: u32, at: Option<u32>) {
        let prev = match at {
            Some(at) => self.slots[at as usize].prev,
            None => self.tail,
        };
        self.slots[index as usize].prev = prev;
        self.slots[index as usize].next = at;
        match prev {
            Some(prev) => self.slots[prev as usize].next = Some(index),
            None => self.head = Some(index),
        }
        match at {
            Some(at) => self.slots[at as usize].prev = Some(index),
            None => self.tail = Some(index),
        }
    }
}

impl<T> Default for SlabList<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the elements of a [`SlabList`].
pub struct Iter<'a, T> {
    list: &'a SlabList<T>,
    cursor: Option<u32>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let list = self.list;
        let slot = &list.slots[self.cursor? as usize];
        self.cursor = slot.next;
        slot.value.as_ref()
    }
}

/// Iterator over the `(handle, element)` pairs of a [`SlabList`].
pub struct Entries<'a, T> {
    list: &'a SlabList<T>,
    cursor: Option<u32>,
}

impl<'a, T> Iterator for Entries<'a, T> {
    type Item = (Handle, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let list = self.list;
        let index = self.cursor?;
        let slot = &list.slots[index as usize];
        self.cursor = slot.next;
        slot.value.as_ref().map(|value| (list.handle_at(index), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(list: &SlabList<u32>) -> Vec<u32> {
        list.iter().copied().collect()
    }

    #[test]
    fn push_and_iterate_in_order() {
        let mut list = SlabList::new();
        list.push_back(1);
        list.push_back(2);
        list.push_back(3);
        assert_eq!(collect(&list), vec![1, 2, 3]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn insert_before_head_middle_and_end() {
        let mut list = SlabList::new();
        let b = list.push_back(2);
        list.insert_before(Some(b), 1);
        let d = list.push_back(4);
        list.insert_before(Some(d), 3);
        list.insert_before(None, 5);
        assert_eq!(collect(&list), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn remove_keeps_other_handles_valid() {
        let mut list = SlabList::new();
        let a = list.push_back(10);
        let b = list.push_back(20);
        let c = list.push_back(30);

        assert_eq!(list.remove(b), Some(20));
        assert_eq!(list.get(a), Some(&10));
        assert_eq!(list.get(c), Some(&30));
        assert_eq!(list.next(a), Some(c));
        assert_eq!(list.prev(c), Some(a));
        assert_eq!(collect(&list), vec![10, 30]);
    }

    #[test]
    fn stale_handle_does_not_alias_reused_slot() {
        let mut list = SlabList::new();
        let a = list.push_back(1);
        list.remove(a);
        let b = list.push_back(2);

        assert!(!list.contains(a));
        assert_eq!(list.get(a), None);
        assert_eq!(list.remove(a), None);
        assert_eq!(list.get(b), Some(&2));
    }

    #[test]
    fn walk_while_removing_current() {
        let mut list = SlabList::new();
        for value in 0..6 {
            list.push_back(value);
        }

        let mut cursor = list.first();
        while let Some(handle) = cursor {
            cursor = list.next(handle);
            if list.get(handle).is_some_and(|v| v % 2 == 0) {
                list.remove(handle);
            }
        }
        assert_eq!(collect(&list), vec![1, 3, 5]);
    }

    #[test]
    fn removing_everything_resets_ends() {
        let mut list = SlabList::new();
        let a = list.push_back(7);
        let b = list.push_back(8);
        list.remove(a);
        list.remove(b);
        assert!(list.is_empty());
        assert_eq!(list.first(), None);
        assert_eq!(list.last(), None);
    }
}
