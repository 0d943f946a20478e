//! A generation ring: an intrusive doubly-linked list over nodes living in a
//! shared [`Slab`], plus the byte-weight budget and running size for one of
//! the three generations (eden, probation, protected).
//!
//! No ring operation here ever triggers eviction or a cross-ring move on its
//! own — those policy decisions belong to the engine in `cache.rs`. A ring
//! only knows how to link, unlink, and report its own occupancy.

use super::entry::{Generation, Slab};

pub(crate) struct Ring {
    tag: Generation,
    limit: u64,
    size: u64,
    len: usize,
    head: Option<usize>, // MRU
    tail: Option<usize>, // LRU
}

impl Ring {
    pub(crate) fn new(tag: Generation, limit: u64) -> Self {
        Self {
            tag,
            limit,
            size: 0,
            len: 0,
            head: None,
            tail: None,
        }
    }

    #[inline]
    pub(crate) fn limit(&self) -> u64 {
        self.limit
    }

    #[inline]
    pub(crate) fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn peek_lru(&self) -> Option<usize> {
        self.tail
    }

    pub(crate) fn clear(&mut self) {
        self.size = 0;
        self.len = 0;
        self.head = None;
        self.tail = None;
    }

    /// Links `idx` at the MRU (head) position. `idx` must not already belong
    /// to any ring; its weight is read from the slab and added to `size`.
    pub(crate) fn add_mru<K, V>(&mut self, slab: &mut Slab<K, V>, idx: usize) {
        let weight = {
            let node = slab.get_mut(idx);
            node.generation = self.tag;
            node.prev = None;
            node.next = self.head;
            node.weight
        };
        if let Some(head) = self.head {
            slab.get_mut(head).prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
        self.size += weight;
        self.len += 1;
    }

    /// Unlinks `idx`, which must currently belong to this ring, subtracting
    /// its weight from `size`. Does not touch the slab slot itself — the
    /// node is still addressable by `idx` afterward, just detached.
    pub(crate) fn remove<K, V>(&mut self, slab: &mut Slab<K, V>, idx: usize) {
        let (prev, next, weight) = {
            let node = slab.get(idx);
            (node.prev, node.next, node.weight)
        };
        match prev {
            Some(p) => slab.get_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => slab.get_mut(n).prev = prev,
            None => self.tail = prev,
        }
        {
            let node = slab.get_mut(idx);
            node.prev = None;
            node.next = None;
        }
        self.size -= weight;
        self.len -= 1;
    }

    /// Moves `idx` (already a member of this ring) to the MRU position
    /// without touching its weight or frequency.
    pub(crate) fn move_to_mru<K, V>(&mut self, slab: &mut Slab<K, V>, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.remove(slab, idx);
        self.add_mru(slab, idx);
    }

    /// Visits members from the LRU end to the MRU end.
    pub(crate) fn for_each_lru_to_mru<K, V>(
        &self,
        slab: &Slab<K, V>,
        mut visit: impl FnMut(&super::entry::Node<K, V>),
    ) {
        let mut cursor = self.tail;
        while let Some(idx) = cursor {
            let node = slab.get(idx);
            visit(node);
            cursor = node.prev;
        }
    }
}
