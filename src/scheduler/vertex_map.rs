//! Dense per-vertex message slots with combine-on-insert.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::fatal;
use crate::types::VertexId;

use super::Message;

const COMPONENT: &str = "scheduler";

pub struct VertexMessageMap<M> {
    slots: Vec<Mutex<Option<M>>>,
    joins: AtomicU64,
}

impl<M: Message> VertexMessageMap<M> {
    pub fn new(num_vertices: usize) -> Self {
        Self {
            slots: (0..num_vertices).map(|_| Mutex::new(None)).collect(),
            joins: AtomicU64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Inserts or combines. Returns true iff the vertex was not already
    /// scheduled, i.e. this message activated the slot.
    pub fn add(&self, vid: VertexId, message: M) -> bool {
        let mut slot = self.slot(vid).lock();
        match slot.as_mut() {
            Some(existing) => {
                existing.combine(message);
                self.joins.fetch_add(1, Ordering::Relaxed);
                false
            }
            None => {
                *slot = Some(message);
                true
            }
        }
    }

    /// Takes the folded message for `vid` if one is present.
    pub fn test_and_get(&self, vid: VertexId) -> Option<M> {
        self.slot(vid).lock().take()
    }

    pub fn has_message(&self, vid: VertexId) -> bool {
        self.slot(vid).lock().is_some()
    }

    /// Number of messages folded into an already occupied slot.
    pub fn num_joins(&self) -> u64 {
        self.joins.load(Ordering::Relaxed)
    }

    fn slot(&self, vid: VertexId) -> &Mutex<Option<M>> {
        match self.slots.get(vid.0 as usize) {
            Some(slot) => slot,
            None => fatal!(
                COMPONENT,
                "vertex {vid} out of range for a {}-vertex message map",
                self.slots.len()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::SumMessage;
    use super::*;

    #[test]
    fn first_add_activates_later_adds_combine() {
        let map: VertexMessageMap<SumMessage> = VertexMessageMap::new(8);
        assert!(map.add(VertexId(3), SumMessage::new(1.0)));
        assert!(!map.add(VertexId(3), SumMessage::new(2.5)));
        assert_eq!(map.num_joins(), 1);
        let taken = map.test_and_get(VertexId(3)).expect("folded message");
        assert_eq!(taken.priority(), 3.5);
        assert!(map.test_and_get(VertexId(3)).is_none());
    }

    #[test]
    fn take_rearms_the_slot() {
        let map: VertexMessageMap<SumMessage> = VertexMessageMap::new(2);
        assert!(map.add(VertexId(0), SumMessage::new(1.0)));
        map.test_and_get(VertexId(0)).unwrap();
        assert!(map.add(VertexId(0), SumMessage::new(2.0)));
    }
}
