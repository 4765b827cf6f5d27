//! Generation-stamped slot arena with creation-order iteration.
//!
//! Design:
//! - Slots are reused through a free list, so indices stay small.
//! - Each slot carries a generation that is bumped on removal; a stale
//!   `SlotKey` never resolves to the slot's next occupant.
//! - `order` keeps live keys in insertion order (FIFO execution/dispatch).

use std::collections::VecDeque;

/// Stable handle to an arena slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey {
    index: u32,
    generation: u32,
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

pub(crate) struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    order: VecDeque<SlotKey>,
}

impl<T> Arena<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            order: VecDeque::new(),
        }
    }

    pub(crate) fn insert(&mut self, value: T) -> SlotKey {
        let key = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.value = Some(value);
                SlotKey {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    value: Some(value),
                });
                SlotKey {
                    index,
                    generation: 0,
                }
            }
        };
        self.order.push_back(key);
        key
    }

    pub(crate) fn get(&self, key: SlotKey) -> Option<&T> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    pub(crate) fn remove(&mut self, key: SlotKey) -> Option<T> {
        let slot = self.slots.get_mut(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
        if let Some(pos) = self.order.iter().position(|k| *k == key) {
            self.order.remove(pos);
        }
        Some(value)
    }

    /// Live entries in insertion order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (SlotKey, &T)> + '_ {
        self.order
            .iter()
            .filter_map(move |key| self.get(*key).map(|value| (*key, value)))
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }
}
