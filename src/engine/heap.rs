//! Generational userdata heap
//!
//! References carry the generation of the slot they were issued for, so a
//! reference that outlives its cell resolves to nothing instead of to
//! whatever reuses the slot.

use super::UserdataRef;
use std::any::Any;

/// One userdata cell
pub(crate) struct Userdata {
    pub payload: Box<dyn Any>,
    pub type_name: Option<&'static str>,
    pub marked: bool,
}

struct Slot {
    generation: u32,
    cell: Option<Userdata>,
}

#[derive(Default)]
pub(crate) struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl Heap {
    pub fn alloc(&mut self, cell: Userdata) -> UserdataRef {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.cell = Some(cell);
            return UserdataRef {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            cell: Some(cell),
        });
        UserdataRef {
            index,
            generation: 0,
        }
    }

    pub fn get(&self, r: UserdataRef) -> Option<&Userdata> {
        let slot = self.slots.get(r.index as usize)?;
        if slot.generation != r.generation {
            return None;
        }
        slot.cell.as_ref()
    }

    pub fn get_mut(&mut self, r: UserdataRef) -> Option<&mut Userdata> {
        let slot = self.slots.get_mut(r.index as usize)?;
        if slot.generation != r.generation {
            return None;
        }
        slot.cell.as_mut()
    }

    /// Remove a cell; its slot is reused under a new generation
    pub fn free(&mut self, r: UserdataRef) -> Option<Userdata> {
        let slot = self.slots.get_mut(r.index as usize)?;
        if slot.generation != r.generation {
            return None;
        }
        let cell = slot.cell.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(r.index);
        self.live -= 1;
        Some(cell)
    }

    /// References to every live cell
    pub fn refs(&self) -> Vec<UserdataRef> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.cell.is_some())
            .map(|(index, slot)| UserdataRef {
                index: index as u32,
                generation: slot.generation,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.live
    }
}
