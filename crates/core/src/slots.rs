// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Fixed-capacity slot arena shared by the queue and ring buffer registries.
//!
//! A slot is claimed once and only released by [`SlotTable::reset`], which
//! also bumps the generation so handles minted before the reset stop resolving.

use crate::{RtosError, RtosResult};
use std::fmt;

/// Generation-tagged slot address. Only the registries look inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct SlotId {
    generation: u32,
    index: u32,
}

impl SlotId {
    pub(crate) fn index(self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.index, self.generation)
    }
}

#[derive(Debug)]
pub(crate) struct SlotTable<T> {
    slots: Vec<Option<T>>,
    generation: u32,
}

impl<T> SlotTable<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            generation: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Stores `value` in the lowest free slot, or returns `None` when every slot is taken.
    pub fn claim(&mut self, value: T) -> Option<SlotId> {
        let index = self.slots.iter().position(Option::is_none)?;
        self.slots[index] = Some(value);
        Some(SlotId {
            generation: self.generation,
            index: index as u32,
        })
    }

    pub fn get(&self, id: SlotId) -> RtosResult<&T> {
        if id.generation != self.generation {
            return Err(RtosError::StaleHandle(id));
        }
        self.slots
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(RtosError::StaleHandle(id))
    }

    pub fn get_mut(&mut self, id: SlotId) -> RtosResult<&mut T> {
        if id.generation != self.generation {
            return Err(RtosError::StaleHandle(id));
        }
        self.slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(RtosError::StaleHandle(id))
    }

    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (i, v)))
    }
}
