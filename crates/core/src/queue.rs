// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::slots::{SlotId, SlotTable};
use crate::snapshot::QueueSnapshot;
use crate::{RtosError, RtosResult};
use labwired_rtos_config::QueueLimits;
use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct QueueHandle(SlotId);

impl fmt::Display for QueueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue {}", self.0)
    }
}

#[derive(Debug, Default)]
struct Queue {
    items: VecDeque<Box<[u8]>>,
}

/// Fixed table of FIFO queues holding fixed-size items copied by value.
#[derive(Debug)]
pub struct QueueRegistry {
    table: SlotTable<Queue>,
    max_elements: usize,
    item_size: usize,
}

impl Default for QueueRegistry {
    fn default() -> Self {
        Self::new(&QueueLimits::default())
    }
}

impl QueueRegistry {
    pub fn new(limits: &QueueLimits) -> Self {
        Self {
            table: SlotTable::new(limits.max_queues),
            max_elements: limits.max_elements,
            item_size: limits.item_size,
        }
    }

    pub fn max_elements(&self) -> usize {
        self.max_elements
    }

    pub fn item_size(&self) -> usize {
        self.item_size
    }

    /// Claims the next free queue. The hints are recorded in the log only; every
    /// queue gets the registry's fixed depth and item size.
    pub fn create(&mut self, length_hint: u64, item_size_hint: u64) -> Option<QueueHandle> {
        let Some(id) = self.table.claim(Queue::default()) else {
            tracing::warn!(
                "Queue table exhausted ({} queues), create rejected",
                self.table.capacity()
            );
            return None;
        };
        let handle = QueueHandle(id);
        if length_hint > self.max_elements as u64 || item_size_hint > self.item_size as u64 {
            tracing::debug!(
                "{} requested {}x{} bytes, simulated as {}x{}",
                handle,
                length_hint,
                item_size_hint,
                self.max_elements,
                self.item_size
            );
        } else {
            tracing::debug!("{} created", handle);
        }
        Some(handle)
    }

    /// Appends one item. Short input is zero padded and long input truncated to the item size.
    pub fn send_to_back(&mut self, handle: QueueHandle, item: &[u8]) -> RtosResult<()> {
        let (max_elements, item_size) = (self.max_elements, self.item_size);
        let queue = self.table.get_mut(handle.0)?;
        if queue.items.len() >= max_elements {
            return Err(RtosError::QueueFull(max_elements));
        }

        let mut entry = vec![0u8; item_size].into_boxed_slice();
        let n = item.len().min(item_size);
        entry[..n].copy_from_slice(&item[..n]);
        queue.items.push_back(entry);
        tracing::debug!("{} <- item ({} waiting)", handle, queue.items.len());
        Ok(())
    }

    /// Front insertion is not simulated; a valid handle still gets an error.
    pub fn send_to_front(&mut self, handle: QueueHandle, _item: &[u8]) -> RtosResult<()> {
        self.table.get(handle.0)?;
        Err(RtosError::Unsupported("xQueueSendToFront"))
    }

    /// Pops the oldest item into `out`, copying at most `out.len()` bytes.
    /// `out` is left untouched when the queue is empty.
    pub fn receive(&mut self, handle: QueueHandle, out: &mut [u8]) -> RtosResult<()> {
        let queue = self.table.get_mut(handle.0)?;
        let entry = queue.items.pop_front().ok_or(RtosError::QueueEmpty)?;
        let n = out.len().min(entry.len());
        out[..n].copy_from_slice(&entry[..n]);
        tracing::debug!("{} -> item ({} waiting)", handle, queue.items.len());
        Ok(())
    }

    pub fn spaces_available(&self, handle: QueueHandle) -> RtosResult<usize> {
        Ok(self.max_elements - self.messages_waiting(handle)?)
    }

    pub fn messages_waiting(&self, handle: QueueHandle) -> RtosResult<usize> {
        Ok(self.table.get(handle.0)?.items.len())
    }

    /// Test-only: drops every queue and invalidates all handles.
    pub fn reset(&mut self) {
        self.table.reset();
        tracing::debug!("Queue registry reset (generation {})", self.table.generation());
    }

    pub fn snapshot(&self) -> Vec<QueueSnapshot> {
        self.table
            .iter()
            .map(|(slot, queue)| QueueSnapshot {
                slot,
                messages_waiting: queue.items.len(),
                spaces_available: self.max_elements - queue.items.len(),
            })
            .collect()
    }
}
