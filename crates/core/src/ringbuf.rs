// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Split ring buffer simulation.
//!
//! Each buffer is a row of cells and every cell has two halves of `cell_bytes`.
//! One send fills one cell; an item longer than a half spills into the second
//! half of the same cell and is handed back as two parts on receive.
//!
//! Received cells are never reclaimed, so the reported free size only ever
//! shrinks until the registry is reset.

use crate::slots::{SlotId, SlotTable};
use crate::snapshot::RingbufSnapshot;
use crate::{RtosError, RtosResult};
use bitflags::bitflags;
use labwired_rtos_config::{RingbufKind, RingbufLimits};
use std::fmt;

pub const DEFAULT_MAX_RINGBUFS: usize = 10;
pub const DEFAULT_MAX_ITEMS: usize = 100;
pub const DEFAULT_CELL_BYTES: usize = 64;
pub const DEFAULT_FULL_FREE_SIZE: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct RingbufHandle(SlotId);

impl fmt::Display for RingbufHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ringbuf {}", self.0)
    }
}

/// Buffer type requested at creation. Recorded but not simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RingbufType {
    NoSplit,
    #[default]
    AllowSplit,
    ByteBuf,
}

impl From<RingbufKind> for RingbufType {
    fn from(kind: RingbufKind) -> Self {
        match kind {
            RingbufKind::NoSplit => RingbufType::NoSplit,
            RingbufKind::AllowSplit => RingbufType::AllowSplit,
            RingbufKind::ByteBuf => RingbufType::ByteBuf,
        }
    }
}

bitflags! {
    /// Test-only fault injection.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RingbufFaults: u8 {
        /// Report `full_free_size` instead of the real free size.
        const FORCED_FULL = 1 << 0;
        /// Reject every further send as if the cells were used up.
        const NO_MORE_ENTRIES = 1 << 1;
    }
}

/// One received item, borrowed from the cell it was stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitItem<'a> {
    pub first: &'a [u8],
    pub second: Option<&'a [u8]>,
}

impl SplitItem<'_> {
    pub fn len(&self) -> usize {
        self.first.len() + self.second.map_or(0, <[u8]>::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        out.extend_from_slice(self.first);
        if let Some(second) = self.second {
            out.extend_from_slice(second);
        }
        out
    }
}

#[derive(Debug)]
struct Ringbuf {
    kind: RingbufType,
    // max_items cells of two halves each, laid out back to back.
    storage: Vec<u8>,
    item_len: Vec<usize>,
    write: usize,
    read: usize,
    faults: RingbufFaults,
}

impl Ringbuf {
    fn new(kind: RingbufType, max_items: usize, cell_bytes: usize) -> Self {
        Self {
            kind,
            storage: vec![0; max_items * cell_bytes * 2],
            item_len: vec![0; max_items],
            write: 0,
            read: 0,
            faults: RingbufFaults::empty(),
        }
    }
}

#[derive(Debug)]
pub struct RingbufRegistry {
    table: SlotTable<Ringbuf>,
    max_items: usize,
    cell_bytes: usize,
    full_free_size: usize,
}

impl Default for RingbufRegistry {
    fn default() -> Self {
        Self::with_geometry(
            DEFAULT_MAX_RINGBUFS,
            DEFAULT_MAX_ITEMS,
            DEFAULT_CELL_BYTES,
            DEFAULT_FULL_FREE_SIZE,
        )
    }
}

impl RingbufRegistry {
    pub fn with_geometry(
        max_buffers: usize,
        max_items: usize,
        cell_bytes: usize,
        full_free_size: usize,
    ) -> Self {
        Self {
            table: SlotTable::new(max_buffers),
            max_items,
            cell_bytes,
            full_free_size,
        }
    }

    pub fn from_limits(limits: &RingbufLimits) -> anyhow::Result<Self> {
        Ok(Self::with_geometry(
            limits.max_buffers,
            limits.max_items,
            limits.cell_bytes()?,
            limits.full_free_size,
        ))
    }

    pub fn cell_bytes(&self) -> usize {
        self.cell_bytes
    }

    /// Largest item a single send accepts.
    pub fn max_item_len(&self) -> usize {
        self.cell_bytes * 2
    }

    /// Claims the first free buffer. Capacity is fixed regardless of `size_hint`.
    pub fn create(&mut self, size_hint: usize, kind: RingbufType) -> Option<RingbufHandle> {
        let buffer = Ringbuf::new(kind, self.max_items, self.cell_bytes);
        let Some(id) = self.table.claim(buffer) else {
            tracing::warn!(
                "Ring buffer table exhausted ({} buffers), create rejected",
                self.table.capacity()
            );
            return None;
        };
        let handle = RingbufHandle(id);
        tracing::debug!("{} created ({:?}, {} byte hint)", handle, kind, size_hint);
        Some(handle)
    }

    pub fn send(&mut self, handle: RingbufHandle, payload: &[u8]) -> RtosResult<()> {
        let (max_items, cell) = (self.max_items, self.cell_bytes);
        let buffer = self.table.get_mut(handle.0)?;
        if buffer.faults.contains(RingbufFaults::NO_MORE_ENTRIES) || buffer.write >= max_items {
            return Err(RtosError::RingbufFull);
        }
        if payload.len() > cell * 2 {
            return Err(RtosError::ItemTooLarge {
                len: payload.len(),
                max: cell * 2,
            });
        }

        let base = buffer.write * cell * 2;
        let (head, tail) = payload.split_at(payload.len().min(cell));
        buffer.storage[base..base + head.len()].copy_from_slice(head);
        buffer.storage[base + cell..base + cell + tail.len()].copy_from_slice(tail);
        buffer.item_len[buffer.write] = payload.len();
        buffer.write += 1;
        tracing::debug!(
            "{} <- {} bytes{}",
            handle,
            payload.len(),
            if tail.is_empty() { "" } else { " (split)" }
        );
        Ok(())
    }

    /// Hands out the oldest unread item. The cell stays allocated.
    pub fn receive_split(&mut self, handle: RingbufHandle) -> RtosResult<SplitItem<'_>> {
        let cell = self.cell_bytes;
        let buffer = self.table.get_mut(handle.0)?;
        if buffer.read >= buffer.write {
            return Err(RtosError::RingbufEmpty);
        }

        let index = buffer.read;
        buffer.read += 1;
        let len = buffer.item_len[index];
        let base = index * cell * 2;
        let storage = &buffer.storage;
        let item = if len > cell {
            SplitItem {
                first: &storage[base..base + cell],
                second: Some(&storage[base + cell..base + len]),
            }
        } else {
            SplitItem {
                first: &storage[base..base + len],
                second: None,
            }
        };
        Ok(item)
    }

    /// Bytes left for new items. Unknown handles report zero.
    pub fn free_size(&self, handle: RingbufHandle) -> usize {
        match self.table.get(handle.0) {
            Ok(buffer) => self.free_size_of(buffer),
            Err(e) => {
                tracing::warn!("Free size of {}: {}", handle, e);
                0
            }
        }
    }

    fn free_size_of(&self, buffer: &Ringbuf) -> usize {
        if buffer.faults.contains(RingbufFaults::FORCED_FULL) {
            return self.full_free_size;
        }
        if buffer.faults.contains(RingbufFaults::NO_MORE_ENTRIES) {
            return 0;
        }
        (self.max_items - buffer.write) * self.cell_bytes * 2
    }

    /// Test-only fault injection.
    pub fn set_forced_full(&mut self, handle: RingbufHandle, full: bool) -> RtosResult<()> {
        let buffer = self.table.get_mut(handle.0)?;
        buffer.faults.set(RingbufFaults::FORCED_FULL, full);
        Ok(())
    }

    /// Test-only fault injection.
    pub fn set_no_more_entries(&mut self, handle: RingbufHandle) -> RtosResult<()> {
        let buffer = self.table.get_mut(handle.0)?;
        buffer.faults.insert(RingbufFaults::NO_MORE_ENTRIES);
        Ok(())
    }

    pub fn faults(&self, handle: RingbufHandle) -> RtosResult<RingbufFaults> {
        Ok(self.table.get(handle.0)?.faults)
    }

    /// Test-only: drops every buffer and invalidates all handles.
    pub fn reset(&mut self) {
        self.table.reset();
        tracing::debug!(
            "Ring buffer registry reset (generation {})",
            self.table.generation()
        );
    }

    pub fn snapshot(&self) -> Vec<RingbufSnapshot> {
        self.table
            .iter()
            .map(|(slot, buffer)| RingbufSnapshot {
                slot,
                kind: buffer.kind,
                write_cursor: buffer.write,
                read_cursor: buffer.read,
                free_size: self.free_size_of(buffer),
                forced_full: buffer.faults.contains(RingbufFaults::FORCED_FULL),
                no_more_entries: buffer.faults.contains(RingbufFaults::NO_MORE_ENTRIES),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SINGLE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ\0";
    const DOUBLE: &[u8] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZ01234567890abcdefghijklmnopqrstuvwxyz!@#$%^&*()\0";

    #[test]
    fn test_send_receive_tracks_free_size() {
        let mut rings = RingbufRegistry::default();
        let rb = rings.create(100, RingbufType::AllowSplit).unwrap();
        assert_eq!(rings.free_size(rb), 12800);
        assert_eq!(rings.receive_split(rb), Err(RtosError::RingbufEmpty));

        rings.send(rb, SINGLE).unwrap();
        assert_eq!(rings.free_size(rb), 12672);
        rings.send(rb, DOUBLE).unwrap();
        assert_eq!(rings.free_size(rb), 12544);

        let first = rings.receive_split(rb).unwrap();
        assert_eq!(first.first, SINGLE);
        assert_eq!(first.second, None);
        assert_eq!(rings.free_size(rb), 12544);

        let second = rings.receive_split(rb).unwrap();
        assert_eq!(second.first.len(), 64);
        assert_eq!(second.second.map(<[u8]>::len), Some(DOUBLE.len() - 64));
        assert_eq!(second.to_vec(), DOUBLE);
        assert_eq!(rings.free_size(rb), 12544);
        assert_eq!(rings.receive_split(rb), Err(RtosError::RingbufEmpty));
    }

    #[test]
    fn test_exact_half_is_not_split() {
        let mut rings = RingbufRegistry::default();
        let rb = rings.create(0, RingbufType::NoSplit).unwrap();
        let payload = [7u8; 64];
        rings.send(rb, &payload).unwrap();
        let item = rings.receive_split(rb).unwrap();
        assert_eq!(item.first, &payload[..]);
        assert!(item.second.is_none());
    }

    #[test]
    fn test_oversize_rejected_without_advancing() {
        let mut rings = RingbufRegistry::default();
        let rb = rings.create(0, RingbufType::AllowSplit).unwrap();
        assert_eq!(
            rings.send(rb, &[0u8; 129]),
            Err(RtosError::ItemTooLarge { len: 129, max: 128 })
        );
        assert_eq!(rings.free_size(rb), 12800);
        rings.send(rb, &[1u8; 128]).unwrap();
        assert_eq!(rings.free_size(rb), 12672);
    }

    #[test]
    fn test_cells_run_out() {
        let mut rings = RingbufRegistry::with_geometry(1, 2, 4, 7);
        let rb = rings.create(0, RingbufType::AllowSplit).unwrap();
        rings.send(rb, b"a").unwrap();
        rings.send(rb, b"b").unwrap();
        assert_eq!(rings.send(rb, b"c"), Err(RtosError::RingbufFull));
        assert_eq!(rings.free_size(rb), 0);
        assert_eq!(rings.receive_split(rb).unwrap().first, b"a");
        assert_eq!(rings.send(rb, b"c"), Err(RtosError::RingbufFull));
    }

    #[test]
    fn test_fault_injection() {
        let mut rings = RingbufRegistry::default();
        let rb = rings.create(0, RingbufType::AllowSplit).unwrap();
        rings.set_forced_full(rb, true).unwrap();
        assert_eq!(rings.free_size(rb), 7);
        rings.send(rb, b"still accepted").unwrap();
        rings.set_forced_full(rb, false).unwrap();
        assert_eq!(rings.free_size(rb), 12672);

        rings.set_no_more_entries(rb).unwrap();
        assert_eq!(rings.send(rb, &[]), Err(RtosError::RingbufFull));
        assert_eq!(rings.free_size(rb), 0);
        assert_eq!(rings.faults(rb), Ok(RingbufFaults::NO_MORE_ENTRIES));
        assert_eq!(rings.receive_split(rb).unwrap().first, b"still accepted");
    }

    #[test]
    fn test_table_exhaustion_and_reset() {
        let mut rings = RingbufRegistry::default();
        let handles: Vec<_> = (0..10)
            .map(|_| rings.create(1, RingbufType::AllowSplit).unwrap())
            .collect();
        assert!(rings.create(1, RingbufType::AllowSplit).is_none());

        rings.reset();
        assert_eq!(rings.free_size(handles[0]), 0);
        assert!(rings.send(handles[0], b"x").is_err());
        let fresh = rings.create(1, RingbufType::AllowSplit).unwrap();
        assert_eq!(rings.free_size(fresh), 12800);
    }
}
