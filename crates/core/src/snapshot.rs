// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::ringbuf::RingbufType;
use crate::task::TaskHandle;
use serde::Serialize;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RtosSnapshot {
    pub queues: Vec<QueueSnapshot>,
    pub tasks: TaskSnapshot,
    pub ringbufs: Vec<RingbufSnapshot>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub slot: usize,
    pub messages_waiting: usize,
    pub spaces_available: usize,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub next_handle: u64,
    pub current_handle: TaskHandle,
    pub first_watermark_handle: Option<TaskHandle>,
    pub second_watermark_handle: Option<TaskHandle>,
    pub watermark_position: Option<u8>,
    pub notify_pending: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RingbufSnapshot {
    pub slot: usize,
    pub kind: RingbufType,
    pub write_cursor: usize,
    pub read_cursor: usize,
    pub free_size: usize,
    pub forced_full: bool,
    pub no_more_entries: bool,
}
