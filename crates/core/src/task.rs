// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::snapshot::TaskSnapshot;
use labwired_rtos_config::{TaskConfig, WatermarkScript};
use std::fmt;

/// Opaque task identity. Created handles only ever count up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct TaskHandle(u64);

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task {}", self.0)
    }
}

/// Number of scripted responses before the first task's watermark starts over.
const WATERMARK_CYCLE: u8 = 6;

/// Task bookkeeping: handle minting, scripted stack watermarks and the
/// single binary notification shared by every task.
///
/// Only the first two distinct handles ever queried get their own watermark;
/// every later handle shares one value. The notification is not per task either.
#[derive(Debug)]
pub struct TaskSimulator {
    next_handle: u64,
    current: TaskHandle,
    script: WatermarkScript,
    first: Option<TaskHandle>,
    second: Option<TaskHandle>,
    // Index of the last response given to `first`; None before the first call.
    position: Option<u8>,
    notify_pending: bool,
}

impl Default for TaskSimulator {
    fn default() -> Self {
        Self::new(&TaskConfig::default())
    }
}

impl TaskSimulator {
    pub fn new(config: &TaskConfig) -> Self {
        Self {
            next_handle: config.first_handle,
            current: TaskHandle(config.current_handle),
            script: config.watermark.clone(),
            first: None,
            second: None,
            position: None,
            notify_pending: false,
        }
    }

    /// Mints a new handle. Nothing is scheduled or executed.
    pub fn create_task(&mut self, name: &str) -> TaskHandle {
        let handle = TaskHandle(self.next_handle);
        self.next_handle += 1;
        tracing::debug!("{} created for '{}'", handle, name);
        handle
    }

    pub fn current_task_handle(&self) -> TaskHandle {
        self.current
    }

    pub fn stack_high_water_mark(&mut self, handle: TaskHandle) -> u64 {
        let first = *self.first.get_or_insert(handle);
        if handle == first {
            return self.next_first_watermark();
        }

        let second = *self.second.get_or_insert(handle);
        if handle == second {
            self.script.second
        } else {
            self.script.other
        }
    }

    fn next_first_watermark(&mut self) -> u64 {
        let position = self.position.map_or(0, |p| p + 1);
        let script = &self.script;
        let (value, stored) = match position {
            0..=2 => (
                script
                    .base
                    .saturating_add(script.step.saturating_mul(u64::from(position))),
                position,
            ),
            p if p < WATERMARK_CYCLE - 1 => (script.plateau, p),
            // The last response of a cycle doubles as the first of the next one.
            _ => (script.base, 0),
        };
        self.position = Some(stored);
        value
    }

    /// Test-only: forgets which handles are distinguished and restarts the cycle.
    pub fn reset_high_water_mark(&mut self) {
        self.first = None;
        self.second = None;
        self.position = None;
    }

    /// The target is ignored: there is one pending flag for all tasks.
    pub fn notify_give(&mut self, target: TaskHandle) {
        tracing::debug!("Notification given to {}", target);
        self.notify_pending = true;
    }

    /// Returns 1 and consumes the pending notification, or 0 if none is pending.
    pub fn notify_take(&mut self) -> u32 {
        if !self.notify_pending {
            return 0;
        }
        self.notify_pending = false;
        1
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            next_handle: self.next_handle,
            current_handle: self.current,
            first_watermark_handle: self.first,
            second_watermark_handle: self.second,
            watermark_position: self.position,
            notify_pending: self.notify_pending,
        }
    }
}
