// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod freertos;
pub mod queue;
pub mod ringbuf;
pub mod snapshot;
pub mod task;

mod slots;

pub use queue::{QueueHandle, QueueRegistry};
pub use ringbuf::{RingbufFaults, RingbufHandle, RingbufRegistry, RingbufType, SplitItem};
pub use slots::SlotId;
pub use task::{TaskHandle, TaskSimulator};

use labwired_rtos_config::SimConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RtosError {
    #[error("Queue is full ({0} items)")]
    QueueFull(usize),
    #[error("Queue is empty")]
    QueueEmpty,
    #[error("Ring buffer has no free cell")]
    RingbufFull,
    #[error("Ring buffer is empty")]
    RingbufEmpty,
    #[error("Item of {len} bytes exceeds the {max} byte limit")]
    ItemTooLarge { len: usize, max: usize },
    #[error("Stale or unknown handle {0}")]
    StaleHandle(SlotId),
    #[error("{0} is not simulated")]
    Unsupported(&'static str),
}

pub type RtosResult<T> = Result<T, RtosError>;

/// The three simulated subsystems. They never call each other.
#[derive(Debug, Default)]
pub struct Rtos {
    pub queues: QueueRegistry,
    pub tasks: TaskSimulator,
    pub ringbufs: RingbufRegistry,
}

impl Rtos {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &SimConfig) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self {
            queues: QueueRegistry::new(&config.queues),
            tasks: TaskSimulator::new(&config.tasks),
            ringbufs: RingbufRegistry::from_limits(&config.ringbufs)?,
        })
    }

    /// Test-only: runs every subsystem's reset. Task handles keep counting up
    /// and a pending notification survives, as on the platform mock.
    pub fn reset_all(&mut self) {
        self.queues.reset();
        self.tasks.reset_high_water_mark();
        self.ringbufs.reset();
    }

    pub fn snapshot(&self) -> snapshot::RtosSnapshot {
        snapshot::RtosSnapshot {
            queues: self.queues.snapshot(),
            tasks: self.tasks.snapshot(),
            ringbufs: self.ringbufs.snapshot(),
        }
    }

    pub fn snapshot_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_applies_limits() {
        let config = SimConfig::from_yaml(
            r#"
queues:
  max_queues: 1
  max_elements: 2
ringbufs:
  max_items: 3
  cell_size: "8B"
"#,
        )
        .unwrap();
        let mut rtos = Rtos::from_config(&config).unwrap();

        let q = rtos.queues.create(0, 0).unwrap();
        assert!(rtos.queues.create(0, 0).is_none());
        assert_eq!(rtos.queues.spaces_available(q), Ok(2));

        let rb = rtos.ringbufs.create(0, RingbufType::AllowSplit).unwrap();
        assert_eq!(rtos.ringbufs.free_size(rb), 3 * 8 * 2);
        assert_eq!(rtos.ringbufs.max_item_len(), 16);
    }

    #[test]
    fn test_from_config_rejects_unbounded_geometry() {
        let mut config = SimConfig::default();
        config.ringbufs.max_items = usize::MAX;
        assert!(Rtos::from_config(&config).is_err());

        let mut config = SimConfig::default();
        config.tasks.first_handle = u64::MAX;
        assert!(Rtos::from_config(&config).is_err());
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let mut rtos = Rtos::new();
        let q = rtos.queues.create(20, 18).unwrap();
        rtos.queues.send_to_back(q, b"x").unwrap();
        let rb = rtos.ringbufs.create(0, RingbufType::ByteBuf).unwrap();
        rtos.ringbufs.send(rb, b"abc").unwrap();
        rtos.ringbufs.set_forced_full(rb, true).unwrap();
        let t = rtos.tasks.create_task("t");
        rtos.tasks.notify_give(t);

        let snap = rtos.snapshot();
        assert_eq!(snap.queues.len(), 1);
        assert_eq!(snap.queues[0].messages_waiting, 1);
        assert_eq!(snap.tasks.next_handle, 101);
        assert!(snap.tasks.notify_pending);
        assert_eq!(snap.ringbufs[0].write_cursor, 1);
        assert_eq!(snap.ringbufs[0].free_size, 7);

        let json = rtos.snapshot_json().unwrap();
        assert_eq!(json["ringbufs"][0]["kind"], "byte_buf");
        assert_eq!(json["queues"][0]["spaces_available"], 19);
    }

    #[test]
    fn test_reset_all_clears_registries_but_keeps_handle_counter() {
        let mut rtos = Rtos::new();
        rtos.queues.create(0, 0).unwrap();
        rtos.ringbufs.create(0, RingbufType::AllowSplit).unwrap();
        let before = rtos.tasks.create_task("a");
        rtos.tasks.stack_high_water_mark(before);

        rtos.reset_all();
        let snap = rtos.snapshot();
        assert!(snap.queues.is_empty());
        assert!(snap.ringbufs.is_empty());
        assert_eq!(snap.tasks.first_watermark_handle, None);
        assert_ne!(rtos.tasks.create_task("b"), before);
    }
}
