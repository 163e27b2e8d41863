// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

mod scenario;

pub use scenario::{
    load_scenario, ExpectedSplit, ResetTarget, RingbufKind, ScenarioScript, ScenarioStep, TaskRef,
};

pub const SCHEMA_VERSION: &str = "1.0";

/// Upper bound for `queues.max_queues` and `ringbufs.max_buffers`.
pub const MAX_TABLE_SLOTS: usize = 1024;
/// Upper bound for `queues.max_elements`.
pub const MAX_QUEUE_ELEMENTS: usize = 65536;
/// Upper bound for `queues.item_size`.
pub const MAX_QUEUE_ITEM_SIZE: usize = 64 * 1024;
/// Upper bound for the storage of one ring buffer (cells x halves x cell bytes).
pub const MAX_RINGBUF_BYTES: usize = 16 * 1024 * 1024;

/// Default schema version for YAML configs
fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

/// Fixed storage of the queue registry. Creation hints never change these.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct QueueLimits {
    pub max_queues: usize,
    pub max_elements: usize,
    pub item_size: usize,
}

impl Default for QueueLimits {
    fn default() -> Self {
        Self {
            max_queues: 7,
            max_elements: 20,
            item_size: 18,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RingbufLimits {
    pub max_buffers: usize,
    /// Cells per buffer; each send consumes one cell.
    pub max_items: usize,
    /// Capacity of one cell half, e.g. "64B".
    pub cell_size: String,
    /// Free size reported while a buffer is forced full.
    pub full_free_size: usize,
}

impl Default for RingbufLimits {
    fn default() -> Self {
        Self {
            max_buffers: 10,
            max_items: 100,
            cell_size: "64B".to_string(),
            full_free_size: 7,
        }
    }
}

impl RingbufLimits {
    pub fn cell_bytes(&self) -> Result<usize> {
        let bytes = parse_size(&self.cell_size)
            .with_context(|| format!("Invalid ring buffer cell_size '{}'", self.cell_size))?;
        Ok(bytes as usize)
    }
}

/// Scripted stack high-water-mark responses.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct WatermarkScript {
    pub base: u64,
    pub step: u64,
    pub plateau: u64,
    pub second: u64,
    pub other: u64,
}

impl Default for WatermarkScript {
    fn default() -> Self {
        Self {
            base: 1500,
            step: 64,
            plateau: 1628,
            second: 3750,
            other: 5250,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TaskConfig {
    pub first_handle: u64,
    pub current_handle: u64,
    pub watermark: WatermarkScript,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            first_handle: 100,
            current_handle: 42,
            watermark: WatermarkScript::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SimConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default)]
    pub queues: QueueLimits,
    #[serde(default)]
    pub ringbufs: RingbufLimits,
    #[serde(default)]
    pub tasks: TaskConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            queues: QueueLimits::default(),
            ringbufs: RingbufLimits::default(),
            tasks: TaskConfig::default(),
        }
    }
}

impl SimConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read simulator config at {:?}", path))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid simulator config {:?}", path))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).context("Failed to parse simulator config YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '{}'",
                self.schema_version,
                SCHEMA_VERSION
            );
        }

        check_range("queues.max_queues", self.queues.max_queues, 0, MAX_TABLE_SLOTS)?;
        check_range(
            "queues.max_elements",
            self.queues.max_elements,
            1,
            MAX_QUEUE_ELEMENTS,
        )?;
        check_range(
            "queues.item_size",
            self.queues.item_size,
            1,
            MAX_QUEUE_ITEM_SIZE,
        )?;
        check_range(
            "ringbufs.max_buffers",
            self.ringbufs.max_buffers,
            0,
            MAX_TABLE_SLOTS,
        )?;
        if self.ringbufs.max_items == 0 {
            anyhow::bail!("Limit 'ringbufs.max_items' must be greater than zero");
        }
        let cell_bytes = self.ringbufs.cell_bytes()?;
        if cell_bytes == 0 {
            anyhow::bail!("Limit 'ringbufs.cell_size' must be greater than zero");
        }
        let buffer_bytes = self
            .ringbufs
            .max_items
            .checked_mul(cell_bytes)
            .and_then(|n| n.checked_mul(2))
            .filter(|&n| n <= MAX_RINGBUF_BYTES);
        if buffer_bytes.is_none() {
            anyhow::bail!(
                "Ring buffer of {} cells x 2 x {} bytes exceeds {} bytes",
                self.ringbufs.max_items,
                cell_bytes,
                MAX_RINGBUF_BYTES
            );
        }

        if self.tasks.first_handle == u64::MAX {
            anyhow::bail!("tasks.first_handle leaves no room for created handles");
        }
        let watermark = &self.tasks.watermark;
        if watermark
            .step
            .checked_mul(2)
            .and_then(|n| n.checked_add(watermark.base))
            .is_none()
        {
            anyhow::bail!(
                "tasks.watermark base ({}) + 2 * step ({}) overflows",
                watermark.base,
                watermark.step
            );
        }
        if self.tasks.current_handle >= self.tasks.first_handle {
            // Created handles count up from first_handle and must never hit the sentinel.
            anyhow::bail!(
                "tasks.current_handle ({}) must be below tasks.first_handle ({})",
                self.tasks.current_handle,
                self.tasks.first_handle
            );
        }

        Ok(())
    }
}

fn check_range(name: &str, value: usize, min: usize, max: usize) -> Result<()> {
    if value < min || value > max {
        anyhow::bail!(
            "Limit '{}' is {}, expected {}..={}",
            name,
            value,
            min,
            max
        );
    }
    Ok(())
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}
