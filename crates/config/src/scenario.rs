// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::SCHEMA_VERSION;

/// Task addressed by a scenario step: the calling context or a task created earlier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskRef {
    Current,
    Named(String),
}

impl From<String> for TaskRef {
    fn from(value: String) -> Self {
        if value == "current" {
            TaskRef::Current
        } else {
            TaskRef::Named(value)
        }
    }
}

impl From<TaskRef> for String {
    fn from(value: TaskRef) -> Self {
        match value {
            TaskRef::Current => "current".to_string(),
            TaskRef::Named(name) => name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetTarget {
    Queues,
    Watermarks,
    Ringbufs,
    All,
}

/// Buffer type hint of `ringbuf_create`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RingbufKind {
    NoSplit,
    #[default]
    AllowSplit,
    ByteBuf,
}

/// Expected halves of a split ring-buffer receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpectedSplit {
    pub item1: String,
    #[serde(default)]
    pub item2: String,
}

/// One operation of a scenario. Fields named `ok`/`expect` are optional checks;
/// a step without them only drives the simulator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum ScenarioStep {
    QueueCreate {
        name: String,
        #[serde(default)]
        length: u64,
        #[serde(default)]
        item_size: u64,
        #[serde(default)]
        ok: Option<bool>,
    },
    QueueSend {
        queue: String,
        data: String,
        #[serde(default)]
        front: bool,
        #[serde(default)]
        ok: Option<bool>,
    },
    QueueReceive {
        queue: String,
        #[serde(default)]
        ok: Option<bool>,
        #[serde(default)]
        expect: Option<String>,
    },
    QueueSpaces {
        queue: String,
        #[serde(default)]
        expect: Option<u64>,
    },
    QueueWaiting {
        queue: String,
        #[serde(default)]
        expect: Option<u64>,
    },
    TaskCreate {
        name: String,
    },
    HighWaterMark {
        task: TaskRef,
        #[serde(default)]
        expect: Option<u64>,
    },
    NotifyGive {
        task: TaskRef,
    },
    NotifyTake {
        #[serde(default)]
        expect: Option<u32>,
    },
    RingbufCreate {
        name: String,
        #[serde(default)]
        size: u64,
        #[serde(default)]
        kind: RingbufKind,
        #[serde(default)]
        ok: Option<bool>,
    },
    RingbufSend {
        ringbuf: String,
        data: String,
        #[serde(default)]
        ok: Option<bool>,
    },
    RingbufReceive {
        ringbuf: String,
        #[serde(default)]
        ok: Option<bool>,
        #[serde(default)]
        expect: Option<ExpectedSplit>,
    },
    RingbufFreeSize {
        ringbuf: String,
        #[serde(default)]
        expect: Option<u64>,
    },
    RingbufForceFull {
        ringbuf: String,
        #[serde(default = "default_true")]
        full: bool,
    },
    RingbufNoMoreEntries {
        ringbuf: String,
    },
    Reset {
        target: ResetTarget,
    },
}

fn default_true() -> bool {
    true
}

impl ScenarioStep {
    pub fn op_name(&self) -> &'static str {
        match self {
            ScenarioStep::QueueCreate { .. } => "queue_create",
            ScenarioStep::QueueSend { .. } => "queue_send",
            ScenarioStep::QueueReceive { .. } => "queue_receive",
            ScenarioStep::QueueSpaces { .. } => "queue_spaces",
            ScenarioStep::QueueWaiting { .. } => "queue_waiting",
            ScenarioStep::TaskCreate { .. } => "task_create",
            ScenarioStep::HighWaterMark { .. } => "high_water_mark",
            ScenarioStep::NotifyGive { .. } => "notify_give",
            ScenarioStep::NotifyTake { .. } => "notify_take",
            ScenarioStep::RingbufCreate { .. } => "ringbuf_create",
            ScenarioStep::RingbufSend { .. } => "ringbuf_send",
            ScenarioStep::RingbufReceive { .. } => "ringbuf_receive",
            ScenarioStep::RingbufFreeSize { .. } => "ringbuf_free_size",
            ScenarioStep::RingbufForceFull { .. } => "ringbuf_force_full",
            ScenarioStep::RingbufNoMoreEntries { .. } => "ringbuf_no_more_entries",
            ScenarioStep::Reset { .. } => "reset",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioScript {
    pub schema_version: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Simulator config, relative to the script's directory.
    #[serde(default)]
    pub config: Option<String>,
    pub steps: Vec<ScenarioStep>,
}

#[derive(Default)]
struct DeclaredNames<'a> {
    queues: HashSet<&'a str>,
    ringbufs: HashSet<&'a str>,
    tasks: HashSet<&'a str>,
}

impl ScenarioScript {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let script: Self =
            serde_yaml::from_str(yaml).context("Failed to parse scenario script YAML")?;
        script.validate()?;
        Ok(script)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '{}'",
                self.schema_version,
                SCHEMA_VERSION
            );
        }

        if self.steps.is_empty() {
            anyhow::bail!("Scenario must contain at least one step");
        }

        let mut names = DeclaredNames::default();
        for (index, step) in self.steps.iter().enumerate() {
            check_step_names(step, &mut names)
                .with_context(|| format!("Step {} ({})", index, step.op_name()))?;
        }

        Ok(())
    }
}

fn declare<'a>(set: &mut HashSet<&'a str>, kind: &str, name: &'a str) -> Result<()> {
    if name == "current" {
        anyhow::bail!("'current' is reserved and cannot name a {}", kind);
    }
    if !set.insert(name) {
        anyhow::bail!("{} '{}' is declared twice", kind, name);
    }
    Ok(())
}

fn require(set: &HashSet<&str>, kind: &str, name: &str) -> Result<()> {
    if !set.contains(name) {
        anyhow::bail!("{} '{}' is used before it is created", kind, name);
    }
    Ok(())
}

fn check_step_names<'a>(step: &'a ScenarioStep, names: &mut DeclaredNames<'a>) -> Result<()> {
    match step {
        ScenarioStep::QueueCreate { name, .. } => declare(&mut names.queues, "queue", name),
        ScenarioStep::QueueSend { queue, .. }
        | ScenarioStep::QueueReceive { queue, .. }
        | ScenarioStep::QueueSpaces { queue, .. }
        | ScenarioStep::QueueWaiting { queue, .. } => require(&names.queues, "queue", queue),
        ScenarioStep::TaskCreate { name } => declare(&mut names.tasks, "task", name),
        ScenarioStep::HighWaterMark { task, .. } | ScenarioStep::NotifyGive { task } => {
            match task {
                TaskRef::Current => Ok(()),
                TaskRef::Named(name) => require(&names.tasks, "task", name),
            }
        }
        ScenarioStep::NotifyTake { .. } => Ok(()),
        ScenarioStep::RingbufCreate { name, .. } => declare(&mut names.ringbufs, "ringbuf", name),
        ScenarioStep::RingbufSend { ringbuf, .. }
        | ScenarioStep::RingbufReceive { ringbuf, .. }
        | ScenarioStep::RingbufFreeSize { ringbuf, .. }
        | ScenarioStep::RingbufForceFull { ringbuf, .. }
        | ScenarioStep::RingbufNoMoreEntries { ringbuf } => {
            require(&names.ringbufs, "ringbuf", ringbuf)
        }
        ScenarioStep::Reset { target } => {
            // Handles from before the reset are stale, so their names may be created again.
            if matches!(target, ResetTarget::Queues | ResetTarget::All) {
                names.queues.clear();
            }
            if matches!(target, ResetTarget::Ringbufs | ResetTarget::All) {
                names.ringbufs.clear();
            }
            Ok(())
        }
    }
}

/// Load a scenario script from YAML.
pub fn load_scenario<P: AsRef<Path>>(path: P) -> Result<ScenarioScript> {
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read scenario script at {:?}", path.as_ref()))?;
    let script = ScenarioScript::from_yaml(&contents)?;
    tracing::debug!(
        "Loaded scenario {:?} with {} steps",
        script.name,
        script.steps.len()
    );
    Ok(script)
}
