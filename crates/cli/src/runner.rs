// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{anyhow, Result};
use labwired_rtos::{QueueHandle, RingbufHandle, RingbufType, Rtos, TaskHandle};
use labwired_rtos_config::{ExpectedSplit, ResetTarget, ScenarioStep, TaskRef};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt::Debug;

#[derive(Debug, Serialize, Clone)]
pub struct StepOutcome {
    pub index: usize,
    pub op: &'static str,
    pub passed: bool,
    pub observed: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Executes scenario steps against one simulator, resolving step names to handles.
pub struct ScenarioRunner {
    rtos: Rtos,
    queues: HashMap<String, QueueHandle>,
    ringbufs: HashMap<String, RingbufHandle>,
    tasks: HashMap<String, TaskHandle>,
}

fn expect_eq<T: PartialEq + Debug>(expected: Option<T>, observed: &T) -> Option<String> {
    match expected {
        Some(e) if e != *observed => Some(format!("expected {:?}, observed {:?}", e, observed)),
        _ => None,
    }
}

/// Queue items are fixed size; trailing zero padding is not part of the message.
fn item_text(bytes: &[u8]) -> String {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

impl ScenarioRunner {
    pub fn new(rtos: Rtos) -> Self {
        Self {
            rtos,
            queues: HashMap::new(),
            ringbufs: HashMap::new(),
            tasks: HashMap::new(),
        }
    }

    pub fn rtos(&self) -> &Rtos {
        &self.rtos
    }

    pub fn run_step(&mut self, index: usize, step: &ScenarioStep) -> StepOutcome {
        let op = step.op_name();
        let (observed, message) = match self.execute(step) {
            Ok(result) => result,
            Err(e) => (Value::Null, Some(format!("{:#}", e))),
        };
        let passed = message.is_none();
        if passed {
            tracing::debug!("step {} {}: {}", index, op, observed);
        } else {
            tracing::warn!(
                "step {} {} failed: {}",
                index,
                op,
                message.as_deref().unwrap_or_default()
            );
        }
        StepOutcome {
            index,
            op,
            passed,
            observed,
            message,
        }
    }

    fn queue(&self, name: &str) -> Result<QueueHandle> {
        self.queues
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("queue '{}' was not created", name))
    }

    fn ringbuf(&self, name: &str) -> Result<RingbufHandle> {
        self.ringbufs
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("ringbuf '{}' was not created", name))
    }

    fn task(&self, task: &TaskRef) -> Result<TaskHandle> {
        match task {
            TaskRef::Current => Ok(self.rtos.tasks.current_task_handle()),
            TaskRef::Named(name) => self
                .tasks
                .get(name)
                .copied()
                .ok_or_else(|| anyhow!("task '{}' was not created", name)),
        }
    }

    fn execute(&mut self, step: &ScenarioStep) -> Result<(Value, Option<String>)> {
        let outcome = match step {
            ScenarioStep::QueueCreate {
                name,
                length,
                item_size,
                ok,
            } => {
                let handle = self.rtos.queues.create(*length, *item_size);
                if let Some(handle) = handle {
                    self.queues.insert(name.clone(), handle);
                }
                let created = handle.is_some();
                (json!(created), expect_eq(*ok, &created))
            }
            ScenarioStep::QueueSend {
                queue,
                data,
                front,
                ok,
            } => {
                let handle = self.queue(queue)?;
                let sent = if *front {
                    self.rtos.queues.send_to_front(handle, data.as_bytes())
                } else {
                    self.rtos.queues.send_to_back(handle, data.as_bytes())
                }
                .is_ok();
                (json!(sent), expect_eq(*ok, &sent))
            }
            ScenarioStep::QueueReceive { queue, ok, expect } => {
                let handle = self.queue(queue)?;
                let mut out = vec![0u8; self.rtos.queues.item_size()];
                match self.rtos.queues.receive(handle, &mut out) {
                    Ok(()) => {
                        let text = item_text(&out);
                        let message = expect_eq(*ok, &true)
                            .or_else(|| expect_eq(expect.clone(), &text));
                        (json!(text), message)
                    }
                    Err(e) => {
                        let message = match (ok, expect) {
                            (Some(false), _) => None,
                            (None, None) => None,
                            _ => Some(e.to_string()),
                        };
                        (json!(false), message)
                    }
                }
            }
            ScenarioStep::QueueSpaces { queue, expect } => {
                let handle = self.queue(queue)?;
                let spaces = self.rtos.queues.spaces_available(handle)? as u64;
                (json!(spaces), expect_eq(*expect, &spaces))
            }
            ScenarioStep::QueueWaiting { queue, expect } => {
                let handle = self.queue(queue)?;
                let waiting = self.rtos.queues.messages_waiting(handle)? as u64;
                (json!(waiting), expect_eq(*expect, &waiting))
            }
            ScenarioStep::TaskCreate { name } => {
                let handle = self.rtos.tasks.create_task(name);
                self.tasks.insert(name.clone(), handle);
                (json!(handle.to_string()), None)
            }
            ScenarioStep::HighWaterMark { task, expect } => {
                let handle = self.task(task)?;
                let mark = self.rtos.tasks.stack_high_water_mark(handle);
                (json!(mark), expect_eq(*expect, &mark))
            }
            ScenarioStep::NotifyGive { task } => {
                let handle = self.task(task)?;
                self.rtos.tasks.notify_give(handle);
                (Value::Null, None)
            }
            ScenarioStep::NotifyTake { expect } => {
                let taken = self.rtos.tasks.notify_take();
                (json!(taken), expect_eq(*expect, &taken))
            }
            ScenarioStep::RingbufCreate {
                name,
                size,
                kind,
                ok,
            } => {
                let handle = self
                    .rtos
                    .ringbufs
                    .create(*size as usize, RingbufType::from(*kind));
                if let Some(handle) = handle {
                    self.ringbufs.insert(name.clone(), handle);
                }
                let created = handle.is_some();
                (json!(created), expect_eq(*ok, &created))
            }
            ScenarioStep::RingbufSend { ringbuf, data, ok } => {
                let handle = self.ringbuf(ringbuf)?;
                let sent = self.rtos.ringbufs.send(handle, data.as_bytes()).is_ok();
                (json!(sent), expect_eq(*ok, &sent))
            }
            ScenarioStep::RingbufReceive {
                ringbuf,
                ok,
                expect,
            } => {
                let handle = self.ringbuf(ringbuf)?;
                match self.rtos.ringbufs.receive_split(handle) {
                    Ok(item) => {
                        let observed = ExpectedSplit {
                            item1: String::from_utf8_lossy(item.first).into_owned(),
                            item2: item
                                .second
                                .map(|s| String::from_utf8_lossy(s).into_owned())
                                .unwrap_or_default(),
                        };
                        let message = expect_eq(*ok, &true)
                            .or_else(|| expect_eq(expect.clone(), &observed));
                        (
                            json!({ "item1": observed.item1, "item2": observed.item2 }),
                            message,
                        )
                    }
                    Err(e) => {
                        let message = match (ok, expect) {
                            (Some(false), _) => None,
                            (None, None) => None,
                            _ => Some(e.to_string()),
                        };
                        (json!(false), message)
                    }
                }
            }
            ScenarioStep::RingbufFreeSize { ringbuf, expect } => {
                let handle = self.ringbuf(ringbuf)?;
                let free = self.rtos.ringbufs.free_size(handle) as u64;
                (json!(free), expect_eq(*expect, &free))
            }
            ScenarioStep::RingbufForceFull { ringbuf, full } => {
                let handle = self.ringbuf(ringbuf)?;
                self.rtos
                    .ringbufs
                    .set_forced_full(handle, *full)?;
                (Value::Null, None)
            }
            ScenarioStep::RingbufNoMoreEntries { ringbuf } => {
                let handle = self.ringbuf(ringbuf)?;
                self.rtos
                    .ringbufs
                    .set_no_more_entries(handle)?;
                (Value::Null, None)
            }
            ScenarioStep::Reset { target } => {
                match target {
                    ResetTarget::Queues => {
                        self.rtos.queues.reset();
                        self.queues.clear();
                    }
                    ResetTarget::Watermarks => self.rtos.tasks.reset_high_water_mark(),
                    ResetTarget::Ringbufs => {
                        self.rtos.ringbufs.reset();
                        self.ringbufs.clear();
                    }
                    ResetTarget::All => {
                        self.rtos.reset_all();
                        self.queues.clear();
                        self.ringbufs.clear();
                    }
                }
                (Value::Null, None)
            }
        };
        Ok(outcome)
    }
}
