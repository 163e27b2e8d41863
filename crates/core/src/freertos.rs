// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Drop-in surface named after the ESP-IDF FreeRTOS API.
//!
//! State is global per thread: firmware code calls these functions without a
//! context argument, and each test thread gets an isolated simulator. Every
//! `ticks`/timeout argument is accepted and ignored; no call ever blocks.
//!
//! Functions marked "testing only" do not exist on the real platform.

#![allow(non_snake_case, non_camel_case_types, non_upper_case_globals)]

use crate::{QueueHandle, RingbufHandle, RingbufType, Rtos, TaskHandle};
use std::cell::RefCell;
use std::ffi::c_void;

pub type BaseType_t = i64;
pub type UBaseType_t = u64;
pub type TickType_t = u32;
pub type TaskFunction_t = fn(*mut c_void);

pub type QueueHandle_t = Option<QueueHandle>;
pub type SemaphoreHandle_t = Option<QueueHandle>;
pub type TaskHandle_t = TaskHandle;
pub type RingbufHandle_t = Option<RingbufHandle>;
pub type RingbufferType_t = RingbufType;

pub const pdFALSE: BaseType_t = 0;
pub const pdTRUE: BaseType_t = 1;
pub const portMAX_DELAY: TickType_t = TickType_t::MAX;
pub const configTICK_RATE_HZ: TickType_t = 1000;
pub const portTICK_PERIOD_MS: TickType_t = 1000 / configTICK_RATE_HZ;

pub const RINGBUF_TYPE_NOSPLIT: RingbufferType_t = RingbufType::NoSplit;
pub const RINGBUF_TYPE_ALLOWSPLIT: RingbufferType_t = RingbufType::AllowSplit;
pub const RINGBUF_TYPE_BYTEBUF: RingbufferType_t = RingbufType::ByteBuf;

pub const fn pdMS_TO_TICKS(ms: TickType_t) -> TickType_t {
    ((ms as u64 * configTICK_RATE_HZ as u64) / 1000) as TickType_t
}

thread_local! {
    static RTOS: RefCell<Rtos> = RefCell::new(Rtos::new());
}

/// Runs `f` against this thread's simulator.
pub fn with_rtos<R>(f: impl FnOnce(&mut Rtos) -> R) -> R {
    RTOS.with(|rtos| f(&mut *rtos.borrow_mut()))
}

/// Replaces this thread's simulator, e.g. with one built from a config file.
pub fn install(rtos: Rtos) {
    RTOS.with(|slot| *slot.borrow_mut() = rtos);
}

fn status(ok: bool) -> BaseType_t {
    if ok {
        pdTRUE
    } else {
        pdFALSE
    }
}

// Queues

pub fn xQueueCreate(uxQueueLength: UBaseType_t, uxItemSize: UBaseType_t) -> QueueHandle_t {
    with_rtos(|rtos| rtos.queues.create(uxQueueLength, uxItemSize))
}

pub fn xQueueSendToBack(
    xQueue: QueueHandle_t,
    pvItemToQueue: &[u8],
    _xTicksToWait: TickType_t,
) -> BaseType_t {
    let Some(handle) = xQueue else {
        return pdFALSE;
    };
    status(with_rtos(|rtos| rtos.queues.send_to_back(handle, pvItemToQueue)).is_ok())
}

/// Not simulated: always `pdFALSE`.
pub fn xQueueSendToFront(
    xQueue: QueueHandle_t,
    pvItemToQueue: &[u8],
    _xTicksToWait: TickType_t,
) -> BaseType_t {
    let Some(handle) = xQueue else {
        return pdFALSE;
    };
    status(with_rtos(|rtos| rtos.queues.send_to_front(handle, pvItemToQueue)).is_ok())
}

pub fn xQueueReceive(
    xQueue: QueueHandle_t,
    pvBuffer: &mut [u8],
    _xTicksToWait: TickType_t,
) -> BaseType_t {
    let Some(handle) = xQueue else {
        return pdFALSE;
    };
    status(with_rtos(|rtos| rtos.queues.receive(handle, pvBuffer)).is_ok())
}

pub fn uxQueueSpacesAvailable(xQueue: QueueHandle_t) -> UBaseType_t {
    xQueue
        .and_then(|handle| with_rtos(|rtos| rtos.queues.spaces_available(handle)).ok())
        .unwrap_or(0) as UBaseType_t
}

pub fn uxQueueMessagesWaiting(xQueue: QueueHandle_t) -> UBaseType_t {
    xQueue
        .and_then(|handle| with_rtos(|rtos| rtos.queues.messages_waiting(handle)).ok())
        .unwrap_or(0) as UBaseType_t
}

/// Testing only.
pub fn uxQueueReset() {
    with_rtos(|rtos| rtos.queues.reset());
}

// Semaphores are not simulated: creation yields no handle and every take succeeds.

pub fn xSemaphoreCreateMutex() -> SemaphoreHandle_t {
    None
}

pub fn xSemaphoreTake(_xSemaphore: SemaphoreHandle_t, _xTicksToWait: TickType_t) -> BaseType_t {
    pdTRUE
}

pub fn xSemaphoreGive(_xSemaphore: SemaphoreHandle_t) -> BaseType_t {
    pdTRUE
}

pub fn xSemaphoreGiveFromISR(
    _xSemaphore: SemaphoreHandle_t,
    pxHigherPriorityTaskWoken: Option<&mut BaseType_t>,
) -> BaseType_t {
    if let Some(woken) = pxHigherPriorityTaskWoken {
        *woken = pdFALSE;
    }
    pdTRUE
}

// Tasks

/// Mints a handle into `pxCreatedTask`; `pvTaskCode` is never run.
pub fn xTaskCreatePinnedToCore(
    _pvTaskCode: TaskFunction_t,
    pcName: &str,
    _usStackDepth: u16,
    _pvParameters: *mut c_void,
    _uxPriority: UBaseType_t,
    pxCreatedTask: Option<&mut TaskHandle_t>,
    _xCoreID: BaseType_t,
) -> BaseType_t {
    let handle = with_rtos(|rtos| rtos.tasks.create_task(pcName));
    if let Some(out) = pxCreatedTask {
        *out = handle;
    }
    pdTRUE
}

pub fn xTaskGetCurrentTaskHandle() -> TaskHandle_t {
    with_rtos(|rtos| rtos.tasks.current_task_handle())
}

pub fn uxTaskGetStackHighWaterMark(xTask: TaskHandle_t) -> UBaseType_t {
    with_rtos(|rtos| rtos.tasks.stack_high_water_mark(xTask))
}

/// Testing only.
pub fn uxTaskGetStackHighWaterMarkReset() {
    with_rtos(|rtos| rtos.tasks.reset_high_water_mark());
}

pub fn vTaskNotifyGiveFromISR(
    xTaskToNotify: TaskHandle_t,
    pxHigherPriorityTaskWoken: Option<&mut BaseType_t>,
) {
    with_rtos(|rtos| rtos.tasks.notify_give(xTaskToNotify));
    if let Some(woken) = pxHigherPriorityTaskWoken {
        *woken = pdFALSE;
    }
}

pub fn ulTaskNotifyTake(_xClearCountOnExit: BaseType_t, _xTicksToWait: TickType_t) -> u32 {
    with_rtos(|rtos| rtos.tasks.notify_take())
}

// Ring buffers

pub fn xRingbufferCreate(xBufferSize: usize, xBufferType: RingbufferType_t) -> RingbufHandle_t {
    with_rtos(|rtos| rtos.ringbufs.create(xBufferSize, xBufferType))
}

/// Sends the first `xItemSize` bytes of `pvItem`.
pub fn xRingbufferSend(
    xRingbuffer: RingbufHandle_t,
    pvItem: &[u8],
    xItemSize: usize,
    _xTicksToWait: TickType_t,
) -> BaseType_t {
    let (Some(handle), Some(payload)) = (xRingbuffer, pvItem.get(..xItemSize)) else {
        return pdFALSE;
    };
    status(with_rtos(|rtos| rtos.ringbufs.send(handle, payload)).is_ok())
}

/// Copies the next item out as one or two parts. On failure the outputs are untouched.
pub fn xRingbufferReceiveSplit(
    xRingbuffer: RingbufHandle_t,
    ppvHeadItem: &mut Option<Vec<u8>>,
    ppvTailItem: &mut Option<Vec<u8>>,
    pxHeadItemSize: &mut usize,
    pxTailItemSize: &mut usize,
    _xTicksToWait: TickType_t,
) -> BaseType_t {
    let Some(handle) = xRingbuffer else {
        return pdFALSE;
    };
    with_rtos(|rtos| match rtos.ringbufs.receive_split(handle) {
        Ok(item) => {
            *pxHeadItemSize = item.first.len();
            *ppvHeadItem = Some(item.first.to_vec());
            *pxTailItemSize = item.second.map_or(0, <[u8]>::len);
            *ppvTailItem = item.second.map(<[u8]>::to_vec);
            pdTRUE
        }
        Err(_) => pdFALSE,
    })
}

pub fn xRingbufferGetCurFreeSize(xRingbuffer: RingbufHandle_t) -> usize {
    xRingbuffer.map_or(0, |handle| with_rtos(|rtos| rtos.ringbufs.free_size(handle)))
}

/// Received items are copies, so there is nothing to give back.
pub fn vRingbufferReturnItem(_xRingbuffer: RingbufHandle_t, _pvItem: Option<Vec<u8>>) {}

/// Testing only.
pub fn setRingBufferBufferFull(xRingbuffer: RingbufHandle_t, isFull: bool) {
    if let Some(handle) = xRingbuffer {
        if let Err(e) = with_rtos(|rtos| rtos.ringbufs.set_forced_full(handle, isFull)) {
            tracing::warn!("setRingBufferBufferFull: {}", e);
        }
    }
}

/// Testing only.
pub fn setRingBufferNoMoreEntries(xRingbuffer: RingbufHandle_t) {
    if let Some(handle) = xRingbuffer {
        if let Err(e) = with_rtos(|rtos| rtos.ringbufs.set_no_more_entries(handle)) {
            tracing::warn!("setRingBufferNoMoreEntries: {}", e);
        }
    }
}

/// Testing only.
pub fn uxRingbufReset() {
    with_rtos(|rtos| rtos.ringbufs.reset());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_conversion() {
        assert_eq!(portTICK_PERIOD_MS, 1);
        assert_eq!(pdMS_TO_TICKS(250), 250);
        assert_eq!(pdMS_TO_TICKS(TickType_t::MAX), TickType_t::MAX);
    }

    #[test]
    fn test_null_handles_fail_quietly() {
        let mut buf = [0u8; 4];
        assert_eq!(xQueueSendToBack(None, b"x", 0), pdFALSE);
        assert_eq!(xQueueReceive(None, &mut buf, 0), pdFALSE);
        assert_eq!(uxQueueSpacesAvailable(None), 0);
        assert_eq!(uxQueueMessagesWaiting(None), 0);
        assert_eq!(xRingbufferSend(None, &[], 0, 0), pdFALSE);
        assert_eq!(xRingbufferGetCurFreeSize(None), 0);

        let (mut head, mut tail) = (None, None);
        let (mut head_size, mut tail_size) = (5, 5);
        assert_eq!(
            xRingbufferReceiveSplit(None, &mut head, &mut tail, &mut head_size, &mut tail_size, 0),
            pdFALSE
        );
        assert_eq!((head_size, tail_size), (5, 5));
        setRingBufferBufferFull(None, true);
        setRingBufferNoMoreEntries(None);
    }

    #[test]
    fn test_semaphore_stubs() {
        let mutex = xSemaphoreCreateMutex();
        assert!(mutex.is_none());
        assert_eq!(xSemaphoreTake(mutex, portMAX_DELAY), pdTRUE);
        assert_eq!(xSemaphoreGive(mutex), pdTRUE);
        let mut woken = pdTRUE;
        assert_eq!(xSemaphoreGiveFromISR(mutex, Some(&mut woken)), pdTRUE);
        assert_eq!(woken, pdFALSE);
    }

    #[test]
    fn test_send_size_beyond_payload_rejected() {
        uxRingbufReset();
        let rb = xRingbufferCreate(100, RINGBUF_TYPE_ALLOWSPLIT);
        assert_eq!(xRingbufferSend(rb, b"abc", 4, 0), pdFALSE);
        assert_eq!(xRingbufferSend(rb, b"abc", 2, 0), pdTRUE);

        let (mut head, mut tail) = (None, None);
        let (mut head_size, mut tail_size) = (0, 0);
        assert_eq!(
            xRingbufferReceiveSplit(rb, &mut head, &mut tail, &mut head_size, &mut tail_size, 0),
            pdTRUE
        );
        assert_eq!(head.as_deref(), Some(&b"ab"[..]));
        assert_eq!(tail, None);
        vRingbufferReturnItem(rb, head);
    }

    #[test]
    fn test_install_replaces_thread_state() {
        let config = labwired_rtos_config::SimConfig::from_yaml("queues:\n  max_queues: 1\n")
            .unwrap();
        install(Rtos::from_config(&config).unwrap());
        assert!(xQueueCreate(1, 1).is_some());
        assert!(xQueueCreate(1, 1).is_none());
        install(Rtos::new());
    }
}
