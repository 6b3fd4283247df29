//! Backend and device management
//!
//! The engine executes every kernel on the active device of the active
//! backend. Only the CPU backend is compiled into this build; the CUDA and
//! OpenCL backends stay enumerable so callers can probe for them, but
//! selecting one fails with a device error.
//!
//! The manager also owns the allocator cache (freed kernel scratch buffers
//! are pooled for reuse and released by `garbage_collect`), the memory
//! accounting counters behind `MemoryInfo`, and the manual-evaluation flag
//! that switches the array core from deferred to immediate execution.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Execution backend families known to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// Multi-core CPU backend (always available).
    Cpu,
    /// CUDA accelerator backend.
    Cuda,
    /// OpenCL accelerator backend.
    OpenCl,
}

impl BackendKind {
    /// Whether this build can execute kernels on the backend.
    pub fn is_available(&self) -> bool {
        matches!(self, BackendKind::Cpu)
    }
}

/// Descriptor of a single execution device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Device id within its backend.
    pub id: usize,
    /// Human-readable device name.
    pub name: String,
    /// Platform string (backend + runtime version).
    pub platform: String,
    /// Compute capability string.
    pub compute: String,
    /// Native double-precision support.
    pub has_f64: bool,
    /// Native half-precision support.
    pub has_f16: bool,
    /// Worker threads the device schedules kernels over.
    pub threads: usize,
    /// Memory budget in bytes the device exposes to kernels.
    pub memory_bytes: usize,
}

/// Snapshot of the allocator's accounting counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryInfo {
    /// Bytes currently allocated through the device allocator.
    pub bytes: usize,
    /// Live buffer count.
    pub buffers: usize,
    /// Bytes held by buffers locked for host access.
    pub locked_bytes: usize,
    /// Locked buffer count.
    pub locked_buffers: usize,
}

struct ManagerState {
    backend: BackendKind,
    device_id: usize,
    devices: Vec<Device>,
    manual_eval: bool,
    // allocator cache: freed f64 scratch blocks pooled by capacity
    pool: HashMap<usize, Vec<Vec<f64>>>,
}

/// Process-wide backend/device manager.
///
/// One instance exists per process, reachable through [`manager`]. All
/// methods lock internally; the engine's caller-facing model stays
/// single-threaded while kernels parallelize underneath.
pub struct DeviceManager {
    state: Mutex<ManagerState>,
    allocated_bytes: AtomicUsize,
    allocated_buffers: AtomicUsize,
    locked_bytes: AtomicUsize,
    locked_buffers: AtomicUsize,
}

static MANAGER: Lazy<DeviceManager> = Lazy::new(DeviceManager::new);

/// The process-wide [`DeviceManager`].
pub fn manager() -> &'static DeviceManager {
    &MANAGER
}

fn detect_cpu_device() -> Device {
    let threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    Device {
        id: 0,
        name: "cpu".to_string(),
        platform: format!("strider-cpu-{}", env!("CARGO_PKG_VERSION")),
        compute: format!("{threads} threads"),
        has_f64: true,
        // no native half kernels on the CPU path: f16 data is widened on
        // upload by the promotion policy
        has_f16: false,
        threads,
        memory_bytes: detect_available_memory(),
    }
}

fn detect_available_memory() -> usize {
    // 4 GiB fallback when the platform exposes nothing
    const DEFAULT: usize = 4 << 30;
    if let Ok(meminfo) = std::fs::read_to_string("/proc/meminfo") {
        for line in meminfo.lines() {
            if let Some(rest) = line.strip_prefix("MemAvailable:") {
                if let Some(kb) = rest.split_whitespace().next().and_then(|v| v.parse::<usize>().ok()) {
                    return kb * 1024;
                }
            }
        }
    }
    DEFAULT
}

impl DeviceManager {
    fn new() -> Self {
        DeviceManager {
            state: Mutex::new(ManagerState {
                backend: BackendKind::Cpu,
                device_id: 0,
                devices: vec![detect_cpu_device()],
                manual_eval: false,
                pool: HashMap::new(),
            }),
            allocated_bytes: AtomicUsize::new(0),
            allocated_buffers: AtomicUsize::new(0),
            locked_bytes: AtomicUsize::new(0),
            locked_buffers: AtomicUsize::new(0),
        }
    }

    /// Backends present at runtime, available or not.
    pub fn backends(&self) -> Vec<BackendKind> {
        vec![BackendKind::Cpu, BackendKind::Cuda, BackendKind::OpenCl]
    }

    /// Backends this build can actually execute on.
    pub fn available_backends(&self) -> Vec<BackendKind> {
        self.backends().into_iter().filter(|b| b.is_available()).collect()
    }

    /// The active backend.
    pub fn backend(&self) -> BackendKind {
        self.state.lock().unwrap().backend
    }

    /// Switch the active backend.
    pub fn set_backend(&self, backend: BackendKind) -> Result<()> {
        if !backend.is_available() {
            return Err(Error::Device(format!(
                "backend {backend:?} is not available in this build"
            )));
        }
        self.state.lock().unwrap().backend = backend;
        Ok(())
    }

    /// Devices of the active backend.
    pub fn devices(&self) -> Vec<Device> {
        self.state.lock().unwrap().devices.clone()
    }

    /// The active device descriptor.
    pub fn device(&self) -> Device {
        let state = self.state.lock().unwrap();
        state.devices[state.device_id].clone()
    }

    /// Select the active device by id.
    pub fn set_device(&self, id: usize) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if id >= state.devices.len() {
            return Err(Error::Device(format!(
                "device id {id} out of range ({} devices)",
                state.devices.len()
            )));
        }
        state.device_id = id;
        Ok(())
    }

    /// Current allocator accounting.
    pub fn memory_info(&self) -> MemoryInfo {
        MemoryInfo {
            bytes: self.allocated_bytes.load(Ordering::Relaxed),
            buffers: self.allocated_buffers.load(Ordering::Relaxed),
            locked_bytes: self.locked_bytes.load(Ordering::Relaxed),
            locked_buffers: self.locked_buffers.load(Ordering::Relaxed),
        }
    }

    /// Drop every cached scratch buffer.
    pub fn garbage_collect(&self) {
        let mut state = self.state.lock().unwrap();
        let mut freed = 0usize;
        let mut count = 0usize;
        for (cap, bufs) in state.pool.drain() {
            count += bufs.len();
            freed += cap * std::mem::size_of::<f64>() * bufs.len();
        }
        drop(state);
        if count > 0 {
            self.allocated_bytes.fetch_sub(freed, Ordering::Relaxed);
            self.allocated_buffers.fetch_sub(count, Ordering::Relaxed);
            log::debug!("allocator gc released {count} buffers ({freed} bytes)");
        }
    }

    /// Block until the named device (or the active one) has retired all
    /// pending work. The CPU backend executes synchronously, so this only
    /// validates the device id.
    pub fn sync(&self, device: Option<usize>) -> Result<()> {
        let state = self.state.lock().unwrap();
        let id = device.unwrap_or(state.device_id);
        if id >= state.devices.len() {
            return Err(Error::Device(format!("cannot sync unknown device {id}")));
        }
        Ok(())
    }

    /// Whether every operation forces immediate execution.
    pub fn manual_eval(&self) -> bool {
        self.state.lock().unwrap().manual_eval
    }

    /// Toggle deferred evaluation. When `true`, operations materialize
    /// eagerly instead of queueing.
    pub fn set_manual_eval(&self, enabled: bool) {
        self.state.lock().unwrap().manual_eval = enabled;
    }

    /// Worker-thread budget of the active device.
    pub fn threads(&self) -> usize {
        self.device().threads
    }

    /// True when kernels should take the data-parallel path.
    pub fn parallel_enabled(&self) -> bool {
        self.threads() > 1
    }

    /// Take a pooled scratch buffer of at least `len` elements, zeroed.
    pub fn take_scratch(&self, len: usize) -> Vec<f64> {
        let mut state = self.state.lock().unwrap();
        if let Some(bufs) = state.pool.get_mut(&len) {
            if let Some(mut buf) = bufs.pop() {
                buf.clear();
                buf.resize(len, 0.0);
                return buf;
            }
        }
        drop(state);
        self.allocated_bytes
            .fetch_add(len * std::mem::size_of::<f64>(), Ordering::Relaxed);
        self.allocated_buffers.fetch_add(1, Ordering::Relaxed);
        vec![0.0; len]
    }

    /// Return a scratch buffer to the pool.
    pub fn release_scratch(&self, buf: Vec<f64>) {
        let cap = buf.capacity();
        let mut state = self.state.lock().unwrap();
        state.pool.entry(cap).or_default().push(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_backend_is_default_and_available() {
        let m = manager();
        assert_eq!(m.backend(), BackendKind::Cpu);
        assert!(m.available_backends().contains(&BackendKind::Cpu));
    }

    #[test]
    fn accelerator_backends_refuse_selection() {
        let m = manager();
        assert!(m.set_backend(BackendKind::Cuda).is_err());
        assert!(m.set_backend(BackendKind::OpenCl).is_err());
        assert_eq!(m.backend(), BackendKind::Cpu);
    }

    #[test]
    fn device_capabilities() {
        let dev = manager().device();
        assert!(dev.has_f64);
        assert!(!dev.has_f16);
        assert!(dev.threads >= 1);
        assert!(dev.memory_bytes > 0);
    }

    #[test]
    fn unknown_device_rejected() {
        assert!(manager().set_device(64).is_err());
        assert!(manager().sync(Some(64)).is_err());
        assert!(manager().sync(None).is_ok());
    }

    #[test]
    fn scratch_pool_round_trip() {
        let m = manager();
        let before = m.memory_info();
        let buf = m.take_scratch(128);
        assert_eq!(buf.len(), 128);
        m.release_scratch(buf);
        let reused = m.take_scratch(128);
        assert_eq!(reused.len(), 128);
        m.release_scratch(reused);
        m.garbage_collect();
        let after = m.memory_info();
        assert!(after.bytes <= before.bytes + 128 * 8);
    }
}
