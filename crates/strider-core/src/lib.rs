//! Core types and runtime services for the Strider analytics engine
//!
//! This crate provides the foundation every other Strider crate builds on:
//!
//! - The element type system (`DType`) with its promotion lattice and the
//!   centralized capability-downgrade policy.
//! - The error taxonomy shared across the whole workspace.
//! - The backend/device manager: backend enumeration, device descriptors
//!   with capability flags, memory accounting, the allocator cache, and the
//!   manual-evaluation flag.
//! - The memory-pressure policy that scales kernel tile sizes to the active
//!   device.
//! - The batching flag used to turn singleton axes into parallel-for axes.
//!
//! # Design
//!
//! The engine is single-threaded from the caller's perspective; parallelism
//! lives inside each kernel and is governed by the active device's thread
//! budget. All process-wide state (active backend, active device, the
//! manual-eval flag) is owned by a single `DeviceManager` instance behind
//! `manager()`.

pub mod backend;
pub mod batch;
pub mod dtype;
pub mod error;
pub mod memory;

pub use backend::{manager, BackendKind, Device, DeviceManager, MemoryInfo};
pub use batch::{batch_mode, parallel_range, BatchGuard, ParallelRange};
pub use dtype::DType;
pub use error::{Error, Result};
pub use memory::{scale, Complexity};
