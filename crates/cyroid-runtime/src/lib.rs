//! # cyroid-runtime
//!
//! The Container Runtime Adapter (C1): a thin, idempotent wrapper over a
//! container engine. Every higher-level component (the topology
//! orchestrator, the cache manager, the session multiplexer) talks to the
//! engine exclusively through the [`ContainerRuntime`] trait — never
//! through a concrete client directly — so that plans stay testable
//! against an in-memory double.

pub mod backend;
pub mod bollard_runtime;
pub mod spec;

pub use backend::{ContainerHandle, ContainerRuntime, NetworkHandle, RuntimeError};
pub use bollard_runtime::BollardRuntime;
pub use spec::{ContainerSpec, ExecOptions, ExecResult, PullProgress, Stats};
