//! Topology Orchestrator (C4) and VM Image Synthesizer (C5): the
//! range/network/VM lifecycle state machines, the plans that compose
//! them into ordered, idempotent operations against `cyroid-runtime`,
//! and the pure function that turns a VM/template/network triple into a
//! concrete container spec (§4.4, §4.5).

pub mod blueprint;
pub mod lock;
pub mod model;
pub mod plan;
pub mod store;
pub mod synth;

pub use blueprint::{BlueprintNetwork, BlueprintVm, RangeBlueprint};
pub use lock::RangeLocks;
pub use model::{Network, Range, Snapshot, Vm, VmTemplate};
pub use plan::Orchestrator;
pub use store::TopologyStore;
pub use synth::{synthesize, vnc_backend_port};
