//! # cyroid-msel
//!
//! The MSEL (Master Scenario Events List) Engine (C6): parses a timeline
//! document into timed injects and executes their actions against a
//! range's VMs, with per-action error isolation (§4.6).

pub mod ast;
pub mod execution;
pub mod parser;
pub mod store;

pub use ast::{Action, Inject, Msel};
pub use execution::{execute_inject, skip_inject, ArtifactSource, VmDirectory, VmTarget};
pub use parser::parse;
pub use store::{import_msel, MselStore};
