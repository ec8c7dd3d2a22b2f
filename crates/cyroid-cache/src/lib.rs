//! # cyroid-cache
//!
//! The Cache Manager (C2): a process-wide registry of in-flight and
//! completed downloads/pulls for container images, Windows/Linux/custom
//! ISOs, with cancellable progress, archive extraction, and atomic
//! content placement.

pub mod archive;
pub mod entry;
pub mod layout;
pub mod registry;

pub use entry::{CacheKey, CacheStatus, CachedFile, CustomIsoMetadata, IsoKind};
pub use registry::CacheManager;
