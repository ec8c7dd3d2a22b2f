//! # cyroid-auth
//!
//! The Authorization Filter (C3): attribute-based access control over
//! principals, tags, and ownership. No session or token handling lives
//! here — callers resolve a [`Principal`] upstream and pass it in.

pub mod guard;
pub mod principal;
pub mod visibility;

pub use guard::{require_active, require_admin, require_any_role, require_any_tag};
pub use principal::{Principal, Taggable};
pub use visibility::{check_access, filter_visible, visible};
