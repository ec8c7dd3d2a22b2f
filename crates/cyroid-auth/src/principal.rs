//! The authenticated caller and the resource shape it is checked against.

use std::collections::HashSet;

use cyroid_common::ids::PrincipalId;
use serde::{Deserialize, Serialize};

/// An authenticated caller, carrying the ABAC attributes used throughout
/// §4.3: an admin bit, a set of role strings, a set of visibility tags, and
/// the account-standing flags from §3's `Principal` entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    /// Stable identifier, compared against a resource's owner.
    pub id: PrincipalId,
    /// Bypasses every visibility and role check when set.
    pub is_admin: bool,
    /// Role strings, checked by [`crate::require_any_role`].
    pub roles: HashSet<String>,
    /// Visibility tags, checked by [`crate::require_any_tag`] and the
    /// tag-intersection rule in [`crate::visible`].
    pub tags: HashSet<String>,
    /// Whether an administrator has approved this account (§3).
    pub approved: bool,
    /// Whether the account is currently active, not suspended (§3).
    pub active: bool,
    /// Whether the account must change its credentials before acting.
    pub reset_required: bool,
}

impl Principal {
    /// Builds a non-admin principal with no roles or tags, approved and
    /// active by default so tests and simple callers don't have to opt in.
    #[must_use]
    pub fn new(id: PrincipalId) -> Self {
        Self {
            id,
            is_admin: false,
            roles: HashSet::new(),
            tags: HashSet::new(),
            approved: true,
            active: true,
            reset_required: false,
        }
    }

    /// Marks this principal as an administrator. Per §3, an admin role
    /// implies every other role and bypasses the tag filter; it does not
    /// by itself imply `approved`/`active` (those are independent account
    /// standing flags checked by [`Self::can_act`]).
    #[must_use]
    pub fn as_admin(mut self) -> Self {
        self.is_admin = true;
        self
    }

    /// Adds roles, consuming and returning `self` for chained construction.
    #[must_use]
    pub fn with_roles(mut self, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    /// Adds visibility tags, consuming and returning `self`.
    #[must_use]
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Sets account-standing flags, consuming and returning `self`.
    #[must_use]
    pub const fn with_standing(mut self, approved: bool, active: bool, reset_required: bool) -> Self {
        self.approved = approved;
        self.active = active;
        self.reset_required = reset_required;
        self
    }

    /// Whether this principal holds at least one of `roles`.
    #[must_use]
    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        self.is_admin || roles.iter().any(|r| self.roles.contains(*r))
    }

    /// Whether this principal carries at least one of `tags`.
    #[must_use]
    pub fn has_any_tag(&self, tags: &[&str]) -> bool {
        self.is_admin || tags.iter().any(|t| self.tags.contains(*t))
    }

    /// Whether this principal is allowed to act at all (§3's invariant:
    /// "allowed to act iff both `approved` and `active`"). Unlike the role
    /// and tag checks, admin status does not bypass this — a disabled
    /// admin account still cannot act.
    #[must_use]
    pub const fn can_act(&self) -> bool {
        self.approved && self.active
    }
}

/// A resource that can be visibility-filtered: it has an optional owner and
/// zero or more visibility tags (§4.3).
///
/// Ranges, VM templates, and artifacts all implement this via the tag sets
/// already on their entity types; see each crate's `access` module.
pub trait Taggable {
    /// The resource's owning principal, if any.
    fn owner_id(&self) -> Option<PrincipalId>;
    /// The resource's visibility tags. Empty means public.
    fn tags(&self) -> &[String];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_has_any_role_without_holding_it() {
        let admin = Principal::new(PrincipalId::new()).as_admin();
        assert!(admin.has_any_role(&["instructor"]));
    }

    #[test]
    fn non_admin_needs_matching_role() {
        let p = Principal::new(PrincipalId::new()).with_roles(["student"]);
        assert!(!p.has_any_role(&["instructor"]));
        assert!(p.has_any_role(&["student", "instructor"]));
    }
}
