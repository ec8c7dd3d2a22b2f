//! Guard functions for role- and tag-gated operations (§4.3).
//!
//! These mirror the dependency-injected checkers in the reference
//! implementation, collapsed into plain functions called at the top of an
//! operation instead of wired through a request-scoped dependency graph.

use cyroid_common::error::{CyroidError, Result};

use crate::principal::Principal;

/// Requires the principal to be an administrator.
///
/// # Errors
/// Returns [`CyroidError::Forbidden`] otherwise.
pub fn require_admin(principal: &Principal) -> Result<()> {
    if principal.is_admin {
        Ok(())
    } else {
        Err(CyroidError::forbidden("administrator access required"))
    }
}

/// Requires the principal to hold at least one of `roles`. Admins always
/// pass.
///
/// # Errors
/// Returns [`CyroidError::Forbidden`] otherwise.
pub fn require_any_role(principal: &Principal, roles: &[&str]) -> Result<()> {
    if principal.has_any_role(roles) {
        Ok(())
    } else {
        Err(CyroidError::forbidden(format!(
            "required role: {}",
            roles.join(", ")
        )))
    }
}

/// Requires the principal to hold at least one of `tags`. Admins always
/// pass.
///
/// # Errors
/// Returns [`CyroidError::Forbidden`] otherwise.
pub fn require_any_tag(principal: &Principal, tags: &[&str]) -> Result<()> {
    if principal.has_any_tag(tags) {
        Ok(())
    } else {
        Err(CyroidError::forbidden(format!(
            "required tag: {}",
            tags.join(", ")
        )))
    }
}

/// Requires the principal to be in good standing: `approved` and `active`
/// (§3). Unlike the other guards, admin status does not bypass this check.
/// Callers run this first, before any role or tag check, so a suspended
/// admin account is rejected the same as a suspended student account.
///
/// # Errors
/// Returns [`CyroidError::Forbidden`] if either flag is unset.
pub fn require_active(principal: &Principal) -> Result<()> {
    if principal.can_act() {
        Ok(())
    } else {
        Err(CyroidError::forbidden(
            "account is not approved and active",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyroid_common::ids::PrincipalId;

    #[test]
    fn require_admin_rejects_non_admin() {
        let p = Principal::new(PrincipalId::new());
        assert!(require_admin(&p).is_err());
    }

    #[test]
    fn require_any_role_admits_admin_without_role() {
        let admin = Principal::new(PrincipalId::new()).as_admin();
        assert!(require_any_role(&admin, &["instructor"]).is_ok());
    }

    #[test]
    fn require_any_tag_checks_membership() {
        let p = Principal::new(PrincipalId::new()).with_tags(["red-team"]);
        assert!(require_any_tag(&p, &["red-team", "blue-team"]).is_ok());
        assert!(require_any_tag(&p, &["blue-team"]).is_err());
    }

    #[test]
    fn require_active_rejects_suspended_admin() {
        let admin = Principal::new(PrincipalId::new())
            .as_admin()
            .with_standing(true, false, false);
        assert!(require_active(&admin).is_err());
    }

    #[test]
    fn require_active_accepts_default_standing() {
        let p = Principal::new(PrincipalId::new());
        assert!(require_active(&p).is_ok());
    }

    #[test]
    fn require_active_rejects_unapproved() {
        let p = Principal::new(PrincipalId::new()).with_standing(false, true, false);
        assert!(require_active(&p).is_err());
    }
}
