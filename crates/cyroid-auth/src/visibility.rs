//! Visibility filtering and the point-check form of the same rule (§4.3).
//!
//! Both forms implement the identical precedence:
//! 1. Admins see everything.
//! 2. Owners always see their own resources.
//! 3. Untagged resources are public.
//! 4. Otherwise, the principal needs at least one tag in common.

use cyroid_common::error::{CyroidError, Result};

use crate::principal::{Principal, Taggable};

/// Whether `principal` may see `resource`, per the §4.3 visibility rule.
#[must_use]
pub fn visible<T: Taggable>(principal: &Principal, resource: &T) -> bool {
    if principal.is_admin {
        return true;
    }
    if resource.owner_id() == Some(principal.id) {
        return true;
    }
    let tags = resource.tags();
    if tags.is_empty() {
        return true;
    }
    tags.iter().any(|t| principal.tags.contains(t))
}

/// Filters `resources` down to the ones visible to `principal`, preserving
/// order. This is the predicate form used by list endpoints, equivalent to
/// `filter_by_visibility`'s query-level filtering but applied in memory.
pub fn filter_visible<'a, T: Taggable>(
    principal: &Principal,
    resources: impl IntoIterator<Item = &'a T>,
) -> Vec<&'a T> {
    resources
        .into_iter()
        .filter(|r| visible(principal, *r))
        .collect()
}

/// The point-check form: errors with [`CyroidError::Forbidden`] instead of
/// silently dropping the resource, for single-resource `GET`/mutation paths.
///
/// # Errors
/// Returns [`CyroidError::Forbidden`] if `principal` cannot see `resource`.
pub fn check_access<T: Taggable>(principal: &Principal, resource: &T) -> Result<()> {
    if visible(principal, resource) {
        Ok(())
    } else {
        Err(CyroidError::forbidden(
            "you don't have access to this resource",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyroid_common::ids::PrincipalId;

    struct Resource {
        owner: Option<PrincipalId>,
        tags: Vec<String>,
    }

    impl Taggable for Resource {
        fn owner_id(&self) -> Option<PrincipalId> {
            self.owner
        }
        fn tags(&self) -> &[String] {
            &self.tags
        }
    }

    #[test]
    fn untagged_resource_is_public() {
        let principal = Principal::new(PrincipalId::new());
        let resource = Resource {
            owner: None,
            tags: vec![],
        };
        assert!(visible(&principal, &resource));
    }

    #[test]
    fn owner_sees_their_own_tagged_resource() {
        let owner_id = PrincipalId::new();
        let principal = Principal::new(owner_id);
        let resource = Resource {
            owner: Some(owner_id),
            tags: vec!["red-team".to_string()],
        };
        assert!(visible(&principal, &resource));
    }

    #[test]
    fn stranger_without_matching_tag_is_denied() {
        let principal = Principal::new(PrincipalId::new()).with_tags(["blue-team"]);
        let resource = Resource {
            owner: Some(PrincipalId::new()),
            tags: vec!["red-team".to_string()],
        };
        assert!(!visible(&principal, &resource));
        assert!(check_access(&principal, &resource).is_err());
    }

    #[test]
    fn stranger_with_matching_tag_is_allowed() {
        let principal = Principal::new(PrincipalId::new()).with_tags(["red-team"]);
        let resource = Resource {
            owner: Some(PrincipalId::new()),
            tags: vec!["red-team".to_string(), "blue-team".to_string()],
        };
        assert!(visible(&principal, &resource));
    }

    #[test]
    fn admin_sees_everything_regardless_of_tags() {
        let admin = Principal::new(PrincipalId::new()).as_admin();
        let resource = Resource {
            owner: Some(PrincipalId::new()),
            tags: vec!["top-secret".to_string()],
        };
        assert!(visible(&admin, &resource));
    }

    #[test]
    fn filter_visible_preserves_order_and_drops_hidden() {
        let principal = Principal::new(PrincipalId::new()).with_tags(["red-team"]);
        let public = Resource {
            owner: None,
            tags: vec![],
        };
        let hidden = Resource {
            owner: Some(PrincipalId::new()),
            tags: vec!["blue-team".to_string()],
        };
        let matching = Resource {
            owner: Some(PrincipalId::new()),
            tags: vec!["red-team".to_string()],
        };
        let resources = vec![public, hidden, matching];
        let visible_ones = filter_visible(&principal, resources.iter());
        assert_eq!(visible_ones.len(), 2);
        assert!(visible_ones[0].tags.is_empty());
        assert_eq!(visible_ones[1].tags, vec!["red-team".to_string()]);
    }
}
