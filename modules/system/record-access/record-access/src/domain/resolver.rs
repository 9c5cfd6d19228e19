//! Resolution of an inbound identity into an effective [`User`].

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use record_access_sdk::{AccessError, GroupStore, IdentityClaims, IdentityStore, User};
use tracing::{debug, warn};

use crate::config::{GroupExpansion, RecordAccessConfig};
use crate::domain::merge::merge_permissions;

/// Resolves a subject and its asserted claims into a fully merged user.
///
/// A fresh [`User`] is built on every call; nothing is cached between calls.
#[derive(Clone)]
pub struct UserResolver {
    identities: Arc<dyn IdentityStore>,
    groups: Arc<dyn GroupStore>,
    expansion: GroupExpansion,
    max_depth: usize,
    timeout: Option<Duration>,
}

impl UserResolver {
    #[must_use]
    pub fn new(identities: Arc<dyn IdentityStore>, groups: Arc<dyn GroupStore>) -> Self {
        Self {
            identities,
            groups,
            expansion: GroupExpansion::Direct,
            max_depth: 1,
            timeout: None,
        }
    }

    /// Creates a resolver using the expansion settings from `cfg`.
    #[must_use]
    pub fn from_config(
        cfg: &RecordAccessConfig,
        identities: Arc<dyn IdentityStore>,
        groups: Arc<dyn GroupStore>,
    ) -> Self {
        Self::new(identities, groups)
            .with_expansion(cfg.group_expansion, cfg.max_group_depth)
            .with_timeout(cfg.resolve_timeout)
    }

    #[must_use]
    pub fn with_expansion(mut self, expansion: GroupExpansion, max_depth: usize) -> Self {
        self.expansion = expansion;
        self.max_depth = max_depth.max(1);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolves `subject_id` into its effective user.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` if neither a direct identity row nor any asserted
    ///   group confirms the subject, or an owned group does not exist
    /// - lookup errors from the stores, unchanged
    /// - `Internal` when the configured resolve timeout elapses
    #[tracing::instrument(skip_all, fields(subject = %subject_id))]
    pub async fn resolve(
        &self,
        subject_id: &str,
        claims: Option<&IdentityClaims>,
    ) -> Result<User, AccessError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.resolve_inner(subject_id, claims))
                .await
                .map_err(|_| {
                    warn!(timeout = ?limit, "identity resolution timed out");
                    AccessError::internal("identity resolution timed out")
                })?,
            None => self.resolve_inner(subject_id, claims).await,
        }
    }

    async fn resolve_inner(
        &self,
        subject_id: &str,
        claims: Option<&IdentityClaims>,
    ) -> Result<User, AccessError> {
        let direct = self.identities.find_identity(subject_id).await?;
        let has_direct = direct.is_some();
        let mut user = if let Some(mut row) = direct {
            if row.id.is_empty() {
                subject_id.clone_into(&mut row.id);
            }
            row
        } else {
            debug!("no direct identity row");
            User::new(subject_id)
        };

        let confirmed = self.merge_asserted_groups(&mut user, claims).await?;

        if !has_direct && confirmed.is_empty() {
            warn!("subject has neither an identity row nor a confirmed group");
            return Err(AccessError::unauthorized(format!(
                "Auth id '{subject_id}' is not authorized"
            )));
        }

        self.merge_owned_groups(&mut user).await?;

        if let Some(claims) = claims {
            overlay_claims(&mut user, claims);
        }
        for group_id in &confirmed {
            user.permissions.add_group(group_id);
        }

        debug!(user = %user.identifier(), groups = ?user.groups(), "identity resolved");
        Ok(user)
    }

    /// Merges every asserted group that is registered as an identity row and
    /// returns the confirmed ids in claim order. Unknown ids are skipped.
    async fn merge_asserted_groups(
        &self,
        user: &mut User,
        claims: Option<&IdentityClaims>,
    ) -> Result<Vec<String>, AccessError> {
        let Some(claims) = claims else {
            return Ok(Vec::new());
        };

        let mut seen = HashSet::new();
        let mut confirmed = Vec::new();
        for group_id in &claims.groups {
            if group_id.is_empty() || !seen.insert(group_id.as_str()) {
                continue;
            }
            let Some(row) = self.identities.find_identity(group_id).await? else {
                debug!(group_id = %group_id, "asserted group unknown, skipping");
                continue;
            };
            debug!(group_id = %group_id, "asserted group confirmed");
            merge_permissions(&mut user.permissions, &row.permissions);
            confirmed.push(group_id.clone());
        }
        Ok(confirmed)
    }

    /// Fetches and merges the groups currently listed on `user`.
    ///
    /// Each group is fetched at most once. In direct mode only the ids present
    /// on entry are fetched; transitive mode keeps following nested ids until
    /// the depth bound.
    async fn merge_owned_groups(&self, user: &mut User) -> Result<(), AccessError> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, usize)> = user
            .groups()
            .iter()
            .map(|g| (g.clone(), 1))
            .collect();

        while let Some((group_id, depth)) = queue.pop_front() {
            if !visited.insert(group_id.clone()) {
                continue;
            }

            let Some(group) = self.groups.find_group(&group_id).await? else {
                warn!(group_id = %group_id, "owned group does not exist");
                return Err(AccessError::unauthorized(format!(
                    "Group '{group_id}' does not exist"
                )));
            };
            merge_permissions(&mut user.permissions, &group.permissions);

            if self.expansion == GroupExpansion::Direct {
                continue;
            }
            for nested in &group.permissions.groups {
                if visited.contains(nested) {
                    continue;
                }
                if depth >= self.max_depth {
                    warn!(
                        group_id = %group_id,
                        nested = %nested,
                        max_depth = self.max_depth,
                        "group nesting exceeds max depth, not expanding further"
                    );
                    continue;
                }
                queue.push_back((nested.clone(), depth + 1));
            }
        }
        Ok(())
    }
}

fn overlay_claims(user: &mut User, claims: &IdentityClaims) {
    for (slot, claimed) in [
        (&mut user.username, &claims.username),
        (&mut user.name, &claims.name),
        (&mut user.email, &claims.email),
    ] {
        if let Some(value) = claimed.as_deref().filter(|v| !v.is_empty()) {
            *slot = Some(value.to_owned());
        }
    }
    if !claims.groups.is_empty() {
        user.permissions.groups.clear();
        for group_id in &claims.groups {
            user.permissions.add_group(group_id);
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use record_access_sdk::{ErrorKind, Group, PermittedEndpoint};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Tables {
        identities: HashMap<String, User>,
        groups: HashMap<String, Group>,
        group_lookups: AtomicUsize,
    }

    #[async_trait]
    impl IdentityStore for Tables {
        async fn find_identity(&self, id: &str) -> Result<Option<User>, AccessError> {
            Ok(self.identities.get(id).cloned())
        }
    }

    #[async_trait]
    impl GroupStore for Tables {
        async fn find_group(&self, group_id: &str) -> Result<Option<Group>, AccessError> {
            self.group_lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.groups.get(group_id).cloned())
        }
    }

    fn identity(id: &str, groups: &[&str], endpoint: &str) -> User {
        let mut user = User::new(id);
        for g in groups {
            user.permissions.add_group(g);
        }
        user.permissions
            .permitted_endpoints
            .insert(PermittedEndpoint::new("GET", endpoint));
        user
    }

    fn group(id: &str, nested: &[&str], excluded: &str) -> Group {
        let mut g = Group::new(id);
        for n in nested {
            g.permissions.add_group(n);
        }
        g.permissions.exclude_fields.insert(excluded.to_owned());
        g
    }

    fn resolver(tables: Tables) -> (UserResolver, Arc<Tables>) {
        let tables = Arc::new(tables);
        (UserResolver::new(tables.clone(), tables.clone()), tables)
    }

    #[tokio::test]
    async fn unknown_subject_without_claims_is_unauthorized() {
        let (resolver, _) = resolver(Tables::default());
        let err = resolver.resolve("ghost", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(err.message(), "Auth id 'ghost' is not authorized");
    }

    #[tokio::test]
    async fn unknown_asserted_groups_do_not_authorize() {
        let (resolver, _) = resolver(Tables::default());
        let claims = IdentityClaims::default().with_groups(["nobody"]);
        let err = resolver.resolve("ghost", Some(&claims)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn owned_groups_are_merged() {
        let mut tables = Tables::default();
        tables
            .identities
            .insert("u1".into(), identity("u1", &["staff"], "/items"));
        tables
            .groups
            .insert("staff".into(), group("staff", &[], "salary"));
        let (resolver, _) = resolver(tables);

        let user = resolver.resolve("u1", None).await.unwrap();
        assert!(user.permissions.exclude_fields.contains("salary"));
        assert_eq!(user.groups(), ["staff"]);
    }

    #[tokio::test]
    async fn missing_owned_group_is_unauthorized() {
        let mut tables = Tables::default();
        tables
            .identities
            .insert("u1".into(), identity("u1", &["finance-team"], "/items"));
        let (resolver, _) = resolver(tables);

        let err = resolver.resolve("u1", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(err.message(), "Group 'finance-team' does not exist");
    }

    #[tokio::test]
    async fn claims_overlay_metadata_and_replace_groups() {
        let mut tables = Tables::default();
        let mut row = identity("u1", &["staff"], "/items");
        row.username = Some("stored".into());
        row.email = Some("stored@example.com".into());
        tables.identities.insert("u1".into(), row);
        tables
            .identities
            .insert("admins".into(), identity("admins", &[], "/admin"));
        tables
            .groups
            .insert("staff".into(), group("staff", &[], "salary"));
        let (resolver, _) = resolver(tables);

        let claims = IdentityClaims::default()
            .with_username("alice")
            .with_email("")
            .with_groups(["engineering", "admins"]);
        let user = resolver.resolve("u1", Some(&claims)).await.unwrap();

        assert_eq!(user.username.as_deref(), Some("alice"));
        assert_eq!(user.email.as_deref(), Some("stored@example.com"));
        // claimed list replaces the owned ones, then confirmed groups follow
        assert_eq!(user.groups(), ["engineering", "admins"]);
        // permissions from the replaced owned group stay merged
        assert!(user.permissions.exclude_fields.contains("salary"));
        assert!(user
            .permissions
            .permitted_endpoints
            .contains(&PermittedEndpoint::new("GET", "/admin")));
    }

    #[tokio::test]
    async fn direct_mode_folds_nested_ids_without_fetching() {
        let mut tables = Tables::default();
        tables
            .identities
            .insert("u1".into(), identity("u1", &["outer"], "/items"));
        tables
            .groups
            .insert("outer".into(), group("outer", &["inner"], "a"));
        let (resolver, tables) = resolver(tables);

        let user = resolver.resolve("u1", None).await.unwrap();
        assert_eq!(user.groups(), ["outer", "inner"]);
        assert_eq!(tables.group_lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transitive_mode_terminates_on_cycles() {
        let mut tables = Tables::default();
        tables
            .identities
            .insert("u1".into(), identity("u1", &["a"], "/items"));
        tables.groups.insert("a".into(), group("a", &["b"], "fa"));
        tables.groups.insert("b".into(), group("b", &["a", "c"], "fb"));
        tables.groups.insert("c".into(), group("c", &["a"], "fc"));
        let (resolver, tables) = resolver(tables);
        let resolver = resolver.with_expansion(GroupExpansion::Transitive, 8);

        let user = resolver.resolve("u1", None).await.unwrap();
        for f in ["fa", "fb", "fc"] {
            assert!(user.permissions.exclude_fields.contains(f));
        }
        assert_eq!(tables.group_lookups.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn transitive_mode_respects_depth() {
        let mut tables = Tables::default();
        tables
            .identities
            .insert("u1".into(), identity("u1", &["a"], "/items"));
        tables.groups.insert("a".into(), group("a", &["b"], "fa"));
        tables.groups.insert("b".into(), group("b", &["c"], "fb"));
        let (resolver, _) = resolver(tables);
        let resolver = resolver.with_expansion(GroupExpansion::Transitive, 2);

        // "c" is past the bound, so its absence from the group store is never observed
        let user = resolver.resolve("u1", None).await.unwrap();
        assert!(user.permissions.exclude_fields.contains("fb"));
        assert!(user.groups().contains(&"c".to_owned()));
    }

    #[tokio::test]
    async fn transitive_mode_requires_nested_groups_to_exist() {
        let mut tables = Tables::default();
        tables
            .identities
            .insert("u1".into(), identity("u1", &["a"], "/items"));
        tables.groups.insert("a".into(), group("a", &["missing"], "fa"));
        let (resolver, _) = resolver(tables);
        let resolver = resolver.with_expansion(GroupExpansion::Transitive, 4);

        let err = resolver.resolve("u1", None).await.unwrap_err();
        assert_eq!(err.message(), "Group 'missing' does not exist");
    }

    struct SlowIdentities;

    #[async_trait]
    impl IdentityStore for SlowIdentities {
        async fn find_identity(&self, _id: &str) -> Result<Option<User>, AccessError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(None)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_discards_partial_resolution() {
        let resolver = UserResolver::new(Arc::new(SlowIdentities), Arc::new(Tables::default()))
            .with_timeout(Some(Duration::from_millis(50)));
        let err = resolver.resolve("u1", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
