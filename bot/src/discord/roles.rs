//! Role id to role name resolution.
//!
//! Interaction payloads only carry role ids while the staff gate matches on
//! role names, so names are looked up per guild and cached. The cache is
//! refreshed whenever an id it does not know shows up.

use crate::discord::client::{DiscordClient, DiscordError};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::RwLock;

/// Future returned by [`RoleDirectory::role_names`].
pub type RoleFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<String>, DiscordError>> + Send + 'a>>;

/// Resolves a member's role ids to role names.
pub trait RoleDirectory: Send + Sync {
    /// Names of `role_ids` in `guild_id`, skipping ids the guild does not have.
    ///
    /// # Errors
    ///
    /// Returns [`DiscordError`] when the guild's roles could not be fetched.
    fn role_names<'a>(&'a self, guild_id: &'a str, role_ids: &'a [String]) -> RoleFuture<'a>;
}

/// Directory backed by the REST API with a per-guild cache.
#[derive(Debug)]
pub struct CachedRoleDirectory {
    client: DiscordClient,
    guilds: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl CachedRoleDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new(client: DiscordClient) -> Self {
        Self {
            client,
            guilds: RwLock::new(HashMap::new()),
        }
    }

    async fn cached(&self, guild_id: &str, role_ids: &[String]) -> Option<Vec<String>> {
        let guilds = self.guilds.read().await;
        let roles = guilds.get(guild_id)?;
        role_ids.iter().map(|id| roles.get(id).cloned()).collect()
    }

    async fn refresh(&self, guild_id: &str) -> Result<(), DiscordError> {
        let roles = self.client.guild_roles(guild_id).await?;
        tracing::debug!(guild = guild_id, roles = roles.len(), "Refreshed guild roles");
        self.guilds
            .write()
            .await
            .insert(guild_id.to_string(), roles.into_iter().map(|r| (r.id, r.name)).collect());
        Ok(())
    }
}

impl RoleDirectory for CachedRoleDirectory {
    fn role_names<'a>(&'a self, guild_id: &'a str, role_ids: &'a [String]) -> RoleFuture<'a> {
        Box::pin(async move {
            if role_ids.is_empty() {
                return Ok(Vec::new());
            }
            if let Some(names) = self.cached(guild_id, role_ids).await {
                return Ok(names);
            }

            self.refresh(guild_id).await?;

            let guilds = self.guilds.read().await;
            Ok(guilds
                .get(guild_id)
                .map(|roles| role_ids.iter().filter_map(|id| roles.get(id).cloned()).collect())
                .unwrap_or_default())
        })
    }
}

/// Fixed id to name table, for tests and single-guild setups without REST access.
#[derive(Debug, Clone, Default)]
pub struct StaticRoleDirectory {
    roles: HashMap<String, String>,
}

impl StaticRoleDirectory {
    /// Create a directory from `(id, name)` pairs.
    #[must_use]
    pub fn new<I, K, V>(roles: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl RoleDirectory for StaticRoleDirectory {
    fn role_names<'a>(&'a self, _guild_id: &'a str, role_ids: &'a [String]) -> RoleFuture<'a> {
        Box::pin(async move { Ok(role_ids.iter().filter_map(|id| self.roles.get(id).cloned()).collect()) })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_static_directory_skips_unknown_ids() {
        let directory = StaticRoleDirectory::new([("1", "."), ("2", "Member")]);
        let names = directory
            .role_names("guild", &["2".to_string(), "9".to_string(), "1".to_string()])
            .await
            .unwrap();
        assert_eq!(names, vec!["Member".to_string(), ".".to_string()]);
    }

    #[tokio::test]
    async fn test_cached_directory_answers_from_cache() {
        // Unroutable base URL: any request would fail
        let client = DiscordClient::new("token", Duration::from_secs(1))
            .unwrap()
            .with_api_url("http://127.0.0.1:9");
        let directory = CachedRoleDirectory::new(client);
        directory
            .guilds
            .write()
            .await
            .insert("g".into(), HashMap::from([("1".to_string(), ".".to_string())]));

        assert_eq!(directory.role_names("g", &["1".to_string()]).await.unwrap(), vec![".".to_string()]);
        assert!(directory.role_names("g", &["2".to_string()]).await.is_err());
        assert!(directory.role_names("g", &[]).await.unwrap().is_empty());
    }
}
