//! Instance directory CRUD operations.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::DatabaseError;
use crate::provider::{InstanceDirectory, ProviderRegistry};
use crate::types::UserId;
use crate::{Error, Result};

use super::{Database, Instance, NewInstance};

impl Database {
    /// Register an instance for a user
    ///
    /// The url is stored without trailing slashes. Registering the same url twice
    /// for one user is a constraint violation.
    pub async fn add_instance(&self, instance: &NewInstance<'_>) -> Result<Instance> {
        let url = normalize_url(instance.url)?;
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO instances (user_id, api, provider, url, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(instance.user_id as i64)
        .bind(instance.api)
        .bind(instance.provider)
        .bind(&url)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                Error::Database(DatabaseError::ConstraintViolation(format!(
                    "instance {} is already registered",
                    url
                )))
            }
            e => Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert instance: {}",
                e
            ))),
        })?;

        tracing::info!(
            user_id = instance.user_id,
            api = instance.api,
            url = %url,
            "instance registered"
        );

        Ok(Instance {
            id: result.last_insert_rowid(),
            user_id: instance.user_id as i64,
            api: instance.api.to_string(),
            provider: instance.provider.to_string(),
            url,
            created_at: now,
        })
    }

    /// Detect which API `url` speaks and register it under that API
    ///
    /// # Errors
    /// Returns `Error::NotFound` if no registered provider recognises the url
    pub async fn add_detected_instance(
        &self,
        providers: &ProviderRegistry,
        cancel: &CancellationToken,
        user: UserId,
        url: &str,
    ) -> Result<Instance> {
        let url = normalize_url(url)?;
        let provider = providers.detect(cancel, &url).await?;
        self.add_instance(&NewInstance {
            user_id: user.0,
            api: provider.name(),
            provider: provider.provider(),
            url: &url,
        })
        .await
    }

    /// Instances a user registered for one API
    pub async fn list_instances(&self, user: UserId, api: &str) -> Result<Vec<Instance>> {
        let instances = sqlx::query_as::<_, Instance>(
            r#"
            SELECT id, user_id, api, provider, url, created_at
            FROM instances
            WHERE user_id = ? AND api = ?
            ORDER BY id ASC
            "#,
        )
        .bind(user.0 as i64)
        .bind(api)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list instances: {}",
                e
            )))
        })?;

        Ok(instances)
    }

    /// Every instance a user registered, across APIs
    pub async fn list_user_instances(&self, user: UserId) -> Result<Vec<Instance>> {
        let instances = sqlx::query_as::<_, Instance>(
            r#"
            SELECT id, user_id, api, provider, url, created_at
            FROM instances
            WHERE user_id = ?
            ORDER BY api ASC, id ASC
            "#,
        )
        .bind(user.0 as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list user instances: {}",
                e
            )))
        })?;

        Ok(instances)
    }

    /// Remove one of a user's instances
    ///
    /// # Errors
    /// Returns `Error::NotFound` if the user owns no instance with this id
    pub async fn remove_instance(&self, user: UserId, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM instances WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user.0 as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to remove instance: {}",
                    e
                )))
            })?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "instance {} for user {}",
                id, user
            )));
        }

        tracing::info!(user_id = user.0, instance_id = id, "instance removed");
        Ok(())
    }
}

#[async_trait]
impl InstanceDirectory for Database {
    async fn list_instances(&self, user: UserId, api: &str) -> Result<Vec<String>> {
        Ok(Database::list_instances(self, user, api)
            .await?
            .into_iter()
            .map(|instance| instance.url)
            .collect())
    }
}

/// Check that `raw` is an absolute http(s) url and strip trailing slashes
fn normalize_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = url::Url::parse(trimmed)
        .map_err(|e| Error::Validation(format!("invalid instance url '{}': {}", raw, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(Error::Validation(format!(
            "instance url '{}' must use http or https, not {}",
            raw, other
        ))),
    }
}
