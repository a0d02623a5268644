use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::entities::user::User;
use crate::domain::repositories::RepositoryResult;

/// Read-mostly access to portal accounts
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    async fn get_user_by_id(&self, id: &str) -> RepositoryResult<Option<User>>;

    async fn get_user_by_username(&self, username: &str) -> RepositoryResult<Option<User>>;

    async fn update_last_login(&self, user_id: &str, at: DateTime<Utc>) -> RepositoryResult<()>;

    async fn update_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> RepositoryResult<()>;
}
