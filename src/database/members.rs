use async_trait::async_trait;
use sqlx::PgPool;

use crate::tenant::TenantDatabaseName;

/// Answers whether a user id is registered in a company database
#[async_trait]
pub trait MemberDirectory: Send + Sync {
    async fn is_member(
        &self,
        database: &TenantDatabaseName,
        pool: &PgPool,
        user_id: i64,
    ) -> Result<bool, sqlx::Error>;
}

/// Looks the user up in the company's `user_auth` table through its pool
pub struct PgMemberDirectory;

#[async_trait]
impl MemberDirectory for PgMemberDirectory {
    async fn is_member(
        &self,
        _database: &TenantDatabaseName,
        pool: &PgPool,
        user_id: i64,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM user_auth WHERE id = $1)")
            .bind(user_id)
            .fetch_one(pool)
            .await
    }
}
