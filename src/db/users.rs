//! User store.

use sqlx::SqlitePool;

use super::models::User;
use super::{write_error, StoreError};
use crate::utils::now_timestamp;

/// Insert a user whose password is already hashed. `email` must be normalised.
pub async fn create_user(
    db: &SqlitePool,
    name: &str,
    email: &str,
    password_hash: &str,
) -> Result<User, StoreError> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = now_timestamp();

    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await
    .map_err(write_error)?;

    find_user_by_id(db, &id).await?.ok_or(StoreError::NotFound)
}

pub async fn find_user_by_email(db: &SqlitePool, email: &str) -> Result<Option<User>, StoreError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(db)
        .await?;
    Ok(user)
}

pub async fn find_user_by_id(db: &SqlitePool, id: &str) -> Result<Option<User>, StoreError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn test_create_and_find() {
        let pool = test_pool().await;
        let user = create_user(&pool, "Test User", "test@example.com", "hash")
            .await
            .unwrap();

        let by_email = find_user_by_email(&pool, "test@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, user.id);

        let by_id = find_user_by_id(&pool, &user.id).await.unwrap().unwrap();
        assert_eq!(by_id.name, "Test User");

        assert!(find_user_by_email(&pool, "other@example.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_user_email() {
        let pool = test_pool().await;
        create_user(&pool, "A", "a@example.com", "hash").await.unwrap();
        let err = create_user(&pool, "B", "a@example.com", "hash")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }
}
