//! Users repository for database operations

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::user::{Role, UpdateUser, User, UserQuery, UserShort},
};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

/// Row values for inserting a new user; the password is already hashed
pub struct NewUserRow {
    pub login: String,
    pub password: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub email: Option<String>,
    pub role: Role,
    pub max_books_allowed: i32,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::UserNotFound { id })
    }

    /// Get user by login (primary authentication method)
    pub async fn get_by_login(&self, login: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE LOWER(login) = LOWER($1)",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Check if a login already exists
    pub async fn login_exists(&self, login: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = if let Some(id) = exclude_id {
            sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(login) = LOWER($1) AND id != $2)",
            )
            .bind(login)
            .bind(id)
            .fetch_one(&self.pool)
            .await?
        } else {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(login) = LOWER($1))")
                .bind(login)
                .fetch_one(&self.pool)
                .await?
        };

        Ok(exists)
    }

    /// Search users with pagination
    pub async fn search(&self, query: &UserQuery) -> AppResult<(Vec<UserShort>, i64)> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
        let name = query.name.as_deref().unwrap_or("");
        let role = query.role.map(|r| r.as_str().to_string());

        let users = sqlx::query_as::<_, UserShort>(
            r#"
            SELECT u.id, u.login, u.firstname, u.lastname, u.role, u.max_books_allowed,
                   (SELECT COUNT(*) FROM book_loans l
                    WHERE l.user_id = u.id AND l.status != 'returned') as nb_loans
            FROM users u
            WHERE ($1 = '' OR u.firstname ILIKE '%' || $1 || '%'
                   OR u.lastname ILIKE '%' || $1 || '%'
                   OR u.login ILIKE '%' || $1 || '%')
              AND ($2::text IS NULL OR u.role = $2)
            ORDER BY u.lastname NULLS LAST, u.login
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(name)
        .bind(&role)
        .bind(per_page)
        .bind(crate::repository::page_offset(page, per_page))
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM users u
            WHERE ($1 = '' OR u.firstname ILIKE '%' || $1 || '%'
                   OR u.lastname ILIKE '%' || $1 || '%'
                   OR u.login ILIKE '%' || $1 || '%')
              AND ($2::text IS NULL OR u.role = $2)
            "#,
        )
        .bind(name)
        .bind(&role)
        .fetch_one(&self.pool)
        .await?;

        Ok((users, total))
    }

    /// Count all users
    pub async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Create a new user
    pub async fn create(&self, user: &NewUserRow) -> AppResult<User> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (login, password, firstname, lastname, email, role, max_books_allowed)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&user.login)
        .bind(&user.password)
        .bind(&user.firstname)
        .bind(&user.lastname)
        .bind(&user.email)
        .bind(user.role)
        .bind(user.max_books_allowed)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// Update a user; absent fields are left unchanged. The password, if
    /// present, must already be hashed by the caller.
    pub async fn update(&self, id: i32, update: &UpdateUser, hashed_password: Option<String>) -> AppResult<User> {
        let updated = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                login = COALESCE($2, login),
                password = COALESCE($3, password),
                firstname = COALESCE($4, firstname),
                lastname = COALESCE($5, lastname),
                email = COALESCE($6, email),
                role = COALESCE($7, role),
                max_books_allowed = COALESCE($8, max_books_allowed),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.login)
        .bind(hashed_password)
        .bind(&update.firstname)
        .bind(&update.lastname)
        .bind(&update.email)
        .bind(update.role)
        .bind(update.max_books_allowed)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::UserNotFound { id })?;

        Ok(updated)
    }

    /// Delete a user
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::UserNotFound { id });
        }

        Ok(())
    }
}
