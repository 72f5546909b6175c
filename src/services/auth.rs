//! Authentication and user management service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{CreateUser, Role, UpdateUser, User, UserClaims, UserQuery, UserShort},
    repository::{users::NewUserRow, Repository},
};

const DEFAULT_MAX_BOOKS: i32 = 5;

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    fn hash_password(password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    }

    fn verify_password(password: &str, hash: &str) -> bool {
        PasswordHash::new(hash)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    }

    /// Authenticate a user and issue a JWT
    pub async fn login(&self, login: &str, password: &str) -> AppResult<(String, User)> {
        let user = self
            .repository
            .users
            .get_by_login(login)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid login or password".to_string()))?;

        let valid = user
            .password
            .as_deref()
            .map(|hash| Self::verify_password(password, hash))
            .unwrap_or(false);

        if !valid {
            return Err(AppError::Authentication(
                "Invalid login or password".to_string(),
            ));
        }

        let now = Utc::now();
        let claims = UserClaims {
            sub: user.login.clone(),
            user_id: user.id,
            role: user.role,
            iat: now.timestamp(),
            exp: (now + chrono::Duration::hours(self.config.jwt_expiration_hours as i64))
                .timestamp(),
        };

        let token = claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Token creation failed: {}", e)))?;

        tracing::info!(user_id = user.id, "user logged in");
        Ok((token, user))
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    /// Search users with pagination
    pub async fn search_users(&self, query: &UserQuery) -> AppResult<(Vec<UserShort>, i64)> {
        self.repository.users.search(query).await
    }

    /// Create a new user
    pub async fn create_user(&self, user: CreateUser) -> AppResult<User> {
        user.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        if self.repository.users.login_exists(&user.login, None).await? {
            return Err(AppError::Conflict(format!(
                "Login '{}' already exists",
                user.login
            )));
        }

        let password = user
            .password
            .as_deref()
            .map(Self::hash_password)
            .transpose()?;

        let row = NewUserRow {
            login: user.login,
            password,
            firstname: user.firstname,
            lastname: user.lastname,
            email: user.email,
            role: user.role.unwrap_or(Role::Member),
            max_books_allowed: user.max_books_allowed.unwrap_or(DEFAULT_MAX_BOOKS),
        };

        self.repository.users.create(&row).await
    }

    /// Update an existing user
    pub async fn update_user(&self, id: i32, update: UpdateUser) -> AppResult<User> {
        update
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        if let Some(ref login) = update.login {
            if self.repository.users.login_exists(login, Some(id)).await? {
                return Err(AppError::Conflict(format!("Login '{}' already exists", login)));
            }
        }

        let hashed = update
            .password
            .as_deref()
            .map(Self::hash_password)
            .transpose()?;

        self.repository.users.update(id, &update, hashed).await
    }

    /// Delete a user. Refused while the user still holds non-returned loans.
    pub async fn delete_user(&self, id: i32) -> AppResult<()> {
        self.repository.users.get_by_id(id).await?;

        let open_loans = self.repository.loans.count_open_for_user(id).await?;
        if open_loans > 0 {
            return Err(AppError::Conflict(format!(
                "User {} still holds {} non-returned loan(s)",
                id, open_loans
            )));
        }

        self.repository.users.delete(id).await
    }

    /// Seed a default librarian account when the users table is empty, so a
    /// fresh install can be administered.
    pub async fn seed_default_librarian(&self, login: &str, password: &str) -> AppResult<()> {
        if self.repository.users.count().await? > 0 {
            return Ok(());
        }

        let row = NewUserRow {
            login: login.to_string(),
            password: Some(Self::hash_password(password)?),
            firstname: None,
            lastname: None,
            email: None,
            role: Role::Librarian,
            max_books_allowed: DEFAULT_MAX_BOOKS,
        };

        self.repository.users.create(&row).await?;
        tracing::warn!(login, "seeded default librarian account; change its password");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies_and_rejects() {
        let hash = AuthService::hash_password("correct horse").unwrap();
        assert!(AuthService::verify_password("correct horse", &hash));
        assert!(!AuthService::verify_password("battery staple", &hash));
        assert!(!AuthService::verify_password("correct horse", "not-a-hash"));
    }
}
