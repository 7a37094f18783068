use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;

use crate::config::Config;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{
    Claims, CreateUserRequest, LoginRequest, LoginResponse, User, UserResponse, UserRole,
};

/// Authentication and user-provisioning service
pub struct AuthService;

impl AuthService {
    /// Login with username and password
    pub async fn login(db: &Database, config: &Config, req: LoginRequest) -> Result<LoginResponse> {
        let user: User = db
            .fetch_optional(
                "SELECT * FROM users WHERE username = ?",
                &[req.username.as_str().into()],
            )
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;

        if !Self::verify_password(&req.password, &user.password_hash)? {
            return Err(AppError::Unauthorized("Invalid credentials".to_string()));
        }

        let access_token = Self::generate_access_token(&user, config)?;

        Ok(LoginResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: config.auth.token_expire_minutes * 60,
            user: UserResponse::from(user),
        })
    }

    /// Provision a new user. Admin-only; users are immutable afterwards.
    pub async fn provision_user(db: &Database, req: CreateUserRequest) -> Result<UserResponse> {
        let username = req.username.trim();
        if username.is_empty() {
            return Err(AppError::Validation("Username is required".to_string()));
        }
        if req.password.len() < 6 {
            return Err(AppError::Validation(
                "Password must be at least 6 characters".to_string(),
            ));
        }

        let existing: Option<User> = db
            .fetch_optional(
                "SELECT * FROM users WHERE username = ?",
                &[username.into()],
            )
            .await?;
        if existing.is_some() {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }

        let role = req
            .role
            .as_deref()
            .map(UserRole::from_str)
            .unwrap_or(UserRole::Student);
        let password_hash = Self::hash_password(&req.password)?;
        let now = Utc::now().to_rfc3339();

        let user_id = db
            .insert_returning_id(
                "INSERT INTO users (username, password_hash, role, created_at) VALUES (?, ?, ?, ?)",
                &[
                    username.into(),
                    password_hash.into(),
                    role.as_str().into(),
                    now.into(),
                ],
            )
            .await?;

        let user: User = db
            .fetch_one("SELECT * FROM users WHERE id = ?", &[user_id.into()])
            .await?;

        Ok(UserResponse::from(user))
    }

    /// Make sure the configured admin account exists at startup
    pub async fn ensure_admin(db: &Database, config: &Config) -> Result<()> {
        let existing: Option<User> = db
            .fetch_optional(
                "SELECT * FROM users WHERE username = ?",
                &[config.auth.admin_username.as_str().into()],
            )
            .await?;

        if existing.is_none() {
            let password_hash = Self::hash_password(&config.auth.admin_password)?;
            let now = Utc::now().to_rfc3339();
            db.execute(
                "INSERT INTO users (username, password_hash, role, created_at) VALUES (?, ?, ?, ?)",
                &[
                    config.auth.admin_username.as_str().into(),
                    password_hash.into(),
                    UserRole::Admin.as_str().into(),
                    now.into(),
                ],
            )
            .await?;
            tracing::info!(username = %config.auth.admin_username, "Provisioned admin account");
        }

        Ok(())
    }

    /// Generate access token (JWT)
    fn generate_access_token(user: &User, config: &Config) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::minutes(config.auth.token_expire_minutes as i64);

        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            role: user.role.clone(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.auth.secret.as_bytes()),
        )?;

        Ok(token)
    }

    /// Validate access token and extract claims
    pub fn validate_token(token: &str, config: &Config) -> Result<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(config.auth.secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Hash password using Argon2
    fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?
            .to_string();

        Ok(password_hash)
    }

    /// Verify password against hash
    fn verify_password(password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }
}
