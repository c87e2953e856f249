use crate::domain::DomainError;
use crate::infrastructure::jwt::JwtService;
use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use std::sync::Arc;

pub const ADMIN_SUBJECT: &str = "admin";

/// Single-account admin authentication: one argon2 password hash from the
/// configuration, exchanged for a bearer token.
pub struct AuthService {
    password_hash: String,
    jwt_service: Arc<JwtService>,
}

impl AuthService {
    pub fn new(password_hash: String, jwt_service: Arc<JwtService>) -> Self {
        Self {
            password_hash,
            jwt_service,
        }
    }

    pub fn login(&self, password: &str) -> Result<String, DomainError> {
        let parsed_hash = PasswordHash::new(&self.password_hash).map_err(|e| {
            tracing::error!("Invalid admin password hash format: {}", e);
            DomainError::InternalError(format!("Invalid password hash: {}", e))
        })?;

        if Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_err()
        {
            tracing::warn!("Invalid admin password");
            return Err(DomainError::InvalidCredentials);
        }

        let token = self.jwt_service.generate_token(ADMIN_SUBJECT)?;
        tracing::info!("Admin logged in successfully");
        Ok(token)
    }

    pub fn validate_token(&self, token: &str) -> Result<(), DomainError> {
        let subject = self.jwt_service.verify_token(token)?;
        if subject != ADMIN_SUBJECT {
            tracing::warn!("Token subject {} is not allowed", subject);
            return Err(DomainError::Unauthorized("Invalid token".to_string()));
        }
        Ok(())
    }
}

/// PHC-format argon2 hash with a random salt, suitable for `ADMIN_PASSWORD_HASH`.
pub fn hash_password(password: &str) -> Result<String, DomainError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            tracing::error!("Password hashing failed: {}", e);
            DomainError::InternalError(format!("Password hashing failed: {}", e))
        })
}
