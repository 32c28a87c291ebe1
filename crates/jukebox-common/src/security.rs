use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use secrecy::{ExposeSecret, SecretString};
use tracing::warn;

use crate::error::{Error, Result};

pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const SESSION_TTL_MINUTES: i64 = 15;
const TOKEN_LENGTH: usize = 64;

/// Argon2id hashing for the admin password. Hashes are PHC strings so the salt
/// and parameters travel with them.
pub struct PasswordManager;

impl PasswordManager {
    pub fn hash_password(password: &SecretString) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default().hash_password(password.expose_secret().as_bytes(), &salt)?;
        Ok(hash.to_string())
    }

    /// Ok(false) for a wrong password, Err only for a malformed stored hash
    pub fn verify_password(password: &SecretString, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash)?;

        match Argon2::default().verify_password(password.expose_secret().as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn validate_new_password(password: &SecretString) -> Result<()> {
        if password.expose_secret().chars().count() < MIN_PASSWORD_LENGTH {
            return Err(Error::InvalidConfig(format!(
                "admin password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }
        Ok(())
    }
}

/// Bearer token handed out after a successful admin login
#[derive(Debug, Clone)]
pub struct SessionToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl SessionToken {
    pub fn generate() -> Self {
        Self::issued_at(Utc::now())
    }

    pub fn issued_at(now: DateTime<Utc>) -> Self {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LENGTH)
            .map(char::from)
            .collect();
        Self { token, expires_at: now + Duration::minutes(SESSION_TTL_MINUTES) }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Slide the expiry forward on activity
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.expires_at = now + Duration::minutes(SESSION_TTL_MINUTES);
    }
}

#[derive(Debug, Clone)]
struct LoginAttempt {
    at: DateTime<Utc>,
    successful: bool,
}

/// Failed-login throttle: 5 failures inside 15 minutes blocks further attempts
/// until the oldest failure ages out. A success clears the history.
#[derive(Debug)]
pub struct RateLimiter {
    attempts: Vec<LoginAttempt>,
    max_failures: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_limits(5, Duration::minutes(15))
    }

    pub fn with_limits(max_failures: usize, window: Duration) -> Self {
        Self { attempts: Vec::new(), max_failures, window }
    }

    pub fn check_at(&mut self, now: DateTime<Utc>) -> bool {
        let cutoff = now - self.window;
        self.attempts.retain(|a| a.at > cutoff);

        let failures = self.attempts.iter().filter(|a| !a.successful).count();
        if failures >= self.max_failures {
            warn!("Admin login rate limit hit: {} failures in the last window", failures);
            return false;
        }
        true
    }

    pub fn check(&mut self) -> bool {
        self.check_at(Utc::now())
    }

    pub fn record_at(&mut self, successful: bool, now: DateTime<Utc>) {
        if successful {
            self.attempts.clear();
        }
        self.attempts.push(LoginAttempt { at: now, successful });
    }

    pub fn record(&mut self, successful: bool) {
        self.record_at(successful, Utc::now())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(s: &str) -> SecretString {
        SecretString::new(s.to_string().into())
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = PasswordManager::hash_password(&secret("correct horse")).unwrap();
        assert!(hash.starts_with("$argon2id$"));

        assert!(PasswordManager::verify_password(&secret("correct horse"), &hash).unwrap());
        assert!(!PasswordManager::verify_password(&secret("battery staple"), &hash).unwrap());
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        assert!(PasswordManager::verify_password(&secret("x"), "not-a-hash").is_err());
    }

    #[test]
    fn test_short_password_rejected() {
        assert!(PasswordManager::validate_new_password(&secret("abc")).is_err());
        assert!(PasswordManager::validate_new_password(&secret("abcdef")).is_ok());
    }

    #[test]
    fn test_session_token_expiry() {
        let now = Utc::now();
        let mut token = SessionToken::issued_at(now);

        assert_eq!(token.token().len(), 64);
        assert!(token.is_valid_at(now + Duration::minutes(14)));
        assert!(!token.is_valid_at(now + Duration::minutes(15)));

        token.touch(now + Duration::minutes(10));
        assert!(token.is_valid_at(now + Duration::minutes(20)));
        assert_ne!(token.token(), SessionToken::generate().token());
    }

    #[test]
    fn test_rate_limiter_blocks_after_failures() {
        let mut limiter = RateLimiter::new();
        let now = Utc::now();

        for i in 0..5 {
            assert!(limiter.check_at(now + Duration::seconds(i)));
            limiter.record_at(false, now + Duration::seconds(i));
        }
        assert!(!limiter.check_at(now + Duration::minutes(1)));

        // Failures age out of the window
        assert!(limiter.check_at(now + Duration::minutes(16)));
    }

    #[test]
    fn test_success_clears_failures() {
        let mut limiter = RateLimiter::new();
        let now = Utc::now();

        for _ in 0..4 {
            limiter.record_at(false, now);
        }
        limiter.record_at(true, now);
        limiter.record_at(false, now);
        assert!(limiter.check_at(now));
    }
}
