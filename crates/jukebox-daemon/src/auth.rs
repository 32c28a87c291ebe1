// Admin password and bearer sessions for the /api/admin routes

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use jukebox_common::{PasswordManager, RateLimiter, SessionToken};
use secrecy::SecretString;
use tracing::{debug, info, warn};

use crate::error::{ServiceError, ServiceResult};

pub struct AdminAuth {
    password_hash: Option<String>,
    sessions: HashMap<String, SessionToken>,
    limiter: RateLimiter,
}

impl AdminAuth {
    pub fn new(password_hash: Option<String>) -> Self {
        Self { password_hash, sessions: HashMap::new(), limiter: RateLimiter::new() }
    }

    pub fn is_configured(&self) -> bool {
        self.password_hash.is_some()
    }

    /// First-run password. Returns the PHC hash for the caller to persist.
    pub fn setup(&mut self, password: &SecretString) -> ServiceResult<String> {
        if self.is_configured() {
            return Err(ServiceError::bad_request("Admin password is already set"));
        }

        PasswordManager::validate_new_password(password)?;
        let hash = PasswordManager::hash_password(password)?;
        self.password_hash = Some(hash.clone());
        info!("Admin password configured");
        Ok(hash)
    }

    pub fn login(&mut self, password: &SecretString) -> ServiceResult<SessionToken> {
        self.login_at(password, Utc::now())
    }

    pub fn login_at(
        &mut self,
        password: &SecretString,
        now: DateTime<Utc>,
    ) -> ServiceResult<SessionToken> {
        if !self.limiter.check_at(now) {
            return Err(ServiceError::RateLimited);
        }

        let Some(hash) = self.password_hash.as_deref() else {
            return Err(ServiceError::bad_request("Admin password has not been set up"));
        };

        let valid = PasswordManager::verify_password(password, hash)?;
        self.limiter.record_at(valid, now);
        if !valid {
            warn!("Failed admin login attempt");
            return Err(ServiceError::InvalidCredentials);
        }

        self.sessions.retain(|_, s| s.is_valid_at(now));
        let session = SessionToken::issued_at(now);
        self.sessions.insert(session.token().to_string(), session.clone());
        info!("Admin logged in ({} active sessions)", self.sessions.len());
        Ok(session)
    }

    /// Check a bearer token and slide its expiry forward
    pub fn validate(&mut self, token: &str) -> bool {
        self.validate_at(token, Utc::now())
    }

    pub fn validate_at(&mut self, token: &str, now: DateTime<Utc>) -> bool {
        match self.sessions.get_mut(token) {
            Some(session) if session.is_valid_at(now) => {
                session.touch(now);
                true
            }
            Some(_) => {
                debug!("Admin session expired");
                self.sessions.remove(token);
                false
            }
            None => false,
        }
    }

    pub fn logout(&mut self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Verify the current password, store the new one and drop every session.
    /// Returns the new hash for the caller to persist.
    pub fn change_password(
        &mut self,
        current: &SecretString,
        new_password: &SecretString,
    ) -> ServiceResult<String> {
        let Some(hash) = self.password_hash.as_deref() else {
            return Err(ServiceError::bad_request("Admin password has not been set up"));
        };
        if !PasswordManager::verify_password(current, hash)? {
            return Err(ServiceError::InvalidCredentials);
        }

        PasswordManager::validate_new_password(new_password)?;
        let new_hash = PasswordManager::hash_password(new_password)?;
        self.password_hash = Some(new_hash.clone());
        self.sessions.clear();
        info!("Admin password changed, all sessions revoked");
        Ok(new_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    fn configured() -> AdminAuth {
        let mut auth = AdminAuth::new(None);
        auth.setup(&secret("hunter22")).unwrap();
        auth
    }

    #[test]
    fn test_setup_only_once() {
        let mut auth = configured();
        assert!(auth.is_configured());
        assert!(matches!(auth.setup(&secret("another1")), Err(ServiceError::BadRequest(_))));
    }

    #[test]
    fn test_setup_rejects_short_password() {
        let mut auth = AdminAuth::new(None);
        assert!(auth.setup(&secret("abc")).is_err());
        assert!(!auth.is_configured());
    }

    #[test]
    fn test_login_and_validate() {
        let mut auth = configured();
        let now = Utc::now();
        let session = auth.login_at(&secret("hunter22"), now).unwrap();

        assert_eq!(session.token().len(), 64);
        assert!(auth.validate_at(session.token(), now + Duration::minutes(10)));
        // Touched at +10, so still alive at +20
        assert!(auth.validate_at(session.token(), now + Duration::minutes(20)));
        assert!(!auth.validate_at(session.token(), now + Duration::minutes(40)));
        assert!(!auth.validate_at("bogus", now));
    }

    #[test]
    fn test_rate_limit_after_five_failures() {
        let mut auth = configured();
        let now = Utc::now();
        for _ in 0..5 {
            assert!(matches!(
                auth.login_at(&secret("wrong-pass"), now),
                Err(ServiceError::InvalidCredentials)
            ));
        }
        assert!(matches!(
            auth.login_at(&secret("hunter22"), now),
            Err(ServiceError::RateLimited)
        ));
        assert!(auth.login_at(&secret("hunter22"), now + Duration::minutes(16)).is_ok());
    }

    #[test]
    fn test_change_password_revokes_sessions() {
        let mut auth = configured();
        let session = auth.login(&secret("hunter22")).unwrap();

        assert!(matches!(
            auth.change_password(&secret("nope-nope"), &secret("brand-new")),
            Err(ServiceError::InvalidCredentials)
        ));

        auth.change_password(&secret("hunter22"), &secret("brand-new")).unwrap();
        assert!(!auth.validate(session.token()));
        assert!(auth.login(&secret("brand-new")).is_ok());
    }

    #[test]
    fn test_logout() {
        let mut auth = configured();
        let session = auth.login(&secret("hunter22")).unwrap();
        assert!(auth.logout(session.token()));
        assert!(!auth.validate(session.token()));
        assert!(!auth.logout(session.token()));
    }
}
