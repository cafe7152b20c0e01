//! 配置驱动的身份提供方
//!
//! `[identity.cached_account]` 充当「已缓存的凭据」，供静默登录恢复；
//! `[identity.interactive_account]` 充当交互式登录的结果。真实 IdP 接入时替换此实现即可。

use std::sync::Mutex;

use async_trait::async_trait;

use crate::auth::{IdentityProvider, Session};
use crate::config::IdentitySection;
use crate::core::AuthError;

pub struct ConfiguredIdentityProvider {
    cached: Option<Session>,
    interactive: Option<Session>,
    current: Mutex<Option<Session>>,
}

impl ConfiguredIdentityProvider {
    pub fn new(cached: Option<Session>, interactive: Option<Session>) -> Self {
        Self {
            cached,
            interactive,
            current: Mutex::new(None),
        }
    }

    pub fn from_config(identity: &IdentitySection) -> Self {
        tracing::debug!(
            client_id = identity.client_id.as_deref().unwrap_or("(none)"),
            scopes = ?identity.scopes,
            "Using configured identity provider"
        );
        Self::new(
            identity.cached_account.clone(),
            identity.interactive_account.clone(),
        )
    }

    fn set_current(&self, session: Option<Session>) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = session;
    }
}

#[async_trait]
impl IdentityProvider for ConfiguredIdentityProvider {
    async fn try_silent_auth(&self) -> Result<Option<Session>, AuthError> {
        let session = self.cached.clone().ok_or(AuthError::NoCachedCredential)?;
        self.set_current(Some(session.clone()));
        Ok(Some(session))
    }

    async fn interactive_auth(&self) -> Result<Session, AuthError> {
        let session = self.interactive.clone().ok_or_else(|| {
            AuthError::InteractionRequired("no interactive account configured".to_string())
        })?;
        self.set_current(Some(session.clone()));
        Ok(session)
    }

    async fn logout(&self) -> Result<(), AuthError> {
        self.set_current(None);
        Ok(())
    }

    fn current_session(&self) -> Option<Session> {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_silent_without_cached_account() {
        let provider = ConfiguredIdentityProvider::new(None, None);
        assert_eq!(
            provider.try_silent_auth().await,
            Err(AuthError::NoCachedCredential)
        );
        assert!(provider.interactive_auth().await.is_err());
        assert!(provider.current_session().is_none());
    }

    #[tokio::test]
    async fn test_cached_account_recovers_silently() {
        let carol = Session::new("u-carol", "Carol", "carol@example.com");
        let provider = ConfiguredIdentityProvider::new(Some(carol.clone()), None);
        assert_eq!(provider.try_silent_auth().await, Ok(Some(carol.clone())));
        assert_eq!(provider.current_session(), Some(carol));
        provider.logout().await.unwrap();
        assert!(provider.current_session().is_none());
    }
}
