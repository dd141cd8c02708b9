//! Login-code and session-token state.
//!
//! Session-adjacent only: identity propagation to other services is an
//! external concern. The `login:code:` and `login:token:` namespaces
//! interoperate with existing deployments.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use redis::AsyncCommands;
use redis_utils::SharedConnectionManager;
use tracing::debug;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::{AppError, Result};
use crate::keys;
use crate::models::UserSummary;
use crate::stores::UserStore;

pub struct SessionService {
    redis: SharedConnectionManager,
    users: Arc<dyn UserStore>,
    config: SessionConfig,
}

impl SessionService {
    pub fn new(
        redis: SharedConnectionManager,
        users: Arc<dyn UserStore>,
        config: SessionConfig,
    ) -> Self {
        Self {
            redis,
            users,
            config,
        }
    }

    /// Issue a login code for `phone` and cache it for verification.
    ///
    /// Delivery (SMS) is an external concern; the code is returned so the
    /// caller can hand it off.
    pub async fn send_code(&self, phone: &str) -> Result<String> {
        if !is_valid_phone(phone) {
            return Err(AppError::Validation("invalid phone number".to_string()));
        }

        let code = format!("{:04}", rand::thread_rng().gen_range(0..10_000));
        let mut conn = self.redis.lock().await.clone();
        redis::cmd("SETEX")
            .arg(keys::login_code_key(phone))
            .arg(self.config.code_ttl.as_secs())
            .arg(&code)
            .query_async::<_, ()>(&mut conn)
            .await?;

        debug!(phone, "login code issued");
        Ok(code)
    }

    /// Exchange a previously issued code for a session token.
    ///
    /// An unknown phone registers a new user on the fly, matching the
    /// code-is-identity login flow.
    pub async fn login(&self, phone: &str, code: &str) -> Result<String> {
        if !is_valid_phone(phone) {
            return Err(AppError::Validation("invalid phone number".to_string()));
        }

        let cached: Option<String> = {
            let mut conn = self.redis.lock().await.clone();
            conn.get(keys::login_code_key(phone)).await?
        };
        if cached.as_deref() != Some(code) {
            return Err(AppError::Validation("login code mismatch".to_string()));
        }

        let user = match self.users.find_by_phone(phone).await? {
            Some(user) => user,
            None => self.users.create_from_phone(phone).await?,
        };

        let token = Uuid::new_v4().simple().to_string();
        let key = keys::login_token_key(&token);
        let mut conn = self.redis.lock().await.clone();
        conn.hset_multiple::<_, _, _, ()>(
            &key,
            &[
                ("id", user.id.to_string()),
                ("nickname", user.nickname.clone()),
            ],
        )
        .await?;
        redis::cmd("EXPIRE")
            .arg(&key)
            .arg(self.config.token_ttl.as_secs())
            .query_async::<_, ()>(&mut conn)
            .await?;

        debug!(user_id = user.id, "session token issued");
        Ok(token)
    }

    /// Resolve the user behind `token`, refreshing the session TTL on hit.
    pub async fn current_user(&self, token: &str) -> Result<Option<UserSummary>> {
        let key = keys::login_token_key(token);
        let mut conn = self.redis.lock().await.clone();

        let fields: HashMap<String, String> = conn.hgetall(&key).await?;
        if fields.is_empty() {
            return Ok(None);
        }

        let id = fields
            .get("id")
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| AppError::Internal("malformed session hash".to_string()))?;
        let nickname = fields.get("nickname").cloned().unwrap_or_default();

        redis::cmd("EXPIRE")
            .arg(&key)
            .arg(self.config.token_ttl.as_secs())
            .query_async::<_, ()>(&mut conn)
            .await?;

        Ok(Some(UserSummary { id, nickname }))
    }
}

fn is_valid_phone(phone: &str) -> bool {
    phone.len() == 11 && phone.starts_with('1') && phone.chars().all(|c| c.is_ascii_digit())
}
