// API 存取權杖：簽發、驗證與撤銷

use crate::utils::error::{NavError, Result};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// HS256 金鑰最短長度（bytes）
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub jti: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope || s == "*")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

/// 已撤銷的 jti 與其原本的到期時間；過期後即可清除
#[derive(Debug, Default)]
pub struct TokenBlacklist {
    revoked: DashMap<String, i64>,
}

impl TokenBlacklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revoke(&self, jti: &str, expires_at: i64) {
        self.revoked.insert(jti.to_string(), expires_at);
    }

    pub fn is_revoked(&self, jti: &str) -> bool {
        self.revoked.contains_key(jti)
    }

    /// 移除已過期的項目，回傳移除數量
    pub fn sweep_expired(&self, now: i64) -> usize {
        let before = self.revoked.len();
        self.revoked.retain(|_, exp| *exp > now);
        before - self.revoked.len()
    }

    pub fn len(&self) -> usize {
        self.revoked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revoked.is_empty()
    }

    /// 背景定期清理
    pub fn spawn_sweeper(self: Arc<Self>, interval: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = self.sweep_expired(Utc::now().timestamp());
                if removed > 0 {
                    tracing::debug!(removed, remaining = self.len(), "🧹 Swept expired revoked tokens");
                }
            }
        })
    }
}

pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl: Duration,
    blacklist: Arc<TokenBlacklist>,
}

impl JwtManager {
    pub fn new(secret: &str, issuer: &str, ttl_seconds: u64) -> Result<Self> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(NavError::InvalidConfigValueError {
                field: "api.jwt_secret".to_string(),
                value: "<redacted>".to_string(),
                reason: format!("must be at least {} bytes", MIN_SECRET_LEN),
            });
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_string(),
            ttl: Duration::seconds(ttl_seconds as i64),
            blacklist: Arc::new(TokenBlacklist::new()),
        })
    }

    pub fn with_blacklist(mut self, blacklist: Arc<TokenBlacklist>) -> Self {
        self.blacklist = blacklist;
        self
    }

    pub fn blacklist(&self) -> &Arc<TokenBlacklist> {
        &self.blacklist
    }

    pub fn issue(&self, subject: &str, scopes: &[String]) -> Result<IssuedToken> {
        self.issue_at(subject, scopes, Utc::now())
    }

    fn issue_at(&self, subject: &str, scopes: &[String], now: DateTime<Utc>) -> Result<IssuedToken> {
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: subject.to_string(),
            scopes: scopes.to_vec(),
            jti: Uuid::new_v4().to_string(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;

        tracing::debug!(sub = subject, jti = %claims.jti, "🔑 Token issued");
        Ok(IssuedToken {
            token,
            jti: claims.jti,
            expires_at,
        })
    }

    /// 驗證簽章、到期時間、簽發者與撤銷狀態
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| NavError::AuthError {
                message: format!("invalid token: {}", e),
            })?
            .claims;

        if self.blacklist.is_revoked(&claims.jti) {
            return Err(NavError::AuthError {
                message: "token has been revoked".to_string(),
            });
        }
        Ok(claims)
    }

    /// 撤銷一個仍有效的權杖，回傳其 claims
    pub fn revoke(&self, token: &str) -> Result<Claims> {
        let claims = self.verify(token)?;
        self.blacklist.revoke(&claims.jti, claims.exp);
        tracing::info!(sub = %claims.sub, jti = %claims.jti, "🚫 Token revoked");
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn manager() -> JwtManager {
        JwtManager::new(SECRET, "paid-search-nav", 3600).unwrap()
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(matches!(
            JwtManager::new("too-short", "paid-search-nav", 3600),
            Err(NavError::InvalidConfigValueError { .. })
        ));
    }

    #[test]
    fn test_issue_and_verify() {
        let jwt = manager();
        let issued = jwt.issue("agency-team", &["audits:write".to_string()]).unwrap();

        let claims = jwt.verify(&issued.token).unwrap();
        assert_eq!(claims.sub, "agency-team");
        assert_eq!(claims.jti, issued.jti);
        assert_eq!(claims.iss, "paid-search-nav");
        assert!(claims.has_scope("audits:write"));
        assert!(!claims.has_scope("admin"));
        assert_eq!(claims.exp, issued.expires_at.timestamp());
    }

    #[test]
    fn test_wrong_secret_and_issuer_rejected() {
        let issued = manager().issue("a", &[]).unwrap();

        let other = JwtManager::new("ffffffffffffffffffffffffffffffff", "paid-search-nav", 3600).unwrap();
        assert!(matches!(other.verify(&issued.token), Err(NavError::AuthError { .. })));

        let other_issuer = JwtManager::new(SECRET, "someone-else", 3600).unwrap();
        assert!(other_issuer.verify(&issued.token).is_err());

        assert!(manager().verify("not-a-token").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let jwt = manager();
        let issued = jwt
            .issue_at("a", &[], Utc::now() - Duration::hours(2))
            .unwrap();
        let err = jwt.verify(&issued.token).unwrap_err();
        assert!(err.to_string().contains("invalid token"));
    }

    #[test]
    fn test_revoke_then_verify_fails() {
        let jwt = manager();
        let issued = jwt.issue("a", &[]).unwrap();

        jwt.revoke(&issued.token).unwrap();
        assert!(jwt.blacklist().is_revoked(&issued.jti));

        let err = jwt.verify(&issued.token).unwrap_err();
        assert!(err.to_string().contains("revoked"));
        // 已撤銷的權杖不能再撤銷
        assert!(jwt.revoke(&issued.token).is_err());
    }

    #[test]
    fn test_sweep_expired() {
        let blacklist = TokenBlacklist::new();
        blacklist.revoke("old", 100);
        blacklist.revoke("fresh", 10_000);

        assert_eq!(blacklist.sweep_expired(500), 1);
        assert!(!blacklist.is_revoked("old"));
        assert!(blacklist.is_revoked("fresh"));
        assert_eq!(blacklist.sweep_expired(500), 0);
    }

    #[tokio::test]
    async fn test_sweeper_task_clears_entries() {
        let blacklist = Arc::new(TokenBlacklist::new());
        blacklist.revoke("expired", 1);

        let handle = blacklist.clone().spawn_sweeper(std::time::Duration::from_millis(10));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        handle.abort();

        assert!(blacklist.is_empty());
    }
}
