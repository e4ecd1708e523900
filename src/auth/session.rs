use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;

/// Shortest signing key accepted for HS256.
pub const MIN_SECRET_LEN: usize = 32;

const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no session signing key configured (set HEARTH_JWT_SECRET or [auth] jwt_secret)")]
    MissingSecret,

    #[error("session signing key is {0} bytes, at least 32 are required")]
    WeakSecret(usize),

    #[error("session lifetime must be at least one hour")]
    ZeroLifetime,

    #[error("session lifetime of {0} hours is out of range")]
    LifetimeOutOfRange(u64),

    #[error("failed to sign session token: {0}")]
    Sign(#[from] jsonwebtoken::errors::Error),
}

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies stateless session tokens.
///
/// The key is loaded once at construction and never changes. There is no
/// server-side session table: a token is valid until `exp`, and logging out
/// only removes the client's copy.
#[derive(Clone)]
pub struct SessionManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetime: Duration,
    cookie: CookieSettings,
}

#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub max_age_secs: i64,
    pub secure: bool,
}

impl SessionManager {
    pub fn new(config: &AuthConfig) -> Result<Self, SessionError> {
        let secret = config
            .jwt_secret
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(SessionError::MissingSecret)?;

        if secret.len() < MIN_SECRET_LEN {
            return Err(SessionError::WeakSecret(secret.len()));
        }
        if config.session_hours == 0 {
            return Err(SessionError::ZeroLifetime);
        }

        // Expiry is checked by hand in `verify_token_at` so the clock can be
        // supplied by the caller.
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let lifetime = i64::try_from(config.session_hours)
            .ok()
            .and_then(Duration::try_hours)
            .ok_or(SessionError::LifetimeOutOfRange(config.session_hours))?;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            lifetime,
            cookie: CookieSettings {
                name: config.cookie_name.clone(),
                max_age_secs: lifetime.num_seconds(),
                secure: config.secure_cookie,
            },
        })
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie.name
    }

    /// Issue a token for `user_id`, valid for the configured lifetime.
    pub fn issue_token(&self, user_id: &str) -> Result<String, SessionError> {
        self.issue_token_at(user_id, Utc::now())
    }

    pub fn issue_token_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<String, SessionError> {
        let iat = now.timestamp();
        let claims = Claims {
            user_id: user_id.to_string(),
            iat,
            exp: iat + self.lifetime.num_seconds(),
        };
        Ok(encode(&Header::new(ALGORITHM), &claims, &self.encoding_key)?)
    }

    /// Returns the embedded user id if the signature checks out and the token
    /// has not expired.
    pub fn verify_token(&self, token: &str) -> Option<String> {
        self.verify_token_at(token, Utc::now())
    }

    pub fn verify_token_at(&self, token: &str, now: DateTime<Utc>) -> Option<String> {
        let data = match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => data,
            Err(e) => {
                tracing::debug!("Rejected session token: {}", e);
                return None;
            }
        };

        if now.timestamp() >= data.claims.exp {
            tracing::debug!("Session token for {} expired", data.claims.user_id);
            return None;
        }
        if data.claims.user_id.is_empty() {
            return None;
        }

        Some(data.claims.user_id)
    }

    /// `Set-Cookie` value carrying a freshly issued token.
    pub fn session_cookie(&self, token: &str) -> String {
        self.render_cookie(token, self.cookie.max_age_secs)
    }

    /// `Set-Cookie` value that makes the client drop its token.
    pub fn clear_session_cookie(&self) -> String {
        self.render_cookie("", 0)
    }

    fn render_cookie(&self, value: &str, max_age: i64) -> String {
        let mut cookie = format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
            self.cookie.name, value, max_age
        );
        if self.cookie.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// Find the value of cookie `name` in the request headers.
pub fn get_cookie_value<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name && !val.is_empty() {
                Some(val)
            } else {
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderMap, HeaderValue};

    const SECRET: &str = "test-secret-that-is-long-enough-for-hs256";

    fn manager() -> SessionManager {
        SessionManager::new(&AuthConfig {
            jwt_secret: Some(SECRET.to_string()),
            ..AuthConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn missing_secret_fails_construction() {
        let result = SessionManager::new(&AuthConfig::default());
        assert!(matches!(result, Err(SessionError::MissingSecret)));
    }

    #[test]
    fn blank_secret_fails_construction() {
        let result = SessionManager::new(&AuthConfig {
            jwt_secret: Some("   ".to_string()),
            ..AuthConfig::default()
        });
        assert!(matches!(result, Err(SessionError::MissingSecret)));
    }

    #[test]
    fn short_secret_fails_construction() {
        let result = SessionManager::new(&AuthConfig {
            jwt_secret: Some("too-short".to_string()),
            ..AuthConfig::default()
        });
        assert!(matches!(result, Err(SessionError::WeakSecret(9))));
    }

    #[test]
    fn lifetime_bounds_are_checked() {
        let with_hours = |session_hours| {
            SessionManager::new(&AuthConfig {
                jwt_secret: Some(SECRET.to_string()),
                session_hours,
                ..AuthConfig::default()
            })
        };

        assert!(matches!(with_hours(0), Err(SessionError::ZeroLifetime)));
        assert!(matches!(
            with_hours(3_000_000_000_000_000),
            Err(SessionError::LifetimeOutOfRange(3_000_000_000_000_000))
        ));
        assert!(matches!(
            with_hours(u64::MAX),
            Err(SessionError::LifetimeOutOfRange(u64::MAX))
        ));
        assert_eq!(
            with_hours(24 * 30).unwrap().lifetime(),
            Duration::hours(24 * 30)
        );
    }

    #[test]
    fn issued_token_verifies_to_user_id() {
        let sessions = manager();
        let token = sessions.issue_token("user-1").unwrap();
        assert_eq!(sessions.verify_token(&token).as_deref(), Some("user-1"));
    }

    #[test]
    fn token_valid_until_just_before_expiry() {
        let sessions = manager();
        let issued = Utc::now();
        let token = sessions.issue_token_at("user-1", issued).unwrap();

        let almost = issued + Duration::hours(23) + Duration::minutes(59);
        assert_eq!(
            sessions.verify_token_at(&token, almost).as_deref(),
            Some("user-1")
        );

        let after = issued + Duration::hours(24) + Duration::seconds(1);
        assert_eq!(sessions.verify_token_at(&token, after), None);
    }

    #[test]
    fn token_signed_with_other_key_is_rejected() {
        let other = SessionManager::new(&AuthConfig {
            jwt_secret: Some("a-completely-different-secret-of-length".to_string()),
            ..AuthConfig::default()
        })
        .unwrap();
        let token = other.issue_token("user-1").unwrap();
        assert_eq!(manager().verify_token(&token), None);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let sessions = manager();
        let token = sessions.issue_token("user-1").unwrap();

        // Payload naming someone else, signed with the wrong key
        let claims = Claims {
            user_id: "admin".into(),
            iat: 0,
            exp: i64::MAX,
        };
        let forged =
            encode(&Header::new(ALGORITHM), &claims, &EncodingKey::from_secret(b"x")).unwrap();

        // Graft the forged payload onto the genuine header and signature
        let genuine: Vec<&str> = token.split('.').collect();
        let forged_payload = forged.split('.').nth(1).unwrap();
        let tampered = format!("{}.{}.{}", genuine[0], forged_payload, genuine[2]);

        assert_eq!(sessions.verify_token(&tampered), None);
    }

    #[test]
    fn garbage_is_rejected() {
        let sessions = manager();
        assert_eq!(sessions.verify_token(""), None);
        assert_eq!(sessions.verify_token("not.a.jwt"), None);
        assert_eq!(sessions.verify_token("abc"), None);
    }

    #[test]
    fn unsigned_token_is_rejected() {
        // alg=none header with a valid-looking payload
        let token = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.\
                     eyJ1c2VySWQiOiJ1c2VyLTEiLCJpYXQiOjAsImV4cCI6OTk5OTk5OTk5OTl9.";
        assert_eq!(manager().verify_token(token), None);
    }

    #[test]
    fn session_cookie_has_expected_attributes() {
        let cookie = manager().session_cookie("abc");
        assert_eq!(
            cookie,
            "token=abc; HttpOnly; SameSite=Lax; Path=/; Max-Age=86400"
        );
    }

    #[test]
    fn secure_cookie_when_configured() {
        let sessions = SessionManager::new(&AuthConfig {
            jwt_secret: Some(SECRET.to_string()),
            secure_cookie: true,
            ..AuthConfig::default()
        })
        .unwrap();
        assert!(sessions.session_cookie("abc").ends_with("; Secure"));
        assert!(sessions.clear_session_cookie().contains("Max-Age=0"));
    }

    #[test]
    fn get_cookie_value_finds_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; token=abc.def.ghi; other=1"),
        );
        assert_eq!(get_cookie_value(&headers, "token"), Some("abc.def.ghi"));
        assert_eq!(get_cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn get_cookie_value_ignores_empty_value() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("token="));
        assert_eq!(get_cookie_value(&headers, "token"), None);
    }
}
