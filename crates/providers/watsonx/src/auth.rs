//! Credential bag, authenticator selection and token caching.

use std::fmt;
use std::str::FromStr;

use base64::Engine as _;
use secrecy::{ExposeSecret, SecretString};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Value as JsonValue};
use tokio::sync::Mutex;
use tracing::debug;

use crate::ai_sdk_core::transport::{HttpTransport, TransportConfig};
use crate::ai_sdk_core::SdkError;
use crate::provider_watsonx::error::map_transport_error_to_sdk_error;

pub const DEFAULT_IAM_URL: &str = "https://iam.cloud.ibm.com";
const IAM_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";
/// Cached tokens are refreshed this many seconds before they expire.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Credential field name to the label it is serialized under.
pub const SECRET_LABELS: [(&str, &str); 6] = [
    ("api_key", "WATSONX_AI_APIKEY"),
    ("bearer_token", "WATSONX_AI_BEARER_TOKEN"),
    ("username", "WATSONX_AI_USERNAME"),
    ("password", "WATSONX_AI_PASSWORD"),
    ("url", "WATSONX_AI_URL"),
    ("auth_type", "WATSONX_AI_AUTH_TYPE"),
];

/// Authentication scheme tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum AuthKind {
    Iam,
    BearerToken,
    Cp4d,
}

impl AuthKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthKind::Iam => "iam",
            AuthKind::BearerToken => "bearertoken",
            AuthKind::Cp4d => "cp4d",
        }
    }
}

impl FromStr for AuthKind {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "iam" => Ok(AuthKind::Iam),
            "bearertoken" | "bearer_token" | "bearer" => Ok(AuthKind::BearerToken),
            "cp4d" => Ok(AuthKind::Cp4d),
            other => Err(SdkError::invalid_argument(format!(
                "unknown watsonx auth type '{other}' (expected iam, bearertoken or cp4d)"
            ))),
        }
    }
}

impl TryFrom<String> for AuthKind {
    type Error = SdkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for AuthKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credentials as supplied by the caller.
///
/// Which fields are required depends on the selected [`AuthKind`]; see
/// [`select_authenticator`]. Serializing replaces every present field by a
/// `{"type":"secret","id":LABEL}` marker and `Debug` never prints values.
#[derive(Clone, Default, Deserialize)]
pub struct WatsonxAuth {
    #[serde(default)]
    pub auth_type: Option<AuthKind>,
    #[serde(default)]
    pub api_key: Option<SecretString>,
    #[serde(default)]
    pub bearer_token: Option<SecretString>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<SecretString>,
    /// CP4D gateway URL, or IAM endpoint override.
    #[serde(default)]
    pub url: Option<String>,
}

impl WatsonxAuth {
    pub fn iam(api_key: impl Into<String>) -> Self {
        Self {
            auth_type: Some(AuthKind::Iam),
            api_key: Some(SecretString::new(api_key.into())),
            ..Self::default()
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            auth_type: Some(AuthKind::BearerToken),
            bearer_token: Some(SecretString::new(token.into())),
            ..Self::default()
        }
    }

    pub fn cp4d(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            auth_type: Some(AuthKind::Cp4d),
            username: Some(username.into()),
            password: Some(SecretString::new(password.into())),
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Read `WATSONX_AI_*` variables. Unset or empty variables stay `None`.
    pub fn from_env() -> Result<Self, SdkError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`WatsonxAuth::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SdkError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let auth_type = get("WATSONX_AI_AUTH_TYPE")
            .map(|v| v.parse::<AuthKind>())
            .transpose()?;
        Ok(Self {
            auth_type,
            api_key: get("WATSONX_AI_APIKEY").map(SecretString::new),
            bearer_token: get("WATSONX_AI_BEARER_TOKEN").map(SecretString::new),
            username: get("WATSONX_AI_USERNAME"),
            password: get("WATSONX_AI_PASSWORD").map(SecretString::new),
            url: get("WATSONX_AI_URL"),
        })
    }

    fn present_fields(&self) -> [(&'static str, bool); 6] {
        [
            ("api_key", self.api_key.is_some()),
            ("bearer_token", self.bearer_token.is_some()),
            ("username", self.username.is_some()),
            ("password", self.password.is_some()),
            ("url", self.url.is_some()),
            ("auth_type", self.auth_type.is_some()),
        ]
    }
}

fn secret_label(field: &str) -> &'static str {
    SECRET_LABELS
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, label)| *label)
        .unwrap_or("WATSONX_AI_SECRET")
}

impl Serialize for WatsonxAuth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let present: Vec<&str> = self
            .present_fields()
            .into_iter()
            .filter(|(_, set)| *set)
            .map(|(name, _)| name)
            .collect();
        let mut map = serializer.serialize_map(Some(present.len()))?;
        for name in present {
            map.serialize_entry(name, &json!({"type": "secret", "id": secret_label(name)}))?;
        }
        map.end()
    }
}

impl fmt::Debug for WatsonxAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("WatsonxAuth");
        for (name, set) in self.present_fields() {
            if set {
                s.field(name, &"[REDACTED]");
            }
        }
        s.finish()
    }
}

/// Resolved authentication strategy.
#[derive(Clone)]
pub enum Authenticator {
    /// IBM Cloud IAM: API key exchanged for an access token.
    Iam { api_key: SecretString, url: String },
    /// Caller-managed bearer token, sent as-is.
    Bearer { token: SecretString },
    /// Cloud Pak for Data: username with password or API key exchanged at the gateway.
    Cp4d {
        url: String,
        username: String,
        password: Option<SecretString>,
        api_key: Option<SecretString>,
    },
    /// No `Authorization` header.
    Anonymous,
}

impl Authenticator {
    pub fn kind(&self) -> Option<AuthKind> {
        match self {
            Authenticator::Iam { .. } => Some(AuthKind::Iam),
            Authenticator::Bearer { .. } => Some(AuthKind::BearerToken),
            Authenticator::Cp4d { .. } => Some(AuthKind::Cp4d),
            Authenticator::Anonymous => None,
        }
    }
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authenticator::Iam { url, .. } => f.debug_struct("Iam").field("url", url).finish_non_exhaustive(),
            Authenticator::Bearer { .. } => f.debug_struct("Bearer").finish_non_exhaustive(),
            Authenticator::Cp4d { url, .. } => f.debug_struct("Cp4d").field("url", url).finish_non_exhaustive(),
            Authenticator::Anonymous => f.write_str("Anonymous"),
        }
    }
}

fn non_empty_secret(s: &Option<SecretString>) -> Option<SecretString> {
    s.as_ref()
        .filter(|v| !v.expose_secret().trim().is_empty())
        .cloned()
}

fn non_empty(s: &Option<String>) -> Option<String> {
    s.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

/// Choose the authenticator for a credential bag.
///
/// An explicit `auth_type` must come with its required fields. Without one,
/// the first complete combination wins: API key (IAM), bearer token, then
/// username + password + url (CP4D). Nothing usable means anonymous access.
pub fn select_authenticator(auth: &WatsonxAuth) -> Result<Authenticator, SdkError> {
    let api_key = non_empty_secret(&auth.api_key);
    let bearer = non_empty_secret(&auth.bearer_token);
    let password = non_empty_secret(&auth.password);
    let username = non_empty(&auth.username);
    let url = non_empty(&auth.url);

    let iam = |api_key: SecretString| Authenticator::Iam {
        api_key,
        url: url.clone().unwrap_or_else(|| DEFAULT_IAM_URL.to_string()),
    };

    match auth.auth_type {
        Some(AuthKind::Iam) => api_key
            .map(iam)
            .ok_or_else(|| SdkError::invalid_argument("auth type 'iam' requires api_key")),
        Some(AuthKind::BearerToken) => bearer
            .map(|token| Authenticator::Bearer { token })
            .ok_or_else(|| SdkError::invalid_argument("auth type 'bearertoken' requires bearer_token")),
        Some(AuthKind::Cp4d) => match (url.clone(), username) {
            (Some(url), Some(username)) if password.is_some() || api_key.is_some() => {
                Ok(Authenticator::Cp4d {
                    url,
                    username,
                    password,
                    api_key,
                })
            }
            _ => Err(SdkError::invalid_argument(
                "auth type 'cp4d' requires url, username and password or api_key",
            )),
        },
        None => {
            if let Some(key) = api_key {
                Ok(iam(key))
            } else if let Some(token) = bearer {
                Ok(Authenticator::Bearer { token })
            } else if let (Some(url), Some(username), Some(password)) =
                (url.clone(), username, password)
            {
                Ok(Authenticator::Cp4d {
                    url,
                    username,
                    password: Some(password),
                    api_key: None,
                })
            } else {
                Ok(Authenticator::Anonymous)
            }
        }
    }
}

struct CachedToken {
    token: SecretString,
    /// Unix seconds; `None` when the provider gave no expiry.
    expires_at: Option<i64>,
}

impl CachedToken {
    fn is_fresh(&self, now: i64) -> bool {
        self.expires_at
            .map_or(true, |exp| now < exp - REFRESH_MARGIN_SECS)
    }
}

/// Produces `Authorization` header values, exchanging and caching tokens.
pub struct TokenManager {
    authenticator: Authenticator,
    cache: Mutex<Option<CachedToken>>,
}

impl TokenManager {
    pub fn new(authenticator: Authenticator) -> Self {
        Self {
            authenticator,
            cache: Mutex::new(None),
        }
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    /// Header value for the next request, or `None` for anonymous access.
    ///
    /// Concurrent callers share one in-flight exchange.
    pub async fn authorization<T: HttpTransport>(
        &self,
        http: &T,
        cfg: &TransportConfig,
    ) -> Result<Option<String>, SdkError> {
        match &self.authenticator {
            Authenticator::Anonymous => Ok(None),
            Authenticator::Bearer { token } => {
                Ok(Some(format!("Bearer {}", token.expose_secret())))
            }
            Authenticator::Iam { .. } | Authenticator::Cp4d { .. } => {
                let now = chrono::Utc::now().timestamp();
                let mut cache = self.cache.lock().await;
                if let Some(cached) = cache.as_ref().filter(|c| c.is_fresh(now)) {
                    return Ok(Some(format!("Bearer {}", cached.token.expose_secret())));
                }
                let fresh = self.request_token(http, cfg).await?;
                let header = format!("Bearer {}", fresh.token.expose_secret());
                *cache = Some(fresh);
                Ok(Some(header))
            }
        }
    }

    /// Drop the cached token so the next call exchanges again.
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }

    async fn request_token<T: HttpTransport>(
        &self,
        http: &T,
        cfg: &TransportConfig,
    ) -> Result<CachedToken, SdkError> {
        match &self.authenticator {
            Authenticator::Iam { api_key, url } => {
                let endpoint = format!("{}/identity/token", url.trim_end_matches('/'));
                debug!("[WATSONX]: requesting IAM token from {}", endpoint);
                let fields = vec![
                    ("grant_type".to_string(), IAM_GRANT_TYPE.to_string()),
                    ("apikey".to_string(), api_key.expose_secret().clone()),
                ];
                let (body, _) = http
                    .post_form(&endpoint, &[], &fields, cfg)
                    .await
                    .map_err(map_transport_error_to_sdk_error)?;
                parse_iam_token(&body)
            }
            Authenticator::Cp4d {
                url,
                username,
                password,
                api_key,
            } => {
                let endpoint = format!("{}/v1/authorize", url.trim_end_matches('/'));
                debug!("[WATSONX]: requesting CP4D token from {}", endpoint);
                let mut body = json!({ "username": username });
                if let Some(password) = password {
                    body["password"] = JsonValue::String(password.expose_secret().clone());
                } else if let Some(key) = api_key {
                    body["api_key"] = JsonValue::String(key.expose_secret().clone());
                }
                let headers = vec![("content-type".to_string(), "application/json".to_string())];
                let (resp, _) = http
                    .post_json(&endpoint, &headers, &body, cfg)
                    .await
                    .map_err(map_transport_error_to_sdk_error)?;
                parse_cp4d_token(&resp)
            }
            Authenticator::Bearer { .. } | Authenticator::Anonymous => Err(
                SdkError::invalid_argument("authenticator does not exchange tokens"),
            ),
        }
    }
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("authenticator", &self.authenticator)
            .finish_non_exhaustive()
    }
}

fn parse_iam_token(body: &JsonValue) -> Result<CachedToken, SdkError> {
    let token = body
        .get("access_token")
        .and_then(|v| v.as_str())
        .ok_or_else(|| missing_token("IAM response has no access_token"))?;
    let expires_at = body.get("expiration").and_then(|v| v.as_i64()).or_else(|| {
        body.get("expires_in")
            .and_then(|v| v.as_i64())
            .map(|secs| chrono::Utc::now().timestamp() + secs)
    });
    Ok(CachedToken {
        token: SecretString::new(token.to_string()),
        expires_at,
    })
}

fn parse_cp4d_token(body: &JsonValue) -> Result<CachedToken, SdkError> {
    let token = body
        .get("token")
        .and_then(|v| v.as_str())
        .ok_or_else(|| missing_token("CP4D response has no token"))?;
    Ok(CachedToken {
        token: SecretString::new(token.to_string()),
        expires_at: jwt_expiry(token),
    })
}

fn missing_token(message: &str) -> SdkError {
    SdkError::Upstream {
        status: 200,
        message: message.to_string(),
        source: None,
    }
}

/// `exp` claim of a JWT, without verifying the signature.
pub fn jwt_expiry(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: JsonValue = serde_json::from_slice(&bytes).ok()?;
    claims.get("exp").and_then(|v| v.as_i64())
}
