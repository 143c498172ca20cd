// # legacy protocol
//
// Dashboard form login that hands out an opaque access token, then
// dashboard `/api/v2` calls with the token in the query string.
//
// ```http
// POST {web}/api/v2/user/login                                  # email, password
// GET  {web}/api/v2/zone/load_multi?user_id=..&access_token=..
// GET  {web}/api/v2/rpat/load_multi?user_id=..&z=..&access_token=..
// GET  {web}/api/v2/zone/settings?z=..&access_token=..
// ```

use async_trait::async_trait;
use cfsync_core::traits::{AccountContext, ConfigFetcher, Session, SessionCredential, ZoneRef};
use cfsync_core::{Error, Result};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::http::{self, PROVIDER};

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    result: String,
    #[serde(default)]
    response: Option<LoginToken>,
}

#[derive(Debug, Deserialize)]
struct LoginToken {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ZoneList {
    #[serde(default)]
    objs: Vec<LegacyZone>,
}

#[derive(Debug, Deserialize)]
struct LegacyZone {
    zone_name: String,
    zone_id: ZoneId,
}

/// Zone ids come back as either strings or numbers
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ZoneId {
    Text(String),
    Number(u64),
}

impl ZoneId {
    fn into_string(self) -> String {
        match self {
            ZoneId::Text(id) => id,
            ZoneId::Number(id) => id.to_string(),
        }
    }
}

/// Cloudflare fetcher using the legacy dashboard API
pub struct CloudflareLegacyFetcher {
    username: String,
    user_id: String,
    /// ⚠️ NEVER log this value
    login_pass: String,
    web_base: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for CloudflareLegacyFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareLegacyFetcher")
            .field("username", &self.username)
            .field("user_id", &self.user_id)
            .field("login_pass", &"<REDACTED>")
            .field("web_base", &self.web_base)
            .finish()
    }
}

impl CloudflareLegacyFetcher {
    /// Create a new legacy fetcher
    pub fn new(
        username: impl Into<String>,
        user_id: impl Into<String>,
        login_pass: impl Into<String>,
        web_base: &str,
    ) -> Result<Self> {
        Ok(Self {
            username: username.into(),
            user_id: user_id.into(),
            login_pass: login_pass.into(),
            web_base: http::trim_base(web_base),
            client: http::build_client()?,
        })
    }

    fn token_of(session: &Session) -> Result<&str> {
        session
            .access_token()
            .ok_or_else(|| Error::auth("legacy protocol needs an access token session"))
    }

    /// GET a dashboard endpoint and return its `response` field
    async fn get_v2(
        &self,
        session: &Session,
        endpoint: &str,
        params: &[(&str, &str)],
        what: &str,
    ) -> Result<Value> {
        let token = Self::token_of(session)?;
        let url = format!("{}/api/v2/{}", self.web_base, endpoint);

        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("access_token", token)])
            .send()
            .await
            .map_err(http::send_error)?;

        let body: Value = http::read_json(response, what).await?;
        http::v2_field(body, "response", what)
    }
}

#[async_trait]
impl ConfigFetcher for CloudflareLegacyFetcher {
    async fn authenticate(&self) -> Result<Session> {
        tracing::info!("Logging in to Cloudflare (legacy) as {}", self.username);

        let response = self
            .client
            .post(format!("{}/api/v2/user/login", self.web_base))
            .form(&[
                ("email", self.username.as_str()),
                ("password", self.login_pass.as_str()),
            ])
            .send()
            .await
            .map_err(http::send_error)?;

        let body = http::read_text(response, "login").await?;
        let login: LoginResponse = serde_json::from_str(&body)
            .map_err(|_| Error::auth("Login appears to have failed."))?;

        let token = match (login.result.as_str(), login.response) {
            ("success", Some(LoginToken { access_token })) if !access_token.is_empty() => access_token,
            _ => return Err(Error::auth("Login appears to have failed.")),
        };

        tracing::debug!("Legacy login succeeded");
        Ok(Session::new(
            AccountContext {
                username: self.username.clone(),
                user_id: self.user_id.clone(),
            },
            SessionCredential::AccessToken(token),
        ))
    }

    async fn list_zones(&self, session: &Session) -> Result<Vec<ZoneRef>> {
        let mut response = self
            .get_v2(
                session,
                "zone/load_multi",
                &[("user_id", session.account.user_id.as_str())],
                "zone listing",
            )
            .await?;

        let zones = response
            .get_mut("zones")
            .map(Value::take)
            .ok_or_else(|| {
                Error::provider(PROVIDER, "Invalid zone listing response: missing `zones`")
            })?;
        let list: ZoneList = serde_json::from_value(zones).map_err(|e| {
            Error::provider(PROVIDER, format!("Invalid zone listing response: {}", e))
        })?;

        Ok(list
            .objs
            .into_iter()
            .map(|z| ZoneRef::new(z.zone_name, z.zone_id.into_string()))
            .collect())
    }

    async fn fetch_zone_config(&self, session: &Session, zone: &ZoneRef) -> Result<Value> {
        let pagerules = self
            .get_v2(
                session,
                "rpat/load_multi",
                &[
                    ("user_id", session.account.user_id.as_str()),
                    ("z", zone.name.as_str()),
                ],
                "page rules",
            )
            .await?;

        let settings = self
            .get_v2(
                session,
                "zone/settings",
                &[("z", zone.name.as_str())],
                "zone settings",
            )
            .await?;

        Ok(json!({
            "pagerules": pagerules,
            "settings": settings,
        }))
    }

    fn protocol_name(&self) -> &'static str {
        "legacy"
    }
}
