// # v4 protocol
//
// Browser-style dashboard login (security token scraped from the login
// page), then header-authenticated REST v4 calls for zones and settings.
// Page rules still come from the dashboard `/api/v2/rpat` endpoint.
//
// ## API Calls
//
// ```http
// GET  {web}/a/login                                  # scrape security_token
// POST {web}/a/login                                  # email, password, security_token
// GET  {api}/zones?page=N&per_page=50                 # X-Auth-Email / X-Auth-Key
// GET  {web}/api/v2/rpat/load_multi?user_id=..&z=..   # page rules (`response`)
// GET  {api}/zones/:zone_id/settings                  # settings (`result`)
// ```

use async_trait::async_trait;
use cfsync_core::snapshot::encode_path_segment;
use cfsync_core::traits::{AccountContext, ConfigFetcher, Session, SessionCredential, ZoneRef};
use cfsync_core::{Error, Result};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::http::{self, PROVIDER};

/// Zones requested per listing page
const ZONES_PER_PAGE: u32 = 50;

/// Marker the dashboard embeds in the login page
const SECURITY_TOKEN_MARKER: &str = "\"security_token\":\"";

/// Path the dashboard redirects to after a successful login
const ACCOUNT_PATH: &str = "/a/account";

/// REST v4 response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
    result_info: Option<ResultInfo>,
}

fn default_success() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    total_pages: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ZoneEntry {
    name: String,
    id: String,
}

impl<T> Envelope<T> {
    /// Unwrap `result`, turning `"success": false` into a provider error
    fn into_result(self, what: &str) -> Result<(T, Option<ResultInfo>)> {
        if !self.success {
            let detail = self
                .errors
                .iter()
                .map(|e| match e.code {
                    Some(code) => format!("{} ({})", e.message, code),
                    None => e.message.clone(),
                })
                .collect::<Vec<_>>()
                .join("; ");
            return Err(Error::provider(
                PROVIDER,
                format!("{} failed: {}", what, detail),
            ));
        }

        let result = self.result.ok_or_else(|| {
            Error::provider(PROVIDER, format!("Invalid {} response: missing `result`", what))
        })?;
        Ok((result, self.result_info))
    }
}

/// Cloudflare fetcher using the REST v4 API
pub struct CloudflareV4Fetcher {
    /// Login e-mail, also sent as `X-Auth-Email`
    username: String,

    /// Account id for dashboard endpoints
    user_id: String,

    /// API key
    /// ⚠️ NEVER log this value
    api_key: String,

    /// Dashboard password
    /// ⚠️ NEVER log this value
    login_pass: String,

    /// REST v4 base URL
    api_base: String,

    /// Dashboard base URL
    web_base: String,

    /// HTTP client (with cookie jar) for the whole run
    client: reqwest::Client,
}

// Custom Debug implementation that hides the secrets
impl std::fmt::Debug for CloudflareV4Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareV4Fetcher")
            .field("username", &self.username)
            .field("user_id", &self.user_id)
            .field("api_key", &"<REDACTED>")
            .field("login_pass", &"<REDACTED>")
            .field("api_base", &self.api_base)
            .field("web_base", &self.web_base)
            .finish()
    }
}

impl CloudflareV4Fetcher {
    /// Create a new v4 fetcher
    ///
    /// # Security
    ///
    /// Neither the API key nor the password is ever logged or included in
    /// error messages.
    pub fn new(
        username: impl Into<String>,
        user_id: impl Into<String>,
        api_key: impl Into<String>,
        login_pass: impl Into<String>,
        api_base: &str,
        web_base: &str,
    ) -> Result<Self> {
        Ok(Self {
            username: username.into(),
            user_id: user_id.into(),
            api_key: api_key.into(),
            login_pass: login_pass.into(),
            api_base: http::trim_base(api_base),
            web_base: http::trim_base(web_base),
            client: http::build_client()?,
        })
    }

    /// Header credentials carried by the session
    fn api_key_of(session: &Session) -> Result<(&str, &str)> {
        match &session.credential {
            SessionCredential::ApiKey { email, key } => Ok((email.as_str(), key.as_str())),
            SessionCredential::AccessToken(_) => Err(Error::auth(
                "v4 protocol needs an API key session, got an access token",
            )),
        }
    }

    /// GET with `X-Auth-Email` / `X-Auth-Key`
    fn authed_get(&self, session: &Session, url: &str) -> Result<reqwest::RequestBuilder> {
        let (email, key) = Self::api_key_of(session)?;
        Ok(self
            .client
            .get(url)
            .header("X-Auth-Email", email)
            .header("X-Auth-Key", key))
    }

    async fn get_page_rules(&self, session: &Session, zone: &ZoneRef) -> Result<Value> {
        let url = format!("{}/api/v2/rpat/load_multi", self.web_base);
        let response = self
            .authed_get(session, &url)?
            .query(&[
                ("user_id", session.account.user_id.as_str()),
                ("z", zone.name.as_str()),
            ])
            .send()
            .await
            .map_err(http::send_error)?;

        let body: Value = http::read_json(response, "page rules").await?;
        http::v2_field(body, "response", "page rules")
    }

    async fn get_settings(&self, session: &Session, zone: &ZoneRef) -> Result<Value> {
        let url = format!(
            "{}/zones/{}/settings",
            self.api_base,
            encode_path_segment(&zone.id)
        );
        let response = self
            .authed_get(session, &url)?
            .send()
            .await
            .map_err(http::send_error)?;

        let envelope: Envelope<Value> = http::read_json(response, "zone settings").await?;
        let (settings, _) = envelope.into_result("zone settings")?;
        Ok(settings)
    }
}

/// Pull the value of `"security_token":"..."` out of the login page
fn extract_security_token(page: &str) -> Option<&str> {
    let start = page.find(SECURITY_TOKEN_MARKER)? + SECURITY_TOKEN_MARKER.len();
    let rest = &page[start..];
    let end = rest.find('"')?;
    Some(&rest[..end])
}

#[async_trait]
impl ConfigFetcher for CloudflareV4Fetcher {
    async fn authenticate(&self) -> Result<Session> {
        let login_url = format!("{}/a/login", self.web_base);
        tracing::info!("Logging in to Cloudflare dashboard as {}", self.username);

        let response = self
            .client
            .get(&login_url)
            .send()
            .await
            .map_err(http::send_error)?;
        let page = http::read_text(response, "login page").await?;

        let token = extract_security_token(&page)
            .ok_or_else(|| Error::auth("Unable to login - no security token present"))?;

        let response = self
            .client
            .post(&login_url)
            .form(&[
                ("email", self.username.as_str()),
                ("password", self.login_pass.as_str()),
                ("security_token", token),
            ])
            .send()
            .await
            .map_err(http::send_error)?;

        let landed_on_account = response.url().path().contains(ACCOUNT_PATH);
        let body = http::read_text(response, "login").await?;
        if !landed_on_account && !body.contains(ACCOUNT_PATH) {
            return Err(Error::auth("Login appears to have failed."));
        }

        tracing::debug!("Dashboard login succeeded");
        Ok(Session::new(
            AccountContext {
                username: self.username.clone(),
                user_id: self.user_id.clone(),
            },
            SessionCredential::ApiKey {
                email: self.username.clone(),
                key: self.api_key.clone(),
            },
        ))
    }

    async fn list_zones(&self, session: &Session) -> Result<Vec<ZoneRef>> {
        let url = format!("{}/zones", self.api_base);
        let per_page = ZONES_PER_PAGE.to_string();
        let mut zones = Vec::new();
        let mut page: u32 = 1;

        loop {
            let page_param = page.to_string();
            let response = self
                .authed_get(session, &url)?
                .query(&[("page", page_param.as_str()), ("per_page", per_page.as_str())])
                .send()
                .await
                .map_err(http::send_error)?;

            let envelope: Envelope<Vec<ZoneEntry>> = http::read_json(response, "zone listing").await?;
            let (entries, info) = envelope.into_result("zone listing")?;
            tracing::debug!("Zone listing page {} returned {} zone(s)", page, entries.len());
            zones.extend(entries.into_iter().map(|z| ZoneRef::new(z.name, z.id)));

            let total_pages = info.and_then(|i| i.total_pages).unwrap_or(1);
            if page >= total_pages {
                break;
            }
            page += 1;
        }

        Ok(zones)
    }

    async fn fetch_zone_config(&self, session: &Session, zone: &ZoneRef) -> Result<Value> {
        let pagerules = self.get_page_rules(session, zone).await?;
        let settings = self.get_settings(session, zone).await?;

        Ok(json!({
            "pagerules": pagerules,
            "settings": settings,
        }))
    }

    fn protocol_name(&self) -> &'static str {
        "v4"
    }
}
