//! tado v2 REST client

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use super::{Session, TadoApi};
use crate::config::ApiConfig;
use crate::error::TadoError;
use crate::models::{Credentials, HomeMode};

/// Seconds shaved off the advertised token lifetime
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 30;

pub struct TadoClient {
    http_client: Client,
    auth_url: String,
    base_url: String,
    client_id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct MeResponse {
    #[serde(default)]
    homes: Vec<HomeInfo>,
}

#[derive(Debug, Deserialize)]
struct HomeInfo {
    id: i64,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HomeStateResponse {
    presence: String,
}

#[derive(Debug, Serialize)]
struct PresenceLock {
    #[serde(rename = "homePresence")]
    home_presence: HomeMode,
}

impl TadoClient {
    pub fn new(config: &ApiConfig) -> Result<Self, TadoError> {
        let auth_url = Url::parse(&config.auth_url)?;
        let base_url = Url::parse(&config.base_url)?;

        let http_client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http_client,
            auth_url: auth_url.as_str().trim_end_matches('/').to_string(),
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }

    fn home_url(&self, session: &Session, path: &str) -> String {
        format!("{}/api/v2/homes/{}/{}", self.base_url, session.home_id, path)
    }

    /// Map 401 and other non-2xx replies to errors
    async fn check(resp: Response) -> Result<Response, TadoError> {
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(TadoError::Unauthorized);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TadoError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, token: &str) -> Result<T, TadoError> {
        let resp = self
            .http_client
            .get(url)
            .bearer_auth(token)
            .send()
            .await?;

        let value = Self::check(resp).await?.json::<T>().await?;
        Ok(value)
    }

    async fn put_presence(&self, session: &Session, mode: HomeMode) -> Result<(), TadoError> {
        let resp = self
            .http_client
            .put(self.home_url(session, "presenceLock"))
            .bearer_auth(&session.access_token)
            .json(&PresenceLock {
                home_presence: mode,
            })
            .send()
            .await?;

        Self::check(resp).await?;
        tracing::info!("[Tado] Presence locked to {}", mode);
        Ok(())
    }
}

#[async_trait]
impl TadoApi for TadoClient {
    async fn login(&self, credentials: &Credentials) -> Result<Session, TadoError> {
        let url = format!("{}/oauth/token", self.auth_url);
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "password"),
            ("scope", "home.user"),
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
        ];

        let resp = self.http_client.post(&url).form(&form).send().await?;
        let token: TokenResponse = Self::check(resp).await?.json().await?;

        let me: MeResponse = self
            .get_json(&format!("{}/api/v2/me", self.base_url), &token.access_token)
            .await?;
        let home = me.homes.into_iter().next().ok_or(TadoError::NoHome)?;

        let expires_in = token.expires_in.unwrap_or(600);
        let expires_at =
            Utc::now() + chrono::Duration::seconds((expires_in - TOKEN_EXPIRY_MARGIN_SECS).max(0));

        tracing::info!(
            "[Tado] Logged in to home {} ({}), token expires in {} sec",
            home.id,
            home.name.as_deref().unwrap_or("unnamed"),
            expires_in
        );

        Ok(Session {
            access_token: token.access_token,
            home_id: home.id,
            expires_at,
        })
    }

    async fn get_mobile_devices(&self, session: &Session) -> Result<Vec<Value>, TadoError> {
        self.get_json(&self.home_url(session, "mobileDevices"), &session.access_token)
            .await
    }

    async fn get_home_state(&self, session: &Session) -> Result<HomeMode, TadoError> {
        let state: HomeStateResponse = self
            .get_json(&self.home_url(session, "state"), &session.access_token)
            .await?;

        HomeMode::parse(&state.presence).ok_or(TadoError::UnexpectedPresence(state.presence))
    }

    async fn set_home(&self, session: &Session) -> Result<(), TadoError> {
        self.put_presence(session, HomeMode::Home).await
    }

    async fn set_away(&self, session: &Session) -> Result<(), TadoError> {
        self.put_presence(session, HomeMode::Away).await
    }
}
