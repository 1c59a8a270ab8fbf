use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{ACCEPT, AUTHORIZATION},
    Method, RequestBuilder,
};
use serde::de::DeserializeOwned;
use tokio::{sync::Mutex, time::Instant};
use tracing::debug;

use super::api::{
    Envelope, Location, LocationProfile, LocationTemplate, Monitor, MonitorGroup, NotificationProfile, ThresholdProfile, TokenResponse,
    UserGroup,
};
use crate::provider::ProviderError;

pub const DEFAULT_API_BASE_URL: &str = "https://www.site24x7.com/api";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.zoho.com/oauth/v2/token";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
// Tokens are refreshed a bit before they actually expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// The parts of the Site24x7 API used by the provider.
#[async_trait]
pub trait Site24x7Api: Send + Sync {
    async fn list_monitors(&self) -> Result<Vec<Monitor>, ProviderError>;
    async fn create_monitor(&self, monitor: &Monitor) -> Result<Monitor, ProviderError>;
    async fn update_monitor(&self, monitor: &Monitor) -> Result<Monitor, ProviderError>;
    async fn delete_monitor(&self, id: &str) -> Result<(), ProviderError>;
    async fn list_location_profiles(&self) -> Result<Vec<LocationProfile>, ProviderError>;
    async fn get_location_profile(&self, id: &str) -> Result<LocationProfile, ProviderError>;
    async fn list_locations(&self) -> Result<Vec<Location>, ProviderError>;
    async fn list_notification_profiles(&self) -> Result<Vec<NotificationProfile>, ProviderError>;
    async fn list_threshold_profiles(&self) -> Result<Vec<ThresholdProfile>, ProviderError>;
    async fn list_monitor_groups(&self) -> Result<Vec<MonitorGroup>, ProviderError>;
    async fn list_user_groups(&self) -> Result<Vec<UserGroup>, ProviderError>;
}

#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// REST client that authenticates through the Zoho OAuth refresh token flow.
/// Access tokens are cached until shortly before they expire.
pub struct HttpClient {
    http: reqwest::Client,
    api_base_url: String,
    token_url: String,
    credentials: Credentials,
    token: Mutex<Option<AccessToken>>,
}

impl HttpClient {
    pub fn new(credentials: Credentials) -> Result<Self, ProviderError> {
        Self::with_endpoints(credentials, DEFAULT_API_BASE_URL, DEFAULT_TOKEN_URL)
    }

    pub fn with_endpoints(credentials: Credentials, api_base_url: &str, token_url: &str) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            api_base_url: api_base_url.trim_end_matches('/').to_owned(),
            token_url: token_url.to_owned(),
            credentials,
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String, ProviderError> {
        let mut token = self.token.lock().await;
        if let Some(token) = token.as_ref().filter(|token| token.expires_at > Instant::now()) {
            return Ok(token.value.clone());
        }

        debug!("refreshing site24x7 access token");
        let Credentials {
            client_id,
            client_secret,
            refresh_token,
        } = &self.credentials;
        let response: TokenResponse = self
            .http
            .post(&self.token_url)
            .query(&[
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?
            .json()
            .await?;

        let value = match (response.access_token, response.error) {
            (Some(value), None) => value,
            (_, Some(error)) => return Err(ProviderError::Auth(error)),
            (None, None) => return Err(ProviderError::Auth("token response without access token".to_owned())),
        };

        let expires_in = Duration::from_secs(response.expires_in.unwrap_or(3600));
        *token = Some(AccessToken {
            value: value.clone(),
            expires_at: Instant::now() + expires_in.saturating_sub(TOKEN_EXPIRY_MARGIN),
        });
        Ok(value)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}/{}", self.api_base_url, path.trim_start_matches('/')))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Option<T>, ProviderError> {
        let token = self.access_token().await?;
        let response = request
            .header(AUTHORIZATION, format!("Zoho-oauthtoken {token}"))
            .header(ACCEPT, "application/json; version=2.0")
            .send()
            .await?;

        let status = response.status();
        let envelope: Envelope<T> = response.json().await?;
        if envelope.code != 0 {
            return Err(ProviderError::Api {
                code: envelope.code,
                message: envelope.message,
            });
        }
        if !status.is_success() {
            return Err(ProviderError::Api {
                code: i64::from(status.as_u16()),
                message: envelope.message,
            });
        }
        Ok(envelope.data)
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ProviderError> {
        self.send(request).await?.ok_or_else(|| ProviderError::Api {
            code: 0,
            message: "response without data".to_owned(),
        })
    }

    async fn list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ProviderError> {
        Ok(self.send(self.request(Method::GET, path)).await?.unwrap_or_default())
    }
}

#[async_trait]
impl Site24x7Api for HttpClient {
    async fn list_monitors(&self) -> Result<Vec<Monitor>, ProviderError> {
        self.list("monitors").await
    }

    async fn create_monitor(&self, monitor: &Monitor) -> Result<Monitor, ProviderError> {
        self.fetch(self.request(Method::POST, "monitors").json(monitor)).await
    }

    async fn update_monitor(&self, monitor: &Monitor) -> Result<Monitor, ProviderError> {
        self.fetch(self.request(Method::PUT, &format!("monitors/{}", monitor.monitor_id)).json(monitor)).await
    }

    async fn delete_monitor(&self, id: &str) -> Result<(), ProviderError> {
        self.send::<serde_json::Value>(self.request(Method::DELETE, &format!("monitors/{id}"))).await?;
        Ok(())
    }

    async fn list_location_profiles(&self) -> Result<Vec<LocationProfile>, ProviderError> {
        self.list("location_profiles").await
    }

    async fn get_location_profile(&self, id: &str) -> Result<LocationProfile, ProviderError> {
        self.fetch(self.request(Method::GET, &format!("location_profiles/{id}"))).await
    }

    async fn list_locations(&self) -> Result<Vec<Location>, ProviderError> {
        let template: Option<LocationTemplate> = self.send(self.request(Method::GET, "location_template")).await?;
        Ok(template.map(|template| template.locations).unwrap_or_default())
    }

    async fn list_notification_profiles(&self) -> Result<Vec<NotificationProfile>, ProviderError> {
        self.list("notification_profiles").await
    }

    async fn list_threshold_profiles(&self) -> Result<Vec<ThresholdProfile>, ProviderError> {
        self.list("threshold_profiles").await
    }

    async fn list_monitor_groups(&self) -> Result<Vec<MonitorGroup>, ProviderError> {
        self.list("monitor_groups").await
    }

    async fn list_user_groups(&self) -> Result<Vec<UserGroup>, ProviderError> {
        self.list("user_groups").await
    }
}
