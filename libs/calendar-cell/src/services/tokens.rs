// libs/calendar-cell/src/services/tokens.rs
use std::sync::Arc;

use chrono::{Duration, Utc};
use reqwest::{Client, Method};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{CalendarError, ProviderCalendarCredentials, TokenRefreshResponse};

/// Access tokens are refreshed this many seconds before their recorded
/// expiry so an in-flight request cannot race the cutoff.
const EXPIRY_SKEW_SECONDS: i64 = 60;

/// Per-provider OAuth token management for the external calendar.
///
/// Tokens live on the provider row; a refresh exchange persists the new
/// access token and expiry before the calling request proceeds.
pub struct CalendarTokenService {
    supabase: Arc<SupabaseClient>,
    http: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl CalendarTokenService {
    pub fn new(config: &AppConfig, supabase: Arc<SupabaseClient>) -> Self {
        // The refresh exchange is bounded by the same timeout as calendar
        // calls; a hung token endpoint must not stall a booking.
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.calendar_timeout_seconds))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            supabase,
            http,
            token_url: config.google_oauth_token_url.clone(),
            client_id: config.google_oauth_client_id.clone(),
            client_secret: config.google_oauth_client_secret.clone(),
        }
    }

    /// Return an access token that is valid for at least the skew window,
    /// refreshing and persisting first if the stored one has expired.
    pub async fn valid_access_token(
        &self,
        provider_id: Uuid,
        auth_token: &str,
    ) -> Result<String, CalendarError> {
        let credentials = self.fetch_credentials(provider_id, auth_token).await?;

        if !credentials.calendar_connected {
            return Err(CalendarError::NotConnected);
        }

        let cutoff = Utc::now() + Duration::seconds(EXPIRY_SKEW_SECONDS);
        if let (Some(token), Some(expires_at)) = (
            credentials.calendar_access_token.as_ref(),
            credentials.calendar_token_expires_at,
        ) {
            if expires_at > cutoff {
                return Ok(token.clone());
            }
            debug!("Calendar access token for provider {} expired, refreshing", provider_id);
        }

        let refresh_token = credentials
            .calendar_refresh_token
            .as_deref()
            .ok_or_else(|| {
                CalendarError::TokenRefreshFailed("no refresh token on file".to_string())
            })?;

        let refreshed = self.exchange_refresh_token(refresh_token).await?;
        let expires_at = Utc::now() + Duration::seconds(refreshed.expires_in);

        self.persist_token(provider_id, &refreshed.access_token, expires_at, auth_token)
            .await?;

        info!("Refreshed calendar access token for provider {}", provider_id);
        Ok(refreshed.access_token)
    }

    async fn fetch_credentials(
        &self,
        provider_id: Uuid,
        auth_token: &str,
    ) -> Result<ProviderCalendarCredentials, CalendarError> {
        let path = format!("/rest/v1/providers?id=eq.{}", provider_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| CalendarError::Database(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| CalendarError::Database(format!("provider {} not found", provider_id)))?;

        serde_json::from_value(row)
            .map_err(|e| CalendarError::Database(format!("failed to parse provider row: {}", e)))
    }

    async fn exchange_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenRefreshResponse, CalendarError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| CalendarError::TokenRefreshFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Token refresh rejected ({}): {}", status, body);
            return Err(CalendarError::TokenRefreshFailed(format!(
                "token endpoint returned {}",
                status
            )));
        }

        response
            .json::<TokenRefreshResponse>()
            .await
            .map_err(|e| CalendarError::TokenRefreshFailed(e.to_string()))
    }

    async fn persist_token(
        &self,
        provider_id: Uuid,
        access_token: &str,
        expires_at: chrono::DateTime<Utc>,
        auth_token: &str,
    ) -> Result<(), CalendarError> {
        let path = format!("/rest/v1/providers?id=eq.{}", provider_id);
        let body = json!({
            "calendar_access_token": access_token,
            "calendar_token_expires_at": expires_at.to_rfc3339(),
        });

        self.supabase
            .update_returning(&path, Some(auth_token), body)
            .await
            .map_err(|e| CalendarError::Database(format!("failed to persist token: {}", e)))?;

        Ok(())
    }
}
