// libs/calendar-cell/src/services/google.rs
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{BusyInterval, BusySource, CalendarError, CalendarEventRequest};
use crate::port::CalendarPort;
use crate::services::tokens::CalendarTokenService;

/// Google Calendar adapter. Every remote call is bounded by the configured
/// timeout; a timeout is indistinguishable from any other transport failure.
pub struct GoogleCalendarService {
    tokens: CalendarTokenService,
    http: Client,
    base_url: String,
    call_timeout: Duration,
}

impl GoogleCalendarService {
    pub fn new(config: &AppConfig, supabase: Arc<SupabaseClient>) -> Self {
        Self {
            tokens: CalendarTokenService::new(config, supabase),
            http: Client::new(),
            base_url: config.google_calendar_base_url.clone(),
            call_timeout: Duration::from_secs(config.calendar_timeout_seconds),
        }
    }

    async fn send_bounded(&self, request: RequestBuilder) -> Result<Response, CalendarError> {
        match timeout(self.call_timeout, request.send()).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(CalendarError::Unavailable(e.to_string())),
            Err(_) => Err(CalendarError::Unavailable(format!(
                "calendar request timed out after {}s",
                self.call_timeout.as_secs()
            ))),
        }
    }

    fn event_body(event: &CalendarEventRequest) -> Value {
        json!({
            "summary": &event.summary,
            "description": &event.description,
            "start": { "dateTime": event.start.to_rfc3339() },
            "end": { "dateTime": event.end.to_rfc3339() },
            "extendedProperties": {
                "private": { "visit_id": event.visit_id.to_string() }
            }
        })
    }

    /// An event that is already gone counts as converged for idempotent
    /// update/delete mirroring.
    fn is_gone(status: StatusCode) -> bool {
        status == StatusCode::NOT_FOUND || status == StatusCode::GONE
    }
}

#[async_trait]
impl CalendarPort for GoogleCalendarService {
    async fn get_busy_intervals(
        &self,
        provider_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Vec<BusyInterval>, CalendarError> {
        let access_token = self.tokens.valid_access_token(provider_id, auth_token).await?;

        debug!("Querying calendar free/busy for provider {} from {} to {}", provider_id, start, end);

        let request = self
            .http
            .post(format!("{}/freeBusy", self.base_url))
            .bearer_auth(&access_token)
            .json(&json!({
                "timeMin": start.to_rfc3339(),
                "timeMax": end.to_rfc3339(),
                "items": [{ "id": "primary" }]
            }));

        let response = self.send_bounded(request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CalendarError::Unavailable(format!(
                "free/busy query returned {}",
                status
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| CalendarError::Unavailable(e.to_string()))?;

        let mut intervals = Vec::new();
        if let Some(busy) = body["calendars"]["primary"]["busy"].as_array() {
            for entry in busy {
                let parsed = (
                    entry["start"].as_str().and_then(|s| DateTime::parse_from_rfc3339(s).ok()),
                    entry["end"].as_str().and_then(|s| DateTime::parse_from_rfc3339(s).ok()),
                );
                match parsed {
                    (Some(start), Some(end)) => intervals.push(BusyInterval {
                        start: start.with_timezone(&Utc),
                        end: end.with_timezone(&Utc),
                        source: BusySource::External,
                    }),
                    _ => warn!("Skipping unparseable busy interval: {}", entry),
                }
            }
        }

        Ok(intervals)
    }

    async fn create_event(
        &self,
        provider_id: Uuid,
        event: &CalendarEventRequest,
        auth_token: &str,
    ) -> Result<String, CalendarError> {
        let access_token = self.tokens.valid_access_token(provider_id, auth_token).await?;

        let request = self
            .http
            .post(format!("{}/calendars/primary/events", self.base_url))
            .bearer_auth(&access_token)
            .json(&Self::event_body(event));

        let response = self.send_bounded(request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CalendarError::Unavailable(format!(
                "event create returned {}",
                status
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| CalendarError::Unavailable(e.to_string()))?;

        body["id"]
            .as_str()
            .map(|id| id.to_string())
            .ok_or_else(|| CalendarError::Unavailable("event create returned no id".to_string()))
    }

    async fn update_event(
        &self,
        provider_id: Uuid,
        event_id: &str,
        event: &CalendarEventRequest,
        auth_token: &str,
    ) -> Result<(), CalendarError> {
        let access_token = self.tokens.valid_access_token(provider_id, auth_token).await?;

        let request = self
            .http
            .patch(format!("{}/calendars/primary/events/{}", self.base_url, event_id))
            .bearer_auth(&access_token)
            .json(&Self::event_body(event));

        let response = self.send_bounded(request).await?;
        let status = response.status();

        if Self::is_gone(status) {
            warn!("Calendar event {} vanished before update, treating as converged", event_id);
            return Ok(());
        }
        if !status.is_success() {
            return Err(CalendarError::Unavailable(format!(
                "event update returned {}",
                status
            )));
        }

        Ok(())
    }

    async fn delete_event(
        &self,
        provider_id: Uuid,
        event_id: &str,
        auth_token: &str,
    ) -> Result<(), CalendarError> {
        let access_token = self.tokens.valid_access_token(provider_id, auth_token).await?;

        let request = self
            .http
            .delete(format!("{}/calendars/primary/events/{}", self.base_url, event_id))
            .bearer_auth(&access_token);

        let response = self.send_bounded(request).await?;
        let status = response.status();

        if Self::is_gone(status) {
            debug!("Calendar event {} already deleted", event_id);
            return Ok(());
        }
        if !status.is_success() {
            return Err(CalendarError::Unavailable(format!(
                "event delete returned {}",
                status
            )));
        }

        Ok(())
    }
}
