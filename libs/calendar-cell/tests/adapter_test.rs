use std::sync::Arc;
use std::time::Duration as StdDuration;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use calendar_cell::models::{BusySource, CalendarError, CalendarEventRequest};
use calendar_cell::port::CalendarPort;
use calendar_cell::services::GoogleCalendarService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::test_utils::{MockStoreResponses, TestConfig};

fn test_app_config(server: &MockServer) -> AppConfig {
    let mut config = TestConfig::default().to_app_config();
    config.supabase_url = server.uri();
    config.google_oauth_token_url = format!("{}/token", server.uri());
    config.google_calendar_base_url = format!("{}/calendar/v3", server.uri());
    config.calendar_timeout_seconds = 1;
    config
}

fn calendar_service(config: &AppConfig) -> GoogleCalendarService {
    let supabase = Arc::new(SupabaseClient::new(config));
    GoogleCalendarService::new(config, supabase)
}

async fn mount_provider(server: &MockServer, provider_json: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/providers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([provider_json])))
        .mount(server)
        .await;
}

fn sample_event(visit_id: Uuid) -> CalendarEventRequest {
    let start = Utc::now() + Duration::days(1);
    CalendarEventRequest {
        visit_id,
        summary: "Clinic visit".to_string(),
        description: Some("follow up".to_string()),
        start,
        end: start + Duration::minutes(30),
    }
}

#[tokio::test]
async fn busy_intervals_parse_from_freebusy_response() {
    let server = MockServer::start().await;
    let config = test_app_config(&server);
    let provider_id = Uuid::new_v4();

    mount_provider(
        &server,
        MockStoreResponses::provider_with_options(&provider_id.to_string(), "UTC", 0, 0, true),
    )
    .await;

    let window_start = Utc::now();
    let window_end = window_start + Duration::days(1);
    let busy_start = window_start + Duration::hours(2);

    Mock::given(method("POST"))
        .and(path("/calendar/v3/freeBusy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "calendars": {
                "primary": {
                    "busy": [
                        {
                            "start": busy_start.to_rfc3339(),
                            "end": (busy_start + Duration::minutes(45)).to_rfc3339()
                        },
                        {
                            "start": (busy_start + Duration::hours(3)).to_rfc3339(),
                            "end": (busy_start + Duration::hours(4)).to_rfc3339()
                        }
                    ]
                }
            }
        })))
        .mount(&server)
        .await;

    let service = calendar_service(&config);
    let intervals = service
        .get_busy_intervals(provider_id, window_start, window_end, "token")
        .await
        .unwrap();

    assert_eq!(intervals.len(), 2);
    assert!(intervals.iter().all(|i| i.source == BusySource::External));
    assert_eq!(intervals[0].start, busy_start);
}

#[tokio::test]
async fn expired_token_is_refreshed_and_persisted_before_the_call() {
    let server = MockServer::start().await;
    let config = test_app_config(&server);
    let provider_id = Uuid::new_v4();

    let mut provider =
        MockStoreResponses::provider_with_options(&provider_id.to_string(), "UTC", 0, 0, true);
    provider["calendar_token_expires_at"] =
        json!((Utc::now() - Duration::minutes(5)).to_rfc3339());
    mount_provider(&server, provider).await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-access-token",
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/providers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": provider_id }])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/calendar/v3/freeBusy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "calendars": { "primary": { "busy": [] } }
        })))
        .mount(&server)
        .await;

    let service = calendar_service(&config);
    let intervals = service
        .get_busy_intervals(provider_id, Utc::now(), Utc::now() + Duration::days(1), "token")
        .await
        .unwrap();

    assert!(intervals.is_empty());
    // Mock expectations verify the refresh exchange and the token persist
    // each happened exactly once before the free/busy call succeeded.
}

#[tokio::test]
async fn failed_refresh_surfaces_token_refresh_error() {
    let server = MockServer::start().await;
    let config = test_app_config(&server);
    let provider_id = Uuid::new_v4();

    let mut provider =
        MockStoreResponses::provider_with_options(&provider_id.to_string(), "UTC", 0, 0, true);
    provider["calendar_token_expires_at"] =
        json!((Utc::now() - Duration::minutes(5)).to_rfc3339());
    mount_provider(&server, provider).await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let service = calendar_service(&config);
    let result = service
        .get_busy_intervals(provider_id, Utc::now(), Utc::now() + Duration::days(1), "token")
        .await;

    assert_matches!(result, Err(CalendarError::TokenRefreshFailed(_)));
}

#[tokio::test]
async fn disconnected_provider_yields_not_connected() {
    let server = MockServer::start().await;
    let config = test_app_config(&server);
    let provider_id = Uuid::new_v4();

    mount_provider(
        &server,
        MockStoreResponses::provider_with_options(&provider_id.to_string(), "UTC", 0, 0, false),
    )
    .await;

    let service = calendar_service(&config);
    let result = service
        .get_busy_intervals(provider_id, Utc::now(), Utc::now() + Duration::days(1), "token")
        .await;

    assert_matches!(result, Err(CalendarError::NotConnected));
}

#[tokio::test]
async fn freebusy_server_error_is_unavailable() {
    let server = MockServer::start().await;
    let config = test_app_config(&server);
    let provider_id = Uuid::new_v4();

    mount_provider(
        &server,
        MockStoreResponses::provider_with_options(&provider_id.to_string(), "UTC", 0, 0, true),
    )
    .await;

    Mock::given(method("POST"))
        .and(path("/calendar/v3/freeBusy"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let service = calendar_service(&config);
    let result = service
        .get_busy_intervals(provider_id, Utc::now(), Utc::now() + Duration::days(1), "token")
        .await;

    assert_matches!(result, Err(CalendarError::Unavailable(_)));
}

#[tokio::test]
async fn slow_freebusy_call_times_out_as_unavailable() {
    let server = MockServer::start().await;
    let config = test_app_config(&server);
    let provider_id = Uuid::new_v4();

    mount_provider(
        &server,
        MockStoreResponses::provider_with_options(&provider_id.to_string(), "UTC", 0, 0, true),
    )
    .await;

    Mock::given(method("POST"))
        .and(path("/calendar/v3/freeBusy"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "calendars": { "primary": { "busy": [] } } }))
                .set_delay(StdDuration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let service = calendar_service(&config);
    let result = service
        .get_busy_intervals(provider_id, Utc::now(), Utc::now() + Duration::days(1), "token")
        .await;

    assert_matches!(result, Err(CalendarError::Unavailable(_)));
}

#[tokio::test]
async fn create_event_returns_external_id() {
    let server = MockServer::start().await;
    let config = test_app_config(&server);
    let provider_id = Uuid::new_v4();

    mount_provider(
        &server,
        MockStoreResponses::provider_with_options(&provider_id.to_string(), "UTC", 0, 0, true),
    )
    .await;

    Mock::given(method("POST"))
        .and(path("/calendar/v3/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "evt-123" })))
        .mount(&server)
        .await;

    let service = calendar_service(&config);
    let event_id = service
        .create_event(provider_id, &sample_event(Uuid::new_v4()), "token")
        .await
        .unwrap();

    assert_eq!(event_id, "evt-123");
}

#[tokio::test]
async fn deleting_an_already_deleted_event_succeeds() {
    let server = MockServer::start().await;
    let config = test_app_config(&server);
    let provider_id = Uuid::new_v4();

    mount_provider(
        &server,
        MockStoreResponses::provider_with_options(&provider_id.to_string(), "UTC", 0, 0, true),
    )
    .await;

    Mock::given(method("DELETE"))
        .and(path_regex(r"^/calendar/v3/calendars/primary/events/.+$"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let service = calendar_service(&config);
    let result = service.delete_event(provider_id, "evt-gone", "token").await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn update_event_mirrors_new_times() {
    let server = MockServer::start().await;
    let config = test_app_config(&server);
    let provider_id = Uuid::new_v4();

    mount_provider(
        &server,
        MockStoreResponses::provider_with_options(&provider_id.to_string(), "UTC", 0, 0, true),
    )
    .await;

    Mock::given(method("PATCH"))
        .and(path_regex(r"^/calendar/v3/calendars/primary/events/.+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "evt-123" })))
        .expect(1)
        .mount(&server)
        .await;

    let service = calendar_service(&config);
    let result = service
        .update_event(provider_id, "evt-123", &sample_event(Uuid::new_v4()), "token")
        .await;

    assert!(result.is_ok());
}
