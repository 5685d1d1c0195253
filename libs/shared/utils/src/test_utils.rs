use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            google_oauth_client_id: "test-client-id".to_string(),
            google_oauth_client_secret: "test-client-secret".to_string(),
            google_oauth_token_url: "http://localhost:54322/token".to_string(),
            google_calendar_base_url: "http://localhost:54322/calendar/v3".to_string(),
            calendar_timeout_seconds: 2,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn provider(email: &str) -> Self {
        Self::new(email, "provider")
    }

    pub fn staff(email: &str) -> Self {
        Self::new(email, "staff")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned PostgREST row payloads for wiremock-backed tests.
pub struct MockStoreResponses;

impl MockStoreResponses {
    pub fn provider_response(provider_id: &str, timezone: &str) -> serde_json::Value {
        Self::provider_with_options(provider_id, timezone, 0, 0, false)
    }

    pub fn provider_with_options(
        provider_id: &str,
        timezone: &str,
        buffer_before_minutes: i32,
        buffer_after_minutes: i32,
        calendar_connected: bool,
    ) -> serde_json::Value {
        let weekday_shifts = json!([{ "start": "09:00:00", "end": "17:00:00" }]);
        let (access_token, refresh_token, expires_at) = if calendar_connected {
            (
                json!("test-access-token"),
                json!("test-refresh-token"),
                json!((Utc::now() + Duration::hours(1)).to_rfc3339()),
            )
        } else {
            (json!(null), json!(null), json!(null))
        };

        json!({
            "id": provider_id,
            "full_name": "Dr. Test Provider",
            "timezone": timezone,
            "buffer_before_minutes": buffer_before_minutes,
            "buffer_after_minutes": buffer_after_minutes,
            "working_hours": {
                "monday": weekday_shifts.clone(),
                "tuesday": weekday_shifts.clone(),
                "wednesday": weekday_shifts.clone(),
                "thursday": weekday_shifts.clone(),
                "friday": weekday_shifts
            },
            "calendar_connected": calendar_connected,
            "calendar_access_token": access_token,
            "calendar_refresh_token": refresh_token,
            "calendar_token_expires_at": expires_at,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        })
    }

    pub fn visit_response(
        visit_id: &str,
        patient_id: &str,
        provider_id: &str,
        scheduled_at: DateTime<Utc>,
        duration_minutes: i32,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": visit_id,
            "patient_id": patient_id,
            "provider_id": provider_id,
            "scheduled_at": scheduled_at.to_rfc3339(),
            "duration_minutes": duration_minutes,
            "status": status,
            "visit_type": "follow_up",
            "reason_for_visit": "routine follow up",
            "priority_score": 3,
            "calendar_event_id": null,
            "cancelled_at": null,
            "completed_at": null,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        })
    }

    pub fn escalation_response(patient_id: &str, urgency_score: i32) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4().to_string(),
            "patient_id": patient_id,
            "symptom_text": "reported symptoms",
            "urgency_score": urgency_score,
            "created_at": Utc::now().to_rfc3339()
        })
    }
}
