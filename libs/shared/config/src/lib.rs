use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub google_oauth_client_id: String,
    pub google_oauth_client_secret: String,
    pub google_oauth_token_url: String,
    pub google_calendar_base_url: String,
    pub calendar_timeout_seconds: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            google_oauth_client_id: env::var("GOOGLE_OAUTH_CLIENT_ID")
                .unwrap_or_else(|_| {
                    warn!("GOOGLE_OAUTH_CLIENT_ID not set, calendar sync disabled");
                    String::new()
                }),
            google_oauth_client_secret: env::var("GOOGLE_OAUTH_CLIENT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("GOOGLE_OAUTH_CLIENT_SECRET not set, calendar sync disabled");
                    String::new()
                }),
            google_oauth_token_url: env::var("GOOGLE_OAUTH_TOKEN_URL")
                .unwrap_or_else(|_| "https://oauth2.googleapis.com/token".to_string()),
            google_calendar_base_url: env::var("GOOGLE_CALENDAR_BASE_URL")
                .unwrap_or_else(|_| "https://www.googleapis.com/calendar/v3".to_string()),
            calendar_timeout_seconds: env::var("CALENDAR_TIMEOUT_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_calendar_configured(&self) -> bool {
        !self.google_oauth_client_id.is_empty()
            && !self.google_oauth_client_secret.is_empty()
            && !self.google_oauth_token_url.is_empty()
    }
}
