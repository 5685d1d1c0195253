pub mod google;
pub mod tokens;

pub use google::GoogleCalendarService;
pub use tokens::CalendarTokenService;
