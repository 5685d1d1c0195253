pub mod models;
pub mod port;
pub mod services;

pub use models::{BusyInterval, BusySource, CalendarError, CalendarEventRequest};
pub use port::CalendarPort;
pub use services::{CalendarTokenService, GoogleCalendarService};
