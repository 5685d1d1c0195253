pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{
    AvailableSlot, BookVisitRequest, BookingOutcome, Provider, SchedulingError, ShiftHours,
    SlotCheck, Visit, VisitStatus, WeeklyHours,
};
