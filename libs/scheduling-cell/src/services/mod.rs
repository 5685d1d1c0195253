pub mod audit;
pub mod availability;
pub mod booking;
pub mod conflict;
pub mod escalation;
pub mod lifecycle;
pub mod locks;
pub mod resolution;

pub use audit::AuditService;
pub use availability::SlotGenerationService;
pub use booking::VisitBookingService;
pub use conflict::ConflictDetectionService;
pub use escalation::EscalationService;
pub use lifecycle::VisitLifecycleService;
pub use locks::SchedulingLockService;
pub use resolution::ProviderResolutionService;
