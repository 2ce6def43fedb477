pub mod availability;
pub mod conflict;
pub mod no_show;
pub mod slots;

pub use availability::AvailabilityService;
pub use conflict::ConflictDetector;
pub use no_show::NoShowRiskService;
pub use slots::SlotGenerator;
