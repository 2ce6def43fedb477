pub mod queue;
pub mod scoring;

pub use queue::EmergencyQueueService;
pub use scoring::TriageScoringService;
