pub mod engine;
pub mod extraction;
pub mod replies;
pub mod signals;
pub mod state;

pub use engine::ConversationEngine;
pub use extraction::ExtractionService;
pub use replies::ReplyRenderer;
pub use state::ConversationStore;
