//! External-collaborator seams: the appointment and patient stores, the
//! notification gateway and the optional free-text reply provider. The engine
//! only ever talks to these traits; the in-memory implementations back the
//! test suites and any embedding that has no real store wired up yet.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::*;
pub use memory::*;
pub use traits::*;
