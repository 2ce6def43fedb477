pub mod appointment;
pub mod conflict;
pub mod patient;
pub mod schedule;
pub mod slot;

pub use appointment::*;
pub use conflict::*;
pub use patient::*;
pub use schedule::*;
pub use slot::*;
