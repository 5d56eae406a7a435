//! Outbound ports - Interfaces that the application requires from external systems

mod content_port;
mod persistence_port;

pub use content_port::ContentSourcePort;
pub use persistence_port::{PersistencePort, SavedState};
