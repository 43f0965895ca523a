//! Review session coordinator

mod coordinator;

pub use coordinator::SessionCoordinator;
