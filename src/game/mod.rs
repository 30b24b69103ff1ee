//! Game coordination
//!
//! The concurrency budget, inbound challenge screening, per-game worker
//! sessions, and the manager control loop that ties them together.

pub mod counter;
pub mod manager;
pub mod screen;
pub mod session;

pub use counter::GameCounter;
pub use manager::GameManager;
pub use screen::screen_challenge;
pub use session::GameSession;
