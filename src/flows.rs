//! Device flow orchestration: session records, poll scheduling, expiry countdowns, and the
//! controller that ties them together.

pub mod controller;
pub mod countdown;
pub mod outcome;
pub mod schedule;
pub mod session;

pub use controller::*;
pub use countdown::*;
pub use outcome::*;
pub use schedule::*;
pub use session::*;
