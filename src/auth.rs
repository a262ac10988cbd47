//! Auth-domain identifiers, redacted secrets, and typed status snapshots.

pub mod id;
pub mod secret;
pub mod status;

pub use id::*;
pub use secret::*;
pub use status::*;
