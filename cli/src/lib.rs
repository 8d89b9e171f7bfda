//! Host adapter for the jj checkpoint gate.
//!
//! The binary speaks a JSON-lines protocol on stdin/stdout; [`Host`] maps each
//! request onto the [`jjgate_tools::Gatekeeper`] and the exposed tools.

pub mod host;
pub mod protocol;

pub use host::Host;
pub use protocol::{Envelope, Request, Response, SessionInfo};
