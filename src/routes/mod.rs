/// Router Module Index
///
/// Routing is split by access level so the Session Guard is applied once, at the module
/// boundary, instead of per handler.

/// Routes reachable without a session: registration and login.
pub mod public;

/// Everything else. Wrapped in the Session Guard; `/{id}` routes additionally carry the
/// existence check and, for mutations, the Ownership Guard.
pub mod authenticated;
