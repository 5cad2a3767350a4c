//! Session identification (`spec.md` §4.5): the `x-renkon-session` header.

use crate::id::SessionId;

/// Name of the header a client uses to pin itself to a pipeline cursor.
pub const SESSION_HEADER: &str = "x-renkon-session";

/// Mint a fresh session id. Renkon uses UUIDv4 (random, not derived from
/// any request data) since sessions exist purely to partition pipeline state
/// and carry no identity of their own.
pub fn new_session_id() -> SessionId {
    SessionId::new(uuid::Uuid::new_v4().to_string())
}
