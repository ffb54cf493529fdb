//! Connection identifiers.

use std::fmt;

/// Transient identifier of one accepted client connection.
///
/// Assigned by the server's accept loop from a monotonically increasing
/// counter, so ordering by id is ordering by accept time.  Never reused
/// within one server lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
