//! Append-only signal audit trail port.

use crate::domain::error::TickforgeError;
use crate::domain::signal::Signal;

pub trait AuditPort {
    fn append(&mut self, signal: &Signal) -> Result<(), TickforgeError>;
}
