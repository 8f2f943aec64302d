//! JSON-lines audit log adapter.
//!
//! One serialized signal per line, append-only. The file is opened in
//! append mode so restarts extend the existing trail.

use crate::domain::error::TickforgeError;
use crate::domain::signal::Signal;
use crate::ports::audit_port::AuditPort;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

pub struct JsonlAuditAdapter {
    file: File,
}

impl JsonlAuditAdapter {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TickforgeError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self { file })
    }
}

impl AuditPort for JsonlAuditAdapter {
    fn append(&mut self, signal: &Signal) -> Result<(), TickforgeError> {
        let line = serde_json::to_string(signal).map_err(|e| TickforgeError::Persistence {
            reason: format!("failed to serialize signal: {e}"),
        })?;
        writeln!(self.file, "{line}")?;
        self.file.flush()?;
        Ok(())
    }
}
