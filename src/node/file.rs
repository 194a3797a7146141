use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use tracing::debug;

use super::{NodeAttr, NodeKind, FILE_PERM};
use crate::gateway::Gateway;
use crate::{Cid, GatewayFsError, Result};

/// A file object. The whole payload is fetched on first open and kept.
pub struct FileNode {
    cid: Cid,
    name: String,
    debug: bool,
    gateway: Arc<dyn Gateway>,
    /// Write-once: `None` until the first successful fetch.
    payload: Mutex<Option<Arc<[u8]>>>,
}

impl std::fmt::Debug for FileNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileNode")
            .field("cid", &self.cid)
            .field("name", &self.name)
            .field("fetched", &self.is_fetched())
            .finish_non_exhaustive()
    }
}

impl FileNode {
    pub fn new(
        cid: impl Into<Cid>,
        name: impl Into<String>,
        debug: bool,
        gateway: Arc<dyn Gateway>,
    ) -> Self {
        Self {
            cid: cid.into(),
            name: name.into(),
            debug,
            gateway,
            payload: Mutex::new(None),
        }
    }

    pub fn cid(&self) -> &str {
        &self.cid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_fetched(&self) -> bool {
        self.payload.lock().is_some()
    }

    /// Size of the payload, 0 until fetched.
    pub fn size(&self) -> u64 {
        self.payload
            .lock()
            .as_ref()
            .map_or(0, |data| data.len() as u64)
    }

    /// Fetch the payload unless already held. A failure leaves the node
    /// unfetched so the next open tries again.
    pub fn open(&self) -> Result<()> {
        let mut slot = self.payload.lock();
        if slot.is_some() {
            return Ok(());
        }

        if self.debug {
            debug!(name = %self.name, cid = %self.cid, "Fetching file");
        }
        let data = self.gateway.fetch_content(&self.cid)?;
        if self.debug {
            debug!(name = %self.name, cid = %self.cid, bytes = data.len(), "File fetched");
        }
        *slot = Some(data.into());
        Ok(())
    }

    /// Bytes `[offset, offset + len)` clamped to the payload. Reading at or
    /// past the end yields an empty buffer.
    pub fn read(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let data = self
            .payload
            .lock()
            .clone()
            .ok_or_else(|| GatewayFsError::InvalidState(format!("{} read before open", self.name)))?;

        let Ok(start) = usize::try_from(offset) else {
            return Ok(Vec::new());
        };
        if start >= data.len() {
            return Ok(Vec::new());
        }
        let end = start.saturating_add(len).min(data.len());
        Ok(data[start..end].to_vec())
    }

    /// Timestamps are the current time on every call; the gateway exposes no
    /// modification time.
    pub fn attr(&self) -> NodeAttr {
        if self.debug {
            debug!(name = %self.name, cid = %self.cid, "Getattr (file)");
        }
        let now = SystemTime::now();
        NodeAttr {
            kind: NodeKind::File,
            perm: FILE_PERM,
            size: self.size(),
            atime: now,
            mtime: now,
            ctime: now,
        }
    }
}
