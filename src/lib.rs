pub mod config;
pub mod fuse_fs;
pub mod gateway;
pub mod node;

/// A content identifier naming an immutable object behind the gateway.
///
/// Opaque: it is only compared and embedded in URLs, never parsed.
pub type Cid = String;

#[derive(Debug, thiserror::Error)]
pub enum GatewayFsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport failure, non-success status, unreadable body or document.
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Name absent from a successfully loaded listing.
    #[error("Entry does not exist: {0}")]
    NotExist(String),

    /// Read issued against a file that was never successfully opened.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl GatewayFsError {
    /// Errno reported to the kernel. The three lookup/fetch failures are
    /// indistinguishable to the OS: all of them are "no such entry".
    pub fn errno(&self) -> libc::c_int {
        match self {
            Self::NotFound(_) | Self::NotExist(_) | Self::InvalidState(_) => libc::ENOENT,
            Self::Io(_) => libc::EIO,
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayFsError>;
