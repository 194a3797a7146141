pub mod hasher;
pub mod http;
pub mod listing;

use crate::{Cid, Result};

/// Path segment under which the gateway serves objects: `/ipfs/<cid>`.
pub const OBJECT_MARKER: &str = "ipfs";

/// One child entry of a gateway directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildDescriptor {
    pub name: String,
    pub cid: Cid,
    pub is_dir: bool,
    /// Hyperlink target the entry was decoded from, query component stripped.
    pub href: String,
}

impl ChildDescriptor {
    /// Whether a lookup for `name` resolves to this entry.
    ///
    /// Besides the decoded name, the raw target is accepted when it is `name`
    /// itself or ends in `/<name>`, which is how older listings were matched.
    pub fn matches(&self, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        if self.name == name || self.href == name {
            return true;
        }
        self.href
            .strip_suffix(name)
            .is_some_and(|prefix| prefix.ends_with('/'))
    }
}

/// Read access to the content-addressed store behind the gateway.
///
/// Both calls block until the whole response has been received.
pub trait Gateway: Send + Sync {
    /// Fetch and decode the listing of the directory object `cid`.
    fn fetch_listing(&self, cid: &str) -> Result<Vec<ChildDescriptor>>;

    /// Fetch the full payload of the file object `cid`.
    fn fetch_content(&self, cid: &str) -> Result<Vec<u8>>;
}


#[cfg(test)]
mod tests {
    use super::testing::{dir_entry, file_entry};

    #[test]
    fn test_matches_by_name() {
        let entry = file_entry("a.txt", "Qa");
        assert!(entry.matches("a.txt"));
        assert!(!entry.matches("a"));
        assert!(!entry.matches("txt"));
    }

    #[test]
    fn test_matches_raw_target() {
        let mut entry = file_entry("a.txt", "Qa");
        entry.name = "decoded".to_string();
        assert!(entry.matches("a.txt"));
        assert!(entry.matches("/ipfs/Qa/a.txt"));
        assert!(!entry.matches("xa.txt"));
    }

    #[test]
    fn test_directory_matches() {
        let entry = dir_entry("sub", "Qsub");
        assert!(entry.matches("sub"));
        assert!(!entry.matches("su"));
    }

    #[test]
    fn test_empty_name_never_matches() {
        assert!(!dir_entry("sub", "Qsub").matches(""));
        assert!(!file_entry("a.txt", "Qa").matches(""));
    }
}
