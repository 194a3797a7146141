use std::sync::Arc;
use std::time::UNIX_EPOCH;

use parking_lot::Mutex;
use tracing::debug;

use super::{DirEntry, FileNode, FsStats, Node, NodeAttr, NodeDescriptor, NodeKind};
use super::{DIR_PERM, STATFS_BLOCKS, STATFS_BLOCK_SIZE, STATFS_NAME_LEN};
use crate::gateway::hasher::stable_id;
use crate::gateway::{ChildDescriptor, Gateway};
use crate::{Cid, GatewayFsError, Result};

/// A directory object. Its listing is fetched on first use and kept for the
/// life of the node; it is never refreshed.
pub struct DirectoryNode {
    cid: Cid,
    debug: bool,
    gateway: Arc<dyn Gateway>,
    /// `None` until the first successful fetch. The lock is held across the
    /// fetch so concurrent callers wait instead of fetching again.
    listing: Mutex<Option<Arc<Listing>>>,
}

/// A loaded listing together with its projection into directory entries,
/// built once so repeated enumerations hand out the same slice.
struct Listing {
    children: Vec<ChildDescriptor>,
    entries: Arc<[DirEntry]>,
}

impl Listing {
    fn new(children: Vec<ChildDescriptor>) -> Self {
        let entries = children
            .iter()
            .map(|child| DirEntry {
                name: child.name.clone(),
                ino: stable_id(&child.cid, &child.name),
                kind: if child.is_dir {
                    NodeKind::Directory
                } else {
                    NodeKind::File
                },
            })
            .collect();
        Self { children, entries }
    }
}

impl std::fmt::Debug for DirectoryNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryNode")
            .field("cid", &self.cid)
            .field("loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}

impl DirectoryNode {
    pub fn new(cid: impl Into<Cid>, debug: bool, gateway: Arc<dyn Gateway>) -> Self {
        Self {
            cid: cid.into(),
            debug,
            gateway,
            listing: Mutex::new(None),
        }
    }

    pub fn cid(&self) -> &str {
        &self.cid
    }

    pub fn is_loaded(&self) -> bool {
        self.listing.lock().is_some()
    }

    fn listing(&self) -> Result<Arc<Listing>> {
        let mut slot = self.listing.lock();
        if let Some(listing) = slot.as_ref() {
            return Ok(Arc::clone(listing));
        }

        if self.debug {
            debug!(cid = %self.cid, "Fetching directory listing");
        }
        let listing = Arc::new(Listing::new(self.gateway.fetch_listing(&self.cid)?));
        if self.debug {
            debug!(cid = %self.cid, entries = listing.children.len(), "Directory listing loaded");
        }
        *slot = Some(Arc::clone(&listing));
        Ok(listing)
    }

    /// Resolve `name` to a fresh child node. The first matching entry in
    /// listing order wins.
    pub fn lookup(&self, name: &str) -> Result<NodeDescriptor> {
        if self.debug {
            debug!(cid = %self.cid, name, "Lookup");
        }

        let listing = self.listing()?;
        let child = listing
            .children
            .iter()
            .find(|child| child.matches(name))
            .ok_or_else(|| GatewayFsError::NotExist(format!("{name} in {}", self.cid)))?;

        let node = if child.is_dir {
            Node::Directory(Arc::new(DirectoryNode::new(
                child.cid.clone(),
                self.debug,
                Arc::clone(&self.gateway),
            )))
        } else {
            Node::File(Arc::new(FileNode::new(
                child.cid.clone(),
                child.name.clone(),
                self.debug,
                Arc::clone(&self.gateway),
            )))
        };

        Ok(NodeDescriptor {
            ino: stable_id(&child.cid, &child.name),
            name: child.name.clone(),
            node,
        })
    }

    /// All entries of the directory, in listing order. Every call after the
    /// first load returns the same shared slice.
    pub fn enumerate(&self) -> Result<Arc<[DirEntry]>> {
        if self.debug {
            debug!(cid = %self.cid, "Enumerate");
        }

        Ok(Arc::clone(&self.listing()?.entries))
    }

    pub fn attr(&self) -> NodeAttr {
        if self.debug {
            debug!(cid = %self.cid, "Getattr (directory)");
        }
        NodeAttr {
            kind: NodeKind::Directory,
            perm: DIR_PERM,
            size: 0,
            atime: UNIX_EPOCH,
            mtime: UNIX_EPOCH,
            ctime: UNIX_EPOCH,
        }
    }

    pub fn statfs(&self) -> FsStats {
        FsStats {
            blocks: STATFS_BLOCKS,
            bfree: STATFS_BLOCKS,
            bavail: STATFS_BLOCKS,
            files: 0,
            ffree: 0,
            bsize: STATFS_BLOCK_SIZE,
            frsize: STATFS_BLOCK_SIZE,
            namelen: STATFS_NAME_LEN,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::gateway::testing::{dir_entry, file_entry, StubGateway};

    fn root_listing() -> Vec<ChildDescriptor> {
        vec![dir_entry("docs", "Qdocs"), file_entry("readme.txt", "Qreadme")]
    }

    #[test]
    fn test_enumerate_is_memoized() {
        let gateway = Arc::new(StubGateway::new().with_dir("Qroot", root_listing()));
        let dir = DirectoryNode::new("Qroot", false, gateway.clone());
        assert!(!dir.is_loaded());

        let first = dir.enumerate().unwrap();
        let second = dir.enumerate().unwrap();
        assert_eq!(first, second);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(gateway.listing_calls(), 1);
        assert!(dir.is_loaded());

        assert_eq!(first.len(), 2);
        assert_eq!(first[0].name, "docs");
        assert_eq!(first[0].kind, NodeKind::Directory);
        assert_eq!(first[0].ino, stable_id("Qdocs", "docs"));
        assert_eq!(first[1].kind, NodeKind::File);
    }

    #[test]
    fn test_lookup_and_enumerate_share_listing() {
        let gateway = Arc::new(StubGateway::new().with_dir("Qroot", root_listing()));
        let dir = DirectoryNode::new("Qroot", false, gateway.clone());

        let docs = dir.lookup("docs").unwrap();
        let entries = dir.enumerate().unwrap();
        assert_eq!(entries[0].ino, docs.ino);
        assert_eq!(gateway.listing_calls(), 1);
    }

    #[test]
    fn test_failed_fetch_is_retried() {
        let gateway = Arc::new(
            StubGateway::new()
                .with_dir("Qroot", root_listing())
                .recovering_with("Qroot", vec![file_entry("late.txt", "Qlate")])
                .failing_listings(1),
        );
        let dir = DirectoryNode::new("Qroot", false, gateway.clone());

        let Err(err) = dir.lookup("late.txt") else {
            panic!("first fetch should fail");
        };
        assert!(matches!(err, GatewayFsError::NotFound(_)));
        assert!(!dir.is_loaded());

        // The retry serves the listing of the second fetch.
        let late = dir.lookup("late.txt").unwrap();
        assert_eq!(late.node.cid(), "Qlate");
        assert_eq!(gateway.listing_calls(), 2);

        let Err(err) = dir.lookup("readme.txt") else {
            panic!("readme.txt is only in the listing that was never served");
        };
        assert!(matches!(err, GatewayFsError::NotExist(_)));
        assert_eq!(gateway.listing_calls(), 2);
    }

    #[test]
    fn test_missing_name() {
        let gateway = Arc::new(StubGateway::new().with_dir("Qroot", root_listing()));
        let dir = DirectoryNode::new("Qroot", false, gateway.clone());

        let Err(err) = dir.lookup("nope") else {
            panic!("nope is not in the listing");
        };
        assert!(matches!(err, GatewayFsError::NotExist(_)));
        // A miss on a loaded listing does not refetch.
        assert!(dir.lookup("nope").is_err());
        assert_eq!(gateway.listing_calls(), 1);
    }

    #[test]
    fn test_empty_name_does_not_resolve() {
        let gateway = Arc::new(StubGateway::new().with_dir("Qroot", root_listing()));
        let dir = DirectoryNode::new("Qroot", false, gateway);

        let Err(err) = dir.lookup("") else {
            panic!("an empty name must not resolve to a child");
        };
        assert!(matches!(err, GatewayFsError::NotExist(_)));
    }

    #[test]
    fn test_first_duplicate_wins() {
        let gateway = Arc::new(StubGateway::new().with_dir(
            "Qroot",
            vec![file_entry("dup", "Qfirst"), dir_entry("dup", "Qsecond")],
        ));
        let dir = DirectoryNode::new("Qroot", false, gateway);

        let found = dir.lookup("dup").unwrap();
        assert_eq!(found.node.cid(), "Qfirst");
        assert_eq!(found.kind(), NodeKind::File);
        assert_eq!(dir.enumerate().unwrap().len(), 2);
    }

    #[test]
    fn test_child_kinds() {
        let gateway = Arc::new(StubGateway::new().with_dir("Qroot", root_listing()));
        let dir = DirectoryNode::new("Qroot", true, gateway);

        let docs = dir.lookup("docs").unwrap();
        assert!(matches!(docs.node, Node::Directory(_)));
        assert_eq!(docs.mode(), NodeKind::Directory.mode());

        let readme = dir.lookup("readme.txt").unwrap();
        assert!(matches!(readme.node, Node::File(_)));
        assert_eq!(readme.mode(), NodeKind::File.mode());
    }

    #[test]
    fn test_attr_and_statfs_need_no_fetch() {
        let gateway = Arc::new(StubGateway::new());
        let dir = DirectoryNode::new("Qroot", false, gateway.clone());

        let attr = dir.attr();
        assert_eq!(attr.kind, NodeKind::Directory);
        assert_eq!(attr.perm, 0o555);

        let stats = dir.statfs();
        assert_eq!(stats.bavail, STATFS_BLOCKS);
        assert_eq!(stats.bsize, 4096);
        assert_eq!(stats.namelen, 255);
        assert_eq!(gateway.listing_calls(), 0);
    }

    #[test]
    fn test_concurrent_lookups_fetch_once() {
        const THREADS: usize = 8;
        let gateway = Arc::new(
            StubGateway::new()
                .with_dir("Qroot", root_listing())
                .with_delay(Duration::from_millis(50)),
        );
        let dir = Arc::new(DirectoryNode::new("Qroot", false, gateway.clone()));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let dir = Arc::clone(&dir);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    dir.lookup("docs").map(|d| d.ino)
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap(), stable_id("Qdocs", "docs"));
        }
        assert_eq!(gateway.listing_calls(), 1);
    }
}
