//! Filesystem nodes backed by gateway objects.
//!
//! A [`DirectoryNode`] memoizes its listing and a [`FileNode`] its payload,
//! each behind its own lock, so every node fetches from the gateway at most
//! once on the success path. Failed fetches leave nothing behind and the next
//! caller retries.

pub mod dir;
pub mod file;

use std::sync::Arc;
use std::time::SystemTime;

pub use dir::DirectoryNode;
pub use file::FileNode;

/// Permission bits of every directory: readable and searchable.
pub const DIR_PERM: u16 = 0o555;
/// Permission bits of every file: readable.
pub const FILE_PERM: u16 = 0o444;

/// Placeholder capacity reported by `statfs`. The store has no notion of
/// free space, but tools such as rsync refuse to copy into a full volume.
pub const STATFS_BLOCKS: u64 = 1_000_000_000;
pub const STATFS_BLOCK_SIZE: u32 = 4096;
pub const STATFS_NAME_LEN: u32 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    File,
}

impl NodeKind {
    pub fn perm(self) -> u16 {
        match self {
            NodeKind::Directory => DIR_PERM,
            NodeKind::File => FILE_PERM,
        }
    }

    /// Full `st_mode`: file type bits plus permissions.
    pub fn mode(self) -> u32 {
        let type_bits = match self {
            NodeKind::Directory => libc::S_IFDIR,
            NodeKind::File => libc::S_IFREG,
        };
        type_bits as u32 | u32::from(self.perm())
    }
}

/// A live node, shared between the kernel-side table and in-flight requests.
#[derive(Debug, Clone)]
pub enum Node {
    Directory(Arc<DirectoryNode>),
    File(Arc<FileNode>),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Directory(_) => NodeKind::Directory,
            Node::File(_) => NodeKind::File,
        }
    }

    pub fn cid(&self) -> &str {
        match self {
            Node::Directory(d) => d.cid(),
            Node::File(f) => f.cid(),
        }
    }

    pub fn attr(&self) -> NodeAttr {
        match self {
            Node::Directory(d) => d.attr(),
            Node::File(f) => f.attr(),
        }
    }
}

/// Result of resolving a name inside a directory.
#[derive(Debug)]
pub struct NodeDescriptor {
    pub ino: u64,
    pub name: String,
    pub node: Node,
}

impl NodeDescriptor {
    pub fn kind(&self) -> NodeKind {
        self.node.kind()
    }

    pub fn mode(&self) -> u32 {
        self.kind().mode()
    }
}

/// One entry of a directory enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub ino: u64,
    pub kind: NodeKind,
}

impl DirEntry {
    pub fn mode(&self) -> u32 {
        self.kind.mode()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeAttr {
    pub kind: NodeKind,
    pub perm: u16,
    pub size: u64,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsStats {
    pub blocks: u64,
    pub bfree: u64,
    pub bavail: u64,
    pub files: u64,
    pub ffree: u64,
    pub bsize: u32,
    pub frsize: u32,
    pub namelen: u32,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::gateway::hasher::{hash_str, stable_id};
    use crate::gateway::testing::{dir_entry, file_entry, StubGateway};

    #[test]
    fn test_modes() {
        assert_eq!(NodeKind::Directory.mode(), libc::S_IFDIR as u32 | 0o555);
        assert_eq!(NodeKind::File.mode(), libc::S_IFREG as u32 | 0o444);
    }

    #[test]
    fn test_debug_output_names_objects() {
        let gateway =
            Arc::new(StubGateway::new().with_dir("Qroot", vec![file_entry("a.txt", "Qa")]));
        let root = DirectoryNode::new("Qroot", false, gateway);
        let child = root.lookup("a.txt").unwrap();

        let rendered = format!("{child:?}");
        assert!(rendered.contains("a.txt"), "{rendered}");
        assert!(rendered.contains("Qa"), "{rendered}");
        assert!(format!("{root:?}").contains("Qroot"));
    }

    #[test]
    fn test_mount_lookup_open_read() {
        let gateway = Arc::new(
            StubGateway::new()
                .with_dir(
                    "Qroot",
                    vec![dir_entry("docs", "Qdocs"), file_entry("readme.txt", "Qreadme")],
                )
                .with_dir("Qdocs", vec![file_entry("guide.md", "Qguide")])
                .with_file("Qreadme", b"hello"),
        );
        let root = DirectoryNode::new("Qroot", false, gateway.clone());

        let docs = root.lookup("docs").unwrap();
        assert_eq!(docs.ino, hash_str("Qdocs/docs"));
        assert_eq!(docs.kind(), NodeKind::Directory);
        let Node::Directory(docs_dir) = &docs.node else {
            panic!("docs should be a directory");
        };
        assert_eq!(docs_dir.cid(), "Qdocs");
        let nested = docs_dir.enumerate().unwrap();
        assert_eq!(nested[0].name, "guide.md");

        let readme = root.lookup("readme.txt").unwrap();
        assert_eq!(readme.name, "readme.txt");
        assert_eq!(readme.ino, stable_id("Qreadme", "readme.txt"));
        let Node::File(file) = &readme.node else {
            panic!("readme.txt should be a file");
        };
        assert_eq!(file.name(), "readme.txt");
        file.open().unwrap();
        assert_eq!(file.read(0, 100).unwrap(), b"hello");
        assert!(file.read(5, 100).unwrap().is_empty());
        assert_eq!(readme.node.attr().size, 5);

        // One listing for the root (shared by both lookups) and one for docs.
        assert_eq!(gateway.listing_calls(), 2);
        assert_eq!(gateway.content_calls(), 1);
    }
}
