pub mod inode;

use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyData, ReplyDirectory, ReplyEntry, ReplyOpen,
    ReplyStatfs, Request,
};
use libc::c_int;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::node::{DirEntry, DirectoryNode, FileNode, FsStats, Node, NodeAttr, NodeKind};
use crate::GatewayFsError;
use inode::{NodeTable, ROOT_INO};

const BLOCK_SIZE: u32 = 512;

/// Read-only FUSE filesystem rooted at one gateway directory object.
pub struct GatewayFs {
    nodes: Mutex<NodeTable>,
    entry_ttl: Duration,
    attr_ttl: Duration,
    uid: u32,
    gid: u32,
}

impl GatewayFs {
    pub fn new(root: Arc<DirectoryNode>, entry_ttl: Duration, attr_ttl: Duration) -> Self {
        let uid = unsafe { libc::getuid() };
        let gid = unsafe { libc::getgid() };

        Self {
            nodes: Mutex::new(NodeTable::new(root)),
            entry_ttl,
            attr_ttl,
            uid,
            gid,
        }
    }

    fn to_file_attr(&self, ino: u64, attr: &NodeAttr) -> FileAttr {
        let (kind, nlink) = match attr.kind {
            NodeKind::Directory => (FileType::Directory, 2),
            NodeKind::File => (FileType::RegularFile, 1),
        };

        FileAttr {
            ino,
            size: attr.size,
            blocks: attr.size.div_ceil(u64::from(BLOCK_SIZE)),
            atime: attr.atime,
            mtime: attr.mtime,
            ctime: attr.ctime,
            crtime: attr.ctime,
            kind,
            perm: attr.perm,
            nlink,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: BLOCK_SIZE,
            flags: 0,
        }
    }

    fn node(&self, ino: u64) -> Result<Node, c_int> {
        self.nodes.lock().get(ino).ok_or(libc::ENOENT)
    }

    fn directory(&self, ino: u64) -> Result<Arc<DirectoryNode>, c_int> {
        match self.node(ino)? {
            Node::Directory(dir) => Ok(dir),
            Node::File(_) => Err(libc::ENOTDIR),
        }
    }

    fn file(&self, ino: u64) -> Result<Arc<FileNode>, c_int> {
        match self.node(ino)? {
            Node::File(file) => Ok(file),
            Node::Directory(_) => Err(libc::EISDIR),
        }
    }

    /// Resolve `name` under `parent`, register the child and return its
    /// attributes. The gateway is contacted without the table lock held.
    fn lookup_child(&self, parent: u64, name: &OsStr) -> Result<FileAttr, c_int> {
        let dir = self.directory(parent)?;
        let name = name.to_str().ok_or(libc::ENOENT)?;

        let child = dir.lookup(name).map_err(|e| fs_errno("lookup", &e))?;
        debug!(parent, ino = child.ino, name = %child.name, cid = child.node.cid(), "Resolved");
        let node = self.nodes.lock().register(child.ino, parent, child.node);
        Ok(self.to_file_attr(child.ino, &node.attr()))
    }

    fn node_attr(&self, ino: u64) -> Result<FileAttr, c_int> {
        let node = self.node(ino)?;
        Ok(self.to_file_attr(ino, &node.attr()))
    }

    /// Parent inode of directory `ino` and its children. The children are
    /// the directory's memoized entries, shared rather than rebuilt per call.
    fn dir_listing(&self, ino: u64) -> Result<(u64, Arc<[DirEntry]>), c_int> {
        let dir = self.directory(ino)?;
        let parent = self.nodes.lock().parent_of(ino).unwrap_or(ROOT_INO);
        let children = dir.enumerate().map_err(|e| fs_errno("readdir", &e))?;
        Ok((parent, children))
    }

    fn open_file(&self, ino: u64, flags: i32) -> Result<(), c_int> {
        if flags & libc::O_ACCMODE != libc::O_RDONLY {
            return Err(libc::EROFS);
        }
        let file = self.file(ino)?;
        file.open().map_err(|e| fs_errno("open", &e))?;
        debug!(ino, name = file.name(), size = file.size(), "Opened");
        Ok(())
    }

    fn read_file(&self, ino: u64, offset: i64, size: u32) -> Result<Vec<u8>, c_int> {
        let offset = u64::try_from(offset).map_err(|_| libc::EINVAL)?;
        let file = self.file(ino)?;
        file.read(offset, size as usize).map_err(|e| fs_errno("read", &e))
    }

    fn fs_stats(&self) -> Result<FsStats, c_int> {
        let root = self.nodes.lock().root().ok_or(libc::ENOENT)?;
        Ok(root.statfs())
    }
}

/// `.`, `..` and then `children` in listing order, borrowing their names.
fn dir_stream<'a>(
    ino: u64,
    parent: u64,
    children: &'a [DirEntry],
) -> impl Iterator<Item = (u64, FileType, &'a str)> + 'a {
    let dots: [(u64, FileType, &'a str); 2] = [
        (ino, FileType::Directory, "."),
        (parent, FileType::Directory, ".."),
    ];
    dots.into_iter().chain(children.iter().map(|child| {
        let kind = match child.kind {
            NodeKind::Directory => FileType::Directory,
            NodeKind::File => FileType::RegularFile,
        };
        (child.ino, kind, child.name.as_str())
    }))
}

/// Log an adapter failure and map it for the kernel. Missing names are a
/// normal outcome of lookups and only logged at debug level.
fn fs_errno(op: &str, err: &GatewayFsError) -> c_int {
    if let GatewayFsError::NotExist(_) = err {
        debug!(op, error = %err, "No such entry");
    } else {
        warn!(op, error = %err, "Gateway request failed");
    }
    err.errno()
}

impl Filesystem for GatewayFs {
    fn init(
        &mut self,
        _req: &Request<'_>,
        _config: &mut fuser::KernelConfig,
    ) -> std::result::Result<(), c_int> {
        debug!("FUSE init");
        Ok(())
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        match self.lookup_child(parent, name) {
            Ok(attr) => reply.entry(&self.entry_ttl, &attr, 0),
            Err(errno) => reply.error(errno),
        }
    }

    fn forget(&mut self, _req: &Request<'_>, ino: u64, nlookup: u64) {
        if self.nodes.lock().forget(ino, nlookup) {
            debug!(ino, "Evicted node");
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        match self.node_attr(ino) {
            Ok(attr) => reply.attr(&self.attr_ttl, &attr),
            Err(errno) => reply.error(errno),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        match self.open_file(ino, flags) {
            Ok(()) => reply.opened(0, fuser::consts::FOPEN_KEEP_CACHE),
            Err(errno) => reply.error(errno),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        match self.read_file(ino, offset, size) {
            Ok(data) => reply.data(&data),
            Err(errno) => reply.error(errno),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let (parent, children) = match self.dir_listing(ino) {
            Ok(listing) => listing,
            Err(errno) => {
                reply.error(errno);
                return;
            }
        };

        let skip = usize::try_from(offset).unwrap_or(0);
        for (i, (ino, kind, name)) in dir_stream(ino, parent, &children).enumerate().skip(skip) {
            if reply.add(ino, (i + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        match self.fs_stats() {
            Ok(s) => reply.statfs(
                s.blocks, s.bfree, s.bavail, s.files, s.ffree, s.bsize, s.namelen, s.frsize,
            ),
            Err(errno) => reply.error(errno),
        }
    }
}
