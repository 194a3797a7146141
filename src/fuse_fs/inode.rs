use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::node::{DirectoryNode, Node};

/// Inode of the mount root, fixed by the FUSE protocol.
pub const ROOT_INO: u64 = 1;

struct Slot {
    node: Node,
    parent: u64,
    /// Outstanding kernel references (lookups not yet forgotten).
    lookups: u64,
}

/// Live nodes keyed by inode. Root is always inode 1 and is never evicted.
pub struct NodeTable {
    slots: HashMap<u64, Slot>,
}

impl NodeTable {
    pub fn new(root: Arc<DirectoryNode>) -> Self {
        let mut slots = HashMap::new();
        slots.insert(
            ROOT_INO,
            Slot {
                node: Node::Directory(root),
                parent: ROOT_INO,
                lookups: 1,
            },
        );
        Self { slots }
    }

    pub fn get(&self, ino: u64) -> Option<Node> {
        self.slots.get(&ino).map(|slot| slot.node.clone())
    }

    pub fn parent_of(&self, ino: u64) -> Option<u64> {
        self.slots.get(&ino).map(|slot| slot.parent)
    }

    pub fn root(&self) -> Option<Arc<DirectoryNode>> {
        match self.get(ROOT_INO) {
            Some(Node::Directory(dir)) => Some(dir),
            _ => None,
        }
    }

    /// Record one kernel reference to `node` under `ino` and return the node
    /// the kernel should talk to from now on.
    ///
    /// An existing node for the same object is kept, so its memoized listing
    /// or payload survives repeated lookups.
    pub fn register(&mut self, ino: u64, parent: u64, node: Node) -> Node {
        if ino == ROOT_INO {
            warn!(cid = node.cid(), "Child hashed to the root inode; not registering");
            return node;
        }

        if let Some(slot) = self.slots.get_mut(&ino) {
            if slot.node.cid() == node.cid() && slot.node.kind() == node.kind() {
                slot.lookups += 1;
                return slot.node.clone();
            }
            warn!(
                ino,
                old = slot.node.cid(),
                new = node.cid(),
                "Inode collision, replacing node"
            );
        }

        self.slots.insert(
            ino,
            Slot {
                node: node.clone(),
                parent,
                lookups: 1,
            },
        );
        node
    }

    /// Drop `nlookup` references; evicts the node once none remain.
    /// Returns whether the node was evicted.
    pub fn forget(&mut self, ino: u64, nlookup: u64) -> bool {
        if ino == ROOT_INO {
            return false;
        }
        let Some(slot) = self.slots.get_mut(&ino) else {
            return false;
        };
        slot.lookups = slot.lookups.saturating_sub(nlookup);
        if slot.lookups == 0 {
            self.slots.remove(&ino);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
