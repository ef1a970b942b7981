use std::{collections::HashMap, sync::Arc};

/// InodeTracker hands out inode numbers for paths, and resolves them back.
///
/// Nothing but the path is stored: attributes and contents are always
/// computed from it again.
///
/// Every inode carries the number of lookups the kernel holds on it. Entries
/// are removed once the kernel forgot all of them.
pub struct InodeTracker {
    data: HashMap<u64, Node>,

    // lookup table for inodes by their path
    path_to_inode: HashMap<Arc<str>, u64>,

    // the next inode to allocate
    next_inode: u64,
}

struct Node {
    path: Arc<str>,
    lookups: u64,
}

impl Default for InodeTracker {
    fn default() -> Self {
        Self {
            data: Default::default(),
            path_to_inode: Default::default(),

            next_inode: 2,
        }
    }
}

impl InodeTracker {
    // Retrieves the path for a given inode, if it exists.
    pub fn get(&self, ino: u64) -> Option<Arc<str>> {
        self.data.get(&ino).map(|node| node.path.clone())
    }

    // Retrieves the inode for a given path, if one is allocated.
    pub fn get_inode(&self, path: &str) -> Option<u64> {
        self.path_to_inode.get(path).copied()
    }

    /// Records a lookup of path, allocating a new inode if the path isn't
    /// tracked yet. Returns the inode.
    pub fn lookup(&mut self, path: &str) -> u64 {
        if let Some(ino) = self.path_to_inode.get(path) {
            if let Some(node) = self.data.get_mut(ino) {
                node.lookups += 1;
            }
            return *ino;
        }

        let ino = self.next_inode;
        let path: Arc<str> = Arc::from(path);
        self.path_to_inode.insert(path.clone(), ino);
        self.data.insert(ino, Node { path, lookups: 1 });

        self.next_inode += 1;
        ino
    }

    /// Drops count lookups from an inode, removing it once none are left.
    /// Returns whether the inode was removed.
    pub fn forget(&mut self, ino: u64, count: u64) -> bool {
        let Some(node) = self.data.get_mut(&ino) else {
            return false;
        };

        node.lookups = node.lookups.saturating_sub(count);
        if node.lookups > 0 {
            return false;
        }

        if let Some(node) = self.data.remove(&ino) {
            self.path_to_inode.remove(&node.path);
        }
        true
    }

    /// The number of inodes currently tracked.
    pub fn len(&self) -> usize {
        self.data.len()
    }
}
