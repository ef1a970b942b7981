mod file_attr;
mod inode_tracker;

#[cfg(feature = "fuse")]
pub mod fuse;

use fuse_backend_rs::abi::fuse_abi::stat64;
use fuse_backend_rs::api::filesystem::{Context, FileSystem, FsOptions, ROOT_ID};
use parking_lot::RwLock;
use std::{io, sync::Arc, time::Duration};
use tracing::{debug, instrument, warn};

use self::{file_attr::gen_file_attr, inode_tracker::InodeTracker};
use crate::{
    path,
    tree::{self, EntryKind},
    RootDescriptor,
};

/// The inode reported for directory entries the kernel hasn't looked up.
/// Listing doesn't allocate inodes, the kernel follows up with a lookup.
const UNKNOWN_INO: u64 = 0xffff_ffff;

/// This implements a read-only FUSE filesystem exposing the synthetic trees
/// described by root descriptors below the mountpoint.
///
/// Everything is derived from paths, but FUSE calls are *for* a given inode.
/// We need to have a stable mapping of inode numbers to paths, which is
/// delegated to the inode tracker.
///
/// Inodes are only allocated when processing a `lookup` request, and
/// released again when the kernel forgets them. Only the path is remembered
/// for an inode, all attributes and file contents are computed again on
/// every request.
///
/// The mountpoint itself can't be stat'ed or listed, only the
/// descriptor-named directories below it resolve.
#[derive(Default)]
pub struct TestFs {
    /// This keeps track of inodes and the paths they stand for.
    inode_tracker: RwLock<InodeTracker>,
}

impl TestFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the path for an inode. The mount root maps to the empty string.
    fn path_for_inode(&self, inode: u64) -> io::Result<Arc<str>> {
        if inode == ROOT_ID {
            return Ok(Arc::from(""));
        }

        self.inode_tracker.read().get(inode).ok_or_else(|| {
            warn!("unknown inode");
            io::Error::from_raw_os_error(libc::ENOENT)
        })
    }

    /// Records a kernel lookup of path and returns its inode.
    fn lookup_path(&self, path: &str) -> u64 {
        self.inode_tracker.write().lookup(path)
    }

    /// Returns the inode of path for a directory listing, without allocating.
    fn listed_inode(&self, path: &str) -> u64 {
        if path.is_empty() {
            return ROOT_ID;
        }
        self.inode_tracker
            .read()
            .get_inode(path)
            .unwrap_or(UNKNOWN_INO)
    }
}

impl FileSystem for TestFs {
    type Handle = u64;
    type Inode = u64;

    fn init(&self, _capable: FsOptions) -> io::Result<FsOptions> {
        Ok(FsOptions::empty())
    }

    #[tracing::instrument(skip_all, fields(rq.inode = inode))]
    fn getattr(
        &self,
        _ctx: &Context,
        inode: Self::Inode,
        _handle: Option<Self::Handle>,
    ) -> io::Result<(stat64, Duration)> {
        let path = self.path_for_inode(inode)?;
        let attributes = tree::getattr(&path)?;
        debug!(path = %path, attributes = ?attributes, "found node");

        Ok((gen_file_attr(&attributes, inode).into(), Duration::MAX))
    }

    #[tracing::instrument(skip_all, fields(rq.parent_inode = parent, rq.name = ?name))]
    fn lookup(
        &self,
        _ctx: &Context,
        parent: Self::Inode,
        name: &std::ffi::CStr,
    ) -> io::Result<fuse_backend_rs::api::filesystem::Entry> {
        debug!("lookup");

        // Node names are ASCII, anything else can't be a valid node.
        let name = name
            .to_str()
            .map_err(|_| io::Error::from_raw_os_error(libc::ENOENT))?;

        let parent_path = self.path_for_inode(parent)?;
        let path = path::join(&parent_path, name);

        let attributes = tree::getattr(&path).map_err(|e| {
            debug!(err = %e, "lookup failed");
            io::Error::from(e)
        })?;

        if parent == ROOT_ID {
            if let Ok(descriptor) = name.parse::<RootDescriptor>() {
                debug!(
                    files = ?descriptor.file_count(),
                    bytes = ?descriptor.total_size(),
                    "looked up tree"
                );
            }
        }

        let ino = self.lookup_path(&path);

        Ok(fuse_backend_rs::api::filesystem::Entry {
            inode: ino,
            attr: gen_file_attr(&attributes, ino).into(),
            attr_timeout: Duration::MAX,
            entry_timeout: Duration::MAX,
            ..Default::default()
        })
    }

    #[tracing::instrument(skip_all, fields(rq.inode = inode, rq.count = count))]
    fn forget(&self, _ctx: &Context, inode: Self::Inode, count: u64) {
        if self.inode_tracker.write().forget(inode, count) {
            debug!("inode released");
        }
    }

    fn batch_forget(&self, _ctx: &Context, requests: Vec<(Self::Inode, u64)>) {
        let mut inode_tracker = self.inode_tracker.write();
        for (inode, count) in requests {
            inode_tracker.forget(inode, count);
        }
        debug!(inodes = inode_tracker.len(), "batch forget");
    }

    #[tracing::instrument(skip_all, fields(rq.inode = inode))]
    fn opendir(
        &self,
        _ctx: &Context,
        inode: Self::Inode,
        _flags: u32,
    ) -> io::Result<(
        Option<Self::Handle>,
        fuse_backend_rs::api::filesystem::OpenOptions,
    )> {
        let path = self.path_for_inode(inode)?;

        // Only checks the path lists, the entries are produced in readdir.
        tree::readdir(&path).map_err(|e| {
            debug!(err = %e, "opendir rejected");
            io::Error::from(e)
        })?;

        Ok((None, fuse_backend_rs::api::filesystem::OpenOptions::empty()))
    }

    #[tracing::instrument(skip_all, fields(rq.inode = inode, rq.offset = offset))]
    fn readdir(
        &self,
        _ctx: &Context,
        inode: Self::Inode,
        _handle: Self::Handle,
        _size: u32,
        offset: u64,
        add_entry: &mut dyn FnMut(fuse_backend_rs::api::filesystem::DirEntry) -> io::Result<usize>,
    ) -> io::Result<()> {
        debug!("readdir");

        let dir_path = self.path_for_inode(inode)?;
        let entries = tree::readdir(&dir_path)?;

        for (i, entry) in (offset..).zip(entries.skip(offset as usize)) {
            let ino = match entry.name.as_str() {
                "." => inode,
                ".." => self.listed_inode(path::parent(&dir_path)),
                name => self.listed_inode(&path::join(&dir_path, name)),
            };

            // the offset will become the "offset" parameter on the next call.
            let written = add_entry(fuse_backend_rs::api::filesystem::DirEntry {
                ino,
                offset: i + 1,
                type_: match entry.kind {
                    #[allow(clippy::unnecessary_cast)]
                    // libc::S_IFDIR is u32 on Linux and u16 on MacOS
                    EntryKind::Directory => libc::S_IFDIR as u32,
                    #[allow(clippy::unnecessary_cast)]
                    // libc::S_IFDIR is u32 on Linux and u16 on MacOS
                    EntryKind::File => libc::S_IFREG as u32,
                },
                name: entry.name.as_bytes(),
            })?;
            // If the buffer is full, add_entry will return `Ok(0)`.
            if written == 0 {
                break;
            }
        }

        Ok(())
    }

    #[tracing::instrument(skip_all, fields(rq.inode = inode, rq.flags = flags))]
    fn open(
        &self,
        _ctx: &Context,
        inode: Self::Inode,
        flags: u32,
        _fuse_flags: u32,
    ) -> io::Result<(
        Option<Self::Handle>,
        fuse_backend_rs::api::filesystem::OpenOptions,
        Option<u32>,
    )> {
        let path = self.path_for_inode(inode)?;

        tree::open(&path, flags).map_err(|e| {
            warn!(err = %e, "open rejected");
            io::Error::from(e)
        })?;

        // No handle is needed, reads are answered from the path alone.
        Ok((
            None,
            fuse_backend_rs::api::filesystem::OpenOptions::empty(),
            None,
        ))
    }

    #[instrument(skip_all, fields(rq.inode = inode, rq.offset = offset, rq.size = size))]
    fn read(
        &self,
        _ctx: &Context,
        inode: Self::Inode,
        _handle: Self::Handle,
        w: &mut dyn fuse_backend_rs::api::filesystem::ZeroCopyWriter,
        size: u32,
        offset: u64,
        _lock_owner: Option<u64>,
        flags: u32,
    ) -> io::Result<usize> {
        debug!("read");

        let path = self.path_for_inode(inode)?;

        // As written in the fuse docs, read should send exactly the number
        // of bytes requested except on EOF or error.
        let mut buf = vec![0u8; size as usize];
        let n = tree::read(&path, flags, offset, &mut buf).map_err(|e| {
            warn!(err = %e, "read rejected");
            io::Error::from(e)
        })?;

        w.write(&buf[..n])
    }
}
