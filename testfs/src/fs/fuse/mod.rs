use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use fuse_backend_rs::{api::filesystem::FileSystem, transport::FuseSession};
use parking_lot::Mutex;
use threadpool::ThreadPool;
use tracing::{debug, error, instrument};

#[cfg(test)]
mod tests;

/// The name the filesystem shows up with in the mount table.
const FSNAME: &str = "testfs";

/// The session is mounted read-write. No mutating operation is implemented,
/// so the kernel can't change anything, but write opens reach
/// [FileSystem::open] and get refused with EACCES instead of EROFS.
const MOUNT_READONLY: bool = false;

struct FuseServer<FS>
where
    FS: FileSystem + Sync + Send,
{
    server: Arc<fuse_backend_rs::api::server::Server<Arc<FS>>>,
    channel: fuse_backend_rs::transport::FuseChannel,
}

#[cfg(target_os = "macos")]
const BADFD: libc::c_int = libc::EBADF;
#[cfg(target_os = "linux")]
const BADFD: libc::c_int = libc::EBADFD;

impl<FS> FuseServer<FS>
where
    FS: FileSystem + Sync + Send,
{
    /// Handles requests from the channel until the session is shut down
    /// or woken up by [FuseDaemon::unmount].
    fn serve(&mut self) -> io::Result<()> {
        while let Some((reader, writer)) = self
            .channel
            .get_request()
            .map_err(|_| io::Error::from_raw_os_error(libc::EINVAL))?
        {
            if let Err(e) = self
                .server
                .handle_message(reader, writer.into(), None, None)
            {
                match e {
                    // This indicates the session has been shut down.
                    fuse_backend_rs::Error::EncodeMessage(e) if e.raw_os_error() == Some(BADFD) => {
                        break;
                    }
                    error => {
                        error!(?error, "failed to handle fuse request");
                        continue;
                    }
                }
            }
        }
        debug!("fuse server stopped");
        Ok(())
    }
}

/// Mounts a [FileSystem] and serves it with the specified number of
/// threads. Provides functions to unmount, and wait for it to have
/// completed.
///
/// Requests are dispatched to all threads concurrently, so the filesystem
/// must not rely on any ordering between them.
#[derive(Clone)]
pub struct FuseDaemon {
    mountpoint: Arc<PathBuf>,
    session: Arc<Mutex<FuseSession>>,
    threads: Arc<ThreadPool>,
}

impl FuseDaemon {
    #[instrument(skip(fs, mountpoint), fields(mountpoint=?mountpoint), err)]
    pub fn new<FS, P>(
        fs: FS,
        mountpoint: P,
        num_threads: usize,
        allow_other: bool,
    ) -> Result<Self, io::Error>
    where
        FS: FileSystem + Sync + Send + 'static,
        P: AsRef<Path> + std::fmt::Debug,
    {
        let server = Arc::new(fuse_backend_rs::api::server::Server::new(Arc::new(fs)));

        let mut session = FuseSession::new(mountpoint.as_ref(), FSNAME, "", MOUNT_READONLY)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

        #[cfg(target_os = "linux")]
        session.set_allow_other(allow_other);
        session
            .mount()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

        // construct a thread pool
        let threads = threadpool::Builder::new()
            .num_threads(num_threads)
            .thread_name("fuse_server".to_string())
            .build();

        for _ in 0..num_threads {
            // for each thread requested, create and start a FuseServer accepting requests.
            let mut server = FuseServer {
                server: server.clone(),
                channel: session
                    .new_channel()
                    .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?,
            };

            threads.execute(move || {
                if let Err(error) = server.serve() {
                    error!(?error, "fuse server failed");
                }
            });
        }

        Ok(FuseDaemon {
            mountpoint: Arc::new(mountpoint.as_ref().to_path_buf()),
            session: Arc::new(Mutex::new(session)),
            threads: Arc::new(threads),
        })
    }

    /// Waits for all threads to finish.
    #[instrument(skip_all)]
    pub fn wait(&self) {
        self.threads.join()
    }

    /// Detaches the mount, stops all server threads and waits for them to
    /// finish.
    ///
    /// The unmount is lazy: files still open below the mountpoint keep the
    /// kernel connection alive, so the channel loops are woken up explicitly
    /// instead of waiting for the kernel to close them. Further requests on
    /// such files fail with ENOTCONN.
    #[instrument(skip_all, fields(mountpoint = ?self.mountpoint), err)]
    pub fn unmount(&self) -> Result<(), io::Error> {
        {
            let mut session = self.session.lock();
            session
                .umount()
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
            session
                .wake()
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        }

        self.wait();
        debug!("unmounted");
        Ok(())
    }
}

impl Drop for FuseDaemon {
    fn drop(&mut self) {
        // Clones share the session, only the last one unmounts.
        if Arc::strong_count(&self.session) > 1 {
            return;
        }
        if let Err(error) = self.unmount() {
            error!(?error, "failed to unmount fuse filesystem")
        }
    }
}
