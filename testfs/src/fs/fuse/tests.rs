use std::{fs, io::Read, io::Seek, os::unix::fs::MetadataExt, path::Path};

use tempfile::TempDir;

use super::FuseDaemon;
use crate::fs::TestFs;

fn do_mount<P: AsRef<Path>>(mountpoint: P) -> std::io::Result<FuseDaemon> {
    FuseDaemon::new(TestFs::new(), mountpoint.as_ref(), 4, false)
}

/// Mount tests need a FUSE device, skip them if there is none.
fn fuse_available() -> bool {
    // https://plume.benboeckel.net/~/JustAnotherBlog/skipping-tests-in-rust
    if !Path::new("/dev/fuse").exists() {
        eprintln!("skipping test");
        return false;
    }
    true
}

/// Ensure mounting itself doesn't fail
#[test]
fn mount() {
    if !fuse_available() {
        return;
    }
    let tmpdir = TempDir::new().unwrap();

    let fuse_daemon = do_mount(tmpdir.path()).expect("must succeed");

    fuse_daemon.unmount().expect("unmount");
}

/// Ensure the mountpoint itself can neither be stat'ed nor listed
#[test]
fn root() {
    if !fuse_available() {
        return;
    }
    let tmpdir = TempDir::new().unwrap();
    let fuse_daemon = do_mount(tmpdir.path()).expect("must succeed");

    let err = fs::metadata(tmpdir.path()).expect_err("must fail");
    assert_eq!(std::io::ErrorKind::NotFound, err.kind());

    let err = fs::read_dir(tmpdir.path()).expect_err("must fail");
    assert_eq!(std::io::ErrorKind::NotFound, err.kind());

    // children still resolve
    assert!(fs::metadata(tmpdir.path().join("1kx5x4")).is_ok());

    fuse_daemon.unmount().expect("unmount");
}

/// Ensure directories and files below a descriptor can be stat'ed
#[test]
fn stat() {
    if !fuse_available() {
        return;
    }
    let tmpdir = TempDir::new().unwrap();
    let fuse_daemon = do_mount(tmpdir.path()).expect("must succeed");

    let metadata = fs::metadata(tmpdir.path().join("1kx5x4")).expect("must succeed");
    assert!(metadata.is_dir());
    assert_eq!(0o555, metadata.mode() & 0o777);

    let metadata = fs::metadata(tmpdir.path().join("1kx5x4/2/3")).expect("must succeed");
    assert!(metadata.is_file());
    assert!(metadata.permissions().readonly());
    assert_eq!(1024, metadata.len());

    // 1kx5x4/2/4 stats fine, only opening it fails.
    assert!(fs::metadata(tmpdir.path().join("1kx5x4/2/4")).is_ok());

    for p in ["5x0x3", "x5x4", "1kx", "0x5x4x"] {
        let err = fs::metadata(tmpdir.path().join(p)).expect_err("must fail");
        assert_eq!(std::io::ErrorKind::NotFound, err.kind(), "{p}");
    }

    // the kernel refuses to look up children of a file by itself.
    fs::metadata(tmpdir.path().join("1kx5x4/2/3/0")).expect_err("must fail");

    fuse_daemon.unmount().expect("unmount");
}

/// Ensure listing a layer returns the numbered children
#[test]
fn readdir() {
    if !fuse_available() {
        return;
    }
    let tmpdir = TempDir::new().unwrap();
    let fuse_daemon = do_mount(tmpdir.path()).expect("must succeed");

    let mut names: Vec<String> = fs::read_dir(tmpdir.path().join("1kx5x4/2"))
        .expect("must succeed")
        .map(|e| {
            let e = e.expect("must succeed");
            assert!(e.file_type().expect("must succeed").is_file());
            e.file_name().into_string().expect("must be utf-8")
        })
        .collect();
    names.sort();

    assert_eq!(vec!["0", "1", "2", "3"], names);

    // a layer larger than a single readdir buffer
    let count = fs::read_dir(tmpdir.path().join("1x5000"))
        .expect("must succeed")
        .count();
    assert_eq!(5000, count);

    fuse_daemon.unmount().expect("unmount");
}

/// Ensure reading a file returns the generated contents
#[test]
fn read() {
    if !fuse_available() {
        return;
    }
    let tmpdir = TempDir::new().unwrap();
    let fuse_daemon = do_mount(tmpdir.path()).expect("must succeed");

    let p = tmpdir.path().join("1kx5x4/2/3");
    let data = fs::read(&p).expect("must succeed");

    assert_eq!(1024, data.len());
    assert_eq!(b"hovcjqxelszgnubipwdkryfmtahovcj\n", &data[..32]);
    assert_eq!(Some(&b'\n'), data.last());

    // seek into the middle and read a bit
    {
        let mut f = fs::File::open(&p).expect("must succeed");
        f.seek(std::io::SeekFrom::Start(500)).expect("must seek");
        let mut buf = [0u8; 100];
        f.read_exact(&mut buf).expect("must read");
        assert_eq!(&data[500..600], &buf[..]);
    }

    fuse_daemon.unmount().expect("unmount");
}

/// Ensure files can't be opened for writing, and invalid leaves can't be opened
#[test]
fn open_errors() {
    if !fuse_available() {
        return;
    }
    let tmpdir = TempDir::new().unwrap();
    let fuse_daemon = do_mount(tmpdir.path()).expect("must succeed");

    let p = tmpdir.path().join("1kx5x4/2/3");
    for options in [
        fs::OpenOptions::new().write(true).clone(),
        fs::OpenOptions::new().read(true).write(true).clone(),
        fs::OpenOptions::new().append(true).clone(),
    ] {
        let err = options.open(&p).expect_err("must fail");
        assert_eq!(std::io::ErrorKind::PermissionDenied, err.kind());
    }

    let err = fs::File::open(tmpdir.path().join("1kx5x4/2/4")).expect_err("must fail");
    assert_eq!(std::io::ErrorKind::NotFound, err.kind());

    fuse_daemon.unmount().expect("unmount");
}

/// Ensure the tree has as many files and bytes as the descriptor says
#[test]
fn walk() {
    if !fuse_available() {
        return;
    }
    let tmpdir = TempDir::new().unwrap();
    let fuse_daemon = do_mount(tmpdir.path()).expect("must succeed");

    fn walk(p: &Path, files: &mut u64, bytes: &mut u64) {
        for e in fs::read_dir(p).expect("must list") {
            let e = e.expect("must succeed");
            let metadata = e.metadata().expect("must stat");
            if metadata.is_dir() {
                walk(&e.path(), files, bytes);
            } else {
                *files += 1;
                *bytes += metadata.len();
            }
        }
    }

    let (mut files, mut bytes) = (0, 0);
    walk(&tmpdir.path().join("1kx10x10x10"), &mut files, &mut bytes);

    assert_eq!(1000, files);
    assert_eq!(1_024_000, bytes);

    fuse_daemon.unmount().expect("unmount");
}

/// Ensure unmounting doesn't wait for files which are still open
#[test]
fn unmount_with_open_file() {
    if !fuse_available() {
        return;
    }
    let tmpdir = TempDir::new().unwrap();
    let fuse_daemon = do_mount(tmpdir.path()).expect("must succeed");

    let mut f = fs::File::open(tmpdir.path().join("1kx5x4/2/3")).expect("must succeed");
    let mut buf = [0u8; 32];
    f.read_exact(&mut buf).expect("must read");

    fuse_daemon.unmount().expect("unmount");
    drop(f);
}
