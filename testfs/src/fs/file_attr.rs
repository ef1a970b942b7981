#![allow(clippy::unnecessary_cast)] // libc::S_IFDIR is u32 on Linux and u16 on MacOS

use fuse_backend_rs::abi::fuse_abi::Attr;

use crate::tree::Attributes;

/// for given [Attributes] and inode, construct an [Attr]
pub fn gen_file_attr(attributes: &Attributes, inode: u64) -> Attr {
    match attributes {
        Attributes::Directory => Attr {
            ino: inode,
            blksize: 1024,
            mode: libc::S_IFDIR as u32 | 0o555,
            nlink: 2,
            ..Default::default()
        },
        Attributes::File { size } => Attr {
            ino: inode,
            size: *size,
            blksize: 1024,
            // st_blocks is counted in 512 byte units.
            blocks: size.div_ceil(512),
            mode: libc::S_IFREG as u32 | 0o444,
            nlink: 1,
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::gen_file_attr;
    use crate::tree::Attributes;

    #[test]
    fn directory() {
        let attr = gen_file_attr(&Attributes::Directory, 42);

        assert_eq!(42, attr.ino);
        assert_eq!(libc::S_IFDIR as u32 | 0o555, attr.mode);
        assert_eq!(2, attr.nlink);
    }

    #[test]
    fn file() {
        let attr = gen_file_attr(&Attributes::File { size: 1025 }, 7);

        assert_eq!(7, attr.ino);
        assert_eq!(1025, attr.size);
        assert_eq!(3, attr.blocks);
        assert_eq!(libc::S_IFREG as u32 | 0o444, attr.mode);
        assert_eq!(1, attr.nlink);
    }
}
