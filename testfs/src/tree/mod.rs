//! The filesystem operations, answered purely from the requested path.
//!
//! Every call tokenizes the path, parses the root descriptor from the first
//! segment and classifies the remaining segments against it. Nothing is
//! kept between calls, so all of these are safe to call concurrently.
use std::cmp::Ordering;

use crate::{
    content::Generator,
    descriptor::RootDescriptor,
    path::{canonical, parse_selector, tokenize},
    Error,
};


/// Attributes of a virtual node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Attributes {
    Directory,
    File { size: u64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

/// A single entry emitted by [readdir].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

/// A path, split up, with its root descriptor parsed.
struct Resolved<'a> {
    path: &'a str,
    descriptor: RootDescriptor,
    tokens: Vec<&'a str>,
}

impl<'a> Resolved<'a> {
    fn new(path: &'a str) -> Result<Self, Error> {
        let tokens = tokenize(path);

        // The mount root itself isn't a valid node.
        let Some(root) = tokens.first() else {
            return Err(Error::NotFound(format!("{path}: mount root")));
        };

        Ok(Self {
            path,
            descriptor: root.parse()?,
            tokens,
        })
    }

    /// The segments after the root descriptor.
    fn selectors(&self) -> &[&'a str] {
        &self.tokens[1..]
    }

    /// Classifies the node, or returns None if the path is too deep.
    fn kind(&self) -> Option<EntryKind> {
        match self.selectors().len().cmp(&self.descriptor.depth()) {
            Ordering::Less => Some(EntryKind::Directory),
            Ordering::Equal => Some(EntryKind::File),
            Ordering::Greater => None,
        }
    }

    fn too_deep(&self) -> Error {
        Error::NotFound(format!(
            "{}: too deep for {} layers",
            self.path,
            self.descriptor.depth()
        ))
    }

    /// Ensures the path names an existing file, which requires the final
    /// selector to be within the width of the innermost layer.
    fn ensure_file(&self) -> Result<(), Error> {
        match self.kind() {
            Some(EntryKind::File) => {}
            Some(EntryKind::Directory) => {
                return Err(Error::NotFound(format!("{}: not a file", self.path)))
            }
            None => return Err(self.too_deep()),
        }

        // A tree without layers consists of the root segment only, which
        // then is the file.
        let (Some(leaf), Some(width)) = (self.selectors().last(), self.descriptor.leaf_width())
        else {
            return Ok(());
        };

        match parse_selector(leaf) {
            Some(idx) if idx < u64::from(width) => Ok(()),
            _ => Err(Error::NotFound(format!(
                "{}: {leaf:?} is not in 0..{width}",
                self.path
            ))),
        }
    }
}

/// Rejects any access mode other than read-only.
fn ensure_read_only(path: &str, flags: u32) -> Result<(), Error> {
    let flags = flags as libc::c_int;
    if flags & libc::O_ACCMODE != libc::O_RDONLY || flags & libc::O_APPEND != 0 {
        return Err(Error::PermissionDenied(format!(
            "{path}: flags {flags:#o} are not read-only"
        )));
    }
    Ok(())
}

/// Returns the attributes of the node at path.
pub fn getattr(path: &str) -> Result<Attributes, Error> {
    let resolved = Resolved::new(path)?;

    match resolved.kind() {
        Some(EntryKind::Directory) => Ok(Attributes::Directory),
        Some(EntryKind::File) => Ok(Attributes::File {
            size: resolved.descriptor.file_size(),
        }),
        None => Err(resolved.too_deep()),
    }
}

/// The entries of a virtual directory, produced lazily by [readdir].
///
/// Yields `.` and `..`, followed by one entry per child, named by its index.
/// Skipping ahead is constant time, as layers can have up to a million
/// children and listings get resumed at an offset.
#[derive(Clone, Debug)]
pub struct Entries {
    pos: u64,
    width: u64,
    kind: EntryKind,
}

impl Iterator for Entries {
    type Item = DirEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = match self.pos {
            0 | 1 => DirEntry {
                name: if self.pos == 0 { "." } else { ".." }.to_string(),
                kind: EntryKind::Directory,
            },
            pos if pos < self.width + 2 => DirEntry {
                name: (pos - 2).to_string(),
                kind: self.kind,
            },
            _ => return None,
        };
        self.pos += 1;
        Some(entry)
    }

    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        self.pos = self.pos.saturating_add(n as u64).min(self.width + 2);
        self.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.width + 2).saturating_sub(self.pos) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Entries {}

/// Lists the directory at path.
pub fn readdir(path: &str) -> Result<Entries, Error> {
    let resolved = Resolved::new(path)?;

    let layer = resolved.selectors().len();
    let width = match (resolved.kind(), resolved.descriptor.width(layer)) {
        (Some(EntryKind::Directory), Some(width)) => width,
        (Some(_), _) => return Err(Error::NotFound(format!("{path}: not a directory"))),
        (None, _) => return Err(resolved.too_deep()),
    };

    let kind = if layer + 1 < resolved.descriptor.depth() {
        EntryKind::Directory
    } else {
        EntryKind::File
    };

    Ok(Entries {
        pos: 0,
        width: u64::from(width),
        kind,
    })
}

/// Checks whether the file at path may be opened with the given flags.
pub fn open(path: &str, flags: u32) -> Result<(), Error> {
    let resolved = Resolved::new(path)?;
    resolved.ensure_file()?;
    ensure_read_only(path, flags)
}

/// Reads from the file at path, starting at offset, into buf.
///
/// Validation is the same as in [open], as no state is kept from opening.
/// Returns the number of bytes written to buf, which is less than its length
/// when reaching the end of the file, and zero at or past the end.
pub fn read(path: &str, flags: u32, offset: u64, buf: &mut [u8]) -> Result<usize, Error> {
    let resolved = Resolved::new(path)?;
    resolved.ensure_file()?;
    ensure_read_only(path, flags)?;

    let file_size = resolved.descriptor.file_size();
    let remaining = file_size.saturating_sub(offset);
    let len = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));
    if len == 0 {
        return Ok(0);
    }

    Generator::new(&canonical(&resolved.tokens), file_size).fill(offset, &mut buf[..len]);

    Ok(len)
}
