use std::io;
use thiserror::Error;

use crate::descriptor::DescriptorError;

/// Errors produced by the filesystem operation handlers.
///
/// There are only two kinds: either a path doesn't resolve to a virtual
/// node, or a file node was requested with a non-read-only access mode.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),
}

impl From<DescriptorError> for Error {
    fn from(value: DescriptorError) -> Self {
        Error::NotFound(value.to_string())
    }
}

impl From<Error> for io::Error {
    fn from(value: Error) -> Self {
        match value {
            Error::NotFound(_) => io::Error::from_raw_os_error(libc::ENOENT),
            Error::PermissionDenied(_) => io::Error::from_raw_os_error(libc::EACCES),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Error;
    use std::io;

    #[test]
    fn into_io_error() {
        let e: io::Error = Error::NotFound("/".into()).into();
        assert_eq!(io::ErrorKind::NotFound, e.kind());

        let e: io::Error = Error::PermissionDenied("/1x1/0".into()).into();
        assert_eq!(io::ErrorKind::PermissionDenied, e.kind());
    }
}
