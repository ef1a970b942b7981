//! Parsing of root descriptors, the names of the top-level directories
//! below the mountpoint.
//!
//! A root descriptor encodes the size of every file in the virtual tree and
//! the number of children at each layer, e.g. `1kx5x4` describes a tree of
//! 5 directories with 4 files each, every file being 1024 bytes long.
use std::str::FromStr;
use thiserror::Error;

/// Separates the size token and the width tokens in a root descriptor.
pub const LAYER_DELIMITER: char = 'x';

/// The maximum number of layers a tree can have. Width tokens past this
/// are ignored.
pub const MAX_LAYERS: usize = 16;

/// The maximum number of children per layer.
pub const MAX_WIDTH: u32 = 1_000_000;

/// The largest file size we can report, bounded by the host's `off_t`.
pub const MAX_FILE_SIZE: u64 = i64::MAX as u64;

/// Unit suffixes accepted after the file size numeral, with their multiplier.
const UNITS: [(char, u64); 6] = [
    ('k', 1 << 10),
    ('K', 1 << 10),
    ('m', 1 << 20),
    ('M', 1 << 20),
    ('g', 1 << 30),
    ('G', 1 << 30),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("missing file size")]
    MissingSize,

    #[error("invalid file size: {0:?}")]
    InvalidSize(String),

    #[error("file size {0:?} exceeds {MAX_FILE_SIZE} bytes")]
    SizeTooLarge(String),

    #[error("invalid width {width:?} at layer {layer}")]
    InvalidWidth { layer: usize, width: String },
}

/// The parsed form of a root descriptor.
///
/// It is reconstructed from the path on every request and never stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RootDescriptor {
    file_size: u64,
    widths: Vec<u32>,
}

impl RootDescriptor {
    /// The size of every file in the tree.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Number of children at each layer, outermost first.
    pub fn widths(&self) -> &[u32] {
        &self.widths
    }

    /// The number of layers. Paths with this many selectors name files.
    pub fn depth(&self) -> usize {
        self.widths.len()
    }

    /// Returns the width of the given layer, if the tree has that many.
    pub fn width(&self, layer: usize) -> Option<u32> {
        self.widths.get(layer).copied()
    }

    /// The width of the innermost layer, the one holding the files.
    pub fn leaf_width(&self) -> Option<u32> {
        self.widths.last().copied()
    }

    /// The number of files in the whole tree, if it fits into a u64.
    pub fn file_count(&self) -> Option<u64> {
        self.widths
            .iter()
            .try_fold(1u64, |acc, w| acc.checked_mul(u64::from(*w)))
    }

    /// The sum of all file sizes in the tree, if it fits into a u64.
    pub fn total_size(&self) -> Option<u64> {
        self.file_count()?.checked_mul(self.file_size)
    }
}

impl FromStr for RootDescriptor {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = s.split(LAYER_DELIMITER);

        let file_size = match tokens.next() {
            None | Some("") => return Err(DescriptorError::MissingSize),
            Some(token) => parse_size(token)?,
        };

        let widths = tokens
            .take(MAX_LAYERS)
            .enumerate()
            .map(|(layer, token)| match parse_decimal(token) {
                Some(w) if (1..=u64::from(MAX_WIDTH)).contains(&w) => Ok(w as u32),
                _ => Err(DescriptorError::InvalidWidth {
                    layer,
                    width: token.to_string(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { file_size, widths })
    }
}

/// Parses a file size token, which is a decimal numeral followed by an
/// optional unit suffix.
fn parse_size(token: &str) -> Result<u64, DescriptorError> {
    let (numeral, multiplier) = token
        .chars()
        .last()
        .and_then(|suffix| UNITS.iter().find(|(unit, _)| *unit == suffix))
        .map(|(_, multiplier)| (&token[..token.len() - 1], *multiplier))
        .unwrap_or((token, 1));

    let value =
        parse_decimal(numeral).ok_or_else(|| DescriptorError::InvalidSize(token.to_string()))?;

    value
        .checked_mul(multiplier)
        .filter(|size| *size <= MAX_FILE_SIZE)
        .ok_or_else(|| DescriptorError::SizeTooLarge(token.to_string()))
}

/// Parses a non-empty string of ASCII digits.
/// Signs, whitespace and values not fitting into a u64 are rejected.
pub(crate) fn parse_decimal(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
