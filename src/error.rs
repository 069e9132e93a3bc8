/// Custom Result type for stgene operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the stgene library, encompassing all possible error cases
/// that can occur while building, encoding, decoding or exporting a dataset.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    /// Errors related to binary file header processing
    HeaderError(#[from] HeaderError),
    /// Errors that occur while decoding a dataset
    ReadError(#[from] ReadError),
    /// Errors that occur while encoding or exporting a dataset
    WriteError(#[from] WriteError),
    /// A coordinate referenced by hit data could not be resolved
    LookupError(#[from] LookupError),
    /// Invalid use of the in-memory model
    ModelError(#[from] ModelError),
    /// Unknown or unsupported serialization format
    FormatError(#[from] FormatError),
    /// Standard I/O errors from the Rust standard library
    IoError(#[from] std::io::Error),
    /// UTF-8 encoding/decoding errors
    Utf8Error(#[from] std::str::Utf8Error),
    /// Errors from the JSON backend
    JsonError(#[from] serde_json::Error),
    /// Generic errors that can occur in any part of the system
    AnyhowError(#[from] anyhow::Error),
}

/// Errors specific to processing and validating binary file headers
#[derive(thiserror::Error, Debug)]
pub enum HeaderError {
    /// The magic number in the header does not match the expected value
    ///
    /// # Arguments
    /// * `u32` - The invalid magic number that was found
    #[error("Invalid magic number: {0}")]
    InvalidMagicNumber(u32),

    /// The format version in the header is not supported
    ///
    /// # Arguments
    /// * `u8` - The unsupported version number that was found
    #[error("Invalid format version: {0}")]
    InvalidFormatVersion(u8),

    /// The reserved bytes in the header contain unexpected values
    #[error("Invalid reserved bytes")]
    InvalidReservedBytes,

    /// The size of the data does not match what was specified in the header
    ///
    /// # Arguments
    /// * First `usize` - The actual number of bytes provided
    /// * Second `usize` - The expected number of bytes according to the header
    #[error("Invalid number of bytes provided: {0}. Expected: {1}")]
    InvalidSize(usize, usize),
}

/// Errors that can occur while decoding a dataset
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    /// The file being read is not a regular file (e.g., it might be a directory or special file)
    #[error("File is not regular")]
    IncompatibleFile,

    /// The message ended before a field could be read
    ///
    /// # Arguments
    /// * `usize` - The byte position where the truncation was detected
    #[error("Message is truncated at byte pos {0}")]
    Truncated(usize),

    /// The (decompressed) message exceeds the configured traversal limit
    ///
    /// # Fields
    /// * `words` - Size of the message in 8-byte words
    /// * `limit` - The configured traversal limit in 8-byte words
    #[error("Message of {words} words exceeds the traversal limit of {limit} words")]
    TraversalLimitExceeded { words: u64, limit: u64 },

    /// The x-coordinate and hit arrays of a line have different lengths
    ///
    /// # Fields
    /// * `gene` - Index of the gene holding the line
    /// * `line` - Index of the line within the gene
    #[error("Line {line} of gene {gene} has {xcoords} x-coordinates but {hits} hit counts")]
    ParallelLengthMismatch {
        gene: usize,
        line: usize,
        xcoords: usize,
        hits: usize,
    },

    /// The gene section does not match the number of gene names
    #[error("Found {genes} gene records for {names} gene names")]
    GeneCountMismatch { names: usize, genes: usize },

    /// A gene offset points outside of the gene section
    #[error("Offset of gene {0} is out of bounds")]
    InvalidGeneOffset(usize),

    /// Bytes remain after the last gene record
    #[error("Found {0} trailing bytes after the last gene record")]
    TrailingBytes(usize),

    /// The same gene name occurs twice in the name list
    #[error("Gene name {0:?} is listed more than once")]
    DuplicateGeneName(String),

    /// A record assigns a different barcode to an already recorded coordinate
    #[error("Coordinate ({x}, {y}) has barcode {existing:?} but a record claims {found:?}")]
    BarcodeConflict {
        x: u32,
        y: u32,
        existing: String,
        found: String,
    },

    /// Attempted to access a gene index that is beyond the available range
    ///
    /// # Arguments
    /// * First `usize` - The requested gene index
    /// * Second `usize` - The number of genes available
    #[error("Requested gene index ({0}) is out of gene range ({1})")]
    OutOfRange(usize, usize),
}

/// Errors that can occur while encoding or exporting a dataset
#[derive(thiserror::Error, Debug)]
pub enum WriteError {
    /// A coordinate does not fit the 16-bit wire width
    #[error("Coordinate ({x}, {y}) does not fit into {bits} bits")]
    CoordOverflow { x: u32, y: u32, bits: u32 },

    /// A hit count does not fit the 32-bit wire width
    #[error("Hit count {hits} at ({x}, {y}) does not fit into {bits} bits")]
    HitsOverflow { x: u32, y: u32, hits: u64, bits: u32 },

    /// A list is too long for its 32-bit length prefix
    #[error("List of {0} elements is too long to encode")]
    ListTooLong(usize),

    /// A coordinate lies outside of the sanity bound of the JSON exporter
    #[error("Coordinate ({x}, {y}) is outside of [0, {limit})")]
    CoordOutOfBounds { x: u32, y: u32, limit: u32 },
}

/// Errors raised when hit data references something that does not exist
#[derive(thiserror::Error, Debug)]
pub enum LookupError {
    /// A gene references a coordinate that has no recorded barcode
    #[error("No barcode recorded at coordinate ({x}, {y})")]
    MissingBarcode { x: u32, y: u32 },
}

/// Errors raised by the in-memory model
#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    /// A gene id that was never registered
    ///
    /// # Arguments
    /// * First `usize` - The requested gene id
    /// * Second `usize` - The number of registered genes
    #[error("Gene id {0} is not registered ({1} genes)")]
    UnknownGene(usize, usize),
}

/// Errors raised when selecting a serialization format
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    /// The format name is not recognized
    #[error("Format {0:?} is not supported")]
    UnsupportedFormat(String),

    /// The path extension does not map to a format
    #[error("Unable to infer a format from path: {0}")]
    UnsupportedExtension(String),
}
