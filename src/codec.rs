//! Format selection and codec dispatch
//!
//! [`FeatureCodec`] is the common interface of the serialization backends.
//! [`Format`] picks a backend by name or by file extension and dispatches to
//! it with default settings; the concrete codecs expose the settings.

use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use std::sync::mpsc;
use std::thread;

use auto_impl::auto_impl;
use tracing::{debug, instrument};

use crate::error::{FormatError, Result};
use crate::gbin::{GeneReaderBuilder, GeneWriterBuilder, DEFAULT_COMPRESSION_LEVEL};
use crate::json::{self, JsonWriterBuilder, DEFAULT_COORD_LIMIT};
use crate::model::Everything;
use crate::utils::write_file;

/// A serialization backend for complete datasets
#[auto_impl(&, Box, Arc)]
pub trait FeatureCodec {
    /// Encodes a dataset into `out`
    ///
    /// Implementations validate the dataset before writing anything to `out`.
    fn encode(&self, everything: &Everything, out: &mut dyn Write) -> Result<()>;

    /// Decodes a complete dataset
    fn decode(&self, bytes: &[u8]) -> Result<Everything>;

    /// Decodes a dataset from a file
    fn read_path(&self, path: &Path) -> Result<Everything> {
        let bytes = std::fs::read(path)?;
        self.decode(&bytes)
    }

    /// Encodes a dataset into a file
    ///
    /// The file is created only after the dataset has been fully encoded.
    fn write_path(&self, path: &Path, everything: &Everything) -> Result<()> {
        let mut bytes = Vec::new();
        self.encode(everything, &mut bytes)?;
        write_file(path, &bytes)
    }
}

/// Codec for the binary gene format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryCodec {
    /// Write the body as a zstd frame
    pub compress: bool,
    /// zstd compression level
    pub level: i32,
    /// Worker threads for compression and decoding (0 uses all cores)
    pub threads: usize,
    /// Decoder traversal limit in 8-byte words
    pub traversal_limit: u64,
}
impl Default for BinaryCodec {
    fn default() -> Self {
        Self {
            compress: false,
            level: DEFAULT_COMPRESSION_LEVEL,
            threads: 1,
            traversal_limit: crate::gbin::DEFAULT_TRAVERSAL_LIMIT_WORDS,
        }
    }
}
impl BinaryCodec {
    #[must_use]
    pub fn compressed() -> Self {
        Self {
            compress: true,
            ..Self::default()
        }
    }

    fn writer_builder(&self) -> GeneWriterBuilder {
        GeneWriterBuilder::default()
            .compress(self.compress)
            .level(self.level)
            .threads(self.threads)
    }

    fn reader_builder(&self) -> GeneReaderBuilder {
        GeneReaderBuilder::default().traversal_limit(self.traversal_limit)
    }
}
impl FeatureCodec for BinaryCodec {
    fn encode(&self, everything: &Everything, out: &mut dyn Write) -> Result<()> {
        let mut writer = self.writer_builder().build(out);
        writer.write_everything(everything)?;
        writer.flush()
    }

    fn decode(&self, bytes: &[u8]) -> Result<Everything> {
        let reader = self.reader_builder().build(bytes)?;
        if self.threads == 1 {
            reader.decode()
        } else {
            reader.decode_parallel(self.threads)
        }
    }

    fn read_path(&self, path: &Path) -> Result<Everything> {
        let file = self.reader_builder().open(path)?;
        let reader = file.reader()?;
        if self.threads == 1 {
            reader.decode()
        } else {
            reader.decode_parallel(self.threads)
        }
    }
}

/// Codec for the JSON export format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonCodec {
    /// Exclusive upper bound for exported coordinates
    pub coord_limit: u32,
}
impl Default for JsonCodec {
    fn default() -> Self {
        Self {
            coord_limit: DEFAULT_COORD_LIMIT,
        }
    }
}
impl FeatureCodec for JsonCodec {
    fn encode(&self, everything: &Everything, out: &mut dyn Write) -> Result<()> {
        let mut writer = JsonWriterBuilder::default()
            .coord_limit(self.coord_limit)
            .build(out);
        writer.write_everything(everything)?;
        writer.flush()
    }

    fn decode(&self, bytes: &[u8]) -> Result<Everything> {
        json::parse(bytes)
    }
}

/// Supported serialization formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Binary gene format with a raw body
    Binary,
    /// Binary gene format with a zstd-compressed body
    CompressedBinary,
    /// JSON export format
    Json,
}
impl Format {
    pub const ALL: [Format; 3] = [Format::Binary, Format::CompressedBinary, Format::Json];

    /// Name accepted by [`Format::from_str`]
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::CompressedBinary => "binary-zstd",
            Self::Json => "json",
        }
    }

    /// File extension used for this format
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Binary => "stg",
            Self::CompressedBinary => "stgz",
            Self::Json => "json",
        }
    }

    /// Infers the format from a path extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let extension = path.extension().and_then(|ext| ext.to_str());
        Self::ALL
            .into_iter()
            .find(|format| Some(format.extension()) == extension)
            .ok_or_else(|| FormatError::UnsupportedExtension(path.display().to_string()).into())
    }

    /// The backend with default settings
    #[must_use]
    pub fn codec(self) -> Box<dyn FeatureCodec + Send + Sync> {
        match self {
            Self::Binary => Box::new(BinaryCodec::default()),
            Self::CompressedBinary => Box::new(BinaryCodec::compressed()),
            Self::Json => Box::new(JsonCodec::default()),
        }
    }
}
impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
impl FromStr for Format {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| FormatError::UnsupportedFormat(s.to_string()).into())
    }
}
impl FeatureCodec for Format {
    fn encode(&self, everything: &Everything, out: &mut dyn Write) -> Result<()> {
        self.codec().encode(everything, out)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Everything> {
        self.codec().decode(bytes)
    }

    fn read_path(&self, path: &Path) -> Result<Everything> {
        self.codec().read_path(path)
    }
}

/// Decodes the file at `path` with the given codec
#[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
pub fn read_path<C: FeatureCodec, P: AsRef<Path>>(codec: C, path: P) -> Result<Everything> {
    let everything = codec.read_path(path.as_ref())?;
    debug!(genes = everything.num_genes(), hits = everything.num_hits(), "decoded file");
    Ok(everything)
}

/// Encodes a dataset into the file at `path` with the given codec
#[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
pub fn write_path<C: FeatureCodec, P: AsRef<Path>>(
    codec: C,
    path: P,
    everything: &Everything,
) -> Result<()> {
    codec.write_path(path.as_ref(), everything)
}

/// A decode running on a worker thread
///
/// The result is delivered exactly once through [`PendingDecode::wait`].
pub struct PendingDecode {
    receiver: mpsc::Receiver<Result<Everything>>,
}
impl PendingDecode {
    /// Blocks until the decode has finished
    pub fn wait(self) -> Result<Everything> {
        self.receiver
            .recv()
            .unwrap_or_else(|_| Err(anyhow::anyhow!("decode worker exited without a result").into()))
    }

    /// Returns the result if the decode has already finished
    pub fn try_wait(&self) -> Option<Result<Everything>> {
        self.receiver.try_recv().ok()
    }
}

/// Decodes `bytes` on a worker thread
///
/// The decode runs as one unit; nothing is observable until it completes.
pub fn spawn_decode<C>(codec: C, bytes: Vec<u8>) -> PendingDecode
where
    C: FeatureCodec + Send + 'static,
{
    let (sender, receiver) = mpsc::sync_channel(1);
    thread::spawn(move || {
        let result = codec.decode(&bytes);
        // the receiver may have been dropped, in which case nobody is waiting
        let _ = sender.send(result);
    });
    PendingDecode { receiver }
}
