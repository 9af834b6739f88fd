//! Format decoders: file on disk → [`RawData`].
//!
//! Each format is one [`FormatDecoder`] registered under its file
//! extensions.  Supporting a new format means registering another decoder;
//! the dispatch itself never changes.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use crate::data::model::RawData;
use crate::error::{Result, SceneError};

pub mod envi;
pub mod matlab;
pub mod npy;
pub mod raster;
pub mod table;

/// Decodes one file format into raw in-memory arrays.
pub trait FormatDecoder: Send + Sync {
    /// Human-readable format name, used in log lines.
    fn name(&self) -> &'static str;

    /// Lower-case file extensions (without the dot) this decoder handles.
    fn extensions(&self) -> &'static [&'static str];

    fn decode(&self, path: &Path) -> Result<RawData>;
}

// ---------------------------------------------------------------------------
// Registry: extension → decoder
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct DecoderRegistry {
    by_extension: BTreeMap<String, Arc<dyn FormatDecoder>>,
}

static BUILTIN: LazyLock<DecoderRegistry> = LazyLock::new(DecoderRegistry::with_builtin);

impl DecoderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every decoder shipped with the crate.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(matlab::MatDecoder));
        registry.register(Arc::new(raster::TiffDecoder));
        registry.register(Arc::new(raster::PngDecoder));
        registry.register(Arc::new(envi::EnviDecoder));
        registry.register(Arc::new(npy::NpyDecoder));
        registry.register(Arc::new(npy::NpzDecoder));
        registry.register(Arc::new(table::ParquetDecoder));
        registry
    }

    /// The shared built-in registry.
    pub fn builtin() -> &'static DecoderRegistry {
        &BUILTIN
    }

    /// Register `decoder` for all of its extensions, replacing any decoder
    /// previously registered for them.
    pub fn register(&mut self, decoder: Arc<dyn FormatDecoder>) {
        for ext in decoder.extensions() {
            self.by_extension
                .insert(ext.to_ascii_lowercase(), Arc::clone(&decoder));
        }
    }

    /// Decoder responsible for `path`, chosen by its extension.
    pub fn decoder_for(&self, path: &Path) -> Result<&Arc<dyn FormatDecoder>> {
        let ext = extension_of(path);
        self.by_extension.get(&ext).ok_or_else(|| {
            SceneError::UnsupportedFormat(if ext.is_empty() {
                format!("{} has no file extension", path.display())
            } else {
                format!(".{ext}")
            })
        })
    }

    /// Decode `path` with the matching decoder.
    pub fn decode(&self, path: &Path) -> Result<RawData> {
        let decoder = self.decoder_for(path)?;
        log::debug!("decoding {} as {}", path.display(), decoder.name());
        let raw = decoder.decode(path)?;
        for (name, array) in &raw.arrays {
            log::debug!("  {name}: shape {:?}", array.shape());
        }
        Ok(raw)
    }

    /// Registered extensions, sorted.
    pub fn extensions(&self) -> Vec<&str> {
        self.by_extension.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("extensions", &self.extensions())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Raw numeric payloads shared by the binary formats
// ---------------------------------------------------------------------------

/// Element type of a raw numeric buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumKind {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl NumKind {
    pub fn size(self) -> usize {
        match self {
            NumKind::I8 | NumKind::U8 => 1,
            NumKind::I16 | NumKind::U16 => 2,
            NumKind::I32 | NumKind::U32 | NumKind::F32 => 4,
            NumKind::I64 | NumKind::U64 | NumKind::F64 => 8,
        }
    }
}

macro_rules! decode_as {
    ($ty:ty, $bytes:expr, $big:expr) => {{
        const N: usize = std::mem::size_of::<$ty>();
        $bytes
            .chunks_exact(N)
            .map(|chunk| {
                let mut buf = [0u8; N];
                buf.copy_from_slice(chunk);
                let v = if $big {
                    <$ty>::from_be_bytes(buf)
                } else {
                    <$ty>::from_le_bytes(buf)
                };
                v as f64
            })
            .collect::<Vec<f64>>()
    }};
}

/// Interpret `bytes` as a packed sequence of `kind` values.
pub(crate) fn decode_numbers(kind: NumKind, bytes: &[u8], big_endian: bool) -> Result<Vec<f64>> {
    if bytes.len() % kind.size() != 0 {
        return Err(SceneError::corrupt(format!(
            "{} bytes is not a whole number of {kind:?} values",
            bytes.len()
        )));
    }
    Ok(match kind {
        NumKind::I8 => decode_as!(i8, bytes, big_endian),
        NumKind::U8 => decode_as!(u8, bytes, big_endian),
        NumKind::I16 => decode_as!(i16, bytes, big_endian),
        NumKind::U16 => decode_as!(u16, bytes, big_endian),
        NumKind::I32 => decode_as!(i32, bytes, big_endian),
        NumKind::U32 => decode_as!(u32, bytes, big_endian),
        NumKind::I64 => decode_as!(i64, bytes, big_endian),
        NumKind::U64 => decode_as!(u64, bytes, big_endian),
        NumKind::F32 => decode_as!(f32, bytes, big_endian),
        NumKind::F64 => decode_as!(f64, bytes, big_endian),
    })
}

/// Lower-case extension of `path`, or `""`.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// Open a file, mapping failures to [`SceneError::Io`].
pub(crate) fn open(path: &Path) -> Result<std::fs::File> {
    std::fs::File::open(path).map_err(|e| SceneError::io(path, e))
}
