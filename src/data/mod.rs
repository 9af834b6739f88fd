/// Data layer: canonical scene types, dataset registry, decoding and loading.
///
/// Architecture:
/// ```text
///  .mat / .tif / .png / .hdr / .npy / .npz / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │ decoder   │  file → RawData (named f64 arrays)
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ transform  │  transpose / crop / embed / label shift
///   └───────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  registry entry → validated Scene + metadata
///   └──────────┘
/// ```
pub mod decoder;
pub mod loader;
pub mod model;
pub mod registry;
pub mod spectrum_file;
pub mod transform;
