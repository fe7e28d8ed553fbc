//! Haetae Data
//!
//! Turns raw multi-label hate-speech corpora into the canonical
//! binary-labeled dataset and splits it into reproducible stratified
//! train/validation/test partitions.

pub mod corpus;
pub mod normalize;
pub mod partition;

pub use corpus::{
    build_canonical, read_canonical_csv, read_raw_tsv, write_canonical_csv, IngestReport,
    MalformedLabelPolicy,
};
pub use normalize::{normalize, normalize_field, NO_CATEGORY_CODE};
pub use partition::{partition, PartitionedDataset};
