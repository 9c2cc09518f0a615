//! Column family definitions for RocksDB.
//!
//! Each column family isolates data with different access patterns:
//! - documents: Document metadata plus the filename uniqueness index
//! - contents: PDF binaries (large, rarely rewritten)
//! - annotations: Annotation blobs (small, rewritten on every viewer save)
//! - fragments: Extracted text fragments plus the per-document index
//! - changelog: Local mutation log consumed by sync (append + prefix delete)
//! - stamps: Per-document field stamps for last-writer-wins merging
//! - checkpoints: Log head, replica id and sync acknowledgement

use rocksdb::{ColumnFamilyDescriptor, Options};

/// Column family name for document metadata
pub const CF_DOCUMENTS: &str = "documents";

/// Column family name for PDF binaries
pub const CF_CONTENTS: &str = "contents";

/// Column family name for annotation blobs
pub const CF_ANNOTATIONS: &str = "annotations";

/// Column family name for text fragments
pub const CF_FRAGMENTS: &str = "fragments";

/// Column family name for the local change log
pub const CF_CHANGELOG: &str = "changelog";

/// Column family name for field stamps
pub const CF_STAMPS: &str = "stamps";

/// Column family name for checkpoints
pub const CF_CHECKPOINTS: &str = "checkpoints";

/// All column family names
pub const ALL_CF_NAMES: &[&str] = &[
    CF_DOCUMENTS,
    CF_CONTENTS,
    CF_ANNOTATIONS,
    CF_FRAGMENTS,
    CF_CHANGELOG,
    CF_STAMPS,
    CF_CHECKPOINTS,
];

/// Create column family options for blobs (compressed)
fn blob_options() -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
    opts
}

/// Build all column family descriptors
pub fn build_cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
    vec![
        ColumnFamilyDescriptor::new(CF_DOCUMENTS, Options::default()),
        ColumnFamilyDescriptor::new(CF_CONTENTS, blob_options()),
        ColumnFamilyDescriptor::new(CF_ANNOTATIONS, blob_options()),
        ColumnFamilyDescriptor::new(CF_FRAGMENTS, Options::default()),
        ColumnFamilyDescriptor::new(CF_CHANGELOG, Options::default()),
        ColumnFamilyDescriptor::new(CF_STAMPS, Options::default()),
        ColumnFamilyDescriptor::new(CF_CHECKPOINTS, Options::default()),
    ]
}
