//! In-memory static asset cache.
//!
//! Files under the asset root are read once, compressed ahead of time into
//! gzip and brotli variants, and stored with a validator derived from their
//! modification time, size, and name. The store is shared between request
//! handlers (readers) and the watch worker (writer).

mod compression;
mod entry;
mod error;
mod fingerprint;
mod lock;
mod scanner;
mod store;

pub use compression::{NO_COMPRESSION_EXTENSIONS, Variants, compress, is_compressible};
pub use entry::CachedEntry;
pub use error::{BuildError, CodecError, IngestError, ScanError};
pub use fingerprint::{digit_sum, fingerprint};
pub use scanner::{matches_extension, scan};
pub use store::CacheStore;
