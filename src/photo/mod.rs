//! Reading photos: discovery on disk, EXIF metadata and content hashes.

pub mod discovery;
pub mod hashing;
pub mod metadata;

pub use discovery::discover_photos;
pub use hashing::content_hash;
pub use metadata::{read_metadata, PhotoMetadata};
