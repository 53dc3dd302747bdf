pub mod builder;
pub mod exif_meta;
pub mod handle;
pub mod manifest;
pub mod metadata;
pub mod schedule;
pub mod sun;
pub mod writer;
pub mod xmp;
