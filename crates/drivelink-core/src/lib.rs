//! # drivelink – Core
//!
//! Network-free building blocks shared by the Drive client:
//!
//! - **Resource change tracking** – a field map plus a clean snapshot, used to
//!   compute the minimal patch body for an update
//! - **Prefix editing** – in-place, block-wise insertion and removal of a
//!   leading byte sequence (e.g. a UTF-8 BOM) on any seekable buffer

pub mod error;
pub mod prefix;
pub mod resource;

pub use error::{ResourceError, ResourceResult};
pub use prefix::{insert_prefix, remove_prefix, Truncate, BLOCK_SIZE, UTF8_BOM};
pub use resource::{ApiResource, Content, MetadataFetch};
