//! Uniform facade over object-storage backends (S3-compatible and GCS):
//! bucket/object CRUD, file streaming, plus JSON and CSV/dataframe
//! convenience helpers layered on the raw byte primitives.

pub mod config;
pub mod error;
pub mod store;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use store::factory::{init_object_store, resolve_protocol, Protocol};
pub use store::gcs::{GcsConfig, GcsStore};
pub use store::s3::{S3Config, S3Store};
pub use store::{ByteStream, NotFoundPolicy, ObjectStore};
