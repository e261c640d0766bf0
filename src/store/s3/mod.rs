//! S3兼容对象存储后端（AWS S3 / MinIO / OSS / COS）

mod config;
mod driver;

pub use config::S3Config;
pub use driver::S3Store;
