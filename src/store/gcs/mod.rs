//! Google Cloud Storage后端

mod config;
mod driver;

pub use config::GcsConfig;
pub use driver::GcsStore;
