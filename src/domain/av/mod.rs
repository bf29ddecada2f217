//! External media tool components: probe, encode, package.

pub mod cmd;
pub mod encoder;
pub mod manifest;
pub mod probe;

pub use cmd::{ProcessRunner, ToolRunner};
pub use encoder::Encoder;
pub use manifest::ManifestBuilder;
pub use probe::MediaProbe;
