//! Built-in transforms.

mod elm;
mod text;

pub use elm::ElmTransform;
pub use text::{JsonTransform, RawTransform};
