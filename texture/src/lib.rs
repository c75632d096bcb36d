#![warn(clippy::pedantic)]
#![allow(
    clippy::cast_lossless,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cache;
pub mod codec;
mod config;
pub mod decode;
pub mod dump;
pub mod hash;
pub mod image;
mod replacer;
pub mod toggles;

pub use cache::{BindingKey, ReplacementCache, ReplacementId, ReplacementImage, Signature};
pub use config::ReplacementConfig;
pub use replacer::TextureReplacer;
