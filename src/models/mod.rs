pub mod chain;
pub mod common;
pub mod image;
pub mod mint;
pub mod pin;

pub use chain::*;
pub use common::*;
pub use image::*;
pub use mint::*;
pub use pin::*;
