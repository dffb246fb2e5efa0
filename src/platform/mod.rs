//! Watch-page extraction, signature deciphering and stream selection

pub mod catalog;
pub mod cipher;
pub mod client;
pub mod decipher;
pub mod formats;
pub mod locator;
pub mod sandbox;

pub use catalog::*;
pub use cipher::*;
pub use client::*;
pub use decipher::*;
pub use formats::*;
pub use locator::*;
pub use sandbox::*;
