pub mod client;
pub mod voice;

pub use client::*;
pub use voice::{HttpTokenFetcher, TokenFetcher};
