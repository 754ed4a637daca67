#![doc = include_str!("../README.md")]
//!

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![cfg_attr(any(), deny(clippy::unwrap_used))]

mod testnet;

pub use testnet::{Testnet, DEFAULT_REPLICAS};

// Re-export the core crates
pub use namesys;
pub use namesys_common;
