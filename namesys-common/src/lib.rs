#![doc = include_str!("../README.md")]
//!

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![cfg_attr(any(), deny(clippy::unwrap_used))]

pub mod codec;
pub mod crypto;
pub mod key_book;
pub mod multihash;
pub mod path;
pub mod peer_id;
pub mod record;
pub mod selector;
pub mod timestamp;
pub mod validator;

pub use key_book::KeyBook;
pub use multihash::{HashCode, Multihash};
pub use path::Path;
pub use peer_id::{record_keys_for_id, IdFormat, PeerId};
pub use record::{Record, ValidityType};
pub use validator::{
    IpnsValidator, NamespacedValidator, PublicKeyValidator, ValidationError, Validator,
};
