//! Greyhound wire formats

pub mod info;
pub mod codec;

pub use info::ResourceInfo;
pub use codec::{decode_read_response, encode_read_response, record_size, schema_json};
