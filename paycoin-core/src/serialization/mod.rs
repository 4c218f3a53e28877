//! Wire-level encoding helpers shared by every message type.

pub mod reader;
pub mod varint;

pub use reader::ByteReader;
pub use varint::{
    decode_varint, encode_varint, var_bytes_size, varint_size, write_var_bytes, write_varint,
};
