//! Graphite plaintext protocol: encoding and delivery.

pub mod client;
pub mod encoder;

pub use client::{ClientOptions, GraphiteClient};
pub use encoder::{encode, encode_payload};
