//! JSON body encoding.
//!
//! Bodies use `", "` between elements and `": "` after keys, so an order
//! encodes as `{"orderId": "ORD-123", "items": ["Laptop", "Mouse"]}`.
//! Consumers of the queue already parse this exact shape.

use std::io;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::ser::Formatter;

use crate::error::{PublishError, Result};

/// Compact JSON with a single space after separators.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

/// Encode a payload as a UTF-8 JSON message body.
pub fn encode<T: Serialize + ?Sized>(payload: &T) -> Result<String> {
    let mut buf = Vec::with_capacity(128);
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    payload.serialize(&mut serializer)?;

    String::from_utf8(buf).map_err(|e| PublishError::Serialization(e.to_string()))
}

/// Decode a message body produced by [`encode`].
pub fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
    Ok(serde_json::from_str(body)?)
}
