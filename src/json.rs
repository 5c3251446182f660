//! Raw JSON document writer used by the request builders.
//!
//! Custom aggregators and groupers carry caller-supplied JSON fragments that
//! are spliced into the request text as-is, so request documents are written
//! as text here rather than through a `serde_json::Value` tree.

use serde::Serialize;

use crate::error::Result;

/// Incrementally written JSON object. Keys are emitted in insertion order.
#[derive(Debug)]
pub(crate) struct JsonObject {
    buf: String,
    empty: bool,
}

impl JsonObject {
    pub(crate) fn new() -> Self {
        Self {
            buf: String::from("{"),
            empty: true,
        }
    }

    fn key(&mut self, key: &str) -> Result<()> {
        if !self.empty {
            self.buf.push(',');
        }
        self.empty = false;
        self.buf.push_str(&serde_json::to_string(key)?);
        self.buf.push(':');
        Ok(())
    }

    /// Write `key` with a serde-serialized value.
    pub(crate) fn field<T: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &T,
    ) -> Result<&mut Self> {
        self.key(key)?;
        self.buf.push_str(&serde_json::to_string(value)?);
        Ok(self)
    }

    /// Write `key` followed by already-encoded JSON text.
    pub(crate) fn raw_field(&mut self, key: &str, raw: &str) -> Result<&mut Self> {
        self.key(key)?;
        self.buf.push_str(raw);
        Ok(self)
    }

    pub(crate) fn finish(mut self) -> String {
        self.buf.push('}');
        self.buf
    }
}

/// Join already-encoded JSON elements into an array.
pub(crate) fn raw_array<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut buf = String::from("[");
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            buf.push(',');
        }
        buf.push_str(item.as_ref());
    }
    buf.push(']');
    buf
}
