// Canonical encoding
//
// Block digests and transaction signatures are both computed over this
// encoding, never over a generic serializer's output. Keys are emitted in a
// fixed order with no whitespace, strings are JSON-escaped UTF-8 and amounts
// use their fixed-precision decimal form.

use std::fmt::Write;

/// Version tag written into every block encoding
pub const ENCODING_VERSION: u32 = 1;

/// Types with a single byte-stable encoding
pub trait CanonicalEncode {
    /// Appends the canonical encoding of `self` to `out`
    fn encode_canonical(&self, out: &mut String);

    /// Returns the canonical encoding as bytes
    fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        self.encode_canonical(&mut out);
        out.into_bytes()
    }
}

/// Incremental writer for one canonical object
pub(crate) struct ObjectWriter<'a> {
    out: &'a mut String,
    first: bool,
}

impl<'a> ObjectWriter<'a> {
    pub(crate) fn new(out: &'a mut String) -> Self {
        out.push('{');
        ObjectWriter { out, first: true }
    }

    fn key(&mut self, key: &str) {
        if !self.first {
            self.out.push(',');
        }
        self.first = false;
        write_string(self.out, key);
        self.out.push(':');
    }

    pub(crate) fn string(&mut self, key: &str, value: &str) -> &mut Self {
        self.key(key);
        write_string(self.out, value);
        self
    }

    pub(crate) fn number<N: std::fmt::Display>(&mut self, key: &str, value: N) -> &mut Self {
        self.key(key);
        // Writing to a String cannot fail
        let _ = write!(self.out, "{}", value);
        self
    }

    pub(crate) fn array<T: CanonicalEncode>(&mut self, key: &str, items: &[T]) -> &mut Self {
        self.key(key);
        self.out.push('[');
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.out.push(',');
            }
            item.encode_canonical(self.out);
        }
        self.out.push(']');
        self
    }

    pub(crate) fn finish(&mut self) {
        self.out.push('}');
    }
}

fn write_string(out: &mut String, value: &str) {
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
