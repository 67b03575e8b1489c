//! Buffer cursor for the tag/length/value gateway event encoding.
//!
//! All reads are bounds-checked and return `Option`; a truncated or
//! corrupt buffer stops the caller's decode loop early instead of
//! panicking. Unknown fields are skipped by wire type in one place
//! ([`WireCursor::skip`]), so forward-compatible additions to the
//! gateway schema never break parsing.

/// Wire type: varint.
pub const WT_VARINT: u8 = 0;
/// Wire type: 8-byte fixed.
pub const WT_FIXED64: u8 = 1;
/// Wire type: length-delimited.
pub const WT_LEN: u8 = 2;
/// Wire type: 4-byte fixed.
pub const WT_FIXED32: u8 = 5;

/// Longest legal varint: 64 bits at 7 data bits per byte.
const MAX_VARINT_BYTES: usize = 10;

/// A forward-only cursor over an encoded message buffer.
#[derive(Debug)]
pub struct WireCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// True once the whole buffer has been consumed.
    pub fn is_done(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Read a variable-length unsigned integer (7 data bits per byte,
    /// continuation via the high bit).
    pub fn read_varint(&mut self) -> Option<u64> {
        let mut value: u64 = 0;
        for i in 0..MAX_VARINT_BYTES {
            let byte = *self.buf.get(self.pos)?;
            self.pos += 1;
            value |= u64::from(byte & 0x7F) << (7 * i);
            if byte & 0x80 == 0 {
                return Some(value);
            }
        }
        // Continuation bit still set after 10 bytes: corrupt.
        None
    }

    /// Read a field tag, returning (field number, wire type).
    ///
    /// `None` at a clean buffer end or on a corrupt tag; callers treat
    /// both as end-of-message.
    pub fn read_tag(&mut self) -> Option<(u32, u8)> {
        if self.is_done() {
            return None;
        }
        let key = self.read_varint()?;
        let field = (key >> 3) as u32;
        let wire_type = (key & 0x07) as u8;
        if field == 0 {
            return None;
        }
        Some((field, wire_type))
    }

    /// Read a length-delimited field and return the enclosed bytes.
    pub fn read_length_delimited(&mut self) -> Option<&'a [u8]> {
        let len = self.read_varint()?;
        let len = usize::try_from(len).ok()?;
        let end = self.pos.checked_add(len)?;
        if end > self.buf.len() {
            return None;
        }
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Some(bytes)
    }

    pub fn read_fixed32(&mut self) -> Option<u32> {
        let end = self.pos.checked_add(4)?;
        if end > self.buf.len() {
            return None;
        }
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.buf[self.pos..end]);
        self.pos = end;
        Some(u32::from_le_bytes(raw))
    }

    pub fn read_fixed64(&mut self) -> Option<u64> {
        let end = self.pos.checked_add(8)?;
        if end > self.buf.len() {
            return None;
        }
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.buf[self.pos..end]);
        self.pos = end;
        Some(u64::from_le_bytes(raw))
    }

    /// Read a 32-bit float stored as fixed32.
    pub fn read_float(&mut self) -> Option<f32> {
        self.read_fixed32().map(f32::from_bits)
    }

    /// Read a signed 32-bit integer stored as a widened 64-bit varint.
    ///
    /// Negative values are encoded as full two's-complement 64-bit
    /// varints; the value is truncated to its low 32 bits and
    /// reinterpreted as signed.
    pub fn read_int32(&mut self) -> Option<i32> {
        self.read_varint().map(|v| v as u32 as i32)
    }

    /// Skip a field of the given wire type. Returns false when the
    /// field cannot be skipped (truncated buffer or unsupported wire
    /// type), which ends the caller's decode loop.
    pub fn skip(&mut self, wire_type: u8) -> bool {
        match wire_type {
            WT_VARINT => self.read_varint().is_some(),
            WT_FIXED64 => self.read_fixed64().is_some(),
            WT_LEN => self.read_length_delimited().is_some(),
            WT_FIXED32 => self.read_fixed32().is_some(),
            // Group wire types and anything newer are unsupported;
            // there is no length to skip by.
            _ => false,
        }
    }
}

/// Append a varint to an output buffer. Used by tests and fixtures.
pub fn put_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
}

/// Append a field tag to an output buffer.
pub fn put_tag(out: &mut Vec<u8>, field: u32, wire_type: u8) {
    put_varint(out, (u64::from(field) << 3) | u64::from(wire_type));
}

/// Append a length-delimited field to an output buffer.
pub fn put_bytes(out: &mut Vec<u8>, field: u32, bytes: &[u8]) {
    put_tag(out, field, WT_LEN);
    put_varint(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_roundtrip() {
        for value in [0u64, 1, 127, 128, 300, 0xFFFF_FFFF, u64::MAX] {
            let mut buf = Vec::new();
            put_varint(&mut buf, value);
            let mut cur = WireCursor::new(&buf);
            assert_eq!(cur.read_varint(), Some(value));
            assert!(cur.is_done());
        }
    }

    #[test]
    fn varint_truncated() {
        // Continuation bit set but buffer ends.
        let mut cur = WireCursor::new(&[0x80]);
        assert_eq!(cur.read_varint(), None);
    }

    #[test]
    fn varint_overlong() {
        // Eleven continuation bytes: corrupt, not a hang.
        let buf = [0x80u8; 12];
        let mut cur = WireCursor::new(&buf);
        assert_eq!(cur.read_varint(), None);
    }

    #[test]
    fn widened_negative_int32() {
        // -120 encoded as a 64-bit two's-complement varint.
        let mut buf = Vec::new();
        put_varint(&mut buf, -120i64 as u64);
        assert_eq!(buf.len(), 10);
        let mut cur = WireCursor::new(&buf);
        assert_eq!(cur.read_int32(), Some(-120));
    }

    #[test]
    fn length_delimited_bounds() {
        let mut buf = Vec::new();
        put_bytes(&mut buf, 1, b"abc");
        let mut cur = WireCursor::new(&buf);
        let (field, wt) = cur.read_tag().unwrap();
        assert_eq!((field, wt), (1, WT_LEN));
        assert_eq!(cur.read_length_delimited(), Some(&b"abc"[..]));

        // Claimed length past the buffer end.
        let mut cur = WireCursor::new(&[0x0A, 0x05, b'a', b'b']);
        cur.read_tag().unwrap();
        assert_eq!(cur.read_length_delimited(), None);
    }

    #[test]
    fn skip_by_wire_type() {
        let mut buf = Vec::new();
        put_tag(&mut buf, 9, WT_VARINT);
        put_varint(&mut buf, 300);
        put_tag(&mut buf, 10, WT_FIXED32);
        buf.extend_from_slice(&1.5f32.to_bits().to_le_bytes());
        put_bytes(&mut buf, 11, b"nested");
        put_tag(&mut buf, 12, WT_FIXED64);
        buf.extend_from_slice(&7u64.to_le_bytes());

        let mut cur = WireCursor::new(&buf);
        while let Some((_, wt)) = cur.read_tag() {
            assert!(cur.skip(wt));
        }
        assert!(cur.is_done());
    }

    #[test]
    fn fixed_reads() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(-42.5f32).to_bits().to_le_bytes());
        buf.extend_from_slice(&0xDEAD_BEEF_CAFE_F00Du64.to_le_bytes());
        let mut cur = WireCursor::new(&buf);
        assert_eq!(cur.read_float(), Some(-42.5));
        assert_eq!(cur.read_fixed64(), Some(0xDEAD_BEEF_CAFE_F00D));
        assert_eq!(cur.read_fixed32(), None);
    }
}
