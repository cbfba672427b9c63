//! BER decoding and DER encoding of tagged value trees.
//!
//! Only the structural layer is implemented: identifiers, lengths and
//! nesting. Primitive contents are kept as raw octets; interpreting them is
//! left to the caller.
//!
//! Decoding accepts:
//! - Low and high tag numbers
//! - Short, long and indefinite lengths (indefinite only on constructed values)
//!
//! Encoding always produces definite, minimal lengths.

use bytes::Bytes;
use tracing::trace;

use crate::error::BerError;

/// Maximum nesting depth accepted by [`decode`].
pub const MAX_DEPTH: usize = 64;

/// Universal tag numbers used by the replication control.
pub mod tags {
    pub const END_OF_CONTENTS: u32 = 0;
    pub const OCTET_STRING: u32 = 4;
    pub const SEQUENCE: u32 = 16;
    pub const SET: u32 = 17;
}

/// Tag class (the two high bits of the identifier octet).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TagClass {
    Universal,
    Application,
    ContextSpecific,
    Private,
}

impl TagClass {
    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => TagClass::Universal,
            1 => TagClass::Application,
            2 => TagClass::ContextSpecific,
            _ => TagClass::Private,
        }
    }

    fn to_bits(self) -> u8 {
        match self {
            TagClass::Universal => 0,
            TagClass::Application => 1,
            TagClass::ContextSpecific => 2,
            TagClass::Private => 3,
        }
    }
}

/// One node of a decoded BER value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BerNode {
    pub class: TagClass,
    pub constructed: bool,
    pub tag: u32,
    /// Contents octets of a primitive node; empty for constructed nodes.
    pub value: Bytes,
    /// Children of a constructed node; empty for primitive nodes.
    pub children: Vec<BerNode>,
}

impl BerNode {
    pub fn primitive(class: TagClass, tag: u32, value: impl Into<Bytes>) -> Self {
        Self {
            class,
            constructed: false,
            tag,
            value: value.into(),
            children: Vec::new(),
        }
    }

    pub fn constructed(class: TagClass, tag: u32, children: Vec<BerNode>) -> Self {
        Self {
            class,
            constructed: true,
            tag,
            value: Bytes::new(),
            children,
        }
    }

    pub fn octet_string(value: impl Into<Bytes>) -> Self {
        Self::primitive(TagClass::Universal, tags::OCTET_STRING, value)
    }

    pub fn sequence(children: Vec<BerNode>) -> Self {
        Self::constructed(TagClass::Universal, tags::SEQUENCE, children)
    }

    pub fn set(children: Vec<BerNode>) -> Self {
        Self::constructed(TagClass::Universal, tags::SET, children)
    }

    /// True for a universal node with the given tag and form.
    pub fn is_universal(&self, tag: u32, constructed: bool) -> bool {
        self.class == TagClass::Universal && self.tag == tag && self.constructed == constructed
    }
}

/// Decode the first value in `bytes`.
///
/// Bytes after the first complete value are ignored.
pub fn decode(bytes: &[u8]) -> Result<BerNode, BerError> {
    if bytes.is_empty() {
        return Err(BerError::Empty);
    }

    let mut reader = Reader { buf: bytes, pos: 0 };
    let node = reader.read_node(0)?;

    if reader.pos < bytes.len() {
        trace!(
            trailing = bytes.len() - reader.pos,
            "ignoring bytes after first BER value"
        );
    }
    Ok(node)
}

/// Cursor over the input buffer.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn byte(&mut self) -> Result<u8, BerError> {
        let b = *self.buf.get(self.pos).ok_or(BerError::Truncated {
            offset: self.pos,
            needed: 1,
        })?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], BerError> {
        let available = self.buf.len() - self.pos;
        if len > available {
            return Err(BerError::Truncated {
                offset: self.pos,
                needed: len - available,
            });
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn at_end_of_contents(&self) -> bool {
        self.buf.get(self.pos..self.pos + 2) == Some(&[0, 0][..])
    }

    /// Read an identifier: (class, constructed, tag number).
    fn read_identifier(&mut self) -> Result<(TagClass, bool, u32), BerError> {
        let start = self.pos;
        let first = self.byte()?;
        let class = TagClass::from_bits(first >> 6);
        let constructed = first & 0x20 != 0;
        let mut tag = u32::from(first & 0x1f);

        // High tag number form: base-128 digits, high bit set on all but the last.
        if tag == 0x1f {
            tag = 0;
            loop {
                let b = self.byte()?;
                if tag > (u32::MAX >> 7) {
                    return Err(BerError::TagOverflow { offset: start });
                }
                tag = (tag << 7) | u32::from(b & 0x7f);
                if b & 0x80 == 0 {
                    break;
                }
            }
        }
        Ok((class, constructed, tag))
    }

    /// Read a length; `None` is the indefinite form.
    fn read_length(&mut self) -> Result<Option<usize>, BerError> {
        let start = self.pos;
        let first = self.byte()?;
        if first & 0x80 == 0 {
            return Ok(Some(usize::from(first)));
        }

        let count = usize::from(first & 0x7f);
        if count == 0 {
            return Ok(None);
        }
        if count > std::mem::size_of::<usize>() {
            return Err(BerError::LengthOverflow { offset: start });
        }

        let mut len: usize = 0;
        for _ in 0..count {
            len = len
                .checked_shl(8)
                .ok_or(BerError::LengthOverflow { offset: start })?
                | usize::from(self.byte()?);
        }
        Ok(Some(len))
    }

    fn read_node(&mut self, depth: usize) -> Result<BerNode, BerError> {
        if depth > MAX_DEPTH {
            return Err(BerError::TooDeep(MAX_DEPTH));
        }

        let start = self.pos;
        let (class, constructed, tag) = self.read_identifier()?;
        let length = self.read_length()?;

        if !constructed {
            let len = length.ok_or(BerError::IndefinitePrimitive { offset: start })?;
            let value = Bytes::copy_from_slice(self.take(len)?);
            return Ok(BerNode::primitive(class, tag, value));
        }

        let mut children = Vec::new();
        match length {
            Some(len) => {
                let available = self.buf.len() - self.pos;
                if len > available {
                    return Err(BerError::Truncated {
                        offset: self.pos,
                        needed: len - available,
                    });
                }
                let end = self.pos + len;
                while self.pos < end {
                    children.push(self.read_node(depth + 1)?);
                }
                if self.pos > end {
                    return Err(BerError::Overrun { end });
                }
            }
            None => loop {
                if self.at_end_of_contents() {
                    self.pos += 2;
                    break;
                }
                if self.pos >= self.buf.len() {
                    return Err(BerError::Unterminated { offset: start });
                }
                children.push(self.read_node(depth + 1)?);
            },
        }

        Ok(BerNode::constructed(class, tag, children))
    }
}

/// Encode a tree with definite lengths.
pub fn encode(node: &BerNode) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_to(&mut buf, node);
    buf
}

/// Recursively encode a node.
fn encode_to(buf: &mut Vec<u8>, node: &BerNode) {
    encode_identifier(buf, node.class, node.constructed, node.tag);

    if node.constructed {
        let mut contents = Vec::new();
        for child in &node.children {
            encode_to(&mut contents, child);
        }
        encode_length(buf, contents.len());
        buf.extend_from_slice(&contents);
    } else {
        encode_length(buf, node.value.len());
        buf.extend_from_slice(&node.value);
    }
}

fn encode_identifier(buf: &mut Vec<u8>, class: TagClass, constructed: bool, tag: u32) {
    let mut first = class.to_bits() << 6;
    if constructed {
        first |= 0x20;
    }

    if tag < 0x1f {
        buf.push(first | tag as u8);
        return;
    }

    buf.push(first | 0x1f);
    let mut digits = Vec::new();
    let mut n = tag;
    loop {
        digits.push((n & 0x7f) as u8);
        n >>= 7;
        if n == 0 {
            break;
        }
    }
    let last = digits.len() - 1;
    for (i, digit) in digits.iter().rev().enumerate() {
        buf.push(if i < last { digit | 0x80 } else { *digit });
    }
}

/// Encode a length in the shortest definite form.
fn encode_length(buf: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        buf.push(len as u8);
        return;
    }

    let be = len.to_be_bytes();
    let skip = be.iter().take_while(|b| **b == 0).count();
    let significant = &be[skip..];
    buf.push(0x80 | significant.len() as u8);
    buf.extend_from_slice(significant);
}
