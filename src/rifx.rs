//! RIFX tagged-chunk container reader (C1).
//!
//! Decodes the generic big-endian tagged-chunk container that wraps an AEP document:
//! a 4-byte magic, a big-endian 32-bit total length, a 4-byte form type, followed by a
//! stream of `type | size(BE) | payload | pad-to-2` blocks. `LIST`-style blocks wrap an
//! identifier FourCC plus nested blocks. Unknown block types are preserved verbatim so
//! the AEP parser (C2) can skip them without losing information.

use std::fmt;
use std::io::{Cursor, Read};

use binrw::BinRead;

use crate::error::{CrateError, RifxError};

/// Four-character ASCII tag identifying a chunk type or list identifier.
#[derive(BinRead, Clone, Copy, PartialEq, Eq, Hash)]
#[br(big)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const fn new(tag: &[u8; 4]) -> Self {
        FourCC(*tag)
    }

    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) if s.chars().all(|c| c.is_ascii_graphic() || c == ' ') => {
                write!(f, "FourCC({s:?})")
            }
            _ => write!(f, "FourCC({:02x?})", self.0),
        }
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) if s.chars().all(|c| c.is_ascii_graphic() || c == ' ') => write!(f, "{s}"),
            _ => write!(f, "{:02x?}", self.0),
        }
    }
}

/// The outer container header: `RIFX | size(BE) | form_type`.
#[derive(BinRead, Debug, Clone, PartialEq, Eq)]
#[br(big)]
pub struct RifxHeader {
    pub magic: FourCC,
    pub size: u32,
    pub form_type: FourCC,
}

/// A single block's fixed-layout header: `type | size(BE)`.
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq)]
#[br(big)]
struct BlockHeader {
    kind: FourCC,
    size: u32,
}

const LIST_TAG: FourCC = FourCC::new(b"LIST");

/// One node of the decoded RIFX tree.
#[derive(Debug, Clone)]
pub struct Node {
    /// The block's four-character type tag (`LIST`, `idta`, `cdta`, ... or the root `RIFX`).
    pub kind: FourCC,
    pub payload: Payload,
}

/// A node's payload: either a nested list (with its own identifier FourCC) or opaque bytes.
#[derive(Debug, Clone)]
pub enum Payload {
    List {
        identifier: FourCC,
        children: Vec<Node>,
    },
    Leaf(Vec<u8>),
}

impl Node {
    pub fn children(&self) -> &[Node] {
        match &self.payload {
            Payload::List { children, .. } => children,
            Payload::Leaf(_) => &[],
        }
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.payload {
            Payload::Leaf(bytes) => Some(bytes),
            Payload::List { .. } => None,
        }
    }

    pub fn identifier(&self) -> Option<FourCC> {
        match &self.payload {
            Payload::List { identifier, .. } => Some(*identifier),
            Payload::Leaf(_) => None,
        }
    }
}

/// Decode a full RIFX stream into a tree rooted at the outer `RIFX` container.
///
/// The root node's `kind` is the container magic (always `RIFX`) and its payload is a
/// `List` whose identifier is the form type (`Egg!` for AEP) and whose children are the
/// top-level blocks.
pub fn decode(bytes: &[u8]) -> Result<Node, CrateError> {
    let mut cursor = Cursor::new(bytes);
    let header = RifxHeader::read(&mut cursor).map_err(|_| {
        CrateError::Rifx(RifxError::MalformedHeader(
            "stream shorter than the 12-byte RIFX header".to_string(),
        ))
    })?;

    if header.magic.as_str() != Some("RIFX") {
        return Err(CrateError::Rifx(RifxError::MalformedHeader(format!(
            "expected magic 'RIFX', found {}",
            header.magic
        ))));
    }

    // `size` covers everything after itself: the 4-byte form type plus the body.
    let body_start = cursor.position();
    let declared_end = body_start
        .checked_add(header.size as u64)
        .and_then(|v| v.checked_sub(4))
        .ok_or_else(|| {
            CrateError::Rifx(RifxError::SizeOverflow {
                size: header.size as u64,
                remaining: bytes.len() as u64 - body_start,
            })
        })?;
    let stream_end = bytes.len() as u64;
    let end = declared_end.min(stream_end);

    let children = parse_blocks(bytes, &mut cursor, end)?;

    Ok(Node {
        kind: header.magic,
        payload: Payload::List {
            identifier: header.form_type,
            children,
        },
    })
}

/// Parse a run of sibling blocks from `cursor`'s current position up to `end`.
fn parse_blocks(
    bytes: &[u8],
    cursor: &mut Cursor<&[u8]>,
    end: u64,
) -> Result<Vec<Node>, CrateError> {
    let mut nodes = Vec::new();

    while cursor.position() < end {
        let remaining_before_header = end.saturating_sub(cursor.position());
        if remaining_before_header < 8 {
            return Err(CrateError::Rifx(RifxError::Truncated {
                expected: 8,
                found: remaining_before_header,
            }));
        }

        let header = BlockHeader::read(cursor).map_err(|_| {
            CrateError::Rifx(RifxError::Truncated {
                expected: 8,
                found: remaining_before_header,
            })
        })?;

        let payload_start = cursor.position();
        let remaining_in_scope = end.saturating_sub(payload_start);
        if header.size as u64 > remaining_in_scope {
            // still tolerate if the overall stream has the bytes (size may be
            // slightly generous for alignment); otherwise it's a hard overflow.
            let remaining_in_stream = (bytes.len() as u64).saturating_sub(payload_start);
            if header.size as u64 > remaining_in_stream {
                return Err(CrateError::Rifx(RifxError::SizeOverflow {
                    size: header.size as u64,
                    remaining: remaining_in_stream,
                }));
            }
        }

        let payload_end = payload_start + header.size as u64;
        if payload_end > bytes.len() as u64 {
            return Err(CrateError::Rifx(RifxError::Truncated {
                expected: header.size as u64,
                found: (bytes.len() as u64).saturating_sub(payload_start),
            }));
        }

        let node = if header.kind == LIST_TAG {
            if header.size < 4 {
                return Err(CrateError::Rifx(RifxError::Truncated {
                    expected: 4,
                    found: header.size as u64,
                }));
            }
            let identifier = FourCC::read(cursor).map_err(|_| {
                CrateError::Rifx(RifxError::Truncated {
                    expected: 4,
                    found: header.size as u64,
                })
            })?;
            let children = parse_blocks(bytes, cursor, payload_end)?;
            Node {
                kind: header.kind,
                payload: Payload::List {
                    identifier,
                    children,
                },
            }
        } else {
            let payload = bytes[payload_start as usize..payload_end as usize].to_vec();
            cursor.set_position(payload_end);
            Node {
                kind: header.kind,
                payload: Payload::Leaf(payload),
            }
        };

        nodes.push(node);

        // 2-byte alignment padding, consumed but never exposed.
        if (header.size % 2) == 1 && cursor.position() < bytes.len() as u64 {
            let mut pad = [0u8; 1];
            let _ = cursor.read_exact(&mut pad);
        }
    }

    Ok(nodes)
}

/// Find the first descendant block of the given type in document order
/// (direct children only, earliest occurrence wins).
pub fn find_by_type<'a>(node: &'a Node, fourcc: &[u8; 4]) -> Option<&'a Node> {
    node.children().iter().find(|child| child.kind.0 == *fourcc)
}

/// Find the first direct child `LIST` block with the given identifier.
pub fn sublist_find<'a>(node: &'a Node, identifier: &[u8; 4]) -> Option<&'a Node> {
    node.children().iter().find(|child| {
        matches!(&child.payload, Payload::List { identifier: id, .. } if id.0 == *identifier)
    })
}

/// Concatenate the children of every direct `LIST` block with the given identifier,
/// in document order.
pub fn sublist_merge(node: &Node, identifier: &[u8; 4]) -> Vec<Node> {
    let mut merged = Vec::new();
    for child in node.children() {
        if let Payload::List {
            identifier: id,
            children,
        } = &child.payload
        {
            if id.0 == *identifier {
                merged.extend(children.iter().cloned());
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(kind);
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload);
        if payload.len() % 2 == 1 {
            out.push(0);
        }
        out
    }

    fn list(identifier: &[u8; 4], children: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(identifier);
        body.extend_from_slice(children);
        block(b"LIST", &body)
    }

    fn rifx(form_type: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFX");
        out.extend_from_slice(&((body.len() as u32) + 4).to_be_bytes());
        out.extend_from_slice(form_type);
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn decodes_minimal_file() {
        let utf8 = block(b"Utf8", b"root");
        let idta = block(b"idta", &[0u8; 8]);
        let mut top = Vec::new();
        top.extend_from_slice(&idta);
        top.extend_from_slice(&utf8);
        let bytes = rifx(b"Egg!", &top);

        let tree = decode(&bytes).unwrap();
        assert_eq!(tree.kind.as_str(), Some("RIFX"));
        assert_eq!(tree.identifier().unwrap().as_str(), Some("Egg!"));
        assert_eq!(tree.children().len(), 2);
        assert_eq!(tree.children()[0].kind.as_str(), Some("idta"));
        assert_eq!(tree.children()[1].bytes().unwrap(), b"root");
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = rifx(b"Egg!", &[]);
        bytes[0] = b'X';
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, CrateError::Rifx(RifxError::MalformedHeader(_))));
    }

    #[test]
    fn detects_truncation() {
        let mut bytes = rifx(b"Egg!", &block(b"idta", &[0u8; 8]));
        bytes.truncate(bytes.len() - 4);
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, CrateError::Rifx(RifxError::Truncated { .. })));
    }

    #[test]
    fn preserves_unknown_chunks() {
        let unknown = block(b"XXXX", &[1, 2, 3, 4]);
        let cdta = block(b"cdta", &[9, 9]);
        let mut top = Vec::new();
        top.extend_from_slice(&unknown);
        top.extend_from_slice(&cdta);
        let bytes = rifx(b"Egg!", &top);

        let tree = decode(&bytes).unwrap();
        assert_eq!(tree.children().len(), 2);
        assert_eq!(tree.children()[0].kind.as_str(), Some("XXXX"));
        let found = find_by_type(&tree, b"cdta").unwrap();
        assert_eq!(found.bytes().unwrap(), &[9, 9]);
    }

    #[test]
    fn nested_list_round_trips() {
        let inner = block(b"ldta", &[1, 2, 3]);
        let layr = list(b"Layr", &inner);
        let bytes = rifx(b"Egg!", &layr);

        let tree = decode(&bytes).unwrap();
        let layrs = sublist_find(&tree, b"Layr").unwrap();
        assert_eq!(layrs.children().len(), 1);
        assert_eq!(layrs.children()[0].kind.as_str(), Some("ldta"));
    }

    #[test]
    fn sublist_merge_concatenates_in_order() {
        let a = list(b"Layr", &block(b"ldta", &[1]));
        let b = list(b"Layr", &block(b"ldta", &[2]));
        let mut top = Vec::new();
        top.extend_from_slice(&a);
        top.extend_from_slice(&b);
        let bytes = rifx(b"Egg!", &top);

        let tree = decode(&bytes).unwrap();
        let merged = sublist_merge(&tree, b"Layr");
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].bytes().unwrap(), &[1]);
        assert_eq!(merged[1].bytes().unwrap(), &[2]);
    }

    #[test]
    fn parsing_is_deterministic() {
        let bytes = rifx(b"Egg!", &block(b"idta", &[0u8; 8]));
        let a = decode(&bytes).unwrap();
        let b = decode(&bytes).unwrap();
        assert_eq!(format!("{a:?}"), format!("{b:?}"));
    }
}
