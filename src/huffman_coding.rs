#![forbid(unsafe_code)]

use std::{convert::TryFrom, marker::PhantomData, sync::OnceLock};

use tracing::debug;

use crate::bit_reader::BitCursor;
use crate::error::{Error, Result};

////////////////////////////////////////////////////////////////////////////////

/// Order in which code length code lengths are transmitted (RFC 1951, 3.2.7).
pub const CL_CODE_ORDER: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

const NUM_CL_CODES: usize = 19;

/// Longest code DEFLATE can describe.
pub const MAX_CODE_LEN: u8 = 15;

pub fn decode_litlen_distance_trees(
    bit_reader: &mut BitCursor<'_>,
) -> Result<(HuffmanCoding<LitLenToken>, HuffmanCoding<DistanceToken>)> {
    // See RFC 1951, section 3.2.7.
    let hlit = bit_reader.next_bits(5)? as usize + 257;
    let hdist = bit_reader.next_bits(5)? as usize + 1;
    let hclen = bit_reader.next_bits(4)? as usize + 4;

    debug!(hlit, hdist, hclen, "dynamic Huffman block");

    let mut tct_code_lengths = [0_u8; NUM_CL_CODES];
    for &pos in CL_CODE_ORDER.iter().take(hclen) {
        tct_code_lengths[pos] = bit_reader.next_bits(3)? as u8;
    }

    let tct_decoder = HuffmanCoding::<TreeCodeToken>::from_lengths(&tct_code_lengths)?;

    // Literal/length and distance lengths form one sequence; runs may cross
    // from one into the other.
    let code_lengths = read_code_lengths(bit_reader, &tct_decoder, hlit + hdist)?;
    let (litlen_code_lengths, dist_code_lengths) = code_lengths.split_at(hlit);

    let litlen_decoder = HuffmanCoding::<LitLenToken>::from_lengths(litlen_code_lengths)?;
    let dist_decoder = HuffmanCoding::<DistanceToken>::from_lengths(dist_code_lengths)?;

    Ok((litlen_decoder, dist_decoder))
}

/// Decodes exactly `count` code lengths using the code length alphabet.
pub fn read_code_lengths(
    bit_reader: &mut BitCursor<'_>,
    tct_decoder: &HuffmanCoding<TreeCodeToken>,
    count: usize,
) -> Result<Vec<u8>> {
    let mut code_lengths = Vec::with_capacity(count);

    while code_lengths.len() < count {
        let (value, repeat) = match tct_decoder.read_symbol(bit_reader)? {
            TreeCodeToken::Length(l) => (l, 1),

            TreeCodeToken::CopyPrev => {
                let prev_len = *code_lengths.last().ok_or(Error::InvalidRunLength {
                    reason: "repeat of previous length before any length",
                    position: 0,
                })?;
                let extra = bit_reader.next_bits(2)? as usize;
                (prev_len, 3 + extra)
            }

            TreeCodeToken::RepeatZero { base, extra_bits } => {
                let extra = bit_reader.next_bits(extra_bits)? as usize;
                (0, base as usize + extra)
            }
        };

        if code_lengths.len() + repeat > count {
            return Err(Error::InvalidRunLength {
                reason: "run overflows the code length table",
                position: code_lengths.len(),
            });
        }

        code_lengths.resize(code_lengths.len() + repeat, value);
    }

    Ok(code_lengths)
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TreeCodeToken {
    Length(u8),
    CopyPrev,
    RepeatZero { base: u16, extra_bits: u8 },
}

impl TryFrom<HuffmanCodeWord> for TreeCodeToken {
    type Error = Error;

    fn try_from(value: HuffmanCodeWord) -> Result<Self> {
        // See RFC 1951, section 3.2.7.
        Ok(match value.0 {
            v @ 0..=15 => Self::Length(v as u8),
            16 => Self::CopyPrev,
            17 => Self::RepeatZero {
                base: 3,
                extra_bits: 3,
            },
            18 => Self::RepeatZero {
                base: 11,
                extra_bits: 7,
            },
            _ => {
                return Err(Error::InvalidRunLength {
                    reason: "code length symbol out of range",
                    position: 0,
                })
            }
        })
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LitLenToken {
    Literal(u8),
    EndOfBlock,
    Length { base: u16, extra_bits: u8 },
}

impl TryFrom<HuffmanCodeWord> for LitLenToken {
    type Error = Error;

    fn try_from(value: HuffmanCodeWord) -> Result<Self> {
        // See RFC 1951, section 3.2.5.
        let v = value.0;

        Ok(match v {
            0..=255 => Self::Literal(v as u8),
            256 => Self::EndOfBlock,
            257..=264 => Self::Length {
                base: 3 + (v - 257),
                extra_bits: 0,
            },
            265..=284 => {
                let extra_bits = ((v - 265) / 4 + 1) as u8;
                Self::Length {
                    base: 3 + (4_u16 << extra_bits) + (((v - 265) % 4) << extra_bits),
                    extra_bits,
                }
            }
            285 => Self::Length {
                base: 258,
                extra_bits: 0,
            },
            symbol => return Err(Error::CorruptLengthCode { symbol }),
        })
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DistanceToken {
    pub base: u16,
    pub extra_bits: u8,
}

impl TryFrom<HuffmanCodeWord> for DistanceToken {
    type Error = Error;

    fn try_from(value: HuffmanCodeWord) -> Result<Self> {
        // See RFC 1951, section 3.2.5.
        Ok(match value.0 {
            v @ 0..=3 => DistanceToken {
                base: 1 + v,
                extra_bits: 0,
            },
            v @ 4..=29 => {
                let extra_bits = (v / 2 - 1) as u8;
                DistanceToken {
                    base: 1 + (2_u16 << extra_bits) + ((v % 2) << extra_bits),
                    extra_bits,
                }
            }
            symbol => return Err(Error::InvalidDistanceCode { symbol }),
        })
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Fixed literal/length code lengths (RFC 1951, section 3.2.6).
pub fn fixed_litlen_lengths() -> [u8; 288] {
    let mut lengths = [0_u8; 288];
    lengths[0..=143].fill(8);
    lengths[144..=255].fill(9);
    lengths[256..=279].fill(7);
    lengths[280..=287].fill(8);
    lengths
}

pub const FIXED_DIST_LENGTHS: [u8; 32] = [5; 32];

pub struct FixedTrees {
    pub litlen: HuffmanCoding<LitLenToken>,
    pub dist: HuffmanCoding<DistanceToken>,
}

/// The fixed-code trees, built on first use and shared read-only afterwards.
pub fn fixed_trees() -> &'static FixedTrees {
    static TREES: OnceLock<FixedTrees> = OnceLock::new();
    TREES.get_or_init(|| FixedTrees {
        litlen: HuffmanCoding::from_lengths(&fixed_litlen_lengths())
            .expect("fixed literal/length lengths form a complete code"),
        dist: HuffmanCoding::from_lengths(&FIXED_DIST_LENGTHS)
            .expect("fixed distance lengths form a complete code"),
    })
}

////////////////////////////////////////////////////////////////////////////////

pub struct HuffmanCodeWord(pub u16);

/// A canonical code assigned to one symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodeAssignment {
    pub symbol: u16,
    pub code: u32,
    pub len: u8,
}

/// Assigns canonical codes to every symbol with a nonzero length
/// (RFC 1951, section 3.2.2). Over-subscribed inputs yield codes that do not
/// fit in their length; tree construction rejects those, along with lengths
/// above [`MAX_CODE_LEN`].
pub fn canonical_codes(code_lengths: &[u8]) -> Vec<CodeAssignment> {
    /* 1. Count codes of each len. */
    let max_len = code_lengths.iter().copied().max().unwrap_or(0) as usize;
    let mut len_count = vec![0_u32; max_len + 1];
    for &len in code_lengths {
        len_count[len as usize] += 1;
    }
    len_count[0] = 0;

    /* 2. Find the smallest code of each length. */
    let mut next_code = vec![0_u32; max_len + 1];
    let mut code = 0_u32;
    for len in 1..=max_len {
        code = code.wrapping_add(len_count[len - 1]) << 1;
        next_code[len] = code;
    }

    /* 3. Hand out consecutive codes in symbol order. */
    code_lengths
        .iter()
        .enumerate()
        .filter(|&(_, &len)| len != 0)
        .map(|(symbol, &len)| {
            let code = next_code[len as usize];
            next_code[len as usize] = code.wrapping_add(1);
            CodeAssignment {
                symbol: symbol as u16,
                code,
                len,
            }
        })
        .collect()
}

#[derive(Debug)]
enum HuffmanNode {
    Leaf(u16),
    Internal {
        left: Option<Box<HuffmanNode>>,
        right: Option<Box<HuffmanNode>>,
    },
}

impl HuffmanNode {
    fn internal() -> Self {
        HuffmanNode::Internal {
            left: None,
            right: None,
        }
    }
}

/// Binary decode tree for a canonical Huffman code. Bit 0 goes left.
#[derive(Debug)]
pub struct CanonicalHuffmanTree {
    root: HuffmanNode,
}

impl CanonicalHuffmanTree {
    pub fn from_lengths(code_lengths: &[u8]) -> Result<Self> {
        if let Some(symbol) = code_lengths.iter().position(|&len| len > MAX_CODE_LEN) {
            return Err(Error::InvalidTreeShape {
                symbol: symbol as u16,
            });
        }

        let mut tree = Self {
            root: HuffmanNode::internal(),
        };

        for CodeAssignment { symbol, code, len } in canonical_codes(code_lengths) {
            tree.insert(symbol, code, len)?;
        }

        Ok(tree)
    }

    // Walks the code most-significant bit first.
    fn insert(&mut self, symbol: u16, code: u32, len: u8) -> Result<()> {
        let mut node = &mut self.root;

        for depth in (0..len).rev() {
            let HuffmanNode::Internal { left, right } = node else {
                return Err(Error::InvalidTreeShape { symbol });
            };

            let slot = if (code >> depth) & 1 == 0 { left } else { right };

            if depth == 0 {
                return match slot.as_deref() {
                    Some(HuffmanNode::Leaf(_)) => Err(Error::DuplicateCode { symbol }),
                    Some(HuffmanNode::Internal { .. }) => {
                        Err(Error::InvalidTreeShape { symbol })
                    }
                    None if code >> len != 0 => Err(Error::InvalidTreeShape { symbol }),
                    None => {
                        *slot = Some(Box::new(HuffmanNode::Leaf(symbol)));
                        Ok(())
                    }
                };
            }

            node = &mut **slot.get_or_insert_with(|| Box::new(HuffmanNode::internal()));
        }

        Ok(())
    }

    /// Descends one level per bit read until a leaf is reached.
    pub fn decode(&self, bit_reader: &mut BitCursor<'_>) -> Result<u16> {
        let start = bit_reader.bit_offset();
        let mut node = &self.root;

        loop {
            match node {
                HuffmanNode::Leaf(symbol) => return Ok(*symbol),
                HuffmanNode::Internal { left, right } => {
                    let child = if bit_reader.next_bit()? == 0 {
                        left
                    } else {
                        right
                    };
                    node = child
                        .as_deref()
                        .ok_or(Error::IncompleteTree { bit_offset: start })?;
                }
            }
        }
    }
}

/// A canonical tree whose symbols are interpreted as tokens of type `T`.
pub struct HuffmanCoding<T> {
    tree: CanonicalHuffmanTree,
    _token: PhantomData<fn() -> T>,
}

impl<T> HuffmanCoding<T>
where
    T: TryFrom<HuffmanCodeWord, Error = Error>,
{
    pub fn from_lengths(code_lengths: &[u8]) -> Result<Self> {
        Ok(Self {
            tree: CanonicalHuffmanTree::from_lengths(code_lengths)?,
            _token: PhantomData,
        })
    }

    pub fn read_symbol(&self, bit_reader: &mut BitCursor<'_>) -> Result<T> {
        T::try_from(HuffmanCodeWord(self.tree.decode(bit_reader)?))
    }
}

////////////////////////////////////////////////////////////////////////////////
