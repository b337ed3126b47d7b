// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The coap-engine Contributors, all rights reserved.
 * This file is part of the coap-engine project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * block.rs - Block1/Block2 option values for block-wise transfers.
 */

//! Block option values as defined in [RFC 7959, Section 2.2](https://datatracker.ietf.org/doc/html/rfc7959#section-2.2).
//!
//! A block option value packs a block number (NUM), a "more blocks follow" flag (M) and a size
//! exponent (SZX) into a single unsigned integer of at most three bytes:
//!
//! ```text
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                 NUM                   |M| SZX |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use std::fmt::{Display, Formatter};

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::{error::BlockOptionError, protocol::Block};

/// Largest block number that fits into the 20 bits of a block option.
pub const MAX_BLOCK_NUMBER: u32 = 0xF_FFFF;

const MAX_BLOCK_OPTION_VALUE: u32 = 0xFF_FFFF;
const MORE_FLAG: u32 = 0x8;
const SZX_MASK: u32 = 0x7;

/// Block sizes supported by CoAP block-wise transfers.
///
/// The numeric value of each variant is its size exponent (SZX), the size in bytes is
/// `16 << szx`, see [BlockSize::size()].
#[repr(u8)]
#[derive(FromPrimitive, Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BlockSize {
    S16 = 0,
    S32 = 1,
    S64 = 2,
    S128 = 3,
    S256 = 4,
    S512 = 5,
    #[default]
    S1024 = 6,
}

impl BlockSize {
    /// All supported block sizes, smallest first.
    pub const ALL: [BlockSize; 7] = [
        BlockSize::S16,
        BlockSize::S32,
        BlockSize::S64,
        BlockSize::S128,
        BlockSize::S256,
        BlockSize::S512,
        BlockSize::S1024,
    ];

    /// Returns the size of a block in bytes.
    pub fn size(self) -> usize {
        16 << (self as u8)
    }

    /// Returns the size exponent (SZX) of this block size.
    pub fn szx(self) -> u8 {
        self as u8
    }

    /// Creates a block size from its size exponent.
    ///
    /// # Errors
    /// Fails for the reserved exponent 7 (and anything larger).
    pub fn from_szx(szx: u8) -> Result<BlockSize, BlockOptionError> {
        <BlockSize as FromPrimitive>::from_u8(szx).ok_or(BlockOptionError::ReservedSizeExponent)
    }

    /// Maps an arbitrary preferred size to the largest supported block size not exceeding it.
    ///
    /// Values below 16 map to 16 bytes, values above 1024 map to 1024 bytes.
    pub fn normalize(preferred: usize) -> BlockSize {
        BlockSize::ALL
            .iter()
            .rev()
            .copied()
            .find(|size| size.size() <= preferred)
            .unwrap_or(BlockSize::S16)
    }
}

impl Display for BlockSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.size())
    }
}

/// Decoded value of a Block1 or Block2 option.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlockOptionValue {
    /// Number of the block, counted in units of [size](BlockOptionValue::size).
    pub number: u32,
    /// Size of the blocks of this transfer.
    pub size: BlockSize,
    /// Whether more blocks follow this one.
    pub more: bool,
}

impl BlockOptionValue {
    pub fn new(number: u32, size: BlockSize, more: bool) -> BlockOptionValue {
        BlockOptionValue { number, size, more }
    }

    /// Byte offset of this block within the whole representation.
    pub fn offset(&self) -> usize {
        self.number as usize * self.size.size()
    }

    /// Packs this value into the integer carried by a block option.
    ///
    /// # Errors
    /// Fails if the block number does not fit into 20 bits.
    pub fn encode(&self) -> Result<Block, BlockOptionError> {
        if self.number > MAX_BLOCK_NUMBER {
            return Err(BlockOptionError::NumberOutOfRange(self.number));
        }
        let more = if self.more { MORE_FLAG } else { 0 };
        Ok((self.number << 4) | more | u32::from(self.size.szx()))
    }

    /// Unpacks the integer carried by a block option.
    ///
    /// # Errors
    /// Fails if the value exceeds three bytes or uses the reserved size exponent 7.
    pub fn decode(value: Block) -> Result<BlockOptionValue, BlockOptionError> {
        if value > MAX_BLOCK_OPTION_VALUE {
            return Err(BlockOptionError::ValueOutOfRange(value));
        }
        // SZX is at most 7, the cast cannot truncate.
        let size = BlockSize::from_szx((value & SZX_MASK) as u8)?;
        Ok(BlockOptionValue {
            number: value >> 4,
            size,
            more: value & MORE_FLAG != 0,
        })
    }
}

impl Display for BlockOptionValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.number, u8::from(self.more), self.size.size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_layout() {
        assert_eq!(BlockSize::S1024.szx(), 6);
        assert_eq!(BlockSize::S16.szx(), 0);
        let value = BlockOptionValue::new(15, BlockSize::S1024, false).encode().unwrap();
        assert_eq!(value >> 4, 15);
        assert_eq!(value & 0x7, 6);
        assert_eq!(value & 0x8, 0);
        let value = BlockOptionValue::new(15, BlockSize::S1024, true).encode().unwrap();
        assert_eq!(value & 0x8, 0x8);
        assert!(BlockOptionValue::decode(0x8).unwrap().more);
        assert!(!BlockOptionValue::decode(0x0).unwrap().more);
    }

    #[test]
    fn round_trip_all_numbers_and_sizes() {
        for size in BlockSize::ALL {
            for number in 0..=MAX_BLOCK_NUMBER {
                let more = number % 2 == 0;
                let value = BlockOptionValue::new(number, size, more);
                assert_eq!(BlockOptionValue::decode(value.encode().unwrap()), Ok(value));
            }
        }
    }

    #[test]
    fn out_of_range_values() {
        assert_eq!(
            BlockOptionValue::new(MAX_BLOCK_NUMBER + 1, BlockSize::S16, false).encode(),
            Err(BlockOptionError::NumberOutOfRange(MAX_BLOCK_NUMBER + 1))
        );
        assert_eq!(BlockOptionValue::decode(0x17), Err(BlockOptionError::ReservedSizeExponent));
        assert_eq!(
            BlockOptionValue::decode(0x100_0000),
            Err(BlockOptionError::ValueOutOfRange(0x100_0000))
        );
    }

    #[test]
    fn normalize_rounds_down() {
        assert_eq!(BlockSize::normalize(0), BlockSize::S16);
        assert_eq!(BlockSize::normalize(15), BlockSize::S16);
        assert_eq!(BlockSize::normalize(16), BlockSize::S16);
        assert_eq!(BlockSize::normalize(100), BlockSize::S64);
        assert_eq!(BlockSize::normalize(512), BlockSize::S512);
        assert_eq!(BlockSize::normalize(1000), BlockSize::S512);
        assert_eq!(BlockSize::normalize(4096), BlockSize::S1024);
    }

    #[test]
    fn offsets_and_display() {
        let value = BlockOptionValue::new(3, BlockSize::S256, true);
        assert_eq!(value.offset(), 768);
        assert_eq!(value.to_string(), "3/1/256");
    }
}
