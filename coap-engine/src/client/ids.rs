// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The coap-engine Contributors, all rights reserved.
 * This file is part of the coap-engine project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * client/ids.rs - Message id and token allocation.
 */

use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};

use crate::{protocol::CoapToken, types::CoapMessageId};

/// Hands out message ids from a cursor that starts at a random value and wraps around at 65535.
#[derive(Debug)]
pub struct MessageIdProvider {
    next: AtomicU16,
}

impl MessageIdProvider {
    pub fn new() -> MessageIdProvider {
        MessageIdProvider::starting_at(rand::random())
    }

    pub fn starting_at(start: CoapMessageId) -> MessageIdProvider {
        MessageIdProvider {
            next: AtomicU16::new(start),
        }
    }

    pub fn next(&self) -> CoapMessageId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for MessageIdProvider {
    fn default() -> Self {
        MessageIdProvider::new()
    }
}

/// Hands out eight byte tokens made of a random base plus a running counter.
///
/// Tokens repeat only after 2^64 allocations.
#[derive(Debug)]
pub struct TokenProvider {
    base: u64,
    counter: AtomicU64,
}

impl TokenProvider {
    pub fn new() -> TokenProvider {
        TokenProvider::with_base(rand::random())
    }

    pub fn with_base(base: u64) -> TokenProvider {
        TokenProvider {
            base,
            counter: AtomicU64::new(0),
        }
    }

    pub fn next(&self) -> CoapToken {
        let value = self.base.wrapping_add(self.counter.fetch_add(1, Ordering::Relaxed));
        Box::new(value.to_be_bytes())
    }
}

impl Default for TokenProvider {
    fn default() -> Self {
        TokenProvider::new()
    }
}
