// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The coap-engine Contributors, all rights reserved.
 * This file is part of the coap-engine project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * buffer.rs - Accumulation buffer for block-wise downloads.
 */

use bytes::{Bytes, BytesMut};

/// Append-only byte buffer used to reassemble a block-wise transferred representation.
#[derive(Debug, Default)]
pub struct GrowableBuffer {
    inner: BytesMut,
}

impl GrowableBuffer {
    /// Creates an empty buffer that can hold `size_hint` bytes before reallocating.
    pub fn with_capacity(size_hint: usize) -> GrowableBuffer {
        GrowableBuffer {
            inner: BytesMut::with_capacity(size_hint),
        }
    }

    /// Appends `data` to the end of the buffer.
    pub fn append(&mut self, data: &[u8]) {
        self.inner.extend_from_slice(data);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Consumes the buffer and returns its content.
    pub fn freeze(self) -> Bytes {
        self.inner.freeze()
    }
}
