// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The coap-engine Contributors, all rights reserved.
 * This file is part of the coap-engine project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * client/block_receiver.rs - Block2 reassembly of response payloads.
 */

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{
    block::BlockOptionValue,
    buffer::GrowableBuffer,
    client::{
        progress::{BlockTransferDirection, BlockTransferProgress, ProgressReporter},
        CoapExchanger,
    },
    error::CoapClientError,
    message::{CoapMessage, CoapMessageCommon, CoapOption},
};

/// Number of blocks the reassembly buffer is sized for up front.
const INITIAL_BUFFER_BLOCKS: usize = 4;

/// Result of reassembling a Block2 response.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockTransferOutcome {
    /// Every block was received, the payload is the concatenation of all of them.
    Reassembled(Bytes),
    /// The server answered a follow-up request with a non-success code.
    Rejected(CoapMessage),
}

/// Fetches the remaining blocks of a Block2 response, one exchange at a time
/// ([RFC 7959, Section 2.4](https://datatracker.ietf.org/doc/html/rfc7959#section-2.4)).
pub struct BlockTransferReceiver<'a> {
    exchanger: &'a dyn CoapExchanger,
    progress: &'a ProgressReporter,
}

impl<'a> BlockTransferReceiver<'a> {
    pub(crate) fn new(exchanger: &'a dyn CoapExchanger, progress: &'a ProgressReporter) -> BlockTransferReceiver<'a> {
        BlockTransferReceiver { exchanger, progress }
    }

    /// Reassembles the payload whose first block is carried by `first`.
    ///
    /// Follow-up requests are clones of `template` with an updated Block2 option. The server may
    /// switch to a smaller block size at any point, every block must however start where the
    /// previous one ended. A follow-up answered with a non-success code ends the transfer with
    /// [BlockTransferOutcome::Rejected], malformed or misplaced blocks abort it with
    /// [CoapClientError::ProtocolViolation].
    pub async fn receive(
        &self,
        template: &CoapMessage,
        first: &CoapMessage,
        cancel: &CancellationToken,
    ) -> Result<BlockTransferOutcome, CoapClientError> {
        let mut block = decode_block2(first)?;
        let announced_size = first.size2().map(|size| size as usize);
        let mut buffer = GrowableBuffer::with_capacity(block.size.size() * INITIAL_BUFFER_BLOCKS);
        buffer.append(first.data());
        self.report(&block, buffer.len(), announced_size);

        while block.more {
            let requested = BlockOptionValue::new(block.number + 1, block.size, false);
            let encoded = requested
                .encode()
                .map_err(|e| CoapClientError::ProtocolViolation(format!("cannot request next block: {}", e)))?;
            let mut request = template.clone();
            request.set_option(CoapOption::Block2(encoded));
            trace!(block = %requested, "requesting response block");

            let response = self.exchanger.exchange(request, cancel).await?;
            if !response.code().is_success() {
                debug!(block = %requested, code = %response.code(), "server rejected block request");
                return Ok(BlockTransferOutcome::Rejected(response));
            }
            let received = decode_block2(&response)?;
            if received.offset() != buffer.len() {
                return Err(CoapClientError::ProtocolViolation(format!(
                    "expected block at offset {} but received block {}",
                    buffer.len(),
                    received
                )));
            }
            buffer.append(response.data());
            block = received;
            self.report(&block, buffer.len(), announced_size);
        }
        Ok(BlockTransferOutcome::Reassembled(buffer.freeze()))
    }

    fn report(&self, block: &BlockOptionValue, bytes_transferred: usize, announced_size: Option<usize>) {
        let total_bytes = if block.more {
            announced_size
        } else {
            Some(bytes_transferred)
        };
        self.progress.report(BlockTransferProgress {
            direction: BlockTransferDirection::Download,
            block_number: block.number,
            block_size: block.size,
            bytes_transferred,
            total_bytes,
            last_block: !block.more,
        });
    }
}

fn decode_block2(message: &CoapMessage) -> Result<BlockOptionValue, CoapClientError> {
    let raw = message
        .block2()
        .ok_or_else(|| CoapClientError::ProtocolViolation("response block lacks a Block2 option".to_string()))?;
    BlockOptionValue::decode(raw).map_err(|e| CoapClientError::ProtocolViolation(e.to_string()))
}
