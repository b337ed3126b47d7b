// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The coap-engine Contributors, all rights reserved.
 * This file is part of the coap-engine project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * client/progress.rs - Progress reports for block-wise transfers.
 */

use tokio::sync::broadcast;

use crate::block::BlockSize;

/// Number of progress events buffered per subscriber before the oldest ones are dropped.
const PROGRESS_CHANNEL_CAPACITY: usize = 64;

/// Direction of a block-wise transfer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BlockTransferDirection {
    /// Block1: uploading a request payload to the server.
    Upload,
    /// Block2: downloading a response payload from the server.
    Download,
}

/// Progress of a block-wise transfer, reported once per transferred block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockTransferProgress {
    pub direction: BlockTransferDirection,
    /// Number of the block that was just transferred.
    pub block_number: u32,
    /// Size of the blocks used for the transfer at this point.
    pub block_size: BlockSize,
    /// Bytes transferred so far, including this block.
    pub bytes_transferred: usize,
    /// Size of the whole payload, if known.
    ///
    /// Always known for uploads. For downloads it is only known once the last block has been
    /// received, unless the server announced it in a Size2 option.
    pub total_bytes: Option<usize>,
    /// Whether this was the last block of the transfer.
    pub last_block: bool,
}

impl BlockTransferProgress {
    /// Returns the progress in percent (0-100), if the total size is known.
    pub fn progress_percent(&self) -> Option<f64> {
        self.total_bytes.map(|total| {
            if total == 0 {
                100.0
            } else {
                (self.bytes_transferred as f64 * 100.0 / total as f64).min(100.0)
            }
        })
    }

    /// Returns the total number of blocks, if the total size is known.
    pub fn total_blocks(&self) -> Option<usize> {
        self.total_bytes
            .map(|total| total.div_ceil(self.block_size.size()).max(1))
    }

    pub fn is_complete(&self) -> bool {
        self.last_block
    }
}

/// Publishes progress events to every attached subscriber.
#[derive(Clone, Debug)]
pub(crate) struct ProgressReporter {
    sender: broadcast::Sender<BlockTransferProgress>,
}

impl ProgressReporter {
    pub fn new() -> ProgressReporter {
        let (sender, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        ProgressReporter { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BlockTransferProgress> {
        self.sender.subscribe()
    }

    pub fn report(&self, progress: BlockTransferProgress) {
        tracing::trace!(
            direction = ?progress.direction,
            block_number = progress.block_number,
            block_size = progress.block_size.size(),
            bytes_transferred = progress.bytes_transferred,
            total_bytes = ?progress.total_bytes,
            "block transferred"
        );
        // Sending only fails if nobody is subscribed.
        let _ = self.sender.send(progress);
    }
}
