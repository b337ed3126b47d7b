// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The coap-engine Contributors, all rights reserved.
 * This file is part of the coap-engine project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * client/block_sender.rs - Block1 segmentation of request payloads.
 */

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{
    block::{BlockOptionValue, BlockSize, MAX_BLOCK_NUMBER},
    client::{
        progress::{BlockTransferDirection, BlockTransferProgress, ProgressReporter},
        CoapExchanger,
    },
    error::CoapClientError,
    message::{CoapMessage, CoapMessageCommon, CoapOption},
};

/// Uploads a request payload in Block1 segments, one exchange at a time
/// ([RFC 7959, Section 2.5](https://datatracker.ietf.org/doc/html/rfc7959#section-2.5)).
///
/// The server may ask for smaller blocks by answering with a smaller size in its Block1 option,
/// all following blocks then use that size.
pub struct BlockTransferSender<'a> {
    exchanger: &'a dyn CoapExchanger,
    progress: &'a ProgressReporter,
    block_size: BlockSize,
}

impl<'a> BlockTransferSender<'a> {
    pub(crate) fn new(
        exchanger: &'a dyn CoapExchanger,
        progress: &'a ProgressReporter,
        block_size: BlockSize,
    ) -> BlockTransferSender<'a> {
        BlockTransferSender {
            exchanger,
            progress,
            block_size,
        }
    }

    /// Sends `payload` using `template` for every block and returns the response to the last block.
    ///
    /// If the server answers a block with a non-success code, the transfer stops and that response
    /// is returned.
    pub async fn send(
        &self,
        template: &CoapMessage,
        payload: &Bytes,
        cancel: &CancellationToken,
    ) -> Result<CoapMessage, CoapClientError> {
        let total = payload.len();
        let mut block_size = self.block_size;
        let last_block_number = total.saturating_sub(1) / block_size.size();
        if last_block_number > MAX_BLOCK_NUMBER as usize {
            return Err(CoapClientError::InvalidArgument(format!(
                "payload of {} bytes needs more than {} blocks of {} bytes",
                total,
                MAX_BLOCK_NUMBER as usize + 1,
                block_size.size()
            )));
        }
        let total_size = u32::try_from(total)
            .map_err(|_| CoapClientError::InvalidArgument(format!("payload of {} bytes is too large", total)))?;

        let mut offset = 0;
        loop {
            let end = (offset + block_size.size()).min(total);
            let more = end < total;
            // Sizes only ever shrink by powers of two, so the offset stays a multiple of the size.
            let number = u32::try_from(offset / block_size.size()).unwrap_or(u32::MAX);
            let block = BlockOptionValue::new(number, block_size, more);
            let encoded = block
                .encode()
                .map_err(|e| CoapClientError::InvalidArgument(e.to_string()))?;

            let mut request = template.clone();
            request.set_data(payload.slice(offset..end));
            request.set_option(CoapOption::Block1(encoded));
            if offset == 0 {
                request.set_option(CoapOption::Size1(total_size));
            }
            trace!(block = %block, "sending request block");

            let response = self.exchanger.exchange(request, cancel).await?;
            self.progress.report(BlockTransferProgress {
                direction: BlockTransferDirection::Upload,
                block_number: number,
                block_size,
                bytes_transferred: end,
                total_bytes: Some(total),
                last_block: !more,
            });

            if !response.code().is_success() {
                warn!(block = %block, code = %response.code(), "server rejected request block, aborting upload");
                return Ok(response);
            }
            if !more {
                return Ok(response);
            }
            if let Some(raw) = response.block1() {
                match BlockOptionValue::decode(raw) {
                    Ok(acknowledged) if acknowledged.size < block_size => {
                        debug!(
                            from = block_size.size(),
                            to = acknowledged.size.size(),
                            "server requested smaller blocks"
                        );
                        block_size = acknowledged.size;
                    },
                    Ok(_) => {},
                    Err(e) => warn!(error = %e, "ignoring undecodable Block1 option in response"),
                }
            }
            offset = end;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::protocol::{CoapMessageType, CoapRequestCode, CoapResponseCode};

    /// Answers every block with 2.31 Continue (or 2.04 Changed for the last one), optionally
    /// asking for a smaller block size in the first answer.
    struct UploadServer {
        requests: Mutex<Vec<CoapMessage>>,
        shrink_to: Option<BlockSize>,
        fail_at: Option<usize>,
    }

    impl UploadServer {
        fn new(shrink_to: Option<BlockSize>, fail_at: Option<usize>) -> UploadServer {
            UploadServer {
                requests: Mutex::new(Vec::new()),
                shrink_to,
                fail_at,
            }
        }

        fn blocks(&self) -> Vec<(BlockOptionValue, usize)> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|request| {
                    (
                        BlockOptionValue::decode(request.block1().unwrap()).unwrap(),
                        request.data().len(),
                    )
                })
                .collect()
        }
    }

    #[async_trait]
    impl CoapExchanger for UploadServer {
        async fn exchange(
            &self,
            request: CoapMessage,
            _cancel: &CancellationToken,
        ) -> Result<CoapMessage, CoapClientError> {
            let index = {
                let mut requests = self.requests.lock().unwrap();
                requests.push(request.clone());
                requests.len() - 1
            };
            let block = BlockOptionValue::decode(request.block1().unwrap()).unwrap();
            let code = if Some(index) == self.fail_at {
                CoapResponseCode::RequestTooLarge
            } else if block.more {
                CoapResponseCode::Continue
            } else {
                CoapResponseCode::Changed
            };
            let mut response = CoapMessage::new(CoapMessageType::Ack, code.into());
            let size = match (index, self.shrink_to) {
                (0, Some(size)) => size,
                _ => block.size,
            };
            let acknowledged = BlockOptionValue::new(block.number, size, block.more);
            response.add_option(CoapOption::Block1(acknowledged.encode().unwrap()));
            Ok(response)
        }
    }

    fn template() -> CoapMessage {
        let mut template = CoapMessage::new(CoapMessageType::Con, CoapRequestCode::Put.into());
        template.add_option(CoapOption::UriPath("firmware".to_string()));
        template.set_token(vec![1, 2, 3, 4]);
        template
    }

    fn payload(len: usize) -> Bytes {
        (0..len).map(|i| (i % 251) as u8).collect::<Vec<_>>().into()
    }

    #[tokio::test]
    async fn splits_payload_into_blocks() {
        let server = UploadServer::new(None, None);
        let progress = ProgressReporter::new();
        let mut events = progress.subscribe();
        let sender = BlockTransferSender::new(&server, &progress, BlockSize::S1024);
        let data = payload(2500);

        let response = sender.send(&template(), &data, &CancellationToken::new()).await.unwrap();
        assert_eq!(response.code(), CoapResponseCode::Changed.into());

        let blocks = server.blocks();
        assert_eq!(
            blocks,
            vec![
                (BlockOptionValue::new(0, BlockSize::S1024, true), 1024),
                (BlockOptionValue::new(1, BlockSize::S1024, true), 1024),
                (BlockOptionValue::new(2, BlockSize::S1024, false), 452),
            ]
        );
        let requests = server.requests.lock().unwrap();
        let reassembled: Vec<u8> = requests.iter().flat_map(|r| r.data().to_vec()).collect();
        assert_eq!(reassembled, data.to_vec());
        assert_eq!(requests[0].option(60), Some(&CoapOption::Size1(2500)));
        assert_eq!(requests[1].option(60), None);
        assert!(requests.iter().all(|r| r.token() == [1, 2, 3, 4]));
        assert!(requests
            .iter()
            .all(|r| r.option(11) == Some(&CoapOption::UriPath("firmware".to_string()))));

        let mut transferred = Vec::new();
        while let Ok(event) = events.try_recv() {
            assert_eq!(event.direction, BlockTransferDirection::Upload);
            assert_eq!(event.total_bytes, Some(2500));
            transferred.push(event.bytes_transferred);
        }
        assert_eq!(transferred, vec![1024, 2048, 2500]);
    }

    #[tokio::test]
    async fn server_can_reduce_block_size() {
        let server = UploadServer::new(Some(BlockSize::S256), None);
        let progress = ProgressReporter::new();
        let sender = BlockTransferSender::new(&server, &progress, BlockSize::S1024);
        let data = payload(2500);

        sender.send(&template(), &data, &CancellationToken::new()).await.unwrap();

        let blocks = server.blocks();
        assert_eq!(blocks[0], (BlockOptionValue::new(0, BlockSize::S1024, true), 1024));
        let rest = &blocks[1..];
        assert_eq!(rest.len(), 6);
        for (index, (block, len)) in rest.iter().enumerate() {
            assert_eq!(block.size, BlockSize::S256);
            assert_eq!(block.number, 4 + index as u32);
            assert_eq!(block.offset(), 1024 + index * 256);
            if index == rest.len() - 1 {
                assert!(!block.more);
                assert_eq!(*len, 2500 - 2304);
            } else {
                assert!(block.more);
                assert_eq!(*len, 256);
            }
        }
    }

    #[tokio::test]
    async fn error_response_stops_transfer() {
        let server = UploadServer::new(None, Some(1));
        let progress = ProgressReporter::new();
        let sender = BlockTransferSender::new(&server, &progress, BlockSize::S512);

        let response = sender
            .send(&template(), &payload(2000), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.code(), CoapResponseCode::RequestTooLarge.into());
        assert_eq!(server.blocks().len(), 2);
    }

    #[tokio::test]
    async fn oversized_payload_fails_before_sending() {
        let server = UploadServer::new(None, None);
        let progress = ProgressReporter::new();
        let sender = BlockTransferSender::new(&server, &progress, BlockSize::S16);
        let data = Bytes::from(vec![0u8; 16 * (MAX_BLOCK_NUMBER as usize + 1) + 1]);

        let result = sender.send(&template(), &data, &CancellationToken::new()).await;
        assert!(matches!(result, Err(CoapClientError::InvalidArgument(_))));
        assert!(server.blocks().is_empty());
    }
}
