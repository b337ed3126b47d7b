// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The coap-engine Contributors, all rights reserved.
 * This file is part of the coap-engine project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * client/options.rs - Connection options of a CoAP client.
 */

use std::{fmt::Debug, sync::Arc, time::Duration};

use crate::{
    block::BlockSize,
    crypto::ClientCredentials,
    error::ConfigurationError,
    protocol::{COAPS_DEFAULT_PORT, COAP_DEFAULT_PORT},
    transport::CoapTransportFactory,
};

/// Time to wait for the response to a single exchange if nothing else is configured.
pub const DEFAULT_COMMUNICATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Options used by [CoapClient::connect()](crate::client::CoapClient::connect()).
///
/// Use [CoapClientConnectOptionsBuilder] to create them.
#[derive(Clone)]
pub struct CoapClientConnectOptions {
    pub host: String,
    pub port: u16,
    pub transport_factory: Arc<dyn CoapTransportFactory>,
    /// Time to wait for the response to each single exchange.
    pub communication_timeout: Duration,
    /// Block size used for block-wise transfers, normalized down to a supported size.
    pub preferred_block_size: BlockSize,
    pub enable_block_transfer: bool,
    /// Credentials handed to the transport factory.
    pub credentials: Option<ClientCredentials>,
}

impl Debug for CoapClientConnectOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoapClientConnectOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("communication_timeout", &self.communication_timeout)
            .field("preferred_block_size", &self.preferred_block_size)
            .field("enable_block_transfer", &self.enable_block_transfer)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

/// Builder for [CoapClientConnectOptions].
#[derive(Clone)]
pub struct CoapClientConnectOptionsBuilder {
    host: String,
    port: u16,
    transport_factory: Option<Arc<dyn CoapTransportFactory>>,
    communication_timeout: Duration,
    preferred_block_size: BlockSize,
    enable_block_transfer: bool,
    credentials: Option<ClientCredentials>,
}

impl CoapClientConnectOptionsBuilder {
    pub fn new() -> CoapClientConnectOptionsBuilder {
        CoapClientConnectOptionsBuilder {
            host: String::new(),
            port: COAP_DEFAULT_PORT,
            transport_factory: None,
            communication_timeout: DEFAULT_COMMUNICATION_TIMEOUT,
            preferred_block_size: BlockSize::default(),
            enable_block_transfer: true,
            credentials: None,
        }
    }

    pub fn with_host<T: Into<String>>(mut self, host: T) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Uses the default port for encrypted CoAP (5684).
    pub fn with_encrypted_port(self) -> Self {
        self.with_port(COAPS_DEFAULT_PORT)
    }

    /// Uses the default port for unencrypted CoAP (5683).
    pub fn with_unencrypted_port(self) -> Self {
        self.with_port(COAP_DEFAULT_PORT)
    }

    pub fn with_transport_factory<F: CoapTransportFactory + 'static>(mut self, factory: F) -> Self {
        self.transport_factory = Some(Arc::new(factory));
        self
    }

    pub fn with_shared_transport_factory(mut self, factory: Arc<dyn CoapTransportFactory>) -> Self {
        self.transport_factory = Some(factory);
        self
    }

    pub fn with_communication_timeout(mut self, timeout: Duration) -> Self {
        self.communication_timeout = timeout;
        self
    }

    /// Sets the preferred block size in bytes.
    ///
    /// Values that are not a supported block size are rounded down to the next supported one,
    /// values outside of 16 to 1024 are clamped.
    pub fn with_preferred_block_size(mut self, size: usize) -> Self {
        self.preferred_block_size = BlockSize::normalize(size);
        self
    }

    pub fn with_block_transfer_enabled(mut self) -> Self {
        self.enable_block_transfer = true;
        self
    }

    pub fn with_block_transfer_disabled(mut self) -> Self {
        self.enable_block_transfer = false;
        self
    }

    pub fn with_credentials<C: Into<ClientCredentials>>(mut self, credentials: C) -> Self {
        self.credentials = Some(credentials.into());
        self
    }

    /// Validates the collected options.
    ///
    /// # Errors
    /// Fails if no transport factory was set, the host is empty or the timeout is zero.
    pub fn build(self) -> Result<CoapClientConnectOptions, ConfigurationError> {
        let transport_factory = self
            .transport_factory
            .ok_or(ConfigurationError::MissingTransportFactory)?;
        if self.host.is_empty() {
            return Err(ConfigurationError::EmptyHost);
        }
        if self.communication_timeout.is_zero() {
            return Err(ConfigurationError::ZeroTimeout);
        }
        Ok(CoapClientConnectOptions {
            host: self.host,
            port: self.port,
            transport_factory,
            communication_timeout: self.communication_timeout,
            preferred_block_size: self.preferred_block_size,
            enable_block_transfer: self.enable_block_transfer,
            credentials: self.credentials,
        })
    }
}

impl Default for CoapClientConnectOptionsBuilder {
    fn default() -> Self {
        CoapClientConnectOptionsBuilder::new()
    }
}

impl Debug for CoapClientConnectOptionsBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoapClientConnectOptionsBuilder")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("transport_factory", &self.transport_factory.is_some())
            .field("communication_timeout", &self.communication_timeout)
            .field("preferred_block_size", &self.preferred_block_size)
            .field("enable_block_transfer", &self.enable_block_transfer)
            .finish_non_exhaustive()
    }
}
