// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The coap-engine Contributors, all rights reserved.
 * This file is part of the coap-engine project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * crypto.rs - Credentials handed to secured transports.
 */

//! Credentials for DTLS/TLS secured connections.
//!
//! The client itself never inspects credentials, they are passed unchanged to the
//! [CoapTransportFactory](crate::transport::CoapTransportFactory) which sets up the secured
//! transport.

use std::fmt::{Debug, Formatter};

/// A pre-shared key, consisting of an optional identity and the key material.
#[derive(Clone, PartialEq, Eq)]
pub struct PskKey {
    identity: Option<Box<[u8]>>,
    data: Box<[u8]>,
}

impl PskKey {
    pub fn new<T: Into<Vec<u8>>, U: Into<Vec<u8>>>(identity: Option<T>, data: U) -> PskKey {
        PskKey {
            identity: identity.map(Into::into).map(|v| v.into_boxed_slice()),
            data: data.into().into_boxed_slice(),
        }
    }

    pub fn identity(&self) -> Option<&[u8]> {
        self.identity.as_ref().map(|v| v.as_ref())
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }
}

impl Debug for PskKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PskKey")
            .field("identity", &self.identity.as_ref().map(|v| String::from_utf8_lossy(v)))
            .field("data", &format_args!("<{} bytes>", self.data.len()))
            .finish()
    }
}

impl From<&[u8]> for PskKey {
    fn from(value: &[u8]) -> Self {
        PskKey {
            identity: None,
            data: value.into(),
        }
    }
}

impl<T: Into<Box<[u8]>>, U: Into<Box<[u8]>>> From<(T, U)> for PskKey {
    fn from(value: (T, U)) -> Self {
        PskKey {
            identity: Some(value.0.into()),
            data: value.1.into(),
        }
    }
}

/// Credentials used to secure the connection to a CoAP server.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ClientCredentials {
    /// Pre-shared key credentials ([RFC 7252, Section 9.1.3.1](https://datatracker.ietf.org/doc/html/rfc7252#section-9.1.3.1)).
    Psk(PskKey),
}

impl From<PskKey> for ClientCredentials {
    fn from(value: PskKey) -> Self {
        ClientCredentials::Psk(value)
    }
}
