// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The coap-engine Contributors, all rights reserved.
 * This file is part of the coap-engine project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * error.rs - CoAP error types.
 */

//! Error types

use std::{string::FromUtf8Error, sync::Arc};

use thiserror::Error;

use crate::protocol::{CoapMessageType, CoapOptionType};

#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum UnknownOptionError {
    /// Option number is not known to this library.
    #[error("CoAP option conversion error: unknown option")]
    Unknown,
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum OptionValueError {
    /// Provided value for option is too short.
    #[error("CoAP option has invalid value: too short")]
    TooShort,
    /// Provided value for option is too long.
    #[error("CoAP option has invalid value: too long")]
    TooLong,
    /// A string value could not be converted to UTF-8.
    #[error("CoAP option has invalid value: invalid string")]
    StringConversion(#[from] FromUtf8Error),
    /// URI encoded in message could not be parsed.
    #[error("CoAP option has invalid value: invalid URI")]
    UriParsing(#[from] UriParsingError),
    /// Option has an illegal value.
    #[error("CoAP option has invalid value")]
    IllegalValue,
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum UriParsingError {
    /// URI does not have a valid CoAP scheme (coap, coaps, coap+tcp, coaps+tcp, coap+ws, coaps+ws).
    #[error("URI scheme {} is not a valid CoAP scheme", .0)]
    NotACoapScheme(String),
    /// Authority part of an absolute URI has no host.
    #[error("CoAP URI parsing error: URI has no host")]
    MissingHost,
    /// Port could not be parsed as a 16-bit unsigned integer.
    #[error("CoAP URI parsing error: invalid port {:?}", .0)]
    InvalidPort(String),
    /// A path or query segment exceeds the maximum option length.
    #[error("CoAP URI parsing error: URI segment exceeds 255 bytes")]
    SegmentTooLong,
    /// URI contains a fragment, which CoAP does not support.
    #[error("CoAP URI parsing error: fragments are not allowed in CoAP URIs")]
    ContainsFragment,
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum MessageConversionError {
    /// Value of an option is invalid.
    #[error("CoAP message conversion error: invalid option value for {:?}", .0)]
    InvalidOptionValue(Option<CoapOptionType>, #[source] OptionValueError),
    /// Non-repeatable option was repeated.
    #[error("CoAP message conversion error: non-repeatable option of type {:?} repeated", .0)]
    NonRepeatableOptionRepeated(CoapOptionType),
    /// Provided URI is not usable for a request.
    #[error("CoAP message conversion error: provided uri is not valid for a request")]
    InvalidUri(#[from] UriParsingError),
    /// Invalid message code.
    #[error("CoAP message conversion error: invalid message code")]
    InvalidMessageCode(#[from] MessageCodeError),
    /// A message with code 0.00 (Empty) contains data.
    #[error("CoAP message conversion error: empty message contains data")]
    DataInEmptyMessage,
    /// Token is longer than the eight bytes allowed by RFC 7252.
    #[error("CoAP message conversion error: token of {} bytes exceeds 8 bytes", .0)]
    TokenTooLong(usize),
}

#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum MessageCodeError {
    /// Provided message code for request was not a request code.
    #[error("CoAP message code conversion error: not a request code")]
    NotARequestCode,
    /// Provided message code for response was not a response code.
    #[error("CoAP message code conversion error: not a response code")]
    NotAResponseCode,
}

#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum MessageTypeError {
    /// Message type cannot be used for this message code (e.g., ACK for request).
    #[error("message type {:?} cannot be used for this message code", .0)]
    InvalidForMessageCode(CoapMessageType),
    /// Raw message type is outside of the two-bit range.
    #[error("CoAP message type conversion error: unknown message type {}", .0)]
    UnknownType(u8),
}

#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum BlockOptionError {
    /// SZX value 7 is reserved ([RFC 7959, Section 2.2](https://datatracker.ietf.org/doc/html/rfc7959#section-2.2)).
    #[error("CoAP block option error: reserved block size exponent 7")]
    ReservedSizeExponent,
    /// Block number does not fit into the 20 bits available on the wire.
    #[error("CoAP block option error: block number {} exceeds 20 bits", .0)]
    NumberOutOfRange(u32),
    /// Raw option value does not fit into the three bytes of a block option.
    #[error("CoAP block option error: raw value {:#x} exceeds 24 bits", .0)]
    ValueOutOfRange(u32),
}

/// A message id is already used by an outstanding exchange.
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
#[error("CoAP exchange dispatcher error: message id {} is already pending", .0)]
pub struct DuplicateMessageId(pub u16);

/// Errors reported by a [CoapTransport](crate::transport::CoapTransport).
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// Underlying I/O operation failed.
    #[error("CoAP transport error: I/O error")]
    Io(#[source] Arc<std::io::Error>),
    /// The transport has been closed by either side.
    #[error("CoAP transport error: transport closed")]
    Closed,
    /// Could not establish a connection to the remote endpoint.
    #[error("CoAP transport error: unable to connect to {}", .0)]
    ConnectFailed(String),
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        TransportError::Io(Arc::new(e))
    }
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum ConfigurationError {
    /// No transport factory has been provided.
    #[error("CoAP client configuration error: no transport factory set")]
    MissingTransportFactory,
    /// The host name is empty.
    #[error("CoAP client configuration error: host must not be empty")]
    EmptyHost,
    /// The communication timeout is zero.
    #[error("CoAP client configuration error: communication timeout must be non-zero")]
    ZeroTimeout,
}

/// Errors returned by the operations of a [CoapClient](crate::client::CoapClient).
#[derive(Error, Debug, Clone)]
pub enum CoapClientError {
    /// An argument failed validation before any I/O took place.
    #[error("CoAP client error: invalid argument: {}", .0)]
    InvalidArgument(String),
    /// A received message did not match what the exchange expected.
    #[error("CoAP client error: protocol violation: {}", .0)]
    ProtocolViolation(String),
    /// No response was received within the communication timeout.
    #[error("CoAP client error: communication timed out")]
    CommunicationTimedOut,
    /// The transport failed.
    #[error("CoAP client error: communication failed")]
    Communication(#[from] TransportError),
    /// Every message id is taken by an outstanding exchange.
    #[error("CoAP client error: no free message id available")]
    NoMessageIdAvailable,
    /// The receive loop has stopped, no further exchanges are possible.
    #[error("CoAP client error: connection closed")]
    ConnectionClosed,
    /// The operation was cancelled by the caller.
    #[error("CoAP client error: operation cancelled")]
    Cancelled,
    /// The connect options are invalid.
    #[error("CoAP client error: invalid configuration")]
    Configuration(#[from] ConfigurationError),
}

impl CoapClientError {
    /// Returns whether this error signals a cooperative cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CoapClientError::Cancelled)
    }
}

impl From<MessageConversionError> for CoapClientError {
    fn from(e: MessageConversionError) -> Self {
        CoapClientError::InvalidArgument(e.to_string())
    }
}

impl From<OptionValueError> for CoapClientError {
    fn from(e: OptionValueError) -> Self {
        CoapClientError::InvalidArgument(e.to_string())
    }
}
