// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The coap-engine Contributors, all rights reserved.
 * This file is part of the coap-engine project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * protocol.rs - Types specified and defined in the CoAP standard and its extensions.
 */

//! Various types that are specified and defined in the CoAP standard and its extensions.

use std::fmt::{Display, Formatter};

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::error::{MessageCodeError, MessageTypeError, UnknownOptionError};

pub type ETag = Box<[u8]>;
pub type MaxAge = u32;
pub type LocationPath = String;
pub type LocationQuery = String;
pub type UriHost = String;
pub type UriPort = u16;
pub type UriPath = String;
pub type UriQuery = String;
pub type ContentFormat = u16;
pub type ProxyUri = String;
pub type ProxyScheme = String;
pub type Size = u32;
pub type Block = u32;
pub type HopLimit = u16;
pub type NoResponse = u8;
pub type Observe = u32;

pub type CoapOptionNum = u16;
pub type CoapToken = Box<[u8]>;

/// Maximum length of a CoAP token in bytes ([RFC 7252, Section 3](https://datatracker.ietf.org/doc/html/rfc7252#section-3)).
pub const COAP_TOKEN_MAX_LEN: usize = 8;

/// Default port for unencrypted CoAP (`coap://`).
pub const COAP_DEFAULT_PORT: u16 = 5683;

/// Default port for DTLS-secured CoAP (`coaps://`).
pub const COAPS_DEFAULT_PORT: u16 = 5684;

/// Observe option value used to register an observation ([RFC 7641, Section 2](https://datatracker.ietf.org/doc/html/rfc7641#section-2)).
pub const OBSERVE_REGISTER: Observe = 0;

/// Observe option value used to cancel an observation.
pub const OBSERVE_DEREGISTER: Observe = 1;

/// Representation of a CoAP match expression supplied in the If-Match option, see
/// [RFC 7252, Section 5.10.8.1](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.8.1).
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum CoapMatch {
    ETag(ETag),
    Empty,
}

/// CoAP option types as defined in [RFC 7252, Section 5.10](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10)
/// and later CoAP extensions.
///
/// The enum value corresponds to the appropriate option number and can be retrieved using
/// `[value] as u16` or [to_raw_option_num()](CoapOptionType::to_raw_option_num()).
///
/// See <https://www.iana.org/assignments/core-parameters/core-parameters.xhtml#option-numbers> for a
/// list of option numbers registered with the IANA.
#[repr(u16)]
#[non_exhaustive]
#[derive(FromPrimitive, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CoapOptionType {
    /// If-Match option ([RFC 7252, Section 5.10.8.1](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.8.1)).
    IfMatch = 1,
    /// Uri-Host option ([RFC 7252, Section 5.10.1](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.1)).
    UriHost = 3,
    /// ETag option ([RFC 7252, Section 5.10.6](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.6)).
    ETag = 4,
    /// If-None-Match option ([RFC 7252, Section 5.10.8.2](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.8.2)).
    IfNoneMatch = 5,
    /// Observe option ([RFC 7641, Section 2](https://datatracker.ietf.org/doc/html/rfc7641#section-2)).
    Observe = 6,
    /// Uri-Port option ([RFC 7252, Section 5.10.1](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.1)).
    UriPort = 7,
    /// Location-Path option ([RFC 7252, Section 5.10.7](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.7)).
    LocationPath = 8,
    /// Uri-Path option ([RFC 7252, Section 5.10.1](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.1)).
    UriPath = 11,
    /// Content-Format option ([RFC 7252, Section 5.10.3](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.3)).
    ContentFormat = 12,
    /// Max-Age option ([RFC 7252, Section 5.10.5](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.5)).
    MaxAge = 14,
    /// Uri-Query option ([RFC 7252, Section 5.10.1](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.1)).
    UriQuery = 15,
    /// Hop-Limit option ([RFC 8768, Section 3](https://datatracker.ietf.org/doc/html/rfc8768#section-3)).
    HopLimit = 16,
    /// Accept option ([RFC 7252, Section 5.10.4](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.4)).
    Accept = 17,
    /// Location-Query option ([RFC 7252, Section 5.10.7](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.7)).
    LocationQuery = 20,
    /// Block2 option ([RFC 7959, Section 2.1](https://datatracker.ietf.org/doc/html/rfc7959#section-2.1)).
    Block2 = 23,
    /// Block1 option ([RFC 7959, Section 2.1](https://datatracker.ietf.org/doc/html/rfc7959#section-2.1)).
    Block1 = 27,
    /// Size2 option ([RFC 7959, Section 4](https://datatracker.ietf.org/doc/html/rfc7959#section-4)).
    Size2 = 28,
    /// Proxy-Uri option ([RFC 7252, Section 5.10.2](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.2)).
    ProxyUri = 35,
    /// Proxy-Scheme option ([RFC 7252, Section 5.10.2](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.2)).
    ProxyScheme = 39,
    /// Size1 option ([RFC 7959, Section 4](https://datatracker.ietf.org/doc/html/rfc7959#section-4)).
    Size1 = 60,
    /// No-Response option ([RFC 7967, Section 2](https://datatracker.ietf.org/doc/html/rfc7967#section-2)).
    NoResponse = 258,
}

impl CoapOptionType {
    /// Returns the option number this type belongs to.
    pub fn to_raw_option_num(self) -> CoapOptionNum {
        self as u16
    }

    /// Returns the maximum size in bytes that a value of this option type should have.
    pub fn max_len(&self) -> usize {
        match self {
            CoapOptionType::IfMatch => 8,
            CoapOptionType::UriHost => 255,
            CoapOptionType::ETag => 8,
            CoapOptionType::IfNoneMatch => 0,
            CoapOptionType::Observe => 3,
            CoapOptionType::UriPort => 2,
            CoapOptionType::LocationPath => 255,
            CoapOptionType::UriPath => 255,
            CoapOptionType::ContentFormat => 2,
            CoapOptionType::MaxAge => 4,
            CoapOptionType::UriQuery => 255,
            CoapOptionType::HopLimit => 1,
            CoapOptionType::Accept => 2,
            CoapOptionType::LocationQuery => 255,
            CoapOptionType::Block2 => 3,
            CoapOptionType::Block1 => 3,
            CoapOptionType::Size2 => 4,
            CoapOptionType::ProxyUri => 1034,
            CoapOptionType::ProxyScheme => 255,
            CoapOptionType::Size1 => 4,
            CoapOptionType::NoResponse => 1,
        }
    }

    /// Returns the minimum size in bytes that a value of this option type should have.
    pub fn min_len(&self) -> usize {
        match self {
            CoapOptionType::UriHost => 1,
            CoapOptionType::ETag => 1,
            CoapOptionType::HopLimit => 1,
            CoapOptionType::ProxyUri => 1,
            CoapOptionType::ProxyScheme => 1,
            _ => 0,
        }
    }

    /// Returns whether the option may appear more than once in a message.
    pub fn is_repeatable(&self) -> bool {
        matches!(
            self,
            CoapOptionType::IfMatch
                | CoapOptionType::ETag
                | CoapOptionType::LocationPath
                | CoapOptionType::UriPath
                | CoapOptionType::UriQuery
                | CoapOptionType::LocationQuery
        )
    }
}

impl TryFrom<CoapOptionNum> for CoapOptionType {
    type Error = UnknownOptionError;

    fn try_from(num: CoapOptionNum) -> Result<Self, Self::Error> {
        <CoapOptionType as FromPrimitive>::from_u16(num).ok_or(UnknownOptionError::Unknown)
    }
}

/// Various content formats that can be used for CoAP requests.
///
/// To get the corresponding numeric value, use `[value] as u16`.
///
/// See <https://www.iana.org/assignments/core-parameters/core-parameters.xhtml#content-formats> for
/// values that are currently registered with the IANA.
#[repr(u16)]
#[derive(Copy, Clone, FromPrimitive, Eq, PartialEq, Hash, Debug)]
#[non_exhaustive]
pub enum CoapContentFormat {
    TextPlain = 0,
    CoseEncrypt0 = 16,
    CoseMac0 = 17,
    CoseSign1 = 18,
    LinkFormat = 40,
    ApplicationXml = 41,
    OctetStream = 42,
    Exi = 47,
    Json = 50,
    Cbor = 60,
    Cwt = 61,
    CoseEncrypt = 96,
    CoseMac = 97,
    CoseSign = 98,
    CoseKey = 101,
    CoseKeySet = 102,
    SenMlJson = 110,
    SensMlJson = 111,
    SenMlCbor = 112,
    SensMlCbor = 113,
    SenMlExi = 114,
    SensMlExi = 115,
    CoapGroupJson = 256,
    DotsCbor = 271,
    SenMlXml = 310,
    SensMlXml = 311,
    Other,
}

impl CoapContentFormat {
    /// Returns the IANA registered media type string for this content format.
    ///
    /// Unregistered formats ([CoapContentFormat::Other]) are reported as `application/octet-stream`.
    pub fn media_type(&self) -> &'static str {
        match self {
            CoapContentFormat::TextPlain => "text/plain; charset=utf-8",
            CoapContentFormat::CoseEncrypt0 => "application/cose; cose-type=\"cose-encrypt0\"",
            CoapContentFormat::CoseMac0 => "application/cose; cose-type=\"cose-mac0\"",
            CoapContentFormat::CoseSign1 => "application/cose; cose-type=\"cose-sign1\"",
            CoapContentFormat::LinkFormat => "application/link-format",
            CoapContentFormat::ApplicationXml => "application/xml",
            CoapContentFormat::OctetStream => "application/octet-stream",
            CoapContentFormat::Exi => "application/exi",
            CoapContentFormat::Json => "application/json",
            CoapContentFormat::Cbor => "application/cbor",
            CoapContentFormat::Cwt => "application/cwt",
            CoapContentFormat::CoseEncrypt => "application/cose; cose-type=\"cose-encrypt\"",
            CoapContentFormat::CoseMac => "application/cose; cose-type=\"cose-mac\"",
            CoapContentFormat::CoseSign => "application/cose; cose-type=\"cose-sign\"",
            CoapContentFormat::CoseKey => "application/cose-key",
            CoapContentFormat::CoseKeySet => "application/cose-key-set",
            CoapContentFormat::SenMlJson => "application/senml+json",
            CoapContentFormat::SensMlJson => "application/sensml+json",
            CoapContentFormat::SenMlCbor => "application/senml+cbor",
            CoapContentFormat::SensMlCbor => "application/sensml+cbor",
            CoapContentFormat::SenMlExi => "application/senml-exi",
            CoapContentFormat::SensMlExi => "application/sensml-exi",
            CoapContentFormat::CoapGroupJson => "application/coap-group+json",
            CoapContentFormat::DotsCbor => "application/dots+cbor",
            CoapContentFormat::SenMlXml => "application/senml+xml",
            CoapContentFormat::SensMlXml => "application/sensml+xml",
            CoapContentFormat::Other => "application/octet-stream",
        }
    }

    /// Looks up the content format for a media type string.
    ///
    /// Matching is case-insensitive. `text/plain` is accepted with any parameters, every other
    /// media type has to match its registered form exactly (parameters included).
    pub fn from_media_type(media_type: &str) -> Option<CoapContentFormat> {
        let normalized = media_type.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return None;
        }
        if normalized.starts_with("text/plain") {
            return Some(CoapContentFormat::TextPlain);
        }
        CONTENT_FORMAT_REGISTRY
            .iter()
            .copied()
            .find(|format| format.media_type() == normalized)
    }

    /// Returns whether this format carries CBOR-encoded data.
    pub fn is_cbor(&self) -> bool {
        matches!(
            self,
            CoapContentFormat::Cbor
                | CoapContentFormat::SenMlCbor
                | CoapContentFormat::SensMlCbor
                | CoapContentFormat::Cwt
                | CoapContentFormat::DotsCbor
        )
    }

    /// Returns whether this format carries JSON-encoded data.
    pub fn is_json(&self) -> bool {
        matches!(
            self,
            CoapContentFormat::Json
                | CoapContentFormat::SenMlJson
                | CoapContentFormat::SensMlJson
                | CoapContentFormat::CoapGroupJson
        )
    }

    /// Returns whether this format carries XML-encoded data.
    pub fn is_xml(&self) -> bool {
        matches!(
            self,
            CoapContentFormat::ApplicationXml | CoapContentFormat::SenMlXml | CoapContentFormat::SensMlXml
        )
    }

    /// Returns whether this format is human-readable text.
    pub fn is_text_based(&self) -> bool {
        *self == CoapContentFormat::TextPlain
            || *self == CoapContentFormat::LinkFormat
            || self.is_json()
            || self.is_xml()
    }

    pub fn is_binary(&self) -> bool {
        !self.is_text_based()
    }
}

const CONTENT_FORMAT_REGISTRY: [CoapContentFormat; 26] = [
    CoapContentFormat::TextPlain,
    CoapContentFormat::CoseEncrypt0,
    CoapContentFormat::CoseMac0,
    CoapContentFormat::CoseSign1,
    CoapContentFormat::LinkFormat,
    CoapContentFormat::ApplicationXml,
    CoapContentFormat::OctetStream,
    CoapContentFormat::Exi,
    CoapContentFormat::Json,
    CoapContentFormat::Cbor,
    CoapContentFormat::Cwt,
    CoapContentFormat::CoseEncrypt,
    CoapContentFormat::CoseMac,
    CoapContentFormat::CoseSign,
    CoapContentFormat::CoseKey,
    CoapContentFormat::CoseKeySet,
    CoapContentFormat::SenMlJson,
    CoapContentFormat::SensMlJson,
    CoapContentFormat::SenMlCbor,
    CoapContentFormat::SensMlCbor,
    CoapContentFormat::SenMlExi,
    CoapContentFormat::SensMlExi,
    CoapContentFormat::CoapGroupJson,
    CoapContentFormat::DotsCbor,
    CoapContentFormat::SenMlXml,
    CoapContentFormat::SensMlXml,
];

impl From<ContentFormat> for CoapContentFormat {
    fn from(value: u16) -> Self {
        <CoapContentFormat as FromPrimitive>::from_u16(value).unwrap_or(CoapContentFormat::Other)
    }
}

/// Representation of a CoAP message code.
/// Can be a request code, a response code, or the empty message code.
///
/// The numeric value (that can be obtained with [to_raw_code()](CoapMessageCode::to_raw_code()))
/// corresponds to the values defined in <https://www.iana.org/assignments/core-parameters/core-parameters.xhtml#codes>,
/// i.e. `class << 5 | detail`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CoapMessageCode {
    Empty,
    Request(CoapRequestCode),
    Response(CoapResponseCode),
}

impl CoapMessageCode {
    /// Returns the raw, single-byte representation of this message code.
    pub fn to_raw_code(self) -> u8 {
        match self {
            CoapMessageCode::Empty => 0,
            CoapMessageCode::Request(req) => req as u8,
            CoapMessageCode::Response(rsp) => rsp as u8,
        }
    }

    /// Returns the class part (the `c` in `c.dd`) of this code.
    pub fn class(self) -> u8 {
        self.to_raw_code() >> 5
    }

    /// Returns the detail part (the `dd` in `c.dd`) of this code.
    pub fn detail(self) -> u8 {
        self.to_raw_code() & 0x1f
    }

    /// Returns whether this is a 2.xx (Success) response code.
    pub fn is_success(self) -> bool {
        matches!(self, CoapMessageCode::Response(_)) && self.class() == 2
    }
}

impl Display for CoapMessageCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CoapMessageCode::Empty => write!(f, "0.00 Empty"),
            CoapMessageCode::Request(req) => write!(f, "0.{:02} {:?}", *req as u8, req),
            CoapMessageCode::Response(rsp) => write!(f, "{}", rsp),
        }
    }
}

impl From<CoapRequestCode> for CoapMessageCode {
    fn from(code: CoapRequestCode) -> Self {
        CoapMessageCode::Request(code)
    }
}

impl From<CoapResponseCode> for CoapMessageCode {
    fn from(code: CoapResponseCode) -> Self {
        CoapMessageCode::Response(code)
    }
}

impl TryFrom<u8> for CoapMessageCode {
    type Error = MessageCodeError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(CoapMessageCode::Empty),
            code => CoapRequestCode::try_from(code)
                .map(CoapMessageCode::Request)
                .or_else(|_| CoapResponseCode::try_from(code).map(CoapMessageCode::Response)),
        }
    }
}

/// Representation of a CoAP request/method code.
///
/// See <https://www.iana.org/assignments/core-parameters/core-parameters.xhtml#method-codes> for the
/// values currently registered with the IANA.
#[repr(u8)]
#[non_exhaustive]
#[derive(FromPrimitive, Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub enum CoapRequestCode {
    Get = 1,
    Post = 2,
    Put = 3,
    Delete = 4,
    Fetch = 5,
    Patch = 6,
    IPatch = 7,
}

impl TryFrom<u8> for CoapRequestCode {
    type Error = MessageCodeError;

    fn try_from(req: u8) -> Result<Self, Self::Error> {
        <CoapRequestCode as FromPrimitive>::from_u8(req).ok_or(MessageCodeError::NotARequestCode)
    }
}

/// Representation of a CoAP response code.
///
/// See <https://www.iana.org/assignments/core-parameters/core-parameters.xhtml#response-codes> for
/// the possible values currently registered with the IANA.
#[repr(u8)]
#[non_exhaustive]
#[derive(Clone, Copy, FromPrimitive, Debug, Eq, PartialEq, Hash)]
pub enum CoapResponseCode {
    Created = 65,
    Deleted = 66,
    Valid = 67,
    Changed = 68,
    Content = 69,
    Continue = 95,
    BadRequest = 128,
    Unauthorized = 129,
    BadOption = 130,
    Forbidden = 131,
    NotFound = 132,
    NotAllowed = 133,
    NotAcceptable = 134,
    Incomplete = 136,
    Conflict = 137,
    PreconditionFailed = 140,
    RequestTooLarge = 141,
    UnsupportedContentFormat = 143,
    Unprocessable = 150,
    TooManyRequests = 157,
    InternalError = 160,
    NotImplemented = 161,
    BadGateway = 162,
    ServiceUnavailable = 163,
    GatewayTimeout = 164,
    ProxyingNotSupported = 165,
    HopLimitReached = 168,
}

impl CoapResponseCode {
    /// Returns the class part of this response code (2, 4 or 5).
    pub fn class(self) -> u8 {
        (self as u8) >> 5
    }

    /// Returns the detail part of this response code.
    pub fn detail(self) -> u8 {
        (self as u8) & 0x1f
    }

    /// Returns whether this is a 2.xx (Success) response code.
    pub fn is_success(self) -> bool {
        self.class() == 2
    }

    /// Returns the reason phrase for this response code.
    pub fn phrase(self) -> &'static str {
        match self {
            CoapResponseCode::Created => "Created",
            CoapResponseCode::Deleted => "Deleted",
            CoapResponseCode::Valid => "Valid",
            CoapResponseCode::Changed => "Changed",
            CoapResponseCode::Content => "Content",
            CoapResponseCode::Continue => "Continue",
            CoapResponseCode::BadRequest => "Bad Request",
            CoapResponseCode::Unauthorized => "Unauthorized",
            CoapResponseCode::BadOption => "Bad Option",
            CoapResponseCode::Forbidden => "Forbidden",
            CoapResponseCode::NotFound => "Not Found",
            CoapResponseCode::NotAllowed => "Method Not Allowed",
            CoapResponseCode::NotAcceptable => "Not Acceptable",
            CoapResponseCode::Incomplete => "Request Entity Incomplete",
            CoapResponseCode::Conflict => "Conflict",
            CoapResponseCode::PreconditionFailed => "Precondition Failed",
            CoapResponseCode::RequestTooLarge => "Request Entity Too Large",
            CoapResponseCode::UnsupportedContentFormat => "Unsupported Content-Format",
            CoapResponseCode::Unprocessable => "Unprocessable Entity",
            CoapResponseCode::TooManyRequests => "Too Many Requests",
            CoapResponseCode::InternalError => "Internal Server Error",
            CoapResponseCode::NotImplemented => "Not Implemented",
            CoapResponseCode::BadGateway => "Bad Gateway",
            CoapResponseCode::ServiceUnavailable => "Service Unavailable",
            CoapResponseCode::GatewayTimeout => "Gateway Timeout",
            CoapResponseCode::ProxyingNotSupported => "Proxying Not Supported",
            CoapResponseCode::HopLimitReached => "Hop Limit Reached",
        }
    }
}

impl Display for CoapResponseCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02} {}", self.class(), self.detail(), self.phrase())
    }
}

impl TryFrom<u8> for CoapResponseCode {
    type Error = MessageCodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        <CoapResponseCode as FromPrimitive>::from_u8(value).ok_or(MessageCodeError::NotAResponseCode)
    }
}

/// CoAP message types as defined in [RFC 7252, Section 3](https://datatracker.ietf.org/doc/html/rfc7252#section-3)
/// and described in [RFC 7252, Section 4.2 and 4.3](https://datatracker.ietf.org/doc/html/rfc7252#section-4.2).
#[repr(u8)]
#[derive(Copy, Clone, Hash, Eq, PartialEq, FromPrimitive, Debug)]
pub enum CoapMessageType {
    /// Confirmable message, i.e. a message whose reception should be confirmed by the peer.
    Con = 0,
    /// Non-confirmable message, i.e. a message whose reception should not be confirmed by the peer.
    Non = 1,
    /// Acknowledgement for a previous message.
    Ack = 2,
    /// Non-acknowledgement for a previous message.
    Rst = 3,
}

impl TryFrom<u8> for CoapMessageType {
    type Error = MessageTypeError;

    fn try_from(raw_type: u8) -> Result<Self, Self::Error> {
        <CoapMessageType as FromPrimitive>::from_u8(raw_type).ok_or(MessageTypeError::UnknownType(raw_type))
    }
}

pub(crate) fn decode_var_len_u32(val: &[u8]) -> u32 {
    val.iter().fold(0u32, |acc, byte| (acc << 8) | u32::from(*byte))
}

pub(crate) fn encode_var_len_u32(val: u32) -> Box<[u8]> {
    let bytes_to_discard = (val.leading_zeros() / 8) as usize;
    val.to_be_bytes()[bytes_to_discard..].into()
}

pub(crate) fn decode_var_len_u16(val: &[u8]) -> u16 {
    val.iter().fold(0u16, |acc, byte| (acc << 8) | u16::from(*byte))
}

pub(crate) fn encode_var_len_u16(val: u16) -> Box<[u8]> {
    let bytes_to_discard = (val.leading_zeros() / 8) as usize;
    val.to_be_bytes()[bytes_to_discard..].into()
}

pub(crate) fn decode_var_len_u8(val: &[u8]) -> u8 {
    val.last().copied().unwrap_or(0)
}

pub(crate) fn encode_var_len_u8(val: u8) -> Box<[u8]> {
    if val == 0 {
        Box::new([])
    } else {
        Box::new([val])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_code_class_and_detail() {
        assert_eq!(CoapResponseCode::Content.class(), 2);
        assert_eq!(CoapResponseCode::Content.detail(), 5);
        assert_eq!(CoapResponseCode::NotFound.class(), 4);
        assert_eq!(CoapResponseCode::NotFound.detail(), 4);
        assert_eq!(CoapResponseCode::GatewayTimeout.to_string(), "5.04 Gateway Timeout");
        assert!(CoapMessageCode::from(CoapResponseCode::Continue).is_success());
        assert!(!CoapMessageCode::from(CoapRequestCode::Get).is_success());
    }

    #[test]
    fn raw_code_conversion() {
        assert_eq!(CoapMessageCode::try_from(0), Ok(CoapMessageCode::Empty));
        assert_eq!(CoapMessageCode::try_from(1), Ok(CoapMessageCode::Request(CoapRequestCode::Get)));
        assert_eq!(
            CoapMessageCode::try_from(69),
            Ok(CoapMessageCode::Response(CoapResponseCode::Content))
        );
        assert_eq!(CoapResponseCode::try_from(70), Err(MessageCodeError::NotAResponseCode));
    }

    #[test]
    fn option_type_from_number() {
        assert_eq!(CoapOptionType::try_from(27), Ok(CoapOptionType::Block1));
        assert_eq!(CoapOptionType::try_from(23), Ok(CoapOptionType::Block2));
        assert_eq!(CoapOptionType::try_from(6), Ok(CoapOptionType::Observe));
        assert_eq!(CoapOptionType::try_from(2), Err(UnknownOptionError::Unknown));
    }

    #[test]
    fn var_len_integers_use_minimal_length() {
        assert_eq!(encode_var_len_u32(0).len(), 0);
        assert_eq!(encode_var_len_u32(0xff).as_ref(), &[0xff]);
        assert_eq!(encode_var_len_u32(0x1_0000).as_ref(), &[0x01, 0x00, 0x00]);
        assert_eq!(decode_var_len_u32(&[0x01, 0x00, 0x00]), 0x1_0000);
        assert_eq!(decode_var_len_u32(&[]), 0);
        assert_eq!(encode_var_len_u16(5683).as_ref(), &[0x16, 0x33]);
        assert_eq!(decode_var_len_u16(&[0x16, 0x33]), 5683);
    }

    #[test]
    fn content_format_media_types() {
        assert_eq!(CoapContentFormat::Json.media_type(), "application/json");
        assert_eq!(
            CoapContentFormat::from_media_type("Text/Plain; charset=utf-8"),
            Some(CoapContentFormat::TextPlain)
        );
        assert_eq!(
            CoapContentFormat::from_media_type("application/senml+cbor"),
            Some(CoapContentFormat::SenMlCbor)
        );
        assert_eq!(CoapContentFormat::from_media_type("image/png"), None);
        assert_eq!(CoapContentFormat::from_media_type("  "), None);
        assert_eq!(CoapContentFormat::from(60), CoapContentFormat::Cbor);
        assert_eq!(CoapContentFormat::from(9999), CoapContentFormat::Other);
    }

    #[test]
    fn content_format_families() {
        assert!(CoapContentFormat::Cbor.is_cbor());
        assert!(CoapContentFormat::Cwt.is_binary());
        assert!(CoapContentFormat::SensMlJson.is_json());
        assert!(CoapContentFormat::SenMlXml.is_text_based());
        assert!(CoapContentFormat::LinkFormat.is_text_based());
        assert!(CoapContentFormat::OctetStream.is_binary());
    }
}
