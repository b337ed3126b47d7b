// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The coap-engine Contributors, all rights reserved.
 * This file is part of the coap-engine project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * message.rs - Types related to CoAP messages.
 */

//! Types related to message handling.
//!
//! [CoapMessage] is the structured form of a CoAP message as it is exchanged with a
//! [CoapTransport](crate::transport::CoapTransport). Encoding it into octets is up to the transport.
//!
//! [CoapRequest] and [CoapResponse] wrap around a [CoapMessage] and provide easier access to the
//! options typically used in requests and responses.

use std::slice::Iter;

use bytes::Bytes;
use num_traits::FromPrimitive;

pub use request::CoapRequest;
pub use response::CoapResponse;

use crate::{
    error::{MessageConversionError, OptionValueError},
    protocol::{
        decode_var_len_u16, decode_var_len_u32, decode_var_len_u8, encode_var_len_u16, encode_var_len_u32,
        encode_var_len_u8, Block, CoapMatch, CoapMessageCode, CoapMessageType, CoapOptionNum, CoapOptionType,
        CoapToken, ContentFormat, ETag, HopLimit, MaxAge, NoResponse, Observe, ProxyScheme, ProxyUri, Size, UriHost,
        UriPath, UriPort, UriQuery, COAP_TOKEN_MAX_LEN,
    },
    types::CoapMessageId,
};

pub mod request;
pub mod response;

/// Representation of a CoAP option including its value.
///
/// For an enum describing the possible option types (and their associated option numbers), see
/// [CoapOptionType], for the data type representing option numbers, see [CoapOptionNum]
#[derive(Debug, Hash, Eq, PartialEq, Clone)]
pub enum CoapOption {
    IfMatch(CoapMatch),
    IfNoneMatch,
    UriHost(UriHost),
    UriPort(UriPort),
    UriPath(UriPath),
    UriQuery(UriQuery),
    LocationPath(UriPath),
    LocationQuery(UriQuery),
    ProxyUri(ProxyUri),
    ProxyScheme(ProxyScheme),
    ContentFormat(ContentFormat),
    Accept(ContentFormat),
    Size1(Size),
    Size2(Size),
    Block1(Block),
    Block2(Block),
    HopLimit(HopLimit),
    NoResponse(NoResponse),
    ETag(ETag),
    MaxAge(MaxAge),
    Observe(Observe),
    Other(CoapOptionNum, Box<[u8]>),
}

impl CoapOption {
    /// Creates a CoAP option from its option number and raw value bytes as found on the wire.
    ///
    /// Unknown option numbers are mapped to [CoapOption::Other].
    pub fn from_value_bytes(number: CoapOptionNum, value: &[u8]) -> Result<CoapOption, OptionValueError> {
        let opt_type = match CoapOptionType::try_from(number) {
            Ok(opt_type) => opt_type,
            Err(_) => return Ok(CoapOption::Other(number, value.into())),
        };
        if opt_type.min_len() > value.len() {
            return Err(OptionValueError::TooShort);
        } else if opt_type.max_len() < value.len() {
            return Err(OptionValueError::TooLong);
        }
        let string_value = || String::from_utf8(value.to_vec());
        Ok(match opt_type {
            CoapOptionType::IfMatch => CoapOption::IfMatch(if value.is_empty() {
                CoapMatch::Empty
            } else {
                CoapMatch::ETag(value.into())
            }),
            CoapOptionType::UriHost => CoapOption::UriHost(string_value()?),
            CoapOptionType::ETag => CoapOption::ETag(value.into()),
            CoapOptionType::IfNoneMatch => CoapOption::IfNoneMatch,
            CoapOptionType::Observe => CoapOption::Observe(decode_var_len_u32(value)),
            CoapOptionType::UriPort => CoapOption::UriPort(decode_var_len_u16(value)),
            CoapOptionType::LocationPath => CoapOption::LocationPath(string_value()?),
            CoapOptionType::UriPath => CoapOption::UriPath(string_value()?),
            CoapOptionType::ContentFormat => CoapOption::ContentFormat(decode_var_len_u16(value)),
            CoapOptionType::MaxAge => CoapOption::MaxAge(decode_var_len_u32(value)),
            CoapOptionType::UriQuery => CoapOption::UriQuery(string_value()?),
            CoapOptionType::HopLimit => CoapOption::HopLimit(decode_var_len_u16(value)),
            CoapOptionType::Accept => CoapOption::Accept(decode_var_len_u16(value)),
            CoapOptionType::LocationQuery => CoapOption::LocationQuery(string_value()?),
            CoapOptionType::Block2 => CoapOption::Block2(decode_var_len_u32(value)),
            CoapOptionType::Block1 => CoapOption::Block1(decode_var_len_u32(value)),
            CoapOptionType::Size2 => CoapOption::Size2(decode_var_len_u32(value)),
            CoapOptionType::ProxyUri => CoapOption::ProxyUri(string_value()?),
            CoapOptionType::ProxyScheme => CoapOption::ProxyScheme(string_value()?),
            CoapOptionType::Size1 => CoapOption::Size1(decode_var_len_u32(value)),
            CoapOptionType::NoResponse => CoapOption::NoResponse(decode_var_len_u8(value)),
        })
    }

    /// Returns the option number associated with this option.
    pub fn number(&self) -> CoapOptionNum {
        match self {
            CoapOption::IfMatch(_) => CoapOptionType::IfMatch as u16,
            CoapOption::IfNoneMatch => CoapOptionType::IfNoneMatch as u16,
            CoapOption::UriHost(_) => CoapOptionType::UriHost as u16,
            CoapOption::UriPort(_) => CoapOptionType::UriPort as u16,
            CoapOption::UriPath(_) => CoapOptionType::UriPath as u16,
            CoapOption::UriQuery(_) => CoapOptionType::UriQuery as u16,
            CoapOption::LocationPath(_) => CoapOptionType::LocationPath as u16,
            CoapOption::LocationQuery(_) => CoapOptionType::LocationQuery as u16,
            CoapOption::ProxyUri(_) => CoapOptionType::ProxyUri as u16,
            CoapOption::ProxyScheme(_) => CoapOptionType::ProxyScheme as u16,
            CoapOption::ContentFormat(_) => CoapOptionType::ContentFormat as u16,
            CoapOption::Accept(_) => CoapOptionType::Accept as u16,
            CoapOption::Size1(_) => CoapOptionType::Size1 as u16,
            CoapOption::Size2(_) => CoapOptionType::Size2 as u16,
            CoapOption::Block1(_) => CoapOptionType::Block1 as u16,
            CoapOption::Block2(_) => CoapOptionType::Block2 as u16,
            CoapOption::HopLimit(_) => CoapOptionType::HopLimit as u16,
            CoapOption::NoResponse(_) => CoapOptionType::NoResponse as u16,
            CoapOption::ETag(_) => CoapOptionType::ETag as u16,
            CoapOption::MaxAge(_) => CoapOptionType::MaxAge as u16,
            CoapOption::Observe(_) => CoapOptionType::Observe as u16,
            CoapOption::Other(num, _) => *num,
        }
    }

    /// Returns the known option type of this option, or `None` for [CoapOption::Other].
    pub fn option_type(&self) -> Option<CoapOptionType> {
        <CoapOptionType as FromPrimitive>::from_u16(self.number())
    }

    /// Converts the option into a `Box<[u8]>` containing the value bytes.
    ///
    /// Unsigned integer values are encoded in network byte order using as few bytes as possible.
    pub fn into_value_bytes(self) -> Result<Box<[u8]>, OptionValueError> {
        let opt_type = self.option_type();
        let bytes = match self {
            CoapOption::IfMatch(val) => match val {
                CoapMatch::ETag(tag) => tag,
                CoapMatch::Empty => Box::new([]),
            },
            CoapOption::IfNoneMatch => Box::new([]),
            CoapOption::UriHost(value) => value.into_boxed_str().into_boxed_bytes(),
            CoapOption::UriPort(value) => encode_var_len_u16(value),
            CoapOption::UriPath(value) => value.into_boxed_str().into_boxed_bytes(),
            CoapOption::UriQuery(value) => value.into_boxed_str().into_boxed_bytes(),
            CoapOption::LocationPath(value) => value.into_boxed_str().into_boxed_bytes(),
            CoapOption::LocationQuery(value) => value.into_boxed_str().into_boxed_bytes(),
            CoapOption::ProxyUri(value) => value.into_boxed_str().into_boxed_bytes(),
            CoapOption::ProxyScheme(value) => value.into_boxed_str().into_boxed_bytes(),
            CoapOption::ContentFormat(value) => encode_var_len_u16(value),
            CoapOption::Accept(value) => encode_var_len_u16(value),
            CoapOption::Size1(value) => encode_var_len_u32(value),
            CoapOption::Size2(value) => encode_var_len_u32(value),
            CoapOption::Block1(value) => encode_var_len_u32(value),
            CoapOption::Block2(value) => encode_var_len_u32(value),
            CoapOption::HopLimit(value) => encode_var_len_u16(value),
            CoapOption::NoResponse(value) => encode_var_len_u8(value),
            CoapOption::ETag(value) => value,
            CoapOption::MaxAge(value) => encode_var_len_u32(value),
            CoapOption::Observe(value) => encode_var_len_u32(value),
            CoapOption::Other(_num, data) => data,
        };
        if let Some(opt_type) = opt_type {
            if bytes.len() < opt_type.min_len() {
                return Err(OptionValueError::TooShort);
            } else if bytes.len() > opt_type.max_len() {
                return Err(OptionValueError::TooLong);
            }
        }
        Ok(bytes)
    }
}

/// Interface for CoAP messages common between requests, responses and other messages.
pub trait CoapMessageCommon {
    /// Add the supplied CoAP option to this message.
    fn add_option(&mut self, option: CoapOption) {
        self.as_message_mut().options.push(option);
    }

    /// Replaces all options with the number of `option` by `option` itself.
    ///
    /// The new option is appended after all remaining options.
    fn set_option(&mut self, option: CoapOption) {
        let number = option.number();
        let options = &mut self.as_message_mut().options;
        options.retain(|existing| existing.number() != number);
        options.push(option);
    }

    /// Removes all options with the given option number.
    fn remove_options(&mut self, number: CoapOptionNum) {
        self.as_message_mut()
            .options
            .retain(|existing| existing.number() != number);
    }

    /// Clear the list of options that were added to this message using [add_option()](CoapMessageCommon::add_option()).
    fn clear_options(&mut self) {
        self.as_message_mut().options.clear();
    }

    /// Returns the first option with the given option number.
    fn option(&self, number: CoapOptionNum) -> Option<&CoapOption> {
        self.as_message().options.iter().find(|option| option.number() == number)
    }

    /// Returns an iterator over the options contained in this message.
    fn options_iter(&self) -> Iter<CoapOption> {
        self.as_message().options.iter()
    }

    /// Returns the CoAP message type (confirmable, non-confirmable, acknowledgement, rst) of this message.
    fn type_(&self) -> CoapMessageType {
        self.as_message().type_
    }

    /// Sets the CoAP message type (confirmable, non-confirmable, acknowledgement, rst) of this message.
    fn set_type_(&mut self, type_: CoapMessageType) {
        self.as_message_mut().type_ = type_;
    }

    /// Returns the message code of this message.
    fn code(&self) -> CoapMessageCode {
        self.as_message().code
    }

    /// Sets the message code of this message.
    fn set_code(&mut self, code: CoapMessageCode) {
        self.as_message_mut().code = code;
    }

    /// Returns the CoAP message ID for this message.
    fn mid(&self) -> CoapMessageId {
        self.as_message().mid
    }

    /// Sets the CoAP message ID for this message.
    fn set_mid(&mut self, mid: CoapMessageId) {
        self.as_message_mut().mid = mid;
    }

    /// Returns a reference to the data/body of this message.
    fn data(&self) -> &Bytes {
        &self.as_message().data
    }

    /// Sets the data/body of this message.
    fn set_data<D: Into<Bytes>>(&mut self, data: D) {
        self.as_message_mut().data = data.into();
    }

    /// Returns the message token.
    fn token(&self) -> &[u8] {
        &self.as_message().token
    }

    /// Sets the message token.
    ///
    /// Note that [CoapClient](crate::client::CoapClient) assigns a fresh token to every request
    /// it sends.
    fn set_token<D: Into<CoapToken>>(&mut self, token: D) {
        self.as_message_mut().token = token.into();
    }

    /// Returns a reference to this message.
    fn as_message(&self) -> &CoapMessage;
    /// Returns a mutable reference to this message.
    fn as_message_mut(&mut self) -> &mut CoapMessage;
}

/// Representation of a CoAP message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoapMessage {
    /// CoAP message type (CON, NON, ACK, RST).
    type_: CoapMessageType,
    /// CoAP message code (e.g. 2.05 Content or 4.04 Not Found)
    code: CoapMessageCode,
    /// ID of this message – unique to each outstanding message sent over this connection.
    mid: CoapMessageId,
    /// List of CoAP options associated with this message, in insertion order.
    options: Vec<CoapOption>,
    /// CoAP message token – used for request-notification-matching.
    token: CoapToken,
    /// Message body of this message.
    data: Bytes,
}

impl CoapMessage {
    /// Creates a new CoAP message with the given type and code.
    pub fn new(type_: CoapMessageType, code: CoapMessageCode) -> CoapMessage {
        CoapMessage {
            type_,
            code,
            mid: 0,
            options: Vec::new(),
            token: Box::new([]),
            data: Bytes::new(),
        }
    }

    /// Returns the value of the first Observe option.
    pub fn observe(&self) -> Option<Observe> {
        match self.option(CoapOptionType::Observe as u16) {
            Some(CoapOption::Observe(value)) => Some(*value),
            _ => None,
        }
    }

    /// Returns the raw value of the first Block1 option.
    pub fn block1(&self) -> Option<Block> {
        match self.option(CoapOptionType::Block1 as u16) {
            Some(CoapOption::Block1(value)) => Some(*value),
            _ => None,
        }
    }

    /// Returns the raw value of the first Block2 option.
    pub fn block2(&self) -> Option<Block> {
        match self.option(CoapOptionType::Block2 as u16) {
            Some(CoapOption::Block2(value)) => Some(*value),
            _ => None,
        }
    }

    /// Returns the value of the first Size2 option.
    pub fn size2(&self) -> Option<Size> {
        match self.option(CoapOptionType::Size2 as u16) {
            Some(CoapOption::Size2(value)) => Some(*value),
            _ => None,
        }
    }

    /// Checks that this message can be put on the wire: the token must not exceed eight bytes,
    /// every option value must have a valid length and empty messages must not carry data.
    pub fn validate(&self) -> Result<(), MessageConversionError> {
        if self.token.len() > COAP_TOKEN_MAX_LEN {
            return Err(MessageConversionError::TokenTooLong(self.token.len()));
        }
        if self.code == CoapMessageCode::Empty && !self.data.is_empty() {
            return Err(MessageConversionError::DataInEmptyMessage);
        }
        for option in &self.options {
            let opt_type = option.option_type();
            option
                .clone()
                .into_value_bytes()
                .map_err(|e| MessageConversionError::InvalidOptionValue(opt_type, e))?;
        }
        Ok(())
    }
}

impl CoapMessageCommon for CoapMessage {
    fn as_message(&self) -> &CoapMessage {
        self
    }

    fn as_message_mut(&mut self) -> &mut CoapMessage {
        self
    }
}

impl From<CoapResponse> for CoapMessage {
    fn from(val: CoapResponse) -> Self {
        val.into_message()
    }
}
