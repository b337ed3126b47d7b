// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The coap-engine Contributors, all rights reserved.
 * This file is part of the coap-engine project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * message/response.rs - Types wrapping messages into responses.
 */

use bytes::Bytes;

use crate::{
    error::{MessageCodeError, MessageConversionError},
    message::{CoapMessage, CoapMessageCommon, CoapOption},
    protocol::{CoapContentFormat, CoapMessageCode, CoapResponseCode, ContentFormat, ETag, MaxAge, Observe, Size},
};

/// Representation of a CoAP response message.
///
/// The payload of a response that was transferred block-wise is the fully reassembled
/// representation, the options are those of the first block.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct CoapResponse {
    pdu: CoapMessage,
    code: CoapResponseCode,
    content_format: Option<ContentFormat>,
    max_age: Option<MaxAge>,
    etag: Option<ETag>,
    location_path: Vec<String>,
    location_query: Vec<String>,
    observe: Option<Observe>,
    size2: Option<Size>,
}

impl CoapResponse {
    /// Parses the given [CoapMessage] into a CoapResponse.
    ///
    /// For options that may only appear once, the first occurrence is used.
    ///
    /// # Errors
    /// Fails if the message code is not a response code.
    pub fn from_message(pdu: CoapMessage) -> Result<CoapResponse, MessageConversionError> {
        let code = match pdu.code() {
            CoapMessageCode::Response(code) => code,
            _ => return Err(MessageCodeError::NotAResponseCode.into()),
        };
        let mut content_format = None;
        let mut max_age = None;
        let mut etag = None;
        let mut location_path = Vec::new();
        let mut location_query = Vec::new();
        let mut observe = None;
        let mut size2 = None;
        for option in pdu.options_iter() {
            match option {
                CoapOption::ContentFormat(value) => {
                    content_format.get_or_insert(*value);
                },
                CoapOption::MaxAge(value) => {
                    max_age.get_or_insert(*value);
                },
                CoapOption::ETag(value) => {
                    etag.get_or_insert_with(|| value.clone());
                },
                CoapOption::LocationPath(value) => location_path.push(value.clone()),
                CoapOption::LocationQuery(value) => location_query.push(value.clone()),
                CoapOption::Observe(value) => {
                    observe.get_or_insert(*value);
                },
                CoapOption::Size2(value) => {
                    size2.get_or_insert(*value);
                },
                _ => {},
            }
        }
        Ok(CoapResponse {
            pdu,
            code,
            content_format,
            max_age,
            etag,
            location_path,
            location_query,
            observe,
            size2,
        })
    }

    /// Replaces the payload of this response, e.g. by a reassembled block-wise representation.
    pub(crate) fn with_payload(mut self, payload: Bytes) -> CoapResponse {
        self.pdu.set_data(payload);
        self
    }

    /// Returns the response code of this response.
    pub fn status(&self) -> CoapResponseCode {
        self.code
    }

    /// Returns whether this response carries a 2.xx (Success) code.
    pub fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Returns the payload of this response.
    pub fn payload(&self) -> &Bytes {
        self.pdu.data()
    }

    /// Returns the "Content-Format" option value of this response.
    pub fn content_format(&self) -> Option<ContentFormat> {
        self.content_format
    }

    /// Returns the content format of this response as a known [CoapContentFormat].
    pub fn known_content_format(&self) -> Option<CoapContentFormat> {
        self.content_format.map(CoapContentFormat::from)
    }

    /// Returns the "Max-Age" option value of this response.
    ///
    /// A missing option implies a value of 60 seconds
    /// ([RFC 7252, Section 5.10.5](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.5)).
    pub fn max_age(&self) -> Option<MaxAge> {
        self.max_age
    }

    /// Returns the "ETag" option value of this response.
    pub fn etag(&self) -> Option<&ETag> {
        self.etag.as_ref()
    }

    /// Returns the "Location-Path" segments of this response.
    pub fn location_path(&self) -> &[String] {
        &self.location_path
    }

    /// Returns the "Location-Query" components of this response.
    pub fn location_query(&self) -> &[String] {
        &self.location_query
    }

    /// Returns the "Observe" option value of this response.
    pub fn observe(&self) -> Option<Observe> {
        self.observe
    }

    /// Returns the "Size2" option value of this response.
    pub fn size2(&self) -> Option<Size> {
        self.size2
    }

    /// Converts this response back into the underlying [CoapMessage].
    pub fn into_message(self) -> CoapMessage {
        self.pdu
    }
}

impl CoapMessageCommon for CoapResponse {
    fn as_message(&self) -> &CoapMessage {
        &self.pdu
    }

    fn as_message_mut(&mut self) -> &mut CoapMessage {
        &mut self.pdu
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{CoapMessageType, CoapRequestCode};

    #[test]
    fn response_from_message_extracts_options() {
        let mut message = CoapMessage::new(CoapMessageType::Ack, CoapResponseCode::Created.into());
        message.add_option(CoapOption::LocationPath("items".to_string()));
        message.add_option(CoapOption::LocationPath("17".to_string()));
        message.add_option(CoapOption::ContentFormat(60));
        message.add_option(CoapOption::ContentFormat(50));
        message.add_option(CoapOption::MaxAge(30));
        message.add_option(CoapOption::ETag(Box::new([1, 2])));
        message.set_data(&b"ok"[..]);

        let response = CoapResponse::from_message(message).unwrap();
        assert_eq!(response.status(), CoapResponseCode::Created);
        assert!(response.is_success());
        assert_eq!(response.location_path(), ["items", "17"]);
        assert_eq!(response.content_format(), Some(60));
        assert_eq!(response.known_content_format(), Some(CoapContentFormat::Cbor));
        assert_eq!(response.max_age(), Some(30));
        assert_eq!(response.etag().map(|v| v.as_ref()), Some(&[1u8, 2][..]));
        assert_eq!(response.payload().as_ref(), b"ok");

        let response = response.with_payload(Bytes::from_static(b"replaced"));
        assert_eq!(response.payload().as_ref(), b"replaced");
    }

    #[test]
    fn non_response_codes_are_rejected() {
        let message = CoapMessage::new(CoapMessageType::Con, CoapRequestCode::Get.into());
        assert_eq!(
            CoapResponse::from_message(message),
            Err(MessageConversionError::InvalidMessageCode(MessageCodeError::NotAResponseCode))
        );
    }
}
