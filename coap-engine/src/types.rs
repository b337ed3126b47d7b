// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The coap-engine Contributors, all rights reserved.
 * This file is part of the coap-engine project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * types.rs - General type declarations for CoAP messages and URIs.
 */

//! Types required for conversion between CoAP URIs and message options.

use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

#[cfg(feature = "url")]
use url::Url;

use crate::{
    error::UriParsingError,
    message::CoapOption,
    protocol::{UriPort, COAPS_DEFAULT_PORT, COAP_DEFAULT_PORT},
};

/// Maximum length of a single URI path or query segment in bytes.
pub const MAX_URI_SEGMENT_LENGTH: usize = 255;

/// Identifier of a CoAP message, used to match acknowledgements and piggybacked responses to requests.
pub type CoapMessageId = u16;

/// Representation for a URI scheme that can be used in CoAP requests.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CoapUriScheme {
    Coap,
    Coaps,
    CoapTcp,
    CoapsTcp,
    CoapWs,
    CoapsWs,
}

impl CoapUriScheme {
    pub fn is_secure(self) -> bool {
        matches!(self, CoapUriScheme::Coaps | CoapUriScheme::CoapsTcp | CoapUriScheme::CoapsWs)
    }

    /// Returns the port used for this scheme if a URI does not specify one.
    pub fn default_port(self) -> UriPort {
        match self {
            CoapUriScheme::Coap | CoapUriScheme::CoapTcp => COAP_DEFAULT_PORT,
            CoapUriScheme::Coaps | CoapUriScheme::CoapsTcp => COAPS_DEFAULT_PORT,
            CoapUriScheme::CoapWs => 80,
            CoapUriScheme::CoapsWs => 443,
        }
    }
}

impl FromStr for CoapUriScheme {
    type Err = UriParsingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "coap" => Ok(CoapUriScheme::Coap),
            "coaps" => Ok(CoapUriScheme::Coaps),
            "coap+tcp" => Ok(CoapUriScheme::CoapTcp),
            "coaps+tcp" => Ok(CoapUriScheme::CoapsTcp),
            "coap+ws" => Ok(CoapUriScheme::CoapWs),
            "coaps+ws" => Ok(CoapUriScheme::CoapsWs),
            _ => Err(UriParsingError::NotACoapScheme(s.to_string())),
        }
    }
}

impl Display for CoapUriScheme {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CoapUriScheme::Coap => "coap",
            CoapUriScheme::Coaps => "coaps",
            CoapUriScheme::CoapTcp => "coap+tcp",
            CoapUriScheme::CoapsTcp => "coaps+tcp",
            CoapUriScheme::CoapWs => "coap+ws",
            CoapUriScheme::CoapsWs => "coaps+ws",
        })
    }
}

/// Representation of a URI for CoAP requests.
///
/// A URI may be absolute (`coap://example.com:4711/foo/bar?answer=42`) or relative
/// (`/foo/bar?answer=42`). Relative URIs are resolved against the endpoint the client is connected
/// to, i.e. they only produce Uri-Path and Uri-Query options.
///
/// # Note on URI Length Limits
///
/// Due to [the specified limits](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10)
/// of CoAP option lengths, each individual path segment, query component and the host name must
/// not exceed 255 bytes.
///
/// Segments are used verbatim, percent-encoded octets are not decoded.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct CoapUri {
    scheme: Option<CoapUriScheme>,
    host: Option<String>,
    port: Option<UriPort>,
    path: Vec<String>,
    query: Vec<String>,
}

impl CoapUri {
    /// Creates a new relative [CoapUri] from path and query segments.
    ///
    /// # Errors
    /// Fails if a segment exceeds [MAX_URI_SEGMENT_LENGTH].
    pub fn new_relative<P, Q>(path: P, query: Q) -> Result<CoapUri, UriParsingError>
    where
        P: IntoIterator,
        P::Item: Into<String>,
        Q: IntoIterator,
        Q::Item: Into<String>,
    {
        let uri = CoapUri {
            path: path.into_iter().map(Into::into).collect(),
            query: query.into_iter().map(Into::into).collect(),
            ..CoapUri::default()
        };
        uri.check_segment_lengths()?;
        Ok(uri)
    }

    /// Attempts to parse the provided `uri_str` into a [CoapUri].
    ///
    /// # Examples
    /// ```
    /// use coap_engine::error::UriParsingError;
    /// use coap_engine::types::{CoapUri, CoapUriScheme};
    ///
    /// let uri: CoapUri = CoapUri::try_from_str("coap://example.com:4711/foo/bar?answer=42")?;
    ///
    /// assert_eq!(uri.scheme(), Some(CoapUriScheme::Coap));
    /// assert_eq!(uri.host(), Some("example.com"));
    /// assert_eq!(uri.port(), Some(4711));
    /// assert_eq!(uri.path(), ["foo", "bar"]);
    /// assert_eq!(uri.query(), ["answer=42"]);
    ///
    /// # Result::<(), UriParsingError>::Ok(())
    /// ```
    pub fn try_from_str(uri_str: &str) -> Result<CoapUri, UriParsingError> {
        if uri_str.contains('#') {
            return Err(UriParsingError::ContainsFragment);
        }
        let mut uri = CoapUri::default();
        let mut rest = uri_str;
        if let Some((scheme, after_scheme)) = rest.split_once("://") {
            uri.scheme = Some(CoapUriScheme::from_str(scheme)?);
            let authority_end = after_scheme.find(['/', '?']).unwrap_or(after_scheme.len());
            let (authority, remainder) = after_scheme.split_at(authority_end);
            let (host, port) = split_authority(authority)?;
            if host.is_empty() {
                return Err(UriParsingError::MissingHost);
            }
            uri.host = Some(host.to_string());
            uri.port = port;
            rest = remainder;
        }
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };
        uri.path = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(String::from)
            .collect();
        if let Some(query) = query {
            uri.query = query
                .split('&')
                .filter(|component| !component.is_empty())
                .map(String::from)
                .collect();
        }
        uri.check_segment_lengths()?;
        Ok(uri)
    }

    /// Attempts to convert a [Url] into a [CoapUri].
    #[cfg(feature = "url")]
    pub fn try_from_url(url: &Url) -> Result<CoapUri, UriParsingError> {
        Self::try_from_str(url.as_str())
    }

    /// Returns the scheme part of this URI, if the URI is absolute.
    pub fn scheme(&self) -> Option<CoapUriScheme> {
        self.scheme
    }

    /// Returns the host part of this URI, if the URI is absolute.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Returns the explicitly specified port of this URI.
    pub fn port(&self) -> Option<UriPort> {
        self.port
    }

    /// Returns the path segments of this URI.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Returns the query components of this URI.
    pub fn query(&self) -> &[String] {
        &self.query
    }

    /// Appends a query component (e.g. `"answer=42"`) to this URI.
    pub fn add_query(&mut self, component: impl Into<String>) -> Result<(), UriParsingError> {
        let component = component.into();
        if component.len() > MAX_URI_SEGMENT_LENGTH {
            return Err(UriParsingError::SegmentTooLong);
        }
        self.query.push(component);
        Ok(())
    }

    /// Converts the given URI into a `Vec` of [CoapOption]s that can be added to a
    /// [crate::message::CoapMessage].
    ///
    /// Uri-Port is only emitted if it differs from the default port of the scheme.
    pub fn into_options(self) -> Vec<CoapOption> {
        let mut options = Vec::with_capacity(2 + self.path.len() + self.query.len());
        if let Some(host) = self.host {
            options.push(CoapOption::UriHost(host));
        }
        if let Some(port) = self.port {
            let default_port = self.scheme.map(CoapUriScheme::default_port);
            if default_port != Some(port) {
                options.push(CoapOption::UriPort(port));
            }
        }
        options.extend(self.path.into_iter().map(CoapOption::UriPath));
        options.extend(self.query.into_iter().map(CoapOption::UriQuery));
        options
    }

    fn check_segment_lengths(&self) -> Result<(), UriParsingError> {
        let too_long = self
            .host
            .iter()
            .chain(self.path.iter())
            .chain(self.query.iter())
            .any(|segment| segment.len() > MAX_URI_SEGMENT_LENGTH);
        if too_long {
            Err(UriParsingError::SegmentTooLong)
        } else {
            Ok(())
        }
    }
}

fn split_authority(authority: &str) -> Result<(&str, Option<UriPort>), UriParsingError> {
    // IPv6 literals are enclosed in brackets and contain colons themselves.
    let (host, port) = if let Some(stripped) = authority.strip_prefix('[') {
        match stripped.split_once(']') {
            Some((host, remainder)) => (host, remainder.strip_prefix(':')),
            None => return Err(UriParsingError::MissingHost),
        }
    } else {
        match authority.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        }
    };
    let port = match port {
        Some(port) => Some(
            port.parse::<UriPort>()
                .map_err(|_| UriParsingError::InvalidPort(port.to_string()))?,
        ),
        None => None,
    };
    Ok((host, port))
}

#[cfg(feature = "url")]
impl TryFrom<&Url> for CoapUri {
    type Error = UriParsingError;

    fn try_from(value: &Url) -> Result<Self, Self::Error> {
        CoapUri::try_from_url(value)
    }
}

impl FromStr for CoapUri {
    type Err = UriParsingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from_str(s)
    }
}

impl Display for CoapUri {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let (Some(scheme), Some(host)) = (self.scheme, self.host.as_ref()) {
            if host.contains(':') {
                write!(f, "{}://[{}]", scheme, host)?;
            } else {
                write!(f, "{}://{}", scheme, host)?;
            }
            if let Some(port) = self.port {
                write!(f, ":{}", port)?;
            }
        }
        for segment in &self.path {
            write!(f, "/{}", segment)?;
        }
        if self.path.is_empty() && self.scheme.is_none() {
            f.write_str("/")?;
        }
        let mut separator = '?';
        for component in &self.query {
            write!(f, "{}{}", separator, component)?;
            separator = '&';
        }
        Ok(())
    }
}
