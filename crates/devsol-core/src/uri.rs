//! # Code Object Locators
//!
//! Parsing of the URIs the device runtime uses to say where a code object's
//! bytes live:
//!
//! ```text
//! file:///opt/app/kernels.hsaco?offset=0x2000&size=4096
//! memory://4242#offset=0x7f0012340000&size=8192
//! ```
//!
//! The part before `://` is the protocol (case-insensitive). The path runs up
//! to the first `?` or `#` and is percent-decoded. Everything after that is a
//! list of `key=value` pairs separated by `&`; the first occurrence of a key
//! wins and tokens without `=` are ignored.

use std::fmt;

use smallvec::SmallVec;

use crate::error::{LoaderError, Result};

/// Separator between protocol and path; its presence is what marks a module
/// name as a locator rather than a plain filesystem path.
pub const PROTOCOL_DELIMITER: &str = "://";

/// Protocols the loader knows how to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol
{
    /// Bytes live in a file on the target, optionally at an offset.
    File,
    /// Bytes live in the memory of the process named by the path.
    Memory,
}

impl fmt::Display for Protocol
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Protocol::File => write!(f, "file"),
            Protocol::Memory => write!(f, "memory"),
        }
    }
}

/// Whether `name` should be resolved as a locator rather than opened as a path.
#[must_use]
pub fn is_locator(name: &str) -> bool
{
    name.contains(PROTOCOL_DELIMITER)
}

/// A parsed code object locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeObjectUri
{
    raw: String,
    protocol: String,
    raw_path: String,
    path: String,
    params: SmallVec<[(String, String); 4]>,
}

impl CodeObjectUri
{
    /// Split `uri` into protocol, decoded path and query parameters.
    ///
    /// Parsing never inspects the parameter values; see [`offset`](Self::offset)
    /// and [`size`](Self::size).
    ///
    /// # Errors
    ///
    /// `MalformedUri` if `uri` has no `://`, `NonUtf8Path` if the decoded
    /// path is not valid UTF-8.
    pub fn parse(uri: &str) -> Result<Self>
    {
        let (protocol, rest) = uri
            .split_once(PROTOCOL_DELIMITER)
            .ok_or_else(|| LoaderError::MalformedUri(uri.to_string()))?;

        let (raw_path, query) = match rest.find(|c| c == '#' || c == '?') {
            Some(end) => (&rest[..end], Some(&rest[end + 1..])),
            None => (rest, None),
        };

        let params = query
            .into_iter()
            .flat_map(|query| query.split('&'))
            .filter_map(|token| token.split_once('='))
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        Ok(Self {
            raw: uri.to_string(),
            protocol: protocol.to_ascii_lowercase(),
            raw_path: raw_path.to_string(),
            path: percent_decode(raw_path).ok_or_else(|| LoaderError::NonUtf8Path(uri.to_string()))?,
            params,
        })
    }

    /// The locator exactly as given.
    #[must_use]
    pub fn as_str(&self) -> &str
    {
        &self.raw
    }

    /// Lower-cased protocol name.
    #[must_use]
    pub fn protocol_name(&self) -> &str
    {
        &self.protocol
    }

    /// The protocol, if it is one we resolve.
    ///
    /// # Errors
    ///
    /// `UnsupportedProtocol` for anything but `file` and `memory`.
    pub fn protocol(&self) -> Result<Protocol>
    {
        match self.protocol.as_str() {
            "file" => Ok(Protocol::File),
            "memory" => Ok(Protocol::Memory),
            other => Err(LoaderError::UnsupportedProtocol {
                uri: self.raw.clone(),
                protocol: other.to_string(),
            }),
        }
    }

    /// Percent-decoded path.
    #[must_use]
    pub fn path(&self) -> &str
    {
        &self.path
    }

    /// Path before percent-decoding.
    #[must_use]
    pub fn raw_path(&self) -> &str
    {
        &self.raw_path
    }

    /// Value of the first `key=` parameter.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str>
    {
        self.params
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, value)| value.as_str())
    }

    /// Byte offset of the image within its container, 0 when absent.
    ///
    /// # Errors
    ///
    /// `InvalidInteger` if the parameter is present but not an unsigned integer.
    pub fn offset(&self) -> Result<u64>
    {
        self.param("offset")
            .map_or(Ok(0), |value| parse_unsigned("offset", value))
    }

    /// Byte length of the image, `None` when unspecified.
    ///
    /// # Errors
    ///
    /// `InvalidInteger` for a malformed value and `InvalidSize` for `size=0`.
    pub fn size(&self) -> Result<Option<u64>>
    {
        let Some(value) = self.param("size") else {
            return Ok(None);
        };

        match parse_unsigned("size", value)? {
            0 => Err(LoaderError::InvalidSize(self.raw.clone())),
            size => Ok(Some(size)),
        }
    }
}

impl fmt::Display for CodeObjectUri
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(&self.raw)
    }
}

/// Parse an unsigned integer, detecting the base from its prefix.
///
/// `0x`/`0X` selects hexadecimal, a leading `0` octal, anything else decimal.
/// Surrounding whitespace and a leading `+` are accepted; signs, empty input,
/// stray characters, and values above `u64::MAX` are not.
///
/// # Errors
///
/// `InvalidInteger` naming `key`.
pub fn parse_unsigned(key: &'static str, value: &str) -> Result<u64>
{
    let invalid = || LoaderError::InvalidInteger {
        key,
        value: value.to_string(),
    };

    let trimmed = value.trim();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let (digits, radix) = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        (hex, 16)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (&digits[1..], 8)
    } else {
        (digits, 10)
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(invalid());
    }
    u64::from_str_radix(digits, radix).map_err(|_| invalid())
}

/// Decode `%XX` escapes. Anything that is not `%` followed by two hex digits is
/// copied through unchanged.
///
/// Returns `None` when the decoded bytes are not UTF-8.
#[must_use]
pub fn percent_decode(input: &str) -> Option<String>
{
    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() && bytes[i + 1].is_ascii_hexdigit() && bytes[i + 2].is_ascii_hexdigit() {
            decoded.push((hex_value(bytes[i + 1]) << 4) | hex_value(bytes[i + 2]));
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8(decoded).ok()
}

/// Escape every byte outside the RFC 3986 unreserved set, keeping `/`.
///
/// [`percent_decode`] reverses this exactly.
#[must_use]
pub fn percent_encode_path(path: &str) -> String
{
    const HEX: &[u8; 16] = b"0123456789ABCDEF";

    let mut encoded = String::with_capacity(path.len());
    for &byte in path.as_bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~' | b'/') {
            encoded.push(char::from(byte));
        } else {
            encoded.push('%');
            encoded.push(char::from(HEX[usize::from(byte >> 4)]));
            encoded.push(char::from(HEX[usize::from(byte & 0x0f)]));
        }
    }
    encoded
}

/// Build a `file://` locator for `path`, with optional offset and size.
#[must_use]
pub fn file_locator(path: &str, offset: Option<u64>, size: Option<u64>) -> String
{
    let mut uri = format!("file://{}", percent_encode_path(path));
    let mut separator = '?';
    if let Some(offset) = offset {
        uri.push_str(&format!("{separator}offset={offset}"));
        separator = '&';
    }
    if let Some(size) = size {
        uri.push_str(&format!("{separator}size={size}"));
    }
    uri
}

fn hex_value(digit: u8) -> u8
{
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}
