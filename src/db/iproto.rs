//! IPROTO packet framing.
//!
//! A packet is a MessagePack `uint32` length prefix (always written as `0xCE`
//! followed by four big-endian bytes) and a payload holding a header map and a
//! body map. Keys in both maps are small integers.

use crate::error::{GatewayError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rmpv::Value;

/// Size of the greeting the server sends right after accept.
pub const GREETING_SIZE: usize = 128;

/// Size of the length prefix in front of every packet.
pub const LENGTH_PREFIX_SIZE: usize = 5;

/// Marker byte of a MessagePack `uint32`.
const UINT32_MARKER: u8 = 0xce;

/// Upper bound on a single response payload.
pub const MAX_PACKET_LEN: usize = 64 * 1024 * 1024;

// Header keys.
pub const KEY_REQUEST_TYPE: u8 = 0x00;
pub const KEY_SYNC: u8 = 0x01;

// Body keys.
pub const KEY_SPACE_ID: u8 = 0x10;
pub const KEY_INDEX_ID: u8 = 0x11;
pub const KEY_LIMIT: u8 = 0x12;
pub const KEY_OFFSET: u8 = 0x13;
pub const KEY_ITERATOR: u8 = 0x14;
pub const KEY_KEY: u8 = 0x20;
pub const KEY_TUPLE: u8 = 0x21;
pub const KEY_USER_NAME: u8 = 0x23;
pub const KEY_EXPR: u8 = 0x27;
pub const KEY_DATA: u8 = 0x30;
pub const KEY_ERROR_24: u8 = 0x31;

/// Response type bit set on every error response.
pub const ERROR_TYPE_FLAG: u64 = 0x8000;

/// Iterator type `ALL`.
pub const ITERATOR_ALL: u8 = 2;

/// Request types sent by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    Select = 1,
    Auth = 7,
    Eval = 8,
    Ping = 64,
}

impl RequestType {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// The parsed server greeting.
#[derive(Debug, Clone)]
pub struct Greeting {
    /// First line, e.g. `Tarantool 2.11.1 (Binary) 7b3c...`.
    pub version: String,
    /// Decoded authentication salt.
    pub salt: Vec<u8>,
}

impl Greeting {
    /// Parses the fixed-size greeting block.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.len() < GREETING_SIZE {
            return Err(GatewayError::connection(format!(
                "short greeting: {} bytes",
                raw.len()
            )));
        }

        let version = String::from_utf8_lossy(&raw[..64]).trim().to_string();
        if !version.starts_with("Tarantool") {
            return Err(GatewayError::connection(format!(
                "unexpected greeting: {version:?}"
            )));
        }

        let salt_line = String::from_utf8_lossy(&raw[64..GREETING_SIZE]);
        let salt_text = salt_line.trim();
        let salt = BASE64
            .decode(salt_text.as_bytes())
            .map_err(|e| GatewayError::connection(format!("invalid greeting salt: {e}")))?;

        Ok(Self { version, salt })
    }
}

/// Encodes one request packet, length prefix included.
pub fn encode_request(request_type: RequestType, sync: u64, body: Vec<(u8, Value)>) -> Result<Vec<u8>> {
    let header = Value::Map(vec![
        (Value::from(KEY_REQUEST_TYPE), Value::from(request_type.code())),
        (Value::from(KEY_SYNC), Value::from(sync)),
    ]);
    let body = Value::Map(
        body.into_iter()
            .map(|(key, value)| (Value::from(key), value))
            .collect(),
    );

    let mut payload = Vec::new();
    for part in [&header, &body] {
        rmpv::encode::write_value(&mut payload, part)
            .map_err(|e| GatewayError::transport(format!("failed to encode request: {e}")))?;
    }

    let len = u32::try_from(payload.len())
        .map_err(|_| GatewayError::transport("request too large"))?;

    let mut packet = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    packet.push(UINT32_MARKER);
    packet.extend_from_slice(&len.to_be_bytes());
    packet.extend_from_slice(&payload);
    Ok(packet)
}

/// Reads the payload length out of a length prefix.
pub fn decode_length(prefix: &[u8; LENGTH_PREFIX_SIZE]) -> Result<usize> {
    if prefix[0] != UINT32_MARKER {
        return Err(GatewayError::transport(format!(
            "unexpected length marker 0x{:02x}",
            prefix[0]
        )));
    }

    let len = u32::from_be_bytes([prefix[1], prefix[2], prefix[3], prefix[4]]) as usize;
    if len > MAX_PACKET_LEN {
        return Err(GatewayError::transport(format!(
            "response too large: {len} bytes"
        )));
    }
    Ok(len)
}

/// A decoded response packet.
#[derive(Debug, Clone)]
pub struct Response {
    pub code: u64,
    pub sync: u64,
    pub body: Value,
}

impl Response {
    /// Decodes a payload (everything after the length prefix).
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut cursor = payload;
        let header = rmpv::decode::read_value(&mut cursor)
            .map_err(|e| GatewayError::transport(format!("failed to decode header: {e}")))?;
        let body = if cursor.is_empty() {
            Value::Map(Vec::new())
        } else {
            rmpv::decode::read_value(&mut cursor)
                .map_err(|e| GatewayError::transport(format!("failed to decode body: {e}")))?
        };

        let code = map_get(&header, KEY_REQUEST_TYPE)
            .and_then(Value::as_u64)
            .ok_or_else(|| GatewayError::transport("response header has no type"))?;
        let sync = map_get(&header, KEY_SYNC).and_then(Value::as_u64).unwrap_or(0);

        Ok(Self { code, sync, body })
    }

    pub fn is_error(&self) -> bool {
        self.code & ERROR_TYPE_FLAG != 0
    }

    /// Returns the `DATA` value of a successful response, or the server's
    /// error message as a transport error.
    pub fn into_data(self) -> Result<Value> {
        if self.is_error() {
            let message = map_get(&self.body, KEY_ERROR_24)
                .and_then(Value::as_str)
                .unwrap_or("unknown server error");
            return Err(GatewayError::transport(format!(
                "server error 0x{:x}: {message}",
                self.code & !ERROR_TYPE_FLAG
            )));
        }
        Ok(map_get(&self.body, KEY_DATA)
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new())))
    }

    /// The server's error message, if this is an error response.
    pub fn error_message(&self) -> Option<String> {
        if !self.is_error() {
            return None;
        }
        Some(
            map_get(&self.body, KEY_ERROR_24)
                .and_then(Value::as_str)
                .unwrap_or("unknown server error")
                .to_string(),
        )
    }
}

/// Looks up an integer key in a MessagePack map.
pub fn map_get(map: &Value, key: u8) -> Option<&Value> {
    map.as_map()?
        .iter()
        .find(|(k, _)| k.as_u64() == Some(u64::from(key)))
        .map(|(_, v)| v)
}
