// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Frame codec: RFC 6455 §5 wire format.

use bytes::{BufMut, BytesMut};

use crate::error::WebSocketError;
use crate::mask::{apply_mask, generate_mask_key};

/// The WebSocket frame opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
  Continuation,
  Text,
  Binary,
  Close,
  Ping,
  Pong,
}

impl OpCode {
  pub fn is_control(self) -> bool {
    matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
  }

  pub fn is_data(self) -> bool {
    matches!(self, OpCode::Text | OpCode::Binary | OpCode::Continuation)
  }

  fn as_u8(self) -> u8 {
    match self {
      OpCode::Continuation => 0x0,
      OpCode::Text => 0x1,
      OpCode::Binary => 0x2,
      OpCode::Close => 0x8,
      OpCode::Ping => 0x9,
      OpCode::Pong => 0xa,
    }
  }
}

impl TryFrom<u8> for OpCode {
  type Error = WebSocketError;

  fn try_from(byte: u8) -> Result<Self, Self::Error> {
    match byte & 0x0f {
      0x0 => Ok(OpCode::Continuation),
      0x1 => Ok(OpCode::Text),
      0x2 => Ok(OpCode::Binary),
      0x8 => Ok(OpCode::Close),
      0x9 => Ok(OpCode::Ping),
      0xa => Ok(OpCode::Pong),
      _ => Err(WebSocketError::ProtocolViolation("reserved opcode")),
    }
  }
}

/// A parsed (or about-to-be-encoded) WebSocket frame. The mask key
/// itself never appears here: inbound frames are unmasked in place by
/// [`decode`] before the caller ever sees them, and outbound frames
/// get a fresh key generated at encode time by [`Frame::encode_masked`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
  pub fin: bool,
  pub opcode: OpCode,
  pub payload: Vec<u8>,
}

impl Frame {
  pub fn new(fin: bool, opcode: OpCode, payload: Vec<u8>) -> Self {
    Self {
      fin,
      opcode,
      payload,
    }
  }

  pub fn text(payload: Vec<u8>) -> Self {
    Self::new(true, OpCode::Text, payload)
  }

  pub fn binary(payload: Vec<u8>) -> Self {
    Self::new(true, OpCode::Binary, payload)
  }

  pub fn ping(payload: Vec<u8>) -> Self {
    Self::new(true, OpCode::Ping, payload)
  }

  pub fn pong(payload: Vec<u8>) -> Self {
    Self::new(true, OpCode::Pong, payload)
  }

  /// Build a Close frame. `code` of `None` produces a frame with no
  /// payload at all (distinct from a close code of 1005, which must
  /// never appear on the wire).
  pub fn close(code: Option<u16>, reason: &str) -> Self {
    let mut payload = Vec::new();
    if let Some(code) = code {
      payload.extend_from_slice(&code.to_be_bytes());
      payload.extend_from_slice(reason.as_bytes());
    }
    Self::new(true, OpCode::Close, payload)
  }

  fn encode_header(&self, masked: bool) -> BytesMut {
    let payload_len = self.payload.len();
    let header_len = match payload_len {
      0..=125 => 2,
      126..=0xffff => 4,
      _ => 10,
    };
    let mask_len = if masked { 4 } else { 0 };
    let mut out = BytesMut::with_capacity(header_len + mask_len);

    let mut first_byte = self.opcode.as_u8();
    if self.fin {
      first_byte |= 0x80;
    }
    out.put_u8(first_byte);

    let mask_bit = if masked { 0x80 } else { 0x00 };
    match payload_len {
      0..=125 => out.put_u8(mask_bit | payload_len as u8),
      126..=0xffff => {
        out.put_u8(mask_bit | 126);
        out.put_u16(payload_len as u16);
      }
      _ => {
        out.put_u8(mask_bit | 127);
        out.put_u64(payload_len as u64);
      }
    }

    out
  }

  /// Encode this frame as a client frame: masked, with a freshly
  /// generated key.
  pub fn encode_masked(&self) -> Vec<u8> {
    let mut out = self.encode_header(true);
    let mask = generate_mask_key();
    out.extend_from_slice(&mask);

    let mut payload = self.payload.clone();
    apply_mask(mask, &mut payload);
    out.extend_from_slice(&payload);

    out.to_vec()
  }

  /// Encode this frame unmasked, as a server would send it. Exposed for
  /// test harnesses that play the server role against this client.
  #[cfg(test)]
  pub fn encode_unmasked(&self) -> Vec<u8> {
    let mut out = self.encode_header(false);
    out.extend_from_slice(&self.payload);
    out.to_vec()
  }
}

/// Result of attempting to decode one frame from a buffer.
pub enum Decoded {
  Frame { frame: Frame, consumed: usize },
  NeedMore(usize),
}

/// Decode a single frame from the head of `buf`, per RFC 6455 §5.2.
///
/// Inbound frames from a (compliant) server are never masked; a masked
/// inbound frame is itself a protocol violation.
pub fn decode(buf: &[u8], max_payload: u64) -> Result<Decoded, WebSocketError> {
  if buf.len() < 2 {
    return Ok(Decoded::NeedMore(2 - buf.len()));
  }

  let first = buf[0];
  let second = buf[1];

  let fin = first & 0x80 != 0;
  let rsv1 = first & 0x40 != 0;
  let rsv2 = first & 0x20 != 0;
  let rsv3 = first & 0x10 != 0;
  if rsv1 || rsv2 || rsv3 {
    return Err(WebSocketError::ProtocolViolation(
      "reserved bits set with no extension negotiated",
    ));
  }

  let opcode = OpCode::try_from(first & 0x0f)?;
  let masked = second & 0x80 != 0;
  if masked {
    return Err(WebSocketError::ProtocolViolation(
      "server must not mask frames sent to a client",
    ));
  }

  let len7 = second & 0x7f;
  let (payload_len, extra): (u64, usize) = match len7 {
    0..=125 => (len7 as u64, 0),
    126 => {
      if buf.len() < 4 {
        return Ok(Decoded::NeedMore(4 - buf.len()));
      }
      (u16::from_be_bytes([buf[2], buf[3]]) as u64, 2)
    }
    127 => {
      if buf.len() < 10 {
        return Ok(Decoded::NeedMore(10 - buf.len()));
      }
      let raw = u64::from_be_bytes(buf[2..10].try_into().unwrap());
      if raw & (1 << 63) != 0 {
        return Err(WebSocketError::ProtocolViolation(
          "64-bit payload length has high bit set",
        ));
      }
      (raw, 8)
    }
    _ => unreachable!(),
  };

  if opcode.is_control() {
    if !fin {
      return Err(WebSocketError::ProtocolViolation(
        "control frame must not be fragmented",
      ));
    }
    if payload_len > 125 {
      return Err(WebSocketError::ProtocolViolation(
        "control frame payload exceeds 125 bytes",
      ));
    }
  }

  if payload_len > max_payload {
    return Err(WebSocketError::PayloadTooLarge {
      size: payload_len,
      max: max_payload,
    });
  }

  let header_len = 2 + extra;
  let total_len = header_len + payload_len as usize;
  if buf.len() < total_len {
    return Ok(Decoded::NeedMore(total_len - buf.len()));
  }

  let payload = buf[header_len..total_len].to_vec();
  Ok(Decoded::Frame {
    frame: Frame::new(fin, opcode, payload),
    consumed: total_len,
  })
}
