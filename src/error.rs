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

//! Error taxonomy.
//!
//! Every fallible operation in this crate returns [`WebSocketError`]. The
//! variants line up with the close code a protocol violation maps to, via
//! [`WebSocketError::close_code`], so the connection state machine never has
//! to duplicate that mapping.

use crate::close::CloseCode;

#[derive(thiserror::Error, Debug)]
pub enum WebSocketError {
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("invalid websocket url: {0}")]
  InvalidUrl(String),

  #[error("handshake rejected: {status:?}\n{headers}")]
  HandshakeRejected {
    status: Option<u16>,
    headers: String,
  },

  #[error("protocol violation: {0}")]
  ProtocolViolation(&'static str),

  #[error("invalid close code: {0}")]
  InvalidCloseCode(u16),

  #[error("invalid utf-8 in text frame or close reason")]
  Utf8Violation,

  #[error("payload of {size} bytes exceeds configured maximum of {max} bytes")]
  PayloadTooLarge { size: u64, max: u64 },

  #[error("tls failure: {0}")]
  TlsFailure(String),

  #[error("connection was already closing or closed")]
  InvalidState,

  #[error("operation cancelled")]
  Cancelled,

  #[error("connection closed by peer")]
  ConnectionClosed,
}

impl WebSocketError {
  /// The WebSocket close code a protocol-level error maps to. Returns
  /// `None` for errors that never reach the wire (`InvalidState`,
  /// `Cancelled`) or that close the transport without a WebSocket-level
  /// code (`TlsFailure`, `Io`).
  pub fn close_code(&self) -> Option<CloseCode> {
    match self {
      WebSocketError::ProtocolViolation(_) => Some(CloseCode::PROTOCOL_ERROR),
      WebSocketError::InvalidCloseCode(_) => Some(CloseCode::PROTOCOL_ERROR),
      WebSocketError::Utf8Violation => Some(CloseCode::INVALID_PAYLOAD),
      WebSocketError::PayloadTooLarge { .. } => {
        Some(CloseCode::MESSAGE_TOO_BIG)
      }
      WebSocketError::HandshakeRejected { .. }
      | WebSocketError::InvalidUrl(_)
      | WebSocketError::TlsFailure(_)
      | WebSocketError::Io(_)
      | WebSocketError::InvalidState
      | WebSocketError::Cancelled
      | WebSocketError::ConnectionClosed => None,
    }
  }

  /// Whether this error was caused by the transport dropping out from
  /// under us, as opposed to a protocol-level decision by either peer.
  pub fn is_transport_failure(&self) -> bool {
    matches!(self, WebSocketError::Io(_))
  }
}

pub type Result<T> = std::result::Result<T, WebSocketError>;
