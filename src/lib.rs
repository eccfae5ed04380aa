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

//! _wsrocket_ is a client-side RFC 6455 WebSocket implementation.
//!
//! It speaks the wire protocol (framing, masking, fragmentation, the
//! opening handshake) and drives a connection on its own task, handing
//! reassembled messages to a [`WebSocketDelegate`] the caller supplies.
//!
//! # Example
//!
//! ```no_run
//! use wsrocket::{connect, AssembledMessage, ClientConfig, Connection, WebSocketDelegate, WebSocketError};
//!
//! struct Echo;
//!
//! impl WebSocketDelegate for Echo {
//!   fn did_receive_message(&mut self, message: AssembledMessage) {
//!     println!("got {message:?}");
//!   }
//! }
//!
//! # async fn run() -> Result<(), WebSocketError> {
//! let conn: Connection = connect("wss://example.com/socket", ClientConfig::default(), Echo).await?;
//! conn.send_text("hello")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Fragmentation
//!
//! Unlike a raw frame-at-a-time API, this crate always reassembles
//! fragmented messages before delivery: [`WebSocketDelegate::did_receive_message`]
//! only ever sees a complete [`AssembledMessage`].
//!
//! ## TLS
//!
//! `wss://` URLs are wrapped in TLS via [`tokio_rustls`]. By default the
//! platform root store is trusted; [`ClientConfig::with_pinned_certificates`]
//! restricts trust to an exact set of DER-encoded certificates, and
//! [`ClientConfig::with_allows_untrusted_ssl`] disables verification
//! entirely for local testing against self-signed servers.

mod assembler;
mod close;
mod config;
mod connection;
mod delegate;
mod error;
mod frame;
mod handshake;
mod mask;
mod sendqueue;
mod transport;
mod url;
mod utf8;

pub use crate::assembler::AssembledMessage;
pub use crate::close::CloseCode;
pub use crate::config::{ClientConfig, DelegateContext, DerCertificate};
pub use crate::connection::{Connection, ReadyState};
pub use crate::delegate::WebSocketDelegate;
pub use crate::error::{Result, WebSocketError};
pub use crate::frame::OpCode;

use crate::url::WsUrl;

/// Connect to a `ws://` or `wss://` endpoint and hand control of the
/// connection to a freshly spawned driver task.
///
/// Resolves the URL, opens the transport (plaintext TCP or
/// TLS-wrapped, per scheme), performs the opening handshake, then
/// spawns the connection driver and returns a handle to it. The
/// returned future only resolves once the handshake has completed, so
/// [`WebSocketDelegate::did_open`] fires strictly after `connect`
/// returns.
pub async fn connect<D>(
  url: &str,
  config: ClientConfig,
  delegate: D,
) -> Result<Connection>
where
  D: WebSocketDelegate + 'static,
{
  let ws_url = WsUrl::parse(url)?;
  let mut transport = transport::connect(&ws_url, &config).await?;
  let (selected_protocol, spill) =
    handshake::client_handshake(&mut transport, &ws_url, &config).await?;

  Ok(connection::spawn(
    transport,
    config,
    delegate,
    selected_protocol,
    spill,
  ))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_non_ws_scheme_before_touching_the_network() {
    let err = WsUrl::parse("http://example.com").unwrap_err();
    assert!(matches!(err, WebSocketError::InvalidUrl(_)));
  }
}
