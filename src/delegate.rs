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

//! Delegate/sink callbacks, in the spirit of an
//! Objective-C delegate protocol with optional methods: every method
//! except [`WebSocketDelegate::did_receive_message`] has a no-op
//! default, so an embedder only overrides what it cares about.

use crate::assembler::AssembledMessage;
use crate::close::CloseCode;
use crate::error::WebSocketError;

/// Callbacks fired by the connection driver as events occur. Methods
/// run on whatever task/executor the embedder chose to drive the
/// connection on; none of them may block on the connection's own send
/// queue without risking deadlock.
pub trait WebSocketDelegate: Send {
  /// A complete text or binary message has been reassembled.
  fn did_receive_message(&mut self, message: AssembledMessage);

  /// The opening handshake completed and the connection is open.
  fn did_open(&mut self, selected_protocol: Option<&str>) {
    let _ = selected_protocol;
  }

  /// A Pong frame arrived, whether solicited by an earlier Ping or not.
  fn did_receive_pong(&mut self, payload: &[u8]) {
    let _ = payload;
  }

  /// The connection failed outright: a transport error, protocol
  /// violation, or handshake rejection. No further callbacks follow.
  fn did_fail(&mut self, error: &WebSocketError) {
    let _ = error;
  }

  /// The connection closed, cleanly or otherwise. `code` is `None` only
  /// when the close reason doesn't map to a close code at all; a Close
  /// frame with no payload reports `Some(CloseCode::NO_STATUS)` and a
  /// transport drop with no Close frame exchanged reports
  /// `Some(CloseCode::ABNORMAL)`. `was_clean` is `true` only when both
  /// sides completed the Close handshake.
  fn did_close(&mut self, code: Option<CloseCode>, reason: &str, was_clean: bool) {
    let _ = (code, reason, was_clean);
  }
}
