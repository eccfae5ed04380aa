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

//! Close status codes (RFC 6455 §7.4).

/// A WebSocket close status code.
///
/// Wraps the raw `u16` so call sites can match on the well-known variants
/// while still round-tripping codes this crate doesn't name explicitly
/// (e.g. an application-defined code in the 4000-4999 range).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseCode(pub u16);

impl CloseCode {
  pub const NORMAL: CloseCode = CloseCode(1000);
  pub const GOING_AWAY: CloseCode = CloseCode(1001);
  pub const PROTOCOL_ERROR: CloseCode = CloseCode(1002);
  pub const UNSUPPORTED_DATA: CloseCode = CloseCode(1003);
  pub const NO_STATUS: CloseCode = CloseCode(1005);
  pub const ABNORMAL: CloseCode = CloseCode(1006);
  pub const INVALID_PAYLOAD: CloseCode = CloseCode(1007);
  pub const POLICY_VIOLATION: CloseCode = CloseCode(1008);
  pub const MESSAGE_TOO_BIG: CloseCode = CloseCode(1009);
  pub const MISSING_EXTENSION: CloseCode = CloseCode(1010);
  pub const INTERNAL_ERROR: CloseCode = CloseCode(1011);
  pub const SERVICE_RESTART: CloseCode = CloseCode(1012);
  pub const TRY_AGAIN_LATER: CloseCode = CloseCode(1013);
  pub const TLS_HANDSHAKE: CloseCode = CloseCode(1015);

  /// Whether this code may legally appear on the wire, either inbound or
  /// outbound. 1004, 1005, 1006 and 1015 are reserved for local use only;
  /// everything outside the registered/framework/application ranges is
  /// rejected too.
  pub fn is_allowed_on_wire(self) -> bool {
    match self.0 {
      1004 | 1005 | 1006 | 1015 => false,
      1000..=1013 => true,
      3000..=3999 => true,
      4000..=4999 => true,
      _ => false,
    }
  }
}

impl From<u16> for CloseCode {
  fn from(value: u16) -> Self {
    CloseCode(value)
  }
}

impl From<CloseCode> for u16 {
  fn from(value: CloseCode) -> Self {
    value.0
  }
}
