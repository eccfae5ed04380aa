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

//! Client configuration surface.

use std::time::Duration;

/// An exact-match DER-encoded certificate, for pinning.
pub type DerCertificate = Vec<u8>;

/// Where delegate callbacks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DelegateContext {
  /// Call straight into the delegate from the driver task, in line with
  /// whatever frame triggered the callback. The delegate's own methods
  /// must not block on anything that depends on the connection making
  /// further progress.
  #[default]
  Inline,
}

/// Client configuration. Build with [`ClientConfig::default`] and the
/// builder-style `with_*` methods.
#[derive(Debug, Clone)]
pub struct ClientConfig {
  /// Subprotocols offered via `Sec-WebSocket-Protocol`.
  pub protocols: Vec<String>,
  /// Cookies serialized into a `Cookie` request header.
  pub request_cookies: Vec<(String, String)>,
  /// DER blobs for exact-match certificate pinning. Empty means no
  /// pinning: ordinary chain validation applies (unless
  /// `allows_untrusted_ssl` is set).
  pub pinned_certificates: Vec<DerCertificate>,
  /// Bypass certificate chain validation entirely. Mutually exclusive
  /// in intent with `pinned_certificates`, though both compile: pinning
  /// takes priority if both are set.
  pub allows_untrusted_ssl: bool,
  /// Per-frame payload size cap. Exceeding this triggers a 1009 close.
  pub max_inbound_payload: u64,
  /// Seconds to wait in `Closing` before forcing a `Closed` transition.
  pub close_timeout: Duration,
  /// Optional `Origin` header value.
  pub origin: Option<String>,
  /// Caller-supplied extra header lines, each a `(name, value)` pair.
  pub extra_headers: Vec<(String, String)>,
  /// Deliver Text messages to the delegate as
  /// [`AssembledMessage::Binary`](crate::assembler::AssembledMessage::Binary)
  /// rather than `Text`, while still validating them as UTF-8 on the
  /// wire. Some embedders want one message type at their API boundary.
  pub deliver_text_as_binary: bool,
  /// Execution context for delegate (sink) callbacks. Currently the
  /// only context is [`DelegateContext::Inline`]: the driver task calls
  /// the delegate directly. Kept as a real option rather than hardcoded
  /// so an embedder that later wants callbacks dispatched onto a
  /// different executor has somewhere to say so.
  pub delegate_context: DelegateContext,
}

impl Default for ClientConfig {
  fn default() -> Self {
    Self {
      protocols: Vec::new(),
      request_cookies: Vec::new(),
      pinned_certificates: Vec::new(),
      allows_untrusted_ssl: false,
      max_inbound_payload: 64 << 20,
      close_timeout: Duration::from_secs(60),
      origin: None,
      extra_headers: Vec::new(),
      deliver_text_as_binary: false,
      delegate_context: DelegateContext::Inline,
    }
  }
}

impl ClientConfig {
  pub fn with_protocols(
    mut self,
    protocols: impl IntoIterator<Item = impl Into<String>>,
  ) -> Self {
    self.protocols = protocols.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_request_cookie(
    mut self,
    name: impl Into<String>,
    value: impl Into<String>,
  ) -> Self {
    self.request_cookies.push((name.into(), value.into()));
    self
  }

  pub fn with_pinned_certificates(
    mut self,
    certs: impl IntoIterator<Item = DerCertificate>,
  ) -> Self {
    self.pinned_certificates = certs.into_iter().collect();
    self
  }

  pub fn with_allows_untrusted_ssl(mut self, allow: bool) -> Self {
    self.allows_untrusted_ssl = allow;
    self
  }

  pub fn with_max_inbound_payload(mut self, max: u64) -> Self {
    self.max_inbound_payload = max;
    self
  }

  pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
    self.close_timeout = timeout;
    self
  }

  pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
    self.origin = Some(origin.into());
    self
  }

  pub fn with_extra_header(
    mut self,
    name: impl Into<String>,
    value: impl Into<String>,
  ) -> Self {
    self.extra_headers.push((name.into(), value.into()));
    self
  }

  pub fn with_deliver_text_as_binary(mut self, enabled: bool) -> Self {
    self.deliver_text_as_binary = enabled;
    self
  }

  pub fn with_delegate_context(mut self, context: DelegateContext) -> Self {
    self.delegate_context = context;
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_matches_documented_values() {
    let cfg = ClientConfig::default();
    assert_eq!(cfg.max_inbound_payload, 64 << 20);
    assert_eq!(cfg.close_timeout, Duration::from_secs(60));
    assert!(cfg.protocols.is_empty());
    assert_eq!(cfg.delegate_context, DelegateContext::Inline);
  }

  #[test]
  fn builder_methods_chain() {
    let cfg = ClientConfig::default()
      .with_protocols(["chat", "superchat"])
      .with_origin("https://example.com")
      .with_max_inbound_payload(1024)
      .with_allows_untrusted_ssl(true);
    assert_eq!(cfg.protocols, vec!["chat", "superchat"]);
    assert_eq!(cfg.origin.as_deref(), Some("https://example.com"));
    assert_eq!(cfg.max_inbound_payload, 1024);
    assert!(cfg.allows_untrusted_ssl);
  }
}
