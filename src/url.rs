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

//! Minimal `ws://` / `wss://` URL parsing.
//!
//! Only the subset of RFC 3986 the handshake engine actually needs:
//! scheme, host, optional port, and path+query. No dependency on an
//! external URL crate, since WebSocket URLs have no userinfo, fragment,
//! or relative-resolution requirements to worry about.

use crate::error::WebSocketError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scheme {
  Ws,
  Wss,
}

impl Scheme {
  pub fn is_secure(&self) -> bool {
    matches!(self, Scheme::Wss)
  }

  pub fn default_port(&self) -> u16 {
    match self {
      Scheme::Ws => 80,
      Scheme::Wss => 443,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsUrl {
  pub scheme: Scheme,
  pub host: String,
  pub port: u16,
  /// Path plus query string, always starting with `/`.
  pub path_and_query: String,
}

impl WsUrl {
  pub fn parse(input: &str) -> Result<Self, WebSocketError> {
    let (scheme, rest) = if let Some(rest) = input.strip_prefix("wss://") {
      (Scheme::Wss, rest)
    } else if let Some(rest) = input.strip_prefix("ws://") {
      (Scheme::Ws, rest)
    } else {
      return Err(WebSocketError::InvalidUrl(format!(
        "unsupported or missing scheme in {input:?}"
      )));
    };

    let (authority, path_and_query) = match rest.find('/') {
      Some(idx) => (&rest[..idx], rest[idx..].to_string()),
      None => (rest, "/".to_string()),
    };

    if authority.is_empty() {
      return Err(WebSocketError::InvalidUrl(format!(
        "missing host in {input:?}"
      )));
    }

    let (host, port) = match authority.rsplit_once(':') {
      Some((host, port_str)) => {
        let port = port_str.parse::<u16>().map_err(|_| {
          WebSocketError::InvalidUrl(format!("invalid port in {input:?}"))
        })?;
        (host.to_string(), port)
      }
      None => (authority.to_string(), scheme.default_port()),
    };

    if host.is_empty() {
      return Err(WebSocketError::InvalidUrl(format!(
        "missing host in {input:?}"
      )));
    }

    Ok(WsUrl {
      scheme,
      host,
      port,
      path_and_query,
    })
  }

  /// The value for the `Host` header: port is omitted when it's the
  /// scheme's default.
  pub fn host_header(&self) -> String {
    if self.port == self.scheme.default_port() {
      self.host.clone()
    } else {
      format!("{}:{}", self.host, self.port)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_ws_with_default_port() {
    let url = WsUrl::parse("ws://example.com/chat").unwrap();
    assert_eq!(url.scheme, Scheme::Ws);
    assert_eq!(url.host, "example.com");
    assert_eq!(url.port, 80);
    assert_eq!(url.path_and_query, "/chat");
    assert_eq!(url.host_header(), "example.com");
  }

  #[test]
  fn parses_wss_with_explicit_port() {
    let url = WsUrl::parse("wss://example.com:9001/socket?id=1").unwrap();
    assert_eq!(url.scheme, Scheme::Wss);
    assert_eq!(url.port, 9001);
    assert_eq!(url.path_and_query, "/socket?id=1");
    assert_eq!(url.host_header(), "example.com:9001");
  }

  #[test]
  fn defaults_path_to_root() {
    let url = WsUrl::parse("ws://example.com").unwrap();
    assert_eq!(url.path_and_query, "/");
  }

  #[test]
  fn rejects_unsupported_scheme() {
    assert!(WsUrl::parse("http://example.com").is_err());
  }

  #[test]
  fn rejects_missing_host() {
    assert!(WsUrl::parse("ws:///chat").is_err());
  }

  #[test]
  fn rejects_invalid_port() {
    assert!(WsUrl::parse("ws://example.com:notaport/").is_err());
  }
}
