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

//! Incremental UTF-8 validation.
//!
//! WebSocket text frames arrive as arbitrary byte chunks that may split a
//! multi-byte codepoint across frame boundaries, so validation can't just
//! call `str::from_utf8` on each chunk in isolation. This is a small DFA
//! (after Bjoern Hoehrmann's well-known UTF-8 decoder) that carries partial
//! sequence state across `feed` calls and rejects overlong encodings,
//! surrogates and codepoints above U+10FFFF as it goes.

const UTF8_ACCEPT: u8 = 0;
const UTF8_REJECT: u8 = 12;

// Maps each byte value to one of 12 character classes.
#[rustfmt::skip]
const BYTE_CLASSES: [u8; 256] = [
  0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0, 0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,
  0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0, 0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,
  0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0, 0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,
  0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0, 0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,
  1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1, 9,9,9,9,9,9,9,9,9,9,9,9,9,9,9,9,
  7,7,7,7,7,7,7,7,7,7,7,7,7,7,7,7, 7,7,7,7,7,7,7,7,7,7,7,7,7,7,7,7,
  8,8,2,2,2,2,2,2,2,2,2,2,2,2,2,2, 2,2,2,2,2,2,2,2,2,2,2,2,2,2,2,2,
  10,3,3,3,3,3,3,3,3,3,3,3,3,4,3,3, 11,6,6,6,5,8,8,8,8,8,8,8,8,8,8,8,
];

// State transition table: next_state = TRANSITIONS[state + byte_class].
#[rustfmt::skip]
const TRANSITIONS: [u8; 108] = [
  0,12,24,36,60,96,84,12,12,12,48,72,
  12,0,12,12,12,12,12,0,12,0,12,12,
  12,24,12,12,12,12,12,24,12,24,12,12,
  12,12,12,12,12,12,12,24,12,12,12,12,
  12,24,12,12,12,12,12,12,12,24,12,12,
  12,12,12,12,12,12,12,12,12,12,12,12,
  12,36,12,12,12,12,12,36,12,36,12,12,
  12,36,12,12,12,12,12,12,12,12,12,12,
  12,12,12,12,12,12,12,12,12,12,12,12,
];

/// Outcome of feeding a chunk of bytes to the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Utf8Status {
  /// All bytes fed so far form a valid UTF-8 prefix; no partial sequence
  /// is pending (safe to treat as a terminal "complete" state).
  Valid,
  /// A valid UTF-8 prefix with a partial multi-byte sequence still
  /// pending more bytes.
  Incomplete,
  /// The bytes fed so far (or this chunk) are not valid UTF-8.
  Invalid,
}

/// Incremental UTF-8 validator state, reset at the start of each text
/// message and fed one frame payload at a time.
#[derive(Debug, Clone)]
pub struct Utf8Validator {
  state: u8,
}

impl Default for Utf8Validator {
  fn default() -> Self {
    Self::new()
  }
}

impl Utf8Validator {
  pub fn new() -> Self {
    Self { state: UTF8_ACCEPT }
  }

  /// Feed the next chunk of bytes. Once `Invalid` is returned the
  /// validator is poisoned; further calls keep returning `Invalid`.
  pub fn feed(&mut self, bytes: &[u8]) -> Utf8Status {
    if self.state == UTF8_REJECT {
      return Utf8Status::Invalid;
    }

    for &byte in bytes {
      let class = BYTE_CLASSES[byte as usize];
      self.state = TRANSITIONS[(self.state + class) as usize];
      if self.state == UTF8_REJECT {
        return Utf8Status::Invalid;
      }
    }

    if self.state == UTF8_ACCEPT {
      Utf8Status::Valid
    } else {
      Utf8Status::Incomplete
    }
  }

  /// Whether the validator is currently at a codepoint boundary (no
  /// partial sequence pending). This is what must hold at the terminal
  /// fragment of a text message.
  pub fn is_valid_terminal(&self) -> bool {
    self.state == UTF8_ACCEPT
  }
}

/// One-shot validation of a complete, self-contained buffer. Used for
/// Close-frame reason strings, which are never fragmented.
pub fn validate_complete(bytes: &[u8]) -> bool {
  #[cfg(feature = "simd")]
  {
    simdutf8::basic::from_utf8(bytes).is_ok()
  }
  #[cfg(not(feature = "simd"))]
  {
    std::str::from_utf8(bytes).is_ok()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ascii_is_valid() {
    let mut v = Utf8Validator::new();
    assert_eq!(v.feed(b"hello world"), Utf8Status::Valid);
  }

  #[test]
  fn split_multibyte_codepoint_across_chunks() {
    // U+1F389 PARTY POPPER, encoded as f0 9f 8e 89
    let mut v = Utf8Validator::new();
    assert_eq!(v.feed(&[0xf0, 0x9f]), Utf8Status::Incomplete);
    assert_eq!(v.feed(&[0x8e, 0x89]), Utf8Status::Valid);
  }

  #[test]
  fn every_prefix_split_of_a_valid_string_reports_valid_at_terminal() {
    let s = "Hello, 世界! 🎉";
    let bytes = s.as_bytes();
    for split in 0..=bytes.len() {
      let mut v = Utf8Validator::new();
      v.feed(&bytes[..split]);
      let status = v.feed(&bytes[split..]);
      assert_eq!(status, Utf8Status::Valid, "split at {split} failed");
    }
  }

  #[test]
  fn rejects_overlong_encoding() {
    // Overlong encoding of NUL: c0 80
    let mut v = Utf8Validator::new();
    assert_eq!(v.feed(&[0xc0, 0x80]), Utf8Status::Invalid);
  }

  #[test]
  fn rejects_surrogate() {
    // U+D800 encoded directly (invalid, surrogates are never valid UTF-8)
    let mut v = Utf8Validator::new();
    assert_eq!(v.feed(&[0xed, 0xa0, 0x80]), Utf8Status::Invalid);
  }

  #[test]
  fn rejects_codepoint_above_max() {
    // Attempt to encode U+110000, one past the max valid codepoint.
    let mut v = Utf8Validator::new();
    assert_eq!(v.feed(&[0xf4, 0x90, 0x80, 0x80]), Utf8Status::Invalid);
  }

  #[test]
  fn classic_invalid_sequence_c0_af() {
    let mut v = Utf8Validator::new();
    assert_eq!(v.feed(&[0xc0, 0xaf]), Utf8Status::Invalid);
  }

  #[test]
  fn incomplete_sequence_at_terminal_is_not_valid_terminal() {
    let mut v = Utf8Validator::new();
    v.feed(&[0xf0, 0x9f]);
    assert!(!v.is_valid_terminal());
  }

  #[test]
  fn poisoned_validator_stays_invalid() {
    let mut v = Utf8Validator::new();
    assert_eq!(v.feed(&[0xff]), Utf8Status::Invalid);
    assert_eq!(v.feed(b"more"), Utf8Status::Invalid);
  }
}
