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

//! Frame payload masking (RFC 6455 §5.3).

use rand::RngCore;

/// Generate a fresh 32-bit masking key from a cryptographic RNG.
///
/// Called once per outbound frame; keys MUST NOT be reused across frames.
pub fn generate_mask_key() -> [u8; 4] {
  let mut key = [0u8; 4];
  rand::rngs::OsRng.fill_bytes(&mut key);
  key
}

/// XOR `data` in place with `mask`, cycling the 4-byte key. Applying the
/// same key twice is the identity, so this function also serves as the
/// unmask operation.
pub fn apply_mask(mask: [u8; 4], data: &mut [u8]) {
  for (i, byte) in data.iter_mut().enumerate() {
    *byte ^= mask[i % 4];
  }
}
