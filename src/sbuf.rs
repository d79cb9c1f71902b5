/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! A growable raw byte buffer used by the encoder and listers to build
//! up output incrementally. No Unicode handling — payload is raw bytes,
//! same as the tokenizer's output.

#[derive(Debug, Clone, Default)]
pub struct StringBuf {
    data: Vec<u8>,
}

impl StringBuf {
    pub fn new() -> Self {
        StringBuf { data: Vec::with_capacity(256) }
    }

    pub fn put(&mut self, c: u8) {
        self.data.push(c);
    }

    pub fn append(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Appends the ASCII bytes of a nul-terminated C-string, lower-cased.
    pub fn append_lcase(&mut self, s: &str) {
        for b in s.bytes() {
            if b.is_ascii_uppercase() {
                self.data.push(b - b'A' + b'a');
            } else {
                self.data.push(b);
            }
        }
    }

    /// Appends a base-10 rendering of `n`.
    pub fn append_dec(&mut self, n: i64) {
        if n < 0 {
            self.data.push(b'-');
        }
        let s = n.unsigned_abs().to_string();
        self.data.extend_from_slice(s.as_bytes());
    }

    /// Appends `n` as `dig` hexadecimal digits, most significant first.
    pub fn append_hex(&mut self, n: u32, dig: u32) {
        const HEX: &[u8] = b"0123456789ABCDEF";
        for d in (0..dig).rev() {
            self.data.push(HEX[((n >> (4 * d)) & 0x0F) as usize]);
        }
    }

    /// Appends the contents of another buffer.
    pub fn cat(&mut self, other: &StringBuf) {
        self.data.extend_from_slice(&other.data);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn last_mut(&mut self) -> Option<&mut u8> {
        self.data.last_mut()
    }

    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
    }

    pub fn drain_front(&mut self, n: usize) {
        self.data.drain(0..n);
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_and_concatenates() {
        let mut a = StringBuf::new();
        a.put(b'A');
        a.append(b"BC");
        let mut b = StringBuf::new();
        b.append_dec(-42);
        a.cat(&b);
        assert_eq!(a.as_slice(), b"ABC-42");
    }

    #[test]
    fn hex_pads_to_width() {
        let mut s = StringBuf::new();
        s.append_hex(0x2A, 4);
        assert_eq!(s.as_slice(), b"002A");
    }

    #[test]
    fn lowercases_ascii_only() {
        let mut s = StringBuf::new();
        s.append_lcase("PRINT 1");
        assert_eq!(s.as_slice(), b"print 1");
    }
}
