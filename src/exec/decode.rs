// src/exec/decode.rs

//! Incremental UTF-8 decoding of process output chunks.
//!
//! Pipe reads return arbitrary byte boundaries, so a multi-byte character can
//! be split across two chunks. The decoder holds back an incomplete trailing
//! sequence and prepends it to the next chunk of the same stream. Bytes that
//! can never form valid UTF-8 become U+FFFD.

#[derive(Debug, Default)]
pub struct ChunkDecoder {
    pending: Vec<u8>,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `pending + chunk` as possible.
    pub fn push(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::new();
        loop {
            let err = match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(err) => err,
            };

            let valid = err.valid_up_to();
            out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));

            match err.error_len() {
                // Incomplete sequence at the end: wait for more bytes.
                None => {
                    self.pending.drain(..valid);
                    return out;
                }
                Some(bad) => {
                    out.push(char::REPLACEMENT_CHARACTER);
                    self.pending.drain(..valid + bad);
                }
            }
        }
    }

    /// Flush whatever is held back at end of stream.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}
