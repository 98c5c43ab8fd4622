use data_encoding::BASE32;
use sha1::{Digest, Sha1};

/// SHA-1 of a record payload, rendered in the base32 form CDX files carry.
#[derive(Default)]
pub struct PayloadDigest {
    hasher: Sha1,
}

impl PayloadDigest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    pub fn finish(self) -> String {
        BASE32.encode(&self.hasher.finalize())
    }
}
