//! Transfers: what a caller asks the assembler to send.

use serde::{Deserialize, Serialize};

use crate::hash::Hash;
use crate::transaction::{SIGNATURE_FRAGMENT_LEN, TAG_LEN};

/// One intended output of a bundle.
///
/// `message` and `tag` are raw bytes, hex-encoded in JSON. A transfer is
/// never modified after it is handed to the assembler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub address: Hash,
    pub value: u64,
    #[serde(default, with = "hex_vec")]
    pub message: Vec<u8>,
    #[serde(default, with = "hex_vec")]
    pub tag: Vec<u8>,
}

impl Transfer {
    pub fn new(address: Hash, value: u64) -> Self {
        Self {
            address,
            value,
            message: Vec::new(),
            tag: Vec::new(),
        }
    }

    /// The zero-value transfer used to promote a stalled transaction.
    pub fn promotion() -> Self {
        Self::new(Hash::ZERO, 0)
    }

    pub fn with_message(mut self, message: Vec<u8>) -> Self {
        self.message = message;
        self
    }

    pub fn with_tag(mut self, tag: Vec<u8>) -> Self {
        self.tag = tag;
        self
    }

    /// Tag padded with zeros to its fixed width, or `None` if too long.
    pub fn padded_tag(&self) -> Option<[u8; TAG_LEN]> {
        if self.tag.len() > TAG_LEN {
            return None;
        }
        let mut tag = [0u8; TAG_LEN];
        tag[..self.tag.len()].copy_from_slice(&self.tag);
        Some(tag)
    }

    /// Message split into fixed fragments, zero-padded. Always at least one
    /// fragment, so an empty message still produces one transaction.
    pub fn message_fragments(&self) -> Vec<[u8; SIGNATURE_FRAGMENT_LEN]> {
        if self.message.is_empty() {
            return vec![[0u8; SIGNATURE_FRAGMENT_LEN]];
        }
        self.message
            .chunks(SIGNATURE_FRAGMENT_LEN)
            .map(|chunk| {
                let mut fragment = [0u8; SIGNATURE_FRAGMENT_LEN];
                fragment[..chunk.len()].copy_from_slice(chunk);
                fragment
            })
            .collect()
    }
}

mod hex_vec {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}
