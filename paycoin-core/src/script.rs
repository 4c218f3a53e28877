//! Standard output script templates.
//!
//! Only the shapes needed to route ownership queries are recognised; no
//! script is ever executed here.

/// Duplicates the top stack item.
pub const OP_DUP: u8 = 0x76;
/// Hashes the top stack item with SHA-256 then RIPEMD-160.
pub const OP_HASH160: u8 = 0xa9;
/// Fails unless the top two items are equal.
pub const OP_EQUALVERIFY: u8 = 0x88;
/// Pushes whether the top two items are equal.
pub const OP_EQUAL: u8 = 0x87;
/// Checks a signature against a public key.
pub const OP_CHECKSIG: u8 = 0xac;

/// The recognised form of an output script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptPattern<'a> {
    /// `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG`
    PayToPubKeyHash(&'a [u8]),
    /// `OP_HASH160 <20 bytes> OP_EQUAL`
    PayToScriptHash(&'a [u8]),
    /// `<33 or 65 byte key> OP_CHECKSIG`
    PayToPubKey(&'a [u8]),
    /// Anything else
    NonStandard,
}

impl<'a> ScriptPattern<'a> {
    /// Matches `script` against the standard templates.
    pub fn classify(script: &'a [u8]) -> Self {
        match script {
            [OP_DUP, OP_HASH160, 20, hash @ .., OP_EQUALVERIFY, OP_CHECKSIG] if hash.len() == 20 => {
                ScriptPattern::PayToPubKeyHash(hash)
            }
            [OP_HASH160, 20, hash @ .., OP_EQUAL] if hash.len() == 20 => {
                ScriptPattern::PayToScriptHash(hash)
            }
            [push, key @ .., OP_CHECKSIG]
                if (*push == 33 || *push == 65) && key.len() == *push as usize =>
            {
                ScriptPattern::PayToPubKey(key)
            }
            _ => ScriptPattern::NonStandard,
        }
    }

    /// True for every form except [`ScriptPattern::NonStandard`].
    pub fn is_standard(&self) -> bool {
        !matches!(self, ScriptPattern::NonStandard)
    }
}
