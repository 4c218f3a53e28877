//! Wallet-side queries used to decide whether an output belongs to us.

/// Something that knows which keys and scripts it controls, usually a wallet.
pub trait TransactionBag {
    /// True if the 20-byte key hash belongs to a key we hold.
    fn is_pub_key_hash_mine(&self, pub_key_hash: &[u8]) -> bool;

    /// True if the script is being watched without holding its key.
    fn is_watched_script(&self, script: &[u8]) -> bool;

    /// True if the raw public key is one we hold.
    fn is_pub_key_mine(&self, pub_key: &[u8]) -> bool;

    /// True if we can redeem the script with this 20-byte hash.
    fn is_pay_to_script_hash_mine(&self, script_hash: &[u8]) -> bool;
}
