// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// Block cipher used by the Paradox IP module envelope
//
// The IP module encrypts payloads as independent AES-256 blocks. The key is
// the ASCII password (later the session key handed out by the module) padded
// with 0xEE.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes256;

use crate::constants::ip::PAD;

pub const BLOCK_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Cipher keyed with one password or session key.
#[derive(Clone)]
pub struct ParadoxCipher {
    aes: Aes256,
}

impl std::fmt::Debug for ParadoxCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParadoxCipher").finish_non_exhaustive()
    }
}

impl ParadoxCipher {
    /// Build a cipher from a password or session key.
    ///
    /// Keys shorter than 32 bytes are right-padded with 0xEE; longer keys are truncated.
    pub fn new(key: &[u8]) -> Self {
        let mut padded = [PAD; KEY_LEN];
        let n = key.len().min(KEY_LEN);
        padded[..n].copy_from_slice(&key[..n]);
        Self {
            aes: Aes256::new(GenericArray::from_slice(&padded)),
        }
    }

    pub fn encrypt_block(&self, block: &mut [u8; BLOCK_LEN]) {
        self.aes.encrypt_block(GenericArray::from_mut_slice(&mut block[..]));
    }

    pub fn decrypt_block(&self, block: &mut [u8; BLOCK_LEN]) {
        self.aes.decrypt_block(GenericArray::from_mut_slice(&mut block[..]));
    }

    /// Pad `data` with 0xEE to a block multiple and encrypt it block by block.
    pub fn encrypt(&self, data: &[u8]) -> Vec<u8> {
        let mut out = pad_to_block(data);
        for chunk in out.chunks_exact_mut(BLOCK_LEN) {
            self.aes.encrypt_block(GenericArray::from_mut_slice(chunk));
        }
        out
    }

    /// Decrypt whole blocks; a trailing partial block is dropped.
    pub fn decrypt(&self, data: &[u8]) -> Vec<u8> {
        let mut out = data[..data.len() - data.len() % BLOCK_LEN].to_vec();
        for chunk in out.chunks_exact_mut(BLOCK_LEN) {
            self.aes.decrypt_block(GenericArray::from_mut_slice(chunk));
        }
        out
    }
}

/// Pad with 0xEE up to the next 16-byte boundary (empty input stays empty).
pub fn pad_to_block(data: &[u8]) -> Vec<u8> {
    let padded_len = data.len().div_ceil(BLOCK_LEN) * BLOCK_LEN;
    let mut out = Vec::with_capacity(padded_len);
    out.extend_from_slice(data);
    out.resize(padded_len, PAD);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unhex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn test_block_transform_reference_vector() {
        let key = unhex("000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f");
        let cipher = ParadoxCipher::new(&key);
        let mut block = [0u8; 16];
        block.copy_from_slice(&unhex("00112233445566778899aabbccddeeff"));
        cipher.encrypt_block(&mut block);
        assert_eq!(block.to_vec(), unhex("8ea2b7ca516745bfeafc49904b496089"));
        cipher.decrypt_block(&mut block);
        assert_eq!(block.to_vec(), unhex("00112233445566778899aabbccddeeff"));
    }

    #[test]
    fn test_password_key_padding() {
        let short = ParadoxCipher::new(b"paradox");
        let mut explicit = b"paradox".to_vec();
        explicit.resize(32, 0xEE);
        let padded = ParadoxCipher::new(&explicit);
        assert_eq!(short.encrypt(b"hello"), padded.encrypt(b"hello"));

        let long = ParadoxCipher::new(&[0x41; 40]);
        let truncated = ParadoxCipher::new(&[0x41; 32]);
        assert_eq!(long.encrypt(b"x"), truncated.encrypt(b"x"));
    }

    #[test]
    fn test_encrypt_pads_and_roundtrips() {
        let cipher = ParadoxCipher::new(b"paradox");
        for len in [0usize, 1, 15, 16, 17, 37, 64] {
            let payload: Vec<u8> = (0..len as u8).collect();
            let encrypted = cipher.encrypt(&payload);
            assert_eq!(encrypted.len() % 16, 0);
            assert_eq!(encrypted.len(), len.div_ceil(16) * 16);
            let decrypted = cipher.decrypt(&encrypted);
            assert_eq!(&decrypted[..len], &payload[..]);
            assert!(decrypted[len..].iter().all(|b| *b == 0xEE));
        }
    }

    #[test]
    fn test_decrypt_drops_partial_block() {
        let cipher = ParadoxCipher::new(b"paradox");
        let mut encrypted = cipher.encrypt(&[7u8; 16]);
        encrypted.extend_from_slice(&[1, 2, 3]);
        assert_eq!(cipher.decrypt(&encrypted), vec![7u8; 16]);
    }

    #[test]
    fn test_pad_to_block() {
        assert!(pad_to_block(&[]).is_empty());
        assert_eq!(pad_to_block(&[1]).len(), 16);
        assert_eq!(pad_to_block(&[1])[15], 0xEE);
        assert_eq!(pad_to_block(&[0u8; 16]).len(), 16);
    }
}
