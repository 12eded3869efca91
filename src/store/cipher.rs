//! AES-256-GCM envelope for secrets at rest.
//!
//! The key is the first 32 characters of the lowercase hex SHA-256 digest of the trimmed
//! passkey, taken as raw key bytes. Sealed values are standard base64 of
//! `nonce || ciphertext || tag`.

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
use ring::{
	aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey},
	rand::{SecureRandom, SystemRandom},
};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, auth::TokenSecret, error::SecretError};

const KEY_LEN: usize = 32;

/// Symmetric key derived from a passkey.
pub struct EnvelopeKey {
	key: LessSafeKey,
	rng: SystemRandom,
}
impl EnvelopeKey {
	/// Derives the key for `passkey`.
	pub fn derive(passkey: &TokenSecret) -> Result<Self, SecretError> {
		let digest = Sha256::digest(passkey.expose().trim().as_bytes());
		let hex = digest.iter().map(|byte| format!("{byte:02x}")).collect::<String>();
		let unbound = UnboundKey::new(&AES_256_GCM, &hex.as_bytes()[..KEY_LEN])
			.map_err(|_| SecretError::Encrypt)?;

		Ok(Self { key: LessSafeKey::new(unbound), rng: SystemRandom::new() })
	}

	/// Encrypts `secret` under a fresh random nonce.
	pub fn seal(&self, secret: &TokenSecret) -> Result<String, SecretError> {
		let mut nonce = [0_u8; NONCE_LEN];

		self.rng.fill(&mut nonce).map_err(|_| SecretError::Encrypt)?;

		let mut in_out = secret.expose().as_bytes().to_vec();

		self.key
			.seal_in_place_append_tag(
				Nonce::assume_unique_for_key(nonce),
				Aad::empty(),
				&mut in_out,
			)
			.map_err(|_| SecretError::Encrypt)?;

		let mut envelope = Vec::with_capacity(NONCE_LEN + in_out.len());

		envelope.extend_from_slice(&nonce);
		envelope.extend_from_slice(&in_out);

		Ok(STANDARD.encode(envelope))
	}

	/// Decrypts a value produced by [`seal`](Self::seal).
	pub fn open(&self, sealed: &str) -> Result<TokenSecret, SecretError> {
		let envelope = STANDARD.decode(sealed.trim()).map_err(|_| SecretError::Decrypt)?;

		if envelope.len() < NONCE_LEN + AES_256_GCM.tag_len() {
			return Err(SecretError::Decrypt);
		}

		let (nonce, ciphertext) = envelope.split_at(NONCE_LEN);
		let nonce = Nonce::try_assume_unique_for_key(nonce).map_err(|_| SecretError::Decrypt)?;
		let mut in_out = ciphertext.to_vec();
		let plaintext = self
			.key
			.open_in_place(nonce, Aad::empty(), &mut in_out)
			.map_err(|_| SecretError::Decrypt)?;

		String::from_utf8(plaintext.to_vec()).map(TokenSecret::new).map_err(|_| SecretError::Decrypt)
	}
}
impl Debug for EnvelopeKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("EnvelopeKey(<redacted>)")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn sealed_values_open_with_the_same_passkey_only() {
		let key = EnvelopeKey::derive(&TokenSecret::new("passkey")).expect("Key should derive.");
		let sealed = key.seal(&TokenSecret::new("access-token")).expect("Secret should seal.");

		assert!(!sealed.contains("access-token"));
		assert_ne!(sealed, key.seal(&TokenSecret::new("access-token")).expect("Secret should seal."));

		let padded = EnvelopeKey::derive(&TokenSecret::new("  passkey ")).expect("Key should derive.");

		assert_eq!(padded.open(&sealed).expect("Trimmed passkeys match.").expose(), "access-token");

		let other = EnvelopeKey::derive(&TokenSecret::new("other")).expect("Key should derive.");

		assert_eq!(other.open(&sealed).expect_err("Wrong keys must fail."), SecretError::Decrypt);
		assert_eq!(key.open("AAAA").expect_err("Short input must fail."), SecretError::Decrypt);
	}
}
