use std::{fmt, fs, path::Path};

use openssl::{
    hash::MessageDigest,
    pkey::{Id, PKey, Private},
    sign::Signer,
};

use crate::error::{ConfigError, SigningError};

/// An RSA private key used to sign assertions
#[derive(Clone)]
pub struct SigningKey {
    key: PKey<Private>,
}

impl SigningKey {
    /// Imports an RSA private key from a PEM document
    ///
    /// Both PKCS#1 (`BEGIN RSA PRIVATE KEY`) and PKCS#8 (`BEGIN PRIVATE KEY`)
    /// encodings are accepted.
    ///
    /// # Errors
    ///
    /// The provided PEM document is not a valid RSA private key.
    pub fn from_pem(pem: &[u8]) -> Result<Self, ConfigError> {
        let key = PKey::private_key_from_pem(pem).map_err(ConfigError::KeyRejected)?;
        if key.id() != Id::RSA {
            return Err(ConfigError::NotRsa);
        }

        Ok(Self { key })
    }

    /// Reads and imports an RSA private key from a PEM file
    ///
    /// The file is read synchronously, once.
    ///
    /// # Errors
    ///
    /// The file cannot be read or does not contain a valid RSA private key.
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let pem = fs::read(path).map_err(|source| ConfigError::KeyUnreadable {
            path: path.to_owned(),
            source,
        })?;

        let key = Self::from_pem(&pem)?;
        tracing::debug!(path = %path.display(), bits = key.key.bits(), "loaded signing key");
        Ok(key)
    }

    /// Signs `data` using RSASSA-PKCS1-v1_5 with SHA-1
    ///
    /// # Errors
    ///
    /// The underlying cryptographic provider failed to produce a signature.
    pub fn sign_sha1(&self, data: &[u8]) -> Result<Vec<u8>, SigningError> {
        let mut signer = Signer::new(MessageDigest::sha1(), &self.key)?;
        signer.update(data)?;
        Ok(signer.sign_to_vec()?)
    }

    /// Exports the public half of the key as a PEM document
    ///
    /// # Errors
    ///
    /// The key could not be serialized.
    pub fn public_key_pem(&self) -> Result<Vec<u8>, SigningError> {
        Ok(self.key.public_key_to_pem()?)
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("bits", &self.key.bits())
            .field("private_key", &"<redacted>")
            .finish()
    }
}
