/*
 * Copyright Stalwart Labs Ltd. See the COPYING
 * file at the top-level directory of this distribution.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use mail_auth::common::crypto::{Ed25519Key, RsaKey, Sha256};
use rustls_pemfile::Item;

use super::Error;

// id-Ed25519, 1.3.101.112
const ED25519_OID: &[u8] = &[0x2b, 0x65, 0x70];

/// A DKIM signing key, kept as DER. Keys are parsed again for every
/// signature, since the signer consumes them.
#[derive(Clone)]
pub enum PrivateKey {
    Rsa(Vec<u8>),
    Ed25519(Vec<u8>),
}

impl PrivateKey {
    /// Parses a PKCS#1 `RSA PRIVATE KEY` PEM block.
    pub fn from_rsa_pem(pem: &str) -> Result<Self, Error> {
        match read_pem(pem)? {
            Item::Pkcs1Key(der) => {
                let key = PrivateKey::Rsa(der.secret_pkcs1_der().to_vec());
                key.rsa_key()?;
                Ok(key)
            }
            _ => Err(Error::DecodePem),
        }
    }

    /// Parses a PKCS#8 `PRIVATE KEY` PEM block holding an Ed25519 key.
    pub fn from_ed25519_pem(pem: &str) -> Result<Self, Error> {
        match read_pem(pem)? {
            Item::Pkcs8Key(der) => {
                let der = der.secret_pkcs8_der();
                if pkcs8_algorithm(der) != Some(ED25519_OID) {
                    return Err(Error::NotEd25519Key);
                }
                let key = PrivateKey::Ed25519(der.to_vec());
                key.ed25519_key()?;
                Ok(key)
            }
            _ => Err(Error::DecodePem),
        }
    }

    pub(crate) fn rsa_key(&self) -> Result<RsaKey<Sha256>, Error> {
        match self {
            PrivateKey::Rsa(der) => RsaKey::<Sha256>::from_der(der).map_err(Error::InvalidKey),
            PrivateKey::Ed25519(_) => Err(Error::DecodePem),
        }
    }

    pub(crate) fn ed25519_key(&self) -> Result<Ed25519Key, Error> {
        match self {
            PrivateKey::Ed25519(der) => {
                Ed25519Key::from_pkcs8_maybe_unchecked_der(der).map_err(Error::InvalidKey)
            }
            PrivateKey::Rsa(_) => Err(Error::NotEd25519Key),
        }
    }

    pub fn algorithm(&self) -> &'static str {
        match self {
            PrivateKey::Rsa(_) => "rsa-sha256",
            PrivateKey::Ed25519(_) => "ed25519-sha256",
        }
    }
}

/// Reads the first key found in a PEM document.
fn read_pem(pem: &str) -> Result<Item, Error> {
    rustls_pemfile::read_one(&mut pem.as_bytes())
        .map_err(|_| Error::DecodePem)?
        .ok_or(Error::DecodePem)
}

/// Returns the algorithm OID of a PKCS#8 `PrivateKeyInfo`.
fn pkcs8_algorithm(der: &[u8]) -> Option<&[u8]> {
    let (0x30, info, _) = der_element(der)? else {
        return None;
    };
    let (0x02, _, info) = der_element(info)? else {
        return None;
    };
    let (0x30, algorithm, _) = der_element(info)? else {
        return None;
    };
    let (0x06, oid, _) = der_element(algorithm)? else {
        return None;
    };
    Some(oid)
}

/// Splits a DER element into its tag, its contents and the remaining input.
fn der_element(input: &[u8]) -> Option<(u8, &[u8], &[u8])> {
    let (&tag, input) = input.split_first()?;
    let (&len, mut input) = input.split_first()?;
    let len = if len & 0x80 == 0 {
        len as usize
    } else {
        let octets = (len & 0x7f) as usize;
        if octets == 0 || octets > 4 || input.len() < octets {
            return None;
        }
        let (len, rest) = input.split_at(octets);
        input = rest;
        len.iter().fold(0usize, |acc, &byte| (acc << 8) | byte as usize)
    };
    if input.len() < len {
        return None;
    }
    let (contents, rest) = input.split_at(len);
    Some((tag, contents, rest))
}
