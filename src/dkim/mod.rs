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

//! DomainKeys Identified Mail (DKIM) signing middleware.

use std::fmt::Display;

use crate::{message::scan::split_message, MiddlewareType};

pub mod config;
pub mod key;
pub mod signer;

pub use config::{Canonicalization, HashAlgorithm, SignerConfig};
pub use signer::Middleware;

pub const TYPE: MiddlewareType = MiddlewareType("dkim");

pub const DKIM_SIGNATURE: &str = "DKIM-Signature";

#[derive(Debug)]
pub enum Error {
    /// The key is not a PEM block with the expected label.
    DecodePem,
    /// The PKCS#8 key holds a key of an algorithm other than Ed25519.
    NotEd25519Key,
    /// The key was rejected by the signer.
    InvalidKey(mail_auth::Error),
    InvalidHashAlgorithm(String),
    InvalidCanonicalization(String),
    InvalidExpiration,
    EmptyDomain,
    EmptySelector,
    FromRequired,
    Io(std::io::Error),
}

/// Returns the value of the first `DKIM-Signature` header field of a
/// message with its trailing line break removed. Folding is preserved
/// since the signature covers the field as it was generated.
pub fn extract_dkim_header(message: &[u8]) -> Option<String> {
    split_message(message)
        .0
        .into_iter()
        .find(|field| field.is_named(DKIM_SIGNATURE))
        .map(|field| field.value())
}

impl From<Error> for crate::Error {
    fn from(err: Error) -> Self {
        crate::Error::Dkim(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::DecodePem => write!(f, "Failed to decode PEM block"),
            Error::NotEd25519Key => write!(f, "Provided key is not of type Ed25519"),
            Error::InvalidKey(err) => write!(f, "Failed to parse private key: {}", err),
            Error::InvalidHashAlgorithm(algo) => {
                write!(f, "Unsupported hashing algorithm: {}", algo)
            }
            Error::InvalidCanonicalization(c) => {
                write!(f, "Unsupported canonicalization type: {}", c)
            }
            Error::InvalidExpiration => write!(f, "Expiration date must be in the future"),
            Error::EmptyDomain => write!(f, "DKIM domain must not be empty"),
            Error::EmptySelector => write!(f, "DKIM domain selector must not be empty"),
            Error::FromRequired => write!(
                f,
                "The \"From\" field is required when a header field list is provided"
            ),
            Error::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}
