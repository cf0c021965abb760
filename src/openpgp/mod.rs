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

//! OpenPGP encryption and signing middleware, supporting the PGP/Inline
//! and PGP/MIME (RFC 3156) schemes.

use std::{fmt::Display, str::FromStr};

use crate::{Message, MiddlewareType};

pub mod armor;
pub mod config;
pub mod helper;

pub use config::{Config, ConfigBuilder};

pub const TYPE: MiddlewareType = MiddlewareType("openpgp");

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// What to do with the message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Action {
    #[default]
    Encrypt,
    EncryptAndSign,
    Sign,
}

/// How the OpenPGP data is embedded into the message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Each text part and file is processed on its own.
    #[default]
    Inline,
    /// The whole MIME entity is processed (RFC 3156).
    Mime,
}

#[derive(Debug)]
pub enum Error {
    NoPrivateKey,
    NoPublicKey,
    NoEncryptionKey,
    InvalidArmor,
    MissingSignature,
    UnknownAction(String),
    UnknownScheme(String),
    Pgp(pgp::errors::Error),
    Io(std::io::Error),
}

/// Encrypts and/or signs messages with OpenPGP.
#[derive(Debug, Clone)]
pub struct Middleware {
    config: Config,
}

impl Middleware {
    pub fn new(config: Config) -> Self {
        Middleware { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl crate::Middleware for Middleware {
    fn handle<'x>(&self, message: Message<'x>) -> Message<'x> {
        if message.is_sealed() {
            log::warn!("Message is already signed, skipping OpenPGP processing");
            return message;
        }

        match self.config.scheme {
            Scheme::Inline => self.pgp_inline(message),
            Scheme::Mime => self.pgp_mime(message),
        }
    }

    fn middleware_type(&self) -> MiddlewareType {
        TYPE
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Encrypt-only" => Ok(Action::Encrypt),
            "Encrypt/Sign" => Ok(Action::EncryptAndSign),
            "Sign-only" => Ok(Action::Sign),
            _ => Err(Error::UnknownAction(s.to_string())),
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Action::Encrypt => "Encrypt-only",
            Action::EncryptAndSign => "Encrypt/Sign",
            Action::Sign => "Sign-only",
        })
    }
}

impl FromStr for Scheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PGP/Inline" => Ok(Scheme::Inline),
            "PGP/MIME" => Ok(Scheme::Mime),
            _ => Err(Error::UnknownScheme(s.to_string())),
        }
    }
}

impl Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Scheme::Inline => "PGP/Inline",
            Scheme::Mime => "PGP/MIME",
        })
    }
}

impl From<Error> for crate::Error {
    fn from(err: Error) -> Self {
        crate::Error::OpenPgp(err)
    }
}

impl From<pgp::errors::Error> for Error {
    fn from(err: pgp::errors::Error) -> Self {
        Error::Pgp(err)
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
            Error::NoPrivateKey => write!(f, "Message signing requires a private key"),
            Error::NoPublicKey => write!(f, "Message encryption requires a public key"),
            Error::NoEncryptionKey => write!(f, "Public key has no encryption capable key"),
            Error::InvalidArmor => write!(f, "Invalid ASCII armor"),
            Error::MissingSignature => write!(f, "No signature was produced"),
            Error::UnknownAction(action) => write!(f, "Unsupported action {:?}", action),
            Error::UnknownScheme(scheme) => write!(f, "Unsupported scheme {:?}", scheme),
            Error::Pgp(err) => write!(f, "OpenPGP error: {}", err),
            Error::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}
