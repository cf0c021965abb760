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

use std::{borrow::Cow, fmt::Display, str::FromStr, time::SystemTime};

use super::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Canonicalization {
    #[default]
    Simple,
    Relaxed,
}

/// Hash algorithm used for signing. Only SHA-256 is supported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HashAlgorithm {
    #[default]
    Sha256,
}

/// DKIM signing parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerConfig<'x> {
    pub domain: Cow<'x, str>,
    pub selector: Cow<'x, str>,
    pub auid: Option<Cow<'x, str>>,
    pub header_canonicalization: Canonicalization,
    pub body_canonicalization: Canonicalization,
    pub hash_algorithm: HashAlgorithm,
    pub expiration: Option<SystemTime>,
    pub header_fields: Vec<Cow<'x, str>>,
}

impl<'x> SignerConfig<'x> {
    /// Creates a new configuration for the given signing domain and selector.
    pub fn new(
        domain: impl Into<Cow<'x, str>>,
        selector: impl Into<Cow<'x, str>>,
    ) -> Result<Self, Error> {
        let domain = domain.into();
        if domain.is_empty() {
            return Err(Error::EmptyDomain);
        }
        let selector = selector.into();
        if selector.is_empty() {
            return Err(Error::EmptySelector);
        }

        Ok(SignerConfig {
            domain,
            selector,
            auid: None,
            header_canonicalization: Canonicalization::Simple,
            body_canonicalization: Canonicalization::Simple,
            hash_algorithm: HashAlgorithm::Sha256,
            expiration: None,
            header_fields: Vec::new(),
        })
    }

    /// Sets the Agent or User Identifier (i=).
    pub fn auid(mut self, auid: impl Into<Cow<'x, str>>) -> Self {
        self.set_auid(auid);
        self
    }

    /// Sets the canonicalization algorithm for the headers.
    pub fn header_canonicalization(mut self, c: Canonicalization) -> Self {
        self.header_canonicalization = c;
        self
    }

    /// Sets the canonicalization algorithm for the body.
    pub fn body_canonicalization(mut self, c: Canonicalization) -> Self {
        self.body_canonicalization = c;
        self
    }

    /// Sets the hash algorithm.
    pub fn hash_algorithm(mut self, hash_algorithm: HashAlgorithm) -> Self {
        self.hash_algorithm = hash_algorithm;
        self
    }

    /// Sets the time after which the signature expires.
    pub fn expiration(mut self, expiration: SystemTime) -> Result<Self, Error> {
        self.set_expiration(expiration)?;
        Ok(self)
    }

    /// Sets the header fields to sign. The list must include `From`.
    pub fn header_fields<T, U>(mut self, header_fields: T) -> Result<Self, Error>
    where
        T: IntoIterator<Item = U>,
        U: Into<Cow<'x, str>>,
    {
        self.set_header_fields(header_fields)?;
        Ok(self)
    }

    pub fn set_auid(&mut self, auid: impl Into<Cow<'x, str>>) {
        self.auid = Some(auid.into());
    }

    pub fn set_selector(&mut self, selector: impl Into<Cow<'x, str>>) -> Result<(), Error> {
        let selector = selector.into();
        if selector.is_empty() {
            return Err(Error::EmptySelector);
        }
        self.selector = selector;
        Ok(())
    }

    /// Parses and sets the header canonicalization.
    pub fn set_header_canonicalization(&mut self, c: &str) -> Result<(), Error> {
        self.header_canonicalization = c.parse()?;
        Ok(())
    }

    /// Parses and sets the body canonicalization.
    pub fn set_body_canonicalization(&mut self, c: &str) -> Result<(), Error> {
        self.body_canonicalization = c.parse()?;
        Ok(())
    }

    /// Parses and sets the hash algorithm.
    pub fn set_hash_algorithm(&mut self, hash_algorithm: &str) -> Result<(), Error> {
        self.hash_algorithm = hash_algorithm.parse()?;
        Ok(())
    }

    pub fn set_expiration(&mut self, expiration: SystemTime) -> Result<(), Error> {
        if expiration <= SystemTime::now() {
            return Err(Error::InvalidExpiration);
        }
        self.expiration = Some(expiration);
        Ok(())
    }

    /// Replaces the list of header fields to sign. The list must include `From`.
    pub fn set_header_fields<T, U>(&mut self, header_fields: T) -> Result<(), Error>
    where
        T: IntoIterator<Item = U>,
        U: Into<Cow<'x, str>>,
    {
        let header_fields = header_fields
            .into_iter()
            .map(Into::into)
            .collect::<Vec<_>>();
        if !header_fields
            .iter()
            .any(|field| field.eq_ignore_ascii_case("From"))
        {
            return Err(Error::FromRequired);
        }
        self.header_fields = header_fields;
        Ok(())
    }

    /// Seconds until the signature expires, counted from now.
    pub(crate) fn expires_in(&self) -> Option<u64> {
        self.expiration.map(|expiration| {
            expiration
                .duration_since(SystemTime::now())
                .map_or(0, |duration| duration.as_secs())
        })
    }
}

impl<'x> SignerConfig<'x> {
    /// Converts the configuration into one that owns all its strings.
    pub fn into_owned(self) -> SignerConfig<'static> {
        SignerConfig {
            domain: self.domain.into_owned().into(),
            selector: self.selector.into_owned().into(),
            auid: self.auid.map(|auid| auid.into_owned().into()),
            header_canonicalization: self.header_canonicalization,
            body_canonicalization: self.body_canonicalization,
            hash_algorithm: self.hash_algorithm,
            expiration: self.expiration,
            header_fields: self
                .header_fields
                .into_iter()
                .map(|field| field.into_owned().into())
                .collect(),
        }
    }
}

impl FromStr for Canonicalization {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(Canonicalization::Simple),
            "relaxed" => Ok(Canonicalization::Relaxed),
            _ => Err(Error::InvalidCanonicalization(s.to_string())),
        }
    }
}

impl Display for Canonicalization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Canonicalization::Simple => "simple",
            Canonicalization::Relaxed => "relaxed",
        })
    }
}

impl From<Canonicalization> for mail_auth::dkim::Canonicalization {
    fn from(c: Canonicalization) -> Self {
        match c {
            Canonicalization::Simple => mail_auth::dkim::Canonicalization::Simple,
            Canonicalization::Relaxed => mail_auth::dkim::Canonicalization::Relaxed,
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha256" | "SHA-256" => Ok(HashAlgorithm::Sha256),
            _ => Err(Error::InvalidHashAlgorithm(s.to_string())),
        }
    }
}

impl Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SHA-256")
    }
}
