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

//! Subject capitalization middleware.

use std::fmt::Display;

use unic_langid::LanguageIdentifier;

use crate::{Message, MiddlewareType};

pub mod title;

pub const TYPE: MiddlewareType = MiddlewareType("subcap");

#[derive(Debug)]
pub enum Error {
    InvalidLanguage(String),
}

/// Title-cases the subject of messages using the casing rules of a language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Middleware {
    language: LanguageIdentifier,
}

impl Middleware {
    pub fn new(language: LanguageIdentifier) -> Self {
        Middleware { language }
    }

    /// Creates a middleware from a BCP 47 language tag such as `en` or `tr-TR`.
    pub fn from_tag(tag: &str) -> crate::Result<Self> {
        tag.parse::<LanguageIdentifier>()
            .map(Middleware::new)
            .map_err(|_| Error::InvalidLanguage(tag.to_string()).into())
    }

    pub fn language(&self) -> &LanguageIdentifier {
        &self.language
    }
}

impl crate::Middleware for Middleware {
    fn handle<'x>(&self, mut message: Message<'x>) -> Message<'x> {
        if message.is_sealed() {
            log::warn!("Message is already signed, not changing its subject");
            return message;
        }

        if let Some(subject) = message.get_subject() {
            let subject = title::title_case(subject, &self.language);
            log::debug!("Capitalized subject using {} casing rules", self.language);
            message.set_subject(subject);
        }

        message
    }

    fn middleware_type(&self) -> MiddlewareType {
        TYPE
    }
}

impl From<Error> for crate::Error {
    fn from(err: Error) -> Self {
        crate::Error::Subcap(err)
    }
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidLanguage(tag) => write!(f, "Invalid language tag {:?}", tag),
        }
    }
}
