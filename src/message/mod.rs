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

use std::{borrow::Cow, fmt::Debug, io::Write, sync::Arc};

use crate::{Middleware, MiddlewareType};

pub mod render;
pub mod scan;

/// An e-mail message together with the middlewares that transform it
/// before it is written.
#[derive(Clone, Default)]
pub struct Message<'x> {
    pub headers: Vec<(Cow<'x, str>, Header<'x>)>,
    pub preformatted_headers: Vec<(Cow<'x, str>, Cow<'x, str>)>,
    pub parts: Vec<Part<'x>>,
    pub embeds: Vec<File<'x>>,
    pub attachments: Vec<File<'x>>,
    pub pgp: Option<PgpEnvelope>,
    sealed: Option<Sealed<'x>>,
    middlewares: Vec<Arc<dyn Middleware>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header<'x> {
    Text(Cow<'x, str>),
    Address(Vec<Address<'x>>),
    Date(i64),
    MessageId(Cow<'x, str>),
    Raw(Cow<'x, str>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Address<'x> {
    pub name: Option<Cow<'x, str>>,
    pub email: Cow<'x, str>,
}

/// An alternative representation of the message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part<'x> {
    pub content_type: Cow<'x, str>,
    pub content: Cow<'x, str>,
    pub description: Option<Cow<'x, str>>,
}

/// An embedded or attached file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File<'x> {
    pub name: Cow<'x, str>,
    pub content_type: Cow<'x, str>,
    pub description: Option<Cow<'x, str>>,
    pub data: Cow<'x, [u8]>,
}

/// OpenPGP/MIME container that replaces the regular body (RFC 3156).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PgpEnvelope {
    Encrypted {
        payload: String,
        boundary: String,
    },
    Signed {
        entity: Vec<u8>,
        signature: String,
        micalg: &'static str,
        boundary: String,
    },
}

/// A frozen rendering and the preformatted headers added after it.
#[derive(Debug, Clone)]
struct Sealed<'x> {
    bytes: Vec<u8>,
    headers: Vec<(Cow<'x, str>, Cow<'x, str>)>,
}

pub const TYPE_TEXT_PLAIN: &str = "text/plain";
pub const TYPE_TEXT_HTML: &str = "text/html";
pub const TYPE_OCTET_STREAM: &str = "application/octet-stream";

impl<'x> Message<'x> {
    /// Create a new empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sender of the message.
    pub fn from(self, address: impl Into<Address<'x>>) -> Self {
        self.header("From", Header::Address(vec![address.into()]))
    }

    /// Add a message recipient.
    pub fn to(self, address: impl Into<Address<'x>>) -> Self {
        self.add_address("To", address.into())
    }

    /// Add a carbon-copy recipient.
    pub fn cc(self, address: impl Into<Address<'x>>) -> Self {
        self.add_address("Cc", address.into())
    }

    /// Set the Reply-To address.
    pub fn reply_to(self, address: impl Into<Address<'x>>) -> Self {
        self.header("Reply-To", Header::Address(vec![address.into()]))
    }

    /// Set the message subject.
    pub fn subject(mut self, subject: impl Into<Cow<'x, str>>) -> Self {
        self.set_subject(subject);
        self
    }

    /// Set the message date as a UNIX timestamp.
    pub fn date(self, timestamp: i64) -> Self {
        self.header("Date", Header::Date(timestamp))
    }

    /// Set the Message-ID, without angle brackets.
    pub fn message_id(self, id: impl Into<Cow<'x, str>>) -> Self {
        self.header("Message-ID", Header::MessageId(id.into()))
    }

    /// Set a header, replacing any previous value with the same name.
    pub fn header(mut self, name: impl Into<Cow<'x, str>>, value: impl Into<Header<'x>>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Add a header that is written verbatim at the top of the message.
    pub fn preformatted_header(
        mut self,
        name: impl Into<Cow<'x, str>>,
        value: impl Into<Cow<'x, str>>,
    ) -> Self {
        self.add_preformatted_header(name, value);
        self
    }

    /// Add a plain text body part.
    pub fn text_body(self, text: impl Into<Cow<'x, str>>) -> Self {
        self.part(Part::new(TYPE_TEXT_PLAIN, text))
    }

    /// Add an HTML body part.
    pub fn html_body(self, html: impl Into<Cow<'x, str>>) -> Self {
        self.part(Part::new(TYPE_TEXT_HTML, html))
    }

    /// Add an alternative body part.
    pub fn part(mut self, part: Part<'x>) -> Self {
        self.parts.push(part);
        self
    }

    /// Attach a file.
    pub fn attachment(
        mut self,
        content_type: impl Into<Cow<'x, str>>,
        name: impl Into<Cow<'x, str>>,
        data: impl Into<Cow<'x, [u8]>>,
    ) -> Self {
        self.attachments.push(File::new(content_type, name, data));
        self
    }

    /// Embed a file inline, referenced by its name as Content-ID.
    pub fn embed(
        mut self,
        content_type: impl Into<Cow<'x, str>>,
        name: impl Into<Cow<'x, str>>,
        data: impl Into<Cow<'x, [u8]>>,
    ) -> Self {
        self.embeds.push(File::new(content_type, name, data));
        self
    }

    /// Register a middleware. Middlewares run in registration order.
    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn set_header(&mut self, name: impl Into<Cow<'x, str>>, value: impl Into<Header<'x>>) {
        let name = name.into();
        let value = value.into();
        if let Some(pos) = self
            .headers
            .iter()
            .position(|(key, _)| key.eq_ignore_ascii_case(&name))
        {
            self.headers[pos] = (name.clone(), value);
            let mut idx = pos + 1;
            while idx < self.headers.len() {
                if self.headers[idx].0.eq_ignore_ascii_case(&name) {
                    self.headers.remove(idx);
                } else {
                    idx += 1;
                }
            }
        } else {
            self.headers.push((name, value));
        }
    }

    pub fn set_subject(&mut self, subject: impl Into<Cow<'x, str>>) {
        self.set_header("Subject", Header::Text(subject.into()));
    }

    /// Set a preformatted header, replacing any previous one with the same name.
    /// On a sealed message only headers added after sealing are replaced.
    pub fn set_preformatted_header(
        &mut self,
        name: impl Into<Cow<'x, str>>,
        value: impl Into<Cow<'x, str>>,
    ) {
        let name = name.into();
        let headers = self.writable_preformatted_headers();
        headers.retain(|(key, _)| !key.eq_ignore_ascii_case(&name));
        headers.push((name, value.into()));
    }

    /// Add a preformatted header, keeping any previous one with the same name.
    pub fn add_preformatted_header(
        &mut self,
        name: impl Into<Cow<'x, str>>,
        value: impl Into<Cow<'x, str>>,
    ) {
        self.writable_preformatted_headers()
            .push((name.into(), value.into()));
    }

    /// Preformatted headers added after sealing, in insertion order.
    pub fn sealed_headers(&self) -> &[(Cow<'x, str>, Cow<'x, str>)] {
        match &self.sealed {
            Some(sealed) => &sealed.headers,
            None => &[],
        }
    }

    fn writable_preformatted_headers(&mut self) -> &mut Vec<(Cow<'x, str>, Cow<'x, str>)> {
        match &mut self.sealed {
            Some(sealed) => &mut sealed.headers,
            None => &mut self.preformatted_headers,
        }
    }

    /// Returns the first value of a header.
    pub fn get_header(&self, name: &str) -> Option<&Header<'x>> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    /// Returns the text of a header, if it is set to a text value.
    pub fn get_text_header(&self, name: &str) -> Option<&str> {
        match self.get_header(name)? {
            Header::Text(text) | Header::Raw(text) => Some(text.as_ref()),
            _ => None,
        }
    }

    pub fn get_subject(&self) -> Option<&str> {
        self.get_text_header("Subject")
    }

    /// Freeze the message to the given rendering. A sealed message is written
    /// as the preformatted headers added after sealing, newest first, followed
    /// by these bytes. Sealing again discards the headers added since the
    /// previous seal, the new rendering is expected to contain them.
    pub fn seal(&mut self, rendered: Vec<u8>) {
        self.sealed = Some(Sealed {
            bytes: rendered,
            headers: Vec::new(),
        });
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.is_some()
    }

    /// Runs all registered middlewares in order.
    pub fn apply_middlewares(self) -> Self {
        self.run_middlewares(None)
    }

    fn run_middlewares(mut self, skip: Option<MiddlewareType>) -> Self {
        let middlewares = self.middlewares.clone();
        for middleware in &middlewares {
            let middleware_type = middleware.middleware_type();
            if skip != Some(middleware_type) {
                log::trace!("Applying {} middleware", middleware_type);
                self = middleware.handle(self);
            }
        }
        self
    }

    /// Applies the middlewares and writes the message.
    pub fn write_to(&self, output: impl Write) -> crate::Result<()> {
        self.clone().run_middlewares(None).render_to(output)
    }

    /// Applies the middlewares and returns the message as a byte vector.
    pub fn write_to_vec(&self) -> crate::Result<Vec<u8>> {
        let mut output = Vec::new();
        self.write_to(&mut output)?;
        Ok(output)
    }

    /// Applies all middlewares except those of the given type and writes the message.
    pub fn write_to_skip_middleware(
        &self,
        output: impl Write,
        middleware_type: MiddlewareType,
    ) -> crate::Result<()> {
        self.clone()
            .run_middlewares(Some(middleware_type))
            .render_to(output)
    }

    fn add_address(mut self, name: &'static str, address: Address<'x>) -> Self {
        match self
            .headers
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
        {
            Some((_, Header::Address(list))) => list.push(address),
            _ => self.set_header(name, Header::Address(vec![address])),
        }
        self
    }
}

impl<'x> Part<'x> {
    pub fn new(content_type: impl Into<Cow<'x, str>>, content: impl Into<Cow<'x, str>>) -> Self {
        Part {
            content_type: content_type.into(),
            content: content.into(),
            description: None,
        }
    }

    /// Set the Content-Description of the part.
    pub fn description(mut self, description: impl Into<Cow<'x, str>>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The media type of the part, without its parameters.
    pub fn media_type(&self) -> &str {
        self.content_type
            .split_once(';')
            .map_or(self.content_type.as_ref(), |(media_type, _)| media_type)
            .trim()
    }

    /// The `name=value` parameters of the content type.
    pub fn content_type_params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.content_type.split(';').skip(1).filter_map(|param| {
            let (name, value) = param.split_once('=')?;
            Some((name.trim(), value.trim().trim_matches('"')))
        })
    }
}

impl<'x> File<'x> {
    pub fn new(
        content_type: impl Into<Cow<'x, str>>,
        name: impl Into<Cow<'x, str>>,
        data: impl Into<Cow<'x, [u8]>>,
    ) -> Self {
        File {
            name: name.into(),
            content_type: content_type.into(),
            description: None,
            data: data.into(),
        }
    }

    /// Set the Content-Description of the file.
    pub fn description(mut self, description: impl Into<Cow<'x, str>>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl<'x> Address<'x> {
    pub fn new(name: Option<impl Into<Cow<'x, str>>>, email: impl Into<Cow<'x, str>>) -> Self {
        Address {
            name: name.map(Into::into),
            email: email.into(),
        }
    }
}

impl<'x> From<&'x str> for Address<'x> {
    fn from(email: &'x str) -> Self {
        Address {
            name: None,
            email: email.into(),
        }
    }
}

impl<'x> From<String> for Address<'x> {
    fn from(email: String) -> Self {
        Address {
            name: None,
            email: email.into(),
        }
    }
}

impl<'x> From<(&'x str, &'x str)> for Address<'x> {
    fn from((name, email): (&'x str, &'x str)) -> Self {
        Address {
            name: Some(name.into()),
            email: email.into(),
        }
    }
}

impl<'x> From<(String, String)> for Address<'x> {
    fn from((name, email): (String, String)) -> Self {
        Address {
            name: Some(name.into()),
            email: email.into(),
        }
    }
}

impl<'x> From<&'x str> for Header<'x> {
    fn from(text: &'x str) -> Self {
        Header::Text(text.into())
    }
}

impl<'x> From<String> for Header<'x> {
    fn from(text: String) -> Self {
        Header::Text(text.into())
    }
}

impl<'x> From<Address<'x>> for Header<'x> {
    fn from(address: Address<'x>) -> Self {
        Header::Address(vec![address])
    }
}

impl<'x> Debug for Message<'x> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("headers", &self.headers)
            .field("preformatted_headers", &self.preformatted_headers)
            .field("parts", &self.parts)
            .field("embeds", &self.embeds)
            .field("attachments", &self.attachments)
            .field("pgp", &self.pgp)
            .field("sealed", &self.sealed.is_some())
            .field(
                "middlewares",
                &self
                    .middlewares
                    .iter()
                    .map(|m| m.middleware_type())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
