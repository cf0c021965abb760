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

use std::io::Write;

use mail_builder::{
    headers::{
        address::Address as BuilderAddress, content_type::ContentType, date::Date,
        message_id::MessageId, raw::Raw, text::Text, HeaderType,
    },
    mime::{BodyPart, MimePart},
    MessageBuilder,
};

use super::{scan::split_message, File, Header, Message, Part, PgpEnvelope, TYPE_TEXT_PLAIN};

impl<'x> Message<'x> {
    /// Renders the message without running its middlewares.
    pub fn render(&self) -> crate::Result<Vec<u8>> {
        let mut output = Vec::new();
        self.render_to(&mut output)?;
        Ok(output)
    }

    /// Writes the message without running its middlewares.
    pub fn render_to(&self, mut output: impl Write) -> crate::Result<()> {
        if let Some(sealed) = &self.sealed {
            for (name, value) in sealed.headers.iter().rev() {
                write_header(&mut output, name, value)?;
            }
            output.write_all(&sealed.bytes)?;
            return Ok(());
        }

        for (name, value) in &self.preformatted_headers {
            write_header(&mut output, name, value)?;
        }

        match &self.pgp {
            None => self.builder().body(self.body()).write_to(output)?,
            Some(envelope) => {
                // Render the top-level headers only, the envelope replaces the body
                let rendered = self.builder().text_body("").write_to_vec()?;
                let (fields, _) = split_message(&rendered);
                for field in fields
                    .iter()
                    .filter(|field| !field.is_content() && !field.is_named("MIME-Version"))
                {
                    output.write_all(field.raw)?;
                }
                envelope.write_to(output)?;
            }
        }

        Ok(())
    }

    /// Renders the MIME entity of the message: its `Content-*` header
    /// fields followed by the body.
    pub fn render_entity(&self) -> crate::Result<Vec<u8>> {
        let rendered = self.builder().body(self.body()).write_to_vec()?;
        let (fields, body) = split_message(&rendered);

        let mut entity = Vec::with_capacity(rendered.len());
        for field in fields.iter().filter(|field| field.is_content()) {
            entity.extend_from_slice(field.raw);
        }
        if entity.is_empty() {
            return Err(crate::Error::MalformedMessage);
        }
        entity.extend_from_slice(b"\r\n");
        entity.extend_from_slice(body);

        Ok(entity)
    }

    fn builder(&self) -> MessageBuilder<'_> {
        self.headers
            .iter()
            .fold(MessageBuilder::new(), |builder, (name, value)| {
                builder.header(name.as_ref(), header_type(value))
            })
    }

    fn body(&self) -> MimePart<'_> {
        let mut alternatives = self.parts.iter().map(Part::mime_part).collect::<Vec<_>>();
        let mut body = if alternatives.len() > 1 {
            MimePart::new(
                ContentType::new("multipart/alternative"),
                BodyPart::Multipart(alternatives),
            )
        } else {
            alternatives.pop().unwrap_or_else(|| {
                MimePart::new(
                    ContentType::new(TYPE_TEXT_PLAIN),
                    BodyPart::Text("".into()),
                )
            })
        };

        if !self.embeds.is_empty() {
            let mut related = Vec::with_capacity(self.embeds.len() + 1);
            related.push(body);
            related.extend(
                self.embeds
                    .iter()
                    .map(|file| file.mime_part().inline().cid(file.name.as_ref())),
            );
            body = MimePart::new(
                ContentType::new("multipart/related"),
                BodyPart::Multipart(related),
            );
        }

        if !self.attachments.is_empty() {
            let mut mixed = Vec::with_capacity(self.attachments.len() + 1);
            mixed.push(body);
            mixed.extend(
                self.attachments
                    .iter()
                    .map(|file| file.mime_part().attachment(file.name.as_ref())),
            );
            body = MimePart::new(
                ContentType::new("multipart/mixed"),
                BodyPart::Multipart(mixed),
            );
        }

        body
    }
}

impl<'x> Part<'x> {
    fn mime_part(&self) -> MimePart<'_> {
        // Content is always UTF-8, whatever charset the caller gave
        let content_type = self
            .content_type_params()
            .filter(|(name, _)| !name.eq_ignore_ascii_case("charset"))
            .fold(ContentType::new(self.media_type()), |content_type, (name, value)| {
                content_type.attribute(name, value)
            })
            .attribute("charset", "utf-8");
        let mut part = MimePart::new(content_type, BodyPart::Text(self.content.as_ref().into()));
        if let Some(description) = &self.description {
            part = part.header("Content-Description", Text::new(description.as_ref()));
        }
        part
    }
}

impl<'x> File<'x> {
    fn mime_part(&self) -> MimePart<'_> {
        let mut part = MimePart::new(
            ContentType::new(self.content_type.as_ref()).attribute("name", self.name.as_ref()),
            BodyPart::Binary(self.data.as_ref().into()),
        );
        if let Some(description) = &self.description {
            part = part.header("Content-Description", Text::new(description.as_ref()));
        }
        part
    }
}

impl PgpEnvelope {
    fn write_to(&self, mut output: impl Write) -> std::io::Result<()> {
        output.write_all(b"MIME-Version: 1.0\r\n")?;
        match self {
            PgpEnvelope::Encrypted { payload, boundary } => {
                write!(
                    output,
                    concat!(
                        "Content-Type: multipart/encrypted;\r\n",
                        "\tprotocol=\"application/pgp-encrypted\";\r\n",
                        "\tboundary=\"{b}\"\r\n\r\n",
                        "This is an OpenPGP/MIME encrypted message (RFC 4880 and 3156)\r\n",
                        "--{b}\r\n",
                        "Content-Type: application/pgp-encrypted\r\n",
                        "Content-Description: PGP/MIME version identification\r\n\r\n",
                        "Version: 1\r\n\r\n",
                        "--{b}\r\n",
                        "Content-Type: application/octet-stream; name=\"encrypted.asc\"\r\n",
                        "Content-Description: OpenPGP encrypted message\r\n",
                        "Content-Disposition: inline; filename=\"encrypted.asc\"\r\n\r\n",
                    ),
                    b = boundary
                )?;
                write_text(&mut output, payload)?;
                write!(output, "\r\n--{}--\r\n", boundary)
            }
            PgpEnvelope::Signed {
                entity,
                signature,
                micalg,
                boundary,
            } => {
                write!(
                    output,
                    concat!(
                        "Content-Type: multipart/signed; micalg={m};\r\n",
                        "\tprotocol=\"application/pgp-signature\";\r\n",
                        "\tboundary=\"{b}\"\r\n\r\n",
                        "This is an OpenPGP/MIME signed message (RFC 4880 and 3156)\r\n",
                        "--{b}\r\n",
                    ),
                    m = micalg,
                    b = boundary
                )?;
                output.write_all(entity)?;
                write!(
                    output,
                    concat!(
                        "\r\n--{b}\r\n",
                        "Content-Type: application/pgp-signature; name=\"signature.asc\"\r\n",
                        "Content-Description: OpenPGP digital signature\r\n",
                        "Content-Disposition: attachment; filename=\"signature.asc\"\r\n\r\n",
                    ),
                    b = boundary
                )?;
                write_text(&mut output, signature)?;
                write!(output, "\r\n--{}--\r\n", boundary)
            }
        }
    }
}

fn header_type<'a>(value: &'a Header<'_>) -> HeaderType<'a> {
    match value {
        Header::Text(text) => Text::new(text.as_ref()).into(),
        Header::Address(list) => BuilderAddress::new_list(
            list.iter()
                .map(|address| {
                    BuilderAddress::new_address(address.name.as_deref(), address.email.as_ref())
                })
                .collect(),
        )
        .into(),
        Header::Date(timestamp) => Date::new(*timestamp).into(),
        Header::MessageId(id) => MessageId::new(id.as_ref()).into(),
        Header::Raw(raw) => Raw::new(raw.as_ref()).into(),
    }
}

fn write_header(mut output: impl Write, name: &str, value: &str) -> std::io::Result<()> {
    output.write_all(name.as_bytes())?;
    output.write_all(b": ")?;
    output.write_all(value.as_bytes())?;
    output.write_all(b"\r\n")
}

/// Writes text with CRLF line endings and no trailing line break.
fn write_text(mut output: impl Write, text: &str) -> std::io::Result<()> {
    for (pos, line) in text.trim_end_matches(['\r', '\n']).split('\n').enumerate() {
        if pos > 0 {
            output.write_all(b"\r\n")?;
        }
        output.write_all(line.trim_end_matches('\r').as_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use mail_parser::{MessageParser, MimeHeaders};

    use crate::{message::PgpEnvelope, Message, Part};

    #[test]
    fn render_body_tree() {
        let message = Message::new()
            .from(("John Doe", "john@example.com"))
            .to("jane@example.com")
            .subject("Body tree")
            .text_body("Hello world!")
            .html_body("<p>Hello world!</p>")
            .embed("image/png", "logo.png", b"not really a png".as_slice())
            .attachment("text/csv", "data.csv", b"a,b,c\n1,2,3\n".as_slice())
            .render()
            .unwrap();

        let parsed = MessageParser::default().parse(&message).unwrap();
        assert_eq!(parsed.subject(), Some("Body tree"));
        assert_eq!(parsed.body_text(0).as_deref(), Some("Hello world!"));
        assert_eq!(parsed.body_html(0).as_deref(), Some("<p>Hello world!</p>"));

        let attachment = parsed
            .attachments()
            .find(|part| part.attachment_name() == Some("data.csv"))
            .unwrap();
        assert_eq!(attachment.contents(), b"a,b,c\n1,2,3\n");
        let embed = parsed
            .attachments()
            .find(|part| part.attachment_name() == Some("logo.png"))
            .unwrap();
        assert_eq!(embed.content_id(), Some("logo.png"));
    }

    #[test]
    fn render_part_parameters() {
        let message = Message::new()
            .from("john@example.com")
            .subject("Parameters")
            .part(Part::new(
                "text/plain; charset=iso-8859-1; format=flowed",
                "Hello world!",
            ))
            .render()
            .unwrap();

        let text = String::from_utf8(message.clone()).unwrap();
        assert_eq!(text.matches("charset").count(), 1, "{}", text);
        let parsed = MessageParser::default().parse(&message).unwrap();
        let content_type = parsed.content_type().unwrap();
        assert_eq!(content_type.subtype(), Some("plain"));
        assert_eq!(content_type.attribute("charset"), Some("utf-8"));
        assert_eq!(content_type.attribute("format"), Some("flowed"));
        assert_eq!(parsed.body_text(0).as_deref(), Some("Hello world!"));
    }

    #[test]
    fn render_empty_body() {
        let message = Message::new()
            .from("john@example.com")
            .subject("Empty")
            .render()
            .unwrap();
        let parsed = MessageParser::default().parse(&message).unwrap();
        assert_eq!(parsed.subject(), Some("Empty"));
        let content_type = parsed.content_type().unwrap();
        assert_eq!(content_type.ctype(), "text");
        assert_eq!(content_type.subtype(), Some("plain"));
    }

    #[test]
    fn render_entity() {
        let message = Message::new()
            .from("john@example.com")
            .to("jane@example.com")
            .subject("Entity")
            .preformatted_header("X-Mailer", "test")
            .text_body("Hello world!");

        let entity = String::from_utf8(message.render_entity().unwrap()).unwrap();
        assert!(entity.starts_with("Content-Type: text/plain"), "{}", entity);
        assert!(!entity.contains("Subject:"), "{}", entity);
        assert!(!entity.contains("X-Mailer"), "{}", entity);
        assert!(entity.contains("\r\n\r\nHello world!"), "{}", entity);
    }

    #[test]
    fn render_envelope() {
        let mut message = Message::new()
            .from("john@example.com")
            .to("jane@example.com")
            .subject("Envelope")
            .text_body("Hello world!");
        message.parts.clear();
        message.pgp = Some(PgpEnvelope::Signed {
            entity: b"Content-Type: text/plain\r\n\r\nHello world!".to_vec(),
            signature: "-----BEGIN PGP SIGNATURE-----\n\nabc\n-----END PGP SIGNATURE-----\n"
                .to_string(),
            micalg: "pgp-sha256",
            boundary: "xyz".to_string(),
        });

        let rendered = String::from_utf8(message.render().unwrap()).unwrap();
        assert_eq!(rendered.matches("MIME-Version").count(), 1, "{}", rendered);
        assert_eq!(rendered.matches("Content-Type:").count(), 3, "{}", rendered);
        assert!(
            rendered.contains(concat!(
                "--xyz\r\n",
                "Content-Type: text/plain\r\n\r\nHello world!\r\n",
                "--xyz\r\n"
            )),
            "{}",
            rendered
        );
        assert!(
            rendered.ends_with("abc\r\n-----END PGP SIGNATURE-----\r\n--xyz--\r\n"),
            "{}",
            rendered
        );

        let parsed = MessageParser::default().parse(rendered.as_bytes()).unwrap();
        assert_eq!(parsed.subject(), Some("Envelope"));
        let content_type = parsed.content_type().unwrap();
        assert_eq!(content_type.subtype(), Some("signed"));
        assert_eq!(content_type.attribute("micalg"), Some("pgp-sha256"));
        assert_eq!(
            content_type.attribute("protocol"),
            Some("application/pgp-signature")
        );
    }
}
