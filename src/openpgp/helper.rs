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

use pgp::{
    crypto::{hash::HashAlgorithm, sym::SymmetricKeyAlgorithm},
    ser::Serialize,
    types::PublicKeyTrait,
    Message as PgpMessage, StandaloneSignature,
};
use rand::{distributions::Alphanumeric, rngs::ThreadRng, thread_rng, Rng};

use crate::{
    message::{PgpEnvelope, TYPE_OCTET_STREAM, TYPE_TEXT_PLAIN},
    File, Message, Part,
};

use super::{
    armor::{armor, dearmor, BlockType},
    Action, Error, Middleware, VERSION,
};

const ARMOR_COMMENT: &str = "OpenPGP based on rpgp (https://github.com/rpgp/rpgp)";
const BOUNDARY_LENGTH: usize = 24;
const MICALG: &str = "pgp-sha256";

impl Middleware {
    pub(crate) fn pgp_inline<'x>(&self, mut message: Message<'x>) -> Message<'x> {
        for part in std::mem::take(&mut message.parts) {
            if part.media_type().eq_ignore_ascii_case(TYPE_TEXT_PLAIN) {
                match self.process_plain(&part.content) {
                    Ok(armored) => message.parts.push(Part {
                        content: armored.into(),
                        ..part
                    }),
                    Err(err) => {
                        log::error!("Failed to process message part: {}", err);
                        message.parts.push(part);
                    }
                }
            } else {
                log::warn!(
                    "Unsupported type {:?}, removing message part",
                    part.content_type
                );
            }
        }

        message.embeds = self.process_files(std::mem::take(&mut message.embeds));
        message.attachments = self.process_files(std::mem::take(&mut message.attachments));

        log::debug!(
            "Processed message using {} ({})",
            self.config.scheme,
            self.config.action
        );

        message
    }

    pub(crate) fn pgp_mime<'x>(&self, mut message: Message<'x>) -> Message<'x> {
        let entity = match message.render_entity() {
            Ok(entity) => entity,
            Err(err) => {
                log::error!("Failed to render message entity: {}", err);
                return message;
            }
        };

        let envelope = match self.config.action {
            Action::Encrypt | Action::EncryptAndSign => {
                self.process_binary(&entity)
                    .map(|payload| PgpEnvelope::Encrypted {
                        payload,
                        boundary: boundary(),
                    })
            }
            Action::Sign => {
                let mut entity = entity;
                while entity.last().map_or(false, |&ch| ch == b'\r' || ch == b'\n') {
                    entity.pop();
                }
                self.sign_detached(&entity)
                    .map(|signature| PgpEnvelope::Signed {
                        entity,
                        signature,
                        micalg: MICALG,
                        boundary: boundary(),
                    })
            }
        };

        match envelope {
            Ok(envelope) => {
                message.parts.clear();
                message.embeds.clear();
                message.attachments.clear();
                message.pgp = Some(envelope);
                log::debug!(
                    "Processed message using {} ({})",
                    self.config.scheme,
                    self.config.action
                );
            }
            Err(err) => {
                log::error!("Failed to process message entity: {}", err);
            }
        }

        message
    }

    /// Encrypts and/or signs a text according to the configured action and
    /// returns the armored OpenPGP message.
    pub fn process_plain(&self, text: &str) -> Result<String, Error> {
        self.process(PgpMessage::new_literal("", text))
    }

    /// Encrypts and/or signs binary data according to the configured action
    /// and returns the armored OpenPGP message.
    pub fn process_binary(&self, data: &[u8]) -> Result<String, Error> {
        self.process(PgpMessage::new_literal_bytes("", data))
    }

    /// Creates an armored detached signature of the data.
    pub fn sign_detached(&self, data: &[u8]) -> Result<String, Error> {
        let mut rng = thread_rng();
        match self.sign(&mut rng, PgpMessage::new_literal_bytes("", data))? {
            PgpMessage::Signed { signature, .. } => armored(
                BlockType::Signature,
                &StandaloneSignature::new(signature).to_bytes()?,
            ),
            _ => Err(Error::MissingSignature),
        }
    }

    /// Replaces the armor headers of an armored block.
    pub fn rearmor(&self, text: &str) -> Result<String, Error> {
        let (block_type, data) = dearmor(text)?;
        armored(block_type, &data)
    }

    fn process(&self, literal: PgpMessage) -> Result<String, Error> {
        let mut rng = thread_rng();
        let message = match self.config.action {
            Action::Encrypt => self.encrypt(&mut rng, literal)?,
            Action::EncryptAndSign => {
                let signed = self.sign(&mut rng, literal)?;
                self.encrypt(&mut rng, signed)?
            }
            Action::Sign => self.sign(&mut rng, literal)?,
        };

        armored(BlockType::Message, &message.to_bytes()?)
    }

    fn sign(&self, rng: &mut ThreadRng, message: PgpMessage) -> Result<PgpMessage, Error> {
        let key = self
            .config
            .private_key
            .as_ref()
            .ok_or(Error::NoPrivateKey)?;
        let passphrase = self.config.passphrase.clone();

        message
            .sign(rng, key, || passphrase, HashAlgorithm::SHA2_256)
            .map_err(Error::from)
    }

    fn encrypt(&self, rng: &mut ThreadRng, message: PgpMessage) -> Result<PgpMessage, Error> {
        let key = self
            .config
            .public_key
            .as_ref()
            .ok_or(Error::NoPublicKey)?;

        // Prefer an encryption subkey over the primary key
        let encrypted = match key
            .public_subkeys
            .iter()
            .find(|subkey| subkey.is_encryption_key())
        {
            Some(subkey) => {
                message.encrypt_to_keys_seipdv1(rng, SymmetricKeyAlgorithm::AES128, &[subkey])
            }
            None if key.is_encryption_key() => {
                message.encrypt_to_keys_seipdv1(rng, SymmetricKeyAlgorithm::AES128, &[key])
            }
            None => return Err(Error::NoEncryptionKey),
        };

        encrypted.map_err(Error::from)
    }

    fn process_files<'x>(&self, files: Vec<File<'x>>) -> Vec<File<'x>> {
        files
            .into_iter()
            .filter_map(|file| match self.process_binary(&file.data) {
                Ok(armored) => Some(File {
                    name: file.name,
                    content_type: TYPE_OCTET_STREAM.into(),
                    description: file.description,
                    data: armored.into_bytes().into(),
                }),
                Err(err) => {
                    log::error!("Failed to process file {:?}: {}", file.name, err);
                    None
                }
            })
            .collect()
    }
}

fn armored(block_type: BlockType, data: &[u8]) -> Result<String, Error> {
    let version = format!("mail-middleware {}", VERSION);
    armor(
        block_type,
        data,
        &[("Version", &version), ("Comment", ARMOR_COMMENT)],
    )
}

fn boundary() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(BOUNDARY_LENGTH)
        .map(char::from)
        .collect()
}
