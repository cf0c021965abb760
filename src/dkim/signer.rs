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

use std::path::Path;

use mail_auth::{
    common::{crypto::SigningKey, headers::HeaderWriter},
    dkim::DkimSigner,
};

use crate::{message::scan::split_message, Message, MiddlewareType};

use super::{extract_dkim_header, key::PrivateKey, Error, SignerConfig, DKIM_SIGNATURE, TYPE};

/// Signs messages with DKIM.
///
/// The message is rendered, signed and sealed, so that later changes to it
/// cannot invalidate the signature. Several DKIM middlewares can be chained,
/// each one adding its own signature on top of the previous ones.
#[derive(Clone)]
pub struct Middleware {
    key: PrivateKey,
    config: SignerConfig<'static>,
}

impl Middleware {
    /// Creates a middleware from a PKCS#1 PEM encoded RSA private key.
    pub fn from_rsa_pem(pem: &str, config: SignerConfig<'_>) -> crate::Result<Self> {
        Ok(Middleware {
            key: PrivateKey::from_rsa_pem(pem)?,
            config: config.into_owned(),
        })
    }

    /// Creates a middleware from a PKCS#8 PEM encoded Ed25519 private key.
    pub fn from_ed25519_pem(pem: &str, config: SignerConfig<'_>) -> crate::Result<Self> {
        Ok(Middleware {
            key: PrivateKey::from_ed25519_pem(pem)?,
            config: config.into_owned(),
        })
    }

    /// Creates a middleware from a file holding a PKCS#1 PEM encoded RSA private key.
    pub fn from_rsa_pem_file(
        path: impl AsRef<Path>,
        config: SignerConfig<'_>,
    ) -> crate::Result<Self> {
        let pem = std::fs::read_to_string(path).map_err(Error::from)?;
        Self::from_rsa_pem(&pem, config)
    }

    /// Creates a middleware from a file holding a PKCS#8 PEM encoded Ed25519 private key.
    pub fn from_ed25519_pem_file(
        path: impl AsRef<Path>,
        config: SignerConfig<'_>,
    ) -> crate::Result<Self> {
        let pem = std::fs::read_to_string(path).map_err(Error::from)?;
        Self::from_ed25519_pem(&pem, config)
    }

    pub fn config(&self) -> &SignerConfig<'static> {
        &self.config
    }

    /// Signs a rendered message and returns the `DKIM-Signature` header
    /// line, terminated by CRLF.
    pub fn sign(&self, message: &[u8]) -> Result<String, Error> {
        match &self.key {
            PrivateKey::Rsa(_) => self.sign_with(self.key.rsa_key()?, message),
            PrivateKey::Ed25519(_) => self.sign_with(self.key.ed25519_key()?, message),
        }
    }

    fn sign_with<T: SigningKey>(&self, key: T, message: &[u8]) -> Result<String, Error> {
        let config = &self.config;
        let headers = if !config.header_fields.is_empty() {
            config
                .header_fields
                .iter()
                .map(|name| name.to_string())
                .collect::<Vec<_>>()
        } else {
            header_names(message)
        };

        let mut signer = DkimSigner::from_key(key)
            .domain(config.domain.as_ref())
            .selector(config.selector.as_ref())
            .headers(headers)
            .header_canonicalization(config.header_canonicalization.into())
            .body_canonicalization(config.body_canonicalization.into());
        if let Some(auid) = &config.auid {
            signer = signer.agent_user_identifier(auid.as_ref());
        }
        if let Some(expires_in) = config.expires_in() {
            signer = signer.expiration(expires_in);
        }

        signer
            .sign(message)
            .map(|signature| signature.to_header())
            .map_err(Error::InvalidKey)
    }
}

impl crate::Middleware for Middleware {
    fn handle<'x>(&self, mut message: Message<'x>) -> Message<'x> {
        let rendered = match message.render() {
            Ok(rendered) => rendered,
            Err(err) => {
                log::error!("Failed to render message for DKIM signing: {}", err);
                return message;
            }
        };

        let signature = match self.sign(&rendered) {
            Ok(signature) => signature,
            Err(err) => {
                log::error!("Failed to DKIM sign message: {}", err);
                return message;
            }
        };

        let mut signed = Vec::with_capacity(signature.len() + rendered.len());
        signed.extend_from_slice(signature.as_bytes());
        signed.extend_from_slice(&rendered);
        match extract_dkim_header(&signed) {
            Some(value) => {
                log::debug!(
                    "Signed message for {} with selector {} using {}",
                    self.config.domain,
                    self.config.selector,
                    self.key.algorithm()
                );
                message.seal(rendered);
                message.add_preformatted_header(DKIM_SIGNATURE, value);
            }
            None => {
                log::error!("No DKIM signature found in signed message");
            }
        }

        message
    }

    fn middleware_type(&self) -> MiddlewareType {
        TYPE
    }
}

/// Names of all header fields of a rendered message, without duplicates.
fn header_names(message: &[u8]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for field in split_message(message).0 {
        let name = String::from_utf8_lossy(field.name);
        if !name.is_empty() && !names.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
            names.push(name.into_owned());
        }
    }
    names
}

#[cfg(test)]
mod test {
    use std::{
        borrow::Borrow,
        collections::HashMap,
        hash::Hash,
        sync::Mutex,
        time::{Duration, Instant, SystemTime},
    };

    use mail_auth::{
        common::{parse::TxtRecordParser, verify::DomainKey},
        AuthenticatedMessage, DkimResult, MessageAuthenticator, Parameters, ResolverCache, Txt,
    };
    use mail_parser::MessageParser;

    use crate::{
        dkim::{
            key::test::{ED25519_KEY, RSA_KEY},
            Canonicalization, Error, Middleware, SignerConfig, TYPE,
        },
        Message, Middleware as _,
    };

    fn test_message() -> Message<'static> {
        Message::new()
            .from(("John Doe", "john@example.com"))
            .to("jane@example.com")
            .subject("DKIM test")
            .date(1_700_000_000)
            .message_id("test.1234@example.com")
            .text_body("Hello world!")
    }

    const RSA_RECORD: &str = concat!(
        "v=DKIM1; k=rsa; p=MIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKCAQEA04camV0I8PI1",
        "9636sgbpZXZDhuTROPz/9k8N3eu1kkM04sl3gsOkG1iY/YefZLjAblbQ1Y0WZybw654+7TMDY8ts",
        "qg1R7gD1jf/3CYao8neJlMeCuISIeqqjgeLcGfCgb1vXB9Fh0Hy37XpkNWTLBhyTVPYt/ijQbu4W",
        "+fJJTHwJp4XdmTTjZmwrLfSlSS3y82jSL6Ohx6j+aEU0CUEQT1A6ctdEU1dHem0iVFntzVg1j9W7",
        "xfU7PnMxCfqDFaZgdrOD1Ls7BmZ48elcgRfl1G4rE5YqO8Ctiy5ItI8j33LZuTtpoSVvU1XJhAQJ",
        "2jUmgQxvhAQsWTUHjuGBlBRsewIDAQAB"
    );
    const ED25519_RECORD: &str =
        "v=DKIM1; k=ed25519; p=5JKytsybzvm6IOWaFJrQ/gocWbLBdZshl16Ujn/baKM=";

    #[derive(Default)]
    struct TxtCache(Mutex<HashMap<String, Txt>>);

    impl ResolverCache<String, Txt> for TxtCache {
        fn get<Q>(&self, name: &Q) -> Option<Txt>
        where
            String: Borrow<Q>,
            Q: Hash + Eq + ?Sized,
        {
            self.0.lock().unwrap().get(name).cloned()
        }

        fn remove<Q>(&self, name: &Q) -> Option<Txt>
        where
            String: Borrow<Q>,
            Q: Hash + Eq + ?Sized,
        {
            self.0.lock().unwrap().remove(name)
        }

        fn insert(&self, key: String, value: Txt, _: Instant) {
            self.0.lock().unwrap().insert(key, value);
        }
    }

    fn tag(header: &str, name: &str) -> Option<String> {
        header.split(';').find_map(|tag| {
            let value = tag.trim().strip_prefix(name)?.strip_prefix('=')?;
            Some(value.chars().filter(|ch| !ch.is_whitespace()).collect())
        })
    }

    fn signed_headers(header: &str) -> Vec<String> {
        let mut names = tag(header, "h")
            .unwrap()
            .split(':')
            .map(|name| name.to_ascii_lowercase())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    async fn verify(message: &[u8]) -> Vec<DkimResult> {
        let cache = TxtCache::default();
        let valid_until = Instant::now() + Duration::from_secs(3600);
        for (name, record) in [
            ("rsa._domainkey.example.com.", RSA_RECORD),
            ("ed._domainkey.example.com.", ED25519_RECORD),
        ] {
            cache.insert(
                name.to_string(),
                Txt::from(DomainKey::parse(record.as_bytes())),
                valid_until,
            );
        }

        let authenticator = MessageAuthenticator::new_cloudflare_tls().unwrap();
        let message = AuthenticatedMessage::parse(message).unwrap();
        authenticator
            .verify_dkim(Parameters::new(&message).with_txt_cache(&cache))
            .await
            .into_iter()
            .map(|output| output.result().clone())
            .collect()
    }

    #[test]
    fn sign_rsa() {
        let _ = env_logger::try_init();

        let config = SignerConfig::new("example.com", "default")
            .unwrap()
            .header_fields(["From", "To", "Subject"])
            .unwrap()
            .auid("@example.com")
            .header_canonicalization(Canonicalization::Relaxed);
        let dkim = Middleware::from_rsa_pem(RSA_KEY, config).unwrap();
        assert_eq!(dkim.middleware_type(), TYPE);

        let message = test_message().middleware(dkim).write_to_vec().unwrap();
        let text = String::from_utf8(message.clone()).unwrap();
        assert!(text.starts_with("DKIM-Signature: "), "{}", text);
        assert_eq!(text.matches("DKIM-Signature:").count(), 1, "{}", text);

        let signature = crate::dkim::extract_dkim_header(&message).unwrap();
        assert_eq!(tag(&signature, "a").as_deref(), Some("rsa-sha256"));
        assert_eq!(tag(&signature, "d").as_deref(), Some("example.com"));
        assert_eq!(tag(&signature, "s").as_deref(), Some("default"));
        assert_eq!(tag(&signature, "i").as_deref(), Some("@example.com"));
        assert_eq!(tag(&signature, "c").as_deref(), Some("relaxed/simple"));
        assert_eq!(signed_headers(&signature), ["from", "subject", "to"]);
        assert!(tag(&signature, "x").is_none());

        let parsed = MessageParser::default().parse(&message).unwrap();
        assert_eq!(parsed.subject(), Some("DKIM test"));
        assert_eq!(parsed.body_text(0).as_deref(), Some("Hello world!"));
    }

    #[test]
    fn sign_ed25519_all_headers() {
        let config = SignerConfig::new("example.com", "ed")
            .unwrap()
            .expiration(SystemTime::now() + Duration::from_secs(86400))
            .unwrap();
        let dkim = Middleware::from_ed25519_pem(ED25519_KEY, config).unwrap();

        let message = test_message().middleware(dkim).write_to_vec().unwrap();
        let signature = crate::dkim::extract_dkim_header(&message).unwrap();
        assert_eq!(tag(&signature, "a").as_deref(), Some("ed25519-sha256"));
        assert_eq!(tag(&signature, "s").as_deref(), Some("ed"));
        assert!(tag(&signature, "x").is_some());

        let signed_headers = tag(&signature, "h").unwrap().to_ascii_lowercase();
        for name in ["from", "to", "subject", "date", "message-id"] {
            assert!(
                signed_headers.split(':').any(|h| h == name),
                "{} not in {}",
                name,
                signed_headers
            );
        }
    }

    #[test]
    fn double_signature() {
        let fields = ["From", "To", "Subject", "Date", "Message-ID"];
        let rsa = Middleware::from_rsa_pem(
            RSA_KEY,
            SignerConfig::new("example.com", "rsa")
                .unwrap()
                .header_fields(fields)
                .unwrap(),
        )
        .unwrap();
        let ed25519 = Middleware::from_ed25519_pem(
            ED25519_KEY,
            SignerConfig::new("example.com", "ed")
                .unwrap()
                .header_fields(fields)
                .unwrap(),
        )
        .unwrap();

        let message = test_message()
            .middleware(rsa)
            .middleware(ed25519)
            .write_to_vec()
            .unwrap();
        let text = String::from_utf8(message.clone()).unwrap();
        assert_eq!(text.matches("DKIM-Signature:").count(), 2, "{}", text);

        // The newest signature comes first
        let first = crate::dkim::extract_dkim_header(&message).unwrap();
        assert_eq!(tag(&first, "s").as_deref(), Some("ed"));
        let rsa_pos = text.find("s=rsa").unwrap();
        assert!(text.find("s=ed").unwrap() < rsa_pos);
        assert!(rsa_pos < text.find("\r\nSubject: ").unwrap());
    }

    #[tokio::test]
    async fn verify_chained_signatures() {
        let rsa = Middleware::from_rsa_pem(
            RSA_KEY,
            SignerConfig::new("example.com", "rsa")
                .unwrap()
                .header_canonicalization(Canonicalization::Relaxed)
                .body_canonicalization(Canonicalization::Relaxed),
        )
        .unwrap();
        let ed25519 = Middleware::from_ed25519_pem(
            ED25519_KEY,
            SignerConfig::new("example.com", "ed")
                .unwrap()
                .header_fields(["From", "To", "Subject"])
                .unwrap(),
        )
        .unwrap();

        let message = test_message()
            .attachment("text/csv", "data.csv", b"a,b\n1,2\n".as_slice())
            .middleware(rsa)
            .middleware(ed25519)
            .write_to_vec()
            .unwrap();
        assert_eq!(verify(&message).await, [DkimResult::Pass, DkimResult::Pass]);

        // Unsigned headers added after signing leave the signatures intact
        let mut message = test_message()
            .middleware(
                Middleware::from_rsa_pem(
                    RSA_KEY,
                    SignerConfig::new("example.com", "rsa").unwrap(),
                )
                .unwrap(),
            )
            .apply_middlewares();
        message.set_preformatted_header("X-Spam-Score", "0");
        message.set_subject("Changed after signing");
        assert_eq!(
            verify(&message.render().unwrap()).await,
            [DkimResult::Pass]
        );

        // Tampering is detected
        let tampered = String::from_utf8(message.render().unwrap())
            .unwrap()
            .replace("Hello world!", "Hello there!");
        assert_ne!(verify(tampered.as_bytes()).await, [DkimResult::Pass]);
    }

    #[test]
    fn skip_and_seal() {
        let config = SignerConfig::new("example.com", "default").unwrap();
        let message = test_message().middleware(Middleware::from_rsa_pem(RSA_KEY, config).unwrap());

        let mut output = Vec::new();
        message.write_to_skip_middleware(&mut output, TYPE).unwrap();
        assert!(!String::from_utf8(output).unwrap().contains("DKIM-Signature"));

        let mut sealed = message.apply_middlewares();
        assert!(sealed.is_sealed());
        let before = sealed.render().unwrap();
        sealed.set_subject("Changed after signing");
        assert_eq!(sealed.render().unwrap(), before);
    }

    #[test]
    fn invalid_keys() {
        let config = SignerConfig::new("example.com", "default").unwrap();
        assert!(matches!(
            Middleware::from_rsa_pem(ED25519_KEY, config.clone()),
            Err(crate::Error::Dkim(Error::DecodePem))
        ));
        assert!(matches!(
            Middleware::from_ed25519_pem(RSA_KEY, config.clone()),
            Err(crate::Error::Dkim(Error::DecodePem))
        ));
        assert!(matches!(
            Middleware::from_rsa_pem_file("/nonexistent/dkim.pem", config),
            Err(crate::Error::Dkim(Error::Io(_)))
        ));
    }
}
