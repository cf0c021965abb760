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

//! # mail-middleware
//!
//! _mail-middleware_ is a Rust library of pluggable transformations that are applied to an
//! e-mail message right before it is written out. It includes the following middlewares:
//!
//! - DomainKeys Identified Mail (**DKIM**) Signatures (_RFC 6376_) using RSA-SHA256 or
//!   Ed25519-SHA256.
//! - **OpenPGP** encryption and signing (_RFC 4880_) following either the PGP/Inline or the
//!   PGP/MIME (_RFC 3156_) scheme.
//! - Locale-aware **subject capitalization**.
//!
//! Messages are rendered with [`mail-builder`](https://crates.io/crates/mail-builder), DKIM
//! signatures are produced by [`mail-auth`](https://crates.io/crates/mail-auth) and OpenPGP
//! operations are performed by [`pgp`](https://crates.io/crates/pgp).
//!
//! ## Usage Example
//!
//! Capitalize the subject and sign the message with DKIM:
//!
//! ```rust
//!     let dkim = dkim::Middleware::from_rsa_pem(
//!         RSA_PRIVATE_KEY,
//!         dkim::SignerConfig::new("example.com", "2024")?
//!             .header_fields(["From", "To", "Subject"])?,
//!     )?;
//!
//!     let message = Message::new()
//!         .from(("John Doe", "john@example.com"))
//!         .to("jane@example.com")
//!         .subject("these pretzels are making me thirsty")
//!         .text_body("Hello world!")
//!         .middleware(subcap::Middleware::from_tag("en")?)
//!         .middleware(dkim);
//!
//!     let signed = message.write_to_vec()?;
//! ```
//!
//! Encrypt a message for a recipient using PGP/MIME:
//!
//! ```rust
//!     let config = openpgp::Config::builder()
//!         .public_key(RECIPIENT_PUBLIC_KEY)
//!         .scheme(openpgp::Scheme::Mime)
//!         .build()?;
//!
//!     let encrypted = Message::new()
//!         .from("john@example.com")
//!         .to("jane@example.com")
//!         .subject("Secret plans")
//!         .text_body("Meet me at the usual place.")
//!         .middleware(openpgp::Middleware::new(config))
//!         .write_to_vec()?;
//! ```
//!
//! ## Testing
//!
//! To run the testsuite:
//!
//! ```bash
//!  $ cargo test --all-features
//! ```
//!
//! ## License
//!
//! Licensed under either of
//!
//!  * Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or
//!    <http://www.apache.org/licenses/LICENSE-2.0>)
//!  * MIT license ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)
//!
//! at your option.
//!

#[cfg(feature = "dkim")]
pub mod dkim;
pub mod message;
pub mod middleware;
#[cfg(feature = "openpgp")]
pub mod openpgp;
#[cfg(feature = "subcap")]
pub mod subcap;

use std::fmt::Display;

pub use mail_builder;
pub use message::{Address, File, Header, Message, Part};
pub use middleware::{Middleware, MiddlewareType};

#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// DKIM configuration or signing error
    #[cfg(feature = "dkim")]
    Dkim(dkim::Error),

    /// OpenPGP configuration or processing error
    #[cfg(feature = "openpgp")]
    OpenPgp(openpgp::Error),

    /// Subject capitalization error
    #[cfg(feature = "subcap")]
    Subcap(subcap::Error),

    /// The rendered message could not be split into headers and body.
    MalformedMessage,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            #[cfg(feature = "dkim")]
            Error::Dkim(e) => write!(f, "DKIM error: {}", e),
            #[cfg(feature = "openpgp")]
            Error::OpenPgp(e) => write!(f, "OpenPGP error: {}", e),
            #[cfg(feature = "subcap")]
            Error::Subcap(e) => write!(f, "Subject capitalization error: {}", e),
            Error::MalformedMessage => write!(f, "Malformed message"),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}
