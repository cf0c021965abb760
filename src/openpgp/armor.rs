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

//! ASCII armor with CRLF line endings, as carried in mail bodies.

use std::io::{self, Read};

use pgp::{
    armor::{self, Dearmor, Headers},
    ser::Serialize,
};

pub use pgp::armor::BlockType;

use super::Error;

/// Serialized OpenPGP packets, armored as they are.
struct Packets<'x>(&'x [u8]);

impl Serialize for Packets<'_> {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> pgp::errors::Result<()> {
        writer.write_all(self.0)?;
        Ok(())
    }
}

/// Armors binary OpenPGP data and appends its checksum.
pub fn armor(
    block_type: BlockType,
    data: &[u8],
    headers: &[(&str, &str)],
) -> Result<String, Error> {
    let mut armor_headers = Headers::new();
    for (name, value) in headers {
        armor_headers
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
    }

    let mut armored = Vec::with_capacity(data.len() / 3 * 4 + 256);
    armor::write(
        &Packets(data),
        block_type,
        &mut armored,
        Some(&armor_headers),
        true,
    )?;

    let armored = String::from_utf8(armored).map_err(|_| Error::InvalidArmor)?;
    Ok(armored.lines().flat_map(|line| [line, "\r\n"]).collect())
}

/// Removes the ASCII armor of an armored block, verifying its checksum
/// when present.
pub fn dearmor(text: &str) -> Result<(BlockType, Vec<u8>), Error> {
    let mut dearmor = Dearmor::new(text.trim_start().as_bytes());
    let mut data = Vec::new();
    dearmor.read_to_end(&mut data).map_err(|err| {
        log::debug!("Failed to dearmor OpenPGP block: {}", err);
        Error::InvalidArmor
    })?;

    match dearmor.typ {
        Some(block_type) => Ok((block_type, data)),
        None => Err(Error::InvalidArmor),
    }
}
