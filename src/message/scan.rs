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

/// A header field of a rendered message, continuation lines included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderField<'x> {
    pub name: &'x [u8],
    pub raw: &'x [u8],
}

/// Splits a rendered message into its header fields and its body.
///
/// The header block ends at the first empty line. A message without one
/// is all headers and has an empty body.
pub fn split_message(message: &[u8]) -> (Vec<HeaderField<'_>>, &[u8]) {
    let mut fields: Vec<(usize, usize, usize)> = Vec::new();
    let mut body = &message[message.len()..];
    let mut pos = 0;

    while pos < message.len() {
        let line_end = message[pos..]
            .iter()
            .position(|&ch| ch == b'\n')
            .map_or(message.len(), |end| pos + end + 1);
        let line = &message[pos..line_end];

        match line.first() {
            Some(b'\r' | b'\n') if line.len() <= 2 && line.ends_with(b"\n") => {
                body = &message[line_end..];
                break;
            }
            Some(b' ' | b'\t') => match fields.last_mut() {
                Some((_, _, end)) => *end = line_end,
                None => fields.push((pos, pos, line_end)),
            },
            _ => {
                let name_end = line
                    .iter()
                    .position(|&ch| ch == b':')
                    .map_or(pos + line.len(), |colon| pos + colon);
                fields.push((pos, name_end, line_end));
            }
        }

        pos = line_end;
    }

    (
        fields
            .into_iter()
            .map(|(start, name_end, end)| HeaderField {
                name: message[start..name_end].trim_ascii_end(),
                raw: &message[start..end],
            })
            .collect(),
        body,
    )
}

impl<'x> HeaderField<'x> {
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.as_bytes())
    }

    /// Returns `true` for `Content-*` fields, which belong to the MIME entity.
    pub fn is_content(&self) -> bool {
        self.name.len() > 8 && self.name[..8].eq_ignore_ascii_case(b"Content-")
    }

    /// Returns the field value. Continuation lines are kept as they are,
    /// leading whitespace and the final line break are removed.
    pub fn value(&self) -> String {
        let value = self
            .raw
            .get(self.name.len()..)
            .and_then(|value| value.trim_ascii_start().strip_prefix(b":"))
            .unwrap_or_default()
            .trim_ascii_start();
        let value = value
            .strip_suffix(b"\n")
            .map(|value| value.strip_suffix(b"\r").unwrap_or(value))
            .unwrap_or(value);
        String::from_utf8_lossy(value).into_owned()
    }
}
