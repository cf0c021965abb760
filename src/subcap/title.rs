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

use unic_langid::LanguageIdentifier;
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Casing {
    Default,
    Turkic,
    Dutch,
}

impl Casing {
    fn new(language: &LanguageIdentifier) -> Self {
        match language.language.as_str() {
            "tr" | "az" => Casing::Turkic,
            "nl" => Casing::Dutch,
            _ => Casing::Default,
        }
    }

    fn push_title(&self, text: &mut String, ch: char) {
        match (self, ch) {
            (Casing::Turkic, 'i') => text.push('İ'),
            // Latin digraphs have a distinct titlecase form
            (_, 'Ǆ' | 'ǅ' | 'ǆ') => text.push('ǅ'),
            (_, 'Ǉ' | 'ǈ' | 'ǉ') => text.push('ǈ'),
            (_, 'Ǌ' | 'ǋ' | 'ǌ') => text.push('ǋ'),
            (_, 'Ǳ' | 'ǲ' | 'ǳ') => text.push('ǲ'),
            _ => text.extend(ch.to_uppercase()),
        }
    }

    /// Lowercases the rest of a word, which always follows a letter.
    fn push_lower(&self, text: &mut String, rest: &str) {
        let mut chars = rest.chars().peekable();
        while let Some(ch) = chars.next() {
            match (self, ch) {
                (Casing::Turkic, 'I') => text.push('ı'),
                (Casing::Turkic, 'İ') => text.push('i'),
                (_, 'Σ') if !chars.peek().map_or(false, |next| next.is_alphabetic()) => {
                    text.push('ς')
                }
                _ => text.extend(ch.to_lowercase()),
            }
        }
    }
}

/// Converts a text to title case: the first letter of every word is
/// uppercased and the rest of the word lowercased, following the casing
/// rules of the given language.
pub fn title_case(text: &str, language: &LanguageIdentifier) -> String {
    let casing = Casing::new(language);
    let mut result = String::with_capacity(text.len());

    for word in text.split_word_bounds() {
        let mut chars = word.chars();
        match chars.next() {
            Some(first) if first.is_alphanumeric() => {
                let rest = chars.as_str();
                if casing == Casing::Dutch
                    && matches!(first, 'i' | 'I')
                    && rest.starts_with(['j', 'J'])
                {
                    result.push_str("IJ");
                    casing.push_lower(&mut result, &rest[1..]);
                } else {
                    casing.push_title(&mut result, first);
                    casing.push_lower(&mut result, rest);
                }
            }
            _ => result.push_str(word),
        }
    }

    result
}
