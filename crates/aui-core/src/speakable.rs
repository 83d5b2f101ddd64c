//! Text normalization before synthesis: glyphs a voice would skip or mispronounce
//! are replaced by words.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Vocabulary used for glyph substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    De,
    En,
}

impl FromStr for Lang {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "de" | "german" | "deutsch" => Ok(Lang::De),
            "en" | "english" => Ok(Lang::En),
            other => Err(format!("unsupported language: {}", other)),
        }
    }
}

const GLYPHS_DE: &[(char, &str)] = &[
    ('*', "Stern"),
    ('#', "Raute"),
    ('&', "und"),
    ('%', "Prozent"),
    ('+', "plus"),
    ('@', "at"),
];

const GLYPHS_EN: &[(char, &str)] = &[
    ('*', "star"),
    ('#', "pound"),
    ('&', "and"),
    ('%', "percent"),
    ('+', "plus"),
    ('@', "at"),
];

/// Glyphs that are dropped (turned into a word break).
const SILENT: &[char] = &['_', '~', '|', '<', '>', '^', '`', '\\'];

/// Normalizer for one language.
#[derive(Debug, Clone, Copy, Default)]
pub struct Speakable {
    lang: Lang,
}

impl Speakable {
    pub fn new(lang: Lang) -> Self {
        Self { lang }
    }

    pub fn lang(&self) -> Lang {
        self.lang
    }

    fn glyphs(&self) -> &'static [(char, &'static str)] {
        match self.lang {
            Lang::De => GLYPHS_DE,
            Lang::En => GLYPHS_EN,
        }
    }

    /// Word used for a single glyph, if it has one.
    pub fn word_for(&self, glyph: char) -> Option<&'static str> {
        self.glyphs()
            .iter()
            .find(|(g, _)| *g == glyph)
            .map(|(_, w)| *w)
    }

    /// Substitute glyphs and collapse whitespace.
    pub fn normalize(&self, text: &str) -> String {
        let mut spaced = String::with_capacity(text.len() + 16);
        for c in text.chars() {
            if let Some(word) = self.word_for(c) {
                spaced.push(' ');
                spaced.push_str(word);
                spaced.push(' ');
            } else if SILENT.contains(&c) || c.is_control() {
                spaced.push(' ');
            } else {
                spaced.push(c);
            }
        }
        spaced.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}
