//! Language catalogue shared by the document and text flows.

use serde::Serialize;

/// Source-language sentinel asking the backend to detect the language.
pub const AUTO_DETECT: &str = "AUTO";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Language {
    pub code: &'static str,
    pub name: &'static str,
    pub auto_detect: bool,
}

/// Catalogue in display order. `AUTO` is only valid as a source language.
pub const LANGUAGES: &[Language] = &[
    Language { code: AUTO_DETECT, name: "Auto-detect", auto_detect: true },
    Language { code: "ID", name: "Indonesian", auto_detect: false },
    Language { code: "ZH", name: "Chinese", auto_detect: false },
    Language { code: "EN", name: "English", auto_detect: false },
];

pub fn is_auto(code: &str) -> bool {
    code.eq_ignore_ascii_case(AUTO_DETECT)
}

pub fn find(code: &str) -> Option<&'static Language> {
    LANGUAGES.iter().find(|l| l.code.eq_ignore_ascii_case(code))
}

/// Languages selectable as a translation target.
pub fn targets() -> impl Iterator<Item = &'static Language> {
    LANGUAGES.iter().filter(|l| !l.auto_detect)
}

/// First concrete language, used when a swap would move `AUTO` into the target slot.
pub fn first_concrete() -> &'static str {
    targets().next().map(|l| l.code).unwrap_or("ZH")
}
