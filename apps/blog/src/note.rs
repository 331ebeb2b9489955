//! The `Note` document.

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tool_core::{RouteArgs, slugify_i18n};
use tool_documents::{Document, validators};
use tool_shared::Result;

const LABEL_CHARS: usize = 50;
/// Slug for notes whose text has no letters or digits.
const FALLBACK_SLUG: &str = "note";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Note {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

impl Note {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Self::default()
        }
    }

    /// `date` as shown in listings; empty for undated notes.
    pub fn date_label(&self) -> String {
        self.date.map(|date| date.to_string()).unwrap_or_default()
    }

    /// Arguments for the `blog.note` endpoint; `None` for undated or
    /// slugless notes.
    pub fn url_args(&self) -> Option<RouteArgs> {
        let date = self.date?;
        if self.slug.is_empty() {
            return None;
        }
        Some(
            RouteArgs::new()
                .with("year", i64::from(date.year()))
                .with("month", i64::from(date.month()))
                .with("slug", self.slug.as_str()),
        )
    }
}

impl Document for Note {
    const COLLECTION: &'static str = "notes";

    fn label(&self) -> String {
        let label: String = self.text.chars().take(LABEL_CHARS).collect();
        if label.is_empty() {
            "empty".to_string()
        } else {
            label
        }
    }

    fn prepare(&mut self) {
        if self.slug.is_empty() {
            self.slug = slugify_i18n(&self.text);
        }
        if self.slug.is_empty() {
            self.slug = FALLBACK_SLUG.to_string();
        }
        if self.date.is_none() {
            self.date = Some(Local::now().date_naive());
        }
    }

    fn validate(&self) -> Result<()> {
        validators::required("text", &self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let mut note = Note::new("Hello, World!");
        note.prepare();
        assert_eq!(note.slug, "hello-world");
        assert_eq!(note.date, Some(Local::now().date_naive()));

        let mut dated = Note {
            slug: "custom".into(),
            text: "Text".into(),
            date: NaiveDate::from_ymd_opt(2010, 3, 1),
        };
        dated.prepare();
        assert_eq!(dated.slug, "custom");
        assert_eq!(dated.date_label(), "2010-03-01");
    }

    #[test]
    fn text_is_required() {
        let mut note = Note::default();
        note.prepare();
        assert!(note.validate().is_err());
        assert_eq!(note.label(), "empty");
        assert_eq!(Note::new(&"x".repeat(60)).label().len(), 50);
    }

    #[test]
    fn url_args_need_a_date() {
        assert!(Note::new("draft").url_args().is_none());

        let note = Note {
            slug: "hello".into(),
            text: "Hello".into(),
            date: NaiveDate::from_ymd_opt(2010, 3, 1),
        };
        let args = note.url_args().expect("dated");
        assert_eq!(args.get_int("year"), Some(2010));
        assert_eq!(args.get_int("month"), Some(3));
        assert_eq!(args.get_str("slug"), Some("hello"));

        let slugless = Note {
            slug: String::new(),
            ..note
        };
        assert!(slugless.url_args().is_none());
    }

    #[test]
    fn slugs_are_never_empty() {
        let mut punctuation = Note::new("!!!");
        punctuation.prepare();
        assert_eq!(punctuation.slug, "note");

        let mut cyrillic = Note::new("Привет, мир");
        cyrillic.prepare();
        assert_eq!(cyrillic.slug, "priviet-mir");
    }
}
