//! Engine and status from thread label badges.
//!
//! The source marks threads with `.label` badges; the engine is encoded
//! in the badge's CSS class (`label--renpy`) and the status in the badge
//! text (`Completed`, `Ongoing`, ...).

use scraper::{Html, Selector};
use std::sync::LazyLock;

use super::{UNKNOWN, collapsed_text, sel};
use crate::config::{engine_for_label_class, status_for_label_text};

static LABEL_SEL: LazyLock<Selector> = LazyLock::new(|| sel(".label"));

/// Engine name from the first label whose CSS class appears in the engine
/// table.
pub fn engine_from_labels(doc: &Html) -> String {
    for label in doc.select(&LABEL_SEL) {
        for class in label.value().classes() {
            if let Some(engine) = engine_for_label_class(class) {
                return engine.to_string();
            }
        }
    }
    UNKNOWN.to_string()
}

/// Canonical status from the first label whose text appears in the status
/// table. Exact match first, case-insensitive fallback.
pub fn status_from_labels(doc: &Html) -> String {
    for label in doc.select(&LABEL_SEL) {
        let text = collapsed_text(label);
        if let Some(status) = status_for_label_text(&text) {
            return status.to_string();
        }
    }
    UNKNOWN.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_from_label_class() {
        let doc = Html::parse_document(
            r#"<span class="label label--renpy">Ren'Py</span>
               <span class="label">Ongoing</span>"#,
        );
        assert_eq!(engine_from_labels(&doc), "Ren'Py");
        assert_eq!(status_from_labels(&doc), "Ongoing");
    }

    #[test]
    fn missing_labels_degrade_to_unknown() {
        let doc = Html::parse_document("<p>no labels here</p>");
        assert_eq!(engine_from_labels(&doc), UNKNOWN);
        assert_eq!(status_from_labels(&doc), UNKNOWN);
    }

    #[test]
    fn status_is_case_insensitive() {
        let doc = Html::parse_document(r#"<span class="label">abandoned</span>"#);
        assert_eq!(status_from_labels(&doc), "Abandoned");
    }
}
