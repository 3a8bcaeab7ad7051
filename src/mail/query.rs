//! IMAP SEARCH expression builder.

use chrono::NaiveDate;

use crate::error::{EzmailError, Result};

const IMAP_DATE_FORMAT: &str = "%d-%b-%Y";

/// Named search filters. Unset (or empty) filters add nothing to the query.
///
/// Dates use the IMAP form `DD-Mon-YYYY`; see [`imap_date`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub status: String,
    pub sender: Option<String>,
    pub subject: Option<String>,
    pub text: Option<String>,
    pub body: Option<String>,
    pub on: Option<String>,
    pub since: Option<String>,
    pub before: Option<String>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            status: "ALL".to_string(),
            sender: None,
            subject: None,
            text: None,
            body: None,
            on: None,
            since: None,
            before: None,
        }
    }
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unseen() -> Self {
        Self::new().status("UNSEEN")
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn from(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn on(mut self, date: impl Into<String>) -> Self {
        self.on = Some(date.into());
        self
    }

    pub fn since(mut self, date: impl Into<String>) -> Self {
        self.since = Some(date.into());
        self
    }

    pub fn before(mut self, date: impl Into<String>) -> Self {
        self.before = Some(date.into());
        self
    }

    /// Renders `(STATUS [FROM "x"] [SUBJECT "y"] [TEXT "z"] [BODY "w"] [ON d] [SINCE d] [BEFORE d])`.
    ///
    /// String values are quoted and escaped; dates and the status keyword are
    /// validated, so no caller value can break out of its clause.
    pub fn build(&self) -> Result<String> {
        let status = self.status.trim();
        if status.is_empty()
            || !status
                .split_whitespace()
                .all(|atom| atom.chars().all(|c| c.is_ascii_alphabetic()))
        {
            return Err(EzmailError::InvalidFilter(format!(
                "status must be IMAP search keywords, got {:?}",
                self.status
            )));
        }

        let mut criteria = format!("({status}");

        let strings = [
            ("FROM", &self.sender),
            ("SUBJECT", &self.subject),
            ("TEXT", &self.text),
            ("BODY", &self.body),
        ];
        for (key, value) in strings {
            if let Some(v) = present(value) {
                criteria.push_str(&format!(" {key} {}", quote(key, v)?));
            }
        }

        let dates = [("ON", &self.on), ("SINCE", &self.since), ("BEFORE", &self.before)];
        for (key, value) in dates {
            if let Some(v) = present(value) {
                criteria.push_str(&format!(" {key} {}", check_date(key, v)?));
            }
        }

        criteria.push(')');
        Ok(criteria)
    }
}

/// Formats a date the way IMAP SEARCH expects it, e.g. `01-Jan-2024`.
pub fn imap_date(date: NaiveDate) -> String {
    date.format(IMAP_DATE_FORMAT).to_string()
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn quote(key: &str, value: &str) -> Result<String> {
    if value.contains(['\r', '\n']) {
        return Err(EzmailError::InvalidFilter(format!(
            "{key} value must not contain line breaks"
        )));
    }
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    Ok(format!("\"{escaped}\""))
}

fn check_date<'a>(key: &str, value: &'a str) -> Result<&'a str> {
    NaiveDate::parse_from_str(value, IMAP_DATE_FORMAT)
        .map(|_| value)
        .map_err(|_| {
            EzmailError::InvalidFilter(format!("{key} expects a DD-Mon-YYYY date, got {value:?}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_is_all() {
        assert_eq!(SearchQuery::new().build().unwrap(), "(ALL)");
    }

    #[test]
    fn status_sender_since() {
        let q = SearchQuery::new()
            .status("UNSEEN")
            .from("a@b.com")
            .since("01-Jan-2024");
        assert_eq!(q.build().unwrap(), r#"(UNSEEN FROM "a@b.com" SINCE 01-Jan-2024)"#);
    }

    #[test]
    fn clauses_follow_fixed_order() {
        // set in reverse to show order does not depend on call order
        let q = SearchQuery::new()
            .before("31-Dec-2024")
            .since("01-Dec-2024")
            .on("15-Dec-2024")
            .body("invoice")
            .text("total")
            .subject("Report")
            .from("boss@x.com");
        assert_eq!(
            q.build().unwrap(),
            r#"(ALL FROM "boss@x.com" SUBJECT "Report" TEXT "total" BODY "invoice" ON 15-Dec-2024 SINCE 01-Dec-2024 BEFORE 31-Dec-2024)"#
        );
    }

    #[test]
    fn empty_values_contribute_nothing() {
        let q = SearchQuery::unseen().from("").subject("");
        assert_eq!(q.build().unwrap(), "(UNSEEN)");
    }

    #[test]
    fn quotes_are_escaped() {
        let q = SearchQuery::new().subject(r#"say "hi" \o/"#);
        assert_eq!(q.build().unwrap(), r#"(ALL SUBJECT "say \"hi\" \\o/")"#);
    }

    #[test]
    fn line_breaks_are_rejected() {
        let q = SearchQuery::new().text("a\r\nA001 LOGOUT");
        assert!(matches!(q.build(), Err(EzmailError::InvalidFilter(_))));
    }

    #[test]
    fn malformed_dates_are_rejected() {
        let q = SearchQuery::new().since("2024-01-01");
        assert!(matches!(q.build(), Err(EzmailError::InvalidFilter(_))));

        let q = SearchQuery::new().before("01-Jan-2024 FROM x");
        assert!(matches!(q.build(), Err(EzmailError::InvalidFilter(_))));
    }

    #[test]
    fn status_must_be_keywords() {
        assert!(SearchQuery::new().status("NOT SEEN").build().is_ok());
        assert!(SearchQuery::new().status("ALL) (OR").build().is_err());
        assert!(SearchQuery::new().status("").build().is_err());
    }

    #[test]
    fn imap_date_format() {
        let d = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
        assert_eq!(imap_date(d), "01-Oct-2025");
    }
}
