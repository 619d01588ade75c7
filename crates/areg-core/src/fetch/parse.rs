//! Parse attendance register HTML into sessions, roster entries and alert banners.

use chrono::NaiveDateTime;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;

use crate::model::{Hours, Session, Student};
use crate::retry::FetchError;

fn selector(cell: &'static OnceLock<Selector>, css: &'static str) -> &'static Selector {
    cell.get_or_init(|| Selector::parse(css).expect("static CSS selector is valid"))
}

fn row_selector() -> &'static Selector {
    static ROWS: OnceLock<Selector> = OnceLock::new();
    selector(
        &ROWS,
        ".attendanceregister_evenrow, .attendanceregister_oddrow",
    )
}

fn cell_selector() -> &'static Selector {
    static CELLS: OnceLock<Selector> = OnceLock::new();
    selector(&CELLS, "td")
}

fn login_selector() -> &'static Selector {
    static LOGIN: OnceLock<Selector> = OnceLock::new();
    selector(&LOGIN, "form#login, #loginbtn, form.loginform")
}

fn link_selector() -> &'static Selector {
    static LINKS: OnceLock<Selector> = OnceLock::new();
    selector(&LINKS, "a")
}

/// Collapse whitespace (including non-breaking spaces) to single spaces.
fn clean_text<'a, I: Iterator<Item = &'a str>>(parts: I) -> String {
    let joined: String = parts.collect();
    joined
        .split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract the session rows of a per-student register page.
///
/// Cells: `[1]` start, `[2]` end, `[3]` duration. Rows without cells are layout rows.
/// A login page in place of the register is reported as malformed.
pub fn parse_sessions(html: &str) -> Result<Vec<Session>, FetchError> {
    let doc = Html::parse_document(html);
    let mut sessions = Vec::new();
    let mut rows_seen = 0usize;

    for row in doc.select(row_selector()) {
        let cells: Vec<String> = row
            .select(cell_selector())
            .map(|td| clean_text(td.text()))
            .collect();
        if cells.is_empty() {
            continue;
        }
        rows_seen += 1;
        if cells.len() < 4 {
            return Err(FetchError::malformed(format!(
                "register row has {} cells, expected at least 4",
                cells.len()
            )));
        }
        let duration = parse_duration(&cells[3]).ok_or_else(|| {
            FetchError::malformed(format!("unrecognized duration {:?}", cells[3]))
        })?;
        let Some(start) = parse_timestamp(&cells[1]) else {
            tracing::warn!(start = %cells[1], "skipping register row with unreadable start date");
            continue;
        };
        sessions.push(Session {
            start,
            end: parse_timestamp(&cells[2]),
            duration,
        });
    }

    if rows_seen == 0 && doc.select(login_selector()).next().is_some() {
        return Err(FetchError::malformed(
            "portal returned a login page; session cookies have probably expired",
        ));
    }
    Ok(sessions)
}

/// Parse `"H h, M min"`, `"H h"` or `"M min"` into hours rounded to hundredths.
pub fn parse_duration(s: &str) -> Option<Hours> {
    let tokens: Vec<&str> = s
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() {
        return None;
    }

    let mut minutes = 0u64;
    let mut i = 0;
    while i < tokens.len() {
        let value: u64 = tokens[i].parse().ok()?;
        let unit = tokens.get(i + 1).map(|u| u.to_ascii_lowercase());
        match unit.as_deref() {
            Some(u) if u.starts_with('h') => {
                minutes = minutes.checked_add(value.checked_mul(60)?)?;
                i += 2;
            }
            Some(u) if u.starts_with("min") || u == "m" => {
                minutes = minutes.checked_add(value)?;
                i += 2;
            }
            None => {
                minutes = minutes.checked_add(value)?;
                i += 1;
            }
            Some(_) => return None,
        }
    }
    Hours::from_minutes(minutes)
}

const TIMESTAMP_FORMATS: &[&str] = &[
    "%A, %d %B %Y, %I:%M %p",
    "%A, %d %B %Y, %H:%M",
    "%d %B %Y, %I:%M %p",
    "%d %B %Y, %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

/// Parse a register timestamp such as `"Thursday, 6 March 2025, 9:12 AM"`.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

fn user_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[?&]userid=(\d+)").expect("static regex is valid"))
}

fn student_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z]{2}[0-9]{2}[A-Z][0-9]{4}").expect("static regex is valid"))
}

/// List the students linked from a course register overview.
///
/// Link text is `"<KEY> <Full Name>"`; links without a `userid` or with a key that does not
/// look like a student id (staff accounts) are ignored. Returned entries are pending.
pub fn parse_roster(html: &str) -> Vec<Student> {
    let doc = Html::parse_document(html);
    let mut students: Vec<Student> = Vec::new();

    for row in doc.select(row_selector()) {
        let Some(link) = row.select(link_selector()).next() else {
            continue;
        };
        let Some(portal_id) = link
            .value()
            .attr("href")
            .and_then(|href| user_id_regex().captures(href))
            .map(|c| c[1].to_string())
        else {
            continue;
        };
        let text = clean_text(link.text());
        let (key, name) = text.split_once(' ').unwrap_or((text.as_str(), ""));
        if !student_key_regex().is_match(key) {
            continue;
        }
        if students.iter().any(|s| s.portal_id == portal_id) {
            continue;
        }
        students.push(Student {
            key: key.to_string(),
            portal_id,
            name: name.trim().to_string(),
            done: false,
        });
    }
    students
}

/// Text of the first `.{class}` element, e.g. `alert-success` after a recalc.
pub fn alert_text(html: &str, class: &str) -> Option<String> {
    let sel = Selector::parse(&format!(".{}", class)).ok()?;
    let doc = Html::parse_document(html);
    let text = doc.select(&sel).next().map(|el| clean_text(el.text()))?;
    (!text.is_empty()).then_some(text)
}
