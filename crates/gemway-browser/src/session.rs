//! Per-browser navigation state and the owned views handed to observers.

use std::fmt;

use gemway_types::{ErrorKind, GeminiUrl, GemwayError};

use crate::gemini::Document;
use crate::nav::HistoryStack;

/// A successfully fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Final URL after redirects.
    pub url: GeminiUrl,
    pub status: u8,
    pub mime_type: String,
    pub body: String,
    /// Parsed blocks when the body is text/gemini.
    pub document: Option<Document>,
}

impl Page {
    pub fn new(url: GeminiUrl, status: u8, mime_type: String, body: String) -> Self {
        let document = is_gemtext(&mime_type).then(|| Document::parse(&body));
        Self {
            url,
            status,
            mime_type,
            body,
            document,
        }
    }

    /// Document title, if the page is gemtext with a heading.
    pub fn title(&self) -> Option<&str> {
        self.document.as_ref().and_then(Document::title)
    }
}

fn is_gemtext(mime_type: &str) -> bool {
    mime_type
        .split(';')
        .next()
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("text/gemini"))
}

/// The error from the last failed attempt, reduced to what a
/// presentation layer shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationFailure {
    pub kind: ErrorKind,
    pub status: Option<u8>,
    pub message: String,
}

impl From<&GemwayError> for NavigationFailure {
    fn from(err: &GemwayError) -> Self {
        Self {
            kind: err.kind(),
            status: err.status(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for NavigationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Mutable session state. Only the engine writes to it.
#[derive(Debug, Clone)]
pub struct NavigationSession {
    pub url: GeminiUrl,
    pub page: Option<Page>,
    pub error: Option<NavigationFailure>,
    pub loading: bool,
    pub history: HistoryStack,
}

impl NavigationSession {
    pub fn new(start: GeminiUrl) -> Self {
        Self {
            url: start,
            page: None,
            error: None,
            loading: false,
            history: HistoryStack::new(),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            url: self.url.clone(),
            page: self.page.clone(),
            error: self.error.clone(),
            loading: self.loading,
            history_index: self.history.index(),
            history_len: self.history.len(),
            can_go_back: self.history.can_go_back(),
            can_go_forward: self.history.can_go_forward(),
        }
    }
}

/// Owned copy of the observable session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub url: GeminiUrl,
    pub page: Option<Page>,
    pub error: Option<NavigationFailure>,
    pub loading: bool,
    pub history_index: isize,
    pub history_len: usize,
    pub can_go_back: bool,
    pub can_go_forward: bool,
}
