//! Plain-text rendering of a session for the terminal browser.

use gemway_browser::{GemtextBlock, Page, SessionSnapshot};

/// Render a page body for a terminal `width` columns wide.
///
/// Links are numbered from 1 in document order so `link N` can pick them.
pub fn render_page(page: &Page, width: usize) -> String {
    let Some(doc) = &page.document else {
        return page.body.clone();
    };

    let mut out: Vec<String> = Vec::new();
    let mut link_no = 0usize;
    for block in &doc.blocks {
        match block {
            GemtextBlock::Heading { level: 1, text } => {
                out.push(text.clone());
                out.push("=".repeat(text.chars().count()));
            },
            GemtextBlock::Heading { level: 2, text } => {
                out.push(text.clone());
                out.push("-".repeat(text.chars().count()));
            },
            GemtextBlock::Heading { text, .. } => out.push(format!("### {text}")),
            GemtextBlock::Link { label, .. } => {
                link_no += 1;
                out.push(format!("[{link_no}] {label}"));
            },
            GemtextBlock::ListItem(text) => {
                out.extend(indented(text, "  * ", "    ", width));
            },
            GemtextBlock::Quote(text) => {
                out.extend(indented(text, "  > ", "  > ", width));
            },
            GemtextBlock::Preformat { lines, .. } => out.extend(lines.iter().cloned()),
            GemtextBlock::Paragraph(text) => out.extend(wrap(text, width)),
            GemtextBlock::Blank => out.push(String::new()),
        }
    }
    out.join("\n")
}

/// One status line: URL, history position, loading marker or error.
pub fn render_status(snapshot: &SessionSnapshot) -> String {
    let mut line = format!(
        "{} [{}/{}]",
        snapshot.url,
        snapshot.history_index + 1,
        snapshot.history_len
    );
    if snapshot.loading {
        line.push_str(" loading...");
    }
    if let Some(failure) = &snapshot.error {
        line.push_str(&format!(" error: {failure}"));
    }
    line
}

fn indented(text: &str, first: &str, rest: &str, width: usize) -> Vec<String> {
    let inner = width.saturating_sub(first.chars().count()).max(1);
    wrap(text, inner)
        .into_iter()
        .enumerate()
        .map(|(i, l)| format!("{}{l}", if i == 0 { first } else { rest }))
        .collect()
}

/// Greedy word wrap. Words longer than `width` get a line of their own.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        let needed = if line.is_empty() {
            word.chars().count()
        } else {
            line.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !line.is_empty() {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() || lines.is_empty() {
        lines.push(line);
    }
    lines
}
