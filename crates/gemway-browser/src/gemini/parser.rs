//! Parser for text/gemini documents.
//!
//! Converts raw text/gemini markup into a structured sequence of
//! [`GemtextBlock`] variants suitable for rendering or further
//! processing. Parsing never fails: anything unrecognised becomes a
//! paragraph or a blank.

/// A parsed block from a text/gemini document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GemtextBlock {
    /// `#`, `##` or `###` heading; `level` is 1, 2 or 3.
    Heading { level: u8, text: String },
    /// Link: `=> URL optional label`. The label defaults to the URL.
    Link { url: String, label: String },
    /// Unordered list item: `* text`
    ListItem(String),
    /// Blockquote: `> text`
    Quote(String),
    /// Preformatted text between ``` fences, lines kept verbatim.
    Preformat { alt_text: String, lines: Vec<String> },
    /// Any other non-blank line, verbatim.
    Paragraph(String),
    /// Blank or whitespace-only line.
    Blank,
}

/// A parsed Gemini document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    /// Blocks in source order.
    pub blocks: Vec<GemtextBlock>,
}

const FENCE: &str = "```";

impl Document {
    /// Parse a text/gemini document from raw text.
    pub fn parse(input: &str) -> Self {
        let mut blocks = Vec::new();
        let mut in_preformat = false;
        let mut pre_alt = String::new();
        let mut pre_lines: Vec<String> = Vec::new();

        for line in input.lines() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if let Some(rest) = line.strip_prefix(FENCE) {
                if in_preformat {
                    blocks.push(GemtextBlock::Preformat {
                        alt_text: std::mem::take(&mut pre_alt),
                        lines: std::mem::take(&mut pre_lines),
                    });
                    in_preformat = false;
                } else {
                    pre_alt = rest.trim().to_string();
                    in_preformat = true;
                }
                continue;
            }

            if in_preformat {
                pre_lines.push(line.to_string());
                continue;
            }

            blocks.push(parse_line(line));
        }

        // An unterminated fence keeps whatever it collected.
        if in_preformat {
            blocks.push(GemtextBlock::Preformat {
                alt_text: pre_alt,
                lines: pre_lines,
            });
        }

        Document { blocks }
    }

    /// Extract the document title (first heading, if any).
    pub fn title(&self) -> Option<&str> {
        self.blocks.iter().find_map(|block| match block {
            GemtextBlock::Heading { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    /// Extract all links as `(url, label)` pairs.
    pub fn links(&self) -> Vec<(&str, &str)> {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                GemtextBlock::Link { url, label } => Some((url.as_str(), label.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Serialize back to text/gemini.
    ///
    /// Parsing the output yields the same blocks; whitespace inside
    /// link lines and around prefixes is normalized.
    pub fn to_gemtext(&self) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            match block {
                GemtextBlock::Heading { level, text } => {
                    out.push_str(&"#".repeat(usize::from(*level)));
                    out.push(' ');
                    out.push_str(text);
                },
                GemtextBlock::Link { url, label } => {
                    out.push_str("=> ");
                    out.push_str(url);
                    if label != url {
                        out.push(' ');
                        out.push_str(label);
                    }
                },
                GemtextBlock::ListItem(text) => {
                    out.push_str("* ");
                    out.push_str(text);
                },
                GemtextBlock::Quote(text) => {
                    out.push_str("> ");
                    out.push_str(text);
                },
                GemtextBlock::Preformat { alt_text, lines } => {
                    out.push_str(FENCE);
                    out.push_str(alt_text);
                    out.push('\n');
                    for line in lines {
                        out.push_str(line);
                        out.push('\n');
                    }
                    out.push_str(FENCE);
                },
                GemtextBlock::Paragraph(text) => out.push_str(text),
                GemtextBlock::Blank => {},
            }
            out.push('\n');
        }
        out
    }
}

/// Classify one line outside a preformatted block. First match wins.
fn parse_line(line: &str) -> GemtextBlock {
    if let Some(rest) = line.strip_prefix("=>") {
        parse_link(rest)
    } else if let Some(rest) = line.strip_prefix("###") {
        GemtextBlock::Heading {
            level: 3,
            text: rest.trim().to_string(),
        }
    } else if let Some(rest) = line.strip_prefix("##") {
        GemtextBlock::Heading {
            level: 2,
            text: rest.trim().to_string(),
        }
    } else if let Some(rest) = line.strip_prefix('#') {
        GemtextBlock::Heading {
            level: 1,
            text: rest.trim().to_string(),
        }
    } else if let Some(rest) = line.strip_prefix('*') {
        GemtextBlock::ListItem(rest.trim().to_string())
    } else if let Some(rest) = line.strip_prefix('>') {
        GemtextBlock::Quote(rest.trim().to_string())
    } else if line.trim().is_empty() {
        GemtextBlock::Blank
    } else {
        GemtextBlock::Paragraph(line.to_string())
    }
}

/// Parse the remainder of a link line: `URL [label words...]`.
fn parse_link(rest: &str) -> GemtextBlock {
    let mut tokens = rest.split_whitespace();
    let url = tokens.next().unwrap_or_default().to_string();
    let label = tokens.collect::<Vec<_>>().join(" ");
    let label = if label.is_empty() { url.clone() } else { label };
    GemtextBlock::Link { url, label }
}
