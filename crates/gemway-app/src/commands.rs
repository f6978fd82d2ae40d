//! Line commands for the terminal browser.

use std::io::{self, Write};

use gemway_browser::NavigationEngine;
use gemway_types::{GemwayError, Result};

pub const HELP: &str = "\
commands:
  go <url>    open a URL, absolute or relative to the current page
  <n>         follow link number n (also: link <n>)
  back, b     previous history entry
  forward, f  next history entry
  refresh, r  reload the current page
  home        open the home page
  help, ?     show this text
  quit, q     exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Go(String),
    Link(usize),
    Back,
    Forward,
    Refresh,
    Home,
    Help,
    Quit,
}

impl Command {
    /// Parse one input line. `None` for blank or unrecognised input.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (word, arg) = match line.split_once(char::is_whitespace) {
            Some((word, arg)) => (word, arg.trim()),
            None => (line, ""),
        };
        match (word, arg) {
            ("go" | "g", target) if !target.is_empty() => Some(Command::Go(target.to_string())),
            ("link" | "l", n) => n.parse().ok().filter(|n| *n > 0).map(Command::Link),
            ("back" | "b", "") => Some(Command::Back),
            ("forward" | "f", "") => Some(Command::Forward),
            ("refresh" | "r", "") => Some(Command::Refresh),
            ("home", "") => Some(Command::Home),
            ("help" | "?", "") => Some(Command::Help),
            ("quit" | "q" | "exit", "") => Some(Command::Quit),
            (n, "") => n.parse().ok().filter(|n| *n > 0).map(Command::Link),
            _ => None,
        }
    }
}

/// Run a navigation command against `engine`.
///
/// `Help` and `Quit` are handled by the caller and do nothing here.
pub fn execute(engine: &NavigationEngine, command: &Command) -> Result<()> {
    match command {
        Command::Go(target) => engine.navigate(target),
        Command::Link(n) => {
            let target = link_target(engine, *n)?;
            engine.navigate(&target)
        },
        Command::Back => engine.back(),
        Command::Forward => engine.forward(),
        Command::Refresh => engine.refresh(),
        Command::Home => engine.home(),
        Command::Help | Command::Quit => Ok(()),
    }
}

/// Print the error from a command unless the session recorded it, in
/// which case the status line already shows it.
pub fn report(
    out: &mut impl Write,
    engine: &NavigationEngine,
    result: Result<()>,
) -> io::Result<()> {
    let Err(e) = result else {
        return Ok(());
    };
    let message = e.to_string();
    let recorded = engine.snapshot().error.map(|f| f.message);
    if recorded.as_deref() != Some(message.as_str()) {
        writeln!(out, "{message}")?;
    }
    Ok(())
}

/// URL of the `n`th link (1-based) on the current page.
fn link_target(engine: &NavigationEngine, n: usize) -> Result<String> {
    let snapshot = engine.snapshot();
    snapshot
        .page
        .as_ref()
        .and_then(|page| page.document.as_ref())
        .and_then(|doc| {
            let index = n.checked_sub(1)?;
            doc.links().get(index).map(|(url, _)| url.to_string())
        })
        .ok_or_else(|| GemwayError::InvalidReference(format!("no link numbered {n}")))
}
