//! Interactive terminal Gemini browser.
//!
//! Reads one command per line from stdin and prints the page after each
//! navigation. Type `help` for the command list.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::Result;

use gemway_app::commands::{self, Command, HELP};
use gemway_app::render::{render_page, render_status};
use gemway_browser::NavigationEngine;
use gemway_net::{ClientOptions, FixedWindowQuota, GeminiClient, RustlsTlsProvider};

const WIDTH: usize = 80;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = gemway_app::load_config()?;
    let tls = Arc::new(RustlsTlsProvider::new()?);
    let client = Arc::new(GeminiClient::new(tls, ClientOptions::from(&config.client)));
    let quota = Arc::new(FixedWindowQuota::new(&config.rate_limit));
    let engine = NavigationEngine::new(&config, client, quota, "terminal");

    let stdout = io::stdout();
    let mut out = stdout.lock();

    commands::report(&mut out, &engine, engine.home())?;
    show(&mut out, &engine)?;

    for line in io::stdin().lock().lines() {
        let line = line?;
        let Some(command) = Command::parse(&line) else {
            if !line.trim().is_empty() {
                writeln!(out, "unknown command; type `help`")?;
            }
            continue;
        };
        match command {
            Command::Quit => break,
            Command::Help => writeln!(out, "{HELP}")?,
            other => {
                commands::report(&mut out, &engine, commands::execute(&engine, &other))?;
                show(&mut out, &engine)?;
            },
        }
    }
    Ok(())
}

fn show(out: &mut impl Write, engine: &NavigationEngine) -> io::Result<()> {
    let snapshot = engine.snapshot();
    if let Some(page) = &snapshot.page {
        writeln!(out, "{}", render_page(page, WIDTH))?;
    }
    writeln!(out, "{}", "-".repeat(WIDTH))?;
    writeln!(out, "{}", render_status(&snapshot))?;
    write!(out, "> ")?;
    out.flush()
}
