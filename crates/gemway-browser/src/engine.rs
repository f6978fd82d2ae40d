//! Navigation engine: drives one attempt at a time from a reference to
//! a terminal outcome and commits the result to the session.
//!
//! An attempt walks `resolve -> gate -> fetch` and loops on redirects,
//! each hop resolved against the URL that produced it and vetted again.
//! The session lock is held only while reading or committing state, never
//! across network I/O. While an attempt is in flight every other
//! operation is rejected with [`GemwayError::Busy`].

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gemway_net::{FetchOutcome, Fetcher, GeminiStatus, QuotaStore, SecurityGate};
use gemway_types::{GeminiUrl, GemwayConfig, GemwayError, Resolved, Result, resolve};

use crate::session::{NavigationFailure, NavigationSession, Page, SessionSnapshot};

/// Where a successful attempt lands in history.
#[derive(Debug, Clone, Copy)]
enum Commit {
    /// Truncate forward entries and append.
    Push,
    /// Revisit an existing entry. Each redirect rewrites the entry as soon
    /// as it is seen, even if the chain later fails.
    Replay(usize),
    /// Re-fetch the current entry; the final URL replaces it on success.
    Reload(usize),
}

pub struct NavigationEngine {
    gate: SecurityGate,
    quota: Arc<dyn QuotaStore>,
    client_id: String,
    fetcher: Arc<dyn Fetcher>,
    home_url: GeminiUrl,
    max_redirects: u8,
    session: Mutex<NavigationSession>,
    subscribers: Mutex<Vec<Sender<SessionSnapshot>>>,
}

impl NavigationEngine {
    /// Build an engine whose session starts at the configured home URL.
    /// Nothing is fetched until the first operation.
    pub fn new(
        config: &GemwayConfig,
        fetcher: Arc<dyn Fetcher>,
        quota: Arc<dyn QuotaStore>,
        client_id: impl Into<String>,
    ) -> Self {
        let home_url = config.browser.home_url.clone();
        Self {
            gate: SecurityGate::new(&config.security),
            quota,
            client_id: client_id.into(),
            fetcher,
            max_redirects: config.browser.max_redirects,
            session: Mutex::new(NavigationSession::new(home_url.clone())),
            home_url,
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn home_url(&self) -> &GeminiUrl {
        &self.home_url
    }

    /// Resolve `reference` against the current URL and load it.
    pub fn navigate(&self, reference: &str) -> Result<()> {
        self.attempt(|session| Some((resolve(reference, &session.url), Commit::Push)))
    }

    /// Load the configured home URL as a new history entry.
    pub fn home(&self) -> Result<()> {
        self.attempt(|_| Some((Ok(Resolved::Gemini(self.home_url.clone())), Commit::Push)))
    }

    /// Replay the previous history entry. No-op at the start of history.
    pub fn back(&self) -> Result<()> {
        self.attempt(|session| {
            let (index, url) = session.history.back_target()?;
            Some((Ok(Resolved::Gemini(url.clone())), Commit::Replay(index)))
        })
    }

    /// Replay the next history entry. No-op at the end of history.
    pub fn forward(&self) -> Result<()> {
        self.attempt(|session| {
            let (index, url) = session.history.forward_target()?;
            Some((Ok(Resolved::Gemini(url.clone())), Commit::Replay(index)))
        })
    }

    /// Re-fetch the current URL without growing history.
    ///
    /// Before anything has loaded the history is empty; the start URL is
    /// then recorded as the first entry.
    pub fn refresh(&self) -> Result<()> {
        self.attempt(|session| {
            let commit = match session.history.index() {
                -1 => Commit::Push,
                i => Commit::Reload(i as usize),
            };
            Some((Ok(Resolved::Gemini(session.url.clone())), commit))
        })
    }

    /// Owned copy of the current session state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock_session().snapshot()
    }

    /// Receive a snapshot at every attempt start and terminal outcome.
    pub fn subscribe(&self) -> Receiver<SessionSnapshot> {
        let (tx, rx) = mpsc::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    // -- attempt lifecycle ------------------------------------------------

    /// Run one attempt to a terminal state.
    ///
    /// `prepare` sees the session under the lock and picks the first
    /// target and where the result lands; `None` makes the call a no-op.
    /// The lock is released before the first fetch.
    fn attempt<P>(&self, prepare: P) -> Result<()>
    where
        P: FnOnce(&NavigationSession) -> Option<(Result<Resolved>, Commit)>,
    {
        let (first, commit) = {
            let mut session = self.lock_session();
            if session.loading {
                log::debug!("navigation rejected: attempt already in flight");
                return Err(GemwayError::Busy);
            }
            let Some(start) = prepare(&session) else {
                return Ok(());
            };
            session.loading = true;
            start
        };
        let mut in_flight = InFlight {
            engine: self,
            settled: false,
        };
        self.notify();

        let outcome = first.and_then(|target| self.chase(target, commit));
        let result = self.commit(outcome, commit);
        in_flight.settled = true;
        self.notify();
        result
    }

    /// Follow redirects until a terminal outcome.
    fn chase(&self, first: Resolved, commit: Commit) -> Result<Page> {
        let mut target = first;
        let mut followed = 0u8;
        loop {
            let url = self.admit(target)?;
            log::debug!("fetching {url} (redirects followed: {followed})");
            match self.fetcher.fetch(&url) {
                FetchOutcome::Success {
                    status,
                    mime_type,
                    body,
                } => return Ok(Page::new(url, status, mime_type, body)),
                FetchOutcome::Redirect { status, target: to } => {
                    if followed >= self.max_redirects {
                        return Err(GemwayError::TooManyRedirects {
                            limit: self.max_redirects,
                        });
                    }
                    followed += 1;
                    log::debug!("{url} redirected ({status}) to {to}");
                    target = resolve(&to, &url)?;
                    if let (Commit::Replay(index), Resolved::Gemini(next)) = (commit, &target) {
                        self.lock_session().history.replace_at(index, next.clone());
                    }
                },
                FetchOutcome::Failure { status, message } => {
                    let message = if message.is_empty() {
                        GeminiStatus::from_code(status).description().to_string()
                    } else {
                        message
                    };
                    return Err(GemwayError::Protocol { status, message });
                },
                FetchOutcome::TransportError { message } => {
                    return Err(GemwayError::Transport(message));
                },
            }
        }
    }

    /// Gate and quota check for one hop.
    fn admit(&self, target: Resolved) -> Result<GeminiUrl> {
        let url = match target {
            Resolved::Gemini(url) => {
                self.gate.check_url(&url)?;
                url
            },
            Resolved::Opaque(reference) => self.gate.check(&reference)?,
        };
        if !self.quota.check_quota(&self.client_id) {
            return Err(GemwayError::RateLimited);
        }
        Ok(url)
    }

    fn commit(&self, outcome: Result<Page>, commit: Commit) -> Result<()> {
        let mut session = self.lock_session();
        session.loading = false;
        match outcome {
            Ok(page) => {
                let url = page.url.clone();
                match commit {
                    Commit::Push => session.history.push(url.clone()),
                    Commit::Replay(index) | Commit::Reload(index) => {
                        if session.history.get(index) != Some(&url) {
                            session.history.replace_at(index, url.clone());
                        }
                        session.history.move_to(index);
                    },
                }
                log::info!("loaded {url} ({} {})", page.status, page.mime_type);
                session.url = url;
                session.page = Some(page);
                session.error = None;
                Ok(())
            },
            Err(err) => {
                log::info!("navigation failed: {err}");
                session.error = Some(NavigationFailure::from(&err));
                Err(err)
            },
        }
    }

    fn notify(&self) {
        let snapshot = self.snapshot();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| tx.send(snapshot.clone()).is_ok());
    }

    fn lock_session(&self) -> MutexGuard<'_, NavigationSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears `loading` if an attempt unwinds before it commits.
struct InFlight<'a> {
    engine: &'a NavigationEngine,
    settled: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            log::warn!("navigation attempt aborted before commit");
            self.engine.lock_session().loading = false;
            self.engine.notify();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::thread;
    use std::time::Duration;

    use gemway_net::FixedWindowQuota;
    use gemway_types::ErrorKind;

    use super::*;

    const HOME: &str = "gemini://home.example/";

    /// Answers from a route table keyed by URL and records every request.
    #[derive(Default)]
    struct ScriptedFetcher {
        routes: Mutex<HashMap<String, FetchOutcome>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        fn route(&self, url: &str, outcome: FetchOutcome) {
            self.routes.lock().unwrap().insert(url.to_string(), outcome);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Fetcher for ScriptedFetcher {
        fn fetch(&self, url: &GeminiUrl) -> FetchOutcome {
            let key = url.to_string();
            self.calls.lock().unwrap().push(key.clone());
            self.routes
                .lock()
                .unwrap()
                .get(&key)
                .cloned()
                .unwrap_or(FetchOutcome::TransportError {
                    message: format!("no route to {key}"),
                })
        }
    }

    fn ok(body: &str) -> FetchOutcome {
        FetchOutcome::Success {
            status: 20,
            mime_type: "text/gemini".into(),
            body: body.into(),
        }
    }

    fn redirect(target: &str) -> FetchOutcome {
        FetchOutcome::Redirect {
            status: 31,
            target: target.into(),
        }
    }

    fn url(s: &str) -> GeminiUrl {
        GeminiUrl::parse(s).unwrap()
    }

    fn config() -> GemwayConfig {
        let mut config = GemwayConfig::default();
        config.browser.home_url = url(HOME);
        config
    }

    fn quota(max: u32) -> Arc<dyn QuotaStore> {
        Arc::new(FixedWindowQuota::with_limits(Duration::from_secs(600), max))
    }

    fn engine_with(routes: &[(&str, FetchOutcome)]) -> (NavigationEngine, Arc<ScriptedFetcher>) {
        let fetcher = Arc::new(ScriptedFetcher::default());
        for (u, outcome) in routes {
            fetcher.route(u, outcome.clone());
        }
        let engine = NavigationEngine::new(
            &config(),
            Arc::clone(&fetcher) as Arc<dyn Fetcher>,
            quota(1000),
            "test",
        );
        (engine, fetcher)
    }

    fn history(engine: &NavigationEngine) -> Vec<String> {
        engine
            .lock_session()
            .history
            .entries()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    // -- navigate -----------------------------------------------------------

    #[test]
    fn navigate_loads_page_and_appends_history() {
        let (engine, _) = engine_with(&[("gemini://a.example/", ok("# A\n"))]);
        engine.navigate("gemini://a.example/").unwrap();

        let snap = engine.snapshot();
        assert_eq!(snap.url, url("gemini://a.example/"));
        assert_eq!(snap.page.as_ref().and_then(Page::title), Some("A"));
        assert!(snap.error.is_none());
        assert!(!snap.loading);
        assert_eq!(snap.history_index, 0);
        assert_eq!(history(&engine), ["gemini://a.example/"]);
    }

    #[test]
    fn relative_reference_resolves_against_current_url() {
        let (engine, fetcher) = engine_with(&[
            ("gemini://h.example/p/q", ok("q")),
            ("gemini://h.example/p/y", ok("y")),
        ]);
        engine.navigate("gemini://h.example/p/q").unwrap();
        engine.navigate("y").unwrap();
        assert_eq!(
            fetcher.calls(),
            ["gemini://h.example/p/q", "gemini://h.example/p/y"]
        );
        assert_eq!(engine.snapshot().history_len, 2);
    }

    #[test]
    fn first_relative_reference_resolves_against_home() {
        let (engine, fetcher) = engine_with(&[("gemini://home.example/docs/", ok(""))]);
        engine.navigate("docs/").unwrap();
        assert_eq!(fetcher.calls(), ["gemini://home.example/docs/"]);
    }

    #[test]
    fn redirect_lands_on_final_url_with_one_history_entry() {
        let (engine, _) = engine_with(&[
            ("gemini://c.example/", redirect("gemini://d.example/")),
            ("gemini://d.example/", ok("# D")),
        ]);
        engine.navigate("gemini://c.example/").unwrap();

        let snap = engine.snapshot();
        assert_eq!(snap.url, url("gemini://d.example/"));
        assert_eq!(history(&engine), ["gemini://d.example/"]);
    }

    #[test]
    fn relative_redirect_resolves_against_redirecting_url() {
        let (engine, fetcher) = engine_with(&[
            ("gemini://a.example/x/y", redirect("z")),
            ("gemini://a.example/x/z", ok("z")),
        ]);
        engine.navigate("gemini://a.example/x/y").unwrap();
        assert_eq!(
            fetcher.calls(),
            ["gemini://a.example/x/y", "gemini://a.example/x/z"]
        );
    }

    #[test]
    fn redirect_loop_ends_in_too_many_redirects() {
        let hosts: Vec<String> = (1..=6).map(|i| format!("gemini://h{i}.example/")).collect();
        let routes: Vec<(&str, FetchOutcome)> = hosts
            .iter()
            .enumerate()
            .map(|(i, h)| (h.as_str(), redirect(&hosts[(i + 1) % hosts.len()])))
            .collect();
        let (engine, fetcher) = engine_with(&routes);

        let err = engine.navigate(&hosts[0]).unwrap_err();
        assert!(matches!(err, GemwayError::TooManyRedirects { limit: 5 }));
        assert_eq!(fetcher.calls().len(), 6);

        let snap = engine.snapshot();
        assert_eq!(snap.error.unwrap().kind, ErrorKind::TooManyRedirects);
        assert_eq!(snap.history_index, -1);
        assert_eq!(snap.url, url(HOME));
    }

    #[test]
    fn five_redirects_are_still_followed() {
        let hosts: Vec<String> = (0..=5).map(|i| format!("gemini://r{i}.example/")).collect();
        let mut routes: Vec<(&str, FetchOutcome)> = hosts
            .windows(2)
            .map(|w| (w[0].as_str(), redirect(&w[1])))
            .collect();
        routes.push((hosts[5].as_str(), ok("end")));
        let (engine, _) = engine_with(&routes);

        engine.navigate(&hosts[0]).unwrap();
        assert_eq!(engine.snapshot().url, url(&hosts[5]));
    }

    #[test]
    fn failed_navigation_keeps_prior_page_and_history() {
        let (engine, _) = engine_with(&[
            ("gemini://a.example/", ok("# A")),
            (
                "gemini://a.example/missing",
                FetchOutcome::Failure {
                    status: 51,
                    message: "Not found".into(),
                },
            ),
        ]);
        engine.navigate("gemini://a.example/").unwrap();
        let err = engine.navigate("/missing").unwrap_err();
        assert_eq!(err.status(), Some(51));

        let snap = engine.snapshot();
        assert_eq!(snap.url, url("gemini://a.example/"));
        assert_eq!(snap.page.unwrap().body, "# A");
        let failure = snap.error.unwrap();
        assert_eq!(failure.kind, ErrorKind::ProtocolError);
        assert_eq!(failure.to_string(), "51 Not found");
        assert_eq!(snap.history_len, 1);
    }

    #[test]
    fn failure_without_meta_uses_status_name() {
        let (engine, _) = engine_with(&[(
            "gemini://a.example/",
            FetchOutcome::Failure {
                status: 51,
                message: String::new(),
            },
        )]);
        let err = engine.navigate("gemini://a.example/").unwrap_err();
        assert_eq!(err.to_string(), "51 NOT FOUND");
    }

    #[test]
    fn success_after_failure_clears_error() {
        let (engine, _) = engine_with(&[("gemini://a.example/", ok("a"))]);
        engine.navigate("gemini://nowhere.example/").unwrap_err();
        assert_eq!(
            engine.snapshot().error.unwrap().kind,
            ErrorKind::TransportError
        );
        engine.navigate("gemini://a.example/").unwrap();
        assert!(engine.snapshot().error.is_none());
    }

    #[test]
    fn failing_intermediate_hop_never_enters_history() {
        let (engine, _) = engine_with(&[
            ("gemini://a.example/", redirect("gemini://b.example/")),
            (
                "gemini://b.example/",
                FetchOutcome::Failure {
                    status: 40,
                    message: "down".into(),
                },
            ),
        ]);
        engine.navigate("gemini://a.example/").unwrap_err();
        assert!(history(&engine).is_empty());
        assert_eq!(engine.snapshot().url, url(HOME));
    }

    #[test]
    fn gate_denies_before_fetching() {
        let (engine, fetcher) = engine_with(&[]);
        let err = engine.navigate("gemini://127.0.0.1/").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        let err = engine.navigate("gemini://example.org:22/").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert!(fetcher.calls().is_empty());
    }

    #[test]
    fn redirect_into_private_network_is_denied() {
        let (engine, fetcher) = engine_with(&[(
            "gemini://a.example/",
            redirect("gemini://192.168.0.1/admin"),
        )]);
        let err = engine.navigate("gemini://a.example/").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(fetcher.calls(), ["gemini://a.example/"]);
    }

    #[test]
    fn other_schemes_are_forbidden() {
        let (engine, fetcher) = engine_with(&[]);
        let err = engine.navigate("https://example.org/").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert!(fetcher.calls().is_empty());
    }

    #[test]
    fn empty_reference_is_invalid() {
        let (engine, _) = engine_with(&[]);
        let err = engine.navigate("").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidReference);
        assert!(!engine.snapshot().loading);
    }

    #[test]
    fn quota_denial_is_rate_limited() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.route("gemini://a.example/", ok("a"));
        let engine = NavigationEngine::new(
            &config(),
            Arc::clone(&fetcher) as Arc<dyn Fetcher>,
            quota(1),
            "test",
        );
        engine.navigate("gemini://a.example/").unwrap();
        let err = engine.refresh().unwrap_err();
        assert!(matches!(err, GemwayError::RateLimited));
        assert_eq!(fetcher.calls().len(), 1);
    }

    #[test]
    fn same_url_is_not_appended_twice() {
        let (engine, _) = engine_with(&[("gemini://a.example/", ok("a"))]);
        engine.navigate("gemini://a.example/").unwrap();
        engine.navigate("gemini://a.example/").unwrap();
        assert_eq!(history(&engine), ["gemini://a.example/"]);
    }

    // -- history replay -----------------------------------------------------

    #[test]
    fn back_then_navigate_truncates_forward_entries() {
        let (engine, _) = engine_with(&[
            ("gemini://a.example/", ok("a")),
            ("gemini://b.example/", ok("b")),
            ("gemini://c.example/", ok("c")),
        ]);
        engine.navigate("gemini://a.example/").unwrap();
        engine.navigate("gemini://b.example/").unwrap();
        engine.back().unwrap();

        let snap = engine.snapshot();
        assert_eq!(snap.url, url("gemini://a.example/"));
        assert!(snap.can_go_forward);
        assert!(!snap.can_go_back);

        engine.navigate("gemini://c.example/").unwrap();
        assert_eq!(history(&engine), ["gemini://a.example/", "gemini://c.example/"]);
        assert!(!engine.snapshot().can_go_forward);
    }

    #[test]
    fn forward_replays_next_entry_without_appending() {
        let (engine, fetcher) = engine_with(&[
            ("gemini://a.example/", ok("a")),
            ("gemini://b.example/", ok("b")),
        ]);
        engine.navigate("gemini://a.example/").unwrap();
        engine.navigate("gemini://b.example/").unwrap();
        engine.back().unwrap();
        engine.forward().unwrap();

        let snap = engine.snapshot();
        assert_eq!(snap.url, url("gemini://b.example/"));
        assert_eq!(snap.history_index, 1);
        assert_eq!(snap.history_len, 2);
        assert_eq!(fetcher.calls().len(), 4);
    }

    #[test]
    fn back_and_forward_at_the_edges_do_nothing() {
        let (engine, fetcher) = engine_with(&[("gemini://a.example/", ok("a"))]);
        engine.back().unwrap();
        engine.forward().unwrap();
        engine.navigate("gemini://a.example/").unwrap();
        engine.back().unwrap();
        engine.forward().unwrap();
        assert_eq!(fetcher.calls().len(), 1);
        assert_eq!(engine.snapshot().history_index, 0);
    }

    #[test]
    fn replay_redirect_rewrites_entry_in_place() {
        let (engine, fetcher) = engine_with(&[
            ("gemini://a.example/", ok("a")),
            ("gemini://b.example/", ok("b")),
            ("gemini://moved.example/", ok("moved")),
        ]);
        engine.navigate("gemini://a.example/").unwrap();
        engine.navigate("gemini://b.example/").unwrap();
        fetcher.route("gemini://a.example/", redirect("gemini://moved.example/"));

        engine.back().unwrap();
        assert_eq!(
            history(&engine),
            ["gemini://moved.example/", "gemini://b.example/"]
        );
        let snap = engine.snapshot();
        assert_eq!(snap.history_index, 0);
        assert_eq!(snap.url, url("gemini://moved.example/"));
    }

    #[test]
    fn failed_replay_keeps_index_and_entry() {
        let (engine, fetcher) = engine_with(&[
            ("gemini://a.example/", ok("a")),
            ("gemini://b.example/", ok("b")),
        ]);
        engine.navigate("gemini://a.example/").unwrap();
        engine.navigate("gemini://b.example/").unwrap();
        fetcher.route(
            "gemini://a.example/",
            FetchOutcome::TransportError {
                message: "connection reset".into(),
            },
        );

        let err = engine.back().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportError);
        let snap = engine.snapshot();
        assert_eq!(snap.history_index, 1);
        assert_eq!(snap.url, url("gemini://b.example/"));
        assert_eq!(history(&engine), ["gemini://a.example/", "gemini://b.example/"]);
    }

    #[test]
    fn replay_redirect_rewrites_entry_even_when_chain_fails() {
        let (engine, fetcher) = engine_with(&[
            ("gemini://a.example/", ok("a")),
            ("gemini://b.example/", ok("b")),
        ]);
        engine.navigate("gemini://a.example/").unwrap();
        engine.navigate("gemini://b.example/").unwrap();
        fetcher.route("gemini://a.example/", redirect("gemini://moved.example/"));

        let err = engine.back().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportError);
        assert_eq!(
            history(&engine),
            ["gemini://moved.example/", "gemini://b.example/"]
        );
        let snap = engine.snapshot();
        assert_eq!(snap.history_index, 1);
        assert_eq!(snap.url, url("gemini://b.example/"));
        assert!(snap.error.is_some());

        // The next visit goes straight to the rewritten entry.
        fetcher.route("gemini://moved.example/", ok("moved"));
        engine.back().unwrap();
        assert_eq!(fetcher.calls().last().unwrap(), "gemini://moved.example/");
        assert_eq!(engine.snapshot().history_index, 0);
    }

    #[test]
    fn failed_refresh_redirect_leaves_current_entry() {
        let (engine, fetcher) = engine_with(&[("gemini://a.example/", ok("a"))]);
        engine.navigate("gemini://a.example/").unwrap();
        fetcher.route("gemini://a.example/", redirect("gemini://gone.example/"));

        assert!(engine.refresh().is_err());
        assert_eq!(history(&engine), ["gemini://a.example/"]);
        assert_eq!(engine.snapshot().url, url("gemini://a.example/"));
    }

    #[test]
    fn refresh_refetches_without_growing_history() {
        let (engine, fetcher) = engine_with(&[("gemini://a.example/", ok("v1"))]);
        engine.navigate("gemini://a.example/").unwrap();
        fetcher.route("gemini://a.example/", ok("v2"));
        engine.refresh().unwrap();

        let snap = engine.snapshot();
        assert_eq!(snap.page.unwrap().body, "v2");
        assert_eq!(snap.history_len, 1);
    }

    #[test]
    fn refresh_redirect_rewrites_current_entry() {
        let (engine, fetcher) = engine_with(&[
            ("gemini://a.example/", ok("a")),
            ("gemini://b.example/", ok("b")),
            ("gemini://b2.example/", ok("b2")),
        ]);
        engine.navigate("gemini://a.example/").unwrap();
        engine.navigate("gemini://b.example/").unwrap();
        fetcher.route("gemini://b.example/", redirect("gemini://b2.example/"));
        engine.refresh().unwrap();

        assert_eq!(
            history(&engine),
            ["gemini://a.example/", "gemini://b2.example/"]
        );
        assert_eq!(engine.snapshot().url, url("gemini://b2.example/"));
    }

    #[test]
    fn refresh_before_first_load_records_start_url() {
        let (engine, fetcher) = engine_with(&[(HOME, ok("# Home"))]);
        engine.refresh().unwrap();
        assert_eq!(fetcher.calls(), [HOME]);
        assert_eq!(history(&engine), [HOME]);
    }

    #[test]
    fn home_navigates_to_configured_url() {
        let (engine, _) = engine_with(&[("gemini://a.example/", ok("a")), (HOME, ok("# Home"))]);
        engine.navigate("gemini://a.example/").unwrap();
        engine.home().unwrap();
        assert_eq!(engine.snapshot().url, url(HOME));
        assert_eq!(history(&engine), ["gemini://a.example/", HOME]);
    }

    // -- concurrency and observation ------------------------------------------

    /// Blocks inside `fetch` until released, announcing when it gets there.
    struct GatedFetcher {
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl Fetcher for GatedFetcher {
        fn fetch(&self, _url: &GeminiUrl) -> FetchOutcome {
            self.entered.lock().unwrap().send(()).unwrap();
            self.release.lock().unwrap().recv().unwrap();
            ok("slow")
        }
    }

    #[test]
    fn calls_during_an_attempt_are_busy_and_change_nothing() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let fetcher = Arc::new(GatedFetcher {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        });
        let engine = Arc::new(NavigationEngine::new(&config(), fetcher, quota(1000), "test"));

        let worker = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.navigate("gemini://slow.example/"))
        };
        entered_rx.recv().unwrap();

        let before = engine.snapshot();
        assert!(before.loading);
        assert!(matches!(
            engine.navigate("gemini://other.example/"),
            Err(GemwayError::Busy)
        ));
        assert!(matches!(engine.back(), Err(GemwayError::Busy)));
        assert!(matches!(engine.forward(), Err(GemwayError::Busy)));
        assert!(matches!(engine.refresh(), Err(GemwayError::Busy)));
        assert!(matches!(engine.home(), Err(GemwayError::Busy)));
        assert_eq!(engine.snapshot(), before);

        release_tx.send(()).unwrap();
        worker.join().unwrap().unwrap();
        let after = engine.snapshot();
        assert!(!after.loading);
        assert_eq!(after.url, url("gemini://slow.example/"));
    }

    struct PanickingFetcher;

    impl Fetcher for PanickingFetcher {
        fn fetch(&self, _url: &GeminiUrl) -> FetchOutcome {
            panic!("fetcher blew up");
        }
    }

    #[test]
    fn panicking_fetcher_does_not_wedge_the_engine() {
        let engine =
            NavigationEngine::new(&config(), Arc::new(PanickingFetcher), quota(1000), "test");
        let rx = engine.subscribe();

        let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            engine.navigate("gemini://a.example/")
        }));
        assert!(unwound.is_err());
        assert!(!engine.snapshot().loading);
        assert!(!rx.try_iter().last().unwrap().loading);

        // The next call runs instead of reporting Busy.
        let again = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| engine.refresh()));
        assert!(again.is_err());
        assert!(!engine.snapshot().loading);
    }

    #[test]
    fn subscribers_see_start_and_terminal_snapshots() {
        let (engine, _) = engine_with(&[("gemini://a.example/", ok("# A"))]);
        let rx = engine.subscribe();
        engine.navigate("gemini://a.example/").unwrap();

        let seen: Vec<SessionSnapshot> = rx.try_iter().collect();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].loading);
        assert!(seen[0].page.is_none());
        assert!(!seen[1].loading);
        assert_eq!(seen[1].url, url("gemini://a.example/"));
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let (engine, _) = engine_with(&[("gemini://a.example/", ok("a"))]);
        drop(engine.subscribe());
        let live = engine.subscribe();
        engine.navigate("gemini://a.example/").unwrap();
        assert_eq!(engine.subscribers.lock().unwrap().len(), 1);
        assert_eq!(live.try_iter().count(), 2);
    }
}
