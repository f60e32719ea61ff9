//! Open-and-verify: click something that may open a new document, or may
//! navigate the current one, and verify where it leads.
//!
//! The click races a new-document event against a grace period:
//!
//! - **new document wins**: let it settle (network idle, then load), check its
//!   URL, close it and return focus to the primary;
//! - **grace wins**: watch the current document navigate, check its URL, then
//!   go back.
//!
//! Load waits never fail the attempt by themselves; they only add warnings.
//! When the attempt runs under a budget, the load chain is shortened so the
//! URL check and reconciliation still fit inside it. A new document is closed
//! even when its URL does not match.

use crate::config::EngineConfig;
use crate::driver::{DocumentId, Driver};
use crate::intent::Intent;
use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::pattern::UrlPattern;
use crate::result::TenazResult;
use crate::session::SessionContext;
use crate::strategy::{resolve_unique, Outcome, Strategy};
use crate::wait::{poll_until, settle_load, LoadFallback};
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Reason when neither a new document nor a navigation appeared
pub const NO_NAVIGATION: &str = "no navigation observed";

/// Attempt budget kept back for closing documents and restoring focus
const RECONCILE_RESERVE: Duration = Duration::from_millis(500);

enum Race {
    NewDocument(DocumentId),
    Grace,
}

/// The open-and-verify strategy
#[derive(Debug, Clone)]
pub struct OpenAndVerifyStrategy {
    timeout: Duration,
    min_viable: Duration,
    grace: Duration,
    load: LoadFallback,
    url_timeout: Duration,
    same_document_timeout: Duration,
    poll_interval: Duration,
}

impl OpenAndVerifyStrategy {
    /// Create from engine configuration
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.open_and_verify_timeout_ms),
            min_viable: config.min_viable(),
            grace: Duration::from_millis(config.popup_grace_ms),
            load: config.popup_load_fallback(),
            url_timeout: Duration::from_millis(config.url_timeout_ms),
            same_document_timeout: Duration::from_millis(config.same_document_timeout_ms),
            poll_interval: config.poll_interval(),
        }
    }

    /// `wanted`, shortened so `reserve` of the attempt budget stays unspent
    fn fit(session: &SessionContext, wanted: Duration, reserve: Duration) -> Duration {
        session
            .attempt_remaining()
            .map_or(wanted, |left| wanted.min(left.saturating_sub(reserve)))
    }

    /// The load chain, cut down to what the attempt can afford after `reserve`
    fn load_plan(&self, session: &SessionContext, lc: &mut Lifecycle, reserve: Duration) -> LoadFallback {
        let plan = self
            .load
            .within(Self::fit(session, self.load.budget(), reserve));
        if plan != self.load {
            warn!(
                budget_ms = plan.budget().as_millis(),
                full_ms = self.load.budget().as_millis(),
                "load wait shortened to fit the attempt"
            );
            lc.note(format!("load wait shortened to {}ms", plan.budget().as_millis()));
        }
        plan
    }

    async fn url_matches(
        &self,
        driver: &dyn Driver,
        doc: &DocumentId,
        destination: &UrlPattern,
        timeout: Duration,
    ) -> Option<String> {
        let waited_for = format!("url matches {destination}");
        let result = poll_until(timeout, self.poll_interval, &waited_for, move || async move {
            driver
                .current_url(doc)
                .await
                .is_ok_and(|url| destination.matches(&url))
        })
        .await;
        if result.success {
            driver.current_url(doc).await.ok()
        } else {
            None
        }
    }

    async fn new_document(
        &self,
        session: &mut SessionContext,
        lc: &mut Lifecycle,
        doc: DocumentId,
        destination: &UrlPattern,
    ) -> TenazResult<Outcome> {
        let driver = session.driver_handle();
        info!(document = %doc, "new document opened");
        session.track_secondary(doc.clone());
        session.switch_to(&doc)?;
        lc.advance(LifecycleState::AwaitingNewDocument)?;

        let plan = self.load_plan(session, lc, self.url_timeout + RECONCILE_RESERVE);
        let settled = settle_load(driver.as_ref(), &doc, &plan).await;
        for warning in settled.warnings {
            lc.note(warning);
        }

        lc.advance(LifecycleState::Verifying)?;
        let url_timeout = Self::fit(session, self.url_timeout, RECONCILE_RESERVE);
        let verified = self
            .url_matches(driver.as_ref(), &doc, destination, url_timeout)
            .await;
        match &verified {
            Some(url) => session.record_visit(url.clone()),
            None => {
                let actual = driver.current_url(&doc).await.unwrap_or_default();
                warn!(document = %doc, url = %actual, expected = %destination, "new document did not reach destination");
                lc.note(format!("new document at {actual:?} does not match {destination}"));
            }
        }

        lc.advance(LifecycleState::Reconciling)?;
        if let Err(e) = session.reconcile().await {
            lc.fail(format!("reconcile failed: {e}"))?;
            return Ok(Outcome::failed_with(lc.summary(), &e));
        }
        Ok(Self::finish(lc, verified.is_some()))
    }

    async fn same_document(
        &self,
        session: &mut SessionContext,
        lc: &mut Lifecycle,
        start_url: &str,
        destination: &UrlPattern,
    ) -> TenazResult<Outcome> {
        let driver = session.driver_handle();
        let doc = session.active().clone();
        debug!(document = %doc, grace_ms = self.grace.as_millis(), "no new document, watching current document");
        lc.advance(LifecycleState::AwaitingSameDocumentNav)?;

        let (watched, current) = (driver.as_ref(), &doc);
        let watch = Self::fit(session, self.same_document_timeout, RECONCILE_RESERVE);
        let navigated = poll_until(
            watch,
            self.poll_interval,
            "url change",
            move || async move {
                watched
                    .current_url(current)
                    .await
                    .is_ok_and(|url| url != start_url)
            },
        )
        .await;
        if !navigated.success {
            lc.fail(NO_NAVIGATION)?;
            return Ok(Outcome::failure(lc.summary()));
        }

        lc.advance(LifecycleState::Verifying)?;
        let url_timeout = Self::fit(session, self.url_timeout, RECONCILE_RESERVE);
        let verified = self
            .url_matches(driver.as_ref(), &doc, destination, url_timeout)
            .await;
        match &verified {
            Some(url) => session.record_visit(url.clone()),
            None => {
                let actual = driver.current_url(&doc).await.unwrap_or_default();
                lc.note(format!("navigated to {actual:?}, expected {destination}"));
            }
        }

        lc.advance(LifecycleState::Reconciling)?;
        if let Err(e) = driver.go_back(&doc).await {
            warn!(document = %doc, error = %e, "could not navigate back");
            lc.fail(format!("go back failed: {e}"))?;
            return Ok(Outcome::failed_with(lc.summary(), &e));
        }
        let plan = self.load_plan(session, lc, RECONCILE_RESERVE);
        let settled = settle_load(driver.as_ref(), &doc, &plan).await;
        for warning in settled.warnings {
            lc.note(warning);
        }
        if let Err(e) = session.reconcile().await {
            lc.fail(format!("reconcile failed: {e}"))?;
            return Ok(Outcome::failed_with(lc.summary(), &e));
        }
        Ok(Self::finish(lc, verified.is_some()))
    }

    fn finish(lc: &mut Lifecycle, verified: bool) -> Outcome {
        let next = if verified {
            LifecycleState::Settled
        } else {
            LifecycleState::Failed
        };
        if let Err(e) = lc.advance(next) {
            return Outcome::failed_with("lifecycle error", &e);
        }
        if verified {
            if !lc.notes().is_empty() {
                info!(warnings = %lc.summary(), "destination verified with warnings");
            }
            Outcome::Success
        } else {
            Outcome::failure(lc.summary())
        }
    }

    async fn run(
        &self,
        session: &mut SessionContext,
        intent: &Intent,
        destination: &UrlPattern,
        lc: &mut Lifecycle,
    ) -> TenazResult<Outcome> {
        let driver = session.driver_handle();
        let doc = session.active().clone();
        let start_url = driver.current_url(&doc).await?;
        let mut opened = driver.subscribe_documents().await?;

        if let Err(e) = driver.click(&doc, &intent.source).await {
            lc.fail(format!("could not click trigger: {e}"))?;
            return Ok(Outcome::failed_with("could not click trigger", &e));
        }
        lc.advance(LifecycleState::Triggered)?;

        let race = tokio::select! {
            Some(new_doc) = opened.next() => Race::NewDocument(new_doc),
            () = tokio::time::sleep(self.grace) => Race::Grace,
        };

        match race {
            Race::NewDocument(new_doc) => self.new_document(session, lc, new_doc, destination).await,
            Race::Grace => self.same_document(session, lc, &start_url, destination).await,
        }
    }
}

#[async_trait]
impl Strategy for OpenAndVerifyStrategy {
    fn name(&self) -> &'static str {
        "open-and-verify"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn min_viable(&self) -> Duration {
        self.min_viable
    }

    async fn execute(&self, session: &mut SessionContext, intent: &Intent) -> Outcome {
        let Some(destination) = intent.destination.as_ref() else {
            return Outcome::failure("intent has no destination");
        };
        if let Err(outcome) = resolve_unique(session, &intent.source).await {
            return outcome;
        }
        let mut lc = Lifecycle::new();
        match self.run(session, intent, destination, &mut lc).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(state = %lc.state(), error = %e, "open-and-verify aborted");
                Outcome::failed_with(format!("aborted while {}", lc.state()), &e)
            }
        }
    }
}
