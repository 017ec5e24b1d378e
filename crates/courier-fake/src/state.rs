use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use courier_http::{Factory, FactoryConfig, ReqwestTemplate, TransportTemplate};

use crate::error::Result;
use crate::mock::Mock;
use crate::request::FakeRequest;
use crate::rule::{FakeRule, Matcher};
use crate::transport::FakeTemplate;

/// The mock registry for one test.
///
/// Rules are sorted by specificity when the state is built and never change afterwards.
/// Every request that reaches a [`FakeTransport`](crate::FakeTransport) is recorded here,
/// matched or not.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use courier_fake::{FakeState, Mock};
/// use courier_http::{ClientConfig, FactoryConfig};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let state = Arc::new(FakeState::new([
///     ("stripe", Mock::from("ok")),
///     ("stripe#/charges/*", Mock::from(402u16)),
/// ])?);
/// state.prevent_stray_requests();
///
/// let factory = state.factory(
///     FactoryConfig::new("stripe").client("stripe", ClientConfig::new("https://api.stripe.com")),
/// );
/// let response = factory.get("/charges/123").await?;
/// assert!(response.payment_required());
/// state.assert_sent(|r| r.path() == "/charges/123");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct FakeState {
    rules:    Vec<FakeRule>,
    recorded: RwLock<Vec<FakeRequest>>,
    stray:    RwLock<StrayPolicy>,
}

#[derive(Debug, Default)]
struct StrayPolicy {
    prevent: bool,
    allowed: Vec<Matcher>,
}

impl FakeState {
    /// Compile `(pattern, mock)` pairs into rules.
    pub fn new<I, P, M>(rules: I) -> Result<Self>
    where
        I: IntoIterator<Item = (P, M)>,
        P: Into<String>,
        M: Into<Mock>,
    {
        let rules = rules
            .into_iter()
            .map(|(pattern, mock)| FakeRule::new(pattern, mock))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_rules(rules))
    }

    pub fn from_rules(mut rules: Vec<FakeRule>) -> Self {
        rules.sort_by(FakeRule::specificity);
        Self {
            rules,
            ..Self::default()
        }
    }

    /// Registered patterns, most specific first.
    pub fn patterns(&self) -> Vec<&str> {
        self.rules.iter().map(FakeRule::pattern).collect()
    }

    /// The first rule that matches `request`.
    pub fn matching(&self, request: &FakeRequest) -> Option<&FakeRule> {
        self.rules.iter().find(|rule| rule.matches(request))
    }

    pub fn record(&self, request: FakeRequest) {
        self.recorded
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
    }

    /// Every recorded request, in the order it was sent.
    pub fn recorded(&self) -> Vec<FakeRequest> {
        self.log().clone()
    }

    pub fn sent<F>(&self, predicate: F) -> Vec<FakeRequest>
    where
        F: Fn(&FakeRequest) -> bool,
    {
        self.log().iter().filter(|r| predicate(r)).cloned().collect()
    }

    /// Reject unmatched requests unless their URL is allow-listed.
    pub fn prevent_stray_requests(&self) -> &Self {
        self.policy_mut(|policy| policy.prevent = true);
        self
    }

    /// Forward unmatched requests whose URL matches one of `patterns`, even when stray
    /// requests are prevented.
    ///
    /// Every pattern is a URL wildcard: a bare token such as `localhost` is a host, never a
    /// client name.
    ///
    /// # Errors
    ///
    /// [`FakeError::InvalidPattern`](crate::FakeError::InvalidPattern) if a pattern does not
    /// compile; the policy is left unchanged.
    pub fn allow_stray_requests<I, P>(&self, patterns: I) -> Result<&Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        let matchers = patterns
            .into_iter()
            .map(|p| Matcher::url(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        self.policy_mut(|policy| policy.allowed.extend(matchers));
        Ok(self)
    }

    pub fn is_stray_allowed(&self, request: &FakeRequest) -> bool {
        let policy = self.stray.read().unwrap_or_else(PoisonError::into_inner);
        !policy.prevent || policy.allowed.iter().any(|m| m.matches(request))
    }

    /// A template that wraps every transport `base` builds in a fake.
    pub fn template(self: &Arc<Self>, base: Arc<dyn TransportTemplate>) -> FakeTemplate {
        FakeTemplate::new(self.clone(), base)
    }

    /// A factory whose clients all go through this state, falling back to `reqwest`.
    pub fn factory(self: &Arc<Self>, config: FactoryConfig) -> Factory {
        let template = self.template(Arc::new(ReqwestTemplate::new()));
        Factory::with_template(config, Arc::new(template))
    }

    /// Panics unless some recorded request satisfies `predicate`.
    #[track_caller]
    pub fn assert_sent<F>(&self, predicate: F)
    where
        F: Fn(&FakeRequest) -> bool,
    {
        let log = self.log();
        assert!(
            log.iter().any(|r| predicate(r)),
            "expected a matching request to be sent; recorded: {}",
            summary(&log)
        );
    }

    /// Panics if any recorded request satisfies `predicate`.
    #[track_caller]
    pub fn assert_not_sent<F>(&self, predicate: F)
    where
        F: Fn(&FakeRequest) -> bool,
    {
        let log = self.log();
        let hits: Vec<FakeRequest> = log.iter().filter(|r| predicate(r)).cloned().collect();
        assert!(
            hits.is_empty(),
            "unexpected request sent: {}",
            summary(&hits)
        );
    }

    #[track_caller]
    pub fn assert_nothing_sent(&self) {
        let log = self.log();
        assert!(
            log.is_empty(),
            "expected no requests, {} sent: {}",
            log.len(),
            summary(&log)
        );
    }

    #[track_caller]
    pub fn assert_sent_count(&self, expected: usize) {
        let log = self.log();
        assert_eq!(
            log.len(),
            expected,
            "expected {expected} requests, {} sent: {}",
            log.len(),
            summary(&log)
        );
    }

    fn log(&self) -> RwLockReadGuard<'_, Vec<FakeRequest>> {
        self.recorded.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn policy_mut(&self, f: impl FnOnce(&mut StrayPolicy)) {
        f(&mut self.stray.write().unwrap_or_else(PoisonError::into_inner));
    }
}

fn summary(requests: &[FakeRequest]) -> String {
    if requests.is_empty() {
        return "[]".to_string();
    }
    let lines: Vec<String> = requests
        .iter()
        .map(|r| format!("{} {}", r.method(), r.url()))
        .collect();
    format!("[{}]", lines.join(", "))
}
