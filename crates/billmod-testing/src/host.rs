use billmod_client::{HostClient, Response};
use billmod_types::{Document, Error, Result};
use std::sync::{Arc, Mutex};

enum Outcome {
    Respond(String),
    Fail(Error),
    FailTimes(Error, usize),
}

struct Rule {
    prefix: String,
    outcome: Outcome,
}

/// A panel transport with scripted per-query outcomes.
///
/// Rules match on a query prefix (usually `func=...`), first match wins;
/// unmatched queries succeed with an empty document. Every query is recorded
/// so tests can assert on the exact traffic. Clones share the script and the
/// recording, so a test keeps one handle while the context owns another.
#[derive(Clone, Default)]
pub struct ScriptedHost {
    queries: Arc<Mutex<Vec<String>>>,
    rules: Arc<Mutex<Vec<Rule>>>,
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer matching queries with the given document.
    pub fn respond(self, prefix: &str, xml: &str) -> Self {
        self.push(prefix, Outcome::Respond(xml.to_string()));
        self
    }

    /// Fail matching queries with the given error, forever.
    pub fn fail(self, prefix: &str, error: Error) -> Self {
        self.push(prefix, Outcome::Fail(error));
        self
    }

    /// Fail the first `times` matching queries, then succeed.
    pub fn fail_times(self, prefix: &str, error: Error, times: usize) -> Self {
        self.push(prefix, Outcome::FailTimes(error, times));
        self
    }

    fn push(&self, prefix: &str, outcome: Outcome) {
        self.rules.lock().unwrap().push(Rule {
            prefix: prefix.to_string(),
            outcome,
        });
    }

    /// Everything queried so far.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    /// Drain the recording, so a test can assert per phase.
    pub fn take_queries(&self) -> Vec<String> {
        std::mem::take(&mut *self.queries.lock().unwrap())
    }

    pub fn queried(&self, prefix: &str) -> bool {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .any(|q| q.starts_with(prefix))
    }
}

/// The refused-connection error the retry layer reacts to.
pub fn connection_refused(endpoint: &str) -> Error {
    Error::with_value("client", "open", endpoint)
}

impl HostClient for ScriptedHost {
    fn query(&self, raw: &str) -> Result<Response> {
        self.queries.lock().unwrap().push(raw.to_string());
        let mut rules = self.rules.lock().unwrap();
        for rule in rules.iter_mut() {
            if !raw.starts_with(&rule.prefix) {
                continue;
            }
            return match &mut rule.outcome {
                Outcome::Respond(xml) => Ok(Response::with_doc(Document::parse(xml)?)),
                Outcome::Fail(error) => Err(error.clone()),
                Outcome::FailTimes(error, times) => {
                    if *times > 0 {
                        *times -= 1;
                        Err(error.clone())
                    } else {
                        Ok(Response::ok())
                    }
                }
            };
        }
        Ok(Response::ok())
    }
}
