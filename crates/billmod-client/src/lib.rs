//! Host RPC collaborator.
//!
//! A processing module talks back to the panel core through flat
//! `func=...&name=value` queries. The transport is deployment-specific (the
//! panel normally hands the module a local socket), so this crate only fixes
//! the query encoding, the response shape and the bounded-retry policy for
//! the one failure class worth retrying: the panel briefly refusing local
//! connections while it restarts.

use billmod_types::{Document, Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Panel answer to one query.
#[derive(Debug, Clone)]
pub struct Response {
    pub status_ok: bool,
    pub doc: Document,
}

impl Response {
    /// Bare `<doc/>` success.
    pub fn ok() -> Self {
        Response {
            status_ok: true,
            doc: Document::new(),
        }
    }

    pub fn with_doc(doc: Document) -> Self {
        Response {
            status_ok: true,
            doc,
        }
    }
}

/// One-method seam over the panel transport. Production binaries plug in the
/// deployment's local client; tests use a scripted implementation.
pub trait HostClient {
    fn query(&self, raw: &str) -> Result<Response>;
}

/// Flat query string: `func=<name>&k=<urlencoded v>&...`.
pub fn build_query(func: &str, params: &[(&str, &str)]) -> String {
    let mut out = format!("func={}", func);
    for (name, value) in params {
        out.push('&');
        out.push_str(name);
        out.push('=');
        out.push_str(&urlencoding::encode(value));
    }
    out
}

/// When and how long to retry the connection-refused class.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Endpoint name the refused-connection error carries in its value.
    pub endpoint: String,
    /// Wall-clock budget for the whole retry loop.
    pub timeout: Duration,
    /// Pause between attempts.
    pub delay: Duration,
    /// Cooperative shutdown flag; a raised flag stops retrying.
    pub shutdown: Option<Arc<AtomicBool>>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            endpoint: "panel".to_string(),
            timeout: Duration::from_secs(86_400),
            delay: Duration::from_secs(1),
            shutdown: None,
        }
    }
}

impl RetryPolicy {
    fn shutting_down(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

/// Run a query, retrying only while the panel refuses local connections.
///
/// Any other error propagates immediately. The retriable class is exactly
/// kind `client`, object `open`, value equal to the policy's endpoint name.
pub fn query_safe(host: &dyn HostClient, raw: &str, policy: &RetryPolicy) -> Result<Response> {
    let start = Instant::now();
    let mut attempt = 1u32;
    loop {
        debug!(query = raw, attempt, "host query");
        match host.query(raw) {
            Ok(response) => return Ok(response),
            Err(err) => {
                let refused = err.kind() == "client"
                    && err.object() == "open"
                    && err.value() == policy.endpoint;
                if !refused || policy.shutting_down() || start.elapsed() >= policy.timeout {
                    return Err(err);
                }
                attempt += 1;
                warn!(
                    endpoint = %policy.endpoint,
                    attempt,
                    "could not establish a local connection, repeating"
                );
                std::thread::sleep(policy.delay);
            }
        }
    }
}

/// Owned convenience wrapper around [`query_safe`].
pub struct SafeClient {
    inner: Box<dyn HostClient>,
    policy: RetryPolicy,
}

impl SafeClient {
    pub fn new(inner: Box<dyn HostClient>, policy: RetryPolicy) -> Self {
        SafeClient { inner, policy }
    }

    pub fn query(&self, raw: &str) -> Result<Response> {
        query_safe(self.inner.as_ref(), raw, &self.policy)
    }
}

/// Transport stub for binaries run outside a panel: every query fails with
/// the connection-refused class.
pub struct NullHost {
    endpoint: String,
}

impl NullHost {
    pub fn new(endpoint: impl Into<String>) -> Self {
        NullHost {
            endpoint: endpoint.into(),
        }
    }
}

impl HostClient for NullHost {
    fn query(&self, _raw: &str) -> Result<Response> {
        Err(Error::with_value("client", "open", &self.endpoint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct FlakyHost {
        failures: Cell<u32>,
    }

    impl HostClient for FlakyHost {
        fn query(&self, _raw: &str) -> Result<Response> {
            if self.failures.get() > 0 {
                self.failures.set(self.failures.get() - 1);
                Err(Error::with_value("client", "open", "panel"))
            } else {
                Ok(Response::ok())
            }
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            delay: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn build_query_encodes_values() {
        let query = build_query(
            "service.saveparam",
            &[("elid", "42"), ("name", "cert"), ("value", "a b&c")],
        );
        assert_eq!(
            query,
            "func=service.saveparam&elid=42&name=cert&value=a%20b%26c"
        );
    }

    #[test]
    fn build_query_without_params() {
        assert_eq!(build_query("runningoperation.reset", &[]), "func=runningoperation.reset");
    }

    #[test]
    fn safe_query_retries_connection_refused() {
        let host = FlakyHost {
            failures: Cell::new(2),
        };
        let response = query_safe(&host, "func=x", &fast_policy()).unwrap();
        assert!(response.status_ok);
        assert_eq!(host.failures.get(), 0);
    }

    #[test]
    fn safe_query_propagates_other_errors() {
        struct BrokenHost;
        impl HostClient for BrokenHost {
            fn query(&self, _raw: &str) -> Result<Response> {
                Err(Error::missed("item"))
            }
        }
        let err = query_safe(&BrokenHost, "func=x", &fast_policy()).unwrap_err();
        assert_eq!(err.kind(), "missed");
    }

    #[test]
    fn safe_query_stops_on_shutdown_flag() {
        let flag = Arc::new(AtomicBool::new(true));
        let policy = RetryPolicy {
            shutdown: Some(flag),
            ..fast_policy()
        };
        let host = FlakyHost {
            failures: Cell::new(100),
        };
        let err = query_safe(&host, "func=x", &policy).unwrap_err();
        assert_eq!(err.kind(), "client");
        // only the first attempt ran
        assert_eq!(host.failures.get(), 99);
    }

    #[test]
    fn safe_query_respects_wall_clock_budget() {
        let policy = RetryPolicy {
            timeout: Duration::from_millis(0),
            ..fast_policy()
        };
        let host = FlakyHost {
            failures: Cell::new(100),
        };
        assert!(query_safe(&host, "func=x", &policy).is_err());
    }

    #[test]
    fn null_host_always_refuses() {
        let host = NullHost::new("panel");
        let err = host.query("func=x").unwrap_err();
        assert_eq!(
            (err.kind(), err.object(), err.value()),
            ("client", "open", "panel")
        );
    }
}
