//! Diagnostic trace
//!
//! An append-only, ordered record of what a provisioning run did, plus at
//! most one terminal failure record. The history survives a failed run so a
//! caller can see exactly how far provisioning progressed.

use chrono::{DateTime, Utc};
use dirprov_core::types::TerminalError;
use std::fmt;
use tracing::debug;

/// Returned by [`DiagnosticTrace::render`] when no failure was recorded
pub const NO_ERROR_RECORDED: &str = "No error recorded.";

/// Component name of the provisioning workflow's trace
pub const WORKFLOW_COMPONENT: &str = "ProvisioningWorkflow";

/// One step of a trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub message: String,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone)]
pub struct DiagnosticTrace {
    component: String,
    entries: Vec<TraceEntry>,
    terminal: Option<TerminalError>,
}

impl DiagnosticTrace {
    /// Empty trace for `component`, the name shown in rendered failures
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            entries: Vec::new(),
            terminal: None,
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn append(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!(component = %self.component, "{}", message);
        self.entries.push(TraceEntry {
            seq: self.entries.len() as u64,
            at: Utc::now(),
            message,
        });
    }

    /// Record the terminal failure. A later call replaces the record but
    /// never touches the appended history.
    pub fn fail(&mut self, operation: impl Into<String>, cause: impl fmt::Display) {
        let record = TerminalError {
            operation: operation.into(),
            cause: cause.to_string(),
        };
        debug!(component = %self.component, operation = %record.operation, cause = %record.cause, "Terminal failure recorded");
        self.terminal = Some(record);
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.message.clone()).collect()
    }

    pub fn terminal(&self) -> Option<&TerminalError> {
        self.terminal.as_ref()
    }

    pub fn has_failed(&self) -> bool {
        self.terminal.is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Failure report naming the failed operation, its cause and the full
    /// ordered history. Returns [`NO_ERROR_RECORDED`] before any failure.
    pub fn render(&self) -> String {
        render_failure(
            &self.component,
            self.terminal.as_ref(),
            self.entries.iter().map(|e| e.message.as_str()),
        )
    }
}

/// Render a failure report from its parts, as kept in a
/// [`ProvisioningReport`](dirprov_core::types::ProvisioningReport)
pub fn render_failure<'a>(
    component: &str,
    terminal: Option<&TerminalError>,
    steps: impl IntoIterator<Item = &'a str>,
) -> String {
    let Some(terminal) = terminal else {
        return NO_ERROR_RECORDED.to_string();
    };

    let mut out = format!(
        "ERROR AT {} - {}:\nError Message: {}\nSTACK TRACE:\n",
        component, terminal.operation, terminal.cause
    );
    for step in steps {
        out.push_str(step);
        out.push('\n');
    }
    out
}

impl Default for DiagnosticTrace {
    fn default() -> Self {
        Self::new(WORKFLOW_COMPONENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_without_failure() {
        let mut trace = DiagnosticTrace::new("Provisioner");
        trace.append("Connecting to directory");
        assert_eq!(trace.render(), NO_ERROR_RECORDED);
        assert!(!trace.has_failed());
    }

    #[test]
    fn test_render_with_history() {
        let mut trace = DiagnosticTrace::new("Provisioner");
        trace.append("Connecting to directory: ldap://corp.com");
        trace.append("Setting Profile Path to: MyPath");
        trace.fail("apply_profile", "no such attribute");

        assert_eq!(
            trace.render(),
            "ERROR AT Provisioner - apply_profile:\n\
             Error Message: no such attribute\n\
             STACK TRACE:\n\
             Connecting to directory: ldap://corp.com\n\
             Setting Profile Path to: MyPath\n"
        );
    }

    #[test]
    fn test_render_failure_from_report_parts() {
        let mut trace = DiagnosticTrace::new("Provisioner");
        trace.append("Connecting to directory");
        trace.fail("Connect", "invalid credentials");

        let steps = trace.messages();
        assert_eq!(
            render_failure("Provisioner", trace.terminal(), steps.iter().map(String::as_str)),
            trace.render()
        );
        assert_eq!(render_failure("Provisioner", None, ["x"]), NO_ERROR_RECORDED);
    }

    #[test]
    fn test_fail_last_write_wins_and_keeps_history() {
        let mut trace = DiagnosticTrace::default();
        trace.append("one");
        trace.fail("first", "a");
        trace.append("two");
        trace.fail("second", "b");

        let terminal = trace.terminal().unwrap();
        assert_eq!(terminal.operation, "second");
        assert_eq!(terminal.cause, "b");
        assert_eq!(trace.messages(), vec!["one", "two"]);
    }

    #[test]
    fn test_entries_are_ordered() {
        let mut trace = DiagnosticTrace::default();
        for i in 0..5 {
            trace.append(format!("step {i}"));
        }
        let entries = trace.entries();
        assert!(entries.windows(2).all(|w| w[0].seq < w[1].seq && w[0].at <= w[1].at));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn failures_never_rewrite_history(
                steps in proptest::collection::vec(("[a-z ]{1,12}", any::<bool>()), 0..32)
            ) {
                let mut trace = DiagnosticTrace::default();
                let mut expected = Vec::new();
                let mut last_failure = None;

                for (i, (message, fail)) in steps.iter().enumerate() {
                    trace.append(message.clone());
                    expected.push(message.clone());
                    if *fail {
                        trace.fail(format!("op{i}"), message);
                        last_failure = Some(format!("op{i}"));
                    }
                }

                prop_assert_eq!(trace.messages(), expected);
                prop_assert_eq!(trace.terminal().map(|t| t.operation.clone()), last_failure);
            }
        }
    }
}
