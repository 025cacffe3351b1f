//! Status polling for the `--wait` option.
//!
//! Operations against the orchestrator are asynchronous: the server accepts the
//! request and returns an operation or resource id while provisioning proceeds
//! in the background. This module turns that into a synchronous, bounded-time
//! call: it polls the status endpoint, reports `detailed-status` transitions on
//! stderr, and returns once the operation reaches a terminal state, the time
//! budget runs out, or the server answers with something fatal.
//!
//! The transport is injected through [`StatusFetcher`] so the loop itself has
//! no network dependency and is fully unit-testable.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde_json::Value;

use crate::error::{ClientError, ClientResult};

// One constant per entity, to allow customizing each timeout in the future.
pub const TIMEOUT_GENERIC_OPERATION: u64 = 600;
pub const TIMEOUT_NSI_OPERATION: u64 = TIMEOUT_GENERIC_OPERATION;
pub const TIMEOUT_SDNC_OPERATION: u64 = TIMEOUT_GENERIC_OPERATION;
pub const TIMEOUT_VIM_OPERATION: u64 = TIMEOUT_GENERIC_OPERATION;
pub const TIMEOUT_WIM_OPERATION: u64 = TIMEOUT_GENERIC_OPERATION;
pub const TIMEOUT_NS_OPERATION: u64 = 3600;

/// Seconds between two poll cycles.
pub const POLLING_TIME_INTERVAL: u64 = 1;

/// How many `ERROR` observations a deletion tolerates before the state is
/// trusted as terminal. A resource that was already in `ERROR` before the
/// delete was requested may keep reporting `ERROR` transiently while the
/// deletion actually proceeds.
pub const MAX_DELETE_ATTEMPTS: i64 = 3;

/// HTTP status codes accepted from the status endpoint.
const ACCEPTED_HTTP_CODES: [u16; 4] = [200, 201, 202, 204];

/// The resource type being awaited.
///
/// Decides which JSON member holds the operational state and which values of
/// it are terminal:
/// - `NS`/`NSI`: root member `operationState`, one of `PROCESSING`,
///   `COMPLETED`, `PARTIALLY_COMPLETED`, `FAILED_TEMP`, `FAILED`,
///   `ROLLING_BACK`, `ROLLED_BACK`.
/// - other kinds: `_admin.operationalState`, one of `ENABLED`, `DISABLED`,
///   `ERROR`, `PROCESSING`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    Ns,
    Nsi,
    Sdnc,
    Vim,
    Wim,
}

impl EntityKind {
    /// Terminal values of the operational state, success and failure conflated.
    ///
    /// The loop only needs to know when to stop; whether the outcome was a
    /// success is for the caller to read off the final payload.
    pub fn finished_states(self) -> &'static [&'static str] {
        if self.uses_operation_state() {
            &["COMPLETED", "PARTIALLY_COMPLETED", "FAILED_TEMP", "FAILED"]
        } else {
            &["ENABLED", "ERROR"]
        }
    }

    /// Default wait budget in seconds for operations on this entity.
    pub fn default_timeout(self) -> u64 {
        match self {
            Self::Ns => TIMEOUT_NS_OPERATION,
            Self::Nsi => TIMEOUT_NSI_OPERATION,
            Self::Sdnc => TIMEOUT_SDNC_OPERATION,
            Self::Vim => TIMEOUT_VIM_OPERATION,
            Self::Wim => TIMEOUT_WIM_OPERATION,
        }
    }

    /// Extract the operational state string from a status payload, or `None`
    /// when the member (or its parent object) is missing.
    pub fn operational_state(self, resp: &Value) -> Option<&str> {
        if self.uses_operation_state() {
            resp.get("operationState")?.as_str()
        } else {
            resp.get("_admin")?.get("operationalState")?.as_str()
        }
    }

    /// Extract `detailed-status` from a status payload. `deleted` overrides
    /// the payload once a deletion has been confirmed via 404.
    pub fn detailed_status(self, resp: &Value, deleted: Option<&str>) -> Option<String> {
        if let Some(status) = deleted {
            return Some(status.to_string());
        }
        let member = if self.uses_operation_state() {
            resp.get("detailed-status")
        } else {
            resp.get("_admin").and_then(|admin| admin.get("detailed-status"))
        };
        member.and_then(Value::as_str).map(str::to_string)
    }

    fn uses_operation_state(self) -> bool {
        matches!(self, Self::Ns | Self::Nsi)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Ns => "NS",
            Self::Nsi => "NSI",
            Self::Sdnc => "SDNC",
            Self::Vim => "VIM",
            Self::Wim => "WIM",
        };
        f.write_str(label)
    }
}

/// Classification of a single status payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// Operational state is terminal for this kind.
    Finished,
    /// Operational state present but not terminal.
    Pending,
    /// Payload empty, or the state member is missing.
    Malformed,
}

/// Classify one status payload for the given entity kind.
pub fn classify(resp: &Value, kind: EntityKind) -> PollOutcome {
    match kind.operational_state(resp) {
        None => PollOutcome::Malformed,
        Some(state) if kind.finished_states().contains(&state) => PollOutcome::Finished,
        Some(_) => PollOutcome::Pending,
    }
}

/// True when a deletion in flight observed an `ERROR` state with retry budget
/// remaining. The loop absorbs these by polling again instead of finishing.
fn has_delete_error(
    resp: &Value,
    kind: EntityKind,
    delete_flag: bool,
    delete_attempts_left: i64,
) -> bool {
    delete_flag
        && delete_attempts_left > 0
        && kind.operational_state(resp) == Some("ERROR")
}

/// One HTTP GET against a status path: status code plus raw body.
///
/// Implementations must not retry or interpret the body; they are pure
/// transport. The concrete implementation in this crate is
/// [`HttpClient`](crate::http::HttpClient).
#[async_trait]
pub trait StatusFetcher: Send + Sync {
    async fn fetch_status(&self, path: &str) -> ClientResult<(u16, Option<String>)>;
}

/// Receives each changed `detailed-status` value during a wait session.
pub trait ProgressSink: Send {
    fn report(&mut self, detailed_status: &str);
}

/// Default sink: one `detailed-status: <value>` line per transition on stderr.
#[derive(Debug, Default)]
pub struct StderrProgress;

impl ProgressSink for StderrProgress {
    fn report(&mut self, detailed_status: &str) {
        eprintln!("detailed-status: {detailed_status}");
    }
}

/// Poll the status endpoint until the operation reaches a terminal state.
///
/// `entity_id` is the operation id for create/scale/action waits, and the
/// resource id the triggering delete returned for delete waits. Each cycle
/// fetches `{api_url_status}/{entity_id}`, classifies the payload, reports
/// `detailed-status` transitions, then sleeps [`POLLING_TIME_INTERVAL`]
/// seconds against a budget of `timeout` seconds.
///
/// Returning `Ok(())` means a terminal state was reached; except for the
/// delete-via-404 case the caller must inspect the final payload itself to
/// distinguish success from failure. Every error is wrapped once with the
/// entity label before propagating.
pub async fn wait_for_status(
    kind: EntityKind,
    entity_id: &str,
    timeout: u64,
    api_url_status: &str,
    fetcher: &dyn StatusFetcher,
    delete_flag: bool,
) -> ClientResult<()> {
    let mut progress = StderrProgress;
    wait_for_status_with(
        kind,
        entity_id,
        timeout,
        api_url_status,
        fetcher,
        delete_flag,
        &mut progress,
    )
    .await
}

/// [`wait_for_status`] with an explicit progress sink.
pub async fn wait_for_status_with(
    kind: EntityKind,
    entity_id: &str,
    timeout: u64,
    api_url_status: &str,
    fetcher: &dyn StatusFetcher,
    delete_flag: bool,
    progress: &mut dyn ProgressSink,
) -> ClientResult<()> {
    run_session(
        kind,
        entity_id,
        timeout,
        api_url_status,
        fetcher,
        delete_flag,
        progress,
    )
    .await
    .map_err(|err| ClientError::OperationFailed {
        entity: kind.to_string(),
        message: err.to_string(),
    })
}

async fn run_session(
    kind: EntityKind,
    entity_id: &str,
    timeout: u64,
    api_url_status: &str,
    fetcher: &dyn StatusFetcher,
    delete_flag: bool,
    progress: &mut dyn ProgressSink,
) -> ClientResult<()> {
    let mut time_left = i64::try_from(timeout).unwrap_or(i64::MAX);
    let mut detailed_status: Option<String> = None;
    let mut detailed_status_deleted: Option<String> = None;
    let mut time_to_return = false;
    let mut delete_attempts_left = MAX_DELETE_ATTEMPTS;

    loop {
        let path = format!("{api_url_status}/{entity_id}");
        let (http_code, body) = fetcher.fetch_status(&path).await?;
        debug!("GET {path} -> {http_code}");

        if delete_flag && http_code == 404 {
            // '404 Not Found' on a deletion means successfully deleted.
            time_to_return = true;
            detailed_status_deleted = Some("Deleted".to_string());
        } else if !ACCEPTED_HTTP_CODES.contains(&http_code) {
            // Protocol failures surface the body verbatim; it is frequently
            // not JSON at all.
            return Err(ClientError::Server(body.unwrap_or_default()));
        }

        // Decode only when the payload will be read: the 404 delete path
        // already knows its outcome and its body need not be JSON.
        let resp = if time_to_return {
            Value::Null
        } else {
            match body {
                Some(ref text) if !text.is_empty() => serde_json::from_str::<Value>(text)?,
                _ => Value::Null,
            }
        };

        if !time_to_return {
            match classify(&resp, kind) {
                PollOutcome::Malformed => {
                    return Err(ClientError::UnexpectedResponse(resp.to_string()));
                }
                PollOutcome::Finished => {
                    // A deletion that observes ERROR may be looking at the
                    // state the resource was already in before the delete was
                    // requested. Keep watching, budget permitting; only once
                    // at least one such cycle has happened is a finished state
                    // trusted as the deletion's own terminal state.
                    if has_delete_error(&resp, kind, delete_flag, delete_attempts_left) {
                        delete_attempts_left -= 1;
                    } else if delete_flag {
                        if delete_attempts_left < MAX_DELETE_ATTEMPTS {
                            time_to_return = true;
                        }
                        delete_attempts_left -= 1;
                    } else {
                        time_to_return = true;
                    }
                }
                PollOutcome::Pending => {}
            }
        }

        let new_detailed_status = kind
            .detailed_status(&resp, detailed_status_deleted.as_deref())
            .filter(|status| !status.is_empty())
            .unwrap_or_else(|| "In progress".to_string());
        if detailed_status.as_deref() != Some(new_detailed_status.as_str()) {
            progress.report(&new_detailed_status);
            detailed_status = Some(new_detailed_status);
        }

        if time_to_return {
            return Ok(());
        }

        time_left -= i64::try_from(POLLING_TIME_INTERVAL).unwrap_or(i64::MAX);
        tokio::time::sleep(Duration::from_secs(POLLING_TIME_INTERVAL)).await;
        if time_left <= 0 {
            return Err(ClientError::Timeout(timeout));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays a fixed script of `(http_code, body)` responses; the last entry
    /// repeats once the script is exhausted.
    struct ScriptedFetcher {
        script: Vec<(u16, Option<String>)>,
        calls: AtomicUsize,
        paths: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        fn new(script: Vec<(u16, Option<String>)>) -> Self {
            assert!(!script.is_empty());
            Self {
                script,
                calls: AtomicUsize::new(0),
                paths: Mutex::new(Vec::new()),
            }
        }

        fn repeating(http_code: u16, body: &Value) -> Self {
            Self::new(vec![(http_code, Some(body.to_string()))])
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StatusFetcher for ScriptedFetcher {
        async fn fetch_status(&self, path: &str) -> ClientResult<(u16, Option<String>)> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.paths
                .lock()
                .expect("paths lock")
                .push(path.to_string());
            let idx = n.min(self.script.len() - 1);
            Ok(self.script[idx].clone())
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        reports: Vec<String>,
    }

    impl ProgressSink for RecordingProgress {
        fn report(&mut self, detailed_status: &str) {
            self.reports.push(detailed_status.to_string());
        }
    }

    fn admin_payload(state: &str) -> Value {
        json!({ "_admin": { "operationalState": state, "detailed-status": "working" } })
    }

    fn ns_payload(state: &str, detail: &str) -> Value {
        json!({ "operationState": state, "detailed-status": detail })
    }

    fn ok(body: &Value) -> (u16, Option<String>) {
        (200, Some(body.to_string()))
    }

    #[test]
    fn classify_admin_kinds_finished_on_enabled_and_error() {
        for kind in [EntityKind::Vim, EntityKind::Wim, EntityKind::Sdnc] {
            assert_eq!(classify(&admin_payload("ENABLED"), kind), PollOutcome::Finished);
            assert_eq!(classify(&admin_payload("ERROR"), kind), PollOutcome::Finished);
            assert_eq!(classify(&admin_payload("DISABLED"), kind), PollOutcome::Pending);
            assert_eq!(classify(&admin_payload("PROCESSING"), kind), PollOutcome::Pending);
            assert_eq!(classify(&json!({}), kind), PollOutcome::Malformed);
            assert_eq!(classify(&json!({ "_admin": {} }), kind), PollOutcome::Malformed);
            assert_eq!(classify(&Value::Null, kind), PollOutcome::Malformed);
        }
    }

    #[test]
    fn classify_ns_and_nsi_use_root_operation_state() {
        for kind in [EntityKind::Ns, EntityKind::Nsi] {
            for state in ["COMPLETED", "PARTIALLY_COMPLETED", "FAILED_TEMP", "FAILED"] {
                assert_eq!(classify(&ns_payload(state, ""), kind), PollOutcome::Finished);
            }
            for state in ["PROCESSING", "ROLLING_BACK", "ROLLED_BACK"] {
                assert_eq!(classify(&ns_payload(state, ""), kind), PollOutcome::Pending);
            }
            assert_eq!(classify(&json!({}), kind), PollOutcome::Malformed);
            // _admin.operationalState is not where NS state lives
            assert_eq!(classify(&admin_payload("ENABLED"), kind), PollOutcome::Malformed);
        }
    }

    #[test]
    fn detailed_status_override_wins_over_payload() {
        let payload = ns_payload("PROCESSING", "deploying charms");
        assert_eq!(
            EntityKind::Ns.detailed_status(&payload, Some("Deleted")),
            Some("Deleted".to_string())
        );
        assert_eq!(
            EntityKind::Ns.detailed_status(&payload, None),
            Some("deploying charms".to_string())
        );
        assert_eq!(EntityKind::Vim.detailed_status(&json!({}), None), None);
    }

    #[tokio::test(start_paused = true)]
    async fn finishes_on_terminal_state() {
        let fetcher = ScriptedFetcher::new(vec![
            ok(&ns_payload("PROCESSING", "instantiating")),
            ok(&ns_payload("COMPLETED", "done")),
        ]);
        let mut progress = RecordingProgress::default();
        wait_for_status_with(
            EntityKind::Ns,
            "op-1",
            60,
            "/nslcm/v1/ns_lcm_op_occs",
            &fetcher,
            false,
            &mut progress,
        )
        .await
        .expect("wait should succeed");
        assert_eq!(fetcher.calls(), 2);
        assert_eq!(progress.reports, vec!["instantiating", "done"]);
        assert_eq!(
            fetcher.paths.lock().expect("paths lock")[0],
            "/nslcm/v1/ns_lcm_op_occs/op-1"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn identical_detailed_status_reported_once() {
        let fetcher = ScriptedFetcher::new(vec![
            ok(&ns_payload("PROCESSING", "deploying")),
            ok(&ns_payload("PROCESSING", "deploying")),
            ok(&ns_payload("COMPLETED", "deploying")),
        ]);
        let mut progress = RecordingProgress::default();
        wait_for_status_with(
            EntityKind::Ns,
            "op-1",
            60,
            "/nslcm/v1/ns_lcm_op_occs",
            &fetcher,
            false,
            &mut progress,
        )
        .await
        .expect("wait should succeed");
        assert_eq!(progress.reports, vec!["deploying"]);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_detailed_status_reports_in_progress() {
        let fetcher = ScriptedFetcher::new(vec![
            ok(&json!({ "operationState": "PROCESSING" })),
            ok(&json!({ "operationState": "COMPLETED" })),
        ]);
        let mut progress = RecordingProgress::default();
        wait_for_status_with(
            EntityKind::Ns,
            "op-1",
            60,
            "/nslcm/v1/ns_lcm_op_occs",
            &fetcher,
            false,
            &mut progress,
        )
        .await
        .expect("wait should succeed");
        assert_eq!(progress.reports, vec!["In progress"]);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_404_short_circuits_with_deleted_status() {
        let fetcher = ScriptedFetcher::new(vec![(404, None)]);
        let mut progress = RecordingProgress::default();
        let before = tokio::time::Instant::now();
        wait_for_status_with(
            EntityKind::Ns,
            "ns-1",
            60,
            "/nslcm/v1/ns_lcm_op_occs",
            &fetcher,
            true,
            &mut progress,
        )
        .await
        .expect("404 on delete is success");
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(progress.reports, vec!["Deleted"]);
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_404_with_non_json_body_still_succeeds() {
        // Gateways tend to answer 404 with HTML or plain text; the outcome is
        // already decided, so the body must not go through the JSON decoder.
        let fetcher = ScriptedFetcher::new(vec![(404, Some("<html>Not Found</html>".to_string()))]);
        let mut progress = RecordingProgress::default();
        wait_for_status_with(
            EntityKind::Ns,
            "ns-1",
            60,
            "/nslcm/v1/ns_lcm_op_occs",
            &fetcher,
            true,
            &mut progress,
        )
        .await
        .expect("404 on delete is success regardless of body shape");
        assert_eq!(progress.reports, vec!["Deleted"]);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_retries_absorb_error_state_then_finish() {
        // ERROR forever: three absorbed retries, then the state is trusted.
        let fetcher = ScriptedFetcher::repeating(
            200,
            &json!({ "_admin": { "operationalState": "ERROR", "detailed-status": "broken" } }),
        );
        let mut progress = RecordingProgress::default();
        wait_for_status_with(
            EntityKind::Vim,
            "vim-1",
            600,
            "/admin/v1/vim_accounts",
            &fetcher,
            true,
            &mut progress,
        )
        .await
        .expect("exhausted delete retries still terminate the session");
        assert_eq!(fetcher.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_without_error_confirms_on_second_finished_poll() {
        let fetcher = ScriptedFetcher::repeating(200, &admin_payload("ENABLED"));
        let mut progress = RecordingProgress::default();
        wait_for_status_with(
            EntityKind::Vim,
            "vim-1",
            600,
            "/admin/v1/vim_accounts",
            &fetcher,
            true,
            &mut progress,
        )
        .await
        .expect("wait should succeed");
        // First finished poll only burns one delete attempt; the second returns.
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_exactly_budget_cycles() {
        let fetcher = ScriptedFetcher::repeating(200, &ns_payload("PROCESSING", "deploying"));
        let mut progress = RecordingProgress::default();
        let err = wait_for_status_with(
            EntityKind::Ns,
            "op-1",
            2,
            "/nslcm/v1/ns_lcm_op_occs",
            &fetcher,
            false,
            &mut progress,
        )
        .await
        .expect_err("must time out");
        assert_eq!(fetcher.calls(), 2);
        assert!(err.to_string().contains("operation timeout, waited for 2 seconds"));
    }

    #[tokio::test(start_paused = true)]
    async fn protocol_error_fails_immediately_with_body() {
        let fetcher = ScriptedFetcher::new(vec![(500, Some("internal error".to_string()))]);
        let mut progress = RecordingProgress::default();
        let before = tokio::time::Instant::now();
        let err = wait_for_status_with(
            EntityKind::Ns,
            "op-1",
            60,
            "/nslcm/v1/ns_lcm_op_occs",
            &fetcher,
            false,
            &mut progress,
        )
        .await
        .expect_err("500 is fatal");
        assert_eq!(fetcher.calls(), 1);
        assert!(err.to_string().contains("internal error"));
        assert_eq!(before.elapsed(), Duration::ZERO);
        assert!(progress.reports.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_payload_fails_with_unexpected_response() {
        let fetcher = ScriptedFetcher::new(vec![(200, Some("{}".to_string()))]);
        let mut progress = RecordingProgress::default();
        let err = wait_for_status_with(
            EntityKind::Ns,
            "op-1",
            60,
            "/nslcm/v1/ns_lcm_op_occs",
            &fetcher,
            false,
            &mut progress,
        )
        .await
        .expect_err("payload without operationState is fatal");
        let message = err.to_string();
        assert!(message.contains("unexpected response from server"));
        assert!(message.contains("{}"));
    }

    #[tokio::test(start_paused = true)]
    async fn errors_carry_the_uniform_entity_wrap() {
        let fetcher = ScriptedFetcher::new(vec![(500, Some("boom".to_string()))]);
        let mut progress = RecordingProgress::default();
        let err = wait_for_status_with(
            EntityKind::Vim,
            "vim-1",
            60,
            "/admin/v1/vim_accounts",
            &fetcher,
            false,
            &mut progress,
        )
        .await
        .expect_err("500 is fatal");
        assert!(err.to_string().starts_with("Operation failed for VIM:\nerror:\n"));
    }

    #[test]
    fn default_timeouts() {
        assert_eq!(EntityKind::Ns.default_timeout(), 3600);
        for kind in [EntityKind::Nsi, EntityKind::Sdnc, EntityKind::Vim, EntityKind::Wim] {
            assert_eq!(kind.default_timeout(), 600);
        }
    }
}
