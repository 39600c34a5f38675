/// Wire-shape tests for `StreamEvent`: the browser client keys off these
/// exact field names.
#[cfg(test)]
mod wire {
    use crate::types::{humanize_duration, StreamEvent};
    use std::time::Duration;

    fn to_json(event: &StreamEvent) -> serde_json::Value {
        serde_json::to_value(event).expect("failed to serialize event")
    }

    #[test]
    fn status_has_type_message_and_iso_timestamp() {
        let json = to_json(&StreamEvent::status("Connecting to Claude CLI..."));
        assert_eq!(json["type"], "status");
        assert_eq!(json["message"], "Connecting to Claude CLI...");
        let ts = json["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[test]
    fn content_carries_chunk_and_numeric_progress() {
        let json = to_json(&StreamEvent::content("abc", 40));
        assert_eq!(json["type"], "content");
        assert_eq!(json["chunk"], "abc");
        assert_eq!(json["progress"], 40);
    }

    #[test]
    fn error_uses_error_field() {
        let json = to_json(&StreamEvent::error("Process failed"));
        assert_eq!(json["type"], "error");
        assert_eq!(json["error"], "Process failed");
        assert!(json.get("message").is_none());
    }

    #[test]
    fn complete_reports_seconds_rounded_to_tenths() {
        let event = StreamEvent::complete(Duration::from_millis(12_345), Duration::from_millis(13_049));
        let json = to_json(&event);
        assert_eq!(json["type"], "complete");
        assert_eq!(json["success"], true);
        assert_eq!(json["generation_time"], 12.3);
        assert_eq!(json["total_time"], 13.0);
    }

    #[test]
    fn heartbeat_parses_back() {
        let json = r#"{"type":"heartbeat","message":"Processing... (10s)","timestamp":"2026-10-19T09:00:00Z"}"#;
        let event: StreamEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind(), "heartbeat");
        assert!(!event.is_terminal());
    }

    #[test]
    fn only_complete_and_error_are_terminal() {
        assert!(!StreamEvent::status("s").is_terminal());
        assert!(!StreamEvent::content("c", 1).is_terminal());
        assert!(!StreamEvent::heartbeat("h").is_terminal());
        assert!(StreamEvent::error("e").is_terminal());
        assert!(StreamEvent::complete(Duration::ZERO, Duration::ZERO).is_terminal());
    }

    #[test]
    fn durations_render_for_humans() {
        assert_eq!(humanize_duration(&Duration::from_secs(300)), "5 minutes");
        assert_eq!(humanize_duration(&Duration::from_secs(60)), "1 minute");
        assert_eq!(humanize_duration(&Duration::from_secs(90)), "90s");
        assert_eq!(humanize_duration(&Duration::from_millis(1500)), "1.5s");
    }
}

/// End-to-end runs of a `GenerationSession` against `sh -c` stand-ins for
/// the Claude CLI.
#[cfg(test)]
mod session {
    use crate::types::StreamEvent;
    use crate::{generate, GenerateOptions, RelaySettings};
    use futures::StreamExt;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    const REPORT_100: &str = "0123456789abcdefghij0123456789abcdefghij0123456789abcdefghij0123456789abcdefghij0123456789abcdefghij";

    fn stub(script: &str) -> GenerateOptions {
        GenerateOptions {
            command: "sh".into(),
            args: vec!["-c".into(), script.into()],
            timeout: Duration::from_secs(10),
            chunk_delay: Duration::ZERO,
            relay: RelaySettings {
                poll_interval: Duration::from_millis(10),
                heartbeat_interval: Duration::from_millis(50),
                idle_timeout: Duration::from_secs(20),
            },
            ..Default::default()
        }
    }

    async fn run(prompt: &str, opts: GenerateOptions) -> Vec<StreamEvent> {
        tokio::time::timeout(Duration::from_secs(30), generate(prompt, opts).collect())
            .await
            .expect("session did not finish")
    }

    fn assert_single_terminal_last(events: &[StreamEvent]) {
        let terminals = events.iter().filter(|e| e.is_terminal()).count();
        assert_eq!(terminals, 1, "expected exactly one terminal event: {events:?}");
        assert!(events.last().unwrap().is_terminal());
    }

    fn without_heartbeats(events: &[StreamEvent]) -> Vec<&StreamEvent> {
        events
            .iter()
            .filter(|e| !matches!(e, StreamEvent::Heartbeat { .. }))
            .collect()
    }

    #[cfg(target_os = "linux")]
    fn is_running(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit_once(") ")
                .is_some_and(|(_, rest)| !rest.starts_with('Z')),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    async fn wait_for_pid(path: &Path) -> u32 {
        for _ in 0..500 {
            if let Ok(s) = std::fs::read_to_string(path) {
                if let Ok(pid) = s.trim().parse() {
                    return pid;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("stub never wrote its pid");
    }

    #[tokio::test]
    async fn hundred_char_report_streams_in_five_chunks() {
        let script = format!("cat > /dev/null; printf '%s' '{REPORT_100}'");
        let events = run("server down at 10:00, fixed at 10:30", stub(&script)).await;
        let events = without_heartbeats(&events);

        let kinds: Vec<&str> = events.iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                "status", "status", "status", "content", "content", "content", "content",
                "content", "complete"
            ]
        );

        let progress: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Content { progress, .. } => Some(*progress),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![20, 40, 60, 80, 100]);

        let joined: String = events.iter().filter_map(|e| e.as_chunk()).collect();
        assert_eq!(joined, REPORT_100);

        let StreamEvent::Status { message, .. } = events[2] else {
            panic!("expected status");
        };
        assert!(message.starts_with("Generated in"));
    }

    #[tokio::test]
    async fn chunks_reassemble_the_exact_output() {
        let prompt = "Line one\n  indented → ünïcödé\n\n🚨 alert at 03:12\ttab\n";
        let events = run(prompt, stub("cat")).await;
        assert_single_terminal_last(&events);

        let joined: String = events.iter().filter_map(|e| e.as_chunk()).collect();
        assert_eq!(joined, prompt);
    }

    #[tokio::test]
    async fn launch_failure_is_a_single_error() {
        let opts = GenerateOptions {
            command: "__postmortem_missing_cli__".into(),
            ..stub("")
        };
        let events = run("notes", opts).await;
        let events = without_heartbeats(&events);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind(), "status");
        assert!(events[1]
            .as_error()
            .unwrap()
            .contains("failed to launch '__postmortem_missing_cli__'"));
    }

    #[tokio::test]
    async fn failing_cli_reports_stderr() {
        let events = run("notes", stub("echo 'rate limited' >&2; exit 1")).await;
        assert_single_terminal_last(&events);
        assert_eq!(events.last().unwrap().as_error(), Some("rate limited"));
        assert!(events.iter().all(|e| e.as_chunk().is_none()));
    }

    #[tokio::test]
    async fn empty_output_is_an_error() {
        let events = run("notes", stub("cat > /dev/null")).await;
        assert_single_terminal_last(&events);
        assert!(events.last().unwrap().as_error().is_some());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn cli_timeout_ends_in_error_and_kills_process() {
        let dir = TempDir::new().unwrap();
        let pid_file = dir.path().join("pid");
        let mut opts = stub(&format!("echo $$ > '{}'; exec sleep 30", pid_file.display()));
        opts.timeout = Duration::from_millis(500);

        let events = run("notes", opts).await;
        assert_single_terminal_last(&events);
        let err = events.last().unwrap().as_error().unwrap();
        assert!(err.contains("timed out"), "unexpected error: {err}");

        let pid = wait_for_pid(&pid_file).await;
        assert!(!is_running(pid), "CLI still running after timeout");
    }

    #[tokio::test]
    async fn relay_idle_ceiling_is_an_independent_backstop() {
        let mut opts = stub("exec sleep 30");
        opts.timeout = Duration::from_secs(60);
        opts.relay.idle_timeout = Duration::from_millis(300);

        let events = run("notes", opts).await;
        assert_single_terminal_last(&events);
        assert!(events
            .last()
            .unwrap()
            .as_error()
            .unwrap()
            .starts_with("Timeout after"));
        assert!(events
            .iter()
            .any(|e| matches!(e, StreamEvent::Heartbeat { .. })));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn dropping_the_session_kills_the_cli() {
        let dir = TempDir::new().unwrap();
        let pid_file = dir.path().join("pid");
        let opts = stub(&format!("echo $$ > '{}'; exec sleep 30", pid_file.display()));

        let mut session = generate("notes", opts);
        let first = session.next().await.unwrap();
        assert_eq!(first.kind(), "status");
        let pid = wait_for_pid(&pid_file).await;
        assert!(is_running(pid));

        drop(session);

        for _ in 0..500 {
            if !is_running(pid) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("CLI {pid} still running after the session was dropped");
    }

    #[tokio::test]
    async fn chunk_delay_paces_content() {
        let mut opts = stub("printf '%s' 'abcdefghij'");
        opts.chunk_size = 2;
        opts.chunk_delay = Duration::from_millis(40);

        let started = std::time::Instant::now();
        let events = run("notes", opts).await;
        assert_single_terminal_last(&events);
        // Five chunks, four gaps.
        assert!(started.elapsed() >= Duration::from_millis(160));
    }
}

/// `GenerateOptions` built from a loaded config.
#[cfg(test)]
mod options {
    use crate::types::GenerateOptions;
    use postmortem_core::Config;
    use std::time::Duration;

    #[test]
    fn options_follow_config() {
        let mut config = Config::default();
        config.generator.command = "/opt/claude".into();
        config.generator.chunk_delay_ms = 0;
        config.generator.env.insert("HTTPS_PROXY".into(), "http://proxy:8080".into());
        config.relay.heartbeat_secs = 15;

        let opts = GenerateOptions::from_config(&config);
        assert_eq!(opts.command, "/opt/claude");
        assert_eq!(opts.args, vec!["--print"]);
        assert_eq!(opts.timeout, Duration::from_secs(300));
        assert!(opts.chunk_delay.is_zero());
        assert_eq!(
            opts.env.get("HTTPS_PROXY").map(String::as_str),
            Some("http://proxy:8080")
        );
        assert_eq!(opts.relay.heartbeat_interval, Duration::from_secs(15));
        assert_eq!(opts.relay.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn default_config_matches_default_options() {
        let opts = GenerateOptions::from_config(&Config::default());
        let defaults = GenerateOptions::default();
        assert_eq!(opts.command, defaults.command);
        assert_eq!(opts.args, defaults.args);
        assert_eq!(opts.timeout, defaults.timeout);
        assert_eq!(opts.chunk_size, defaults.chunk_size);
        assert_eq!(opts.chunk_delay, defaults.chunk_delay);
        assert_eq!(opts.relay, defaults.relay);
        assert!(opts.env.is_empty());
    }
}
