//! Integration tests for CLI argument handling
//!
//! Runs the built binary for argument validation and the offline paths
//! (health on the in-memory store, unreachable upstream).

use std::process::Command;

/// Helper to run the CLI with given args and capture output
fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_sosfeed"))
        .args(args)
        .env_remove("REDIS_URL")
        .env_remove("SOSFEED_URL")
        .env("RUST_LOG", "sosfeed=warn")
        .output()
        .expect("Failed to execute sosfeed")
}

#[test]
fn test_help_flag_exits_successfully() {
    let output = run_cli(&["--help"]);
    assert!(
        output.status.success(),
        "Expected --help to exit successfully"
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("sosfeed"), "Help should mention sosfeed");
    assert!(stdout.contains("priority"), "Help should list the priority command");
    assert!(stdout.contains("--redis-url"), "Help should mention --redis-url");
}

#[test]
fn test_missing_subcommand_fails() {
    let output = run_cli(&[]);
    assert!(!output.status.success());
}

#[test]
fn test_invalid_level_prints_error_and_exits() {
    let output = run_cli(&["priority", "--level", "urgent"]);
    assert!(!output.status.success(), "Expected invalid level to fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("urgent"),
        "Should name the rejected level: {}",
        stderr
    );
}

#[test]
fn test_zero_ttl_is_rejected() {
    let output = run_cli(&["--durable-ttl-secs", "0", "raw"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("durable-ttl-secs"), "stderr: {}", stderr);
}

#[test]
fn test_health_without_redis_reports_ok() {
    let output = run_cli(&["health"]);
    assert!(output.status.success());

    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("health prints JSON");
    assert_eq!(json["status"], "ok");
}

#[test]
fn test_unreachable_upstream_fails_cold() {
    let output = run_cli(&[
        "--feed-url",
        "http://127.0.0.1:1/sos.json",
        "--fetch-timeout-secs",
        "1",
        "raw",
    ]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty(), "nothing should be printed on stdout");
}

#[cfg(test)]
mod unit_tests {
    //! Unit tests for CLI parsing that don't require running the binary

    use clap::Parser;
    use sosfeed::cli::{Action, Cli, Command, Settings};
    use sosfeed::views::Area;

    #[test]
    fn test_cli_parses_subdistrict() {
        let cli = Cli::parse_from(["sosfeed", "subdistrict", "Kho Hong"]);
        assert_eq!(
            cli.command,
            Command::Subdistrict {
                name: "Kho Hong".to_string()
            }
        );
    }

    #[test]
    fn test_cli_redis_url_flag() {
        let cli = Cli::parse_from(["sosfeed", "--redis-url", "redis://cache:6379", "health"]);
        let settings = Settings::from_cli(&cli).unwrap();
        assert_eq!(settings.redis_url.as_deref(), Some("redis://cache:6379"));
        assert_eq!(settings.action, Action::Health);
    }

    #[test]
    fn test_cli_province_action() {
        let cli = Cli::parse_from(["sosfeed", "province", "สงขลา"]);
        let settings = Settings::from_cli(&cli).unwrap();
        assert_eq!(
            settings.action,
            Action::Area {
                area: Area::Province,
                name: "สงขลา".to_string()
            }
        );
    }
}
