//! Command line configuration.
//!
//! Global options may also come from the environment:
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `KOBO_SERVER` | global | Server preset (`global`, `eu`, `custom`) |
//! | `KOBO_KF_URL` | | KPI base URL, overrides the preset |
//! | `KOBO_KC_URL` | | KoBoCAT base URL, overrides the preset |
//! | `KOBO_TOKEN` | | API token |
//! | `KOBO_LOG_LEVEL` | info | Log level |
//! | `KOBO_REQUEST_TIMEOUT` | 30 | Metadata request timeout (seconds) |

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use kobo_api::{ClientConfig, ServerPreset, normalize_base_url};

use crate::workflow::Mode;

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Which deployment to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerChoice {
    Preset(ServerPreset),
    /// Self-hosted; both URLs must be given.
    Custom,
}

impl fmt::Display for ServerChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerChoice::Preset(preset) => write!(f, "{preset}"),
            ServerChoice::Custom => write!(f, "custom"),
        }
    }
}

impl FromStr for ServerChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("custom") {
            return Ok(ServerChoice::Custom);
        }
        s.parse().map(ServerChoice::Preset)
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "kobo-upload")]
#[command(about = "Create or edit KoboToolbox submissions from spreadsheet rows")]
pub struct UploadConfig {
    /// Server preset: global, eu or custom.
    #[arg(long, env = "KOBO_SERVER", default_value = "global")]
    pub server: ServerChoice,

    /// KPI (form management) base URL.
    #[arg(long, env = "KOBO_KF_URL")]
    pub kf_url: Option<String>,

    /// KoBoCAT (data collection) base URL.
    #[arg(long, env = "KOBO_KC_URL")]
    pub kc_url: Option<String>,

    /// API token.
    #[arg(long, env = "KOBO_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "KOBO_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Metadata request timeout in seconds.
    #[arg(long = "timeout", env = "KOBO_REQUEST_TIMEOUT", default_value = "30")]
    pub request_timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List survey projects.
    Projects,

    /// Write the upload template of a project (.xlsx or .csv).
    Template {
        #[arg(long)]
        asset: String,
        /// Defaults to `<form id>_template.xlsx`.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Download all current data of a project as XLSX.
    Export {
        #[arg(long)]
        asset: String,
        /// Defaults to `<form id>_export.xlsx`.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Submit every row of a CSV or XLSX file as a new submission.
    Submit(SubmitArgs),

    /// Replace existing submissions with the rows of a CSV or XLSX file.
    Edit(SubmitArgs),
}

#[derive(Debug, Clone, Args)]
pub struct SubmitArgs {
    #[arg(long)]
    pub asset: String,

    /// CSV or XLSX file to upload.
    #[arg(long)]
    pub file: PathBuf,

    /// Where to write the per-row report.
    #[arg(long, default_value = "submission_report.csv")]
    pub report: PathBuf,
}

impl Command {
    /// Submission mode for `submit` and `edit`.
    pub fn mode(&self) -> Option<Mode> {
        match self {
            Command::Submit(_) => Some(Mode::Create),
            Command::Edit(_) => Some(Mode::Edit),
            _ => None,
        }
    }

    fn asset(&self) -> Option<&str> {
        match self {
            Command::Projects => None,
            Command::Template { asset, .. } | Command::Export { asset, .. } => {
                Some(asset.as_str())
            }
            Command::Submit(args) | Command::Edit(args) => Some(args.asset.as_str()),
        }
    }
}

impl UploadConfig {
    /// KPI base URL: explicit URL first, then the preset.
    pub fn kf_base(&self) -> Option<String> {
        match (&self.kf_url, self.server) {
            (Some(url), _) if !url.trim().is_empty() => Some(normalize_base_url(url)),
            (_, ServerChoice::Preset(preset)) => Some(preset.kf_url().to_string()),
            (_, ServerChoice::Custom) => None,
        }
    }

    /// KoBoCAT base URL: explicit URL first, then the preset.
    pub fn kc_base(&self) -> Option<String> {
        match (&self.kc_url, self.server) {
            (Some(url), _) if !url.trim().is_empty() => Some(normalize_base_url(url)),
            (_, ServerChoice::Preset(preset)) => Some(preset.kc_url().to_string()),
            (_, ServerChoice::Custom) => None,
        }
    }

    /// Trimmed token, empty when absent.
    pub fn token(&self) -> &str {
        self.token.as_deref().map(str::trim).unwrap_or_default()
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::default().with_request_timeout(Duration::from_secs(self.request_timeout))
    }

    /// Validates the configuration, returning every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.token().is_empty() {
            errors.push("API token is required (--token or KOBO_TOKEN)".to_string());
        }

        if self.kf_base().is_none() {
            errors.push("Custom server requires --kf-url".to_string());
        }

        if self.kc_base().is_none() {
            errors.push("Custom server requires --kc-url".to_string());
        }

        if self.request_timeout == 0 {
            errors.push("Request timeout cannot be 0".to_string());
        }

        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            errors.push(format!("Unknown log level: {}", self.log_level));
        }

        if let Some(asset) = self.command.asset()
            && asset.trim().is_empty()
        {
            errors.push("Asset UID cannot be empty".to_string());
        }

        if let Command::Submit(args) | Command::Edit(args) = &self.command
            && !args.file.is_file()
        {
            errors.push(format!("Input file not found: {}", args.file.display()));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> UploadConfig {
        UploadConfig::try_parse_from(std::iter::once("kobo-upload").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_preset_urls() {
        let config = parse(&["--server", "eu", "--token", "t", "projects"]);
        assert_eq!(config.kf_base().as_deref(), Some("https://eu.kobotoolbox.org"));
        assert_eq!(config.kc_base().as_deref(), Some("https://kc-eu.kobotoolbox.org"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_explicit_urls_override_preset() {
        let config = parse(&[
            "--kf-url",
            "https://kobo.example.org/#/forms",
            "--token",
            "t",
            "projects",
        ]);
        assert_eq!(config.kf_base().as_deref(), Some("https://kobo.example.org"));
        assert_eq!(config.kc_base().as_deref(), Some("https://kc.kobotoolbox.org"));
    }

    #[test]
    fn test_custom_server_requires_urls() {
        let config = parse(&["--server", "custom", "--token", "t", "projects"]);
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("--kf-url")));
        assert!(errors.iter().any(|e| e.contains("--kc-url")));
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let config = parse(&[
            "--token",
            "  ",
            "--timeout",
            "0",
            "--log-level",
            "loud",
            "submit",
            "--asset",
            " ",
            "--file",
            "/definitely/missing.csv",
        ]);
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn test_unknown_server_rejected() {
        let result = UploadConfig::try_parse_from(["kobo-upload", "--server", "mars", "projects"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_command_mode() {
        let config = parse(&["edit", "--asset", "a1", "--file", "x.csv"]);
        assert_eq!(config.command.mode(), Some(Mode::Edit));
        match &config.command {
            Command::Edit(args) => assert_eq!(args.report, PathBuf::from("submission_report.csv")),
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(
            parse(&["submit", "--asset", "a1", "--file", "x.xlsx"]).command.mode(),
            Some(Mode::Create)
        );
        assert_eq!(parse(&["projects"]).command.mode(), None);
    }
}
