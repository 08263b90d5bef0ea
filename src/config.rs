#![forbid(unsafe_code)]

// Run configuration - command line flags with BOTSWARM_* environment fallbacks

use crate::behavior::BehaviorConfig;
use crate::swarm::Target;
use clap::{CommandFactory, Parser};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Bot count must be at least 1")]
    NoBots,

    #[error("Host must not be empty")]
    EmptyHost,

    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "botswarm",
    version,
    about = "Drive a staggered swarm of scripted clients against a game-world server"
)]
pub struct Cli {
    /// Server host the client gateway connects to
    #[arg(long, env = "BOTSWARM_HOST", default_value = "localhost")]
    pub host: String,

    /// Server port
    #[arg(long, short = 'p', env = "BOTSWARM_PORT", default_value_t = 25565)]
    pub port: u16,

    /// Number of bots to create (Bot1..=BotN)
    #[arg(long, short = 'n', env = "BOTSWARM_BOTS", default_value_t = 5)]
    pub bots: usize,

    /// Game protocol version the bots announce
    #[arg(long, env = "BOTSWARM_GAME_VERSION", default_value = "1.21.4")]
    pub game_version: String,

    /// Path of the client gateway WebSocket endpoint
    #[arg(long, env = "BOTSWARM_GATEWAY_PATH", default_value = "/")]
    pub gateway_path: String,

    /// Pause between creating successive bots
    #[arg(long, env = "BOTSWARM_STAGGER_MS", default_value_t = 2000)]
    pub stagger_ms: u64,

    /// Movement tick period
    #[arg(long, env = "BOTSWARM_MOVE_INTERVAL_MS", default_value_t = 2000)]
    pub move_interval_ms: u64,

    /// How long `forward` stays engaged per movement tick
    #[arg(long, env = "BOTSWARM_MOVE_DURATION_MS", default_value_t = 1000)]
    pub move_duration_ms: u64,

    /// Chat tick period
    #[arg(long, env = "BOTSWARM_CHAT_INTERVAL_MS", default_value_t = 5000)]
    pub chat_interval_ms: u64,

    /// Log in only; no movement or chat
    #[arg(long, env = "BOTSWARM_NO_BEHAVIOR")]
    pub no_behavior: bool,

    /// Stop the swarm this many seconds after all bots were created (default: run until Ctrl+C)
    #[arg(long, env = "BOTSWARM_HOLD_SECS")]
    pub hold_secs: Option<u64>,

    /// Seconds between console status lines, 0 to disable
    #[arg(long, env = "BOTSWARM_STATUS_INTERVAL_SECS", default_value_t = 10)]
    pub status_interval_secs: u64,

    /// Print the final summary as JSON
    #[arg(long, env = "BOTSWARM_JSON")]
    pub json: bool,
}

/// Validated run parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub target: Target,
    pub bots: usize,
    pub gateway_path: String,
    pub stagger: Duration,
    pub behavior: Option<BehaviorConfig>,
    pub hold: Option<Duration>,
    pub status_interval: Option<Duration>,
    pub json: bool,
}

impl Cli {
    pub fn into_config(self) -> Result<RunConfig, ConfigError> {
        if self.bots == 0 {
            return Err(ConfigError::NoBots);
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }

        let behavior = if self.no_behavior {
            None
        } else {
            Some(BehaviorConfig {
                movement_interval: positive_ms(self.move_interval_ms, "move-interval-ms")?,
                movement_duration: positive_ms(self.move_duration_ms, "move-duration-ms")?,
                chat_interval: positive_ms(self.chat_interval_ms, "chat-interval-ms")?,
            })
        };

        Ok(RunConfig {
            target: Target {
                host: self.host,
                port: self.port,
                protocol_version: self.game_version,
            },
            bots: self.bots,
            gateway_path: self.gateway_path,
            stagger: Duration::from_millis(self.stagger_ms),
            behavior,
            hold: self.hold_secs.map(Duration::from_secs),
            status_interval: (self.status_interval_secs > 0)
                .then(|| Duration::from_secs(self.status_interval_secs)),
            json: self.json,
        })
    }
}

fn positive_ms(ms: u64, name: &'static str) -> Result<Duration, ConfigError> {
    if ms == 0 {
        return Err(ConfigError::ZeroInterval(name));
    }
    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["botswarm"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).into_config().unwrap();
        assert_eq!(config.target.host, "localhost");
        assert_eq!(config.target.port, 25565);
        assert_eq!(config.target.protocol_version, "1.21.4");
        assert_eq!(config.bots, 5);
        assert_eq!(config.stagger, Duration::from_millis(2000));
        assert_eq!(config.behavior, Some(BehaviorConfig::default()));
        assert_eq!(config.hold, None);
        assert_eq!(config.status_interval, Some(Duration::from_secs(10)));
        assert!(!config.json);
    }

    #[test]
    fn test_overrides() {
        let config = parse(&[
            "--host", "mc.example.net",
            "-p", "25577",
            "-n", "40",
            "--game-version", "1.20.1",
            "--stagger-ms", "250",
            "--hold-secs", "60",
            "--status-interval-secs", "0",
        ])
        .into_config()
        .unwrap();

        assert_eq!(config.target.host, "mc.example.net");
        assert_eq!(config.target.port, 25577);
        assert_eq!(config.bots, 40);
        assert_eq!(config.target.protocol_version, "1.20.1");
        assert_eq!(config.stagger, Duration::from_millis(250));
        assert_eq!(config.hold, Some(Duration::from_secs(60)));
        assert_eq!(config.status_interval, None);
    }

    #[test]
    fn test_no_behavior() {
        let config = parse(&["--no-behavior"]).into_config().unwrap();
        assert_eq!(config.behavior, None);
    }

    #[test]
    fn test_rejects_zero_bots() {
        assert_eq!(parse(&["--bots", "0"]).into_config(), Err(ConfigError::NoBots));
    }

    #[test]
    fn test_rejects_zero_interval() {
        assert_eq!(
            parse(&["--chat-interval-ms", "0"]).into_config(),
            Err(ConfigError::ZeroInterval("chat-interval-ms"))
        );
    }

    #[test]
    fn test_every_flag_has_env_fallback() {
        let command = Cli::command();
        for arg in command.get_arguments() {
            let id = arg.get_id().as_str();
            if id == "help" || id == "version" {
                continue;
            }
            let expected = format!("BOTSWARM_{}", id.to_uppercase());
            assert_eq!(
                arg.get_env().and_then(|e| e.to_str()),
                Some(expected.as_str()),
                "flag {id}"
            );
        }
    }

    #[test]
    fn test_rejects_bad_port() {
        assert!(Cli::try_parse_from(["botswarm", "--port", "70000"]).is_err());
    }
}
