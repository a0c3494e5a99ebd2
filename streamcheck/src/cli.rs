use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use streamcheck_core::config::MAX_DURATION_SECONDS;
use streamcheck_core::{Config, Error, PullTarget, PushTarget, Result, StreamTarget};

#[derive(Parser, Debug)]
#[command(name = "streamcheck", version)]
#[command(
    about = "Check RTMP and HLS stream health",
    long_about = "Check RTMP and HLS stream health. Probes the endpoint first, then drives \
                  an external media player against it and watches its output to decide \
                  whether the stream actually plays."
)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Print the report as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Test an HLS stream: playlist probe, then playback
    #[command(visible_alias = "hls-test")]
    Hls(HlsArgs),

    /// Test an RTMP stream: server reachability, then playback
    #[command(visible_alias = "rtmp-test")]
    Rtmp(RtmpArgs),

    /// Test an RTMP stream with a long playback window
    #[command(visible_alias = "long-rtmp-test")]
    LongRtmp(RtmpArgs),

    /// Test an RTMP and an HLS stream concurrently
    FullTest(FullTestArgs),
}

#[derive(Args, Debug, Clone)]
pub struct HlsArgs {
    /// HLS playlist URL, e.g. https://example.com/hls/stream.m3u8
    #[arg(short, long)]
    pub url: String,

    /// Playback duration in seconds
    #[arg(short, long)]
    pub duration: Option<u64>,

    #[command(flatten)]
    pub player: PlayerArgs,
}

#[derive(Args, Debug, Clone)]
pub struct RtmpArgs {
    /// RTMP stream URL, e.g. rtmp://example.com:1935/live/stream
    #[arg(short, long)]
    pub url: String,

    #[command(flatten)]
    pub player: PlayerArgs,
}

#[derive(Args, Debug, Clone)]
pub struct FullTestArgs {
    /// RTMP stream URL
    #[arg(short, long)]
    pub rtmpurl: String,

    /// HLS playlist URL
    #[arg(short = 'u', long)]
    pub hlsurl: String,

    /// HLS playback duration in seconds
    #[arg(short, long)]
    pub duration: Option<u64>,

    #[command(flatten)]
    pub player: PlayerArgs,
}

#[derive(Args, Debug, Clone)]
pub struct PlayerArgs {
    /// Path to the player executable
    #[arg(short = 'v', long = "vlc", value_name = "PATH")]
    pub path: Option<String>,
}

/// A validated check, ready to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    Pull { target: PullTarget, duration: Duration },
    Push { target: PushTarget },
    LongPush { target: PushTarget },
    Full { push: PushTarget, pull: PullTarget, duration: Duration },
}

impl Command {
    /// Subcommand name, for printing its usage
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Hls(_) => "hls",
            Self::Rtmp(_) => "rtmp",
            Self::LongRtmp(_) => "long-rtmp",
            Self::FullTest(_) => "full-test",
        }
    }

    fn player(&self) -> &PlayerArgs {
        match self {
            Self::Hls(args) => &args.player,
            Self::Rtmp(args) | Self::LongRtmp(args) => &args.player,
            Self::FullTest(args) => &args.player,
        }
    }

    /// Apply flags that override config values
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(path) = &self.player().path {
            config.player.path.clone_from(path);
        }
    }

    /// Resolve URLs and the playback duration
    pub fn plan(&self, config: &Config) -> Result<Plan> {
        match self {
            Self::Hls(args) => Ok(Plan::Pull {
                target: StreamTarget::parse_pull(&args.url)?,
                duration: playback_duration(args.duration, config)?,
            }),
            Self::Rtmp(args) => Ok(Plan::Push {
                target: StreamTarget::parse_push(&args.url)?,
            }),
            Self::LongRtmp(args) => Ok(Plan::LongPush {
                target: StreamTarget::parse_push(&args.url)?,
            }),
            Self::FullTest(args) => Ok(Plan::Full {
                push: StreamTarget::parse_push(&args.rtmpurl)?,
                pull: StreamTarget::parse_pull(&args.hlsurl)?,
                duration: playback_duration(args.duration, config)?,
            }),
        }
    }
}

fn playback_duration(flag: Option<u64>, config: &Config) -> Result<Duration> {
    match flag.unwrap_or(config.pull.duration_seconds) {
        0 => Err(Error::InvalidInput(
            "duration must be greater than zero".to_string(),
        )),
        seconds if seconds > MAX_DURATION_SECONDS => Err(Error::InvalidInput(format!(
            "duration must be at most {MAX_DURATION_SECONDS} seconds (got {seconds})"
        ))),
        seconds => Ok(Duration::from_secs(seconds)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_hls_with_aliases_and_short_flags() {
        let cli = parse(&[
            "streamcheck",
            "hls-test",
            "-u",
            "https://example.com/live.m3u8",
            "-d",
            "15",
            "-v",
            "/usr/bin/vlc",
        ]);

        let Command::Hls(args) = &cli.command else {
            panic!("expected hls, got {:?}", cli.command);
        };
        assert_eq!(args.url, "https://example.com/live.m3u8");
        assert_eq!(args.duration, Some(15));
        assert_eq!(args.player.path.as_deref(), Some("/usr/bin/vlc"));
    }

    #[test]
    fn test_missing_url_is_rejected() {
        assert!(Cli::try_parse_from(["streamcheck", "rtmp"]).is_err());
        assert!(Cli::try_parse_from(["streamcheck", "full-test", "-r", "rtmp://a/b"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&[
            "streamcheck",
            "long-rtmp",
            "--url",
            "rtmp://example.com/live",
            "--json",
            "-c",
            "custom.yaml",
            "--log-level",
            "debug",
        ]);

        assert!(cli.json);
        assert_eq!(cli.config.as_deref(), Some("custom.yaml"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.command.name(), "long-rtmp");
    }

    #[test]
    fn test_plan_full_test() {
        let cli = parse(&[
            "streamcheck",
            "full-test",
            "-r",
            "rtmp://example.com/live/key",
            "-u",
            "https://example.com/live.m3u8",
        ]);

        let plan = cli.command.plan(&Config::default()).unwrap();
        let Plan::Full { push, pull, duration } = plan else {
            panic!("expected full test plan");
        };
        assert_eq!(push.port(), 1935);
        assert_eq!(pull.url(), "https://example.com/live.m3u8");
        assert_eq!(duration, Duration::from_secs(10));
    }

    #[test]
    fn test_plan_rejects_zero_duration() {
        let cli = parse(&[
            "streamcheck",
            "hls",
            "-u",
            "https://example.com/live.m3u8",
            "-d",
            "0",
        ]);

        let err = cli.command.plan(&Config::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_plan_rejects_out_of_range_duration() {
        let cli = parse(&[
            "streamcheck",
            "full-test",
            "-r",
            "rtmp://example.com/live/key",
            "-u",
            "https://example.com/live.m3u8",
            "-d",
            "18446744073709551615",
        ]);

        let err = cli.command.plan(&Config::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let cli = parse(&[
            "streamcheck",
            "hls",
            "-u",
            "https://example.com/live.m3u8",
            "-d",
            &MAX_DURATION_SECONDS.to_string(),
        ]);
        assert!(cli.command.plan(&Config::default()).is_ok());
    }

    #[test]
    fn test_plan_rejects_wrong_scheme() {
        let cli = parse(&["streamcheck", "rtmp", "-u", "https://example.com/live.m3u8"]);
        assert!(cli.command.plan(&Config::default()).is_err());

        let cli = parse(&["streamcheck", "hls", "-u", "not a url"]);
        assert!(cli.command.plan(&Config::default()).is_err());
    }

    #[test]
    fn test_player_override() {
        let cli = parse(&["streamcheck", "rtmp", "-u", "rtmp://a/b", "--vlc", "/opt/vlc"]);
        let mut config = Config::default();

        cli.command.apply_overrides(&mut config);
        assert_eq!(config.player.path, "/opt/vlc");

        let cli = parse(&["streamcheck", "rtmp", "-u", "rtmp://a/b"]);
        let mut config = Config::default();
        cli.command.apply_overrides(&mut config);
        assert_eq!(config.player.path, Config::default().player.path);
    }
}
