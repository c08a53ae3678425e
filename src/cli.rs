use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

/// Fan speed and lighting daemon for Thermaltake Riing Quad hubs
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// YAML config file path (default: standard locations, then built-in defaults)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Maximum log level sent to syslog
    #[arg(short = 'l', long = "log-level", default_value = "info")]
    pub log_level: LevelFilter,

    /// Print the effective configuration as YAML and exit
    #[arg(long = "dump-config")]
    pub dump_config: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["tt_fanctl"]).unwrap();
        assert_eq!(cli.config, None);
        assert_eq!(cli.log_level, LevelFilter::Info);
        assert!(!cli.dump_config);
    }

    #[test]
    fn explicit_flags() {
        let cli =
            Cli::try_parse_from(["tt_fanctl", "-c", "/tmp/fans.yml", "--log-level", "debug"])
                .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/fans.yml")));
        assert_eq!(cli.log_level, LevelFilter::Debug);
    }

    #[test]
    fn bad_level_is_rejected() {
        assert!(Cli::try_parse_from(["tt_fanctl", "-l", "loud"]).is_err());
    }
}
