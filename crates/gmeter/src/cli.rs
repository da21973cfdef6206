//! Command-line flags. These take precedence over the config file and
//! environment.

use std::path::PathBuf;

use clap::Parser;

use crate::config::ProxyConfig;

#[derive(Debug, Parser)]
#[command(name = "gmeter", version, about = "HTTP recording and playback proxy")]
pub struct Cli {
    /// Listen address
    #[arg(short = 'l', long = "listen")]
    pub listen: Option<String>,

    /// Target base URL
    #[arg(short = 't', long = "target")]
    pub target: Option<String>,

    /// Cassettes dir
    #[arg(short = 'd', long = "dir")]
    pub dir: Option<PathBuf>,

    /// Skip HTTPS certificate checks towards the target
    #[arg(long)]
    pub insecure: bool,

    /// Config file
    #[arg(long, env = "GMETER_CONFIG", default_value = "gmeter.toml")]
    pub config: PathBuf,
}

impl Cli {
    /// Overlay explicitly given flags onto `config`.
    pub fn apply(&self, config: &mut ProxyConfig) {
        if let Some(listen) = &self.listen {
            config.server.listen_address = listen.clone();
        }
        if let Some(target) = &self.target {
            config.target.url = Some(target.clone());
        }
        if let Some(dir) = &self.dir {
            config.cassettes.dir = dir.clone();
        }
        if self.insecure {
            config.target.insecure = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_flags_override_config() {
        let cli = Cli::try_parse_from(["gmeter", "-t", "http://github.com", "-l", ":9090", "-d", "tapes", "--insecure"])
            .unwrap();
        let mut config = ProxyConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.target.url.as_deref(), Some("http://github.com"));
        assert_eq!(config.server.listen_address, ":9090");
        assert_eq!(config.cassettes.dir, PathBuf::from("tapes"));
        assert!(config.target.insecure);
    }

    #[test]
    fn test_absent_flags_keep_config() {
        let cli = Cli::try_parse_from(["gmeter"]).unwrap();
        let mut config = ProxyConfig::default();
        config.target.url = Some("https://from-file".into());
        config.target.insecure = true;
        cli.apply(&mut config);

        assert_eq!(config.target.url.as_deref(), Some("https://from-file"));
        assert!(config.target.insecure);
        assert_eq!(config.server.listen_address, "localhost:8080");
    }

    #[test]
    fn test_help_is_reported_as_display_help() {
        let err = Cli::try_parse_from(["gmeter", "-h"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
