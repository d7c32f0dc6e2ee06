use std::env;
use std::time::Duration;

use crate::cli::Cli;

const TIMEOUT_ENV: &str = "WAR_ANALYZER_TIMEOUT_SECS";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Analysis timeout: CLI flag, then environment, then the default budget.
pub fn resolve_timeout(cli: &Cli) -> Duration {
    if let Some(secs) = cli.timeout_secs {
        return Duration::from_secs(secs);
    }

    if let Ok(raw) = env::var(TIMEOUT_ENV)
        && let Ok(secs) = raw.trim().parse::<u64>()
    {
        return Duration::from_secs(secs);
    }

    Duration::from_secs(DEFAULT_TIMEOUT_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(args)
    }

    #[test]
    fn flag_wins_over_default() {
        let cli = cli(&["war-api-analyzer", "--timeout-secs", "7", "analyze", "a.war"]);
        assert_eq!(resolve_timeout(&cli), Duration::from_secs(7));
    }

    #[test]
    fn default_is_five_minutes() {
        let cli = cli(&["war-api-analyzer", "analyze", "a.war"]);
        if env::var(TIMEOUT_ENV).is_err() {
            assert_eq!(resolve_timeout(&cli), Duration::from_secs(300));
        }
    }
}
