use crate::releases::DEFAULT_RELEASE;
use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_MAX_DEPS: usize = 20;
pub const DEFAULT_MAILFROM: &str = "nobody@fedoraproject.org";

/// Report orphaned packages that are still unblocked in Koji
#[derive(Parser, Debug, Clone)]
#[command(
    name = "find-unblocked-orphans",
    about = "Report orphaned packages that are still unblocked in Koji",
    version,
    long_about = "Lists packages owned by the orphan user in dist-git that are not yet \
                  blocked in the release's Koji tag, finds every package that would break \
                  when they are retired and prints a report addressed to the affected \
                  (co)maintainers.\n\n\
                  Examples:\n  \
                  find-unblocked-orphans\n  \
                  find-unblocked-orphans --release epel9 --json orphans.json\n  \
                  find-unblocked-orphans --skip-orphans python-foo python-bar\n  \
                  find-unblocked-orphans --mailto me@example.org"
)]
pub struct CliArgs {
    #[arg(long, help = "Do not look for orphans")]
    pub skip_orphans: bool,

    #[arg(
        long,
        alias = "max_deps",
        value_name = "N",
        default_value_t = DEFAULT_MAX_DEPS,
        help = "Maximum number of dependent packages listed per package"
    )]
    pub max_deps: usize,

    #[arg(long, value_name = "NAME", default_value = DEFAULT_RELEASE, help = "Release to check")]
    pub release: String,

    #[arg(long, value_name = "ADDRESS", help = "Send mail to this address (for testing)")]
    pub mailto: Option<String>,

    #[arg(
        long,
        help = "Actually send mail including Bcc addresses to mailing list"
    )]
    pub send: bool,

    #[arg(long, value_name = "URL", help = "Source repo URL to use for depcheck")]
    pub source_repo: Option<String>,

    #[arg(long, value_name = "URL", help = "Repo URL to use for depcheck")]
    pub repo: Option<String>,

    #[arg(
        long,
        value_name = "FILE",
        help = "Export info about orphaned packages to a specified JSON file"
    )]
    pub json: Option<PathBuf>,

    #[arg(long, help = "Do not skip blocked packages")]
    pub no_skip_blocked: bool,

    #[arg(long, value_name = "ADDRESS", default_value = DEFAULT_MAILFROM, help = "Sender address")]
    pub mailfrom: String,

    #[arg(value_name = "PACKAGE", help = "Additional packages, e.g. FTBFS packages")]
    pub failed: Vec<String>,

    #[arg(long, value_name = "FILE", help = "TOML file with additional release definitions")]
    pub releases_file: Option<PathBuf>,

    #[arg(long, value_name = "DIR", help = "Directory for cached listings and repodata")]
    pub cache_dir: Option<PathBuf>,

    #[arg(long, help = "Disable caching")]
    pub no_cache: bool,

    #[arg(long, value_name = "HOST", help = "SMTP relay used to send mail")]
    pub smtp_host: Option<String>,

    #[arg(long, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        conflicts_with = "verbose",
        help = "Quiet mode - only log errors"
    )]
    pub quiet: bool,
}

impl CliArgs {
    /// Whether the report is mailed at all.
    pub fn wants_mail(&self) -> bool {
        self.mailto.is_some() || self.send
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("find-unblocked-orphans").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert!(!args.skip_orphans);
        assert_eq!(args.max_deps, 20);
        assert_eq!(args.release, "rawhide");
        assert_eq!(args.mailfrom, "nobody@fedoraproject.org");
        assert!(args.failed.is_empty());
        assert!(!args.no_skip_blocked);
        assert!(!args.wants_mail());
    }

    #[test]
    fn test_max_deps_alias() {
        assert_eq!(parse(&["--max_deps", "5"]).max_deps, 5);
        assert_eq!(parse(&["--max-deps", "7"]).max_deps, 7);
    }

    #[test]
    fn test_failed_packages_and_flags() {
        let args = parse(&[
            "--skip-orphans",
            "--release",
            "epel9",
            "--json",
            "out.json",
            "--no-skip-blocked",
            "python-foo",
            "python-bar",
        ]);
        assert!(args.skip_orphans);
        assert!(args.no_skip_blocked);
        assert_eq!(args.release, "epel9");
        assert_eq!(args.json, Some(PathBuf::from("out.json")));
        assert_eq!(args.failed, vec!["python-foo", "python-bar"]);
    }

    #[test]
    fn test_mail_flags() {
        assert!(parse(&["--send"]).wants_mail());
        let args = parse(&["--mailto", "me@example.org"]);
        assert!(args.wants_mail());
        assert_eq!(args.mailto.as_deref(), Some("me@example.org"));
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        let result = CliArgs::try_parse_from(["find-unblocked-orphans", "-v", "-q"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_max_deps() {
        let result = CliArgs::try_parse_from(["find-unblocked-orphans", "--max-deps", "many"]);
        assert!(result.is_err());
    }
}
