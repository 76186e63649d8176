//! CLI argument parsing using clap.

use clap::Parser;
use clap::Subcommand;
use clap_complete::Shell;
use deckprep_core::RunConfig;
use deckprep_core::config::ConflictPolicy;
use deckprep_core::config::DiscoveryOrder;
use deckprep_core::config::RescanMode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "deckprep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract every archive under a directory, then remove the last slide of every deck
    Run(RunArgs),
    /// Generate shell completions
    Completion {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(clap::Args)]
pub struct RunArgs {
    /// Directory to process
    #[arg(value_name = "DIR")]
    pub root: PathBuf,

    /// Delete each archive after it was fully extracted
    #[arg(long)]
    pub delete: bool,

    /// Extract every archive into this directory instead of next to it
    #[arg(long, value_name = "DIR")]
    pub target: Option<PathBuf>,

    /// Extract each archive into a subdirectory named after it
    #[arg(long)]
    pub into_stem: bool,

    /// Number of units processed in parallel
    #[arg(short, long, default_value = "1", value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: u16,

    /// Fail an archive instead of overwriting an existing file
    #[arg(long)]
    pub strict: bool,

    /// Keep extracting until no new archives appear
    #[arg(long)]
    pub until_stable: bool,

    /// Maximum discovery passes with --until-stable
    #[arg(long, default_value = "8", value_parser = clap::value_parser!(u16).range(1..))]
    pub max_passes: u16,

    /// Visit older files first instead of sorting by name
    #[arg(long)]
    pub oldest_first: bool,

    /// Only process the top level of DIR
    #[arg(long)]
    pub no_recursive: bool,

    /// Extract archives only; leave slide decks untouched
    #[arg(long, conflicts_with = "skip_extract")]
    pub skip_slides: bool,

    /// Only remove slides; leave archives untouched
    #[arg(long)]
    pub skip_extract: bool,
}

impl RunArgs {
    /// Builds the run configuration from the command line.
    pub fn to_config(&self) -> RunConfig {
        RunConfig::default()
            .with_delete_original(self.delete)
            .with_target_dir(self.target.clone())
            .with_into_stem(self.into_stem)
            .with_parallelism(usize::from(self.jobs))
            .with_conflict_policy(if self.strict {
                ConflictPolicy::Strict
            } else {
                ConflictPolicy::LastWriteWins
            })
            .with_rescan(if self.until_stable {
                RescanMode::UntilStable
            } else {
                RescanMode::SinglePass
            })
            .with_max_passes(usize::from(self.max_passes))
            .with_order(if self.oldest_first {
                DiscoveryOrder::OldestFirst
            } else {
                DiscoveryOrder::Lexicographic
            })
            .with_recursive(!self.no_recursive)
            .with_extract_archives(!self.skip_extract)
            .with_mutate_documents(!self.skip_slides)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Run(args) => args,
            Commands::Completion { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["deckprep", "run", "inbox"]).to_config();
        assert!(!config.delete_original);
        assert!(!config.into_stem);
        assert_eq!(config.parallelism.get(), 1);
        assert_eq!(config.conflict_policy, ConflictPolicy::LastWriteWins);
        assert_eq!(config.rescan, RescanMode::SinglePass);
        assert!(config.recursive);
        assert!(config.extract_archives && config.mutate_documents);
    }

    #[test]
    fn test_all_flags() {
        let config = parse(&[
            "deckprep",
            "run",
            "inbox",
            "--delete",
            "--target",
            "out",
            "--into-stem",
            "-j",
            "4",
            "--strict",
            "--until-stable",
            "--max-passes",
            "3",
            "--oldest-first",
            "--no-recursive",
            "--skip-slides",
        ])
        .to_config();

        assert!(config.delete_original);
        assert_eq!(config.target_dir, Some(PathBuf::from("out")));
        assert!(config.into_stem);
        assert_eq!(config.parallelism.get(), 4);
        assert_eq!(config.conflict_policy, ConflictPolicy::Strict);
        assert_eq!(config.pass_limit(), 3);
        assert_eq!(config.order, DiscoveryOrder::OldestFirst);
        assert!(!config.recursive);
        assert!(!config.mutate_documents);
    }

    #[test]
    fn test_zero_jobs_rejected() {
        assert!(Cli::try_parse_from(["deckprep", "run", "inbox", "-j", "0"]).is_err());
    }

    #[test]
    fn test_skip_both_phases_rejected() {
        assert!(
            Cli::try_parse_from(["deckprep", "run", "inbox", "--skip-slides", "--skip-extract"])
                .is_err()
        );
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
