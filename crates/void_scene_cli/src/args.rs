//! Command line parsing for `scenec`

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "scenec")]
#[command(about = "Compile Void Engine scene documents into binary scene assets")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compile scene documents, skipping those whose cache entry is up to date
    Build(BuildArgs),

    /// Print the nodes and items of a compiled scene asset
    Dump {
        /// Compiled `.scene` artifact
        artifact: PathBuf,
    },
}

/// Options of `scenec build`
#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct BuildArgs {
    /// Scene source documents
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Compiler configuration file (defaults to ./scenec.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// RHI target name recorded in the cache
    #[arg(long)]
    pub target: Option<String>,

    /// Worker threads, 0 for one per core
    #[arg(long)]
    pub jobs: Option<usize>,

    /// Recompile even when the cache is up to date
    #[arg(long)]
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn parse(args: &[&str]) -> Result<Commands, clap::Error> {
        Cli::try_parse_from(std::iter::once("scenec").chain(args.iter().copied())).map(|cli| cli.command)
    }

    #[test]
    fn test_build_with_flags() {
        let command = parse(&[
            "build", "a.json", "--target", "Direct3D12", "b.json", "--jobs", "4", "--force", "--config", "c.toml",
        ])
        .unwrap();
        match command {
            Commands::Build(build) => assert_eq!(
                build,
                BuildArgs {
                    inputs: vec![PathBuf::from("a.json"), PathBuf::from("b.json")],
                    config: Some(PathBuf::from("c.toml")),
                    target: Some("Direct3D12".to_string()),
                    jobs: Some(4),
                    force: true,
                }
            ),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_build_errors() {
        assert_eq!(parse(&["build"]).unwrap_err().kind(), ErrorKind::MissingRequiredArgument);
        assert_eq!(parse(&["build", "a.json", "--jobs"]).unwrap_err().kind(), ErrorKind::InvalidValue);
        assert_eq!(
            parse(&["build", "a.json", "--jobs", "many"]).unwrap_err().kind(),
            ErrorKind::ValueValidation
        );
        assert_eq!(
            parse(&["build", "a.json", "--verbose"]).unwrap_err().kind(),
            ErrorKind::UnknownArgument
        );
    }

    #[test]
    fn test_dump_and_unknown() {
        assert!(matches!(
            parse(&["dump", "x.scene"]).unwrap(),
            Commands::Dump { artifact } if artifact == PathBuf::from("x.scene")
        ));
        assert_eq!(parse(&["dump"]).unwrap_err().kind(), ErrorKind::MissingRequiredArgument);
        assert_eq!(parse(&["dump", "a", "b"]).unwrap_err().kind(), ErrorKind::UnknownArgument);
        assert_eq!(parse(&["link"]).unwrap_err().kind(), ErrorKind::InvalidSubcommand);
        assert!(parse(&[]).is_err());
        assert_eq!(parse(&["--help"]).unwrap_err().kind(), ErrorKind::DisplayHelp);
    }
}
