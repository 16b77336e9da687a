//! Configuration constants and command line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Model name used in generated call examples.
pub const DEFAULT_MODEL_PLACEHOLDER: &str = "Model";
/// Units for human-readable sizes, above plain bytes.
pub const SIZE_UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

/// Command line arguments.
#[derive(Parser, Debug)]
#[clap(
    version,
    about = "Eraserhead, finds model fields that were fetched but never used."
)]
pub struct Config {
    /// Specify path to the usage trace file.
    #[clap(short, long)]
    pub file: PathBuf,

    /// Only show traceback frames under this path.
    #[clap(short, long)]
    pub base_path: Option<String>,

    /// Print the summary table only.
    #[clap(short, long)]
    pub summary: bool,

    /// Skip querysets which need no changes.
    #[clap(short, long)]
    pub quiet_perfect: bool,

    /// Print the reports as JSON instead.
    #[clap(short, long, conflicts_with("summary"))]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use crate::setup;

    use super::*;

    #[test]
    fn test_command() {
        setup::init_logging();

        let command = Config::command();
        command.clone().debug_assert();
        assert!(command.get_author().is_none());
        assert_eq!(command.get_name(), "eraserhead");
    }

    #[test]
    fn test_parse_args() {
        setup::init_logging();

        let config = Config::try_parse_from(["eraserhead", "-f", "trace.json", "-q", "-j"]).unwrap();
        assert_eq!(config.file, PathBuf::from("trace.json"));
        assert!(config.quiet_perfect);
        assert!(config.json);
        assert!(config.base_path.is_none());

        assert!(Config::try_parse_from(["eraserhead", "-f", "trace.json", "-s", "-j"]).is_err());
        assert!(Config::try_parse_from(["eraserhead"]).is_err());
    }
}
