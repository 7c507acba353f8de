use clap::Parser;

use crate::zip::OpenOptions;

#[derive(Parser, Debug)]
#[command(name = "zipwalk")]
#[command(version)]
#[command(about = "List and extract ZIP archives from files or HTTP URLs", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipwalk data1.zip -x joe        extract all files except joe from data1.zip\n  \
  zipwalk -p foo.zip | more       send contents of foo.zip via pipe into more\n  \
  zipwalk -l https://example.com/archive.zip   list files from remote ZIP")]
pub struct Cli {
    /// ZIP file path or HTTP URL
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Files to extract (default: all)
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,

    /// List files (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Extract files to pipe, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Exclude files that follow
    #[arg(short = 'x', value_name = "FILE", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Never overwrite existing files
    #[arg(short = 'n')]
    pub never_overwrite: bool,

    /// Overwrite files WITHOUT prompting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Junk paths (do not make directories)
    #[arg(short = 'j')]
    pub junk_paths: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Keep backslashes in entry names instead of treating them as separators
    #[arg(long = "strict-names")]
    pub strict_names: bool,

    /// Skip checking inflated sizes against the central directory
    #[arg(long = "no-validate-sizes")]
    pub no_validate_sizes: bool,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.file.starts_with("http://") || self.file.starts_with("https://")
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    /// Archive options for this invocation. The archive stays open after
    /// the walk so listed entries can be extracted.
    pub fn open_options(&self) -> OpenOptions {
        OpenOptions::for_descriptor()
            .strict_file_names(self.strict_names)
            .validate_entry_sizes(!self.no_validate_sizes)
    }

    pub fn log_level(&self) -> log::LevelFilter {
        match (self.quiet, self.verbose) {
            (0, true) => log::LevelFilter::Info,
            (0, false) => log::LevelFilter::Warn,
            (1, _) => log::LevelFilter::Error,
            _ => log::LevelFilter::Off,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_flags_to_options() {
        let cli = Cli::parse_from(["zipwalk", "a.zip", "--strict-names", "--no-validate-sizes"]);
        let options = cli.open_options();
        assert!(options.strict_file_names);
        assert!(!options.validate_entry_sizes);
        assert!(!options.auto_close);
        assert!(options.decode_strings);
    }

    #[test]
    fn quiet_levels() {
        let cli = Cli::parse_from(["zipwalk", "-qq", "a.zip"]);
        assert!(cli.is_very_quiet());
        assert_eq!(cli.log_level(), log::LevelFilter::Off);

        let cli = Cli::parse_from(["zipwalk", "-v", "a.zip"]);
        assert_eq!(cli.log_level(), log::LevelFilter::Info);
    }

    #[test]
    fn detects_urls() {
        let cli = Cli::parse_from(["zipwalk", "https://example.com/a.zip"]);
        assert!(cli.is_http_url());
    }
}
