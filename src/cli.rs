use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hlsladder")]
#[command(author, version, about = "Adaptive-bitrate HLS ladder conversion tool")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a source file into an HLS quality ladder
    Convert {
        /// Source file name (relative to the input directory) or path
        #[arg(required = true)]
        source: String,

        /// Qualities to encode, comma separated (default subset if omitted)
        #[arg(short, long, value_delimiter = ',')]
        qualities: Vec<String>,

        /// Run directory name (a UUID is generated if omitted)
        #[arg(long)]
        run_id: Option<String>,

        /// JSON file holding a replacement quality catalog
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Directory the source name is resolved against
        #[arg(long)]
        input_dir: Option<PathBuf>,

        /// Base directory run directories are created under
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Delete the source file after every quality succeeded
        #[arg(long)]
        delete_source: bool,

        /// Print the conversion report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the available qualities
    Qualities {
        /// JSON file holding a replacement quality catalog
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
