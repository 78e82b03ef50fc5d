use std::path::PathBuf;

use clap::Subcommand;

pub mod execute;
pub mod index;
pub mod track;

#[derive(Subcommand)]
pub enum Commands {
    /// Find everything a set of plugin files depends on
    Track {
        /// Files, folders (ending in /), sc4pac packages (group:name) or
        /// glob patterns, relative to the plugins folder
        #[arg(required = true)]
        patterns: Vec<String>,

        /// Plugins folder [default: $SC4_PLUGINS or the current folder]
        #[arg(short, long)]
        directory: Option<PathBuf>,

        /// Game installation folder [default: $SC4_INSTALLATION]
        #[arg(long)]
        installation: Option<PathBuf>,

        /// Preferred packages or files when several provide the same record
        #[arg(short = 'D', long = "dependencies")]
        dependencies: Vec<String>,

        /// Print every root record with what it references
        #[arg(long, conflicts_with = "json")]
        tree: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Index cache file. Loaded when it exists, written otherwise
        #[arg(long)]
        cache: Option<PathBuf>,

        /// Do not index the installation folder
        #[arg(long)]
        no_installation: bool,
    },

    /// Build the plugin index and write it to a cache file
    Index {
        /// Plugins folder [default: $SC4_PLUGINS or the current folder]
        #[arg(short, long)]
        directory: Option<PathBuf>,

        /// Game installation folder [default: $SC4_INSTALLATION]
        #[arg(long)]
        installation: Option<PathBuf>,

        /// Do not index the installation folder
        #[arg(long)]
        no_installation: bool,

        /// Output file
        #[arg(short, long)]
        out: PathBuf,
    },
}
