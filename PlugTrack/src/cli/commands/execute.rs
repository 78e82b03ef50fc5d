//! Command execution implementations

use super::Commands;
use super::{index, track};

impl Commands {
    /// Execute the selected command.
    ///
    /// # Errors
    /// Returns an error if the underlying command fails.
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            Commands::Track {
                patterns,
                directory,
                installation,
                dependencies,
                tree,
                json,
                cache,
                no_installation,
            } => {
                let roots = track::Roots {
                    directory: directory.as_deref(),
                    installation: installation.as_deref(),
                    no_installation: *no_installation,
                };
                track::execute(
                    patterns,
                    &roots,
                    dependencies,
                    cache.as_deref(),
                    track::output(*tree, *json),
                )
            }
            Commands::Index {
                directory,
                installation,
                no_installation,
                out,
            } => {
                let roots = track::Roots {
                    directory: directory.as_deref(),
                    installation: installation.as_deref(),
                    no_installation: *no_installation,
                };
                index::execute(&roots, out)
            }
        }
    }
}
