//! `plugtrack index`

use std::path::Path;
use std::time::Instant;

use anyhow::Context;

use crate::cli::progress::{DISK, LINK, LOOKING_GLASS, print_done, print_step, simple_spinner};
use crate::index::{IndexOptions, PluginIndex};

use super::track::{Roots, config};

pub fn execute(roots: &Roots<'_>, out: &Path) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = config(roots)?;
    let options = IndexOptions::from(&config);

    print_step(1, 3, LOOKING_GLASS, "Indexing plugins...");
    let spinner = simple_spinner("Reading archives");
    let pool = config.pool(config.scan_concurrency)?;
    let index = PluginIndex::build(&options, &pool);
    spinner.finish_and_clear();
    let mut index = index.context("Failed to build the plugin index")?;
    println!(
        "Indexed {} records from {} files",
        index.len(),
        index.archives().len()
    );

    print_step(2, 3, LINK, "Indexing families...");
    let spinner = simple_spinner("Reading exemplars");
    index.build_families(&config.pool(config.family_concurrency)?);
    spinner.finish_and_clear();
    println!("Found {} families", index.families().len());

    print_step(3, 3, DISK, "Writing index...");
    index
        .save(out)
        .with_context(|| format!("Failed to write {}", out.display()))?;
    println!("Index written to: {}", out.display());

    print_done(start.elapsed());
    Ok(())
}
