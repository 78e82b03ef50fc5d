//! `plugtrack track`

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use console::style;

use crate::cli::progress::{LINK, LOOKING_GLASS, print_done, print_step, simple_spinner};
use crate::config::TrackerConfig;
use crate::tracker::{DependencyTracker, Format, TrackOptions};

/// Folders given on the command line.
pub struct Roots<'a> {
    pub directory: Option<&'a Path>,
    pub installation: Option<&'a Path>,
    pub no_installation: bool,
}

/// How the result is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Text(Format),
    Json,
}

pub fn output(tree: bool, json: bool) -> Output {
    if json {
        Output::Json
    } else if tree {
        Output::Text(Format::Tree)
    } else {
        Output::Text(Format::Sc4pac)
    }
}

/// The config file with command line overrides applied.
///
/// The plugins folder falls back to the current folder when neither the
/// command line nor the config names one.
pub fn config(roots: &Roots<'_>) -> anyhow::Result<TrackerConfig> {
    let mut config = TrackerConfig::load().context("Failed to load config")?;

    let plugins = match (roots.directory, config.plugins.take()) {
        (Some(dir), _) => dir.to_path_buf(),
        (None, Some(dir)) => dir,
        (None, None) => std::env::current_dir().context("Failed to read current folder")?,
    };
    config.plugins = Some(absolute(plugins));

    if let Some(installation) = roots.installation {
        config.installation = Some(installation.to_path_buf());
    }
    config.installation = config.installation.take().map(absolute);
    if roots.no_installation {
        config.scan_installation = false;
    }
    Ok(config)
}

fn absolute(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}

pub fn execute(
    patterns: &[String],
    roots: &Roots<'_>,
    dependencies: &[String],
    cache: Option<&Path>,
    output: Output,
) -> anyhow::Result<()> {
    let start = Instant::now();
    let mut config = config(roots)?;
    if let Some(cache) = cache {
        config.cache = Some(cache.to_path_buf());
    }
    let verbose = output != Output::Json;

    let tracker = DependencyTracker::new(config);

    if verbose {
        print_step(1, 2, LOOKING_GLASS, "Indexing plugins...");
    }
    let spinner = verbose.then(|| simple_spinner("Reading archives"));
    let index = tracker.ensure_index();
    if let Some(spinner) = &spinner {
        spinner.finish_and_clear();
    }
    let index = index.context("Failed to build the plugin index")?;
    if verbose {
        println!(
            "Indexed {} records and {} families",
            index.len(),
            index.families().len()
        );
        print_step(2, 2, LINK, "Tracking dependencies...");
    }

    for id in tracker.ensure_packages().unknown(dependencies) {
        tracing::warn!("Package {id} is not installed in the plugins folder");
        if verbose {
            println!("{} {id} is not an installed package", style("Warning:").yellow());
        }
    }

    let spinner = verbose.then(|| simple_spinner("Resolving"));
    let options = TrackOptions {
        dependencies: dependencies.to_vec(),
    };
    let result = tracker.track(patterns, &options);
    if let Some(spinner) = &spinner {
        spinner.finish_and_clear();
    }
    let result = result.context("Failed to track dependencies")?;

    match output {
        Output::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        Output::Text(format) => {
            println!("{}", result.render(format));
            print_done(start.elapsed());
        }
    }
    Ok(())
}
