//! Show the resolved task folder.

use crate::cli::commands::{config_dir, resolver};
use crate::config::Settings;
use crate::error::Result;
use crate::folder::ResolutionSource;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct RootOutput {
    root: PathBuf,
    source: ResolutionSource,
    exists: bool,
}

/// Execute the root command. Never creates anything.
///
/// # Errors
///
/// Returns an error if no rule can produce a folder.
pub fn execute(root: Option<&PathBuf>, config_dir_arg: Option<&PathBuf>, json: bool) -> Result<()> {
    let config_dir = config_dir(config_dir_arg)?;
    let settings = Settings::load(&config_dir)?;
    let resolution = resolver(root, &config_dir, &settings).resolve()?;
    let exists = resolution.root.is_dir();

    if json {
        let output = RootOutput {
            root: resolution.root,
            source: resolution.source,
            exists,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("{}", resolution.root.display());
        println!("  Chosen by: {}", resolution.source);
        if !exists {
            println!("  Does not exist yet; run `tf init` to create it");
        }
    }

    Ok(())
}
