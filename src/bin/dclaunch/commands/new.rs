use crate::cli;
use anyhow::{Context, Result};
use dclaunch::config::{PROFILE_FILENAME, PROFILE_TEMPLATE};
use std::fs;
use std::path::Path;

pub(crate) fn handle_new(new_args: cli::NewArgs) -> Result<i32> {
    create_profile_dir(Path::new(&new_args.name))?;
    Ok(0)
}

fn create_profile_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        anyhow::bail!("Directory '{}' already exists.", dir.display());
    }

    fs::create_dir(dir)
        .with_context(|| format!("Failed to create directory '{}'", dir.display()))?;

    let profile_path = dir.join(PROFILE_FILENAME);
    fs::write(&profile_path, PROFILE_TEMPLATE)
        .with_context(|| format!("Failed to write profile '{}'", profile_path.display()))?;

    tracing::info!("Created profile {}", profile_path.display());
    println!("Created {}", profile_path.display());
    Ok(())
}
