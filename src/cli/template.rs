//! CLI commands for the built-in SPIDER config templates.
use crate::template::{TEMPLATES_DIR, builtin_template};
use anyhow::{Context, Result, ensure};
use clap::Subcommand;
use std::fs;
use std::path::{Path, PathBuf};

/// The available subcommands for managing templates.
#[derive(Subcommand)]
pub enum TemplateSubcommands {
    /// List the built-in templates.
    List,
    /// Write a built-in template to a file so it can be customised.
    Extract {
        /// The name of the template to extract.
        name: String,
        /// Where to write the template (defaults to its name in the current folder).
        dest: Option<PathBuf>,
    },
}

impl TemplateSubcommands {
    /// Execute the supplied template subcommand
    pub fn execute(self) -> Result<()> {
        match self {
            Self::List => handle_template_list_command(),
            Self::Extract { name, dest } => handle_template_extract_command(&name, dest.as_deref())?,
        }

        Ok(())
    }
}

/// Names of the built-in templates, in alphabetical order
fn template_names() -> Vec<String> {
    let mut names: Vec<_> = TEMPLATES_DIR
        .files()
        .filter_map(|file| file.path().file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect();
    names.sort();

    names
}

/// Handle the `templates list` command.
fn handle_template_list_command() {
    for name in template_names() {
        println!("{name}");
    }
}

/// Handle the `templates extract` command
fn handle_template_extract_command(name: &str, dest: Option<&Path>) -> Result<()> {
    let dest = dest.unwrap_or(Path::new(name));
    extract_template(name, dest)?;
    println!("Template written to {}", dest.display());

    Ok(())
}

/// Write the named built-in template to `dest`, which must not already exist
fn extract_template(name: &str, dest: &Path) -> Result<()> {
    let contents = builtin_template(name).context("Template not found.")?;
    ensure!(
        !dest.exists(),
        "Destination {} already exists",
        dest.display()
    );
    fs::write(dest, contents).with_context(|| format!("Could not write {}", dest.display()))
}
