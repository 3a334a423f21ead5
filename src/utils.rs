use anyhow::{anyhow, Result};
use clap::builder::{
    styling::{AnsiColor, Effects},
    Styles,
};

/// Parse a `KEY=VALUE` environment assignment.
///
/// # Examples
///
/// ```
/// use dclaunch::utils::parse_env_assignment;
///
/// assert_eq!(
///     parse_env_assignment("GDAL_CACHEMAX=512").unwrap(),
///     ("GDAL_CACHEMAX".to_string(), "512".to_string())
/// );
/// assert_eq!(
///     parse_env_assignment("OPTS=a=b").unwrap(),
///     ("OPTS".to_string(), "a=b".to_string())
/// );
/// ```
pub fn parse_env_assignment(input: &str) -> Result<(String, String)> {
    let (key, value) = input
        .split_once('=')
        .ok_or_else(|| anyhow!("Invalid assignment '{input}'. Expected KEY=VALUE"))?;
    let key = key.trim();

    if key.is_empty() {
        return Err(anyhow!("Variable name cannot be empty in '{input}'"));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
        || key.starts_with(|c: char| c.is_ascii_digit())
    {
        return Err(anyhow!("Invalid variable name '{key}'"));
    }

    Ok((key.to_string(), value.to_string()))
}

pub const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());
