//! Action scripts: one action per line, e.g. `UNSTACK A B` or `GO_TO_STATION #2`.
//!
//! Blank lines and lines starting with `#` are ignored.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use blocks_world_core::Action;

pub(crate) fn load(path: &Path) -> Result<Vec<Action>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("read action script {}", path.display()))?;
    parse(&text).with_context(|| format!("parse action script {}", path.display()))
}

pub(crate) fn parse(text: &str) -> Result<Vec<Action>> {
    text.lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(number, line)| {
            line.parse::<Action>()
                .with_context(|| format!("line {number}: `{line}`"))
        })
        .collect()
}
