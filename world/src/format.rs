//! Text grid format used for initial and goal world states.
//!
//! Each line is one level, the top line being the highest. Each character
//! column is one stack; `.` marks an empty slot and any other character is a
//! block label unique across the file. A blank line after at least one row
//! terminates the grid.

use std::{
    collections::{BTreeMap, BTreeSet},
    io::{self, Read},
};

use blocks_world_core::{Block, StackId, EMPTY_SPACE};
use thiserror::Error;

use crate::{Stack, World};

/// Input-validation failures raised while loading a world.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The grid contained no blocks.
    #[error("world description contains no blocks")]
    Empty,
    /// A label appears more than once.
    #[error("duplicate block [{block}] not allowed")]
    DuplicateBlock {
        /// Repeated block.
        block: Block,
    },
    /// A label is whitespace or a control character.
    #[error("character {label:?} in column {column} is not a printable block label")]
    InvalidLabel {
        /// Offending character.
        label: char,
        /// Zero-based column of the character.
        column: usize,
    },
    /// A column has an empty slot below a block.
    #[error("space found in tower at column {column} below block [{block}]")]
    GapInTower {
        /// Block sitting above the gap.
        block: Block,
        /// Zero-based column of the tower.
        column: usize,
    },
    /// A column's blocks do not reach the bottom row.
    #[error("tower at column {column} doesn't reach the table")]
    FloatingTower {
        /// Zero-based column of the tower.
        column: usize,
    },
    /// The input could not be read.
    #[error("could not read world description")]
    Io(#[from] io::Error),
}

impl World {
    /// Reads and parses a world from the provided reader.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, FormatError> {
        let mut text = String::new();
        let _ = reader.read_to_string(&mut text)?;
        parse(&text)
    }
}

pub(crate) fn parse(text: &str) -> Result<World, FormatError> {
    let mut seen: BTreeSet<Block> = BTreeSet::new();
    // column -> (level -> block), level 0 being the top row
    let mut towers: BTreeMap<usize, BTreeMap<usize, Block>> = BTreeMap::new();
    let mut levels = 0;

    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            if levels > 0 {
                break;
            }
            continue;
        }

        for (column, label) in line.chars().enumerate() {
            if label == EMPTY_SPACE {
                continue;
            }
            if label.is_whitespace() || label.is_control() {
                return Err(FormatError::InvalidLabel { label, column });
            }
            let block = Block::new(label);
            if !seen.insert(block) {
                return Err(FormatError::DuplicateBlock { block });
            }
            let tower = towers.entry(column).or_default();
            if !tower.is_empty() && !tower.contains_key(&(levels - 1)) {
                return Err(FormatError::GapInTower { block, column });
            }
            let _ = tower.insert(levels, block);
        }
        levels += 1;
    }

    if towers.is_empty() {
        return Err(FormatError::Empty);
    }

    let mut world = World::empty();
    for (column, tower) in towers {
        if !tower.contains_key(&(levels - 1)) {
            return Err(FormatError::FloatingTower { column });
        }
        world.all_blocks.extend(tower.values().copied());
        let id = world.allocate_id();
        world
            .stacks
            .push(Stack::from_blocks(id, tower.into_values().collect(), Vec::new()));
    }
    Ok(world)
}

/// Text placed above and below individual stacks when rendering.
#[derive(Clone, Debug, Default)]
pub struct Annotations {
    /// Lines printed above each stack, first line on top.
    pub above: BTreeMap<StackId, Vec<String>>,
    /// Lines printed below each stack, first line on top.
    pub below: BTreeMap<StackId, Vec<String>>,
}

/// Renders the world as a grid of `[A]` free and `{A}` locked cells.
///
/// Every stack occupies `cell_width` characters (at least three). The table
/// line is drawn when `table` is set.
#[must_use]
pub fn render(world: &World, cell_width: usize, annotations: &Annotations, table: bool) -> String {
    let width = cell_width.max(3);
    let height = world.stacks().iter().map(Stack::len).max().unwrap_or(0);
    let mut out = String::new();

    render_annotations(world, &annotations.above, width, &mut out);

    for level in (1..=height).rev() {
        out.push(' ');
        for stack in world.stacks() {
            let blocks: Vec<Block> = stack.blocks_bottom_up().collect();
            match blocks.get(level - 1) {
                Some(block) if stack.is_locked(*block) => out.push_str(&format!("{{{block}}}")),
                Some(block) => out.push_str(&format!("[{block}]")),
                None => out.push_str("   "),
            }
            out.push_str(&" ".repeat(width - 3));
        }
        out.push('\n');
    }

    if table {
        out.push_str(&"=".repeat(world.stacks().len() * width + 3));
        out.push('\n');
    }

    render_annotations(world, &annotations.below, width, &mut out);
    out
}

fn render_annotations(
    world: &World,
    lines: &BTreeMap<StackId, Vec<String>>,
    width: usize,
    out: &mut String,
) {
    let rows = lines.values().map(Vec::len).max().unwrap_or(0);
    for row in 0..rows {
        for stack in world.stacks() {
            let text = lines
                .get(&stack.id())
                .and_then(|entries| entries.get(row))
                .map_or("", String::as_str);
            out.push_str(&format!("{text:<width$}"));
        }
        out.push('\n');
    }
}
