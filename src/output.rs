//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Derive
//!
//! ```text
//! 001 beach.jpg → 5f5e1000a1b2c3d4e5f60718
//!     orig: 1280x960, 183204 bytes
//!     md: 640x480, 51877 bytes
//!     sm: 170x150, 7012 bytes
//! 002 broken.png
//!     Failed: failed to identify source image: unrecognised image format
//!
//! Derived 1 source, 1 failed
//! ```
//!
//! ## Plan
//!
//! ```text
//! Source: 1600x1200 jpeg, 2097152 bytes
//! orig ← source: 1280x960 jpeg (render)
//! md ← orig: 640x480 jpeg (render)
//! sm ← md: 170x150 jpeg (render)
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::format::ImageKind;
use crate::imaging::PreviewAction;
use crate::planner::PlannedVariant;
use crate::types::AssetDescriptor;

/// Progress events emitted by the `derive` command, one per source.
#[derive(Debug, Clone)]
pub enum DeriveEvent {
    Derived {
        index: usize,
        source_path: String,
        descriptor: AssetDescriptor,
    },
    Failed {
        index: usize,
        source_path: String,
        error: String,
    },
}

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

pub fn format_derive_event(event: &DeriveEvent) -> Vec<String> {
    match event {
        DeriveEvent::Derived {
            index,
            source_path,
            descriptor,
        } => {
            let mut lines = vec![format!(
                "{} {} → {}",
                format_index(*index),
                source_path,
                descriptor.id
            )];
            for entry in &descriptor.images {
                lines.push(format!(
                    "{}{}: {}x{}, {} bytes",
                    indent(1),
                    entry.key,
                    entry.width,
                    entry.height,
                    entry.length
                ));
            }
            lines
        }
        DeriveEvent::Failed {
            index,
            source_path,
            error,
        } => vec![
            format!("{} {}", format_index(*index), source_path),
            format!("{}Failed: {}", indent(1), error),
        ],
    }
}

pub fn print_derive_event(event: &DeriveEvent) {
    for line in format_derive_event(event) {
        println!("{}", line);
    }
}

pub fn format_derive_summary(derived: usize, failed: usize) -> String {
    if failed == 0 {
        format!("Derived {}", plural(derived, "source"))
    } else {
        format!("Derived {}, {} failed", plural(derived, "source"), failed)
    }
}

fn action_label(action: Option<PreviewAction>) -> &'static str {
    match action {
        None => "implicit",
        Some(PreviewAction::SkippedBySize) => "skip: below skip_size",
        Some(PreviewAction::AlreadySized) => "passthrough",
        Some(PreviewAction::Rendered) => "render",
    }
}

pub fn format_plan(
    kind: ImageKind,
    dimensions: (u32, u32),
    source_length: u64,
    rows: &[PlannedVariant],
) -> Vec<String> {
    let mut lines = vec![format!(
        "Source: {}x{} {}, {} bytes",
        dimensions.0, dimensions.1, kind, source_length
    )];
    for row in rows {
        lines.push(format!(
            "{} ← {}: {}x{} {} ({})",
            row.key,
            row.base,
            row.width,
            row.height,
            row.kind,
            action_label(row.action)
        ));
    }
    lines
}

pub fn print_plan(
    kind: ImageKind,
    dimensions: (u32, u32),
    source_length: u64,
    rows: &[PlannedVariant],
) {
    for line in format_plan(kind, dimensions, source_length, rows) {
        println!("{}", line);
    }
}
