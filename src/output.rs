//! CLI output formatting.
//!
//! # Information-First Display
//!
//! The primary line for every result is the entity it concerns; storage
//! paths and sizes are shown as indented context lines underneath.
//!
//! # Output Format
//!
//! ## Upload
//!
//! ```text
//! Photo updated: user u1
//!     Crop: 900x900
//!     Uploaded: 512x512 jpg (41.3 KB)
//!     Path: profile_pictures/u1/profile_u1_1760870400000.jpg
//!     URL: file:///srv/data/objects/profile_pictures/u1/profile_u1_1760870400000.jpg
//!     Identity provider: synced
//! ```
//!
//! ## Notifications
//!
//! ```text
//! [photoStatus] loading: Uploading photo
//! [photoStatus] error: Upload failed (Upload failed: Storage unavailable: offline)
//! ```
//!
//! ## Sweep
//!
//! ```text
//! Orphaned photos
//!     profile_pictures/u1/profile_u1_1760870000000.jpg
//! 3 kept, deleted 1 (4 total)
//! ```
//!
//! # Architecture
//!
//! Each result has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::gc::SweepReport;
use crate::notify::Notification;
use crate::session::PhotoResult;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count.
fn format_bytes(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

// ============================================================================
// Upload output
// ============================================================================

/// Format the summary of a completed upload.
pub fn format_photo_result(result: &PhotoResult) -> Vec<String> {
    let mut lines = vec![format!("Photo updated: {}", result.target)];
    lines.push(format!(
        "{}Crop: {}x{}",
        indent(1),
        result.extracted.0,
        result.extracted.1
    ));

    let mut uploaded = format!(
        "{}Uploaded: {}x{} {} ({})",
        indent(1),
        result.uploaded.0,
        result.uploaded.1,
        result.format.extension(),
        format_bytes(result.byte_len)
    );
    if result.fell_back {
        uploaded.push_str(" [unoptimized]");
    }
    lines.push(uploaded);

    lines.push(format!("{}Path: {}", indent(1), result.remote.path));
    lines.push(format!("{}URL: {}", indent(1), result.remote.url));
    if result.target.collection() == crate::types::USERS_COLLECTION {
        let status = if result.identity_synced {
            "synced"
        } else {
            "not synced"
        };
        lines.push(format!("{}Identity provider: {}", indent(1), status));
    }
    lines
}

pub fn print_photo_result(result: &PhotoResult) {
    for line in format_photo_result(result) {
        println!("{}", line);
    }
}

// ============================================================================
// Notifications
// ============================================================================

/// Format one notification as a single line.
pub fn format_notification(notification: &Notification) -> String {
    let head = format!(
        "[{}] {}: {}",
        notification.topic.as_str(),
        notification.kind,
        notification.title
    );
    match &notification.detail {
        Some(detail) => format!("{} ({})", head, detail),
        None => head,
    }
}

pub fn print_notification(notification: &Notification) {
    eprintln!("{}", format_notification(notification));
}

// ============================================================================
// Sweep output
// ============================================================================

/// Format a sweep report: the orphan list, then the summary line.
pub fn format_sweep_report(report: &SweepReport) -> Vec<String> {
    let mut lines = Vec::new();
    if !report.orphans.is_empty() {
        lines.push("Orphaned photos".to_string());
        for orphan in &report.orphans {
            lines.push(format!("{}{}", indent(1), orphan.path));
        }
    }
    lines.push(report.to_string());
    lines
}

pub fn print_sweep_report(report: &SweepReport) {
    for line in format_sweep_report(report) {
        println!("{}", line);
    }
}
