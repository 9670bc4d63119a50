//! Shared terminal styling for the CLI views.
//!
//! Emoji constants degrade to ASCII markers on terminals without emoji
//! support, and each pipeline stage gets a fixed color so boards stay
//! readable across commands.

use console::{Emoji, Style};

use crate::board::models::{Stage, Urgency};

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏱️  ", "[T]");
pub static CHART: Emoji<'_, '_> = Emoji("📊 ", "[STATS]");
pub static WARNING: Emoji<'_, '_> = Emoji("⚠ ", "[WARN] ");
pub static DANGER: Emoji<'_, '_> = Emoji("✗ ", "[!] ");

/// Color used for a stage's column header and lead names.
pub fn stage_style(stage: Stage) -> Style {
    match stage {
        Stage::New => Style::new().blue(),
        Stage::Contacted => Style::new().yellow(),
        Stage::Interested => Style::new().color256(208),
        Stage::Quoted => Style::new().magenta(),
        Stage::Converted => Style::new().green(),
        Stage::Lost => Style::new().red(),
    }
}

/// Marker appended after a lead that needs follow-up.
pub fn urgency_marker(urgency: Option<Urgency>) -> &'static str {
    match urgency {
        Some(Urgency::Overdue) => " !!",
        Some(Urgency::Warning) => " !",
        Some(Urgency::Normal) | None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_stage_has_a_style() {
        for stage in Stage::ALL {
            // Styles render without panicking even when colors are off.
            let rendered = stage_style(stage).apply_to(stage.as_str()).to_string();
            assert!(rendered.contains(stage.as_str()));
        }
    }

    #[test]
    fn test_status_markers_have_ascii_fallbacks() {
        for marker in [&CHECK, &CROSS, &CLOCK, &CHART, &WARNING, &DANGER] {
            assert!(!marker.1.is_empty());
            assert!(marker.1.is_ascii(), "fallback must render anywhere");
        }
    }

    #[test]
    fn test_urgency_markers() {
        assert_eq!(urgency_marker(Some(Urgency::Overdue)), " !!");
        assert_eq!(urgency_marker(Some(Urgency::Warning)), " !");
        assert_eq!(urgency_marker(Some(Urgency::Normal)), "");
        assert_eq!(urgency_marker(None), "");
    }
}
