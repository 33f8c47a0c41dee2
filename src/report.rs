/// Human-readable rendering of duration results
use crate::consensus::ConsensusResult;
use std::fmt::Write;

/// `H:MM:SS`, hours unbounded
pub fn format_clock(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{}:{:02}:{:02}", hours, minutes, secs)
}

/// `1h 02m 03s`, dropping leading zero units
pub fn format_human(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Multi-line summary for terminal output
pub fn render_summary(consensus: &ConsensusResult) -> String {
    let result = &consensus.result;
    let diagnostics = &consensus.diagnostics;
    let mut out = String::new();

    let _ = writeln!(out, "📚 {}", result.course_title);
    let _ = writeln!(
        out,
        "⏱️  Total: {} ({}) across {} videos",
        format_clock(result.total_seconds),
        format_human(result.total_seconds),
        result.video_count
    );

    if !result.sections.is_empty() {
        let width = result
            .sections
            .iter()
            .map(|s| s.name.chars().count())
            .max()
            .unwrap_or(0);

        let _ = writeln!(out);
        for section in &result.sections {
            let _ = writeln!(
                out,
                "  {:<width$}  {:>3} videos  {:>9}",
                section.name,
                section.video_count,
                format_clock(section.total_duration_seconds),
                width = width
            );
        }
    }

    let unsectioned = result.video_count.saturating_sub(result.sectioned_videos());
    if unsectioned > 0 {
        let _ = writeln!(
            out,
            "  (+{} videos outside any section, {})",
            unsectioned,
            format_clock(result.total_seconds.saturating_sub(result.sectioned_seconds()))
        );
    }

    let _ = writeln!(out);
    let _ = write!(
        out,
        "🗳️  {} of {} valid runs agreed ({} discarded) at {}",
        diagnostics.agreeing_runs,
        diagnostics.valid_runs,
        diagnostics.discarded_runs,
        diagnostics.completed_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::select_majority;
    use crate::extraction::{ExtractionResult, SectionRecord};

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0), "0:00:00");
        assert_eq!(format_clock(3723), "1:02:03");
        assert_eq!(format_clock(3570), "0:59:30");
        assert_eq!(format_clock(90_000), "25:00:00");
    }

    #[test]
    fn test_format_human() {
        assert_eq!(format_human(3723), "1h 02m 03s");
        assert_eq!(format_human(125), "2m 05s");
        assert_eq!(format_human(45), "45s");
        assert_eq!(format_human(0), "0s");
    }

    #[test]
    fn test_render_summary() {
        let result = ExtractionResult {
            course_title: "Leg Locks".to_string(),
            total_seconds: 3723 + 30,
            video_count: 3,
            sections: vec![
                SectionRecord {
                    name: "Intro".to_string(),
                    video_count: 1,
                    total_duration_seconds: 123,
                },
                SectionRecord {
                    name: "Heel Hooks".to_string(),
                    video_count: 1,
                    total_duration_seconds: 3600,
                },
            ],
        };
        let consensus = select_majority("u", vec![Ok(result)]).unwrap();
        let summary = render_summary(&consensus);

        assert!(summary.contains("Leg Locks"));
        assert!(summary.contains("1:02:33"));
        assert!(summary.contains("Heel Hooks"));
        assert!(summary.contains("+1 videos outside any section"));
        assert!(summary.contains("1 of 1 valid runs agreed"));
    }
}
