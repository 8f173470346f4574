//! Human-readable report rendering.

use std::fmt::Write;

use compass_agent::{RecommendationKind, RecommendationOutcome, WellnessReport, ENERGY_MAX};

/// Render a report for the terminal.
pub fn render_report(report: &WellnessReport) -> String {
    let mut out = String::new();
    let mood = &report.mood;

    let _ = writeln!(
        out,
        "Mood:   {} (score {}/5)",
        mood.overall_mood,
        report.mood_score()
    );
    let _ = writeln!(out, "Energy: {}/{}", mood.energy_level, ENERGY_MAX);
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", mood.mood_summary);
    let _ = writeln!(out);
    let _ = writeln!(out, "Wellness tips");
    let _ = writeln!(out, "  1. {}", mood.health_tip_1);
    let _ = writeln!(out, "  2. {}", mood.health_tip_2);

    match &report.recommendations {
        RecommendationOutcome::NotRequested => {}
        RecommendationOutcome::Ready { set, .. } => {
            for (kind, heading) in [
                (RecommendationKind::Movie, "Movies"),
                (RecommendationKind::Book, "Books"),
            ] {
                let mut items = set.of_kind(kind).peekable();
                if items.peek().is_none() {
                    continue;
                }
                let _ = writeln!(out);
                let _ = writeln!(out, "{}", heading);
                for item in items {
                    let _ = writeln!(out, "  - {}: {}", item.title, item.rationale);
                }
            }
        }
        RecommendationOutcome::Failed { error } => {
            let _ = writeln!(out);
            let _ = writeln!(out, "Recommendations unavailable: {}", error);
        }
    }

    out
}
