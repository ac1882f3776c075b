//! End-of-run summaries for headless output.
//!
//! Builds the serializable [`RunSummary`] from the last session view and formats
//! human-readable lines for text mode.

use crate::model::{HotSpot, RunSummary, Snapshot};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// The `top_n` most executed positions, busiest first. Ties keep program order.
pub(crate) fn hot_spots(program: &str, profile: &[u64], top_n: usize) -> Vec<HotSpot> {
    let mut spots: Vec<HotSpot> = program
        .chars()
        .zip(profile.iter().copied())
        .enumerate()
        .filter(|(_, (_, count))| *count > 0)
        .map(|(position, (instruction, count))| HotSpot {
            position,
            instruction,
            count,
        })
        .collect();
    spots.sort_by(|a, b| b.count.cmp(&a.count).then(a.position.cmp(&b.position)));
    spots.truncate(top_n);
    spots
}

fn timestamp_utc() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

/// Summarize a finished session. `top_n` of zero leaves out hot spots.
pub(crate) fn build_run_summary(
    program_name: &str,
    instructions: usize,
    last: &Snapshot,
    output: &[u8],
    top_n: usize,
) -> RunSummary {
    let engine = last.engine.as_ref();
    let hot_spots = match (engine, last.profile.as_deref()) {
        (Some(e), Some(profile)) if top_n > 0 => hot_spots(&e.program, profile, top_n),
        _ => Vec::new(),
    };

    RunSummary {
        timestamp_utc: timestamp_utc(),
        program: program_name.to_string(),
        instructions,
        steps: engine.map(|e| e.steps).unwrap_or(0),
        reached_end: engine.is_some_and(|e| e.reached_end),
        faulted: last.faulted,
        status: last.status.clone(),
        elapsed_ms: last.elapsed.as_millis() as u64,
        // Latin-1: one char per byte
        output: output.iter().map(|&b| char::from(b)).collect(),
        hot_spots,
    }
}

/// Build a text summary from a run summary.
pub(crate) fn build_text_summary(summary: &RunSummary) -> TextSummary {
    let mut lines = Vec::new();

    lines.push(format!(
        "Program: {} ({} instructions)",
        summary.program, summary.instructions
    ));
    lines.push(format!("Steps: {}", summary.steps));
    match (&summary.status, summary.faulted) {
        (Some(status), true) => lines.push(format!("Fault: {status}")),
        (Some(status), false) => lines.push(status.clone()),
        (None, _) => lines.push("Stopped before completion".to_string()),
    }

    if !summary.hot_spots.is_empty() {
        lines.push("Hot spots:".to_string());
        for spot in &summary.hot_spots {
            lines.push(format!(
                "  {:>6}  {:?}  x{}",
                spot.position, spot.instruction, spot.count
            ));
        }
    }

    TextSummary { lines }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EngineSnapshot, Speed};
    use std::sync::Arc;
    use std::time::Duration;

    fn finished() -> Snapshot {
        Snapshot {
            active: true,
            generation: 1,
            speed: Speed::IDLE,
            status: Some("Finished in 0.002 s".into()),
            faulted: false,
            elapsed: Duration::from_millis(2),
            engine: Some(EngineSnapshot {
                program: Arc::from("+[-]."),
                program_counter: 5,
                reached_end: true,
                steps: 7,
                ..Default::default()
            }),
            profile: Some(vec![1, 2, 2, 2, 1]),
        }
    }

    #[test]
    fn hot_spots_are_busiest_first() {
        let spots = hot_spots("+[-].", &[1, 2, 3, 2, 1], 2);
        assert_eq!(spots.len(), 2);
        assert_eq!((spots[0].position, spots[0].instruction, spots[0].count), (2, '-', 3));
        // tie resolved by position
        assert_eq!(spots[1].position, 1);
    }

    #[test]
    fn unexecuted_positions_are_not_hot() {
        assert!(hot_spots("a+", &[0, 0], 5).is_empty());
    }

    #[test]
    fn summary_from_finished_run() {
        let summary = build_run_summary("demo.bf", 5, &finished(), b"\x01", 3);
        assert_eq!(summary.steps, 7);
        assert!(summary.reached_end);
        assert!(!summary.faulted);
        assert_eq!(summary.elapsed_ms, 2);
        assert_eq!(summary.hot_spots.len(), 3);
        assert_eq!(summary.output, "\u{1}");
        assert!(summary.timestamp_utc.ends_with('Z'));

        let none = build_run_summary("demo.bf", 5, &finished(), b"", 0);
        assert!(none.hot_spots.is_empty());
    }

    #[test]
    fn output_keeps_every_byte() {
        let summary = build_run_summary("demo.bf", 5, &finished(), &[b'A', 0xE9, 0xFF], 0);
        assert_eq!(summary.output, "A\u{e9}\u{ff}");
        let bytes: Vec<u8> = summary.output.chars().map(|c| c as u8).collect();
        assert_eq!(bytes, vec![b'A', 0xE9, 0xFF]);
    }

    #[test]
    fn text_lines_name_faults() {
        let mut last = finished();
        last.status = Some("tape underflow".into());
        last.faulted = true;
        let summary = build_run_summary("<inline>", 5, &last, b"", 0);
        let text = build_text_summary(&summary);
        assert_eq!(text.lines[0], "Program: <inline> (5 instructions)");
        assert_eq!(text.lines[1], "Steps: 7");
        assert_eq!(text.lines[2], "Fault: tape underflow");
        assert_eq!(text.lines.len(), 3);
    }

    #[test]
    fn text_lines_list_hot_spots() {
        let summary = build_run_summary("demo.bf", 5, &finished(), b"", 1);
        let text = build_text_summary(&summary);
        assert_eq!(text.lines[2], "Finished in 0.002 s");
        assert_eq!(text.lines[3], "Hot spots:");
        assert!(text.lines[4].contains("'['"));
    }
}
