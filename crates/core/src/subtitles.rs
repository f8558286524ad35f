//! WebVTT subtitle generation.

use std::fmt::Write as _;
use std::path::Path;

/// One timed caption.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleCue {
    pub start_secs: f64,
    pub end_secs: f64,
    pub text: String,
}

/// Lay cues back to back, one per label, each lasting at least `min_secs`.
///
/// `labels` and `durations` are zipped; extra entries on either side are
/// ignored.
pub fn sequential_cues(labels: &[String], durations: &[f64], min_secs: f64) -> Vec<SubtitleCue> {
    let mut cursor = 0.0;
    labels
        .iter()
        .zip(durations)
        .map(|(label, duration)| {
            let length = duration.max(min_secs);
            let cue = SubtitleCue {
                start_secs: cursor,
                end_secs: cursor + length,
                text: label.clone(),
            };
            cursor += length;
            cue
        })
        .collect()
}

/// Render cues as a WebVTT document.
pub fn render_vtt(cues: &[SubtitleCue]) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for (i, cue) in cues.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}\n{} --> {}\n{}\n",
            i + 1,
            format_timestamp(cue.start_secs),
            format_timestamp(cue.end_secs),
            cue.text.replace("-->", "->"),
        );
    }
    out
}

/// Write a WebVTT file for the given cues.
pub async fn write_vtt(path: &Path, cues: &[SubtitleCue]) -> std::io::Result<()> {
    tokio::fs::write(path, render_vtt(cues)).await
}

/// Format seconds as `HH:MM:SS.mmm`.
fn format_timestamp(secs: f64) -> String {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        total_secs / 3600,
        (total_secs / 60) % 60,
        total_secs % 60,
        ms
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_timestamp_rolls_over_minutes_and_hours() {
        assert_eq!(format_timestamp(0.0), "00:00:00.000");
        assert_eq!(format_timestamp(61.25), "00:01:01.250");
        assert_eq!(format_timestamp(3725.0), "01:02:05.000");
    }

    #[test]
    fn sequential_cues_apply_minimum_duration() {
        let labels = vec!["Overview".to_string(), "Method".to_string()];
        let cues = sequential_cues(&labels, &[1.0, 5.0], 3.0);
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].start_secs, 0.0);
        assert_eq!(cues[0].end_secs, 3.0);
        assert_eq!(cues[1].start_secs, 3.0);
        assert_eq!(cues[1].end_secs, 8.0);
    }

    #[test]
    fn render_vtt_has_header_and_numbered_cues() {
        let cues = vec![SubtitleCue {
            start_secs: 0.0,
            end_secs: 2.5,
            text: "Intro --> body".into(),
        }];
        let vtt = render_vtt(&cues);
        assert!(vtt.starts_with("WEBVTT\n\n"));
        assert!(vtt.contains("1\n00:00:00.000 --> 00:00:02.500\nIntro -> body\n"));
    }

    #[tokio::test]
    async fn write_vtt_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subs.vtt");
        write_vtt(&path, &[]).await.unwrap();
        let body = std::fs::read_to_string(&path).unwrap();
        assert_eq!(body, "WEBVTT\n\n");
    }
}
