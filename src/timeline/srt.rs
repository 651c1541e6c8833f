use std::fmt::Write as _;

use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::PipelineError;

use super::TimeSpan;

// @module: SRT cue parsing and formatting

// @const: SRT timestamp regex (comma or dot before the milliseconds)
static TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{2}):(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(\d{2}):(\d{2}):(\d{2})[,.](\d{3})")
        .unwrap()
});

// @struct: Single SRT cue
#[derive(Debug, Clone, PartialEq)]
pub struct SrtCue {
    // @field: Cue number as written in the file
    pub index: usize,

    // @field: Cue timing
    pub span: TimeSpan,

    // @field: Cue text, lines joined with '\n'
    pub text: String,
}

/// Format seconds as an SRT timestamp (HH:MM:SS,mmm)
pub fn format_timestamp(seconds: f64) -> String {
    let ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let secs = (ms % 60_000) / 1_000;
    let millis = ms % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

fn captures_to_seconds(caps: &regex::Captures, start_idx: usize) -> f64 {
    let field = |i: usize| -> u64 {
        caps.get(start_idx + i)
            .map_or(0, |m| m.as_str().parse().unwrap_or(0))
    };
    let ms = (field(0) * 3600 + field(1) * 60 + field(2)) * 1000 + field(3);
    ms as f64 / 1000.0
}

/// Parse SRT content into cues sorted by start time.
///
/// A cue whose end is not after its start is rejected; empty cues are kept
/// because a silent segment is still a timeline entry.
pub fn parse_srt(content: &str) -> Result<Vec<SrtCue>, PipelineError> {
    let mut cues = Vec::new();

    let mut index: Option<usize> = None;
    let mut span: Option<TimeSpan> = None;
    let mut text = String::new();

    let finish = |index: usize, span: TimeSpan, text: &mut String, cues: &mut Vec<SrtCue>| {
        cues.push(SrtCue {
            index,
            span,
            text: text.trim().to_string(),
        });
        text.clear();
    };

    for (line_no, line) in content.lines().enumerate() {
        let trimmed = line.trim().trim_start_matches('\u{feff}');

        if trimmed.is_empty() {
            if let (Some(i), Some(s)) = (index, span) {
                finish(i, s, &mut text, &mut cues);
                index = None;
                span = None;
            }
            continue;
        }

        if index.is_none() {
            match trimmed.parse::<usize>() {
                Ok(num) => index = Some(num),
                Err(_) => warn!("Unexpected text at line {} before cue number: {}", line_no + 1, trimmed),
            }
            continue;
        }

        if span.is_none() {
            let caps = TIMESTAMP_REGEX.captures(trimmed).ok_or_else(|| {
                PipelineError::InvalidInput(format!(
                    "Expected SRT timestamp at line {}, found: {}",
                    line_no + 1,
                    trimmed
                ))
            })?;
            let start = captures_to_seconds(&caps, 1);
            let end = captures_to_seconds(&caps, 5);
            let parsed = TimeSpan::new(start, end).map_err(|_| {
                PipelineError::InvalidInput(format!(
                    "SRT cue {} at line {} has no positive duration: {}",
                    index.unwrap_or_default(),
                    line_no + 1,
                    trimmed
                ))
            })?;
            span = Some(parsed);
            continue;
        }

        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(trimmed);
    }

    if let (Some(i), Some(s)) = (index, span) {
        finish(i, s, &mut text, &mut cues);
    }

    cues.sort_by(|a, b| a.span.start.total_cmp(&b.span.start));
    Ok(cues)
}

/// Render cues as SRT, renumbering them from 1
pub fn format_srt(cues: &[SrtCue]) -> String {
    let mut out = String::new();
    for (i, cue) in cues.iter().enumerate() {
        let _ = writeln!(out, "{}", i + 1);
        let _ = writeln!(
            out,
            "{} --> {}",
            format_timestamp(cue.span.start),
            format_timestamp(cue.span.end)
        );
        let _ = writeln!(out, "{}", cue.text);
        out.push('\n');
    }
    out
}
