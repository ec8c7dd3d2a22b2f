//! Parses an MSEL document's free-form text into [`Msel`]/[`Inject`]
//! structures, per §4.6 and the bit-exact patterns in §6.
//!
//! The scanner is hand-rolled line-by-line matching rather than a regex
//! engine: the two section/action patterns are simple enough that a
//! small set of token-taking helpers reproduce them exactly, without
//! pulling in a regex dependency for two patterns.

use cyroid_common::error::Result;
use cyroid_common::ids::{InjectId, MselId, RangeId};
use cyroid_common::status::InjectStatus;

use crate::ast::{Action, Inject, Msel};

const ACTIONS_MARKER: &str = "**Actions:**";

/// Parses `text` into an [`Msel`] owned by `range_id`, named `name`.
///
/// Sections are numbered starting at 1 in document order; unknown bullet
/// lines are ignored; trailing whitespace on every captured field is
/// trimmed (§4.6).
#[must_use]
pub fn parse(range_id: RangeId, name: &str, text: &str) -> Msel {
    let msel_id = MselId::new();
    let lines: Vec<&str> = text.lines().collect();

    let header_indices: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter_map(|(i, line)| parse_header(line).map(|_| i))
        .collect();

    let mut injects = Vec::with_capacity(header_indices.len());
    for (seq, &start) in header_indices.iter().enumerate() {
        let (hours, minutes, title) = parse_header(lines[start]).expect("filtered above");
        let end = header_indices.get(seq + 1).copied().unwrap_or(lines.len());
        let body = &lines[start + 1..end];

        let (description, actions) = parse_body(body);

        injects.push(Inject {
            id: InjectId::new(),
            msel_id,
            sequence: u32::try_from(seq + 1).unwrap_or(u32::MAX),
            inject_time_minutes: hours * 60 + minutes,
            title,
            description,
            actions,
            status: InjectStatus::Pending,
            executed_at: None,
            execution_log: None,
        });
    }

    Msel {
        id: msel_id,
        range_id,
        name: name.to_string(),
        raw_text: text.to_string(),
        injects,
    }
}

/// Splits a section body at the `**Actions:**` marker (if present) and
/// scans for action bullets, two passes per kind (`place_file` first,
/// then `run_command`) so mixed-kind ordering stays deterministic across
/// platforms — see `DESIGN.md`'s "MSEL action interleaving" resolution.
fn parse_body(body: &[&str]) -> (String, Vec<Action>) {
    let marker_index = body.iter().position(|line| line.trim() == ACTIONS_MARKER);

    let (description_lines, action_lines): (&[&str], &[&str]) = match marker_index {
        Some(idx) => (&body[..idx], &body[idx + 1..]),
        None => (body, body),
    };

    let description = description_lines
        .iter()
        .map(|l| l.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();

    let mut actions = Vec::new();
    for line in action_lines {
        if let Some(action) = parse_place_file(line) {
            actions.push(action);
        }
    }
    for line in action_lines {
        if let Some(action) = parse_run_command(line) {
            actions.push(action);
        }
    }

    (description, actions)
}

/// Matches `^##\s+T\+(\d+):(\d+)\s+-\s+(.+)$`.
fn parse_header(line: &str) -> Option<(u64, u64, String)> {
    let line = line.trim_end();
    let rest = line.strip_prefix("##")?;
    let rest = take_required_whitespace(rest)?;
    let rest = rest.strip_prefix("T+")?;
    let (hours_str, rest) = rest.split_once(':')?;
    let hours: u64 = hours_str.parse().ok()?;
    let digits_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    if digits_end == 0 {
        return None;
    }
    let minutes: u64 = rest[..digits_end].parse().ok()?;
    let rest = take_required_whitespace(&rest[digits_end..])?;
    let rest = rest.strip_prefix('-')?;
    let rest = take_required_whitespace(rest)?;
    if rest.is_empty() {
        return None;
    }
    Some((hours, minutes, rest.trim_end().to_string()))
}

/// Matches `-\s+Run command on\s+(\S+):\s+(.+)$`.
fn parse_run_command(line: &str) -> Option<Action> {
    let line = line.trim_end();
    let rest = line.strip_prefix('-')?;
    let rest = take_required_whitespace(rest)?;
    let rest = rest.strip_prefix("Run command on")?;
    let rest = take_required_whitespace(rest)?;
    let (hostname, rest) = take_token(rest)?;
    let rest = rest.strip_prefix(':')?;
    let rest = take_required_whitespace(rest)?;
    if rest.is_empty() {
        return None;
    }
    Some(Action::RunCommand {
        target_hostname: hostname.to_string(),
        command: rest.trim_end().to_string(),
    })
}

/// Matches `-\s+Place file:\s+(\S+)\s+on\s+(\S+)\s+at\s+(.+)$`.
fn parse_place_file(line: &str) -> Option<Action> {
    let line = line.trim_end();
    let rest = line.strip_prefix('-')?;
    let rest = take_required_whitespace(rest)?;
    let rest = rest.strip_prefix("Place file:")?;
    let rest = take_required_whitespace(rest)?;
    let (filename, rest) = take_token(rest)?;
    let rest = take_required_whitespace(rest)?;
    let rest = rest.strip_prefix("on")?;
    let rest = take_required_whitespace(rest)?;
    let (hostname, rest) = take_token(rest)?;
    let rest = take_required_whitespace(rest)?;
    let rest = rest.strip_prefix("at")?;
    let rest = take_required_whitespace(rest)?;
    if rest.is_empty() {
        return None;
    }
    Some(Action::PlaceFile {
        filename: filename.to_string(),
        target_hostname: hostname.to_string(),
        target_path: rest.trim_end().to_string(),
    })
}

/// Consumes one-or-more leading whitespace characters, returning `None`
/// if the string does not start with whitespace (the `\s+` of the regex
/// patterns above).
fn take_required_whitespace(s: &str) -> Option<&str> {
    let trimmed = s.trim_start();
    if trimmed.len() == s.len() {
        None
    } else {
        Some(trimmed)
    }
}

/// Takes one whitespace-delimited token (`\S+`) and returns it with the
/// remainder of the string.
fn take_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    if end == 0 {
        None
    } else {
        Some((&s[..end], &s[end..]))
    }
}

/// Validates that a document contains at most one section and returns a
/// user-facing error when the caller expected exactly zero or one;
/// callers needing strict single-MSEL-per-range enforcement (§3) should
/// call this only at the repository layer, not here — the parser itself
/// always returns whatever sections it finds.
///
/// # Errors
/// Never returns an error today; kept as a narrow seam for future
/// structural validation without changing [`parse`]'s signature.
pub fn validate(_msel: &Msel) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "## T+0:00 - Setup\nInitial setup.\n**Actions:**\n- Run command on web: echo hello\n## T+1:30 - Second\n- Place file: a.exe on db at /tmp/a.exe\n";

    #[test]
    fn parses_two_sections_with_correct_offsets() {
        let msel = parse(RangeId::new(), "demo", SAMPLE);
        assert_eq!(msel.injects.len(), 2);
        assert_eq!(msel.injects[0].sequence, 1);
        assert_eq!(msel.injects[0].inject_time_minutes, 0);
        assert_eq!(msel.injects[0].title, "Setup");
        assert_eq!(msel.injects[0].description, "Initial setup.");
        assert_eq!(
            msel.injects[0].actions,
            vec![Action::RunCommand {
                target_hostname: "web".to_string(),
                command: "echo hello".to_string()
            }]
        );

        assert_eq!(msel.injects[1].sequence, 2);
        assert_eq!(msel.injects[1].inject_time_minutes, 90);
        assert_eq!(
            msel.injects[1].actions,
            vec![Action::PlaceFile {
                filename: "a.exe".to_string(),
                target_hostname: "db".to_string(),
                target_path: "/tmp/a.exe".to_string()
            }]
        );
    }

    #[test]
    fn every_inject_starts_pending() {
        let msel = parse(RangeId::new(), "demo", SAMPLE);
        assert!(msel.injects.iter().all(Inject::is_executable));
    }

    #[test]
    fn unknown_bullet_lines_are_ignored() {
        let text = "## T+0:00 - Setup\n- Do a backflip\n**Actions:**\n- Run command on web: ls\n- Juggle knives\n";
        let msel = parse(RangeId::new(), "demo", text);
        assert_eq!(msel.injects[0].actions.len(), 1);
    }

    #[test]
    fn mixed_kind_actions_preserve_order_within_kind() {
        let text = "## T+0:00 - Setup\n**Actions:**\n- Run command on web: first\n- Place file: a on web at /tmp/a\n- Run command on web: second\n- Place file: b on web at /tmp/b\n";
        let msel = parse(RangeId::new(), "demo", text);
        let actions = &msel.injects[0].actions;
        assert_eq!(actions.len(), 4);
        assert!(matches!(actions[0], Action::PlaceFile { ref filename, .. } if filename == "a"));
        assert!(matches!(actions[1], Action::PlaceFile { ref filename, .. } if filename == "b"));
        assert!(matches!(actions[2], Action::RunCommand { ref command, .. } if command == "first"));
        assert!(matches!(actions[3], Action::RunCommand { ref command, .. } if command == "second"));
    }

    #[test]
    fn section_without_actions_marker_still_scans_for_bullets() {
        let text = "## T+2:15 - No marker\n- Run command on db: uptime\n";
        let msel = parse(RangeId::new(), "demo", text);
        assert_eq!(msel.injects[0].inject_time_minutes, 135);
        assert_eq!(msel.injects[0].actions.len(), 1);
    }

    #[test]
    fn trailing_whitespace_is_trimmed() {
        let text = "## T+0:00 - Setup   \n**Actions:**\n- Run command on web: echo hi   \n";
        let msel = parse(RangeId::new(), "demo", text);
        assert_eq!(msel.injects[0].title, "Setup");
        assert!(matches!(&msel.injects[0].actions[0], Action::RunCommand { command, .. } if command == "echo hi"));
    }

    #[test]
    fn empty_document_yields_no_injects() {
        let msel = parse(RangeId::new(), "demo", "");
        assert!(msel.injects.is_empty());
    }
}
