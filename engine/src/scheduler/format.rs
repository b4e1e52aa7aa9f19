//! User-facing scheduler messages

use crate::clock::{format_local, format_local_time};
use crate::session::ReplaceTarget;
use chrono::{DateTime, FixedOffset, Utc};
use sdk::types::Meeting;

fn when(meeting: &Meeting, offset: FixedOffset) -> String {
    format!(
        "{} - {}",
        format_local(meeting.start_time, offset),
        format_local_time(meeting.end_time, offset)
    )
}

fn conflict_block(meeting: &Meeting, offset: FixedOffset) -> String {
    let mut block = format!("- {} ({})\n  Location: {}", meeting.title, when(meeting, offset), meeting.location);
    if !meeting.description.is_empty() {
        block.push_str(&format!("\n  Description: {}", meeting.description));
    }
    if let Some(organizer) = meeting.organizer() {
        block.push_str(&format!("\n  Organizer: {}", organizer.display()));
    }
    block
}

/// Conflict report, worded by whether the user organizes any of them
pub fn conflict(conflicts: &[Meeting], user_email: &str, offset: FixedOffset) -> String {
    let user_organizes = conflicts.iter().any(|m| m.is_organized_by(user_email));
    let header = if user_organizes {
        "⛔ This time isn't free. You're the organizer of the conflicting meeting(s):"
    } else {
        "⚠️ This time isn't free. You're not the organizer of the conflicting meeting(s):"
    };
    let blocks: Vec<String> = conflicts.iter().map(|m| conflict_block(m, offset)).collect();
    let target = if conflicts.len() == 1 { "it" } else { "one of them" };
    format!(
        "{}\n{}\n\nDo you want to replace {} with your new meeting? \
         Reply 'replace' to proceed, or 'another time' to choose a different slot.",
        header,
        blocks.join("\n"),
        target
    )
}

/// Numbered list for picking which conflict to replace
pub fn selection(conflicts: &[Meeting], offset: FixedOffset, unmatched: bool) -> String {
    let lines: Vec<String> = conflicts
        .iter()
        .enumerate()
        .map(|(i, m)| format!("{}. {} (ID: {}) {}", i + 1, m.title, m.meeting_id, when(m, offset)))
        .collect();
    let lead = if unmatched {
        "I couldn't match that to exactly one meeting."
    } else {
        "Which meeting do you want to replace?"
    };
    format!(
        "{} Reply with the number, title or meeting ID:\n{}",
        lead,
        lines.join("\n")
    )
}

pub fn proposal(meeting: &Meeting, replaces: Option<&ReplaceTarget>, offset: FixedOffset) -> String {
    let participants: Vec<String> = meeting.participants.iter().map(|p| p.display()).collect();
    let mut message = format!(
        "📋 Meeting Confirmation\n\nTitle: {}\nWhen: {}\nLocation: {}\nParticipants: {}",
        meeting.title,
        when(meeting, offset),
        meeting.location,
        participants.join(", ")
    );
    if !meeting.description.is_empty() {
        message.push_str(&format!("\nDescription: {}", meeting.description));
    }
    message.push_str(&format!("\nMeeting ID: {}", meeting.meeting_id));
    match replaces {
        Some(target) => message.push_str(&format!(
            "\n\nThis will replace: {} (ID: {}).\n\n✅ Reply 'yes' to replace it and add the new meeting, or 'no' to cancel.",
            target.title, target.meeting_id
        )),
        None => message.push_str("\n\n✅ Reply 'yes' to add this meeting, or 'no' to cancel."),
    }
    message
}

pub fn committed(meeting: &Meeting, replaced: Option<&Meeting>, offset: FixedOffset) -> String {
    let note = replaced
        .map(|m| format!(" (Replaced '{}')", m.title))
        .unwrap_or_default();
    format!(
        "✅ Meeting '{}' scheduled successfully{}!\n\n📅 {}\n📍 {}",
        meeting.title,
        note,
        when(meeting, offset),
        meeting.location
    )
}

pub fn already_committed(meeting: &Meeting, offset: FixedOffset) -> String {
    format!(
        "'{}' is already on your calendar ({}).",
        meeting.title,
        when(meeting, offset)
    )
}

pub fn past_time(start: DateTime<Utc>, offset: FixedOffset) -> String {
    format!(
        "⏳ The requested time ({}) is in the past. Please choose a future time.",
        format_local(start, offset)
    )
}

pub fn needs_time(date_hint: Option<&str>) -> String {
    match date_hint {
        Some(day) => format!("What time on {} should I schedule it?", day),
        None => "When should I schedule it? Tell me a day and time, e.g. 'tomorrow at 2pm'.".to_string(),
    }
}

pub fn unclear_date(phrase: &str) -> String {
    format!(
        "I'm not sure which day \"{}\" means. Which date should I use, e.g. 'Dec 5' or 'next friday'?",
        phrase
    )
}

pub const DECLINED: &str = "❌ Okay, I didn't schedule it.";
pub const NOTHING_PENDING: &str = "There's no meeting waiting for confirmation. What would you like to schedule?";
pub const OTHER_TIME: &str = "👍 No problem. Which other time should I try?";
pub const SAVE_FAILED: &str = "⚠️ I couldn't save the meeting. Reply 'yes' to try again, or 'no' to cancel.";
pub const COMMIT_FAILED: &str = "❌ I couldn't schedule that meeting.";
