//! Poll message rendering and poll-id extraction.

use std::{fmt::Write as _, sync::LazyLock};

use regex::Regex;

use crate::{
    backend::{Poll, PollResults},
    platform::PollEmbed,
};

/// Id shown in the preview of a draft that has not been stored yet.
pub const PREVIEW_POLL_ID: u64 = 69;

pub const POLL_FOOTER: &str =
    "React with an option's emoji to vote. Only your latest reaction counts.";

static TITLE_ID_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"Poll #(.*?): ").ok());

#[must_use]
pub fn poll_title(poll_id: u64, question: &str) -> String {
    format!("Poll #{poll_id}: {question}")
}

/// Extract the poll id from an embed title.
///
/// The title must contain exactly one `Poll #<id>: ` marker and the id must
/// be numeric; anything else is not a poll message.
#[must_use]
pub fn poll_id_from_title(title: &str) -> Option<u64> {
    let re = TITLE_ID_RE.as_ref()?;
    let mut ids = re.captures_iter(title).filter_map(|c| c.get(1));
    let id = ids.next()?;
    if ids.next().is_some() {
        return None;
    }
    id.as_str().trim().parse().ok()
}

/// One line per option with its tally, then the total and the deadline.
#[must_use]
pub fn poll_description(poll: &Poll, results: &PollResults) -> String {
    let total = results.total();
    let mut out = String::new();
    for (index, (option, emoji)) in poll.options.iter().zip(&poll.reactions).enumerate() {
        let count = results.count(index);
        let pct = if total == 0 {
            0
        } else {
            (count * 100 + total / 2) / total
        };
        let noun = if count == 1 { "vote" } else { "votes" };
        let _ = writeln!(out, "{emoji} {option} ▸ {count} {noun} ({pct}%)");
    }
    let noun = if total == 1 { "vote" } else { "votes" };
    let _ = write!(
        out,
        "\nTotal: {total} {noun}\nEnds <t:{}:R>",
        poll.expires_at.timestamp()
    );
    out
}

#[must_use]
pub fn poll_embed(poll: &Poll, results: &PollResults, color: u32) -> PollEmbed {
    PollEmbed {
        title: poll_title(poll.id, &poll.question),
        description: poll_description(poll, results),
        color,
        footer: Some(POLL_FOOTER.to_string()),
    }
}
