//! Plain-text rendering of queued email payloads.

use std::fmt::Write;

use relwatch_core::changes::UpdateSummary;
use relwatch_core::email_types::{EmailPayload, SponsorSlot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub body: String,
}

pub fn render(payload: &EmailPayload) -> RenderedEmail {
    match payload {
        EmailPayload::VersionDigest {
            frequency,
            updates,
            omitted,
            sponsor,
        } => render_digest(frequency, updates, *omitted, sponsor.as_ref()),
        EmailPayload::AllQuiet {
            frequency,
            message,
            sponsor,
        } => {
            let mut body = format!("{message}\n");
            push_sponsor(&mut body, sponsor.as_ref());
            RenderedEmail {
                subject: format!("Your {frequency} release digest: all quiet"),
                body,
            }
        }
        EmailPayload::NoTrackingReminder => RenderedEmail {
            subject: "You're not tracking any software yet".to_string(),
            body: "You signed up for release digests but haven't picked any software to follow.\n\
                   Add the tools you use and we'll email you whenever a new version ships.\n"
                .to_string(),
        },
    }
}

fn render_digest(
    frequency: &str,
    updates: &[UpdateSummary],
    omitted: usize,
    sponsor: Option<&SponsorSlot>,
) -> RenderedEmail {
    let subject = match (updates, omitted) {
        ([only], 0) => format!("{} {} is out", only.software_name, only.new_version),
        _ => format!(
            "{} new releases in your {frequency} digest",
            updates.len() + omitted
        ),
    };

    let mut body = String::new();
    for update in updates {
        let _ = write!(body, "* {}: ", update.software_name);
        match &update.previous_version {
            Some(prev) => {
                let _ = write!(body, "{prev} -> {}", update.new_version);
            }
            None => body.push_str(&update.new_version),
        }
        if let Some(kind) = &update.classification {
            let _ = write!(body, " ({kind})");
        }
        if let Some(date) = update.release_date {
            let _ = write!(body, ", released {}", date.format("%Y-%m-%d"));
        }
        body.push('\n');
        if let Some(notes) = &update.notes {
            for line in notes.lines().filter(|l| !l.trim().is_empty()) {
                let _ = writeln!(body, "    {}", line.trim_end());
            }
        }
    }
    if omitted > 0 {
        let noun = if omitted == 1 { "update" } else { "updates" };
        let _ = writeln!(body, "\n...and {omitted} more {noun}.");
    }
    push_sponsor(&mut body, sponsor);

    RenderedEmail { subject, body }
}

fn push_sponsor(body: &mut String, sponsor: Option<&SponsorSlot>) {
    if let Some(s) = sponsor {
        let _ = write!(body, "\nSponsored by {}: {}\n", s.name, s.link_url);
    }
}
