//! Filler copy for "all quiet" digests.

use rand::seq::IndexedRandom;

/// Messages shown when none of a user's tracked software changed.
pub const ALL_QUIET_MESSAGES: &[&str] = &[
    "All quiet on the release front. None of the software you track shipped a new version this period.",
    "No new releases this time. Your tools are exactly as up to date as they were last period.",
    "Nothing new to report. We checked every vendor page you care about and found no fresh versions.",
    "A calm period: no updates for the software you follow. We'll keep watching.",
    "Zero new versions. Enjoy the rare moment when nothing needs updating.",
];

/// Pick a random "all quiet" message.
pub fn pick_all_quiet_message() -> &'static str {
    ALL_QUIET_MESSAGES
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(ALL_QUIET_MESSAGES[0])
}
