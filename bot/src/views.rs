//! Every message, embed and form the bot shows.
//!
//! Component identifiers are always produced by [`Intent::encode`], so the
//! next event can be routed without any server-side memory.

use crate::types::{ButtonStyle, Component, Embed, Message, Modal, TextInput};
use tally_core::backup::{BackupReport, REPORT_TITLE};
use tally_core::counters::{Category, Counters, Leaderboard, UserId};
use tally_core::intent::Intent;

/// Panel message text.
pub const PANEL_PROMPT: &str = "RP panel, pick an option:";
/// Reply to a privileged step without the staff role.
pub const DENIED: &str = "Only staff can use this.";
/// Reply to a non-numeric amount.
pub const INVALID_AMOUNT: &str = "Amount must be a whole number.";
/// Reply to an amount that would take a counter out of range.
pub const AMOUNT_OUT_OF_RANGE: &str = "That amount would push the counter out of range.";
/// Reply to an admin set with any non-numeric field.
pub const INVALID_VALUES: &str = "Invalid input: all three values must be whole numbers.";
/// Last-resort reply.
pub const FAILURE: &str = "Something went wrong.";
/// Update after a cancelled full reset.
pub const RESET_CANCELLED: &str = "Reset cancelled.";
/// Overview body when nobody has counters.
pub const NO_DATA_YET: &str = "_No data yet_";

/// Key of the amount input in the increment form.
pub const AMOUNT_FIELD: &str = "amount";

/// Longest embed description the platform accepts.
pub const EMBED_DESCRIPTION_LIMIT: usize = 4096;

const STATS_COLOR: u32 = 0x2E_CC71;
const OVERVIEW_COLOR: u32 = 0x58_65F2;
const BACKUP_COLOR: u32 = 0x34_98DB;

const MEMBER_PLACEHOLDER: &str = "Pick a member…";

fn button(intent: &Intent, label: &str, style: ButtonStyle) -> Component {
    Component::Button {
        custom_id: intent.encode(),
        label: label.to_string(),
        style,
    }
}

fn member_select(intent: &Intent) -> Component {
    Component::UserSelect {
        custom_id: intent.encode(),
        placeholder: MEMBER_PLACEHOLDER.to_string(),
    }
}

// ========== Prompts ==========

/// The public panel posted by `/panel`.
#[must_use]
pub fn panel() -> Message {
    let mut buttons: Vec<Component> = Category::ALL
        .into_iter()
        .map(|c| button(&Intent::ChooseCategory(c), c.label(), ButtonStyle::Primary))
        .collect();
    buttons.push(button(&Intent::ShowOverview, "Overview", ButtonStyle::Secondary));
    buttons.push(button(&Intent::OpenAdminPanel, "Staff panel", ButtonStyle::Danger));

    Message::public(PANEL_PROMPT).row(buttons)
}

/// Private prompt to pick whom to credit.
#[must_use]
pub fn category_prompt(category: Category) -> Message {
    Message::private(format!("Pick the member for **{}**:", category.label().to_uppercase()))
        .row(vec![member_select(&Intent::PickTargetForCategory(category))])
}

/// Private staff panel.
#[must_use]
pub fn admin_panel() -> Message {
    Message::private("Staff panel, pick an action:").row(vec![
        button(&Intent::ChooseAdminSet, "Set values", ButtonStyle::Success),
        button(&Intent::ChooseAdminReset, "Reset player", ButtonStyle::Danger),
        button(&Intent::RequestFullReset, "Reset ALL", ButtonStyle::Secondary),
    ])
}

/// Private prompt to pick whose values to overwrite.
#[must_use]
pub fn admin_set_prompt() -> Message {
    Message::private("Pick a member to change:").row(vec![member_select(&Intent::PickTargetForAdminSet)])
}

/// Private prompt to pick whom to reset.
#[must_use]
pub fn admin_reset_prompt() -> Message {
    Message::private("Pick a member to reset:").row(vec![member_select(&Intent::PickTargetForAdminReset)])
}

/// Private confirmation before wiping everything.
#[must_use]
pub fn full_reset_confirmation() -> Message {
    Message::private("Are you sure you want to **wipe ALL data**? This cannot be undone.").row(vec![
        button(&Intent::ConfirmFullReset, "Confirm", ButtonStyle::Danger),
        button(&Intent::CancelFullReset, "Cancel", ButtonStyle::Secondary),
    ])
}

// ========== Forms ==========

/// One-field form for an increment.
#[must_use]
pub fn amount_modal(category: Category, target: &UserId) -> Modal {
    Modal {
        custom_id: Intent::EnterAmount {
            category,
            target: target.clone(),
        }
        .encode(),
        title: format!("Amount for {}", category.label().to_uppercase()),
        inputs: vec![TextInput {
            custom_id: AMOUNT_FIELD.to_string(),
            label: "Amount (whole number)".to_string(),
        }],
    }
}

/// Three-field form for an absolute set, keyed by category tag.
#[must_use]
pub fn values_modal(target: &UserId) -> Modal {
    Modal {
        custom_id: Intent::EnterAdminValues { target: target.clone() }.encode(),
        title: "Set values".to_string(),
        inputs: Category::ALL
            .into_iter()
            .map(|c| TextInput {
                custom_id: c.tag().to_string(),
                label: c.label().to_string(),
            })
            .collect(),
    }
}

// ========== Outcomes ==========

/// Public confirmation of an increment.
#[must_use]
pub fn amount_added(target: &UserId, category: Category, amount: i64, counters: &Counters) -> Message {
    Message::public(format!(
        "Added **{amount} {category}** for {}. Total: {}",
        target.mention(),
        counters.total()
    ))
}

/// Public confirmation of an absolute set.
#[must_use]
pub fn values_set(target: &UserId, counters: &Counters) -> Message {
    Message::public(format!(
        "Values set for {}: C:{} M:{} W:{}",
        target.mention(),
        counters.coke,
        counters.meth,
        counters.weed
    ))
}

/// Public confirmation of a single-member reset.
#[must_use]
pub fn player_reset(target: &UserId) -> Message {
    Message::public(format!("Data for {} has been reset.", target.mention()))
}

/// Public stats card for `/lookup`.
#[must_use]
pub fn stats(name: &str, counters: &Counters) -> Message {
    Message::embed(
        Embed::new(format!("Stats for {name}"), STATS_COLOR)
            .inline_field("Coke", counters.coke)
            .inline_field("Meth", counters.meth)
            .inline_field("Weed", counters.weed)
            .inline_field("Total", counters.total()),
    )
}

/// One leaderboard line.
#[must_use]
pub fn overview_line(rank: usize, user: &UserId, counters: &Counters) -> String {
    format!(
        "{rank}. {} — **{} total** | Coke: {} Meth: {} Weed: {}",
        user.mention(),
        counters.total(),
        counters.coke,
        counters.meth,
        counters.weed
    )
}

/// Public leaderboard card.
#[must_use]
pub fn overview(leaderboard: &Leaderboard, limit: usize) -> Message {
    let lines: Vec<String> = leaderboard
        .top
        .iter()
        .enumerate()
        .map(|(i, r)| overview_line(i + 1, &r.user_id, &r.counters))
        .collect();
    let body = if lines.is_empty() {
        NO_DATA_YET.to_string()
    } else {
        lines.join("\n")
    };

    let totals = &leaderboard.totals;
    Message::embed(
        Embed::new(format!("Top {limit} (total per player)"), OVERVIEW_COLOR)
            .description(body)
            .inline_field("Total Coke", totals.coke)
            .inline_field("Total Meth", totals.meth)
            .inline_field("Total Weed", totals.weed)
            .inline_field("All combined", leaderboard.grand_total()),
    )
}

/// Update after a full wipe; the confirmation buttons are stripped.
#[must_use]
pub fn full_reset_done(backed_up: bool) -> Message {
    if backed_up {
        Message::private("All players have been reset. The backup was posted in the backup channel.")
    } else {
        Message::private("All players have been reset. The backup could not be posted; check the logs.")
    }
}

/// Update after a cancelled full wipe; the confirmation buttons are stripped.
#[must_use]
pub fn full_reset_cancelled() -> Message {
    Message::private(RESET_CANCELLED)
}

/// Private denial.
#[must_use]
pub fn denied() -> Message {
    Message::private(DENIED)
}

/// Private validation error for the increment form.
#[must_use]
pub fn invalid_amount() -> Message {
    Message::private(INVALID_AMOUNT)
}

/// Private refusal of an increment that would overflow.
#[must_use]
pub fn amount_out_of_range() -> Message {
    Message::private(AMOUNT_OUT_OF_RANGE)
}

/// Private validation error for the admin set form.
#[must_use]
pub fn invalid_values() -> Message {
    Message::private(INVALID_VALUES)
}

/// Private generic failure.
#[must_use]
pub fn failure() -> Message {
    Message::private(FAILURE)
}

// ========== Archive ==========

/// Embeds carrying a backup report, each within the description limit.
#[must_use]
pub fn backup_embeds(report: &BackupReport) -> Vec<Embed> {
    let chunks = report.chunks(EMBED_DESCRIPTION_LIMIT);
    let parts = chunks.len();
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            let title = if parts == 1 {
                REPORT_TITLE.to_string()
            } else {
                format!("{REPORT_TITLE} ({}/{parts})", i + 1)
            };
            Embed::new(title, BACKUP_COLOR)
                .description(chunk)
                .timestamp(report.taken_at())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::counters::CounterRecord;
    use tally_core::{DateTime, Utc};

    #[test]
    fn test_panel_buttons_decode() {
        let panel = panel();
        let intents: Vec<Intent> = panel.custom_ids().filter_map(Intent::decode).collect();
        assert_eq!(intents.len(), 5);
        assert!(intents.contains(&Intent::ChooseCategory(Category::Weed)));
        assert!(intents.contains(&Intent::OpenAdminPanel));
    }

    #[test]
    fn test_overview_lines() {
        let leaderboard = Leaderboard {
            top: vec![
                CounterRecord::new(UserId::new("3"), Counters::new(12, 0, 0)),
                CounterRecord::new(UserId::new("1"), Counters::new(8, 0, 0)),
            ],
            totals: Counters::new(20, 0, 0),
        };
        let message = overview(&leaderboard, 10);
        let embed = &message.embeds[0];

        assert_eq!(
            embed.description.as_deref(),
            Some(
                "1. <@3> — **12 total** | Coke: 12 Meth: 0 Weed: 0\n\
                 2. <@1> — **8 total** | Coke: 8 Meth: 0 Weed: 0"
            )
        );
        assert_eq!(embed.fields[3].value, "20");
    }

    #[test]
    fn test_empty_overview() {
        let message = overview(&Leaderboard::default(), 10);
        assert_eq!(message.embeds[0].description.as_deref(), Some(NO_DATA_YET));
    }

    #[test]
    fn test_amount_added_shows_new_total() {
        let message = amount_added(&UserId::new("7"), Category::Meth, 3, &Counters::new(1, 3, 4));
        assert_eq!(message.content.as_deref(), Some("Added **3 meth** for <@7>. Total: 8"));
    }

    #[test]
    fn test_values_modal_has_one_input_per_category() {
        let modal = values_modal(&UserId::new("9"));
        let keys: Vec<&str> = modal.inputs.iter().map(|i| i.custom_id.as_str()).collect();
        assert_eq!(keys, vec!["coke", "meth", "weed"]);
        assert_eq!(
            Intent::decode(&modal.custom_id),
            Some(Intent::EnterAdminValues { target: UserId::new("9") })
        );
    }

    #[test]
    fn test_long_backup_is_split() {
        let records = (0..200)
            .map(|i| CounterRecord::new(UserId::new(format!("{:018}", i)), Counters::new(i, i, i)))
            .collect();
        let report = BackupReport::new(records, DateTime::<Utc>::default());
        let embeds = backup_embeds(&report);

        assert!(embeds.len() > 1);
        assert!(embeds[0].title.ends_with(&format!("(1/{})", embeds.len())));
        assert!(
            embeds
                .iter()
                .all(|e| e.description.as_ref().is_some_and(|d| d.chars().count() <= EMBED_DESCRIPTION_LIMIT))
        );
    }
}
