//! Outbound JSON: interaction responses, messages, embeds and commands.

use crate::discord::model::{LOOKUP_COMMAND, PANEL_COMMAND, PLAYER_OPTION};
use crate::types::{ActionRow, ButtonStyle, Component, Embed, Message, Modal, Reply, Visibility};
use serde_json::{Value, json};

/// Response type: acknowledge a ping.
pub const PONG: u8 = 1;
/// Response type: send a new message.
pub const CHANNEL_MESSAGE: u8 = 4;
/// Response type: edit the message holding the component.
pub const UPDATE_MESSAGE: u8 = 7;
/// Response type: open a modal.
pub const MODAL: u8 = 9;

/// Message flag: only the invoking user sees the message.
pub const EPHEMERAL: u64 = 1 << 6;

const ACTION_ROW: u8 = 1;
const BUTTON: u8 = 2;
const TEXT_INPUT: u8 = 4;
const USER_SELECT: u8 = 5;

const SHORT_TEXT: u8 = 1;

const CHAT_INPUT: u8 = 1;
const USER_OPTION: u8 = 6;

/// Body answering a ping.
#[must_use]
pub fn pong() -> Value {
    json!({ "type": PONG })
}

/// Body answering an interaction with a reply.
#[must_use]
pub fn reply(reply: &Reply) -> Value {
    match reply {
        Reply::Message(message) => json!({ "type": CHANNEL_MESSAGE, "data": message_data(message, true) }),
        Reply::Update(message) => json!({ "type": UPDATE_MESSAGE, "data": message_data(message, false) }),
        Reply::Modal(modal) => json!({ "type": MODAL, "data": modal_data(modal) }),
    }
}

/// Message body, for replies and for channel posts.
///
/// Visibility only applies to new messages; an update keeps the original's.
/// Components are always sent so an empty list strips existing ones.
#[must_use]
pub fn message_data(message: &Message, new_message: bool) -> Value {
    let mut data = json!({
        "embeds": message.embeds.iter().map(embed).collect::<Vec<_>>(),
        "components": message.rows.iter().map(action_row).collect::<Vec<_>>(),
    });
    if let Some(content) = &message.content {
        data["content"] = json!(content);
    }
    if new_message && message.visibility == Visibility::Private {
        data["flags"] = json!(EPHEMERAL);
    }
    data
}

/// Embed object.
#[must_use]
pub fn embed(embed: &Embed) -> Value {
    let mut value = json!({
        "title": embed.title,
        "color": embed.color,
        "fields": embed
            .fields
            .iter()
            .map(|f| json!({ "name": f.name, "value": f.value, "inline": f.inline }))
            .collect::<Vec<_>>(),
    });
    if let Some(description) = &embed.description {
        value["description"] = json!(description);
    }
    if let Some(timestamp) = embed.timestamp {
        value["timestamp"] = json!(timestamp.to_rfc3339());
    }
    value
}

fn action_row(row: &ActionRow) -> Value {
    json!({
        "type": ACTION_ROW,
        "components": row.components.iter().map(component).collect::<Vec<_>>(),
    })
}

fn component(component: &Component) -> Value {
    match component {
        Component::Button { custom_id, label, style } => json!({
            "type": BUTTON,
            "style": button_style(*style),
            "label": label,
            "custom_id": custom_id,
        }),
        Component::UserSelect { custom_id, placeholder } => json!({
            "type": USER_SELECT,
            "custom_id": custom_id,
            "placeholder": placeholder,
            "min_values": 1,
            "max_values": 1,
        }),
    }
}

const fn button_style(style: ButtonStyle) -> u8 {
    match style {
        ButtonStyle::Primary => 1,
        ButtonStyle::Secondary => 2,
        ButtonStyle::Success => 3,
        ButtonStyle::Danger => 4,
    }
}

fn modal_data(modal: &Modal) -> Value {
    json!({
        "custom_id": modal.custom_id,
        "title": modal.title,
        "components": modal
            .inputs
            .iter()
            .map(|input| json!({
                "type": ACTION_ROW,
                "components": [{
                    "type": TEXT_INPUT,
                    "custom_id": input.custom_id,
                    "label": input.label,
                    "style": SHORT_TEXT,
                    "required": true,
                }],
            }))
            .collect::<Vec<_>>(),
    })
}

/// Global command definitions.
#[must_use]
pub fn commands() -> Value {
    json!([
        {
            "name": PANEL_COMMAND,
            "type": CHAT_INPUT,
            "description": "Open the RP panel",
        },
        {
            "name": LOOKUP_COMMAND,
            "type": CHAT_INPUT,
            "description": "Show a member's counters",
            "options": [{
                "type": USER_OPTION,
                "name": PLAYER_OPTION,
                "description": "Member to look up",
                "required": true,
            }],
        },
    ])
}
