//! Types for the interaction state machine.
//!
//! Inbound events, the reducer's actions and state, and the platform-neutral
//! reply model that the Discord adapter turns into wire JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tally_core::counters::{Category, Counters, Leaderboard, UserId};
use tally_core::intent::Surface;

// ============================================================================
// Inbound
// ============================================================================

/// Platform identifier of one inbound event.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InteractionId(String);

impl InteractionId {
    /// Create a new `InteractionId`.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InteractionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who triggered an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// The invoking member
    pub user_id: UserId,
    /// Role names held in the guild the event came from
    pub role_names: Vec<String>,
}

impl Actor {
    /// Create an actor.
    #[must_use]
    pub fn new(user_id: impl Into<UserId>, role_names: Vec<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role_names,
        }
    }
}

/// Slash commands the bot registers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// `/panel`: post the public panel
    Panel,
    /// `/lookup player`: show one member's counters
    Lookup {
        /// Member to show
        user: UserId,
        /// Display name for the embed title
        name: String,
    },
}

/// What kind of event arrived.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionKind {
    /// Slash command invocation
    Command(Command),
    /// Button press
    Button {
        /// Identifier of the pressed button
        custom_id: String,
    },
    /// Single-user select
    UserSelect {
        /// Identifier of the select menu
        custom_id: String,
        /// Selected members (at most one in practice)
        values: Vec<UserId>,
    },
    /// Modal form submission
    ModalSubmit {
        /// Identifier of the modal
        custom_id: String,
        /// Text input values by input identifier
        fields: BTreeMap<String, String>,
    },
}

impl InteractionKind {
    /// Short name used in logs and metric labels.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Command(_) => "command",
            Self::Button { .. } => "button",
            Self::UserSelect { .. } => "user_select",
            Self::ModalSubmit { .. } => "modal_submit",
        }
    }

    /// The component surface that produced this event, if any.
    #[must_use]
    pub const fn surface(&self) -> Option<Surface> {
        match self {
            Self::Command(_) => None,
            Self::Button { .. } => Some(Surface::Button),
            Self::UserSelect { .. } => Some(Surface::UserSelect),
            Self::ModalSubmit { .. } => Some(Surface::Modal),
        }
    }
}

/// One inbound event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    /// Correlates the event with its single reply
    pub id: InteractionId,
    /// Who triggered it
    pub actor: Actor,
    /// What was triggered
    pub kind: InteractionKind,
}

// ============================================================================
// Replies
// ============================================================================

/// Who can see a new message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    /// Everyone in the channel
    Public,
    /// Only the actor
    Private,
}

/// Button colors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonStyle {
    /// Blurple
    Primary,
    /// Grey
    Secondary,
    /// Green
    Success,
    /// Red
    Danger,
}

/// An interactive component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Component {
    /// Clickable button
    Button {
        /// Encoded intent
        custom_id: String,
        /// Visible label
        label: String,
        /// Color
        style: ButtonStyle,
    },
    /// Select exactly one member
    UserSelect {
        /// Encoded intent
        custom_id: String,
        /// Placeholder text
        placeholder: String,
    },
}

impl Component {
    /// Identifier carried by the component.
    #[must_use]
    pub fn custom_id(&self) -> &str {
        match self {
            Self::Button { custom_id, .. } | Self::UserSelect { custom_id, .. } => custom_id,
        }
    }
}

/// A horizontal row of components.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRow {
    /// Components left to right
    pub components: Vec<Component>,
}

/// One name/value pair in an embed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    /// Field title
    pub name: String,
    /// Field body
    pub value: String,
    /// Render side by side with neighbours
    pub inline: bool,
}

/// Rich card attached to a message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    /// Card title
    pub title: String,
    /// Card body
    pub description: Option<String>,
    /// Name/value pairs
    pub fields: Vec<EmbedField>,
    /// Side stripe color (RGB)
    pub color: u32,
    /// Footer timestamp
    pub timestamp: Option<DateTime<Utc>>,
}

impl Embed {
    /// Create an embed with a title and color.
    #[must_use]
    pub fn new(title: impl Into<String>, color: u32) -> Self {
        Self {
            title: title.into(),
            color,
            ..Self::default()
        }
    }

    /// Set the body.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Append an inline field.
    #[must_use]
    pub fn inline_field(mut self, name: impl Into<String>, value: impl fmt::Display) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.to_string(),
            inline: true,
        });
        self
    }

    /// Set the timestamp.
    #[must_use]
    pub const fn timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.timestamp = Some(at);
        self
    }
}

/// A message body, new or edited.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Plain text
    pub content: Option<String>,
    /// Rich cards
    pub embeds: Vec<Embed>,
    /// Interactive rows; empty strips any existing components on update
    pub rows: Vec<ActionRow>,
    /// Ignored for updates, which keep the original message's visibility
    pub visibility: Visibility,
}

impl Message {
    /// A text message visible to everyone.
    #[must_use]
    pub fn public(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            embeds: Vec::new(),
            rows: Vec::new(),
            visibility: Visibility::Public,
        }
    }

    /// A text message visible only to the actor.
    #[must_use]
    pub fn private(content: impl Into<String>) -> Self {
        Self {
            visibility: Visibility::Private,
            ..Self::public(content)
        }
    }

    /// An embed-only message visible to everyone.
    #[must_use]
    pub fn embed(embed: Embed) -> Self {
        Self {
            content: None,
            embeds: vec![embed],
            rows: Vec::new(),
            visibility: Visibility::Public,
        }
    }

    /// Append a row of components.
    #[must_use]
    pub fn row(mut self, components: Vec<Component>) -> Self {
        self.rows.push(ActionRow { components });
        self
    }

    /// Every component identifier in the message.
    pub fn custom_ids(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().flat_map(|r| r.components.iter().map(Component::custom_id))
    }
}

/// Single-line text input in a modal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextInput {
    /// Key of the submitted value
    pub custom_id: String,
    /// Visible label
    pub label: String,
}

/// Pop-up form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modal {
    /// Encoded intent
    pub custom_id: String,
    /// Form title
    pub title: String,
    /// Inputs, top to bottom (all required)
    pub inputs: Vec<TextInput>,
}

/// The one response to an interaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    /// Send a new message
    Message(Message),
    /// Edit the message holding the triggering component
    Update(Message),
    /// Open a form
    Modal(Modal),
}

impl Reply {
    /// Text content of a message reply, if any.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Message(m) | Self::Update(m) => m.content.as_deref(),
            Self::Modal(_) => None,
        }
    }

    /// Visibility of a new message; `None` for updates and modals.
    #[must_use]
    pub const fn visibility(&self) -> Option<Visibility> {
        match self {
            Self::Message(m) => Some(m.visibility),
            Self::Update(_) | Self::Modal(_) => None,
        }
    }
}

// ============================================================================
// State
// ============================================================================

/// Process-lifetime tallies, for logs and tests.
///
/// Holds nothing about individual flows; every transition is reconstructed
/// from the intent decoded out of the triggering event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotState {
    /// Events received
    pub received: u64,
    /// Events dropped as unrecognized
    pub ignored: u64,
    /// Privileged steps refused
    pub denied: u64,
    /// Submissions refused by validation
    pub rejected: u64,
    /// Storage writes committed
    pub committed: u64,
    /// Flows that ended in the generic failure reply
    pub failed: u64,
}

// ============================================================================
// Actions
// ============================================================================

/// Actions for the interaction reducer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BotAction {
    // ========== Inbound ==========
    /// An event arrived from the platform
    Received(Interaction),

    // ========== Storage outcomes ==========
    /// An increment was committed
    AmountAdded {
        /// Interaction being answered
        interaction: InteractionId,
        /// Credited member
        target: UserId,
        /// Incremented category
        category: Category,
        /// Delta as entered
        amount: i64,
        /// Counters after the increment
        counters: Counters,
    },
    /// An increment was refused because the counter would overflow
    AmountRefused {
        /// Interaction being answered
        interaction: InteractionId,
        /// Member that would have been credited
        target: UserId,
        /// Category that would overflow
        category: Category,
        /// Delta as entered
        amount: i64,
    },
    /// An absolute set was committed
    ValuesSet {
        /// Interaction being answered
        interaction: InteractionId,
        /// Overwritten member
        target: UserId,
        /// Values written
        counters: Counters,
    },
    /// A single member was reset to zero
    PlayerReset {
        /// Interaction being answered
        interaction: InteractionId,
        /// Reset member
        target: UserId,
    },
    /// One member's counters were read
    StatsLoaded {
        /// Interaction being answered
        interaction: InteractionId,
        /// Looked-up member
        user: UserId,
        /// Display name for the embed title
        name: String,
        /// Their counters (zero when never written)
        counters: Counters,
    },
    /// The leaderboard was computed
    LeaderboardLoaded {
        /// Interaction being answered
        interaction: InteractionId,
        /// Top members and sums
        leaderboard: Leaderboard,
    },
    /// The pre-wipe report was taken and handed to the archive
    BackupSettled {
        /// Interaction being answered
        interaction: InteractionId,
        /// Members in the report
        rows: usize,
        /// Whether the archive accepted it
        delivered: bool,
    },
    /// Every record was deleted
    AllWiped {
        /// Interaction being answered
        interaction: InteractionId,
        /// Records removed
        removed: u64,
        /// Whether the report reached the archive first
        backed_up: bool,
    },
    /// A storage step failed
    Failed {
        /// Interaction being answered
        interaction: InteractionId,
        /// What went wrong, for logs
        reason: String,
    },

    // ========== Terminal ==========
    /// The interaction's one reply
    Responded {
        /// Interaction being answered
        interaction: InteractionId,
        /// The reply
        reply: Reply,
    },
    /// The interaction gets no reply
    Ignored {
        /// Interaction being dropped
        interaction: InteractionId,
    },
}

impl BotAction {
    /// Whether this is the terminal action for `id`.
    #[must_use]
    pub fn settles(&self, id: &InteractionId) -> bool {
        match self {
            Self::Responded { interaction, .. } | Self::Ignored { interaction } => interaction == id,
            _ => false,
        }
    }

    /// Whether this action ends an interaction.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Responded { .. } | Self::Ignored { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settles_matches_only_terminal_actions_for_the_id() {
        let id = InteractionId::new("1");
        let other = InteractionId::new("2");

        assert!(BotAction::Ignored { interaction: id.clone() }.settles(&id));
        assert!(!BotAction::Ignored { interaction: other.clone() }.settles(&id));
        assert!(
            !BotAction::Failed {
                interaction: id.clone(),
                reason: String::new()
            }
            .settles(&id)
        );
        assert!(
            BotAction::Responded {
                interaction: id.clone(),
                reply: Reply::Message(Message::private("x")),
            }
            .settles(&id)
        );
    }

    #[test]
    fn test_custom_ids_walks_every_row() {
        let message = Message::public("panel")
            .row(vec![Component::Button {
                custom_id: "a".into(),
                label: "A".into(),
                style: ButtonStyle::Primary,
            }])
            .row(vec![Component::UserSelect {
                custom_id: "b".into(),
                placeholder: "Pick".into(),
            }]);
        assert_eq!(message.custom_ids().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
