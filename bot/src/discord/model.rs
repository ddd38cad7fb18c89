//! Inbound interaction payloads as Discord sends them.
//!
//! Only the fields the bot reads are modelled; everything else is skipped by
//! serde. [`RawInteraction::into_inbound`] turns a payload into the
//! platform-neutral [`Interaction`] the reducer consumes.

use crate::types::{Actor, Command, Interaction, InteractionId, InteractionKind};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use tally_core::counters::UserId;
use thiserror::Error;

/// Name of the panel command.
pub const PANEL_COMMAND: &str = "panel";
/// Name of the lookup command.
pub const LOOKUP_COMMAND: &str = "lookup";
/// Name of the lookup command's user option.
pub const PLAYER_OPTION: &str = "player";

const PING: u8 = 1;
const APPLICATION_COMMAND: u8 = 2;
const MESSAGE_COMPONENT: u8 = 3;
const MODAL_SUBMIT: u8 = 5;

const BUTTON: u8 = 2;
const USER_SELECT: u8 = 5;

/// Errors converting a payload into an interaction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// A field the interaction type requires was absent.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Interaction or component type the bot does not handle.
    #[error("Unsupported type: {0}")]
    UnsupportedType(u8),

    /// Command name the bot never registered.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
}

/// A Discord user object.
#[derive(Debug, Clone, Deserialize)]
pub struct RawUser {
    /// Snowflake id
    pub id: String,
    /// Account name
    #[serde(default)]
    pub username: String,
}

/// A guild member object.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMember {
    /// The member's user
    pub user: Option<RawUser>,
    /// Role ids held in the guild
    #[serde(default)]
    pub roles: Vec<String>,
}

/// A command option.
#[derive(Debug, Clone, Deserialize)]
pub struct RawOption {
    /// Option name
    pub name: String,
    /// Option value; a user id for user options
    pub value: Option<serde_json::Value>,
}

/// Objects referenced by command options.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawResolved {
    /// Users by id
    #[serde(default)]
    pub users: HashMap<String, RawUser>,
}

/// One input inside a submitted modal row.
#[derive(Debug, Clone, Deserialize)]
pub struct RawInput {
    /// Input identifier
    pub custom_id: Option<String>,
    /// Submitted text
    pub value: Option<String>,
}

/// One row of a submitted modal.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRow {
    /// Inputs in the row
    #[serde(default)]
    pub components: Vec<RawInput>,
}

/// The `data` object of an interaction; its shape depends on the type.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawData {
    /// Command name
    pub name: Option<String>,
    /// Command options
    #[serde(default)]
    pub options: Vec<RawOption>,
    /// Resolved command references
    #[serde(default)]
    pub resolved: RawResolved,
    /// Component or modal identifier
    pub custom_id: Option<String>,
    /// Component type of a component event
    pub component_type: Option<u8>,
    /// Selected values of a select menu
    #[serde(default)]
    pub values: Vec<String>,
    /// Rows of a submitted modal
    #[serde(default)]
    pub components: Vec<RawRow>,
}

/// An inbound interaction payload.
#[derive(Debug, Clone, Deserialize)]
pub struct RawInteraction {
    /// Interaction id
    pub id: String,
    /// Interaction type
    #[serde(rename = "type")]
    pub kind: u8,
    /// Guild the interaction came from, absent in DMs
    pub guild_id: Option<String>,
    /// Invoking member (guild interactions)
    pub member: Option<RawMember>,
    /// Invoking user (DM interactions)
    pub user: Option<RawUser>,
    /// Type-specific data
    pub data: Option<RawData>,
}

/// A converted payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Endpoint health check from the platform
    Ping,
    /// An event for the reducer
    Event(Interaction),
    /// Well-formed, but names a command or component the bot does not handle
    Unhandled(ModelError),
}

impl RawInteraction {
    /// Role ids of the invoking member; empty outside guilds.
    #[must_use]
    pub fn role_ids(&self) -> &[String] {
        self.member.as_ref().map(|m| m.roles.as_slice()).unwrap_or_default()
    }

    /// Convert into an inbound event, with role ids already resolved to names.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MissingField`] when the payload lacks a field its
    /// type needs. Unknown commands and component types become
    /// [`Inbound::Unhandled`].
    pub fn into_inbound(self, role_names: Vec<String>) -> Result<Inbound, ModelError> {
        match self.convert(role_names) {
            Err(error @ (ModelError::UnknownCommand(_) | ModelError::UnsupportedType(_))) => {
                Ok(Inbound::Unhandled(error))
            },
            other => other,
        }
    }

    fn convert(self, role_names: Vec<String>) -> Result<Inbound, ModelError> {
        if self.kind == PING {
            return Ok(Inbound::Ping);
        }

        let user = self
            .member
            .and_then(|m| m.user)
            .or(self.user)
            .ok_or(ModelError::MissingField("member.user"))?;
        let data = self.data.ok_or(ModelError::MissingField("data"))?;

        let kind = match self.kind {
            APPLICATION_COMMAND => InteractionKind::Command(command(data)?),
            MESSAGE_COMPONENT => component(data)?,
            MODAL_SUBMIT => modal(data)?,
            other => return Err(ModelError::UnsupportedType(other)),
        };

        Ok(Inbound::Event(Interaction {
            id: InteractionId::new(self.id),
            actor: Actor::new(user.id, role_names),
            kind,
        }))
    }
}

fn command(data: RawData) -> Result<Command, ModelError> {
    let name = data.name.ok_or(ModelError::MissingField("data.name"))?;
    match name.as_str() {
        PANEL_COMMAND => Ok(Command::Panel),
        LOOKUP_COMMAND => {
            let user_id = data
                .options
                .iter()
                .find(|o| o.name == PLAYER_OPTION)
                .and_then(|o| o.value.as_ref())
                .and_then(serde_json::Value::as_str)
                .ok_or(ModelError::MissingField("data.options.player"))?
                .to_string();
            let name = data
                .resolved
                .users
                .get(&user_id)
                .map(|u| u.username.clone())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| user_id.clone());
            Ok(Command::Lookup {
                user: UserId::new(user_id),
                name,
            })
        },
        _ => Err(ModelError::UnknownCommand(name)),
    }
}

fn component(data: RawData) -> Result<InteractionKind, ModelError> {
    let custom_id = data.custom_id.ok_or(ModelError::MissingField("data.custom_id"))?;
    match data.component_type {
        Some(BUTTON) => Ok(InteractionKind::Button { custom_id }),
        Some(USER_SELECT) => Ok(InteractionKind::UserSelect {
            custom_id,
            values: data.values.into_iter().map(UserId::new).collect(),
        }),
        Some(other) => Err(ModelError::UnsupportedType(other)),
        None => Err(ModelError::MissingField("data.component_type")),
    }
}

fn modal(data: RawData) -> Result<InteractionKind, ModelError> {
    let custom_id = data.custom_id.ok_or(ModelError::MissingField("data.custom_id"))?;
    let fields: BTreeMap<String, String> = data
        .components
        .into_iter()
        .flat_map(|row| row.components)
        .filter_map(|input| Some((input.custom_id?, input.value?)))
        .collect();
    Ok(InteractionKind::ModalSubmit { custom_id, fields })
}
