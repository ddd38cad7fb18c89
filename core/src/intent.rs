//! Correlation codec: what happens next, carried in a component identifier.
//!
//! A flow such as "press a category button, pick a member, type an amount"
//! spans several unrelated event deliveries. Nothing is remembered between
//! them; each component the bot renders carries an encoded [`Intent`] in its
//! identifier, and the next event decodes it back.
//!
//! # Wire Layout
//!
//! Segments joined by [`SEPARATOR`]:
//!
//! ```text
//! panel:<category>            overview
//! staff:panel                 staff:set              staff:reset
//! staff:reset-all             staff:reset-all:confirm
//! staff:reset-all:cancel
//! pick:<category>             pick:staff-set         pick:staff-reset
//! amount:<category>:<user…>   values:<user…>
//! ```
//!
//! A target user is everything after the fixed segments, rejoined with the
//! separator, so user identifiers containing `:` survive the round trip.
//! Decoding fails closed: anything unrecognized yields no intent.

use crate::counters::{Category, UserId};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Segment separator.
pub const SEPARATOR: char = ':';

/// Longest identifier the chat platform accepts on a component.
pub const MAX_CUSTOM_ID_LEN: usize = 100;

const OVERVIEW: &str = "overview";
const PANEL: &str = "panel";
const STAFF: &str = "staff";
const PICK: &str = "pick";
const AMOUNT: &str = "amount";
const VALUES: &str = "values";

/// Error returned when an identifier does not decode to any intent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unrecognized component identifier: {0}")]
pub struct IntentParseError(String);

/// The kind of UI component an intent is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Surface {
    /// A clickable button
    Button,
    /// A single-user select menu
    UserSelect,
    /// A modal form
    Modal,
}

/// Stateless descriptor of the next step of a flow.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Intent {
    // ========== Panel buttons ==========
    /// Start an increment for a category
    ChooseCategory(Category),
    /// Show the leaderboard
    ShowOverview,
    /// Open the staff panel
    OpenAdminPanel,
    /// Start an absolute set
    ChooseAdminSet,
    /// Start a single-player reset
    ChooseAdminReset,
    /// Ask for confirmation of a full wipe
    RequestFullReset,
    /// Confirm the full wipe
    ConfirmFullReset,
    /// Abort the full wipe
    CancelFullReset,

    // ========== User selects ==========
    /// Pick the member whose category counter is incremented
    PickTargetForCategory(Category),
    /// Pick the member whose counters are overwritten
    PickTargetForAdminSet,
    /// Pick the member whose counters are reset
    PickTargetForAdminReset,

    // ========== Modals ==========
    /// Amount form for an increment
    EnterAmount {
        /// Category to increment
        category: Category,
        /// Member to credit
        target: UserId,
    },
    /// Three-field form for an absolute set
    EnterAdminValues {
        /// Member to overwrite
        target: UserId,
    },
}

impl Intent {
    /// Encode into a component identifier.
    #[must_use]
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Decode a component identifier, failing closed.
    #[must_use]
    pub fn decode(custom_id: &str) -> Option<Self> {
        if custom_id.is_empty() || custom_id.len() > MAX_CUSTOM_ID_LEN {
            return None;
        }

        let segments: Vec<&str> = custom_id.split(SEPARATOR).collect();
        let intent = match segments.as_slice() {
            [OVERVIEW] => Self::ShowOverview,
            [PANEL, tag] => Self::ChooseCategory(Category::from_tag(tag)?),
            [STAFF, "panel"] => Self::OpenAdminPanel,
            [STAFF, "set"] => Self::ChooseAdminSet,
            [STAFF, "reset"] => Self::ChooseAdminReset,
            [STAFF, "reset-all"] => Self::RequestFullReset,
            [STAFF, "reset-all", "confirm"] => Self::ConfirmFullReset,
            [STAFF, "reset-all", "cancel"] => Self::CancelFullReset,
            [PICK, "staff-set"] => Self::PickTargetForAdminSet,
            [PICK, "staff-reset"] => Self::PickTargetForAdminReset,
            [PICK, tag] => Self::PickTargetForCategory(Category::from_tag(tag)?),
            [AMOUNT, tag, target @ ..] => Self::EnterAmount {
                category: Category::from_tag(tag)?,
                target: rejoin(target)?,
            },
            [VALUES, target @ ..] => Self::EnterAdminValues {
                target: rejoin(target)?,
            },
            _ => return None,
        };
        Some(intent)
    }

    /// Whether acting on this intent requires the privileged role.
    #[must_use]
    pub const fn is_privileged(&self) -> bool {
        match self {
            Self::OpenAdminPanel
            | Self::ChooseAdminSet
            | Self::ChooseAdminReset
            | Self::RequestFullReset
            | Self::ConfirmFullReset
            | Self::CancelFullReset
            | Self::PickTargetForAdminSet
            | Self::PickTargetForAdminReset
            | Self::EnterAdminValues { .. } => true,
            Self::ChooseCategory(_)
            | Self::ShowOverview
            | Self::PickTargetForCategory(_)
            | Self::EnterAmount { .. } => false,
        }
    }

    /// The component kind this intent is attached to.
    #[must_use]
    pub const fn surface(&self) -> Surface {
        match self {
            Self::ChooseCategory(_)
            | Self::ShowOverview
            | Self::OpenAdminPanel
            | Self::ChooseAdminSet
            | Self::ChooseAdminReset
            | Self::RequestFullReset
            | Self::ConfirmFullReset
            | Self::CancelFullReset => Surface::Button,
            Self::PickTargetForCategory(_)
            | Self::PickTargetForAdminSet
            | Self::PickTargetForAdminReset => Surface::UserSelect,
            Self::EnterAmount { .. } | Self::EnterAdminValues { .. } => Surface::Modal,
        }
    }
}

fn rejoin(segments: &[&str]) -> Option<UserId> {
    let joined = segments.join(&SEPARATOR.to_string());
    if joined.is_empty() {
        return None;
    }
    Some(UserId::new(joined))
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = SEPARATOR;
        match self {
            Self::ChooseCategory(category) => write!(f, "{PANEL}{sep}{category}"),
            Self::ShowOverview => f.write_str(OVERVIEW),
            Self::OpenAdminPanel => write!(f, "{STAFF}{sep}panel"),
            Self::ChooseAdminSet => write!(f, "{STAFF}{sep}set"),
            Self::ChooseAdminReset => write!(f, "{STAFF}{sep}reset"),
            Self::RequestFullReset => write!(f, "{STAFF}{sep}reset-all"),
            Self::ConfirmFullReset => write!(f, "{STAFF}{sep}reset-all{sep}confirm"),
            Self::CancelFullReset => write!(f, "{STAFF}{sep}reset-all{sep}cancel"),
            Self::PickTargetForCategory(category) => write!(f, "{PICK}{sep}{category}"),
            Self::PickTargetForAdminSet => write!(f, "{PICK}{sep}staff-set"),
            Self::PickTargetForAdminReset => write!(f, "{PICK}{sep}staff-reset"),
            Self::EnterAmount { category, target } => {
                write!(f, "{AMOUNT}{sep}{category}{sep}{target}")
            },
            Self::EnterAdminValues { target } => write!(f, "{VALUES}{sep}{target}"),
        }
    }
}

impl FromStr for Intent {
    type Err = IntentParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s).ok_or_else(|| IntentParseError(s.to_string()))
    }
}
