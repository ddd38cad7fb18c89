//! The interaction state machine.
//!
//! A flow such as "pick a category, pick a member, type an amount" is a chain
//! of independent events. The reducer keeps nothing between them: each event
//! is routed by the [`Intent`] decoded from its component identifier, and
//! every event ends in exactly one terminal action
//! ([`BotAction::Responded`] or [`BotAction::Ignored`]).
//!
//! # Routing
//!
//! 1. Commands are handled directly.
//! 2. Component events decode their identifier. Unknown identifiers, and
//!    intents arriving from the wrong kind of component, are ignored.
//! 3. Privileged intents consult the role gate before anything else happens.
//! 4. The intent's handler replies, or starts a storage effect whose outcome
//!    comes back as a domain action and is then turned into the reply.

use crate::environment::BotEnvironment;
use crate::types::{BotAction, BotState, Command, Interaction, InteractionId, InteractionKind, Reply};
use crate::views;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;
use tally_core::backup::BackupReport;
use tally_core::counters::{Category, CounterStoreError, Counters, Leaderboard, UserId};
use tally_core::effect::Effect;
use tally_core::intent::Intent;
use tally_core::reducer::Reducer;
use tally_core::{SmallVec, smallvec};

/// Reducer for inbound interactions.
#[derive(Clone, Debug, Default)]
pub struct InteractionReducer;

impl InteractionReducer {
    /// Create a new reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn route(state: &mut BotState, interaction: Interaction, env: &BotEnvironment) -> Effect<BotAction> {
        let Interaction { id, actor, kind } = interaction;

        let decoded = match &kind {
            InteractionKind::Command(command) => return Self::command(id, command.clone(), env),
            InteractionKind::Button { custom_id }
            | InteractionKind::UserSelect { custom_id, .. }
            | InteractionKind::ModalSubmit { custom_id, .. } => Intent::decode(custom_id),
        };

        let Some(intent) = decoded.filter(|intent| Some(intent.surface()) == kind.surface()) else {
            state.ignored += 1;
            tracing::debug!(interaction = %id, kind = kind.label(), "Ignoring unrecognized component");
            return ignore(id);
        };

        if intent.is_privileged() {
            if let Err(denied) = env.gate.check(&actor.role_names) {
                state.denied += 1;
                tracing::warn!(interaction = %id, user = %actor.user_id, intent = %intent, error = %denied, "Denied");
                return respond(id, Reply::Message(views::denied()));
            }
        }

        tracing::debug!(interaction = %id, user = %actor.user_id, intent = %intent, "Routing");

        match (intent, kind) {
            // ========== Buttons ==========
            (Intent::ChooseCategory(category), _) => {
                respond(id, Reply::Message(views::category_prompt(category)))
            },
            (Intent::ShowOverview, _) => load_overview(id, env),
            (Intent::OpenAdminPanel, _) => respond(id, Reply::Message(views::admin_panel())),
            (Intent::ChooseAdminSet, _) => respond(id, Reply::Message(views::admin_set_prompt())),
            (Intent::ChooseAdminReset, _) => respond(id, Reply::Message(views::admin_reset_prompt())),
            (Intent::RequestFullReset, _) => {
                respond(id, Reply::Message(views::full_reset_confirmation()))
            },
            (Intent::ConfirmFullReset, _) => take_backup(id, env),
            (Intent::CancelFullReset, _) => {
                tracing::info!(interaction = %id, user = %actor.user_id, "Full reset cancelled");
                respond(id, Reply::Update(views::full_reset_cancelled()))
            },

            // ========== User selects ==========
            (intent, InteractionKind::UserSelect { values, .. }) => {
                let Some(target) = values.into_iter().next() else {
                    state.ignored += 1;
                    tracing::debug!(interaction = %id, "Ignoring empty selection");
                    return ignore(id);
                };
                match intent {
                    Intent::PickTargetForCategory(category) => {
                        respond(id, Reply::Modal(views::amount_modal(category, &target)))
                    },
                    Intent::PickTargetForAdminSet => respond(id, Reply::Modal(views::values_modal(&target))),
                    Intent::PickTargetForAdminReset => reset_player(id, target, env),
                    _ => ignore(id),
                }
            },

            // ========== Modals ==========
            (Intent::EnterAmount { category, target }, InteractionKind::ModalSubmit { fields, .. }) => {
                match parse_whole(&fields, views::AMOUNT_FIELD) {
                    Some(amount) => increment(id, target, category, amount, env),
                    None => {
                        state.rejected += 1;
                        tracing::debug!(interaction = %id, "Rejected non-numeric amount");
                        respond(id, Reply::Message(views::invalid_amount()))
                    },
                }
            },
            (Intent::EnterAdminValues { target }, InteractionKind::ModalSubmit { fields, .. }) => {
                match parse_counters(&fields) {
                    Some(counters) => set_values(id, target, counters, env),
                    None => {
                        state.rejected += 1;
                        tracing::debug!(interaction = %id, "Rejected non-numeric values");
                        respond(id, Reply::Message(views::invalid_values()))
                    },
                }
            },

            // Surfaces were matched above
            _ => {
                state.ignored += 1;
                ignore(id)
            },
        }
    }

    fn command(id: InteractionId, command: Command, env: &BotEnvironment) -> Effect<BotAction> {
        match command {
            Command::Panel => respond(id, Reply::Message(views::panel())),
            Command::Lookup { user, name } => {
                let counters = Arc::clone(&env.counters);
                Effect::future(async move {
                    Some(match counters.get(&user).await {
                        Ok(values) => BotAction::StatsLoaded {
                            interaction: id,
                            user,
                            name,
                            counters: values,
                        },
                        Err(error) => failed(id, &error),
                    })
                })
            },
        }
    }
}

impl Reducer for InteractionReducer {
    type State = BotState;
    type Action = BotAction;
    type Environment = BotEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            BotAction::Received(interaction) => {
                state.received += 1;
                smallvec![Self::route(state, interaction, env)]
            },

            // ========== Storage outcomes ==========
            BotAction::AmountAdded {
                interaction,
                target,
                category,
                amount,
                counters,
            } => {
                state.committed += 1;
                tracing::info!(interaction = %interaction, user = %target, category = %category, amount, "Amount added");
                smallvec![respond(
                    interaction,
                    Reply::Message(views::amount_added(&target, category, amount, &counters))
                )]
            },
            BotAction::AmountRefused {
                interaction,
                target,
                category,
                amount,
            } => {
                state.rejected += 1;
                tracing::info!(interaction = %interaction, user = %target, category = %category, amount, "Amount out of range");
                smallvec![respond(interaction, Reply::Message(views::amount_out_of_range()))]
            },
            BotAction::ValuesSet {
                interaction,
                target,
                counters,
            } => {
                state.committed += 1;
                tracing::info!(interaction = %interaction, user = %target, ?counters, "Values set");
                smallvec![respond(interaction, Reply::Message(views::values_set(&target, &counters)))]
            },
            BotAction::PlayerReset { interaction, target } => {
                state.committed += 1;
                tracing::info!(interaction = %interaction, user = %target, "Player reset");
                smallvec![respond(interaction, Reply::Message(views::player_reset(&target)))]
            },
            BotAction::StatsLoaded {
                interaction,
                name,
                counters,
                ..
            } => smallvec![respond(interaction, Reply::Message(views::stats(&name, &counters)))],
            BotAction::LeaderboardLoaded {
                interaction,
                leaderboard,
            } => smallvec![respond(
                interaction,
                Reply::Message(views::overview(&leaderboard, env.leaderboard_size))
            )],
            BotAction::BackupSettled {
                interaction,
                rows,
                delivered,
            } => {
                tracing::info!(interaction = %interaction, rows, delivered, "Backup settled, wiping");
                smallvec![wipe(interaction, delivered, env)]
            },
            BotAction::AllWiped {
                interaction,
                removed,
                backed_up,
            } => {
                state.committed += 1;
                tracing::warn!(interaction = %interaction, removed, backed_up, "All counters wiped");
                smallvec![respond(interaction, Reply::Update(views::full_reset_done(backed_up)))]
            },
            BotAction::Failed { interaction, reason } => {
                state.failed += 1;
                tracing::error!(interaction = %interaction, reason = %reason, "Interaction failed");
                smallvec![respond(interaction, Reply::Message(views::failure()))]
            },

            // ========== Terminal ==========
            BotAction::Responded { .. } | BotAction::Ignored { .. } => smallvec![Effect::None],
        }
    }
}

// ============================================================================
// Effects
// ============================================================================

fn respond(interaction: InteractionId, reply: Reply) -> Effect<BotAction> {
    Effect::future(async move { Some(BotAction::Responded { interaction, reply }) })
}

fn ignore(interaction: InteractionId) -> Effect<BotAction> {
    Effect::future(async move { Some(BotAction::Ignored { interaction }) })
}

fn failed(interaction: InteractionId, error: &impl Display) -> BotAction {
    BotAction::Failed {
        interaction,
        reason: error.to_string(),
    }
}

fn increment(
    interaction: InteractionId,
    target: UserId,
    category: Category,
    amount: i64,
    env: &BotEnvironment,
) -> Effect<BotAction> {
    let store = Arc::clone(&env.counters);
    Effect::future(async move {
        Some(match store.increment(&target, category, amount).await {
            Ok(counters) => BotAction::AmountAdded {
                interaction,
                target,
                category,
                amount,
                counters,
            },
            Err(CounterStoreError::Overflow { .. }) => BotAction::AmountRefused {
                interaction,
                target,
                category,
                amount,
            },
            Err(error) => failed(interaction, &error),
        })
    })
}

fn set_values(
    interaction: InteractionId,
    target: UserId,
    counters: Counters,
    env: &BotEnvironment,
) -> Effect<BotAction> {
    let store = Arc::clone(&env.counters);
    Effect::future(async move {
        Some(match store.set_all(&target, counters).await {
            Ok(()) => BotAction::ValuesSet {
                interaction,
                target,
                counters,
            },
            Err(error) => failed(interaction, &error),
        })
    })
}

fn reset_player(interaction: InteractionId, target: UserId, env: &BotEnvironment) -> Effect<BotAction> {
    let store = Arc::clone(&env.counters);
    Effect::future(async move {
        Some(match store.set_all(&target, Counters::ZERO).await {
            Ok(()) => BotAction::PlayerReset { interaction, target },
            Err(error) => failed(interaction, &error),
        })
    })
}

fn load_overview(interaction: InteractionId, env: &BotEnvironment) -> Effect<BotAction> {
    let store = Arc::clone(&env.counters);
    let limit = env.leaderboard_size;
    Effect::future(async move {
        Some(match futures::try_join!(store.top(limit), store.sum_all()) {
            Ok((top, totals)) => BotAction::LeaderboardLoaded {
                interaction,
                leaderboard: Leaderboard { top, totals },
            },
            Err(error) => failed(interaction, &error),
        })
    })
}

/// Snapshot every record and hand it to the archive.
///
/// A delivery that fails or outlasts `backup_timeout` is logged and reported
/// as `delivered: false`; the wipe still follows. A failed read ends the flow
/// before anything is deleted.
fn take_backup(interaction: InteractionId, env: &BotEnvironment) -> Effect<BotAction> {
    let store = Arc::clone(&env.counters);
    let archive = Arc::clone(&env.archive);
    let clock = Arc::clone(&env.clock);
    let limit = env.backup_timeout;
    Effect::future(async move {
        let records = match store.all().await {
            Ok(records) => records,
            Err(error) => return Some(failed(interaction, &error)),
        };

        let report = BackupReport::new(records, clock.now());
        let delivered = match tokio::time::timeout(limit, archive.deliver(&report)).await {
            Ok(Ok(())) => true,
            Ok(Err(error)) => {
                tracing::error!(
                    interaction = %interaction,
                    rows = report.len(),
                    error = %error,
                    "Backup delivery failed, continuing with wipe"
                );
                false
            },
            Err(_) => {
                tracing::error!(
                    interaction = %interaction,
                    rows = report.len(),
                    timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    "Backup delivery timed out, continuing with wipe"
                );
                false
            },
        };

        Some(BotAction::BackupSettled {
            interaction,
            rows: report.len(),
            delivered,
        })
    })
}

fn wipe(interaction: InteractionId, backed_up: bool, env: &BotEnvironment) -> Effect<BotAction> {
    let store = Arc::clone(&env.counters);
    Effect::future(async move {
        Some(match store.wipe_all().await {
            Ok(removed) => BotAction::AllWiped {
                interaction,
                removed,
                backed_up,
            },
            Err(error) => failed(interaction, &error),
        })
    })
}

// ============================================================================
// Validation
// ============================================================================

/// Base-10 whole number, surrounding whitespace allowed.
fn parse_whole(fields: &BTreeMap<String, String>, key: &str) -> Option<i64> {
    fields.get(key)?.trim().parse().ok()
}

/// All three category fields, or nothing.
fn parse_counters(fields: &BTreeMap<String, String>) -> Option<Counters> {
    Some(Counters::new(
        parse_whole(fields, Category::Coke.tag())?,
        parse_whole(fields, Category::Meth.tag())?,
        parse_whole(fields, Category::Weed.tag())?,
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::types::{Actor, Visibility};
    use tally_core::access::RoleGate;
    use tally_testing::{InMemoryCounterStore, RecordingArchive, ReducerTest, assertions, run_effects, test_clock};

    fn env(store: &InMemoryCounterStore) -> BotEnvironment {
        BotEnvironment::new(
            Arc::new(store.clone()),
            Arc::new(RecordingArchive::new()),
            Arc::new(test_clock()),
            RoleGate::new("."),
        )
    }

    fn event(kind: InteractionKind, roles: &[&str]) -> BotAction {
        BotAction::Received(Interaction {
            id: InteractionId::new("i-1"),
            actor: Actor::new("100", roles.iter().map(ToString::to_string).collect()),
            kind,
        })
    }

    fn modal(custom_id: &str, fields: &[(&str, &str)]) -> InteractionKind {
        InteractionKind::ModalSubmit {
            custom_id: custom_id.to_string(),
            fields: fields.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    async fn outcome(store: &InMemoryCounterStore, action: BotAction) -> (BotState, Vec<BotAction>) {
        let (state, effects) = ReducerTest::new(InteractionReducer::new())
            .with_env(env(store))
            .given_state(BotState::default())
            .when_action(action)
            .then_effects(|effects| assertions::assert_effects_count(effects, 1))
            .run();
        (state, run_effects(effects).await)
    }

    #[test]
    fn test_received_always_yields_one_effect() {
        ReducerTest::new(InteractionReducer::new())
            .with_env(env(&InMemoryCounterStore::new()))
            .given_state(BotState::default())
            .when_action(event(InteractionKind::Command(Command::Panel), &[]))
            .then_state(|state| assert_eq!(state.received, 1))
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn test_terminal_actions_have_no_effects() {
        ReducerTest::new(InteractionReducer::new())
            .with_env(env(&InMemoryCounterStore::new()))
            .given_state(BotState::default())
            .when_action(BotAction::Ignored {
                interaction: InteractionId::new("x"),
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[tokio::test]
    async fn test_unknown_identifier_is_ignored() {
        let store = InMemoryCounterStore::new();
        let action = event(InteractionKind::Button { custom_id: "drug_coke".into() }, &["."]);

        let (state, produced) = outcome(&store, action).await;
        assert_eq!(state.ignored, 1);
        assert_eq!(produced, vec![BotAction::Ignored { interaction: InteractionId::new("i-1") }]);
    }

    #[tokio::test]
    async fn test_intent_on_wrong_surface_is_ignored() {
        let store = InMemoryCounterStore::new();
        // A select-menu identifier arriving as a button press
        let action = event(InteractionKind::Button { custom_id: "pick:coke".into() }, &[]);

        let (state, produced) = outcome(&store, action).await;
        assert_eq!(state.ignored, 1);
        assert!(matches!(produced[0], BotAction::Ignored { .. }));
    }

    #[tokio::test]
    async fn test_empty_selection_is_ignored() {
        let store = InMemoryCounterStore::new();
        let action = event(
            InteractionKind::UserSelect {
                custom_id: "pick:meth".into(),
                values: vec![],
            },
            &[],
        );

        let (_, produced) = outcome(&store, action).await;
        assert!(matches!(produced[0], BotAction::Ignored { .. }));
    }

    #[tokio::test]
    async fn test_denied_admin_values_never_write() {
        let store = InMemoryCounterStore::new();
        let action = event(modal("values:200", &[("coke", "1"), ("meth", "2"), ("weed", "3")]), &["Member"]);

        let (state, produced) = outcome(&store, action).await;
        assert_eq!(state.denied, 1);
        assert!(store.is_empty());
        let BotAction::Responded { reply, .. } = &produced[0] else {
            panic!("expected a reply, got {produced:?}");
        };
        assert_eq!(reply.content(), Some(views::DENIED));
        assert_eq!(reply.visibility(), Some(Visibility::Private));
    }

    #[tokio::test]
    async fn test_non_numeric_amount_is_rejected_privately() {
        let store = InMemoryCounterStore::new();
        let action = event(modal("amount:coke:200", &[("amount", "five")]), &[]);

        let (state, produced) = outcome(&store, action).await;
        assert_eq!(state.rejected, 1);
        assert!(store.is_empty());
        let BotAction::Responded { reply, .. } = &produced[0] else {
            panic!("expected a reply, got {produced:?}");
        };
        assert_eq!(reply.content(), Some(views::INVALID_AMOUNT));
        assert_eq!(reply.visibility(), Some(Visibility::Private));
    }

    #[tokio::test]
    async fn test_one_bad_admin_field_rejects_all_three() {
        let store = InMemoryCounterStore::new();
        let action = event(modal("values:200", &[("coke", "1"), ("meth", "x"), ("weed", "3")]), &["."]);

        let (state, _) = outcome(&store, action).await;
        assert_eq!(state.rejected, 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_amount_commits_then_feeds_back() {
        let store = InMemoryCounterStore::new();
        let action = event(modal("amount:weed:200", &[("amount", " 12 ")]), &[]);

        let (_, produced) = outcome(&store, action).await;
        assert_eq!(
            produced,
            vec![BotAction::AmountAdded {
                interaction: InteractionId::new("i-1"),
                target: UserId::new("200"),
                category: Category::Weed,
                amount: 12,
                counters: Counters::new(0, 0, 12),
            }]
        );
    }

    #[tokio::test]
    async fn test_storage_failure_becomes_failed() {
        let store = InMemoryCounterStore::new();
        store.fail_writes(true);
        let action = event(modal("amount:coke:200", &[("amount", "1")]), &[]);

        let (_, produced) = outcome(&store, action).await;
        assert!(matches!(produced[0], BotAction::Failed { .. }));
    }

    #[test]
    fn test_parse_whole() {
        let fields: BTreeMap<String, String> =
            [("a", "-4"), ("b", "+7"), ("c", "3.5"), ("d", ""), ("e", "12abc")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();

        assert_eq!(parse_whole(&fields, "a"), Some(-4));
        assert_eq!(parse_whole(&fields, "b"), Some(7));
        assert_eq!(parse_whole(&fields, "c"), None);
        assert_eq!(parse_whole(&fields, "d"), None);
        assert_eq!(parse_whole(&fields, "e"), None);
        assert_eq!(parse_whole(&fields, "missing"), None);
    }
}
