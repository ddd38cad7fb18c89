//! End-to-end flows through the store, with in-memory storage and archive.
//!
//! Each step is driven only by the component identifiers found in the
//! previous reply, as a real member clicking through the UI would.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tally_bot::types::{Actor, Command, Message, Modal, Visibility};
use tally_bot::{
    BotAction, BotEnvironment, BotState, BotStore, Interaction, InteractionId, InteractionKind, InteractionReducer,
    Reply, views,
};
use tally_core::access::RoleGate;
use tally_core::backup::{Archive, ArchiveError, BackupReport};
use tally_core::counters::{CounterRecord, CounterStore, Counters, UserId};
use tally_core::environment::Clock;
use tally_testing::{InMemoryCounterStore, RecordingArchive, test_clock};

const STAFF: &str = ".";
const MEMBER: &str = "100";

struct Harness {
    store: BotStore,
    counters: InMemoryCounterStore,
    archive: RecordingArchive,
    next_id: AtomicU64,
}

impl Harness {
    fn new() -> Self {
        Self::with(InMemoryCounterStore::new(), RecordingArchive::new())
    }

    fn with(counters: InMemoryCounterStore, archive: RecordingArchive) -> Self {
        let env = BotEnvironment::new(
            Arc::new(counters.clone()),
            Arc::new(archive.clone()),
            Arc::new(test_clock()),
            RoleGate::new(STAFF),
        );
        Self::from_env(env, counters, archive)
    }

    /// Archive that answers only after `delay`, with the backup limited to `limit`.
    fn with_slow_archive(counters: InMemoryCounterStore, delay: Duration, limit: Duration) -> Self {
        let archive = RecordingArchive::new();
        let env = BotEnvironment::new(
            Arc::new(counters.clone()),
            Arc::new(SlowArchive {
                inner: archive.clone(),
                delay,
            }),
            Arc::new(test_clock()),
            RoleGate::new(STAFF),
        )
        .with_backup_timeout(limit);
        Self::from_env(env, counters, archive)
    }

    fn from_env(env: BotEnvironment, counters: InMemoryCounterStore, archive: RecordingArchive) -> Self {
        Self {
            store: BotStore::new(BotState::default(), InteractionReducer::new(), env),
            counters,
            archive,
            next_id: AtomicU64::new(1),
        }
    }

    async fn send(&self, kind: InteractionKind, roles: &[&str]) -> BotAction {
        let id = InteractionId::new(format!("i-{}", self.next_id.fetch_add(1, Ordering::SeqCst)));
        let interaction = Interaction {
            id: id.clone(),
            actor: Actor::new(MEMBER, roles.iter().map(ToString::to_string).collect()),
            kind,
        };
        self.store
            .send_and_wait_for(BotAction::Received(interaction), |a| a.settles(&id), Duration::from_secs(2))
            .await
            .unwrap()
    }

    async fn reply(&self, kind: InteractionKind, roles: &[&str]) -> Reply {
        match self.send(kind, roles).await {
            BotAction::Responded { reply, .. } => reply,
            other => panic!("expected a reply, got {other:?}"),
        }
    }

    async fn tallies(&self) -> BotState {
        self.store.state(Clone::clone).await
    }
}

struct SlowArchive {
    inner: RecordingArchive,
    delay: Duration,
}

impl Archive for SlowArchive {
    fn deliver<'a>(
        &'a self,
        report: &'a BackupReport,
    ) -> Pin<Box<dyn Future<Output = Result<(), ArchiveError>> + Send + 'a>> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            self.inner.deliver(report).await
        })
    }
}

fn button(custom_id: &str) -> InteractionKind {
    InteractionKind::Button {
        custom_id: custom_id.to_string(),
    }
}

fn select(custom_id: &str, user: &str) -> InteractionKind {
    InteractionKind::UserSelect {
        custom_id: custom_id.to_string(),
        values: vec![UserId::new(user)],
    }
}

fn submit(custom_id: &str, fields: &[(&str, &str)]) -> InteractionKind {
    InteractionKind::ModalSubmit {
        custom_id: custom_id.to_string(),
        fields: fields.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
    }
}

fn message(reply: Reply) -> Message {
    match reply {
        Reply::Message(message) => message,
        other => panic!("expected a new message, got {other:?}"),
    }
}

fn update(reply: Reply) -> Message {
    match reply {
        Reply::Update(message) => message,
        other => panic!("expected an update, got {other:?}"),
    }
}

fn modal(reply: Reply) -> Modal {
    match reply {
        Reply::Modal(modal) => modal,
        other => panic!("expected a modal, got {other:?}"),
    }
}

fn first_id(message: &Message) -> String {
    message.custom_ids().next().expect("message has components").to_string()
}

fn id_labelled(message: &Message, label: &str) -> String {
    message
        .rows
        .iter()
        .flat_map(|r| r.components.iter())
        .find_map(|c| match c {
            tally_bot::types::Component::Button { custom_id, label: l, .. } if l == label => Some(custom_id.clone()),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no button labelled {label}"))
}

// ============================================================================
// Increment flow
// ============================================================================

#[tokio::test]
async fn test_member_credits_an_amount_through_the_panel() {
    let h = Harness::new();

    let panel = message(h.reply(InteractionKind::Command(Command::Panel), &[]).await);
    assert_eq!(panel.visibility, Visibility::Public);

    let prompt = message(h.reply(button(&id_labelled(&panel, "Coke")), &[]).await);
    assert_eq!(prompt.visibility, Visibility::Private);

    let form = modal(h.reply(select(&first_id(&prompt), "200"), &[]).await);
    assert_eq!(form.inputs.len(), 1);

    let done = message(h.reply(submit(&form.custom_id, &[("amount", "5")]), &[]).await);
    assert_eq!(done.visibility, Visibility::Public);
    assert_eq!(done.content.as_deref(), Some("Added **5 coke** for <@200>. Total: 5"));

    let again = message(h.reply(submit(&form.custom_id, &[("amount", "3")]), &[]).await);
    assert_eq!(again.content.as_deref(), Some("Added **3 coke** for <@200>. Total: 8"));

    assert_eq!(h.counters.get(&UserId::new("200")).await.unwrap(), Counters::new(8, 0, 0));
    assert_eq!(h.tallies().await.committed, 2);
}

#[tokio::test]
async fn test_negative_amounts_are_applied_as_entered() {
    let h = Harness::new();
    h.reply(submit("amount:weed:200", &[("amount", "4")]), &[]).await;
    h.reply(submit("amount:weed:200", &[("amount", "-10")]), &[]).await;

    assert_eq!(h.counters.get(&UserId::new("200")).await.unwrap(), Counters::new(0, 0, -6));
}

#[tokio::test]
async fn test_non_numeric_amount_never_writes() {
    let h = Harness::new();

    for text in ["five", "", "1.5", "12abc"] {
        let reply = message(h.reply(submit("amount:meth:200", &[("amount", text)]), &[]).await);
        assert_eq!(reply.visibility, Visibility::Private);
        assert_eq!(reply.content.as_deref(), Some(views::INVALID_AMOUNT));
    }

    assert!(h.counters.is_empty());
    assert_eq!(h.tallies().await.rejected, 4);
}

#[tokio::test]
async fn test_amount_that_would_overflow_is_refused_privately() {
    let h = Harness::with(
        InMemoryCounterStore::with_records([CounterRecord::new(UserId::new("200"), Counters::new(i64::MAX, 0, 0))]),
        RecordingArchive::new(),
    );

    let refused = message(h.reply(submit("amount:coke:200", &[("amount", "1")]), &[]).await);
    assert_eq!(refused.visibility, Visibility::Private);
    assert_eq!(refused.content.as_deref(), Some(views::AMOUNT_OUT_OF_RANGE));
    assert_eq!(h.counters.get(&UserId::new("200")).await.unwrap(), Counters::new(i64::MAX, 0, 0));

    // The member's row still renders everywhere
    let overview = message(h.reply(button("overview"), &[]).await);
    assert!(overview.embeds[0].description.as_deref().unwrap().starts_with("1. <@200>"));

    let tallies = h.tallies().await;
    assert_eq!(tallies.rejected, 1);
    assert_eq!(tallies.failed, 0);
}

// ============================================================================
// Staff flows
// ============================================================================

#[tokio::test]
async fn test_staff_set_then_reset() {
    let h = Harness::new();

    let admin = message(h.reply(button("staff:panel"), &[STAFF]).await);
    let prompt = message(h.reply(button(&id_labelled(&admin, "Set values")), &[STAFF]).await);
    let form = modal(h.reply(select(&first_id(&prompt), "300"), &[STAFF]).await);
    assert_eq!(form.inputs.len(), 3);

    let set = message(
        h.reply(submit(&form.custom_id, &[("coke", "10"), ("meth", "2"), ("weed", "0")]), &[STAFF])
            .await,
    );
    assert_eq!(set.visibility, Visibility::Public);
    assert_eq!(set.content.as_deref(), Some("Values set for <@300>: C:10 M:2 W:0"));
    assert_eq!(h.counters.get(&UserId::new("300")).await.unwrap(), Counters::new(10, 2, 0));

    let prompt = message(h.reply(button(&id_labelled(&admin, "Reset player")), &[STAFF]).await);
    let reset = message(h.reply(select(&first_id(&prompt), "300"), &[STAFF]).await);
    assert_eq!(reset.visibility, Visibility::Public);
    assert_eq!(h.counters.get(&UserId::new("300")).await.unwrap(), Counters::ZERO);
}

#[tokio::test]
async fn test_partial_admin_values_are_all_or_nothing() {
    let h = Harness::with(
        InMemoryCounterStore::with_records([CounterRecord::new(UserId::new("300"), Counters::new(1, 1, 1))]),
        RecordingArchive::new(),
    );

    let reply = message(
        h.reply(submit("values:300", &[("coke", "9"), ("meth", "nope"), ("weed", "9")]), &[STAFF])
            .await,
    );
    assert_eq!(reply.content.as_deref(), Some(views::INVALID_VALUES));
    assert_eq!(h.counters.get(&UserId::new("300")).await.unwrap(), Counters::new(1, 1, 1));

    let missing = message(h.reply(submit("values:300", &[("coke", "9"), ("meth", "9")]), &[STAFF]).await);
    assert_eq!(missing.content.as_deref(), Some(views::INVALID_VALUES));
}

#[tokio::test]
async fn test_every_staff_step_is_refused_without_the_role() {
    let h = Harness::with(
        InMemoryCounterStore::with_records([CounterRecord::new(UserId::new("300"), Counters::new(5, 5, 5))]),
        RecordingArchive::new(),
    );

    let attempts = vec![
        button("staff:panel"),
        button("staff:set"),
        button("staff:reset"),
        button("staff:reset-all"),
        button("staff:reset-all:confirm"),
        button("staff:reset-all:cancel"),
        select("pick:staff-set", "300"),
        select("pick:staff-reset", "300"),
        submit("values:300", &[("coke", "0"), ("meth", "0"), ("weed", "0")]),
    ];
    let count = attempts.len();

    for kind in attempts {
        // A role with a similar name does not count
        let reply = message(h.reply(kind, &["Staff", ". "]).await);
        assert_eq!(reply.visibility, Visibility::Private);
        assert_eq!(reply.content.as_deref(), Some(views::DENIED));
        assert!(reply.rows.is_empty());
    }

    assert_eq!(
        h.counters.all().await.unwrap(),
        vec![CounterRecord::new(UserId::new("300"), Counters::new(5, 5, 5))]
    );
    assert!(h.archive.delivered().is_empty());
    assert_eq!(h.tallies().await.denied, u64::try_from(count).unwrap());
}

// ============================================================================
// Overview and lookup
// ============================================================================

#[tokio::test]
async fn test_overview_ranks_and_sums() {
    let h = Harness::with(
        InMemoryCounterStore::with_records([
            CounterRecord::new(UserId::new("1"), Counters::new(8, 0, 0)),
            CounterRecord::new(UserId::new("2"), Counters::ZERO),
            CounterRecord::new(UserId::new("3"), Counters::new(12, 0, 0)),
        ]),
        RecordingArchive::new(),
    );

    let overview = message(h.reply(button("overview"), &[]).await);
    assert_eq!(overview.visibility, Visibility::Public);

    let embed = &overview.embeds[0];
    let lines: Vec<&str> = embed.description.as_deref().unwrap().lines().collect();
    assert!(lines[0].starts_with("1. <@3>"));
    assert!(lines[1].starts_with("2. <@1>"));
    assert!(lines[2].starts_with("3. <@2>"));

    let field = |name: &str| embed.fields.iter().find(|f| f.name == name).map(|f| f.value.as_str());
    assert_eq!(field("Total Coke"), Some("20"));
    assert_eq!(field("Total Meth"), Some("0"));
    assert_eq!(field("All combined"), Some("20"));
}

#[tokio::test]
async fn test_lookup_of_unknown_member_shows_zeros() {
    let h = Harness::new();

    let stats = message(
        h.reply(
            InteractionKind::Command(Command::Lookup {
                user: UserId::new("404"),
                name: "bob".into(),
            }),
            &[],
        )
        .await,
    );

    assert_eq!(stats.visibility, Visibility::Public);
    assert_eq!(stats.embeds[0].title, "Stats for bob");
    assert!(stats.embeds[0].fields.iter().all(|f| f.value == "0"));
    assert!(h.counters.is_empty());
}

// ============================================================================
// Full reset
// ============================================================================

fn two_members() -> InMemoryCounterStore {
    InMemoryCounterStore::with_records([
        CounterRecord::new(UserId::new("1"), Counters::new(8, 1, 0)),
        CounterRecord::new(UserId::new("2"), Counters::new(0, 0, 3)),
    ])
}

#[tokio::test]
async fn test_confirmed_reset_backs_up_then_wipes() {
    let h = Harness::with(two_members(), RecordingArchive::new());

    let confirmation = message(h.reply(button("staff:reset-all"), &[STAFF]).await);
    assert_eq!(confirmation.visibility, Visibility::Private);

    let done = update(h.reply(button(&id_labelled(&confirmation, "Confirm")), &[STAFF]).await);
    assert!(done.rows.is_empty());
    assert_eq!(done, views::full_reset_done(true));

    let reports = h.archive.delivered();
    assert_eq!(reports.len(), 1);
    assert_eq!(
        reports[0].lines(),
        vec!["<@1> — C:8 M:1 W:0".to_string(), "<@2> — C:0 M:0 W:3".to_string()]
    );
    assert_eq!(reports[0].taken_at(), test_clock().now());

    assert!(h.counters.is_empty());
    assert_eq!(h.counters.sum_all().await.unwrap(), Counters::ZERO);
    assert_eq!(h.counters.get(&UserId::new("1")).await.unwrap(), Counters::ZERO);
}

#[tokio::test]
async fn test_reset_proceeds_when_the_archive_is_unreachable() {
    let h = Harness::with(two_members(), RecordingArchive::offline());

    let done = update(h.reply(button("staff:reset-all:confirm"), &[STAFF]).await);
    assert_eq!(done, views::full_reset_done(false));
    assert!(h.counters.is_empty());
}

#[tokio::test]
async fn test_slow_archive_does_not_outlast_the_reply() {
    let h = Harness::with_slow_archive(two_members(), Duration::from_secs(10), Duration::from_millis(100));

    let started = Instant::now();
    let done = update(h.reply(button("staff:reset-all:confirm"), &[STAFF]).await);

    assert_eq!(done, views::full_reset_done(false));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(h.counters.is_empty());
    assert!(h.archive.delivered().is_empty());
}

#[tokio::test]
async fn test_archive_within_the_limit_still_counts_as_backed_up() {
    let h = Harness::with_slow_archive(two_members(), Duration::from_millis(20), Duration::from_secs(1));

    let done = update(h.reply(button("staff:reset-all:confirm"), &[STAFF]).await);

    assert_eq!(done, views::full_reset_done(true));
    assert_eq!(h.archive.delivered().len(), 1);
    assert!(h.counters.is_empty());
}

#[tokio::test]
async fn test_reset_aborts_before_wiping_when_the_snapshot_fails() {
    let counters = two_members();
    counters.fail_reads(true);
    let h = Harness::with(counters, RecordingArchive::new());

    let reply = message(h.reply(button("staff:reset-all:confirm"), &[STAFF]).await);
    assert_eq!(reply.content.as_deref(), Some(views::FAILURE));
    assert_eq!(reply.visibility, Visibility::Private);

    assert_eq!(h.counters.len(), 2);
    assert!(h.archive.delivered().is_empty());
    assert_eq!(h.tallies().await.failed, 1);
}

#[tokio::test]
async fn test_cancelled_reset_touches_nothing() {
    let h = Harness::with(two_members(), RecordingArchive::new());

    let cancelled = update(h.reply(button("staff:reset-all:cancel"), &[STAFF]).await);
    assert_eq!(cancelled.content.as_deref(), Some(views::RESET_CANCELLED));
    assert!(cancelled.rows.is_empty());
    assert_eq!(h.counters.len(), 2);
    assert!(h.archive.delivered().is_empty());
}

// ============================================================================
// Unrecognized input
// ============================================================================

#[tokio::test]
async fn test_stale_and_foreign_components_are_ignored() {
    let h = Harness::new();

    let stale = [
        button("drug_coke"),
        button("panel:heroin"),
        // Right identifier, wrong kind of component
        button("amount:coke:200"),
        InteractionKind::UserSelect {
            custom_id: "pick:coke".into(),
            values: vec![],
        },
        submit("amount:coke:", &[("amount", "1")]),
    ];
    let count = stale.len();

    for kind in stale {
        let outcome = h.send(kind, &[STAFF]).await;
        assert!(matches!(outcome, BotAction::Ignored { .. }), "got {outcome:?}");
    }

    let tallies = h.tallies().await;
    assert_eq!(tallies.ignored, u64::try_from(count).unwrap());
    assert_eq!(tallies.received, tallies.ignored);
    assert!(h.counters.is_empty());
}
