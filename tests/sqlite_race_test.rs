//! Concurrent lifecycle operations against the SQLite store.

use settlement_engine::domain::{
    AccountId, Decimal, EntryKind, OutcomeMode, PositionStatus, TimeMs, TradableConfig,
    TradableId, TradableKind, Wallet, MS_PER_MINUTE,
};
use settlement_engine::engine::{
    Clock, CloseOutcome, ManualClock, OpenRequest, OutcomeResolver, PositionLifecycle, RandomWalk,
    ResolveOutcome, TransactionJournal,
};
use settlement_engine::{init_db, EngineError, Repository, Store};
use std::sync::Arc;
use tempfile::TempDir;

const DAY_MS: i64 = 24 * 60 * MS_PER_MINUTE;

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

struct Env {
    store: Arc<dyn Store>,
    clock: Arc<ManualClock>,
    lifecycle: PositionLifecycle,
    journal: TransactionJournal,
    owner: AccountId,
    _temp: TempDir,
}

async fn env_with_trading(trading: &str) -> Env {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("race.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let store: Arc<dyn Store> = Arc::new(Repository::new(pool));
    let clock = Arc::new(ManualClock::new(TimeMs::new(1_700_000_000_000)));

    store
        .upsert_tradable(&TradableConfig {
            id: TradableId::new("weekly"),
            name: "Weekly".to_string(),
            kind: TradableKind::Plan,
            roi_or_profit_percentage: d("10"),
            loss_percentage: d("5"),
            duration_ms: Some(7 * DAY_MS),
            volatility_percentage: d("0"),
            outcome_mode: OutcomeMode::Auto,
            min_exposure: d("10"),
            max_exposure: d("100000"),
            max_leverage: d("1"),
            updated_at: clock.now(),
        })
        .await
        .unwrap();

    let lifecycle = PositionLifecycle::new(
        store.clone(),
        OutcomeResolver::new(Arc::new(RandomWalk::seeded(1))),
        clock.clone(),
        Wallet::Profit,
    );
    let journal = TransactionJournal::new(store.clone(), clock.clone());

    let owner = AccountId::new("carol");
    journal.create_account(owner.clone()).await.unwrap();
    let deposit = journal
        .request_deposit(&owner, d(trading), None)
        .await
        .unwrap();
    let approved = journal.approve(&deposit.id).await.unwrap();
    assert!(matches!(approved, ResolveOutcome::Resolved { .. }));
    journal
        .transfer(&owner, Wallet::Deposit, Wallet::Trading, d(trading))
        .await
        .unwrap();

    Env {
        store,
        clock,
        lifecycle,
        journal,
        owner,
        _temp: temp_dir,
    }
}

impl Env {
    fn request(&self, amount: &str) -> OpenRequest {
        OpenRequest {
            owner: self.owner.clone(),
            tradable_id: TradableId::new("weekly"),
            amount: d(amount),
            leverage: None,
        }
    }

    async fn settlement_count(&self) -> usize {
        self.store
            .list_ledger_entries(&self.owner)
            .await
            .unwrap()
            .iter()
            .filter(|e| e.kind == EntryKind::Settlement)
            .count()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_settles_credit_once() {
    let env = env_with_trading("1000").await;
    let position = env.lifecycle.open(env.request("200")).await.unwrap();
    env.clock.advance_ms(7 * DAY_MS);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let lifecycle = env.lifecycle.clone();
            let id = position.id;
            tokio::spawn(async move { lifecycle.settle_at_maturity(&id).await })
        })
        .collect();
    let outcomes: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let winners = outcomes
        .iter()
        .filter(|o| matches!(o, CloseOutcome::Closed { .. }))
        .count();
    assert_eq!(winners, 1);
    assert!(outcomes.iter().all(|o| matches!(
        o,
        CloseOutcome::Closed { .. } | CloseOutcome::AlreadyClosed(PositionStatus::Matured)
    )));

    let account = env.journal.account(&env.owner).await.unwrap();
    assert_eq!(account.profit_balance, d("220"));
    assert_eq!(account.total_balance(), d("1020"));
    assert_eq!(env.settlement_count().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_opens_respect_available_funds() {
    let env = env_with_trading("500").await;

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let lifecycle = env.lifecycle.clone();
            let request = env.request("150");
            tokio::spawn(async move { lifecycle.open(request).await })
        })
        .collect();
    let results: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let opened = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(opened, 3);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, EngineError::InsufficientFunds { .. })));

    let account = env.journal.account(&env.owner).await.unwrap();
    assert_eq!(account.trading_balance, d("50"));
    assert_eq!(env.lifecycle.list_for(&env.owner).await.unwrap().len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_racing_settle_has_one_winner() {
    let env = env_with_trading("1000").await;
    let position = env.lifecycle.open(env.request("400")).await.unwrap();
    env.clock.advance_ms(7 * DAY_MS - 1);

    let cancel = {
        let lifecycle = env.lifecycle.clone();
        let owner = env.owner.clone();
        let id = position.id;
        tokio::spawn(async move { lifecycle.cancel(&id, &owner).await })
    };
    let cancel_outcome = cancel.await.unwrap().unwrap();
    env.clock.advance_ms(1);
    let settle_outcome = env.lifecycle.settle_at_maturity(&position.id).await.unwrap();

    assert!(matches!(cancel_outcome, CloseOutcome::Closed { .. }));
    assert_eq!(
        settle_outcome,
        CloseOutcome::AlreadyClosed(PositionStatus::Cancelled)
    );
    let account = env.journal.account(&env.owner).await.unwrap();
    assert_eq!(account.trading_balance, d("1000"));
    assert_eq!(account.profit_balance, d("0"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_approvals_apply_once() {
    let env = env_with_trading("100").await;
    let deposit = env
        .journal
        .request_deposit(&env.owner, d("75"), Some("wire".to_string()))
        .await
        .unwrap();

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let journal = env.journal.clone();
            let id = deposit.id;
            tokio::spawn(async move { journal.approve(&id).await })
        })
        .collect();
    let outcomes: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let applied = outcomes
        .iter()
        .filter(|o| matches!(o, ResolveOutcome::Resolved { .. }))
        .count();
    assert_eq!(applied, 1);
    let account = env.journal.account(&env.owner).await.unwrap();
    assert_eq!(account.deposit_balance, d("75"));
}
