//! Per-pool big prize relocation.
//!
//! Every active pool gets one task. On each tick the task re-reads the
//! pool and its members, then moves the big prize to a random active frog
//! that has not held it yet in the current cycle. Once every active frog
//! has held it the cycle restarts. When no active frog is left the pool
//! goes extinct: it completes without a winner and every connected player
//! is told the game is over.

use crate::entities::PoolStatus;
use crate::events::{PoolEvent, PoolEventHandler};
use crate::registry::ConnectionRegistry;
use crate::store::{GameStore, StoreError};
use crate::utils::utc_now;
use frogpool_sdk::objects::WsServerMessage;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Relocated { participant_id: i64, holder: String },
    /// The pool was completed elsewhere (or vanished).
    PoolClosed,
    /// No active frog was left; the pool completed without a winner.
    Extinct,
}

impl TickOutcome {
    fn is_terminal(&self) -> bool {
        !matches!(self, TickOutcome::Relocated { .. })
    }
}

struct RunningTask {
    generation: u64,
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct SchedulerInner {
    store: Arc<dyn GameStore>,
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
    rng_seed: Option<u64>,
    next_generation: AtomicU64,
    running: RwLock<HashMap<i64, RunningTask>>,
}

/// Owns the prize tasks of all active pools.
#[derive(Clone)]
pub struct PrizeLocationScheduler {
    inner: Arc<SchedulerInner>,
}

impl PrizeLocationScheduler {
    pub fn new(
        store: Arc<dyn GameStore>,
        registry: Arc<ConnectionRegistry>,
        interval: Duration,
    ) -> Self {
        Self::build(store, registry, interval, None)
    }

    /// Same as [`new`](Self::new) with a fixed random seed per pool.
    pub fn with_seed(
        store: Arc<dyn GameStore>,
        registry: Arc<ConnectionRegistry>,
        interval: Duration,
        seed: u64,
    ) -> Self {
        Self::build(store, registry, interval, Some(seed))
    }

    fn build(
        store: Arc<dyn GameStore>,
        registry: Arc<ConnectionRegistry>,
        interval: Duration,
        rng_seed: Option<u64>,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                store,
                registry,
                interval,
                rng_seed,
                next_generation: AtomicU64::new(0),
                running: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Start the prize task of `pool_id`, replacing a running one.
    pub async fn start(&self, pool_id: i64) {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let (stop_tx, stop_rx) = watch::channel(false);

        let mut running = self.inner.running.write().await;
        if let Some(previous) = running.remove(&pool_id) {
            debug!(pool_id, generation = previous.generation, "Stopping previous prize task");
            let _ = previous.stop_tx.send(true);
        }
        let handle = tokio::spawn(run_loop(self.inner.clone(), pool_id, generation, stop_rx));
        running.insert(
            pool_id,
            RunningTask {
                generation,
                stop_tx,
                handle,
            },
        );
        info!(pool_id, generation, "Prize task started");
    }

    /// Signal the prize task of `pool_id` to stop after its current tick.
    pub async fn stop(&self, pool_id: i64) -> bool {
        let removed = self.inner.running.write().await.remove(&pool_id);
        match removed {
            Some(task) => {
                let _ = task.stop_tx.send(true);
                info!(pool_id, "Prize task stopped");
                true
            }
            None => false,
        }
    }

    pub async fn is_running(&self, pool_id: i64) -> bool {
        self.inner.running.read().await.contains_key(&pool_id)
    }

    pub async fn running_count(&self) -> usize {
        self.inner.running.read().await.len()
    }

    /// Start a task for every pool that is active in the store. Called on
    /// boot, since tasks do not survive a restart.
    pub async fn resume_active_pools(&self) -> Result<usize, StoreError> {
        let pools = self.inner.store.list_active_pools().await?;
        for pool in &pools {
            self.start(pool.id).await;
        }
        info!(pools = pools.len(), "Resumed prize tasks");
        Ok(pools.len())
    }

    /// Stop every task and wait for them to finish their current tick.
    pub async fn stop_all(&self) {
        let tasks: Vec<(i64, RunningTask)> = self.inner.running.write().await.drain().collect();
        for (_, task) in &tasks {
            let _ = task.stop_tx.send(true);
        }
        for (pool_id, task) in tasks {
            if let Err(e) = task.handle.await {
                warn!(pool_id, error = %e, "Prize task ended abnormally");
            }
        }
        info!("All prize tasks stopped");
    }

    /// Run one relocation step for `pool_id`.
    ///
    /// `visited` holds the participant ids that already held the prize in
    /// the current cycle.
    pub async fn tick(
        &self,
        pool_id: i64,
        visited: &mut HashSet<i64>,
        rng: &mut StdRng,
    ) -> Result<TickOutcome, StoreError> {
        self.inner.tick(pool_id, visited, rng).await
    }
}

impl SchedulerInner {
    fn rng_for(&self, pool_id: i64) -> StdRng {
        match self.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ pool_id as u64),
            None => StdRng::from_os_rng(),
        }
    }

    async fn tick(
        &self,
        pool_id: i64,
        visited: &mut HashSet<i64>,
        rng: &mut StdRng,
    ) -> Result<TickOutcome, StoreError> {
        let Some(pool) = self.store.get_pool(pool_id).await? else {
            return Ok(TickOutcome::PoolClosed);
        };
        if pool.status == PoolStatus::Completed {
            return Ok(TickOutcome::PoolClosed);
        }

        let members = self.store.list_pool_members(pool_id).await?;
        let eligible: Vec<_> = members.iter().filter(|m| m.frog_active).collect();

        if eligible.is_empty() {
            return self.go_extinct(pool_id).await;
        }

        visited.retain(|id| eligible.iter().any(|m| m.participant_id == *id));
        if eligible.iter().all(|m| visited.contains(&m.participant_id)) {
            debug!(pool_id, "Every active frog held the prize, restarting cycle");
            visited.clear();
        }
        let candidates: Vec<_> = eligible
            .iter()
            .filter(|m| !visited.contains(&m.participant_id))
            .copied()
            .collect();
        let Some(chosen) = candidates.choose(rng) else {
            return Ok(TickOutcome::PoolClosed);
        };
        visited.insert(chosen.participant_id);

        if self
            .store
            .set_prize_holder(pool_id, &chosen.wallet_address)
            .await?
            .is_none()
        {
            return Ok(TickOutcome::PoolClosed);
        }
        debug!(pool_id, frog_id = chosen.frog_id, "Big prize relocated");

        let message = WsServerMessage::BigPrizeLocation {
            pool_id,
            holder_address: chosen.wallet_address.clone(),
        };
        self.registry.notify_pool(pool_id, &message).await?;

        Ok(TickOutcome::Relocated {
            participant_id: chosen.participant_id,
            holder: chosen.wallet_address.clone(),
        })
    }

    async fn go_extinct(&self, pool_id: i64) -> Result<TickOutcome, StoreError> {
        if self
            .store
            .complete_pool(pool_id, None, utc_now())
            .await?
            .is_none()
        {
            return Ok(TickOutcome::PoolClosed);
        }
        info!(pool_id, "No active frog left, pool went extinct");
        self.registry
            .broadcast_all(&WsServerMessage::GameOver {
                pool_id,
                winner_address: String::new(),
                prize_amount: Decimal::ZERO,
            })
            .await;
        Ok(TickOutcome::Extinct)
    }

    /// Drop the running entry for `pool_id` if it still belongs to
    /// `generation`.
    async fn retire(&self, pool_id: i64, generation: u64) {
        let mut running = self.running.write().await;
        if running
            .get(&pool_id)
            .is_some_and(|task| task.generation == generation)
        {
            running.remove(&pool_id);
        }
    }
}

async fn run_loop(
    inner: Arc<SchedulerInner>,
    pool_id: i64,
    generation: u64,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut visited = HashSet::new();
    let mut rng = inner.rng_for(pool_id);
    let mut ticker = tokio::time::interval_at(
        tokio::time::Instant::now() + inner.interval,
        inner.interval,
    );
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    debug!(pool_id, generation, "Prize task received stop signal");
                    return;
                }
            }

            _ = ticker.tick() => {
                match inner.tick(pool_id, &mut visited, &mut rng).await {
                    Ok(outcome) if outcome.is_terminal() => {
                        info!(pool_id, ?outcome, "Prize task finished");
                        inner.retire(pool_id, generation).await;
                        return;
                    }
                    Ok(_) => {}
                    Err(e) => error!(pool_id, error = %e, "Prize tick failed, skipping"),
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl PoolEventHandler for PrizeLocationScheduler {
    async fn handle(&self, event: PoolEvent) {
        if let PoolEvent::PoolBecameActive { pool_id } = event {
            self.start(pool_id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::entities::pool_participant::PoolMember;
    use crate::registry::{Outgoing, connection};
    use crate::store::{MemoryGameStore, NewParticipant};

    struct Fixture {
        store: Arc<MemoryGameStore>,
        registry: Arc<ConnectionRegistry>,
        scheduler: PrizeLocationScheduler,
    }

    fn fixture(interval: Duration) -> Fixture {
        let store = Arc::new(MemoryGameStore::new());
        let registry = Arc::new(ConnectionRegistry::new(store.clone(), &GameConfig::default()));
        let scheduler =
            PrizeLocationScheduler::with_seed(store.clone(), registry.clone(), interval, 7);
        Fixture {
            store,
            registry,
            scheduler,
        }
    }

    /// An active pool with `players` members.
    async fn active_pool(store: &MemoryGameStore, players: i32) -> (i64, Vec<PoolMember>) {
        let pool = store.create_pool(Decimal::ONE, utc_now()).await.unwrap();
        for i in 0..players {
            let wallet = format!("pool{}-w{i}", pool.id);
            let user = store.find_or_create_user(&wallet).await.unwrap();
            let frog = store
                .create_frog(user.id, &format!("tx-{wallet}"), utc_now())
                .await
                .unwrap();
            store
                .admit_participant(
                    NewParticipant {
                        pool_id: pool.id,
                        frog_id: frog.id,
                        user_id: user.id,
                        wallet_address: wallet,
                    },
                    players,
                    utc_now(),
                )
                .await
                .unwrap();
        }
        let members = store.list_pool_members(pool.id).await.unwrap();
        (pool.id, members)
    }

    fn holder(outcome: TickOutcome) -> String {
        match outcome {
            TickOutcome::Relocated { holder, .. } => holder,
            other => panic!("expected relocation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_every_active_frog_is_visited_once_per_cycle() {
        let f = fixture(Duration::from_secs(10));
        let (pool_id, members) = active_pool(&f.store, 4).await;
        let mut visited = HashSet::new();
        let mut rng = StdRng::seed_from_u64(1);

        for _ in 0..3 {
            let mut cycle = HashSet::new();
            for _ in 0..members.len() {
                let outcome = f.scheduler.tick(pool_id, &mut visited, &mut rng).await.unwrap();
                assert!(cycle.insert(holder(outcome)), "repeat inside a cycle");
            }
            assert_eq!(cycle.len(), members.len());
        }

        let pool = f.store.get_pool(pool_id).await.unwrap().unwrap();
        assert!(pool.current_big_prize_holder.is_some());
    }

    #[tokio::test]
    async fn test_never_selects_inactive_frog() {
        let f = fixture(Duration::from_secs(10));
        let (pool_id, members) = active_pool(&f.store, 5).await;
        for member in &members[..3] {
            f.store.deactivate_frog(member.frog_id).await.unwrap();
        }
        let alive: HashSet<String> = members[3..]
            .iter()
            .map(|m| m.wallet_address.clone())
            .collect();

        let mut visited = HashSet::new();
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..20 {
            let outcome = f.scheduler.tick(pool_id, &mut visited, &mut rng).await.unwrap();
            assert!(alive.contains(&holder(outcome)));
        }
    }

    #[tokio::test]
    async fn test_frog_eliminated_mid_cycle_is_skipped() {
        let f = fixture(Duration::from_secs(10));
        let (pool_id, members) = active_pool(&f.store, 3).await;
        let mut visited = HashSet::new();
        let mut rng = StdRng::seed_from_u64(3);

        let first = holder(f.scheduler.tick(pool_id, &mut visited, &mut rng).await.unwrap());
        let starving = members
            .iter()
            .find(|m| m.wallet_address != first)
            .unwrap();
        f.store.deactivate_frog(starving.frog_id).await.unwrap();

        let second = holder(f.scheduler.tick(pool_id, &mut visited, &mut rng).await.unwrap());
        assert_ne!(second, first);
        assert_ne!(second, starving.wallet_address);
        // Both remaining frogs were visited; the cycle restarts.
        let third = holder(f.scheduler.tick(pool_id, &mut visited, &mut rng).await.unwrap());
        assert_ne!(third, starving.wallet_address);
    }

    #[tokio::test]
    async fn test_last_frog_gone_means_extinction() {
        let f = fixture(Duration::from_secs(10));
        let (pool_id, members) = active_pool(&f.store, 2).await;
        f.store.deactivate_frog(members[0].frog_id).await.unwrap();

        let (watcher, mut watcher_rx) = connection(8);
        f.registry.register(members[0].user_id, watcher).await;
        assert!(matches!(
            watcher_rx.next().await,
            Outgoing::Message(WsServerMessage::PoolUpdate { .. })
        ));

        let mut visited = HashSet::new();
        let mut rng = StdRng::seed_from_u64(4);
        let only = holder(f.scheduler.tick(pool_id, &mut visited, &mut rng).await.unwrap());
        assert_eq!(only, members[1].wallet_address);
        assert_eq!(
            watcher_rx.next().await,
            Outgoing::Message(WsServerMessage::BigPrizeLocation {
                pool_id,
                holder_address: only.clone(),
            })
        );

        f.store.deactivate_frog(members[1].frog_id).await.unwrap();
        let outcome = f.scheduler.tick(pool_id, &mut visited, &mut rng).await.unwrap();
        assert_eq!(outcome, TickOutcome::Extinct);

        let pool = f.store.get_pool(pool_id).await.unwrap().unwrap();
        assert_eq!(pool.status, PoolStatus::Completed);
        assert_eq!(pool.big_prize_winner, None);
        assert_eq!(
            watcher_rx.next().await,
            Outgoing::Message(WsServerMessage::GameOver {
                pool_id,
                winner_address: String::new(),
                prize_amount: Decimal::ZERO,
            })
        );

        let outcome = f.scheduler.tick(pool_id, &mut visited, &mut rng).await.unwrap();
        assert_eq!(outcome, TickOutcome::PoolClosed);
    }

    #[tokio::test]
    async fn test_start_replaces_and_stop_removes() {
        let f = fixture(Duration::from_secs(10));
        let (pool_id, _) = active_pool(&f.store, 2).await;
        f.scheduler.start(pool_id).await;
        f.scheduler.start(pool_id).await;
        assert_eq!(f.scheduler.running_count().await, 1);
        assert!(f.scheduler.stop(pool_id).await);
        assert!(!f.scheduler.stop(pool_id).await);
        assert!(!f.scheduler.is_running(pool_id).await);
    }

    #[tokio::test]
    async fn test_task_retires_when_pool_completes() {
        let f = fixture(Duration::from_millis(20));
        let (pool_id, _) = active_pool(&f.store, 2).await;
        assert_eq!(f.scheduler.resume_active_pools().await.unwrap(), 1);
        assert!(f.scheduler.is_running(pool_id).await);

        f.store.complete_pool(pool_id, Some("someone"), utc_now()).await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            while f.scheduler.is_running(pool_id).await {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        f.scheduler.stop_all().await;
    }
}
