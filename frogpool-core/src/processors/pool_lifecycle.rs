//! Pool state machine: `collecting -> active -> completed`.
//!
//! Admission goes through [`GameStore::admit_participant`], which commits
//! the membership row, the new player count and the status flip as one
//! unit. Events are published only after that commit.

use super::GameError;
use crate::config::GameConfig;
use crate::entities::PoolStatus;
use crate::entities::pool_participant::{PoolParticipant, member_snapshots};
use crate::entities::prize_pool::PrizePool;
use crate::events::{EventBus, PoolEvent};
use crate::store::{Admission, AdmissionRejection, GameStore, NewParticipant};
use crate::utils::utc_now;
use frogpool_sdk::objects::ParticipantSnapshot;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of a successful admission.
#[derive(Debug, Clone)]
pub struct JoinedPool {
    pub pool: PrizePool,
    pub participant: PoolParticipant,
    pub became_active: bool,
}

pub struct PoolLifecycleManager {
    store: Arc<dyn GameStore>,
    bus: EventBus,
    config: GameConfig,
}

impl PoolLifecycleManager {
    pub fn new(store: Arc<dyn GameStore>, bus: EventBus, config: GameConfig) -> Self {
        Self { store, bus, config }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Open a new, empty pool with the default prize.
    pub async fn create_pool(&self) -> Result<PrizePool, GameError> {
        let pool = self
            .store
            .create_pool(self.config.default_prize, utc_now())
            .await?;
        info!(pool_id = pool.id, prize = %pool.prize_amount, "Pool created");
        Ok(pool)
    }

    /// A collecting pool with a free seat, if there is one.
    pub async fn get_available_pool(&self) -> Result<Option<PrizePool>, GameError> {
        Ok(self
            .store
            .find_available_pool(self.config.pool_capacity)
            .await?)
    }

    /// Seat a frog in a pool.
    ///
    /// Publishes `PoolParticipantsChanged` on success and, when this seat
    /// filled the pool, `PoolBecameActive`.
    pub async fn add_participant(
        &self,
        pool_id: i64,
        frog_id: i64,
        user_id: i64,
        wallet_address: &str,
    ) -> Result<JoinedPool, GameError> {
        let admission = self
            .store
            .admit_participant(
                NewParticipant {
                    pool_id,
                    frog_id,
                    user_id,
                    wallet_address: wallet_address.to_owned(),
                },
                self.config.pool_capacity,
                utc_now(),
            )
            .await?;

        let (pool, participant, became_active) = match admission {
            Admission::Admitted {
                pool,
                participant,
                became_active,
            } => (pool, participant, became_active),
            Admission::Rejected(AdmissionRejection::PoolNotFound) => {
                return Err(GameError::NotFound {
                    entity: "pool",
                    id: pool_id,
                });
            }
            Admission::Rejected(AdmissionRejection::PoolFull) => {
                return Err(GameError::PoolFull(pool_id));
            }
            Admission::Rejected(AdmissionRejection::NotCollecting) => {
                return Err(GameError::NotCollecting(pool_id));
            }
            Admission::Rejected(AdmissionRejection::AlreadyInPool) => {
                let current = self
                    .store
                    .find_open_pool_for_user(user_id)
                    .await?
                    .map_or(pool_id, |p| p.id);
                return Err(GameError::AlreadyInPool(current));
            }
        };

        info!(
            pool_id,
            frog_id,
            serial_number = participant.serial_number,
            current_players = pool.current_players,
            became_active,
            "Participant admitted"
        );

        match self.participant_snapshots(&pool).await {
            Ok(participants) => {
                self.bus
                    .publish(PoolEvent::PoolParticipantsChanged {
                        pool_id,
                        participants,
                    })
                    .await;
            }
            Err(e) => warn!(pool_id, error = %e, "Failed to snapshot participants"),
        }
        if became_active {
            self.bus.publish(PoolEvent::PoolBecameActive { pool_id }).await;
        }

        Ok(JoinedPool {
            pool,
            participant,
            became_active,
        })
    }

    /// Mark a pool completed with an optional winner.
    ///
    /// Crediting the winner and retiring the frogs are up to the caller.
    pub async fn complete_pool(
        &self,
        pool_id: i64,
        winner_address: Option<&str>,
    ) -> Result<PrizePool, GameError> {
        match self
            .store
            .complete_pool(pool_id, winner_address, utc_now())
            .await?
        {
            Some(pool) => {
                info!(pool_id, winner = winner_address.unwrap_or(""), "Pool completed");
                Ok(pool)
            }
            None => match self.store.get_pool(pool_id).await? {
                Some(_) => Err(GameError::AlreadyCompleted(pool_id)),
                None => Err(GameError::NotFound {
                    entity: "pool",
                    id: pool_id,
                }),
            },
        }
    }

    /// Complete an active pool with the current prize holder as winner.
    ///
    /// The holder is checked by the same write that completes the pool, so
    /// a prize that moved after the caller last looked is never awarded.
    pub async fn award_big_prize(
        &self,
        pool_id: i64,
        holder_address: &str,
    ) -> Result<PrizePool, GameError> {
        if let Some(pool) = self
            .store
            .complete_pool_for_holder(pool_id, holder_address, utc_now())
            .await?
        {
            info!(pool_id, winner = holder_address, "Pool completed");
            return Ok(pool);
        }
        match self.store.get_pool(pool_id).await? {
            Some(pool) => Err(match pool.status {
                PoolStatus::Active => GameError::NotPrizeHolder,
                PoolStatus::Completed => GameError::AlreadyCompleted(pool_id),
                PoolStatus::Collecting => GameError::PoolNotActive(pool_id),
            }),
            None => Err(GameError::NotFound {
                entity: "pool",
                id: pool_id,
            }),
        }
    }

    /// Move the big prize to `holder_address`.
    pub async fn update_prize_holder(
        &self,
        pool_id: i64,
        holder_address: &str,
    ) -> Result<PrizePool, GameError> {
        self.store
            .set_prize_holder(pool_id, holder_address)
            .await?
            .ok_or(GameError::AlreadyCompleted(pool_id))
    }

    /// The pool together with the public view of its members.
    pub async fn pool_snapshot(
        &self,
        pool_id: i64,
    ) -> Result<(PrizePool, Vec<ParticipantSnapshot>), GameError> {
        let pool = self
            .store
            .get_pool(pool_id)
            .await?
            .ok_or(GameError::NotFound {
                entity: "pool",
                id: pool_id,
            })?;
        let participants = self.participant_snapshots(&pool).await?;
        Ok((pool, participants))
    }

    async fn participant_snapshots(
        &self,
        pool: &PrizePool,
    ) -> Result<Vec<ParticipantSnapshot>, GameError> {
        let members = self.store.list_pool_members(pool.id).await?;
        Ok(member_snapshots(
            &members,
            pool.current_big_prize_holder.as_deref(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{PoolEventHandler, PoolEventKind};
    use crate::store::MemoryGameStore;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct Recorder(mpsc::UnboundedSender<PoolEvent>);

    #[async_trait::async_trait]
    impl PoolEventHandler for Recorder {
        async fn handle(&self, event: PoolEvent) {
            let _ = self.0.send(event);
        }
    }

    async fn setup() -> (
        Arc<MemoryGameStore>,
        PoolLifecycleManager,
        mpsc::UnboundedReceiver<PoolEvent>,
        mpsc::UnboundedReceiver<PoolEvent>,
    ) {
        let store = Arc::new(MemoryGameStore::new());
        let bus = EventBus::new();
        let (active_tx, active_rx) = mpsc::unbounded_channel();
        let (changed_tx, changed_rx) = mpsc::unbounded_channel();
        bus.subscribe(PoolEventKind::PoolBecameActive, Arc::new(Recorder(active_tx)))
            .await;
        bus.subscribe(
            PoolEventKind::PoolParticipantsChanged,
            Arc::new(Recorder(changed_tx)),
        )
        .await;
        let manager = PoolLifecycleManager::new(store.clone(), bus, GameConfig::default());
        (store, manager, active_rx, changed_rx)
    }

    async fn join(
        store: &MemoryGameStore,
        manager: &PoolLifecycleManager,
        pool_id: i64,
        wallet: &str,
    ) -> Result<JoinedPool, GameError> {
        let user = store.find_or_create_user(wallet).await.unwrap();
        let frog = store
            .create_frog(user.id, &format!("tx-{wallet}"), utc_now())
            .await
            .unwrap();
        manager
            .add_participant(pool_id, frog.id, user.id, wallet)
            .await
    }

    #[tokio::test]
    async fn test_tenth_join_activates_pool_once() {
        let (store, manager, mut active_rx, mut changed_rx) = setup().await;
        let pool = manager.create_pool().await.unwrap();
        assert_eq!(pool.status, PoolStatus::Collecting);

        for i in 1..=9 {
            let joined = join(&store, &manager, pool.id, &format!("w{i}")).await.unwrap();
            assert_eq!(joined.participant.serial_number, i);
            assert!(!joined.became_active);
        }
        let tenth = join(&store, &manager, pool.id, "w10").await.unwrap();
        assert_eq!(tenth.participant.serial_number, 10);
        assert!(tenth.became_active);
        assert_eq!(tenth.pool.status, PoolStatus::Active);

        let event = tokio::time::timeout(Duration::from_secs(1), active_rx.recv())
            .await
            .unwrap();
        assert_eq!(event, Some(PoolEvent::PoolBecameActive { pool_id: pool.id }));
        assert!(active_rx.try_recv().is_err());

        // One participants-changed event per admission.
        let mut changes = 0;
        while let Ok(Some(_)) =
            tokio::time::timeout(Duration::from_millis(200), changed_rx.recv()).await
        {
            changes += 1;
        }
        assert_eq!(changes, 10);

        assert!(matches!(
            join(&store, &manager, pool.id, "w11").await,
            Err(GameError::NotCollecting(_))
        ));
        assert!(manager.get_available_pool().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_complete_twice_is_rejected() {
        let (_, manager, _, _) = setup().await;
        let pool = manager.create_pool().await.unwrap();
        let first = manager.complete_pool(pool.id, Some("winner")).await.unwrap();
        assert_eq!(first.status, PoolStatus::Completed);

        let second = manager.complete_pool(pool.id, Some("other")).await;
        assert!(matches!(second, Err(GameError::AlreadyCompleted(_))));

        let (reloaded, _) = manager.pool_snapshot(pool.id).await.unwrap();
        assert_eq!(reloaded.big_prize_winner.as_deref(), Some("winner"));
        assert_eq!(reloaded.completed_at, first.completed_at);
    }

    #[tokio::test]
    async fn test_award_follows_current_holder() {
        let (store, manager, _, _) = setup().await;
        let pool = manager.create_pool().await.unwrap();
        for i in 1..=10 {
            join(&store, &manager, pool.id, &format!("w{i}")).await.unwrap();
        }
        manager.update_prize_holder(pool.id, "w1").await.unwrap();
        manager.update_prize_holder(pool.id, "w2").await.unwrap();

        assert!(matches!(
            manager.award_big_prize(pool.id, "w1").await,
            Err(GameError::NotPrizeHolder)
        ));
        let pool = manager.award_big_prize(pool.id, "w2").await.unwrap();
        assert_eq!(pool.status, PoolStatus::Completed);
        assert_eq!(pool.big_prize_winner.as_deref(), Some("w2"));
        assert!(matches!(
            manager.award_big_prize(pool.id, "w2").await,
            Err(GameError::AlreadyCompleted(_))
        ));
    }

    #[tokio::test]
    async fn test_award_needs_active_pool() {
        let (_, manager, _, _) = setup().await;
        let pool = manager.create_pool().await.unwrap();
        manager.update_prize_holder(pool.id, "w1").await.unwrap();
        assert!(matches!(
            manager.award_big_prize(pool.id, "w1").await,
            Err(GameError::PoolNotActive(_))
        ));
    }

    #[tokio::test]
    async fn test_prize_holder_rejected_after_completion() {
        let (_, manager, _, _) = setup().await;
        let pool = manager.create_pool().await.unwrap();
        manager.update_prize_holder(pool.id, "w1").await.unwrap();
        manager.complete_pool(pool.id, None).await.unwrap();
        assert!(matches!(
            manager.update_prize_holder(pool.id, "w2").await,
            Err(GameError::AlreadyCompleted(_))
        ));
    }

    #[tokio::test]
    async fn test_join_completed_pool_is_rejected() {
        let (store, manager, _, _) = setup().await;
        let pool = manager.create_pool().await.unwrap();
        manager.complete_pool(pool.id, None).await.unwrap();
        assert!(matches!(
            join(&store, &manager, pool.id, "late").await,
            Err(GameError::NotCollecting(_))
        ));
    }
}
