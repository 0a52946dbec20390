use super::{Admission, AdmissionRejection, GameStore, HungerWrite, NewParticipant, StoreError};
use crate::config::MAX_HUNGER_LEVEL;
use crate::entities::PoolStatus;
use crate::entities::frog::Frog;
use crate::entities::pool_participant::{PoolMember, PoolParticipant};
use crate::entities::prize_pool::PrizePool;
use crate::entities::user::User;
use crate::utils::utc_now;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    users: BTreeMap<i64, User>,
    frogs: BTreeMap<i64, Frog>,
    pools: BTreeMap<i64, PrizePool>,
    participants: Vec<PoolParticipant>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn frog_is_seated(&self, frog_id: i64) -> bool {
        self.participants.iter().any(|p| {
            p.frog_id == frog_id
                && self
                    .pools
                    .get(&p.pool_id)
                    .is_some_and(|pool| pool.status.is_open())
        })
    }

    fn user_has_open_membership(&self, user_id: i64) -> bool {
        self.participants.iter().any(|p| {
            p.user_id == user_id
                && self
                    .pools
                    .get(&p.pool_id)
                    .is_some_and(|pool| pool.status.is_open())
        })
    }
}

/// In-process [`GameStore`].
///
/// A single mutex guards all tables, so every operation, admission
/// included, is trivially atomic. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryGameStore {
    state: Mutex<MemoryState>,
}

impl MemoryGameStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl GameStore for MemoryGameStore {
    async fn find_or_create_user(&self, wallet_address: &str) -> Result<User, StoreError> {
        let mut state = self.state.lock().await;
        if let Some(user) = state
            .users
            .values()
            .find(|u| u.wallet_address == wallet_address)
        {
            return Ok(user.clone());
        }
        let id = state.next_id();
        let user = User {
            id,
            wallet_address: wallet_address.to_owned(),
            unclaimed_rewards: Decimal::ZERO,
            history_rewards: Decimal::ZERO,
            created_at: utc_now(),
        };
        state.users.insert(id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.state.lock().await.users.get(&user_id).cloned())
    }

    async fn credit_reward(
        &self,
        user_id: i64,
        amount: Decimal,
    ) -> Result<Option<User>, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state.users.get_mut(&user_id).map(|user| {
            user.unclaimed_rewards += amount;
            user.clone()
        }))
    }

    async fn settle_reward_claim(
        &self,
        user_id: i64,
        amount: Decimal,
    ) -> Result<Option<User>, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state
            .users
            .get_mut(&user_id)
            .filter(|user| user.unclaimed_rewards >= amount)
            .map(|user| {
                user.unclaimed_rewards -= amount;
                user.history_rewards += amount;
                user.clone()
            }))
    }

    async fn refund_reward_claim(
        &self,
        user_id: i64,
        amount: Decimal,
    ) -> Result<Option<User>, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state.users.get_mut(&user_id).map(|user| {
            user.unclaimed_rewards += amount;
            user.history_rewards -= amount;
            user.clone()
        }))
    }

    async fn create_frog(
        &self,
        user_id: i64,
        activation_tx: &str,
        now: time::PrimitiveDateTime,
    ) -> Result<Frog, StoreError> {
        let mut state = self.state.lock().await;
        if state.frogs.values().any(|f| f.activation_tx == activation_tx) {
            return Err(StoreError::DuplicateActivation(activation_tx.to_owned()));
        }
        let id = state.next_id();
        let frog = Frog {
            id,
            user_id,
            hunger_level: MAX_HUNGER_LEVEL,
            is_active: true,
            last_fed_at: now,
            activation_tx: activation_tx.to_owned(),
            version: 0,
            created_at: now,
        };
        state.frogs.insert(id, frog.clone());
        Ok(frog)
    }

    async fn get_frog(&self, frog_id: i64) -> Result<Option<Frog>, StoreError> {
        Ok(self.state.lock().await.frogs.get(&frog_id).cloned())
    }

    async fn get_active_frog_for_user(&self, user_id: i64) -> Result<Option<Frog>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .frogs
            .values()
            .rev()
            .find(|f| f.user_id == user_id && f.is_active)
            .cloned())
    }

    async fn list_active_frogs(&self) -> Result<Vec<Frog>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.frogs.values().filter(|f| f.is_active).cloned().collect())
    }

    async fn update_frog_hunger(&self, write: HungerWrite) -> Result<Option<Frog>, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state
            .frogs
            .get_mut(&write.frog_id)
            .filter(|f| f.is_active && f.version == write.expected_version)
            .map(|frog| {
                frog.hunger_level = write.hunger_level;
                frog.last_fed_at = write.last_fed_at;
                frog.is_active = write.hunger_level > 0;
                frog.version += 1;
                frog.clone()
            }))
    }

    async fn deactivate_frog(&self, frog_id: i64) -> Result<Option<Frog>, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state
            .frogs
            .get_mut(&frog_id)
            .filter(|f| f.is_active)
            .map(|frog| {
                frog.hunger_level = 0;
                frog.is_active = false;
                frog.version += 1;
                frog.clone()
            }))
    }

    async fn retire_unseated_frog(&self, frog_id: i64) -> Result<Option<Frog>, StoreError> {
        let mut state = self.state.lock().await;
        if state.frog_is_seated(frog_id) {
            return Ok(None);
        }
        Ok(state
            .frogs
            .get_mut(&frog_id)
            .filter(|f| f.is_active)
            .map(|frog| {
                frog.hunger_level = 0;
                frog.is_active = false;
                frog.version += 1;
                frog.clone()
            }))
    }

    async fn create_pool(
        &self,
        prize_amount: Decimal,
        now: time::PrimitiveDateTime,
    ) -> Result<PrizePool, StoreError> {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        let pool = PrizePool {
            id,
            status: PoolStatus::Collecting,
            current_players: 0,
            prize_amount,
            big_prize_winner: None,
            current_big_prize_holder: None,
            created_at: now,
            completed_at: None,
        };
        state.pools.insert(id, pool.clone());
        Ok(pool)
    }

    async fn get_pool(&self, pool_id: i64) -> Result<Option<PrizePool>, StoreError> {
        Ok(self.state.lock().await.pools.get(&pool_id).cloned())
    }

    async fn find_available_pool(&self, capacity: i32) -> Result<Option<PrizePool>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .pools
            .values()
            .find(|p| p.status == PoolStatus::Collecting && p.current_players < capacity)
            .cloned())
    }

    async fn list_active_pools(&self) -> Result<Vec<PrizePool>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .pools
            .values()
            .filter(|p| p.status == PoolStatus::Active)
            .cloned()
            .collect())
    }

    async fn admit_participant(
        &self,
        new: NewParticipant,
        capacity: i32,
        now: time::PrimitiveDateTime,
    ) -> Result<Admission, StoreError> {
        let mut state = self.state.lock().await;
        if state.user_has_open_membership(new.user_id) {
            return Ok(Admission::Rejected(AdmissionRejection::AlreadyInPool));
        }
        let Some(pool) = state.pools.get(&new.pool_id) else {
            return Ok(Admission::Rejected(AdmissionRejection::PoolNotFound));
        };
        if pool.status != PoolStatus::Collecting {
            return Ok(Admission::Rejected(AdmissionRejection::NotCollecting));
        }
        if pool.current_players >= capacity {
            return Ok(Admission::Rejected(AdmissionRejection::PoolFull));
        }

        let serial_number = pool.current_players + 1;
        let became_active = serial_number == capacity;
        let id = state.next_id();
        let participant = PoolParticipant {
            id,
            pool_id: new.pool_id,
            frog_id: new.frog_id,
            user_id: new.user_id,
            wallet_address: new.wallet_address,
            serial_number,
            joined_at: now,
        };
        state.participants.push(participant.clone());

        let Some(pool) = state.pools.get_mut(&new.pool_id) else {
            return Ok(Admission::Rejected(AdmissionRejection::PoolNotFound));
        };
        pool.current_players = serial_number;
        if became_active {
            pool.status = PoolStatus::Active;
        }
        Ok(Admission::Admitted {
            pool: pool.clone(),
            participant,
            became_active,
        })
    }

    async fn complete_pool(
        &self,
        pool_id: i64,
        winner: Option<&str>,
        completed_at: time::PrimitiveDateTime,
    ) -> Result<Option<PrizePool>, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state
            .pools
            .get_mut(&pool_id)
            .filter(|p| p.status != PoolStatus::Completed)
            .map(|pool| {
                pool.status = PoolStatus::Completed;
                pool.big_prize_winner = winner.map(str::to_owned);
                pool.completed_at = Some(completed_at);
                pool.clone()
            }))
    }

    async fn complete_pool_for_holder(
        &self,
        pool_id: i64,
        holder_address: &str,
        completed_at: time::PrimitiveDateTime,
    ) -> Result<Option<PrizePool>, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state
            .pools
            .get_mut(&pool_id)
            .filter(|p| {
                p.status == PoolStatus::Active
                    && p.current_big_prize_holder.as_deref() == Some(holder_address)
            })
            .map(|pool| {
                pool.status = PoolStatus::Completed;
                pool.big_prize_winner = Some(holder_address.to_owned());
                pool.completed_at = Some(completed_at);
                pool.clone()
            }))
    }

    async fn set_prize_holder(
        &self,
        pool_id: i64,
        holder_address: &str,
    ) -> Result<Option<PrizePool>, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state
            .pools
            .get_mut(&pool_id)
            .filter(|p| p.status != PoolStatus::Completed)
            .map(|pool| {
                pool.current_big_prize_holder = Some(holder_address.to_owned());
                pool.clone()
            }))
    }

    async fn clear_prize_holder(
        &self,
        pool_id: i64,
        holder_address: &str,
    ) -> Result<Option<PrizePool>, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state
            .pools
            .get_mut(&pool_id)
            .filter(|p| {
                p.status != PoolStatus::Completed
                    && p.current_big_prize_holder.as_deref() == Some(holder_address)
            })
            .map(|pool| {
                pool.current_big_prize_holder = None;
                pool.clone()
            }))
    }

    async fn list_pool_members(&self, pool_id: i64) -> Result<Vec<PoolMember>, StoreError> {
        let state = self.state.lock().await;
        let mut members: Vec<PoolMember> = state
            .participants
            .iter()
            .filter(|p| p.pool_id == pool_id)
            .filter_map(|p| {
                let frog = state.frogs.get(&p.frog_id)?;
                Some(PoolMember {
                    participant_id: p.id,
                    pool_id: p.pool_id,
                    frog_id: p.frog_id,
                    user_id: p.user_id,
                    wallet_address: p.wallet_address.clone(),
                    serial_number: p.serial_number,
                    frog_active: frog.is_active,
                    hunger_level: frog.hunger_level,
                })
            })
            .collect();
        members.sort_by_key(|m| m.serial_number);
        Ok(members)
    }

    async fn find_participant(
        &self,
        pool_id: i64,
        frog_id: i64,
    ) -> Result<Option<PoolParticipant>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .participants
            .iter()
            .find(|p| p.pool_id == pool_id && p.frog_id == frog_id)
            .cloned())
    }

    async fn find_open_pool_for_user(
        &self,
        user_id: i64,
    ) -> Result<Option<PrizePool>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .participants
            .iter()
            .rev()
            .filter(|p| p.user_id == user_id)
            .filter_map(|p| state.pools.get(&p.pool_id))
            .find(|pool| pool.status.is_open())
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    async fn seat(store: &MemoryGameStore, wallet: &str, pool_id: i64) -> Admission {
        let user = store.find_or_create_user(wallet).await.unwrap();
        let frog = store
            .create_frog(user.id, &format!("tx-{wallet}"), utc_now())
            .await
            .unwrap();
        store
            .admit_participant(
                NewParticipant {
                    pool_id,
                    frog_id: frog.id,
                    user_id: user.id,
                    wallet_address: wallet.to_owned(),
                },
                10,
                utc_now(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_concurrent_admissions_respect_capacity() {
        let store = Arc::new(MemoryGameStore::new());
        let pool = store.create_pool(Decimal::ONE, utc_now()).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..25 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                seat(&store, &format!("wallet-{i}"), pool.id).await
            }));
        }
        let mut admitted = 0;
        let mut activations = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Admission::Admitted { became_active, .. } => {
                    admitted += 1;
                    if became_active {
                        activations += 1;
                    }
                }
                Admission::Rejected(reason) => {
                    assert!(matches!(
                        reason,
                        AdmissionRejection::NotCollecting | AdmissionRejection::PoolFull
                    ));
                }
            }
        }
        assert_eq!(admitted, 10);
        assert_eq!(activations, 1);

        let pool = store.get_pool(pool.id).await.unwrap().unwrap();
        assert_eq!(pool.current_players, 10);
        assert_eq!(pool.status, PoolStatus::Active);
        let serials: Vec<i32> = store
            .list_pool_members(pool.id)
            .await
            .unwrap()
            .iter()
            .map(|m| m.serial_number)
            .collect();
        assert_eq!(serials, (1..=10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_user_cannot_double_join() {
        let store = MemoryGameStore::new();
        let first = store.create_pool(Decimal::ONE, utc_now()).await.unwrap();
        let second = store.create_pool(Decimal::ONE, utc_now()).await.unwrap();
        assert!(matches!(seat(&store, "a", first.id).await, Admission::Admitted { .. }));

        let user = store.find_or_create_user("a").await.unwrap();
        let frog = store.get_active_frog_for_user(user.id).await.unwrap().unwrap();
        let again = store
            .admit_participant(
                NewParticipant {
                    pool_id: second.id,
                    frog_id: frog.id,
                    user_id: user.id,
                    wallet_address: "a".into(),
                },
                10,
                utc_now(),
            )
            .await
            .unwrap();
        assert_eq!(again, Admission::Rejected(AdmissionRejection::AlreadyInPool));
    }

    #[tokio::test]
    async fn test_hunger_cas_and_duplicate_activation() {
        let store = MemoryGameStore::new();
        let user = store.find_or_create_user("a").await.unwrap();
        let frog = store.create_frog(user.id, "tx-1", utc_now()).await.unwrap();
        assert!(matches!(
            store.create_frog(user.id, "tx-1", utc_now()).await,
            Err(StoreError::DuplicateActivation(_))
        ));

        let write = HungerWrite {
            frog_id: frog.id,
            expected_version: frog.version,
            hunger_level: 0,
            last_fed_at: frog.last_fed_at,
        };
        let updated = store.update_frog_hunger(write.clone()).await.unwrap().unwrap();
        assert!(!updated.is_active);
        // Same version again loses the race.
        assert!(store.update_frog_hunger(write).await.unwrap().is_none());
        assert!(store.deactivate_frog(frog.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_seated_frog_is_not_retired() {
        let store = MemoryGameStore::new();
        let pool = store.create_pool(Decimal::ONE, utc_now()).await.unwrap();
        assert!(matches!(seat(&store, "a", pool.id).await, Admission::Admitted { .. }));
        let user = store.find_or_create_user("a").await.unwrap();
        let seated = store.get_active_frog_for_user(user.id).await.unwrap().unwrap();
        assert!(store.retire_unseated_frog(seated.id).await.unwrap().is_none());
        assert!(store.get_frog(seated.id).await.unwrap().unwrap().is_active);

        let spare = store.create_frog(user.id, "tx-spare", utc_now()).await.unwrap();
        let retired = store.retire_unseated_frog(spare.id).await.unwrap().unwrap();
        assert!(!retired.is_active);
        assert_eq!(retired.hunger_level, 0);

        // Once the pool is over the seat no longer protects the frog.
        store.complete_pool(pool.id, None, utc_now()).await.unwrap();
        assert!(store.retire_unseated_frog(seated.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_completion_requires_current_holder() {
        let store = MemoryGameStore::new();
        let pool = store.create_pool(Decimal::ONE, utc_now()).await.unwrap();
        for wallet in ["a", "b"] {
            seat(&store, wallet, pool.id).await;
        }
        // Still collecting.
        store.set_prize_holder(pool.id, "a").await.unwrap();
        assert!(
            store
                .complete_pool_for_holder(pool.id, "a", utc_now())
                .await
                .unwrap()
                .is_none()
        );
        for i in 0..8 {
            seat(&store, &format!("c{i}"), pool.id).await;
        }

        // The prize moved on before "a" got to claim it.
        store.set_prize_holder(pool.id, "b").await.unwrap();
        assert!(
            store
                .complete_pool_for_holder(pool.id, "a", utc_now())
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(
            store.get_pool(pool.id).await.unwrap().unwrap().status,
            PoolStatus::Active
        );

        let done = store
            .complete_pool_for_holder(pool.id, "b", utc_now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.status, PoolStatus::Completed);
        assert_eq!(done.big_prize_winner.as_deref(), Some("b"));
        assert!(
            store
                .complete_pool_for_holder(pool.id, "b", utc_now())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_clear_prize_holder_only_for_that_holder() {
        let store = MemoryGameStore::new();
        let pool = store.create_pool(Decimal::ONE, utc_now()).await.unwrap();
        store.set_prize_holder(pool.id, "a").await.unwrap();
        assert!(store.clear_prize_holder(pool.id, "b").await.unwrap().is_none());
        let cleared = store.clear_prize_holder(pool.id, "a").await.unwrap().unwrap();
        assert_eq!(cleared.current_big_prize_holder, None);
    }

    #[tokio::test]
    async fn test_settle_requires_covering_balance() {
        let store = MemoryGameStore::new();
        let user = store.find_or_create_user("a").await.unwrap();
        store.credit_reward(user.id, Decimal::new(5, 1)).await.unwrap();
        assert!(
            store
                .settle_reward_claim(user.id, Decimal::ONE)
                .await
                .unwrap()
                .is_none()
        );
        let settled = store
            .settle_reward_claim(user.id, Decimal::new(5, 1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(settled.unclaimed_rewards, Decimal::ZERO);
        assert_eq!(settled.history_rewards, Decimal::new(5, 1));
    }
}
