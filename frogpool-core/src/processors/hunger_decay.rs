//! Global hunger decay.
//!
//! One task for the whole process. Every tick it charges each active frog
//! one hunger point per full hunger unit elapsed since it was last fed
//! (or last charged), then tells the owner. A frog that reaches zero is
//! deactivated by the same write and drops out of prize eligibility, which
//! the prize tasks pick up on their next read.

use crate::config::GameConfig;
use crate::entities::frog::Frog;
use crate::registry::ConnectionRegistry;
use crate::store::{GameStore, HungerWrite, StoreError};
use crate::utils::{advance_last_fed, clamp_hunger, hunger_decrement, utc_now};
use frogpool_sdk::objects::WsServerMessage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecayReport {
    /// Frogs whose hunger was lowered.
    pub updated: usize,
    /// Frogs that hit zero during this tick.
    pub starved: usize,
    /// Frogs skipped because another writer touched them first.
    pub contended: usize,
}

pub struct HungerDecayWorker {
    store: Arc<dyn GameStore>,
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
    hunger_unit: Duration,
}

impl HungerDecayWorker {
    pub fn new(
        store: Arc<dyn GameStore>,
        registry: Arc<ConnectionRegistry>,
        config: &GameConfig,
    ) -> Self {
        Self {
            store,
            registry,
            interval: config.decay_interval,
            hunger_unit: config.hunger_unit,
        }
    }

    /// Run until the shutdown signal fires.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval = ?self.interval, unit = ?self.hunger_unit, "Hunger decay worker started");

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Hunger decay worker received shutdown signal");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    match self.tick_at(utc_now()).await {
                        Ok(report) if report != DecayReport::default() => {
                            debug!(?report, "Hunger decay tick");
                        }
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "Hunger decay tick failed, skipping"),
                    }
                }
            }
        }

        info!("Hunger decay worker shutdown complete");
    }

    /// Charge every active frog for the time elapsed up to `now`.
    pub async fn tick_at(&self, now: time::PrimitiveDateTime) -> Result<DecayReport, StoreError> {
        let frogs = self.store.list_active_frogs().await?;
        let mut report = DecayReport::default();
        for frog in frogs {
            match self.decay_one(&frog, now).await {
                Ok(Decay::Unchanged) => {}
                Ok(Decay::Lowered { starved }) => {
                    report.updated += 1;
                    if starved {
                        report.starved += 1;
                    }
                }
                Ok(Decay::Contended) => report.contended += 1,
                Err(e) => warn!(frog_id = frog.id, error = %e, "Failed to decay frog"),
            }
        }
        Ok(report)
    }

    async fn decay_one(&self, frog: &Frog, now: time::PrimitiveDateTime) -> Result<Decay, StoreError> {
        let decrement = hunger_decrement(frog.last_fed_at, now, self.hunger_unit);
        if decrement == 0 {
            return Ok(Decay::Unchanged);
        }
        let hunger_level = clamp_hunger(frog.hunger_level as i64 - decrement as i64);
        let write = HungerWrite {
            frog_id: frog.id,
            expected_version: frog.version,
            hunger_level,
            last_fed_at: advance_last_fed(frog.last_fed_at, decrement, self.hunger_unit),
        };
        let Some(updated) = self.store.update_frog_hunger(write).await? else {
            return Ok(Decay::Contended);
        };

        let starved = !updated.is_active;
        if starved {
            info!(frog_id = updated.id, user_id = updated.user_id, "Frog starved");
            if let Err(e) = self.drop_prize(&updated).await {
                warn!(frog_id = updated.id, error = %e, "Failed to release big prize of starved frog");
            }
        }
        self.registry
            .send(
                updated.user_id,
                WsServerMessage::HungerUpdate {
                    frog_id: updated.id,
                    new_hunger_level: updated.hunger_level,
                },
            )
            .await;
        Ok(Decay::Lowered { starved })
    }

    /// A starved frog cannot hold the big prize; the next prize tick picks
    /// a new holder.
    async fn drop_prize(&self, frog: &Frog) -> Result<(), StoreError> {
        let Some(pool) = self.store.find_open_pool_for_user(frog.user_id).await? else {
            return Ok(());
        };
        let Some(holder) = pool.current_big_prize_holder.as_deref() else {
            return Ok(());
        };
        let members = self.store.list_pool_members(pool.id).await?;
        if members
            .iter()
            .any(|m| m.frog_id == frog.id && m.wallet_address == holder)
            && self.store.clear_prize_holder(pool.id, holder).await?.is_some()
        {
            info!(pool_id = pool.id, frog_id = frog.id, "Big prize released by starved frog");
        }
        Ok(())
    }
}

enum Decay {
    Unchanged,
    Lowered { starved: bool },
    Contended,
}
