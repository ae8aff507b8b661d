//! Profile Updater
//!
//! Coalesces app user profile edits so that at most one upload happens per
//! configured interval. Callers get an [`UpdateOutcome`] that resolves once the
//! coalesced upload (or the decision that none is needed) has completed.
//!
//! State lives on the updater instance: the scheduled flush (its shared
//! outcome, the sender that resolves it and the timer task) and the time of
//! the last flush attempt.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::client::ProfileClient;
use crate::clock::{Clock, SystemClock};
use crate::outcome::{UpdateOutcome, UpdateResult};
use crate::store::{UserAction, UserState, UserStore};
use crate::types::{AppUser, UserProps};

// ─────────────────────────────────────────────────────────────────────────────
// State
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct PendingState {
    scheduled: Option<ScheduledFlush>,
    last_attempt: Option<DateTime<Utc>>,
    next_generation: u64,
}

/// A flush waiting on its timer. The timer and the outcome only exist together.
struct ScheduledFlush {
    generation: u64,
    outcome: UpdateOutcome,
    resolver: oneshot::Sender<UpdateResult>,
    timer: JoinHandle<()>,
}

/// A scheduled flush taken over by a flush that runs now.
struct Preempted {
    outcome: UpdateOutcome,
    resolver: oneshot::Sender<UpdateResult>,
}

impl Preempted {
    fn resolve(self, result: UpdateResult) -> UpdateOutcome {
        // The receiver lives inside `outcome`, so it cannot be gone yet.
        let _ = self.resolver.send(result);
        self.outcome
    }

    fn complete(self, result: UpdateResult) {
        let _ = self.resolver.send(result);
    }
}

struct Inner {
    store: Arc<dyn UserStore>,
    client: Arc<dyn ProfileClient>,
    clock: Arc<dyn Clock>,
    pending: Mutex<PendingState>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Profile Updater
// ─────────────────────────────────────────────────────────────────────────────

/// Debounced uploader for app user profile changes.
///
/// Cloning is cheap; clones share the same pending state.
///
/// `update` and `immediate_update` spawn tokio tasks and must be called from
/// within a tokio runtime.
#[derive(Clone)]
pub struct ProfileUpdater {
    inner: Arc<Inner>,
}

impl ProfileUpdater {
    pub fn new(
        store: Arc<dyn UserStore>,
        client: Arc<dyn ProfileClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                client,
                clock,
                pending: Mutex::new(PendingState::default()),
            }),
        }
    }

    /// Create an updater that uses wall-clock time.
    pub fn with_system_clock(store: Arc<dyn UserStore>, client: Arc<dyn ProfileClient>) -> Self {
        Self::new(store, client, Arc::new(SystemClock))
    }

    /// Queue profile changes and upload them at most once per upload interval.
    ///
    /// Props with a value of the wrong shape are rejected without touching
    /// the pending set. Otherwise they are merged into it right away. Then:
    /// - with no remote user yet, the outcome is already resolved with `None`
    /// - if a flush is already scheduled, its shared outcome is returned
    /// - if the interval has passed since the last attempt, a flush runs now
    /// - otherwise a flush is scheduled for when the interval ends
    pub fn update(&self, props: impl Into<UserProps>) -> UpdateOutcome {
        let props = props.into();
        if let Err(e) = props.validate() {
            return UpdateOutcome::ready(Err(e));
        }

        let inner = &self.inner;
        inner
            .store
            .dispatch(UserAction::update_pending_user_props(props));

        let state = inner.store.state();
        if state.user.id.is_none() {
            debug!("[ProfileUpdater] No remote user yet, keeping changes pending");
            return UpdateOutcome::ready(Ok(None));
        }

        let wait = state.config.profile.upload_wait();
        let now = inner.clock.now();
        let mut pending = inner.lock_pending();

        if let Some(scheduled) = &pending.scheduled {
            return scheduled.outcome.clone();
        }

        let elapsed = pending
            .last_attempt
            .map(|last| (now - last).to_std().unwrap_or(Duration::ZERO));

        match elapsed {
            Some(elapsed) if elapsed <= wait => {
                let delay = wait - elapsed;
                debug!("[ProfileUpdater] Scheduling profile upload in {:?}", delay);
                self.schedule(&mut pending, delay)
            }
            _ => inner.flush(&mut pending, UserProps::default(), None),
        }
    }

    /// Upload pending changes plus `props` now, bypassing the interval.
    ///
    /// A scheduled flush is cancelled and its shared outcome resolves with the
    /// result of this flush. Props with a value of the wrong shape are rejected
    /// and leave any scheduled flush in place.
    pub fn immediate_update(&self, props: impl Into<UserProps>) -> UpdateOutcome {
        let props = props.into();
        if let Err(e) = props.validate() {
            return UpdateOutcome::ready(Err(e));
        }

        let mut pending = self.inner.lock_pending();
        let preempted = pending.scheduled.take().map(|scheduled| {
            debug!(
                "[ProfileUpdater] Cancelling scheduled upload #{}",
                scheduled.generation
            );
            scheduled.timer.abort();
            Preempted {
                outcome: scheduled.outcome,
                resolver: scheduled.resolver,
            }
        });
        self.inner.flush(&mut pending, props, preempted)
    }

    /// True while a flush is waiting on its timer.
    pub fn has_scheduled_flush(&self) -> bool {
        self.inner.lock_pending().scheduled.is_some()
    }

    /// When the last flush was attempted, if ever.
    pub fn last_attempt(&self) -> Option<DateTime<Utc>> {
        self.inner.lock_pending().last_attempt
    }

    fn schedule(&self, pending: &mut PendingState, delay: Duration) -> UpdateOutcome {
        let (resolver, receiver) = oneshot::channel();
        let outcome = UpdateOutcome::from_receiver(receiver);

        pending.next_generation += 1;
        let generation = pending.next_generation;

        let inner = Arc::clone(&self.inner);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.fire(generation);
        });

        pending.scheduled = Some(ScheduledFlush {
            generation,
            outcome: outcome.clone(),
            resolver,
            timer,
        });

        outcome
    }
}

impl Inner {
    fn lock_pending(&self) -> MutexGuard<'_, PendingState> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Timer callback. Does nothing if the flush was preempted meanwhile.
    fn fire(&self, generation: u64) {
        let mut pending = self.lock_pending();
        match pending.scheduled.take() {
            Some(scheduled) if scheduled.generation == generation => {
                debug!("[ProfileUpdater] Running scheduled upload #{}", generation);
                let preempted = Preempted {
                    outcome: scheduled.outcome,
                    resolver: scheduled.resolver,
                };
                // Every caller already holds the shared outcome.
                let _outcome = self.flush(&mut pending, UserProps::default(), Some(preempted));
            }
            other => pending.scheduled = other,
        }
    }

    /// Decide whether an upload is needed and start it.
    ///
    /// Must be called with the pending lock held.
    fn flush(
        &self,
        pending: &mut PendingState,
        props: UserProps,
        preempted: Option<Preempted>,
    ) -> UpdateOutcome {
        pending.last_attempt = Some(self.clock.now());

        let UserState {
            config,
            user,
            pending_user_props,
        } = self.store.state();

        let props = pending_user_props.merged(&props);
        if let Err(e) = props.validate() {
            warn!("[ProfileUpdater] Not uploading malformed pending changes: {}", e);
            return Self::settle(preempted, Err(e));
        }
        let dirty = props.dirty_fields(&user);

        if dirty.is_empty() {
            return Self::settle(preempted, Ok(Some(user)));
        }

        if !config.profile.enabled {
            debug!(
                "[ProfileUpdater] Profile sync disabled, not uploading {} changed fields",
                dirty.len()
            );
            return Self::settle(preempted, Ok(Some(user)));
        }

        let Some(user_id) = user.id.clone() else {
            debug!("[ProfileUpdater] No remote user yet, nothing to upload");
            return Self::settle(preempted, Ok(None));
        };

        debug!(
            "[ProfileUpdater] Uploading changed fields for user {}: {:?}",
            user_id, dirty
        );

        let store = Arc::clone(&self.store);
        let client = Arc::clone(&self.client);
        let handle = tokio::spawn(async move {
            let result = upload(store, client, config.app_id, user_id, user, props).await;
            if let Some(preempted) = preempted {
                preempted.complete(result.clone());
            }
            result
        });

        UpdateOutcome::from_task(handle)
    }

    fn settle(preempted: Option<Preempted>, result: UpdateResult) -> UpdateOutcome {
        match preempted {
            Some(preempted) => preempted.resolve(result),
            None => UpdateOutcome::ready(result),
        }
    }
}

/// Write `props` remotely, then commit them to the store in one batch.
async fn upload(
    store: Arc<dyn UserStore>,
    client: Arc<dyn ProfileClient>,
    app_id: String,
    user_id: String,
    user: AppUser,
    props: UserProps,
) -> UpdateResult {
    if let Err(e) = client.update_app_user(&app_id, &user_id, &props).await {
        warn!(
            "[ProfileUpdater] Profile upload for user {} failed, changes stay pending: {}",
            user_id, e
        );
        return Err(e);
    }

    let updated = user.merged_with(&props)?;
    store.dispatch_batch(vec![
        UserAction::reset_pending_user_props(),
        UserAction::set_user(updated),
    ]);

    info!(
        "[ProfileUpdater] Uploaded {} profile fields for user {}",
        props.len(),
        user_id
    );

    Ok(Some(store.state().user))
}
