//! User state container and the actions that change it.
//!
//! The profile updater never mutates state directly. It reads snapshots from a
//! [`UserStore`] and proposes changes by dispatching [`UserAction`]s, which the
//! store applies through [`UserState::reduce`].

use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::AppConfig;
use crate::types::{AppUser, UserProps};

/// State changes that can be dispatched to a [`UserStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserAction {
    /// Replace the user snapshot.
    SetUser { user: AppUser },

    /// Patch editable fields of the user in place.
    UpdateUser { properties: UserProps },

    /// Forget the current user.
    ResetUser,

    /// Drop all accumulated pending props.
    ResetPendingUserProps,

    /// Merge props into the pending set, latest value wins.
    UpdatePendingUserProps { properties: UserProps },
}

impl UserAction {
    pub fn set_user(user: AppUser) -> Self {
        Self::SetUser { user }
    }

    pub fn update_user(properties: impl Into<UserProps>) -> Self {
        Self::UpdateUser {
            properties: properties.into(),
        }
    }

    pub fn reset_user() -> Self {
        Self::ResetUser
    }

    pub fn reset_pending_user_props() -> Self {
        Self::ResetPendingUserProps
    }

    pub fn update_pending_user_props(properties: impl Into<UserProps>) -> Self {
        Self::UpdatePendingUserProps {
            properties: properties.into(),
        }
    }
}

/// Everything the profile updater reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserState {
    #[serde(default)]
    pub config: AppConfig,
    #[serde(default)]
    pub user: AppUser,
    #[serde(default)]
    pub pending_user_props: UserProps,
}

impl UserState {
    pub fn new(config: AppConfig, user: AppUser) -> Self {
        Self {
            config,
            user,
            pending_user_props: UserProps::default(),
        }
    }

    /// Apply a single action.
    pub fn reduce(&mut self, action: UserAction) {
        match action {
            UserAction::SetUser { user } => {
                self.user = user;
            }
            UserAction::UpdateUser { properties } => match self.user.merged_with(&properties) {
                Ok(user) => self.user = user,
                Err(e) => warn!("Ignoring user update that does not apply: {}", e),
            },
            UserAction::ResetUser => {
                self.user = AppUser::default();
            }
            UserAction::ResetPendingUserProps => {
                self.pending_user_props = UserProps::default();
            }
            UserAction::UpdatePendingUserProps { properties } => {
                self.pending_user_props.merge(&properties);
            }
        }
    }
}

/// Source of user state and sink for user actions.
///
/// # Design Rules
///
/// - `state()` returns a consistent snapshot
/// - `dispatch_batch()` must apply all actions before any reader sees the result
pub trait UserStore: Send + Sync {
    /// Snapshot of the current state.
    fn state(&self) -> UserState;

    /// Apply a single action.
    fn dispatch(&self, action: UserAction);

    /// Apply several actions as one change.
    ///
    /// Default implementation calls `dispatch()` for each action; stores that
    /// expose intermediate states to readers must override it.
    fn dispatch_batch(&self, actions: Vec<UserAction>) {
        for action in actions {
            self.dispatch(action);
        }
    }
}

/// Store backed by an in-process `RwLock`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserStore {
    state: Arc<RwLock<UserState>>,
}

impl InMemoryUserStore {
    pub fn new(state: UserState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }
}

impl UserStore for InMemoryUserStore {
    fn state(&self) -> UserState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn dispatch(&self, action: UserAction) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .reduce(action);
    }

    fn dispatch_batch(&self, actions: Vec<UserAction>) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        for action in actions {
            state.reduce(action);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EditableField;
    use serde_json::{json, Value};

    fn store() -> InMemoryUserStore {
        let user: AppUser = serde_json::from_value(json!({
            "_id": "u1",
            "givenName": "Ada",
            "properties": { "plan": "free" }
        }))
        .unwrap();
        InMemoryUserStore::new(UserState::new(AppConfig::default(), user))
    }

    #[test]
    fn test_update_pending_props_merges_and_filters() {
        let store = store();
        store.dispatch(UserAction::update_pending_user_props(
            json!({ "givenName": "Grace", "role": "admin" })
                .as_object()
                .cloned()
                .unwrap(),
        ));
        store.dispatch(UserAction::update_pending_user_props(
            UserProps::new().email("grace@example.com"),
        ));

        let pending = store.state().pending_user_props;
        assert_eq!(
            serde_json::to_value(&pending).unwrap(),
            json!({ "givenName": "Grace", "email": "grace@example.com" })
        );
    }

    #[test]
    fn test_reset_pending_props() {
        let store = store();
        store.dispatch(UserAction::update_pending_user_props(
            UserProps::new().surname("Hopper"),
        ));
        store.dispatch(UserAction::reset_pending_user_props());
        assert!(store.state().pending_user_props.is_empty());
    }

    #[test]
    fn test_update_user_merges_properties() {
        let store = store();
        store.dispatch(UserAction::update_user(
            UserProps::new()
                .surname("Lovelace")
                .with(EditableField::Properties, json!({ "seats": 3 })),
        ));

        let user = store.state().user;
        assert_eq!(user.given_name.as_deref(), Some("Ada"));
        assert_eq!(user.surname.as_deref(), Some("Lovelace"));
        assert_eq!(
            Value::Object(user.properties),
            json!({ "plan": "free", "seats": 3 })
        );
    }

    #[test]
    fn test_invalid_update_user_is_ignored() {
        let store = store();
        let before = store.state().user;
        store.dispatch(UserAction::update_user(
            UserProps::new().with(EditableField::Properties, json!(42)),
        ));
        assert_eq!(store.state().user, before);
    }

    #[test]
    fn test_set_and_reset_user() {
        let store = store();
        store.dispatch(UserAction::set_user(AppUser::with_id("u2")));
        assert_eq!(store.state().user.id.as_deref(), Some("u2"));

        store.dispatch(UserAction::reset_user());
        assert_eq!(store.state().user, AppUser::default());
    }

    #[test]
    fn test_dispatch_batch_applies_in_order() {
        let store = store();
        store.dispatch(UserAction::update_pending_user_props(
            UserProps::new().given_name("Grace"),
        ));

        store.dispatch_batch(vec![
            UserAction::reset_pending_user_props(),
            UserAction::set_user(AppUser::with_id("u9")),
        ]);

        let state = store.state();
        assert!(state.pending_user_props.is_empty());
        assert_eq!(state.user.id.as_deref(), Some("u9"));
    }

    #[test]
    fn test_action_wire_format() {
        let action = UserAction::update_pending_user_props(UserProps::new().email("a@b.c"));
        assert_eq!(
            serde_json::to_value(&action).unwrap(),
            json!({ "type": "UPDATE_PENDING_USER_PROPS", "properties": { "email": "a@b.c" } })
        );
        assert_eq!(
            serde_json::to_value(UserAction::ResetUser).unwrap(),
            json!({ "type": "RESET_USER" })
        );
    }
}
