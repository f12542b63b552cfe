//! Observable authentication state.
//!
//! `AuthState` mirrors the access token for reactive consumers and tracks the
//! session lifecycle. It is not authoritative for tokens: the [`TokenStore`]
//! is, and the session reconciles this state from it at startup.
//!
//! Every mutator notifies all current subscribers synchronously before it
//! returns. Apply-and-notify is serialised across threads, so observers see
//! snapshots in mutation order. Observers run after the state lock is
//! released, so they may read the state, but must not call a mutator.
//!
//! [`TokenStore`]: super::TokenStore

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde::Serialize;
use tracing::{debug, warn};

use super::lock;
use crate::models::UserProfile;

/// Session lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub enum Status {
    /// No tokens held
    Anonymous,
    /// Login, registration or initial verification in flight
    Authenticating,
    /// Holding an access token; the user may still be loading
    Authenticated,
    /// Authenticated, but re-acquiring an access token after a 401
    Refreshing,
    /// Refresh failed; the session is being torn down
    Expired,
}

impl Status {
    /// `Refreshing` counts as authenticated: it is a sub-state that keeps the user.
    ///
    /// "A user is present only while authenticated" holds under this reading,
    /// not under `status == Authenticated`: a refresh keeps the profile, and
    /// `set_user` is accepted in either status.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Status::Authenticated | Status::Refreshing)
    }
}

#[derive(Clone, PartialEq)]
pub struct AuthSnapshot {
    pub status: Status,
    pub access_token: Option<String>,
    pub user: Option<UserProfile>,
    pub is_loading: bool,
    /// Incremented on every mutation
    pub version: u64,
}

impl AuthSnapshot {
    fn initial() -> Self {
        Self {
            status: Status::Anonymous,
            access_token: None,
            user: None,
            is_loading: true,
            version: 0,
        }
    }

    /// Authenticated with no profile yet: the session has not been verified.
    pub fn is_pending_verification(&self) -> bool {
        self.status.is_authenticated() && self.user.is_none()
    }
}

impl std::fmt::Debug for AuthSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSnapshot")
            .field("status", &self.status)
            .field("has_access_token", &self.access_token.is_some())
            .field("user", &self.user.as_ref().map(|u| u.id))
            .field("is_loading", &self.is_loading)
            .field("version", &self.version)
            .finish()
    }
}

type Observer = Arc<dyn Fn(&AuthSnapshot) + Send + Sync>;
type ObserverList = Mutex<Vec<(u64, Observer)>>;

/// Handle returned by [`AuthState::subscribe`]; dropping it detaches the observer.
#[must_use = "dropping the subscription immediately unsubscribes"]
pub struct Subscription {
    id: u64,
    observers: Weak<ObserverList>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(observers) = self.observers.upgrade() {
            lock(&observers).retain(|(id, _)| *id != self.id);
        }
    }
}

pub struct AuthState {
    state: Mutex<AuthSnapshot>,
    /// Held from mutation until the last observer returns
    notify: Mutex<()>,
    observers: Arc<ObserverList>,
    next_observer_id: AtomicU64,
}

impl Default for AuthState {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthState {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(AuthSnapshot::initial()),
            notify: Mutex::new(()),
            observers: Arc::new(Mutex::new(Vec::new())),
            next_observer_id: AtomicU64::new(1),
        }
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        lock(&self.state).clone()
    }

    pub fn status(&self) -> Status {
        lock(&self.state).status
    }

    pub fn access_token(&self) -> Option<String> {
        lock(&self.state).access_token.clone()
    }

    pub fn user(&self) -> Option<UserProfile> {
        lock(&self.state).user.clone()
    }

    /// Register an observer. It is called once immediately with the current
    /// snapshot, then after every mutation until the subscription is dropped.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&AuthSnapshot) + Send + Sync + 'static,
    {
        let id = self.next_observer_id.fetch_add(1, Ordering::Relaxed);
        let observer: Observer = Arc::new(observer);
        let _notify = lock(&self.notify);
        lock(&self.observers).push((id, Arc::clone(&observer)));
        observer(&self.snapshot());
        Subscription {
            id,
            observers: Arc::downgrade(&self.observers),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.observers).len()
    }

    /// A token was obtained by login, registration, refresh or startup.
    pub fn login(&self, access_token: &str) {
        self.mutate(|s| {
            s.status = Status::Authenticated;
            s.access_token = Some(access_token.to_string());
            s.is_loading = false;
        });
    }

    /// Force `anonymous`, dropping the token mirror and the user.
    pub fn logout(&self) {
        self.mutate(|s| {
            s.status = Status::Anonymous;
            s.access_token = None;
            s.user = None;
            s.is_loading = false;
        });
    }

    /// Attach the verified profile. Ignored unless the session is
    /// authenticated, so a profile fetch that settles after logout or expiry
    /// cannot revive it.
    pub fn set_user(&self, profile: UserProfile) -> bool {
        self.mutate_if(|s| {
            if s.access_token.is_none() || !s.status.is_authenticated() {
                warn!(user_id = profile.id, status = ?s.status, "Ignoring user profile for an inactive session");
                return false;
            }
            s.user = Some(profile);
            s.is_loading = false;
            true
        })
    }

    pub fn set_loading(&self, loading: bool) {
        self.mutate(|s| s.is_loading = loading);
    }

    /// Login or registration started. Any previous user is dropped.
    pub fn begin_authenticating(&self) {
        self.mutate(|s| {
            s.status = Status::Authenticating;
            s.user = None;
            s.is_loading = true;
        });
    }

    /// A refresh episode started. Only an `authenticated` session moves to
    /// `refreshing`; other states are left alone without notification.
    pub fn begin_refresh(&self) {
        self.mutate_if(|s| {
            if s.status != Status::Authenticated {
                return false;
            }
            s.status = Status::Refreshing;
            true
        });
    }

    /// The refresh failed; teardown follows.
    pub fn mark_expired(&self) {
        self.mutate(|s| {
            s.status = Status::Expired;
            s.user = None;
        });
    }

    fn mutate(&self, apply: impl FnOnce(&mut AuthSnapshot)) {
        self.mutate_if(|s| {
            apply(s);
            true
        });
    }

    /// Apply a change and notify, unless `apply` declines by returning false.
    fn mutate_if(&self, apply: impl FnOnce(&mut AuthSnapshot) -> bool) -> bool {
        let _notify = lock(&self.notify);
        let snapshot = {
            let mut state = lock(&self.state);
            if !apply(&mut *state) {
                return false;
            }
            state.version += 1;
            state.clone()
        };
        debug!(status = ?snapshot.status, version = snapshot.version, "Auth state changed");

        let observers: Vec<Observer> = lock(&self.observers)
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in observers {
            observer(&snapshot);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> UserProfile {
        UserProfile {
            id: 1,
            username: "maria".to_string(),
            email: "maria@example.com".to_string(),
        }
    }

    fn recorder(state: &AuthState) -> (Arc<Mutex<Vec<AuthSnapshot>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = state.subscribe(move |s| sink.lock().unwrap().push(s.clone()));
        (seen, sub)
    }

    #[test]
    fn test_initial_state_is_loading_anonymous() {
        let state = AuthState::new();
        let snap = state.snapshot();
        assert_eq!(snap.status, Status::Anonymous);
        assert!(snap.is_loading);
        assert!(snap.access_token.is_none());
    }

    #[test]
    fn test_every_mutation_notifies_in_order() {
        let state = AuthState::new();
        let (seen, _sub) = recorder(&state);

        state.login("A1");
        state.set_user(profile());
        state.logout();

        let seen = seen.lock().unwrap();
        let statuses: Vec<Status> = seen.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![Status::Anonymous, Status::Authenticated, Status::Authenticated, Status::Anonymous]
        );
        let versions: Vec<u64> = seen.iter().map(|s| s.version).collect();
        assert_eq!(versions, vec![0, 1, 2, 3]);
        assert!(seen[1].is_pending_verification());
        assert!(!seen[2].is_pending_verification());
    }

    #[test]
    fn test_logout_clears_user_and_token() {
        let state = AuthState::new();
        state.login("A1");
        state.set_user(profile());
        state.logout();

        let snap = state.snapshot();
        assert_eq!(snap.status, Status::Anonymous);
        assert!(snap.user.is_none());
        assert!(snap.access_token.is_none());
    }

    #[test]
    fn test_set_user_ignored_without_token() {
        let state = AuthState::new();
        state.logout();
        assert!(!state.set_user(profile()));
        assert_eq!(state.status(), Status::Anonymous);
        assert!(state.user().is_none());
    }

    #[test]
    fn test_set_user_ignored_once_expired() {
        let state = AuthState::new();
        state.login("A1");
        state.mark_expired();
        assert!(!state.set_user(profile()));
        assert_eq!(state.status(), Status::Expired);
        assert!(state.user().is_none());
    }

    #[test]
    fn test_refresh_keeps_user() {
        let state = AuthState::new();
        state.login("A1");
        state.set_user(profile());

        state.begin_refresh();
        assert_eq!(state.status(), Status::Refreshing);
        assert!(state.status().is_authenticated());
        assert!(state.user().is_some());

        state.login("A2");
        assert_eq!(state.status(), Status::Authenticated);
        assert_eq!(state.access_token().as_deref(), Some("A2"));
        assert_eq!(state.user(), Some(profile()));
    }

    #[test]
    fn test_begin_refresh_ignored_when_signed_out() {
        let state = AuthState::new();
        state.logout();
        let before = state.snapshot().version;
        state.begin_refresh();
        assert_eq!(state.status(), Status::Anonymous);
        assert_eq!(state.snapshot().version, before);
    }

    #[test]
    fn test_user_implies_authenticated() {
        let state = AuthState::new();
        state.login("A1");
        state.set_user(profile());

        state.begin_authenticating();
        assert!(state.user().is_none());

        state.login("A1");
        state.set_user(profile());
        state.mark_expired();
        assert_eq!(state.status(), Status::Expired);
        assert!(state.user().is_none());
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let state = AuthState::new();
        let (seen, sub) = recorder(&state);
        assert_eq!(state.subscriber_count(), 1);

        sub.unsubscribe();
        assert_eq!(state.subscriber_count(), 0);
        state.login("A1");
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_observer_may_read_state() {
        let state = Arc::new(AuthState::new());
        let reader = Arc::clone(&state);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = state.subscribe(move |snap| {
            // Re-entrant read must not deadlock
            sink.lock().unwrap().push(reader.status() == snap.status);
        });
        state.login("A1");
        assert!(seen.lock().unwrap().iter().all(|same| *same));
    }

    #[test]
    fn test_concurrent_mutations_are_delivered_in_order() {
        let state = Arc::new(AuthState::new());
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&delivered);
        let _sub = state.subscribe(move |snap| {
            if snap.status == Status::Authenticated {
                // Slow observer: the other thread mutates while this runs
                std::thread::sleep(std::time::Duration::from_millis(100));
            }
            sink.lock().unwrap().push((snap.version, snap.status));
        });

        let first = Arc::clone(&state);
        let login = std::thread::spawn(move || first.login("A2"));
        std::thread::sleep(std::time::Duration::from_millis(20));
        let second = Arc::clone(&state);
        let logout = std::thread::spawn(move || second.logout());
        login.join().unwrap();
        logout.join().unwrap();

        let delivered = delivered.lock().unwrap();
        let versions: Vec<u64> = delivered.iter().map(|(v, _)| *v).collect();
        assert_eq!(versions, vec![0, 1, 2]);
        assert_eq!(delivered.last().map(|(_, s)| *s), Some(state.status()));
        assert_eq!(state.status(), Status::Anonymous);
    }
}
