//! Shared fixtures for tests that talk to a wiremock server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use wiremock::MockServer;

use crate::api::Endpoint;
use crate::auth::{Navigator, Route, Session, TokenStore};
use crate::models::TokenPair;

pub(crate) fn mock_endpoint(server: &MockServer) -> Endpoint {
    Endpoint::new(&format!("{}/api", server.uri()), Duration::from_secs(5))
        .expect("mock endpoint should build")
}

#[derive(Default)]
pub(crate) struct RecordingNavigator {
    routes: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    pub(crate) fn routes(&self) -> Vec<Route> {
        self.routes.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route) {
        self.routes.lock().unwrap().push(route);
    }
}

pub(crate) struct TestSession {
    pub session: Session,
    pub navigator: Arc<RecordingNavigator>,
}

impl TestSession {
    /// Anonymous session with in-memory token storage.
    pub(crate) fn new(server: &MockServer) -> Self {
        let navigator = Arc::new(RecordingNavigator::default());
        let session = Session::with_parts(
            mock_endpoint(server),
            Arc::new(TokenStore::in_memory()),
            navigator.clone(),
        );
        Self { session, navigator }
    }

    pub(crate) fn signed_in(server: &MockServer, access: &str, refresh: &str) -> Self {
        let t = Self::new(server);
        t.session.tokens().set_pair(&TokenPair {
            access: access.to_string(),
            refresh: refresh.to_string(),
        });
        t.session.state().login(access);
        t
    }
}
