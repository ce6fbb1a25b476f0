use crate::config::HTTPConfig;
use crate::errors::StartupError;
use crate::middleware::{load_session, require_login, validate_did};
use crate::state::AppState;
use crate::{events, handlers, messaging, resolver};
use axum::routing::{get, post};
use axum::{middleware, Router};
use didlogin_core::agent::{Agent, IdentityManager};
use didlogin_core::events::{AgentEvent, EventBus};
use didlogin_core::listener::{AuthenticationListener, ListenerHandle};
use didlogin_core::session::{IdleSweeper, SweeperHandle};
use didlogin_core::{LOGIN_ROUTE, MESSAGING_ENDPOINT};
use didlogin_jwt::key_manager::{AgentKeyManager, KeyManager};
use didlogin_jwt::JwtAgent;
use log::info;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub struct DIDLoginRouter {
    router: Router,
}

impl From<Arc<AppState>> for DIDLoginRouter {
    fn from(app_state: Arc<AppState>) -> Self {
        Self {
            router: Self::generate_router(app_state),
        }
    }
}

impl DIDLoginRouter {
    /// Constructs a router given shared state.
    fn generate_router(shared_state: Arc<AppState>) -> Router {
        let guarded = Router::new()
            .route("/", get(handlers::index))
            .route("/home", get(handlers::home))
            .route("/history", get(handlers::history))
            .route("/credential", get(handlers::credential))
            .route_layer(middleware::from_fn_with_state(
                shared_state.clone(),
                require_login,
            ));
        let with_session = Router::new()
            .merge(guarded)
            .route(LOGIN_ROUTE, get(handlers::login))
            .route("/about", get(handlers::about))
            .route("/logout", get(handlers::logout))
            .route("/events", get(events::events))
            .layer(middleware::from_fn_with_state(
                shared_state.clone(),
                load_session,
            ));
        Router::new()
            .merge(with_session)
            .route(MESSAGING_ENDPOINT, post(messaging::handle_message))
            .route("/public-profile", get(handlers::public_profile))
            .route(
                "/did/:id",
                get(resolver::get_did_resolution)
                    .layer(ServiceBuilder::new().layer(middleware::from_fn(validate_did))),
            )
            .layer(TraceLayer::new_for_http())
            .with_state(shared_state)
    }

    /// Moves wrapped app router and consumes.
    pub fn into_router(self) -> Router {
        self.router
    }
}

/// Interval between sweeps of idle sessions.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Shared state wired to a running authentication listener and idle session sweeper.
pub struct DIDLoginApp {
    state: Arc<AppState>,
    listener: ListenerHandle,
    _sweeper: SweeperHandle,
}

impl DIDLoginApp {
    /// Builds the app state and starts authenticating sessions from the agent's saved messages.
    pub fn new(
        config: HTTPConfig,
        agent: Arc<dyn Agent>,
        agent_events: &EventBus<AgentEvent>,
    ) -> Self {
        let state = Arc::new(AppState::new(config, agent));
        let listener =
            AuthenticationListener::new(state.sessions.clone(), state.notifications.clone())
                .spawn(agent_events);
        let sweeper = IdleSweeper::new(state.sessions.clone(), SESSION_SWEEP_INTERVAL).spawn();
        Self {
            state,
            listener,
            _sweeper: sweeper,
        }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub fn listener_running(&self) -> bool {
        !self.listener.is_finished()
    }

    pub fn router(&self) -> Router {
        DIDLoginRouter::from(self.state.clone()).into_router()
    }
}

/// Starts the didlogin server.
///
/// The messaging service endpoint `HOST/handle-message` is published for the service
/// identity before the server accepts requests; failing to publish it is fatal.
pub async fn http_server(config: HTTPConfig) -> Result<(), StartupError> {
    config.validate()?;
    let signing_key = AgentKeyManager::new(&config.data_dir).load_or_generate()?;
    let agent_events = EventBus::default();
    let agent = JwtAgent::new(signing_key, agent_events.clone())?;

    let service_endpoint = config.endpoint(MESSAGING_ENDPOINT)?;
    agent.set_service_endpoint(&service_endpoint).await?;

    let addr = config.to_socket_address()?;
    let app = DIDLoginApp::new(config, Arc::new(agent), &agent_events);
    let server = axum::Server::try_bind(&addr)?.serve(app.router().into_make_service());
    info!("Server running at http://{}/", server.local_addr());
    info!("Messaging service endpoint {}", service_endpoint);
    server.await?;
    Ok(())
}
