use didlogin_core::action::{Action, ActionHandler};
use didlogin_core::credential::{credential_with_claim, presentation};
use didlogin_core::events::EventBus;
use didlogin_http::config::HTTPConfig;
use didlogin_http::server::DIDLoginApp;
use didlogin_jwt::jwt::{claim_str, decode_unverified};
use didlogin_jwt::JwtAgent;
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;

// Setup based on https://github.com/spruceid/didkit/blob/main/http/tests/main.rs
fn serve() -> (String, DIDLoginApp, impl FnOnce()) {
    let agent = Arc::new(JwtAgent::generate(EventBus::default()).unwrap());
    let events = agent.events().clone();
    let config = HTTPConfig {
        host: Some("http://localhost:8081".to_string()),
        port: Some(0),
        ..Default::default()
    };
    let app = DIDLoginApp::new(config, agent, &events);

    let addr = ([127, 0, 0, 1], 0).into();
    let server = axum::Server::bind(&addr).serve(app.router().into_make_service());
    let url = "http://".to_string() + &server.local_addr().to_string();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let shutdown = || shutdown_tx.send(()).unwrap();
    let graceful = server.with_graceful_shutdown(async {
        shutdown_rx.await.unwrap();
    });
    tokio::task::spawn(async move {
        graceful.await.unwrap();
    });
    (url, app, shutdown)
}

fn session_cookie(response: &reqwest::Response) -> String {
    let set_cookie = response.headers()["set-cookie"].to_str().unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

#[tokio::test]
async fn not_found() {
    let (base, _app, shutdown) = serve();
    let response = reqwest::get(base + "/nonexistent-path").await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    shutdown();
}

#[tokio::test]
async fn login_over_server_sent_events() {
    let (base, _app, shutdown) = serve();
    let client = reqwest::Client::builder()
        .redirect(Policy::none())
        .build()
        .unwrap();

    // Visit the login page and read the session tag from the request.
    let response = client.get(format!("{base}/login")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(&response);
    let page = response.text().await.unwrap();
    let start = page.find("?c_i=").unwrap() + "?c_i=".len();
    let sdr = page[start..].split('"').next().unwrap();
    let claims = decode_unverified(sdr).unwrap();
    let tag = claim_str(&claims, "tag").unwrap().to_owned();
    let server_did = claim_str(&claims, "iss").unwrap().to_owned();
    assert_eq!(cookie, format!("didlogin.sid={tag}"));

    // Subscribe to the session room.
    let mut events = client
        .get(format!("{base}/events"))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(events.status(), StatusCode::OK);

    // The wallet answers with a presentation tagged with the session id.
    let wallet = JwtAgent::generate(EventBus::default()).unwrap();
    let vc = wallet
        .handle_action(Action::SignVc {
            issuer: wallet.did().to_owned(),
            subject: wallet.did().to_owned(),
            credential: credential_with_claim("name", "Alice").unwrap(),
        })
        .await
        .unwrap();
    let vp = wallet
        .handle_action(Action::SignVp {
            issuer: wallet.did().to_owned(),
            audience: server_did,
            tag: Some(tag),
            presentation: presentation(vec![vc]),
        })
        .await
        .unwrap();
    let response = client
        .post(format!("{base}/handle-message"))
        .header("content-type", "text/plain")
        .body(vp)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut received = String::new();
    while !received.contains("event: loggedin") {
        let chunk = tokio::time::timeout(Duration::from_secs(5), events.chunk())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        received.push_str(&String::from_utf8_lossy(&chunk));
    }
    assert!(received.contains(&format!(r#"data: {{"did":"{}"}}"#, wallet.did())));

    let response = client
        .get(format!("{base}/home"))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.unwrap().contains("Welcome, Alice!"));

    shutdown();
}
