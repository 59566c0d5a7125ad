use camcommander::operations::relay_poke_op::{poke_due_relays, poke_relay, PokeOutcome};
use camcommander::source_config::RelayConfig;
use reqwest::Client;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn relay_at(name: &str, port: u16) -> RelayConfig {
    RelayConfig {
        name: name.to_string(),
        address: "127.0.0.1".to_string(),
        port,
        relayidx: 1,
        pulse_duration: 2.0,
        interval: 10,
        minute_offset: 3,
        timeout: 1,
        disabled: false,
    }
}

async fn closed_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn ok_response_counts_as_poked() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/state.xml"))
        .and(query_param("relay1State", "2"))
        .and(query_param("pulseTime1", "2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = poke_relay(&Client::new(), &relay_at("gate", server.address().port())).await;
    assert_eq!(outcome, PokeOutcome::Poked);
}

#[tokio::test]
async fn error_status_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let outcome = poke_relay(&Client::new(), &relay_at("gate", server.address().port())).await;
    assert!(matches!(outcome, PokeOutcome::Failed(_)));
}

#[tokio::test]
async fn refused_connection_is_tolerated() {
    let port = closed_port().await;
    let outcome = poke_relay(&Client::new(), &relay_at("gate", port)).await;
    assert_eq!(outcome, PokeOutcome::ConnectionError);
}

#[tokio::test]
async fn slow_relay_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let outcome = poke_relay(&Client::new(), &relay_at("gate", server.address().port())).await;
    assert_eq!(outcome, PokeOutcome::TimedOut);
}

#[tokio::test]
async fn only_enabled_relays_due_this_minute_are_poked() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let port = server.address().port();

    let due = relay_at("due", port);
    let mut later = relay_at("later", port);
    later.minute_offset = 4;
    let mut disabled = relay_at("disabled", port);
    disabled.disabled = true;
    let mut misconfigured = relay_at("misconfigured", port);
    misconfigured.minute_offset = 10;

    let outcomes = poke_due_relays(&Client::new(), &[due, later, disabled, misconfigured], 23).await;
    assert_eq!(outcomes, [("due".to_string(), PokeOutcome::Poked)]);
}
