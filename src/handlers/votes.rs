// src/handlers/votes.rs
use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::stream;
use log::debug;
use serde::Serialize;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::cooldown::{CooldownStatus, CountdownTicker, VoteState, VoteTracker};
use crate::handlers::{check_rate, ListLimiter, VoteLimiter, VoteStore};
use crate::proxy::TrustedProxies;
use crate::storage::kv::{KeyValueStore, ScopedStore};
use crate::storage::memory::DirectoryStorage;
use crate::utils::{extract_real_ip, now_ms, RequestError};

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Serialize)]
pub struct VoteStatus {
    pub server_id: String,
    pub state: VoteState,
    pub remaining_ms: u64,
    pub countdown: String,
    pub progress_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub votes: Option<u64>,
}

impl VoteStatus {
    fn new(server_id: &str, status: CooldownStatus, votes: Option<u64>) -> Self {
        Self {
            server_id: server_id.to_string(),
            state: status.state,
            remaining_ms: status.remaining_ms,
            countdown: status.countdown(),
            progress_percent: status.progress_percent(),
            votes,
        }
    }
}

type VoterTracker = VoteTracker<ScopedStore<Arc<dyn KeyValueStore>>>;

/// Each client address gets its own slice of the vote store.
fn voter_tracker(store: &VoteStore, voter: IpAddr) -> VoterTracker {
    VoteTracker::new(ScopedStore::new(store.0.clone(), voter.to_string()))
}

pub async fn vote_status(
    req: HttpRequest,
    path: web::Path<String>,
    storage: web::Data<DirectoryStorage>,
    store: web::Data<VoteStore>,
    proxies: web::Data<TrustedProxies>,
    rate_limiter: web::Data<ListLimiter>,
) -> Result<HttpResponse, RequestError> {
    let voter = extract_real_ip(&req, &proxies)?;
    check_rate(&rate_limiter.0, voter, "vote status")?;
    let server = storage.get_server(&path)?;

    let status = voter_tracker(&store, voter).check_state(&server.id, now_ms());
    Ok(HttpResponse::Ok().json(VoteStatus::new(&server.id, status, Some(server.votes))))
}

pub async fn cast_vote(
    req: HttpRequest,
    path: web::Path<String>,
    storage: web::Data<DirectoryStorage>,
    store: web::Data<VoteStore>,
    proxies: web::Data<TrustedProxies>,
    rate_limiter: web::Data<VoteLimiter>,
) -> Result<HttpResponse, RequestError> {
    let voter = extract_real_ip(&req, &proxies)?;
    check_rate(&rate_limiter.0, voter, "vote")?;

    let server = storage.get_server(&path)?;

    // the vote store may write to disk
    let tracker = voter_tracker(&store, voter);
    let listener = storage.clone();
    let server_id = server.id.clone();
    let status = web::block(move || tracker.record_vote(&server_id, now_ms(), listener.get_ref()))
        .await
        .map_err(|e| RequestError::Internal(e.to_string()))??;
    let votes = storage.get_server(&server.id)?.votes;

    debug!("Vote from {} for {} accepted, now {} votes", voter, server.id, votes);
    Ok(HttpResponse::Ok().json(VoteStatus::new(&server.id, status, Some(votes))))
}

/// Server-sent events, one per second, until the voter may vote again.
pub async fn vote_countdown(
    req: HttpRequest,
    path: web::Path<String>,
    storage: web::Data<DirectoryStorage>,
    store: web::Data<VoteStore>,
    proxies: web::Data<TrustedProxies>,
    rate_limiter: web::Data<VoteLimiter>,
) -> Result<HttpResponse, RequestError> {
    let voter = extract_real_ip(&req, &proxies)?;
    check_rate(&rate_limiter.0, voter, "vote countdown")?;
    let server_id = storage.get_server(&path)?.id;

    let tracker = voter_tracker(&store, voter);
    let watched_id = server_id.clone();
    let ticker = CountdownTicker::spawn(TICK, move || tracker.check_state(&watched_id, now_ms()));

    let events = stream::unfold((ticker, server_id), |(mut ticker, server_id)| async move {
        let status = ticker.next().await?;
        let event = serde_json::to_string(&VoteStatus::new(&server_id, status, None))
            .map(|json| web::Bytes::from(format!("data: {}\n\n", json)));
        Some((event, (ticker, server_id)))
    });

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(events))
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::cooldown::COOLDOWN_MS;
    use crate::handlers::testing;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::Value;

    #[actix_web::test]
    async fn vote_increments_and_then_cools_down() {
        let state = testing::state();
        let app = test::init_service(App::new().configure(|cfg| state.configure(cfg))).await;
        let server = state.storage.get_servers().remove(0);
        let uri = format!("/servers/{}/vote", server.id);

        let before: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri(&uri).peer_addr(testing::client()).to_request(),
        )
        .await;
        assert_eq!(before["state"], "eligible");
        assert_eq!(before["remaining_ms"], 0);

        let resp = test::call_service(
            &app,
            test::TestRequest::post().uri(&uri).peer_addr(testing::client()).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let voted: Value = test::read_body_json(resp).await;
        assert_eq!(voted["state"], "cooling");
        assert_eq!(voted["remaining_ms"], COOLDOWN_MS);
        assert_eq!(voted["countdown"], "24:00:00");
        assert_eq!(voted["votes"], server.votes + 1);

        let again = test::call_service(
            &app,
            test::TestRequest::post().uri(&uri).peer_addr(testing::client()).to_request(),
        )
        .await;
        assert_eq!(again.status(), StatusCode::CONFLICT);
        let rejected: Value = test::read_body_json(again).await;
        assert!(rejected["remaining_ms"].as_u64().unwrap() <= COOLDOWN_MS);

        assert_eq!(state.storage.get_server(&server.id).unwrap().votes, server.votes + 1);
    }

    #[actix_web::test]
    async fn cooldown_is_per_voter() {
        let state = testing::state();
        let app = test::init_service(App::new().configure(|cfg| state.configure(cfg))).await;
        let server = state.storage.get_servers().remove(0);
        let uri = format!("/servers/{}/vote", server.id);

        for peer in [testing::client(), testing::other_client()] {
            let resp = test::call_service(
                &app,
                test::TestRequest::post().uri(&uri).peer_addr(peer).to_request(),
            )
            .await;
            assert_eq!(resp.status(), StatusCode::OK);
        }
        assert_eq!(state.storage.get_server(&server.id).unwrap().votes, server.votes + 2);
    }

    #[actix_web::test]
    async fn voting_for_unknown_server_is_not_found() {
        let state = testing::state();
        let app = test::init_service(App::new().configure(|cfg| state.configure(cfg))).await;

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/servers/missing/vote")
                .peer_addr(testing::client())
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn countdown_stream_ends_when_eligible() {
        let state = testing::state();
        let app = test::init_service(App::new().configure(|cfg| state.configure(cfg))).await;
        let server = state.storage.get_servers().remove(0);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!("/servers/{}/vote/countdown", server.id))
                .peer_addr(testing::client())
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = test::read_body(resp).await;
        let text = std::str::from_utf8(&body).unwrap();
        let events: Vec<&str> = text.split("\n\n").filter(|e| !e.is_empty()).collect();
        assert_eq!(events.len(), 1);

        let event: Value = serde_json::from_str(events[0].trim_start_matches("data: ")).unwrap();
        assert_eq!(event["state"], "eligible");
        assert_eq!(event["countdown"], "00:00:00");
    }

    #[actix_web::test]
    async fn countdown_streams_are_rate_limited() {
        let state = testing::state_with(Config {
            vote_period_secs: 60,
            vote_burst_limit: 1,
            ..Config::default()
        });
        let app = test::init_service(App::new().configure(|cfg| state.configure(cfg))).await;
        let server = state.storage.get_servers().remove(0);
        let uri = format!("/servers/{}/vote/countdown", server.id);

        let open = || test::TestRequest::get().uri(&uri).peer_addr(testing::client()).to_request();
        assert_eq!(test::call_service(&app, open()).await.status(), StatusCode::OK);
        assert_eq!(
            test::call_service(&app, open()).await.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[actix_web::test]
    async fn vote_status_is_rate_limited() {
        let state = testing::state_with(Config {
            server_list_period_secs: 60,
            server_list_burst_limit: 1,
            ..Config::default()
        });
        let app = test::init_service(App::new().configure(|cfg| state.configure(cfg))).await;
        let server = state.storage.get_servers().remove(0);
        let uri = format!("/servers/{}/vote", server.id);

        let check = || test::TestRequest::get().uri(&uri).peer_addr(testing::client()).to_request();
        assert_eq!(test::call_service(&app, check()).await.status(), StatusCode::OK);
        assert_eq!(
            test::call_service(&app, check()).await.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }
}
