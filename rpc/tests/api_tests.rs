//! HTTP API tests against nullable infrastructure.

use std::sync::Arc;

use airdrop_broadcaster::{
    BroadcastEngine, EngineConfig, NoopObserver, Reconciler, RetryPolicy, Submitter,
};
use airdrop_crypto::{keypair_from_seed, AddressCodec};
use airdrop_ledger::TxBuilder;
use airdrop_nullables::{NullClaimStore, NullClock, NullLedger, NullProofVerifier, ScriptedBroadcast};
use airdrop_rpc::{router, AppState, CampaignParams, ClaimIntake, AIRDROPS_PATH};
use airdrop_store::{ClaimStore, ConflictPolicy};
use airdrop_types::{ClaimStatus, Clock, Coin, TxHash};
use airdrop_verification::{
    AddressBindingMode, EligibilityPolicy, IdentityVerifier, PublicInputSchema, VerificationKeys,
};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::TimeZone;
use prometheus::{IntCounter, Registry};
use serde_json::{json, Value};
use tower::ServiceExt;

const SELECTOR: &str = "23073";
const EVENT_ID: &str = "42";

fn codec() -> AddressCodec {
    AddressCodec::default()
}

fn address() -> String {
    codec()
        .encode(&keypair_from_seed(&[11u8; 32]).public)
        .as_str()
        .to_string()
}

fn policy(conflict_policy: ConflictPolicy) -> EligibilityPolicy {
    EligibilityPolicy {
        min_age: 18,
        allowed_citizenships: vec!["FRA".into()],
        query_selector: SELECTOR.into(),
        event_id: EVENT_ID.into(),
        address_binding: AddressBindingMode::Blake2b,
        conflict_policy,
        schema: PublicInputSchema::default(),
    }
}

fn signals(nullifier: &str) -> Vec<String> {
    let mut s = vec!["0".to_string(); 14];
    s[0] = nullifier.into();
    s[1] = "990101".into();
    s[2] = "240501".into();
    s[6] = "FRA".into();
    s[7] = "301231".into();
    s[9] = EVENT_ID.into();
    s[10] = AddressBindingMode::Blake2b
        .expected(&codec(), &address())
        .unwrap();
    s[12] = SELECTOR.into();
    s
}

fn body_for(pub_signals: Vec<String>) -> Value {
    json!({
        "data": {
            "type": "create_airdrop",
            "attributes": {
                "address": address(),
                "algorithm": "sha256",
                "zk_proof": {
                    "proof": { "pi_a": [], "pi_b": [], "pi_c": [] },
                    "pub_signals": pub_signals
                }
            }
        }
    })
}

struct Fixture {
    store: Arc<NullClaimStore>,
    ledger: Arc<NullLedger>,
    proofs: Arc<NullProofVerifier>,
    /// Engine sharing the submitter with sync intake; `None` in async mode.
    engine: Option<Arc<BroadcastEngine>>,
    app: Router,
}

#[derive(Clone, Copy)]
enum Proofs {
    Accept,
    Reject,
    BrokenKey,
}

struct Options {
    proofs: Proofs,
    sync: bool,
    conflict_policy: ConflictPolicy,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            proofs: Proofs::Accept,
            sync: false,
            conflict_policy: ConflictPolicy::Any,
        }
    }
}

fn fixture_with(options: Options) -> Fixture {
    let store = Arc::new(NullClaimStore::new());
    let ledger = Arc::new(NullLedger::new());
    let clock = Arc::new(NullClock::at_date(2024, 5, 1));
    let proofs = Arc::new(match options.proofs {
        Proofs::Accept => NullProofVerifier::accepting(),
        Proofs::Reject => NullProofVerifier::rejecting(),
        Proofs::BrokenKey => NullProofVerifier::broken_keys(),
    });

    let mut keys = VerificationKeys::new();
    keys.insert("sha256", b"{}".to_vec());
    let verifier = Arc::new(
        IdentityVerifier::new(
            policy(options.conflict_policy),
            keys,
            proofs.clone(),
            codec(),
        )
        .unwrap(),
    );

    let mut intake = ClaimIntake::new(
        verifier,
        store.clone(),
        clock.clone(),
        Coin::new(100, "urmo"),
    );
    let mut engine = None;
    if options.sync {
        let builder = Arc::new(TxBuilder::new(
            "airdrop-test-1",
            keypair_from_seed(&[3u8; 32]),
            &codec(),
        ));
        let submitter = Arc::new(Submitter::new(ledger.clone(), builder, 3));
        let reconciler = Arc::new(Reconciler::new(
            store.clone(),
            ledger.clone(),
            clock.clone(),
            Arc::new(NoopObserver),
            RetryPolicy::default(),
        ));
        engine = Some(Arc::new(BroadcastEngine::new(
            store.clone(),
            submitter.clone(),
            reconciler.clone(),
            clock.clone(),
            Arc::new(NoopObserver),
            EngineConfig::default(),
        )));
        intake = intake.with_sync_payout(submitter, reconciler);
    }

    let registry = Arc::new(Registry::new());
    let marker = IntCounter::new("airdrop_test_marker_total", "test counter").unwrap();
    registry.register(Box::new(marker.clone())).unwrap();
    marker.inc();

    let params = CampaignParams {
        event_id: EVENT_ID.into(),
        query_selector: SELECTOR.into(),
        started_at: chrono::Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap(),
    };
    let app = router(AppState::new(Arc::new(intake), params, registry));
    Fixture {
        store,
        ledger,
        proofs,
        engine,
        app,
    }
}

fn fixture() -> Fixture {
    fixture_with(Options::default())
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(request).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn post(app: &Router, body: &Value) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(AIRDROPS_PATH)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

fn reason(json: &Value) -> &str {
    json["errors"][0]["meta"]["reason"].as_str().unwrap_or_default()
}

#[tokio::test]
async fn valid_claim_creates_one_pending_row() {
    let f = fixture();
    let (status, json) = post(&f.app, &body_for(signals("111"))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["id"], "111");
    assert_eq!(json["data"]["type"], "airdrop");
    assert_eq!(json["data"]["attributes"]["status"], "pending");
    assert_eq!(json["data"]["attributes"]["amount"], "100urmo");
    assert_eq!(json["data"]["attributes"]["address"], address());

    let rows = f.store.all();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, ClaimStatus::Pending);
    assert!(rows[0].tx_hash.is_none());
    assert_eq!(f.proofs.calls().len(), 1);
}

#[tokio::test]
async fn second_claim_for_nullifier_conflicts() {
    let f = fixture();
    post(&f.app, &body_for(signals("111"))).await;
    let (status, json) = post(&f.app, &body_for(signals("111"))).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(reason(&json), "already-claimed");
    assert_eq!(json["errors"][0]["status"], "409");
    assert_eq!(f.store.claim_count().unwrap(), 1);
    // The conflict is found before any proof work.
    assert_eq!(f.proofs.calls().len(), 1);
}

#[tokio::test]
async fn concurrent_claims_for_one_nullifier_admit_one() {
    let f = fixture();
    let body = body_for(signals("777"));
    let mut tasks = Vec::new();
    for _ in 0..8 {
        let app = f.app.clone();
        let body = body.clone();
        tasks.push(tokio::spawn(async move { post(&app, &body).await.0 }));
    }
    let mut created = 0;
    for task in tasks {
        match task.await.unwrap() {
            StatusCode::CREATED => created += 1,
            StatusCode::CONFLICT => {}
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(f.store.claim_count().unwrap(), 1);
}

#[tokio::test]
async fn invalid_proof_is_rejected_without_a_row() {
    let f = fixture_with(Options {
        proofs: Proofs::Reject,
        ..Options::default()
    });
    let (status, json) = post(&f.app, &body_for(signals("111"))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(reason(&json), "invalid-proof");
    assert_eq!(json["errors"][0]["title"], "Proof rejected");
    assert_eq!(f.store.claim_count().unwrap(), 0);
}

#[tokio::test]
async fn unusable_key_is_unavailable_not_rejected() {
    let f = fixture_with(Options {
        proofs: Proofs::BrokenKey,
        ..Options::default()
    });
    let (status, json) = post(&f.app, &body_for(signals("111"))).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["errors"][0]["status"], "503");
    assert_eq!(f.store.claim_count().unwrap(), 0);
}

#[tokio::test]
async fn semantic_failures_are_rejected_without_a_row() {
    let f = fixture();
    let cases: Vec<(usize, &str, &str)> = vec![
        (2, "240430", "stale-proof"),
        (1, "100101", "underage"),
        (6, "USA", "citizenship-not-allowed"),
        (12, "1", "selector-mismatch"),
        (9, "43", "event-mismatch"),
        (10, "0x00", "address-mismatch"),
    ];
    for (index, value, expected) in cases {
        let mut s = signals("111");
        s[index] = value.into();
        let (status, json) = post(&f.app, &body_for(s)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{expected}");
        assert_eq!(reason(&json), expected);
    }
    assert_eq!(f.store.claim_count().unwrap(), 0);
}

#[tokio::test]
async fn short_input_list_fails_before_proof_work() {
    let f = fixture();
    let mut s = signals("111");
    s.truncate(5);
    let (status, json) = post(&f.app, &body_for(s)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(reason(&json), "malformed-inputs");
    assert!(f.proofs.calls().is_empty());
}

#[tokio::test]
async fn wrong_type_and_bad_json_are_bad_requests() {
    let f = fixture();
    let mut body = body_for(signals("111"));
    body["data"]["type"] = json!("airdrop");
    let (status, json) = post(&f.app, &body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["errors"][0]["status"], "400");

    let (status, json) = send(
        &f.app,
        Request::builder()
            .method("POST")
            .uri(AIRDROPS_PATH)
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["errors"].is_array());
    assert_eq!(f.store.claim_count().unwrap(), 0);
}

#[tokio::test]
async fn lookup_is_idempotent_and_404s_when_absent() {
    let f = fixture();
    post(&f.app, &body_for(signals("111"))).await;

    let uri = format!("{AIRDROPS_PATH}/111");
    let (status, first) = get(&f.app, &uri).await;
    assert_eq!(status, StatusCode::OK);
    let (_, second) = get(&f.app, &uri).await;
    assert_eq!(first, second);
    assert_eq!(first["data"]["attributes"]["status"], "pending");

    let (status, json) = get(&f.app, &format!("{AIRDROPS_PATH}/999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["errors"][0]["status"], "404");
}

#[tokio::test]
async fn lookup_by_claim_id_finds_the_same_row() {
    let f = fixture();
    let (status, created) = post(&f.app, &body_for(signals("112"))).await;
    assert_eq!(status, StatusCode::CREATED);
    let claim_id = created["data"]["attributes"]["claim_id"].as_str().unwrap().to_string();

    let (status, json) = get(&f.app, &format!("{AIRDROPS_PATH}/by-id/{claim_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["id"], "112");
    assert_eq!(json, get(&f.app, &format!("{AIRDROPS_PATH}/112")).await.1);

    let unknown = airdrop_types::ClaimId::generate();
    let (status, _) = get(&f.app, &format!("{AIRDROPS_PATH}/by-id/{unknown}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = get(&f.app, &format!("{AIRDROPS_PATH}/by-id/not-a-uuid")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["errors"][0]["status"], "400");
}

#[tokio::test]
async fn params_expose_campaign() {
    let f = fixture();
    let (status, json) = get(&f.app, &format!("{AIRDROPS_PATH}/params")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["attributes"]["event_id"], EVENT_ID);
    assert_eq!(json["data"]["attributes"]["query_selector"], SELECTOR);
    assert_eq!(json["data"]["attributes"]["started_at"], 1_711_929_600);
}

#[tokio::test]
async fn metrics_and_health() {
    let f = fixture();
    let resp = f
        .app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("airdrop_test_marker_total 1"));

    post(&f.app, &body_for(signals("111"))).await;
    let (status, json) = get(&f.app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["mode"], "async");
    assert_eq!(json["claims"], 1);
    assert_eq!(json["pending"], 1);
}

#[tokio::test]
async fn failed_claim_can_be_replaced_under_permissive_policy() {
    let f = fixture_with(Options {
        conflict_policy: ConflictPolicy::CompletedOrPending,
        ..Options::default()
    });
    post(&f.app, &body_for(signals("111"))).await;
    f.store
        .update_status("111", ClaimStatus::Failed, None, NullClock::at_date(2024, 5, 1).now())
        .unwrap();

    let (status, json) = post(&f.app, &body_for(signals("111"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["attributes"]["status"], "pending");
    assert_eq!(f.store.archived().len(), 1);
}

fn sync_fixture() -> Fixture {
    fixture_with(Options {
        sync: true,
        ..Options::default()
    })
}

#[tokio::test]
async fn sync_mode_pays_inside_the_request() {
    let f = sync_fixture();
    let (status, json) = post(&f.app, &body_for(signals("111"))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["attributes"]["status"], "completed");
    let hash = json["data"]["attributes"]["tx_hash"].as_str().unwrap();
    assert_eq!(
        f.store.get_by_nullifier("111").unwrap().tx_hash,
        Some(TxHash::new(hash))
    );
    assert_eq!(f.ledger.broadcasts().len(), 1);
}

#[tokio::test]
async fn sync_mode_rolls_back_a_rejected_transfer() {
    let f = sync_fixture();
    f.ledger.script(ScriptedBroadcast::Code {
        code: 5,
        with_hash: false,
    });
    let (status, _) = post(&f.app, &body_for(signals("111"))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(f.store.claim_count().unwrap(), 0);

    // Nothing was paid, so the same identity may try again.
    let (status, _) = post(&f.app, &body_for(signals("111"))).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn sync_mode_ledger_outage_is_unavailable() {
    let f = sync_fixture();
    f.ledger.fail_account_lookup("connection refused");
    let (status, json) = post(&f.app, &body_for(signals("111"))).await;

    // RequestFailed is not a transport error: the transfer failed outright.
    assert!(status.is_server_error());
    assert!(json["errors"][0].get("detail").is_none());
    assert_eq!(f.store.claim_count().unwrap(), 0);
    assert!(f.ledger.broadcasts().is_empty());
}

#[tokio::test]
async fn sync_mode_unknown_outcome_keeps_the_row() {
    let f = sync_fixture();
    f.ledger.script(ScriptedBroadcast::Unreachable);
    let (status, json) = post(&f.app, &body_for(signals("111"))).await;

    // The lookup finds nothing, so the attempt definitely did not land.
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["errors"][0]["status"], "500");
    assert_eq!(f.store.claim_count().unwrap(), 0);
}

#[tokio::test]
async fn sync_mode_lost_response_still_completes() {
    let f = sync_fixture();
    f.ledger.script(ScriptedBroadcast::LostAfterInclusion);
    let (status, json) = post(&f.app, &body_for(signals("111"))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["attributes"]["status"], "completed");
    assert_eq!(f.ledger.broadcasts().len(), 1);
}

#[tokio::test]
async fn sync_mode_and_engine_pay_each_claim_once() {
    let f = sync_fixture();
    f.ledger
        .set_broadcast_delay(std::time::Duration::from_millis(5));
    let engine = f.engine.clone().unwrap();
    let polling = tokio::spawn(async move {
        for _ in 0..60 {
            engine.run_cycle().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
    });

    let mut requests = Vec::new();
    for i in 0..4 {
        let app = f.app.clone();
        let body = body_for(signals(&format!("10{i}")));
        requests.push(tokio::spawn(async move { post(&app, &body).await }));
    }
    for request in requests {
        let (status, body) = request.await.unwrap();
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["data"]["attributes"]["status"], "completed");
    }
    polling.await.unwrap();

    assert_eq!(f.ledger.broadcasts().len(), 4);
    let mut sequences = f.ledger.sequences();
    sequences.sort_unstable();
    assert_eq!(sequences, vec![0, 1, 2, 3]);
    assert!(f
        .store
        .all()
        .iter()
        .all(|c| c.status == ClaimStatus::Completed && c.tx_hash.is_some()));
}
