//! End-to-end HTTP test: router served on an ephemeral port over the in-memory store.

use market_ledger::domain::model::{Asset, AssetStatus, Membership, PrizeKind, SpinPrize, User};
use market_ledger::transport;
use market_ledger::{LinkIssuer, MarketService, MemoryStore};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

const SESSION_HEADER: &str = "x-user-id";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    store: Arc<MemoryStore>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start(links: LinkIssuer) -> Result<Self, Box<dyn std::error::Error>> {
        let store = Arc::new(MemoryStore::new());
        let service = Arc::new(MarketService::new(store.clone(), links));
        let app_state = transport::http::AppState::new(service, SESSION_HEADER)?;
        let router = transport::http::create_router(app_state);

        // Bind to an ephemeral port to avoid conflicts if an API server is already running.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}", port),
            client: reqwest::Client::new(),
            store,
            handle,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn user(coins: i64, membership: Membership) -> User {
    User {
        id: Uuid::new_v4(),
        username: format!("user-{}", coins),
        coins,
        membership,
        xp: 0,
        badge_tier: 1,
        last_daily_claim: None,
    }
}

fn asset(price: i64) -> Asset {
    Asset {
        id: Uuid::new_v4(),
        title: "police-pack".to_string(),
        author_id: None,
        coin_price: price,
        status: AssetStatus::Approved,
        download_url: Some("https://cdn.example.com/police.zip".to_string()),
        downloads: 0,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_paid_download_over_http() -> Result<(), Box<dyn std::error::Error>> {
    let server = TestServer::start(LinkIssuer::Direct).await?;
    let buyer = user(120, Membership::Free);
    let item = asset(100);
    server.store.insert_user(buyer.clone()).await;
    server.store.insert_asset(item.clone()).await;

    let resp = server
        .client
        .post(server.url(&format!("/api/download/{}", item.id)))
        .header(SESSION_HEADER, buyer.id.to_string())
        .send()
        .await?;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await?;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["coinsSpent"], json!(100));
    assert_eq!(body["balance"], json!(20));
    assert_eq!(body["downloadUrl"], json!("https://cdn.example.com/police.zip"));

    // Re-download is free.
    let body: Value = server
        .client
        .post(server.url(&format!("/api/download/{}", item.id)))
        .header(SESSION_HEADER, buyer.id.to_string())
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["coinsSpent"], json!(0));
    assert_eq!(body["message"], json!("Already purchased"));

    let status: Value = server
        .client
        .get(server.url(&format!("/api/assets/{}/purchase", item.id)))
        .header(SESSION_HEADER, buyer.id.to_string())
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(status["purchased"], json!(true));

    let ledger: Value = server
        .client
        .get(server.url("/api/coins/transactions"))
        .header(SESSION_HEADER, buyer.id.to_string())
        .send()
        .await?
        .json()
        .await?;
    let entries = ledger["transactions"].as_array().cloned().unwrap_or_default();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["amount"], json!(-100));
    assert_eq!(entries[0]["balanceAfter"], json!(20));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rejections_map_to_statuses() -> Result<(), Box<dyn std::error::Error>> {
    let server = TestServer::start(LinkIssuer::Direct).await?;
    let poor = user(10, Membership::Free);
    let item = asset(50);
    server.store.insert_user(poor.clone()).await;
    server.store.insert_asset(item.clone()).await;

    let resp = server
        .client
        .post(server.url(&format!("/api/download/{}", item.id)))
        .send()
        .await?;
    assert_eq!(resp.status(), 401);

    let resp = server
        .client
        .post(server.url(&format!("/api/download/{}", item.id)))
        .header(SESSION_HEADER, poor.id.to_string())
        .send()
        .await?;
    assert_eq!(resp.status(), 402);
    let body: Value = resp.json().await?;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["required"], json!(50));
    assert_eq!(body["available"], json!(10));

    let resp = server
        .client
        .post(server.url("/api/download/not-a-uuid"))
        .header(SESSION_HEADER, poor.id.to_string())
        .send()
        .await?;
    assert_eq!(resp.status(), 404);

    let resp = server
        .client
        .post(server.url(&format!("/api/download/{}", Uuid::new_v4())))
        .header(SESSION_HEADER, Uuid::new_v4().to_string())
        .send()
        .await?;
    assert_eq!(resp.status(), 404);

    assert!(server.store.download_events().await.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_downloads_charge_once() -> Result<(), Box<dyn std::error::Error>> {
    let server = TestServer::start(LinkIssuer::Direct).await?;
    let buyer = user(150, Membership::Free);
    let item = asset(100);
    server.store.insert_user(buyer.clone()).await;
    server.store.insert_asset(item.clone()).await;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let client = server.client.clone();
        let url = server.url(&format!("/api/download/{}", item.id));
        let session = buyer.id.to_string();
        tasks.push(tokio::spawn(async move {
            client.post(url).header(SESSION_HEADER, session).send().await
        }));
    }

    let mut charged = 0;
    for task in tasks {
        let resp = task.await??;
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await?;
        if body["coinsSpent"] == json!(100) {
            charged += 1;
        }
        assert_eq!(body["balance"], json!(50));
    }
    assert_eq!(charged, 1);
    assert_eq!(server.store.purchase_count(buyer.id).await, 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_gateway_link_mode() -> Result<(), Box<dyn std::error::Error>> {
    let server = TestServer::start(LinkIssuer::Linkvertise {
        base_url: "https://link-target.net".to_string(),
        publisher_id: "77".to_string(),
    })
    .await?;
    let member = user(0, Membership::Free);
    let item = asset(0);
    server.store.insert_user(member.clone()).await;
    server.store.insert_asset(item.clone()).await;

    let body: Value = server
        .client
        .post(server.url(&format!("/api/download/{}", item.id)))
        .header(SESSION_HEADER, member.id.to_string())
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["message"], json!("Download started"));
    assert_eq!(
        body["downloadUrl"],
        json!("https://link-target.net/77/dynamic?r=https%3A%2F%2Fcdn.example.com%2Fpolice.zip")
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_admin_daily_and_spin_endpoints() -> Result<(), Box<dyn std::error::Error>> {
    let server = TestServer::start(LinkIssuer::Direct).await?;
    let admin = user(0, Membership::Admin);
    let member = user(5, Membership::Free);
    server.store.insert_user(admin.clone()).await;
    server.store.insert_user(member.clone()).await;
    server
        .store
        .insert_prize(SpinPrize {
            id: Uuid::new_v4(),
            name: "Jackpot".to_string(),
            kind: PrizeKind::Coins,
            value: 500,
            probability: 1.0,
            is_active: true,
        })
        .await;

    // Members cannot adjust balances.
    let resp = server
        .client
        .post(server.url("/api/admin/coins"))
        .header(SESSION_HEADER, member.id.to_string())
        .json(&json!({ "userId": member.id, "amount": 10, "action": "add" }))
        .send()
        .await?;
    assert_eq!(resp.status(), 403);

    let resp = server
        .client
        .post(server.url("/api/admin/coins"))
        .header(SESSION_HEADER, admin.id.to_string())
        .json(&json!({ "userId": member.id, "amount": 10, "action": "explode" }))
        .send()
        .await?;
    assert_eq!(resp.status(), 422);

    let body: Value = server
        .client
        .post(server.url("/api/admin/coins"))
        .header(SESSION_HEADER, admin.id.to_string())
        .json(&json!({ "userId": member.id, "amount": 95, "action": "add", "reason": "event prize" }))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["totalCoins"], json!(100));
    assert_eq!(body["change"], json!(95));

    let resp = server
        .client
        .post(server.url("/api/coins/daily"))
        .header(SESSION_HEADER, member.id.to_string())
        .send()
        .await?;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await?;
    assert_eq!(body["newBalance"], json!(150));

    let resp = server
        .client
        .post(server.url("/api/coins/daily"))
        .header(SESSION_HEADER, member.id.to_string())
        .send()
        .await?;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await?;
    assert!(body["hoursUntilReset"].as_i64().is_some());

    let resp = server
        .client
        .post(server.url("/api/spin"))
        .header(SESSION_HEADER, member.id.to_string())
        .send()
        .await?;
    assert_eq!(resp.status(), 400);

    let body: Value = server
        .client
        .post(server.url("/api/spin/ticket"))
        .header(SESSION_HEADER, member.id.to_string())
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["tickets"], json!(1));

    let body: Value = server
        .client
        .post(server.url("/api/spin"))
        .header(SESSION_HEADER, member.id.to_string())
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["prize"]["name"], json!("Jackpot"));
    assert_eq!(body["newBalance"], json!(650));
    assert_eq!(body["remainingTickets"], json!(0));

    let history: Value = server
        .client
        .get(server.url("/api/spin/history?limit=5"))
        .header(SESSION_HEADER, member.id.to_string())
        .send()
        .await?
        .json()
        .await?;
    let entries = history["history"].as_array().cloned().unwrap_or_default();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["prizeName"], json!("Jackpot"));
    assert_eq!(entries[0]["prizeKind"], json!("coins"));

    let balance: Value = server
        .client
        .get(server.url("/api/coins/balance"))
        .header(SESSION_HEADER, member.id.to_string())
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(balance["coins"], json!(650));
    assert_eq!(balance["spinTickets"], json!(0));
    assert_eq!(balance["xp"], json!(10));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_health() -> Result<(), Box<dyn std::error::Error>> {
    let server = TestServer::start(LinkIssuer::Direct).await?;
    let body: Value = server.client.get(server.url("/health")).send().await?.json().await?;
    assert_eq!(body["status"], json!("ok"));
    Ok(())
}
