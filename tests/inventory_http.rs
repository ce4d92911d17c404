//! Talks to an in-process fake of the inventory and token endpoints over
//! real HTTP.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use hollowdhcp::{
    Config, Credentials, Error, InventoryApi, InventoryClient, LeaseRepository, LeaseResolver,
    ServerListParams,
};
use reqwest::Url;

#[derive(Debug, Clone)]
struct Request {
    method: String,
    path: String,
    query: Vec<(String, String)>,
    headers: HashMap<String, String>,
    body: String,
}

impl Request {
    fn attr(&self) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == "attr")
            .map(|(_, value)| value.as_str())
    }

    fn form(&self) -> HashMap<String, String> {
        Url::parse(&format!("http://fake/?{}", self.body))
            .map(|url| url.query_pairs().into_owned().collect())
            .unwrap_or_default()
    }
}

type Route = dyn Fn(&Request) -> (u16, String) + Send + Sync;

struct FakeServer {
    base_url: Url,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl FakeServer {
    async fn start<F>(route: F) -> Self
    where
        F: Fn(&Request) -> (u16, String) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let route: Arc<Route> = Arc::new(route);

        let seen = requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let route = route.clone();
                let seen = seen.clone();
                tokio::spawn(async move {
                    serve(stream, route, seen).await;
                });
            }
        });

        Self {
            base_url: Url::parse(&format!("http://{}/", address)).unwrap(),
            requests,
        }
    }

    fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

async fn serve(mut stream: TcpStream, route: Arc<Route>, seen: Arc<Mutex<Vec<Request>>>) {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(position) = buffer.windows(4).position(|window| window == b"\r\n\r\n") {
            break position + 4;
        }
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(read) => buffer.extend_from_slice(&chunk[..read]),
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split(' ');
    let method = request_line.next().unwrap_or_default().to_string();
    let target = request_line.next().unwrap_or_default().to_string();

    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_lowercase(), value.trim().to_string()))
        .collect();

    let length: usize = headers
        .get("content-length")
        .and_then(|value| value.parse().ok())
        .unwrap_or(0);
    while buffer.len() < header_end + length {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(read) => buffer.extend_from_slice(&chunk[..read]),
        }
    }

    let url = Url::parse(&format!("http://fake{}", target)).unwrap();
    let request = Request {
        method,
        path: url.path().to_string(),
        query: url.query_pairs().into_owned().collect(),
        headers,
        body: String::from_utf8_lossy(&buffer[header_end..header_end + length]).to_string(),
    };

    let (status, body) = route(&request);
    seen.lock().unwrap().push(request);

    let response = format!(
        "HTTP/1.1 {} Fake\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

fn static_token() -> Credentials {
    Credentials::StaticToken {
        token: "test-token".to_string(),
    }
}

fn client(server: &FakeServer, credentials: Credentials) -> InventoryClient {
    InventoryClient::new(server.base_url.clone(), credentials, Duration::from_secs(5)).unwrap()
}

fn resolver(client: InventoryClient) -> LeaseResolver {
    LeaseResolver::new(LeaseRepository::new(Arc::new(client)))
}

fn record(name: &str, mac: &str) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "attributes": [
            {
                "namespace": "sh.hollow.bios",
                "data": {"vendor": "acme"}
            },
            {
                "namespace": "sh.hollow.dhcpserver.lease",
                "data": {
                    "ipv4": [{
                        "mac_address": mac,
                        "cidr": "10.1.2.10/24",
                        "gateway": "10.1.2.1",
                        "resolvers": ["1.1.1.1", "8.8.8.8"]
                    }]
                }
            }
        ]
    })
}

/// Answers like the inventory service would for the canned MAC addresses.
fn inventory_route(request: &Request) -> (u16, String) {
    if request.path != "/api/v1/servers" {
        return (404, r#"{"message":"not found"}"#.to_string());
    }

    let attr = request.attr().unwrap_or_default();
    let records = if attr.contains("happy:mac") {
        vec![record("testServer", "happy:mac")]
    } else if attr.contains("dup:mac") {
        vec![record("one", "dup:mac"), record("two", "dup:mac")]
    } else {
        vec![]
    };

    (200, serde_json::json!({ "records": records }).to_string())
}

#[tokio::test]
async fn test_list_request_shape() {
    let server = FakeServer::start(inventory_route).await;
    let client = client(&server, static_token());

    let params = LeaseRepository::list_params("happy:mac", hollowdhcp::Family::V4);
    let records = client.list_servers(&params).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "testServer");
    assert_eq!(records[0].attributes.len(), 2);

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].path, "/api/v1/servers");
    assert_eq!(
        requests[0].attr(),
        Some("sh.hollow.dhcpserver.lease~ipv4~like~%happy:mac%")
    );
    assert_eq!(
        requests[0].headers.get("authorization").map(String::as_str),
        Some("Bearer test-token")
    );
}

#[tokio::test]
async fn test_error_status_carries_message() {
    let server = FakeServer::start(|_| (401, r#"{"message":"error"}"#.to_string())).await;
    let client = client(&server, static_token());

    let error = client
        .list_servers(&ServerListParams::default())
        .await
        .unwrap_err();
    assert!(
        matches!(&error, Error::Server { status: 401, message } if message == "error"),
        "unexpected {:?}",
        error
    );
}

#[tokio::test]
async fn test_error_status_with_plain_body() {
    let server = FakeServer::start(|_| (503, "upstream unavailable".to_string())).await;
    let client = client(&server, static_token());

    let error = client
        .list_servers(&ServerListParams::default())
        .await
        .unwrap_err();
    assert!(matches!(
        &error,
        Error::Server { status: 503, message } if message == "upstream unavailable"
    ));
}

#[tokio::test]
async fn test_garbled_envelope_is_json_error() {
    let server = FakeServer::start(|_| (200, "{\"records\": [".to_string())).await;
    let client = client(&server, static_token());

    let error = client
        .list_servers(&ServerListParams::default())
        .await
        .unwrap_err();
    assert!(matches!(error, Error::Json(_)));
}

#[tokio::test]
async fn test_resolves_over_http() {
    let server = FakeServer::start(inventory_route).await;
    let resolver = resolver(client(&server, static_token()));

    let resolved = resolver.resolve_v4("HAPPY:MAC").await.unwrap();
    assert_eq!(resolved.hostname, "testServer");
    assert_eq!(resolved.lease.cidr, "10.1.2.10/24");
    assert_eq!(resolved.lease.resolvers.len(), 2);

    assert!(matches!(
        resolver.resolve_v4("unknown:mac").await,
        Err(Error::NoLeaseFound { .. })
    ));
    assert!(matches!(
        resolver.resolve_v4("dup:mac").await,
        Err(Error::DuplicateLeaseFound { count: 2, .. })
    ));
    assert!(matches!(
        resolver.resolve_v4("not:happy:mac").await,
        Err(Error::NoLeaseFound { .. })
    ));
}

#[tokio::test]
async fn test_unreachable_service_is_not_no_lease() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let client = InventoryClient::new(
        Url::parse(&format!("http://{}/", address)).unwrap(),
        static_token(),
        Duration::from_secs(2),
    )
    .unwrap();
    let error = resolver(client).resolve_v4("happy:mac").await.unwrap_err();
    assert!(matches!(error, Error::Http(_)));
    assert!(!error.is_unanswerable());
}

#[tokio::test]
async fn test_client_credentials_token_is_cached() {
    let server = FakeServer::start(|request| {
        if request.path == "/oauth2/token" {
            (
                200,
                r#"{"access_token":"issued-token","token_type":"Bearer","expires_in":3600}"#
                    .to_string(),
            )
        } else {
            inventory_route(request)
        }
    })
    .await;

    let credentials = Credentials::ClientCredentials {
        issuer: server.base_url.to_string(),
        client_id: "dhcp".to_string(),
        client_secret: "s3cret".to_string(),
        audience: "https://inventory.example".to_string(),
    };
    let resolver = resolver(client(&server, credentials));

    resolver.resolve_v4("happy:mac").await.unwrap();
    resolver.resolve_v4("happy:mac").await.unwrap();

    let requests = server.requests();
    let token_requests: Vec<&Request> = requests
        .iter()
        .filter(|request| request.path == "/oauth2/token")
        .collect();
    assert_eq!(token_requests.len(), 1);
    assert_eq!(token_requests[0].method, "POST");

    let form = token_requests[0].form();
    assert_eq!(form.get("grant_type").map(String::as_str), Some("client_credentials"));
    assert_eq!(form.get("client_id").map(String::as_str), Some("dhcp"));
    assert_eq!(form.get("scope").map(String::as_str), Some("read:server read:instance"));

    for request in requests.iter().filter(|request| request.path == "/api/v1/servers") {
        assert_eq!(
            request.headers.get("authorization").map(String::as_str),
            Some("Bearer issued-token")
        );
    }
}

#[tokio::test]
async fn test_oversized_token_lifetime() {
    let server = FakeServer::start(|request| {
        if request.path == "/oauth2/token" {
            (
                200,
                format!(r#"{{"access_token":"t","expires_in":{}}}"#, i64::MAX),
            )
        } else {
            inventory_route(request)
        }
    })
    .await;

    let credentials = Credentials::ClientCredentials {
        issuer: server.base_url.to_string(),
        client_id: "dhcp".to_string(),
        client_secret: "s3cret".to_string(),
        audience: "https://inventory.example".to_string(),
    };
    let resolver = resolver(client(&server, credentials));

    let resolved = resolver.resolve_v4("happy:mac").await.unwrap();
    assert_eq!(resolved.hostname, "testServer");
    resolver.resolve_v4("happy:mac").await.unwrap();

    let token_requests = server
        .requests()
        .iter()
        .filter(|request| request.path == "/oauth2/token")
        .count();
    assert_eq!(token_requests, 1);
}

#[tokio::test]
async fn test_null_records_is_no_lease() {
    let server = FakeServer::start(|_| (200, r#"{"records":null}"#.to_string())).await;
    let resolver = resolver(client(&server, static_token()));

    let result = resolver.resolve_v4("unknown:mac").await;
    assert!(
        matches!(&result, Err(Error::NoLeaseFound { mac }) if mac == "unknown:mac"),
        "unexpected {:?}",
        result
    );
}

#[tokio::test]
async fn test_token_refusal() {
    let server = FakeServer::start(|request| {
        if request.path == "/oauth2/token" {
            (403, r#"{"error":"unauthorized_client"}"#.to_string())
        } else {
            inventory_route(request)
        }
    })
    .await;

    let credentials = Credentials::ClientCredentials {
        issuer: server.base_url.to_string(),
        client_id: "dhcp".to_string(),
        client_secret: "wrong".to_string(),
        audience: "https://inventory.example".to_string(),
    };
    let error = resolver(client(&server, credentials))
        .resolve_v4("happy:mac")
        .await
        .unwrap_err();
    assert!(matches!(error, Error::Token { status: 403, .. }));

    assert!(
        server
            .requests()
            .iter()
            .all(|request| request.path != "/api/v1/servers")
    );
}

#[tokio::test]
async fn test_config_to_lookup() {
    let server = FakeServer::start(inventory_route).await;
    let url = server.base_url.to_string();
    let config = Config::from_args_with(&[url.as_str()], |name| match name {
        "HOLLOWDHCP_TOKEN" => Some("from-env".to_string()),
        _ => None,
    })
    .unwrap();

    let resolver = LeaseResolver::from_config(&config).unwrap();
    let resolved = resolver
        .resolve_v4_within("happy:mac", config.request_timeout())
        .await
        .unwrap();
    assert_eq!(resolved.hostname, "testServer");

    assert_eq!(
        server.requests()[0]
            .headers
            .get("authorization")
            .map(String::as_str),
        Some("Bearer from-env")
    );
}
