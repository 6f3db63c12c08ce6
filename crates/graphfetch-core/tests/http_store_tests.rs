//! HTTP triple store tests against a mock SPARQL endpoint

use std::sync::Arc;

use graphfetch_core::{
    config::{Config, Strategy},
    fetch::GraphFetcher,
    graph::Namespace,
    stats::StatsCollector,
    store::{GraphRequest, HttpStore, RequestKind, StoreClient, TripleStore},
};
use mockito::Matcher;
use serde_json::json;

const NS: &str = "https://data.example/";

fn namespace() -> Namespace {
    Namespace::new("ns", NS)
}

fn http_store(server: &mockito::ServerGuard) -> HttpStore {
    HttpStore::builder()
        .endpoint(format!("{}/sparql", server.url()))
        .namespace(namespace())
        .build()
        .unwrap()
}

fn level_request(subject: &str) -> GraphRequest {
    GraphRequest::new(
        RequestKind::Level,
        vec![subject.to_string()],
        "nl",
        format!("CONSTRUCT {{ <{}> ?p ?o }} WHERE {{ <{}> ?p ?o }}", subject, subject),
    )
}

#[tokio::test]
async fn test_posts_form_encoded_query() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/sparql")
        .match_header("accept", "application/ld+json")
        .match_header("content-type", "application/x-www-form-urlencoded")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("query=CONSTRUCT".to_string()),
            Matcher::Regex("format=application%2Fld%2Bjson".to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/ld+json")
        .with_body(
            json!({
                "@context": {},
                "@graph": [{
                    "@id": "https://data.example/archief/A1",
                    "https://data.example/label": {"@value": "Archive One", "@language": "nl"},
                    "https://data.example/creator": {"@id": "https://data.example/person/P1"}
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let store = http_store(&server);
    let nodes = store
        .construct(&level_request("https://data.example/archief/A1"))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(nodes.len(), 1);
    let ns_binding = namespace();
    let linked: Vec<&str> = nodes[0].linked_iris(&ns_binding).map(|(_, iri)| iri).collect();
    assert_eq!(linked, vec!["https://data.example/person/P1"]);
}

#[tokio::test]
async fn test_error_status_is_a_store_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/sparql")
        .with_status(503)
        .with_body("Virtuoso is restarting")
        .create_async()
        .await;

    let err = http_store(&server)
        .construct(&level_request("https://data.example/archief/A1"))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "E101");
    assert!(err.to_string().contains("503"));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_malformed_body_is_reported() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/sparql")
        .with_status(200)
        .with_body("<html>not json</html>")
        .create_async()
        .await;

    let err = http_store(&server)
        .construct(&level_request("https://data.example/archief/A1"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "E102");
}

#[tokio::test]
async fn test_empty_body_is_an_empty_graph() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/sparql")
        .with_status(200)
        .with_body("")
        .create_async()
        .await;

    let nodes = http_store(&server)
        .construct(&level_request("https://data.example/archief/A1"))
        .await
        .unwrap();
    assert!(nodes.is_empty());
}

#[tokio::test]
async fn test_client_absorbs_store_errors() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/sparql")
        .with_status(500)
        .create_async()
        .await;

    let stats = Arc::new(StatsCollector::new());
    let client = StoreClient::new(Arc::new(http_store(&server)), stats.clone());
    let nodes = client
        .fetch(&level_request("https://data.example/archief/A1"))
        .await;

    assert!(nodes.is_empty());
    assert_eq!(stats.snapshot().http_requests, 1);
    assert_eq!(stats.snapshot().failed_requests, 1);
}

#[tokio::test]
async fn test_fetch_over_http() {
    let mut server = mockito::Server::new_async().await;
    let root = server
        .mock("POST", "/sparql")
        .match_body(Matcher::Regex("archief%2FA1".to_string()))
        .with_status(200)
        .with_body(
            json!([{
                "@id": "https://data.example/archief/A1",
                "@type": "https://data.example/Archief",
                "https://data.example/label": "Archive One",
                "https://data.example/creator": {"@id": "https://data.example/person/P1"}
            }])
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let person = server
        .mock("POST", "/sparql")
        .match_body(Matcher::Regex("person%2FP1".to_string()))
        .with_status(200)
        .with_body(
            json!({
                "@id": "https://data.example/person/P1",
                "https://data.example/label": "Person One"
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let mut config = Config::default();
    config.graph.prefix = "ns".to_string();
    config.graph.namespace = NS.to_string();
    config
        .graph
        .collections
        .insert("Archief".to_string(), "archief".to_string());
    let fetcher = GraphFetcher::new(Arc::new(http_store(&server)), config);
    let options = fetcher
        .options(["A1"], "ns:Archief")
        .depth(2)
        .strategy(Strategy::Sequential);

    let outcome = fetcher.fetch(&options).await.unwrap();

    root.assert_async().await;
    person.assert_async().await;
    assert_eq!(outcome.stats.http_requests, 2);
    assert_eq!(
        outcome.into_document(),
        json!({
            "_id": "https://data.example/archief/A1",
            "id": "A1",
            "label": "Archive One",
            "creator": {
                "_id": "https://data.example/person/P1",
                "id": "P1",
                "label": "Person One"
            }
        })
    );
}
