//! HTTP contract tests against the in-memory store.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Body;
use http_body_util::BodyExt;
use hyper::{Request, StatusCode};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use taxon_core::memory::MemoryStore;
use taxon_core::types::Product;
use taxon_core::TaxonomyService;
use taxon_hierarchy::api::build_router;

struct TestApp {
    store: Arc<MemoryStore>,
    router: axum::Router,
}

impl TestApp {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let service = Arc::new(TaxonomyService::in_memory(store.clone()));
        Self {
            store,
            router: build_router(service),
        }
    }

    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send_text(method, uri, body.map(|b| b.to_string())).await
    }

    /// Like `send`, but the body goes out verbatim (it need not be JSON).
    async fn send_text(
        &self,
        method: &str,
        uri: &str,
        body: Option<String>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b)),
            None => builder.body(Body::empty()),
        }
        .unwrap();
        let resp = self.router.clone().oneshot(request).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    /// Returns (taxonomy_id, root_id).
    async fn taxonomy(&self, name: &str) -> (String, String) {
        let (status, body) = self
            .send("POST", "/taxonomies", Some(json!({ "name": name })))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        (
            body["taxonomy"]["id"].as_str().unwrap().to_string(),
            body["root"]["id"].as_str().unwrap().to_string(),
        )
    }

    async fn taxon(&self, taxonomy_id: &str, parent_id: &str, name: &str) -> String {
        let (status, body) = self
            .send(
                "POST",
                "/taxons",
                Some(json!({ "taxonomy_id": taxonomy_id, "parent_id": parent_id, "name": name })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn health_is_ok() {
    let app = TestApp::new();
    let (status, body) = app.send("GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn created_taxon_carries_derived_fields() {
    let app = TestApp::new();
    let (taxonomy_id, root) = app.taxonomy("Categories").await;
    let clothing = app.taxon(&taxonomy_id, &root, "Clothing").await;

    let (status, body) = app
        .send(
            "POST",
            "/taxons",
            Some(json!({ "taxonomy_id": taxonomy_id, "parent_id": clothing, "name": "Rain Coats" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["depth"], 2);
    assert_eq!(body["slug"], "rain-coats");
    assert_eq!(body["pretty_name"], "Categories -> Clothing -> Rain Coats");
    assert_eq!(body["materialized_path"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn unknown_taxonomy_is_404_envelope() {
    let app = TestApp::new();
    let (status, body) = app
        .send("GET", &format!("/taxonomies/{}", Uuid::new_v4()), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
    assert_eq!(body["title"], "Not Found");
    assert!(body["errors"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn blank_name_is_422_with_code() {
    let app = TestApp::new();
    let (taxonomy_id, root) = app.taxonomy("Categories").await;
    let (status, body) = app
        .send(
            "POST",
            "/taxons",
            Some(json!({ "taxonomy_id": taxonomy_id, "parent_id": root, "name": "   " })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"][0]["code"], "taxon.name_empty");
}

#[tokio::test]
async fn unreadable_requests_get_the_envelope() {
    let app = TestApp::new();
    let (taxonomy_id, _) = app.taxonomy("Categories").await;

    let (status, body) = app
        .send_text("POST", "/taxonomies", Some("{not json".into()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert_eq!(body["title"], "Bad Request");
    assert!(body["errors"].as_array().unwrap().is_empty());

    let (status, body) = app.send("GET", "/taxons?page=abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);

    let (status, body) = app.send("GET", "/taxonomies/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);

    let (status, body) = app
        .send(
            "PATCH",
            &format!("/taxonomies/{taxonomy_id}"),
            Some(json!({ "label": "missing name field" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], 422);
    assert!(body["detail"].as_str().unwrap().contains("name"));
}

#[tokio::test]
async fn overlong_rule_is_a_malformed_rule() {
    let app = TestApp::new();
    let (_, root) = app.taxonomy("Categories").await;
    let expression = format!("{}price > 1", "not ".repeat(20_000));
    let (status, body) = app
        .send(
            "POST",
            &format!("/taxons/{root}/rules"),
            Some(json!({ "expression": expression })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"][0]["code"], "rule.malformed");

    let (status, _) = app.send("GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn flat_listing_pages_through_query_string() {
    let app = TestApp::new();
    let (taxonomy_id, root) = app.taxonomy("Categories").await;
    for i in 0..5 {
        app.taxon(&taxonomy_id, &root, &format!("Node {i}")).await;
    }

    let (status, body) = app
        .send(
            "GET",
            &format!("/taxons?taxonomy_id={taxonomy_id}&min_depth=1&page=2&page_size=2&sort=name"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["total_count"], 5);
    assert_eq!(body["total_pages"], 3);
    assert_eq!(body["has_next_page"], true);
    assert_eq!(body["has_previous_page"], true);
    let names: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Node 2", "Node 3"]);
}

#[tokio::test]
async fn move_then_tree_focus_gives_breadcrumbs() {
    let app = TestApp::new();
    let (taxonomy_id, root) = app.taxonomy("Shop").await;
    let a = app.taxon(&taxonomy_id, &root, "A").await;
    let b = app.taxon(&taxonomy_id, &root, "B").await;
    let c = app.taxon(&taxonomy_id, &b, "C").await;

    let (status, moved) = app
        .send("POST", &format!("/taxons/{c}/move"), Some(json!({ "parent_id": a })))
        .await;
    assert_eq!(status, StatusCode::OK, "{moved}");
    assert_eq!(moved["depth"], 2);

    let (status, tree) = app
        .send("GET", &format!("/taxonomies/{taxonomy_id}/tree?focus={c}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let crumbs: Vec<&str> = tree["breadcrumbs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["name"].as_str().unwrap())
        .collect();
    assert_eq!(crumbs, vec!["Shop", "A", "C"]);

    let (status, report) = app
        .send("POST", &format!("/taxonomies/{taxonomy_id}/validate"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["valid"], true);

    let (status, summary) = app
        .send("POST", &format!("/taxonomies/{taxonomy_id}/rebuild"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["updated"], 0);
    assert_eq!(summary["visited"], 4);
}

#[tokio::test]
async fn delete_policy_comes_from_query() {
    let app = TestApp::new();
    let (taxonomy_id, root) = app.taxonomy("Shop").await;
    let parent = app.taxon(&taxonomy_id, &root, "Parent").await;
    let kid = app.taxon(&taxonomy_id, &parent, "Kid").await;

    let (status, body) = app.send("DELETE", &format!("/taxons/{parent}"), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"][0]["code"], "taxon.has_children");

    let (status, _) = app
        .send("DELETE", &format!("/taxons/{parent}?policy=reparent"), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, detail) = app.send("GET", &format!("/taxons/{kid}"), None).await;
    assert_eq!(detail["taxon"]["parent_id"], root.as_str());
    assert_eq!(detail["taxon"]["depth"], 1);

    let (status, body) = app.send("DELETE", &format!("/taxons/{root}"), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"][0]["code"], "taxon.root_immutable");
}

#[tokio::test]
async fn rules_drive_regeneration() {
    let app = TestApp::new();
    let (taxonomy_id, root) = app.taxonomy("Shop").await;
    let sale = app.taxon(&taxonomy_id, &root, "Sale").await;

    for (name, price) in [("Cheap Hat", "5.00"), ("Dear Hat", "500.00")] {
        app.store
            .upsert_product(Product {
                id: Uuid::new_v4(),
                name: name.into(),
                sku: name.to_uppercase().replace(' ', "-"),
                price: price.parse::<Decimal>().unwrap(),
                available: true,
                tags: vec![],
                properties: BTreeMap::new(),
            })
            .await;
    }

    let (status, body) = app
        .send(
            "POST",
            &format!("/taxons/{sale}/rules"),
            Some(json!({ "expression": "price <" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"][0]["code"], "rule.malformed");

    let (status, rule) = app
        .send(
            "POST",
            &format!("/taxons/{sale}/rules"),
            Some(json!({ "expression": "price < 10" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, summary) = app
        .send("POST", &format!("/taxons/{sale}/regenerate"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["matched"], 1);
    assert_eq!(summary["added"], 1);

    let (_, rows) = app
        .send("GET", &format!("/taxons/{sale}/classifications"), None)
        .await;
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["is_automatic"], true);

    let rule_id = rule["id"].as_str().unwrap();
    let (status, _) = app.send("DELETE", &format!("/rules/{rule_id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, summary) = app
        .send("POST", &format!("/taxons/{sale}/regenerate"), None)
        .await;
    assert_eq!(summary["removed"], 1);
}
