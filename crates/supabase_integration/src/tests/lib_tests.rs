use super::*;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, RawQuery},
    http::{HeaderMap, StatusCode},
    routing::{delete as axum_delete, get, patch, post},
    Json, Router,
};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Debug, Clone, Default)]
struct CapturedRequest {
    path: String,
    query: String,
    apikey: Option<String>,
    authorization: Option<String>,
    accept: Option<String>,
    prefer: Option<String>,
    upsert: Option<String>,
    content_type: Option<String>,
    body: Vec<u8>,
}

#[derive(Clone, Default)]
struct Capture {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl Capture {
    async fn record(&self, path: &str, headers: &HeaderMap, query: Option<String>, body: Vec<u8>) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(ToString::to_string)
        };
        self.requests.lock().await.push(CapturedRequest {
            path: path.to_string(),
            query: query.unwrap_or_default(),
            apikey: header("apikey"),
            authorization: header("authorization"),
            accept: header("accept"),
            prefer: header("prefer"),
            upsert: header("x-upsert"),
            content_type: header("content-type"),
            body,
        });
    }

    async fn single(&self) -> CapturedRequest {
        let requests = self.requests.lock().await;
        assert_eq!(requests.len(), 1, "expected exactly one request");
        requests[0].clone()
    }
}

async fn spawn_server(app: Router) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn settings(server_url: &str) -> Settings {
    Settings {
        supabase_url: server_url.to_string(),
        anon_key: "anon-key".into(),
        bucket: "box".into(),
        product_page_base_url: "http://localhost:3000/dashboard/produto".into(),
    }
}

fn row_json(id: i64, nome: &str, preco: f64) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "created_at": "2024-05-02T00:00:00Z",
        "nome": nome,
        "descricao": null,
        "preco": preco,
        "imagem": null,
        "user_id": "u1",
    })
}

fn fields(name: &str) -> ProductFields {
    ProductFields {
        name: name.into(),
        description: None,
        price: 25.0,
        image_url: None,
        owner_id: OwnerId::new("u1"),
    }
}

#[tokio::test]
async fn list_sends_owner_filter_and_ordering_and_maps_rows() {
    let capture = Capture::default();
    let app = Router::new().route(
        "/rest/v1/loja_produto",
        get({
            let capture = capture.clone();
            move |headers: HeaderMap, RawQuery(query): RawQuery| {
                let capture = capture.clone();
                async move {
                    capture
                        .record("/rest/v1/loja_produto", &headers, query, Vec::new())
                        .await;
                    Json(serde_json::json!([
                        row_json(2, "Red Hat", 25.0),
                        row_json(1, "Azul Shirt", 59.9),
                    ]))
                }
            }
        }),
    );
    let supabase = Supabase::new(&settings(&spawn_server(app).await)).expect("client");
    supabase.set_access_token(Some("session-jwt".into())).await;

    let records = supabase
        .list_by_owner(&OwnerId::new("u1"))
        .await
        .expect("list");

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, ProductId(2));
    assert_eq!(records[0].name, "Red Hat");
    assert_eq!(records[1].owner_id, OwnerId::new("u1"));

    let request = capture.single().await;
    assert!(request.query.contains("user_id=eq.u1"), "{}", request.query);
    assert!(
        request.query.contains("order=created_at.desc"),
        "{}",
        request.query
    );
    assert_eq!(request.apikey.as_deref(), Some("anon-key"));
    assert_eq!(request.authorization.as_deref(), Some("Bearer session-jwt"));
}

#[tokio::test]
async fn create_posts_the_row_and_parses_the_returned_object() {
    let capture = Capture::default();
    let app = Router::new().route(
        "/rest/v1/loja_produto",
        post({
            let capture = capture.clone();
            move |headers: HeaderMap, RawQuery(query): RawQuery, body: Bytes| {
                let capture = capture.clone();
                async move {
                    capture
                        .record("/rest/v1/loja_produto", &headers, query, body.to_vec())
                        .await;
                    (StatusCode::CREATED, Json(row_json(900, "Red Hat", 25.0)))
                }
            }
        }),
    );
    let supabase = Supabase::new(&settings(&spawn_server(app).await)).expect("client");

    let record = supabase.create(&fields("Red Hat")).await.expect("create");
    assert_eq!(record.id, ProductId(900));
    assert_eq!(record.name, "Red Hat");

    let request = capture.single().await;
    assert_eq!(request.prefer.as_deref(), Some("return=representation"));
    assert_eq!(
        request.accept.as_deref(),
        Some("application/vnd.pgrst.object+json")
    );
    let sent: serde_json::Value = serde_json::from_slice(&request.body).expect("body json");
    assert_eq!(sent["nome"], "Red Hat");
    assert_eq!(sent["user_id"], "u1");
    // Store-assigned columns are never sent.
    assert!(sent.get("id").is_none());
    assert!(sent.get("created_at").is_none());
}

#[tokio::test]
async fn update_patches_the_row_selected_by_id() {
    let capture = Capture::default();
    let app = Router::new().route(
        "/rest/v1/loja_produto",
        patch({
            let capture = capture.clone();
            move |headers: HeaderMap, RawQuery(query): RawQuery, body: Bytes| {
                let capture = capture.clone();
                async move {
                    capture
                        .record("/rest/v1/loja_produto", &headers, query, body.to_vec())
                        .await;
                    Json(row_json(7, "Red Hat XL", 29.0))
                }
            }
        }),
    );
    let supabase = Supabase::new(&settings(&spawn_server(app).await)).expect("client");

    let record = supabase
        .update(ProductId(7), &fields("Red Hat XL"))
        .await
        .expect("update");
    assert_eq!(record.id, ProductId(7));

    let request = capture.single().await;
    assert!(request.query.contains("id=eq.7"), "{}", request.query);
}

#[tokio::test]
async fn delete_targets_the_row_by_id() {
    let capture = Capture::default();
    let app = Router::new().route(
        "/rest/v1/loja_produto",
        axum_delete({
            let capture = capture.clone();
            move |headers: HeaderMap, RawQuery(query): RawQuery| {
                let capture = capture.clone();
                async move {
                    capture
                        .record("/rest/v1/loja_produto", &headers, query, Vec::new())
                        .await;
                    StatusCode::NO_CONTENT
                }
            }
        }),
    );
    let supabase = Supabase::new(&settings(&spawn_server(app).await)).expect("client");

    ProductStore::delete(&supabase, ProductId(7))
        .await
        .expect("delete");

    let request = capture.single().await;
    assert!(request.query.contains("id=eq.7"), "{}", request.query);
}

#[tokio::test]
async fn upload_posts_bytes_with_upsert_to_the_bucket_path() {
    let capture = Capture::default();
    let app = Router::new().route(
        "/storage/v1/object/box/*path",
        post({
            let capture = capture.clone();
            move |Path(path): Path<String>, headers: HeaderMap, body: Bytes| {
                let capture = capture.clone();
                async move {
                    capture.record(&path, &headers, None, body.to_vec()).await;
                    Json(serde_json::json!({ "Key": format!("box/{path}") }))
                }
            }
        }),
    );
    let supabase = Supabase::new(&settings(&spawn_server(app).await)).expect("client");

    supabase
        .upload("produtos/u1/123.png", vec![0xAB, 0xCD], true)
        .await
        .expect("upload");

    let request = capture.single().await;
    assert_eq!(request.path, "produtos/u1/123.png");
    assert_eq!(request.upsert.as_deref(), Some("true"));
    assert_eq!(
        request.content_type.as_deref(),
        Some("application/octet-stream")
    );
    assert_eq!(request.body, vec![0xAB, 0xCD]);
}

#[tokio::test]
async fn bulk_object_delete_sends_the_prefixes_body() {
    let capture = Capture::default();
    let app = Router::new().route(
        "/storage/v1/object/box",
        axum_delete({
            let capture = capture.clone();
            move |headers: HeaderMap, body: Bytes| {
                let capture = capture.clone();
                async move {
                    capture
                        .record("/storage/v1/object/box", &headers, None, body.to_vec())
                        .await;
                    Json(serde_json::json!([]))
                }
            }
        }),
    );
    let supabase = Supabase::new(&settings(&spawn_server(app).await)).expect("client");

    AssetStore::delete(&supabase, &["produtos/u1/old.png".to_string()])
        .await
        .expect("delete");

    let request = capture.single().await;
    let sent: serde_json::Value = serde_json::from_slice(&request.body).expect("body json");
    assert_eq!(sent["prefixes"], serde_json::json!(["produtos/u1/old.png"]));
}

#[tokio::test]
async fn empty_bulk_delete_issues_no_request() {
    // Any request would hit a router with no routes and fail the test
    // through the error path.
    let supabase = Supabase::new(&settings(&spawn_server(Router::new()).await)).expect("client");
    AssetStore::delete(&supabase, &[]).await.expect("noop");
}

#[tokio::test]
async fn current_user_maps_the_identity_payload() {
    let app = Router::new().route(
        "/auth/v1/user",
        get(|| async {
            Json(serde_json::json!({
                "id": "u1",
                "email": "seller@example.com",
                "aud": "authenticated",
                "role": "authenticated",
            }))
        }),
    );
    let supabase = Supabase::new(&settings(&spawn_server(app).await)).expect("client");

    let user = supabase
        .current_user()
        .await
        .expect("lookup")
        .expect("session");
    assert_eq!(user.id, OwnerId::new("u1"));
    assert_eq!(user.email.as_deref(), Some("seller@example.com"));
}

#[tokio::test]
async fn unauthorized_session_lookup_is_no_session_not_an_error() {
    let app = Router::new().route(
        "/auth/v1/user",
        get(|| async { (StatusCode::UNAUTHORIZED, Json(serde_json::json!({}))) }),
    );
    let supabase = Supabase::new(&settings(&spawn_server(app).await)).expect("client");

    let user = supabase.current_user().await.expect("lookup");
    assert!(user.is_none());
}

#[tokio::test]
async fn store_error_messages_are_surfaced() {
    let app = Router::new().route(
        "/rest/v1/loja_produto",
        get(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "message": "bad filter", "code": "PGRST100" })),
            )
        }),
    );
    let supabase = Supabase::new(&settings(&spawn_server(app).await)).expect("client");

    let err = supabase
        .list_by_owner(&OwnerId::new("u1"))
        .await
        .expect_err("must fail");
    let message = format!("{err:#}");
    assert!(message.contains("bad filter"), "{message}");
    assert!(message.contains("400"), "{message}");
}

#[test]
fn public_url_is_resolved_without_a_network_call() {
    let supabase = Supabase::new(&settings("https://abc.supabase.co")).expect("client");
    assert_eq!(
        supabase.public_url("produtos/u1/123.png"),
        "https://abc.supabase.co/storage/v1/object/public/box/produtos/u1/123.png"
    );
}
