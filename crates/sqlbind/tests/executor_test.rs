//! Query execution against the in-memory backend.

mod common;

use std::sync::Arc;

use common::{FakeFactory, FakeStore};
use serde::Deserialize;
use sqlbind::binding::BindingSpec;
use sqlbind::config::MapConfig;
use sqlbind::error::Error;
use sqlbind::executor::QueryExecutor;
use sqlbind::resolver::ConnectionResolver;
use sqlbind::types::{Row, Value};

#[derive(Debug, Deserialize, PartialEq)]
struct Product {
    #[serde(rename = "productID")]
    product_id: i64,
    name: String,
    cost: i64,
}

fn product_rows() -> Vec<Row> {
    let columns = vec!["productID".to_owned(), "name".to_owned(), "cost".to_owned()];
    vec![
        Row::new(
            columns.clone(),
            vec![
                Value::Int32(3),
                Value::String("Bottle".into()),
                Value::Int32(90),
            ],
        ),
        Row::new(
            columns,
            vec![
                Value::Int32(5),
                Value::String("Cup".into()),
                Value::Int32(100),
            ],
        ),
    ]
}

fn executor(store: &FakeStore) -> QueryExecutor {
    QueryExecutor::new(ConnectionResolver::new(Arc::new(FakeFactory::new(
        store.clone(),
    ))))
}

fn config() -> MapConfig {
    MapConfig::new().with("SqlConnection", "postgres://localhost/test")
}

#[tokio::test]
async fn test_fetch_decodes_and_releases_connection() {
    let store = FakeStore::with_results(product_rows());
    let spec = BindingSpec::query("SqlConnection", "SELECT * FROM products");

    let products: Vec<Product> = executor(&store).fetch(&spec, &config()).await.unwrap();

    assert_eq!(products.len(), 2);
    assert_eq!(
        products[0],
        Product {
            product_id: 3,
            name: "Bottle".into(),
            cost: 90
        }
    );
    assert_eq!(store.opens(), 1);
    assert_eq!(store.closes(), 1);
}

#[tokio::test]
async fn test_parameters_rewritten_to_positional() {
    let store = FakeStore::with_results(product_rows());
    let spec = BindingSpec::query(
        "SqlConnection",
        "SELECT * FROM products WHERE cost > @cost AND name = @name",
    )
    .with_parameters("@cost=100,@name=Cup");

    executor(&store).fetch_rows(&spec, &config()).await.unwrap();

    let statements = store.statements();
    assert_eq!(statements.len(), 1);
    assert_eq!(
        statements[0].0,
        "SELECT * FROM products WHERE cost > $1 AND name = $2"
    );
    assert_eq!(
        statements[0].1,
        vec![Value::String("100".into()), Value::String("Cup".into())]
    );
}

#[tokio::test]
async fn test_stored_procedure_call_shape() {
    let store = FakeStore::with_results(product_rows());
    let spec =
        BindingSpec::stored_procedure("SqlConnection", "get_products").with_parameters("@cost=90");

    executor(&store).fetch_rows(&spec, &config()).await.unwrap();

    let statements = store.statements();
    assert_eq!(statements[0].0, "SELECT * FROM \"get_products\"($1)");
}

#[tokio::test]
async fn test_buffered_and_unbuffered_yield_same_rows() {
    let store = FakeStore::with_results(product_rows());
    let exec = executor(&store);

    let buffered_spec = BindingSpec::query("SqlConnection", "SELECT * FROM products");
    let buffered = exec.fetch_rows(&buffered_spec, &config()).await.unwrap();

    let streaming_spec = BindingSpec::query("SqlConnection", "SELECT * FROM products").unbuffered();
    let mut cursor = exec.fetch_stream(&streaming_spec, &config()).await.unwrap();
    let mut streamed = Vec::new();
    while let Some(row) = cursor.next_row().await.unwrap() {
        streamed.push(row);
    }

    assert_eq!(buffered, streamed);
}

#[tokio::test]
async fn test_streaming_cursor_releases_connection_at_exhaustion() {
    let store = FakeStore::with_results(product_rows());
    let spec = BindingSpec::query("SqlConnection", "SELECT * FROM products").unbuffered();

    let mut cursor = executor(&store)
        .fetch_stream(&spec, &config())
        .await
        .unwrap();

    // Connection stays held while rows remain
    assert_eq!(store.opens(), 1);
    assert_eq!(store.closes(), 0);

    while cursor.next_row().await.unwrap().is_some() {}
    assert_eq!(store.closes(), 1);
}

#[tokio::test]
async fn test_streaming_cursor_close_releases_early() {
    let store = FakeStore::with_results(product_rows());
    let spec = BindingSpec::query("SqlConnection", "SELECT * FROM products").unbuffered();

    let mut cursor = executor(&store)
        .fetch_stream(&spec, &config())
        .await
        .unwrap();
    cursor.next_row().await.unwrap();
    cursor.close().await.unwrap();

    assert_eq!(store.closes(), 1);
}

#[tokio::test]
async fn test_fetch_json_two_row_example() {
    let store = FakeStore::with_results(product_rows());
    let spec = BindingSpec::query("SqlConnection", "SELECT * FROM products");

    let json = executor(&store).fetch_json(&spec, &config()).await.unwrap();

    assert_eq!(
        json,
        r#"[{"productID":3,"name":"Bottle","cost":90},{"productID":5,"name":"Cup","cost":100}]"#
    );
}

#[tokio::test]
async fn test_fetch_json_is_eager_even_when_unbuffered() {
    let store = FakeStore::with_results(product_rows());
    let spec = BindingSpec::query("SqlConnection", "SELECT * FROM products").unbuffered();

    let json = executor(&store).fetch_json(&spec, &config()).await.unwrap();

    assert!(json.starts_with('['));
    // Eager path released the connection before returning
    assert_eq!(store.closes(), 1);
}

#[tokio::test]
async fn test_fetch_json_empty_result() {
    let store = FakeStore::new();
    let spec = BindingSpec::query("SqlConnection", "SELECT * FROM products");

    let json = executor(&store).fetch_json(&spec, &config()).await.unwrap();
    assert_eq!(json, "[]");
}

#[tokio::test]
async fn test_missing_connection_setting_never_connects() {
    let store = FakeStore::new();
    let spec = BindingSpec::query("MissingSetting", "SELECT 1");

    let err = executor(&store)
        .fetch_rows(&spec, &config())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Configuration { .. }));
    assert_eq!(store.opens(), 0);
}
