//! End-to-end load against a real DynamoDB endpoint
//!
//! Ignored by default. Run against DynamoDB Local or LocalStack with:
//!
//! ```bash
//! docker run -p 8000:8000 amazon/dynamodb-local
//! DYNALOAD_TEST_ENDPOINT=http://localhost:8000 cargo test -p dynaload-ingest -- --ignored
//! ```

mod common;

use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ScalarAttributeType, Select,
};
use common::write_items;
use dynaload_ingest::config::LoaderConfig;
use dynaload_ingest::orchestrator::Orchestrator;
use dynaload_ingest::store::{DynamoStore, StoreConfig};
use dynaload_ingest::writer::WriteMode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn test_store_config() -> Option<StoreConfig> {
    let endpoint = std::env::var("DYNALOAD_TEST_ENDPOINT").ok()?;
    Some(StoreConfig::for_local(endpoint))
}

async fn create_table(store: &DynamoStore, table: &str) {
    store
        .client()
        .create_table()
        .table_name(table)
        .attribute_definitions(
            AttributeDefinition::builder()
                .attribute_name("pk")
                .attribute_type(ScalarAttributeType::S)
                .build()
                .unwrap(),
        )
        .key_schema(
            KeySchemaElement::builder()
                .attribute_name("pk")
                .key_type(KeyType::Hash)
                .build()
                .unwrap(),
        )
        .billing_mode(BillingMode::PayPerRequest)
        .send()
        .await
        .unwrap();
}

async fn count_items(store: &DynamoStore, table: &str) -> i32 {
    store
        .client()
        .scan()
        .table_name(table)
        .select(Select::Count)
        .send()
        .await
        .unwrap()
        .count()
}

async fn load(store_config: StoreConfig, mode: WriteMode, table: &str, files: &[(&str, usize)]) -> u64 {
    let dir = tempfile::tempdir().unwrap();
    for (name, n) in files {
        write_items(dir.path(), name, name.trim_end_matches(".json.gz"), *n);
    }

    let config = LoaderConfig::new(dir.path(), table, store_config).with_mode(mode);
    config.validate().unwrap();
    let store = Arc::new(DynamoStore::new(&config.store).await);

    let summary = Orchestrator::from_config(&config, store, CancellationToken::new())
        .unwrap()
        .run_dir(dir.path())
        .await
        .unwrap();
    assert!(summary.is_success(), "failures: {:?}", summary.failures);
    summary.grand_total
}

#[tokio::test]
#[ignore = "requires DYNALOAD_TEST_ENDPOINT"]
async fn test_best_effort_load_into_dynamodb_local() {
    let Some(store_config) = test_store_config() else {
        return;
    };
    let table = format!("dynaload-best-effort-{}", std::process::id());
    let store = DynamoStore::new(&store_config).await;
    create_table(&store, &table).await;

    let total = load(
        store_config,
        WriteMode::BestEffort,
        &table,
        &[("a.json.gz", 3), ("b.json.gz", 30), ("c.json.gz", 100)],
    )
    .await;

    assert_eq!(total, 133);
    assert_eq!(count_items(&store, &table).await, 133);
}

#[tokio::test]
#[ignore = "requires DYNALOAD_TEST_ENDPOINT"]
async fn test_transactional_load_into_dynamodb_local() {
    let Some(store_config) = test_store_config() else {
        return;
    };
    let table = format!("dynaload-transactional-{}", std::process::id());
    let store = DynamoStore::new(&store_config).await;
    create_table(&store, &table).await;

    let total = load(store_config, WriteMode::Transactional, &table, &[("tx.json.gz", 250)]).await;

    assert_eq!(total, 250);
    assert_eq!(count_items(&store, &table).await, 250);
}

#[tokio::test]
#[ignore = "requires DYNALOAD_TEST_ENDPOINT"]
async fn test_reloading_the_same_export_is_idempotent() {
    let Some(store_config) = test_store_config() else {
        return;
    };
    let table = format!("dynaload-reload-{}", std::process::id());
    let store = DynamoStore::new(&store_config).await;
    create_table(&store, &table).await;

    load(store_config.clone(), WriteMode::BestEffort, &table, &[("r.json.gz", 40)]).await;
    load(store_config, WriteMode::BestEffort, &table, &[("r.json.gz", 40)]).await;

    assert_eq!(count_items(&store, &table).await, 40);
}
