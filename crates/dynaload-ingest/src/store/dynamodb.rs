use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::{
    config::{Credentials, Region},
    error::DisplayErrorContext,
    types::{Put, PutRequest, TransactWriteItem, WriteRequest},
    Client,
};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

use super::{config::StoreConfig, BatchPutOutcome, ItemStore};
use crate::error::StoreError;
use crate::record::Record;

const BATCH_WRITE: &str = "BatchWriteItem";
const TRANSACT_WRITE: &str = "TransactWriteItems";

/// [`ItemStore`] backed by the DynamoDB API
///
/// The client is cheap to clone and safe to share across file jobs.
#[derive(Clone)]
pub struct DynamoStore {
    client: Client,
}

impl DynamoStore {
    pub async fn new(config: &StoreConfig) -> Self {
        debug!("Initializing DynamoDB client with config: {:?}", config);

        let mut builder = match config.static_credentials() {
            Some((access_key, secret_key)) => aws_sdk_dynamodb::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .credentials_provider(Credentials::new(
                    access_key, secret_key, None, None, "dynaload",
                ))
                .region(Region::new(config.region.clone())),
            None => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(Region::new(config.region.clone()))
                    .load()
                    .await;
                aws_sdk_dynamodb::config::Builder::from(&shared)
            },
        };

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        info!(
            region = %config.region,
            endpoint = config.endpoint.as_deref().unwrap_or("aws"),
            "DynamoDB client initialized"
        );

        Self {
            client: Client::from_conf(builder.build()),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn batch_write(&self, table: &str, items: Vec<Record>) -> Result<BatchPutOutcome, StoreError> {
        let sent = items.len();
        let requests = items
            .into_iter()
            .map(write_request)
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .client
            .batch_write_item()
            .request_items(table, requests)
            .send()
            .await
            .map_err(|e| StoreError::service(BATCH_WRITE, DisplayErrorContext(&e)))?;

        let unprocessed = unprocessed_records(table, output.unprocessed_items.unwrap_or_default())?;
        if unprocessed.len() > sent {
            return Err(StoreError::malformed(
                BATCH_WRITE,
                format!("{} unprocessed items reported for {} sent", unprocessed.len(), sent),
            ));
        }

        Ok(BatchPutOutcome {
            accepted: sent - unprocessed.len(),
            unprocessed,
        })
    }
}

#[async_trait]
impl ItemStore for DynamoStore {
    #[instrument(skip(self, items), fields(items = items.len()))]
    async fn batch_put(&self, table: &str, items: Vec<Record>) -> Result<BatchPutOutcome, StoreError> {
        self.batch_write(table, items).await
    }

    #[instrument(skip(self, unprocessed), fields(items = unprocessed.len()))]
    async fn batch_put_continue(
        &self,
        table: &str,
        unprocessed: Vec<Record>,
    ) -> Result<BatchPutOutcome, StoreError> {
        self.batch_write(table, unprocessed).await
    }

    #[instrument(skip(self, items), fields(items = items.len()))]
    async fn transact_write(&self, table: &str, items: Vec<Record>) -> Result<(), StoreError> {
        let count = items.len();
        let transact_items = items
            .into_iter()
            .map(|record| {
                Put::builder()
                    .table_name(table)
                    .set_item(Some(record.into_item()))
                    .build()
                    .map(|put| TransactWriteItem::builder().put(put).build())
                    .map_err(|e| StoreError::service(TRANSACT_WRITE, e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.client
            .transact_write_items()
            .set_transact_items(Some(transact_items))
            .send()
            .await
            .map_err(|e| {
                let canceled = e
                    .as_service_error()
                    .is_some_and(|se| se.is_transaction_canceled_exception());
                if canceled {
                    StoreError::TransactionRejected {
                        items: count,
                        message: DisplayErrorContext(&e).to_string(),
                    }
                } else {
                    StoreError::service(TRANSACT_WRITE, DisplayErrorContext(&e))
                }
            })?;

        Ok(())
    }
}

fn write_request(record: Record) -> Result<WriteRequest, StoreError> {
    let put = PutRequest::builder()
        .set_item(Some(record.into_item()))
        .build()
        .map_err(|e| StoreError::service(BATCH_WRITE, e))?;
    Ok(WriteRequest::builder().put_request(put).build())
}

/// Map the unprocessed-items section of a response back to records
fn unprocessed_records(
    table: &str,
    unprocessed: HashMap<String, Vec<WriteRequest>>,
) -> Result<Vec<Record>, StoreError> {
    let mut records = Vec::new();

    for (name, requests) in unprocessed {
        if name != table {
            return Err(StoreError::malformed(
                BATCH_WRITE,
                format!("unprocessed items for unexpected table '{}'", name),
            ));
        }
        for request in requests {
            let put = request.put_request.ok_or_else(|| {
                StoreError::malformed(BATCH_WRITE, "unprocessed entry is not a put request")
            })?;
            records.push(Record::new(put.item));
        }
    }

    Ok(records)
}
