use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;

use crate::domain::{DomainError, ObjectInfo, ObjectStore};

/// S3 bucket access through the AWS SDK
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, DomainError> {
        let mut objects = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                DomainError::object_store(format!(
                    "Error listing bucket '{}': {}",
                    self.bucket, e
                ))
            })?;

            for object in page.contents() {
                let Some(key) = object.key() else {
                    continue;
                };
                objects.push(ObjectInfo::new(
                    key,
                    object.e_tag().unwrap_or_default(),
                    object.size().unwrap_or_default().max(0) as u64,
                ));
            }
        }

        Ok(objects)
    }

    async fn get(&self, key: &str) -> Result<Bytes, DomainError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                DomainError::object_store(format!("Error downloading '{}': {}", key, e))
            })?;

        let body = output.body.collect().await.map_err(|e| {
            DomainError::object_store(format!("Error reading body of '{}': {}", key, e))
        })?;

        Ok(body.into_bytes())
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
