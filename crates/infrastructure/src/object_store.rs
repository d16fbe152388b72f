use async_trait::async_trait;
use std::time::Duration;

use taskmill_errors::{SchedulerError, SchedulerResult};

/// 远端对象存储的窄接口
///
/// 只覆盖日志归档需要的三个操作，键的层级含义由调用方负责。
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    async fn put_object(&self, key: &str, content: &[u8]) -> SchedulerResult<()>;

    async fn list_objects(&self, prefix: &str) -> SchedulerResult<Vec<String>>;

    async fn get_object(&self, key: &str) -> SchedulerResult<Vec<u8>>;
}

/// 通过 HTTP API 访问的对象存储客户端
///
/// 路径式寻址：`{endpoint}/{bucket}/{key}`；列举接口返回键名的 JSON 数组。
pub struct HttpObjectStore {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
}

impl HttpObjectStore {
    pub fn new(endpoint: &str, bucket: &str) -> SchedulerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SchedulerError::Network(format!("构建HTTP客户端失败: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }

    fn bucket_url(&self) -> String {
        format!("{}/{}", self.endpoint, self.bucket)
    }
}

#[async_trait]
impl ObjectStoreClient for HttpObjectStore {
    async fn put_object(&self, key: &str, content: &[u8]) -> SchedulerResult<()> {
        let response = self
            .client
            .put(self.object_url(key))
            .body(content.to_vec())
            .send()
            .await
            .map_err(|e| SchedulerError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SchedulerError::log_store_error(format!(
                "上传对象失败: {} -> {}",
                key,
                response.status()
            )));
        }
        Ok(())
    }

    async fn list_objects(&self, prefix: &str) -> SchedulerResult<Vec<String>> {
        let response = self
            .client
            .get(self.bucket_url())
            .query(&[("prefix", prefix)])
            .send()
            .await
            .map_err(|e| SchedulerError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SchedulerError::log_store_error(format!(
                "列举对象失败: {} -> {}",
                prefix,
                response.status()
            )));
        }

        response
            .json::<Vec<String>>()
            .await
            .map_err(|e| SchedulerError::log_store_error(format!("解析对象列表失败: {e}")))
    }

    async fn get_object(&self, key: &str) -> SchedulerResult<Vec<u8>> {
        let response = self
            .client
            .get(self.object_url(key))
            .send()
            .await
            .map_err(|e| SchedulerError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SchedulerError::log_store_error(format!(
                "取回对象失败: {} -> {}",
                key,
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SchedulerError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
