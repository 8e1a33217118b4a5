use std::path::Path;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::multipart::Form;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::ImportError;

const API_KEY_HEADER: &str = "datalab-api-key";

/// The two fields of a datalab item this tool reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItem {
    pub refcode: String,
    pub item_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewItem {
    pub synthesis_constituents: Vec<Constituent>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Constituent {
    pub item: ItemRef,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemRef {
    pub refcode: String,
}

impl NewItem {
    /// An item made from `parent`, with no quantity recorded.
    pub fn constituent_of(parent: &RemoteItem) -> Self {
        Self {
            synthesis_constituents: vec![Constituent {
                item: ItemRef {
                    refcode: parent.refcode.clone(),
                },
                quantity: None,
                unit: None,
            }],
        }
    }
}

pub trait RemoteRepositoryClient {
    fn get_item(&self, refcode: &str) -> Result<Option<RemoteItem>, ImportError>;
    fn create_item(&self, data: &NewItem) -> Result<RemoteItem, ImportError>;
    fn upload_file(&self, item_id: &str, path: &Path) -> Result<(), ImportError>;
}

#[derive(Clone)]
pub struct DatalabHttpClient {
    client: Client,
    api_url: String,
}

impl DatalabHttpClient {
    pub fn new(
        api_url: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, ImportError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("ro-import/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ImportError::RemoteHttp(err.to_string()))?,
        );
        if let Some(key) = api_key {
            let mut value = HeaderValue::from_str(key)
                .map_err(|_| ImportError::RemoteHttp("API key is not a valid header".to_string()))?;
            value.set_sensitive(true);
            headers.insert(HeaderName::from_static(API_KEY_HEADER), value);
        }
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| ImportError::RemoteHttp(err.to_string()))?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.api_url)
    }

    fn handle_status(response: Response) -> Result<Value, ImportError> {
        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "datalab request failed".to_string());
            return Err(ImportError::RemoteStatus {
                status: status.as_u16(),
                message,
            });
        }
        let body: Value = response
            .json()
            .map_err(|err| ImportError::RemoteHttp(err.to_string()))?;
        match body.get("status").and_then(Value::as_str) {
            Some("success") | None => Ok(body),
            Some(_) => Err(ImportError::RemoteStatus {
                status: status.as_u16(),
                message: body
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unsuccessful response")
                    .to_string(),
            }),
        }
    }
}

impl RemoteRepositoryClient for DatalabHttpClient {
    fn get_item(&self, refcode: &str) -> Result<Option<RemoteItem>, ImportError> {
        let url = self.url(&format!("items/{refcode}"));
        debug!(%url, "fetching item");
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| ImportError::RemoteHttp(err.to_string()))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = Self::handle_status(response)?;
        extract_item(&body, "item_data").map(Some)
    }

    fn create_item(&self, data: &NewItem) -> Result<RemoteItem, ImportError> {
        let mut sample = serde_json::to_value(data)
            .map_err(|err| ImportError::RemoteHttp(err.to_string()))?;
        if let Some(object) = sample.as_object_mut() {
            object.insert("type".to_string(), json!("samples"));
        }
        let payload = json!({
            "new_sample_data": sample,
            "generate_id_automatically": true,
        });
        let response = self
            .client
            .post(self.url("new-sample/"))
            .json(&payload)
            .send()
            .map_err(|err| ImportError::RemoteHttp(err.to_string()))?;
        let body = Self::handle_status(response)?;
        extract_item(&body, "sample_list_entry")
    }

    fn upload_file(&self, item_id: &str, path: &Path) -> Result<(), ImportError> {
        let form = Form::new()
            .text("item_id", item_id.to_string())
            .text("replace_file", String::new())
            .file("files", path)
            .map_err(|err| ImportError::Filesystem(format!("{}: {err}", path.display())))?;
        let response = self
            .client
            .post(self.url("upload-file/"))
            .multipart(form)
            .send()
            .map_err(|err| ImportError::RemoteHttp(err.to_string()))?;
        Self::handle_status(response)?;
        Ok(())
    }
}

fn extract_item(body: &Value, key: &str) -> Result<RemoteItem, ImportError> {
    let item = body.get(key).ok_or_else(|| {
        ImportError::RemoteHttp(format!("response is missing {key}"))
    })?;
    serde_json::from_value(item.clone())
        .map_err(|err| ImportError::RemoteHttp(format!("malformed {key}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constituent_link_serializes_nulls() {
        let parent = RemoteItem {
            refcode: "grey:ABCDEF".to_string(),
            item_id: "sample-001".to_string(),
        };
        let value = serde_json::to_value(NewItem::constituent_of(&parent)).unwrap();
        assert_eq!(
            value,
            json!({
                "synthesis_constituents": [
                    {"item": {"refcode": "grey:ABCDEF"}, "quantity": null, "unit": null}
                ]
            })
        );
    }

    #[test]
    fn extracts_item_ignoring_extra_fields() {
        let body = json!({
            "status": "success",
            "item_data": {"refcode": "grey:ABCDEF", "item_id": "sample-001", "name": "x"}
        });
        let item = extract_item(&body, "item_data").unwrap();
        assert_eq!(item.item_id, "sample-001");
    }

    #[test]
    fn trims_trailing_slash_from_api_url() {
        let client =
            DatalabHttpClient::new("https://datalab.example.org/", None, Duration::from_secs(5))
                .unwrap();
        assert_eq!(client.url("items/x"), "https://datalab.example.org/items/x");
    }
}
