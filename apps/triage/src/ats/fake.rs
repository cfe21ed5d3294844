//! In-memory `AtsTransport` for tests. Unregistered paths answer 404.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};

use super::{AtsError, AtsTransport};

enum Route {
    Json(Value),
    Paged {
        items: usize,
        reported_total: Option<u64>,
        /// Requests at or past this offset answer 404.
        gone_from: Option<usize>,
    },
    Blob(Bytes),
    Failure(u16),
    /// Dispatches on the value of one query parameter; missing keys answer 404.
    ByParam {
        key: String,
        routes: HashMap<String, Route>,
    },
}

#[derive(Default)]
pub(crate) struct FakeTransport {
    routes: HashMap<String, Route>,
    requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixed JSON body for `path`, whatever the query.
    pub fn with_json(mut self, path: &str, body: Value) -> Self {
        self.routes.insert(path.to_string(), Route::Json(body));
        self
    }

    /// A listing of `items` records (`{"Id": "item-<n>"}`) served page by page
    /// according to the limit/offset or $top/$skip parameters of each request.
    pub fn with_paged_listing(
        mut self,
        path: &str,
        items: usize,
        reported_total: Option<u64>,
    ) -> Self {
        self.routes.insert(
            path.to_string(),
            Route::Paged {
                items,
                reported_total,
                gone_from: None,
            },
        );
        self
    }

    /// Like `with_paged_listing`, but any page starting at `gone_from` or
    /// later answers 404.
    pub fn with_listing_gone_after(mut self, path: &str, items: usize, gone_from: usize) -> Self {
        self.routes.insert(
            path.to_string(),
            Route::Paged {
                items,
                reported_total: None,
                gone_from: Some(gone_from),
            },
        );
        self
    }

    pub fn with_blob(mut self, path: &str, content: &[u8]) -> Self {
        self.routes
            .insert(path.to_string(), Route::Blob(Bytes::copy_from_slice(content)));
        self
    }

    pub fn with_failure(mut self, path: &str, status: u16) -> Self {
        self.routes.insert(path.to_string(), Route::Failure(status));
        self
    }

    /// Per-`contact_id` stage history for one job. `Err(status)` simulates a failure.
    pub fn with_stage_history(
        mut self,
        job_id: &str,
        contact_id: &str,
        response: Result<Value, u16>,
    ) -> Self {
        let path = format!("/jobs/{job_id}/contacts/history");
        let route = match response {
            Ok(body) => Route::Json(body),
            Err(status) => Route::Failure(status),
        };
        match self.routes.get_mut(&path) {
            Some(Route::ByParam { routes, .. }) => {
                routes.insert(contact_id.to_string(), route);
            }
            _ => {
                let mut routes = HashMap::new();
                routes.insert(contact_id.to_string(), route);
                self.routes.insert(
                    path,
                    Route::ByParam {
                        key: "contact_id".to_string(),
                        routes,
                    },
                );
            }
        }
        self
    }

    pub fn total_requests(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request_count(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == path)
            .count()
    }

    /// Values of query parameter `key` across all requests to `path`, in order.
    pub fn query_values(&self, path: &str, key: &str) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == path)
            .flat_map(|(_, query)| {
                query
                    .iter()
                    .filter(|(k, _)| k == key)
                    .map(|(_, v)| v.clone())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn record(&self, path: &str, query: &[(String, String)]) {
        self.requests
            .lock()
            .unwrap()
            .push((path.to_string(), query.to_vec()));
    }

    fn failure(path: &str, status: u16) -> AtsError {
        AtsError::Status {
            status,
            path: path.to_string(),
            message: "simulated failure".to_string(),
        }
    }
}

fn respond_json(
    route: Option<&Route>,
    path: &str,
    query: &[(String, String)],
) -> Result<Option<Value>, AtsError> {
    match route {
        None => Ok(None),
        Some(Route::Json(body)) => Ok(Some(body.clone())),
        Some(Route::Failure(status)) => Err(FakeTransport::failure(path, *status)),
        Some(Route::Blob(_)) => Ok(Some(Value::Null)),
        Some(Route::ByParam { key, routes }) => {
            let value = query
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
                .unwrap_or_default();
            respond_json(routes.get(value), path, query)
        }
        Some(Route::Paged {
            items,
            reported_total,
            gone_from,
        }) => {
            let offset = param(query, &["offset", "$skip"]).unwrap_or(0);
            if gone_from.is_some_and(|gone| offset >= gone) {
                return Ok(None);
            }
            let limit = param(query, &["limit", "$top"]).unwrap_or(100);
            let end = (offset + limit).min(*items);
            let data: Vec<Value> = (offset.min(end)..end)
                .map(|i| json!({ "Id": format!("item-{i}") }))
                .collect();
            let mut body = json!({ "Data": data });
            if let Some(total) = reported_total {
                body["Metadata"] = json!({ "TotalCount": total });
            }
            Ok(Some(body))
        }
    }
}

fn param(query: &[(String, String)], keys: &[&str]) -> Option<usize> {
    query
        .iter()
        .find(|(k, _)| keys.contains(&k.as_str()))
        .and_then(|(_, v)| v.parse().ok())
}

#[async_trait]
impl AtsTransport for FakeTransport {
    async fn get_json(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Option<Value>, AtsError> {
        self.record(path, query);
        respond_json(self.routes.get(path), path, query)
    }

    async fn get_bytes(&self, path: &str) -> Result<Option<Bytes>, AtsError> {
        self.record(path, &[]);
        match self.routes.get(path) {
            Some(Route::Blob(content)) => Ok(Some(content.clone())),
            Some(Route::Failure(status)) => Err(Self::failure(path, *status)),
            _ => Ok(None),
        }
    }
}
