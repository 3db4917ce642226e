//! Blocking HTTP implementation of [`CatalogApi`].
//!
//! Action endpoints live at `<base_url>/api/3/action/<action>` and answer
//! with a `{"success": bool, "result": ...}` envelope regardless of HTTP
//! status, so bodies are decoded before status is considered. Mutations go
//! as JSON or form posts; file uploads as multipart forms with the file
//! under the `upload` part.

use std::path::Path;
use std::time::Duration;

use reqwest::blocking::multipart;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use syndic_core::config::InstanceConfig;
use syndic_core::types::{Dataset, Organization, Resource};

use crate::api::{CatalogApi, Group, PackageFields, ResourceFields};
use crate::error::CatalogError;

const TIMEOUT_SECONDS: u64 = 60;
const PAGE_SIZE: usize = 100;

/// Blocking catalog API client bound to one instance.
pub struct CatalogClient {
    http: reqwest::blocking::Client,
    base_url: String,
    api_key: Option<String>,
}

impl CatalogClient {
    /// Build a client for `base_url`, with an optional credential.
    pub fn new(base_url: String, api_key: Option<String>) -> Result<Self, CatalogError> {
        Self::with_user_agent(base_url, api_key, None)
    }

    /// [`new`](Self::new), announcing a custom `User-Agent`. Some portals
    /// gate their APIs on the agent string.
    pub fn with_user_agent(
        base_url: String,
        api_key: Option<String>,
        user_agent: Option<&str>,
    ) -> Result<Self, CatalogError> {
        let mut builder =
            reqwest::blocking::Client::builder().timeout(Duration::from_secs(TIMEOUT_SECONDS));
        if let Some(agent) = user_agent {
            builder = builder.user_agent(agent);
        }
        let http = builder.build()?;
        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    /// Build a client from a configured instance entry.
    pub fn from_config(config: &InstanceConfig) -> Result<Self, CatalogError> {
        Self::new(config.base_url.clone(), config.api_key.clone())
    }

    /// `<base_url>/api/3/action/<action>`
    fn action_url(&self, action: &str) -> String {
        format!("{}/api/3/action/{action}", self.base_url.trim_end_matches('/'))
    }

    fn authorize(&self, request: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", key),
            None => request,
        }
    }

    fn call_get(&self, action: &str, params: &[(&str, String)]) -> Result<Value, CatalogError> {
        debug!("GET {action}");
        let request = self.authorize(self.http.get(self.action_url(action)).query(params));
        Ok(request.send()?.json()?)
    }

    fn call_json(&self, action: &str, body: &impl Serialize) -> Result<Value, CatalogError> {
        debug!("POST {action} (json)");
        let request = self.authorize(self.http.post(self.action_url(action)).json(body));
        Ok(request.send()?.json()?)
    }

    fn call_form(&self, action: &str, pairs: &[(String, String)]) -> Result<Value, CatalogError> {
        debug!("POST {action} (form)");
        let request = self.authorize(self.http.post(self.action_url(action)).form(pairs));
        Ok(request.send()?.json()?)
    }

    fn call_multipart(
        &self,
        action: &str,
        pairs: Vec<(String, String)>,
        upload: &Path,
    ) -> Result<Value, CatalogError> {
        debug!("POST {action} (multipart, {})", upload.display());
        let mut form = multipart::Form::new();
        for (key, value) in pairs {
            form = form.text(key, value);
        }
        let form = form
            .file("upload", upload)
            .map_err(|e| CatalogError::Upload {
                path: upload.to_path_buf(),
                source: e,
            })?;
        let request = self.authorize(self.http.post(self.action_url(action)).multipart(form));
        Ok(request.send()?.json()?)
    }

    fn resource_call(
        &self,
        action: &str,
        fields: &ResourceFields,
        upload: Option<&Path>,
    ) -> Result<Resource, CatalogError> {
        let pairs = form_pairs(action, fields)?;
        let envelope = match upload {
            Some(path) => self.call_multipart(action, pairs, path)?,
            None => self.call_form(action, &pairs)?,
        };
        decode_result(action, envelope)
    }
}

impl CatalogApi for CatalogClient {
    fn package_list(&self) -> Result<Vec<String>, CatalogError> {
        let mut names = Vec::new();
        let mut offset = 0usize;
        loop {
            let envelope = self.call_get(
                "package_list",
                &[
                    ("limit", PAGE_SIZE.to_string()),
                    ("offset", offset.to_string()),
                ],
            )?;
            let page: Vec<String> = decode_result("package_list", envelope)?;
            if page.is_empty() {
                break;
            }
            names.extend(page);
            offset += PAGE_SIZE;
        }
        Ok(names)
    }

    fn package_show(&self, id: &str) -> Result<Option<Dataset>, CatalogError> {
        let envelope = self.call_get("package_show", &[("id", id.to_owned())])?;
        decode_shown("package_show", envelope)
    }

    fn package_create(&self, fields: &PackageFields) -> Result<Dataset, CatalogError> {
        let envelope = self.call_json("package_create", fields)?;
        decode_result("package_create", envelope)
    }

    fn package_update(&self, dataset: &Dataset) -> Result<Dataset, CatalogError> {
        let envelope = self.call_json("package_update", dataset)?;
        decode_result("package_update", envelope)
    }

    fn resource_create(
        &self,
        fields: &ResourceFields,
        upload: Option<&Path>,
    ) -> Result<Resource, CatalogError> {
        self.resource_call("resource_create", fields, upload)
    }

    fn resource_update(
        &self,
        fields: &ResourceFields,
        upload: Option<&Path>,
    ) -> Result<Resource, CatalogError> {
        self.resource_call("resource_update", fields, upload)
    }

    fn group_show(&self, name: &str, group_type: &str) -> Result<Option<Group>, CatalogError> {
        let envelope = self.call_get(
            "group_show",
            &[("id", name.to_owned()), ("type", group_type.to_owned())],
        )?;
        decode_shown("group_show", envelope)
    }

    fn group_create(&self, group: &Group) -> Result<(), CatalogError> {
        let pairs = form_pairs("group_create", group)?;
        let envelope = self.call_form("group_create", &pairs)?;
        expect_success("group_create", envelope).map(|_| ())
    }

    fn group_update(&self, group: &Group) -> Result<(), CatalogError> {
        let envelope = self.call_json("group_update", group)?;
        expect_success("group_update", envelope).map(|_| ())
    }

    fn organization_show(&self, name: &str) -> Result<Option<Organization>, CatalogError> {
        let envelope = self.call_get("organization_show", &[("id", name.to_owned())])?;
        decode_shown("organization_show", envelope)
    }

    fn organization_create(&self, org: &Organization) -> Result<(), CatalogError> {
        let pairs = form_pairs("organization_create", org)?;
        let envelope = self.call_form("organization_create", &pairs)?;
        expect_success("organization_create", envelope).map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// Envelope handling
// ---------------------------------------------------------------------------

fn is_success(envelope: &Value) -> bool {
    envelope
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn expect_success(action: &str, envelope: Value) -> Result<Value, CatalogError> {
    if is_success(&envelope) {
        Ok(envelope)
    } else {
        Err(CatalogError::Api {
            action: action.to_owned(),
            payload: envelope,
        })
    }
}

fn decode_result<T: DeserializeOwned>(action: &str, envelope: Value) -> Result<T, CatalogError> {
    let envelope = expect_success(action, envelope)?;
    let result = envelope
        .get("result")
        .cloned()
        .ok_or_else(|| CatalogError::MissingResult {
            action: action.to_owned(),
        })?;
    serde_json::from_value(result).map_err(|e| CatalogError::Decode {
        action: action.to_owned(),
        source: e,
    })
}

/// Show calls report absence as `success: false` rather than an error.
fn decode_shown<T: DeserializeOwned>(
    action: &str,
    envelope: Value,
) -> Result<Option<T>, CatalogError> {
    if !is_success(&envelope) {
        return Ok(None);
    }
    decode_result(action, envelope).map(Some)
}

/// Flatten a request struct into form fields, dropping null entries.
fn form_pairs(action: &str, fields: &impl Serialize) -> Result<Vec<(String, String)>, CatalogError> {
    let value = serde_json::to_value(fields).map_err(|e| CatalogError::Decode {
        action: action.to_owned(),
        source: e,
    })?;
    let mut pairs = Vec::new();
    if let Value::Object(object) = value {
        for (key, value) in object {
            match value {
                Value::Null => {}
                Value::String(s) => pairs.push((key, s)),
                Value::Bool(b) => pairs.push((key, b.to_string())),
                Value::Number(n) => pairs.push((key, n.to_string())),
                other => pairs.push((key, other.to_string())),
            }
        }
    }
    Ok(pairs)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::{Arc, Mutex};

    fn client(base_url: &str, api_key: Option<&str>) -> CatalogClient {
        CatalogClient::new(base_url.to_owned(), api_key.map(str::to_owned)).expect("client")
    }

    // -- pure helpers -------------------------------------------------------

    #[test]
    fn action_url_trims_trailing_slash() {
        let c = client("https://data.town.example/", None);
        assert_eq!(
            c.action_url("package_show"),
            "https://data.town.example/api/3/action/package_show"
        );
    }

    #[test]
    fn decode_result_rejects_failure_envelope() {
        let envelope = serde_json::json!({"success": false, "error": {"name": ["missing"]}});
        let err = decode_result::<Vec<String>>("package_list", envelope).unwrap_err();
        match err {
            CatalogError::Api { action, payload } => {
                assert_eq!(action, "package_list");
                assert!(payload.to_string().contains("missing"));
            }
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn decode_result_requires_a_result_key() {
        let envelope = serde_json::json!({"success": true});
        let err = decode_result::<Vec<String>>("package_list", envelope).unwrap_err();
        assert!(matches!(err, CatalogError::MissingResult { .. }));
    }

    #[test]
    fn decode_shown_maps_failure_to_none() {
        let envelope = serde_json::json!({"success": false, "error": {"message": "Not found"}});
        let shown: Option<Dataset> = decode_shown("package_show", envelope).expect("decode");
        assert!(shown.is_none());
    }

    #[test]
    fn form_pairs_drop_null_fields() {
        let group = Group {
            name: "environment".to_owned(),
            group_type: "group".to_owned(),
            title: "Environment".to_owned(),
            ..Group::default()
        };
        let pairs = form_pairs("group_create", &group).expect("pairs");
        assert!(pairs.iter().any(|(k, v)| k == "name" && v == "environment"));
        assert!(pairs.iter().all(|(k, _)| k != "image_url"));
    }

    // -- stub server --------------------------------------------------------

    struct Stub {
        base_url: String,
        requests: Arc<Mutex<Vec<String>>>,
    }

    /// Serve `responses` in order on a local port, capturing raw requests.
    fn serve(responses: Vec<String>) -> Stub {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let base_url = format!("http://{}", listener.local_addr().expect("addr"));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&requests);
        std::thread::spawn(move || {
            for body in responses {
                let (mut stream, _) = match listener.accept() {
                    Ok(accepted) => accepted,
                    Err(_) => return,
                };
                let raw = read_request(&mut stream);
                captured.lock().expect("lock").push(raw);
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });
        Stub { base_url, requests }
    }

    fn read_request(stream: &mut TcpStream) -> String {
        let mut head = Vec::new();
        let mut byte = [0u8; 1];
        while !head.ends_with(b"\r\n\r\n") {
            match stream.read(&mut byte) {
                Ok(1) => head.push(byte[0]),
                _ => break,
            }
        }
        let head = String::from_utf8_lossy(&head).into_owned();
        let length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        let mut body = vec![0u8; length];
        if length > 0 {
            let _ = stream.read_exact(&mut body);
        }
        head + &String::from_utf8_lossy(&body)
    }

    // -- wire tests ---------------------------------------------------------

    #[test]
    fn package_show_decodes_and_authorizes() {
        let stub = serve(vec![serde_json::json!({
            "success": true,
            "result": {"id": "abc-123", "name": "air-quality", "title": "Air quality"},
        })
        .to_string()]);
        let c = client(&stub.base_url, Some("secret-key"));

        let dataset = c.package_show("air-quality").expect("show").expect("some");
        assert_eq!(dataset.name, "air-quality");

        let requests = stub.requests.lock().expect("lock");
        assert!(requests[0].starts_with("GET /api/3/action/package_show?id=air-quality"));
        assert!(requests[0].contains("authorization: secret-key")
            || requests[0].contains("Authorization: secret-key"));
    }

    #[test]
    fn package_show_absent_is_none() {
        let stub = serve(vec![serde_json::json!({
            "success": false,
            "error": {"message": "Not found"},
        })
        .to_string()]);
        let c = client(&stub.base_url, None);
        assert!(c.package_show("missing").expect("show").is_none());
    }

    #[test]
    fn package_list_pages_until_empty() {
        let stub = serve(vec![
            serde_json::json!({"success": true, "result": ["a", "b"]}).to_string(),
            serde_json::json!({"success": true, "result": []}).to_string(),
        ]);
        let c = client(&stub.base_url, None);

        let names = c.package_list().expect("list");
        assert_eq!(names, vec!["a".to_owned(), "b".to_owned()]);

        let requests = stub.requests.lock().expect("lock");
        assert_eq!(requests.len(), 2);
        assert!(requests[0].contains("offset=0"));
        assert!(requests[1].contains("offset=100"));
    }

    #[test]
    fn package_create_failure_carries_payload() {
        let stub = serve(vec![serde_json::json!({
            "success": false,
            "error": {"owner_org": ["missing value"]},
        })
        .to_string()]);
        let c = client(&stub.base_url, Some("secret-key"));

        let fields = PackageFields {
            name: "air-quality".to_owned(),
            title: "Air quality".to_owned(),
            private: true,
            owner_org: "town-hall".to_owned(),
            license_id: None,
            notes: None,
            url: None,
            version: None,
            extras: vec![],
        };
        let err = c.package_create(&fields).unwrap_err();
        match err {
            CatalogError::Api { action, payload } => {
                assert_eq!(action, "package_create");
                assert!(payload.to_string().contains("owner_org"));
            }
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn resource_create_uploads_multipart() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let upload = dir.path().join("readings.csv");
        std::fs::write(&upload, "station,value\na,1\n").expect("write upload");

        let stub = serve(vec![serde_json::json!({
            "success": true,
            "result": {"id": "res-1", "name": "readings.csv", "format": "CSV"},
        })
        .to_string()]);
        let c = client(&stub.base_url, Some("secret-key"));

        let fields = ResourceFields {
            id: None,
            package_id: Some("air-quality".to_owned()),
            name: Some("readings.csv".to_owned()),
            format: Some("CSV".to_owned()),
            description: None,
            url: Some("readings.csv".to_owned()),
            hash: Some("deadbeef".to_owned()),
        };
        let resource = c
            .resource_create(&fields, Some(&upload))
            .expect("resource_create");
        assert_eq!(resource.id.as_ref().map(|id| id.0.as_str()), Some("res-1"));

        let requests = stub.requests.lock().expect("lock");
        let raw = &requests[0];
        assert!(raw.contains("multipart/form-data"));
        assert!(raw.contains("name=\"upload\""));
        assert!(raw.contains("station,value"));
        assert!(raw.contains("deadbeef"));
    }

    #[test]
    fn resource_update_without_file_posts_a_form() {
        let stub = serve(vec![serde_json::json!({
            "success": true,
            "result": {"id": "res-1", "name": "readings.csv", "format": "CSV"},
        })
        .to_string()]);
        let c = client(&stub.base_url, None);

        let fields = ResourceFields {
            id: Some("res-1".into()),
            package_id: None,
            name: None,
            format: None,
            description: Some("updated".to_owned()),
            url: None,
            hash: None,
        };
        c.resource_update(&fields, None).expect("resource_update");

        let requests = stub.requests.lock().expect("lock");
        assert!(requests[0].contains("application/x-www-form-urlencoded"));
        assert!(requests[0].contains("id=res-1"));
    }
}
