// client.rs
//
// HTTP access to the analysis and download endpoints.

use std::time::Duration;

use geojson::{FeatureCollection, GeoJson};
use reqwest::blocking::{Client, Response, multipart};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::analysis::AnalysisRequest;
use crate::error::ClientError;

const ANALYSIS_FAILED: &str = "Analysis failed";
const DOWNLOAD_FAILED: &str = "Download failed";

/// The remote side of an analysis session.
pub trait AnalysisBackend: Send + Sync {
    fn analyze(&self, request: &AnalysisRequest) -> Result<FeatureCollection, ClientError>;

    /// Converts a result back into a zipped shapefile.
    fn download(&self, collection: &FeatureCollection) -> Result<Vec<u8>, ClientError>;
}

pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(HttpBackend {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl AnalysisBackend for HttpBackend {
    fn analyze(&self, request: &AnalysisRequest) -> Result<FeatureCollection, ClientError> {
        let mut form = multipart::Form::new().file("file", &request.file)?;
        for (name, value) in request.form_fields() {
            form = form.text(name, value);
        }

        let response = self
            .client
            .post(self.url("analyze"))
            .multipart(form)
            .send()?;
        let response = check_status(response, ANALYSIS_FAILED)?;
        let body = response.bytes()?;
        parse_feature_collection(&body)
    }

    fn download(&self, collection: &FeatureCollection) -> Result<Vec<u8>, ClientError> {
        let response = self
            .client
            .post(self.url("download"))
            .json(collection)
            .send()?;
        if !response.status().is_success() {
            return Err(ClientError::Server {
                status: response.status().as_u16(),
                detail: DOWNLOAD_FAILED.to_string(),
            });
        }
        Ok(response.bytes()?.to_vec())
    }
}

fn check_status(response: Response, fallback: &str) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.bytes().unwrap_or_default();
    Err(ClientError::Server {
        status: status.as_u16(),
        detail: error_detail(&body).unwrap_or_else(|| fallback.to_string()),
    })
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<JsonValue>,
}

/// Human-readable `detail` from an error body, if it carries one.
pub fn error_detail(body: &[u8]) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_slice(body).ok()?;
    match parsed.detail? {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s),
        _ => None,
    }
}

pub fn parse_feature_collection(body: &[u8]) -> Result<FeatureCollection, ClientError> {
    let geojson: GeoJson = serde_json::from_slice(body)
        .map_err(|e| ClientError::InvalidResponse(format!("not GeoJSON: {e}")))?;
    match geojson {
        GeoJson::FeatureCollection(collection) => Ok(collection),
        GeoJson::Feature(_) => Err(ClientError::InvalidResponse(
            "expected a FeatureCollection, got a Feature".to_string(),
        )),
        GeoJson::Geometry(_) => Err(ClientError::InvalidResponse(
            "expected a FeatureCollection, got a Geometry".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisForm;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::path::PathBuf;
    use std::sync::mpsc;
    use std::thread;

    const COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature",
             "geometry": {"type": "LineString", "coordinates": [[79.85, 6.90], [79.86, 6.91]]},
             "properties": {"class_id": 1, "value": 0.5}}
        ]
    }"#;

    /// Serves one canned response and hands back the raw request text.
    fn serve_once(status_line: &str, body: &str) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let response = format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let _ = stream.set_read_timeout(Some(Duration::from_millis(300)));
                let mut request = Vec::new();
                let mut buf = [0u8; 4096];
                loop {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = stream.write_all(response.as_bytes());
                let _ = tx.send(String::from_utf8_lossy(&request).into_owned());
            }
        });
        (format!("http://{addr}"), rx)
    }

    fn fixture_zip(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("geonet-client-{name}-{}.zip", std::process::id()));
        std::fs::write(&path, b"PK\x03\x04fixture").expect("write fixture");
        path
    }

    #[test]
    fn error_detail_reads_string_detail_only() {
        assert_eq!(
            error_detail(br#"{"detail": "No valid .shp file"}"#),
            Some("No valid .shp file".to_string())
        );
        assert_eq!(error_detail(br#"{"detail": [{"loc": ["body"]}]}"#), None);
        assert_eq!(error_detail(br#"{"message": "nope"}"#), None);
        assert_eq!(error_detail(b"<html>502</html>"), None);
    }

    #[test]
    fn feature_collection_root_is_required() {
        assert_eq!(
            parse_feature_collection(COLLECTION.as_bytes())
                .map(|fc| fc.features.len())
                .ok(),
            Some(1)
        );
        let feature = r#"{"type": "Feature", "geometry": null, "properties": {}}"#;
        assert!(matches!(
            parse_feature_collection(feature.as_bytes()),
            Err(ClientError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_feature_collection(b"not json"),
            Err(ClientError::InvalidResponse(_))
        ));
    }

    #[test]
    fn analyze_posts_multipart_form() {
        let (url, requests) = serve_once("200 OK", COLLECTION);
        let backend = HttpBackend::new(&url, Some(Duration::from_secs(10))).expect("client");
        let zip = fixture_zip("ok");
        let request = AnalysisForm::default().to_request(&zip);

        let collection = backend.analyze(&request).expect("analysis succeeds");
        assert_eq!(collection.features.len(), 1);

        let raw = requests.recv_timeout(Duration::from_secs(5)).expect("request seen");
        assert!(raw.starts_with("POST /analyze"));
        assert!(raw.contains("multipart/form-data"));
        for field in ["file", "analysis_type", "classification_method", "class_count", "metric", "radius"] {
            assert!(raw.contains(&format!("name=\"{field}\"")), "missing {field}");
        }
        assert!(raw.contains("Natural Breaks (Jenks)"));
        let _ = std::fs::remove_file(zip);
    }

    #[test]
    fn analyze_surfaces_server_detail() {
        let (url, _requests) = serve_once(
            "500 Internal Server Error",
            r#"{"detail": "Unknown analysis type"}"#,
        );
        let backend = HttpBackend::new(&url, Some(Duration::from_secs(10))).expect("client");
        let zip = fixture_zip("err");
        let request = AnalysisForm::default().to_request(&zip);

        match backend.analyze(&request) {
            Err(err @ ClientError::Server { .. }) => {
                assert_eq!(err.to_string(), "Unknown analysis type");
                assert_eq!(err.status(), Some(500));
            }
            other => panic!("expected server error, got {other:?}"),
        }
        let _ = std::fs::remove_file(zip);
    }

    #[test]
    fn analyze_falls_back_to_generic_message() {
        let (url, _requests) = serve_once("502 Bad Gateway", "upstream down");
        let backend = HttpBackend::new(&url, Some(Duration::from_secs(10))).expect("client");
        let zip = fixture_zip("generic");
        let request = AnalysisForm::default().to_request(&zip);

        let err = backend.analyze(&request).expect_err("must fail");
        assert_eq!(err.to_string(), "Analysis failed");
        let _ = std::fs::remove_file(zip);
    }

    #[test]
    fn download_posts_geojson_body() {
        let (url, requests) = serve_once("200 OK", "PKzip-bytes");
        let backend = HttpBackend::new(&url, Some(Duration::from_secs(10))).expect("client");
        let collection = parse_feature_collection(COLLECTION.as_bytes()).expect("fixture");

        let bytes = backend.download(&collection).expect("download succeeds");
        assert_eq!(bytes, b"PKzip-bytes");

        let raw = requests.recv_timeout(Duration::from_secs(5)).expect("request seen");
        assert!(raw.starts_with("POST /download"));
        assert!(raw.contains("application/json"));
        assert!(raw.contains("FeatureCollection"));
    }

    #[test]
    fn unreachable_backend_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);
        let backend = HttpBackend::new(&format!("http://{addr}"), Some(Duration::from_secs(5)))
            .expect("client");
        let collection = parse_feature_collection(COLLECTION.as_bytes()).expect("fixture");
        assert!(matches!(
            backend.download(&collection),
            Err(ClientError::Transport(_))
        ));
    }
}
