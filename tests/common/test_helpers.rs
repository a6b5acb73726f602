use std::path::{Path, PathBuf};

use axum::Router;
use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use midnam_server::{AppState, Config, build_router};

/// DTD for the drum kit documents used across the tests
pub const DRUM_KIT_DTD: &str = r#"<!ELEMENT MIDINameDocument (Author, MasterDeviceNames)>
<!ELEMENT Author (#PCDATA)>
<!ELEMENT MasterDeviceNames (Manufacturer, Model, NoteNameList*)>
<!ELEMENT Manufacturer (#PCDATA)>
<!ELEMENT Model (#PCDATA)>
<!ELEMENT NoteNameList (Note*)>
<!ATTLIST NoteNameList Name CDATA #REQUIRED>
<!ELEMENT Note EMPTY>
<!ATTLIST Note Number CDATA #IMPLIED Name CDATA #IMPLIED>
"#;

const DRUM_KIT_BODY: &str = r#"<MIDINameDocument>
  <Author>Test Suite</Author>
  <MasterDeviceNames>
    <Manufacturer>Alesis</Manufacturer>
    <Model>D4</Model>
    <NoteNameList Name="Standard Kit">
NOTES
    </NoteNameList>
  </MasterDeviceNames>
</MIDINameDocument>
"#;

pub const STANDARD_NOTES: &str = r#"      <Note Number="36" Name="Kick"/>
      <Note Number="38" Name="Snare"/>
      <Note Number="42" Name="Closed Hi-Hat"/>"#;

/// Build a document whose DOCTYPE carries [`DRUM_KIT_DTD`] as internal subset
pub fn drum_kit(notes: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE MIDINameDocument [\n{}]>\n{}",
        DRUM_KIT_DTD,
        DRUM_KIT_BODY.replace("NOTES", notes)
    )
}

/// Build a document that references `dtd_name` as its external subset
pub fn drum_kit_with_system_dtd(dtd_name: &str, notes: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE MIDINameDocument SYSTEM \"{}\">\n{}",
        dtd_name,
        DRUM_KIT_BODY.replace("NOTES", notes)
    )
}

/// A document without a DOCTYPE, for validation against a fixed DTD
pub fn bare_drum_kit(notes: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}",
        DRUM_KIT_BODY.replace("NOTES", notes)
    )
}

/// A drum kit with no DTD or note problems
pub fn valid_drum_kit() -> String {
    drum_kit(STANDARD_NOTES)
}

/// Configuration rooted in a temporary directory
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.storage.document_path = root.join("Alesis").join("D4.midnam");
    config
}

pub fn document_path(config: &Config) -> PathBuf {
    config.storage.document_path.clone()
}

pub fn test_app(config: Config) -> Router {
    build_router(AppState::new(config).expect("application state"))
}

/// `application/x-www-form-urlencoded` encoding of a single `xml` field
pub fn form_body(xml: &str) -> String {
    let mut body = String::from("xml=");
    for byte in xml.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'*' => {
                body.push(byte as char)
            }
            b' ' => body.push('+'),
            other => body.push_str(&format!("%{:02X}", other)),
        }
    }
    body
}

pub fn post_form(uri: &str, xml: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form_body(xml)))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8(self.body.clone()).expect("utf-8 body")
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("json body")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec();

    TestResponse {
        status,
        headers,
        body,
    }
}
