//! TMS communication client.
//!
//! Construction performs a client-credentials token exchange against the
//! UAA endpoint and pins the resulting bearer token on the transport; the
//! token is never refreshed during the client's lifetime. All resource
//! calls check the response against the endpoint's expected status code.

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::{Error, Result};
use crate::http::{ClientOptions, HttpResponse, HttpSender, UploadRequest};
use crate::logging::Log;
use crate::tms::{
    AuthToken, Entry, FileInfo, MtaExtDescriptor, MtaExtDescriptorsResponse, Node,
    NodeUploadRequest, NodeUploadResponse, NodesResponse, ServiceKey,
};

/// Endpoints and credentials for one TMS instance.
#[derive(Debug, Clone)]
pub struct TmsConnection {
    pub tms_url: String,
    pub uaa_url: String,
    pub client_id: String,
    pub client_secret: String,
}

impl TmsConnection {
    pub fn from_service_key(key: &ServiceKey) -> Self {
        Self {
            tms_url: key.uri.clone(),
            uaa_url: key.uaa.url.clone(),
            client_id: key.uaa.client_id.clone(),
            client_secret: key.uaa.client_secret.clone(),
        }
    }
}

fn expect_status(response: &HttpResponse, expected: u16) -> Result<()> {
    if response.status != expected {
        return Err(Error::UnexpectedStatus {
            got: response.status,
            expected,
        });
    }
    Ok(())
}

/// Fetches a bearer token via client-credentials exchange.
///
/// The Basic credentials blob and the returned access token are registered
/// as secrets before anything can log them. Any failure here makes client
/// construction fail; there is no retry.
pub fn obtain_token(
    http: &dyn HttpSender,
    connection: &TmsConnection,
    log: &dyn Log,
) -> Result<String> {
    log.debug(&format!(
        "OAuth token retrieval started; uaaUrl: {}, clientId: {}",
        connection.uaa_url, connection.client_id
    ));

    let basic = BASE64.encode(format!("{}:{}", connection.client_id, connection.client_secret));
    log.register_secret(&basic);

    let headers = vec![
        (
            "Content-Type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        ),
        ("Authorization".to_string(), format!("Basic {}", basic)),
    ];
    let body = format!(
        "grant_type=password&password={}&username={}",
        urlencoding::encode(&connection.client_secret),
        urlencoding::encode(&connection.client_id)
    );
    let url = format!(
        "{}/oauth/token/?grant_type=client_credentials&response_type=token",
        connection.uaa_url.trim_end_matches('/')
    );

    let response = http.send("POST", &url, Some(body.as_bytes()), &headers)?;
    expect_status(&response, 200)?;
    let token: AuthToken = response.json()?;
    log.register_secret(&token.access_token);

    log.debug("OAuth token retrieved successfully");
    Ok(token.header_value())
}

/// Typed facade over the TMS REST API.
pub struct TmsClient<'a, C: HttpSender> {
    tms_url: String,
    http: C,
    log: &'a dyn Log,
}

impl<'a, C: HttpSender> std::fmt::Debug for TmsClient<'a, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TmsClient")
            .field("tms_url", &self.tms_url)
            .finish_non_exhaustive()
    }
}

impl<'a, C: HttpSender> TmsClient<'a, C> {
    /// Builds a client with an authenticated transport. The token is
    /// fetched exactly once, here.
    pub fn new(
        mut http: C,
        connection: &TmsConnection,
        mut options: ClientOptions,
        log: &'a dyn Log,
    ) -> Result<Self> {
        let token = obtain_token(&http, connection, log)?;
        options.token = Some(token);
        http.set_options(options);

        Ok(Self {
            tms_url: connection.tms_url.trim_end_matches('/').to_string(),
            http,
            log,
        })
    }

    fn request(
        &self,
        method: &str,
        path_and_query: &str,
        body: Option<&[u8]>,
        expected: u16,
    ) -> Result<HttpResponse> {
        let url = format!("{}{}", self.tms_url, path_and_query);
        let headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        let response = self.http.send(method, &url, body, &headers)?;
        expect_status(&response, expected)?;
        Ok(response)
    }

    fn upload(&self, request: UploadRequest, expected: u16) -> Result<HttpResponse> {
        let response = self.http.upload(&request)?;
        expect_status(&response, expected)?;
        Ok(response)
    }

    pub fn get_nodes(&self) -> Result<Vec<Node>> {
        self.log.debug("Obtaining nodes started");
        let response = self.request("GET", "/v2/nodes", None, 200)?;
        let nodes: NodesResponse = response.json()?;
        self.log.debug("Nodes obtained successfully");
        Ok(nodes.nodes)
    }

    /// Looks up the extension descriptor for the given MTA on a node.
    ///
    /// An empty remote list means "not found" and returns `None`, not an
    /// error.
    pub fn get_mta_ext_descriptor(
        &self,
        node_id: i64,
        mta_id: &str,
        mta_version: &str,
    ) -> Result<Option<MtaExtDescriptor>> {
        self.log.debug(&format!(
            "Get MTA extension descriptor started; nodeId: {}, mtaId: {}, mtaVersion: {}",
            node_id, mta_id, mta_version
        ));
        let path = format!(
            "/v2/nodes/{}/mtaExtDescriptors?mtaId={}&mtaVersion={}",
            node_id,
            urlencoding::encode(mta_id),
            urlencoding::encode(mta_version)
        );
        let response = self.request("GET", &path, None, 200)?;
        let descriptors: MtaExtDescriptorsResponse = response.json()?;

        let descriptor = descriptors.mta_ext_descriptors.into_iter().next();
        match &descriptor {
            Some(_) => self.log.debug("MTA extension descriptor obtained successfully"),
            None => self.log.warn("No MTA extension descriptor found"),
        }
        Ok(descriptor)
    }

    pub fn update_mta_ext_descriptor(
        &self,
        node_id: i64,
        descriptor_id: i64,
        file: &Path,
        mta_version: &str,
        description: &str,
        named_user: &str,
    ) -> Result<MtaExtDescriptor> {
        self.log.debug(&format!(
            "Update of MTA extension descriptor started; nodeId: {}, mtaExtDescriptorId: {}, file: {}",
            node_id,
            descriptor_id,
            file.display()
        ));
        let request = self.descriptor_upload(
            "PUT",
            format!(
                "{}/v2/nodes/{}/mtaExtDescriptors/{}",
                self.tms_url, node_id, descriptor_id
            ),
            file,
            mta_version,
            description,
            named_user,
        );
        let response = self.upload(request, 200)?;
        let descriptor = response.json()?;
        self.log.debug("MTA extension descriptor updated successfully");
        Ok(descriptor)
    }

    pub fn upload_mta_ext_descriptor_to_node(
        &self,
        node_id: i64,
        file: &Path,
        mta_version: &str,
        description: &str,
        named_user: &str,
    ) -> Result<MtaExtDescriptor> {
        self.log.debug(&format!(
            "Upload of MTA extension descriptor started; nodeId: {}, file: {}",
            node_id,
            file.display()
        ));
        let request = self.descriptor_upload(
            "POST",
            format!("{}/v2/nodes/{}/mtaExtDescriptors", self.tms_url, node_id),
            file,
            mta_version,
            description,
            named_user,
        );
        let response = self.upload(request, 201)?;
        let descriptor = response.json()?;
        self.log.debug("MTA extension descriptor uploaded successfully");
        Ok(descriptor)
    }

    fn descriptor_upload(
        &self,
        method: &str,
        url: String,
        file: &Path,
        mta_version: &str,
        description: &str,
        named_user: &str,
    ) -> UploadRequest {
        let mut form_fields = std::collections::HashMap::new();
        form_fields.insert("mtaVersion".to_string(), mta_version.to_string());
        form_fields.insert("description".to_string(), description.to_string());

        UploadRequest {
            method: method.to_string(),
            url,
            file: file.to_path_buf(),
            file_field_name: "file".to_string(),
            form_fields,
            headers: vec![("tms-named-user".to_string(), named_user.to_string())],
        }
    }

    pub fn upload_file(&self, file: &Path, named_user: &str) -> Result<FileInfo> {
        self.log
            .debug(&format!("Upload of file started; file: {}", file.display()));
        let mut form_fields = std::collections::HashMap::new();
        form_fields.insert("namedUser".to_string(), named_user.to_string());

        let request = UploadRequest {
            method: "POST".to_string(),
            url: format!("{}/v2/files/upload", self.tms_url),
            file: file.to_path_buf(),
            file_field_name: "file".to_string(),
            form_fields,
            headers: Vec::new(),
        };
        let response = self.upload(request, 201)?;
        let info = response.json()?;
        self.log.debug("File uploaded successfully");
        Ok(info)
    }

    pub fn upload_file_to_node(
        &self,
        node_name: &str,
        file_id: &str,
        description: &str,
        named_user: &str,
    ) -> Result<NodeUploadResponse> {
        self.log
            .debug(&format!("Node upload started; nodeName: {}, fileId: {}", node_name, file_id));
        let response =
            self.node_transport("/v2/nodes/upload", node_name, file_id, description, named_user)?;
        self.log.debug("Node upload executed successfully");
        Ok(response)
    }

    pub fn export_file_to_node(
        &self,
        node_name: &str,
        file_id: &str,
        description: &str,
        named_user: &str,
    ) -> Result<NodeUploadResponse> {
        self.log
            .debug(&format!("Node export started; nodeName: {}, fileId: {}", node_name, file_id));
        let response =
            self.node_transport("/v2/nodes/export", node_name, file_id, description, named_user)?;
        self.log.debug("Node export executed successfully");
        Ok(response)
    }

    fn node_transport(
        &self,
        path: &str,
        node_name: &str,
        file_id: &str,
        description: &str,
        named_user: &str,
    ) -> Result<NodeUploadResponse> {
        let body = NodeUploadRequest {
            content_type: "MTA".to_string(),
            storage_type: "FILE".to_string(),
            node_name: node_name.to_string(),
            description: description.to_string(),
            named_user: named_user.to_string(),
            entries: vec![Entry {
                uri: file_id.to_string(),
            }],
        };
        let body = serde_json::to_vec(&body)?;
        let response = self.request("POST", path, Some(&body), 200)?;
        response.json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::MockSender;
    use crate::logging::MemoryLog;

    const TOKEN_BODY: &str =
        r#"{"token_type":"Bearer","access_token":"xyz","expires_in":3600}"#;

    fn connection() -> TmsConnection {
        TmsConnection {
            tms_url: "https://tms.example/".to_string(),
            uaa_url: "https://uaa.example".to_string(),
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
        }
    }

    // Token exchange always comes first; script it before the responses
    // the test cares about.
    fn authed() -> MockSender {
        MockSender::new().respond(200, TOKEN_BODY)
    }

    fn client_with(sender: MockSender, log: &MemoryLog) -> TmsClient<'_, MockSender> {
        TmsClient::new(sender, &connection(), ClientOptions::default(), log).unwrap()
    }

    #[test]
    fn construction_fetches_token_and_pins_it_on_the_transport() {
        let log = MemoryLog::new();
        let sender = MockSender::new().respond(200, TOKEN_BODY);
        let client = TmsClient::new(sender, &connection(), ClientOptions::default(), &log).unwrap();

        let requests = client.http.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "POST");
        assert_eq!(
            requests[0].url,
            "https://uaa.example/oauth/token/?grant_type=client_credentials&response_type=token"
        );
        let auth = requests[0].header("Authorization").unwrap().to_string();
        assert!(auth.starts_with("Basic "));
        assert_eq!(
            String::from_utf8(requests[0].body.clone().unwrap()).unwrap(),
            "grant_type=password&password=secret&username=id"
        );
        drop(requests);

        let options = client.http.options.lock().unwrap();
        assert_eq!(options.token.as_deref(), Some("Bearer xyz"));

        // Both the Basic blob and the access token are redaction-worthy.
        let secrets = log.secrets();
        assert_eq!(secrets.len(), 2);
        assert!(secrets.contains(&"xyz".to_string()));
    }

    #[test]
    fn token_failure_aborts_construction() {
        let log = MemoryLog::new();
        let sender = MockSender::new().respond(204, "");
        let err =
            TmsClient::new(sender, &connection(), ClientOptions::default(), &log).unwrap_err();
        assert_eq!(err.code(), "UNEXPECTED_STATUS");
    }

    #[test]
    fn get_nodes_parses_the_node_list() {
        let log = MemoryLog::new();
        let client = client_with(
            authed().respond(200, r#"{"nodes":[{"id":1,"name":"DEV"},{"id":2,"name":"QA"}]}"#),
            &log,
        );
        let nodes = client.get_nodes().unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1], Node { id: 2, name: "QA".to_string() });

        let requests = client.http.requests.lock().unwrap();
        assert_eq!(requests[1].url, "https://tms.example/v2/nodes");
    }

    #[test]
    fn empty_descriptor_list_is_none_not_an_error() {
        let log = MemoryLog::new();
        let client = client_with(
            authed().respond(200, r#"{"mtaExtDescriptors":[]}"#),
            &log,
        );
        let descriptor = client.get_mta_ext_descriptor(5, "com.example.mta", "1.0.0").unwrap();
        assert!(descriptor.is_none());
    }

    #[test]
    fn first_descriptor_wins_when_present() {
        let log = MemoryLog::new();
        let body = r#"{"mtaExtDescriptors":[
            {"id":11,"description":"d","mtaId":"com.example.mta","mtaExtId":"com.example.mta.ext","mtaVersion":"1.0.0","lastChangedAt":"2024-01-01T00:00:00Z"}
        ]}"#;
        let client = client_with(authed().respond(200, body), &log);
        let descriptor = client
            .get_mta_ext_descriptor(5, "com.example.mta", "1.0.0")
            .unwrap()
            .unwrap();
        assert_eq!(descriptor.id, 11);
        assert_eq!(descriptor.mta_ext_id, "com.example.mta.ext");

        let requests = client.http.requests.lock().unwrap();
        assert_eq!(
            requests[1].url,
            "https://tms.example/v2/nodes/5/mtaExtDescriptors?mtaId=com.example.mta&mtaVersion=1.0.0"
        );
    }

    #[test]
    fn update_descriptor_puts_multipart_with_named_user_header() {
        let log = MemoryLog::new();
        let client = client_with(
            authed().respond(200, r#"{"id":11,"mtaId":"m","mtaExtId":"e","mtaVersion":"1.0.0","description":"","lastChangedAt":""}"#),
            &log,
        );
        client
            .update_mta_ext_descriptor(5, 11, Path::new("my.mtaext"), "1.0.0", "fix", "jdoe")
            .unwrap();

        let uploads = client.http.uploads.lock().unwrap();
        let request = &uploads[0].request;
        assert_eq!(request.method, "PUT");
        assert_eq!(request.url, "https://tms.example/v2/nodes/5/mtaExtDescriptors/11");
        assert_eq!(request.form_fields.get("mtaVersion").unwrap(), "1.0.0");
        assert_eq!(request.form_fields.get("description").unwrap(), "fix");
        assert!(request
            .headers
            .contains(&("tms-named-user".to_string(), "jdoe".to_string())));
    }

    #[test]
    fn create_descriptor_expects_201() {
        let log = MemoryLog::new();
        // Backend answers 200 where 201 is expected.
        let client = client_with(authed().respond(200, "{}"), &log);
        let err = client
            .upload_mta_ext_descriptor_to_node(5, Path::new("my.mtaext"), "1.0.0", "new", "jdoe")
            .unwrap_err();
        match err {
            Error::UnexpectedStatus { got, expected } => {
                assert_eq!(got, 200);
                assert_eq!(expected, 201);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn upload_file_posts_named_user_form_field() {
        let log = MemoryLog::new();
        let client = client_with(
            authed().respond(201, r#"{"fileId":99,"fileName":"app.mtar"}"#),
            &log,
        );
        let info = client.upload_file(Path::new("app.mtar"), "jdoe").unwrap();
        assert_eq!(info.id, 99);

        let uploads = client.http.uploads.lock().unwrap();
        let request = &uploads[0].request;
        assert_eq!(request.url, "https://tms.example/v2/files/upload");
        assert_eq!(request.form_fields.get("namedUser").unwrap(), "jdoe");
        assert_eq!(request.file_field_name, "file");
    }

    #[test]
    fn node_upload_sends_the_transport_request_entity() {
        let log = MemoryLog::new();
        let client = client_with(
            authed().respond(
                200,
                r#"{"transportRequestId":17,"transportRequestDescription":"d","queueEntries":[]}"#,
            ),
            &log,
        );
        let response = client
            .upload_file_to_node("QA", "99", "my upload", "jdoe")
            .unwrap();
        assert_eq!(response.transport_request_id, 17);

        let requests = client.http.requests.lock().unwrap();
        assert_eq!(requests[1].url, "https://tms.example/v2/nodes/upload");
        let body: serde_json::Value =
            serde_json::from_slice(requests[1].body.as_ref().unwrap()).unwrap();
        assert_eq!(body["contentType"], "MTA");
        assert_eq!(body["storageType"], "FILE");
        assert_eq!(body["nodeName"], "QA");
        assert_eq!(body["entries"][0]["uri"], "99");
    }

    #[test]
    fn node_export_uses_the_export_endpoint() {
        let log = MemoryLog::new();
        let client = client_with(
            authed().respond(
                200,
                r#"{"transportRequestId":18,"transportRequestDescription":"d","queueEntries":[]}"#,
            ),
            &log,
        );
        client.export_file_to_node("QA", "99", "my export", "jdoe").unwrap();

        let requests = client.http.requests.lock().unwrap();
        assert_eq!(requests[1].url, "https://tms.example/v2/nodes/export");
    }
}
