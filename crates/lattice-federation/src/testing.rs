//! Shared test fixtures

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http::{Request, Response, StatusCode};
use k8s_openapi::api::core::v1::{Node, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::client::Body;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use lattice_common::crd::{MemberCluster, MemberClusterSpec, SecretReference, ServerAddressByClientCidr};

/// Kubeconfig with token auth, as stored in a member cluster secret
pub const KUBECONFIG_YAML: &str = r#"
apiVersion: v1
kind: Config
clusters:
  - name: member
    cluster:
      server: https://placeholder.invalid:6443
      insecure-skip-tls-verify: true
users:
  - name: admin
    user:
      token: member-admin-token
contexts:
  - name: member
    context:
      cluster: member
      user: admin
current-context: member
"#;

/// Install crypto provider for rustls (required to build TLS-capable clients)
pub fn init_crypto() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// A MemberCluster whose secret is named `<name>-creds`
pub fn member_cluster(name: &str, pairs: Vec<(&str, &str)>) -> MemberCluster {
    MemberCluster::new(
        name,
        MemberClusterSpec {
            server_address_by_client_cidrs: pairs
                .into_iter()
                .map(|(cidr, addr)| ServerAddressByClientCidr::new(cidr, addr))
                .collect(),
            secret_ref: SecretReference {
                name: format!("{name}-creds"),
            },
        },
    )
}

/// A node carrying the given labels
pub fn node(name: &str, labels: &[(&str, &str)]) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(
                labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// A kube Client answering every request with `handler`
pub fn mock_client<F>(handler: F) -> kube::Client
where
    F: Fn(Request<Body>) -> Response<Body> + Send + Sync + 'static,
{
    let handler = Arc::new(handler);
    let service = tower::service_fn(move |req: Request<Body>| {
        let handler = handler.clone();
        async move { Ok::<_, Infallible>(handler(req)) }
    });
    kube::Client::new(service, "default")
}

/// JSON response with status 200
pub fn json_response(value: &impl serde::Serialize) -> Response<Body> {
    let body = serde_json::to_vec(value).expect("fixture should serialize");
    Response::builder()
        .status(StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .expect("valid response")
}

/// A Secret with optional single data entry
pub fn secret_response(name: &str, namespace: &str, entry: Option<(&str, &str)>) -> Response<Body> {
    let secret = Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: entry.map(|(k, v)| {
            BTreeMap::from([(k.to_string(), ByteString(v.as_bytes().to_vec()))])
        }),
        ..Default::default()
    };
    json_response(&secret)
}

/// A Kubernetes `Status` failure response
pub fn status_response(code: StatusCode, reason: &str) -> Response<Body> {
    let status = serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Failure",
        "message": format!("request failed: {reason}"),
        "reason": reason,
        "code": code.as_u16(),
    });
    let body = serde_json::to_vec(&status).expect("status should serialize");
    Response::builder()
        .status(code)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .expect("valid response")
}

/// Plain text response (e.g. `/healthz`)
pub fn text_response(text: &str) -> Response<Body> {
    Response::builder()
        .status(StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "text/plain")
        .body(Body::from(text.as_bytes().to_vec()))
        .expect("valid response")
}

/// A request seen by [`spawn_api_server`]
#[derive(Clone, Debug)]
pub struct SeenRequest {
    pub method: String,
    pub path: String,
    pub user_agent: Option<String>,
}

/// Minimal plain-HTTP API server on 127.0.0.1
///
/// Answers `/healthz` with "ok", node lists with `nodes`, anything else with
/// 404. Every request is reported on the returned channel.
pub async fn spawn_api_server(
    nodes: Vec<Node>,
) -> (SocketAddr, mpsc::UnboundedReceiver<SeenRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let (tx, rx) = mpsc::unbounded_channel();
    let node_list = serde_json::to_vec(&serde_json::json!({
        "apiVersion": "v1",
        "kind": "NodeList",
        "metadata": {},
        "items": nodes,
    }))
    .expect("node list should serialize");

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve_connection(stream, tx.clone(), node_list.clone()));
        }
    });
    (addr, rx)
}

async fn serve_connection(
    mut stream: TcpStream,
    seen: mpsc::UnboundedSender<SeenRequest>,
    node_list: Vec<u8>,
) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        // Requests are bodiless GETs: one request per header block.
        while let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_string();
            buf.drain(..end + 4);

            let request = parse_head(&head);
            let (status, content_type, body) = match request.path.as_str() {
                "/healthz" => ("200 OK", "text/plain", b"ok".to_vec()),
                "/api/v1/nodes" => ("200 OK", "application/json", node_list.clone()),
                _ => ("404 Not Found", "text/plain", b"not found".to_vec()),
            };
            let _ = seen.send(request);

            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: {content_type}\r\ncontent-length: {}\r\n\r\n",
                body.len()
            );
            if stream.write_all(response.as_bytes()).await.is_err()
                || stream.write_all(&body).await.is_err()
            {
                return;
            }
        }
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

fn parse_head(head: &str) -> SeenRequest {
    let mut lines = head.lines();
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let target = request_line.next().unwrap_or_default();
    let path = target.split('?').next().unwrap_or_default().to_string();
    let user_agent = lines.find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.eq_ignore_ascii_case("user-agent")
            .then(|| value.trim().to_string())
    });
    SeenRequest {
        method,
        path,
        user_agent,
    }
}
