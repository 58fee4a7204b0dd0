//! 集成测试 - 上传/下载端到端流程
//!
//! 在临时端口上启动真实路由，通过 HTTP 驱动完整的 offer 生命周期。

use peerlink_core::{AppState, GatewaySettings, OfferRegistry, UploadResponse, router};
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::net::TcpListener;

struct TestGateway {
    base: String,
    registry: OfferRegistry,
    http: reqwest::Client,
    _uploads: TempDir,
}

async fn start_gateway() -> TestGateway {
    let uploads = tempfile::tempdir().unwrap();
    let settings = GatewaySettings {
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
        relay_bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
        relay_connect_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
        upload_dir: uploads.path().to_path_buf(),
        connect_timeout_ms: 1000,
        read_timeout_ms: 1000,
        ..Default::default()
    };

    let registry = OfferRegistry::new();
    let app = router(AppState::with_registry(settings.clone(), registry.clone()));
    let listener = TcpListener::bind(settings.bind_addr).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestGateway {
        base: format!("http://{addr}"),
        registry,
        http: reqwest::Client::new(),
        _uploads: uploads,
    }
}

impl TestGateway {
    async fn upload(&self, name: &str, mime: &str, data: Vec<u8>) -> UploadResponse {
        let json = self.upload_json(name, mime, data).await;
        serde_json::from_value(json).unwrap()
    }

    async fn upload_json(&self, name: &str, mime: &str, data: Vec<u8>) -> serde_json::Value {
        let part = Part::bytes(data).file_name(name.to_string()).mime_str(mime).unwrap();
        let resp = self
            .http
            .post(format!("{}/api/upload", self.base))
            .multipart(Form::new().part("file", part))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        resp.json().await.unwrap()
    }

    async fn download(&self, code: &str) -> reqwest::Response {
        self.http
            .get(format!("{}/api/download", self.base))
            .query(&[("code", code)])
            .send()
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn test_hello_txt_scenario() {
    let gw = start_gateway().await;

    let json = gw
        .upload_json("hello.txt", "text/plain", b"hello 1234".to_vec())
        .await;
    assert_eq!(json["filename"], "hello.txt");
    // code 以字符串形式返回
    let code = json["code"].as_str().unwrap().to_string();
    let port: u16 = code.parse().unwrap();
    assert!(peerlink_core::PORT_RANGE.contains(&port));

    let resp = gw.download(&code).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let disposition = resp.headers()["content-disposition"].to_str().unwrap().to_string();
    assert!(disposition.contains("hello.txt"));
    assert_eq!(resp.headers()["content-type"], "text/plain");
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");

    let body = resp.bytes().await.unwrap();
    assert_eq!(body.len(), 10);
    assert_eq!(&body[..], b"hello 1234");

    // 一次传输后 offer 即失效
    assert!(gw.registry.lookup(port).is_none());
}

#[tokio::test]
async fn test_binary_roundtrip() {
    let gw = start_gateway().await;
    let data: Vec<u8> = (0..200_000u32).map(|i| (i * 31 % 251) as u8).collect();

    let uploaded = gw
        .upload("archive.bin", "application/octet-stream", data.clone())
        .await;
    let resp = gw.download(&uploaded.code).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-type"], "application/octet-stream");
    assert_eq!(resp.bytes().await.unwrap().to_vec(), data);
}

#[tokio::test]
async fn test_second_download_fails() {
    let gw = start_gateway().await;
    let uploaded = gw.upload("once.txt", "text/plain", b"only once".to_vec()).await;

    let first = gw.download(&uploaded.code).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(&first.bytes().await.unwrap()[..], b"only once");

    let second = gw.download(&uploaded.code).await;
    assert_eq!(second.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(second.text().await.unwrap().starts_with("Download error:"));
}

#[tokio::test]
async fn test_unknown_code_fails_without_hanging() {
    let gw = start_gateway().await;

    // 取一个刚释放的端口，保证没有中继在监听
    let probe = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let port = probe.local_addr().unwrap().port();
    drop(probe);

    let started = Instant::now();
    let resp = gw.download(&port.to_string()).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_download_bad_codes() {
    let gw = start_gateway().await;

    let resp = gw.download("not-a-number").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = gw
        .http
        .get(format!("{}/api/download", gw.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.text().await.unwrap(), "Missing ?code=");
}

#[tokio::test]
async fn test_upload_rejections() {
    let gw = start_gateway().await;

    let resp = gw
        .http
        .post(format!("{}/api/upload", gw.base))
        .header("Content-Type", "text/plain")
        .body("hello")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.text().await.unwrap(), "Invalid multipart Content-Type");

    let resp = gw
        .http
        .post(format!("{}/api/upload", gw.base))
        .header("Content-Type", "multipart/form-data; boundary=xyz")
        .body("--xyz\r\nContent-Disposition: form-data; filename=\"a\"\r\n\r\nno end")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(resp.text().await.unwrap().starts_with("Multipart parsing failed"));
    assert!(gw.registry.is_empty());
}

#[tokio::test]
async fn test_method_and_fallback_routes() {
    let gw = start_gateway().await;

    let resp = gw
        .http
        .get(format!("{}/api/upload", gw.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);

    let resp = gw
        .http
        .post(format!("{}/api/download?code=50000", gw.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);

    let resp = gw
        .http
        .get(format!("{}/api/health", gw.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "Backend OK");

    let resp = gw
        .http
        .request(reqwest::Method::OPTIONS, format!("{}/anything", gw.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        resp.headers()["access-control-allow-methods"],
        "GET, POST, OPTIONS"
    );

    let resp = gw
        .http
        .get(format!("{}/nope", gw.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
