//! HTTP adapter against a real listener and the in-memory backend.

use std::net::SocketAddr;

use rfortune::http;
use rfortune_core::{FortuneContext, PoolConfig, SimConnector};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

struct TestServer {
    addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    async fn start(ctx: FortuneContext<SimConnector>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(http::serve(ctx, listener, async move {
            let _ = stopped.await;
        }));
        Self {
            addr,
            stop: Some(stop),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.handle.await.unwrap().unwrap();
    }
}

async fn context(modules: &[(&str, &str)]) -> FortuneContext<SimConnector> {
    let ctx = FortuneContext::new(SimConnector::with_seed(21), PoolConfig::default());
    for (module, body) in modules {
        ctx.load_reader(module, body.as_bytes()).await.unwrap();
    }
    ctx
}

#[tokio::test]
async fn test_root_serves_html_fragment() {
    let server = TestServer::start(context(&[("zen", "breathe\n  out\n%\n")]).await).await;

    let response = reqwest::get(server.url("/")).await.unwrap();
    assert_eq!(response.status(), 200);
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/html"), "got {content_type}");
    assert_eq!(
        response.text().await.unwrap(),
        "<div id=\"fortunes/zen/1\"><pre>breathe\n  out</pre></div>"
    );

    server.shutdown().await;
}

#[tokio::test]
async fn test_any_path_serves_a_fortune() {
    let server = TestServer::start(context(&[("zen", "breathe\n%\n")]).await).await;

    for path in ["/fortune", "/a/b/c", "/favicon.ico"] {
        let response = reqwest::get(server.url(path)).await.unwrap();
        assert_eq!(response.status(), 200, "path {path}");
    }

    server.shutdown().await;
}

#[tokio::test]
async fn test_module_query_parameter() {
    let server = TestServer::start(
        context(&[("zen", "breathe\n%\n"), ("wit", "quip\n%\n")]).await,
    )
    .await;

    for _ in 0..10 {
        let body = reqwest::get(server.url("/?module=wit"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "<div id=\"fortunes/wit/2\"><pre>quip</pre></div>");
    }

    server.shutdown().await;
}

#[tokio::test]
async fn test_unknown_module_is_500_with_diagnostic() {
    let server = TestServer::start(context(&[("zen", "breathe\n%\n")]).await).await;

    let response = reqwest::get(server.url("/?module=nope")).await.unwrap();
    assert_eq!(response.status(), 500);
    assert_eq!(response.text().await.unwrap(), "module 'nope' not found");

    server.shutdown().await;
}

#[tokio::test]
async fn test_empty_store_is_500() {
    let server = TestServer::start(context(&[]).await).await;

    let response = reqwest::get(server.url("/")).await.unwrap();
    assert_eq!(response.status(), 500);
    assert_eq!(response.text().await.unwrap(), "no fortune modules loaded");

    server.shutdown().await;
}

#[tokio::test]
async fn test_only_get_is_served() {
    let server = TestServer::start(context(&[("zen", "breathe\n%\n")]).await).await;

    let response = reqwest::Client::new()
        .post(server.url("/"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 405);

    server.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_requests() {
    let server = TestServer::start(context(&[("zen", "a\n%\nb\n%\n")]).await).await;

    let mut handles = Vec::new();
    for _ in 0..32 {
        let url = server.url("/");
        handles.push(tokio::spawn(async move {
            reqwest::get(url).await.unwrap().status()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), 200);
    }

    server.shutdown().await;
}
