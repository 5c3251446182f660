//! Line-protocol writer tests against a local listener.

use kairos_client::{Error, MetricBuilder, TelnetClient};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

async fn listener() -> (TcpListener, std::net::SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

#[tokio::test]
async fn test_put_metrics_writes_lines() {
    let (listener, addr) = listener().await;
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut received = String::new();
        socket.read_to_string(&mut received).await.unwrap();
        received
    });

    let mut builder = MetricBuilder::new();
    builder
        .add_metric("cpu")
        .unwrap()
        .add_tag("host", "s1")
        .unwrap()
        .add_data_point(1000, 1)
        .unwrap()
        .add_data_point(2000, 2.5)
        .unwrap();
    builder
        .add_metric("mem")
        .unwrap()
        .add_tag("host", "s1")
        .unwrap()
        .add_data_point(1000, 512)
        .unwrap();

    let mut client = TelnetClient::connect(addr).await.unwrap();
    client.put_metrics(&builder).await.unwrap();
    client.write_line("version").await.unwrap();
    client.flush().await.unwrap();
    client.shutdown().await.unwrap();

    assert_eq!(
        server.await.unwrap(),
        "putm cpu 1000 1 host=s1\nputm cpu 2000 2.5 host=s1\nputm mem 1000 512 host=s1\nversion\n"
    );
}

#[tokio::test]
async fn test_invalid_batch_writes_nothing() {
    let (listener, addr) = listener().await;
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();
        socket.read_to_end(&mut received).await.unwrap();
        received
    });

    let mut builder = MetricBuilder::new();
    builder
        .add_metric("cpu")
        .unwrap()
        .add_tag("host", "s1")
        .unwrap()
        .add_data_point(1000, 1)
        .unwrap();
    builder.add_metric("untagged").unwrap().add_data_point(1000, 1).unwrap();

    let mut client = TelnetClient::connect(addr).await.unwrap();
    assert!(matches!(
        client.put_metrics(&builder).await,
        Err(Error::Validation(_))
    ));
    client.shutdown().await.unwrap();

    assert!(server.await.unwrap().is_empty());
}

#[tokio::test]
async fn test_connect_refused() {
    let (listener, addr) = listener().await;
    drop(listener);
    assert!(matches!(TelnetClient::connect(addr).await, Err(Error::Io(_))));
}
