//! End-to-end test of the live event loop against a loopback feed server

use canarywatch_status::{
    run, ClientConfig, ConnectionState, MemoryDisplay, Notification, Notifier, Permission, Status,
};
use futures_util::SinkExt;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use url::Url;

struct ChannelNotifier(mpsc::UnboundedSender<Notification>);

impl Notifier for ChannelNotifier {
    fn request_permission(&mut self) -> Permission {
        Permission::Granted
    }

    fn show(&mut self, notification: &Notification) {
        let _ = self.0.send(notification.clone());
    }
}

#[tokio::test]
async fn test_live_feed_raises_one_notification() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let frames = [
            r#"{"http":[{"name":"A","host":"h1","tag":"x","interval_s":5},{"name":"B","host":"h2","tag":"y","interval_s":5}]}"#,
            r#"{"target":{"name":"A","host":"h1","tag":"x","interval_s":5},"status":"Fire","status_code":500,"time":"2024-01-01T00:00:00Z"}"#,
            r#"{"target":{"name":"A","host":"h1","tag":"x","interval_s":5},"status":"Okay","status_code":200,"time":"2024-01-01T00:00:05Z"}"#,
        ];
        for frame in frames {
            ws.send(Message::Text(frame.to_string())).await.unwrap();
        }
        // Hold the socket open until the client goes away
        while let Some(Ok(_)) = futures_util::StreamExt::next(&mut ws).await {}
    });

    let page = Url::parse(&format!(
        "http://dash.local/?server=ws://{}&filter=x&notifications=true",
        addr
    ))
    .unwrap();
    let config = ClientConfig::from_page_url(&page).unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let session = tokio::time::timeout(
        Duration::from_secs(10),
        run(config, MemoryDisplay::new(), ChannelNotifier(tx), async move {
            let _ = rx.recv().await;
        }),
    )
    .await
    .expect("session did not raise a notification in time");

    assert_eq!(session.notifications().raised(), 1);
    assert_eq!(session.registry().len(), 1);

    let entry = session.registry().get("h1").unwrap();
    assert_eq!(entry.last_status, Some(Status::Okay));

    let view = session.display().view_for("h1").unwrap();
    assert_eq!(view.status, Some(Status::Okay));
    assert_eq!(view.status_code.as_deref(), Some("200"));

    assert_eq!(session.connection().state(), ConnectionState::Disconnected);
    assert_eq!(session.scheduler().active(), 0);

    drop(session);
    let _ = tokio::time::timeout(Duration::from_secs(5), server).await;
}
