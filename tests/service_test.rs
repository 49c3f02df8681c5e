use sentiflow::service::{self, AppState};
use sentiflow::{Classifier, ClientError, NormalizeOptions, Record, SentimentClient};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

fn classifier() -> Classifier {
    let options = NormalizeOptions::standard();
    let records = [
        ("positive", "A wonderful, moving film!"),
        ("positive", "Great acting and a great story."),
        ("positive", "Loved it, truly excellent."),
        ("negative", "Awful. A total waste of time."),
        ("negative", "Boring plot and terrible acting."),
        ("negative", "I hated every minute."),
    ]
    .into_iter()
    .map(|(label, text)| Record::new(options.normalize(text), label));

    Classifier::builder()
        .with_normalization(options)
        .add_records(records)
        .unwrap()
        .build()
        .unwrap()
}

async fn start() -> (SocketAddr, oneshot::Sender<()>, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState::new(classifier(), NormalizeOptions::standard(), 200);
    let (tx, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        service::run(listener, state, async {
            let _ = rx.await;
        })
        .await
        .unwrap();
    });
    (addr, tx, handle)
}

#[tokio::test]
async fn test_health_and_classify_round_trip() {
    let (addr, shutdown, handle) = start().await;
    let client = SentimentClient::new(format!("http://{}", addr)).unwrap();

    let health = client.health().await.unwrap();
    assert_eq!(health.status, "ok");

    let response = client.classify("What a GREAT, wonderful film!!").await.unwrap();
    assert_eq!(response.label, "positive");
    assert!(response.confidence > 0.5 && response.confidence <= 1.0);
    assert_eq!(response.scores.len(), 2);

    let response = client.classify("terrible, boring, awful").await.unwrap();
    assert_eq!(response.label, "negative");

    shutdown.send(()).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_invalid_text_is_validation_error() {
    let (addr, shutdown, handle) = start().await;
    let client = SentimentClient::new(format!("http://{}", addr)).unwrap();

    for text in ["", "   ", "?!..."] {
        let err = client.classify(text).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)), "{:?}", err);
    }
    let too_long = "good ".repeat(100);
    assert!(matches!(
        client.classify(&too_long).await,
        Err(ClientError::Validation(_))
    ));

    // the service keeps answering after rejecting requests
    assert!(client.classify("great film").await.is_ok());

    shutdown.send(()).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_stopped_service_is_unavailable() {
    let (addr, shutdown, handle) = start().await;
    shutdown.send(()).unwrap();
    handle.await.unwrap();

    let client =
        SentimentClient::with_timeout(format!("http://{}", addr), Duration::from_secs(2)).unwrap();
    let err = client.classify("great film").await.unwrap_err();
    assert!(
        matches!(err, ClientError::ServiceUnavailable { .. }),
        "{:?}",
        err
    );
}

#[tokio::test]
async fn test_concurrent_requests_are_independent() {
    let (addr, shutdown, handle) = start().await;
    let client = SentimentClient::new(format!("http://{}", addr)).unwrap();

    let mut tasks = Vec::new();
    for i in 0..16 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            if i % 2 == 0 {
                client.classify("loved it, excellent").await.map(|r| r.label)
            } else {
                client.classify("").await.map(|r| r.label)
            }
        }));
    }
    for (i, task) in tasks.into_iter().enumerate() {
        let result = task.await.unwrap();
        if i % 2 == 0 {
            assert_eq!(result.unwrap(), "positive");
        } else {
            assert!(matches!(result, Err(ClientError::Validation(_))));
        }
    }

    shutdown.send(()).unwrap();
    handle.await.unwrap();
}
