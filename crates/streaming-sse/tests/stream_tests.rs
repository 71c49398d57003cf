use crate::ai_sdk_streaming_sse::stream::RecordStreamExt;
use bytes::Bytes;
use futures_util::stream;
use futures_util::StreamExt;

#[tokio::test]
async fn test_stream_adapter() {
    let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
        Ok(Bytes::from("id: 1\ndata: hello")),
        Ok(Bytes::from(" world\n\n")),
        Ok(Bytes::from("id: 2\ndata: second record\n\n")),
    ];

    let mut records = stream::iter(chunks).into_record_stream();

    let first = records.next().await.unwrap().unwrap();
    assert_eq!(first.id, Some(1));
    assert_eq!(first.data.as_deref(), Some("hello world"));

    let second = records.next().await.unwrap().unwrap();
    assert_eq!(second.data.as_deref(), Some("second record"));

    assert!(records.next().await.is_none());
}

#[tokio::test]
async fn test_stream_with_errors() {
    let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
        Ok(Bytes::from("data: event1\n\n")),
        Err(std::io::Error::new(std::io::ErrorKind::Other, "network error")),
        Ok(Bytes::from("data: event2\n\n")),
    ];

    let mut records = stream::iter(chunks).into_record_stream();

    assert_eq!(
        records.next().await.unwrap().unwrap().data.as_deref(),
        Some("event1")
    );
    assert!(records.next().await.unwrap().is_err());
    assert_eq!(
        records.next().await.unwrap().unwrap().data.as_deref(),
        Some("event2")
    );
    assert!(records.next().await.is_none());
}

#[tokio::test]
async fn flushes_record_missing_final_blank_line() {
    let chunks: Vec<Result<Bytes, std::io::Error>> =
        vec![Ok(Bytes::from("event: close\ndata: {}\n"))];
    let collected: Vec<_> = stream::iter(chunks).into_record_stream().collect().await;
    assert_eq!(collected.len(), 1);
    let record = collected.into_iter().next().unwrap().unwrap();
    assert_eq!(record.event.as_deref(), Some("close"));
}
