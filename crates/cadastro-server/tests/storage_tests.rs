//! S3 gateway tests
//!
//! Run [`Storage`] against a `wiremock` server speaking just enough of the S3
//! REST API (path-style addressing) to cover listing, reads and error mapping.

use cadastro_common::IngestError;
use cadastro_server::storage::{config::StorageConfig, ObjectStore, Storage};
use wiremock::{
    matchers::{method, path, query_param, query_param_is_missing},
    Mock, MockServer, ResponseTemplate,
};

const BUCKET: &str = "cadastro";

async fn storage(server: &MockServer) -> Storage {
    let config = StorageConfig {
        endpoint: Some(server.uri()),
        region: "us-east-1".to_string(),
        bucket: BUCKET.to_string(),
        prefix: None,
        access_key: Some("test-access".to_string()),
        secret_key: Some("test-secret".to_string()),
        path_style: true,
    };
    Storage::new(config).await.unwrap()
}

fn list_response(keys: &[&str], next_token: Option<&str>) -> ResponseTemplate {
    let contents: String = keys
        .iter()
        .map(|key| {
            format!(
                "<Contents><Key>{}</Key><LastModified>2024-01-01T00:00:00.000Z</LastModified>\
                 <ETag>&quot;d41d8cd98f00b204e9800998ecf8427e&quot;</ETag><Size>32</Size>\
                 <StorageClass>STANDARD</StorageClass></Contents>",
                key
            )
        })
        .collect();

    let truncation = match next_token {
        Some(token) => format!(
            "<IsTruncated>true</IsTruncated><NextContinuationToken>{}</NextContinuationToken>",
            token
        ),
        None => "<IsTruncated>false</IsTruncated>".to_string(),
    };

    let body = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <ListBucketResult xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
         <Name>{}</Name><Prefix></Prefix><KeyCount>{}</KeyCount><MaxKeys>1000</MaxKeys>{}{}\
         </ListBucketResult>",
        BUCKET,
        keys.len(),
        truncation,
        contents
    );

    ResponseTemplate::new(200)
        .insert_header("content-type", "application/xml")
        .set_body_string(body)
}

fn error_response(status: u16, code: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status)
        .insert_header("content-type", "application/xml")
        .set_body_string(format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <Error><Code>{}</Code><Message>{}</Message><RequestId>test</RequestId></Error>",
            code, message
        ))
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_list_objects() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{}", BUCKET)))
        .and(query_param("list-type", "2"))
        .respond_with(list_response(&["a_pessoas.csv", "readme.txt"], None))
        .mount(&server)
        .await;

    let keys = storage(&server).await.list_objects().await.unwrap();

    assert_eq!(keys, vec!["a_pessoas.csv", "readme.txt"]);
}

#[tokio::test]
async fn test_list_objects_follows_continuation_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{}", BUCKET)))
        .and(query_param("continuation-token", "page-2"))
        .respond_with(list_response(&["c_pessoas.csv"], None))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/{}", BUCKET)))
        .and(query_param_is_missing("continuation-token"))
        .respond_with(list_response(&["a_pessoas.csv", "b_pessoas.csv"], Some("page-2")))
        .expect(1)
        .mount(&server)
        .await;

    let keys = storage(&server).await.list_objects().await.unwrap();

    assert_eq!(keys, vec!["a_pessoas.csv", "b_pessoas.csv", "c_pessoas.csv"]);
}

#[tokio::test]
async fn test_list_objects_access_denied_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{}", BUCKET)))
        .respond_with(error_response(403, "AccessDenied", "Access Denied"))
        .mount(&server)
        .await;

    let err = storage(&server).await.list_objects().await.unwrap_err();

    assert!(matches!(err, IngestError::StoreUnavailable(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_list_objects_throttled_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{}", BUCKET)))
        .respond_with(error_response(503, "SlowDown", "Please reduce your request rate."))
        .expect(1)
        .mount(&server)
        .await;

    let err = storage(&server).await.list_objects().await.unwrap_err();

    assert!(matches!(err, IngestError::StoreUnavailable(_)), "got {:?}", err);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

// ============================================================================
// Reads
// ============================================================================

#[tokio::test]
async fn test_read_object() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{}/cad/pessoas.csv", BUCKET)))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/csv")
                .set_body_string("nome,idade,cidade\nAna,30,São Paulo\n"),
        )
        .mount(&server)
        .await;

    let content = storage(&server).await.read_object("cad/pessoas.csv").await.unwrap();

    assert_eq!(content, "nome,idade,cidade\nAna,30,São Paulo\n");
}

#[tokio::test]
async fn test_read_missing_object() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{}/missing.csv", BUCKET)))
        .respond_with(error_response(404, "NoSuchKey", "The specified key does not exist."))
        .mount(&server)
        .await;

    let err = storage(&server).await.read_object("missing.csv").await.unwrap_err();

    match err {
        IngestError::ObjectNotFound(location) => {
            assert_eq!(location, "s3://cadastro/missing.csv");
        },
        other => panic!("expected ObjectNotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_read_invalid_utf8_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{}/latin1.csv", BUCKET)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x6e, 0x6f, 0x6d, 0xe9, 0xff]))
        .mount(&server)
        .await;

    let err = storage(&server).await.read_object("latin1.csv").await.unwrap_err();

    assert!(matches!(err, IngestError::MalformedInput(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_read_throttled_is_one_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{}/x.csv", BUCKET)))
        .respond_with(error_response(503, "SlowDown", "Please reduce your request rate."))
        .expect(1)
        .mount(&server)
        .await;

    let err = storage(&server).await.read_object("x.csv").await.unwrap_err();

    assert!(matches!(err, IngestError::StoreUnavailable(_)), "got {:?}", err);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
