//! Kubecost client integration tests against a mock HTTP server

use chrono::{TimeZone, Utc};
use cost_lib::{BatchWindow, CostSource, ExtractError, KubecostClient};
use mockito::Matcher;
use serde_json::json;

const JOB_RUN_AGGREGATE: &str = "pod,label:emr-containers.amazonaws.com/job.id,label:emr-containers.amazonaws.com/virtual-cluster-id";

fn window() -> BatchWindow {
    BatchWindow::new(
        Utc.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).unwrap(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_allocation_query_parameters() {
    let mut server = mockito::Server::new_async().await;
    let body = json!({
        "code": 200,
        "data": [{
            "driver/job1/vc1": {
                "name": "driver/job1/vc1",
                "properties": {"providerID": "i-123", "labels": {"spark_role": "driver"}},
                "totalCost": 0.25
            },
            "__idle__": {"name": "__idle__", "properties": {}}
        }]
    });

    let mock = server
        .mock("GET", "/model/allocation/compute")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded(
                "window".into(),
                "2024-03-05T08:00:00Z,2024-03-05T09:00:00Z".into(),
            ),
            Matcher::UrlEncoded("aggregate".into(), JOB_RUN_AGGREGATE.into()),
            Matcher::UrlEncoded("accumulate".into(), "false".into()),
            Matcher::UrlEncoded("step".into(), "1h".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await;

    let client = KubecostClient::with_endpoint(server.url()).unwrap();
    let buckets = client
        .allocations(&window(), JOB_RUN_AGGREGATE, "1h")
        .await
        .unwrap()
        .expect("allocation buckets");

    mock.assert_async().await;
    assert_eq!(buckets.len(), 1);

    let record = &buckets[0]["driver/job1/vc1"];
    assert_eq!(record.properties.provider_id.as_deref(), Some("i-123"));
    assert_eq!(record.properties.label("spark_role"), Some("driver"));
    assert_eq!(record.metrics.total_cost, Some(0.25));
}

#[tokio::test]
async fn test_assets_query_parameters() {
    let mut server = mockito::Server::new_async().await;
    let body = json!({
        "code": 200,
        "data": [{
            "cluster/node-1": {
                "type": "Node",
                "properties": {"category": "Compute", "providerID": "i-123"},
                "nodeType": "m5.xlarge",
                "labels": {"label_karpenter_sh_capacity_type": "spot"}
            }
        }]
    });

    let mock = server
        .mock("GET", "/model/assets")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded(
                "window".into(),
                "2024-03-05T08:00:00Z,2024-03-05T09:00:00Z".into(),
            ),
            Matcher::UrlEncoded("filterCategories".into(), "compute".into()),
            Matcher::UrlEncoded("filterTypes".into(), "Node".into()),
        ]))
        .with_status(200)
        .with_body(body.to_string())
        .create_async()
        .await;

    let client = KubecostClient::with_endpoint(server.url()).unwrap();
    let buckets = client.assets(&window()).await.unwrap().expect("asset buckets");

    mock.assert_async().await;
    let node = &buckets[0]["cluster/node-1"];
    assert_eq!(node.node_type.as_deref(), Some("m5.xlarge"));
    assert_eq!(
        node.label_any(&["label_karpenter_sh_capacity_type"]),
        Some("spot")
    );
}

#[tokio::test]
async fn test_empty_or_null_data_is_none() {
    let mut server = mockito::Server::new_async().await;
    let _null = server
        .mock("GET", "/model/assets")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"code": 200, "data": null}"#)
        .create_async()
        .await;
    let _empty = server
        .mock("GET", "/model/allocation/compute")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"code": 200, "data": [null, {}]}"#)
        .create_async()
        .await;

    let client = KubecostClient::with_endpoint(server.url()).unwrap();

    assert!(client.assets(&window()).await.unwrap().is_none());
    assert!(client
        .allocations(&window(), JOB_RUN_AGGREGATE, "1h")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_error_status_is_api_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/model/assets")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;

    let client = KubecostClient::with_endpoint(server.url()).unwrap();
    let err = client.assets(&window()).await.unwrap_err();

    match err {
        ExtractError::Api { status, body, .. } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/model/assets")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<html>not json</html>")
        .create_async()
        .await;

    let client = KubecostClient::with_endpoint(server.url()).unwrap();
    let err = client.assets(&window()).await.unwrap_err();

    assert!(matches!(err, ExtractError::Decode { .. }));
}

#[tokio::test]
async fn test_unreachable_endpoint() {
    // Nothing listens on port 1
    let client = KubecostClient::with_endpoint("http://127.0.0.1:1").unwrap();
    let err = client.assets(&window()).await.unwrap_err();

    assert!(matches!(err, ExtractError::Unreachable { .. }));
}
