//! Integration tests for the search pipeline.
//!
//! These tests verify the full probe/distribute/fetch/assemble flow with
//! mock index nodes.

use std::time::{Duration, Instant};

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fedsearch::search::{DocType, FetchEngine, PreparedRequest, RequestSpec, index_to_url};
use fedsearch::{Options, Query, SearchConfig, SearchParams, Selection, Session};

fn config(max_concurrent: usize) -> SearchConfig {
    SearchConfig {
        max_concurrent,
        ..SearchConfig::default()
    }
}

fn project_query(project: &str) -> Query {
    let mut selection = Selection::new();
    selection
        .set("project", vec![project])
        .expect("valid facet");
    Query::new(selection, Options::new())
}

fn solr_page(docs: Vec<serde_json::Value>) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_json(json!({ "response": { "numFound": docs.len(), "docs": docs } }))
}

fn solr_count(num_found: usize) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_json(json!({ "response": { "numFound": num_found, "docs": [] } }))
}

fn file_doc(id: &str) -> serde_json::Value {
    json!({
        "instance_id": id,
        "url": [format!("https://data.example/{id}|application/netcdf|HTTPServer")],
        "data_node": "data.example",
        "size": 1000
    })
}

#[tokio::test]
async fn test_hits_returns_counts_in_query_order() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esg-search/search"))
        .and(query_param("limit", "0"))
        .and(query_param("query", "project:CMIP6"))
        .respond_with(solr_count(7))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/esg-search/search"))
        .and(query_param("limit", "0"))
        .and(query_param("query", "project:CMIP5"))
        .respond_with(solr_count(11))
        .mount(&server)
        .await;

    let session = Session::new(config(5));
    let queries = vec![project_query("CMIP6"), project_query("CMIP5")];
    let hits = session
        .hits(&queries, DocType::File, Some(server.uri().as_str()))
        .await
        .expect("hits should succeed");

    // Outcomes arrive in completion order but counts map back to queries.
    assert_eq!(hits, vec![7, 11]);
}

#[tokio::test]
async fn test_failed_probe_substitutes_zero() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esg-search/search"))
        .and(query_param("query", "project:CMIP6"))
        .respond_with(solr_count(7))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/esg-search/search"))
        .and(query_param("query", "project:CMIP5"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let session = Session::new(config(5));
    let queries = vec![project_query("CMIP6"), project_query("CMIP5")];
    let hits = session
        .hits(&queries, DocType::File, Some(server.uri().as_str()))
        .await
        .expect("probe failures never fail the batch");

    assert_eq!(hits, vec![7, 0]);
}

#[tokio::test]
async fn test_search_files_end_to_end() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esg-search/search"))
        .and(query_param("limit", "0"))
        .respond_with(solr_count(3))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/esg-search/search"))
        .and(query_param("limit", "3"))
        .respond_with(solr_page(vec![
            file_doc("a.nc"),
            file_doc("b.nc"),
            file_doc("c.nc"),
        ]))
        .mount(&server)
        .await;

    let session = Session::new(config(5));
    let queries = vec![project_query("CMIP6")];
    let params = SearchParams {
        index_node: Some(server.uri()),
        ..SearchParams::default()
    };
    let results = session
        .search_files(&queries, &params)
        .await
        .expect("search should succeed");

    assert!(results.is_complete());
    assert_eq!(results.request_count, 1);
    assert_eq!(results.records.len(), 3);
    assert_eq!(results.stats.assembled, 3);
    let ids: Vec<&str> = results
        .records
        .iter()
        .map(|record| record.file_id.as_str())
        .collect();
    assert!(ids.contains(&"a.nc"));
    assert_eq!(results.records[0].url, "https://data.example/a.nc");
}

#[tokio::test]
async fn test_partial_failure_keeps_successful_pages() {
    let server = MockServer::start().await;

    // 120 hits with the default page size of 50 paginate into offsets
    // 0, 50 and 100. The middle page fails.
    Mock::given(method("GET"))
        .and(path("/esg-search/search"))
        .and(query_param("offset", "0"))
        .respond_with(solr_page(vec![file_doc("a.nc")]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/esg-search/search"))
        .and(query_param("offset", "50"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/esg-search/search"))
        .and(query_param("offset", "100"))
        .respond_with(solr_page(vec![file_doc("b.nc")]))
        .mount(&server)
        .await;

    let session = Session::new(config(5));
    let queries = vec![project_query("CMIP6")];
    let params = SearchParams {
        hits: Some(vec![120]),
        max_total: None,
        index_node: Some(server.uri()),
        ..SearchParams::default()
    };
    let results = session
        .search_files(&queries, &params)
        .await
        .expect("batch errors are captured, not propagated");

    assert_eq!(results.request_count, 3);
    assert_eq!(results.records.len(), 2);
    assert_eq!(results.failures.len(), 1);
    assert!(!results.is_complete());

    // Strict view surfaces every captured error at once.
    let error = results.into_result().expect_err("partial batch");
    assert_eq!(error.to_string(), "1 of 3 search requests failed");
}

#[tokio::test]
async fn test_dangerous_facet_guard_fires_before_any_request() {
    let server = MockServer::start().await;

    let session = Session::new(config(5));
    let queries = vec![project_query("CMIP6")];
    let facets = vec!["dataset_id".to_string()];
    let result = session
        .hints(&queries, &facets, DocType::File, Some(server.uri().as_str()))
        .await;
    assert!(result.is_err());

    // A wildcard projection combined with distributed search is equally
    // rejected up front.
    let mut selection = Selection::new();
    selection.set("project", vec!["CMIP6"]).expect("valid facet");
    let mut options = Options::new();
    options
        .set("distrib", fedsearch::query::OptionValue::True)
        .expect("known option");
    let distrib_queries = vec![Query::new(selection, options)];
    let wildcard = vec!["*".to_string()];
    let result = session
        .hints(
            &distrib_queries,
            &wildcard,
            DocType::File,
            Some(server.uri().as_str()),
        )
        .await;
    assert!(result.is_err());

    let received = server
        .received_requests()
        .await
        .expect("request recording enabled");
    assert!(received.is_empty(), "guard must fire before any I/O");
}

#[tokio::test]
async fn test_hints_parses_facet_counts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esg-search/search"))
        .and(query_param("facets", "variable_id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": { "numFound": 42, "docs": [] },
            "facet_counts": {
                "facet_fields": {
                    "variable_id": ["tas", 30, "pr", 12]
                }
            }
        })))
        .mount(&server)
        .await;

    let session = Session::new(config(5));
    let queries = vec![project_query("CMIP6")];
    let facets = vec!["variable_id".to_string()];
    let hints = session
        .hints(&queries, &facets, DocType::File, Some(server.uri().as_str()))
        .await
        .expect("hints should succeed");

    assert_eq!(hints.len(), 1);
    assert_eq!(hints[0]["variable_id"]["tas"], 30);
    assert_eq!(hints[0]["variable_id"]["pr"], 12);
}

#[tokio::test]
async fn test_per_host_limiter_serializes_requests() {
    let server = MockServer::start().await;
    let delay = Duration::from_millis(100);

    Mock::given(method("GET"))
        .and(path("/esg-search/search"))
        .respond_with(solr_count(0).set_delay(delay))
        .mount(&server)
        .await;

    let endpoint = index_to_url(&server.uri()).expect("mock uri parses");
    let query = project_query("CMIP6");
    let requests: Vec<PreparedRequest> = (0..3)
        .map(|i| {
            RequestSpec::count(&query, i, DocType::File)
                .build(&endpoint)
                .expect("request builds")
        })
        .collect();

    let engine = FetchEngine::new(&config(1));
    let start = Instant::now();
    let outcomes = engine.fetch(requests).await;
    let elapsed = start.elapsed();

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(fedsearch::Outcome::success));
    // A limiter of one forces the three delayed responses to run back to
    // back rather than in parallel.
    assert!(
        elapsed >= delay * 3,
        "requests overlapped under a limiter of one: {elapsed:?}"
    );
}

#[tokio::test]
async fn test_batch_failure_does_not_cancel_siblings() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esg-search/search"))
        .and(query_param("query", "project:CMIP6"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/esg-search/search"))
        .and(query_param("query", "project:CMIP5"))
        .respond_with(solr_count(1).set_delay(Duration::from_millis(50)))
        .mount(&server)
        .await;

    let endpoint = index_to_url(&server.uri()).expect("mock uri parses");
    let fast_failure = project_query("CMIP6");
    let slow_success = project_query("CMIP5");
    let requests = vec![
        RequestSpec::count(&fast_failure, 0, DocType::File)
            .build(&endpoint)
            .expect("request builds"),
        RequestSpec::count(&slow_success, 1, DocType::File)
            .build(&endpoint)
            .expect("request builds"),
    ];

    let engine = FetchEngine::new(&config(5));
    let outcomes = engine.fetch(requests).await;

    assert_eq!(outcomes.len(), 2);
    let successes = outcomes.iter().filter(|outcome| outcome.success()).count();
    assert_eq!(successes, 1, "the slow sibling must still complete");
}
