//! Integration test: reference dataset retrieval and fallback

use std::time::Duration;

use axum::{routing::get, Router};
use wisconsin_ensemble::data::{DataSource, DatasetProvider, DatasetStatistics, SyntheticGenerator};

fn wdbc_rows(n: usize) -> String {
    (0..n)
        .map(|i| {
            let malignant = i % 3 == 0;
            let base = if malignant { 18.0 } else { 12.0 } + (i % 7) as f64 * 0.1;
            let values: Vec<String> = (0..30).map(|j| format!("{:.4}", base * (1.0 + j as f64 * 0.01))).collect();
            format!("{},{},{}", 900000 + i, if malignant { "M" } else { "B" }, values.join(","))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Serve fixed bodies on an ephemeral port; returns the base URL
async fn serve(valid: String) -> String {
    let app = Router::new()
        .route("/wdbc.data", get(move || async move { valid }))
        .route("/garbage.data", get(|| async { "this,is\nnot,the,dataset" }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn provider(url: String) -> DatasetProvider {
    DatasetProvider::new()
        .with_url(url)
        .with_timeout(Duration::from_secs(5))
        .with_fallback(SyntheticGenerator::default().with_samples(60))
}

#[tokio::test]
async fn test_fetch_parses_served_dataset() {
    let base = serve(wdbc_rows(30)).await;
    let set = provider(format!("{}/wdbc.data", base)).fetch().await.unwrap();

    assert_eq!(set.source, DataSource::Remote);
    assert_eq!(set.n_samples(), 30);
    assert_eq!(set.n_features(), 30);
    assert_eq!(set.class_counts(), (20, 10));

    let stats = DatasetStatistics::compute(&set);
    assert_eq!(stats.total_samples, 30);
    assert_eq!(stats.malignant_samples, 10);
}

#[tokio::test]
async fn test_malformed_body_falls_back() {
    let base = serve(wdbc_rows(5)).await;
    let set = provider(format!("{}/garbage.data", base)).fetch().await.unwrap();
    assert_eq!(set.source, DataSource::Synthetic);
    assert_eq!(set.n_samples(), 60);
}

#[tokio::test]
async fn test_http_error_falls_back() {
    let base = serve(wdbc_rows(5)).await;
    let set = provider(format!("{}/missing.data", base)).fetch().await.unwrap();
    assert_eq!(set.source, DataSource::Synthetic);
}

#[tokio::test]
async fn test_unreachable_host_falls_back() {
    let set = provider("http://127.0.0.1:9/wdbc.data".to_string()).fetch().await.unwrap();
    assert_eq!(set.source, DataSource::Synthetic);
}
