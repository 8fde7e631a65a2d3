//! Normalization and detail parsing throughput
//!
//! A national feed carries a few thousand stations; detail pages are parsed
//! once per product, so both sit on the hot path of a full run.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use petro_ingest_lib::application::normalize;
use petro_ingest_lib::domain::{FeedRecord, TimestampPolicy};
use petro_ingest_lib::infrastructure::ProductDetailParser;
use petro_ingest_lib::infrastructure::parsing::DetailParseContext;
use serde_json::{Value, json};

fn feed(stations: usize) -> FeedRecord {
    let stations: Vec<Value> = (0..stations)
        .map(|i| {
            json!({
                "site_id": format!("site-{}", i),
                "brand": "BENCH",
                "address": format!("{} High Street", i),
                "postcode": "AB1 2CD",
                "location": { "latitude": 51.0 + i as f64 * 1e-4, "longitude": -1.0 },
                "prices": { "B7": 151.9, "E5": 159.9, "E10": 144.9 }
            })
        })
        .collect();
    FeedRecord::new("Bench Fuels", json!({ "last_updated": "01/06/2024 10:00:00", "stations": stations }))
}

fn normalization(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");
    for size in [100, 1_000, 5_000] {
        let record = feed(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &record, |b, record| {
            b.iter(|| normalize(black_box(record), TimestampPolicy::Auto));
        });
    }
    group.finish();
}

const DETAIL_PAGE: &str = r#"
<html><body>
  <div data-auto-id="pdpBreadcrumb">
    <a class="breadcrumb__link" href="/cat/dairy">Dairy</a>
    <a class="breadcrumb__link" href="/dept/milk">Milk</a>
  </div>
  <h1 class="pdp-main-details__title">Semi Skimmed Milk 4 Pints</h1>
  <strong class="co-product__price pdp-main-details__price">£1.45</strong>
  <span class="co-product__was-price">was £1.65</span>
  <span class="co-product__price-per-uom">(63.8p/litre)</span>
  <div class="pdp-description-reviews__product-details-cntr">
    <div class="pdp-description-reviews__product-details-title">Storage</div>
    <div class="pdp-description-reviews__product-details-content">Keep refrigerated</div>
  </div>
</body></html>
"#;

fn detail_parsing(c: &mut Criterion) {
    let parser = ProductDetailParser::new().expect("default selectors compile");
    let context = DetailParseContext::new("https://groceries.example/product/1");

    c.bench_function("parse_detail_page", |b| {
        b.iter(|| parser.parse_document(black_box(DETAIL_PAGE), &context));
    });
}

criterion_group!(benches, normalization, detail_parsing);
criterion_main!(benches);
