//! End-to-end crawl runs against the mock fetcher.
//!
//! Each test wires a `CrawlScheduler` to canned pages and checks the
//! run-level guarantees: nothing fetched twice, unique results, the URL
//! budget, cancellation, and the pagination/retention/enrichment behaviour
//! seen from outside.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use listing_crawler::{
    testing::{MockFetcher, MockFetcherBuilder},
    CanonicalUrl, CrawlBudget, CrawlConfig, CrawlScheduler, FetchSettings, FetcherExt,
    RecordKind, RetentionPolicy, RetryPolicy, Seed,
};

/// A listing card in the common Drupal `views-row` markup.
fn card(href: &str, title: &str) -> String {
    format!(r#"<div class="views-row"><h3><a href="{href}">{title}</a></h3></div>"#)
}

fn listing_page(cards: &[String], next: Option<&str>) -> String {
    let next = next
        .map(|href| format!(r#"<ul class="pager"><li class="pager-next"><a href="{href}">Siguiente</a></li></ul>"#))
        .unwrap_or_default();
    format!(
        "<html><body><div class=\"view-content\">{}</div>{}</body></html>",
        cards.join(""),
        next
    )
}

/// Defaults with politeness delays off and undated records kept.
fn test_config(seeds: &[&str]) -> CrawlConfig {
    let mut config = CrawlConfig::for_urls(seeds.iter().copied())
        .with_fetch(FetchSettings::default().without_delay())
        .with_retention(RetentionPolicy::new(2019, true));
    config.pagination.parameter_increment = false;
    config
}

fn assert_fetched_at_most_once(mock: &MockFetcher) {
    let mut counts: HashMap<CanonicalUrl, usize> = HashMap::new();
    for url in mock.calls() {
        *counts.entry(CanonicalUrl::parse(&url)).or_default() += 1;
    }
    for (url, count) in counts {
        assert_eq!(count, 1, "{url} fetched {count} times");
    }
}

#[tokio::test]
async fn test_spanish_listing_end_to_end() {
    let config = CrawlConfig::from_json_str(
        r#"{
            "seeds": [{"url": "https://clasificados.example.com/buscar?q=finca", "location": "Antioquia"}],
            "retention": {"min_year": 2020, "keep_undated": false},
            "fetch": {"min_delay_ms": 0, "max_delay_ms": 0},
            "extractor": {
                "categories": {"fincas": ["finca", "hacienda"], "lotes": ["lote"]},
                "locations": {"Rionegro": ["rionegro"]}
            },
            "pagination": {"parameter_increment": false}
        }"#,
    )
    .unwrap();

    let first = r#"<html><body>
        <div class="search-result">
            <h3><a href="/anuncio/1">Finca en Rionegro</a></h3>
            <p class="summary">Hermosa finca con vista</p>
            <span class="date">12 de julio de 2021</span>
        </div>
        <div class="search-result">
            <h3><a href="/anuncio/2?utm=x#foto">Lote campestre</a></h3>
            <span class="date">03/02/2018</span>
        </div>
        <div class="search-result">
            <h3><a href="/anuncio/3">Apartamento</a></h3>
        </div>
        <ul class="pager"><li class="pager-next"><a href="/buscar?q=finca&amp;page=1">Siguiente ›</a></li></ul>
    </body></html>"#;
    let second = r#"<html><body>
        <div class="search-result">
            <h3><a href="/anuncio/4">Hacienda cafetera</a></h3>
            <time datetime="2022-01-05">5 de enero de 2022</time>
        </div>
    </body></html>"#;

    let mock = MockFetcher::new()
        .with_page("https://clasificados.example.com/buscar?q=finca", first)
        .with_page("https://clasificados.example.com/buscar?q=finca&page=1", second);

    let outcome = CrawlScheduler::new(mock.clone(), config)
        .unwrap()
        .run()
        .await;

    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.summary.records_rejected, 2);
    assert_eq!(outcome.summary.pages_fetched, 2);

    let finca = &outcome.records[0];
    assert_eq!(finca.link.as_str(), "https://clasificados.example.com/anuncio/1");
    assert_eq!(finca.category, "fincas");
    assert_eq!(finca.location, "Rionegro");
    assert_eq!(finca.description, "Hermosa finca con vista");
    assert_eq!(finca.published_raw.as_deref(), Some("12 de julio de 2021"));
    assert_eq!(finca.published, NaiveDate::from_ymd_opt(2021, 7, 12));

    let hacienda = &outcome.records[1];
    assert_eq!(hacienda.category, "fincas");
    // Falls back to the seed's location.
    assert_eq!(hacienda.location, "Antioquia");
    assert_eq!(hacienda.published, NaiveDate::from_ymd_opt(2022, 1, 5));

    let report = outcome.report();
    assert_eq!(report.by_category.get("fincas"), Some(&2));
}

#[tokio::test]
async fn test_overlapping_listings_fetch_each_url_once() {
    // Both listings paginate into the same shared page and repeat a card.
    let mock = MockFetcher::new()
        .with_page(
            "https://x.com/a",
            listing_page(&[card("/item/1", "Uno"), card("/item/2", "Dos")], Some("/shared")),
        )
        .with_page(
            "https://x.com/b",
            listing_page(&[card("/item/2/", "Dos otra vez"), card("/item/3", "Tres")], Some("/shared")),
        )
        .with_page(
            "https://x.com/shared",
            listing_page(&[card("/item/4", "Cuatro")], Some("/a")),
        );

    let config = test_config(&["https://x.com/a", "https://x.com/b", "https://x.com/a/"])
        .with_enrich_details(true);
    let outcome = CrawlScheduler::new(mock.clone(), config)
        .unwrap()
        .run()
        .await;

    assert_fetched_at_most_once(&mock);
    assert_eq!(mock.fetch_count("https://x.com/shared"), 1);

    let mut links: Vec<_> = outcome.records.iter().map(|r| r.link.as_str()).collect();
    links.sort();
    assert_eq!(
        links,
        vec![
            "https://x.com/item/1",
            "https://x.com/item/2",
            "https://x.com/item/3",
            "https://x.com/item/4",
        ]
    );
}

#[tokio::test]
async fn test_max_urls_bounds_the_run() {
    let mut builder = MockFetcherBuilder::new();
    for page in 0..10 {
        let next = format!("/list?p={}", page + 1);
        builder = builder.page(
            &format!("https://x.com/list?p={page}"),
            &listing_page(&[card(&format!("/item/{page}"), "Item")], Some(&next)),
        );
    }
    let mock = builder.build();

    let config = test_config(&["https://x.com/list?p=0"]).with_budget(CrawlBudget {
        max_urls: 3,
        ..CrawlBudget::default()
    });
    let outcome = CrawlScheduler::new(mock.clone(), config)
        .unwrap()
        .run()
        .await;

    assert_eq!(outcome.summary.urls_enqueued, 3);
    assert!(outcome.summary.budget_exhausted);
    assert_eq!(mock.call_count(), 3);
    assert_eq!(outcome.records.len(), 3);
}

#[tokio::test]
async fn test_cancellation_returns_partial_result() {
    let token = CancellationToken::new();
    let mock = MockFetcher::new()
        .with_page("https://x.com/p1", listing_page(&[card("/r/1", "Uno")], Some("/p2")))
        .with_page("https://x.com/p2", listing_page(&[card("/r/2", "Dos")], Some("/p3")))
        .with_page("https://x.com/p3", listing_page(&[card("/r/3", "Tres")], Some("/p4")))
        .with_page("https://x.com/p4", listing_page(&[card("/r/4", "Cuatro")], None))
        .cancel_after(2, token.clone());

    let scheduler = CrawlScheduler::new(mock.clone(), test_config(&["https://x.com/p1"])).unwrap();
    let outcome = scheduler.run_with_cancel(token).await;

    assert!(outcome.summary.cancelled);
    assert_eq!(mock.call_count(), 2);
    let links: Vec<_> = outcome.records.iter().map(|r| r.link.as_str()).collect();
    assert_eq!(links, vec!["https://x.com/r/1", "https://x.com/r/2"]);
}

#[tokio::test]
async fn test_cancellation_abandons_slow_fetch() {
    let token = CancellationToken::new();
    let mock = MockFetcher::new()
        .with_page("https://x.com/slow", listing_page(&[card("/r/1", "Uno")], None))
        .with_delay(Duration::from_secs(30));

    let scheduler = CrawlScheduler::new(mock, test_config(&["https://x.com/slow"])).unwrap();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let outcome = tokio::time::timeout(Duration::from_secs(5), scheduler.run_with_cancel(token))
        .await
        .expect("cancelled run should finish promptly");
    assert!(outcome.summary.cancelled);
    assert!(outcome.records.is_empty());
    assert_eq!(outcome.summary.failed_count(), 0);
}

#[tokio::test]
async fn test_all_seeds_failing_yields_empty_result() {
    let mock = MockFetcher::new()
        .with_permanent_failure("https://x.com/gone")
        .with_permanent_failure("https://y.com/gone");

    let outcome = CrawlScheduler::new(mock, test_config(&["https://x.com/gone", "https://y.com/gone"]))
        .unwrap()
        .run()
        .await;

    assert!(outcome.is_empty());
    assert_eq!(outcome.summary.failed_count(), 2);
    assert_eq!(outcome.summary.listings_completed, 2);
    assert!(!outcome.summary.cancelled);
}

#[tokio::test]
async fn test_dom_next_link_beats_parameter_increment() {
    let mut config = test_config(&["https://x.com/buscar"]);
    config.pagination.parameter_increment = true;

    let mock = MockFetcher::new()
        .with_page(
            "https://x.com/buscar",
            listing_page(&[card("/r/1", "Uno")], Some("/buscar/pagina-2")),
        )
        .with_page("https://x.com/buscar/pagina-2", listing_page(&[card("/r/2", "Dos")], None))
        .with_page("https://x.com/buscar?page=1", listing_page(&[card("/r/9", "Nueve")], None));

    let outcome = CrawlScheduler::new(mock.clone(), config)
        .unwrap()
        .run()
        .await;

    assert_eq!(mock.fetch_count("https://x.com/buscar/pagina-2"), 1);
    assert_eq!(mock.calls()[1], "https://x.com/buscar/pagina-2");
    assert!(outcome
        .records
        .iter()
        .any(|r| r.link.as_str() == "https://x.com/r/2"));
}

#[tokio::test]
async fn test_redirect_target_is_not_refetched() {
    let mock = MockFetcher::new()
        .with_redirect(
            "https://x.com/old",
            "https://x.com/new",
            listing_page(&[card("/r/1", "Uno")], None),
        )
        .with_page("https://x.com/new", listing_page(&[card("/r/1", "Uno")], None));

    let config = test_config(&["https://x.com/old", "https://x.com/new"]).with_concurrency(1);
    let outcome = CrawlScheduler::new(mock.clone(), config)
        .unwrap()
        .run()
        .await;

    assert_eq!(mock.call_count(), 1);
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.summary.listings_completed, 1);
}

#[tokio::test]
async fn test_enrichment_with_retention() {
    let mut config = test_config(&["https://x.com/s"]).with_enrich_details(true);
    config.retention = RetentionPolicy::new(2020, false);

    let mock = MockFetcher::new()
        .with_page(
            "https://x.com/s",
            listing_page(&[card("/casa", "Casa"), card("/vieja", "Vieja")], None),
        )
        .with_page(
            "https://x.com/casa",
            r#"<html><head>
                <meta name="description" content="Casa amplia con jardín">
                <meta property="og:image" content="/img/casa.jpg">
            </head><body><main>
                <h1>Casa en venta</h1>
                <p>Publicado el 3 de marzo de 2023. Precio negociable.</p>
            </main></body></html>"#,
        )
        .with_page(
            "https://x.com/vieja",
            r#"<html><body><article><h1>Casa vieja</h1><p>15/06/2017</p></article></body></html>"#,
        );

    let outcome = CrawlScheduler::new(mock.clone(), config)
        .unwrap()
        .run()
        .await;

    assert_eq!(outcome.records.len(), 1);
    let casa = &outcome.records[0];
    assert_eq!(casa.kind, RecordKind::DetailPage);
    assert_eq!(casa.title, "Casa en venta");
    assert_eq!(casa.description, "Casa amplia con jardín");
    assert_eq!(casa.image.as_deref(), Some("https://x.com/img/casa.jpg"));
    assert_eq!(casa.published, NaiveDate::from_ymd_opt(2023, 3, 3));
    assert_eq!(casa.price.as_deref(), Some("Precio negociable."));
    assert_eq!(outcome.summary.records_rejected, 1);
    assert_eq!(mock.fetch_count("https://x.com/vieja"), 1);
}

#[tokio::test]
async fn test_deep_mode_stays_on_seed_site() {
    let config = test_config(&["https://www.x.com/inicio"])
        .with_deep(true)
        .with_budget(CrawlBudget {
            max_depth: 2,
            ..CrawlBudget::default()
        });

    let mock = MockFetcher::new()
        .with_page(
            "https://www.x.com/inicio",
            r#"<html><body>
                <a href="/seccion">Sección</a>
                <a href="https://x.com/contacto">Contacto</a>
                <a href="https://otro.org/">Otro sitio</a>
                <a href="mailto:hola@x.com">Correo</a>
            </body></html>"#,
        )
        .with_page(
            "https://www.x.com/seccion",
            r#"<html><body><h1>Sección</h1><a href="/seccion/detalle">Detalle</a><a href="/inicio">Inicio</a></body></html>"#,
        )
        .with_page(
            "https://x.com/contacto",
            r#"<html><body><h1>Contacto</h1></body></html>"#,
        )
        .with_page(
            "https://www.x.com/seccion/detalle",
            r#"<html><body><h1>Detalle</h1><a href="/muy/profundo">Más</a></body></html>"#,
        );

    let outcome = CrawlScheduler::new(mock.clone(), config)
        .unwrap()
        .run()
        .await;

    assert_fetched_at_most_once(&mock);
    assert_eq!(mock.fetch_count("https://otro.org/"), 0);
    assert_eq!(mock.fetch_count("https://www.x.com/muy/profundo"), 0);

    let mut titles: Vec<_> = outcome.records.iter().map(|r| r.title.as_str()).collect();
    titles.sort();
    assert_eq!(titles, vec!["Contacto", "Detalle", "Sección"]);
    assert!(outcome.records.iter().all(|r| r.kind == RecordKind::DetailPage));
}

#[tokio::test]
async fn test_retrying_fetcher_recovers_transient_failures() {
    let mock = MockFetcher::new()
        .with_page("https://x.com/s", listing_page(&[card("/r/1", "Uno")], None))
        .with_transient_failures("https://x.com/s", 2);
    let fetcher = mock.clone().with_retry(RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    });

    let outcome = CrawlScheduler::new(fetcher, test_config(&["https://x.com/s"]))
        .unwrap()
        .run()
        .await;

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.summary.failed_count(), 0);
    assert_eq!(mock.fetch_count("https://x.com/s"), 3);
}

#[tokio::test]
async fn test_seed_location_object_form() {
    let mut config = test_config(&[]);
    config.seeds = vec![Seed::new("https://x.com/s").with_location("Medellín")];

    let mock = MockFetcher::new().with_page("https://x.com/s", listing_page(&[card("/r/1", "Uno")], None));
    let outcome = CrawlScheduler::new(mock, config).unwrap().run().await;

    assert_eq!(outcome.records[0].location, "Medellín");
}
