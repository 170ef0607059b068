use std::time::Duration;

use bliss::{BlissConfig, Descriptor, Document, Event};
use futures_util::FutureExt;
use tokio::time::{sleep, Instant};

fn inline_style(document: &Document, selector: &str) -> Option<String> {
    let node = document.query(selector).unwrap()?;
    let element = node.as_element()?;
    let style = element.attributes.borrow().get("style").map(str::to_string);
    style
}

#[test]
fn test_transition_without_support_resolves_immediately() {
    let mut config = BlissConfig::default();
    config.transitions.supported = false;
    let document = Document::with_config(r#"<div id="box"></div>"#, config);
    let element = document.element(&document.query("#box").unwrap().unwrap());

    let deferred = element
        .transition(&Descriptor::new().with("opacity", 0), Some(100))
        .unwrap();
    let node = deferred
        .now_or_never()
        .expect("settled without waiting")
        .expect("resolved");
    assert!(bliss::dom::same_node(&node, element.node()));
    assert_eq!(inline_style(&document, "#box"), None);
    assert!(!document.has_pending_timers());
}

#[tokio::test]
async fn test_transition_timeout_path() {
    let document = Document::parse(r#"<div id="box" style="color: red"></div>"#);
    let element = document.element(&document.query("#box").unwrap().unwrap());

    let started = Instant::now();
    let deferred = element
        .transition(&Descriptor::new().with("opacity", 0.5), Some(100))
        .unwrap();
    assert_eq!(
        inline_style(&document, "#box").as_deref(),
        Some("color: red; transition-duration: 100ms; transition-property: opacity; opacity: 0.5;")
    );

    let node = deferred.await.expect("failsafe resolves");
    assert!(started.elapsed() >= Duration::from_millis(150));
    assert!(bliss::dom::same_node(&node, element.node()));
    assert_eq!(
        inline_style(&document, "#box").as_deref(),
        Some("color: red; opacity: 0.5;")
    );
    assert!(element.listeners().is_empty());
}

#[tokio::test]
async fn test_transitionend_wins_and_clears_timer() {
    let document = Document::parse(r#"<div id="box"></div>"#);
    let element = document.element(&document.query("#box").unwrap().unwrap());

    let mut deferred = element
        .transition(&Descriptor::new().with("marginLeft", "4px"), None)
        .unwrap();
    assert!((&mut deferred).now_or_never().is_none());
    assert!(document.has_pending_timers());

    document.dispatch_event(element.node(), &Event::new("transitionend"));
    assert!(deferred.is_settled());
    assert!(!document.has_pending_timers());
    deferred.await.expect("resolved by transitionend");

    // A later event must not re-run completion.
    document.dispatch_event(element.node(), &Event::new("transitionend"));
    assert_eq!(
        inline_style(&document, "#box").as_deref(),
        Some("margin-left: 4px;")
    );
}

#[tokio::test]
async fn test_zero_duration_uses_configured_default() {
    let mut config = BlissConfig::default();
    config.transitions.default_duration_ms = 20;
    config.transitions.failsafe_ms = 5;
    let document = Document::with_config(r#"<div id="box"></div>"#, config);
    let element = document.element(&document.query("#box").unwrap().unwrap());

    let deferred = element
        .transition(&Descriptor::new().with("width", "1px"), Some(0))
        .unwrap();
    assert!(inline_style(&document, "#box")
        .unwrap()
        .contains("transition-duration: 20ms"));

    sleep(Duration::from_millis(60)).await;
    assert!(document.pump());
    assert!(deferred.is_settled());
}

#[tokio::test]
async fn test_concurrent_transitions_each_resolve() {
    let document = Document::parse(r#"<div id="slow"></div><div id="fast"></div>"#);
    let slow = document.element(&document.query("#slow").unwrap().unwrap());
    let fast = document.element(&document.query("#fast").unwrap().unwrap());

    let local = tokio::task::LocalSet::new();
    local
        .run_until(async move {
            let slow_task = tokio::task::spawn_local(async move {
                slow.transition(&Descriptor::new().with("opacity", 0), Some(100))
                    .unwrap()
                    .await
            });
            // Let the slow transition register before the fast one starts.
            tokio::task::yield_now().await;
            let fast_task = tokio::task::spawn_local(async move {
                fast.transition(&Descriptor::new().with("opacity", 1), Some(10))
                    .unwrap()
                    .await
            });

            fast_task.await.unwrap().expect("fast transition resolves");
            let slow_result = tokio::time::timeout(Duration::from_millis(1000), slow_task)
                .await
                .expect("slow transition resolves after the fast one finished");
            slow_result.unwrap().expect("resolved");
        })
        .await;
    assert!(!document.has_pending_timers());
}
