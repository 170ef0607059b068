use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use kuchiki::NodeRef;
use tracing::{debug, trace};

use crate::deferred::{Deferred, Resolver};
use crate::dom::style::{css_property_name, set_style_property, style_property};
use crate::dom::{Document, WeakDocument};
use crate::error::Result;
use crate::handlers;
use crate::value::{Callback, Descriptor};

const TRANSITION_END: &str = "transitionend";
const DURATION: &str = "transition-duration";
const PROPERTY: &str = "transition-property";

/// State of one running transition. Taking it out of its slot is what
/// completes the transition, so only the first completion path does work.
struct TransitionHandle {
    node: NodeRef,
    previous_duration: Option<String>,
    previous_property: Option<String>,
    timer: u32,
    listener: Option<Callback>,
    resolver: Resolver<NodeRef>,
}

type Slot = Rc<RefCell<Option<TransitionHandle>>>;

/// Transition `node` to the inline styles in `props`. The returned deferred
/// resolves with the node on `transitionend` or after the failsafe delay.
pub(crate) fn transition(
    document: &Document,
    node: &NodeRef,
    props: &Descriptor,
    duration_ms: Option<u64>,
) -> Result<Deferred<NodeRef>> {
    let config = &document.config().transitions;
    if !config.supported {
        trace!(target: "bliss::transition", "transitions unsupported, resolving immediately");
        return Ok(Deferred::resolved(node.clone()));
    }

    let duration_ms = match duration_ms {
        Some(ms) if ms > 0 => ms,
        _ => config.default_duration_ms,
    };
    let (deferred, resolver) = Deferred::new();
    let slot: Slot = Rc::new(RefCell::new(None));

    let timer = {
        let slot = Rc::clone(&slot);
        let weak = document.downgrade();
        document.inner.timers.set_timeout(
            Duration::from_millis(duration_ms + config.failsafe_ms),
            Box::new(move || {
                if let Some(document) = weak.upgrade() {
                    trace!(target: "bliss::transition", "failsafe timer elapsed");
                    complete(&document, &slot);
                }
            }),
        )?
    };

    let listener = {
        let slot = Rc::downgrade(&slot);
        let document = document.downgrade();
        Callback::new(move |_event| finish_from_event(&document, &slot))
    };

    *slot.borrow_mut() = Some(TransitionHandle {
        node: node.clone(),
        previous_duration: style_property(node, DURATION),
        previous_property: style_property(node, PROPERTY),
        timer,
        listener: Some(listener.clone()),
        resolver,
    });

    let properties = props
        .keys()
        .map(css_property_name)
        .collect::<Vec<_>>()
        .join(", ");
    debug!(target: "bliss::transition", duration_ms, %properties, "starting transition");
    set_style_property(node, DURATION, &format!("{duration_ms}ms"));
    set_style_property(node, PROPERTY, &properties);
    document.add_event_listener(node, TRANSITION_END, &listener, false);
    handlers::style(node, props)?;

    Ok(deferred.driven_by(Rc::clone(&document.inner.timers)))
}

fn finish_from_event(document: &WeakDocument, slot: &Weak<RefCell<Option<TransitionHandle>>>) {
    if let (Some(document), Some(slot)) = (document.upgrade(), slot.upgrade()) {
        trace!(target: "bliss::transition", "transitionend received");
        complete(&document, &slot);
    }
}

fn complete(document: &Document, slot: &Slot) {
    let Some(mut handle) = slot.borrow_mut().take() else {
        return;
    };

    document.inner.timers.clear_timeout(handle.timer);
    set_style_property(
        &handle.node,
        DURATION,
        handle.previous_duration.as_deref().unwrap_or(""),
    );
    set_style_property(
        &handle.node,
        PROPERTY,
        handle.previous_property.as_deref().unwrap_or(""),
    );
    if let Some(listener) = handle.listener.take() {
        document.remove_event_listener(&handle.node, TRANSITION_END, &listener, false);
    }
    debug!(target: "bliss::transition", "transition complete");
    handle.resolver.resolve(handle.node);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BlissConfig;
    use crate::dom::events::Event;
    use futures_util::FutureExt;

    #[test]
    fn unsupported_resolves_without_touching_style() {
        let mut config = BlissConfig::default();
        config.transitions.supported = false;
        let document = Document::with_config(r#"<div id="box" style="opacity: 1"></div>"#, config);
        let node = document.query("#box").unwrap().unwrap();

        let deferred = transition(
            &document,
            &node,
            &Descriptor::new().with("opacity", "0"),
            Some(100),
        )
        .unwrap();
        let resolved = deferred.now_or_never().unwrap().unwrap();
        assert!(crate::dom::same_node(&resolved, &node));
        assert_eq!(node.to_string(), r#"<div id="box" style="opacity: 1"></div>"#);
    }

    #[tokio::test]
    async fn transitionend_restores_previous_values() {
        let document = Document::parse(
            r#"<div id="box" style="transition-duration: 2s; opacity: 1"></div>"#,
        );
        let node = document.query("#box").unwrap().unwrap();
        document.observe(&node);

        let deferred = transition(
            &document,
            &node,
            &Descriptor::new().with("opacity", "0").with("backgroundColor", "red"),
            Some(1000),
        )
        .unwrap();
        assert_eq!(style_property(&node, DURATION).as_deref(), Some("1000ms"));
        assert_eq!(
            style_property(&node, PROPERTY).as_deref(),
            Some("opacity, background-color")
        );
        assert!(document.has_pending_timers());

        document.dispatch_event(&node, &Event::new(TRANSITION_END));
        let resolved = deferred.now_or_never().unwrap().unwrap();
        assert!(crate::dom::same_node(&resolved, &node));
        assert_eq!(style_property(&node, DURATION).as_deref(), Some("2s"));
        assert_eq!(style_property(&node, PROPERTY), None);
        assert_eq!(style_property(&node, "opacity").as_deref(), Some("0"));
        assert!(!document.has_pending_timers());
        assert!(document.listeners(&node).is_empty());
    }

    #[tokio::test]
    async fn failsafe_resolves_when_no_event_arrives() {
        let document = Document::parse(r#"<div id="box"></div>"#);
        let node = document.query("#box").unwrap().unwrap();

        let started = tokio::time::Instant::now();
        let resolved = transition(&document, &node, &Descriptor::new().with("width", "10px"), Some(20))
            .unwrap()
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(70));
        assert!(crate::dom::same_node(&resolved, &node));
        assert_eq!(node.to_string(), r#"<div id="box" style="width: 10px;"></div>"#);
        assert_eq!(document.native_listener_count(&node, TRANSITION_END), 0);
    }

    #[test]
    fn needs_a_runtime_when_supported() {
        let document = Document::parse(r#"<div id="box"></div>"#);
        let node = document.query("#box").unwrap().unwrap();
        assert!(transition(&document, &node, &Descriptor::new(), None).is_err());
        assert_eq!(node.to_string(), r#"<div id="box"></div>"#);
    }
}
