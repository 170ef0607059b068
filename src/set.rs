//! Descriptor dispatch: route each key of a descriptor to a special handler,
//! an existing property, or an attribute.

use kuchiki::NodeRef;
use tracing::debug;

use crate::dom::Document;
use crate::error::{BlissError, Result};
use crate::handlers::{self, Special};
use crate::value::{Descriptor, Value};

const DEFAULT_TAG: &str = "div";

/// Apply `descriptor` to `node`, key by key, in enumeration order.
pub fn configure(document: &Document, node: &NodeRef, descriptor: &Descriptor) -> Result<()> {
    for (key, value) in descriptor.iter() {
        if let Some(special) = Special::lookup(key) {
            special.apply(document, node, value)?;
        } else if document.has_property(node, key) {
            debug!(target: "bliss::set", key, "assigning property");
            document.set_property(node, key, value.clone());
        } else {
            debug!(target: "bliss::set", key, "writing attribute");
            if node.as_element().is_none() {
                return Err(BlissError::invalid("set", "an element for attribute writes"));
            }
            handlers::set_attribute(node, key, value)?;
        }
    }
    Ok(())
}

/// Build an element from a descriptor whose `tag` key names the element.
pub(crate) fn create_from_descriptor(document: &Document, descriptor: &Descriptor) -> Result<NodeRef> {
    let tag = descriptor
        .get("tag")
        .and_then(Value::as_str)
        .filter(|tag| !tag.is_empty())
        .unwrap_or(DEFAULT_TAG)
        .to_string();
    let mut rest = descriptor.clone();
    rest.remove("tag");
    create_element_with(document, &tag, &rest)
}

pub(crate) fn create_element_with(
    document: &Document,
    tag: &str,
    descriptor: &Descriptor,
) -> Result<NodeRef> {
    let element = document.create_element(tag);
    document.observe(&element);
    configure(document, &element, descriptor)?;
    Ok(element)
}
