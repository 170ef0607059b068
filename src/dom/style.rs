use kuchiki::NodeRef;

/// Declarations of an element's `style` attribute, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineStyle {
    declarations: Vec<(String, String)>,
}

impl InlineStyle {
    pub fn parse(text: &str) -> Self {
        let mut style = InlineStyle::default();
        for declaration in text.split(';') {
            let Some((name, value)) = declaration.split_once(':') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            style.set(name, value.trim());
        }
        style
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let name = css_property_name(name);
        self.declarations
            .iter()
            .find(|(existing, _)| *existing == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set one declaration; an empty value removes it.
    pub fn set(&mut self, name: &str, value: &str) {
        let name = css_property_name(name);
        if value.is_empty() {
            self.declarations.retain(|(existing, _)| *existing != name);
            return;
        }
        match self
            .declarations
            .iter_mut()
            .find(|(existing, _)| *existing == name)
        {
            Some(slot) => slot.1 = value.to_string(),
            None => self.declarations.push((name, value.to_string())),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn serialize(&self) -> String {
        self.declarations
            .iter()
            .map(|(name, value)| format!("{name}: {value};"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// `backgroundColor` -> `background-color`; kebab-case and custom
/// properties pass through.
pub fn css_property_name(name: &str) -> String {
    if name.starts_with("--") {
        return name.to_string();
    }
    if name == "cssFloat" {
        return "float".to_string();
    }
    let mut out = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

pub fn read_style(node: &NodeRef) -> InlineStyle {
    node.as_element()
        .and_then(|element| {
            element
                .attributes
                .borrow()
                .get("style")
                .map(InlineStyle::parse)
        })
        .unwrap_or_default()
}

pub fn write_style(node: &NodeRef, style: &InlineStyle) {
    let Some(element) = node.as_element() else {
        return;
    };
    let mut attributes = element.attributes.borrow_mut();
    if style.is_empty() {
        attributes.remove("style");
    } else {
        attributes.insert("style", style.serialize());
    }
}

pub fn style_property(node: &NodeRef, name: &str) -> Option<String> {
    read_style(node).get(name).map(str::to_string)
}

pub fn set_style_property(node: &NodeRef, name: &str, value: &str) {
    let mut style = read_style(node);
    style.set(name, value);
    write_style(node, &style);
}
