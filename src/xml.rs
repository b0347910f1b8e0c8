//! Small query helpers over `roxmltree` nodes.

use roxmltree::Node;

/// First child element named `name`.
pub fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

/// All child elements named `name`, in document order.
pub fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

/// Follow a path of child element names, e.g. `["ornaments", "tremolo"]`.
pub fn path<'a, 'input>(node: Node<'a, 'input>, names: &[&str]) -> Option<Node<'a, 'input>> {
    names.iter().try_fold(node, |current, name| child(current, name))
}

pub fn has_child(node: Node, name: &str) -> bool {
    child(node, name).is_some()
}

/// Trimmed text of a node, empty when there is none.
pub fn text<'a>(node: Node<'a, '_>) -> &'a str {
    node.text().map(str::trim).unwrap_or("")
}

/// Trimmed text of the first child named `name`, empty when absent.
pub fn child_text<'a>(node: Node<'a, '_>, name: &str) -> &'a str {
    child(node, name).map(text).unwrap_or("")
}

/// Attribute value, empty when absent.
pub fn attr<'a>(node: Node<'a, '_>, name: &str) -> &'a str {
    node.attribute(name).unwrap_or("")
}

pub fn attr_is(node: Node, name: &str, value: &str) -> bool {
    node.attribute(name) == Some(value)
}

/// Attribute from the `xml:` namespace, such as `xml:lang`.
pub fn xml_attr<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attribute((roxmltree::NS_XML_URI, name))
}

pub fn parse_i32(node: Node) -> Option<i32> {
    text(node).parse().ok()
}

pub fn parse_f64(node: Node) -> Option<f64> {
    text(node).parse().ok()
}

pub fn child_i32(node: Node, name: &str) -> Option<i32> {
    child(node, name).and_then(parse_i32)
}

/// Leading integer of a string, like C's `atoi`: `"3+2"` gives 3, junk gives 0.
pub fn leading_int(value: &str) -> i32 {
    let value = value.trim();
    let end = value
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(value.len());
    value[..end].parse().unwrap_or(0)
}

/// Child named `name` whose `number` attribute equals `number`, falling back
/// to the first child named `name`.
pub fn numbered_child<'a, 'input>(
    node: Node<'a, 'input>,
    name: &str,
    number: usize,
) -> Option<Node<'a, 'input>> {
    let wanted = number.to_string();
    node.children()
        .find(|n| {
            n.is_element() && n.tag_name().name() == name && n.attribute("number") == Some(wanted.as_str())
        })
        .or_else(|| child(node, name))
}

/// Next sibling element named `name`, at any distance.
pub fn following_sibling<'a, 'input>(
    node: Node<'a, 'input>,
    name: &str,
) -> Option<Node<'a, 'input>> {
    node.next_siblings()
        .skip(1)
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

/// Previous sibling element named `name`, at any distance.
pub fn preceding_sibling<'a, 'input>(
    node: Node<'a, 'input>,
    name: &str,
) -> Option<Node<'a, 'input>> {
    node.prev_siblings()
        .skip(1)
        .find(|n| n.is_element() && n.tag_name().name() == name)
}
