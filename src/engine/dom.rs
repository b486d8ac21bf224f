//! Flattening of CDP DOM snapshots into parseable HTML.
//!
//! A pierced `DOM.getDocument` snapshot contains shadow roots, template
//! contents, and nested frame documents that never appear in the page's
//! outer HTML. Flattening walks the whole tree with an explicit stack and
//! re-serializes just the link-bearing elements into a flat document the
//! extraction pipeline can read with its ordinary grammar.

use chromiumoxide::cdp::browser_protocol::dom::Node;

const ELEMENT_NODE: i64 = 1;

/// Element names worth serializing: tags whose attributes can carry URLs.
const KNOWN_ELEMENTS: &[&str] = &[
    "a", "applet", "area", "audio", "base", "blockquote", "body", "button", "embed", "form",
    "frame", "html", "iframe", "img", "import", "input", "isindex", "link", "meta", "object",
    "script", "svg", "table", "video",
];

/// Serializes a pierced DOM snapshot into a flat HTML document.
pub fn flatten(root: &Node) -> String {
    let mut out = String::from("<html><body>");
    let mut stack: Vec<&Node> = vec![root];

    while let Some(node) = stack.pop() {
        if node.node_type == ELEMENT_NODE && is_known_element(&node.local_name) {
            write_element(node, &mut out);
        }

        // Traversal order is not significant for extraction; push every
        // subtree the snapshot exposes.
        if let Some(children) = &node.children {
            for child in children {
                stack.push(child);
            }
        }
        if let Some(shadow_roots) = &node.shadow_roots {
            for shadow in shadow_roots {
                stack.push(shadow);
            }
        }
        if let Some(pseudo) = &node.pseudo_elements {
            for child in pseudo {
                stack.push(child);
            }
        }
        if let Some(template) = node.template_content.as_deref() {
            stack.push(template);
        }
        if let Some(document) = node.content_document.as_deref() {
            stack.push(document);
        }
    }

    out.push_str("</body></html>");
    out
}

fn is_known_element(local_name: &str) -> bool {
    KNOWN_ELEMENTS.contains(&local_name)
}

/// Writes one element as a self-closed tag with its attributes.
///
/// CDP reports attributes as a flat interleaved name/value array.
fn write_element(node: &Node, out: &mut String) {
    out.push('<');
    out.push_str(&node.local_name);
    if let Some(attributes) = &node.attributes {
        for pair in attributes.chunks(2) {
            if let [name, value] = pair {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape_attribute(value));
                out.push('"');
            }
        }
    }
    out.push_str("/>");
}

fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node_from(value: serde_json::Value) -> Node {
        serde_json::from_value(value).expect("valid CDP node")
    }

    fn leaf(name: &str, attributes: serde_json::Value) -> serde_json::Value {
        json!({
            "nodeId": 0,
            "backendNodeId": 0,
            "nodeType": ELEMENT_NODE,
            "nodeName": name.to_uppercase(),
            "localName": name,
            "nodeValue": "",
            "attributes": attributes,
        })
    }

    #[test]
    fn test_flatten_serializes_known_elements() {
        let mut root = leaf("html", json!([]));
        root["children"] = json!([leaf("a", json!(["href", "/about"]))]);
        let html = flatten(&node_from(root));
        assert!(html.contains(r#"<a href="/about"/>"#));
    }

    #[test]
    fn test_flatten_skips_unknown_elements() {
        let mut root = leaf("html", json!([]));
        root["children"] = json!([leaf("div", json!(["data-url", "/hidden"]))]);
        let html = flatten(&node_from(root));
        assert!(!html.contains("div"));
        assert!(!html.contains("/hidden"));
    }

    #[test]
    fn test_flatten_reaches_shadow_roots() {
        let mut host = leaf("div", json!([]));
        host["shadowRoots"] = json!([{
            "nodeId": 0,
            "backendNodeId": 0,
            "nodeType": 11,
            "nodeName": "#document-fragment",
            "localName": "",
            "nodeValue": "",
            "children": [leaf("a", json!(["href", "/shadow-link"]))],
        }]);
        let mut root = leaf("html", json!([]));
        root["children"] = json!([host]);

        let html = flatten(&node_from(root));
        assert!(html.contains("/shadow-link"));
    }

    #[test]
    fn test_flatten_reaches_template_content() {
        let mut template = leaf("template", json!([]));
        template["templateContent"] = json!({
            "nodeId": 0,
            "backendNodeId": 0,
            "nodeType": 11,
            "nodeName": "#document-fragment",
            "localName": "",
            "nodeValue": "",
            "children": [leaf("img", json!(["src", "/lazy.png"]))],
        });
        let mut root = leaf("html", json!([]));
        root["children"] = json!([template]);

        let html = flatten(&node_from(root));
        assert!(html.contains("/lazy.png"));
    }

    #[test]
    fn test_flatten_reaches_frame_documents() {
        let mut frame = leaf("iframe", json!(["src", "/frame"]));
        frame["contentDocument"] = json!({
            "nodeId": 0,
            "backendNodeId": 0,
            "nodeType": 9,
            "nodeName": "#document",
            "localName": "",
            "nodeValue": "",
            "children": [leaf("a", json!(["href", "/inside-frame"]))],
        });
        let mut root = leaf("html", json!([]));
        root["children"] = json!([frame]);

        let html = flatten(&node_from(root));
        assert!(html.contains("/frame"));
        assert!(html.contains("/inside-frame"));
    }

    #[test]
    fn test_attribute_values_escaped() {
        let mut root = leaf("html", json!([]));
        root["children"] = json!([leaf("a", json!(["href", "/q?a=1&b=\"2\""]))]);
        let html = flatten(&node_from(root));
        assert!(html.contains("&amp;"));
        assert!(html.contains("&quot;"));
    }
}
