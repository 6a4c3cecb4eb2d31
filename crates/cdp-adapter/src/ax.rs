use std::collections::HashMap;

use serde_json::Value;

use crate::driver::AxNode;

/// Builds a nested tree from the flat node list of `Accessibility.getFullAXTree`.
///
/// Ignored nodes are dropped and their children lifted into the nearest kept ancestor.
pub fn ax_tree_from_nodes(nodes: &[Value]) -> Option<AxNode> {
    let mut by_id: HashMap<&str, &Value> = HashMap::with_capacity(nodes.len());
    for node in nodes {
        if let Some(id) = node.get("nodeId").and_then(Value::as_str) {
            by_id.insert(id, node);
        }
    }

    let root = nodes
        .iter()
        .find(|node| node.get("parentId").is_none())
        .or_else(|| nodes.first())?;

    let mut lifted = convert(root, &by_id, 0);
    match lifted.len() {
        0 => None,
        1 => lifted.pop(),
        _ => Some(AxNode::new("RootWebArea", "").with_children(lifted)),
    }
}

const MAX_DEPTH: usize = 512;

fn convert(node: &Value, by_id: &HashMap<&str, &Value>, depth: usize) -> Vec<AxNode> {
    if depth > MAX_DEPTH {
        return Vec::new();
    }

    let mut children = Vec::new();
    if let Some(ids) = node.get("childIds").and_then(Value::as_array) {
        for id in ids.iter().filter_map(Value::as_str) {
            if let Some(child) = by_id.get(id) {
                children.extend(convert(child, by_id, depth + 1));
            }
        }
    }

    let ignored = node.get("ignored").and_then(Value::as_bool).unwrap_or(false);
    if ignored {
        return children;
    }

    let role = match ax_string(node, "role").as_deref() {
        Some("StaticText") | Some("InlineTextBox") => "text".to_string(),
        Some(role) => role.to_string(),
        None => return children,
    };

    // Inline text boxes duplicate their StaticText parent.
    if role == "text" {
        children.retain(|child| child.role != "text");
    }

    vec![AxNode {
        role,
        name: ax_string(node, "name").unwrap_or_default(),
        value: ax_string(node, "value").filter(|v| !v.is_empty()),
        description: ax_string(node, "description").filter(|v| !v.is_empty()),
        focused: ax_property(node, "focused"),
        disabled: ax_property(node, "disabled"),
        children,
    }]
}

fn ax_string(node: &Value, key: &str) -> Option<String> {
    let value = node.get(key)?.get("value")?;
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn ax_property(node: &Value, name: &str) -> bool {
    node.get("properties")
        .and_then(Value::as_array)
        .and_then(|props| {
            props
                .iter()
                .find(|p| p.get("name").and_then(Value::as_str) == Some(name))
        })
        .and_then(|p| p.get("value")?.get("value")?.as_bool())
        .unwrap_or(false)
}
