use std::fmt::Write;

use panel_core::{ConnectionController, EditState, NodeBody, UiNode};

pub fn status_line(controller: &ConnectionController) -> String {
    let mut line = format!("[{}]", controller.state());
    if let Some((host, port)) = controller.endpoint() {
        let _ = write!(line, " {host}:{port}");
    }
    let _ = write!(line, "  ({})", controller.toggle_label());
    if let Some(err) = controller.last_error() {
        let _ = write!(line, "  error: {err}");
    }
    line
}

pub fn render_tree(nodes: &[UiNode]) -> String {
    let mut out = String::new();
    if nodes.is_empty() {
        out.push_str("(no parameters)\n");
    }
    for node in nodes {
        write_node(&mut out, node, 0);
    }
    out
}

fn write_node(out: &mut String, node: &UiNode, depth: usize) {
    let indent = "  ".repeat(depth);
    let _ = write!(out, "{indent}{} (#{})", node.label, node.id);
    match &node.body {
        NodeBody::Group => {}
        NodeBody::TextField {
            value,
            editable,
            edit,
        } => {
            let _ = write!(out, " = {value}");
            match edit {
                EditState::Clean => {}
                EditState::Dirty => out.push_str(" *"),
                EditState::Reverted => out.push_str(" (reverted)"),
            }
            if !editable {
                out.push_str(" (readonly)");
            }
        }
        NodeBody::Button { label } => {
            let _ = write!(out, " <{label}>");
        }
        NodeBody::InvalidMarker => out.push_str(" !invalid"),
        NodeBody::Diagnostic { message } => {
            let _ = write!(out, " ?? {message}");
        }
    }
    if let Some(desc) = &node.description {
        let _ = write!(out, " [{desc}]");
    }
    out.push('\n');
    for child in &node.children {
        write_node(out, child, depth + 1);
    }
}

pub fn render_json(controller: &ConnectionController, nodes: &[UiNode]) -> serde_json::Result<String> {
    serde_json::to_string(&serde_json::json!({
        "state": controller.state(),
        "toggle": controller.toggle_label(),
        "error": controller.last_error(),
        "parameters": nodes,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use panel_core::ParamId;

    fn node(id: i32, label: &str, body: NodeBody, children: Vec<UiNode>) -> UiNode {
        UiNode {
            id: ParamId(id),
            label: label.into(),
            description: None,
            enabled: true,
            body,
            children,
        }
    }

    #[test]
    fn tree_is_indented_by_depth() {
        let field = NodeBody::TextField {
            value: "440".into(),
            editable: true,
            edit: EditState::Dirty,
        };
        let nodes = vec![
            node(1, "osc", NodeBody::Group, vec![node(2, "freq", field, vec![])]),
            node(
                6,
                "reset",
                NodeBody::Button {
                    label: "reset".into(),
                },
                vec![],
            ),
        ];
        assert_eq!(
            render_tree(&nodes),
            "osc (#1)\n  freq (#2) = 440 *\nreset (#6) <reset>\n"
        );
    }

    #[test]
    fn empty_panel_says_so() {
        assert_eq!(render_tree(&[]), "(no parameters)\n");
    }
}
