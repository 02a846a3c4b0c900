mod common;

use std::rc::Rc;

use common::{group, number, text, trigger, Harness};
use panel_core::{
    ClientEvent, CloseEvent, NodeBody, PanelView, ParamId, ParamKind, ParamMeta, Parameter, Value,
};

#[test]
fn every_kind_renders() {
    let invalid = Parameter::labeled(4, ParamKind::Invalid, "broken");
    let unknown = Parameter::new(
        5,
        ParamKind::Unknown {
            datatype: "rgba".into(),
        },
        ParamMeta::default(),
    );
    let unlabeled_bang = Parameter::new(6, ParamKind::Trigger, ParamMeta::default());
    let roots = vec![
        group(1, "osc", vec![number(2, "freq", 440.0)]),
        trigger(3, "reset"),
        invalid,
        unknown,
        unlabeled_bang,
    ];
    let mut view = PanelView::new();
    view.sync(&roots);
    let nodes = view.render();

    assert_eq!(nodes.len(), 5);
    assert_eq!(nodes[0].body, NodeBody::Group);
    assert_eq!(nodes[0].children.len(), 1);
    assert!(matches!(
        &nodes[0].children[0].body,
        NodeBody::TextField { value, editable: true, .. } if value == "440"
    ));
    assert_eq!(
        nodes[1].body,
        NodeBody::Button {
            label: "reset".into()
        }
    );
    assert_eq!(nodes[2].body, NodeBody::InvalidMarker);
    assert_eq!(
        nodes[3].body,
        NodeBody::Diagnostic {
            message: "not handled parameter: 5 with datatype rgba".into()
        }
    );
    assert_eq!(nodes[3].label, "no label");
    assert_eq!(
        nodes[4].body,
        NodeBody::Button {
            label: "6".into()
        }
    );
}

#[test]
fn metadata_changes_show_up_on_next_render() {
    let p = text(1, "name");
    let mut view = PanelView::new();
    view.sync(&[Rc::clone(&p)]);
    view.render();
    view.take_invalidated();

    p.update_meta(|m| {
        m.label = Some("title".into());
        m.description = Some("track title".into());
        m.readonly = true;
    });
    assert!(view.take_invalidated());

    let node = &view.render()[0];
    assert_eq!(node.label, "title");
    assert_eq!(node.description.as_deref(), Some("track title"));
    assert!(!node.enabled);
}

#[test]
fn unmounting_releases_subscriptions() {
    let p = number(1, "gain", 1.0);
    let mut view = PanelView::new();
    view.sync(&[Rc::clone(&p)]);
    assert_eq!(p.listener_count(), 2);

    view.sync(&[]);
    assert!(view.is_empty());
    assert_eq!(p.listener_count(), 0);

    // changes after unmount touch nothing
    view.take_invalidated();
    p.set_value(Value::Number(2.0));
    assert!(!view.take_invalidated());
}

#[test]
fn keyed_sync_keeps_widget_state() {
    let a = number(1, "a", 1.0);
    let b = number(2, "b", 2.0);
    let mut view = PanelView::new();
    view.sync(&[Rc::clone(&a), Rc::clone(&b)]);
    view.widget(ParamId(2)).unwrap().input("9").unwrap();

    let c = number(3, "c", 3.0);
    view.sync(&[Rc::clone(&b), Rc::clone(&c)]);

    let ids: Vec<ParamId> = view.widgets().iter().map(|w| w.id()).collect();
    assert_eq!(ids, vec![ParamId(2), ParamId(3)]);
    assert_eq!(
        view.widget(ParamId(2)).unwrap().display_text().as_deref(),
        Some("9")
    );
    assert_eq!(a.listener_count(), 0);
    assert_eq!(b.listener_count(), 2);
}

#[test]
fn replaced_parameter_with_same_id_is_remounted() {
    let old = number(1, "gain", 1.0);
    let mut view = PanelView::new();
    view.sync(&[Rc::clone(&old)]);
    view.widget(ParamId(1)).unwrap().input("5").unwrap();

    let new = number(1, "gain", 3.0);
    view.sync(&[Rc::clone(&new)]);

    assert_eq!(old.listener_count(), 0);
    assert_eq!(
        view.widget(ParamId(1)).unwrap().display_text().as_deref(),
        Some("3")
    );
}

#[test]
fn group_children_follow_the_tree() {
    let first = text(2, "first");
    let osc = group(1, "osc", vec![Rc::clone(&first)]);
    let mut view = PanelView::new();
    view.sync(&[Rc::clone(&osc)]);
    assert_eq!(view.render()[0].children.len(), 1);

    osc.add_child(text(3, "second"));
    let nodes = view.render();
    let child_ids: Vec<ParamId> = nodes[0].children.iter().map(|n| n.id).collect();
    assert_eq!(child_ids, vec![ParamId(2), ParamId(3)]);

    osc.remove_child(ParamId(2));
    let nodes = view.render();
    assert_eq!(nodes[0].children.len(), 1);
    assert_eq!(first.listener_count(), 0);
    assert!(nodes[0].find(ParamId(3)).is_some());
}

#[test]
fn controller_drives_view_end_to_end() {
    let mut h = Harness::connected();
    let mut view = PanelView::new();

    let osc = group(1, "osc", vec![number(2, "freq", 440.0)]);
    h.deliver(ClientEvent::ParameterAdded(Rc::clone(&osc)));
    h.deliver(ClientEvent::ParameterAdded(Rc::clone(&osc.children()[0])));
    h.deliver(ClientEvent::ParameterAdded(trigger(3, "reset")));

    if h.advance_ms(100) {
        view.sync(&h.controller.parameters());
    }
    let nodes = view.render();
    assert_eq!(nodes.len(), 2);
    assert!(nodes[0].find(ParamId(2)).is_some());

    if h.deliver(ClientEvent::Disconnected(CloseEvent::abnormal())) {
        view.sync(&h.controller.parameters());
    }
    assert!(view.render().is_empty());
    assert_eq!(osc.listener_count(), 0);
}
