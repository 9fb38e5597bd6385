//! Renderer Integration Tests
//!
//! Diff scenarios and component updates, checked against the operation log
//! of the in-memory host.

use std::cell::Cell;
use std::rc::Rc;

use trellis_core::reactive::{ref_, Ref};
use trellis_core::render::{
    component, create_renderer, fragment, h, text, Component, HostNode, MemoryHost, Props,
    Renderer, VNode,
};
use trellis_core::scheduler::flush_jobs;
use trellis_core::Error;

type TestRenderer = Renderer<Rc<MemoryHost>>;

fn setup() -> (Rc<MemoryHost>, HostNode, TestRenderer) {
    let host = Rc::new(MemoryHost::new());
    let root = host.create_root();
    let renderer = create_renderer(host.clone());
    (host, root, renderer)
}

fn keyed_list(keys: &str) -> VNode {
    let items: Vec<VNode> = keys
        .chars()
        .map(|k| h("li", Props::new().key(k), k.to_string()))
        .collect();
    h("ul", None, items)
}

fn list_markup(keys: &str) -> String {
    let items: String = keys.chars().map(|k| format!("<li>{k}</li>")).collect();
    format!("<ul>{items}</ul>")
}

/// Render `from`, clear the log, then render `to`.
fn rediff(from: &str, to: &str) -> Rc<MemoryHost> {
    let (host, root, renderer) = setup();
    renderer.render(keyed_list(from), root);
    host.take_ops();
    renderer.render(keyed_list(to), root);
    assert_eq!(host.serialize(root), list_markup(to));
    host
}

/// `[a,b,c,d,e]` to `[a,c,b,e,d]` moves exactly two nodes.
#[test]
fn keyed_swap_moves_two() {
    let stats = rediff("abcde", "acbed").stats();
    assert_eq!(stats.moves, 2);
    assert_eq!(stats.creates, 0);
    assert_eq!(stats.removes, 0);
}

/// Pure append mounts once.
#[test]
fn keyed_append() {
    let stats = rediff("ab", "abc").stats();
    assert_eq!(stats.creates, 1);
    assert_eq!(stats.inserts, 1);
    assert_eq!(stats.moves, 0);
    assert_eq!(stats.removes, 0);
}

/// Pure removal unmounts once.
#[test]
fn keyed_removal() {
    let stats = rediff("abc", "ac").stats();
    assert_eq!(stats.removes, 1);
    assert_eq!(stats.moves, 0);
    assert_eq!(stats.creates, 0);
}

/// Full reversal moves all but one node.
#[test]
fn keyed_reversal() {
    let stats = rediff("abcd", "dcba").stats();
    assert_eq!(stats.moves, 3);
    assert_eq!(stats.creates, 0);
    assert_eq!(stats.removes, 0);
}

/// Prepend inserts before the first existing node.
#[test]
fn keyed_prepend() {
    let stats = rediff("bc", "abc").stats();
    assert_eq!(stats.creates, 1);
    assert_eq!(stats.moves, 0);
}

/// Changing the tag remounts, without patching attributes across types.
#[test]
fn type_change_remounts() {
    let (host, root, renderer) = setup();
    renderer.render(h("div", Props::new().attr("title", "t"), "x"), root);
    let old_el = renderer.root(root).and_then(|v| v.el());
    host.take_ops();

    renderer.render(h("span", Props::new().attr("title", "t"), "x"), root);
    let new_el = renderer.root(root).and_then(|v| v.el());

    assert_ne!(old_el, new_el);
    assert_eq!(host.serialize(root), "<span title=\"t\">x</span>");
    let stats = host.stats();
    assert_eq!(stats.removes, 1);
    assert_eq!(stats.creates, 1);
}

fn counter_component(count: &Ref<i32>, renders: &Rc<Cell<usize>>) -> Component {
    let (count, renders) = (count.clone(), renders.clone());
    Component::new("Counter", move |_ctx| {
        let (count, renders) = (count.clone(), renders.clone());
        move || {
            renders.set(renders.get() + 1);
            h("span", None, count.get().to_string())
        }
    })
}

/// State changes re-render the component once per flush.
#[test]
fn component_rerenders_on_flush() {
    let (host, root, renderer) = setup();
    let count = ref_(0);
    let renders = Rc::new(Cell::new(0));
    let counter = counter_component(&count, &renders);

    renderer.render(component(&counter, None), root);
    assert_eq!(host.serialize(root), "<span>0</span>");
    assert_eq!(renders.get(), 1);

    count.set(1);
    count.set(2);
    count.set(3);
    assert_eq!(renders.get(), 1);

    flush_jobs();
    assert_eq!(renders.get(), 2);
    assert_eq!(host.serialize(root), "<span>3</span>");
}

/// A render that panics keeps the previous tree and records the error.
#[test]
fn render_panic_keeps_previous_tree() {
    let (host, root, renderer) = setup();
    let fail = ref_(false);
    let broken = Component::new("Broken", {
        let fail = fail.clone();
        move |_ctx| {
            let fail = fail.clone();
            move || {
                if fail.get() {
                    panic!("render exploded");
                }
                h("p", None, "ok")
            }
        }
    });

    renderer.render(component(&broken, None), root);
    assert_eq!(host.serialize(root), "<p>ok</p>");

    fail.set(true);
    let report = flush_jobs();
    assert!(report.is_ok());
    assert_eq!(host.serialize(root), "<p>ok</p>");

    let instance = renderer
        .root(root)
        .and_then(|v| v.component_instance())
        .expect("mounted instance");
    assert!(matches!(
        instance.last_error(),
        Some(Error::RenderPanicked { ref component, .. }) if component == "Broken"
    ));

    fail.set(false);
    flush_jobs();
    assert!(instance.last_error().is_none());
    assert_eq!(host.serialize(root), "<p>ok</p>");
}

/// New props from the parent re-render the child.
#[test]
fn props_change_rerenders_child() {
    let (host, root, renderer) = setup();
    let label = Component::new("Label", |ctx| {
        let props = ctx.props();
        move || {
            let text = props.with(|p| p.get("text").and_then(|v| v.as_str()).unwrap_or("").to_string());
            h("label", None, text)
        }
    });

    renderer.render(h("form", None, vec![component(&label, Props::new().attr("text", "a"))]), root);
    assert_eq!(host.serialize(root), "<form><label>a</label></form>");

    renderer.render(h("form", None, vec![component(&label, Props::new().attr("text", "b"))]), root);
    assert_eq!(host.serialize(root), "<form><label>b</label></form>");
}

/// Unmounting stops the render effect; later writes do nothing.
#[test]
fn unmount_stops_component_effects() {
    let (host, root, renderer) = setup();
    let count = ref_(0);
    let renders = Rc::new(Cell::new(0));
    let counter = counter_component(&count, &renders);

    renderer.render(h("div", None, vec![component(&counter, None)]), root);
    let instance = renderer
        .root(root)
        .and_then(|v| match v.children() {
            trellis_core::render::Children::Array(c) => c[0].component_instance(),
            _ => None,
        })
        .expect("child instance");

    renderer.render(None, root);
    assert!(instance.is_unmounted());
    assert!(!instance.effect().is_some_and(|e| e.is_active()));
    assert_eq!(host.serialize(root), "");

    count.set(5);
    flush_jobs();
    assert_eq!(renders.get(), 1);
}

/// Components inside keyed lists move with their keys.
#[test]
fn keyed_components_keep_their_instances() {
    let (host, root, renderer) = setup();
    let item = Component::new("Item", |ctx| {
        let props = ctx.props();
        move || {
            let name = props.with(|p| p.get("name").and_then(|v| v.as_str()).unwrap_or("").to_string());
            text(name)
        }
    });
    let row = |key: &str| component(&item, Props::new().key(key).attr("name", key));

    renderer.render(h("ol", None, vec![row("x"), row("y"), row("z")]), root);
    host.take_ops();

    renderer.render(h("ol", None, vec![row("z"), row("x"), row("y")]), root);
    assert_eq!(host.serialize(root), "<ol>zxy</ol>");
    let stats = host.stats();
    assert_eq!(stats.creates, 0);
    assert_eq!(stats.moves, 1);
}

/// Fragments insert and remove their children between anchors.
#[test]
fn fragment_children_stay_between_neighbours() {
    let (host, root, renderer) = setup();
    let show = |items: Vec<VNode>| {
        h("div", None, vec![text("["), fragment(items), text("]")])
    };

    renderer.render(show(vec![text("a")]), root);
    assert_eq!(host.text_content(root), "[a]");

    renderer.render(show(vec![text("a"), text("b")]), root);
    assert_eq!(host.text_content(root), "[ab]");

    renderer.render(show(Vec::new()), root);
    assert_eq!(host.text_content(root), "[]");
}

/// Event handlers are plain props the host can dispatch.
#[test]
fn event_handler_updates_state() {
    let (host, root, renderer) = setup();
    let clicks = ref_(0);
    let button = Component::new("Button", {
        let clicks = clicks.clone();
        move |_ctx| {
            let clicks = clicks.clone();
            move || {
                let on_click = {
                    let clicks = clicks.clone();
                    move || {
                        clicks.update(|n| *n += 1);
                    }
                };
                h("button", Props::new().on("click", on_click), clicks.get().to_string())
            }
        }
    });

    renderer.render(component(&button, None), root);
    let el = host.children(root)[0];
    assert!(host.dispatch(el, "click"));
    assert!(host.dispatch(el, "click"));
    flush_jobs();
    assert_eq!(host.serialize(root), "<button>2</button>");
}

fn flaky_component(fail: &Ref<bool>) -> Component {
    let fail = fail.clone();
    Component::new("Flaky", move |_ctx| {
        let fail = fail.clone();
        move || {
            if fail.get() {
                panic!("not ready");
            }
            h("i", None, "ok")
        }
    })
}

/// A component whose first render failed still anchors siblings inserted
/// before it, and recovers into its own slot.
#[test]
fn failed_first_render_keeps_list_position() {
    let (host, root, renderer) = setup();
    let fail = ref_(true);
    let flaky = flaky_component(&fail);
    let keyed = || component(&flaky, Props::new().key("c"));

    renderer.render(h("div", None, vec![keyed(), h("b", None, ())]), root);
    assert_eq!(host.serialize(root), "<div><b></b></div>");

    renderer.render(h("div", None, vec![h("x", None, ()), keyed(), h("b", None, ())]), root);
    assert_eq!(host.serialize(root), "<div><x></x><b></b></div>");

    fail.set(false);
    flush_jobs();
    assert_eq!(host.serialize(root), "<div><x></x><i>ok</i><b></b></div>");

    let div = host.children(root)[0];
    assert_eq!(host.children(div).len(), 3);
}

/// Moving a component that has not rendered yet moves its placeholder.
#[test]
fn failed_first_render_moves_with_its_key() {
    let (host, root, renderer) = setup();
    let fail = ref_(true);
    let flaky = flaky_component(&fail);
    let keyed = || component(&flaky, Props::new().key("c"));
    let b = || h("b", Props::new().key("b"), ());

    renderer.render(h("div", None, vec![b(), keyed()]), root);
    renderer.render(h("div", None, vec![keyed(), b()]), root);

    fail.set(false);
    flush_jobs();
    assert_eq!(host.serialize(root), "<div><i>ok</i><b></b></div>");

    renderer.render(None, root);
    assert_eq!(host.serialize(root), "");
}
