//! Drives a toy render walk over parsed templates through the merge tree.

use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tagweave::prelude::*;
use tagweave::template::tree_snapshot::TreeSnapshot;

type Context = Arc<HashMap<&'static str, &'static str>>;

fn lookup(ctx: &Context, key: &str) -> String {
    ctx.get(key).copied().unwrap_or_default().to_string()
}

fn render(
    doc: &Document,
    node: NodeId,
    slot: &SlotHandle,
    ctx: &Context,
    workers: &mut Vec<JoinHandle<()>>,
) {
    for &child in doc.children(node) {
        let Some(n) = doc.node(child) else { continue };
        match &n.kind {
            NodeKind::Text { value } => slot.write(value).unwrap(),
            NodeKind::Entity { name } => slot.write(&lookup(ctx, name)).unwrap(),
            NodeKind::Comment { .. } | NodeKind::Document { .. } => {}
            NodeKind::Element(element) => match doc.name(child).unwrap_or_default() {
                "echo" => {
                    let key = element.attributes.literal("data").unwrap_or_default();
                    slot.write(&lookup(ctx, key)).unwrap();
                }
                "if" => {
                    let expr = element.attributes.literal("expr").unwrap_or_default();
                    if ctx.contains_key(expr) {
                        render(doc, child, slot, ctx, workers);
                    }
                }
                "async" => {
                    let method = element
                        .attributes
                        .literal("method")
                        .unwrap_or_default()
                        .to_string();
                    let sub = slot.child().unwrap();
                    let ctx = Arc::clone(ctx);
                    let delay = if method == "slow" { 30 } else { 5 };
                    workers.push(thread::spawn(move || {
                        thread::sleep(Duration::from_millis(delay));
                        sub.write(&lookup(&ctx, &method)).unwrap();
                        sub.finalize().unwrap();
                    }));
                }
                _ => render(doc, child, slot, ctx, workers),
            },
        }
    }
}

/// Render `parsed` and return (delivered output, streamed output).
fn run(parsed: &Parsed, ctx: Context) -> (String, String) {
    let tree = SharedMergeTree::new();
    let (stream_tx, stream_rx) = mpsc::channel::<String>();
    let root = tree.root(Some(Box::new(stream_tx))).unwrap();
    let mut workers = Vec::new();
    render(
        &parsed.document,
        parsed.document.root(),
        &root,
        &ctx,
        &mut workers,
    );

    let (done_tx, done_rx) = mpsc::channel::<String>();
    let on_done: Callback = Box::new(move |out: &str| {
        let _ = done_tx.send(out.to_string());
    });
    root.finalize_with(Some(on_done)).unwrap();
    for worker in workers {
        worker.join().expect("worker panicked");
    }
    let delivered = done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("root never completed");
    let streamed: String = stream_rx.try_iter().collect();
    (delivered, streamed)
}

fn context() -> Context {
    Arc::new(HashMap::from([
        ("title", "Hello"),
        ("user", "Ann"),
        ("slow", "S"),
        ("fast", "F"),
        ("show", "yes"),
    ]))
}

#[test]
fn async_parts_land_in_document_order() {
    let source = concat!(
        "<ten:root>\n",
        "  <h1>&ten.title;</h1>\n",
        "  <ten:async method=\"slow\"/>\n",
        "  <p><ten:echo data=\"user\"/></p>\n",
        "  <ten:if expr=\"show\">\n",
        "    <ten:async method=\"fast\"/>\n",
        "  </ten:if>\n",
        "</ten:root>"
    );
    let registry = standard_registry();
    let parsed = Parser::new(ParserConfig::default(), &registry).parse(source);
    assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);

    let (delivered, streamed) = run(&parsed, context());
    assert_eq!(delivered, "\n<h1>Hello</h1>S\n<p>Ann</p>F");
    assert_eq!(streamed, delivered);
}

#[test]
fn recovered_tree_still_renders() {
    let source = "<ten:if expr=\"show\"><ten:each array=\"x\">kept &ten.user;</ten:if>";
    let registry = standard_registry();
    let parsed = Parser::new(ParserConfig::default(), &registry).parse(source);

    assert_eq!(parsed.diagnostics.len(), 1);
    let diagnostic = &parsed.diagnostics[0];
    assert_eq!(diagnostic.kind, DiagnosticKind::TagNotClosed);
    assert_eq!(diagnostic.tag_name.as_deref(), Some("ten:each"));
    assert_eq!((diagnostic.line(), diagnostic.column()), (1, 21));
    assert_eq!(
        TreeSnapshot::new(&parsed.document).render(),
        "#document\n<ten:if expr=\"show\">\n  \"kept \"\n  &user;"
    );

    let (delivered, _) = run(&parsed, context());
    assert_eq!(delivered, "kept Ann");
}
