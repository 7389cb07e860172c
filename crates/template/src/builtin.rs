//! The standard template vocabulary.
//!
//! Only parse-time concerns live here: attribute schemas and the checks a tag
//! can make once its element is closed. What a tag does at render time is up
//! to the compiler that consumes the tree.

use std::path::Path;

use crate::registry::{AttrSchema, HookContext, HookOutcome, TagDescriptor, TagKind, TagRegistry};
use crate::tree_builder::NodeKind;

const ECHO_ESCAPES: &[&str] = &["js", "url", "html", "htmlDec", "htmlHex"];
const DATA_ACTIONS: &[&str] = &["append", "prepend", "replace"];
const BLOCK_TYPES: &[&str] = &["default", "local", "global"];
const SCRIPT_TYPES: &[&str] = &["global", "local"];

/// Registry with every standard tag.
pub fn standard_registry() -> TagRegistry {
    TagRegistry::builder()
        .tag(
            "root",
            TagDescriptor::new(TagKind::Block)
                .attr(AttrSchema::string("context")),
        )
        .tag("comment", TagDescriptor::new(TagKind::Block))
        .tag(
            "context",
            TagDescriptor::new(TagKind::Block)
                .attr(AttrSchema::string("object")),
        )
        .tag(
            "echo",
            TagDescriptor::new(TagKind::Inline)
                .attr(AttrSchema::string("data").default_value("this"))
                .attr(AttrSchema::string("escape"))
                .hook(check_echo),
        )
        .tag(
            "data",
            TagDescriptor::new(TagKind::Block)
                .attr(AttrSchema::string("key").required())
                .attr(AttrSchema::string("action").default_value("replace"))
                .attr(AttrSchema::string("value"))
                .hook(check_data),
        )
        .tag(
            "if",
            TagDescriptor::new(TagKind::Block)
                .attr(AttrSchema::string("expr").default_value("this")),
        )
        .tag(
            "else",
            TagDescriptor::new(TagKind::Block)
                .attr(AttrSchema::string("if"))
                .hook(check_else),
        )
        .tag(
            "each",
            TagDescriptor::new(TagKind::Block)
                .attr(AttrSchema::string("array"))
                .attr(AttrSchema::string("object"))
                .attr(AttrSchema::string("item"))
                .hook(check_each),
        )
        .tag(
            "block",
            TagDescriptor::new(TagKind::Block)
                .attr(AttrSchema::string("name"))
                .attr(AttrSchema::string("type").default_value("global"))
                .hook(check_block),
        )
        .tag(
            "render",
            TagDescriptor::new(TagKind::Block)
                .attr(AttrSchema::string("file"))
                .attr(AttrSchema::string("block"))
                .attr(AttrSchema::string("config"))
                .hook(check_render),
        )
        .tag(
            "script",
            TagDescriptor::new(TagKind::Block)
                .attr(AttrSchema::string("type").default_value("global"))
                .hook(check_script),
        )
        .tag(
            "header",
            TagDescriptor::new(TagKind::Block)
                .attr(AttrSchema::string("name").required())
                .attr(AttrSchema::string("value")),
        )
        .tag(
            "status",
            TagDescriptor::new(TagKind::Block)
                .attr(AttrSchema::number("code").required()),
        )
        .tag(
            "async",
            TagDescriptor::new(TagKind::Block)
                .attr(AttrSchema::string("method").required())
                .attr(AttrSchema::string("arguments").default_value(""))
                .attr(AttrSchema::string("params").default_value("")),
        )
        .tag(
            "attribute",
            TagDescriptor::new(TagKind::Block)
                .attr(AttrSchema::string("name").required())
                .attr(AttrSchema::string("value"))
                .hook(bind_attribute),
        )
        .build()
}

fn one_of(cx: &HookContext<'_>, attribute: &str, allowed: &[&str]) -> HookOutcome {
    match cx.literal(attribute) {
        Some(value) if !allowed.contains(&value) => {
            HookOutcome::Reject(format!("Invalid value of attribute \"{attribute}\""))
        }
        _ => HookOutcome::Keep,
    }
}

fn check_echo(cx: &mut HookContext<'_>) -> HookOutcome {
    one_of(cx, "escape", ECHO_ESCAPES)
}

fn check_data(cx: &mut HookContext<'_>) -> HookOutcome {
    one_of(cx, "action", DATA_ACTIONS)
}

fn check_script(cx: &mut HookContext<'_>) -> HookOutcome {
    one_of(cx, "type", SCRIPT_TYPES)
}

fn check_block(cx: &mut HookContext<'_>) -> HookOutcome {
    if cx.literal("name") == Some("") {
        return HookOutcome::Reject("Attribute \"name\" is empty.".to_string());
    }
    one_of(cx, "type", BLOCK_TYPES)
}

fn check_each(cx: &mut HookContext<'_>) -> HookOutcome {
    if cx.attribute("array").is_none() && cx.attribute("object").is_none() {
        return HookOutcome::Reject("Attribute \"array\" or \"object\" is not defined.".to_string());
    }
    HookOutcome::Keep
}

/// A relative `file` is rewritten against the directory of the template
/// being parsed.
fn check_render(cx: &mut HookContext<'_>) -> HookOutcome {
    if cx.attribute("file").is_none() && cx.attribute("block").is_none() {
        return HookOutcome::Reject("Attribute \"block\" or \"file\" is not defined.".to_string());
    }
    let resolved = cx
        .literal("file")
        .filter(|file| !file.starts_with('/') && !file.contains('&'))
        .zip(cx.config().path.as_deref().and_then(Path::parent))
        .map(|(file, dir)| dir.join(file).to_string_lossy().into_owned());
    if let Some(file) = resolved {
        cx.set_literal("file", file);
    }
    HookOutcome::Keep
}

/// `else` must be an empty child of `if`; an `if` takes at most one
/// unconditional `else`.
fn check_else(cx: &mut HookContext<'_>) -> HookOutcome {
    if cx.parent_name() != Some("if") {
        return HookOutcome::Reject("Tag \"else\" must have a parent \"if\".".to_string());
    }
    if cx.element().is_some_and(|e| !e.children.is_empty()) {
        return HookOutcome::Reject("Tag \"else\" should be a single tag.".to_string());
    }
    let doc = cx.document();
    let Some(parent) = doc.parent(cx.node()) else {
        return HookOutcome::Keep;
    };
    let earlier_else = doc
        .children(parent)
        .iter()
        .take_while(|id| **id != cx.node())
        .filter_map(|id| doc.node(*id))
        .filter_map(|n| match &n.kind {
            NodeKind::Element(e) => Some(e),
            _ => None,
        })
        .any(|e| doc.atoms().resolve(e.name) == "else" && !e.attributes.contains("if"));
    if earlier_else {
        return HookOutcome::Reject("Tag \"if\" should have one child \"else\".".to_string());
    }
    HookOutcome::Keep
}

fn bind_attribute(cx: &mut HookContext<'_>) -> HookOutcome {
    let Some(name) = cx.literal("name") else {
        return HookOutcome::Keep;
    };
    if cx.parent_name().is_none() {
        return HookOutcome::Reject("Tag \"attribute\" must have a parent tag.".to_string());
    }
    HookOutcome::BindToParentAttribute(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserConfig;
    use crate::shared::DiagnosticKind;
    use crate::tree_builder::{AttrValue, parse};

    fn run(source: &str) -> crate::tree_builder::Parsed {
        parse(source, ParserConfig::default(), &standard_registry())
    }

    fn messages(source: &str) -> Vec<String> {
        run(source)
            .diagnostics
            .into_iter()
            .map(|d| d.message)
            .collect()
    }

    #[test]
    fn standard_names() {
        let registry = standard_registry();
        for name in [
            "root", "comment", "context", "echo", "data", "if", "else", "each", "block", "render",
            "script", "header", "status", "async", "attribute",
        ] {
            assert!(registry.contains(name), "{name} missing");
        }
        assert_eq!(registry.len(), 15);
    }

    #[test]
    fn echo_defaults_and_escape_check() {
        let parsed = run(r#"<ten:echo/><ten:echo escape="bogus"/>"#);
        let root = parsed.document.root();
        let kept = parsed.document.children(root);
        assert_eq!(kept.len(), 1);
        let echo = parsed.document.element(kept[0]).expect("echo");
        assert_eq!(echo.attributes.literal("data"), Some("this"));
        assert_eq!(
            parsed.diagnostics[0].message,
            "Invalid value of attribute \"escape\""
        );
        assert_eq!(parsed.diagnostics[0].kind, DiagnosticKind::Rejected);
    }

    #[test]
    fn required_and_numeric_attributes() {
        assert_eq!(
            messages(r#"<ten:header/><ten:status code="abc"/><ten:status code="&ten.code;"/>"#),
            vec![
                "Attribute \"name\" is not defined.",
                "The value of the attribute \"code\" must be a number",
            ]
        );
        assert!(messages(r#"<ten:status code=" 404 "/>"#).is_empty());
    }

    #[test]
    fn else_rules() {
        assert!(messages("<ten:if><ten:else/></ten:if>").is_empty());
        assert!(messages(r#"<ten:if><ten:else if="a"/><ten:else/></ten:if>"#).is_empty());
        assert_eq!(
            messages("<ten:else/>"),
            vec!["Tag \"else\" must have a parent \"if\"."]
        );
        assert_eq!(
            messages("<ten:if><ten:else/><ten:else/></ten:if>"),
            vec!["Tag \"if\" should have one child \"else\"."]
        );
        assert_eq!(
            messages("<ten:if><ten:else>x</ten:else></ten:if>"),
            vec!["Tag \"else\" should be a single tag."]
        );
    }

    #[test]
    fn each_and_render_need_a_source() {
        assert_eq!(
            messages("<ten:each item=\"x\"></ten:each>"),
            vec!["Attribute \"array\" or \"object\" is not defined."]
        );
        assert!(messages("<ten:each array=\"list\"></ten:each>").is_empty());
        assert_eq!(
            messages("<ten:render/>"),
            vec!["Attribute \"block\" or \"file\" is not defined."]
        );
    }

    #[test]
    fn block_and_data_values() {
        assert_eq!(
            messages(r#"<ten:block name=""></ten:block><ten:block name="a" type="x"></ten:block>"#),
            vec![
                "Attribute \"name\" is empty.",
                "Invalid value of attribute \"type\""
            ]
        );
        assert_eq!(
            messages(r#"<ten:data key="k" action="merge"/>"#),
            vec!["Invalid value of attribute \"action\""]
        );
        assert!(messages(r#"<ten:data key="k" action="append"/>"#).is_empty());
    }

    #[test]
    fn attribute_tag_binds_to_parent() {
        let parsed = run(concat!(
            r#"<ten:render file="a.xml">"#,
            r#"<ten:attribute name="title">Hi &ten.name;</ten:attribute>"#,
            r#"</ten:render>"#
        ));
        assert!(parsed.diagnostics.is_empty());
        let doc = &parsed.document;
        let render = doc.children(doc.root())[0];
        assert!(doc.children(render).is_empty());
        let bound = doc
            .element(render)
            .and_then(|e| e.attributes.get("title"))
            .cloned();
        let Some(AttrValue::Template(template)) = bound else {
            panic!("title not bound: {bound:?}");
        };
        assert_eq!(doc.name(template), Some("attribute"));
        assert_eq!(doc.parent(template), None);
        assert_eq!(doc.children(template).len(), 2);
    }

    #[test]
    fn attribute_tag_needs_a_parent() {
        assert_eq!(
            messages(r#"<ten:attribute name="x"/>"#),
            vec!["Tag \"attribute\" must have a parent tag."]
        );
    }

    #[test]
    fn render_file_is_resolved_next_to_the_template() {
        let registry = standard_registry();
        let config = ParserConfig::default().with_path("views/pages/home.xml");
        let src = r#"<ten:render file="parts/nav.xml"/><ten:render file="/abs.xml"/>"#;
        let parsed = parse(src, config, &registry);
        assert!(parsed.diagnostics.is_empty());
        let doc = &parsed.document;
        let files: Vec<_> = doc
            .children(doc.root())
            .iter()
            .filter_map(|id| doc.element(*id)?.attributes.literal("file"))
            .collect();
        let expected = Path::new("views/pages").join("parts/nav.xml");
        assert_eq!(files, vec![&*expected.to_string_lossy(), "/abs.xml"]);

        let untouched = run(r#"<ten:render file="parts/nav.xml"/>"#);
        let doc = &untouched.document;
        let render = doc.children(doc.root())[0];
        assert_eq!(
            doc.element(render).and_then(|e| e.attributes.literal("file")),
            Some("parts/nav.xml")
        );
    }
}
