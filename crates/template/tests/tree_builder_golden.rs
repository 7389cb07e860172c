use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use template::tree_snapshot::TreeSnapshot;
use template::{Diagnostic, Parser, ParserConfig, standard_registry};

const TREE_BUILDER_FORMAT_V1: &str = "tree-builder-v1";

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
enum FixtureStatus {
    Active,
    Xfail,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FixtureFile {
    format: String,
    status: FixtureStatus,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    namespace: Option<String>,
    input: String,
    tree: Vec<String>,
    #[serde(default)]
    diagnostics: Vec<String>,
}

struct Fixture {
    name: String,
    path: PathBuf,
    file: FixtureFile,
}

#[derive(Debug, PartialEq, Eq)]
struct RunOutput {
    tree: Vec<String>,
    diagnostics: Vec<String>,
}

#[test]
fn tree_builder_golden_fixtures() {
    let fixtures = load_fixtures();
    let filter = env::var("TEMPLATE_TREE_FIXTURE").ok();
    let mut ran = 0usize;
    for fixture in fixtures {
        if filter
            .as_deref()
            .is_some_and(|f| !fixture.name.contains(f))
        {
            continue;
        }
        ran += 1;
        let actual = run_fixture(&fixture);
        let expected = RunOutput {
            tree: fixture.file.tree.clone(),
            diagnostics: fixture.file.diagnostics.clone(),
        };
        match fixture.file.status {
            FixtureStatus::Active => {
                if actual != expected {
                    panic!(
                        "mismatch in fixture '{}'\npath: {}\n{}",
                        fixture.name,
                        fixture.path.display(),
                        diff_output(&expected, &actual)
                    );
                }
            }
            FixtureStatus::Xfail => {
                if actual == expected {
                    panic!(
                        "fixture '{}' matched but is marked xfail; reason: {}",
                        fixture.name,
                        fixture.file.reason.as_deref().unwrap_or("<missing reason>")
                    );
                }
            }
        }
    }
    assert!(ran > 0, "no fixtures matched filter");
}

fn run_fixture(fixture: &Fixture) -> RunOutput {
    let registry = standard_registry();
    let mut config = ParserConfig::default();
    if let Some(namespace) = &fixture.file.namespace {
        config = config.with_namespace(namespace.clone());
    }
    let parsed = Parser::new(config, &registry).parse(&fixture.file.input);
    RunOutput {
        tree: TreeSnapshot::new(&parsed.document).as_lines().to_vec(),
        diagnostics: parsed.diagnostics.iter().map(diagnostic_line).collect(),
    }
}

fn diagnostic_line(diagnostic: &Diagnostic) -> String {
    format!(
        "{} {} {}:{}",
        diagnostic.message,
        diagnostic.tag_name.as_deref().unwrap_or("-"),
        diagnostic.line(),
        diagnostic.column()
    )
}

fn diff_output(expected: &RunOutput, actual: &RunOutput) -> String {
    let mut out = String::new();
    out.push_str("expected tree:\n");
    out.push_str(&expected.tree.join("\n"));
    out.push_str("\nactual tree:\n");
    out.push_str(&actual.tree.join("\n"));
    out.push_str("\nexpected diagnostics:\n");
    out.push_str(&expected.diagnostics.join("\n"));
    out.push_str("\nactual diagnostics:\n");
    out.push_str(&actual.diagnostics.join("\n"));
    out
}

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/tree_builder")
}

fn load_fixtures() -> Vec<Fixture> {
    let dir = fixtures_dir();
    let mut paths: Vec<PathBuf> = fs::read_dir(&dir)
        .unwrap_or_else(|err| panic!("failed to read fixture dir {dir:?}: {err}"))
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    paths.sort();
    paths
        .into_iter()
        .map(|path| {
            let content = fs::read_to_string(&path)
                .unwrap_or_else(|err| panic!("failed to read fixture {path:?}: {err}"));
            let file: FixtureFile = toml::from_str(&content)
                .unwrap_or_else(|err| panic!("failed to parse fixture {path:?}: {err}"));
            assert_eq!(
                file.format, TREE_BUILDER_FORMAT_V1,
                "unsupported fixture format in {path:?}"
            );
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            Fixture { name, path, file }
        })
        .collect()
}
