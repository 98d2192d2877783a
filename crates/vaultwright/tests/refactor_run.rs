use std::fs;
use std::path::Path;

use serde_yaml::Value;
use tempfile::tempdir;
use vaultwright::{
    FieldKind, FieldSpec, FrontmatterSchema, PlanOptions, RunOptions, RunOutcome, VaultError,
    locate_frontmatter, run, snapshot,
};

fn preview_options() -> RunOptions {
    RunOptions::default()
}

fn apply_options() -> RunOptions {
    RunOptions {
        apply: true,
        ..RunOptions::default()
    }
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[test]
fn missing_root_aborts_before_any_work() {
    let temp = tempdir().unwrap();
    let err = run(temp.path().join("absent"), &preview_options()).expect_err("scan error");
    assert!(matches!(err, VaultError::Scan(_)));
}

#[test]
fn dry_run_is_the_default_and_never_mutates() {
    let temp = tempdir().unwrap();
    write(temp.path(), "Messy Name.md", "hello [[Messy Name]]\n");

    let outcome = run(temp.path(), &preview_options()).unwrap();
    match outcome {
        RunOutcome::Preview { rendered, .. } => {
            assert!(rendered.contains("move: Messy Name.md -> messy-name.md"), "{rendered}");
        }
        other => panic!("expected preview, got {other:?}"),
    }

    assert!(temp.path().join("Messy Name.md").exists());
    assert_eq!(
        fs::read_to_string(temp.path().join("Messy Name.md")).unwrap(),
        "hello [[Messy Name]]\n"
    );
}

#[test]
fn self_reference_is_rewritten_along_with_the_rename() {
    let temp = tempdir().unwrap();
    write(
        temp.path(),
        "Meeting Notes (2023).md",
        "recap of [[Meeting Notes (2023)]] here\n",
    );

    let outcome = run(temp.path(), &apply_options()).unwrap();
    assert!(matches!(outcome, RunOutcome::Applied { .. }));

    let renamed = temp.path().join("meeting-notes-2023.md");
    assert!(renamed.exists());
    assert_eq!(
        fs::read_to_string(renamed).unwrap(),
        "recap of [[meeting-notes-2023]] here\n"
    );
}

#[test]
fn applying_the_engines_own_plan_is_idempotent() {
    let temp = tempdir().unwrap();
    write(temp.path(), "Note One.md", "see [[Note Two]] and [t](sub/TARGET.md)\n");
    write(temp.path(), "Note Two.md", "back to [[Note One]]\n");
    write(temp.path(), "sub/TARGET.md", "leaf\n");

    let first = run(temp.path(), &apply_options()).unwrap();
    assert!(matches!(first, RunOutcome::Applied { .. }));

    let second = run(temp.path(), &apply_options()).unwrap();
    assert!(
        matches!(second, RunOutcome::NoOp { .. }),
        "second run should be empty, got {second:?}"
    );
}

#[test]
fn spaced_inline_destinations_are_rewritten_when_their_target_moves() {
    let temp = tempdir().unwrap();
    write(temp.path(), "origin.md", "open [t](Dir Two/Target File.md)\n");
    write(temp.path(), "Dir Two/Target File.md", "leaf\n");

    run(temp.path(), &apply_options()).unwrap();

    assert!(temp.path().join("dir-two/target-file.md").exists());
    assert_eq!(
        fs::read_to_string(temp.path().join("origin.md")).unwrap(),
        "open [t](dir-two/target-file.md)\n"
    );

    // The rewritten link must resolve against the moved file.
    let (graph, warnings) = snapshot(temp.path()).unwrap();
    assert!(warnings.is_empty(), "{warnings:?}");
    let origin = graph
        .notes()
        .iter()
        .find(|n| n.rel_path == "origin.md")
        .unwrap();
    assert!(origin.references[0].target.is_some());
}

#[test]
fn renamed_references_still_resolve_to_the_same_note() {
    let temp = tempdir().unwrap();
    write(temp.path(), "Target Note.md", "unique-marker-alpha\n");
    write(temp.path(), "journal.md", "see [[Target Note]]\n");

    run(temp.path(), &apply_options()).unwrap();

    let (graph, warnings) = snapshot(temp.path()).unwrap();
    assert!(warnings.is_empty(), "{warnings:?}");

    let journal = graph
        .notes()
        .iter()
        .find(|n| n.rel_path == "journal.md")
        .unwrap();
    let target = journal.references[0].target.expect("still resolves");
    assert!(graph.note(target).content.contains("unique-marker-alpha"));
}

#[test]
fn duplicate_titles_get_deterministic_suffixes_and_updated_references() {
    let temp = tempdir().unwrap();
    // Both folders slug to `a`, so both notes land on `a/todo.md`.
    write(temp.path(), "A!/Todo.md", "first todo\n");
    write(temp.path(), "A_/Todo.md", "second todo\n");
    write(
        temp.path(),
        "journal.md",
        "open [x](A!/Todo.md) and [y](A_/Todo.md)\n",
    );

    run(temp.path(), &apply_options()).unwrap();

    assert_eq!(
        fs::read_to_string(temp.path().join("a/todo.md")).unwrap(),
        "first todo\n"
    );
    assert_eq!(
        fs::read_to_string(temp.path().join("a/todo-1.md")).unwrap(),
        "second todo\n"
    );
    assert_eq!(
        fs::read_to_string(temp.path().join("journal.md")).unwrap(),
        "open [x](a/todo.md) and [y](a/todo-1.md)\n"
    );

    // Re-resolve: both rewritten references must still point at distinct notes.
    let (graph, _) = snapshot(temp.path()).unwrap();
    let journal = graph
        .notes()
        .iter()
        .find(|n| n.rel_path == "journal.md")
        .unwrap();
    let targets: Vec<_> = journal.references.iter().map(|r| r.target).collect();
    assert!(targets.iter().all(Option::is_some));
    assert_ne!(targets[0], targets[1]);
}

#[test]
fn schema_normalization_injects_defaults_and_coerces_scalars() {
    let temp = tempdir().unwrap();
    write(temp.path(), "missing.md", "---\ntitle: keep\n---\nbody\n");
    write(temp.path(), "scalar.md", "---\ntags: work\n---\nbody\n");

    let options = RunOptions {
        apply: true,
        plan: PlanOptions {
            schema: FrontmatterSchema::new(vec![
                FieldSpec::new("tags", FieldKind::Seq)
                    .required()
                    .with_default(Value::Sequence(Vec::new())),
            ]),
            ..PlanOptions::default()
        },
    };
    run(temp.path(), &options).unwrap();

    let missing = fs::read_to_string(temp.path().join("missing.md")).unwrap();
    let block: serde_yaml::Mapping =
        serde_yaml::from_str(locate_frontmatter(&missing).unwrap().yaml).unwrap();
    assert_eq!(block[&Value::from("tags")], Value::Sequence(Vec::new()));
    assert_eq!(block[&Value::from("title")], Value::from("keep"));
    assert!(missing.ends_with("body\n"));

    let scalar = fs::read_to_string(temp.path().join("scalar.md")).unwrap();
    let block: serde_yaml::Mapping =
        serde_yaml::from_str(locate_frontmatter(&scalar).unwrap().yaml).unwrap();
    assert_eq!(
        block[&Value::from("tags")],
        Value::Sequence(vec![Value::from("work")])
    );
}

#[test]
fn bytes_outside_rewritten_spans_are_preserved_exactly() {
    let temp = tempdir().unwrap();
    let body = "prefix\t \u{00e9}\u{200b}  [[Odd Target]]  trailing spaces   \nlast line no newline";
    write(temp.path(), "Odd Target.md", "target\n");
    write(temp.path(), "keeper.md", body);

    run(temp.path(), &apply_options()).unwrap();

    assert_eq!(
        fs::read_to_string(temp.path().join("keeper.md")).unwrap(),
        body.replace("[[Odd Target]]", "[[odd-target]]")
    );
}

#[test]
fn unresolved_and_ambiguous_references_surface_as_warnings_and_stay_untouched() {
    let temp = tempdir().unwrap();
    write(temp.path(), "one/Todo.md", "a\n");
    write(temp.path(), "two/Todo.md", "b\n");
    write(
        temp.path(),
        "journal.md",
        "[[Todo]] and [[No Such Note]] stay as written\n",
    );

    let outcome = run(temp.path(), &preview_options()).unwrap();
    let warnings = match &outcome {
        RunOutcome::NoOp { warnings } => warnings,
        RunOutcome::Preview { warnings, .. } => warnings,
        RunOutcome::Applied { warnings, .. } => warnings,
    };
    assert_eq!(warnings.len(), 2, "{warnings:?}");

    run(temp.path(), &apply_options()).unwrap();
    assert_eq!(
        fs::read_to_string(temp.path().join("journal.md")).unwrap(),
        "[[Todo]] and [[No Such Note]] stay as written\n"
    );
}

#[test]
fn malformed_frontmatter_is_left_byte_identical() {
    let temp = tempdir().unwrap();
    let content = "---\n: [broken yaml\n---\nbody [[Good Note]]\n";
    write(temp.path(), "broken.md", content);
    write(temp.path(), "Good Note.md", "fine\n");

    let options = RunOptions {
        apply: true,
        plan: PlanOptions {
            schema: FrontmatterSchema::new(vec![
                FieldSpec::new("tags", FieldKind::Seq).with_default(Value::Sequence(Vec::new())),
            ]),
            ..PlanOptions::default()
        },
    };
    run(temp.path(), &options).unwrap();

    // The reference in the body is rewritten; the malformed block is not.
    assert_eq!(
        fs::read_to_string(temp.path().join("broken.md")).unwrap(),
        "---\n: [broken yaml\n---\nbody [[good-note]]\n"
    );
}
