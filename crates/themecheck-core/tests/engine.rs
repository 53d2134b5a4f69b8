//! End-to-end behaviour of the engine on in-memory themes.

use std::path::Path;
use std::time::Duration;

use themecheck_core::html::substitute;
use themecheck_core::position::{index_to_row_column, row_column_to_index};
use themecheck_core::{
    Analyzer, Check, CheckContext, CheckError, CheckMeta, CheckScope, DisabledRanges, EngineError,
    ErrorMode, Event, EventArgs, HangPolicy, HtmlTree, InMemoryStorage, LintResult, LiquidTree,
    Limits, Node, NodeType,
};

#[derive(Debug, Default)]
struct FlagAssign;

impl Check for FlagAssign {
    fn meta(&self) -> CheckMeta {
        CheckMeta::new("FlagAssign", "E001")
    }

    fn subscriptions(&self) -> Vec<Event> {
        vec![Event::on(NodeType::Assign)]
    }

    fn handle(&mut self, _: &Event, args: EventArgs<'_>, cx: &mut CheckContext<'_>) -> Result<(), CheckError> {
        if let Some(node) = args.node() {
            cx.add_offense(node, "assign found");
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct FlagOutput;

impl Check for FlagOutput {
    fn meta(&self) -> CheckMeta {
        CheckMeta::new("FlagOutput", "E002")
    }

    fn subscriptions(&self) -> Vec<Event> {
        vec![Event::on(NodeType::Variable)]
    }

    fn handle(&mut self, _: &Event, args: EventArgs<'_>, cx: &mut CheckContext<'_>) -> Result<(), CheckError> {
        if let Some(node) = args.node() {
            if node.parent().is_some_and(|p| p.is_document() || p.node_type() == NodeType::BlockBody) {
                cx.add_offense(node, "output found");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct WholeFile;

impl Check for WholeFile {
    fn meta(&self) -> CheckMeta {
        CheckMeta::new("WholeFile", "E003")
    }

    fn subscriptions(&self) -> Vec<Event> {
        vec![Event::after(NodeType::Document)]
    }

    fn handle(&mut self, _: &Event, args: EventArgs<'_>, cx: &mut CheckContext<'_>) -> Result<(), CheckError> {
        if let Some(file) = args.file() {
            cx.add_file_offense(file, "file-level finding");
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Quiet {
    seen: usize,
}

impl Check for Quiet {
    fn meta(&self) -> CheckMeta {
        CheckMeta::new("Quiet", "E004")
    }

    fn subscriptions(&self) -> Vec<Event> {
        vec![Event::On(themecheck_core::Subject::Node), Event::End]
    }

    fn handle(&mut self, _: &Event, _: EventArgs<'_>, _: &mut CheckContext<'_>) -> Result<(), CheckError> {
        self.seen += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Broken;

impl Check for Broken {
    fn meta(&self) -> CheckMeta {
        CheckMeta::new("Broken", "E005")
    }

    fn subscriptions(&self) -> Vec<Event> {
        vec![Event::on(NodeType::Variable)]
    }

    fn handle(&mut self, _: &Event, _: EventArgs<'_>, _: &mut CheckContext<'_>) -> Result<(), CheckError> {
        Err(CheckError::other("lookup table is empty"))
    }
}

#[derive(Debug, Default)]
struct ImgSources {
    seen: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
}

impl Check for ImgSources {
    fn meta(&self) -> CheckMeta {
        CheckMeta::new("ImgSources", "E006")
    }

    fn subscriptions(&self) -> Vec<Event> {
        vec![Event::on_html("img")]
    }

    fn handle(&mut self, _: &Event, args: EventArgs<'_>, cx: &mut CheckContext<'_>) -> Result<(), CheckError> {
        if let Some(node) = args.html() {
            let src = node.attribute("src").map(|s| s.into_owned()).unwrap_or_default();
            self.seen
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(src);
            cx.add_html_offense(node, "img");
        }
        Ok(())
    }
}

fn analyze(files: &[(&str, &str)], checks: Vec<themecheck_core::CheckBox>) -> LintResult {
    Analyzer::builder()
        .storage(InMemoryStorage::from_files(files.iter().copied()))
        .checks(checks)
        .hang_policy(HangPolicy::new(|_| {}))
        .build()
        .unwrap()
        .analyze_theme()
        .unwrap()
}

#[test]
fn assign_is_flagged_once_on_line_one() {
    let result = analyze(
        &[("templates/index.liquid", "{% assign x = 1 %}\n{{ x }}")],
        vec![Box::new(FlagAssign)],
    );
    assert_eq!(result.offenses.len(), 1);
    assert_eq!(result.offenses[0].line(), 1);
    assert_eq!(result.offenses[0].message, "assign found");
}

#[test]
fn disabled_assign_is_suppressed() {
    let source = "{% comment %}theme-check-disable{% endcomment %}\n{% assign x = 1 %}\n{% comment %}theme-check-enable{% endcomment %}\n{{ x }}";
    let result = analyze(&[("templates/index.liquid", source)], vec![Box::new(FlagAssign)]);
    assert!(result.is_clean(), "{}", result.format_test_report(themecheck_core::Severity::Style));
}

#[test]
fn unnamed_disable_suppresses_every_check_between_directives() {
    let source = "{{ a }}\n{% comment %}theme-check-disable{% endcomment %}\n{% assign x = 1 %}{{ b }}\n{% comment %}theme-check-enable{% endcomment %}\n{% assign y = 2 %}";
    let result = analyze(
        &[("templates/index.liquid", source)],
        vec![Box::new(FlagAssign), Box::new(FlagOutput)],
    );
    let lines: Vec<(usize, &str)> = result
        .offenses
        .iter()
        .map(|o| (o.line(), o.check.as_str()))
        .collect();
    assert_eq!(lines, vec![(1, "FlagOutput"), (5, "FlagAssign")]);
}

#[test]
fn named_disable_only_affects_named_check() {
    let source = "{% # theme-check-disable FlagAssign %}\n{% assign x = 1 %}{{ x }}\n{% # theme-check-enable FlagAssign %}";
    let result = analyze(
        &[("templates/index.liquid", source)],
        vec![Box::new(FlagAssign), Box::new(FlagOutput)],
    );
    assert_eq!(result.offenses.len(), 1);
    assert_eq!(result.offenses[0].check, "FlagOutput");
}

#[test]
fn first_line_disable_suppresses_the_whole_file() {
    let source = "{% comment %}theme-check-disable{% endcomment %}\n{% assign x = 1 %}\n{{ x }}";
    let result = analyze(
        &[("snippets/a.liquid", source), ("snippets/b.liquid", "{% assign y = 2 %}")],
        vec![Box::new(FlagAssign), Box::new(WholeFile)],
    );
    let files: Vec<&Path> = result.offenses.iter().map(|o| o.file.as_path()).collect();
    assert_eq!(files, vec![Path::new("snippets/b.liquid"), Path::new("snippets/b.liquid")]);

    let tree = LiquidTree::parse("snippets/a.liquid", source, ErrorMode::Warn)
        .unwrap();
    let mut ranges = DisabledRanges::new();
    feed(tree.root(), &mut ranges);
    assert!(ranges.missing_end_index(Path::new("snippets/a.liquid")).is_empty());
}

#[test]
fn unclosed_disable_is_a_missing_enable() {
    let source = "{{ a }}\n{% comment %}theme-check-disable FlagAssign, FlagOutput{% endcomment %}\n{% assign x = 1 %}";
    let tree = LiquidTree::parse("snippets/a.liquid", source, ErrorMode::Warn)
        .unwrap();
    let mut ranges = DisabledRanges::new();
    feed(tree.root(), &mut ranges);
    assert_eq!(
        ranges.missing_end_index(Path::new("snippets/a.liquid")),
        vec![
            CheckScope::Named("FlagAssign".into()),
            CheckScope::Named("FlagOutput".into())
        ]
    );
}

fn feed(node: Node<'_>, ranges: &mut DisabledRanges) {
    for child in node.children() {
        feed(child, ranges);
    }
    if node.is_comment() {
        ranges.update(node);
    }
}

#[test]
fn analysis_is_idempotent() {
    let files = [
        ("templates/index.liquid", "{% assign x = 1 %}{{ x }}"),
        ("sections/a.liquid", "{% if a %}{{ a }}{% endif %}"),
        ("snippets/b.liquid", "{% comment %}theme-check-disable FlagOutput{% endcomment %}{{ b }}"),
    ];
    let mut analyzer = Analyzer::builder()
        .storage(InMemoryStorage::from_files(files))
        .check(FlagAssign)
        .check(FlagOutput)
        .check(WholeFile)
        .build()
        .unwrap();
    let first = analyzer.analyze_theme().unwrap();
    let second = analyzer.analyze_theme().unwrap();
    assert_eq!(first.offenses, second.offenses);
    assert_eq!(first.files_checked, 3);
}

#[test]
fn quiet_check_does_not_affect_others() {
    let files = [("templates/index.liquid", "{% assign x = 1 %}{{ x }}")];
    let alone = analyze(&files, vec![Box::new(FlagAssign), Box::new(FlagOutput)]);
    let together = analyze(
        &files,
        vec![Box::new(Quiet::default()), Box::new(FlagAssign), Box::new(FlagOutput)],
    );
    assert_eq!(alone.offenses, together.offenses);
}

#[test]
fn failing_check_aborts_the_run() {
    let error = Analyzer::builder()
        .storage(InMemoryStorage::from_files([("templates/index.liquid", "{% assign x = 1 %}\n{{ x }}")]))
        .check(FlagAssign)
        .check(Broken)
        .hang_policy(HangPolicy::new(|_| {}))
        .build()
        .unwrap()
        .analyze_theme()
        .err();
    let Some(EngineError::InternalBug(report)) = error else {
        panic!("expected an internal bug");
    };
    assert_eq!(report.check.as_deref(), Some("Broken"));
    assert_eq!(report.event.as_deref(), Some("on_variable"));
    assert_eq!(report.line, Some(1), "the first variable is the value of the assign");
    assert_eq!(report.message, "lookup table is empty");
    assert!(report.render().contains("Whoops!"));
}

#[test]
fn multi_line_src_is_restored() {
    let source = "<div>\n  <img src=\"{{\n    product.featured_image | img_url: \"300x\", crop: 'center'\n  }}\" alt=\"\">\n</div>";
    let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let result = analyze(
        &[("sections/product.liquid", source)],
        vec![Box::new(ImgSources {
            seen: std::sync::Arc::clone(&seen),
        })],
    );
    let seen = seen.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    assert_eq!(
        *seen,
        vec!["{{\n    product.featured_image | img_url: \"300x\", crop: 'center'\n  }}".to_string()]
    );
    assert_eq!(result.offenses.len(), 1);
    assert_eq!(result.offenses[0].line(), 2);
}

#[test]
fn placeholders_round_trip() {
    let source = "<a href=\"{{ url }}\" {% if x %}class=\"on\"{% endif %}>\n{% render 'icon',\n  size: 3 %}</a>{{ t }}";
    let substitution = substitute(source).unwrap();
    assert_eq!(substitution.text.len(), source.len());
    assert_eq!(substitution.text.lines().count(), source.lines().count());
    assert!(!substitution.text.contains("{%"));
    assert_eq!(substitution.table.restore(&substitution.text), source);

    let tree = HtmlTree::build("snippets/a.liquid", source.into(), Limits::default())
        .unwrap();
    let anchor = tree
        .root()
        .children()
        .find(|n| n.is_element())
        .unwrap();
    assert_eq!(anchor.attribute("href").as_deref(), Some("{{ url }}"));
    assert_eq!(anchor.markup(), "<a href=\"{{ url }}\" {% if x %}class=\"on\"{% endif %}>");
}

#[test]
fn positions_round_trip() {
    let content = "ab\ncdé\n\nfg";
    for index in 0..=content.len() {
        if !content.is_char_boundary(index) {
            continue;
        }
        let (row, column) = index_to_row_column(content, index);
        assert_eq!(row_column_to_index(content, row, column), index);
        assert_eq!(index_to_row_column(content, row_column_to_index(content, row, column)), (row, column));
    }
    assert_eq!(index_to_row_column("", 42), (0, 0));
    assert_eq!(row_column_to_index("", 3, 9), 0);
}

#[test]
fn strict_mode_reports_syntax_errors_as_events() {
    #[derive(Debug, Default)]
    struct Errors;

    impl Check for Errors {
        fn meta(&self) -> CheckMeta {
            CheckMeta::new("Errors", "E007")
        }

        fn subscriptions(&self) -> Vec<Event> {
            vec![Event::Error]
        }

        fn handle(&mut self, _: &Event, args: EventArgs<'_>, cx: &mut CheckContext<'_>) -> Result<(), CheckError> {
            if let EventArgs::Error { file, error, .. } = args {
                cx.add_file_offense(file, error.message.clone());
            }
            Ok(())
        }
    }

    let config = themecheck_core::Config::parse("[analyzer]\nliquid_error_mode = \"strict\"\n")
        .unwrap();
    let result = Analyzer::builder()
        .storage(InMemoryStorage::from_files([("templates/index.liquid", "{% if a %}")]))
        .config(config)
        .check(Errors)
        .timeout(Duration::ZERO)
        .build()
        .unwrap()
        .analyze_theme()
        .unwrap();
    assert_eq!(result.offenses.len(), 1);
    assert_eq!(result.offenses[0].message, "'if' tag was never closed");
}
