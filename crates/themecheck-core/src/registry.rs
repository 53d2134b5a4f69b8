//! Registered checks and event dispatch.

use std::any::Any;
use std::backtrace::Backtrace;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::time::Duration;

use tracing::{debug, trace};

use crate::check::{CheckBox, CheckContext, CheckError, CheckMeta, Event, EventArgs};
use crate::config::{CheckConfig, ConfigError};
use crate::error::{BugReport, EngineError};
use crate::theme::Theme;
use crate::types::{Offense, Severity};
use crate::watchdog::{HangPolicy, Invocation, Watchdog};

/// Default ceiling for one check invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Which checks take part in dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    /// Every check.
    #[default]
    All,
    /// Only checks marked single-file.
    SingleFile,
}

#[derive(Debug)]
struct Entry {
    check: CheckBox,
    meta: CheckMeta,
    severity: Severity,
    ignore: Vec<glob::Pattern>,
    ignored: bool,
}

impl Entry {
    fn in_scope(&self, scope: Scope) -> bool {
        scope == Scope::All || self.meta.single_file
    }
}

/// The checks of a run, indexed by the events they subscribe to.
#[derive(Debug)]
pub struct CheckRegistry {
    entries: Vec<Entry>,
    index: HashMap<Event, Vec<usize>>,
    watchdog: Watchdog,
    timeout: Duration,
    scope: Scope,
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckRegistry {
    /// Creates an empty registry with the default timeout and hang policy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            watchdog: Watchdog::default(),
            timeout: DEFAULT_TIMEOUT,
            scope: Scope::All,
        }
    }

    /// Sets the per-invocation ceiling. `Duration::ZERO` disables it.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replaces the watchdog, e.g. to change the hang policy.
    #[must_use]
    pub fn with_watchdog(mut self, watchdog: Watchdog) -> Self {
        self.watchdog = watchdog;
        self
    }

    /// Sets what happens to a check that never returns.
    #[must_use]
    pub fn with_hang_policy(self, policy: HangPolicy) -> Self {
        self.with_watchdog(Watchdog::new(policy))
    }

    /// Registers a check with its default configuration.
    pub fn register(&mut self, check: CheckBox) {
        let meta = check.meta();
        self.push(check, meta, meta.severity, Vec::new());
    }

    /// Registers a check and applies its configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an ignore pattern is invalid or the check rejects
    /// its options.
    pub fn register_configured(
        &mut self,
        mut check: CheckBox,
        config: &CheckConfig,
    ) -> Result<(), EngineError> {
        let meta = check.meta();
        check.configure(config).map_err(|e| {
            EngineError::Config(ConfigError::Parse {
                message: format!("[checks.{}] {e}", meta.name),
            })
        })?;
        let ignore = config.ignore_patterns()?;
        let severity = config.severity.unwrap_or(meta.severity);
        self.push(check, meta, severity, ignore);
        Ok(())
    }

    fn push(&mut self, check: CheckBox, meta: CheckMeta, severity: Severity, ignore: Vec<glob::Pattern>) {
        let position = self.entries.len();
        let mut events = check.subscriptions();
        events.sort();
        events.dedup();
        for event in events {
            self.index.entry(event).or_default().push(position);
        }
        debug!(check = meta.name, "registered");
        self.entries.push(Entry {
            check,
            meta,
            severity,
            ignore,
            ignored: false,
        });
    }

    /// Number of registered checks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no check is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Metadata of every registered check, in registration order.
    pub fn metas(&self) -> impl Iterator<Item = CheckMeta> + '_ {
        self.entries.iter().map(|e| e.meta)
    }

    /// Metadata of a check by name.
    #[must_use]
    pub fn meta(&self, name: &str) -> Option<CheckMeta> {
        self.metas().find(|m| m.name == name)
    }

    /// Checks that disable directives can suppress.
    #[must_use]
    pub fn disableable(&self) -> Vec<CheckMeta> {
        self.metas().filter(|m| m.can_disable).collect()
    }

    /// Checks that need the whole theme.
    #[must_use]
    pub fn whole_theme(&self) -> Vec<CheckMeta> {
        self.metas().filter(|m| !m.single_file).collect()
    }

    /// Checks that look at one file at a time.
    #[must_use]
    pub fn single_file(&self) -> Vec<CheckMeta> {
        self.metas().filter(|m| m.single_file).collect()
    }

    /// Restricts dispatch to a subset of the checks.
    pub fn set_scope(&mut self, scope: Scope) {
        self.scope = scope;
    }

    /// Returns true if some check in scope subscribes to `event`.
    #[must_use]
    pub fn subscribed(&self, event: &Event) -> bool {
        self.index
            .get(event)
            .is_some_and(|ids| ids.iter().any(|&i| self.entries[i].in_scope(self.scope)))
    }

    /// Returns true if some check in scope wants the HTML view of files.
    #[must_use]
    pub fn wants_html(&self) -> bool {
        self.index
            .iter()
            .filter(|(event, _)| event.is_html())
            .any(|(_, ids)| ids.iter().any(|&i| self.entries[i].in_scope(self.scope)))
    }

    /// Sets the ignored flag of every check from its ignore patterns.
    pub fn update_ignored(&mut self, path: &Path) {
        for entry in &mut self.entries {
            entry.ignored = entry.ignore.iter().any(|p| p.matches_path(path));
            if entry.ignored {
                debug!(check = entry.meta.name, file = %path.display(), "ignored");
            }
        }
    }

    /// Clears per-run state of every check.
    pub fn reset(&mut self) {
        for entry in &mut self.entries {
            entry.check.reset();
            entry.ignored = false;
        }
    }

    /// Dispatches `event` to every subscribed check that is in scope and not
    /// ignored, in registration order.
    ///
    /// # Errors
    ///
    /// Stops at the first failing check. [`CheckError::Parse`] becomes
    /// [`EngineError::Parse`]; any other error, a panic, a node that cannot
    /// be located or a missed deadline becomes an internal bug.
    pub fn call(
        &mut self,
        event: &Event,
        args: EventArgs<'_>,
        theme: &Theme,
        offenses: &mut Vec<Offense>,
    ) -> Result<(), EngineError> {
        let Some(ids) = self.index.get(event) else {
            return Ok(());
        };
        for &id in ids {
            let entry = &mut self.entries[id];
            if entry.ignored || !entry.in_scope(self.scope) {
                continue;
            }
            trace!(check = entry.meta.name, %event, "dispatch");

            let timed = !self.timeout.is_zero();
            if timed {
                self.watchdog.arm(
                    self.timeout,
                    Invocation {
                        check: entry.meta.name,
                        event: event.to_string(),
                        file: args.file().map(Path::to_path_buf),
                    },
                );
            }
            let outcome = {
                let mut cx = CheckContext::new(
                    theme,
                    entry.meta,
                    entry.severity,
                    offenses,
                    self.watchdog.token(),
                );
                let check = &mut entry.check;
                catch_unwind(AssertUnwindSafe(|| check.handle(event, args, &mut cx)))
            };
            let timed_out = timed && self.watchdog.disarm();

            let failure = match outcome {
                _ if timed_out => Some(Failure::Timeout),
                Ok(Ok(())) => None,
                Ok(Err(CheckError::Parse(source))) => {
                    return Err(EngineError::Parse {
                        path: args.file().map(Path::to_path_buf).unwrap_or_default(),
                        source,
                    });
                }
                Ok(Err(error)) => Some(Failure::Error(error.to_string())),
                Err(payload) => Some(Failure::Panic(panic_message(payload.as_ref()))),
            };
            let failure = failure.or_else(|| located_failure(args));
            if let Some(failure) = failure {
                return Err(failure.into_error(entry, event, args));
            }
        }
        Ok(())
    }
}

enum Failure {
    Timeout,
    Error(String),
    Panic(String),
    Locate(String),
}

impl Failure {
    fn into_error(self, entry: &Entry, event: &Event, args: EventArgs<'_>) -> EngineError {
        let (line, excerpt) = args.describe();
        let mut report = BugReport {
            check: Some(entry.meta.name.to_string()),
            event: Some(event.to_string()),
            file: args.file().map(Path::to_path_buf),
            line,
            excerpt,
            message: String::new(),
            config: Some(format!("{:#?}", entry.check)),
            backtrace: Some(Backtrace::force_capture().to_string()),
        };
        match self {
            Self::Timeout => {
                report.message = "check exceeded its time budget".to_string();
                EngineError::Timeout(Box::new(report))
            }
            Self::Error(message) | Self::Locate(message) => {
                report.message = message;
                EngineError::InternalBug(Box::new(report))
            }
            Self::Panic(message) => {
                report.message = format!("panicked: {message}");
                EngineError::InternalBug(Box::new(report))
            }
        }
    }
}

/// Failures recorded on the trees while the check ran.
fn located_failure(args: EventArgs<'_>) -> Option<Failure> {
    match args {
        EventArgs::Liquid(node) => node.tree().take_failure().map(|e| Failure::Locate(e.to_string())),
        EventArgs::Html(node) => node.tree().take_failure().map(|e| Failure::Locate(e.to_string())),
        _ => None,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{Check, Subject};
    use crate::liquid::{ErrorMode, NodeType, ParseError};
    use crate::node::LiquidTree;
    use crate::storage::InMemoryStorage;

    #[derive(Debug, Default)]
    struct Recorder {
        seen: Vec<String>,
        fail_on: Option<&'static str>,
        panic_on: Option<&'static str>,
        parse_error: bool,
    }

    impl Check for Recorder {
        fn meta(&self) -> CheckMeta {
            CheckMeta::new("Recorder", "T001")
        }

        fn subscriptions(&self) -> Vec<Event> {
            vec![
                Event::on(NodeType::Assign),
                Event::On(Subject::Tag),
                Event::End,
            ]
        }

        fn handle(
            &mut self,
            event: &Event,
            args: EventArgs<'_>,
            cx: &mut CheckContext<'_>,
        ) -> Result<(), CheckError> {
            let name = event.to_string();
            if self.parse_error {
                return Err(ParseError::new("bad", 1, "{% x %}").into());
            }
            if self.fail_on == Some(name.as_str()) {
                return Err(CheckError::other("deliberate failure"));
            }
            if self.panic_on == Some(name.as_str()) {
                panic!("deliberate panic");
            }
            if let Some(node) = args.node() {
                cx.add_offense(node, name.clone());
            }
            self.seen.push(name);
            Ok(())
        }

        fn reset(&mut self) {
            self.seen.clear();
        }
    }

    #[derive(Debug)]
    struct Whole;

    impl Check for Whole {
        fn meta(&self) -> CheckMeta {
            CheckMeta::new("Whole", "T002").whole_theme().mandatory()
        }

        fn subscriptions(&self) -> Vec<Event> {
            vec![Event::End, Event::on_html("img")]
        }

        fn handle(&mut self, _: &Event, _: EventArgs<'_>, cx: &mut CheckContext<'_>) -> Result<(), CheckError> {
            cx.add_file_offense("theme", "end");
            Ok(())
        }
    }

    fn theme() -> Theme {
        Theme::new(InMemoryStorage::new()).unwrap()
    }

    fn tree() -> LiquidTree {
        LiquidTree::parse("templates/index.liquid", "{% assign x = 1 %}", ErrorMode::Warn)
            .unwrap()
    }

    fn registry(check: Recorder) -> CheckRegistry {
        let mut registry = CheckRegistry::new().with_hang_policy(HangPolicy::new(|_| {}));
        registry.register(Box::new(check));
        registry
    }

    #[test]
    fn dispatches_to_subscribers() {
        let theme = theme();
        let tree = tree();
        let assign = tree.root().children().next().unwrap();
        let mut registry = registry(Recorder::default());
        let mut offenses = Vec::new();

        for event in [Event::On(Subject::Tag), Event::on(NodeType::Assign), Event::on(NodeType::Text)] {
            registry
                .call(&event, EventArgs::Liquid(assign), &theme, &mut offenses)
                .unwrap();
        }
        let messages: Vec<_> = offenses.iter().map(|o| o.message.as_str()).collect();
        assert_eq!(messages, vec!["on_tag", "on_assign"]);
        assert_eq!(offenses[0].line(), 1);
    }

    #[test]
    fn check_error_is_an_internal_bug() {
        let theme = theme();
        let tree = tree();
        let assign = tree.root().children().next().unwrap();
        let mut registry = registry(Recorder {
            fail_on: Some("on_assign"),
            ..Recorder::default()
        });
        let error = registry
            .call(&Event::on(NodeType::Assign), EventArgs::Liquid(assign), &theme, &mut Vec::new())
            .err();
        let Some(EngineError::InternalBug(report)) = error else {
            panic!("expected an internal bug");
        };
        assert_eq!(report.check.as_deref(), Some("Recorder"));
        assert_eq!(report.event.as_deref(), Some("on_assign"));
        assert_eq!(report.line, Some(1));
        assert_eq!(report.excerpt.as_deref(), Some("{% assign x = 1 %}"));
        assert_eq!(report.message, "deliberate failure");
        assert!(report.config.as_deref().unwrap_or_default().contains("Recorder"));
    }

    #[test]
    fn panic_is_an_internal_bug() {
        let theme = theme();
        let mut registry = registry(Recorder {
            panic_on: Some("on_end"),
            ..Recorder::default()
        });
        let error = registry
            .call(&Event::End, EventArgs::End, &theme, &mut Vec::new())
            .err();
        let Some(EngineError::InternalBug(report)) = error else {
            panic!("expected an internal bug");
        };
        assert_eq!(report.message, "panicked: deliberate panic");
        assert!(report.file.is_none());
    }

    #[test]
    fn parse_errors_propagate_as_parse() {
        let theme = theme();
        let mut registry = registry(Recorder {
            parse_error: true,
            ..Recorder::default()
        });
        let error = registry
            .call(&Event::End, EventArgs::End, &theme, &mut Vec::new())
            .err();
        assert!(matches!(error, Some(EngineError::Parse { .. })));
    }

    #[test]
    fn scope_and_views() {
        let theme = theme();
        let mut registry = registry(Recorder::default());
        registry.register(Box::new(Whole));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.disableable().len(), 1);
        assert_eq!(registry.whole_theme()[0].name, "Whole");
        assert_eq!(registry.single_file()[0].name, "Recorder");
        assert!(registry.wants_html());

        registry.set_scope(Scope::SingleFile);
        assert!(!registry.wants_html());
        let mut offenses = Vec::new();
        registry
            .call(&Event::End, EventArgs::End, &theme, &mut offenses)
            .unwrap();
        assert!(offenses.is_empty());

        registry.set_scope(Scope::All);
        registry
            .call(&Event::End, EventArgs::End, &theme, &mut offenses)
            .unwrap();
        assert_eq!(offenses.len(), 1);
        assert_eq!(offenses[0].check, "Whole");
    }

    #[test]
    fn ignored_checks_are_skipped() {
        let theme = theme();
        let mut registry = CheckRegistry::new();
        let config = CheckConfig {
            ignore: vec!["templates/*".into()],
            severity: Some(Severity::Style),
            ..CheckConfig::default()
        };
        registry
            .register_configured(Box::new(Recorder::default()), &config)
            .unwrap();
        let tree = tree();
        let assign = tree.root().children().next().unwrap();
        let mut offenses = Vec::new();

        registry.update_ignored(Path::new("templates/index.liquid"));
        registry
            .call(&Event::on(NodeType::Assign), EventArgs::Liquid(assign), &theme, &mut offenses)
            .unwrap();
        assert!(offenses.is_empty());

        registry.update_ignored(Path::new("sections/header.liquid"));
        registry
            .call(&Event::on(NodeType::Assign), EventArgs::Liquid(assign), &theme, &mut offenses)
            .unwrap();
        assert_eq!(offenses.len(), 1);
        assert_eq!(offenses[0].severity, Severity::Style);
    }

    #[derive(Debug)]
    struct Sleeper;

    impl Check for Sleeper {
        fn meta(&self) -> CheckMeta {
            CheckMeta::new("Sleeper", "T003")
        }

        fn subscriptions(&self) -> Vec<Event> {
            vec![Event::End]
        }

        fn handle(&mut self, _: &Event, _: EventArgs<'_>, cx: &mut CheckContext<'_>) -> Result<(), CheckError> {
            let start = std::time::Instant::now();
            while !cx.is_cancelled() && start.elapsed() < Duration::from_secs(5) {
                std::thread::sleep(Duration::from_millis(2));
            }
            Ok(())
        }
    }

    #[test]
    fn slow_check_times_out() {
        let theme = theme();
        let mut registry = CheckRegistry::new()
            .with_timeout(Duration::from_millis(20))
            .with_hang_policy(HangPolicy::new(|_| {}));
        registry.register(Box::new(Sleeper));
        let error = registry
            .call(&Event::End, EventArgs::End, &theme, &mut Vec::new())
            .err();
        let Some(EngineError::Timeout(report)) = error else {
            panic!("expected a timeout");
        };
        assert_eq!(report.check.as_deref(), Some("Sleeper"));
    }
}
