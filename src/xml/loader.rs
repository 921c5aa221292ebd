//! The context-stack driven streaming parser.

use std::io::{BufRead, BufReader};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::attributes::AttributeSet;
use super::context::{Flow, HandlerTable, UnknownElementPolicy};
use crate::config;
use crate::error::XmlError;
use crate::vfs::{GameVfs, path};

/// How a parser run ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    /// The whole stream was consumed.
    Completed,
    /// A handler returned [`Flow::Stop`].
    Stopped,
}

impl ParseOutcome {
    /// Check if the stream was parsed to the end.
    pub fn is_completed(self) -> bool {
        self == ParseOutcome::Completed
    }
}

/// One entry of the context stack.
#[derive(Debug)]
struct Frame {
    context: String,
    /// Element depth of the element that pushed this frame.
    opened_at: usize,
}

/// Streaming XML parser dispatching element events through a [`HandlerTable`].
///
/// Each call to one of the `parse_*` methods is an independent run with its
/// own context stack. Runs are synchronous and single-threaded; a handler
/// including another file starts a nested run that finishes before the
/// including handler returns.
pub struct XmlLoader<'a, S> {
    table: &'a HandlerTable<S>,
    vfs: &'a GameVfs,
    max_include_depth: usize,
    unknown_elements: UnknownElementPolicy,
}

impl<'a, S> XmlLoader<'a, S> {
    /// Create a loader using the global configuration.
    pub fn new(table: &'a HandlerTable<S>, vfs: &'a GameVfs) -> Self {
        let config = config::get();
        Self {
            table,
            vfs,
            max_include_depth: config.max_include_depth,
            unknown_elements: config.unknown_elements,
        }
    }

    /// Set the file indirection limit.
    pub fn with_max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }

    /// Set the policy for contexts that do not define their own.
    pub fn with_unknown_elements(mut self, policy: UnknownElementPolicy) -> Self {
        self.unknown_elements = policy;
        self
    }

    /// Filesystem used for includes.
    pub fn vfs(&self) -> &GameVfs {
        self.vfs
    }

    /// Parse a file from the virtual filesystem.
    pub fn parse_path(&self, path: &str, state: &mut S) -> Result<ParseOutcome, XmlError> {
        self.parse_path_at(path, state, 0)
    }

    /// Parse an in-memory document; `name` is used for errors and relative includes.
    pub fn parse_str(&self, name: &str, xml: &str, state: &mut S) -> Result<ParseOutcome, XmlError> {
        self.run(xml.as_bytes(), &path::normalize(name), state, 0)
    }

    /// Parse any buffered reader; `name` is used for errors and relative includes.
    pub fn parse_reader<R: BufRead>(
        &self,
        name: &str,
        reader: R,
        state: &mut S,
    ) -> Result<ParseOutcome, XmlError> {
        self.run(reader, &path::normalize(name), state, 0)
    }

    fn parse_path_at(&self, path: &str, state: &mut S, depth: usize) -> Result<ParseOutcome, XmlError> {
        let handle = self.vfs.open(path)?;
        let path = handle.path().to_string();
        log::debug!("parsing {path} from {} (depth {depth})", handle.source());
        self.run(BufReader::new(handle), &path, state, depth)
    }

    fn run<R: BufRead>(
        &self,
        reader: R,
        path: &str,
        state: &mut S,
        depth: usize,
    ) -> Result<ParseOutcome, XmlError> {
        let mut xml = Reader::from_reader(reader);
        xml.config_mut().trim_text(true);
        xml.config_mut().check_end_names = true;

        let mut stack = vec![Frame {
            context: self.table.initial().to_string(),
            opened_at: 0,
        }];
        // Depth of currently open elements.
        let mut open = 0usize;
        // Nesting inside an ignored subtree; 0 when not skipping.
        let mut skip = 0usize;
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let event = match xml.read_event_into(&mut buf) {
                Ok(event) => event,
                Err(e) => {
                    return Err(XmlError::malformed(path, xml.buffer_position() as u64, e));
                }
            };

            match event {
                Event::Start(element) => {
                    open += 1;
                    if skip > 0 {
                        skip += 1;
                        continue;
                    }
                    match self.start(&element, path, state, depth, &mut stack, open, false)? {
                        Step::Continue => {}
                        Step::Skip => skip = 1,
                        Step::Stop => return Ok(ParseOutcome::Stopped),
                    }
                }
                Event::Empty(element) => {
                    open += 1;
                    if skip == 0 {
                        let step = self.start(&element, path, state, depth, &mut stack, open, true)?;
                        if step == Step::Stop {
                            return Ok(ParseOutcome::Stopped);
                        }
                        close(&mut stack, open);
                    }
                    open -= 1;
                }
                Event::End(_) => {
                    if open == 0 {
                        return Err(XmlError::malformed(
                            path,
                            xml.buffer_position() as u64,
                            "end tag without matching start tag",
                        ));
                    }
                    if skip > 0 {
                        skip -= 1;
                    } else {
                        close(&mut stack, open);
                    }
                    open -= 1;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if open != 0 || stack.len() != 1 {
            return Err(XmlError::malformed(
                path,
                xml.buffer_position() as u64,
                format!("unexpected end of stream with {open} element(s) still open"),
            ));
        }
        Ok(ParseOutcome::Completed)
    }

    #[allow(clippy::too_many_arguments)]
    fn start(
        &self,
        element: &BytesStart<'_>,
        path: &str,
        state: &mut S,
        depth: usize,
        stack: &mut Vec<Frame>,
        open: usize,
        empty: bool,
    ) -> Result<Step, XmlError> {
        let name = std::str::from_utf8(element.name().as_ref())
            .map_err(|e| XmlError::malformed(path, 0, e))?
            .to_string();
        let attributes = read_attributes(element, path)?;

        let Some(top) = stack.last() else {
            return Err(XmlError::malformed(path, 0, "context stack underflow"));
        };

        let Some(handler) = self.table.lookup(&top.context, &name) else {
            let policy = self
                .table
                .get(&top.context)
                .and_then(|c| c.policy())
                .unwrap_or(self.unknown_elements);
            return match policy {
                UnknownElementPolicy::Ignore => {
                    log::debug!("ignoring <{name}> in context '{}' ({path})", top.context);
                    Ok(if empty { Step::Continue } else { Step::Skip })
                }
                UnknownElementPolicy::Descend => Ok(Step::Continue),
                UnknownElementPolicy::Error => Err(XmlError::UnknownElement {
                    path: path.to_string(),
                    context: top.context.clone(),
                    element: name,
                }),
            };
        };

        let mut scope = ParseScope {
            loader: self,
            path,
            depth,
            context: &top.context,
            pushed: None,
        };
        let flow = handler(&mut scope, state, &name, &attributes)?;

        if let Some(context) = scope.pushed.take() {
            log::trace!("push context '{context}' at <{name}> ({path})");
            stack.push(Frame {
                context,
                opened_at: open,
            });
        }

        Ok(match flow {
            Flow::Continue => Step::Continue,
            Flow::Stop => Step::Stop,
        })
    }
}

/// Internal result of dispatching one start element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Continue,
    Skip,
    Stop,
}

/// Pop the top frame if it was pushed by the element closing at depth `open`.
fn close(stack: &mut Vec<Frame>, open: usize) {
    if stack.len() > 1 && stack.last().is_some_and(|top| top.opened_at == open) {
        if let Some(frame) = stack.pop() {
            log::trace!("pop context '{}'", frame.context);
        }
    }
}

fn read_attributes(element: &BytesStart<'_>, path: &str) -> Result<AttributeSet, XmlError> {
    let mut attributes = AttributeSet::new();
    for attr in element.attributes() {
        let attr = attr.map_err(|e| XmlError::malformed(path, 0, e))?;
        let key = std::str::from_utf8(attr.key.as_ref()).map_err(|e| XmlError::malformed(path, 0, e))?;
        let value = attr
            .unescape_value()
            .map_err(|e| XmlError::malformed(path, 0, e))?;
        attributes.insert(key, value.into_owned());
    }
    Ok(attributes)
}

// =============================================================================
// ParseScope
// =============================================================================

/// What a handler can do to the running parse besides mutating its state.
pub struct ParseScope<'s, S> {
    loader: &'s XmlLoader<'s, S>,
    path: &'s str,
    depth: usize,
    context: &'s str,
    pushed: Option<String>,
}

impl<S> ParseScope<'_, S> {
    /// Name of the active context.
    pub fn context(&self) -> &str {
        self.context
    }

    /// Path of the document being parsed.
    pub fn path(&self) -> &str {
        self.path
    }

    /// Include nesting level of the document being parsed (0 for the top level).
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Filesystem the parse reads from.
    pub fn vfs(&self) -> &GameVfs {
        self.loader.vfs
    }

    /// Enter `context` for the children of the current element.
    ///
    /// The context is popped when the current element closes.
    pub fn push_context(&mut self, context: impl Into<String>) -> Result<(), XmlError> {
        let context = context.into();
        if !self.loader.table.contains(&context) {
            return Err(XmlError::handler(
                self.path,
                format!("no parse context named '{context}'"),
            ));
        }
        self.pushed = Some(context);
        Ok(())
    }

    /// Resolve a file reference relative to the current document.
    pub fn resolve(&self, reference: &str) -> String {
        path::join(path::parent(self.path), reference)
    }

    /// Parse another file with a fresh context stack, sharing `state`.
    ///
    /// Relative references are resolved against the current document's
    /// directory. The included file is parsed completely before this returns.
    pub fn include(&self, reference: &str, state: &mut S) -> Result<ParseOutcome, XmlError> {
        let target = self.resolve(reference);
        let depth = self.depth + 1;
        if depth > self.loader.max_include_depth {
            return Err(XmlError::IncludeDepthExceeded {
                path: target,
                limit: self.loader.max_include_depth,
            });
        }
        log::debug!("{} includes {target}", self.path);
        self.loader.parse_path_at(&target, state, depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MapSource;
    use crate::xml::ParseContext;
    use pretty_assertions::assert_eq;

    /// Records `context:element` for every handled element.
    type Trace = Vec<String>;

    fn record(scope: &mut ParseScope<'_, Trace>, trace: &mut Trace, name: &str) {
        trace.push(format!("{}:{name}", scope.context()));
    }

    fn table() -> HandlerTable<Trace> {
        HandlerTable::with_initial("root")
            .context(
                ParseContext::new("root")
                    .on("list", |scope, trace, name, attrs| {
                        record(scope, trace, name);
                        if let Some(file) = attrs.get("file") {
                            if !scope.include(file, trace)?.is_completed() {
                                return Ok(Flow::Stop);
                            }
                        }
                        scope.push_context("list")?;
                        Ok(Flow::Continue)
                    })
                    .on("leaf", |scope, trace, name, _| {
                        record(scope, trace, name);
                        Ok(Flow::Continue)
                    }),
            )
            .context(
                ParseContext::new("list")
                    .on("item", |scope, trace, name, attrs| {
                        record(scope, trace, name);
                        Ok(Flow::from(attrs.get("stop").is_none()))
                    })
                    .on("bad", |scope, _, _, _| Err(XmlError::handler(scope.path(), "bad item"))),
            )
            .context(ParseContext::new("strict").unknown_elements(UnknownElementPolicy::Error))
    }

    fn empty_vfs() -> GameVfs {
        GameVfs::builder().build()
    }

    #[test]
    fn test_dispatch_follows_contexts() {
        let table = table();
        let vfs = empty_vfs();
        let loader = XmlLoader::new(&table, &vfs);
        let mut trace = Trace::new();

        let outcome = loader
            .parse_str(
                "/doc.xml",
                r#"<doc><list><item/><item></item></list><leaf/><item/></doc>"#,
                &mut trace,
            )
            .unwrap();

        assert_eq!(outcome, ParseOutcome::Completed);
        // <doc> is unknown in root and skipped with its subtree.
        assert_eq!(trace, Vec::<String>::new());

        trace.clear();
        loader
            .parse_str(
                "/doc.xml",
                r#"<?xml version="1.0"?><list><item/><item></item></list><leaf/>"#,
                &mut trace,
            )
            .unwrap();
        assert_eq!(trace, vec!["root:list", "list:item", "list:item", "root:leaf"]);
    }

    #[test]
    fn test_context_popped_after_element() {
        let table = table();
        let vfs = empty_vfs();
        let loader = XmlLoader::new(&table, &vfs);
        let mut trace = Trace::new();

        // <item> after </list> is back in root, where it is unknown.
        loader
            .parse_str("/doc.xml", "<list><item/></list><item/><leaf/>", &mut trace)
            .unwrap();
        assert_eq!(trace, vec!["root:list", "list:item", "root:leaf"]);
    }

    #[test]
    fn test_empty_element_pushes_and_pops() {
        let table = table();
        let vfs = empty_vfs();
        let loader = XmlLoader::new(&table, &vfs);
        let mut trace = Trace::new();

        loader.parse_str("/doc.xml", "<list/><leaf/>", &mut trace).unwrap();
        assert_eq!(trace, vec!["root:list", "root:leaf"]);
    }

    #[test]
    fn test_unknown_subtree_is_ignored() {
        let table = table();
        let vfs = empty_vfs();
        let loader = XmlLoader::new(&table, &vfs);
        let mut trace = Trace::new();

        loader
            .parse_str(
                "/doc.xml",
                "<list><junk><item/><deeper><item/></deeper></junk><item/></list>",
                &mut trace,
            )
            .unwrap();
        assert_eq!(trace, vec!["root:list", "list:item"]);
    }

    #[test]
    fn test_unknown_element_error_policy() {
        let table = table();
        let vfs = empty_vfs();
        let loader = XmlLoader::new(&table, &vfs).with_unknown_elements(UnknownElementPolicy::Error);
        let mut trace = Trace::new();

        let err = loader
            .parse_str("/doc.xml", "<list><junk/></list>", &mut trace)
            .unwrap_err();
        match err {
            XmlError::UnknownElement { context, element, .. } => {
                assert_eq!(context, "list");
                assert_eq!(element, "junk");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_descend_policy_parses_children() {
        let table = table();
        let vfs = empty_vfs();
        let loader = XmlLoader::new(&table, &vfs).with_unknown_elements(UnknownElementPolicy::Descend);
        let mut trace = Trace::new();

        loader
            .parse_str("/doc.xml", "<doc><wrap><list><item/></list></wrap><leaf/></doc>", &mut trace)
            .unwrap();
        assert_eq!(trace, vec!["root:list", "list:item", "root:leaf"]);
    }

    #[test]
    fn test_stop_is_not_an_error() {
        let table = table();
        let vfs = empty_vfs();
        let loader = XmlLoader::new(&table, &vfs);
        let mut trace = Trace::new();

        let outcome = loader
            .parse_str(
                "/doc.xml",
                r#"<list><item/><item stop="yes"/><item/></list>"#,
                &mut trace,
            )
            .unwrap();
        assert_eq!(outcome, ParseOutcome::Stopped);
        assert_eq!(trace, vec!["root:list", "list:item", "list:item"]);
    }

    #[test]
    fn test_missing_close_tag_is_malformed() {
        let table = table();
        let vfs = empty_vfs();
        let loader = XmlLoader::new(&table, &vfs);
        let mut trace = Trace::new();

        let err = loader
            .parse_str("/doc.xml", "<list><item/>", &mut trace)
            .unwrap_err();
        assert!(err.is_malformed(), "{err}");
    }

    #[test]
    fn test_mismatched_close_tag_is_malformed() {
        let table = table();
        let vfs = empty_vfs();
        let loader = XmlLoader::new(&table, &vfs);
        let mut trace = Trace::new();

        let err = loader
            .parse_str("/doc.xml", "<list><item></list></item>", &mut trace)
            .unwrap_err();
        assert!(err.is_malformed(), "{err}");
    }

    #[test]
    fn test_handler_error_propagates() {
        let table = table();
        let vfs = empty_vfs();
        let loader = XmlLoader::new(&table, &vfs);
        let mut trace = Trace::new();

        let err = loader
            .parse_str("/doc.xml", "<list><bad/></list>", &mut trace)
            .unwrap_err();
        assert!(matches!(err, XmlError::Handler { .. }), "{err}");
    }

    #[test]
    fn test_push_unknown_context_fails() {
        let table: HandlerTable<Trace> = HandlerTable::with_initial("root").context(
            ParseContext::new("root").on("x", |scope, _, _, _| {
                scope.push_context("nowhere")?;
                Ok(Flow::Continue)
            }),
        );
        let vfs = empty_vfs();
        let loader = XmlLoader::new(&table, &vfs);

        let err = loader.parse_str("/doc.xml", "<x/>", &mut Trace::new()).unwrap_err();
        assert!(matches!(err, XmlError::Handler { .. }), "{err}");
    }

    #[test]
    fn test_include_is_depth_first() {
        let table = table();
        let vfs = GameVfs::builder()
            .map(
                MapSource::new("mem")
                    .with("/data/main.xml", r#"<list file="parts/inner.xml"><item/></list><leaf/>"#)
                    .with("/data/parts/inner.xml", "<leaf/><list><item/></list>"),
            )
            .build();
        let loader = XmlLoader::new(&table, &vfs);
        let mut trace = Trace::new();

        let outcome = loader.parse_path("/data/main.xml", &mut trace).unwrap();
        assert!(outcome.is_completed());
        assert_eq!(
            trace,
            vec![
                "root:list",
                // inner.xml, fresh stack
                "root:leaf",
                "root:list",
                "list:item",
                // back in main.xml
                "list:item",
                "root:leaf",
            ]
        );
    }

    #[test]
    fn test_missing_include_is_not_found() {
        let table = table();
        let vfs = GameVfs::builder()
            .map(MapSource::new("mem").with("/main.xml", r#"<list file="gone.xml"/>"#))
            .build();
        let loader = XmlLoader::new(&table, &vfs);

        let err = loader.parse_path("/main.xml", &mut Trace::new()).unwrap_err();
        assert!(matches!(err, XmlError::Vfs(ref e) if e.is_not_found()), "{err}");
    }

    #[test]
    fn test_self_include_hits_depth_limit() {
        let table = table();
        let vfs = GameVfs::builder()
            .map(MapSource::new("mem").with("/loop.xml", r#"<list file="loop.xml"/>"#))
            .build();
        let loader = XmlLoader::new(&table, &vfs).with_max_include_depth(3);

        let err = loader.parse_path("/loop.xml", &mut Trace::new()).unwrap_err();
        match err {
            XmlError::IncludeDepthExceeded { path, limit } => {
                assert_eq!(path, "/loop.xml");
                assert_eq!(limit, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_escaped_attributes() {
        let table: HandlerTable<Vec<String>> = HandlerTable::with_initial("root").context(
            ParseContext::new("root").on("v", |_, values: &mut Vec<String>, _, attrs| {
                values.push(attrs.get_or("text", "").to_string());
                Ok(Flow::Continue)
            }),
        );
        let vfs = empty_vfs();
        let loader = XmlLoader::new(&table, &vfs);
        let mut values = Vec::new();

        loader
            .parse_str("/doc.xml", r#"<v text="a &amp; b &lt;c&gt;"/>"#, &mut values)
            .unwrap();
        assert_eq!(values, vec!["a & b <c>"]);
    }
}
