use billmod_types::{Document, Error, Node};
use chrono::Local;

/// Severity of an operator-facing journal message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Error,
}

#[derive(Debug, Clone)]
struct ErrorRecord {
    date: String,
    kind: String,
    object: String,
    value: String,
    params: Vec<(String, String)>,
    backtrace: String,
    log_excerpt: String,
    attrs: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
struct MessageRecord {
    date: String,
    text: String,
    kind: MessageKind,
    attrs: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
enum Entry {
    Error(ErrorRecord),
    Message(MessageRecord),
}

#[derive(Debug, Clone)]
struct ModuleScope {
    date: String,
    id: i64,
    name: String,
    entries: Vec<Entry>,
}

/// Where the most recent error / message record lives, for the
/// `add_last_*_param` annotations.
#[derive(Debug, Clone, Copy)]
enum Cursor {
    None,
    Root(usize),
    Module(usize, usize),
}

/// Per-invocation journal of failures and operator messages.
///
/// Records accumulate under the most recently announced processing-module
/// scope; records marked global (and records before any scope) land at the
/// root. Serialization happens once at the end, when the dispatcher pushes
/// the journal into the running operation.
pub struct ErrorJournal {
    log_window: usize,
    modules: Vec<ModuleScope>,
    root: Vec<Entry>,
    last_error: Cursor,
    last_message: Cursor,
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

impl ErrorJournal {
    pub fn new(log_window: usize) -> Self {
        ErrorJournal {
            log_window,
            modules: Vec::new(),
            root: Vec::new(),
            last_error: Cursor::None,
            last_message: Cursor::None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty() && self.root.is_empty()
    }

    /// Open a new module scope; subsequent non-global records nest under it.
    pub fn set_processing_module(&mut self, id: i64, name: &str) {
        self.modules.push(ModuleScope {
            date: timestamp(),
            id,
            name: name.to_string(),
            entries: Vec::new(),
        });
    }

    /// Record a failure. `global` forces the record to the root even when a
    /// module scope is open. `log_lines` is the captured invocation log the
    /// excerpt is cut from.
    pub fn add_error(&mut self, error: &Error, global: bool, log_lines: &[String]) {
        let record = ErrorRecord {
            date: timestamp(),
            kind: error.kind().to_string(),
            object: error.object().to_string(),
            value: error.value().to_string(),
            params: error.params().to_vec(),
            backtrace: error.frames().join("\n"),
            log_excerpt: self.excerpt(error, log_lines),
            attrs: Vec::new(),
        };
        self.last_error = self.push(Entry::Error(record), global);
    }

    pub fn add_custom_message(&mut self, text: &str, kind: MessageKind) {
        let record = MessageRecord {
            date: timestamp(),
            text: text.to_string(),
            kind,
            attrs: Vec::new(),
        };
        self.last_message = self.push(Entry::Message(record), false);
    }

    /// Annotate the most recent error record with an extra attribute.
    pub fn add_last_error_param(&mut self, name: &str, value: &str) {
        if let Some(Entry::Error(record)) = self.entry_mut(self.last_error) {
            record.attrs.push((name.to_string(), value.to_string()));
        }
    }

    pub fn add_last_message_param(&mut self, name: &str, value: &str) {
        if let Some(Entry::Message(record)) = self.entry_mut(self.last_message) {
            record.attrs.push((name.to_string(), value.to_string()));
        }
    }

    fn push(&mut self, entry: Entry, global: bool) -> Cursor {
        if !global {
            let scopes = self.modules.len();
            if let Some(scope) = self.modules.last_mut() {
                scope.entries.push(entry);
                return Cursor::Module(scopes - 1, scope.entries.len() - 1);
            }
        }
        self.root.push(entry);
        Cursor::Root(self.root.len() - 1)
    }

    fn entry_mut(&mut self, cursor: Cursor) -> Option<&mut Entry> {
        match cursor {
            Cursor::None => None,
            Cursor::Root(index) => self.root.get_mut(index),
            Cursor::Module(scope, index) => self
                .modules
                .get_mut(scope)
                .and_then(|s| s.entries.get_mut(index)),
        }
    }

    /// Trailing window of the log around the failure: everything from
    /// `log_window` lines before the line matching the error's first frame.
    /// Without a match the window is anchored at the end of the log.
    fn excerpt(&self, error: &Error, log_lines: &[String]) -> String {
        if log_lines.is_empty() {
            return String::new();
        }
        let anchor = error.frames().first().and_then(|frame| {
            log_lines.iter().position(|line| line.contains(frame.as_str()))
        });
        let anchor = anchor.unwrap_or(log_lines.len() - 1);
        let start = anchor.saturating_sub(self.log_window);
        let mut out = String::new();
        for line in &log_lines[start..] {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        for scope in &self.modules {
            let node = doc.root_mut().append_child("processingmodule");
            node.set_attr("date", &scope.date);
            node.set_attr("id", &scope.id.to_string());
            node.set_attr("name", &scope.name);
            for entry in &scope.entries {
                append_entry(node, entry);
            }
        }
        for entry in &self.root {
            append_entry(doc.root_mut(), entry);
        }
        doc
    }
}

fn append_entry(parent: &mut Node, entry: &Entry) {
    match entry {
        Entry::Error(record) => {
            let node = parent.append_child("error");
            node.set_attr("date", &record.date);
            node.set_attr("type", &record.kind);
            node.set_attr("object", &record.object);
            node.set_attr("value", &record.value);
            for (name, value) in &record.attrs {
                node.set_attr(name, value);
            }
            for (name, value) in &record.params {
                let param = node.append_child("param");
                param.set_attr("name", name);
                param.set_text(value);
            }
            node.append_child("backtrace").append_cdata(&record.backtrace);
            node.append_child("log").append_cdata(&record.log_excerpt);
        }
        Entry::Message(record) => {
            let node = parent.append_text_child("custommessage", &record.text);
            node.set_attr("date", &record.date);
            let kind = match record.kind {
                MessageKind::Info => "info",
                MessageKind::Error => "error",
            };
            node.set_attr("type", kind);
            for (name, value) in &record.attrs {
                node.set_attr(name, value);
            }
        }
    }
}

impl std::fmt::Display for ErrorJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_document())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn errors_nest_under_active_module_scope() {
        let mut journal = ErrorJournal::new(100);
        journal.set_processing_module(3, "Vendor primary");
        journal.add_error(&Error::with_object("client", "open"), false, &[]);
        let doc = journal.to_document();
        let scope = doc.find("processingmodule").unwrap();
        assert_eq!(scope.attr("id"), Some("3"));
        assert_eq!(scope.attr("name"), Some("Vendor primary"));
        let error = doc.find("processingmodule/error").unwrap();
        assert_eq!(error.attr("type"), Some("client"));
        assert!(doc.find("error").is_none());
    }

    #[test]
    fn global_errors_land_at_the_root() {
        let mut journal = ErrorJournal::new(100);
        journal.set_processing_module(3, "Vendor primary");
        journal.add_error(&Error::missed("item"), true, &[]);
        let doc = journal.to_document();
        assert!(doc.find("processingmodule/error").is_none());
        assert_eq!(doc.find("error").unwrap().attr("type"), Some("missed"));
    }

    #[test]
    fn errors_without_scope_land_at_the_root() {
        let mut journal = ErrorJournal::new(100);
        journal.add_error(&Error::missed("item"), false, &[]);
        assert!(journal.to_document().find("error").is_some());
    }

    #[test]
    fn excerpt_window_precedes_the_anchor_frame() {
        let mut journal = ErrorJournal::new(2);
        let log = lines(&["a", "b", "c", "frame hit", "d"]);
        let error = Error::new("client").in_frame("frame hit");
        journal.add_error(&error, false, &log);
        let doc = journal.to_document();
        let excerpt = doc.find("error/log").unwrap().text();
        assert_eq!(excerpt, "b\nc\nframe hit\nd\n");
    }

    #[test]
    fn excerpt_falls_back_to_log_tail() {
        let mut journal = ErrorJournal::new(2);
        let log = lines(&["a", "b", "c", "d", "e"]);
        journal.add_error(&Error::new("client"), false, &log);
        let doc = journal.to_document();
        assert_eq!(doc.find("error/log").unwrap().text(), "c\nd\ne\n");
    }

    #[test]
    fn error_params_and_backtrace_serialize() {
        let mut journal = ErrorJournal::new(10);
        let mut error = Error::with_value("client", "bad_response", "https://x")
            .add_param("code", "502")
            .in_frame("query vendor");
        error.push_frame("open item=42");
        journal.add_error(&error, false, &[]);
        let doc = journal.to_document();
        let param = doc.find("error/param").unwrap();
        assert_eq!(param.attr("name"), Some("code"));
        assert_eq!(param.text(), "502");
        assert_eq!(
            doc.find("error/backtrace").unwrap().text(),
            "query vendor\nopen item=42"
        );
    }

    #[test]
    fn custom_messages_and_annotations() {
        let mut journal = ErrorJournal::new(10);
        journal.set_processing_module(1, "m");
        journal.add_custom_message("retrying on backup", MessageKind::Info);
        journal.add_last_message_param("attempt", "2");
        journal.add_error(&Error::new("client"), false, &[]);
        journal.add_last_error_param("endpoint", "https://x");
        let doc = journal.to_document();
        let message = doc.find("processingmodule/custommessage").unwrap();
        assert_eq!(message.text(), "retrying on backup");
        assert_eq!(message.attr("type"), Some("info"));
        assert_eq!(message.attr("attempt"), Some("2"));
        let error = doc.find("processingmodule/error").unwrap();
        assert_eq!(error.attr("endpoint"), Some("https://x"));
    }

    #[test]
    fn annotations_follow_the_record_into_a_later_scope() {
        let mut journal = ErrorJournal::new(10);
        journal.set_processing_module(1, "primary");
        journal.add_error(&Error::with_object("client", "open"), false, &[]);
        journal.set_processing_module(2, "backup");
        journal.add_error(&Error::with_object("client", "open"), false, &[]);
        journal.add_last_error_param("attempt", "2");
        let doc = journal.to_document();
        let scopes = doc.find_all("processingmodule");
        assert!(scopes[0].find("error").unwrap().attr("attempt").is_none());
        assert_eq!(
            scopes[1].find("error").unwrap().attr("attempt"),
            Some("2")
        );
    }

    #[test]
    fn consecutive_scopes_keep_their_records() {
        let mut journal = ErrorJournal::new(10);
        journal.set_processing_module(1, "primary");
        journal.add_error(&Error::with_object("client", "open"), false, &[]);
        journal.set_processing_module(2, "backup");
        journal.add_error(&Error::with_object("client", "open"), false, &[]);
        let doc = journal.to_document();
        let scopes = doc.find_all("processingmodule");
        assert_eq!(scopes.len(), 2);
        assert_eq!(scopes[0].attr("name"), Some("primary"));
        assert!(scopes[1].find("error").is_some());
    }
}
