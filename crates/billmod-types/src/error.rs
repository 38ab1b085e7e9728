use crate::xml::Document;
use std::fmt;

/// Result type for billmod operations
pub type Result<T> = std::result::Result<T, Error>;

/// Structured domain error carried through every layer of a processing module.
///
/// An error is a (kind, object, value) triple plus optional named parameters.
/// The kind decides policy at the top of the dispatcher: `client` and `auth`
/// errors count as connectivity failures and trigger failover / problem
/// registration, everything else is an ordinary domain failure. Frames pushed
/// while an error propagates stand in for a backtrace and let the error
/// journal locate the matching slice of the invocation log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Error {
    kind: String,
    object: String,
    value: String,
    params: Vec<(String, String)>,
    frames: Vec<String>,
}

impl Error {
    pub fn new(kind: impl Into<String>) -> Self {
        Error {
            kind: kind.into(),
            ..Default::default()
        }
    }

    pub fn with_object(kind: impl Into<String>, object: impl Into<String>) -> Self {
        Error {
            kind: kind.into(),
            object: object.into(),
            ..Default::default()
        }
    }

    pub fn with_value(
        kind: impl Into<String>,
        object: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Error {
            kind: kind.into(),
            object: object.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    /// A required entity is absent ("missed argument", "missed item", ...).
    pub fn missed(object: impl Into<String>) -> Self {
        Error::with_object("missed", object)
    }

    pub fn missed_value(object: impl Into<String>, value: impl Into<String>) -> Self {
        Error::with_value("missed", object, value)
    }

    pub fn exists(object: impl Into<String>) -> Self {
        Error::with_object("exists", object)
    }

    /// The concrete module does not implement the requested operation.
    pub fn unsupported(command: impl Into<String>) -> Self {
        Error::with_object("unsupported", command)
    }

    /// The fixed error every malformed stdin document is normalized to.
    pub fn parse_input_xml() -> Self {
        Error::with_object("xml_parse", "input")
    }

    pub fn database(detail: impl Into<String>) -> Self {
        Error::with_object("database", detail)
    }

    pub fn add_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Annotate the propagation path; the first frame anchors the journal's
    /// log excerpt.
    pub fn push_frame(&mut self, frame: impl Into<String>) {
        self.frames.push(frame.into());
    }

    pub fn in_frame(mut self, frame: impl Into<String>) -> Self {
        self.push_frame(frame);
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    /// Connectivity failures ("client" or "auth") get the failover and
    /// problem-registration treatment; everything else does not.
    pub fn is_connectivity(&self) -> bool {
        self.kind == "client" || self.kind == "auth"
    }

    /// Render the `<doc><error .../></doc>` document printed to stdout on the
    /// failure path.
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        let error = doc.root_mut().append_child("error");
        error.set_attr("type", &self.kind);
        if !self.object.is_empty() {
            error.set_attr("object", &self.object);
        }
        if !self.value.is_empty() {
            error.set_attr("value", &self.value);
        }
        for (name, value) in &self.params {
            let param = error.append_child("param");
            param.set_attr("name", name);
            param.set_text(value);
        }
        error.append_text_child("msg", &self.to_string());
        doc
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind.as_str() {
            "missed" => write!(f, "missed {}", self.object)?,
            "exists" => write!(f, "{} already exists", self.object)?,
            "unsupported" => write!(f, "unsupported command {}", self.object)?,
            "xml_parse" => return write!(f, "failed to parse input xml"),
            _ => {
                write!(f, "{}", self.kind)?;
                if !self.object.is_empty() {
                    write!(f, " {}", self.object)?;
                }
            }
        }
        if !self.value.is_empty() {
            write!(f, " '{}'", self.value)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::with_object("io", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectivity_kinds() {
        assert!(Error::with_object("client", "open").is_connectivity());
        assert!(Error::new("auth").is_connectivity());
        assert!(!Error::missed("item").is_connectivity());
    }

    #[test]
    fn display_variants() {
        assert_eq!(Error::missed("item").to_string(), "missed item");
        assert_eq!(
            Error::unsupported("gen_key").to_string(),
            "unsupported command gen_key"
        );
        assert_eq!(
            Error::parse_input_xml().to_string(),
            "failed to parse input xml"
        );
        assert_eq!(
            Error::with_value("client", "bad_response", "https://api.example.com").to_string(),
            "client bad_response 'https://api.example.com'"
        );
    }

    #[test]
    fn document_rendering() {
        let err = Error::with_value("unsupported_module", "pmother", "7")
            .add_param("name", "pmother");
        let doc = err.to_document();
        let node = doc.find("error").unwrap();
        assert_eq!(node.attr("type"), Some("unsupported_module"));
        assert_eq!(node.attr("object"), Some("pmother"));
        assert_eq!(node.attr("value"), Some("7"));
        let param = doc.find("error/param").unwrap();
        assert_eq!(param.attr("name"), Some("name"));
        assert_eq!(param.text(), "pmother");
    }

    #[test]
    fn frames_accumulate_in_order() {
        let mut err = Error::new("client").in_frame("open item=42");
        err.push_frame("Module::run");
        assert_eq!(err.frames(), ["open item=42", "Module::run"]);
    }
}
