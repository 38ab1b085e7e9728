use billmod_types::{Error, Result};

pub type Validator = fn(&str) -> bool;

/// Handle to a registered flag within one [`ArgSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgId(pub(crate) usize);

/// Declaration of a single flag.
///
/// Built with the `long`/`short` constructors plus chained modifiers, then
/// handed to [`ArgSet::register`]. At least one of the long name or the short
/// letter is always set by construction.
#[derive(Debug, Clone)]
pub struct ArgSpec {
    pub(crate) long: Option<String>,
    pub(crate) short: Option<char>,
    pub(crate) required: bool,
    pub(crate) require_value: bool,
    pub(crate) position: Option<usize>,
    pub(crate) validator: Option<Validator>,
    pub(crate) depends: Vec<(ArgId, String)>,
}

impl ArgSpec {
    pub fn long(name: impl Into<String>) -> Self {
        ArgSpec {
            long: Some(name.into()),
            short: None,
            required: false,
            require_value: false,
            position: None,
            validator: None,
            depends: Vec::new(),
        }
    }

    pub fn short(letter: char) -> Self {
        ArgSpec {
            long: None,
            short: Some(letter),
            required: false,
            require_value: false,
            position: None,
            validator: None,
            depends: Vec::new(),
        }
    }

    pub fn with_short(mut self, letter: char) -> Self {
        self.short = Some(letter);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn takes_value(mut self) -> Self {
        self.require_value = true;
        self
    }

    /// Bind to the Nth positional token when the flag is not supplied by name.
    pub fn position(mut self, index: usize) -> Self {
        self.position = Some(index);
        self
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Conditional-requirement edge: when `other`'s captured value equals
    /// `value`, this flag becomes required and required-to-have-a-value.
    /// Edges are evaluated in declaration order, first match wins.
    /// Declaring an edge also marks this flag value-taking.
    pub fn depends_on(mut self, other: ArgId, value: impl Into<String>) -> Self {
        self.depends.push((other, value.into()));
        self.require_value = true;
        self
    }

    pub(crate) fn display_name(&self) -> String {
        match (&self.long, self.short) {
            (Some(long), _) if !long.is_empty() => long.clone(),
            (_, Some(short)) => short.to_string(),
            _ => String::new(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Flag {
    pub(crate) spec: ArgSpec,
    pub(crate) exists: bool,
    pub(crate) has_value: bool,
    pub(crate) value: String,
}

/// Ordered flag registry plus the capture buckets filled by parsing.
///
/// Every set carries the three builtin flags: `--help`/`-h`, `--version`/`-V`
/// and the internal `-T` banner flag the vendor-identification escape hatch
/// uses.
#[derive(Debug)]
pub struct ArgSet {
    program: String,
    pub(crate) flags: Vec<Flag>,
    pub(crate) other: Vec<String>,
    pub(crate) unrecognized: Vec<String>,
    pub(crate) help: ArgId,
    pub(crate) version: ArgId,
    pub(crate) banner: ArgId,
}

impl ArgSet {
    pub fn new(program: impl Into<String>) -> Self {
        let mut set = ArgSet {
            program: program.into(),
            flags: Vec::new(),
            other: Vec::new(),
            unrecognized: Vec::new(),
            help: ArgId(0),
            version: ArgId(0),
            banner: ArgId(0),
        };
        // Builtins cannot collide in an empty set.
        set.help = set
            .register(ArgSpec::long("help").with_short('h'))
            .expect("builtin help flag");
        set.version = set
            .register(ArgSpec::long("version").with_short('V'))
            .expect("builtin version flag");
        set.banner = set.register(ArgSpec::short('T')).expect("builtin banner flag");
        set
    }

    /// Register a flag. Fails with a duplicate error when the long name or
    /// the short letter is already taken in this set.
    pub fn register(&mut self, spec: ArgSpec) -> Result<ArgId> {
        for flag in &self.flags {
            if spec.short.is_some() && flag.spec.short == spec.short {
                return Err(Error::exists("argument")
                    .add_param("name", flag.spec.display_name()));
            }
            if let (Some(new), Some(existing)) = (&spec.long, &flag.spec.long) {
                if !new.is_empty() && new == existing {
                    return Err(Error::exists("argument")
                        .add_param("name", flag.spec.display_name()));
                }
            }
        }
        self.flags.push(Flag {
            spec,
            exists: false,
            has_value: false,
            value: String::new(),
        });
        Ok(ArgId(self.flags.len() - 1))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Captured value, empty when the flag was never given one.
    pub fn value(&self, id: ArgId) -> &str {
        &self.flags[id.0].value
    }

    pub fn is_set(&self, id: ArgId) -> bool {
        self.flags[id.0].exists
    }

    pub fn has_value(&self, id: ArgId) -> bool {
        self.flags[id.0].has_value
    }

    /// Positional tokens and the `-`/`--` sentinels, in order of appearance.
    pub fn other(&self) -> &[String] {
        &self.other
    }

    pub fn unrecognized(&self) -> &[String] {
        &self.unrecognized
    }

    /// Long name when present, else the short letter.
    pub fn name_of(&self, id: ArgId) -> String {
        self.flags[id.0].spec.display_name()
    }

    pub fn help_id(&self) -> ArgId {
        self.help
    }

    pub fn version_id(&self) -> ArgId {
        self.version
    }

    pub fn usage(&self) -> String {
        let mut out = format!("Usage: {} [options]\n", self.program);
        for flag in &self.flags {
            out.push('\t');
            if let Some(short) = flag.spec.short {
                out.push('-');
                out.push(short);
            }
            if flag.spec.short.is_some()
                && flag.spec.long.as_deref().is_some_and(|l| !l.is_empty())
            {
                out.push_str(" | ");
            }
            if let Some(long) = flag.spec.long.as_deref().filter(|l| !l.is_empty()) {
                out.push_str("--");
                out.push_str(long);
            }
            out.push('\n');
        }
        out
    }
}
