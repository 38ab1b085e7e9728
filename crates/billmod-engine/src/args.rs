use billmod_opts::{validate, ArgId, ArgSet, ArgSpec, ParseOutcome};
use billmod_types::{Error, Result};

/// The flag vocabulary the panel core uses when invoking a processing
/// module, with the conditional-requirement edges between command and its
/// operands. A concrete plugin may register additional flags before parsing.
pub struct ModuleArgs {
    set: ArgSet,
    known: Vec<ArgId>,
    pub command: ArgId,
    pub subcommand: ArgId,
    pub id: ArgId,
    pub item: ArgId,
    pub lang: ArgId,
    pub module: ArgId,
    pub itemtype: ArgId,
    pub intname: ArgId,
    pub param: ArgId,
    pub value: ArgId,
    pub runningoperation: ArgId,
    pub level: ArgId,
    pub addon: ArgId,
}

impl ModuleArgs {
    pub fn new(program: &str) -> Self {
        let mut set = ArgSet::new(program);
        // The base vocabulary cannot collide with the builtins.
        let mut add = |spec: ArgSpec| set.register(spec).expect("base module flag");

        let command = add(ArgSpec::long("command").with_short('c').required().takes_value());
        let subcommand = add(ArgSpec::long("subcommand").depends_on(command, "import_pricelist"));
        let item = add(
            ArgSpec::long("item")
                .with_short('i')
                .takes_value()
                .validator(validate::numeric)
                .depends_on(command, "open")
                .depends_on(command, "resume")
                .depends_on(command, "suspend")
                .depends_on(command, "close")
                .depends_on(command, "check_param")
                .depends_on(command, "gen_key")
                .depends_on(command, "prolong")
                .depends_on(command, "setparam"),
        );
        let id = add(ArgSpec::long("id").depends_on(subcommand, "pricelist"));
        let lang = add(ArgSpec::long("lang").with_short('l').takes_value());
        let module = add(
            ArgSpec::long("module")
                .with_short('m')
                .takes_value()
                .validator(validate::numeric)
                .depends_on(command, "sync_pricelist")
                .depends_on(command, "sync_server")
                .depends_on(command, "sync_iplist")
                .depends_on(command, "get_server_config")
                .depends_on(command, "import_pricelist"),
        );
        let itemtype = add(ArgSpec::long("itemtype").with_short('t'));
        let intname = add(ArgSpec::long("intname"));
        let param = add(
            ArgSpec::long("param")
                .takes_value()
                .depends_on(command, "check_param")
                .depends_on(command, "tune_service_profile"),
        );
        let value = add(ArgSpec::long("value").takes_value());
        let runningoperation = add(
            ArgSpec::long("runningoperation")
                .takes_value()
                .validator(validate::numeric),
        );
        let level = add(
            ArgSpec::long("level")
                .takes_value()
                .validator(validate::numeric),
        );
        let addon = add(ArgSpec::long("addon").with_short('a').takes_value());

        let known = vec![
            command,
            subcommand,
            id,
            item,
            lang,
            module,
            itemtype,
            intname,
            param,
            value,
            runningoperation,
            level,
            addon,
        ];
        ModuleArgs {
            set,
            known,
            command,
            subcommand,
            id,
            item,
            lang,
            module,
            itemtype,
            intname,
            param,
            value,
            runningoperation,
            level,
            addon,
        }
    }

    /// Plugin extension point; call before [`parse`](Self::parse).
    pub fn register(&mut self, spec: ArgSpec) -> Result<ArgId> {
        let id = self.set.register(spec)?;
        self.known.push(id);
        Ok(id)
    }

    pub fn parse<I, S>(&mut self, args: I) -> ParseOutcome
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set.parse(args)
    }

    pub fn set(&self) -> &ArgSet {
        &self.set
    }

    pub fn value(&self, id: ArgId) -> &str {
        self.set.value(id)
    }

    pub fn is_set(&self, id: ArgId) -> bool {
        self.set.is_set(id)
    }

    /// Numeric flag value, 0 when absent (validators keep set values numeric).
    pub fn int_value(&self, id: ArgId) -> i64 {
        self.set.value(id).parse().unwrap_or(0)
    }

    /// The flag's value as a required entity id.
    pub fn required_int(&self, id: ArgId) -> Result<i64> {
        if !self.set.is_set(id) {
            return Err(Error::missed(self.set.name_of(id)));
        }
        Ok(self.int_value(id))
    }

    pub fn running_operation(&self) -> Option<i64> {
        self.set
            .is_set(self.runningoperation)
            .then(|| self.int_value(self.runningoperation))
    }

    pub fn usage(&self) -> String {
        self.set.usage()
    }

    /// Debug rendering of every supplied flag, in registration order.
    pub fn as_string(&self) -> String {
        let mut out = String::new();
        for &id in &self.known {
            if !self.set.is_set(id) {
                continue;
            }
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str("--");
            out.push_str(&self.set.name_of(id));
            let value = self.set.value(id);
            if !value.is_empty() {
                out.push(' ');
                out.push_str(value);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(tokens: &[&str]) -> (ModuleArgs, ParseOutcome) {
        let mut args = ModuleArgs::new("pmsample");
        let outcome = args.parse(tokens.iter().map(|s| s.to_string()));
        (args, outcome)
    }

    #[test]
    fn open_requires_item() {
        let (_, outcome) = parsed(&["--command", "open"]);
        match outcome {
            ParseOutcome::Invalid(problems) => {
                assert_eq!(problems.len(), 1);
                assert_eq!(problems[0].to_string(), "missed argument item");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn open_with_item_is_ready() {
        let (args, outcome) = parsed(&["--command", "open", "--item", "42"]);
        assert_eq!(outcome, ParseOutcome::Ready);
        assert_eq!(args.required_int(args.item).unwrap(), 42);
    }

    #[test]
    fn features_needs_nothing_else() {
        let (args, outcome) = parsed(&["-c", "features"]);
        assert_eq!(outcome, ParseOutcome::Ready);
        assert_eq!(args.value(args.command), "features");
    }

    #[test]
    fn import_pricelist_chain_of_edges() {
        let (_, outcome) = parsed(&["--command", "import_pricelist", "--module", "3"]);
        match outcome {
            ParseOutcome::Invalid(problems) => {
                assert_eq!(problems.len(), 1);
                assert_eq!(problems[0].to_string(), "missed argument subcommand");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let (_, outcome) = parsed(&[
            "--command",
            "import_pricelist",
            "--module",
            "3",
            "--subcommand",
            "pricelist",
        ]);
        match outcome {
            ParseOutcome::Invalid(problems) => {
                assert_eq!(problems[0].to_string(), "missed argument id");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn nonnumeric_item_is_invalid() {
        let (_, outcome) = parsed(&["--command", "open", "--item", "abc"]);
        match outcome {
            ParseOutcome::Invalid(problems) => {
                assert_eq!(problems[0].to_string(), "argument item has invalid value");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn running_operation_accessor() {
        let (args, outcome) = parsed(&[
            "--command",
            "open",
            "--item",
            "42",
            "--runningoperation",
            "7",
        ]);
        assert_eq!(outcome, ParseOutcome::Ready);
        assert_eq!(args.running_operation(), Some(7));

        let (args, _) = parsed(&["--command", "features"]);
        assert_eq!(args.running_operation(), None);
    }

    #[test]
    fn as_string_lists_supplied_flags() {
        let (args, _) = parsed(&["--command", "open", "--item", "42"]);
        assert_eq!(args.as_string(), "--command open --item 42");
    }

    #[test]
    fn plugin_can_extend_the_set() {
        let mut args = ModuleArgs::new("pmsample");
        let command = args.command;
        args.register(ArgSpec::long("domain").depends_on(command, "approver"))
            .unwrap();
        let outcome = args.parse(["--command", "approver"].map(str::to_string));
        match outcome {
            ParseOutcome::Invalid(problems) => {
                assert_eq!(problems[0].to_string(), "missed argument domain");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn duplicate_plugin_flag_is_rejected() {
        let mut args = ModuleArgs::new("pmsample");
        assert!(args.register(ArgSpec::long("item")).is_err());
        assert!(args.register(ArgSpec::short('m')).is_err());
    }
}
