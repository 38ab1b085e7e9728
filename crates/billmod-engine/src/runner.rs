use crate::args::ModuleArgs;
use crate::capabilities::{Capabilities, ItemHook, ModuleHook};
use crate::context::ModuleContext;
use billmod_opts::ParseOutcome;
use billmod_types::{Document, Error, Operation, Result, StringMap};
use tracing::{debug, warn};

/// Printed for the vendor-identification flag.
pub const VENDOR_BANNER: &str = "(c) billmod";

/// One processing-module invocation: parse, dispatch, commit or unwind.
///
/// `run` owns the whole lifecycle and always returns the process exit code;
/// nothing in the engine calls `exit` directly, which keeps every branch
/// reachable from tests.
pub struct Module {
    caps: Capabilities,
    ctx: ModuleContext,
    input_override: Option<String>,
}

fn item_hook(hook: &Option<ItemHook>, name: &str, ctx: &mut ModuleContext, iid: i64) -> Result<()> {
    match hook {
        Some(hook) => hook(ctx, iid),
        None => Err(Error::unsupported(name)),
    }
}

// The sync/config family defaults to success: a vendor without the concept
// simply has nothing to synchronize.
fn module_hook(hook: &Option<ModuleHook>, ctx: &mut ModuleContext, id: i64) -> Result<()> {
    match hook {
        Some(hook) => hook(ctx, id),
        None => Ok(()),
    }
}

impl Module {
    pub fn new(caps: Capabilities, mut ctx: ModuleContext) -> Self {
        ctx.set_plugin(&caps.name);
        Module {
            caps,
            ctx,
            input_override: None,
        }
    }

    /// Replace stdin for the next document-reading operation (tests).
    pub fn with_input(mut self, xml: impl Into<String>) -> Self {
        self.input_override = Some(xml.into());
        self
    }

    pub fn context(&self) -> &ModuleContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut ModuleContext {
        &mut self.ctx
    }

    /// Full invocation over `argv[1..]`; returns the process exit code.
    pub fn run<I, S>(&mut self, argv: I) -> i32
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = ModuleArgs::new(&self.caps.name);
        if let Some(hook) = &self.caps.customize_args {
            if let Err(err) = hook(&mut args) {
                eprintln!("{}", err);
                return 1;
            }
        }

        match args.parse(argv) {
            ParseOutcome::Banner => {
                println!("{}", VENDOR_BANNER);
                0
            }
            ParseOutcome::Unrecognized(options) => {
                for option in &options {
                    warn!(option = %option, "unrecognized option");
                    eprintln!("unrecognized option: {}", option);
                }
                1
            }
            ParseOutcome::Help => {
                print!("{}", args.usage());
                0
            }
            ParseOutcome::Version => {
                println!("{}", env!("CARGO_PKG_VERSION"));
                0
            }
            ParseOutcome::Invalid(problems) => {
                for problem in &problems {
                    eprintln!("\t{}", problem);
                }
                eprint!("{}", args.usage());
                1
            }
            ParseOutcome::Ready => match self.dispatch(&args) {
                Ok(()) => 0,
                Err(err) => self.fail(&args, err),
            },
        }
    }

    fn dispatch(&mut self, args: &ModuleArgs) -> Result<()> {
        debug!("run with: {}", args.as_string());
        let op = Operation::parse(args.value(args.command));
        self.ctx.set_running_operation(args.running_operation());

        if args.running_operation().is_some() {
            self.ctx.capture().clear();
            self.resolve_journal_module(args)?;
        }

        if op.suppressible() && self.ctx.config().maintenance_active() {
            debug!(command = %op, "maintenance marker present, skipping");
            return Ok(());
        }

        match &op {
            Operation::Features => {
                println!("{}", self.caps.features.to_string_pretty());
            }
            Operation::Open => {
                let iid = args.required_int(args.item)?;
                self.open_with_failover(args, iid)?;
            }
            Operation::Resume => {
                let iid = args.required_int(args.item)?;
                item_hook(&self.caps.resume, "resume", &mut self.ctx, iid)?;
            }
            Operation::Suspend => {
                let iid = args.required_int(args.item)?;
                item_hook(&self.caps.suspend, "suspend", &mut self.ctx, iid)?;
            }
            Operation::CancelProlong => {
                let iid = args.required_int(args.item)?;
                item_hook(&self.caps.cancel_prolong, "cancel_prolong", &mut self.ctx, iid)?;
            }
            Operation::Close => {
                let iid = args.required_int(args.item)?;
                item_hook(&self.caps.close, "close", &mut self.ctx, iid)?;
            }
            Operation::SetParam => {
                let iid = args.required_int(args.item)?;
                if let Err(err) = item_hook(&self.caps.set_param, "setparam", &mut self.ctx, iid) {
                    self.rollback_pricelist_change(iid);
                    return Err(err);
                }
            }
            Operation::SyncItem => {
                let iid = args.required_int(args.item)?;
                match &self.caps.sync_item {
                    Some(hook) => hook(&mut self.ctx, iid)?,
                    None => {}
                }
            }
            Operation::Prolong => {
                let iid = args.required_int(args.item)?;
                item_hook(&self.caps.prolong, "prolong", &mut self.ctx, iid)?;
            }
            Operation::ProlongAddon => {
                let iid = args.required_int(args.item)?;
                let addon = args.int_value(args.addon);
                match &self.caps.prolong_addon {
                    Some(hook) => hook(&mut self.ctx, iid, addon)?,
                    None => return Err(Error::unsupported("prolong_addon")),
                }
            }
            Operation::Reopen => {
                let iid = args.required_int(args.item)?;
                item_hook(&self.caps.reopen, "reopen", &mut self.ctx, iid)?;
            }
            Operation::GetSuitableModule => {
                let input = self.read_input()?;
                let doc = match &self.caps.suitable_module {
                    Some(hook) => hook(&mut self.ctx, &input)?,
                    None => self.default_suitable_module(&input)?,
                };
                println!("{}", doc.to_string_pretty());
            }
            Operation::CheckConnection => {
                let mut input = self.read_input()?;
                if let Some(hook) = &self.caps.check_connection {
                    hook(&mut self.ctx, &mut input)?;
                }
                println!("{}", Document::new().to_string_pretty());
            }
            Operation::TuneConnection => {
                let mut form = self.read_input()?;
                if let Some(hook) = &self.caps.tune_connection {
                    hook(&mut self.ctx, &mut form)?;
                }
                print!("{}", form);
            }
            Operation::UserCreate => {
                let mut form = self.read_input()?;
                if let Some(hook) = &self.caps.tune_usercreate {
                    hook(&mut self.ctx, &mut form)?;
                }
                print!("{}", form);
            }
            Operation::TuningParam => {
                let mut form = self.read_input()?;
                let action = args.value(args.subcommand).to_string();
                self.rewrite_session_params(&action, &mut form)?;
                print!("{}", form);
            }
            Operation::TuneServiceProfile | Operation::ValidateServiceProfile => {
                let mut form = self.read_input()?;
                let param = args.value(args.param).to_string();
                let value = args.value(args.value).to_string();
                let hook = if op == Operation::TuneServiceProfile {
                    &self.caps.tune_service_profile
                } else {
                    &self.caps.validate_service_profile
                };
                if let Some(hook) = hook {
                    hook(&mut self.ctx, &param, &value, &mut form)?;
                }
                print!("{}", form);
            }
            Operation::SyncPriceList => {
                let module = args.required_int(args.module)?;
                module_hook(&self.caps.sync_pricelist, &mut self.ctx, module)?;
                module_hook(&self.caps.server_config, &mut self.ctx, module)?;
            }
            Operation::GetServerConfig => {
                let module = args.required_int(args.module)?;
                module_hook(&self.caps.server_config, &mut self.ctx, module)?;
            }
            Operation::SyncServer => {
                let module = args.required_int(args.module)?;
                module_hook(&self.caps.sync_server, &mut self.ctx, module)?;
            }
            Operation::SyncIpList => {
                let module = args.required_int(args.module)?;
                module_hook(&self.caps.sync_iplist, &mut self.ctx, module)?;
            }
            Operation::Stat => {
                let module = args.int_value(args.module);
                module_hook(&self.caps.stat, &mut self.ctx, module)?;
            }
            Operation::ImportPriceList => {
                let module = args.required_int(args.module)?;
                let subcommand = args.value(args.subcommand).to_string();
                let id = args.int_value(args.id);
                let doc = match &self.caps.import_pricelist {
                    Some(hook) => hook(&mut self.ctx, module, &subcommand, id)?,
                    None => Document::new(),
                };
                println!("{}", doc.to_string_pretty());
            }
            Operation::CheckParam | Operation::CheckAddon => {
                let input = self.read_input()?;
                let iid = args.int_value(args.item);
                let param = args.value(args.param).to_string();
                let value = args.value(args.value).to_string();
                let hook = if op == Operation::CheckAddon {
                    &self.caps.check_addon
                } else {
                    &self.caps.check_param
                };
                if let Some(hook) = hook {
                    hook(&mut self.ctx, &input, iid, &param, &value)?;
                }
                println!("{}", acknowledgement().to_string_pretty());
            }
            Operation::GenKey => {
                let iid = args.required_int(args.item)?;
                match &self.caps.gen_key {
                    Some(hook) => hook(&mut self.ctx, iid)?,
                    None => return Err(Error::unsupported("gen_key")),
                }
                println!("{}", acknowledgement().to_string_pretty());
            }
            Operation::Custom(_) => {
                if let Some(hook) = &self.caps.custom_command {
                    hook(&mut self.ctx, args)?;
                }
            }
        }

        if let Some(store) = self.ctx.store_if_open() {
            store.commit()?;
        }
        Ok(())
    }

    /// Keep retrying `open` on the next suitable module instance while the
    /// failure is a connectivity one and the plugin allows failover.
    fn open_with_failover(&mut self, args: &ModuleArgs, iid: i64) -> Result<()> {
        loop {
            let result = item_hook(&self.caps.open, "open", &mut self.ctx, iid);
            let err = match result {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };
            self.ctx.journal_error(&err, false);
            if !self.caps.allow_failover || !err.is_connectivity() {
                return Err(err);
            }
            self.ctx
                .register_problem("processingmodule_connect", &err, &[])?;
            if let Some(store) = self.ctx.store_if_open() {
                store.rollback()?;
            }
            self.ctx
                .host_query(&format!("func=service.getnextmodule&elid={}", iid))?;
            if let Some(store) = self.ctx.store_if_open() {
                store.commit()?;
            }
            let snapshot = self.ctx.refresh_item(iid)?;
            if args.running_operation().is_some() {
                self.journal_scope(snapshot.processingmodule)?;
            }
            warn!(
                item = iid,
                module = snapshot.processingmodule,
                "failing over to next module instance"
            );
        }
    }

    /// Best effort: undo a half-applied pricelist change before unwinding.
    fn rollback_pricelist_change(&mut self, iid: i64) {
        let last = self
            .ctx
            .store()
            .and_then(|store| store.last_pricelist(iid))
            .unwrap_or(0);
        if last > 0 {
            let query = format!("sok=ok&func=service.changepricelist.rollback&elid={}", iid);
            if let Err(err) = self.ctx.host_query(&query) {
                warn!(item = iid, error = %err, "pricelist rollback failed");
            }
        }
    }

    fn default_suitable_module(&mut self, input: &Document) -> Result<Document> {
        let pricelist: i64 = input.text_of("item/pricelist").parse().unwrap_or(0);
        let skip: Vec<i64> = input
            .text_of("skip_modules")
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        let ids = {
            let store = self.ctx.store()?;
            store.suitable_modules(pricelist, self.ctx.plugin(), &skip)?
        };
        let mut doc = Document::new();
        let modules = doc.root_mut().append_child("modules");
        for id in ids {
            modules.append_child("module").set_attr("id", id.to_string());
        }
        Ok(doc)
    }

    /// Parse `session_params` into a map, run the plugin hook, write the map
    /// back as the only session-param block.
    fn rewrite_session_params(&mut self, action: &str, form: &mut Document) -> Result<()> {
        let mut params: StringMap = form
            .find_all("session_params/param")
            .into_iter()
            .map(|p| {
                (
                    p.attr("name").unwrap_or_default().to_string(),
                    p.attr("value").unwrap_or_default().to_string(),
                )
            })
            .collect();
        if let Some(hook) = &self.caps.custom_param {
            hook(&mut self.ctx, action, form, &mut params)?;
        }
        form.root_mut().remove_children("session_params");
        let node = form.root_mut().append_child("session_params");
        for (name, value) in &params {
            node.append_child("param")
                .set_attr("name", name)
                .set_attr("value", value);
        }
        Ok(())
    }

    fn resolve_journal_module(&mut self, args: &ModuleArgs) -> Result<()> {
        let module_id = if args.is_set(args.module) {
            args.int_value(args.module)
        } else if args.is_set(args.item) {
            self.ctx.store()?.module_of_item(args.int_value(args.item))?
        } else {
            return Ok(());
        };
        self.journal_scope(module_id)
    }

    fn journal_scope(&mut self, module_id: i64) -> Result<()> {
        let name = self.ctx.store()?.module_name(module_id)?;
        self.ctx
            .journal_mut()
            .set_processing_module(module_id, &name);
        Ok(())
    }

    fn read_input(&mut self) -> Result<Document> {
        if let Some(xml) = self.input_override.take() {
            return Document::parse(&xml).map_err(|_| Error::parse_input_xml());
        }
        let mut buf = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin().lock(), &mut buf)?;
        Document::parse(&buf).map_err(|_| Error::parse_input_xml())
    }

    /// Top-level unwind: journal, push the journal into the running
    /// operation, escalate to a manual task when the operation is out of
    /// tries, then report and roll back. Always returns exit code 1.
    fn fail(&mut self, args: &ModuleArgs, err: Error) -> i32 {
        let op = Operation::parse(args.value(args.command));
        if let Some(operation) = args.running_operation() {
            self.ctx.journal_error(&err, true);
            let journal_xml = self.ctx.journal().to_string();
            let query = format!(
                "func=runningoperation.edit&sok=ok&elid={}&errorxml={}",
                operation,
                urlencoding::encode(&journal_xml)
            );
            if let Err(push_err) = self.ctx.host_query(&query) {
                warn!(error = %push_err, "failed to push error journal");
            }
            if args.is_set(args.item) {
                if let Err(task_err) = self.escalate(args, &op, operation) {
                    warn!(error = %task_err, "task escalation failed");
                }
            }
        }

        if err.is_connectivity() {
            if let Err(problem_err) =
                self.ctx
                    .register_problem("processingmodule_connect", &err, &[])
            {
                warn!(error = %problem_err, "problem registration failed");
            }
        }

        warn!("{}", err);
        if let Some(store) = self.ctx.store_if_open() {
            if let Err(rollback_err) = store.rollback() {
                warn!(error = %rollback_err, "rollback failed");
            }
        }
        println!("{}", err.to_document().to_string_pretty());
        1
    }

    /// Out of tries and no task yet: switch the operation to manual rerun
    /// and hand it to the task queue the panel names for this command.
    fn escalate(&mut self, args: &ModuleArgs, op: &Operation, operation: i64) -> Result<()> {
        let (tries, existing) = {
            let store = self.ctx.store()?;
            (
                store.try_count(operation)?,
                store.task_count_for_operation(operation)?,
            )
        };
        if tries < self.caps.max_tries_for(op) || existing != 0 {
            return Ok(());
        }
        self.ctx.set_manual_rerun(operation)?;
        let response = self.ctx.host_query_safe(&format!(
            "func=task.gettype&operation={}",
            urlencoding::encode(op.as_str())
        ))?;
        let task_type = response.doc.text_of("task_type");
        if task_type.is_empty() {
            return Ok(());
        }
        let query = format!(
            "func=task.edit&item={}&sok=ok&runningoperation={}&type={}&params={}",
            args.int_value(args.item),
            operation,
            task_type,
            urlencoding::encode(&self.caps.task_params)
        );
        self.ctx.host_query_safe(&query)?;
        Ok(())
    }
}

/// The `<doc><ok/></doc>` acknowledgement for check/key commands.
fn acknowledgement() -> Document {
    let mut doc = Document::new();
    doc.root_mut().append_child("ok");
    doc
}
