use crate::args::ModuleArgs;
use crate::context::ModuleContext;
use billmod_types::{Document, Operation, Result, StringMap};
use std::collections::HashMap;

pub type ItemHook = Box<dyn Fn(&mut ModuleContext, i64) -> Result<()>>;
pub type ModuleHook = Box<dyn Fn(&mut ModuleContext, i64) -> Result<()>>;
pub type AddonHook = Box<dyn Fn(&mut ModuleContext, i64, i64) -> Result<()>>;
pub type FormHook = Box<dyn Fn(&mut ModuleContext, &mut Document) -> Result<()>>;
pub type ProfileHook = Box<dyn Fn(&mut ModuleContext, &str, &str, &mut Document) -> Result<()>>;
pub type CheckHook = Box<dyn Fn(&mut ModuleContext, &Document, i64, &str, &str) -> Result<()>>;
pub type SuitableHook = Box<dyn Fn(&mut ModuleContext, &Document) -> Result<Document>>;
pub type ImportHook = Box<dyn Fn(&mut ModuleContext, i64, &str, i64) -> Result<Document>>;
pub type CustomParamHook =
    Box<dyn Fn(&mut ModuleContext, &str, &mut Document, &mut StringMap) -> Result<()>>;
pub type CustomCommandHook = Box<dyn Fn(&mut ModuleContext, &ModuleArgs) -> Result<()>>;
pub type ArgsHook = Box<dyn Fn(&mut ModuleArgs) -> Result<()>>;

/// What one concrete plugin can do.
///
/// A sparse table: a vendor registers only the operations it supports and the
/// dispatcher supplies defined defaults for the rest (no-op success for the
/// tune/sync/check family, the built-in suitable-module query, an
/// `unsupported` error for key generation). The features document is what
/// the panel reads to learn the module's surface.
pub struct Capabilities {
    pub(crate) name: String,
    pub(crate) features: Document,
    pub(crate) allow_failover: bool,
    pub(crate) max_tries: HashMap<Operation, i64>,
    pub(crate) task_params: String,
    pub(crate) customize_args: Option<ArgsHook>,

    pub(crate) open: Option<ItemHook>,
    pub(crate) resume: Option<ItemHook>,
    pub(crate) suspend: Option<ItemHook>,
    pub(crate) cancel_prolong: Option<ItemHook>,
    pub(crate) close: Option<ItemHook>,
    pub(crate) set_param: Option<ItemHook>,
    pub(crate) sync_item: Option<ItemHook>,
    pub(crate) prolong: Option<ItemHook>,
    pub(crate) reopen: Option<ItemHook>,
    pub(crate) gen_key: Option<ItemHook>,
    pub(crate) prolong_addon: Option<AddonHook>,

    pub(crate) sync_pricelist: Option<ModuleHook>,
    pub(crate) sync_server: Option<ModuleHook>,
    pub(crate) sync_iplist: Option<ModuleHook>,
    pub(crate) server_config: Option<ModuleHook>,
    pub(crate) stat: Option<ModuleHook>,

    pub(crate) check_connection: Option<FormHook>,
    pub(crate) tune_connection: Option<FormHook>,
    pub(crate) tune_usercreate: Option<FormHook>,
    pub(crate) tune_service_profile: Option<ProfileHook>,
    pub(crate) validate_service_profile: Option<ProfileHook>,
    pub(crate) check_param: Option<CheckHook>,
    pub(crate) check_addon: Option<CheckHook>,
    pub(crate) suitable_module: Option<SuitableHook>,
    pub(crate) import_pricelist: Option<ImportHook>,
    pub(crate) custom_param: Option<CustomParamHook>,
    pub(crate) custom_command: Option<CustomCommandHook>,
}

const DEFAULT_MAX_TRIES: i64 = 10;

impl Capabilities {
    pub fn new(name: impl Into<String>, features: Document) -> Self {
        Capabilities {
            name: name.into(),
            features,
            allow_failover: true,
            max_tries: HashMap::new(),
            task_params: String::new(),
            customize_args: None,
            open: None,
            resume: None,
            suspend: None,
            cancel_prolong: None,
            close: None,
            set_param: None,
            sync_item: None,
            prolong: None,
            reopen: None,
            gen_key: None,
            prolong_addon: None,
            sync_pricelist: None,
            sync_server: None,
            sync_iplist: None,
            server_config: None,
            stat: None,
            check_connection: None,
            tune_connection: None,
            tune_usercreate: None,
            tune_service_profile: None,
            validate_service_profile: None,
            check_param: None,
            check_addon: None,
            suitable_module: None,
            import_pricelist: None,
            custom_param: None,
            custom_command: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn features(&self) -> &Document {
        &self.features
    }

    /// Whether failover to the next suitable module instance is allowed.
    pub fn allow_failover(mut self, allow: bool) -> Self {
        self.allow_failover = allow;
        self
    }

    /// Attempts after which a failing operation is escalated to a manual
    /// task.
    pub fn max_tries(mut self, operation: Operation, tries: i64) -> Self {
        self.max_tries.insert(operation, tries);
        self
    }

    pub(crate) fn max_tries_for(&self, operation: &Operation) -> i64 {
        self.max_tries
            .get(operation)
            .copied()
            .unwrap_or(DEFAULT_MAX_TRIES)
    }

    /// Extra params attached to escalation tasks.
    pub fn task_params(mut self, params: impl Into<String>) -> Self {
        self.task_params = params.into();
        self
    }

    /// Extend or adjust the flag set before parsing.
    pub fn customize_args(
        mut self,
        hook: impl Fn(&mut ModuleArgs) -> Result<()> + 'static,
    ) -> Self {
        self.customize_args = Some(Box::new(hook));
        self
    }

    pub fn on_open(mut self, hook: impl Fn(&mut ModuleContext, i64) -> Result<()> + 'static) -> Self {
        self.open = Some(Box::new(hook));
        self
    }

    pub fn on_resume(
        mut self,
        hook: impl Fn(&mut ModuleContext, i64) -> Result<()> + 'static,
    ) -> Self {
        self.resume = Some(Box::new(hook));
        self
    }

    pub fn on_suspend(
        mut self,
        hook: impl Fn(&mut ModuleContext, i64) -> Result<()> + 'static,
    ) -> Self {
        self.suspend = Some(Box::new(hook));
        self
    }

    pub fn on_cancel_prolong(
        mut self,
        hook: impl Fn(&mut ModuleContext, i64) -> Result<()> + 'static,
    ) -> Self {
        self.cancel_prolong = Some(Box::new(hook));
        self
    }

    pub fn on_close(
        mut self,
        hook: impl Fn(&mut ModuleContext, i64) -> Result<()> + 'static,
    ) -> Self {
        self.close = Some(Box::new(hook));
        self
    }

    pub fn on_set_param(
        mut self,
        hook: impl Fn(&mut ModuleContext, i64) -> Result<()> + 'static,
    ) -> Self {
        self.set_param = Some(Box::new(hook));
        self
    }

    pub fn on_sync_item(
        mut self,
        hook: impl Fn(&mut ModuleContext, i64) -> Result<()> + 'static,
    ) -> Self {
        self.sync_item = Some(Box::new(hook));
        self
    }

    pub fn on_prolong(
        mut self,
        hook: impl Fn(&mut ModuleContext, i64) -> Result<()> + 'static,
    ) -> Self {
        self.prolong = Some(Box::new(hook));
        self
    }

    pub fn on_reopen(
        mut self,
        hook: impl Fn(&mut ModuleContext, i64) -> Result<()> + 'static,
    ) -> Self {
        self.reopen = Some(Box::new(hook));
        self
    }

    pub fn on_gen_key(
        mut self,
        hook: impl Fn(&mut ModuleContext, i64) -> Result<()> + 'static,
    ) -> Self {
        self.gen_key = Some(Box::new(hook));
        self
    }

    pub fn on_prolong_addon(
        mut self,
        hook: impl Fn(&mut ModuleContext, i64, i64) -> Result<()> + 'static,
    ) -> Self {
        self.prolong_addon = Some(Box::new(hook));
        self
    }

    pub fn on_sync_pricelist(
        mut self,
        hook: impl Fn(&mut ModuleContext, i64) -> Result<()> + 'static,
    ) -> Self {
        self.sync_pricelist = Some(Box::new(hook));
        self
    }

    pub fn on_sync_server(
        mut self,
        hook: impl Fn(&mut ModuleContext, i64) -> Result<()> + 'static,
    ) -> Self {
        self.sync_server = Some(Box::new(hook));
        self
    }

    pub fn on_sync_iplist(
        mut self,
        hook: impl Fn(&mut ModuleContext, i64) -> Result<()> + 'static,
    ) -> Self {
        self.sync_iplist = Some(Box::new(hook));
        self
    }

    pub fn on_server_config(
        mut self,
        hook: impl Fn(&mut ModuleContext, i64) -> Result<()> + 'static,
    ) -> Self {
        self.server_config = Some(Box::new(hook));
        self
    }

    pub fn on_stat(
        mut self,
        hook: impl Fn(&mut ModuleContext, i64) -> Result<()> + 'static,
    ) -> Self {
        self.stat = Some(Box::new(hook));
        self
    }

    pub fn on_check_connection(
        mut self,
        hook: impl Fn(&mut ModuleContext, &mut Document) -> Result<()> + 'static,
    ) -> Self {
        self.check_connection = Some(Box::new(hook));
        self
    }

    pub fn on_tune_connection(
        mut self,
        hook: impl Fn(&mut ModuleContext, &mut Document) -> Result<()> + 'static,
    ) -> Self {
        self.tune_connection = Some(Box::new(hook));
        self
    }

    pub fn on_tune_usercreate(
        mut self,
        hook: impl Fn(&mut ModuleContext, &mut Document) -> Result<()> + 'static,
    ) -> Self {
        self.tune_usercreate = Some(Box::new(hook));
        self
    }

    pub fn on_tune_service_profile(
        mut self,
        hook: impl Fn(&mut ModuleContext, &str, &str, &mut Document) -> Result<()> + 'static,
    ) -> Self {
        self.tune_service_profile = Some(Box::new(hook));
        self
    }

    pub fn on_validate_service_profile(
        mut self,
        hook: impl Fn(&mut ModuleContext, &str, &str, &mut Document) -> Result<()> + 'static,
    ) -> Self {
        self.validate_service_profile = Some(Box::new(hook));
        self
    }

    pub fn on_check_param(
        mut self,
        hook: impl Fn(&mut ModuleContext, &Document, i64, &str, &str) -> Result<()> + 'static,
    ) -> Self {
        self.check_param = Some(Box::new(hook));
        self
    }

    pub fn on_check_addon(
        mut self,
        hook: impl Fn(&mut ModuleContext, &Document, i64, &str, &str) -> Result<()> + 'static,
    ) -> Self {
        self.check_addon = Some(Box::new(hook));
        self
    }

    pub fn on_suitable_module(
        mut self,
        hook: impl Fn(&mut ModuleContext, &Document) -> Result<Document> + 'static,
    ) -> Self {
        self.suitable_module = Some(Box::new(hook));
        self
    }

    pub fn on_import_pricelist(
        mut self,
        hook: impl Fn(&mut ModuleContext, i64, &str, i64) -> Result<Document> + 'static,
    ) -> Self {
        self.import_pricelist = Some(Box::new(hook));
        self
    }

    pub fn on_custom_param(
        mut self,
        hook: impl Fn(&mut ModuleContext, &str, &mut Document, &mut StringMap) -> Result<()>
            + 'static,
    ) -> Self {
        self.custom_param = Some(Box::new(hook));
        self
    }

    pub fn on_custom_command(
        mut self,
        hook: impl Fn(&mut ModuleContext, &ModuleArgs) -> Result<()> + 'static,
    ) -> Self {
        self.custom_command = Some(Box::new(hook));
        self
    }
}
