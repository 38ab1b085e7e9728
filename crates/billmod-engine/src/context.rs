use crate::config::Config;
use crate::journal::ErrorJournal;
use crate::logcap::LogCapture;
use billmod_client::{build_query, query_safe, HostClient, Response, RetryPolicy};
use billmod_store::{ItemSnapshot, Store};
use billmod_types::{Error, Result, StringMap};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Everything one invocation of a processing module works with: config, the
/// lazily opened datastore, the host transport, the error journal and the
/// resolved module instance with its decrypted params. Built once in `main`
/// and threaded through the dispatcher into the capability hooks.
pub struct ModuleContext {
    config: Config,
    store: OnceCell<Store>,
    host: Box<dyn HostClient>,
    journal: ErrorJournal,
    capture: LogCapture,
    plugin: String,
    module_id: i64,
    module_params: StringMap,
    item_cache: Option<ItemSnapshot>,
    renames: HashMap<String, String>,
    running_operation: Option<i64>,
    shutdown: Option<Arc<AtomicBool>>,
}

impl ModuleContext {
    pub fn new(config: Config, host: Box<dyn HostClient>) -> Self {
        let journal = ErrorJournal::new(config.log_window);
        ModuleContext {
            config,
            store: OnceCell::new(),
            host,
            journal,
            capture: LogCapture::new(),
            plugin: String::new(),
            module_id: 0,
            module_params: StringMap::new(),
            item_cache: None,
            renames: HashMap::new(),
            running_operation: None,
            shutdown: None,
        }
    }

    pub fn with_capture(mut self, capture: LogCapture) -> Self {
        self.capture = capture;
        self
    }

    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    /// Preopened store, for tests running against an in-memory database.
    pub fn with_store(self, store: Store) -> Self {
        // A fresh OnceCell cannot already be set.
        self.store.set(store).ok().expect("store not yet opened");
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn set_plugin(&mut self, name: &str) {
        self.plugin = name.to_string();
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub(crate) fn set_running_operation(&mut self, operation: Option<i64>) {
        self.running_operation = operation;
    }

    pub fn running_operation(&self) -> Option<i64> {
        self.running_operation
    }

    // --- collaborators ----------------------------------------------------

    pub fn store(&self) -> Result<&Store> {
        self.store
            .get_or_try_init(|| Store::open(&self.config.db_path))
    }

    /// The store only when some earlier step already opened it.
    pub(crate) fn store_if_open(&self) -> Option<&Store> {
        self.store.get()
    }

    pub fn host_query(&self, raw: &str) -> Result<Response> {
        debug!(query = raw, "host query");
        self.host.query(raw)
    }

    /// Query with the bounded retry for refused local connections.
    pub fn host_query_safe(&self, raw: &str) -> Result<Response> {
        query_safe(self.host.as_ref(), raw, &self.retry_policy())
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            endpoint: self.config.host_endpoint.clone(),
            timeout: Duration::from_secs(self.config.retry_timeout_secs),
            delay: Duration::from_secs(1),
            shutdown: self.shutdown.clone(),
        }
    }

    pub fn journal(&self) -> &ErrorJournal {
        &self.journal
    }

    pub fn journal_mut(&mut self) -> &mut ErrorJournal {
        &mut self.journal
    }

    /// Journal a failure together with the captured log excerpt.
    pub fn journal_error(&mut self, error: &Error, global: bool) {
        let lines = self.capture.lines();
        self.journal.add_error(error, global, &lines);
    }

    pub fn capture(&self) -> &LogCapture {
        &self.capture
    }

    // --- module resolution ------------------------------------------------

    /// Bind the invocation to one module instance: verify it belongs to this
    /// plugin and load its params through the cipher seam.
    pub fn set_module(&mut self, id: i64) -> Result<()> {
        let params = {
            let store = self.store()?;
            if let Some(record) = store.module(id)? {
                if !record.module.is_empty() && record.module != self.plugin {
                    return Err(Error::with_value(
                        "unsupported_module",
                        record.module,
                        id.to_string(),
                    ));
                }
            }
            store.module_params(id)?
        };
        self.module_id = id;
        self.module_params = params;
        Ok(())
    }

    pub fn module_id(&self) -> Result<i64> {
        if self.module_id == 0 {
            return Err(Error::missed("module"));
        }
        Ok(self.module_id)
    }

    pub fn module_param(&self, name: &str) -> Option<&str> {
        self.module_params.get(name).map(String::as_str)
    }

    pub fn module_params(&self) -> &StringMap {
        &self.module_params
    }

    // --- item snapshots ---------------------------------------------------

    /// Memoized item snapshot; one invocation works on one item.
    pub fn item(&mut self, iid: i64) -> Result<ItemSnapshot> {
        if let Some(cached) = &self.item_cache {
            if cached.id == iid {
                return Ok(cached.clone());
            }
        }
        self.refresh_item(iid)
    }

    pub fn refresh_item(&mut self, iid: i64) -> Result<ItemSnapshot> {
        let snapshot = self.store()?.item(iid)?;
        self.item_cache = Some(snapshot.clone());
        Ok(snapshot)
    }

    // --- panel RPC shorthands ---------------------------------------------

    pub fn save_param(&self, iid: i64, name: &str, value: &str) -> Result<()> {
        let query = format!(
            "func=service.saveparam&sok=ok&elid={}&name={}&value={}",
            iid,
            urlencoding::encode(name),
            urlencoding::encode(value)
        );
        self.host_query_safe(&query)?;
        Ok(())
    }

    pub fn drop_param(&self, iid: i64, name: &str) -> Result<()> {
        let query = format!(
            "func=service.saveparam&sok=ok&elid={}&name={}",
            iid,
            urlencoding::encode(name)
        );
        self.host_query_safe(&query)?;
        Ok(())
    }

    pub fn set_service_status(&self, iid: i64, status: i64) -> Result<()> {
        self.host_query(&format!(
            "func=service.setstatus&elid={}&service_status={}",
            iid, status
        ))?;
        Ok(())
    }

    pub fn set_service_expiredate(&self, iid: i64, expiredate: &str) -> Result<()> {
        self.host_query(&format!(
            "func=service.setexpiredate&elid={}&expiredate={}",
            iid,
            urlencoding::encode(expiredate)
        ))?;
        Ok(())
    }

    /// Stop the panel from rerunning the operation automatically.
    pub fn set_manual_rerun(&self, operation: i64) -> Result<()> {
        if operation != 0 {
            self.host_query_safe(&format!(
                "func=runningoperation.setmanual&elid={}",
                operation
            ))?;
        }
        Ok(())
    }

    /// Hand the work over to a manual task. `uniq` skips creation when an
    /// open task of this type already exists for the item.
    pub fn create_task(&self, iid: i64, task_type: &str, params: &str, uniq: bool) -> Result<()> {
        self.set_manual_rerun(self.running_operation.unwrap_or(0))?;
        if uniq && self.store()?.task_count(task_type, iid)? > 0 {
            return Ok(());
        }
        let mut query = format!("func=task.edit&item={}&type={}&sok=ok", iid, task_type);
        if let Some(operation) = self.running_operation {
            query.push_str(&format!("&runningoperation={}", operation));
        }
        if !params.is_empty() {
            query.push_str(&format!("&params={}", urlencoding::encode(params)));
        }
        self.host_query(&query)?;
        Ok(())
    }

    /// Fleet-visible problem registration. Skipped when no module is bound
    /// or when the failure only means no module was suitable.
    pub fn register_problem(
        &self,
        problem: &str,
        error: &Error,
        extra: &[(&str, &str)],
    ) -> Result<()> {
        if self.module_id == 0 || error.kind() == "no_suitable_module" {
            return Ok(());
        }
        let name = self.store()?.module_name(self.module_id)?;
        let mut query = format!(
            "func=problems.register&name={}&id={}&param_pm_name={}&param_pm_id={}&param_errormsg={}",
            urlencoding::encode(problem),
            self.module_id,
            urlencoding::encode(&name),
            self.module_id,
            urlencoding::encode(&error.to_string())
        );
        for (key, value) in extra {
            query.push_str(&format!("&param_{}={}", key, urlencoding::encode(value)));
        }
        query.push_str("&sok=ok&level=error");
        self.host_query_safe(&query)?;
        Ok(())
    }

    // --- param translation ------------------------------------------------

    /// Translate a panel-side param name into the vendor's name.
    pub fn add_rename_param(&mut self, from: &str, to: &str) {
        self.renames.insert(from.to_string(), to.to_string());
    }

    pub fn rename_param<'a>(&'a self, name: &'a str) -> &'a str {
        self.renames.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Merge the item's stored params into `params`, applying renames.
    pub fn add_item_params(&self, params: &mut StringMap, iid: i64) -> Result<()> {
        for (name, value) in self.store()?.item_params(iid)? {
            let target = self.rename_param(&name).to_string();
            if params.contains_key(&target) {
                warn!(param = %target, "replacing param from item");
            }
            params.insert(target, value);
        }
        Ok(())
    }

    /// A convenience used by hooks that build vendor queries.
    pub fn build_host_query(&self, func: &str, params: &[(&str, &str)]) -> String {
        build_query(func, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use billmod_store::ModuleRecord;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct RecordingHost {
        queries: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingHost {
        fn taken(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    impl HostClient for RecordingHost {
        fn query(&self, raw: &str) -> Result<Response> {
            self.queries.lock().unwrap().push(raw.to_string());
            Ok(Response::ok())
        }
    }

    fn context_with_store(host: RecordingHost) -> ModuleContext {
        let store = Store::open_in_memory().unwrap();
        store
            .insert_module(&ModuleRecord {
                id: 3,
                name: "Vendor primary".to_string(),
                module: "pmsample".to_string(),
                active: true,
                orderpriority: 0,
            })
            .unwrap();
        store
            .insert_module(&ModuleRecord {
                id: 4,
                name: "Foreign".to_string(),
                module: "pmother".to_string(),
                active: true,
                orderpriority: 0,
            })
            .unwrap();
        store.insert_module_param(3, "url", "https://api").unwrap();
        let mut ctx =
            ModuleContext::new(Config::default(), Box::new(host)).with_store(store);
        ctx.set_plugin("pmsample");
        ctx
    }

    #[test]
    fn set_module_loads_params() {
        let mut ctx = context_with_store(RecordingHost::default());
        ctx.set_module(3).unwrap();
        assert_eq!(ctx.module_id().unwrap(), 3);
        assert_eq!(ctx.module_param("url"), Some("https://api"));
    }

    #[test]
    fn foreign_module_is_rejected() {
        let mut ctx = context_with_store(RecordingHost::default());
        let err = ctx.set_module(4).unwrap_err();
        assert_eq!(err.kind(), "unsupported_module");
        assert_eq!(err.object(), "pmother");
        assert_eq!(err.value(), "4");
    }

    #[test]
    fn unbound_module_is_missed() {
        let ctx = context_with_store(RecordingHost::default());
        let err = ctx.module_id().unwrap_err();
        assert_eq!(err.kind(), "missed");
        assert_eq!(err.object(), "module");
    }

    #[test]
    fn rename_and_merge_item_params() {
        let mut ctx = context_with_store(RecordingHost::default());
        ctx.store().unwrap().insert_item_param(42, "period", "12").unwrap();
        ctx.add_rename_param("period", "term");
        let mut params = StringMap::new();
        ctx.add_item_params(&mut params, 42).unwrap();
        assert_eq!(params.get("term").map(String::as_str), Some("12"));
        assert!(!params.contains_key("period"));
    }

    #[test]
    fn problem_registration_skips_unbound_and_unsuitable() {
        let host = RecordingHost::default();
        let mut ctx = context_with_store(host.clone());
        // no module bound yet
        ctx.register_problem("processingmodule_connect", &Error::new("client"), &[])
            .unwrap();
        assert!(host.taken().is_empty());

        ctx.set_module(3).unwrap();
        ctx.register_problem(
            "processingmodule_connect",
            &Error::new("no_suitable_module"),
            &[],
        )
        .unwrap();
        assert!(host.taken().is_empty());

        ctx.register_problem(
            "processingmodule_connect",
            &Error::with_object("client", "open"),
            &[("iid", "42")],
        )
        .unwrap();
        let queries = host.taken();
        assert_eq!(queries.len(), 1);
        assert!(queries[0].starts_with("func=problems.register&name=processingmodule_connect"));
        assert!(queries[0].contains("&param_pm_name=Vendor%20primary"));
        assert!(queries[0].contains("&param_iid=42"));
        assert!(queries[0].ends_with("&sok=ok&level=error"));
    }

    #[test]
    fn task_creation_skips_existing_unique_task() {
        let host = RecordingHost::default();
        let mut ctx = context_with_store(host.clone());
        ctx.set_running_operation(Some(7));
        ctx.store().unwrap().insert_task(1, 7, "pm_open", 42).unwrap();

        ctx.create_task(42, "pm_open", "", true).unwrap();
        let queries = host.taken();
        // manual rerun fires, task.edit does not
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0], "func=runningoperation.setmanual&elid=7");

        ctx.create_task(42, "pm_close", "a=b", true).unwrap();
        let queries = host.taken();
        assert_eq!(queries.len(), 3);
        assert_eq!(
            queries[2],
            "func=task.edit&item=42&type=pm_close&sok=ok&runningoperation=7&params=a%3Db"
        );
    }
}
