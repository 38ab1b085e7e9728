//! `pmsample`: a small certificate processing module showing how a vendor
//! plugin assembles its [`Capabilities`] on top of the SDK. The lifecycle
//! hooks stop at the point where a real module would call its vendor API.

use billmod_client::NullHost;
use billmod_engine::{Capabilities, Config, LogCapture, Module, ModuleContext};
use billmod_opts::ArgSpec;
use billmod_types::{Document, Error, Operation, Result, StringMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

const STATUS_ACTIVE: i64 = 2;
const STATUS_SUSPENDED: i64 = 3;
const STATUS_CLOSED: i64 = 4;

pub fn run() -> anyhow::Result<i32> {
    let capture = LogCapture::new();
    init_tracing(capture.clone());

    let config = Config::load()?;
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))?;

    // Standalone runs have no panel transport, so refusals are permanent:
    // the endpoint name deliberately differs from the retryable one.
    let ctx = ModuleContext::new(config, Box::new(NullHost::new("standalone")))
        .with_capture(capture)
        .with_shutdown(shutdown);
    let mut module = Module::new(capabilities(), ctx);
    Ok(module.run(std::env::args().skip(1)))
}

fn init_tracing(capture: LogCapture) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(std::io::stderr.and(capture))
        .try_init();
}

fn capabilities() -> Capabilities {
    Capabilities::new("pmsample", features())
        .max_tries(Operation::Open, 5)
        .customize_args(|args| {
            args.register(ArgSpec::long("domain").takes_value())?;
            Ok(())
        })
        .on_open(open)
        .on_resume(|ctx, iid| ctx.set_service_status(iid, STATUS_ACTIVE))
        .on_suspend(|ctx, iid| ctx.set_service_status(iid, STATUS_SUSPENDED))
        .on_close(close)
        .on_check_connection(|_, form| {
            if form.text_of("url").is_empty() {
                return Err(Error::missed("url"));
            }
            Ok(())
        })
}

/// What the panel learns about this module from `--command features`.
fn features() -> Document {
    let mut doc = Document::new();
    let itemtypes = doc.root_mut().append_child("itemtypes");
    itemtypes
        .append_child("itemtype")
        .set_attr("name", "certificate");
    let params = doc.root_mut().append_child("params");
    params.append_child("param").set_attr("name", "url");
    params.append_child("param").set_attr("name", "username");
    params
        .append_child("param")
        .set_attr("name", "password")
        .set_attr("crypted", "yes");
    let features = doc.root_mut().append_child("features");
    for name in ["open", "suspend", "resume", "close", "check_connection"] {
        features.append_child("feature").set_attr("name", name);
    }
    doc
}

fn open(ctx: &mut ModuleContext, iid: i64) -> Result<()> {
    let item = ctx.item(iid)?;
    ctx.set_module(item.processingmodule)?;
    let url = ctx.module_param("url").unwrap_or_default().to_string();
    if url.is_empty() {
        return Err(Error::missed("url"));
    }
    let mut order = StringMap::new();
    ctx.add_item_params(&mut order, iid)?;
    debug!(url = %url, item = iid, params = order.len(), "ordering certificate");
    // A real module submits the order here and stores the vendor's id.
    ctx.save_param(iid, "order_id", &format!("ord-{}", iid))?;
    ctx.set_service_status(iid, STATUS_ACTIVE)?;
    Ok(())
}

fn close(ctx: &mut ModuleContext, iid: i64) -> Result<()> {
    let item = ctx.item(iid)?;
    ctx.set_module(item.processingmodule)?;
    debug!(item = iid, remoteid = %item.remoteid, "revoking certificate");
    ctx.drop_param(iid, "order_id")?;
    ctx.set_service_status(iid, STATUS_CLOSED)?;
    Ok(())
}
