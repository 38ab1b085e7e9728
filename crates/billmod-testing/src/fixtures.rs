//! Seeded in-memory stores: a two-instance vendor fleet selling one
//! certificate pricelist, with item 42 provisioned on the primary instance.

use billmod_store::{ModuleRecord, Store};

pub const PLUGIN: &str = "pmsample";
pub const PRIMARY_MODULE: i64 = 3;
pub const BACKUP_MODULE: i64 = 4;
pub const PRICELIST: i64 = 11;
pub const ITEM: i64 = 42;
pub const OPERATION: i64 = 7;

/// The standard fleet: primary and backup instances of [`PLUGIN`], both
/// bound to [`PRICELIST`], with [`ITEM`] living on the primary.
pub fn seeded_store() -> Store {
    let store = Store::open_in_memory().expect("in-memory store");
    seed(&store);
    store
}

/// Seed the standard fleet into an existing (usually file-backed) store.
pub fn seed(store: &Store) {
    store
        .insert_module(&ModuleRecord {
            id: PRIMARY_MODULE,
            name: "Vendor primary".to_string(),
            module: PLUGIN.to_string(),
            active: true,
            orderpriority: 10,
        })
        .expect("primary module");
    store
        .insert_module(&ModuleRecord {
            id: BACKUP_MODULE,
            name: "Vendor backup".to_string(),
            module: PLUGIN.to_string(),
            active: true,
            orderpriority: 20,
        })
        .expect("backup module");
    store
        .insert_module_param(PRIMARY_MODULE, "url", "https://primary.example")
        .expect("primary url");
    store
        .insert_module_param(BACKUP_MODULE, "url", "https://backup.example")
        .expect("backup url");

    store.insert_itemtype(1, "certificate").expect("itemtype");
    store
        .insert_pricelist(PRICELIST, "cert-dv", 1)
        .expect("pricelist");
    store
        .bind_module_pricelist(PRIMARY_MODULE, PRICELIST)
        .expect("primary binding");
    store
        .bind_module_pricelist(BACKUP_MODULE, PRICELIST)
        .expect("backup binding");

    store
        .insert_item(ITEM, "cert-42", PRIMARY_MODULE, PRICELIST, "r-42", 12, 2)
        .expect("item");
    store
        .insert_item_param(ITEM, "domain", "example.com")
        .expect("item param");

    store
        .insert_running_operation(OPERATION, 1)
        .expect("running operation");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fleet_is_consistent() {
        let store = seeded_store();
        let item = store.item(ITEM).unwrap();
        assert_eq!(item.processingmodule, PRIMARY_MODULE);
        assert_eq!(item.pricelist, PRICELIST);
        let suitable = store.suitable_modules(PRICELIST, PLUGIN, &[]).unwrap();
        assert_eq!(suitable, vec![PRIMARY_MODULE, BACKUP_MODULE]);
    }
}
