use crate::cipher::{PlainCipher, SecretCipher};
use crate::measure::{relation_between, MeasureLink, MeasureMode};
use billmod_types::{Error, Result, StringMap};
use rusqlite::{params, Connection, OptionalExtension};
use std::cell::Cell;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// A `processingmodule` row: one configured instance of a plugin.
///
/// `module` is the plugin executable name shared by all instances of the same
/// vendor integration; `name` is the operator-visible label of this instance.
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub id: i64,
    pub name: String,
    pub module: String,
    pub active: bool,
    pub orderpriority: i64,
}

/// Denormalized view of one service item, joined with its pricelist, item
/// type and bound module.
#[derive(Debug, Clone, Default)]
pub struct ItemSnapshot {
    pub id: i64,
    pub intname: String,
    pub module: String,
    pub remoteid: String,
    pub processingmodule: i64,
    pub pricelist_intname: String,
    pub pricelist: i64,
    pub period: i64,
    pub status: i64,
    pub expiredate: String,
    pub opendate: String,
    pub lastpricelist: i64,
}

fn db_err(err: rusqlite::Error) -> Error {
    Error::database(err.to_string())
}

/// Read-mostly handle on the panel's billing database.
///
/// Modules never write billing state directly; the insert helpers below are
/// for seeding and fixtures. The explicit transaction methods bracket an
/// invocation so failover can discard partial reads.
pub struct Store {
    conn: Connection,
    cipher: Box<dyn SecretCipher>,
    tx_open: Cell<bool>,
}

impl Store {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path).map_err(db_err)?;
        let store = Self {
            conn,
            cipher: Box::new(PlainCipher),
            tx_open: Cell::new(false),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        let store = Self {
            conn,
            cipher: Box::new(PlainCipher),
            tx_open: Cell::new(false),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn with_cipher(mut self, cipher: Box<dyn SecretCipher>) -> Self {
        self.cipher = cipher;
        self
    }

    pub fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
            CREATE TABLE IF NOT EXISTS processingmodule (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                module TEXT NOT NULL,
                active TEXT NOT NULL DEFAULT 'on',
                orderpriority INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS processingparam (
                processingmodule INTEGER NOT NULL,
                intname TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (processingmodule, intname)
            );

            CREATE TABLE IF NOT EXISTS processingcryptedparam (
                processingmodule INTEGER NOT NULL,
                intname TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (processingmodule, intname)
            );

            CREATE TABLE IF NOT EXISTS itemtype (
                id INTEGER PRIMARY KEY,
                intname TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS pricelist (
                id INTEGER PRIMARY KEY,
                intname TEXT NOT NULL,
                itemtype INTEGER
            );

            CREATE TABLE IF NOT EXISTS item (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL DEFAULT '',
                remoteid TEXT NOT NULL DEFAULT '',
                processingmodule INTEGER,
                pricelist INTEGER,
                period INTEGER NOT NULL DEFAULT 0,
                status INTEGER NOT NULL DEFAULT 0,
                expiredate TEXT NOT NULL DEFAULT '',
                opendate TEXT NOT NULL DEFAULT '',
                lastpricelist INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS itemparam (
                item INTEGER NOT NULL,
                intname TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (item, intname)
            );

            CREATE TABLE IF NOT EXISTS processingmodule2pricelist (
                processingmodule INTEGER NOT NULL,
                pricelist INTEGER NOT NULL,
                PRIMARY KEY (processingmodule, pricelist)
            );

            CREATE TABLE IF NOT EXISTS runningoperation (
                id INTEGER PRIMARY KEY,
                trycount INTEGER NOT NULL DEFAULT 0,
                manualrerun TEXT NOT NULL DEFAULT 'off'
            );

            CREATE TABLE IF NOT EXISTS task (
                id INTEGER PRIMARY KEY,
                runningoperation INTEGER,
                type TEXT NOT NULL DEFAULT '',
                item INTEGER
            );

            CREATE TABLE IF NOT EXISTS measure (
                id INTEGER PRIMARY KEY,
                intname TEXT NOT NULL UNIQUE,
                relation INTEGER NOT NULL DEFAULT 0,
                lessmeasure INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_item_module ON item(processingmodule);
            CREATE INDEX IF NOT EXISTS idx_pm2p_pricelist
                ON processingmodule2pricelist(pricelist);
            CREATE INDEX IF NOT EXISTS idx_task_op ON task(runningoperation);
            "#,
            )
            .map_err(db_err)?;
        Ok(())
    }

    // --- transaction discipline -------------------------------------------

    /// Open a transaction; a second call inside an open one is a no-op.
    pub fn begin(&self) -> Result<()> {
        if !self.tx_open.get() {
            self.conn.execute_batch("BEGIN").map_err(db_err)?;
            self.tx_open.set(true);
        }
        Ok(())
    }

    /// Commit the open transaction; no-op when none is open.
    pub fn commit(&self) -> Result<()> {
        if self.tx_open.get() {
            self.conn.execute_batch("COMMIT").map_err(db_err)?;
            self.tx_open.set(false);
        }
        Ok(())
    }

    /// Discard the open transaction; no-op when none is open.
    pub fn rollback(&self) -> Result<()> {
        if self.tx_open.get() {
            self.conn.execute_batch("ROLLBACK").map_err(db_err)?;
            self.tx_open.set(false);
        }
        Ok(())
    }

    pub fn in_transaction(&self) -> bool {
        self.tx_open.get()
    }

    // --- module queries ---------------------------------------------------

    pub fn module(&self, id: i64) -> Result<Option<ModuleRecord>> {
        self.conn
            .query_row(
                "SELECT id, name, module, active, orderpriority
                 FROM processingmodule WHERE id = ?1",
                params![id],
                |row| {
                    Ok(ModuleRecord {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        module: row.get(2)?,
                        active: row.get::<_, String>(3)? == "on",
                        orderpriority: row.get(4)?,
                    })
                },
            )
            .optional()
            .map_err(db_err)
    }

    pub fn module_name(&self, id: i64) -> Result<String> {
        Ok(self.module(id)?.map(|m| m.name).unwrap_or_default())
    }

    /// Plain and decrypted secret params of one module instance, secrets
    /// overriding plain rows of the same name.
    pub fn module_params(&self, id: i64) -> Result<StringMap> {
        let mut out = StringMap::new();
        let mut stmt = self
            .conn
            .prepare(
                "SELECT intname, value FROM processingparam
                 WHERE processingmodule = ?1",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(db_err)?;
        for row in rows {
            let (name, value) = row.map_err(db_err)?;
            out.insert(name, value);
        }

        let mut stmt = self
            .conn
            .prepare(
                "SELECT intname, value FROM processingcryptedparam
                 WHERE processingmodule = ?1",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(db_err)?;
        for row in rows {
            let (name, value) = row.map_err(db_err)?;
            let plain = if value.is_empty() {
                value
            } else {
                self.cipher.decrypt(&value)?
            };
            out.insert(name, plain);
        }
        debug!(module = id, params = out.len(), "loaded module params");
        Ok(out)
    }

    /// Active module instances of the given plugin bound to a pricelist,
    /// best first. `skip` holds instance ids already tried during failover.
    pub fn suitable_modules(
        &self,
        pricelist: i64,
        module: &str,
        skip: &[i64],
    ) -> Result<Vec<i64>> {
        // skip ids come from our own queries, never from user input
        let skip_cond = if skip.is_empty() {
            String::new()
        } else {
            let ids: Vec<String> = skip.iter().map(|id| id.to_string()).collect();
            format!(" AND pm.id NOT IN ({})", ids.join(","))
        };
        let sql = format!(
            "SELECT pm.id
             FROM processingmodule2pricelist pm2p
             JOIN processingmodule pm ON pm.id = pm2p.processingmodule
             WHERE pm2p.pricelist = ?1{skip_cond}
               AND pm.module = ?2
               AND pm.active = 'on'
             ORDER BY pm.orderpriority, pm.id"
        );
        let mut stmt = self.conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params![pricelist, module], |row| row.get::<_, i64>(0))
            .map_err(db_err)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(db_err)?);
        }
        Ok(out)
    }

    // --- item queries -----------------------------------------------------

    /// Denormalized item snapshot; absent item is a `missed` error, not an
    /// option, because every caller treats it as fatal.
    pub fn item(&self, iid: i64) -> Result<ItemSnapshot> {
        self.conn
            .query_row(
                "SELECT i.id, IFNULL(it.intname, ''), IFNULL(pm.module, ''),
                        i.remoteid, IFNULL(i.processingmodule, 0),
                        IFNULL(p.intname, ''), IFNULL(i.pricelist, 0),
                        i.period, i.status, i.expiredate, i.opendate,
                        i.lastpricelist
                 FROM item i
                 LEFT JOIN pricelist p ON p.id = i.pricelist
                 LEFT JOIN itemtype it ON it.id = p.itemtype
                 LEFT JOIN processingmodule pm ON pm.id = i.processingmodule
                 WHERE i.id = ?1",
                params![iid],
                |row| {
                    Ok(ItemSnapshot {
                        id: row.get(0)?,
                        intname: row.get(1)?,
                        module: row.get(2)?,
                        remoteid: row.get(3)?,
                        processingmodule: row.get(4)?,
                        pricelist_intname: row.get(5)?,
                        pricelist: row.get(6)?,
                        period: row.get(7)?,
                        status: row.get(8)?,
                        expiredate: row.get(9)?,
                        opendate: row.get(10)?,
                        lastpricelist: row.get(11)?,
                    })
                },
            )
            .optional()
            .map_err(db_err)?
            .ok_or_else(|| Error::missed_value("item", iid.to_string()))
    }

    pub fn item_name(&self, iid: i64) -> Result<String> {
        self.conn
            .query_row(
                "SELECT name FROM item WHERE id = ?1",
                params![iid],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)
            .map(Option::unwrap_or_default)
    }

    /// Module instance the item is bound to, 0 when unbound or unknown.
    pub fn module_of_item(&self, iid: i64) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT IFNULL(processingmodule, 0) FROM item WHERE id = ?1",
                params![iid],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)
            .map(Option::unwrap_or_default)
    }

    pub fn item_params(&self, iid: i64) -> Result<StringMap> {
        let mut stmt = self
            .conn
            .prepare("SELECT intname, value FROM itemparam WHERE item = ?1")
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![iid], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(db_err)?;
        let mut out = StringMap::new();
        for row in rows {
            let (name, value) = row.map_err(db_err)?;
            out.insert(name, value);
        }
        Ok(out)
    }

    pub fn last_pricelist(&self, iid: i64) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT lastpricelist FROM item WHERE id = ?1",
                params![iid],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)
            .map(Option::unwrap_or_default)
    }

    // --- operation / task queries -----------------------------------------

    pub fn try_count(&self, operation: i64) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT trycount FROM runningoperation WHERE id = ?1",
                params![operation],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)
            .map(Option::unwrap_or_default)
    }

    pub fn task_count_for_operation(&self, operation: i64) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM task WHERE runningoperation = ?1",
                params![operation],
                |row| row.get(0),
            )
            .map_err(db_err)
    }

    pub fn task_count(&self, task_type: &str, iid: i64) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM task WHERE type = ?1 AND item = ?2",
                params![task_type, iid],
                |row| row.get(0),
            )
            .map_err(db_err)
    }

    // --- measures ---------------------------------------------------------

    /// Conversion factor between two measures along the `lessmeasure` chain.
    pub fn measure_relation(&self, from: &str, to: &str, mode: MeasureMode) -> Result<f64> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT m1.intname, m1.relation, IFNULL(m2.intname, '')
                 FROM measure m1
                 LEFT JOIN measure m2 ON m1.lessmeasure = m2.id",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    MeasureLink {
                        relation: row.get(1)?,
                        less: row.get(2)?,
                    },
                ))
            })
            .map_err(db_err)?;
        let mut map = HashMap::new();
        for row in rows {
            let (name, link) = row.map_err(db_err)?;
            map.insert(name, link);
        }
        relation_between(&map, from, to, mode)
    }

    // --- seeding helpers (fixtures, tests) --------------------------------

    pub fn insert_module(&self, record: &ModuleRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO processingmodule (id, name, module, active, orderpriority)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.id,
                    record.name,
                    record.module,
                    if record.active { "on" } else { "off" },
                    record.orderpriority
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    pub fn insert_module_param(&self, module: i64, name: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO processingparam (processingmodule, intname, value)
                 VALUES (?1, ?2, ?3)",
                params![module, name, value],
            )
            .map_err(db_err)?;
        Ok(())
    }

    pub fn insert_crypted_param(&self, module: i64, name: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO processingcryptedparam (processingmodule, intname, value)
                 VALUES (?1, ?2, ?3)",
                params![module, name, value],
            )
            .map_err(db_err)?;
        Ok(())
    }

    pub fn insert_itemtype(&self, id: i64, intname: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO itemtype (id, intname) VALUES (?1, ?2)",
                params![id, intname],
            )
            .map_err(db_err)?;
        Ok(())
    }

    pub fn insert_pricelist(&self, id: i64, intname: &str, itemtype: i64) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO pricelist (id, intname, itemtype) VALUES (?1, ?2, ?3)",
                params![id, intname, itemtype],
            )
            .map_err(db_err)?;
        Ok(())
    }

    pub fn bind_module_pricelist(&self, module: i64, pricelist: i64) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO processingmodule2pricelist (processingmodule, pricelist)
                 VALUES (?1, ?2)",
                params![module, pricelist],
            )
            .map_err(db_err)?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn insert_item(
        &self,
        id: i64,
        name: &str,
        module: i64,
        pricelist: i64,
        remoteid: &str,
        period: i64,
        status: i64,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO item
                    (id, name, processingmodule, pricelist, remoteid, period, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![id, name, module, pricelist, remoteid, period, status],
            )
            .map_err(db_err)?;
        Ok(())
    }

    pub fn insert_item_param(&self, iid: i64, name: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO itemparam (item, intname, value) VALUES (?1, ?2, ?3)",
                params![iid, name, value],
            )
            .map_err(db_err)?;
        Ok(())
    }

    pub fn set_last_pricelist(&self, iid: i64, pricelist: i64) -> Result<()> {
        self.conn
            .execute(
                "UPDATE item SET lastpricelist = ?2 WHERE id = ?1",
                params![iid, pricelist],
            )
            .map_err(db_err)?;
        Ok(())
    }

    pub fn rebind_item(&self, iid: i64, module: i64) -> Result<()> {
        self.conn
            .execute(
                "UPDATE item SET processingmodule = ?2 WHERE id = ?1",
                params![iid, module],
            )
            .map_err(db_err)?;
        Ok(())
    }

    pub fn insert_running_operation(&self, id: i64, trycount: i64) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO runningoperation (id, trycount) VALUES (?1, ?2)",
                params![id, trycount],
            )
            .map_err(db_err)?;
        Ok(())
    }

    pub fn insert_task(&self, id: i64, operation: i64, task_type: &str, iid: i64) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO task (id, runningoperation, type, item) VALUES (?1, ?2, ?3, ?4)",
                params![id, operation, task_type, iid],
            )
            .map_err(db_err)?;
        Ok(())
    }

    pub fn insert_measure(
        &self,
        id: i64,
        intname: &str,
        relation: i64,
        lessmeasure: Option<i64>,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO measure (id, intname, relation, lessmeasure)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, intname, relation, lessmeasure],
            )
            .map_err(db_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UpperCipher;

    impl SecretCipher for UpperCipher {
        fn decrypt(&self, value: &str) -> Result<String> {
            Ok(value.to_uppercase())
        }
    }

    fn seeded() -> Store {
        let store = Store::open_in_memory().unwrap();
        store
            .insert_module(&ModuleRecord {
                id: 1,
                name: "Vendor primary".to_string(),
                module: "pmsample".to_string(),
                active: true,
                orderpriority: 0,
            })
            .unwrap();
        store
            .insert_module(&ModuleRecord {
                id: 2,
                name: "Vendor backup".to_string(),
                module: "pmsample".to_string(),
                active: true,
                orderpriority: 10,
            })
            .unwrap();
        store
            .insert_module(&ModuleRecord {
                id: 3,
                name: "Other vendor".to_string(),
                module: "pmother".to_string(),
                active: true,
                orderpriority: 0,
            })
            .unwrap();
        store.insert_itemtype(1, "certificate").unwrap();
        store.insert_pricelist(11, "dv-cert", 1).unwrap();
        store.bind_module_pricelist(1, 11).unwrap();
        store.bind_module_pricelist(2, 11).unwrap();
        store.bind_module_pricelist(3, 11).unwrap();
        store
            .insert_item(42, "example.com cert", 1, 11, "r-99", 12, 2)
            .unwrap();
        store
    }

    #[test]
    fn item_snapshot_joins_names() {
        let store = seeded();
        let item = store.item(42).unwrap();
        assert_eq!(item.intname, "certificate");
        assert_eq!(item.module, "pmsample");
        assert_eq!(item.pricelist_intname, "dv-cert");
        assert_eq!(item.remoteid, "r-99");
        assert_eq!(item.processingmodule, 1);
        assert_eq!(item.lastpricelist, 0);
    }

    #[test]
    fn missing_item_is_missed_error() {
        let store = seeded();
        let err = store.item(999).unwrap_err();
        assert_eq!(err.kind(), "missed");
        assert_eq!(err.object(), "item");
        assert_eq!(err.value(), "999");
    }

    #[test]
    fn module_params_merge_and_decrypt() {
        let store = Store::open_in_memory()
            .unwrap()
            .with_cipher(Box::new(UpperCipher));
        store
            .insert_module(&ModuleRecord {
                id: 1,
                name: "m".to_string(),
                module: "pmsample".to_string(),
                active: true,
                orderpriority: 0,
            })
            .unwrap();
        store.insert_module_param(1, "url", "https://api").unwrap();
        store.insert_module_param(1, "token", "plain").unwrap();
        store.insert_crypted_param(1, "token", "secret").unwrap();
        store.insert_crypted_param(1, "empty", "").unwrap();

        let params = store.module_params(1).unwrap();
        assert_eq!(params.get("url").map(String::as_str), Some("https://api"));
        // crypted row wins and goes through the cipher
        assert_eq!(params.get("token").map(String::as_str), Some("SECRET"));
        // empty secrets bypass the cipher
        assert_eq!(params.get("empty").map(String::as_str), Some(""));
    }

    #[test]
    fn suitable_modules_filter_and_order() {
        let store = seeded();
        // other-vendor module 3 is bound but never suitable
        assert_eq!(store.suitable_modules(11, "pmsample", &[]).unwrap(), [1, 2]);
        assert_eq!(store.suitable_modules(11, "pmsample", &[1]).unwrap(), [2]);
        assert_eq!(
            store.suitable_modules(11, "pmsample", &[1, 2]).unwrap(),
            [] as [i64; 0]
        );
    }

    #[test]
    fn inactive_module_is_not_suitable() {
        let store = seeded();
        store
            .insert_module(&ModuleRecord {
                id: 4,
                name: "disabled".to_string(),
                module: "pmsample".to_string(),
                active: false,
                orderpriority: -5,
            })
            .unwrap();
        store.bind_module_pricelist(4, 11).unwrap();
        assert_eq!(store.suitable_modules(11, "pmsample", &[]).unwrap(), [1, 2]);
    }

    #[test]
    fn try_and_task_counts() {
        let store = seeded();
        store.insert_running_operation(7, 9).unwrap();
        assert_eq!(store.try_count(7).unwrap(), 9);
        assert_eq!(store.try_count(8).unwrap(), 0);

        assert_eq!(store.task_count_for_operation(7).unwrap(), 0);
        store.insert_task(1, 7, "pmsample_open", 42).unwrap();
        assert_eq!(store.task_count_for_operation(7).unwrap(), 1);
        assert_eq!(store.task_count("pmsample_open", 42).unwrap(), 1);
        assert_eq!(store.task_count("pmsample_close", 42).unwrap(), 0);
    }

    #[test]
    fn rollback_discards_rebind() {
        let store = seeded();
        store.begin().unwrap();
        store.rebind_item(42, 2).unwrap();
        assert_eq!(store.module_of_item(42).unwrap(), 2);
        store.rollback().unwrap();
        assert_eq!(store.module_of_item(42).unwrap(), 1);
        // idempotent outside a transaction
        store.rollback().unwrap();
        store.commit().unwrap();
    }

    #[test]
    fn begin_is_idempotent() {
        let store = seeded();
        store.begin().unwrap();
        store.begin().unwrap();
        assert!(store.in_transaction());
        store.commit().unwrap();
        assert!(!store.in_transaction());
    }

    #[test]
    fn measure_relation_through_table() {
        let store = seeded();
        store.insert_measure(3, "day", 0, None).unwrap();
        store.insert_measure(2, "month", 30, Some(3)).unwrap();
        store.insert_measure(1, "year", 12, Some(2)).unwrap();
        assert_eq!(
            store
                .measure_relation("year", "day", MeasureMode::Strict)
                .unwrap(),
            360.0
        );
        // divided link by link, so the stepwise product, not 1.0 / 360.0
        assert_eq!(
            store
                .measure_relation("day", "year", MeasureMode::Strict)
                .unwrap(),
            (1.0 / 12.0) / 30.0
        );
        assert_eq!(
            store
                .measure_relation("year", "absent", MeasureMode::Lenient)
                .unwrap(),
            0.0
        );
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("billing.db");
        {
            let store = Store::open(&path).unwrap();
            store
                .insert_module(&ModuleRecord {
                    id: 1,
                    name: "m".to_string(),
                    module: "pmsample".to_string(),
                    active: true,
                    orderpriority: 0,
                })
                .unwrap();
        }
        let store = Store::open(&path).unwrap();
        assert_eq!(store.module_name(1).unwrap(), "m");
    }
}
