use std::fmt;

/// The fixed command vocabulary a processing module understands.
///
/// The panel core selects the operation at runtime by passing its wire name
/// through `--command`. Commands outside the vocabulary reach the module as
/// [`Operation::Custom`] and fall through to the plugin's custom handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    Features,
    Open,
    Suspend,
    CancelProlong,
    Resume,
    Close,
    SetParam,
    Prolong,
    ProlongAddon,
    GetSuitableModule,
    CheckConnection,
    SyncPriceList,
    SyncServer,
    SyncIpList,
    GetServerConfig,
    SyncItem,
    Reopen,
    Stat,
    ImportPriceList,
    CheckParam,
    CheckAddon,
    GenKey,
    TuneConnection,
    TuneServiceProfile,
    ValidateServiceProfile,
    UserCreate,
    TuningParam,
    Custom(String),
}

impl Operation {
    pub fn parse(command: &str) -> Operation {
        match command {
            "features" => Operation::Features,
            "open" => Operation::Open,
            "suspend" => Operation::Suspend,
            "cancel_prolong" => Operation::CancelProlong,
            "resume" => Operation::Resume,
            "close" => Operation::Close,
            "setparam" => Operation::SetParam,
            "prolong" => Operation::Prolong,
            "prolong_addon" => Operation::ProlongAddon,
            "get_suitable_module" => Operation::GetSuitableModule,
            "check_connection" => Operation::CheckConnection,
            "sync_pricelist" => Operation::SyncPriceList,
            "sync_server" => Operation::SyncServer,
            "sync_iplist" => Operation::SyncIpList,
            "get_server_config" => Operation::GetServerConfig,
            "sync_item" => Operation::SyncItem,
            "reopen" => Operation::Reopen,
            "stat" => Operation::Stat,
            "import_pricelist" => Operation::ImportPriceList,
            "check_param" => Operation::CheckParam,
            "check_addon" => Operation::CheckAddon,
            "gen_key" => Operation::GenKey,
            "tune_connection" => Operation::TuneConnection,
            "tune_service_profile" => Operation::TuneServiceProfile,
            "validate_service_profile" => Operation::ValidateServiceProfile,
            "usercreate" => Operation::UserCreate,
            "tuning_param" => Operation::TuningParam,
            other => Operation::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Operation::Features => "features",
            Operation::Open => "open",
            Operation::Suspend => "suspend",
            Operation::CancelProlong => "cancel_prolong",
            Operation::Resume => "resume",
            Operation::Close => "close",
            Operation::SetParam => "setparam",
            Operation::Prolong => "prolong",
            Operation::ProlongAddon => "prolong_addon",
            Operation::GetSuitableModule => "get_suitable_module",
            Operation::CheckConnection => "check_connection",
            Operation::SyncPriceList => "sync_pricelist",
            Operation::SyncServer => "sync_server",
            Operation::SyncIpList => "sync_iplist",
            Operation::GetServerConfig => "get_server_config",
            Operation::SyncItem => "sync_item",
            Operation::Reopen => "reopen",
            Operation::Stat => "stat",
            Operation::ImportPriceList => "import_pricelist",
            Operation::CheckParam => "check_param",
            Operation::CheckAddon => "check_addon",
            Operation::GenKey => "gen_key",
            Operation::TuneConnection => "tune_connection",
            Operation::TuneServiceProfile => "tune_service_profile",
            Operation::ValidateServiceProfile => "validate_service_profile",
            Operation::UserCreate => "usercreate",
            Operation::TuningParam => "tuning_param",
            Operation::Custom(name) => name,
        }
    }

    /// Operations the fleet-wide maintenance marker short-circuits to a no-op
    /// success before any handler runs.
    pub fn suppressible(&self) -> bool {
        matches!(
            self,
            Operation::Open
                | Operation::Resume
                | Operation::Suspend
                | Operation::CancelProlong
                | Operation::Close
                | Operation::SyncItem
                | Operation::Prolong
                | Operation::ProlongAddon
                | Operation::Reopen
                | Operation::Stat
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_known_commands() {
        for name in [
            "features",
            "open",
            "suspend",
            "cancel_prolong",
            "resume",
            "close",
            "setparam",
            "prolong",
            "prolong_addon",
            "get_suitable_module",
            "check_connection",
            "sync_pricelist",
            "sync_server",
            "sync_iplist",
            "get_server_config",
            "sync_item",
            "reopen",
            "stat",
            "import_pricelist",
            "check_param",
            "check_addon",
            "gen_key",
            "tune_connection",
            "tune_service_profile",
            "validate_service_profile",
            "usercreate",
            "tuning_param",
        ] {
            let op = Operation::parse(name);
            assert!(!matches!(op, Operation::Custom(_)), "{name} fell through");
            assert_eq!(op.as_str(), name);
        }
    }

    #[test]
    fn unknown_command_falls_through() {
        let op = Operation::parse("transfer");
        assert_eq!(op, Operation::Custom("transfer".to_string()));
        assert_eq!(op.as_str(), "transfer");
    }

    #[test]
    fn suppression_set_matches_mutating_item_operations() {
        assert!(Operation::Open.suppressible());
        assert!(Operation::Stat.suppressible());
        assert!(Operation::ProlongAddon.suppressible());
        assert!(!Operation::Features.suppressible());
        assert!(!Operation::CheckConnection.suppressible());
        assert!(!Operation::SyncPriceList.suppressible());
        assert!(!Operation::SetParam.suppressible());
    }
}
