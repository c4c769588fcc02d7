//! Runtime configuration.
//!
//! All intervals are milliseconds unless the field name says otherwise.
//
// https://github.com/apsteer/apsteer

use log::LevelFilter;

/// Controller configuration, shared by every subsystem
#[derive(Debug, Clone, PartialEq)]
pub struct SteerConfig {
    pub syslog: bool,
    pub debug_level: u32,

    pub sta_block_timeout: u32,
    pub local_sta_timeout: u32,
    pub local_sta_update: u32,

    pub max_retry_band: u32,
    pub seen_policy_timeout: u32,

    pub band_steering_threshold: u32,
    pub load_balancing_threshold: u32,

    pub remote_update_interval: u32,
    pub remote_node_timeout: u32,

    pub min_snr: i32,
    pub min_connect_snr: i32,
    pub signal_diff_threshold: u32,

    pub roam_scan_snr: i32,
    pub roam_scan_tries: u32,
    pub roam_scan_interval: u32,

    pub roam_trigger_snr: i32,
    pub roam_trigger_interval: u32,

    pub roam_kick_delay: u32,

    pub initial_connect_delay: u32,

    pub load_kick_enabled: bool,
    pub load_kick_threshold: u32,
    pub load_kick_delay: u32,
    pub load_kick_min_clients: u32,
    pub load_kick_reason_code: u32,

    pub kick_client_active_sec: u32,
    pub kick_client_active_kbits: u32,

    /// Seconds a beacon report stays valid
    pub beacon_report_invalid_timeout: u32,
    pub beacon_request_frequency: u32,
    pub beacon_request_signal_modifier: u32,

    pub interfaces: Vec<String>,
    /// Stored and reported only; invoking it is up to an external hook runner
    pub node_up_script: String,
    pub remote_disabled: bool,
}

impl Default for SteerConfig {
    fn default() -> Self {
        Self {
            syslog: false,
            debug_level: 0,

            sta_block_timeout: 30 * 1000,
            local_sta_timeout: 120 * 1000,
            local_sta_update: 1000,

            max_retry_band: 5,
            seen_policy_timeout: 30 * 1000,

            band_steering_threshold: 5,
            load_balancing_threshold: 5,

            remote_update_interval: 1000,
            remote_node_timeout: 120 * 1000,

            min_snr: 0,
            min_connect_snr: 0,
            signal_diff_threshold: 0,

            roam_scan_snr: 0,
            roam_scan_tries: 3,
            roam_scan_interval: 10 * 1000,

            roam_trigger_snr: 0,
            roam_trigger_interval: 60 * 1000,

            roam_kick_delay: 100,

            initial_connect_delay: 0,

            load_kick_enabled: false,
            load_kick_threshold: 75,
            load_kick_delay: 10 * 1000,
            load_kick_min_clients: 10,
            load_kick_reason_code: 5, /* WLAN_REASON_DISASSOC_AP_BUSY */

            kick_client_active_sec: 30,
            kick_client_active_kbits: 50000,

            beacon_report_invalid_timeout: 200,
            beacon_request_frequency: 30 * 1000,
            beacon_request_signal_modifier: 20 * 1000,

            interfaces: Vec::new(),
            node_up_script: String::new(),
            remote_disabled: false,
        }
    }
}

impl SteerConfig {
    /// Log level filter matching the numeric debug level (`-v` count)
    pub fn level_filter(&self) -> LevelFilter {
        match self.debug_level {
            0 => LevelFilter::Error,
            1 => LevelFilter::Info,
            2 | 3 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    /// Full snapshot as an update, the readable config surface
    pub fn snapshot(&self) -> ConfigUpdate {
        ConfigUpdate {
            syslog: Some(self.syslog),
            debug_level: Some(self.debug_level),
            sta_block_timeout: Some(self.sta_block_timeout),
            local_sta_timeout: Some(self.local_sta_timeout),
            local_sta_update: Some(self.local_sta_update),
            max_retry_band: Some(self.max_retry_band),
            seen_policy_timeout: Some(self.seen_policy_timeout),
            band_steering_threshold: Some(self.band_steering_threshold),
            load_balancing_threshold: Some(self.load_balancing_threshold),
            remote_update_interval: Some(self.remote_update_interval),
            remote_node_timeout: Some(self.remote_node_timeout),
            min_snr: Some(self.min_snr),
            min_connect_snr: Some(self.min_connect_snr),
            signal_diff_threshold: Some(self.signal_diff_threshold),
            roam_scan_snr: Some(self.roam_scan_snr),
            roam_scan_tries: Some(self.roam_scan_tries),
            roam_scan_interval: Some(self.roam_scan_interval),
            roam_trigger_snr: Some(self.roam_trigger_snr),
            roam_trigger_interval: Some(self.roam_trigger_interval),
            roam_kick_delay: Some(self.roam_kick_delay),
            initial_connect_delay: Some(self.initial_connect_delay),
            load_kick_enabled: Some(self.load_kick_enabled),
            load_kick_threshold: Some(self.load_kick_threshold),
            load_kick_delay: Some(self.load_kick_delay),
            load_kick_min_clients: Some(self.load_kick_min_clients),
            load_kick_reason_code: Some(self.load_kick_reason_code),
            kick_client_active_sec: Some(self.kick_client_active_sec),
            kick_client_active_kbits: Some(self.kick_client_active_kbits),
            beacon_report_invalid_timeout: Some(self.beacon_report_invalid_timeout),
            beacon_request_frequency: Some(self.beacon_request_frequency),
            beacon_request_signal_modifier: Some(self.beacon_request_signal_modifier),
            interfaces: Some(self.interfaces.clone()),
            node_up_script: Some(self.node_up_script.clone()),
            remote_disabled: Some(self.remote_disabled),
        }
    }
}

/// Partial configuration, applied field-by-field.
///
/// Absent fields leave the current value untouched; unknown fields never
/// reach this struct in the first place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigUpdate {
    pub syslog: Option<bool>,
    pub debug_level: Option<u32>,
    pub sta_block_timeout: Option<u32>,
    pub local_sta_timeout: Option<u32>,
    pub local_sta_update: Option<u32>,
    pub max_retry_band: Option<u32>,
    pub seen_policy_timeout: Option<u32>,
    pub band_steering_threshold: Option<u32>,
    pub load_balancing_threshold: Option<u32>,
    pub remote_update_interval: Option<u32>,
    pub remote_node_timeout: Option<u32>,
    pub min_snr: Option<i32>,
    pub min_connect_snr: Option<i32>,
    pub signal_diff_threshold: Option<u32>,
    pub roam_scan_snr: Option<i32>,
    pub roam_scan_tries: Option<u32>,
    pub roam_scan_interval: Option<u32>,
    pub roam_trigger_snr: Option<i32>,
    pub roam_trigger_interval: Option<u32>,
    pub roam_kick_delay: Option<u32>,
    pub initial_connect_delay: Option<u32>,
    pub load_kick_enabled: Option<bool>,
    pub load_kick_threshold: Option<u32>,
    pub load_kick_delay: Option<u32>,
    pub load_kick_min_clients: Option<u32>,
    pub load_kick_reason_code: Option<u32>,
    pub kick_client_active_sec: Option<u32>,
    pub kick_client_active_kbits: Option<u32>,
    pub beacon_report_invalid_timeout: Option<u32>,
    pub beacon_request_frequency: Option<u32>,
    pub beacon_request_signal_modifier: Option<u32>,
    pub interfaces: Option<Vec<String>>,
    pub node_up_script: Option<String>,
    pub remote_disabled: Option<bool>,
}

macro_rules! apply_field {
    ($self:ident, $cfg:ident, $($name:ident),+ $(,)?) => {
        $(
            if let Some(v) = $self.$name.clone() {
                $cfg.$name = v;
            }
        )+
    };
}

impl ConfigUpdate {
    /// Overlay the provided fields onto `cfg`
    pub fn apply(&self, cfg: &mut SteerConfig) {
        apply_field!(
            self,
            cfg,
            syslog,
            debug_level,
            sta_block_timeout,
            local_sta_timeout,
            local_sta_update,
            max_retry_band,
            seen_policy_timeout,
            band_steering_threshold,
            load_balancing_threshold,
            remote_update_interval,
            remote_node_timeout,
            min_snr,
            min_connect_snr,
            signal_diff_threshold,
            roam_scan_snr,
            roam_scan_tries,
            roam_scan_interval,
            roam_trigger_snr,
            roam_trigger_interval,
            roam_kick_delay,
            initial_connect_delay,
            load_kick_enabled,
            load_kick_threshold,
            load_kick_delay,
            load_kick_min_clients,
            load_kick_reason_code,
            kick_client_active_sec,
            kick_client_active_kbits,
            beacon_report_invalid_timeout,
            beacon_request_frequency,
            beacon_request_signal_modifier,
            interfaces,
            node_up_script,
            remote_disabled,
        );
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = SteerConfig::default();

        assert_eq!(cfg.sta_block_timeout, 30_000);
        assert_eq!(cfg.local_sta_timeout, 120_000);
        assert_eq!(cfg.local_sta_update, 1000);
        assert_eq!(cfg.remote_update_interval, 1000);
        assert_eq!(cfg.remote_node_timeout, 120_000);
        assert_eq!(cfg.load_kick_threshold, 75);
        assert_eq!(cfg.load_kick_reason_code, 5);
        assert_eq!(cfg.kick_client_active_kbits, 50_000);
        assert_eq!(cfg.beacon_report_invalid_timeout, 200);
        assert_eq!(cfg.beacon_request_frequency, 30_000);
        assert!(!cfg.load_kick_enabled);
        assert!(!cfg.remote_disabled);
    }

    #[test]
    fn snapshot_apply_is_identity() {
        let mut cfg = SteerConfig::default();
        cfg.debug_level = 3;
        cfg.interfaces = vec!["lo".to_string(), "br-lan".to_string()];
        cfg.roam_trigger_snr = -70;

        // set_config semantics: re-init defaults, then apply the snapshot
        let snap = cfg.snapshot();
        let mut fresh = SteerConfig::default();
        snap.apply(&mut fresh);

        assert_eq!(fresh, cfg);
    }

    #[test]
    fn partial_update_leaves_other_fields() {
        let mut cfg = SteerConfig::default();
        let update = ConfigUpdate {
            load_kick_enabled: Some(true),
            load_kick_threshold: Some(50),
            ..Default::default()
        };

        update.apply(&mut cfg);

        assert!(cfg.load_kick_enabled);
        assert_eq!(cfg.load_kick_threshold, 50);
        assert_eq!(cfg.local_sta_timeout, 120_000);
    }

    #[test]
    fn debug_level_maps_to_filter() {
        let mut cfg = SteerConfig::default();
        assert_eq!(cfg.level_filter(), LevelFilter::Error);
        cfg.debug_level = 1;
        assert_eq!(cfg.level_filter(), LevelFilter::Info);
        cfg.debug_level = 5;
        assert_eq!(cfg.level_filter(), LevelFilter::Trace);
    }
}
