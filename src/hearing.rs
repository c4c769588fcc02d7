//! Hearing map: beacon requests and reports.
//!
//! Connected clients are periodically asked to measure the APs they can
//! hear (802.11k beacon requests); the resulting reports build a per-client
//! radio-neighborhood view used by the steering policy.
//
// https://github.com/apsteer/apsteer

use crate::config::SteerConfig;
use crate::sta::StaInfo;
use crate::MacAddr;

/// Channel for an operating frequency in MHz.
///
/// See 802.11-2007 17.3.8.3.2 and Annex J.
pub fn channel_from_freq(freq: u32) -> i32 {
    let f = freq as i32;

    if f == 2484 {
        14
    } else if f < 2484 {
        (f - 2407) / 5
    } else if (4910..=4980).contains(&f) {
        (f - 4000) / 5
    } else if f <= 45000 {
        /* DMG band lower limit */
        (f - 5000) / 5
    } else if (58320..=64800).contains(&f) {
        (f - 56160) / 2160
    } else {
        0
    }
}

/// Operating class covering a channel, 0 when the channel maps to none
/// (channel 14 included)
pub fn op_class_from_channel(channel: i32) -> u32 {
    match channel {
        36..=48 => 115,
        52..=64 => 118,
        100..=140 => 121,
        1..=13 => 81,
        _ => 0,
    }
}

/// One received beacon report, keyed by the reported BSSID
#[derive(Debug, Clone, PartialEq)]
pub struct BeaconReport {
    pub bssid: MacAddr,
    pub rcpi: u16,
    pub rsni: u16,
    pub op_class: u16,
    pub channel: u16,
    pub duration: u16,
    pub start_time: u64,
    /// Local receipt stamp, drives the validity TTL
    pub received: u64,
}

/// Per-client beacon request schedule
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BeaconSchedule {
    pub last_request: u64,
    /// Consecutive requests without a report; halved on success
    pub fails: u32,
}

/// Request interval for a client at the given signal strength.
///
/// Maps signal into (-1, 1) via s/(1+|s|) around -60 dBm, so strong
/// clients are probed less often.
pub fn dyn_interval(cfg: &SteerConfig, signal: i32) -> u64 {
    let s = (signal + 60) as f32;
    let adj = cfg.beacon_request_signal_modifier as f32 * (s / (1.0 + s.abs()));
    let interval = cfg.beacon_request_frequency as f32 + adj;

    interval.max(0.0) as u64
}

/// Measurement mode, escalating with consecutive failures
pub fn request_mode(band_2ghz: bool, fails: u32) -> u32 {
    if band_2ghz {
        match fails {
            0..=2 => 1,
            3..=6 => 0,
            _ => 2,
        }
    } else {
        match fails {
            0..=4 => 0,
            _ => 2,
        }
    }
}

/// Next sweep target: cycle through the other known local frequencies so
/// reports end up spanning all bands
pub fn pick_scan_freq(freqs: &[u32], cursor: &mut usize, current: u32) -> Option<u32> {
    let n = freqs.len();

    for _ in 0..n {
        let freq = freqs[*cursor % n];
        *cursor = cursor.wrapping_add(1);
        if freq != current {
            return Some(freq);
        }
    }

    None
}

/// Store a report, replacing any previous one for the same BSSID
pub fn upsert_report(si: &mut StaInfo, report: BeaconReport) {
    si.beacons.insert(report.bssid, report);
}

/// Drop reports older than the validity window
pub fn cleanup_reports(si: &mut StaInfo, now: u64, ttl_secs: u32) {
    let ttl_ms = ttl_secs as u64 * 1000;
    si.beacons.retain(|_, r| now.saturating_sub(r.received) <= ttl_ms);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::node::NodeId;

    #[test]
    fn channel_table() {
        assert_eq!(channel_from_freq(2484), 14);
        assert_eq!(channel_from_freq(2412), 1);
        assert_eq!(channel_from_freq(2472), 13);
        assert_eq!(channel_from_freq(4940), 188);
        assert_eq!(channel_from_freq(5180), 36);
        assert_eq!(channel_from_freq(5500), 100);
        assert_eq!(channel_from_freq(60480), 2);
        assert_eq!(channel_from_freq(70000), 0);
    }

    #[test]
    fn op_class_table() {
        assert_eq!(op_class_from_channel(channel_from_freq(2484)), 0);
        assert_eq!(op_class_from_channel(channel_from_freq(5180)), 115);
        assert_eq!(op_class_from_channel(channel_from_freq(5260)), 118);
        assert_eq!(op_class_from_channel(channel_from_freq(5500)), 121);
        assert_eq!(op_class_from_channel(channel_from_freq(2412)), 81);
        assert_eq!(op_class_from_channel(0), 0);
    }

    #[test]
    fn dyn_interval_neutral_at_minus_60() {
        let cfg = SteerConfig::default();

        assert_eq!(dyn_interval(&cfg, -60), cfg.beacon_request_frequency as u64);
        // Stronger signal stretches the interval, weaker shortens it
        assert!(dyn_interval(&cfg, -40) > dyn_interval(&cfg, -60));
        assert!(dyn_interval(&cfg, -80) < dyn_interval(&cfg, -60));
    }

    #[test]
    fn mode_escalates_with_failures() {
        assert_eq!(request_mode(true, 0), 1);
        assert_eq!(request_mode(true, 3), 0);
        assert_eq!(request_mode(true, 7), 2);
        assert_eq!(request_mode(false, 0), 0);
        assert_eq!(request_mode(false, 4), 0);
        assert_eq!(request_mode(false, 5), 2);
    }

    #[test]
    fn scan_freq_skips_current_band() {
        let freqs = [2412, 5180];
        let mut cursor = 0;

        assert_eq!(pick_scan_freq(&freqs, &mut cursor, 2412), Some(5180));
        assert_eq!(pick_scan_freq(&freqs, &mut cursor, 2412), Some(5180));
        assert_eq!(pick_scan_freq(&[2412], &mut cursor, 2412), None);
        assert_eq!(pick_scan_freq(&[], &mut cursor, 2412), None);
    }

    #[test]
    fn reports_expire_and_overwrite() {
        let node = NodeId::Local("hostapd.wlan0".to_string());
        let addr: MacAddr = "02:00:00:00:00:01".parse().unwrap();
        let bssid: MacAddr = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        let mut si = StaInfo::new(addr, node, 0);

        upsert_report(
            &mut si,
            BeaconReport {
                bssid,
                rcpi: 100,
                rsni: 30,
                op_class: 81,
                channel: 1,
                duration: 100,
                start_time: 1,
                received: 0,
            },
        );
        upsert_report(
            &mut si,
            BeaconReport {
                bssid,
                rcpi: 120,
                rsni: 40,
                op_class: 81,
                channel: 1,
                duration: 100,
                start_time: 2,
                received: 1000,
            },
        );

        assert_eq!(si.beacons.len(), 1);
        assert_eq!(si.beacons[&bssid].rcpi, 120);

        cleanup_reports(&mut si, 1000 + 200_000, 200);
        assert_eq!(si.beacons.len(), 1);
        cleanup_reports(&mut si, 1000 + 200_001, 200);
        assert!(si.beacons.is_empty());
    }
}
