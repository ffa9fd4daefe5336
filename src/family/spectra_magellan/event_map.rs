// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// Spectra/Magellan live-event table

use crate::event::EventLevel::{Critical, Debug, Info, Warn};
use crate::family::event_map::{EventEntry, EventMap, EventOverride};
use crate::storage::ElementType::{BusModule, Partition, Pgm, System, User, Zone};

const PARTITION_STATUS: &[(u16, EventOverride)] = &[
    (2, EventOverride::message("Silent alarm in @partition").level(Critical).tags(&["alarm"])),
    (3, EventOverride::message("Buzzer alarm in @partition").level(Critical).tags(&["alarm"])),
    (4, EventOverride::message("Steady alarm in @partition").level(Critical).tags(&["alarm"])),
    (5, EventOverride::message("Pulse alarm in @partition").level(Critical).tags(&["alarm"])),
    (6, EventOverride::message("Strobe alarm in @partition").level(Critical).tags(&["alarm"])),
    (7, EventOverride::message("Alarm stopped in @partition").tags(&["alarm", "restore"])),
    (8, EventOverride::message("Squawk ON in @partition")),
    (9, EventOverride::message("Squawk OFF in @partition")),
    (10, EventOverride::message("Ground start in @partition")),
    (
        11,
        EventOverride::message("Disarm partition @partition")
            .unlabelled("Partition @partition disarmed")
            .tags(&["disarm"]),
    ),
    (
        12,
        EventOverride::message("Arm partition @partition")
            .unlabelled("Partition @partition armed")
            .tags(&["arm"]),
    ),
    (13, EventOverride::message("Entry delay started in @partition").level(Warn).tags(&["delay"])),
    (14, EventOverride::message("Exit delay started in @partition").tags(&["delay"])),
    (15, EventOverride::message("Pre-alarm delay in @partition").level(Warn).tags(&["delay"])),
    (16, EventOverride::message("Report confirmation in @partition")),
];

const BELL_STATUS: &[(u16, EventOverride)] = &[
    (0, EventOverride::message("Bell OFF in @partition")),
    (1, EventOverride::message("Bell ON in @partition").level(Warn).tags(&["alarm"])),
    (2, EventOverride::message("Bell squawk arm in @partition")),
    (3, EventOverride::message("Bell squawk disarm in @partition")),
];

const NON_REPORTABLE: &[(u16, EventOverride)] = &[
    (0, EventOverride::message("Telephone line trouble").level(Warn).tags(&["trouble"])),
    (1, EventOverride::message("Reset smoke detectors")),
    (2, EventOverride::message("Instant arming in @partition").tags(&["arm"])),
    (3, EventOverride::message("Stay arming in @partition").tags(&["arm"])),
    (4, EventOverride::message("Force arming in @partition").tags(&["arm"])),
    (5, EventOverride::message("Fast exit in @partition")),
    (6, EventOverride::message("PC fail to communicate").level(Warn).tags(&["trouble"])),
    (7, EventOverride::message("Midnight")),
];

const SPECIAL_ARMING: &[(u16, EventOverride)] = &[
    (0, EventOverride::message("Auto-arming in @partition").tags(&["arm"])),
    (1, EventOverride::message("Arming by WinLoad in @partition").tags(&["arm"])),
    (2, EventOverride::message("Late to close in @partition").tags(&["arm"])),
    (3, EventOverride::message("No movement arming in @partition").tags(&["arm"])),
    (4, EventOverride::message("Partial arming in @partition").tags(&["arm"])),
    (5, EventOverride::message("One-touch arming in @partition").tags(&["arm"])),
];

const SPECIAL_DISARMING: &[(u16, EventOverride)] = &[
    (0, EventOverride::message("Auto-arm cancelled in @partition").tags(&["disarm"])),
    (1, EventOverride::message("One-touch stay/instant disarm in @partition").tags(&["disarm"])),
    (2, EventOverride::message("Disarming by WinLoad in @partition").tags(&["disarm"])),
    (3, EventOverride::message("Disarming by WinLoad after alarm in @partition").tags(&["disarm"])),
    (4, EventOverride::message("WinLoad cancelled alarm in @partition").tags(&["disarm"])),
];

const SPECIAL_ALARM: &[(u16, EventOverride)] = &[
    (0, EventOverride::message("Emergency panic in @partition").tags(&["panic"])),
    (1, EventOverride::message("Medical panic in @partition").tags(&["panic"])),
    (2, EventOverride::message("Fire panic in @partition").tags(&["panic", "fire"])),
    (3, EventOverride::message("Recent closing in @partition")),
    (4, EventOverride::message("Police code in @partition")),
    (5, EventOverride::message("Global shutdown in @partition")),
];

const TROUBLE: &[(u16, EventOverride)] = &[
    (1, EventOverride::message("AC failure").tags(&["ac"])),
    (2, EventOverride::message("Battery failure").tags(&["battery"])),
    (3, EventOverride::message("Auxiliary current overload")),
    (4, EventOverride::message("Bell current overload")),
    (5, EventOverride::message("Bell disconnected")),
    (6, EventOverride::message("Clock loss")),
    (7, EventOverride::message("Fire loop trouble").tags(&["fire"])),
    (8, EventOverride::message("Fail to communicate to monitoring station telephone #1")),
    (9, EventOverride::message("Fail to communicate to monitoring station telephone #2")),
    (11, EventOverride::message("Fail to communicate to voice report")),
    (12, EventOverride::message("RF jamming")),
    (13, EventOverride::message("GSM RF jamming")),
    (14, EventOverride::message("GSM no service")),
    (15, EventOverride::message("GSM supervision lost")),
    (16, EventOverride::message("Fail to communicate IP receiver 1 (GPRS)")),
    (17, EventOverride::message("Fail to communicate IP receiver 2 (GPRS)")),
    (18, EventOverride::message("IP module no service")),
    (19, EventOverride::message("IP module supervision loss")),
    (20, EventOverride::message("Fail to communicate IP receiver 1 (IP)")),
    (21, EventOverride::message("Fail to communicate IP receiver 2 (IP)")),
];

const TROUBLE_RESTORE: &[(u16, EventOverride)] = &[
    (0, EventOverride::message("Telephone line restore")),
    (1, EventOverride::message("AC failure restore").tags(&["ac"])),
    (2, EventOverride::message("Battery failure restore").tags(&["battery"])),
    (3, EventOverride::message("Auxiliary current overload restore")),
    (4, EventOverride::message("Bell current overload restore")),
    (5, EventOverride::message("Bell disconnected restore")),
    (6, EventOverride::message("Clock loss restore")),
    (7, EventOverride::message("Fire loop trouble restore").tags(&["fire"])),
    (8, EventOverride::message("Fail to communicate to monitoring station telephone #1 restore")),
    (9, EventOverride::message("Fail to communicate to monitoring station telephone #2 restore")),
    (11, EventOverride::message("Fail to communicate to voice report restore")),
    (12, EventOverride::message("RF jamming restore")),
];

const MODULE_TROUBLE: &[(u16, EventOverride)] = &[
    (0, EventOverride::message("Bus module communication fault").of_type(BusModule)),
    (1, EventOverride::message("Tamper trouble").tags(&["tamper"])),
    (2, EventOverride::message("Power failure")),
    (3, EventOverride::message("Battery failure").tags(&["battery"])),
];

const MODULE_TROUBLE_RESTORE: &[(u16, EventOverride)] = &[
    (0, EventOverride::message("Bus module communication fault restore").of_type(BusModule)),
    (1, EventOverride::message("Tamper trouble restore").tags(&["tamper"])),
    (2, EventOverride::message("Power failure restore")),
    (3, EventOverride::message("Battery failure restore").tags(&["battery"])),
];

const SPECIAL: &[(u16, EventOverride)] = &[
    (0, EventOverride::message("System power up")),
    (1, EventOverride::message("Reporting test")),
    (2, EventOverride::message("Software log on")),
    (3, EventOverride::message("Software log off")),
    (4, EventOverride::message("Installer in programming mode")),
    (5, EventOverride::message("Installer exited programming mode")),
    (6, EventOverride::message("Maintenance in programming mode")),
    (7, EventOverride::message("Maintenance exited programming mode")),
    (8, EventOverride::message("Closing delinquency delay elapsed")),
];

const SYSTEM_STATUS: &[(u16, EventOverride)] = &[
    (0, EventOverride::message("Follow arm LED status")),
    (1, EventOverride::message("PGM pulse fast in alarm")),
    (2, EventOverride::message("PGM pulse fast in exit delay below 10 sec")),
    (3, EventOverride::message("PGM pulse slow in exit delay over 10 sec")),
    (4, EventOverride::message("PGM steady ON if armed")),
    (5, EventOverride::message("PGM ON if stay or instant armed")),
    (6, EventOverride::message("PGM steady ON if force armed")),
    (7, EventOverride::message("PGM pulse in entry delay")),
];

pub const EVENT_MAP: EventMap = &[
    (
        0,
        EventEntry::new(Zone, Debug, "Zone {label} OK")
            .tags(&["restore"])
            .change(&[("open", false)]),
    ),
    (
        1,
        EventEntry::new(Zone, Debug, "Zone {label} open").change(&[("open", true)]),
    ),
    (
        2,
        EventEntry::new(Partition, Info, "Partition @partition status changed").sub(PARTITION_STATUS),
    ),
    (3, EventEntry::new(Partition, Info, "Bell status in @partition").sub(BELL_STATUS)),
    (6, EventEntry::new(System, Info, "Non-reportable event").sub(NON_REPORTABLE)),
    (8, EventEntry::new(User, Info, "Remote control button pressed by {label}").tags(&["remote"])),
    (13, EventEntry::new(Zone, Debug, "Cold start wireless zone {label}")),
    (14, EventEntry::new(BusModule, Debug, "Cold start wireless module {label}")),
    (15, EventEntry::new(Zone, Info, "Zone {label} bypass programming").tags(&["bypass"])),
    (16, EventEntry::new(Pgm, Info, "Output {label} activated by user code")),
    (17, EventEntry::new(Zone, Warn, "Wireless smoke {label} maintenance signal")),
    (18, EventEntry::new(Zone, Info, "Zone {label} delay transmission")),
    (19, EventEntry::new(Zone, Warn, "Zone {label} signal strength weak 1").tags(&["signal"])),
    (20, EventEntry::new(Zone, Warn, "Zone {label} signal strength weak 2").tags(&["signal"])),
    (21, EventEntry::new(Zone, Warn, "Zone {label} signal strength weak 3").tags(&["signal"])),
    (22, EventEntry::new(Zone, Warn, "Zone {label} signal strength weak 4").tags(&["signal"])),
    (
        29,
        EventEntry::new(User, Info, "Arming @partition with user {label}").tags(&["arm"]),
    ),
    (30, EventEntry::new(Partition, Info, "Special arming").sub(SPECIAL_ARMING)),
    (
        31,
        EventEntry::new(User, Info, "Disarming @partition with user {label}").tags(&["disarm"]),
    ),
    (
        32,
        EventEntry::new(User, Info, "Disarming @partition after alarm with user {label}").tags(&["disarm"]),
    ),
    (
        33,
        EventEntry::new(User, Info, "Alarm cancelled in @partition with user {label}").tags(&["disarm"]),
    ),
    (34, EventEntry::new(Partition, Info, "Special disarming").sub(SPECIAL_DISARMING)),
    (35, EventEntry::new(Zone, Info, "Zone {label} bypassed").tags(&["bypass"])),
    (
        36,
        EventEntry::new(Zone, Critical, "Zone {label} in alarm")
            .tags(&["alarm"])
            .change(&[("presently_in_alarm", true)]),
    ),
    (
        37,
        EventEntry::new(Zone, Critical, "Fire alarm in zone {label}")
            .tags(&["alarm", "fire"])
            .change(&[("presently_in_alarm", true)]),
    ),
    (
        38,
        EventEntry::new(Zone, Info, "Zone {label} alarm restore")
            .tags(&["alarm", "restore"])
            .change(&[("presently_in_alarm", false)]),
    ),
    (
        39,
        EventEntry::new(Zone, Info, "Fire alarm restore in zone {label}")
            .tags(&["alarm", "fire", "restore"])
            .change(&[("presently_in_alarm", false)]),
    ),
    (
        40,
        EventEntry::new(Partition, Critical, "Special alarm").tags(&["alarm"]).sub(SPECIAL_ALARM),
    ),
    (41, EventEntry::new(Zone, Warn, "Zone {label} shutdown").change(&[("shutted_down", true)])),
    (
        42,
        EventEntry::new(Zone, Warn, "Zone {label} tampered")
            .tags(&["tamper"])
            .change(&[("tamper", true)]),
    ),
    (
        43,
        EventEntry::new(Zone, Info, "Zone {label} tamper restore")
            .tags(&["tamper", "restore"])
            .change(&[("tamper", false)]),
    ),
    (44, EventEntry::new(System, Warn, "New trouble").tags(&["trouble"]).sub(TROUBLE)),
    (
        45,
        EventEntry::new(System, Info, "Trouble restored").tags(&["trouble", "restore"]).sub(TROUBLE_RESTORE),
    ),
    (
        46,
        EventEntry::new(BusModule, Warn, "Module {label} trouble").tags(&["trouble"]).sub(MODULE_TROUBLE),
    ),
    (
        47,
        EventEntry::new(BusModule, Info, "Module {label} trouble restored")
            .tags(&["trouble", "restore"])
            .sub(MODULE_TROUBLE_RESTORE),
    ),
    (48, EventEntry::new(System, Info, "Special event").sub(SPECIAL)),
    (
        49,
        EventEntry::new(Zone, Warn, "Low battery on zone {label}")
            .tags(&["battery"])
            .change(&[("low_battery", true)]),
    ),
    (
        50,
        EventEntry::new(Zone, Info, "Low battery on zone {label} restore")
            .tags(&["battery", "restore"])
            .change(&[("low_battery", false)]),
    ),
    (
        51,
        EventEntry::new(Zone, Warn, "Zone {label} supervision trouble")
            .tags(&["trouble"])
            .change(&[("supervision_trouble", true)]),
    ),
    (
        52,
        EventEntry::new(Zone, Info, "Zone {label} supervision restore")
            .tags(&["trouble", "restore"])
            .change(&[("supervision_trouble", false)]),
    ),
    (
        53,
        EventEntry::new(BusModule, Warn, "Wireless module {label} supervision trouble").tags(&["trouble"]),
    ),
    (
        54,
        EventEntry::new(BusModule, Info, "Wireless module {label} supervision restore")
            .tags(&["trouble", "restore"]),
    ),
    (
        55,
        EventEntry::new(BusModule, Warn, "Wireless module {label} tamper trouble")
            .tags(&["tamper"])
            .change(&[("tamper", true)]),
    ),
    (
        56,
        EventEntry::new(BusModule, Info, "Wireless module {label} tamper restore")
            .tags(&["tamper", "restore"])
            .change(&[("tamper", false)]),
    ),
    (57, EventEntry::new(Zone, Critical, "Non-medical alarm (paramedic) on zone {label}").tags(&["alarm"])),
    (58, EventEntry::new(Zone, Info, "Zone {label} forced")),
    (59, EventEntry::new(Zone, Info, "Zone {label} included")),
    (64, EventEntry::new(System, Debug, "System status").sub(SYSTEM_STATUS)),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::event_map::lookup;

    #[test]
    fn test_majors_unique() {
        for (i, (a, _)) in EVENT_MAP.iter().enumerate() {
            assert!(EVENT_MAP[i + 1..].iter().all(|(b, _)| a != b), "duplicate major {a}");
        }
    }

    #[test]
    fn test_disarm_entry() {
        let resolved = lookup(EVENT_MAP, 2).unwrap().resolve(11);
        assert_eq!(resolved.message, "Disarm partition @partition");
        assert_eq!(resolved.unlabelled, Some("Partition @partition disarmed"));
        assert!(resolved.id_from_partition);
        assert_eq!(resolved.tags, vec!["disarm"]);
    }

    #[test]
    fn test_zone_open_entry() {
        let resolved = lookup(EVENT_MAP, 1).unwrap().resolve(5);
        assert!(!resolved.id_from_partition);
        assert_eq!(resolved.change, vec![("open", true)]);
        assert!(lookup(EVENT_MAP, 99).is_none());
    }
}
