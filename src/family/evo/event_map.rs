// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// EVO live-event table

use crate::event::EventLevel::{Critical, Debug, Info, Warn};
use crate::family::event_map::{EventEntry, EventMap, EventOverride};
use crate::storage::ElementType::{BusModule, Door, Partition, System, User, Zone};

const NON_REPORTABLE: &[(u16, EventOverride)] = &[
    (0, EventOverride::message("TLM trouble").level(Warn).tags(&["trouble"])),
    (1, EventOverride::message("Smoke detector reset")),
    (2, EventOverride::message("Arm with no entry delay in @partition").tags(&["arm"])),
    (3, EventOverride::message("Arm in stay mode in @partition").tags(&["arm"])),
    (4, EventOverride::message("Arm in away mode in @partition").tags(&["arm"])),
    (5, EventOverride::message("Full arm when in stay mode in @partition").tags(&["arm"])),
    (6, EventOverride::message("Voice module access")),
    (7, EventOverride::message("Remote control access")),
    (8, EventOverride::message("PC fail to communicate").level(Warn).tags(&["trouble"])),
    (9, EventOverride::message("Midnight")),
    (10, EventOverride::message("NEware user login")),
    (11, EventOverride::message("NEware user logout")),
    (12, EventOverride::message("User initiated call-up")),
    (13, EventOverride::message("Force answer")),
    (14, EventOverride::message("Force hangup")),
];

const SPECIAL_ARMING: &[(u16, EventOverride)] = &[
    (0, EventOverride::message("Auto arming (on time/no movement) in @partition").tags(&["arm"])),
    (1, EventOverride::message("Late to close in @partition").tags(&["arm"])),
    (2, EventOverride::message("No movement arming in @partition").tags(&["arm"])),
    (3, EventOverride::message("Partial arming in @partition").tags(&["arm"])),
    (4, EventOverride::message("Quick arming in @partition").tags(&["arm"])),
    (5, EventOverride::message("Arming through WinLoad in @partition").tags(&["arm"])),
    (6, EventOverride::message("Arming with keyswitch in @partition").tags(&["arm"])),
];

const SPECIAL_DISARMING: &[(u16, EventOverride)] = &[
    (0, EventOverride::message("Cancel auto arm in @partition").tags(&["disarm"])),
    (1, EventOverride::message("Disarming through WinLoad in @partition").tags(&["disarm"])),
    (2, EventOverride::message("Disarming through WinLoad after alarm in @partition").tags(&["disarm"])),
    (3, EventOverride::message("Alarm cancelled through WinLoad in @partition").tags(&["disarm"])),
    (4, EventOverride::message("Paramedical alarm cancelled in @partition")),
    (5, EventOverride::message("Disarm with keyswitch in @partition").tags(&["disarm"])),
    (6, EventOverride::message("Disarm with keyswitch after an alarm in @partition").tags(&["disarm"])),
    (7, EventOverride::message("Alarm cancelled with keyswitch in @partition").tags(&["disarm"])),
];

const SPECIAL_ALARM: &[(u16, EventOverride)] = &[
    (0, EventOverride::message("Panic non-medical emergency in @partition").tags(&["panic"])),
    (1, EventOverride::message("Panic medical in @partition").tags(&["panic"])),
    (2, EventOverride::message("Panic fire in @partition").tags(&["panic", "fire"])),
    (3, EventOverride::message("Recent closing in @partition")),
    (4, EventOverride::message("Global shutdown in @partition")),
    (5, EventOverride::message("Duress alarm in @partition").tags(&["duress"])),
    (6, EventOverride::message("Keypad lockout in @partition").tags(&["lockout"])),
];

const SPECIAL_TAMPER: &[(u16, EventOverride)] = &[
    (0, EventOverride::message("Keypad lockout")),
    (1, EventOverride::message("Voice lockout")),
];

const TROUBLE: &[(u16, EventOverride)] = &[
    (0, EventOverride::message("TLM trouble")),
    (1, EventOverride::message("AC failure").tags(&["ac"])),
    (2, EventOverride::message("Battery failure").tags(&["battery"])),
    (3, EventOverride::message("Auxiliary current limit")),
    (4, EventOverride::message("Bell current limit")),
    (5, EventOverride::message("Bell absent")),
    (6, EventOverride::message("Clock trouble")),
    (7, EventOverride::message("Global fire loop")),
];

const TROUBLE_RESTORE: &[(u16, EventOverride)] = &[
    (0, EventOverride::message("TLM trouble restore")),
    (1, EventOverride::message("AC failure restore").tags(&["ac"])),
    (2, EventOverride::message("Battery failure restore").tags(&["battery"])),
    (3, EventOverride::message("Auxiliary current limit restore")),
    (4, EventOverride::message("Bell current limit restore")),
    (5, EventOverride::message("Bell absent restore")),
    (6, EventOverride::message("Clock trouble restore")),
    (7, EventOverride::message("Global fire loop restore")),
];

const MODULE_TROUBLE: &[(u16, EventOverride)] = &[
    (0, EventOverride::message("Combus fault").of_type(BusModule)),
    (1, EventOverride::message("Module tamper").tags(&["tamper"])),
    (2, EventOverride::message("ROM/RAM error")),
    (3, EventOverride::message("TLM trouble")),
    (4, EventOverride::message("Fail to communicate")),
    (5, EventOverride::message("Printer trouble")),
    (6, EventOverride::message("AC failure").tags(&["ac"])),
    (7, EventOverride::message("Battery failure").tags(&["battery"])),
    (8, EventOverride::message("Auxiliary failure")),
];

const MODULE_TROUBLE_RESTORE: &[(u16, EventOverride)] = &[
    (0, EventOverride::message("Combus fault restore").of_type(BusModule)),
    (1, EventOverride::message("Module tamper restore").tags(&["tamper"])),
    (2, EventOverride::message("ROM/RAM error restore")),
    (3, EventOverride::message("TLM trouble restore")),
    (4, EventOverride::message("Fail to communicate restore")),
    (5, EventOverride::message("Printer trouble restore")),
    (6, EventOverride::message("AC failure restore").tags(&["ac"])),
    (7, EventOverride::message("Battery failure restore").tags(&["battery"])),
    (8, EventOverride::message("Auxiliary failure restore")),
];

const SPECIAL: &[(u16, EventOverride)] = &[
    (0, EventOverride::message("Power up after total power down")),
    (1, EventOverride::message("Software reset (watchdog)")),
    (2, EventOverride::message("Test report")),
    (3, EventOverride::message("Future use")),
    (4, EventOverride::message("WinLoad in (connected)")),
    (5, EventOverride::message("WinLoad out (disconnected)")),
    (6, EventOverride::message("Installer in programming mode")),
    (7, EventOverride::message("Installer out of programming mode")),
];

const STATUS1: &[(u16, EventOverride)] = &[
    (0, EventOverride::message("@partition armed").tags(&["arm"])),
    (1, EventOverride::message("@partition force armed").tags(&["arm"])),
    (2, EventOverride::message("@partition stay armed").tags(&["arm"])),
    (3, EventOverride::message("@partition instant armed").tags(&["arm"])),
    (4, EventOverride::message("Strobe alarm in @partition").level(Critical).tags(&["alarm"])),
    (5, EventOverride::message("Silent alarm in @partition").level(Critical).tags(&["alarm"])),
    (6, EventOverride::message("Audible alarm in @partition").level(Critical).tags(&["alarm"])),
    (7, EventOverride::message("Fire alarm in @partition").level(Critical).tags(&["alarm", "fire"])),
];

const STATUS2: &[(u16, EventOverride)] = &[
    (0, EventOverride::message("@partition ready")),
    (1, EventOverride::message("Exit delay in @partition").tags(&["delay"])),
    (2, EventOverride::message("Entry delay in @partition").level(Warn).tags(&["delay"])),
    (3, EventOverride::message("System in trouble").level(Warn).tags(&["trouble"])),
    (4, EventOverride::message("Alarm in memory in @partition").tags(&["alarm"])),
    (5, EventOverride::message("Zones bypassed in @partition").tags(&["bypass"])),
    (6, EventOverride::message("Programming mode in @partition")),
    (7, EventOverride::message("Keypad lockout in @partition").level(Warn)),
];

const STATUS3: &[(u16, EventOverride)] = &[
    (0, EventOverride::message("Intellizone delay engaged in @partition")),
    (1, EventOverride::message("Fire delay engaged in @partition")),
    (2, EventOverride::message("Auto arm in @partition")),
    (3, EventOverride::message("Arming with voice module in @partition")),
    (4, EventOverride::message("Tamper in @partition").tags(&["tamper"])),
    (5, EventOverride::message("Zone low battery in @partition").tags(&["battery"])),
    (6, EventOverride::message("Fire loop trouble in @partition").tags(&["fire"])),
    (7, EventOverride::message("Zone supervision trouble in @partition").tags(&["trouble"])),
];

pub const EVENT_MAP: EventMap = &[
    (
        0,
        EventEntry::new(Zone, Debug, "Zone {label} OK")
            .tags(&["restore"])
            .change(&[("open", false)]),
    ),
    (1, EventEntry::new(Zone, Debug, "Zone {label} open").change(&[("open", true)])),
    (
        2,
        EventEntry::new(Zone, Warn, "Zone {label} tampered")
            .tags(&["tamper"])
            .change(&[("tamper", true)]),
    ),
    (3, EventEntry::new(Zone, Warn, "Zone {label} in fire loop trouble").tags(&["fire", "trouble"])),
    (4, EventEntry::new(System, Info, "Non-reportable event").sub(NON_REPORTABLE)),
    (5, EventEntry::new(User, Info, "User {label} code entered on keypad")),
    (6, EventEntry::new(User, Info, "User {label} access on door")),
    (7, EventEntry::new(User, Info, "Bypass programming access by {label}").tags(&["bypass"])),
    (8, EventEntry::new(Zone, Info, "TX delay zone {label} alarm")),
    (9, EventEntry::new(User, Info, "Arming @partition with master {label}").tags(&["arm"])),
    (10, EventEntry::new(User, Info, "Arming @partition with user {label}").tags(&["arm"])),
    (11, EventEntry::new(User, Info, "Arming @partition with keyswitch {label}").tags(&["arm"])),
    (12, EventEntry::new(Partition, Info, "Special arming").sub(SPECIAL_ARMING)),
    (13, EventEntry::new(User, Info, "Disarm @partition with master {label}").tags(&["disarm"])),
    (14, EventEntry::new(User, Info, "Disarm @partition with user {label}").tags(&["disarm"])),
    (15, EventEntry::new(User, Info, "Disarm @partition with keyswitch {label}").tags(&["disarm"])),
    (
        16,
        EventEntry::new(User, Info, "Disarm @partition after alarm with master {label}").tags(&["disarm"]),
    ),
    (
        17,
        EventEntry::new(User, Info, "Disarm @partition after alarm with user {label}").tags(&["disarm"]),
    ),
    (
        18,
        EventEntry::new(User, Info, "Disarm @partition after alarm with keyswitch {label}").tags(&["disarm"]),
    ),
    (19, EventEntry::new(User, Info, "Alarm cancelled in @partition with master {label}").tags(&["disarm"])),
    (20, EventEntry::new(User, Info, "Alarm cancelled in @partition with user {label}").tags(&["disarm"])),
    (21, EventEntry::new(User, Info, "Alarm cancelled in @partition with keyswitch {label}").tags(&["disarm"])),
    (22, EventEntry::new(Partition, Info, "Special disarming").sub(SPECIAL_DISARMING)),
    (23, EventEntry::new(Zone, Info, "Zone {label} bypassed").tags(&["bypass"])),
    (
        24,
        EventEntry::new(Zone, Critical, "Zone {label} in alarm")
            .tags(&["alarm"])
            .change(&[("presently_in_alarm", true)]),
    ),
    (
        25,
        EventEntry::new(Zone, Critical, "Fire alarm in zone {label}")
            .tags(&["alarm", "fire"])
            .change(&[("presently_in_alarm", true)]),
    ),
    (
        26,
        EventEntry::new(Zone, Info, "Zone {label} alarm restore")
            .tags(&["alarm", "restore"])
            .change(&[("presently_in_alarm", false)]),
    ),
    (
        27,
        EventEntry::new(Zone, Info, "Fire alarm restore in zone {label}")
            .tags(&["alarm", "fire", "restore"])
            .change(&[("presently_in_alarm", false)]),
    ),
    (28, EventEntry::new(User, Warn, "Early to disarm by user {label}")),
    (29, EventEntry::new(User, Warn, "Late to disarm by user {label}")),
    (30, EventEntry::new(Partition, Critical, "Special alarm").tags(&["alarm"]).sub(SPECIAL_ALARM)),
    (31, EventEntry::new(User, Critical, "Duress alarm by user {label}").tags(&["alarm", "duress"])),
    (32, EventEntry::new(Zone, Warn, "Zone {label} shutdown").change(&[("shutted_down", true)])),
    (
        33,
        EventEntry::new(Zone, Warn, "Zone {label} tampered")
            .tags(&["tamper"])
            .change(&[("tamper", true)]),
    ),
    (
        34,
        EventEntry::new(Zone, Info, "Zone {label} tamper restore")
            .tags(&["tamper", "restore"])
            .change(&[("tamper", false)]),
    ),
    (35, EventEntry::new(System, Warn, "Special tamper").tags(&["tamper"]).sub(SPECIAL_TAMPER)),
    (36, EventEntry::new(System, Warn, "Trouble").tags(&["trouble"]).sub(TROUBLE)),
    (
        37,
        EventEntry::new(System, Info, "Trouble restored").tags(&["trouble", "restore"]).sub(TROUBLE_RESTORE),
    ),
    (
        38,
        EventEntry::new(BusModule, Warn, "Module {label} trouble").tags(&["trouble"]).sub(MODULE_TROUBLE),
    ),
    (
        39,
        EventEntry::new(BusModule, Info, "Module {label} trouble restored")
            .tags(&["trouble", "restore"])
            .sub(MODULE_TROUBLE_RESTORE),
    ),
    (40, EventEntry::new(System, Warn, "Fail to communicate on telephone number {minor}").tags(&["trouble"])),
    (
        41,
        EventEntry::new(Zone, Warn, "Low battery on zone {label}")
            .tags(&["battery"])
            .change(&[("low_battery", true)]),
    ),
    (
        42,
        EventEntry::new(Zone, Warn, "Zone {label} supervision trouble")
            .tags(&["trouble"])
            .change(&[("supervision_trouble", true)]),
    ),
    (
        43,
        EventEntry::new(Zone, Info, "Low battery on zone {label} restored")
            .tags(&["battery", "restore"])
            .change(&[("low_battery", false)]),
    ),
    (
        44,
        EventEntry::new(Zone, Info, "Zone {label} supervision trouble restored")
            .tags(&["trouble", "restore"])
            .change(&[("supervision_trouble", false)]),
    ),
    (45, EventEntry::new(System, Info, "Special event").sub(SPECIAL)),
    (46, EventEntry::new(User, Warn, "Early to arm by user {label}")),
    (47, EventEntry::new(User, Warn, "Late to arm by user {label}")),
    (48, EventEntry::new(User, Info, "Utility key {minor} pressed")),
    (49, EventEntry::new(Door, Info, "Request for exit on door {label}")),
    (50, EventEntry::new(Door, Warn, "Access denied on door {label}").tags(&["access"])),
    (
        51,
        EventEntry::new(Door, Warn, "Door {label} left open alarm")
            .tags(&["alarm"])
            .change(&[("left_open", true)]),
    ),
    (
        52,
        EventEntry::new(Door, Critical, "Door {label} forced alarm")
            .tags(&["alarm"])
            .change(&[("forced_open", true)]),
    ),
    (
        53,
        EventEntry::new(Door, Info, "Door {label} left open restore")
            .tags(&["restore"])
            .change(&[("left_open", false)]),
    ),
    (
        54,
        EventEntry::new(Door, Info, "Door {label} forced open restore")
            .tags(&["restore"])
            .change(&[("forced_open", false)]),
    ),
    (55, EventEntry::new(Zone, Info, "Intellizone {label} triggered")),
    (56, EventEntry::new(Zone, Info, "Zone {label} excluded on force arming")),
    (57, EventEntry::new(Zone, Info, "Zone {label} went back to arm status")),
    (58, EventEntry::new(BusModule, Info, "New module {label} assigned on combus")),
    (59, EventEntry::new(BusModule, Info, "Module {label} manually removed from combus")),
    (62, EventEntry::new(User, Info, "Access granted to user {label}").tags(&["access"])),
    (63, EventEntry::new(User, Warn, "Access denied to user {label}").tags(&["access"])),
    (64, EventEntry::new(Partition, Info, "Status 1").sub(STATUS1)),
    (65, EventEntry::new(Partition, Info, "Status 2").sub(STATUS2)),
    (66, EventEntry::new(Partition, Info, "Status 3").sub(STATUS3)),
];
