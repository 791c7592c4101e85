#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, TimeDelta};
use vplan_adapter::services::{SnapshotStore, StoreSettings};
use vplan_adapter::upstream::StaticPlanSource;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// One `<Std>` entry. `changed` marks subject, teacher and room.
pub fn lesson(period: u32, nr: i64, subject: &str, teacher: &str, room: &str, changed: [bool; 3]) -> String {
    let marker = |set: bool, name: &str| {
        if set {
            format!(r#" {name}Ae="{name}Geaendert""#)
        } else {
            String::new()
        }
    };
    format!(
        "<Std><St>{period}</St><Fa{}>{subject}</Fa><Le{}>{teacher}</Le><Ra{}>{room}</Ra><Nr>{nr}</Nr><If></If></Std>",
        marker(changed[0], "Fa"),
        marker(changed[1], "Le"),
        marker(changed[2], "Ra"),
    )
}

pub fn regular(period: u32, nr: i64, subject: &str, teacher: &str, room: &str) -> String {
    lesson(period, nr, subject, teacher, room, [false; 3])
}

pub fn class(name: &str, lessons: &[String]) -> String {
    format!(
        r#"<Kl>
            <Kurz>{name}</Kurz>
            <KlStunden>
                <KlSt ZeitVon="07:30" ZeitBis="08:15">1</KlSt>
                <KlSt ZeitVon="08:25" ZeitBis="09:10">2</KlSt>
                <KlSt ZeitVon="09:30" ZeitBis="10:15">3</KlSt>
                <KlSt ZeitVon="10:25" ZeitBis="11:10">4</KlSt>
            </KlStunden>
            <Unterricht>
                <Ue><UeNr UeLe="XYZ" UeFa="MA">1</UeNr></Ue>
                <Ue><UeNr UeLe="ABC" UeFa="DE">2</UeNr></Ue>
                <Ue><UeNr UeLe="XYZ" UeFa="PH" UeGr="PH1">3</UeNr></Ue>
                <Ue><UeNr UeLe="QRS" UeFa="EN">4</UeNr></Ue>
            </Unterricht>
            <Pl>{}</Pl>
        </Kl>"#,
        lessons.concat()
    )
}

pub fn plan(timestamp: &str, classes: &[String]) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
        <VpMobil>
            <Kopf><Zeitstempel>{timestamp}</Zeitstempel></Kopf>
            <FreieTage><ft>240308</ft></FreieTage>
            <Klassen>{}</Klassen>
            <ZusatzInfo><ZiZeile>Elternabend 10a</ZiZeile></ZusatzInfo>
        </VpMobil>"#,
        classes.concat()
    )
}

/// Two classes; teacher XYZ teaches in both, room 101 is used twice.
pub fn base_plan(timestamp: &str) -> String {
    plan(
        timestamp,
        &[
            class(
                "10a",
                &[
                    regular(3, 1, "MA", "XYZ", "101"),
                    regular(1, 2, "DE", "ABC", "102"),
                    regular(2, 4, "EN", "QRS", "103"),
                ],
            ),
            class("10b", &[regular(1, 3, "PH", "XYZ", "101"), regular(2, 2, "DE", "ABC", "104")]),
        ],
    )
}

pub fn settings(freshness: TimeDelta, retention: TimeDelta) -> StoreSettings {
    StoreSettings {
        freshness,
        retention,
        negative_ttl: TimeDelta::zero(),
    }
}

pub fn store_with(source: Arc<StaticPlanSource>, settings: StoreSettings) -> SnapshotStore {
    SnapshotStore::new(source, settings)
}
