//! Pin classification, net grouping and resolution on the full 100-pin chip.

mod common;

use interconnect_fixture::interconnect::{
    ChipModel, ConnectivityResolver, PadNormalization, PinKind,
};

#[test]
fn every_pin_has_exactly_one_kind() {
    let chip = common::chip();
    assert_eq!(chip.model.pins.len(), 100);

    let count = |kind| {
        chip.model
            .pins
            .iter()
            .filter(|pin| PinKind::of_pin(pin).0 == kind)
            .count()
    };
    assert_eq!(count(PinKind::C), 18);
    assert_eq!(count(PinKind::X), 18);
    assert_eq!(count(PinKind::Inner), 64);
}

#[test]
fn groups_follow_connectivity_keys() {
    let chip = common::chip();

    // 36 outer nets, 16 of the C nets own one inner pin, 48 inner-only nets.
    assert_eq!(chip.groups.len(), 84);
    assert_eq!(chip.groups["net_C1"].pins.len(), 2);
    assert_eq!(chip.groups["net_X1"].pins.len(), 1);
    assert_eq!(
        chip.groups["net_C1"].net.as_ref().map(|n| n.name.as_str()),
        Some("N_C1")
    );
    assert!(chip.groups["net_in_4_4"].net.is_none());
}

#[test]
fn catalogue_lists_every_outer_pin() {
    let chip = common::chip();
    assert_eq!(chip.catalogue.len(), 36);

    let c1 = chip.catalogue.get("C1").unwrap();
    assert_eq!(c1.kind, PinKind::C);
    assert_eq!(c1.outer_pin().pin_number, 1);
    assert_eq!(c1.pins.len(), 2);

    let x10 = chip.catalogue.get("X10").unwrap();
    assert_eq!(x10.kind, PinKind::X);

    assert!(chip.catalogue.get("C19").is_none());
    assert!(chip.catalogue.iter().all(|net| net.kind != PinKind::Inner));
}

#[test]
fn every_seeded_hint_resolves_stably() {
    let chip = common::chip();
    let resolver = ConnectivityResolver::seed(&chip.groups);

    for pin in &chip.model.pins {
        for hint in &pin.port_hints {
            let first = resolver.resolve(hint).unwrap().to_string();
            let second = resolver.resolve(hint).unwrap();
            assert_eq!(first, second);
            assert_eq!(first, pin.subcircuit_connectivity_map_key);
        }
    }
    assert_eq!(resolver.net_count(), 84);
}

#[test]
fn diagonal_partners_mirror_through_the_centre() {
    let chip = common::chip();
    let pairs = chip.diagonal_pairs(&[], 1.5);

    for k in 1..=9 {
        let a = format!("X{k}");
        let b = format!("X{}", k + 9);
        assert_eq!(pairs.partner(&a), Some(b.as_str()), "partner of {a}");
        assert_eq!(pairs.partner(&b), Some(a.as_str()), "partner of {b}");
    }
    assert_eq!(pairs.partner("C1"), None);
}

#[test]
fn legacy_pads_are_normalised_on_load() {
    let normalization = PadNormalization {
        legacy: 0.3,
        nominal: 0.5,
    };
    let model =
        ChipModel::from_value(&common::chip_records_with(true), Some(normalization)).unwrap();

    assert_eq!(model.pads.len(), 100);
    assert!(model
        .pads
        .iter()
        .all(|pad| pad.size() == (0.5, 0.5)));
}

#[test]
fn chip_loads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_chip(dir.path());

    let model = ChipModel::read(&path, None).unwrap();
    assert_eq!(model.pins.len(), 100);
    assert_eq!(model.nets.len(), 36);
    assert_eq!(model.pads.len(), 100);
    assert!(model.traces.is_empty());
}
