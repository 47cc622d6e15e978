use bitemporal_encoders::error::EncoderError;
use bitemporal_encoders::table::ASOF;
use bitemporal_encoders::{Cutoff, Pick, Scalar, Table, bitemporal_read};
use chrono::{NaiveDate, NaiveDateTime};

fn day(d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
}

fn key(d: u32) -> Scalar {
    Scalar::DateTime(day(d))
}

// Key 1 was revised twice, key 2 once, key 3 never.
fn history() -> Table {
    let asof = [1, 2, 3, 2, 3, 3];
    Table::from_columns(
        vec![key(1), key(1), key(1), key(2), key(2), key(3)],
        vec![
            ("a".to_string(), (1..=6).map(Scalar::Int).collect()),
            (ASOF.to_string(), asof.iter().map(|&d| key(d)).collect()),
        ],
    )
    .expect("valid table")
}

fn column(table: &Table, label: &str) -> Vec<Scalar> {
    table.column(label).expect("column exists").into_iter().cloned().collect()
}

#[test]
fn latest_versions_without_cutoff() {
    let read = bitemporal_read(&history(), None, Pick::Last).expect("reads");
    assert_eq!(read.index(), [key(1), key(2), key(3)]);
    assert_eq!(column(&read, "a"), [Scalar::Int(3), Scalar::Int(5), Scalar::Int(6)]);
    assert!(!read.is_bitemporal());
}

#[test]
fn cutoff_hides_later_versions() {
    let read = bitemporal_read(&history(), Some(Cutoff::At(day(2))), Pick::Last).expect("reads");
    assert_eq!(read.index(), [key(1), key(2)]);
    assert_eq!(column(&read, "a"), [Scalar::Int(2), Scalar::Int(4)]);

    let read = bitemporal_read(&history(), Some(Cutoff::At(day(1))), Pick::Last).expect("reads");
    assert_eq!(read.index(), [key(1)]);
    assert_eq!(column(&read, "a"), [Scalar::Int(1)]);
}

#[test]
fn later_cutoffs_never_know_less() {
    // versions of a key carry increasing values, so a later winner reads higher
    let mut known: Vec<(Scalar, Scalar)> = Vec::new();
    for d in 1..=4 {
        let read = bitemporal_read(&history(), Some(Cutoff::At(day(d))), Pick::Last).expect("reads");
        let now: Vec<(Scalar, Scalar)> = read.index().iter().cloned().zip(column(&read, "a")).collect();
        for (k, before) in &known {
            let (_, after) = now.iter().find(|(key, _)| key == k).expect("key stays known");
            assert!(after >= before, "{k} went from {before} back to {after}");
        }
        known = now;
    }
    assert_eq!(known.len(), 3);
    assert_eq!(known, [(key(1), Scalar::Int(3)), (key(2), Scalar::Int(5)), (key(3), Scalar::Int(6))]);
}

#[test]
fn first_and_reduced_picks() {
    let read = bitemporal_read(&history(), None, Pick::First).expect("reads");
    assert_eq!(column(&read, "a"), [Scalar::Int(1), Scalar::Int(4), Scalar::Int(6)]);

    let sum = |rows: &[&[Scalar]]| -> Vec<Scalar> {
        let total = rows
            .iter()
            .map(|row| match row[0] {
                Scalar::Int(i) => i,
                _ => 0,
            })
            .sum();
        vec![Scalar::Int(total)]
    };
    let read = bitemporal_read(&history(), None, Pick::Reduce(&sum)).expect("reads");
    assert_eq!(column(&read, "a"), [Scalar::Int(6), Scalar::Int(9), Scalar::Int(6)]);
}

#[test]
fn reductions_must_keep_the_width() {
    let too_wide = |_: &[&[Scalar]]| vec![Scalar::Null, Scalar::Null];
    let result = bitemporal_read(&history(), None, Pick::Reduce(&too_wide));
    assert!(matches!(result, Err(EncoderError::Shape(_))));
}

#[test]
fn ties_keep_row_order() {
    let table = Table::from_columns(
        vec![key(1), key(1), key(1)],
        vec![
            ("a".to_string(), vec![Scalar::Int(10), Scalar::Int(20), Scalar::Int(5)]),
            (ASOF.to_string(), vec![key(2), key(2), key(1)]),
        ],
    )
    .expect("valid table");
    let read = bitemporal_read(&table, None, Pick::Last).expect("reads");
    assert_eq!(column(&read, "a"), [Scalar::Int(20)]);
    let read = bitemporal_read(&table, None, Pick::First).expect("reads");
    assert_eq!(column(&read, "a"), [Scalar::Int(5)]);
    // same input, same output
    assert_eq!(
        bitemporal_read(&table, Some(Cutoff::At(day(2))), Pick::Last).expect("reads"),
        bitemporal_read(&table, Some(Cutoff::At(day(2))), Pick::Last).expect("reads"),
    );
}

#[test]
fn index_name_is_kept() {
    let named = history().with_index_name("date");
    let read = bitemporal_read(&named, None, Pick::Last).expect("reads");
    assert_eq!(read.index_name(), Some("date"));
    let read = bitemporal_read(&history(), None, Pick::Last).expect("reads");
    assert_eq!(read.index_name(), None);
}

#[test]
fn plain_tables_come_back_unchanged() {
    let plain = history().drop_column(ASOF);
    let read = bitemporal_read(&plain, Some(Cutoff::At(day(1))), Pick::Last).expect("reads");
    assert_eq!(read, plain);
}

#[test]
fn per_index_cutoffs() {
    let cutoffs = Table::from_columns(
        vec![key(1), key(2), key(2)],
        vec![(ASOF.to_string(), vec![key(1), key(1), key(3)])],
    )
    .expect("valid table");
    let read = bitemporal_read(&history(), Some(Cutoff::PerIndex(&cutoffs)), Pick::Last).expect("reads");
    // key 1 as of day 1, key 2 as of its latest cutoff (day 3), key 3 absent
    assert_eq!(read.index(), [key(1), key(2)]);
    assert_eq!(column(&read, "a"), [Scalar::Int(1), Scalar::Int(5)]);
}

#[test]
fn per_index_cutoffs_need_an_asof_column() {
    let plain = history().drop_column(ASOF);
    let result = bitemporal_read(&history(), Some(Cutoff::PerIndex(&plain)), Pick::Last);
    assert!(matches!(result, Err(EncoderError::NotBitemporal(_))));
}
