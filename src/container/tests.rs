use std::borrow::Cow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::container::{
    Accumulator, AccumulatorOps, CompareFlags, RowComparator, RowContainer, RowContainerIterator,
    RowContainerParams, RowPtr, SortOrder,
};
use crate::types::{Column, ColumnType, CustomComparator, TypeKind, Value};

fn types_of(kinds: &[TypeKind]) -> Vec<ColumnType> {
    kinds.iter().map(|&k| ColumnType::new(k)).collect()
}

fn plain_container(keys: &[TypeKind], nullable: bool, dependents: &[TypeKind]) -> RowContainer {
    RowContainer::new(RowContainerParams {
        key_types: types_of(keys),
        nullable_keys: nullable,
        accumulators: Vec::new(),
        dependent_types: types_of(dependents),
        has_next: false,
        is_join_build: false,
        has_probed_flag: false,
        has_normalized_keys: false,
    })
    .unwrap()
}

fn store_row(container: &mut RowContainer, values: &[Value<'static>]) -> RowPtr {
    let row = container.new_row().unwrap();
    for (column, value) in values.iter().enumerate() {
        let decoded = Column::with_values(
            container.column_type(column).clone(),
            vec![value.clone()],
        );
        // SAFETY: row was just allocated from this container.
        unsafe { container.store(column, &decoded, 0, row).unwrap() };
    }
    row
}

fn extract(container: &RowContainer, rows: &[RowPtr], column: usize) -> Vec<Value<'static>> {
    let mut out = Column::new(container.column_type(column).clone());
    // SAFETY: callers pass live rows of `container`.
    unsafe { container.extract_column(rows, column, &mut out).unwrap() };
    out.values()
        .iter()
        .cloned()
        .map(Value::into_static)
        .collect()
}

struct CountingOps {
    destroyed: AtomicUsize,
}

impl AccumulatorOps for CountingOps {
    fn destroy(&self, rows: &[RowPtr]) {
        self.destroyed.fetch_add(rows.len(), Ordering::Relaxed);
    }

    fn extract_for_spill(&self, _rows: &[RowPtr], _out: &mut Column<'_>) {}
}

fn counting_accumulator(uses_external_memory: bool) -> (Accumulator, Arc<CountingOps>) {
    let ops = Arc::new(CountingOps {
        destroyed: AtomicUsize::new(0),
    });
    let accumulator = Accumulator::new(
        true,
        16,
        uses_external_memory,
        8,
        ColumnType::new(TypeKind::BigInt),
        ops.clone(),
    );
    (accumulator, ops)
}

#[test]
fn rows_are_aligned_to_layout_alignment() {
    let (accumulator, _) = counting_accumulator(false);
    let mut container = RowContainer::new(RowContainerParams {
        key_types: types_of(&[TypeKind::Boolean, TypeKind::BigInt]),
        nullable_keys: true,
        accumulators: vec![accumulator],
        dependent_types: Vec::new(),
        has_next: false,
        is_join_build: false,
        has_probed_flag: false,
        has_normalized_keys: false,
    })
    .unwrap();

    let alignment = container.layout().alignment();
    let accumulator_offset = container.accumulator_offset(0);
    for _ in 0..100 {
        let row = container.new_row().unwrap();
        assert_eq!(row as usize % alignment, 0);
        assert_eq!((row as usize + accumulator_offset) % 8, 0);
    }
}

#[test]
fn free_list_recycles_rows() {
    let mut container = plain_container(&[TypeKind::BigInt], false, &[]);
    let rows: Vec<RowPtr> = (0..10)
        .map(|i| store_row(&mut container, &[Value::BigInt(i)]))
        .collect();
    assert_eq!(container.num_rows(), 10);
    assert_eq!(container.num_free_rows(), 0);

    // SAFETY: rows are live rows of `container`.
    unsafe { container.erase_rows(&[rows[3], rows[7]]).unwrap() };
    assert_eq!(container.num_rows(), 8);
    assert_eq!(container.num_free_rows(), 2);

    // Free list pops most-recently freed first.
    let reused_a = container.new_row().unwrap();
    let reused_b = container.new_row().unwrap();
    assert_eq!(reused_a, rows[7]);
    assert_eq!(reused_b, rows[3]);
    assert_eq!(container.num_free_rows(), 0);
    assert_eq!(container.num_rows(), 10);
}

#[test]
fn double_free_is_an_error() {
    let mut container = plain_container(&[TypeKind::BigInt], false, &[]);
    let row = store_row(&mut container, &[Value::BigInt(1)]);
    // SAFETY: row is a live row of `container`.
    unsafe {
        container.erase_rows(&[row]).unwrap();
        let err = container.erase_rows(&[row]).unwrap_err();
        assert!(err.to_string().contains("double free"));
    }
}

#[test]
fn frozen_container_rejects_new_rows() {
    let mut container = plain_container(&[TypeKind::BigInt], false, &[]);
    store_row(&mut container, &[Value::BigInt(1)]);
    let _partitions = container.create_row_partitions().unwrap();
    let err = container.new_row().unwrap_err();
    assert!(err.to_string().contains("frozen"));
    assert!(container.create_row_partitions().is_err());
}

#[test]
fn nullable_keys_store_nulls_and_stats_track_bytes() {
    // Keys [BIGINT, VARCHAR], nullable; three rows including an empty and
    // an out-of-line string.
    let mut container = plain_container(&[TypeKind::BigInt, TypeKind::Varchar], true, &[]);
    let long = "x".repeat(257);
    let rows = [
        store_row(
            &mut container,
            &[Value::BigInt(1), Value::Varchar(Cow::Owned("abc".into()))],
        ),
        store_row(
            &mut container,
            &[Value::Null, Value::Varchar(Cow::Owned(String::new()))],
        ),
        store_row(
            &mut container,
            &[Value::BigInt(2), Value::Varchar(Cow::Owned(long.clone()))],
        ),
    ];
    assert_eq!(container.num_rows(), 3);

    let ints = extract(&container, &rows, 0);
    assert_eq!(
        ints,
        vec![Value::BigInt(1), Value::Null, Value::BigInt(2)]
    );
    let strings = extract(&container, &rows, 1);
    assert_eq!(
        strings,
        vec![
            Value::Varchar(Cow::Owned("abc".into())),
            Value::Varchar(Cow::Owned(String::new())),
            Value::Varchar(Cow::Owned(long)),
        ]
    );

    // 257 bytes cannot inline; the row must carry a charged size.
    // SAFETY: rows[2] is a live row of `container`.
    let charged = unsafe { container.stored_row_size(rows[2]).unwrap() };
    assert!(charged >= 257);

    let int_stats = container.column_stats(0).unwrap();
    assert_eq!(int_stats.null_count(), 1);
    assert_eq!(int_stats.non_null_count(), 2);

    let string_stats = container.column_stats(1).unwrap();
    assert_eq!(string_stats.sum_bytes(), 3 + 0 + 257);
    assert_eq!(string_stats.null_count(), 0);
    assert_eq!(string_stats.min_bytes(), Some(0));
    assert_eq!(string_stats.max_bytes(), Some(257));
}

#[test]
fn float_hashing_is_nan_insensitive_and_zero_sign_blind() {
    let mut container = plain_container(&[TypeKind::Double], false, &[]);
    let rows = [
        store_row(&mut container, &[Value::Double(0.0)]),
        store_row(&mut container, &[Value::Double(-0.0)]),
        store_row(
            &mut container,
            &[Value::Double(f64::from_bits(0x7ff8_0000_0000_0001))],
        ),
        store_row(
            &mut container,
            &[Value::Double(f64::from_bits(0x7ff8_0000_0000_0002))],
        ),
    ];

    let mut hashes = [0u64; 4];
    // SAFETY: rows are live rows of `container`.
    unsafe { container.hash(0, &rows, false, &mut hashes) };
    assert_eq!(hashes[0], hashes[1], "+0.0 and -0.0 must hash equal");
    assert_eq!(hashes[2], hashes[3], "distinct NaN payloads must hash equal");
    assert_ne!(hashes[0], hashes[2]);

    // SAFETY: as above.
    unsafe {
        assert_eq!(
            container
                .compare_rows(rows[0], rows[1], 0, CompareFlags::default())
                .unwrap(),
            0
        );
        assert_eq!(
            container
                .compare_rows(rows[2], rows[3], 0, CompareFlags::default())
                .unwrap(),
            0
        );
        // NaN sorts above every non-NaN value.
        assert!(container
            .compare_rows(rows[0], rows[2], 0, CompareFlags::default())
            .unwrap() < 0);
    }
}

#[test]
fn join_build_chains_duplicates_and_tracks_probes() {
    let mut container = RowContainer::new(RowContainerParams {
        key_types: types_of(&[TypeKind::Integer]),
        nullable_keys: false,
        accumulators: Vec::new(),
        dependent_types: Vec::new(),
        has_next: true,
        is_join_build: true,
        has_probed_flag: true,
        has_normalized_keys: false,
    })
    .unwrap();

    let first_one = store_row(&mut container, &[Value::Integer(1)]);
    let second_one = store_row(&mut container, &[Value::Integer(1)]);
    let two = store_row(&mut container, &[Value::Integer(2)]);

    // SAFETY: all pointers are live rows of `container`.
    unsafe {
        container.set_next_row(first_one, second_one);
        assert_eq!(container.next_row(first_one), second_one);
        assert!(container.next_row(second_one).is_null());

        container.set_probed_flag(&[first_one]).unwrap();

        let mut flags = Column::new(ColumnType::new(TypeKind::Boolean));
        container
            .extract_probed_flags(&[first_one, second_one, two], false, true, &mut flags)
            .unwrap();
        assert_eq!(flags.value(0), &Value::Boolean(true));
        assert_eq!(flags.value(1), &Value::Null);
        assert_eq!(flags.value(2), &Value::Null);

        container
            .extract_probed_flags(&[first_one, second_one, two], false, false, &mut flags)
            .unwrap();
        assert_eq!(flags.value(1), &Value::Boolean(false));
    }
}

#[test]
fn erase_then_insert_reuses_string_memory() {
    let mut container = plain_container(&[TypeKind::Varchar], false, &[]);
    let rows: Vec<RowPtr> = (0..10)
        .map(|_| store_row(&mut container, &[Value::Varchar(Cow::Owned("a".repeat(1024)))]))
        .collect();
    let retained_before = container.string_arena().retained_bytes();

    // SAFETY: rows are live rows of `container`.
    unsafe { container.erase_rows(&[rows[3], rows[7]]).unwrap() };
    assert_eq!(container.num_free_rows(), 2);

    for _ in 0..2 {
        store_row(&mut container, &[Value::Varchar(Cow::Owned("b".repeat(1024)))]);
    }
    assert_eq!(container.num_free_rows(), 0, "both rows came off the free list");
    assert_eq!(
        container.string_arena().retained_bytes(),
        retained_before,
        "freed string fragments were reused, not newly allocated"
    );
}

#[test]
fn all_kinds_roundtrip_through_rows() {
    let kinds = [
        TypeKind::Boolean,
        TypeKind::TinyInt,
        TypeKind::SmallInt,
        TypeKind::Integer,
        TypeKind::BigInt,
        TypeKind::Real,
        TypeKind::Double,
        TypeKind::Date,
        TypeKind::Timestamp,
        TypeKind::Decimal,
        TypeKind::Varchar,
        TypeKind::Varbinary,
        TypeKind::Array,
        TypeKind::Map,
        TypeKind::Row,
    ];
    let values: Vec<Value<'static>> = vec![
        Value::Boolean(true),
        Value::TinyInt(-5),
        Value::SmallInt(-300),
        Value::Integer(123_456),
        Value::BigInt(-9_876_543_210),
        Value::Real(2.5),
        Value::Double(-0.125),
        Value::Date(19_000),
        Value::Timestamp(1_700_000_000_000_000),
        Value::Decimal(-(1_i128 << 100)),
        Value::Varchar(Cow::Owned("a string long enough to go out of line".into())),
        Value::Varbinary(Cow::Owned(vec![0xDE, 0xAD, 0xBE, 0xEF])),
        Value::Array(vec![Value::Integer(1), Value::Null, Value::Integer(3)]),
        Value::Map(vec![(
            Value::Varchar(Cow::Owned("k".into())),
            Value::BigInt(1),
        )]),
        Value::Struct(vec![Value::Boolean(false), Value::Double(7.0)]),
    ];

    let mut container = plain_container(&kinds, true, &[]);
    let row = store_row(&mut container, &values);
    for (column, expected) in values.iter().enumerate() {
        let extracted = extract(&container, &[row], column);
        assert_eq!(&extracted[0], expected, "column {column}");
    }
}

#[test]
fn serialized_rows_roundtrip_within_a_container() {
    let mut container = plain_container(
        &[TypeKind::Integer, TypeKind::Varchar],
        true,
        &[TypeKind::Array],
    );
    let original_values: Vec<Vec<Value<'static>>> = vec![
        vec![
            Value::Integer(7),
            Value::Varchar(Cow::Owned("tiny".into())),
            Value::Array(vec![Value::Integer(1), Value::Integer(2)]),
        ],
        vec![Value::Null, Value::Null, Value::Null],
        vec![
            Value::Integer(-1),
            Value::Varchar(Cow::Owned("y".repeat(500))),
            Value::Null,
        ],
    ];
    let rows: Vec<RowPtr> = original_values
        .iter()
        .map(|values| store_row(&mut container, values))
        .collect();

    let mut serialized = Vec::new();
    // SAFETY: rows are live rows of `container`.
    unsafe { container.extract_serialized_rows(&rows, &mut serialized) };
    assert_eq!(serialized.len(), 3);

    let restored: Vec<RowPtr> = serialized
        .iter()
        .map(|data| {
            let row = container.new_row().unwrap();
            // SAFETY: row was just allocated from this container.
            unsafe { container.store_serialized_row(data, row).unwrap() };
            row
        })
        .collect();

    for column in 0..container.column_count() {
        let before = extract(&container, &rows, column);
        let after = extract(&container, &restored, column);
        assert_eq!(before, after, "column {column}");
    }
}

#[test]
fn find_rows_accepts_only_interior_addresses() {
    let mut container = plain_container(&[TypeKind::BigInt], false, &[]);
    let rows: Vec<RowPtr> = (0..50)
        .map(|i| store_row(&mut container, &[Value::BigInt(i)]))
        .collect();

    let mut out = Vec::new();
    let found = container.find_rows(&rows, &mut out);
    assert_eq!(found, 50);

    out.clear();
    let range = container.rows_arena().range_at(0);
    // Address math only; these pointers are never read.
    let top = (range.start as usize + range.len) as RowPtr;
    let below = (range.start as usize - 8) as RowPtr;
    let outside = [top, below, std::ptr::null_mut()];
    assert_eq!(container.find_rows(&outside, &mut out), 0, "top is exclusive");
}

#[test]
fn set_all_null_clears_values_and_updates_stats() {
    let mut container = plain_container(&[TypeKind::BigInt, TypeKind::Varchar], true, &[]);
    let row = store_row(
        &mut container,
        &[
            Value::BigInt(1),
            Value::Varchar(Cow::Owned("not inline at all, no sir".into())),
        ],
    );
    // SAFETY: row is a live row of `container`.
    unsafe { container.set_all_null(row) };

    assert_eq!(extract(&container, &[row], 0), vec![Value::Null]);
    assert_eq!(extract(&container, &[row], 1), vec![Value::Null]);
    let stats = container.column_stats(1).unwrap();
    assert_eq!(stats.non_null_count(), 0);
    assert_eq!(stats.null_count(), 1);
    assert_eq!(stats.sum_bytes(), 0);
}

#[test]
fn failed_store_leaves_a_null_cell_and_an_erasable_row() {
    let mut container = plain_container(&[TypeKind::BigInt, TypeKind::Varchar], true, &[]);
    let row = container.new_row().unwrap();
    let keys = Column::with_values(ColumnType::new(TypeKind::BigInt), vec![Value::BigInt(1)]);
    // SAFETY: row was just allocated from this container.
    unsafe { container.store(0, &keys, 0, row).unwrap() };

    // A decoded batch whose value does not match the column kind.
    let wrong = Column::with_values(ColumnType::new(TypeKind::Varchar), vec![Value::BigInt(2)]);
    // SAFETY: as above.
    let err = unsafe { container.store(1, &wrong, 0, row).unwrap_err() };
    assert!(err.to_string().contains("type mismatch"));

    // The failed column reads as null and was counted in stats.
    assert_eq!(extract(&container, &[row], 1), vec![Value::Null]);
    let stats = container.column_stats(1).unwrap();
    assert_eq!(stats.num_cells(), 1);
    assert_eq!(stats.null_count(), 1);
    assert_eq!(stats.sum_bytes(), 0);

    // The row erases normally despite the partial store.
    // SAFETY: row is a live row of `container`.
    unsafe { container.erase_rows(&[row]).unwrap() };
    assert_eq!(container.num_rows(), 0);
    assert_eq!(container.num_free_rows(), 1);
}

/// Toy aggregate that keeps an i64 running state in its payload slot and
/// spills it as a BIGINT column. The payload offset is only known after
/// layout planning, so it is filled in after container construction.
struct SumOps {
    offset: AtomicUsize,
}

impl AccumulatorOps for SumOps {
    fn destroy(&self, _rows: &[RowPtr]) {}

    fn extract_for_spill(&self, rows: &[RowPtr], out: &mut Column<'_>) {
        let offset = self.offset.load(Ordering::Relaxed);
        out.clear();
        for &row in rows {
            // SAFETY: rows are live rows of the owning container and the
            // payload slot holds an initialized i64.
            let sum = unsafe { (row.add(offset) as *const i64).read_unaligned() };
            out.push(Value::BigInt(sum));
        }
    }
}

#[test]
fn accumulator_state_extracts_for_spill() {
    let ops = Arc::new(SumOps {
        offset: AtomicUsize::new(0),
    });
    let accumulator = Accumulator::new(
        true,
        8,
        false,
        8,
        ColumnType::new(TypeKind::BigInt),
        ops.clone(),
    );
    let mut container = RowContainer::new(RowContainerParams {
        key_types: types_of(&[TypeKind::BigInt]),
        nullable_keys: false,
        accumulators: vec![accumulator],
        dependent_types: Vec::new(),
        has_next: false,
        is_join_build: false,
        has_probed_flag: false,
        has_normalized_keys: false,
    })
    .unwrap();
    let offset = container.accumulator_offset(0);
    ops.offset.store(offset, Ordering::Relaxed);

    let rows: Vec<RowPtr> = (0..4)
        .map(|i| store_row(&mut container, &[Value::BigInt(i)]))
        .collect();
    for (i, &row) in rows.iter().enumerate() {
        // SAFETY: rows are live; the payload slot is 8-aligned i64 space.
        unsafe { (row.add(offset) as *mut i64).write_unaligned(i as i64 * 2) };
    }

    let mut out = Column::new(ColumnType::new(TypeKind::BigInt));
    container.accumulators()[0].extract_for_spill(&rows, &mut out);
    assert_eq!(
        out.values(),
        &[
            Value::BigInt(0),
            Value::BigInt(2),
            Value::BigInt(4),
            Value::BigInt(6)
        ]
    );
}

#[test]
fn accumulators_are_destroyed_on_erase_and_clear() {
    let (accumulator, ops) = counting_accumulator(true);
    let mut container = RowContainer::new(RowContainerParams {
        key_types: types_of(&[TypeKind::BigInt]),
        nullable_keys: false,
        accumulators: vec![accumulator],
        dependent_types: Vec::new(),
        has_next: false,
        is_join_build: false,
        has_probed_flag: false,
        has_normalized_keys: false,
    })
    .unwrap();

    let rows: Vec<RowPtr> = (0..5)
        .map(|i| store_row(&mut container, &[Value::BigInt(i)]))
        .collect();
    // SAFETY: rows are live rows of `container`.
    unsafe { container.erase_rows(&rows[..2]).unwrap() };
    assert_eq!(ops.destroyed.load(Ordering::Relaxed), 2);

    container.clear();
    assert_eq!(ops.destroyed.load(Ordering::Relaxed), 5);
    assert!(container.column_stats(0).is_none(), "stats unknown after clear");
    assert_eq!(container.num_rows(), 0);
    assert_eq!(container.num_free_rows(), 0);
}

#[test]
fn list_rows_skips_erased_rows_and_batches() {
    let mut container = plain_container(&[TypeKind::BigInt], false, &[]);
    let rows: Vec<RowPtr> = (0..100)
        .map(|i| store_row(&mut container, &[Value::BigInt(i)]))
        .collect();
    let erased: Vec<RowPtr> = rows.iter().copied().step_by(3).collect();
    // SAFETY: rows are live rows of `container`.
    unsafe { container.erase_rows(&erased).unwrap() };

    let mut iter = RowContainerIterator::new();
    let mut listed = Vec::new();
    loop {
        let mut batch = Vec::new();
        if container.list_rows(&mut iter, 7, &mut batch) == 0 {
            break;
        }
        listed.extend(batch);
    }
    let expected: Vec<RowPtr> = rows
        .iter()
        .enumerate()
        .filter(|(i, _)| i % 3 != 0)
        .map(|(_, &row)| row)
        .collect();
    assert_eq!(listed, expected);
}

#[test]
fn row_comparator_orders_by_key_list() {
    let mut container = plain_container(&[TypeKind::Integer, TypeKind::Varchar], true, &[]);
    let rows = [
        store_row(
            &mut container,
            &[Value::Integer(2), Value::Varchar(Cow::Owned("b".into()))],
        ),
        store_row(
            &mut container,
            &[Value::Integer(2), Value::Varchar(Cow::Owned("a".into()))],
        ),
        store_row(&mut container, &[Value::Null, Value::Null]),
    ];

    let comparator = RowComparator::new(
        &container,
        [
            (0, SortOrder::ASC_NULLS_FIRST),
            (1, SortOrder::ASC_NULLS_FIRST),
        ],
    );
    // SAFETY: rows are live rows of `container`.
    unsafe {
        assert!(comparator.compare(rows[1], rows[0]) < 0);
        assert!(comparator.compare(rows[0], rows[1]) > 0);
        assert_eq!(comparator.compare(rows[0], rows[0]), 0);
        // Null key sorts first.
        assert!(comparator.less(rows[2], rows[1]));
    }

    // The null placement flag is relative to the ascending orientation
    // and flips with direction: nulls-first under descending sorts
    // values before nulls.
    let descending = RowComparator::new(&container, [(0, SortOrder::DESC_NULLS_FIRST)]);
    // SAFETY: as above.
    unsafe {
        assert!(descending.less(rows[0], rows[2]));
        assert!(!descending.less(rows[2], rows[0]));
    }
}

#[test]
fn multi_column_hash_uses_the_mix_function() {
    use crate::container::hash_mix;

    let mut container = plain_container(&[TypeKind::Integer, TypeKind::Varchar], false, &[]);
    let row = store_row(
        &mut container,
        &[Value::Integer(3), Value::Varchar(Cow::Owned("abc".into()))],
    );

    let mut first = [0u64; 1];
    let mut combined = [0u64; 1];
    // SAFETY: row is a live row of `container`.
    unsafe {
        container.hash(0, &[row], false, &mut first);
        combined[0] = first[0];
        container.hash(1, &[row], true, &mut combined);

        let mut second = [0u64; 1];
        container.hash(1, &[row], false, &mut second);
        assert_eq!(combined[0], hash_mix(first[0], second[0]));
    }
}

#[test]
fn custom_comparator_overrides_hash_and_order() {
    // Compare i64 payloads by absolute value.
    fn abs_of(payload: &[u8]) -> i64 {
        i64::from_ne_bytes(payload[..8].try_into().unwrap()).abs()
    }
    fn hash(payload: &[u8]) -> u64 {
        abs_of(payload) as u64
    }
    fn compare(left: &[u8], right: &[u8]) -> std::cmp::Ordering {
        abs_of(left).cmp(&abs_of(right))
    }

    let ty = ColumnType::with_custom_comparator(
        TypeKind::BigInt,
        CustomComparator { hash, compare },
    );
    let mut container = RowContainer::new(RowContainerParams {
        key_types: vec![ty],
        nullable_keys: false,
        accumulators: Vec::new(),
        dependent_types: Vec::new(),
        has_next: false,
        is_join_build: false,
        has_probed_flag: false,
        has_normalized_keys: false,
    })
    .unwrap();

    let positive = store_row(&mut container, &[Value::BigInt(42)]);
    let negative = store_row(&mut container, &[Value::BigInt(-42)]);

    let mut hashes = [0u64; 2];
    // SAFETY: rows are live rows of `container`.
    unsafe {
        container.hash(0, &[positive, negative], false, &mut hashes);
        assert_eq!(hashes[0], hashes[1]);
        assert_eq!(hashes[0], 42);
        assert_eq!(
            container
                .compare_rows(positive, negative, 0, CompareFlags::default())
                .unwrap(),
            0
        );
    }
}

#[test]
fn unknown_columns_are_always_null() {
    let mut container = plain_container(&[TypeKind::BigInt], false, &[TypeKind::Unknown]);
    let row = container.new_row().unwrap();
    let keys = Column::with_values(ColumnType::new(TypeKind::BigInt), vec![Value::BigInt(1)]);
    let unknowns = Column::with_values(ColumnType::new(TypeKind::Unknown), vec![Value::Null]);
    // SAFETY: row was just allocated from this container.
    unsafe {
        container.store(0, &keys, 0, row).unwrap();
        container.store(1, &unknowns, 0, row).unwrap();
    }

    assert_eq!(extract(&container, &[row], 1), vec![Value::Null]);
    let mut hashes = [0u64; 1];
    // SAFETY: as above.
    unsafe { container.hash(1, &[row], false, &mut hashes) };
    assert_eq!(hashes[0], crate::container::NULL_HASH);
}

#[test]
fn size_accounting_follows_growth() {
    let mut container = plain_container(&[TypeKind::Varchar], false, &[]);
    assert_eq!(container.estimate_row_size(), None);

    for _ in 0..100 {
        store_row(
            &mut container,
            &[Value::Varchar(Cow::Owned("z".repeat(100)))],
        );
    }
    let estimate = container.estimate_row_size().unwrap();
    assert!(estimate >= container.layout().fixed_row_size());

    let increment = container.size_increment(1000, 1 << 20);
    assert_eq!(increment % crate::config::HUGE_PAGE_SIZE, 0);
    assert!(increment >= 1000 * container.layout().fixed_row_size());
}

#[test]
fn normalized_key_prefix_shrinks_after_disable() {
    let mut container = RowContainer::new(RowContainerParams {
        key_types: types_of(&[TypeKind::BigInt]),
        nullable_keys: false,
        accumulators: Vec::new(),
        dependent_types: Vec::new(),
        has_next: false,
        is_join_build: false,
        has_probed_flag: false,
        has_normalized_keys: true,
    })
    .unwrap();
    assert!(container.layout().original_normalized_key_size() >= 8);

    let mut inserted = Vec::new();
    for i in 0..5 {
        inserted.push(store_row(&mut container, &[Value::BigInt(i)]));
    }
    container.disable_normalized_keys();
    for i in 5..10 {
        inserted.push(store_row(&mut container, &[Value::BigInt(i)]));
    }
    assert_eq!(container.num_rows_with_normalized_key(), 5);

    // Iteration must hop the stride change and visit every row once.
    let mut iter = RowContainerIterator::new();
    let mut listed = Vec::new();
    container.list_rows(&mut iter, usize::MAX, &mut listed);
    assert_eq!(listed, inserted);
    assert_eq!(
        extract(&container, &listed, 0),
        (0..10).map(Value::BigInt).collect::<Vec<_>>()
    );
}

#[test]
fn display_names_the_schema() {
    let (accumulator, _) = counting_accumulator(false);
    let mut container = RowContainer::new(RowContainerParams {
        key_types: types_of(&[TypeKind::BigInt, TypeKind::Varchar]),
        nullable_keys: true,
        accumulators: vec![accumulator],
        dependent_types: types_of(&[TypeKind::Double]),
        has_next: false,
        is_join_build: false,
        has_probed_flag: false,
        has_normalized_keys: false,
    })
    .unwrap();
    store_row(
        &mut container,
        &[
            Value::BigInt(1),
            Value::Varchar(Cow::Owned("x".into())),
            Value::Double(0.5),
        ],
    );

    let rendered = container.to_string();
    assert_eq!(
        rendered,
        "Keys: BIGINT, VARCHAR Dependents: DOUBLE Num accumulators: 1 Num rows: 1"
    );

    // SAFETY: the stored row is live.
    let row_rendered = unsafe {
        let mut iter = RowContainerIterator::new();
        let mut rows = Vec::new();
        container.list_rows(&mut iter, 1, &mut rows);
        container.row_debug_string(rows[0])
    };
    assert!(row_rendered.contains("BigInt(1)"));
}
