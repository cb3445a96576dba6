/*
 * Copyright 2025 Flamewire
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use flamewire_msg_indexer::interval::{Interval, IntervalSet};

fn set(ranges: &[(u64, u64)]) -> IntervalSet {
    IntervalSet::from_intervals(ranges.iter().map(|&(from, to)| Interval::new(from, to)))
}

fn ranges(set: &IntervalSet) -> Vec<(u64, u64)> {
    set.as_slice().iter().map(|iv| (iv.from, iv.to)).collect()
}

#[test]
fn insert_cases() {
    let cases: &[(&[(u64, u64)], u64, &[(u64, u64)])] = &[
        (&[], 1, &[(1, 1)]),
        (&[(3, 4)], 15, &[(3, 4), (15, 15)]),
        (&[(3, 4)], 3, &[(3, 4)]),
        (&[(3, 4)], 5, &[(3, 5)]),
        (&[(3, 4), (7, 10)], 8, &[(3, 4), (7, 10)]),
        (&[(3, 4), (7, 10)], 5, &[(3, 5), (7, 10)]),
        (&[(3, 4), (8, 10)], 6, &[(3, 4), (6, 6), (8, 10)]),
        (&[(3, 4), (6, 6), (8, 10)], 7, &[(3, 4), (6, 10)]),
        (&[(3, 4), (6, 6), (8, 10)], 5, &[(3, 6), (8, 10)]),
        (&[(3, 4), (8, 10)], 1, &[(1, 1), (3, 4), (8, 10)]),
        (&[(3, 4), (8, 10)], 7, &[(3, 4), (7, 10)]),
    ];
    for (start, height, expected) in cases {
        let mut s = set(start);
        s.insert(*height);
        assert_eq!(ranges(&s), *expected, "insert {height} into {start:?}");
    }
}

#[test]
fn insert_reports_changes() {
    let mut s = set(&[(3, 4)]);
    assert!(!s.insert(4));
    assert!(s.insert(5));
    assert!(!s.insert(5));
}

#[test]
fn merge_sequence_closes_gaps() {
    let mut s = set(&[(3, 4), (8, 10)]);
    s.insert(6);
    assert_eq!(ranges(&s), vec![(3, 4), (6, 6), (8, 10)]);
    s.insert(7);
    assert_eq!(ranges(&s), vec![(3, 4), (6, 10)]);
    s.insert(5);
    assert_eq!(ranges(&s), vec![(3, 10)]);
}

#[test]
fn covers_checks_every_interval() {
    let s = set(&[(1, 2), (4, 10)]);
    assert!(s.covers(1));
    assert!(s.covers(10));
    assert!(!s.covers(3));
    assert!(!s.covers(11));
    assert!(!IntervalSet::new().covers(1));
}

#[test]
fn lowest_unindexed_cases() {
    let cases: &[(&[(u64, u64)], u64, u64)] = &[
        (&[], 0, 1),
        (&[], 15, 15),
        (&[(4, 10)], 0, 1),
        (&[(1, 2), (4, 10)], 0, 3),
        (&[(1, 2), (4, 10)], 4, 11),
        (&[(1, 2), (4, 10)], 12, 12),
        (&[(5, 9)], 7, 10),
        (&[(8713586, 8739758), (10149582, 10153387)], 9063670, 9063670),
    ];
    for (start, floor, expected) in cases {
        assert_eq!(
            set(start).lowest_unindexed(*floor),
            *expected,
            "lowest unindexed of {start:?} from {floor}"
        );
    }
}

#[test]
fn lowest_unindexed_skips_chained_intervals() {
    let s = set(&[(1, 5), (7, 9), (11, 20)]);
    assert_eq!(s.lowest_unindexed(8), 10);
    assert_eq!(s.lowest_unindexed(1), 6);
}

#[test]
fn serialises_as_plain_list() {
    let s = set(&[(1, 2), (4, 10)]);
    let json = serde_json::to_string(&s).unwrap();
    assert_eq!(json, r#"[{"from":1,"to":2},{"from":4,"to":10}]"#);
}
