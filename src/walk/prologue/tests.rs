use proptest::prelude::*;

use super::{analyze_fn, PrologueInfo, ScanStop};
use crate::arch::{addiu_sp_sp, sw_ra_sp, JR_RA};
use crate::config::Limits;
use crate::host::Rdram;
use crate::walk::fixture::{self, Counting, Filler, BODY};

const ENTRY: u32 = 0x8000_1000;

#[test]
fn finds_prologue_from_anywhere_in_body() {
    let mut rdram = fixture::rdram();
    fixture::function(&mut rdram, ENTRY, -0x28, Some(0x24));

    for pc in (ENTRY + 8..ENTRY + 0x200).step_by(4) {
        let info = analyze_fn(&rdram, pc, &Limits::DEFAULT);
        assert_eq!(
            info,
            PrologueInfo {
                ra_save_offset: Some(0x24),
                frame_size: Some(-0x28),
                stop: ScanStop::Complete,
            },
            "started at {pc:#x}"
        );
        assert_eq!(info.frame(), Some((0x24, -0x28)));
    }
}

#[test]
fn first_match_wins() {
    let mut rdram = fixture::rdram();
    // A second spill and a stack adjustment further down, e.g. around an alloca.
    assert!(rdram.write_words(
        ENTRY,
        &[
            addiu_sp_sp(-0x18),
            sw_ra_sp(0x14),
            0,
            addiu_sp_sp(-0x40),
            sw_ra_sp(0x3c),
        ]
    ));

    let info = analyze_fn(&rdram, ENTRY + 0x20, &Limits::DEFAULT);
    assert_eq!(info.frame(), Some((0x3c, -0x40)));
}

#[test]
fn leaf_function_stops_at_previous_return() {
    let mut rdram = fixture::rdram();
    fixture::function(&mut rdram, ENTRY, -0x10, None);

    let info = analyze_fn(&rdram, ENTRY + BODY, &Limits::DEFAULT);
    assert_eq!(info.ra_save_offset, None);
    assert_eq!(info.frame_size, Some(-0x10));
    assert_eq!(info.stop, ScanStop::Return);
    assert!(info.is_incomplete());
    assert_eq!(info.frame(), None);
}

#[test]
fn starting_on_return_stops_immediately() {
    let memory = Counting::new(Filler {
        word: JR_RA,
        pc: 0,
        ra: 0,
        sp: 0,
    });
    let info = analyze_fn(&memory, 0x8000_0400, &Limits::DEFAULT);

    assert_eq!(info.stop, ScanStop::Return);
    assert_eq!(memory.reads.get(), 1);
}

#[test]
fn stops_at_address_zero() {
    let memory = Counting::new(Filler {
        word: 0,
        pc: 0,
        ra: 0,
        sp: 0,
    });
    let info = analyze_fn(&memory, 0x10, &Limits::DEFAULT);

    assert_eq!(info.stop, ScanStop::NullAddress);
    assert_eq!(info.frame(), None);
    // 0x10, 0xc, 0x8, 0x4, 0x0
    assert_eq!(memory.reads.get(), 5);
}

#[test]
fn unaligned_start_does_not_wrap() {
    let filler = |word| {
        Counting::new(Filler {
            word,
            pc: 0,
            ra: 0,
            sp: 0,
        })
    };

    let memory = filler(0);
    let info = analyze_fn(&memory, 0x2, &Limits::DEFAULT);
    assert_eq!(info.stop, ScanStop::NullAddress);
    assert_eq!(memory.reads.get(), 1);

    // 0x6, 0x2
    let memory = filler(sw_ra_sp(0x14));
    let info = analyze_fn(&memory, 0x6, &Limits::DEFAULT);
    assert_eq!(info.stop, ScanStop::NullAddress);
    assert_eq!(info.ra_save_offset, Some(0x14));
    assert_eq!(memory.reads.get(), 2);
}

#[test]
fn empty_memory_exhausts_budget() {
    let memory = Counting::new(Rdram::zeroed(0x8000));
    let info = analyze_fn(&memory, 0x8000_7ffc, &Limits::DEFAULT);

    assert_eq!(
        info,
        PrologueInfo {
            ra_save_offset: None,
            frame_size: None,
            stop: ScanStop::BudgetExhausted,
        }
    );
    assert_eq!(memory.reads.get(), u64::from(Limits::DEFAULT.scan_instructions()));
}

#[test]
fn prologue_just_outside_budget_is_missed() {
    let limits = Limits::new(0x40, 8).unwrap();
    let mut rdram = fixture::rdram();
    fixture::function(&mut rdram, ENTRY, -0x20, Some(0x1c));

    // sw ra is the 16th word counting back from ENTRY + 0x40, addiu the 17th.
    let info = analyze_fn(&rdram, ENTRY + 0x40, &limits);
    assert_eq!(info.ra_save_offset, Some(0x1c));
    assert_eq!(info.frame_size, None);
    assert_eq!(info.stop, ScanStop::BudgetExhausted);

    let info = analyze_fn(&rdram, ENTRY + 0x3c, &limits);
    assert_eq!(info.frame(), Some((0x1c, -0x20)));
}

fn word() -> impl Strategy<Value = u32> {
    prop_oneof![
        4 => any::<u32>(),
        1 => Just(JR_RA),
        1 => any::<u16>().prop_map(sw_ra_sp),
        1 => any::<i16>().prop_map(addiu_sp_sp),
    ]
}

proptest! {
    #[test]
    fn scan_is_bounded_and_deterministic(
        words in prop::collection::vec(word(), 1..512),
        start in 0u32..0x800,
        budget_words in 1u32..64,
    ) {
        let mut rdram = Rdram::zeroed(words.len() * 4);
        prop_assert!(rdram.write_words(0x8000_0000, &words));
        let limits = Limits::new(budget_words * 4, 1).unwrap();
        let start_pc = 0x8000_0000 + start;

        let memory = Counting::new(rdram);
        let first = analyze_fn(&memory, start_pc, &limits);
        prop_assert!(memory.reads.get() <= u64::from(budget_words));

        let second = analyze_fn(&memory, start_pc, &limits);
        prop_assert_eq!(first, second);

        if first.stop == ScanStop::Complete {
            prop_assert!(first.frame().is_some());
        }
    }
}
