//! Calculator resources owned by the transpiler.
//!
//! User programs and the support library share a single flat label space and a
//! single flag register on the calculator, so every flag, numeric label and named
//! register the generated code relies on is listed here. Library bodies refer to
//! these through placeholders (see [`expand_placeholders`]) so that renumbering a
//! resource only ever touches this file.

use std::ops::RangeInclusive;

/// Scratch flag used by comparison and boolean normalisation routines.
pub const FLAG_SCRATCH: u8 = 0;
/// Scratch flag used by the flag-test routines `pFS` / `pFC`.
pub const FLAG_TEST: u8 = 1;
/// Set while `LIST+` should append two-column (key, value) rows.
pub const FLAG_LIST_2D: u8 = 2;
/// Set while a dictionary lookup should create a missing key instead of halting.
pub const FLAG_AUTO_CREATE_KEY: u8 = 3;
/// The calculator's own error-ignore flag.
pub const FLAG_ERROR_IGNORE: u8 = 25;

/// Back-jump labels for loops. Each one is handed out once per program.
pub const BACK_JUMP_LABELS: RangeInclusive<u8> = 0..=29;
/// Forward skip labels. These are recycled once their `LBL` has been emitted.
pub const SKIP_LABELS: RangeInclusive<u8> = 30..=49;
/// Local label given to `PyLIB` when library labels are rewritten.
pub const LIBRARY_ENTRY_LABEL: u8 = 50;
/// Local labels pre-assigned to library routines, in catalogue order.
pub const LIBRARY_ROUTINE_LABELS: RangeInclusive<u8> = 51..=89;
/// Labels used inside library bodies, never seen by user code.
pub const LIBRARY_INTERNAL_LABELS: RangeInclusive<u8> = 90..=99;

/// Named register holding the alpha name of the list or dict being operated on.
pub const REG_ZLIST: &str = "ZLIST";
/// Register used by `pISG` to preserve the caller's T level.
pub const REG_ISG_SAVE: &str = "pISGvar";
/// Stack save area used by `pStoStk` / `pRclStk`.
pub const REG_STACK_SAVE: [&str; 4] = ["pX", "pY", "pZ", "pT"];
/// Key being searched for by `p2MxIJ`.
pub const REG_KEY: &str = "pKey";
/// Row counter for the `p2MxIJ` scan.
pub const REG_COUNTER: &str = "pCnt";
/// Value and key being appended by `LIST+`.
pub const REG_LIST_VALUE: &str = "pLV";
pub const REG_LIST_KEY: &str = "pLK";
/// Row index being written by `LIST+`.
pub const REG_LIST_ROW: &str = "pRow";

/// Every named register the support library may create.
pub fn named_registers() -> Vec<&'static str> {
    let mut names = vec![
        REG_ZLIST,
        REG_ISG_SAVE,
        REG_KEY,
        REG_COUNTER,
        REG_LIST_VALUE,
        REG_LIST_KEY,
        REG_LIST_ROW,
    ];
    names.extend(REG_STACK_SAVE);
    names
}

/// Replaces `{F_SCRATCH}`-style placeholders in a library body with the numbers above.
///
/// Flags render as two digits, which is how the calculator displays `SF 02`.
pub(crate) fn expand_placeholders(template: &str) -> String {
    template
        .replace("{F_SCRATCH}", &format!("{FLAG_SCRATCH:02}"))
        .replace("{F_TEST}", &format!("{FLAG_TEST:02}"))
        .replace("{F_LIST_2D}", &format!("{FLAG_LIST_2D:02}"))
        .replace("{F_AUTO_KEY}", &format!("{FLAG_AUTO_CREATE_KEY:02}"))
        .replace("{F_ERR_IGNORE}", &format!("{FLAG_ERROR_IGNORE:02}"))
        .replace("{R_ZLIST}", REG_ZLIST)
        .replace("{R_ISG}", REG_ISG_SAVE)
        .replace("{R_KEY}", REG_KEY)
        .replace("{R_CNT}", REG_COUNTER)
        .replace("{R_LV}", REG_LIST_VALUE)
        .replace("{R_LK}", REG_LIST_KEY)
        .replace("{R_ROW}", REG_LIST_ROW)
        .replace("{R_X}", REG_STACK_SAVE[0])
        .replace("{R_Y}", REG_STACK_SAVE[1])
        .replace("{R_Z}", REG_STACK_SAVE[2])
        .replace("{R_T}", REG_STACK_SAVE[3])
}
