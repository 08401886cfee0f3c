//! Support library: RPN subroutines that compiled code calls with `XEQ`.
//!
//! Each routine is a fixed body written against the reserved flags and
//! registers in [`crate::reserved`]. Routines are appended to a program only
//! when referenced, together with everything they call in turn, and receive a
//! pre-assigned numeric local label from [`reserved::LIBRARY_ROUTINE_LABELS`]
//! based on their position in the catalogue.
//!
//! Stack conventions: arguments are pushed in source order so the last one is
//! in X. Routines that return a value leave it in X.

use std::sync::OnceLock;

use ahash::AHashSet;

use crate::reserved::{self, FLAG_AUTO_CREATE_KEY, FLAG_ERROR_IGNORE, FLAG_LIST_2D, FLAG_SCRATCH, FLAG_TEST};

/// A routine in the support library.
#[derive(Debug, Clone)]
pub struct LibraryEntry {
    pub(crate) name: &'static str,
    body: String,
    flags: &'static [u8],
    internal_labels: &'static [u8],
    prerequisites: &'static [&'static str],
}

impl LibraryEntry {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// RPN text starting with `LBL "name"` and ending with `RTN`.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Flags the routine tests or changes.
    pub fn flags(&self) -> &'static [u8] {
        self.flags
    }

    /// Numeric labels used inside the body.
    pub fn internal_labels(&self) -> &'static [u8] {
        self.internal_labels
    }

    /// Routines this one calls with `XEQ`.
    pub fn prerequisites(&self) -> &'static [&'static str] {
        self.prerequisites
    }
}

/// Every library routine in emission order.
pub fn library_entries() -> &'static [LibraryEntry] {
    static CATALOGUE: OnceLock<Vec<LibraryEntry>> = OnceLock::new();
    CATALOGUE.get_or_init(build_catalogue)
}

/// Finds a routine by its exact name.
pub fn lookup(name: &str) -> Option<&'static LibraryEntry> {
    library_entries().iter().find(|entry| entry.name == name)
}

/// Numeric local label a routine is rewritten to.
pub fn local_label(name: &str) -> Option<u8> {
    let index = library_entries().iter().position(|entry| entry.name == name)?;
    let label = usize::from(*reserved::LIBRARY_ROUTINE_LABELS.start()) + index;
    u8::try_from(label)
        .ok()
        .filter(|label| reserved::LIBRARY_ROUTINE_LABELS.contains(label))
}

/// Closes `names` over prerequisites, returning entries in catalogue order.
///
/// Unknown names are ignored.
pub(crate) fn closure<'n>(names: impl IntoIterator<Item = &'n str>) -> Vec<&'static LibraryEntry> {
    let mut included: AHashSet<&'static str> = AHashSet::new();
    let mut pending: Vec<&'static LibraryEntry> = names.into_iter().filter_map(lookup).collect();
    while let Some(entry) = pending.pop() {
        if included.insert(entry.name) {
            pending.extend(entry.prerequisites.iter().filter_map(|name| lookup(name)));
        }
    }
    library_entries()
        .iter()
        .filter(|entry| included.contains(entry.name))
        .collect()
}

fn entry(
    name: &'static str,
    template: &str,
    flags: &'static [u8],
    internal_labels: &'static [u8],
    prerequisites: &'static [&'static str],
) -> LibraryEntry {
    LibraryEntry {
        name,
        body: reserved::expand_placeholders(template),
        flags,
        internal_labels,
        prerequisites,
    }
}

const COMPARISON: &[&str] = &["p0Bool"];

fn build_catalogue() -> Vec<LibraryEntry> {
    vec![
        entry("pISG", P_ISG, &[], &[90, 91], &["pErOutR"]),
        entry("pErOutR", P_ER_OUT_R, &[], &[], &[]),
        entry("pEQ", &comparison("pEQ", "X=Y?"), &[FLAG_SCRATCH], &[], COMPARISON),
        entry("pNEQ", &comparison("pNEQ", "X≠Y?"), &[FLAG_SCRATCH], &[], COMPARISON),
        entry("pLT", &comparison("pLT", "X>Y?"), &[FLAG_SCRATCH], &[], COMPARISON),
        entry("pLTE", &comparison("pLTE", "X≥Y?"), &[FLAG_SCRATCH], &[], COMPARISON),
        entry("pGT", &comparison("pGT", "X<Y?"), &[FLAG_SCRATCH], &[], COMPARISON),
        entry("pGTE", &comparison("pGTE", "X≤Y?"), &[FLAG_SCRATCH], &[], COMPARISON),
        entry("p0Bool", P_0_BOOL, &[FLAG_SCRATCH], &[], &[]),
        entry("pBool", &coerce("pBool", "X≠0?"), &[FLAG_SCRATCH], &[], &[]),
        entry("p2Bool", P_2_BOOL, &[], &[], &["pBool"]),
        entry("pNot", &coerce("pNot", "X=0?"), &[FLAG_SCRATCH], &[], &[]),
        entry("pFS", &flag_test("pFS", "FS?"), &[FLAG_TEST], &[], &[]),
        entry("pFC", &flag_test("pFC", "FC?"), &[FLAG_TEST], &[], &[]),
        entry("pAssert", P_ASSERT, &[], &[], &[]),
        entry("pStoStk", P_STO_STK, &[], &[], &[]),
        entry("pRclStk", P_RCL_STK, &[], &[], &[]),
        entry("LIST+", LIST_PUSH, &[FLAG_LIST_2D, FLAG_ERROR_IGNORE], &[90, 91, 92], &[]),
        entry("LIST-", LIST_POP, &[], &[90], &[]),
        entry("CLIST", LIST_CLEAR, &[FLAG_ERROR_IGNORE], &[], &[]),
        entry("pLen", P_LEN, &[FLAG_ERROR_IGNORE], &[90], &[]),
        entry("pMxIJ", P_MX_IJ, &[], &[], &[]),
        entry("pMxSz", P_MX_SZ, &[], &[], &[]),
        entry(
            "p2MxIJ",
            P_2_MX_IJ,
            &[FLAG_LIST_2D, FLAG_AUTO_CREATE_KEY, FLAG_ERROR_IGNORE],
            &[92, 93, 94, 99],
            &["pStoStk", "pRclStk", "pISG", "PErNkey", "LIST+"],
        ),
        entry("PErNkey", P_ER_NKEY, &[], &[], &[]),
    ]
}

/// `(y, x) → 1 | 0` using `test` on the calculator's stack.
fn comparison(name: &str, test: &str) -> String {
    format!(
        "LBL \"{name}\"
CF {{F_SCRATCH}}
{test}
SF {{F_SCRATCH}}
XEQ \"p0Bool\"
RTN
"
    )
}

/// `x → 1 | 0` depending on `test`.
fn coerce(name: &str, test: &str) -> String {
    format!(
        "LBL \"{name}\"
CF {{F_SCRATCH}}
{test}
SF {{F_SCRATCH}}
RDN
FS? {{F_SCRATCH}}
1
FC? {{F_SCRATCH}}
0
RTN
"
    )
}

/// `flag number → 1 | 0`; the flag itself is left untouched.
fn flag_test(name: &str, test: &str) -> String {
    format!(
        "LBL \"{name}\"
CF {{F_TEST}}
{test} IND ST X
SF {{F_TEST}}
RDN
FS? {{F_TEST}}
1
FC? {{F_TEST}}
0
RTN
"
    )
}

// `(from, to, step) → ccccccc.fffii` for ISG; T is preserved.
// The fraction holds `to - 1` (clamped at 0) and the step, and its sign
// follows `from` so negative starts still count up.
const P_ISG: &str = r#"LBL "pISG"
X<> ST T
STO "{R_ISG}"
RDN
999
X<Y?
XEQ "pErOutR"
RDN
1
-
1000
÷
X<0?
CLX
X<> ST Z
100000
÷
RCL+ ST Z
RCL ST Y
X<0?
GTO 90
RDN
+
GTO 91
LBL 90
RDN
-
LBL 91
RCL "{R_ISG}"
X<>Y
RTN
"#;

const P_ER_OUT_R: &str = r#"LBL "pErOutR"
"range() limited"
├" to 999"
AVIEW
STOP
RTN
"#;

// Drops the two compared values and pushes the scratch flag as 1 / 0.
const P_0_BOOL: &str = r#"LBL "p0Bool"
RDN
RDN
FS? {F_SCRATCH}
1
FC? {F_SCRATCH}
0
RTN
"#;

const P_2_BOOL: &str = r#"LBL "p2Bool"
XEQ "pBool"
X<>Y
XEQ "pBool"
X<>Y
RTN
"#;

const P_ASSERT: &str = r#"LBL "pAssert"
X≠0?
RTN
"AssertionError"
AVIEW
STOP
RTN
"#;

const P_STO_STK: &str = r#"LBL "pStoStk"
STO "{R_X}"
RDN
STO "{R_Y}"
RDN
STO "{R_Z}"
RDN
STO "{R_T}"
RDN
RTN
"#;

const P_RCL_STK: &str = r#"LBL "pRclStk"
RCL "{R_T}"
RCL "{R_Z}"
RCL "{R_Y}"
RCL "{R_X}"
RTN
"#;

// Appends X (or the key in Y and value in X when the 2D flag is set) as a new
// row of the matrix named by ZLIST, creating it when missing.
const LIST_PUSH: &str = r#"LBL "LIST+"
STO "{R_LV}"
FS? {F_LIST_2D}
RDN
FS? {F_LIST_2D}
STO "{R_LK}"
SF {F_ERR_IGNORE}
RCL IND "{R_ZLIST}"
FC?C {F_ERR_IGNORE}
GTO 90
DIM?
RDN
GTO 91
LBL 90
0
LBL 91
1
+
STO "{R_ROW}"
FS? {F_LIST_2D}
2
FC? {F_LIST_2D}
1
DIM IND "{R_ZLIST}"
INDEX IND "{R_ZLIST}"
RCL "{R_ROW}"
1
STOIJ
FC? {F_LIST_2D}
GTO 92
RCL "{R_LK}"
STOEL
J+
LBL 92
RCL "{R_LV}"
STOEL
RTN
"#;

// Removes the last row of the ZLIST matrix and returns its first element.
const LIST_POP: &str = r#"LBL "LIST-"
INDEX IND "{R_ZLIST}"
RCL IND "{R_ZLIST}"
DIM?
RDN
STO "{R_ROW}"
1
STOIJ
RCLEL
STO "{R_LV}"
RCL "{R_ROW}"
1
X=Y?
GTO 90
DELR
RCL "{R_LV}"
RTN
LBL 90
CLV IND "{R_ZLIST}"
RCL "{R_LV}"
RTN
"#;

const LIST_CLEAR: &str = r#"LBL "CLIST"
SF {F_ERR_IGNORE}
CLV IND "{R_ZLIST}"
CF {F_ERR_IGNORE}
RTN
"#;

// Number of rows in the ZLIST matrix, 0 when it does not exist.
const P_LEN: &str = r#"LBL "pLen"
SF {F_ERR_IGNORE}
RCL IND "{R_ZLIST}"
FC?C {F_ERR_IGNORE}
GTO 90
DIM?
RDN
RTN
LBL 90
0
RTN
"#;

// `(i, j)` 0-based → current element pointer; both are consumed.
const P_MX_IJ: &str = r#"LBL "pMxIJ"
1
+
X<>Y
1
+
X<>Y
STOIJ
RDN
RDN
RTN
"#;

// `(a, b, c, d)` exclusive slice bounds → `(b - a, d - c)` sizes for GETM.
const P_MX_SZ: &str = r#"LBL "pMxSz"
X<>Y
-
RDN
X<>Y
-
X<>Y
RDN
X<>Y
RTN
"#;

// Key in X → pointer at column 2 of the row whose column 1 equals the key.
// The caller's remaining stack is preserved. A missing key halts, or is
// appended with value 0 when the auto-create flag is set.
const P_2_MX_IJ: &str = r#"LBL "p2MxIJ"
STO "{R_KEY}"
RDN
XEQ "pStoStk"
SF {F_ERR_IGNORE}
INDEX IND "{R_ZLIST}"
FC?C {F_ERR_IGNORE}
GTO 92
0
RCL IND "{R_ZLIST}"
DIM?
RDN
1
XEQ "pISG"
STO "{R_CNT}"
LBL 99
RCL "{R_CNT}"
IP
1
+
1
STOIJ
RCLEL
RCL "{R_KEY}"
X=Y?
GTO 93
ISG "{R_CNT}"
GTO 99
LBL 92
FC? {F_AUTO_KEY}
XEQ "PErNkey"
RCL "{R_KEY}"
0
SF {F_LIST_2D}
XEQ "LIST+"
CF {F_LIST_2D}
GTO 94
LBL 93
J+
LBL 94
XEQ "pRclStk"
RTN
"#;

const P_ER_NKEY: &str = r#"LBL "PErNkey"
"Dict key not"
├" found"
AVIEW
STOP
RTN
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn xeq_targets(body: &str) -> Vec<&str> {
        body.lines()
            .filter_map(|line| line.strip_prefix("XEQ \""))
            .filter_map(|rest| rest.strip_suffix('"'))
            .collect()
    }

    #[test]
    fn bodies_start_with_their_label_and_end_with_rtn() {
        for entry in library_entries() {
            let first = entry.body().lines().next().unwrap();
            assert_eq!(first, format!("LBL \"{}\"", entry.name()));
            assert_eq!(entry.body().lines().last(), Some("RTN"), "{}", entry.name());
            assert!(entry.name().chars().count() <= 7, "{}", entry.name());
        }
    }

    #[test]
    fn prerequisites_match_calls() {
        for entry in library_entries() {
            let mut called = xeq_targets(entry.body());
            called.sort_unstable();
            called.dedup();
            let mut declared = entry.prerequisites().to_vec();
            declared.sort_unstable();
            assert_eq!(called, declared, "{}", entry.name());
        }
    }

    #[test]
    fn placeholders_are_all_expanded() {
        for entry in library_entries() {
            assert!(!entry.body().contains('{'), "{}", entry.name());
        }
    }

    #[test]
    fn internal_labels_stay_in_reserved_pool() {
        for entry in library_entries() {
            for label in entry.internal_labels() {
                assert!(reserved::LIBRARY_INTERNAL_LABELS.contains(label));
                assert!(entry.body().contains(&format!("LBL {label}")), "{}", entry.name());
            }
        }
    }

    #[test]
    fn local_labels_are_unique_and_reserved() {
        let mut seen = AHashSet::new();
        for entry in library_entries() {
            let label = local_label(entry.name()).unwrap();
            assert!(reserved::LIBRARY_ROUTINE_LABELS.contains(&label));
            assert!(seen.insert(label));
        }
        assert_eq!(local_label("pISG"), Some(51));
        assert_eq!(local_label("nope"), None);
    }

    #[test]
    fn closure_is_transitive_and_ordered() {
        let names: Vec<&str> = closure(["p2MxIJ"]).iter().map(|e| e.name()).collect();
        assert_eq!(
            names,
            ["pISG", "pErOutR", "pStoStk", "pRclStk", "LIST+", "p2MxIJ", "PErNkey"]
        );
        let names: Vec<&str> = closure(["pGT", "unknown"]).iter().map(|e| e.name()).collect();
        assert_eq!(names, ["pGT", "p0Bool"]);
    }

    #[test]
    fn comparison_body() {
        let body = lookup("pLTE").unwrap().body();
        assert_eq!(body, "LBL \"pLTE\"\nCF 00\nX≥Y?\nSF 00\nXEQ \"p0Bool\"\nRTN\n");
    }
}
