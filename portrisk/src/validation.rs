// SPDX-License-Identifier: AGPL-3.0-or-later
//! Pass/fail check accumulator for self-validation binaries.
//!
//! Every check prints one `[OK]` or `[FAIL]` line with the actual value,
//! the expected value and the tolerance. [`Validator::finish`] prints a
//! summary banner and exits 0 when every check passed, 1 otherwise.
//!
//! ```
//! use portrisk::validation::Validator;
//!
//! let mut v = Validator::new("doc-test");
//! v.check("score", 2.0 / 3.0, 0.666_666, 1e-6);
//! v.check_count("rows", 10, 10);
//! v.check_bool("monotone", true);
//! assert_eq!(v.counts(), (3, 3));
//! ```

/// Compare `actual` against `expected` within absolute `tolerance`.
///
/// ```
/// use portrisk::validation::check;
///
/// assert!(check("exact", 1.0, 1.0, 0.0));
/// assert!(!check("deliberate fail", 2.0, 1.0, 0.5));
/// ```
#[must_use]
pub fn check(label: &str, actual: f64, expected: f64, tolerance: f64) -> bool {
    let pass = (actual - expected).abs() <= tolerance;
    let tag = if pass { "OK" } else { "FAIL" };
    println!("  [{tag}]  {label}: {actual:.6} (expected {expected:.6}, tol {tolerance:.6})");
    pass
}

/// Compare an exact count.
#[must_use]
pub fn check_count(label: &str, actual: usize, expected: usize) -> bool {
    let pass = actual == expected;
    let tag = if pass { "OK" } else { "FAIL" };
    println!("  [{tag}]  {label}: {actual} (expected {expected})");
    pass
}

/// Print the summary banner; returns whether all checks passed.
#[must_use]
pub fn print_result(name: &str, passed: u32, total: u32) -> bool {
    println!("\n═══════════════════════════════════════════════════════════");
    println!("  {name}: {passed}/{total} checks passed");
    if passed == total {
        println!("  RESULT: PASS");
    } else {
        println!("  RESULT: FAIL ({} checks failed)", total - passed);
    }
    println!("═══════════════════════════════════════════════════════════");
    passed == total
}

/// Accumulated validation state.
pub struct Validator {
    name: String,
    passed: u32,
    total: u32,
}

impl Validator {
    /// Start a validator and print its banner.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        println!("═══════════════════════════════════════════════════════════");
        println!("  {name}");
        println!("═══════════════════════════════════════════════════════════\n");
        Self {
            name,
            passed: 0,
            total: 0,
        }
    }

    /// Print a section header (no check counted).
    pub fn section(&self, label: &str) {
        println!("\n{label}");
    }

    /// Check an f64 value against expected within tolerance.
    pub fn check(&mut self, label: &str, actual: f64, expected: f64, tolerance: f64) {
        self.record(check(label, actual, expected, tolerance));
    }

    /// Check an exact count.
    pub fn check_count(&mut self, label: &str, actual: usize, expected: usize) {
        self.record(check_count(label, actual, expected));
    }

    /// Check a boolean property.
    pub fn check_bool(&mut self, label: &str, pass: bool) {
        let tag = if pass { "OK" } else { "FAIL" };
        println!("  [{tag}]  {label}");
        self.record(pass);
    }

    /// Check that `actual` does not exceed `limit`.
    pub fn check_at_most(&mut self, label: &str, actual: f64, limit: f64) {
        let pass = actual <= limit;
        let tag = if pass { "OK" } else { "FAIL" };
        println!("  [{tag}]  {label}: {actual:.6} (limit {limit:.6})");
        self.record(pass);
    }

    fn record(&mut self, pass: bool) {
        self.total += 1;
        if pass {
            self.passed += 1;
        }
    }

    /// (passed, total).
    #[must_use]
    pub const fn counts(&self) -> (u32, u32) {
        (self.passed, self.total)
    }

    /// Print the summary banner; returns whether all checks passed.
    #[must_use]
    pub fn summary(&self) -> bool {
        print_result(&self.name, self.passed, self.total)
    }

    /// Print the summary and exit with 0 (pass) or 1 (fail).
    pub fn finish(self) -> ! {
        let ok = self.summary();
        std::process::exit(i32::from(!ok))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standalone_checks() {
        assert!(check("close", 42.001, 42.0, 0.01));
        assert!(!check("far", 50.0, 42.0, 1.0));
        assert!(check_count("exact", 42, 42));
        assert!(!check_count("diff", 42, 43));
    }

    #[test]
    fn print_result_reports_status() {
        assert!(print_result("test", 3, 3));
        assert!(!print_result("test", 2, 3));
    }

    #[test]
    fn validator_accumulates() {
        let mut v = Validator::new("unit");
        v.section("── floats ──");
        v.check("ok", 1.0, 1.0, 0.0);
        v.check("fail", 2.0, 1.0, 0.0);
        v.section("── counts ──");
        v.check_count("count ok", 5, 5);
        v.check_bool("property", false);
        v.check_at_most("r_hat", 1.01, 1.05);
        v.check_at_most("r_hat too high", 1.2, 1.05);
        assert_eq!(v.counts(), (3, 6));
        assert!(!v.summary());
    }
}
