/// Remaining cups for a user under an optional personal cap.
///
/// Returns `None` for uncapped users. A user who somehow sits above their
/// cap (the cap was lowered after the fact, or an admin edited a log row
/// upwards) reports zero remaining rather than a negative number.
pub fn remaining_allowance(max_coffees: Option<i64>, consumed_count: i64) -> Option<i64> {
    max_coffees.map(|cap| (cap - consumed_count).max(0))
}
