fn main() {
    // A violated internal invariant (a failed hexkin_assert) panics; map it
    // onto the dedicated exit code instead of the default abort.
    let outcome = std::panic::catch_unwind(hexkin::runner::run);
    std::process::exit(outcome.unwrap_or(99));
}
