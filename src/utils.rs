pub fn set_panic_hook() {
    // Panics show up in the browser console with a stack trace instead of
    // an opaque `unreachable` trap. Safe to call more than once.
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}
