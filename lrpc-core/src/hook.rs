//! The process-wide error hook.
//!
//! At most one hook is installed at a time; installing a new one replaces
//! the old. Grounded on the original's single global `rpc_error_hook`.

use std::sync::{Mutex, OnceLock};

type Hook = Box<dyn Fn(&str) + Send + Sync>;

fn hook_slot() -> &'static Mutex<Option<Hook>> {
    static SLOT: OnceLock<Mutex<Option<Hook>>> = OnceLock::new();
    SLOT.get_or_init(|| Mutex::new(None))
}

/// Installs a process-wide hook invoked with a human-readable message
/// whenever a nonfatal error is raised and swallowed internally.
pub fn install(hook: impl Fn(&str) + Send + Sync + 'static) {
    *hook_slot().lock().expect("hook mutex poisoned") = Some(Box::new(hook));
}

/// Removes the installed hook, if any.
pub fn clear() {
    *hook_slot().lock().expect("hook mutex poisoned") = None;
}

/// Invokes the installed hook, if any, with `message`.
pub fn notify(message: &str) {
    if let Some(hook) = hook_slot().lock().expect("hook mutex poisoned").as_ref() {
        hook(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn installed_hook_receives_notifications() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        install(move |_msg| {
            calls2.fetch_add(1, Ordering::SeqCst);
        });
        notify("nonfatal: undefined rpc command");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        clear();
        notify("this one should not be counted");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
