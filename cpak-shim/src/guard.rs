use std::cell::Cell;
use std::marker::PhantomData;

thread_local! {
    static IN_HOOK: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as running hook logic.
///
/// Anything the hook itself calls (allocation, logging, locking) that lands in
/// another hook sees the flag and goes straight to the real function.
pub struct HookGuard {
    // the flag is per thread, so the guard must stay on it
    _not_send: PhantomData<*const ()>,
}

impl HookGuard {
    /// `None` when this thread is already inside a hook.
    pub fn enter() -> Option<HookGuard> {
        IN_HOOK
            .try_with(|flag| {
                if flag.replace(true) {
                    None
                } else {
                    Some(HookGuard {
                        _not_send: PhantomData,
                    })
                }
            })
            .ok()
            .flatten()
    }

    pub fn is_active() -> bool {
        IN_HOOK.try_with(Cell::get).unwrap_or(true)
    }
}

impl Drop for HookGuard {
    fn drop(&mut self) {
        let _ = IN_HOOK.try_with(|flag| flag.set(false));
    }
}
