// Tue Jan 13 2026 - Alex

//! Loader interception through symbol interposition.
//!
//! When this library is injected with `LD_PRELOAD` (or a wrap script on
//! Android) the `dlopen` family below shadows the loader's own exports. Each
//! trampoline forwards to the next definition found with `RTLD_NEXT` and, if a
//! listener has been attached to its address, reports entry and exit around
//! the real call.
//!
//! `attach` only accepts addresses that belong to one of these trampolines; any
//! other export cannot be intercepted without inline patching.

use crate::hooks::HookError;
use crate::host::{InvocationArgs, InvocationListener};
use crate::memory::Address;
use crate::utils::panic_message;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

static LISTENERS: Lazy<RwLock<HashMap<u64, Arc<dyn InvocationListener>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

pub fn attach(target: Address, listener: Arc<dyn InvocationListener>) -> Result<(), HookError> {
    let Some(name) = trampoline_name(target) else {
        return Err(HookError::UnsupportedTarget(target));
    };

    let mut listeners = LISTENERS.write();
    if listeners.contains_key(&target.as_u64()) {
        return Err(HookError::AlreadyAttached(target));
    }
    listeners.insert(target.as_u64(), listener);
    log::debug!("listener attached to {} trampoline at {}", name, target);
    Ok(())
}

pub fn is_attached(target: Address) -> bool {
    LISTENERS.read().contains_key(&target.as_u64())
}

fn trampoline_name(target: Address) -> Option<&'static str> {
    trampolines()
        .into_iter()
        .find(|(_, address)| *address == target)
        .map(|(name, _)| name)
}

/// Runs `call` between the attached listener's entry and exit callbacks. The
/// context lives on this stack frame, so concurrent calls never share it.
/// Listener panics are contained here and never unwind into the loader.
#[cfg_attr(not(all(feature = "preload", not(test))), allow(dead_code))]
fn dispatch<F>(target: Address, args: &[Address], call: F) -> *mut libc::c_void
where
    F: FnOnce() -> *mut libc::c_void,
{
    let listener = LISTENERS.read().get(&target.as_u64()).cloned();
    let Some(listener) = listener else {
        return call();
    };

    let invocation = InvocationArgs::new(args);
    let context = panic::catch_unwind(AssertUnwindSafe(|| listener.on_enter(&invocation)))
        .unwrap_or_else(|payload| {
            log::error!("entry callback panicked: {}", panic_message(payload.as_ref()));
            Default::default()
        });

    let result = call();

    let retval = Address::from_ptr(result as *const libc::c_void);
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener.on_leave(context, retval))) {
        log::error!("exit callback panicked: {}", panic_message(payload.as_ref()));
    }

    result
}

#[cfg(all(feature = "preload", not(test)))]
mod exports {
    use super::dispatch;
    use crate::memory::Address;
    use libc::{c_char, c_int, c_void};
    use once_cell::sync::Lazy;

    type DlopenFn = unsafe extern "C" fn(*const c_char, c_int) -> *mut c_void;

    static REAL_DLOPEN: Lazy<Option<DlopenFn>> = Lazy::new(|| unsafe {
        let ptr = libc::dlsym(libc::RTLD_NEXT, b"dlopen\0".as_ptr() as *const _);
        if ptr.is_null() {
            None
        } else {
            Some(std::mem::transmute::<*mut c_void, DlopenFn>(ptr))
        }
    });

    #[no_mangle]
    pub unsafe extern "C" fn dlopen(filename: *const c_char, flags: c_int) -> *mut c_void {
        let target = Address::new(dlopen as usize as u64);
        let args = [Address::from_ptr(filename), Address::new(flags as u64)];
        dispatch(target, &args, || match *REAL_DLOPEN {
            Some(real) => unsafe { real(filename, flags) },
            None => std::ptr::null_mut(),
        })
    }

    #[cfg(target_os = "android")]
    type AndroidDlopenExtFn = unsafe extern "C" fn(*const c_char, c_int, *const c_void) -> *mut c_void;

    #[cfg(target_os = "android")]
    static REAL_ANDROID_DLOPEN_EXT: Lazy<Option<AndroidDlopenExtFn>> = Lazy::new(|| unsafe {
        let ptr = libc::dlsym(libc::RTLD_NEXT, b"android_dlopen_ext\0".as_ptr() as *const _);
        if ptr.is_null() {
            None
        } else {
            Some(std::mem::transmute::<*mut c_void, AndroidDlopenExtFn>(ptr))
        }
    });

    #[cfg(target_os = "android")]
    #[no_mangle]
    pub unsafe extern "C" fn android_dlopen_ext(
        filename: *const c_char,
        flags: c_int,
        extinfo: *const c_void,
    ) -> *mut c_void {
        let target = Address::new(android_dlopen_ext as usize as u64);
        let args = [
            Address::from_ptr(filename),
            Address::new(flags as u64),
            Address::from_ptr(extinfo),
        ];
        dispatch(target, &args, || match *REAL_ANDROID_DLOPEN_EXT {
            Some(real) => unsafe { real(filename, flags, extinfo) },
            None => std::ptr::null_mut(),
        })
    }

    pub fn trampolines() -> Vec<(&'static str, Address)> {
        let mut list = vec![("dlopen", Address::new(dlopen as usize as u64))];
        #[cfg(target_os = "android")]
        list.push(("android_dlopen_ext", Address::new(android_dlopen_ext as usize as u64)));
        list
    }
}

#[cfg(all(feature = "preload", not(test)))]
use exports::trampolines;

#[cfg(not(all(feature = "preload", not(test))))]
fn trampolines() -> Vec<(&'static str, Address)> {
    Vec::new()
}
