//! Callbacks the emulator runs when something interesting happens, e.g. to grab a backtrace
//! every time a certain function is entered.
//!
//! Every registration gets a [`Cookie`] and a [`Handle`] that can remove it again. One-shot hooks
//! are ordinary hooks whose callback cancels its own handle before doing anything else.

use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;

pub type Cookie = u32;

/// Something the emulator reports to the hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// About to execute the instruction at this address.
    Pc(u32),
    /// Controller state, one bit per [`Button`].
    Buttons(u32),
    RamRead {
        addr: u32,
    },
    RamWrite {
        addr: u32,
        value: u64,
        mask: u64,
    },
    /// DMA from the cartridge into RDRAM.
    CartRead {
        base: u32,
        len: u32,
        dst: u32,
    },
    /// DMA from RDRAM to the cartridge.
    CartWrite {
        base: u32,
        len: u32,
        dst: u32,
    },
}

/// Controller buttons in the order of the bits in [`Event::Buttons`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    RightDpad = 0,
    LeftDpad,
    DownDpad,
    UpDpad,
    Start,
    Z,
    B,
    A,
    RightC,
    LeftC,
    DownC,
    UpC,
    R,
    L,
}

impl Button {
    pub fn mask(self) -> u32 {
        1 << self as u32
    }

    pub fn combination(buttons: &[Button]) -> u32 {
        buttons.iter().fold(0, |mask, button| mask | button.mask())
    }
}

/// Half open address range `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddrRange {
    pub min: u32,
    pub max: u32,
}

impl AddrRange {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// Just the byte at `addr`.
    pub fn single(addr: u32) -> Self {
        Self::new(addr, addr.saturating_add(1))
    }

    pub fn contains(&self, addr: u32) -> bool {
        (self.min..self.max).contains(&addr)
    }

    /// Whether `len` bytes starting at `base` touch this range.
    pub fn overlaps(&self, base: u32, len: u32) -> bool {
        base < self.max && u64::from(base) + u64::from(len) > u64::from(self.min)
    }
}

/// The usual hook conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Pc(u32),
    /// All of these buttons are held.
    Buttons(u32),
    RamRead(AddrRange),
    RamWrite(AddrRange),
    CartRead(AddrRange),
    CartWrite(AddrRange),
}

impl Trigger {
    pub fn matches(&self, event: &Event) -> bool {
        match (*self, *event) {
            (Trigger::Pc(want), Event::Pc(pc)) => want == pc,
            (Trigger::Buttons(want), Event::Buttons(held)) => want != 0 && held & want == want,
            (Trigger::RamRead(range), Event::RamRead { addr }) => range.contains(addr),
            (Trigger::RamWrite(range), Event::RamWrite { addr, .. }) => range.contains(addr),
            (Trigger::CartRead(range), Event::CartRead { base, len, .. }) => {
                range.overlaps(base, len)
            }
            (Trigger::CartWrite(range), Event::CartWrite { base, len, .. }) => {
                range.overlaps(base, len)
            }
            _ => false,
        }
    }
}

type Predicate = Box<dyn Fn(&Event) -> bool>;
type Callback<S> = Rc<RefCell<dyn FnMut(&mut S, &Event)>>;

struct Hook<S> {
    cookie: Cookie,
    live: Rc<Cell<bool>>,
    predicate: Predicate,
    callback: Callback<S>,
}

struct Hooks<S> {
    next_cookie: Cookie,
    hooks: Vec<Hook<S>>,
}

trait Unregister {
    fn unregister(&self, cookie: Cookie);
}

impl<S> Unregister for RefCell<Hooks<S>> {
    fn unregister(&self, cookie: Cookie) {
        self.borrow_mut().hooks.retain(|hook| hook.cookie != cookie);
    }
}

/// Removes a registered hook.
#[derive(Clone)]
pub struct Handle {
    cookie: Cookie,
    live: Rc<Cell<bool>>,
    registry: Weak<dyn Unregister>,
}

impl Handle {
    pub fn cookie(&self) -> Cookie {
        self.cookie
    }

    pub fn is_live(&self) -> bool {
        self.live.get()
    }

    /// Removes the hook. Returns whether it was still registered; calling this again is a
    /// no-op.
    pub fn cancel(&self) -> bool {
        if !self.live.replace(false) {
            return false;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self.cookie);
        }
        debug!(cookie = self.cookie, "removed hook");
        true
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("cookie", &self.cookie)
            .field("live", &self.live.get())
            .finish()
    }
}

/// All hooks for one emulator instance. `S` is whatever the callbacks get to look at, usually a
/// [`Snapshot`](crate::host::Snapshot).
pub struct HookRegistry<S> {
    inner: Rc<RefCell<Hooks<S>>>,
}

impl<S: 'static> HookRegistry<S> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Hooks {
                next_cookie: 0,
                hooks: Vec::new(),
            })),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `callback` for every dispatched event `predicate` accepts, until the returned
    /// handle is cancelled.
    pub fn register(
        &self,
        predicate: impl Fn(&Event) -> bool + 'static,
        callback: impl FnMut(&mut S, &Event) + 'static,
    ) -> Handle {
        let live = Rc::new(Cell::new(true));
        let mut hooks = self.inner.borrow_mut();
        let cookie = hooks.next_cookie;
        hooks.next_cookie = hooks.next_cookie.wrapping_add(1);
        hooks.hooks.push(Hook {
            cookie,
            live: live.clone(),
            predicate: Box::new(predicate),
            callback: Rc::new(RefCell::new(callback)),
        });
        debug!(cookie, "registered hook");

        let registry: Rc<dyn Unregister> = self.inner.clone();
        Handle {
            cookie,
            live,
            registry: Rc::downgrade(&registry),
        }
    }

    /// Like [`register`](Self::register), but the hook removes itself the first time it runs.
    pub fn register_once(
        &self,
        predicate: impl Fn(&Event) -> bool + 'static,
        mut callback: impl FnMut(&mut S, &Event) + 'static,
    ) -> Handle {
        let slot: Rc<RefCell<Option<Handle>>> = Rc::new(RefCell::new(None));
        let own = slot.clone();
        let handle = self.register(predicate, move |state, event| {
            if let Some(handle) = own.borrow().as_ref() {
                handle.cancel();
            }
            callback(state, event)
        });
        *slot.borrow_mut() = Some(handle.clone());
        handle
    }

    pub fn on(&self, trigger: Trigger, callback: impl FnMut(&mut S, &Event) + 'static) -> Handle {
        self.register(move |event| trigger.matches(event), callback)
    }

    pub fn once(&self, trigger: Trigger, callback: impl FnMut(&mut S, &Event) + 'static) -> Handle {
        self.register_once(move |event| trigger.matches(event), callback)
    }

    /// Runs every live hook that wants `event`, in registration order. Returns how many ran.
    ///
    /// Hooks may register and cancel hooks while running. A hook cancelled by an earlier hook
    /// of the same dispatch doesn't run, one registered during it only sees later events. A hook
    /// that dispatches recursively doesn't run itself again.
    pub fn dispatch(&self, event: &Event, state: &mut S) -> usize {
        let matching: Vec<(Rc<Cell<bool>>, Callback<S>)> = self
            .inner
            .borrow()
            .hooks
            .iter()
            .filter(|hook| (hook.predicate)(event))
            .map(|hook| (hook.live.clone(), hook.callback.clone()))
            .collect();

        let mut ran = 0;
        for (live, callback) in matching {
            if !live.get() {
                continue;
            }
            let Ok(mut callback) = callback.try_borrow_mut() else {
                continue;
            };
            (*callback)(state, event);
            ran += 1;
        }
        ran
    }
}

impl<S: 'static> Default for HookRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}
