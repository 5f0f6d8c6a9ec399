//! Link state shared between network bring-up and the status bar.

use core::sync::atomic::{AtomicBool, AtomicI8, AtomicU8, Ordering};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum LinkState {
    Down = 0,
    Joining = 1,
    Up = 2,
}

impl LinkState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Joining,
            2 => Self::Up,
            _ => Self::Down,
        }
    }
}

/// Wi-Fi credentials source.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WifiConfig {
    pub ssid: &'static str,
    pub password: &'static str,
}

impl WifiConfig {
    pub const fn new(ssid: &'static str, password: &'static str) -> Self {
        Self { ssid, password }
    }
}

/// Immutable link snapshot for the renderer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LinkSnapshot {
    pub state: LinkState,
    pub has_ipv4: bool,
    pub rssi_dbm: i8,
}

/// Lock-free shared link status.
#[derive(Debug)]
pub struct LinkHandle {
    state: AtomicU8,
    has_ipv4: AtomicBool,
    rssi_dbm: AtomicI8,
}

impl LinkHandle {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(LinkState::Down as u8),
            has_ipv4: AtomicBool::new(false),
            rssi_dbm: AtomicI8::new(i8::MIN),
        }
    }

    pub fn mark_joining(&self) {
        self.state.store(LinkState::Joining as u8, Ordering::Relaxed);
    }

    pub fn mark_up(&self, rssi_dbm: i8, has_ipv4: bool) {
        self.rssi_dbm.store(rssi_dbm, Ordering::Relaxed);
        self.has_ipv4.store(has_ipv4, Ordering::Relaxed);
        self.state.store(LinkState::Up as u8, Ordering::Relaxed);
    }

    pub fn mark_down(&self) {
        self.state.store(LinkState::Down as u8, Ordering::Relaxed);
        self.has_ipv4.store(false, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LinkSnapshot {
        LinkSnapshot {
            state: LinkState::from_raw(self.state.load(Ordering::Relaxed)),
            has_ipv4: self.has_ipv4.load(Ordering::Relaxed),
            rssi_dbm: self.rssi_dbm.load(Ordering::Relaxed),
        }
    }
}

impl Default for LinkHandle {
    fn default() -> Self {
        Self::new()
    }
}
